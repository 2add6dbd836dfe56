use crate::error::{Error, Result};
use crate::matcher::{AttrOperator, AttrPredicate, Compound, Formula, Predicate, PseudoClass};
use std::fmt;
use std::str::FromStr;

/// Relationship between a compound and the nodes selected by the step
/// before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Combinator {
    /// Whitespace: any descendant.
    Descendant,
    /// `>`: an immediate child.
    Child,
    /// `+`: the next element sibling.
    NextSibling,
}

impl Default for Combinator {
    fn default() -> Self {
        Combinator::Descendant
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub combinator: Combinator,
    pub compound: Compound,
}

/// A parsed selector clause such as `#toc div + ul`, evaluated left to right.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Chain {
    pub steps: Vec<Step>,
}

impl Chain {
    /// Parses a selector clause.
    pub fn parse(text: &str) -> Result<Chain> {
        let mut parser = Parser::new(text);
        let chain = parser.parse_chain(None)?;
        if chain.is_empty() {
            return Err(parser.error("expected a selector"));
        }
        Ok(chain)
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Appends the steps of `other`. A combinator other than descendant
    /// replaces the combinator of the first appended step.
    pub(crate) fn extend(&mut self, other: Chain, combinator: Combinator) {
        let mut steps = other.steps.into_iter();
        if let Some(mut first) = steps.next() {
            if combinator != Combinator::Descendant {
                first.combinator = combinator;
            }
            self.steps.push(first);
        }
        self.steps.extend(steps);
    }
}

impl FromStr for Chain {
    type Err = Error;

    fn from_str(s: &str) -> Result<Chain> {
        Chain::parse(s)
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, step) in self.steps.iter().enumerate() {
            match (i, step.combinator) {
                (0, Combinator::Descendant) => {}
                (0, Combinator::Child) => f.write_str("> ")?,
                (0, Combinator::NextSibling) => f.write_str("+ ")?,
                (_, Combinator::Descendant) => f.write_str(" ")?,
                (_, Combinator::Child) => f.write_str(" > ")?,
                (_, Combinator::NextSibling) => f.write_str(" + ")?,
            }
            write!(f, "{}", step.compound)?;
        }
        Ok(())
    }
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_' || !c.is_ascii()
}

/// Recursive-descent parser over one selector clause.
///
/// ```text
/// chain    := combinator? compound (combinator? compound)*
/// compound := (tag | '*')? ('#' id | '.' class | '[' attr ']' | ':' pseudo)*
/// ```
struct Parser<'t> {
    input: &'t str,
    pos: usize,
}

impl<'t> Parser<'t> {
    fn new(input: &'t str) -> Self {
        Parser { input, pos: 0 }
    }

    fn error(&self, reason: impl Into<String>) -> Error {
        self.error_at(self.pos, reason)
    }

    fn error_at(&self, position: usize, reason: impl Into<String>) -> Error {
        Error::malformed(self.input, position, reason)
    }

    fn rest(&self) -> &'t str {
        &self.input[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.pos += expected.len_utf8();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: char) -> Result<()> {
        if self.eat(expected) {
            return Ok(());
        }
        match self.peek() {
            Some(c) => Err(self.error(format!("expected `{}`, found `{}`", expected, c))),
            None => Err(self.error(format!("expected `{}`, found end of selector", expected))),
        }
    }

    fn skip_whitespace(&mut self) {
        while self.peek().map_or(false, char::is_whitespace) {
            self.bump();
        }
    }

    fn parse_ident(&mut self, what: &str) -> Result<&'t str> {
        let start = self.pos;
        while self.peek().map_or(false, is_ident_char) {
            self.bump();
        }
        if start == self.pos {
            return Err(self.error(format!("expected {}", what)));
        }
        Ok(&self.input[start..self.pos])
    }

    /// Parses compounds up to the end of input or, inside parentheses, up to
    /// (but not including) `close`.
    fn parse_chain(&mut self, close: Option<char>) -> Result<Chain> {
        let mut chain = Chain::default();
        let mut pending: Option<Combinator> = None;

        loop {
            self.skip_whitespace();
            match self.peek() {
                None => {
                    if let Some(close) = close {
                        return Err(self.error(format!("unbalanced parentheses, missing `{}`", close)));
                    }
                    break;
                }
                Some(c) if Some(c) == close => break,
                Some(c @ '>') | Some(c @ '+') => {
                    if pending.is_some() {
                        return Err(self.error(format!("unexpected combinator `{}`", c)));
                    }
                    pending = Some(if c == '>' {
                        Combinator::Child
                    } else {
                        Combinator::NextSibling
                    });
                    self.bump();
                }
                Some(',') => {
                    return Err(self.error("unexpected `,` inside a selector clause"));
                }
                Some(_) => {
                    let compound = self.parse_compound()?;
                    chain.steps.push(Step {
                        combinator: pending.take().unwrap_or_default(),
                        compound,
                    });
                }
            }
        }

        if pending.is_some() {
            return Err(self.error("combinator is not followed by a selector"));
        }

        Ok(chain)
    }

    fn parse_compound(&mut self) -> Result<Compound> {
        let mut compound = Compound::default();
        let mut wildcard = false;

        match self.peek() {
            Some('*') => {
                self.bump();
                wildcard = true;
            }
            Some(c) if is_ident_char(c) => {
                compound.tag = Some(self.parse_ident("tag name")?.to_string());
            }
            _ => {}
        }

        loop {
            let predicate = match self.peek() {
                Some('#') => {
                    self.bump();
                    Predicate::Id(self.parse_ident("id")?.to_string())
                }
                Some('.') => {
                    self.bump();
                    Predicate::Class(self.parse_ident("class name")?.to_string())
                }
                Some('[') => Predicate::Attr(self.parse_attr()?),
                Some(':') => Predicate::Pseudo(self.parse_pseudo()?),
                _ => break,
            };
            compound.predicates.push(predicate);
        }

        match self.peek() {
            None | Some('>') | Some('+') | Some(')') | Some(',') => {}
            Some(c) if c.is_whitespace() => {}
            Some(c) => return Err(self.error(format!("unexpected character `{}`", c))),
        }

        if !wildcard && compound.tag.is_none() && compound.predicates.is_empty() {
            return Err(self.error("expected a selector"));
        }

        Ok(compound)
    }

    /// Parses a quoted string, or an unquoted run of characters ending at
    /// whitespace or at `end`.
    fn parse_value(&mut self, end: char) -> Result<String> {
        let start = self.pos;
        match self.peek() {
            Some(quote @ '"') | Some(quote @ '\'') => {
                self.bump();
                let value_start = self.pos;
                loop {
                    match self.bump() {
                        Some(c) if c == quote => break,
                        Some(_) => {}
                        None => return Err(self.error_at(start, "unterminated string")),
                    }
                }
                Ok(self.input[value_start..self.pos - quote.len_utf8()].to_string())
            }
            _ => {
                while self
                    .peek()
                    .map_or(false, |c| c != end && !c.is_whitespace())
                {
                    self.bump();
                }
                if start == self.pos {
                    return Err(self.error("expected a value"));
                }
                Ok(self.input[start..self.pos].to_string())
            }
        }
    }

    fn parse_attr(&mut self) -> Result<AttrPredicate> {
        let start = self.pos;
        self.expect('[')?;
        self.skip_whitespace();
        let name = self.parse_ident("attribute name")?.to_string();
        self.skip_whitespace();

        let operator = if self.eat(']') {
            return Ok(AttrPredicate {
                name,
                operator: AttrOperator::Exists,
                value: String::new(),
                case_insensitive: false,
            });
        } else if self.eat('=') {
            AttrOperator::Equals
        } else {
            let operator = match self.rest().get(..2) {
                Some("~=") => AttrOperator::Includes,
                Some("|=") => AttrOperator::DashMatch,
                Some("^=") => AttrOperator::Prefix,
                Some("$=") => AttrOperator::Suffix,
                Some("*=") => AttrOperator::Substring,
                _ if self.peek().is_none() => {
                    return Err(self.error_at(start, "unclosed `[`"));
                }
                _ => return Err(self.error("expected `]` or an attribute operator")),
            };
            self.pos += 2;
            operator
        };

        self.skip_whitespace();
        let value = self.parse_value(']')?;
        self.skip_whitespace();

        let mut case_insensitive = false;
        match self.peek() {
            Some('i') | Some('I') => {
                self.bump();
                case_insensitive = true;
            }
            Some('s') | Some('S') => {
                self.bump();
            }
            _ => {}
        }
        self.skip_whitespace();

        if self.peek().is_none() {
            return Err(self.error_at(start, "unclosed `[`"));
        }
        self.expect(']')?;

        Ok(AttrPredicate {
            name,
            operator,
            value,
            case_insensitive,
        })
    }

    fn parse_pseudo(&mut self) -> Result<PseudoClass> {
        let start = self.pos;
        self.expect(':')?;
        let name = self.parse_ident("pseudo-class name")?.to_ascii_lowercase();

        let simple = match name.as_str() {
            "empty" => Some(PseudoClass::Empty),
            "only-child" => Some(PseudoClass::OnlyChild),
            "first-child" => Some(PseudoClass::FirstChild),
            "last-child" => Some(PseudoClass::LastChild),
            "first-of-type" => Some(PseudoClass::FirstOfType),
            "last-of-type" => Some(PseudoClass::LastOfType),
            _ => None,
        };
        if let Some(pseudo) = simple {
            if self.peek() == Some('(') {
                return Err(self.error(format!(":{} takes no arguments", name)));
            }
            return Ok(pseudo);
        }

        let nth: Option<fn(Formula) -> PseudoClass> = match name.as_str() {
            "nth-child" => Some(PseudoClass::NthChild),
            "nth-last-child" => Some(PseudoClass::NthLastChild),
            "nth-of-type" => Some(PseudoClass::NthOfType),
            "nth-last-of-type" => Some(PseudoClass::NthLastOfType),
            "not" | "parent-of" | "contains" => None,
            _ => return Err(self.error_at(start, format!("unknown pseudo-class `:{}`", name))),
        };

        if self.peek() != Some('(') {
            return Err(self.error(format!(":{} requires an argument", name)));
        }
        self.bump();

        let pseudo = if let Some(nth) = nth {
            let arg_start = self.pos;
            while self.peek().map_or(false, |c| c != ')') {
                self.bump();
            }
            let arg = &self.input[arg_start..self.pos];
            match Formula::parse(arg) {
                Some(formula) => nth(formula),
                None => {
                    return Err(self.error_at(arg_start, format!("invalid nth formula `{}`", arg.trim())))
                }
            }
        } else {
            self.skip_whitespace();
            match name.as_str() {
                "not" => PseudoClass::Not(Box::new(self.parse_compound()?)),
                "parent-of" => {
                    let chain = self.parse_chain(Some(')'))?;
                    if chain.is_empty() {
                        return Err(self.error("expected a selector"));
                    }
                    PseudoClass::ParentOf(chain)
                }
                _ => PseudoClass::Contains(self.parse_value(')')?),
            }
        };

        self.skip_whitespace();
        if self.peek().is_none() {
            return Err(self.error("unbalanced parentheses, missing `)`"));
        }
        self.expect(')')?;

        Ok(pseudo)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn compound(text: &str) -> Compound {
        let chain = Chain::parse(text).unwrap();
        assert_eq!(chain.steps.len(), 1, "{} is not a single compound", text);
        chain.steps.into_iter().next().unwrap().compound
    }

    fn reason(text: &str) -> String {
        match Chain::parse(text) {
            Err(Error::MalformedSelector { reason, .. }) => reason,
            other => panic!("expected a malformed selector for {:?}, got {:?}", text, other),
        }
    }

    #[test]
    fn test_parse_compound() {
        assert_eq!(
            compound("div#main.a.b"),
            Compound {
                tag: Some("div".to_string()),
                predicates: vec![
                    Predicate::Id("main".to_string()),
                    Predicate::Class("a".to_string()),
                    Predicate::Class("b".to_string()),
                ],
            }
        );
        assert_eq!(compound("*"), Compound::default());
    }

    #[test]
    fn test_parse_chain_combinators() {
        let chain = Chain::parse("#toc div + ul > li").unwrap();
        let combinators: Vec<Combinator> = chain.steps.iter().map(|s| s.combinator).collect();
        assert_eq!(
            combinators,
            vec![
                Combinator::Descendant,
                Combinator::Descendant,
                Combinator::NextSibling,
                Combinator::Child,
            ]
        );
        assert_eq!(chain.to_string(), "#toc div + ul > li");
    }

    #[test]
    fn test_parse_combinators_without_whitespace() {
        let chain = Chain::parse("a>b+c").unwrap();
        assert_eq!(chain.to_string(), "a > b + c");
    }

    #[test]
    fn test_parse_attr() {
        let attr = |text: &str| match compound(text).predicates.pop() {
            Some(Predicate::Attr(attr)) => attr,
            other => panic!("not an attribute predicate: {:?}", other),
        };

        let exists = attr("[rel]");
        assert_eq!(exists.operator, AttrOperator::Exists);
        assert_eq!(exists.name, "rel");

        let equals = attr(r#"a[title="The Practice of Programming"]"#);
        assert_eq!(equals.operator, AttrOperator::Equals);
        assert_eq!(equals.value, "The Practice of Programming");

        let unquoted = attr("[class=summary]");
        assert_eq!(unquoted.value, "summary");

        let single = attr("[ lang |= 'en' ]");
        assert_eq!(single.operator, AttrOperator::DashMatch);
        assert_eq!(single.value, "en");

        let flagged = attr("[type=TEXT i]");
        assert!(flagged.case_insensitive);

        assert_eq!(attr("[href^=http]").operator, AttrOperator::Prefix);
        assert_eq!(attr("[href$=png]").operator, AttrOperator::Suffix);
        assert_eq!(attr("[href*=x]").operator, AttrOperator::Substring);
        assert_eq!(attr("[class~=x]").operator, AttrOperator::Includes);
    }

    #[test]
    fn test_parse_pseudo() {
        let pseudo = |text: &str| match compound(text).predicates.pop() {
            Some(Predicate::Pseudo(pseudo)) => pseudo,
            other => panic!("not a pseudo-class: {:?}", other),
        };

        assert_eq!(pseudo("li:first-child"), PseudoClass::FirstChild);
        assert_eq!(pseudo(":EMPTY"), PseudoClass::Empty);
        assert_eq!(
            pseudo("li:nth-child( 3n + 1 )"),
            PseudoClass::NthChild(Formula::new(3, 1))
        );
        assert_eq!(
            pseudo("li:nth-last-of-type(odd)"),
            PseudoClass::NthLastOfType(Formula::new(2, 1))
        );
        match pseudo("a:not( [rel] )") {
            PseudoClass::Not(inner) => assert_eq!(inner.to_string(), "[rel]"),
            other => panic!("not a negation: {:?}", other),
        }
        assert_eq!(
            pseudo("a:contains(\"x y\")"),
            PseudoClass::Contains("x y".to_string())
        );

        match pseudo("a:parent-of(> sup)") {
            PseudoClass::ParentOf(chain) => {
                assert_eq!(chain.steps[0].combinator, Combinator::Child);
                assert_eq!(chain.to_string(), "> sup");
            }
            other => panic!("not parent-of: {:?}", other),
        }
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(reason("li:nth-child(x)"), "invalid nth formula `x`");
        assert_eq!(reason("li:bogus"), "unknown pseudo-class `:bogus`");
        assert_eq!(reason("a > > b"), "unexpected combinator `>`");
        assert_eq!(reason("a >"), "combinator is not followed by a selector");
        assert_eq!(reason("a:not([rel]"), "unbalanced parentheses, missing `)`");
        assert_eq!(reason("a:nth-child(2"), "unbalanced parentheses, missing `)`");
        assert_eq!(reason("a:parent-of(b"), "unbalanced parentheses, missing `)`");
        assert_eq!(reason("a[rel"), "unclosed `[`");
        assert_eq!(reason("a[title=\"x]"), "unterminated string");
        assert_eq!(reason("a{}"), "unexpected character `{`");
        assert_eq!(reason(""), "expected a selector");
        assert_eq!(reason(":first-child(1)"), ":first-child takes no arguments");
        assert_eq!(reason("#"), "expected id");
    }

    #[test]
    fn test_parse_error_position() {
        match Chain::parse("li:bogus") {
            Err(Error::MalformedSelector { text, position, .. }) => {
                assert_eq!(text, "li:bogus");
                assert_eq!(position, 2);
            }
            other => panic!("unexpected result {:?}", other),
        }
    }
}

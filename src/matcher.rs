use crate::dom_tree::{Node, NodeId};
use crate::parser::Chain;
use crate::selection::Selection;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;

/// One unit of matching criteria. Every predicate must hold for a node to
/// match; a missing tag matches any element.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Compound {
    pub tag: Option<String>,
    pub predicates: Vec<Predicate>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    Id(String),
    Class(String),
    Attr(AttrPredicate),
    Pseudo(PseudoClass),
}

/// How an attribute value is compared with the expected value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttrOperator {
    /// `[attr]`
    Exists,
    /// `[attr=value]`
    Equals,
    /// `[attr~=value]`, one of the whitespace separated words.
    Includes,
    /// `[attr|=value]`, exactly the value or the value followed by `-`.
    DashMatch,
    /// `[attr^=value]`
    Prefix,
    /// `[attr$=value]`
    Suffix,
    /// `[attr*=value]`
    Substring,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttrPredicate {
    pub name: String,
    pub operator: AttrOperator,
    pub value: String,
    pub case_insensitive: bool,
}

/// Pseudo-classes understood by the selector grammar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PseudoClass {
    Empty,
    OnlyChild,
    FirstChild,
    LastChild,
    FirstOfType,
    LastOfType,
    NthChild(Formula),
    NthLastChild(Formula),
    NthOfType(Formula),
    NthLastOfType(Formula),
    Not(Box<Compound>),
    ParentOf(Chain),
    Contains(String),
}

/// An `an+b` formula of the `nth-*` pseudo-classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Formula {
    pub a: i32,
    pub b: i32,
}

impl Formula {
    pub fn new(a: i32, b: i32) -> Self {
        Formula { a, b }
    }

    /// Parses `odd`, `even`, `b` or `an+b`. Whitespace is ignored.
    pub fn parse(text: &str) -> Option<Formula> {
        let text: String = text
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_ascii_lowercase();

        match text.as_str() {
            "" => return None,
            "odd" => return Some(Formula::new(2, 1)),
            "even" => return Some(Formula::new(2, 0)),
            _ => {}
        }

        let idx = match text.find('n') {
            Some(idx) => idx,
            None => return text.parse().ok().map(|b| Formula::new(0, b)),
        };

        let a = match &text[..idx] {
            "" | "+" => 1,
            "-" => -1,
            a => a.parse().ok()?,
        };

        let rest = &text[idx + 1..];
        let b = if rest.is_empty() {
            0
        } else if rest.starts_with('+') || rest.starts_with('-') {
            rest.parse().ok()?
        } else {
            return None;
        };

        Some(Formula::new(a, b))
    }

    /// Whether the 1-indexed `position` equals `a*k + b` for some `k >= 0`.
    pub fn matches(&self, position: usize) -> bool {
        let (a, b, p) = (i64::from(self.a), i64::from(self.b), position as i64);
        if a == 0 {
            return p == b;
        }

        let diff = p - b;
        diff % a == 0 && diff / a >= 0
    }
}

/// Position of an element among its parent's element children. Positions
/// are 1-indexed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SiblingContext {
    pub position: usize,
    pub count: usize,
    pub type_position: usize,
    pub type_count: usize,
}

impl SiblingContext {
    /// Computes the context of a single node. Use a `SiblingCache` when
    /// matching many siblings.
    pub fn of(node: &Node) -> Self {
        SiblingCache::default().context(node)
    }

    /// Contexts of every element child of `parent`, in one pass.
    fn of_children(parent: &Node) -> HashMap<NodeId, SiblingContext> {
        let children = parent.element_children();
        let mut type_counts: HashMap<&str, usize> = HashMap::new();
        let mut contexts = HashMap::with_capacity(children.len());

        for (i, child) in children.iter().enumerate() {
            let tag = child.tag_name().unwrap_or_default();
            let type_position = type_counts.entry(tag).or_insert(0);
            *type_position += 1;
            contexts.insert(
                child.id,
                SiblingContext {
                    position: i + 1,
                    count: children.len(),
                    type_position: *type_position,
                    type_count: 0,
                },
            );
        }

        for child in &children {
            let tag = child.tag_name().unwrap_or_default();
            if let Some(context) = contexts.get_mut(&child.id) {
                context.type_count = type_counts.get(tag).copied().unwrap_or(0);
            }
        }

        contexts
    }

    fn position_from_end(&self) -> usize {
        self.count + 1 - self.position
    }

    fn type_position_from_end(&self) -> usize {
        self.type_count + 1 - self.type_position
    }
}

/// Sibling contexts computed once per parent and shared by every match
/// made with the same cache.
#[derive(Debug, Default)]
pub struct SiblingCache {
    parents: RefCell<HashMap<NodeId, HashMap<NodeId, SiblingContext>>>,
}

impl SiblingCache {
    pub fn context(&self, node: &Node) -> SiblingContext {
        let alone = SiblingContext {
            position: 1,
            count: 1,
            type_position: 1,
            type_count: 1,
        };
        let parent = match node.parent() {
            Some(parent) => parent,
            None => return alone,
        };

        let mut parents = self.parents.borrow_mut();
        parents
            .entry(parent.id)
            .or_insert_with(|| SiblingContext::of_children(&parent))
            .get(&node.id)
            .copied()
            .unwrap_or(alone)
    }

    /// Number of parents whose children have been indexed.
    pub fn len(&self) -> usize {
        self.parents.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Compound {
    /// Whether the node satisfies every criterion. Only elements can match.
    pub fn matches(&self, node: &Node) -> bool {
        self.matches_with(node, &SiblingCache::default())
    }

    /// Like `matches`, reusing sibling positions from `siblings`.
    pub fn matches_with(&self, node: &Node, siblings: &SiblingCache) -> bool {
        let tag = match node.tag_name() {
            Some(tag) => tag,
            None => return false,
        };

        if let Some(ref expected) = self.tag {
            if expected != tag {
                return false;
            }
        }

        self.predicates
            .iter()
            .all(|predicate| predicate.matches(node, siblings))
    }
}

impl Predicate {
    fn matches(&self, node: &Node, siblings: &SiblingCache) -> bool {
        match self {
            Predicate::Id(id) => node.attr("id") == Some(id.as_str()),
            Predicate::Class(class) => node
                .attr("class")
                .map_or(false, |value| value.split_ascii_whitespace().any(|c| c == class)),
            Predicate::Attr(attr) => attr.matches(node),
            Predicate::Pseudo(pseudo) => pseudo.matches(node, siblings),
        }
    }
}

impl AttrPredicate {
    pub fn matches(&self, node: &Node) -> bool {
        let actual = match node.attr(&self.name) {
            Some(value) => value,
            None => return false,
        };

        if self.case_insensitive {
            self.compare(&actual.to_ascii_lowercase(), &self.value.to_ascii_lowercase())
        } else {
            self.compare(actual, &self.value)
        }
    }

    fn compare(&self, actual: &str, expected: &str) -> bool {
        match self.operator {
            AttrOperator::Exists => true,
            AttrOperator::Equals => actual == expected,
            AttrOperator::Includes => {
                !expected.is_empty()
                    && !expected.contains(char::is_whitespace)
                    && actual.split_ascii_whitespace().any(|word| word == expected)
            }
            AttrOperator::DashMatch => {
                actual == expected
                    || (actual.starts_with(expected)
                        && actual[expected.len()..].starts_with('-'))
            }
            AttrOperator::Prefix => !expected.is_empty() && actual.starts_with(expected),
            AttrOperator::Suffix => !expected.is_empty() && actual.ends_with(expected),
            AttrOperator::Substring => !expected.is_empty() && actual.contains(expected),
        }
    }
}

impl PseudoClass {
    fn matches(&self, node: &Node, cache: &SiblingCache) -> bool {
        let siblings = || cache.context(node);
        match self {
            PseudoClass::Empty => node.first_child().is_none(),
            PseudoClass::OnlyChild => siblings().count == 1,
            PseudoClass::FirstChild => siblings().position == 1,
            PseudoClass::LastChild => siblings().position_from_end() == 1,
            PseudoClass::FirstOfType => siblings().type_position == 1,
            PseudoClass::LastOfType => siblings().type_position_from_end() == 1,
            PseudoClass::NthChild(formula) => formula.matches(siblings().position),
            PseudoClass::NthLastChild(formula) => formula.matches(siblings().position_from_end()),
            PseudoClass::NthOfType(formula) => formula.matches(siblings().type_position),
            PseudoClass::NthLastOfType(formula) => {
                formula.matches(siblings().type_position_from_end())
            }
            PseudoClass::Not(inner) => !inner.matches_with(node, cache),
            PseudoClass::ParentOf(chain) => Selection::from(*node).select_chain(chain).exists(),
            PseudoClass::Contains(text) => node.text().contains(text.as_str()),
        }
    }
}

impl fmt::Display for Formula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.a, self.b) {
            (0, b) => write!(f, "{}", b),
            (a, 0) => write!(f, "{}n", a),
            (a, b) => write!(f, "{}n{:+}", a, b),
        }
    }
}

impl fmt::Display for Compound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.tag {
            Some(ref tag) => f.write_str(tag)?,
            None if self.predicates.is_empty() => f.write_str("*")?,
            None => {}
        }

        for predicate in &self.predicates {
            match predicate {
                Predicate::Id(id) => write!(f, "#{}", id)?,
                Predicate::Class(class) => write!(f, ".{}", class)?,
                Predicate::Attr(attr) => {
                    let op = match attr.operator {
                        AttrOperator::Exists => {
                            write!(f, "[{}]", attr.name)?;
                            continue;
                        }
                        AttrOperator::Equals => "=",
                        AttrOperator::Includes => "~=",
                        AttrOperator::DashMatch => "|=",
                        AttrOperator::Prefix => "^=",
                        AttrOperator::Suffix => "$=",
                        AttrOperator::Substring => "*=",
                    };
                    let flag = if attr.case_insensitive { " i" } else { "" };
                    write!(f, "[{}{}{:?}{}]", attr.name, op, attr.value, flag)?;
                }
                Predicate::Pseudo(pseudo) => match pseudo {
                    PseudoClass::Empty => f.write_str(":empty")?,
                    PseudoClass::OnlyChild => f.write_str(":only-child")?,
                    PseudoClass::FirstChild => f.write_str(":first-child")?,
                    PseudoClass::LastChild => f.write_str(":last-child")?,
                    PseudoClass::FirstOfType => f.write_str(":first-of-type")?,
                    PseudoClass::LastOfType => f.write_str(":last-of-type")?,
                    PseudoClass::NthChild(n) => write!(f, ":nth-child({})", n)?,
                    PseudoClass::NthLastChild(n) => write!(f, ":nth-last-child({})", n)?,
                    PseudoClass::NthOfType(n) => write!(f, ":nth-of-type({})", n)?,
                    PseudoClass::NthLastOfType(n) => write!(f, ":nth-last-of-type({})", n)?,
                    PseudoClass::Not(inner) => write!(f, ":not({})", inner)?,
                    PseudoClass::ParentOf(chain) => write!(f, ":parent-of({})", chain)?,
                    PseudoClass::Contains(text) => write!(f, ":contains({:?})", text)?,
                },
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Document;

    fn positions(formula: &str, size: usize) -> Vec<usize> {
        let formula = Formula::parse(formula).unwrap();
        (1..=size).filter(|p| formula.matches(*p)).collect()
    }

    #[test]
    fn test_formula_parse() {
        assert_eq!(Formula::parse("odd"), Some(Formula::new(2, 1)));
        assert_eq!(Formula::parse("even"), Some(Formula::new(2, 0)));
        assert_eq!(Formula::parse("3"), Some(Formula::new(0, 3)));
        assert_eq!(Formula::parse("n"), Some(Formula::new(1, 0)));
        assert_eq!(Formula::parse("-n+3"), Some(Formula::new(-1, 3)));
        assert_eq!(Formula::parse(" 3n + 1 "), Some(Formula::new(3, 1)));
        assert_eq!(Formula::parse("2n-1"), Some(Formula::new(2, -1)));
        assert_eq!(Formula::parse("+5"), Some(Formula::new(0, 5)));
    }

    #[test]
    fn test_formula_parse_invalid() {
        assert_eq!(Formula::parse(""), None);
        assert_eq!(Formula::parse("n1"), None);
        assert_eq!(Formula::parse("3n+"), None);
        assert_eq!(Formula::parse("abc"), None);
        assert_eq!(Formula::parse("2n+-1"), None);
    }

    #[test]
    fn test_formula_positions() {
        assert_eq!(positions("3n+1", 7), vec![1, 4, 7]);
        assert_eq!(positions("0n+1", 7), vec![1]);
        assert_eq!(positions("1", 7), vec![1]);
        assert_eq!(positions("n+1", 3), vec![1, 2, 3]);
        assert_eq!(positions("-n+3", 7), vec![1, 2, 3]);
        assert_eq!(positions("odd", 5), vec![1, 3, 5]);
        assert_eq!(positions("even", 5), vec![2, 4]);
        assert_eq!(positions("0", 5), Vec::<usize>::new());
    }

    #[test]
    fn test_formula_display() {
        assert_eq!(Formula::new(3, 1).to_string(), "3n+1");
        assert_eq!(Formula::new(2, -1).to_string(), "2n-1");
        assert_eq!(Formula::new(0, 4).to_string(), "4");
        assert_eq!(Formula::new(2, 0).to_string(), "2n");
    }

    #[test]
    fn test_sibling_context() {
        let doc = Document::from("<div><p>a</p><span>b</span><p>c</p></div>");
        let last_p = doc
            .root()
            .descendants()
            .filter(|n| n.has_tag("p"))
            .last()
            .unwrap();

        let context = SiblingContext::of(&last_p);
        assert_eq!(
            context,
            SiblingContext {
                position: 3,
                count: 3,
                type_position: 2,
                type_count: 2,
            }
        );
    }

    #[test]
    fn test_sibling_cache_indexes_each_parent_once() {
        let doc = Document::from("<ul><li>1</li><li>2</li><li>3</li></ul><ol><li>4</li></ol>");
        let last_child = Compound {
            tag: Some("li".to_string()),
            predicates: vec![Predicate::Pseudo(PseudoClass::LastChild)],
        };

        let cache = SiblingCache::default();
        let matched: Vec<String> = doc
            .root()
            .descendants()
            .filter(|n| last_child.matches_with(n, &cache))
            .map(|n| n.text().to_string())
            .collect();

        assert_eq!(matched, vec!["3", "4"]);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_attr_operators() {
        let doc = Document::from(r#"<a lang="en-US" class="x  y" href="https://example.com/a.png">"#);
        let a = doc.root().descendants().find(|n| n.has_tag("a")).unwrap();

        let check = |name: &str, operator, value: &str| {
            AttrPredicate {
                name: name.to_string(),
                operator,
                value: value.to_string(),
                case_insensitive: false,
            }
            .matches(&a)
        };

        assert!(check("lang", AttrOperator::Exists, ""));
        assert!(!check("rel", AttrOperator::Exists, ""));
        assert!(check("lang", AttrOperator::DashMatch, "en"));
        assert!(!check("lang", AttrOperator::DashMatch, "e"));
        assert!(check("class", AttrOperator::Includes, "y"));
        assert!(!check("class", AttrOperator::Includes, "x y"));
        assert!(check("href", AttrOperator::Prefix, "https://"));
        assert!(check("href", AttrOperator::Suffix, ".png"));
        assert!(check("href", AttrOperator::Substring, "example"));
        assert!(!check("href", AttrOperator::Substring, ""));
        assert!(!check("lang", AttrOperator::Equals, "en-us"));
    }

    #[test]
    fn test_attr_case_insensitive() {
        let doc = Document::from(r#"<input type="TEXT">"#);
        let input = doc.root().descendants().find(|n| n.has_tag("input")).unwrap();
        let predicate = AttrPredicate {
            name: "type".to_string(),
            operator: AttrOperator::Equals,
            value: "text".to_string(),
            case_insensitive: true,
        };
        assert!(predicate.matches(&input));
    }

    #[test]
    fn test_text_never_matches() {
        let doc = Document::from("<p>text</p>");
        let text = doc.root().descendants().find(|n| n.is_text()).unwrap();
        assert!(!Compound::default().matches(&text));
    }
}

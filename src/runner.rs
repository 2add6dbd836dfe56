use crate::display::Display;
use crate::dom_tree::NodeId;
use crate::error::{Error, Result};
use crate::matcher::Compound;
use crate::parser::{Chain, Combinator, Step};
use crate::selection::Selection;
use crate::Document;
use std::collections::HashSet;
use tracing::debug;

/// Selector groups and the display directive compiled from the command
/// line tokens.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    groups: Vec<Chain>,
    display: Option<Display>,
}

/// The nodes to render and the display directive, if the tokens ended
/// with one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Output {
    pub nodes: Vec<NodeId>,
    pub display: Option<Display>,
}

impl Query {
    /// Compiles the tokens. `,` separates selector groups, `>` and `+` set
    /// the combinator of the next compound, `*` adds nothing unless it
    /// follows one of them, and the last token may be a display directive. Every group is parsed before
    /// anything is selected.
    pub fn parse<S: AsRef<str>>(tokens: &[S]) -> Result<Query> {
        let mut query = Query {
            groups: vec![Chain::default()],
            display: None,
        };
        let mut combinator = Combinator::Descendant;
        let last = tokens.len().saturating_sub(1);

        for (i, token) in tokens.iter().enumerate() {
            let token = token.as_ref().trim();
            if token.is_empty() {
                continue;
            }

            if i == last {
                if let Some(display) = Display::parse(token) {
                    query.display = Some(display);
                    continue;
                }
            }

            match token {
                "*" => {
                    if combinator == Combinator::Descendant {
                        continue;
                    }
                    if let Some(group) = query.groups.last_mut() {
                        group.steps.push(Step {
                            combinator,
                            compound: Compound::default(),
                        });
                    }
                    combinator = Combinator::Descendant;
                }
                ">" | "+" => {
                    if combinator != Combinator::Descendant {
                        return Err(Error::malformed(token, 0, "unexpected combinator"));
                    }
                    combinator = if token == ">" {
                        Combinator::Child
                    } else {
                        Combinator::NextSibling
                    };
                }
                "," => {
                    if combinator != Combinator::Descendant {
                        return Err(Error::malformed(
                            token,
                            0,
                            "combinator is not followed by a selector",
                        ));
                    }
                    query.groups.push(Chain::default());
                }
                _ => {
                    let chain = match Chain::parse(token) {
                        Ok(chain) => chain,
                        Err(_) if i == last && Display::looks_like_directive(token) => {
                            return Err(Error::UnknownDisplayFormat(token.to_string()));
                        }
                        Err(err) => return Err(err),
                    };

                    if combinator != Combinator::Descendant
                        && chain.steps[0].combinator != Combinator::Descendant
                    {
                        return Err(Error::malformed(token, 0, "unexpected combinator"));
                    }

                    if let Some(group) = query.groups.last_mut() {
                        group.extend(chain, combinator);
                    }
                    combinator = Combinator::Descendant;
                }
            }
        }

        if combinator != Combinator::Descendant {
            let token = tokens.last().map_or("", |t| t.as_ref());
            return Err(Error::malformed(
                token,
                0,
                "combinator is not followed by a selector",
            ));
        }

        for (i, group) in query.groups.iter().enumerate() {
            debug!(group = i, selector = %group, "compiled selector group");
        }

        Ok(query)
    }

    pub fn groups(&self) -> &[Chain] {
        &self.groups
    }

    pub fn display(&self) -> Option<&Display> {
        self.display.as_ref()
    }

    /// Evaluates every group from the document root and concatenates the
    /// results in group order. Nodes matched by more than one group appear
    /// once per group. An empty group selects the root itself.
    pub fn select<'a>(&self, document: &'a Document) -> Selection<'a> {
        let root = Selection::from(document.root());

        self.groups
            .iter()
            .fold(Selection::new(vec![]), |selected, group| {
                let matched = root.select_chain(group);
                debug!(selector = %group, matched = matched.length(), "selected group");
                selected.union(matched)
            })
    }

    /// Selects the matching nodes. With `invert`, the matched subtrees are
    /// removed from the document instead and only the root is returned.
    pub fn run(&self, document: &mut Document, invert: bool) -> Vec<NodeId> {
        let selected = self.select(document).ids();
        if !invert {
            return selected;
        }

        let matches: HashSet<NodeId> = selected.into_iter().collect();
        document.remove_matches(&matches);
        vec![document.root().id]
    }
}

/// Compiles `tokens` and runs them against `document`.
pub fn run<S: AsRef<str>>(document: &mut Document, tokens: &[S], invert: bool) -> Result<Output> {
    let query = Query::parse(tokens)?;
    let nodes = query.run(document, invert);

    Ok(Output {
        nodes,
        display: query.display,
    })
}

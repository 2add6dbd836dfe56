use crate::dom_tree::{Node, NodeId};
use crate::error::Result;
use crate::matcher::{Compound, SiblingCache};
use crate::parser::{Chain, Combinator};
use crate::Document;
use std::collections::HashSet;
use std::vec::IntoIter;
use tendril::StrTendril;

impl Document {
    /// Selects every node matching the selector clause, searching the
    /// whole document.
    pub fn select(&self, sel: &str) -> Result<Selection<'_>> {
        let chain = Chain::parse(sel)?;
        Ok(self.select_chain(&chain))
    }

    /// Evaluates a parsed chain against the whole document.
    pub fn select_chain(&self, chain: &Chain) -> Selection<'_> {
        Selection::from(self.root()).select_chain(chain)
    }
}

/// An ordered set of nodes, in the order they were selected.
#[derive(Debug, Clone)]
pub struct Selection<'a> {
    pub(crate) nodes: Vec<Node<'a>>,
}

impl<'a> From<Node<'a>> for Selection<'a> {
    fn from(node: Node<'a>) -> Self {
        Selection { nodes: vec![node] }
    }
}

impl<'a> Selection<'a> {
    pub fn new(nodes: Vec<Node<'a>>) -> Self {
        Selection { nodes }
    }

    pub fn nodes(&self) -> &[Node<'a>] {
        &self.nodes
    }

    /// Gets the ids of the selected nodes.
    pub fn ids(&self) -> Vec<NodeId> {
        self.nodes.iter().map(|node| node.id).collect()
    }

    pub fn iter(&self) -> Selections<Node<'a>> {
        Selections::new(self.nodes.clone().into_iter())
    }

    /// Returns the number of nodes in the selection.
    pub fn length(&self) -> usize {
        self.nodes.len()
    }

    /// Is there any matched node.
    pub fn exists(&self) -> bool {
        self.length() > 0
    }

    /// Appends the nodes of `other` without removing duplicates.
    pub fn union(mut self, other: Selection<'a>) -> Self {
        self.nodes.extend(other.nodes);
        self
    }

    /// Gets the combined text content of each node in the selection,
    /// including their descendants.
    pub fn text(&self) -> StrTendril {
        let mut s = StrTendril::new();
        for node in self.nodes() {
            s.push_tendril(&node.text());
        }
        s
    }

    /// Gets the specified attribute's value for the first node in the
    /// selection.
    pub fn attr(&self, name: &str) -> Option<&'a str> {
        self.nodes.first().and_then(|node| node.attr(name))
    }

    /// Collects the nodes produced by `candidates` for each selected node
    /// that match `compound`, keeping first occurrences only.
    fn collect<F, I>(&self, compound: &Compound, candidates: F) -> Self
    where
        F: Fn(&Node<'a>) -> I,
        I: IntoIterator<Item = Node<'a>>,
    {
        let mut result = Vec::with_capacity(self.length());
        let mut set = HashSet::with_capacity(self.length());
        let siblings = SiblingCache::default();

        for node in self.nodes() {
            for candidate in candidates(node) {
                if !set.contains(&candidate.id) && compound.matches_with(&candidate, &siblings) {
                    set.insert(candidate.id);
                    result.push(candidate);
                }
            }
        }

        Self { nodes: result }
    }

    /// Searches the whole subtree below each node, in document order.
    pub fn select_descendants(&self, compound: &Compound) -> Self {
        self.collect(compound, |node| node.descendants())
    }

    /// Tests only the immediate children of each node.
    pub fn select_children(&self, compound: &Compound) -> Self {
        self.collect(compound, |node| node.children())
    }

    /// Tests only the next element sibling of each node.
    pub fn select_next_siblings(&self, compound: &Compound) -> Self {
        self.collect(compound, |node| node.next_element_sibling())
    }

    pub fn select_step(&self, combinator: Combinator, compound: &Compound) -> Self {
        match combinator {
            Combinator::Descendant => self.select_descendants(compound),
            Combinator::Child => self.select_children(compound),
            Combinator::NextSibling => self.select_next_siblings(compound),
        }
    }

    /// Folds the chain's steps over this selection, left to right.
    pub fn select_chain(&self, chain: &Chain) -> Self {
        chain
            .steps
            .iter()
            .fold(self.clone(), |selection, step| {
                selection.select_step(step.combinator, &step.compound)
            })
    }
}

pub struct Selections<I> {
    iter: IntoIter<I>,
}

impl<I> Selections<I> {
    fn new(iter: IntoIter<I>) -> Self {
        Self { iter }
    }
}

impl<'a> Iterator for Selections<Node<'a>> {
    type Item = Selection<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        self.iter.next().map(|node| Selection { nodes: vec![node] })
    }
}

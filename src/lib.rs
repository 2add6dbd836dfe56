mod config;
mod display;
mod document;
mod dom_tree;
mod error;
mod matcher;
mod parser;
mod runner;
mod selection;

pub use config::Config;
pub use display::escape_html;
pub use display::Display;
pub use document::Document;
pub use dom_tree::{Element, Node, NodeData, NodeId, NodeRef, Tree};
pub use error::{Error, Result};
pub use matcher::{
    AttrOperator, AttrPredicate, Compound, Formula, Predicate, PseudoClass, SiblingCache,
    SiblingContext,
};
pub use parser::{Chain, Combinator, Step};
pub use runner::{run, Output, Query};
pub use selection::Selection;

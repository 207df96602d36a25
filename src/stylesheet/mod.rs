//! CSS stylesheet front end: tree, parser and printer

pub mod ast;
pub mod parser;
pub mod printer;

pub use ast::{split_selectors, Ancestors, Node, NodeId, NodeKind, Stylesheet};
pub use parser::{parse, Parser};
pub use printer::to_css;

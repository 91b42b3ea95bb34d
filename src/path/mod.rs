//! Path resolution over typed trees.
//!
//! Two strategies address nodes inside a resource:
//!
//! - [`PathEvaluator`]: the path-query capability. The default
//!   [`DottedPathEvaluator`] understands a small, case-sensitive FHIRPath-like
//!   subset and reports a structural location for every match.
//! - [`ReflectiveWalker`]: a schema-driven fallback that resolves segments
//!   case-insensitively, strips type suffixes (`valueQuantity` -> `value`) and
//!   caches every resolution.
//!
//! [`StructureBuilder`] reuses the walker's resolution to create missing
//! intermediate nodes and list slots before a write.

pub mod builder;
pub mod evaluator;
pub mod segment;
pub mod walker;

pub use builder::{CreatePolicy, StructureBuilder, WriteTarget};
pub use evaluator::{DottedPathEvaluator, PathEvaluator, PathMatch};
pub use segment::{PathSegment, split_parent, split_path};
pub use walker::ReflectiveWalker;

use crate::model::{Element, Node, Scalar};

/// Value read from a source path
#[derive(Debug, Clone, PartialEq)]
pub enum Extracted {
    Scalar(Scalar),
    Structured(Element),
    List(Vec<Extracted>),
}

impl Extracted {
    /// Convert one matched node.
    ///
    /// Primitive wrappers yield their scalar and a Quantity yields its `value`.
    /// Empty wrappers yield nothing.
    pub fn from_node(node: &Node) -> Option<Self> {
        match node {
            Node::Scalar(scalar) => Some(Extracted::Scalar(scalar.clone())),
            Node::Primitive(primitive) => primitive.value.clone().map(Extracted::Scalar),
            Node::Element(element) if element.type_name() == "Quantity" => {
                element.scalar("value").cloned().map(Extracted::Scalar)
            }
            Node::Element(element) => Some(Extracted::Structured(element.clone())),
            Node::List(items) => Self::from_nodes(items.iter()),
        }
    }

    /// Convert a set of matches; several convertible matches become a list
    pub fn from_nodes<'a>(nodes: impl IntoIterator<Item = &'a Node>) -> Option<Self> {
        let mut values: Vec<Extracted> = nodes.into_iter().filter_map(Self::from_node).collect();
        match values.len() {
            0 => None,
            1 => values.pop(),
            _ => Some(Extracted::List(values)),
        }
    }

    pub fn is_scalar(&self) -> bool {
        matches!(self, Extracted::Scalar(_))
    }

    /// Short description used in log and error messages
    pub fn describe(&self) -> String {
        match self {
            Extracted::Scalar(scalar) => scalar.kind().to_string(),
            Extracted::Structured(element) => element.type_name().to_string(),
            Extracted::List(items) => format!("list of {}", items.len()),
        }
    }
}

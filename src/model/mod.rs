//! Typed, in-memory representation of a single clinical resource.
//!
//! A resource is a tree of [`Node`]s: structured [`Element`]s (the resource
//! root and complex datatypes), primitive wrappers, bare scalars and lists.
//! Deep copies are plain `Clone`s; a copied tree shares nothing with its source.

pub mod node;
pub mod scalar;

pub use node::{Element, Node, NodeKind, Primitive, PrimitiveKind};
pub use scalar::{Scalar, ScalarKind, parse_date_time};

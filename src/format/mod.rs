//! Wire formats for resources.

pub mod json;

pub use json::JsonFormat;

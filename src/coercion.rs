//! Value conversion into declared property kinds.
//!
//! Scalars convert along a fixed matrix (see [`Scalar::convert`]); primitive
//! wrapper targets use the row of their underlying scalar kind. Structured
//! values are only accepted by a target declaring exactly their type.

use crate::error::{NormalizationError, Result};
use crate::model::{Element, Node, Primitive, PrimitiveKind, Scalar, ScalarKind};
use crate::path::Extracted;
use crate::schema::DeclaredKind;

#[derive(Debug, Clone, Copy, Default)]
pub struct TypeCoercer;

impl TypeCoercer {
    pub fn new() -> Self {
        Self
    }

    /// Convert a single extracted value into a node of the declared kind.
    ///
    /// Lists are rejected here; callers coerce list elements one by one.
    pub fn coerce(&self, value: &Extracted, kind: &DeclaredKind) -> Result<Node> {
        match value {
            Extracted::Scalar(scalar) => self.coerce_scalar(scalar, kind),
            Extracted::Structured(element) => self.coerce_structured(element, kind),
            Extracted::List(items) => Err(NormalizationError::incompatible(format!(
                "a list of {} values cannot be assigned to a single {kind} value",
                items.len()
            ))),
        }
    }

    /// Coerce every element of a list, failing on the first rejection
    pub fn coerce_all(&self, values: &[Extracted], kind: &DeclaredKind) -> Result<Vec<Node>> {
        values.iter().map(|value| self.coerce(value, kind)).collect()
    }

    pub fn accepts(&self, value: &Extracted, kind: &DeclaredKind) -> bool {
        match value {
            Extracted::List(items) => items.iter().all(|item| self.coerce(item, kind).is_ok()),
            single => self.coerce(single, kind).is_ok(),
        }
    }

    pub fn coerce_scalar(&self, scalar: &Scalar, kind: &DeclaredKind) -> Result<Node> {
        let converted = match kind {
            DeclaredKind::Primitive(target) => scalar
                .convert(target.scalar_kind())
                .map(|value| Node::Primitive(Primitive::new(*target, value))),
            DeclaredKind::Scalar(target) => scalar.convert(*target).map(Node::Scalar),
            DeclaredKind::Complex(name) if name == "Quantity" => quantity(scalar),
            DeclaredKind::Complex(_) => None,
            DeclaredKind::Choice(alternatives) => {
                let exact = alternatives.iter().find(|alt| match alt {
                    DeclaredKind::Primitive(target) => target.scalar_kind() == scalar.kind(),
                    DeclaredKind::Scalar(target) => *target == scalar.kind(),
                    _ => false,
                });
                return match exact {
                    Some(alt) => self.coerce_scalar(scalar, alt),
                    None => alternatives
                        .iter()
                        .find_map(|alt| self.coerce_scalar(scalar, alt).ok())
                        .ok_or_else(|| reject_scalar(scalar, kind)),
                };
            }
        };
        converted.ok_or_else(|| reject_scalar(scalar, kind))
    }

    fn coerce_structured(&self, element: &Element, kind: &DeclaredKind) -> Result<Node> {
        let accepted = match kind {
            DeclaredKind::Complex(name) => element.type_name() == name,
            DeclaredKind::Choice(alternatives) => alternatives
                .iter()
                .any(|alt| alt.complex_name() == Some(element.type_name())),
            DeclaredKind::Primitive(_) | DeclaredKind::Scalar(_) => false,
        };
        if accepted {
            Ok(Node::Element(element.clone()))
        } else {
            Err(NormalizationError::incompatible(format!(
                "{} value is not compatible with declared type {kind}",
                element.type_name()
            )))
        }
    }
}

/// Numeric scalars become the `value` of a new Quantity
fn quantity(scalar: &Scalar) -> Option<Node> {
    let value = match scalar {
        Scalar::Integer(_) | Scalar::Decimal(_) => scalar.convert(ScalarKind::Decimal)?,
        _ => return None,
    };
    Some(Node::Element(
        Element::new("Quantity").with("value", Primitive::new(PrimitiveKind::Decimal, value)),
    ))
}

fn reject_scalar(scalar: &Scalar, kind: &DeclaredKind) -> NormalizationError {
    NormalizationError::incompatible(format!(
        "cannot convert {} value '{scalar}' to {kind}",
        scalar.kind()
    ))
}

use tracing::debug;

use super::{CopyLocationOperation, OperationResult};
use crate::model::{Element, Node, Primitive, PrimitiveKind};

/// Mirrors a Location's identifiers into its `type` codes
#[derive(Debug, Clone, Copy, Default)]
pub struct CopyLocationExecutor;

impl CopyLocationExecutor {
    pub fn new() -> Self {
        Self
    }

    pub fn execute(
        &self,
        operation: &CopyLocationOperation,
        mut resource: Node,
    ) -> OperationResult {
        if resource.resource_type() != "Location" {
            return OperationResult::failure("resource must be a Location", Some(resource));
        }
        let Some(location) = resource.as_element_mut() else {
            return OperationResult::failure("resource must be a Location", Some(resource));
        };

        let identifiers: Vec<(Option<String>, Option<String>)> = location
            .get("identifier")
            .and_then(Node::as_list)
            .unwrap_or_default()
            .iter()
            .filter_map(Node::as_element)
            .map(|identifier| {
                (
                    identifier.string("system").map(str::to_string),
                    identifier.string("value").map(str::to_string),
                )
            })
            .collect();

        if !matches!(location.get("type"), Some(Node::List(_))) {
            location.set("type", Node::List(Vec::new()));
        }
        let Some(Node::List(types)) = location.get_mut("type") else {
            return OperationResult::failure("Location.type is not a list", Some(resource));
        };

        let mut added = 0;
        for (system, value) in identifiers {
            let blank = |text: &Option<String>| text.as_deref().is_none_or(|t| t.trim().is_empty());
            if blank(&system) && blank(&value) {
                continue;
            }
            if types
                .iter()
                .any(|concept| has_coding(concept, system.as_deref(), value.as_deref()))
            {
                continue;
            }

            let mut coding = Element::new("Coding");
            if let Some(system) = system {
                coding.set("system", Primitive::new(PrimitiveKind::Uri, system));
            }
            if let Some(value) = value {
                coding.set("code", Primitive::new(PrimitiveKind::Code, value));
            }
            let concept =
                Element::new("CodeableConcept").with("coding", Node::List(vec![coding.into()]));
            types.push(concept.into());
            added += 1;
        }

        debug!(operation = %operation.name, added, "copied location identifiers to type");
        OperationResult::success(resource)
    }
}

fn has_coding(concept: &Node, system: Option<&str>, code: Option<&str>) -> bool {
    concept
        .child("coding")
        .and_then(Node::as_list)
        .unwrap_or_default()
        .iter()
        .filter_map(Node::as_element)
        .any(|coding| coding.string("system") == system && coding.string("code") == code)
}

use tracing::{debug, warn};

use super::context::ExecutionContext;
use super::{CodeMapOperation, OperationResult};
use crate::model::{Element, Node, NodeKind, Primitive, PrimitiveKind};
use crate::path::CreatePolicy;

/// Rewrites codings at a path according to per-system code tables
#[derive(Debug, Clone)]
pub struct CodeMapExecutor {
    ctx: ExecutionContext,
}

impl CodeMapExecutor {
    pub fn new(ctx: ExecutionContext) -> Self {
        Self { ctx }
    }

    pub fn execute(&self, operation: &CodeMapOperation, mut resource: Node) -> OperationResult {
        let name = &operation.name;
        let path = &operation.path;

        if let Err(err) = self.ctx.evaluator.validate(path) {
            warn!(
                operation = %name,
                resource_type = resource.resource_type(),
                error = %err,
                "invalid code map path"
            );
            return OperationResult::from_error(&err, Some(resource));
        }

        let location = match self.ctx.evaluator.evaluate(&resource, path) {
            Ok(matches) => matches.into_iter().next().map(|m| m.location),
            Err(_) => None,
        };
        let target = match location {
            Some(location) => {
                self.ctx
                    .builder
                    .resolve_mut(&mut resource, &location, CreatePolicy::Existing)
            }
            None => self
                .ctx
                .builder
                .resolve_mut(&mut resource, path, CreatePolicy::Existing),
        };

        let Some(node) = target else {
            debug!(operation = %name, path = %path, "code map path matched nothing");
            return OperationResult::success(resource);
        };

        let rewritten = match node.kind() {
            NodeKind::Coding => node.as_element_mut().map_or(0, |coding| {
                usize::from(remap_coding(operation, coding))
            }),
            NodeKind::CodeableConcept => node
                .child_mut("coding")
                .and_then(|codings| match codings {
                    Node::List(items) => Some(items),
                    _ => None,
                })
                .map_or(0, |items| {
                    items
                        .iter_mut()
                        .filter_map(Node::as_element_mut)
                        .map(|coding| remap_coding(operation, coding))
                        .filter(|applied| *applied)
                        .count()
                }),
            other => {
                warn!(
                    operation = %name,
                    path = %path,
                    kind = %other,
                    "code map target is not a Coding or CodeableConcept"
                );
                0
            }
        };

        debug!(operation = %name, path = %path, rewritten, "code map applied");
        OperationResult::success(resource)
    }
}

/// Rewrite one coding in place; returns whether a mapping applied
fn remap_coding(operation: &CodeMapOperation, coding: &mut Element) -> bool {
    let (Some(system), Some(code)) = (coding.string("system"), coding.string("code")) else {
        return false;
    };
    let Some(table) = operation.table_for(system) else {
        return false;
    };
    let Some(mapping) = table.code_maps.get(code) else {
        return false;
    };

    let target_system = table.target_system.clone();
    let mapping = mapping.clone();
    coding.set("system", Primitive::new(PrimitiveKind::Uri, target_system));
    coding.set("code", Primitive::new(PrimitiveKind::Code, mapping.code));
    match mapping.display {
        Some(display) => {
            coding.set("display", Primitive::new(PrimitiveKind::String, display));
        }
        None => {
            coding.remove("display");
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::operations::CodeSystemMap;
    use crate::schema::SchemaRegistry;

    fn coding(system: &str, code: &str, display: Option<&str>) -> Element {
        let coding = Element::new("Coding")
            .with("system", Primitive::new(PrimitiveKind::Uri, system))
            .with("code", Primitive::new(PrimitiveKind::Code, code));
        match display {
            Some(display) => coding.with("display", Primitive::new(PrimitiveKind::String, display)),
            None => coding,
        }
    }

    fn executor() -> CodeMapExecutor {
        CodeMapExecutor::new(ExecutionContext::new(Arc::new(SchemaRegistry::r4())))
    }

    #[test]
    fn test_remap_removes_display_when_unmapped() {
        let operation = CodeMapOperation::new(
            "Encounter.class",
            vec![
                CodeSystemMap::new("http://old", "http://new").with_code("IMP", "inpatient", None),
            ],
        );
        let resource = Node::from(
            Element::resource("Encounter")
                .with("class", coding("http://old", "IMP", Some("Inpatient"))),
        );

        let result = executor().execute(&operation, resource);
        assert!(result.is_success());
        let class = result.resource.unwrap().child("class").cloned().unwrap();
        assert_eq!(class, Node::from(coding("http://new", "inpatient", None)));
    }

    #[test]
    fn test_first_matching_table_wins() {
        let operation = CodeMapOperation::new(
            "Encounter.class",
            vec![
                CodeSystemMap::new("http://old", "http://first").with_code("IMP", "A", None),
                CodeSystemMap::new("http://old", "http://second").with_code("IMP", "B", None),
            ],
        );
        let resource = Node::from(
            Element::resource("Encounter").with("class", coding("http://old", "IMP", None)),
        );

        let result = executor().execute(&operation, resource);
        let class = result.resource.unwrap().child("class").cloned().unwrap();
        assert_eq!(class, Node::from(coding("http://first", "A", None)));
    }

    #[test]
    fn test_other_node_kinds_are_left_alone() {
        let operation = CodeMapOperation::new(
            "Patient.gender",
            vec![CodeSystemMap::new("http://old", "http://new").with_code("female", "F", None)],
        );
        let resource = Node::from(
            Element::resource("Patient")
                .with("gender", Primitive::new(PrimitiveKind::Code, "female")),
        );

        let result = executor().execute(&operation, resource.clone());
        assert!(result.is_success());
        assert_eq!(result.resource, Some(resource));
    }
}

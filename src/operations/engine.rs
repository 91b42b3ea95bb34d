use std::sync::Arc;

use tracing::{debug, instrument};

use super::{
    CodeMapExecutor, ConditionalTransformExecutor, CopyExecutor, CopyLocationExecutor,
    ExecutionContext, Operation, OperationExecutor, OperationResult,
};
use crate::error::{NormalizationError, Result};
use crate::model::Node;
use crate::path::PathEvaluator;
use crate::schema::SchemaRegistry;

/// Dispatches operations to their executors
#[derive(Debug, Clone)]
pub struct NormalizationEngine {
    ctx: ExecutionContext,
    copy: CopyExecutor,
    code_map: CodeMapExecutor,
    conditional: ConditionalTransformExecutor,
    copy_location: CopyLocationExecutor,
}

impl NormalizationEngine {
    pub fn new(schema: Arc<SchemaRegistry>) -> Self {
        Self::from_context(ExecutionContext::new(schema))
    }

    /// Engine over the built-in R4 definitions
    pub fn r4() -> Self {
        Self::new(Arc::new(SchemaRegistry::r4()))
    }

    pub fn with_evaluator(schema: Arc<SchemaRegistry>, evaluator: Arc<dyn PathEvaluator>) -> Self {
        Self::from_context(ExecutionContext::with_evaluator(schema, evaluator))
    }

    pub fn from_context(ctx: ExecutionContext) -> Self {
        Self {
            copy: CopyExecutor::new(ctx.clone()),
            code_map: CodeMapExecutor::new(ctx.clone()),
            conditional: ConditionalTransformExecutor::new(ctx.clone()),
            copy_location: CopyLocationExecutor::new(),
            ctx,
        }
    }

    pub fn context(&self) -> &ExecutionContext {
        &self.ctx
    }

    pub fn schema(&self) -> &Arc<SchemaRegistry> {
        &self.ctx.schema
    }

    /// Validate and run `operation` synchronously on a deep copy of `resource`
    pub fn apply(&self, operation: &Operation, resource: &Node) -> OperationResult {
        if let Err(err) = self.validate(operation, resource) {
            return OperationResult::from_error(&err, None);
        }
        self.execute(operation, resource.clone())
    }
}

impl OperationExecutor for NormalizationEngine {
    /// Operation shape plus a registered resource root
    fn validate(&self, operation: &Operation, resource: &Node) -> Result<()> {
        operation.validate()?;
        match resource.as_element() {
            Some(root)
                if root.is_resource() && self.ctx.schema.is_resource_type(root.type_name()) =>
            {
                Ok(())
            }
            _ => Err(NormalizationError::input(format!(
                "resource root must be a registered resource type, found {}",
                resource.type_name()
            ))),
        }
    }

    #[instrument(
        level = "debug",
        skip_all,
        fields(operation = %operation, resource_type = resource.resource_type())
    )]
    fn execute(&self, operation: &Operation, resource: Node) -> OperationResult {
        let result = match operation {
            Operation::Copy(op) => self.copy.execute(op, resource),
            Operation::CodeMap(op) => self.code_map.execute(op, resource),
            Operation::ConditionalTransform(op) => self.conditional.execute(op, resource),
            Operation::CopyLocation(op) => self.copy_location.execute(op, resource),
        };
        debug!(status = ?result.status, "operation executed");
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Element, Primitive, PrimitiveKind};
    use crate::operations::CopyOperation;

    #[test]
    fn test_apply_leaves_input_untouched() {
        let engine = NormalizationEngine::r4();
        let resource = Node::from(
            Element::resource("Patient")
                .with("gender", Primitive::new(PrimitiveKind::Code, "female")),
        );
        let before = resource.clone();

        let result = engine.apply(
            &CopyOperation::new("Patient.gender", "Patient.extension[0].genderIdentity").into(),
            &resource,
        );
        assert!(result.is_success(), "{:?}", result.error_message);
        assert_eq!(resource, before);
    }

    #[test]
    fn test_unregistered_root_is_rejected() {
        let engine = NormalizationEngine::r4();
        let result = engine.apply(
            &CopyOperation::new("a", "b").into(),
            &Node::from(Element::new("Coding")),
        );
        assert!(!result.is_success());
        assert!(result.error_message.unwrap().contains("registered resource type"));
        assert!(result.resource.is_none());
    }
}

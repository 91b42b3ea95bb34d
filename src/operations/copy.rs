use tracing::{debug, warn};

use super::context::ExecutionContext;
use super::setter::set_value;
use super::{CopyOperation, OperationResult};
use crate::error::NormalizationError;
use crate::model::Node;
use crate::path::Extracted;

/// Classification of an extracted source value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SourceClass {
    Scalar,
    Structured,
}

fn classify(value: &Extracted) -> Option<SourceClass> {
    match value {
        Extracted::Scalar(_) => Some(SourceClass::Scalar),
        Extracted::Structured(_) => Some(SourceClass::Structured),
        Extracted::List(items) => {
            if items.iter().all(|item| matches!(item, Extracted::Scalar(_))) {
                Some(SourceClass::Scalar)
            } else if items.iter().all(|item| matches!(item, Extracted::Structured(_))) {
                Some(SourceClass::Structured)
            } else {
                None
            }
        }
    }
}

/// Copies the value at a source path to a target path
#[derive(Debug, Clone)]
pub struct CopyExecutor {
    ctx: ExecutionContext,
}

impl CopyExecutor {
    pub fn new(ctx: ExecutionContext) -> Self {
        Self { ctx }
    }

    /// Run the copy chain on `resource`, which the caller has already
    /// deep-copied
    pub fn execute(&self, operation: &CopyOperation, mut resource: Node) -> OperationResult {
        let resource_type = resource.resource_type().to_string();
        let CopyOperation {
            name,
            source_path,
            target_path,
            ..
        } = operation;

        for path in [source_path, target_path] {
            if let Err(err) = self.ctx.evaluator.validate(path) {
                warn!(operation = %name, %resource_type, error = %err, "invalid copy path");
                return OperationResult::from_error(&err, Some(resource));
            }
        }

        let Some((value, strategy)) = self.ctx.extract(&resource, source_path) else {
            let err = NormalizationError::Extraction {
                path: source_path.clone(),
                resource_type,
            };
            warn!(operation = %name, error = %err, "copy source extraction failed");
            return OperationResult::from_error(&err, Some(resource));
        };
        debug!(
            operation = %name,
            source_path = %source_path,
            ?strategy,
            value = %value.describe(),
            "extracted copy source"
        );

        let Some(class) = classify(&value) else {
            let message =
                format!("source type not supported at source path '{source_path}': mixed list");
            warn!(operation = %name, %resource_type, "{message}");
            return OperationResult::failure(message, Some(resource));
        };

        if class == SourceClass::Structured {
            if let Some(property) = self.ctx.walker.declared_property(&resource_type, target_path) {
                if !self.ctx.coercer.accepts(&value, &property.kind) {
                    let err = NormalizationError::incompatible(format!(
                        "target property '{}' of type {} cannot accept source value of type {} \
                         for path '{target_path}'",
                        property.name,
                        property.kind,
                        value.describe()
                    ));
                    warn!(
                        operation = %name,
                        %resource_type,
                        error = %err,
                        "copy target incompatible"
                    );
                    return OperationResult::from_error(&err, Some(resource));
                }
            }
        }

        match set_value(&self.ctx, &mut resource, target_path, &value) {
            Ok(stage) => {
                debug!(operation = %name, target_path = %target_path, ?stage, "copy written");
                OperationResult::success(resource)
            }
            Err(err) => {
                warn!(operation = %name, %resource_type, error = %err, "copy target not written");
                OperationResult::from_error(&err, Some(resource))
            }
        }
    }
}

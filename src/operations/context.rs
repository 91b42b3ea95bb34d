use std::sync::Arc;

use tracing::debug;

use crate::coercion::TypeCoercer;
use crate::model::Node;
use crate::path::{
    DottedPathEvaluator, Extracted, PathEvaluator, ReflectiveWalker, StructureBuilder,
};
use crate::schema::SchemaRegistry;

/// Which strategy produced an extracted value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionStrategy {
    PathEvaluator,
    Reflective,
}

/// Collaborators shared by every executor
#[derive(Clone)]
pub struct ExecutionContext {
    pub schema: Arc<SchemaRegistry>,
    pub evaluator: Arc<dyn PathEvaluator>,
    pub walker: Arc<ReflectiveWalker>,
    pub builder: StructureBuilder,
    pub coercer: TypeCoercer,
}

impl ExecutionContext {
    pub fn new(schema: Arc<SchemaRegistry>) -> Self {
        Self::with_evaluator(schema, Arc::new(DottedPathEvaluator::new()))
    }

    pub fn with_evaluator(schema: Arc<SchemaRegistry>, evaluator: Arc<dyn PathEvaluator>) -> Self {
        let walker = Arc::new(ReflectiveWalker::new(schema.clone()));
        Self {
            builder: StructureBuilder::new(walker.clone()),
            schema,
            evaluator,
            walker,
            coercer: TypeCoercer::new(),
        }
    }

    /// Read `path` through the evaluator, falling back to the walker when it
    /// matches nothing convertible or rejects the expression
    pub fn extract(&self, root: &Node, path: &str) -> Option<(Extracted, ExtractionStrategy)> {
        match self.evaluator.evaluate(root, path) {
            Ok(matches) => {
                if let Some(value) = Extracted::from_nodes(matches.iter().map(|m| m.node)) {
                    return Some((value, ExtractionStrategy::PathEvaluator));
                }
                debug!(path, "path evaluator found no convertible value");
            }
            Err(err) => debug!(path, error = %err, "path evaluator failed"),
        }

        self.walker
            .extract(root, path)
            .map(|value| (value, ExtractionStrategy::Reflective))
    }

    /// Whether `path` addresses at least one node
    pub fn exists(&self, root: &Node, path: &str) -> bool {
        match self.evaluator.evaluate(root, path) {
            Ok(matches) if !matches.is_empty() => true,
            _ => self.walker.extract(root, path).is_some(),
        }
    }
}

impl std::fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("types", &self.schema.len())
            .field("walker", &self.walker)
            .finish_non_exhaustive()
    }
}

//! # OctoFHIR Normalize
//!
//! An execution engine for declarative, path-addressed transformations of
//! clinical resources.
//!
//! ## Features
//!
//! - **Operations**: copy a value between paths, remap codings through
//!   code-system tables, write a literal when conditions hold, mirror
//!   Location identifiers into type codes
//! - **Two-strategy paths**: a FHIRPath-like evaluator with a schema-driven
//!   reflective fallback that tolerates case and type-suffix differences
//! - **Structure building**: missing intermediate nodes and list slots are
//!   created on write
//! - **Asynchronous queue**: bounded, FIFO, single worker, per-request
//!   timeouts and back-pressure
//!
//! ## Quick Start
//!
//! ```rust
//! use octofhir_normalize::*;
//! use octofhir_normalize::model::{Primitive, PrimitiveKind};
//!
//! let engine = NormalizationEngine::r4();
//! let patient = Node::from(
//!     Element::resource("Patient").with("gender", Primitive::new(PrimitiveKind::Code, "female")),
//! );
//! let copy = Operation::from(CopyOperation::new(
//!     "Patient.gender",
//!     "Patient.extension[0].genderIdentity",
//! ));
//!
//! let result = engine.apply(&copy, &patient);
//! assert!(result.is_success());
//! assert!(patient.child("extension").is_none());
//! ```

pub mod coercion;
pub mod config;
pub mod error;
pub mod format;
pub mod model;
pub mod operations;
pub mod path;
pub mod queue;
pub mod schema;

pub use coercion::TypeCoercer;
pub use config::{NormalizationConfig, QueueConfig};
pub use error::{NormalizationError, Result};
pub use format::JsonFormat;
pub use model::{Element, Node, NodeKind, Scalar, ScalarKind};
pub use operations::{
    CodeMapOperation, CodeMapping, CodeSystemMap, Condition, ConditionOperator,
    ConditionalTransformOperation, CopyLocationOperation, CopyOperation, NormalizationEngine,
    Operation, OperationExecutor, OperationResult, OperationStatus,
};
pub use path::{DottedPathEvaluator, Extracted, PathEvaluator, ReflectiveWalker, StructureBuilder};
pub use queue::{OperationHandle, OperationQueue, QueueMetricsSnapshot, WorkerState};
pub use schema::SchemaRegistry;

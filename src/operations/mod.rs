//! Operation descriptors, results and executors.
//!
//! An [`Operation`] is an immutable, serde-tagged descriptor. Executors are pure
//! functions from `(operation, resource)` to an [`OperationResult`]: they work
//! on a deep copy and never alter the caller's tree.

pub mod code_map;
pub mod conditional;
pub mod context;
pub mod copy;
pub mod copy_location;
pub mod engine;
pub mod setter;

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{NormalizationError, Result};
use crate::model::Node;

pub use code_map::CodeMapExecutor;
pub use conditional::ConditionalTransformExecutor;
pub use context::{ExecutionContext, ExtractionStrategy};
pub use copy::CopyExecutor;
pub use copy_location::CopyLocationExecutor;
pub use engine::NormalizationEngine;
pub use setter::SetStage;

/// A declarative, path-addressed transformation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "operationType")]
pub enum Operation {
    CodeMap(CodeMapOperation),
    #[serde(alias = "CopyProperty")]
    Copy(CopyOperation),
    ConditionalTransform(ConditionalTransformOperation),
    CopyLocation(CopyLocationOperation),
}

impl Operation {
    pub fn name(&self) -> &str {
        match self {
            Operation::CodeMap(op) => &op.name,
            Operation::Copy(op) => &op.name,
            Operation::ConditionalTransform(op) => &op.name,
            Operation::CopyLocation(op) => &op.name,
        }
    }

    pub fn description(&self) -> Option<&str> {
        match self {
            Operation::CodeMap(op) => op.description.as_deref(),
            Operation::Copy(op) => op.description.as_deref(),
            Operation::ConditionalTransform(op) => op.description.as_deref(),
            Operation::CopyLocation(op) => op.description.as_deref(),
        }
    }

    /// Variant label, also used as the default name
    pub fn kind(&self) -> &'static str {
        match self {
            Operation::CodeMap(_) => CODE_MAP,
            Operation::Copy(_) => COPY,
            Operation::ConditionalTransform(_) => CONDITIONAL_TRANSFORM,
            Operation::CopyLocation(_) => COPY_LOCATION,
        }
    }

    /// Shape checks applied before an operation is queued
    pub fn validate(&self) -> Result<()> {
        if self.name().trim().is_empty() {
            return Err(NormalizationError::input("operation name cannot be blank"));
        }
        match self {
            Operation::CodeMap(op) => op.validate(),
            Operation::Copy(op) => op.validate(),
            Operation::ConditionalTransform(op) => op.validate(),
            Operation::CopyLocation(_) => Ok(()),
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} '{}'", self.kind(), self.name())
    }
}

impl From<CodeMapOperation> for Operation {
    fn from(value: CodeMapOperation) -> Self {
        Operation::CodeMap(value)
    }
}

impl From<CopyOperation> for Operation {
    fn from(value: CopyOperation) -> Self {
        Operation::Copy(value)
    }
}

impl From<ConditionalTransformOperation> for Operation {
    fn from(value: ConditionalTransformOperation) -> Self {
        Operation::ConditionalTransform(value)
    }
}

impl From<CopyLocationOperation> for Operation {
    fn from(value: CopyLocationOperation) -> Self {
        Operation::CopyLocation(value)
    }
}

const CODE_MAP: &str = "CodeMap";
const COPY: &str = "Copy";
const CONDITIONAL_TRANSFORM: &str = "ConditionalTransform";
const COPY_LOCATION: &str = "CopyLocation";

fn default_code_map_name() -> String {
    CODE_MAP.to_string()
}

fn default_copy_name() -> String {
    COPY.to_string()
}

fn default_conditional_name() -> String {
    CONDITIONAL_TRANSFORM.to_string()
}

fn default_copy_location_name() -> String {
    COPY_LOCATION.to_string()
}

fn require(value: &str, field: &str) -> Result<()> {
    if value.trim().is_empty() {
        Err(NormalizationError::input(format!("{field} cannot be blank")))
    } else {
        Ok(())
    }
}

/// Rewrites coding system/code/display pairs at `path`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeMapOperation {
    #[serde(default = "default_code_map_name")]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub path: String,
    #[serde(default)]
    pub code_system_maps: Vec<CodeSystemMap>,
}

impl CodeMapOperation {
    pub fn new(path: impl Into<String>, code_system_maps: Vec<CodeSystemMap>) -> Self {
        Self {
            name: default_code_map_name(),
            description: None,
            path: path.into(),
            code_system_maps,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// First table whose source system matches
    pub fn table_for(&self, system: &str) -> Option<&CodeSystemMap> {
        self.code_system_maps
            .iter()
            .find(|map| map.source_system == system)
    }

    fn validate(&self) -> Result<()> {
        require(&self.path, "path")?;
        if self.code_system_maps.is_empty() {
            return Err(NormalizationError::input(
                "code map operation requires at least one code system map",
            ));
        }
        for map in &self.code_system_maps {
            require(&map.source_system, "sourceSystem")?;
            require(&map.target_system, "targetSystem")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeSystemMap {
    pub source_system: String,
    pub target_system: String,
    #[serde(default)]
    pub code_maps: BTreeMap<String, CodeMapping>,
}

impl CodeSystemMap {
    pub fn new(source_system: impl Into<String>, target_system: impl Into<String>) -> Self {
        Self {
            source_system: source_system.into(),
            target_system: target_system.into(),
            code_maps: BTreeMap::new(),
        }
    }

    pub fn with_code(
        mut self,
        source_code: impl Into<String>,
        code: impl Into<String>,
        display: Option<&str>,
    ) -> Self {
        self.code_maps.insert(
            source_code.into(),
            CodeMapping {
                code: code.into(),
                display: display.map(str::to_string),
            },
        );
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeMapping {
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
}

/// Copies the value at `source_path` to `target_path`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CopyOperation {
    #[serde(default = "default_copy_name")]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub source_path: String,
    pub target_path: String,
}

impl CopyOperation {
    pub fn new(source_path: impl Into<String>, target_path: impl Into<String>) -> Self {
        Self {
            name: default_copy_name(),
            description: None,
            source_path: source_path.into(),
            target_path: target_path.into(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    fn validate(&self) -> Result<()> {
        require(&self.source_path, "sourcePath")?;
        require(&self.target_path, "targetPath")
    }
}

/// Writes `target_value` to `target_path` when every condition holds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionalTransformOperation {
    #[serde(default = "default_conditional_name")]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub conditions: Vec<Condition>,
    pub target_path: String,
    pub target_value: Value,
}

impl ConditionalTransformOperation {
    pub fn new(target_path: impl Into<String>, target_value: impl Into<Value>) -> Self {
        Self {
            name: default_conditional_name(),
            description: None,
            conditions: Vec::new(),
            target_path: target_path.into(),
            target_value: target_value.into(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    fn validate(&self) -> Result<()> {
        require(&self.target_path, "targetPath")?;
        for condition in &self.conditions {
            require(&condition.source_path, "condition sourcePath")?;
            if condition.operator.compares() && condition.value.is_none() {
                return Err(NormalizationError::input(format!(
                    "condition on '{}' with operator {:?} requires a value",
                    condition.source_path, condition.operator
                )));
            }
        }
        match &self.target_value {
            Value::Null | Value::Object(_) => Err(NormalizationError::input(
                "targetValue must be a string, number, boolean or an array of them",
            )),
            Value::Array(items)
                if items
                    .iter()
                    .any(|v| v.is_array() || v.is_object() || v.is_null()) =>
            {
                Err(NormalizationError::input(
                    "targetValue arrays may only hold strings, numbers and booleans",
                ))
            }
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    pub source_path: String,
    pub operator: ConditionOperator,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

impl Condition {
    pub fn new(
        source_path: impl Into<String>,
        operator: ConditionOperator,
        value: Option<Value>,
    ) -> Self {
        Self {
            source_path: source_path.into(),
            operator,
            value,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConditionOperator {
    Equal,
    NotEqual,
    GreaterThan,
    GreaterThanOrEqual,
    LessThan,
    LessThanOrEqual,
    Exists,
    NotExists,
}

impl ConditionOperator {
    /// Whether the operator compares against a condition value
    pub fn compares(self) -> bool {
        !matches!(self, ConditionOperator::Exists | ConditionOperator::NotExists)
    }
}

/// Adds each Location identifier as a `type` code
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CopyLocationOperation {
    #[serde(default = "default_copy_location_name")]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Default for CopyLocationOperation {
    fn default() -> Self {
        Self {
            name: default_copy_location_name(),
            description: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationStatus {
    Success,
    Failure,
}

/// Outcome of one executor invocation
#[derive(Debug, Clone, PartialEq)]
pub struct OperationResult {
    pub status: OperationStatus,
    pub resource: Option<Node>,
    pub error_message: Option<String>,
}

impl OperationResult {
    pub fn success(resource: Node) -> Self {
        Self {
            status: OperationStatus::Success,
            resource: Some(resource),
            error_message: None,
        }
    }

    pub fn failure(message: impl Into<String>, resource: Option<Node>) -> Self {
        Self {
            status: OperationStatus::Failure,
            resource,
            error_message: Some(message.into()),
        }
    }

    pub fn from_error(error: &NormalizationError, resource: Option<Node>) -> Self {
        Self::failure(error.to_string(), resource)
    }

    pub fn is_success(&self) -> bool {
        self.status == OperationStatus::Success
    }
}

/// Executes operations; implemented by [`NormalizationEngine`] and consumed by
/// the queue worker
pub trait OperationExecutor: Send + Sync + 'static {
    /// Shape checks run synchronously at enqueue time
    fn validate(&self, operation: &Operation, _resource: &Node) -> Result<()> {
        operation.validate()
    }

    fn execute(&self, operation: &Operation, resource: Node) -> OperationResult;
}

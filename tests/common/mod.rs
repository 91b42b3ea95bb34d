use std::sync::{Arc, Mutex};
use std::time::Duration;

use octofhir_normalize::model::{Primitive, PrimitiveKind};
use octofhir_normalize::*;

#[allow(dead_code)]
pub fn patient_with_gender(gender: &str) -> Node {
    Node::from(
        Element::resource("Patient").with("gender", Primitive::new(PrimitiveKind::Code, gender)),
    )
}

#[allow(dead_code)]
pub fn coding(system: &str, code: &str, display: Option<&str>) -> Element {
    let coding = Element::new("Coding")
        .with("system", Primitive::new(PrimitiveKind::Uri, system))
        .with("code", Primitive::new(PrimitiveKind::Code, code));
    match display {
        Some(display) => coding.with("display", Primitive::new(PrimitiveKind::String, display)),
        None => coding,
    }
}

#[allow(dead_code)]
pub fn observation_with_code(system: &str, code: &str) -> Node {
    Node::from(
        Element::resource("Observation")
            .with("status", Primitive::new(PrimitiveKind::Code, "final"))
            .with(
                "code",
                Element::new("CodeableConcept")
                    .with("coding", Node::List(vec![coding(system, code, None).into()])),
            ),
    )
}

/// `(system, code, display)` of the first coding under `property`
#[allow(dead_code)]
pub fn first_coding(resource: &Node, property: &str) -> (String, String, Option<String>) {
    let coding = resource
        .child(property)
        .and_then(|concept| concept.child("coding"))
        .and_then(|codings| codings.child_at(0))
        .and_then(Node::as_element)
        .expect("resource has a coding");
    (
        coding.string("system").unwrap_or_default().to_string(),
        coding.string("code").unwrap_or_default().to_string(),
        coding.string("display").map(str::to_string),
    )
}

#[allow(dead_code)]
pub fn old_to_new_system() -> CodeSystemMap {
    CodeSystemMap::new("http://old-system", "http://new-system").with_code(
        "A1",
        "B1",
        Some("Positive"),
    )
}

/// Executor that holds the worker for a fixed time before succeeding
#[allow(dead_code)]
pub struct BlockingExecutor {
    pub delay: Duration,
}

impl OperationExecutor for BlockingExecutor {
    fn execute(&self, _operation: &Operation, resource: Node) -> OperationResult {
        std::thread::sleep(self.delay);
        OperationResult::success(resource)
    }
}

#[allow(dead_code)]
pub struct PanickingExecutor;

impl OperationExecutor for PanickingExecutor {
    fn execute(&self, _operation: &Operation, _resource: Node) -> OperationResult {
        panic!("executor exploded");
    }
}

/// Records operation names in execution order
#[allow(dead_code)]
#[derive(Default)]
pub struct RecordingExecutor {
    pub seen: Arc<Mutex<Vec<String>>>,
}

impl OperationExecutor for RecordingExecutor {
    fn execute(&self, operation: &Operation, resource: Node) -> OperationResult {
        self.seen.lock().unwrap().push(operation.name().to_string());
        OperationResult::success(resource)
    }
}

#[allow(dead_code)]
pub fn named_copy(name: &str) -> Operation {
    Operation::from(
        CopyOperation::new("Patient.gender", "Patient.extension[0].genderIdentity")
            .with_name(name),
    )
}

#[allow(dead_code)]
pub fn fast_queue_config() -> QueueConfig {
    QueueConfig::default().with_idle_interval(Duration::from_millis(10))
}

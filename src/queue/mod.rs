//! Asynchronous operation queue.
//!
//! Producers call [`OperationQueue::enqueue`] from any task; a single
//! background worker drains the bounded channel in FIFO batches and runs
//! each operation on the blocking pool, one at a time. Every request gets
//! its own `oneshot` reply channel wrapped in an [`OperationHandle`].
//!
//! ```no_run
//! # async fn demo() -> octofhir_normalize::Result<()> {
//! use octofhir_normalize::{Element, Node, NormalizationEngine, OperationQueue, QueueConfig};
//! use octofhir_normalize::model::{Primitive, PrimitiveKind};
//!
//! let queue = OperationQueue::with_engine(NormalizationEngine::r4(), QueueConfig::default())?;
//! let patient = Node::from(
//!     Element::resource("Patient").with("gender", Primitive::new(PrimitiveKind::Code, "female")),
//! );
//! let result = queue
//!     .enqueue_copy_operation("Patient.gender", "Patient.extension[0].genderIdentity", patient)
//!     .await;
//! assert!(result.is_success());
//! queue.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod handle;
pub mod metrics;

use std::sync::Arc;
use std::time::Instant;

use serde::Deserialize;
use serde_json::Value;
use tokio::sync::mpsc::error::{TryRecvError, TrySendError};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::{JoinError, JoinHandle};
use tracing::{Instrument, debug, error, info, info_span, warn};
use uuid::Uuid;

pub use handle::OperationHandle;
pub use metrics::{QueueMetrics, QueueMetricsSnapshot};

use crate::config::QueueConfig;
use crate::error::{NormalizationError, Result};
use crate::format::JsonFormat;
use crate::model::Node;
use crate::operations::{
    CodeMapOperation, CodeSystemMap, Condition, ConditionalTransformOperation, CopyOperation,
    NormalizationEngine, Operation, OperationExecutor, OperationResult,
};

/// Worker lifecycle as seen through the watch channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Running,
    Paused,
    Stopping,
}

struct PendingRequest {
    id: Uuid,
    operation: Arc<Operation>,
    resource: Arc<Node>,
    responder: oneshot::Sender<OperationResult>,
    enqueued_at: Instant,
}

pub struct OperationQueue {
    sender: mpsc::Sender<PendingRequest>,
    state: watch::Sender<WorkerState>,
    metrics: Arc<QueueMetrics>,
    config: QueueConfig,
    executor: Arc<dyn OperationExecutor>,
    worker: Option<JoinHandle<()>>,
    format: Option<JsonFormat>,
}

impl OperationQueue {
    /// Start the background worker. Must be called within a Tokio runtime.
    pub fn spawn(executor: Arc<dyn OperationExecutor>, config: QueueConfig) -> Result<Self> {
        config.validate()?;

        let (sender, receiver) = mpsc::channel(config.capacity);
        let (state, state_rx) = watch::channel(WorkerState::Running);
        let metrics = Arc::new(QueueMetrics::default());

        let worker = tokio::spawn(run_worker(
            receiver,
            state_rx,
            Arc::clone(&executor),
            Arc::clone(&metrics),
            config.clone(),
        ));

        Ok(Self {
            sender,
            state,
            metrics,
            config,
            executor,
            worker: Some(worker),
            format: None,
        })
    }

    /// Queue over `engine`, with JSON input enabled for the engine's schema
    pub fn with_engine(engine: NormalizationEngine, config: QueueConfig) -> Result<Self> {
        let format = JsonFormat::new(Arc::clone(engine.schema()));
        Ok(Self::spawn(Arc::new(engine), config)?.with_json_format(format))
    }

    pub fn with_json_format(mut self, format: JsonFormat) -> Self {
        self.format = Some(format);
        self
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    pub fn metrics(&self) -> Arc<QueueMetrics> {
        Arc::clone(&self.metrics)
    }

    pub fn state(&self) -> WorkerState {
        *self.state.borrow()
    }

    /// Stop draining at the next tick; queued items stay queued
    pub fn pause(&self) {
        self.state.send_replace(WorkerState::Paused);
        info!("operation queue paused");
    }

    pub fn resume(&self) {
        self.state.send_replace(WorkerState::Running);
        info!("operation queue resumed");
    }

    /// Stop the worker after its current batch and wait for it.
    ///
    /// Requests still queued are dropped; their handles resolve to a failure.
    pub async fn shutdown(mut self) {
        self.state.send_replace(WorkerState::Stopping);
        if let Some(worker) = self.worker.take() {
            if let Err(e) = worker.await {
                error!(error = %e, "operation worker join error");
            }
        }
    }

    /// Validate and queue `operation` against a snapshot of `resource`.
    ///
    /// Never blocks. Malformed input and a full queue resolve immediately
    /// to a failure.
    pub fn enqueue(
        &self,
        operation: impl Into<Arc<Operation>>,
        resource: impl Into<Arc<Node>>,
    ) -> OperationHandle {
        let operation = operation.into();
        let resource = resource.into();
        let name = operation.name().to_string();

        if let Err(err) = self.executor.validate(&operation, &resource) {
            self.metrics.record_rejected();
            debug!(operation = %name, error = %err, "operation rejected");
            return OperationHandle::ready(name, OperationResult::from_error(&err, None));
        }

        let id = Uuid::new_v4();
        let (responder, receiver) = oneshot::channel();
        let request = PendingRequest {
            id,
            operation,
            resource,
            responder,
            enqueued_at: Instant::now(),
        };

        match self.sender.try_send(request) {
            Ok(()) => {
                self.metrics.record_enqueued();
                debug!(%id, operation = %name, "operation enqueued");
                OperationHandle::pending(id, name, self.config.operation_timeout, receiver)
            }
            Err(TrySendError::Full(_)) => {
                self.metrics.record_rejected();
                warn!(
                    operation = %name,
                    capacity = self.config.capacity,
                    "operation queue is full"
                );
                OperationHandle::ready(
                    name,
                    OperationResult::failure("operation queue is full", None),
                )
            }
            Err(TrySendError::Closed(_)) => {
                self.metrics.record_rejected();
                OperationHandle::ready(
                    name,
                    OperationResult::failure("operation queue is shut down", None),
                )
            }
        }
    }

    pub fn enqueue_copy_operation(
        &self,
        source_path: impl Into<String>,
        target_path: impl Into<String>,
        resource: impl Into<Arc<Node>>,
    ) -> OperationHandle {
        self.enqueue(
            Operation::from(CopyOperation::new(source_path, target_path)),
            resource,
        )
    }

    pub fn enqueue_code_map_operation(
        &self,
        path: impl Into<String>,
        code_system_maps: Vec<CodeSystemMap>,
        resource: impl Into<Arc<Node>>,
    ) -> OperationHandle {
        self.enqueue(
            Operation::from(CodeMapOperation::new(path, code_system_maps)),
            resource,
        )
    }

    pub fn enqueue_conditional_transform(
        &self,
        conditions: Vec<Condition>,
        target_path: impl Into<String>,
        target_value: impl Into<Value>,
        resource: impl Into<Arc<Node>>,
    ) -> OperationHandle {
        let operation = conditions.into_iter().fold(
            ConditionalTransformOperation::new(target_path, target_value),
            ConditionalTransformOperation::with_condition,
        );
        self.enqueue(Operation::from(operation), resource)
    }

    /// Queue an operation descriptor and a resource given as JSON
    pub fn enqueue_json(&self, operation: &Value, resource: &Value) -> OperationHandle {
        match self.decode_json(operation, resource) {
            Ok((operation, resource)) => self.enqueue(operation, resource),
            Err((name, err)) => {
                self.metrics.record_rejected();
                debug!(operation = %name, error = %err, "JSON input rejected");
                OperationHandle::ready(name, OperationResult::from_error(&err, None))
            }
        }
    }

    fn decode_json(
        &self,
        operation: &Value,
        resource: &Value,
    ) -> std::result::Result<(Operation, Node), (String, NormalizationError)> {
        let unnamed = || "unnamed".to_string();
        if operation.is_null() {
            return Err((unnamed(), NormalizationError::input("operation cannot be null")));
        }
        let operation: Operation = Operation::deserialize(operation)
            .map_err(|e| (unnamed(), NormalizationError::from(e)))?;
        let name = operation.name().to_string();

        if resource.is_null() {
            return Err((name, NormalizationError::input("resource cannot be null")));
        }
        let format = self.format.as_ref().ok_or_else(|| {
            (
                name.clone(),
                NormalizationError::input("JSON input requires a configured JSON format"),
            )
        })?;
        let resource = format.parse(resource).map_err(|e| (name, e))?;
        Ok((operation, resource))
    }
}

impl std::fmt::Debug for OperationQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperationQueue")
            .field("config", &self.config)
            .field("state", &self.state())
            .field("metrics", &self.metrics.snapshot())
            .finish_non_exhaustive()
    }
}

async fn run_worker(
    mut receiver: mpsc::Receiver<PendingRequest>,
    mut state: watch::Receiver<WorkerState>,
    executor: Arc<dyn OperationExecutor>,
    metrics: Arc<QueueMetrics>,
    config: QueueConfig,
) {
    info!(
        batch_size = config.batch_size,
        capacity = config.capacity,
        "operation worker started"
    );
    // Set once the queue itself is gone; the worker then drains and exits.
    let mut detached = false;

    loop {
        let current = *state.borrow_and_update();
        match current {
            WorkerState::Stopping => break,
            WorkerState::Paused if !detached => {
                if state.changed().await.is_err() {
                    detached = true;
                }
                continue;
            }
            _ => {}
        }

        let mut batch = Vec::with_capacity(config.batch_size);
        let mut disconnected = false;
        while batch.len() < config.batch_size {
            match receiver.try_recv() {
                Ok(request) => batch.push(request),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    disconnected = true;
                    break;
                }
            }
        }

        if batch.is_empty() {
            if disconnected {
                break;
            }
            if detached {
                tokio::time::sleep(config.idle_interval).await;
                continue;
            }
            tokio::select! {
                _ = tokio::time::sleep(config.idle_interval) => {}
                changed = state.changed() => {
                    if changed.is_err() {
                        detached = true;
                    }
                }
            }
            continue;
        }

        metrics.record_batch();
        debug!(batch = batch.len(), "draining operations");
        for request in batch {
            process(request, &executor, &metrics).await;
        }
    }

    info!(metrics = ?metrics.snapshot(), "operation worker stopped");
}

async fn process(
    request: PendingRequest,
    executor: &Arc<dyn OperationExecutor>,
    metrics: &QueueMetrics,
) {
    let PendingRequest {
        id,
        operation,
        resource,
        responder,
        enqueued_at,
    } = request;

    let span = info_span!(
        "operation",
        %id,
        operation = %operation.name(),
        resource_type = resource.resource_type()
    );

    async move {
        let waited = enqueued_at.elapsed();
        let task = {
            let executor = Arc::clone(executor);
            let operation = Arc::clone(&operation);
            let resource = Arc::clone(&resource);
            move || executor.execute(&operation, (*resource).clone())
        };

        let result = match tokio::task::spawn_blocking(task).await {
            Ok(result) => result,
            Err(join_error) => {
                let err = NormalizationError::Unexpected {
                    operation: operation.name().to_string(),
                    resource_type: resource.resource_type().to_string(),
                    message: panic_message(join_error),
                };
                error!(error = %err, "executor panicked");
                OperationResult::from_error(&err, None)
            }
        };

        metrics.record_processed(result.is_success());
        match &result.error_message {
            Some(message) => warn!(error = %message, ?waited, "operation failed"),
            None => debug!(?waited, "operation succeeded"),
        }

        if responder.send(result).is_err() {
            metrics.record_discarded();
            debug!("caller no longer waiting; result discarded");
        }
    }
    .instrument(span)
    .await
}

fn panic_message(err: JoinError) -> String {
    match err.try_into_panic() {
        Ok(payload) => payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "executor panicked".to_string()),
        Err(err) => err.to_string(),
    }
}

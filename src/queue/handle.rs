use std::future::IntoFuture;
use std::time::Duration;

use futures::future::BoxFuture;
use tokio::sync::oneshot;
use tracing::warn;
use uuid::Uuid;

use crate::error::NormalizationError;
use crate::operations::OperationResult;

enum HandleState {
    Pending(oneshot::Receiver<OperationResult>),
    Ready(OperationResult),
}

/// Caller side of one queued request.
///
/// Awaiting the handle races the worker against the handle's timeout. The
/// race is local: an elapsed timeout leaves the queued or running item alone,
/// and its eventual result is discarded.
pub struct OperationHandle {
    id: Uuid,
    operation_name: String,
    timeout: Duration,
    state: HandleState,
}

impl OperationHandle {
    pub(crate) fn pending(
        id: Uuid,
        operation_name: String,
        timeout: Duration,
        receiver: oneshot::Receiver<OperationResult>,
    ) -> Self {
        Self {
            id,
            operation_name,
            timeout,
            state: HandleState::Pending(receiver),
        }
    }

    /// Handle that resolves immediately, used for synchronous rejections
    pub(crate) fn ready(operation_name: String, result: OperationResult) -> Self {
        Self {
            id: Uuid::new_v4(),
            operation_name,
            timeout: Duration::ZERO,
            state: HandleState::Ready(result),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn operation_name(&self) -> &str {
        &self.operation_name
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Whether the result was decided at enqueue time
    pub fn is_ready(&self) -> bool {
        matches!(self.state, HandleState::Ready(_))
    }

    /// Override the queue's default wait for this request
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub async fn wait(self) -> OperationResult {
        let receiver = match self.state {
            HandleState::Ready(result) => return result,
            HandleState::Pending(receiver) => receiver,
        };

        match tokio::time::timeout(self.timeout, receiver).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => {
                OperationResult::failure("worker stopped before producing a result", None)
            }
            Err(_) => {
                let err = NormalizationError::Timeout {
                    operation: self.operation_name,
                    duration: self.timeout,
                };
                warn!(id = %self.id, error = %err, "caller stopped waiting");
                OperationResult::from_error(&err, None)
            }
        }
    }
}

impl IntoFuture for OperationHandle {
    type Output = OperationResult;
    type IntoFuture = BoxFuture<'static, OperationResult>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(self.wait())
    }
}

impl std::fmt::Debug for OperationHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperationHandle")
            .field("id", &self.id)
            .field("operation_name", &self.operation_name)
            .field("timeout", &self.timeout)
            .field("ready", &self.is_ready())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Element, Node};

    #[tokio::test]
    async fn test_ready_handle_resolves_immediately() {
        let handle = OperationHandle::ready(
            "noop".to_string(),
            OperationResult::success(Node::from(Element::resource("Patient"))),
        );
        assert!(handle.is_ready());
        assert!(handle.await.is_success());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_names_operation_and_duration() {
        let (_sender, receiver) = oneshot::channel();
        let handle = OperationHandle::pending(
            Uuid::new_v4(),
            "slow-copy".to_string(),
            Duration::from_millis(50),
            receiver,
        );

        let result = handle.await;
        assert!(!result.is_success());
        assert_eq!(
            result.error_message.as_deref(),
            Some("operation 'slow-copy' timed out after 50ms")
        );
    }

    #[tokio::test]
    async fn test_dropped_sender_fails_the_handle() {
        let (sender, receiver) = oneshot::channel();
        drop(sender);
        let result = OperationHandle::pending(
            Uuid::new_v4(),
            "copy".to_string(),
            Duration::from_secs(1),
            receiver,
        )
        .await;
        assert_eq!(
            result.error_message.as_deref(),
            Some("worker stopped before producing a result")
        );
    }
}

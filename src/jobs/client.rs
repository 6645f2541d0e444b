//! Enqueue side of the job queue.

use std::sync::Arc;

use uuid::Uuid;

use super::broker::Broker;
use super::payloads::TaskPayload;
use super::task::{TaskMessage, TaskOptions};
use super::BrokerError;

/// Process-wide, cheap to clone, safe to share between handlers.
#[derive(Clone)]
pub struct JobClient {
    broker: Arc<dyn Broker>,
}

impl JobClient {
    pub fn new(broker: Arc<dyn Broker>) -> Self {
        Self { broker }
    }

    pub fn broker(&self) -> Arc<dyn Broker> {
        self.broker.clone()
    }

    pub async fn enqueue<P: TaskPayload>(&self, payload: &P) -> Result<Uuid, BrokerError> {
        self.enqueue_with(payload, TaskOptions::default()).await
    }

    pub async fn enqueue_with<P: TaskPayload>(
        &self,
        payload: &P,
        options: TaskOptions,
    ) -> Result<Uuid, BrokerError> {
        let value =
            serde_json::to_value(payload).map_err(|e| BrokerError::Encode(e.to_string()))?;
        let task = TaskMessage::new(P::TASK_TYPE, value, &options);
        let queue = task.queue;
        let id = self.broker.enqueue(task).await?;
        tracing::debug!(task_id = %id, task_type = %P::TASK_TYPE, queue = %queue, "Task enqueued");
        Ok(id)
    }

    /// Enqueue a side effect after the ledger change already committed.
    ///
    /// A failure here must not fail the request that caused it, so it is
    /// logged and swallowed.
    pub async fn dispatch<P: TaskPayload>(&self, payload: &P) -> Option<Uuid> {
        match self.enqueue(payload).await {
            Ok(id) => Some(id),
            Err(e) => {
                tracing::error!(task_type = %P::TASK_TYPE, error = %e, "Failed to enqueue task");
                None
            }
        }
    }
}

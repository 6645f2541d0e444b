//! Operator view of the queues.

use std::sync::Arc;

use super::broker::{Broker, QueueStats};
use super::{BrokerError, Queue};

#[derive(Clone)]
pub struct Inspector {
    broker: Arc<dyn Broker>,
}

impl Inspector {
    pub fn new(broker: Arc<dyn Broker>) -> Self {
        Self { broker }
    }

    /// Counts for every queue, highest priority first.
    pub async fn queues(&self) -> Result<Vec<QueueStats>, BrokerError> {
        let mut all = Vec::with_capacity(Queue::ALL.len());
        for queue in Queue::ALL {
            all.push(self.broker.stats(queue).await?);
        }
        Ok(all)
    }

    pub async fn queue(&self, name: &str) -> Result<QueueStats, BrokerError> {
        self.broker.stats(name.parse()?).await
    }

    pub async fn pause(&self, name: &str) -> Result<(), BrokerError> {
        let queue: Queue = name.parse()?;
        self.broker.set_paused(queue, true).await?;
        tracing::info!(queue = %queue, "Queue paused");
        Ok(())
    }

    pub async fn unpause(&self, name: &str) -> Result<(), BrokerError> {
        let queue: Queue = name.parse()?;
        self.broker.set_paused(queue, false).await?;
        tracing::info!(queue = %queue, "Queue unpaused");
        Ok(())
    }

    /// Purge a queue. Returns the number of tasks removed.
    pub async fn delete_queue(&self, name: &str) -> Result<u64, BrokerError> {
        let queue: Queue = name.parse()?;
        let removed = self.broker.delete_queue(queue).await?;
        tracing::warn!(queue = %queue, removed, "Queue purged");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::broker::MemoryBroker;

    #[tokio::test]
    async fn reports_all_queues_and_rejects_unknown_names() {
        let inspector = Inspector::new(Arc::new(MemoryBroker::new()));
        let stats = inspector.queues().await.unwrap();
        assert_eq!(
            stats.iter().map(|s| s.queue).collect::<Vec<_>>(),
            Queue::ALL.to_vec()
        );

        inspector.pause("low").await.unwrap();
        assert!(inspector.queue("low").await.unwrap().paused);
        inspector.unpause("low").await.unwrap();
        assert!(!inspector.queue("low").await.unwrap().paused);

        assert!(matches!(
            inspector.pause("urgent").await,
            Err(BrokerError::UnknownQueue(_))
        ));
    }
}

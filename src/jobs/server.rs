//! Worker pool.
//!
//! `concurrency` workers poll the broker. Each worker picks a queue order per
//! fetch (strict priority, or a weighted random permutation) and runs the
//! first ready task under its timeout. On shutdown, workers stop fetching and
//! in-flight tasks get `shutdown_timeout` to finish; anything still running
//! after that is aborted and handed back to the broker as pending.

use std::collections::HashSet;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use rand::Rng;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::broker::Broker;
use super::registry::HandlerRegistry;
use super::task::{TaskMessage, retry_delay};
use super::{JobError, Queue, QueueConfig};

/// Called once a task has failed for good.
pub type ErrorHandler = Arc<dyn Fn(&TaskMessage, &JobError) + Send + Sync>;

/// Default hook: log and count.
pub fn log_error_handler() -> ErrorHandler {
    Arc::new(|task: &TaskMessage, err: &JobError| {
        error!(
            task_id = %task.id,
            task_type = %task.task_type,
            queue = %task.queue,
            attempts = task.retried + 1,
            error = %err,
            "Task failed permanently"
        );
        metrics::counter!("jobs_dead_total", "type" => task.task_type.clone()).increment(1);
    })
}

/// Longest task timeout plus grace; after this the broker considers the
/// worker gone and hands the task out again.
const LEASE: Duration = Duration::from_secs(330);

/// How often expired leases are swept.
const RECOVERY_INTERVAL: Duration = Duration::from_secs(30);

/// How often settled tasks older than the retention window are dropped.
const PURGE_INTERVAL: Duration = Duration::from_secs(60 * 60);

pub struct JobServer {
    broker: Arc<dyn Broker>,
    registry: Arc<HandlerRegistry>,
    config: QueueConfig,
    error_handler: ErrorHandler,
}

impl JobServer {
    pub fn new(broker: Arc<dyn Broker>, registry: HandlerRegistry, config: QueueConfig) -> Self {
        Self {
            broker,
            registry: Arc::new(registry),
            config,
            error_handler: log_error_handler(),
        }
    }

    pub fn with_error_handler(mut self, handler: ErrorHandler) -> Self {
        self.error_handler = handler;
        self
    }

    /// Run until `shutdown` is cancelled, then drain.
    pub async fn run(self, shutdown: CancellationToken) {
        info!(
            concurrency = self.config.concurrency,
            strict_priority = self.config.strict_priority,
            handlers = ?self.registry.registered_types(),
            "Starting job server"
        );

        match self.broker.recover_expired().await {
            Ok(0) => {}
            Ok(n) => info!(recovered = n, "Recovered orphaned tasks"),
            Err(e) => warn!(error = %e, "Failed to recover orphaned tasks"),
        }
        purge_finished(self.broker.as_ref(), self.config.retention).await;

        let in_flight: Arc<Mutex<HashSet<Uuid>>> = Arc::default();
        let mut workers = JoinSet::new();

        for worker_id in 0..self.config.concurrency {
            let worker = Worker {
                id: worker_id,
                broker: self.broker.clone(),
                registry: self.registry.clone(),
                config: self.config.clone(),
                error_handler: self.error_handler.clone(),
                in_flight: in_flight.clone(),
            };
            workers.spawn(worker.run(shutdown.clone()));
        }

        let janitor = tokio::spawn(recovery_loop(
            self.broker.clone(),
            self.config.retention,
            shutdown.clone(),
        ));

        shutdown.cancelled().await;
        info!(
            timeout_secs = self.config.shutdown_timeout.as_secs(),
            "Job server stopping, waiting for in-flight tasks"
        );

        let drain = async {
            while let Some(joined) = workers.join_next().await {
                if let Err(e) = joined {
                    warn!("Worker panicked: {}", e);
                }
            }
        };

        let drained = tokio::time::timeout(self.config.shutdown_timeout, drain).await;
        match drained {
            Ok(()) => info!("All workers stopped gracefully"),
            Err(_) => {
                workers.abort_all();
                let orphaned: Vec<Uuid> = in_flight
                    .lock()
                    .map(|set| set.iter().copied().collect())
                    .unwrap_or_default();
                warn!(
                    orphaned = orphaned.len(),
                    "Shutdown timed out, returning unfinished tasks to the queue"
                );
                for id in orphaned {
                    if let Err(e) = self.broker.requeue(id).await {
                        error!(task_id = %id, error = %e, "Failed to requeue task");
                    }
                }
            }
        }

        janitor.abort();
    }
}

/// Wait for `signal`, then cancel `token`.
///
/// Handed to the HTTP server's graceful shutdown so the workers stop fetching
/// as soon as the signal arrives instead of after the listener has drained.
pub async fn cancel_on(signal: impl Future<Output = ()>, token: CancellationToken) {
    signal.await;
    token.cancel();
}

async fn recovery_loop(broker: Arc<dyn Broker>, retention: Duration, shutdown: CancellationToken) {
    let mut recovery = tokio::time::interval(RECOVERY_INTERVAL);
    let mut purge = tokio::time::interval(PURGE_INTERVAL);
    recovery.tick().await;
    purge.tick().await;
    loop {
        tokio::select! {
            _ = recovery.tick() => {
                if let Err(e) = broker.recover_expired().await {
                    warn!(error = %e, "Lease recovery failed");
                }
            }
            _ = purge.tick() => purge_finished(broker.as_ref(), retention).await,
            _ = shutdown.cancelled() => break,
        }
    }
}

async fn purge_finished(broker: &dyn Broker, retention: Duration) {
    match broker.purge_finished(retention).await {
        Ok(0) => {}
        Ok(n) => info!(purged = n, "Purged settled tasks"),
        Err(e) => warn!(error = %e, "Failed to purge settled tasks"),
    }
}

struct Worker {
    id: usize,
    broker: Arc<dyn Broker>,
    registry: Arc<HandlerRegistry>,
    config: QueueConfig,
    error_handler: ErrorHandler,
    in_flight: Arc<Mutex<HashSet<Uuid>>>,
}

impl Worker {
    async fn run(self, shutdown: CancellationToken) {
        loop {
            if shutdown.is_cancelled() {
                break;
            }

            match self.fetch().await {
                Some(task) => self.process(task).await,
                None => {
                    tokio::select! {
                        _ = tokio::time::sleep(self.config.poll_interval) => {}
                        _ = shutdown.cancelled() => break,
                    }
                }
            }
        }
        tracing::debug!(worker = self.id, "Worker stopped");
    }

    async fn fetch(&self) -> Option<TaskMessage> {
        let order = queue_order(&self.config, &mut rand::rng());
        for queue in order {
            match self.broker.dequeue(queue, LEASE).await {
                Ok(Some(task)) => return Some(task),
                Ok(None) => continue,
                Err(e) => {
                    warn!(worker = self.id, queue = %queue, error = %e, "Dequeue failed");
                    return None;
                }
            }
        }
        None
    }

    async fn process(&self, task: TaskMessage) {
        self.track(task.id, true);
        let result = match self.registry.get(&task.task_type) {
            Some(handler) => match tokio::time::timeout(task.timeout, handler.handle(&task)).await {
                Ok(result) => result,
                Err(_) => Err(JobError::retry(format!(
                    "timed out after {}s",
                    task.timeout.as_secs()
                ))),
            },
            None => Err(JobError::skip(format!(
                "no handler registered for {}",
                task.task_type
            ))),
        };
        self.settle(&task, result).await;
        self.track(task.id, false);
    }

    async fn settle(&self, task: &TaskMessage, result: Result<(), JobError>) {
        let settled = match &result {
            Ok(()) => self.broker.complete(task).await,
            Err(err) if err.is_skip_retry() || task.retries_exhausted() => {
                (self.error_handler)(task, err);
                self.broker.archive(task, &err.to_string()).await
            }
            Err(err) => {
                let delay = chrono::Duration::from_std(retry_delay(task.retried))
                    .unwrap_or_else(|_| chrono::Duration::hours(1));
                self.broker
                    .retry(task, Utc::now() + delay, &err.to_string())
                    .await
            }
        };
        if let Err(e) = settled {
            error!(task_id = %task.id, error = %e, "Failed to record task outcome");
        }
    }

    fn track(&self, id: Uuid, active: bool) {
        if let Ok(mut set) = self.in_flight.lock() {
            if active {
                set.insert(id);
            } else {
                set.remove(&id);
            }
        }
    }
}

/// Order in which queues are polled for one fetch.
///
/// Strict priority sorts by weight, highest first. Otherwise queues are drawn
/// without replacement with probability proportional to their weight, so a
/// busy critical queue cannot starve the low queue completely.
pub fn queue_order<R: Rng + ?Sized>(config: &QueueConfig, rng: &mut R) -> Vec<Queue> {
    let mut remaining: Vec<(Queue, u32)> = config
        .weights
        .iter()
        .copied()
        .filter(|(_, weight)| *weight > 0)
        .collect();

    if config.strict_priority {
        remaining.sort_by(|a, b| b.1.cmp(&a.1));
        return remaining.into_iter().map(|(queue, _)| queue).collect();
    }

    let mut order = Vec::with_capacity(remaining.len());
    while !remaining.is_empty() {
        let total: u32 = remaining.iter().map(|(_, w)| *w).sum();
        let mut pick = rng.random_range(0..total);
        let index = remaining
            .iter()
            .position(|(_, weight)| {
                if pick < *weight {
                    true
                } else {
                    pick -= *weight;
                    false
                }
            })
            .unwrap_or(0);
        order.push(remaining.remove(index).0);
    }
    order
}

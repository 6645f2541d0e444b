//! Handler middleware: every task runs inside the logging and metrics layers.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use metrics::{counter, histogram};
use tracing::{info, warn};

use super::registry::TaskHandler;
use super::task::{TaskMessage, TaskType};
use super::JobError;

pub trait Middleware: Send + Sync {
    fn wrap(&self, task_type: TaskType, inner: Arc<dyn TaskHandler>) -> Arc<dyn TaskHandler>;
}

fn outcome(result: &Result<(), JobError>) -> &'static str {
    match result {
        Ok(()) => "success",
        Err(JobError::Retry(_)) => "retry",
        Err(JobError::SkipRetry(_)) => "skip_retry",
    }
}

/// Logs task id, type, attempt, duration and outcome.
pub struct LoggingMiddleware;

struct Logged {
    inner: Arc<dyn TaskHandler>,
}

impl Middleware for LoggingMiddleware {
    fn wrap(&self, _task_type: TaskType, inner: Arc<dyn TaskHandler>) -> Arc<dyn TaskHandler> {
        Arc::new(Logged { inner })
    }
}

#[async_trait]
impl TaskHandler for Logged {
    async fn handle(&self, task: &TaskMessage) -> Result<(), JobError> {
        let start = Instant::now();
        let result = self.inner.handle(task).await;
        let elapsed_ms = start.elapsed().as_millis();

        match &result {
            Ok(()) => info!(
                task_id = %task.id,
                task_type = %task.task_type,
                attempt = task.retried + 1,
                elapsed_ms,
                "Task processed"
            ),
            Err(e) => warn!(
                task_id = %task.id,
                task_type = %task.task_type,
                attempt = task.retried + 1,
                elapsed_ms,
                outcome = outcome(&result),
                error = %e,
                "Task failed"
            ),
        }
        result
    }
}

/// Records `jobs_processed_total{type,outcome}` and `job_duration_seconds{type}`.
pub struct MetricsMiddleware;

struct Measured {
    task_type: &'static str,
    inner: Arc<dyn TaskHandler>,
}

impl Middleware for MetricsMiddleware {
    fn wrap(&self, task_type: TaskType, inner: Arc<dyn TaskHandler>) -> Arc<dyn TaskHandler> {
        Arc::new(Measured {
            task_type: task_type.as_str(),
            inner,
        })
    }
}

#[async_trait]
impl TaskHandler for Measured {
    async fn handle(&self, task: &TaskMessage) -> Result<(), JobError> {
        let start = Instant::now();
        let result = self.inner.handle(task).await;

        counter!(
            "jobs_processed_total",
            "type" => self.task_type,
            "outcome" => outcome(&result)
        )
        .increment(1);
        histogram!("job_duration_seconds", "type" => self.task_type)
            .record(start.elapsed().as_secs_f64());

        result
    }
}

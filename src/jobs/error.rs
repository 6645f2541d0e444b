use thiserror::Error;

use crate::error::AppError;

/// Failure of one task attempt.
#[derive(Debug, Clone, Error)]
pub enum JobError {
    /// Transient; the task is retried with backoff until attempts run out.
    #[error("{0}")]
    Retry(String),

    /// Permanent (bad payload, missing row); archived without retrying.
    #[error("skip retry: {0}")]
    SkipRetry(String),
}

impl JobError {
    pub fn retry(msg: impl Into<String>) -> Self {
        JobError::Retry(msg.into())
    }

    pub fn skip(msg: impl Into<String>) -> Self {
        JobError::SkipRetry(msg.into())
    }

    pub fn is_skip_retry(&self) -> bool {
        matches!(self, JobError::SkipRetry(_))
    }
}

impl From<sqlx::Error> for JobError {
    fn from(err: sqlx::Error) -> Self {
        JobError::Retry(err.to_string())
    }
}

impl From<AppError> for JobError {
    fn from(err: AppError) -> Self {
        match err {
            AppError::Validation(msg) => JobError::SkipRetry(msg),
            AppError::NotFound(what) => JobError::SkipRetry(format!("{what} not found")),
            other => JobError::Retry(other.to_string()),
        }
    }
}

/// Broker storage failure.
#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("Broker database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Unknown queue: {0}")]
    UnknownQueue(String),

    #[error("Task payload could not be encoded: {0}")]
    Encode(String),
}

impl From<BrokerError> for AppError {
    fn from(err: BrokerError) -> Self {
        match err {
            BrokerError::UnknownQueue(name) => AppError::NotFound(format!("Queue {name}")),
            other => AppError::Internal(other.to_string()),
        }
    }
}

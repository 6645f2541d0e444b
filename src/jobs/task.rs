//! Task envelope and the catalogue of task types.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Queue;

/// Every task type the registry knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskType {
    EmailWelcome,
    EmailPasswordReset,
    EmailTransactionNotification,
    EmailVerification,
    EmailTwoFactor,
    EmailDelivery,
    ActivityLog,
    NotificationCreate,
    NotificationUpdate,
    NotificationDelete,
    NotificationMarkRead,
    NotificationMarkAllRead,
}

impl TaskType {
    pub const ALL: [TaskType; 12] = [
        TaskType::EmailWelcome,
        TaskType::EmailPasswordReset,
        TaskType::EmailTransactionNotification,
        TaskType::EmailVerification,
        TaskType::EmailTwoFactor,
        TaskType::EmailDelivery,
        TaskType::ActivityLog,
        TaskType::NotificationCreate,
        TaskType::NotificationUpdate,
        TaskType::NotificationDelete,
        TaskType::NotificationMarkRead,
        TaskType::NotificationMarkAllRead,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskType::EmailWelcome => "email:welcome",
            TaskType::EmailPasswordReset => "email:password_reset",
            TaskType::EmailTransactionNotification => "email:transaction_notification",
            TaskType::EmailVerification => "email:verification",
            TaskType::EmailTwoFactor => "email:2fa",
            TaskType::EmailDelivery => "email:delivery",
            TaskType::ActivityLog => "activity:log",
            TaskType::NotificationCreate => "notification:create",
            TaskType::NotificationUpdate => "notification:update",
            TaskType::NotificationDelete => "notification:delete",
            TaskType::NotificationMarkRead => "notification:mark_read",
            TaskType::NotificationMarkAllRead => "notification:mark_all_read",
        }
    }

    /// Queue a task of this type goes to unless overridden.
    pub fn default_queue(&self) -> Queue {
        match self {
            TaskType::EmailTwoFactor => Queue::Critical,
            TaskType::EmailPasswordReset | TaskType::EmailVerification => Queue::High,
            TaskType::ActivityLog | TaskType::NotificationDelete => Queue::Low,
            _ => Queue::Default,
        }
    }

    /// Retries after the first attempt.
    pub fn max_retry(&self) -> u32 {
        match self {
            TaskType::EmailTwoFactor | TaskType::ActivityLog => 2,
            _ => 3,
        }
    }

    pub fn timeout(&self) -> Duration {
        match self {
            TaskType::EmailDelivery | TaskType::EmailTransactionNotification => {
                Duration::from_secs(5 * 60)
            }
            _ => Duration::from_secs(2 * 60),
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TaskType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("unknown task type {s}"))
    }
}

/// A task as stored in the broker.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskMessage {
    pub id: Uuid,
    pub queue: Queue,
    pub task_type: String,
    pub payload: serde_json::Value,
    /// Attempts that already failed.
    pub retried: u32,
    pub max_retry: u32,
    #[serde(with = "duration_secs")]
    pub timeout: Duration,
    pub process_at: DateTime<Utc>,
    pub enqueued_at: DateTime<Utc>,
    pub last_error: Option<String>,
}

impl TaskMessage {
    pub fn new(task_type: TaskType, payload: serde_json::Value, options: &TaskOptions) -> Self {
        let now = Utc::now();
        let process_at = match options.process_in {
            Some(delay) => now + chrono::Duration::from_std(delay).unwrap_or_default(),
            None => now,
        };
        Self {
            id: Uuid::new_v4(),
            queue: options.queue.unwrap_or_else(|| task_type.default_queue()),
            task_type: task_type.as_str().to_string(),
            payload,
            retried: 0,
            max_retry: options.max_retry.unwrap_or_else(|| task_type.max_retry()),
            timeout: options.timeout.unwrap_or_else(|| task_type.timeout()),
            process_at,
            enqueued_at: now,
            last_error: None,
        }
    }

    pub fn retries_exhausted(&self) -> bool {
        self.retried >= self.max_retry
    }
}

/// Per-enqueue overrides of the task type defaults.
#[derive(Debug, Clone, Default)]
pub struct TaskOptions {
    pub queue: Option<Queue>,
    pub max_retry: Option<u32>,
    pub timeout: Option<Duration>,
    /// Schedule for later instead of immediately.
    pub process_in: Option<Duration>,
}

/// Exponential backoff: 10s, 20s, 40s, ... capped at one hour.
pub fn retry_delay(retried: u32) -> Duration {
    let secs = 10u64.saturating_mul(1u64 << retried.min(16));
    Duration::from_secs(secs.min(3600))
}

mod duration_secs {
    use std::time::Duration;

    use serde::Serializer;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_type_names_round_trip() {
        for t in TaskType::ALL {
            assert_eq!(t.as_str().parse::<TaskType>().unwrap(), t);
        }
        assert!("email:fax".parse::<TaskType>().is_err());
    }

    #[test]
    fn routing_defaults() {
        assert_eq!(TaskType::EmailPasswordReset.default_queue(), Queue::High);
        assert_eq!(TaskType::ActivityLog.default_queue(), Queue::Low);
        assert_eq!(TaskType::NotificationCreate.default_queue(), Queue::Default);
        for t in TaskType::ALL {
            assert!((2..=3).contains(&t.max_retry()));
            assert!(t.timeout() >= Duration::from_secs(120));
            assert!(t.timeout() <= Duration::from_secs(300));
        }
    }

    #[test]
    fn backoff_grows_and_caps() {
        assert_eq!(retry_delay(0), Duration::from_secs(10));
        assert_eq!(retry_delay(1), Duration::from_secs(20));
        assert_eq!(retry_delay(3), Duration::from_secs(80));
        assert_eq!(retry_delay(30), Duration::from_secs(3600));
    }

    #[test]
    fn options_override_defaults() {
        let options = TaskOptions {
            queue: Some(Queue::Critical),
            max_retry: Some(0),
            timeout: Some(Duration::from_secs(1)),
            process_in: Some(Duration::from_secs(60)),
        };
        let task = TaskMessage::new(TaskType::ActivityLog, serde_json::json!({}), &options);
        assert_eq!(task.queue, Queue::Critical);
        assert_eq!(task.max_retry, 0);
        assert!(task.retries_exhausted());
        assert!(task.process_at > task.enqueued_at);
    }
}

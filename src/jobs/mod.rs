//! Background job queue.
//!
//! Side effects of ledger operations (notification rows, activity lines,
//! emails) are enqueued as typed tasks and executed by a worker pool off the
//! request path. Delivery is at-least-once, so every handler is idempotent.
//!
//! - [`client::JobClient`] enqueues typed payloads
//! - [`broker::Broker`] stores tasks (in memory or in Postgres)
//! - [`server::JobServer`] drains queues by priority with retries, timeouts
//!   and graceful shutdown
//! - [`registry::HandlerRegistry`] maps task types to handlers, wrapped in
//!   logging and metrics middleware
//! - [`inspector::Inspector`] reports per-queue counts and pauses queues

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub mod broker;
pub mod client;
pub mod error;
pub mod handlers;
pub mod inspector;
pub mod middleware;
pub mod payloads;
pub mod registry;
pub mod server;
pub mod task;

pub use client::JobClient;
pub use error::{BrokerError, JobError};
pub use task::{TaskMessage, TaskType};

/// Priority classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Queue {
    Critical,
    High,
    Default,
    Low,
}

impl Queue {
    pub const ALL: [Queue; 4] = [Queue::Critical, Queue::High, Queue::Default, Queue::Low];

    pub fn as_str(&self) -> &'static str {
        match self {
            Queue::Critical => "critical",
            Queue::High => "high",
            Queue::Default => "default",
            Queue::Low => "low",
        }
    }
}

impl fmt::Display for Queue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Queue {
    type Err = BrokerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "critical" => Ok(Queue::Critical),
            "high" => Ok(Queue::High),
            "default" => Ok(Queue::Default),
            "low" => Ok(Queue::Low),
            other => Err(BrokerError::UnknownQueue(other.to_string())),
        }
    }
}

/// Worker pool settings.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    pub concurrency: usize,
    /// Always drain higher queues first instead of weighted selection.
    pub strict_priority: bool,
    pub weights: Vec<(Queue, u32)>,
    pub shutdown_timeout: Duration,
    pub poll_interval: Duration,
    /// How long archived and completed tasks are kept before being purged.
    pub retention: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            concurrency: 10,
            strict_priority: false,
            weights: vec![
                (Queue::Critical, 6),
                (Queue::High, 4),
                (Queue::Default, 3),
                (Queue::Low, 1),
            ],
            shutdown_timeout: Duration::from_secs(30),
            poll_interval: Duration::from_millis(500),
            retention: Duration::from_secs(24 * 60 * 60),
        }
    }
}

//! Notification and activity projections.
//!
//! Rows are written only by job handlers; request handlers read them.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "notification_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum NotificationType {
    Transfer,
    Topup,
    Withdraw,
    Conversion,
    Security,
    System,
}

impl FromStr for NotificationType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "transfer" => Ok(NotificationType::Transfer),
            "topup" => Ok(NotificationType::Topup),
            "withdraw" => Ok(NotificationType::Withdraw),
            "conversion" => Ok(NotificationType::Conversion),
            "security" => Ok(NotificationType::Security),
            "system" => Ok(NotificationType::System),
            other => Err(AppError::Validation(format!(
                "Unknown notification type: {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    #[serde(rename = "type")]
    pub kind: NotificationType,
    pub title: String,
    pub message: String,
    pub is_read: bool,
    /// Natural key carried by the job payload so redelivery is a no-op.
    #[serde(skip)]
    pub dedup_key: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Append-only audit line for a user.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct Activity {
    pub id: Uuid,
    pub user_id: Uuid,
    pub message: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub occurred_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Default, Deserialize)]
pub struct NotificationQuery {
    pub unread_only: Option<bool>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

/// Body of `DELETE /notifications/delete-bulk`.
#[derive(Debug, Deserialize)]
pub struct BulkDeleteRequest {
    pub ids: Vec<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct UnreadCount {
    pub unread: i64,
}

/// Task ids handed back when a write was queued.
#[derive(Debug, Serialize)]
pub struct QueuedWrite {
    pub task_ids: Vec<Uuid>,
}

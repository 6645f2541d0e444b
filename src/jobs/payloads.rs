//! Typed task payloads.
//!
//! Payloads carry the natural keys handlers use to detect replays: a
//! notification carries a `dedup_key`, an activity its timestamp.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use uuid::Uuid;

use super::JobError;
use super::task::TaskType;
use crate::models::notification::NotificationType;
use crate::models::transaction::{TransactionStatus, TransactionType};
use crate::money::Currency;

/// A payload bound to exactly one task type.
pub trait TaskPayload: Serialize + DeserializeOwned + Send + Sync + 'static {
    const TASK_TYPE: TaskType;

    /// Required-field checks; a failure is permanent.
    fn validate(&self) -> Result<(), JobError> {
        Ok(())
    }
}

fn require(value: &str, field: &str) -> Result<(), JobError> {
    if value.trim().is_empty() {
        return Err(JobError::skip(format!("{field} is required")));
    }
    Ok(())
}

/// `notification:create`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateNotificationRequest {
    pub user_id: Uuid,
    #[serde(rename = "type")]
    pub kind: NotificationType,
    pub title: String,
    pub message: String,
    #[serde(default)]
    pub dedup_key: Option<String>,
}

impl TaskPayload for CreateNotificationRequest {
    const TASK_TYPE: TaskType = TaskType::NotificationCreate;

    fn validate(&self) -> Result<(), JobError> {
        require(&self.title, "title")?;
        require(&self.message, "message")
    }
}

/// `notification:update`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateNotificationRequest {
    pub id: Uuid,
    pub user_id: Uuid,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl TaskPayload for UpdateNotificationRequest {
    const TASK_TYPE: TaskType = TaskType::NotificationUpdate;

    fn validate(&self) -> Result<(), JobError> {
        if self.title.is_none() && self.message.is_none() {
            return Err(JobError::skip("nothing to update"));
        }
        Ok(())
    }
}

/// `notification:delete`. Without `user_id` the delete is unscoped (admin).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeleteNotificationsRequest {
    pub ids: Vec<Uuid>,
    #[serde(default)]
    pub user_id: Option<Uuid>,
}

impl TaskPayload for DeleteNotificationsRequest {
    const TASK_TYPE: TaskType = TaskType::NotificationDelete;

    fn validate(&self) -> Result<(), JobError> {
        if self.ids.is_empty() {
            return Err(JobError::skip("ids is required"));
        }
        Ok(())
    }
}

/// `notification:mark_read`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkReadRequest {
    pub id: Uuid,
    pub user_id: Uuid,
}

impl TaskPayload for MarkReadRequest {
    const TASK_TYPE: TaskType = TaskType::NotificationMarkRead;
}

/// `notification:mark_all_read`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkAllReadRequest {
    pub user_id: Uuid,
}

impl TaskPayload for MarkAllReadRequest {
    const TASK_TYPE: TaskType = TaskType::NotificationMarkAllRead;
}

/// `activity:log`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityJobPayload {
    pub user_id: Uuid,
    pub message: String,
    #[serde(default)]
    pub ip_address: Option<String>,
    #[serde(default)]
    pub user_agent: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

impl TaskPayload for ActivityJobPayload {
    const TASK_TYPE: TaskType = TaskType::ActivityLog;

    fn validate(&self) -> Result<(), JobError> {
        require(&self.message, "message")
    }
}

/// `email:welcome`, sent after registration with the verification link.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WelcomeEmailPayload {
    pub to: String,
    pub name: String,
    pub verification_token: String,
}

impl TaskPayload for WelcomeEmailPayload {
    const TASK_TYPE: TaskType = TaskType::EmailWelcome;

    fn validate(&self) -> Result<(), JobError> {
        require(&self.to, "to")
    }
}

/// `email:verification`, a fresh verification link.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationEmailPayload {
    pub to: String,
    pub name: String,
    pub token: String,
}

impl TaskPayload for VerificationEmailPayload {
    const TASK_TYPE: TaskType = TaskType::EmailVerification;

    fn validate(&self) -> Result<(), JobError> {
        require(&self.to, "to")?;
        require(&self.token, "token")
    }
}

/// `email:password_reset`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PasswordResetEmailPayload {
    pub to: String,
    pub name: String,
    pub token: String,
}

impl TaskPayload for PasswordResetEmailPayload {
    const TASK_TYPE: TaskType = TaskType::EmailPasswordReset;

    fn validate(&self) -> Result<(), JobError> {
        require(&self.to, "to")?;
        require(&self.token, "token")
    }
}

/// `email:2fa`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TwoFactorEmailPayload {
    pub to: String,
    pub name: String,
    pub code: String,
}

impl TaskPayload for TwoFactorEmailPayload {
    const TASK_TYPE: TaskType = TaskType::EmailTwoFactor;

    fn validate(&self) -> Result<(), JobError> {
        require(&self.to, "to")?;
        require(&self.code, "code")
    }
}

/// `email:transaction_notification`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionEmailPayload {
    pub to: String,
    pub name: String,
    pub reference: String,
    pub transaction_type: TransactionType,
    pub status: TransactionStatus,
    pub amount: Decimal,
    pub currency: Currency,
}

impl TaskPayload for TransactionEmailPayload {
    const TASK_TYPE: TaskType = TaskType::EmailTransactionNotification;

    fn validate(&self) -> Result<(), JobError> {
        require(&self.to, "to")?;
        require(&self.reference, "reference")
    }
}

/// `email:delivery`, a plain subject and body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailDeliveryPayload {
    pub to: String,
    pub subject: String,
    pub body: String,
}

impl TaskPayload for EmailDeliveryPayload {
    const TASK_TYPE: TaskType = TaskType::EmailDelivery;

    fn validate(&self) -> Result<(), JobError> {
        require(&self.to, "to")?;
        require(&self.subject, "subject")
    }
}

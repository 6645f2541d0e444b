//! Inbound processor webhook models.
//!
//! # Webhook Flow
//!
//! 1. Processor POSTs a signed JSON body to `/api/webhooks/{provider}`
//! 2. The HMAC-SHA512 signature is verified against the raw body
//! 3. A `WebhookEvent` row is written for audit and deduplication
//! 4. The referenced transaction is advanced or failed
//!
//! Every event row is retained regardless of outcome.

use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::money::Currency;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "webhook_provider", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum WebhookProvider {
    Paystack,
    Momo,
}

impl WebhookProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            WebhookProvider::Paystack => "paystack",
            WebhookProvider::Momo => "momo",
        }
    }

    /// Header carrying the hex HMAC-SHA512 of the raw body.
    pub fn signature_header(&self) -> &'static str {
        match self {
            WebhookProvider::Paystack => "x-paystack-signature",
            WebhookProvider::Momo => "x-momo-signature",
        }
    }
}

impl fmt::Display for WebhookProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Processing outcome recorded on the event row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "webhook_event_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum WebhookEventStatus {
    Pending,
    Processed,
    Failed,
    AlreadyProcessed,
    TransactionNotFound,
    UnsupportedEvent,
    AmountMismatch,
}

impl WebhookEventStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WebhookEventStatus::Pending => "pending",
            WebhookEventStatus::Processed => "processed",
            WebhookEventStatus::Failed => "failed",
            WebhookEventStatus::AlreadyProcessed => "already_processed",
            WebhookEventStatus::TransactionNotFound => "transaction_not_found",
            WebhookEventStatus::UnsupportedEvent => "unsupported_event",
            WebhookEventStatus::AmountMismatch => "amount_mismatch",
        }
    }
}

/// Audit and dedup row for one received webhook.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct WebhookEvent {
    pub id: Uuid,
    /// `reference + "_" + unix seconds`, unique.
    pub event_id: String,
    pub provider: WebhookProvider,
    pub event_type: String,
    pub reference: Option<String>,
    pub payload: serde_json::Value,
    pub status: WebhookEventStatus,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

/// What the pipeline needs from any provider payload.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedEvent {
    pub event_type: String,
    pub reference: String,
    /// Principal currency units.
    pub amount: Option<Decimal>,
    pub currency: Option<Currency>,
    pub status_text: Option<String>,
}

/// Paystack body: `{ "event": "charge.success", "data": { ... } }`.
/// Amounts are in minor units.
#[derive(Debug, Deserialize)]
pub struct PaystackWebhook {
    pub event: String,
    pub data: PaystackEventData,
}

#[derive(Debug, Deserialize)]
pub struct PaystackEventData {
    pub reference: String,
    #[serde(default)]
    pub amount: Option<i64>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub gateway_response: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
}

/// Mobile money body: `{ "event": "payment.success", "data": { ... } }`.
/// Amounts are in principal units.
#[derive(Debug, Deserialize)]
pub struct MomoWebhook {
    pub event: String,
    pub data: MomoEventData,
}

#[derive(Debug, Deserialize)]
pub struct MomoEventData {
    #[serde(alias = "externalId")]
    pub reference: String,
    #[serde(default)]
    pub amount: Option<Decimal>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
}

/// Response body returned to processors.
#[derive(Debug, Clone, Serialize)]
pub struct WebhookAck {
    pub status: &'static str,
    pub event_id: String,
}

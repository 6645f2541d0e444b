//! Inbound processor webhooks.
//!
//! This module verifies HMAC-SHA512 signatures over the raw body, records
//! every delivery in `webhook_events`, and feeds success and failure events
//! into the transaction engine.
//!
//! # Idempotency
//!
//! Two guards stop a replayed webhook from moving money twice:
//!
//! - a partial unique index on processed `(provider, reference, event_type)`
//! - the engine only settles `pending` transactions, under a row lock

use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha512;
use uuid::Uuid;

use crate::{
    error::AppError,
    models::webhook::{
        MomoWebhook, ParsedEvent, PaystackWebhook, WebhookAck, WebhookEventStatus,
        WebhookProvider,
    },
    money::{Currency, from_minor_units},
    services::transaction_service::{self, Collected, Settlement},
    state::AppState,
};

type HmacSha512 = Hmac<Sha512>;

/// What an event type asks the engine to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventAction {
    /// Customer payment collected (deposit or checkout-funded transfer).
    ChargeSucceeded,
    ChargeFailed,
    /// Payout delivered.
    PayoutSucceeded,
    /// Payout failed or reversed; a debited wallet is refunded.
    PayoutFailed,
    Unsupported,
}

pub fn classify(event_type: &str) -> EventAction {
    match event_type {
        "charge.success" | "payment.success" => EventAction::ChargeSucceeded,
        "charge.failed" | "payment.failed" => EventAction::ChargeFailed,
        "transfer.success" => EventAction::PayoutSucceeded,
        "transfer.failed" | "transfer.reversed" => EventAction::PayoutFailed,
        _ => EventAction::Unsupported,
    }
}

/// Hex HMAC-SHA512 of `body` under `secret`.
pub fn sign(secret: &str, body: &[u8]) -> Result<String, AppError> {
    let mut mac = HmacSha512::new_from_slice(secret.as_bytes())
        .map_err(|e| AppError::Internal(format!("HMAC key error: {e}")))?;
    mac.update(body);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Constant-time check of a hex signature header against the raw body.
///
/// A missing or empty header, or an unconfigured secret, fails closed.
pub fn verify_signature(
    secret: &str,
    body: &[u8],
    signature: Option<&str>,
) -> Result<(), AppError> {
    let signature = signature
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or(AppError::SignatureInvalid)?;

    if secret.is_empty() {
        tracing::error!("Webhook secret is not configured, rejecting delivery");
        return Err(AppError::SignatureInvalid);
    }

    let expected = hex::decode(signature).map_err(|_| AppError::SignatureInvalid)?;
    let mut mac = HmacSha512::new_from_slice(secret.as_bytes())
        .map_err(|_| AppError::SignatureInvalid)?;
    mac.update(body);
    mac.verify_slice(&expected)
        .map_err(|_| AppError::SignatureInvalid)
}

/// Extract the fields the pipeline needs from a provider body.
pub fn parse_event(provider: WebhookProvider, body: &[u8]) -> Result<ParsedEvent, AppError> {
    let invalid = |e: serde_json::Error| AppError::Validation(format!("Invalid webhook body: {e}"));
    let currency = |code: Option<String>| code.and_then(|c| c.parse::<Currency>().ok());

    let event = match provider {
        WebhookProvider::Paystack => {
            let hook: PaystackWebhook = serde_json::from_slice(body).map_err(invalid)?;
            ParsedEvent {
                event_type: hook.event,
                reference: hook.data.reference,
                amount: hook.data.amount.map(from_minor_units),
                currency: currency(hook.data.currency),
                status_text: hook
                    .data
                    .reason
                    .or(hook.data.gateway_response)
                    .or(hook.data.status),
            }
        }
        WebhookProvider::Momo => {
            let hook: MomoWebhook = serde_json::from_slice(body).map_err(invalid)?;
            ParsedEvent {
                event_type: hook.event,
                reference: hook.data.reference,
                amount: hook.data.amount,
                currency: currency(hook.data.currency),
                status_text: hook.data.reason.or(hook.data.status),
            }
        }
    };

    if event.reference.trim().is_empty() {
        return Err(AppError::Validation("Webhook has no reference".to_string()));
    }
    Ok(event)
}

async fn already_processed(
    state: &AppState,
    provider: WebhookProvider,
    event: &ParsedEvent,
) -> Result<bool, AppError> {
    let exists = sqlx::query_scalar(
        r#"
        SELECT EXISTS(
            SELECT 1 FROM webhook_events
            WHERE provider = $1 AND reference = $2 AND event_type = $3 AND status = 'processed'
        )
        "#,
    )
    .bind(provider)
    .bind(&event.reference)
    .bind(&event.event_type)
    .fetch_one(&state.pool)
    .await?;
    Ok(exists)
}

async fn insert_event(
    state: &AppState,
    event_id: &str,
    provider: WebhookProvider,
    event: &ParsedEvent,
    payload: &serde_json::Value,
    status: WebhookEventStatus,
) -> Result<Option<Uuid>, AppError> {
    let id = sqlx::query_scalar(
        r#"
        INSERT INTO webhook_events (event_id, provider, event_type, reference, payload, status)
        VALUES ($1, $2, $3, $4, $5, $6)
        ON CONFLICT (event_id) DO NOTHING
        RETURNING id
        "#,
    )
    .bind(event_id)
    .bind(provider)
    .bind(&event.event_type)
    .bind(&event.reference)
    .bind(payload)
    .bind(status)
    .fetch_optional(&state.pool)
    .await?;
    Ok(id)
}

async fn set_status(
    state: &AppState,
    id: Uuid,
    status: WebhookEventStatus,
    error_message: Option<String>,
) {
    let result = sqlx::query(
        "UPDATE webhook_events SET status = $2, error_message = $3, processed_at = NOW() WHERE id = $1",
    )
    .bind(id)
    .bind(status)
    .bind(error_message)
    .execute(&state.pool)
    .await;

    if let Err(e) = result {
        tracing::error!(event_row = %id, status = status.as_str(), error = %e, "Failed to update webhook event");
    }
}

/// Verify, record and apply one delivery.
///
/// Returns `DuplicateEvent` (rendered as 200 `already_processed`) for a
/// replay. Not-found references, unsupported events and amount mismatches
/// are acknowledged with their status so the processor stops redelivering.
pub async fn handle(
    state: &AppState,
    provider: WebhookProvider,
    body: &[u8],
    signature: Option<&str>,
) -> Result<WebhookAck, AppError> {
    verify_signature(state.webhook_secret(provider), body, signature)?;
    let event = parse_event(provider, body)?;
    let payload: serde_json::Value = serde_json::from_slice(body)
        .map_err(|e| AppError::Validation(format!("Invalid webhook body: {e}")))?;
    let event_id = format!("{}_{}", event.reference, Utc::now().timestamp());

    tracing::info!(
        provider = %provider,
        event_type = %event.event_type,
        reference = %event.reference,
        "Webhook received"
    );

    if already_processed(state, provider, &event).await? {
        insert_event(
            state,
            &event_id,
            provider,
            &event,
            &payload,
            WebhookEventStatus::AlreadyProcessed,
        )
        .await?;
        tracing::info!(reference = %event.reference, "Webhook already processed");
        return Err(AppError::DuplicateEvent);
    }

    let Some(row_id) = insert_event(
        state,
        &event_id,
        provider,
        &event,
        &payload,
        WebhookEventStatus::Pending,
    )
    .await?
    else {
        return Err(AppError::DuplicateEvent);
    };

    let ack = |status: WebhookEventStatus| WebhookAck {
        status: status.as_str(),
        event_id: event_id.clone(),
    };

    let action = classify(&event.event_type);
    if action == EventAction::Unsupported {
        set_status(state, row_id, WebhookEventStatus::UnsupportedEvent, None).await;
        tracing::warn!(event_type = %event.event_type, "Unsupported webhook event");
        return Ok(ack(WebhookEventStatus::UnsupportedEvent));
    }

    match apply(state, row_id, action, &event).await {
        Ok(Settlement::Applied(transition)) => {
            tracing::info!(
                reference = %event.reference,
                status = %transition.transaction.status,
                "Webhook applied"
            );
            transaction_service::announce(state, &transition.transaction, &transition.details)
                .await;
            Ok(ack(WebhookEventStatus::Processed))
        }
        Ok(Settlement::NotFound) => {
            set_status(state, row_id, WebhookEventStatus::TransactionNotFound, None).await;
            tracing::warn!(reference = %event.reference, "Webhook for unknown transaction");
            Ok(ack(WebhookEventStatus::TransactionNotFound))
        }
        Ok(Settlement::NotPending(status)) => {
            set_status(
                state,
                row_id,
                WebhookEventStatus::AlreadyProcessed,
                Some(format!("transaction is {status}")),
            )
            .await;
            Err(AppError::DuplicateEvent)
        }
        Ok(Settlement::AmountMismatch {
            expected,
            expected_currency,
            received,
            received_currency,
        }) => {
            let message = format!(
                "expected {expected} {expected_currency}, received {} {}",
                received.map(|a| a.to_string()).unwrap_or_else(|| "-".into()),
                received_currency.map(|c| c.as_str()).unwrap_or("-"),
            );
            tracing::warn!(reference = %event.reference, %message, "Webhook amount mismatch");
            set_status(state, row_id, WebhookEventStatus::AmountMismatch, Some(message)).await;
            Ok(ack(WebhookEventStatus::AmountMismatch))
        }
        Err(e) if e.is_unique_violation() => {
            // Lost the race against a concurrent delivery of the same event.
            set_status(state, row_id, WebhookEventStatus::AlreadyProcessed, None).await;
            Err(AppError::DuplicateEvent)
        }
        Err(e) => {
            set_status(state, row_id, WebhookEventStatus::Failed, Some(e.to_string())).await;
            Err(e)
        }
    }
}

/// Settle the transaction and mark the event processed in one database
/// transaction.
async fn apply(
    state: &AppState,
    row_id: Uuid,
    action: EventAction,
    event: &ParsedEvent,
) -> Result<Settlement, AppError> {
    let mut tx = state.pool.begin().await?;

    let reason = event
        .status_text
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(event.event_type.as_str());

    let settlement = match action {
        EventAction::ChargeSucceeded => {
            let collected = Collected {
                amount: event.amount,
                currency: event.currency,
            };
            transaction_service::mark_completed(&mut tx, &event.reference, collected).await?
        }
        EventAction::PayoutSucceeded => {
            let collected = Collected {
                amount: None,
                currency: None,
            };
            transaction_service::mark_completed(&mut tx, &event.reference, collected).await?
        }
        EventAction::ChargeFailed | EventAction::PayoutFailed => {
            transaction_service::mark_failed(&mut tx, &event.reference, reason).await?
        }
        EventAction::Unsupported => return Ok(Settlement::NotFound),
    };

    if let Settlement::Applied(_) = settlement {
        sqlx::query(
            "UPDATE webhook_events SET status = 'processed', processed_at = NOW() WHERE id = $1",
        )
        .bind(row_id)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
    } else {
        tx.rollback().await?;
    }

    Ok(settlement)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const SECRET: &str = "sk_test_webhook";

    #[test]
    fn valid_signature_is_accepted() {
        let body = br#"{"event":"charge.success"}"#;
        let signature = sign(SECRET, body).unwrap();
        assert_eq!(signature.len(), 128);
        assert!(verify_signature(SECRET, body, Some(&signature)).is_ok());
        assert!(verify_signature(SECRET, body, Some(&signature.to_uppercase())).is_ok());
    }

    #[test]
    fn tampered_body_or_wrong_secret_is_rejected() {
        let body = br#"{"event":"charge.success"}"#;
        let signature = sign(SECRET, body).unwrap();
        assert!(matches!(
            verify_signature(SECRET, br#"{"event":"charge.failed"}"#, Some(&signature)),
            Err(AppError::SignatureInvalid)
        ));
        assert!(verify_signature("other", body, Some(&signature)).is_err());
    }

    #[test]
    fn missing_or_garbage_header_is_rejected() {
        let body = b"{}";
        assert!(verify_signature(SECRET, body, None).is_err());
        assert!(verify_signature(SECRET, body, Some("")).is_err());
        assert!(verify_signature(SECRET, body, Some("not-hex")).is_err());
        let signature = sign(SECRET, body).unwrap();
        assert!(verify_signature("", body, Some(&signature)).is_err());
    }

    #[test]
    fn paystack_amounts_are_minor_units() {
        let body = br#"{
            "event": "charge.success",
            "data": { "reference": "TOPUP_1700000000_abc123", "amount": 500000, "currency": "NGN", "status": "success" }
        }"#;
        let event = parse_event(WebhookProvider::Paystack, body).unwrap();
        assert_eq!(event.event_type, "charge.success");
        assert_eq!(event.reference, "TOPUP_1700000000_abc123");
        assert_eq!(event.amount, Some(dec!(5000.00)));
        assert_eq!(event.currency, Some(Currency::Ngn));
    }

    #[test]
    fn momo_reference_accepts_external_id() {
        let body = br#"{
            "event": "payment.failed",
            "data": { "externalId": "WD_1700000000_xyz789", "amount": 120.5, "currency": "GHS", "reason": "PAYER_NOT_FOUND" }
        }"#;
        let event = parse_event(WebhookProvider::Momo, body).unwrap();
        assert_eq!(event.reference, "WD_1700000000_xyz789");
        assert_eq!(event.amount, Some(dec!(120.5)));
        assert_eq!(event.status_text.as_deref(), Some("PAYER_NOT_FOUND"));
    }

    #[test]
    fn malformed_bodies_are_validation_errors() {
        assert!(matches!(
            parse_event(WebhookProvider::Paystack, b"not json"),
            Err(AppError::Validation(_))
        ));
        assert!(
            parse_event(
                WebhookProvider::Paystack,
                br#"{"event":"charge.success","data":{"reference":"  "}}"#
            )
            .is_err()
        );
    }

    #[test]
    fn event_types_map_to_actions() {
        assert_eq!(classify("charge.success"), EventAction::ChargeSucceeded);
        assert_eq!(classify("payment.success"), EventAction::ChargeSucceeded);
        assert_eq!(classify("payment.failed"), EventAction::ChargeFailed);
        assert_eq!(classify("transfer.success"), EventAction::PayoutSucceeded);
        assert_eq!(classify("transfer.reversed"), EventAction::PayoutFailed);
        assert_eq!(classify("subscription.create"), EventAction::Unsupported);
    }
}

//! Inbound processor webhooks.
//!
//! - POST /api/webhooks/paystack
//! - POST /api/webhooks/momo
//!
//! The body is taken raw: the HMAC is computed over the exact bytes the
//! processor sent, before any JSON parsing.

use axum::{
    body::Bytes,
    extract::State,
    http::HeaderMap,
};

use crate::{
    error::AppError,
    models::{
        response::ApiResponse,
        webhook::{WebhookAck, WebhookProvider},
    },
    services::webhook_service,
    state::AppState,
};

async fn receive(
    state: &AppState,
    provider: WebhookProvider,
    headers: &HeaderMap,
    body: &Bytes,
) -> Result<ApiResponse<WebhookAck>, AppError> {
    let signature = headers
        .get(provider.signature_header())
        .and_then(|v| v.to_str().ok());
    let ack = webhook_service::handle(state, provider, body, signature).await?;
    Ok(ApiResponse::ok("Webhook received", ack))
}

/// Paystack `charge.*` and `transfer.*` events.
///
/// # Headers
///
/// `X-Paystack-Signature`: hex HMAC-SHA512 of the raw body.
///
/// # Response
///
/// - `200` with the event status (`processed`, `transaction_not_found`,
///   `unsupported_event`, `amount_mismatch`)
/// - `200` `already_processed` for a replay
/// - `400` bad signature; nothing is written
pub async fn paystack(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<ApiResponse<WebhookAck>, AppError> {
    receive(&state, WebhookProvider::Paystack, &headers, &body).await
}

/// Mobile money collections and disbursements. Signed with `X-Momo-Signature`.
pub async fn momo(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<ApiResponse<WebhookAck>, AppError> {
    receive(&state, WebhookProvider::Momo, &headers, &body).await
}

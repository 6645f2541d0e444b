//! Payment processor adapters.
//!
//! The engine only needs two things from a processor: a hosted checkout page
//! for a reference, and the secret its webhooks are signed with.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::money::Currency;

/// Input to a hosted checkout.
#[derive(Debug, Clone, Serialize)]
pub struct CheckoutRequest {
    pub reference: String,
    pub email: String,
    /// Minor units (kobo, pesewas).
    pub amount: i64,
    pub currency: Currency,
    pub callback_url: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct CheckoutSession {
    pub authorization_url: String,
    pub reference: String,
}

#[async_trait]
pub trait PaymentProcessor: Send + Sync {
    fn name(&self) -> &'static str;

    async fn initialize(&self, request: &CheckoutRequest) -> Result<CheckoutSession, AppError>;
}

/// Paystack REST client.
pub struct PaystackClient {
    http: reqwest::Client,
    base_url: String,
    secret_key: String,
}

#[derive(Debug, Deserialize)]
struct PaystackEnvelope<T> {
    status: bool,
    message: String,
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct PaystackInitData {
    authorization_url: String,
    reference: String,
}

impl PaystackClient {
    pub fn new(base_url: &str, secret_key: &str) -> Result<Self, AppError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| AppError::Internal(format!("HTTP client error: {e}")))?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            secret_key: secret_key.to_string(),
        })
    }
}

#[async_trait]
impl PaymentProcessor for PaystackClient {
    fn name(&self) -> &'static str {
        "paystack"
    }

    async fn initialize(&self, request: &CheckoutRequest) -> Result<CheckoutSession, AppError> {
        if self.secret_key.is_empty() {
            return Err(AppError::Internal("Paystack is not configured".to_string()));
        }

        let body = serde_json::json!({
            "reference": request.reference,
            "email": request.email,
            "amount": request.amount,
            "currency": request.currency.as_str(),
            "callback_url": request.callback_url,
        });

        let response = self
            .http
            .post(format!("{}/transaction/initialize", self.base_url))
            .bearer_auth(&self.secret_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::Internal(format!("Paystack request failed: {e}")))?;

        let status = response.status();
        let envelope: PaystackEnvelope<PaystackInitData> = response
            .json()
            .await
            .map_err(|e| AppError::Internal(format!("Paystack response unreadable: {e}")))?;

        match envelope.data {
            Some(data) if status.is_success() && envelope.status => {
                tracing::info!(reference = %data.reference, "Paystack checkout initialized");
                Ok(CheckoutSession {
                    authorization_url: data.authorization_url,
                    reference: data.reference,
                })
            }
            _ => {
                tracing::warn!(
                    status = status.as_u16(),
                    message = %envelope.message,
                    "Paystack rejected checkout"
                );
                Err(AppError::Internal(format!(
                    "Paystack rejected checkout: {}",
                    envelope.message
                )))
            }
        }
    }
}

/// Webhook signing secrets per provider.
#[derive(Clone, Default)]
pub struct WebhookSecrets {
    pub paystack: String,
    pub momo: String,
}

impl std::fmt::Debug for WebhookSecrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("WebhookSecrets([REDACTED])")
    }
}

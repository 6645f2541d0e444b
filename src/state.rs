//! Process-wide dependencies shared by request handlers.

use std::sync::Arc;

use rust_decimal::Decimal;

use crate::adapters::payment::{PaymentProcessor, WebhookSecrets};
use crate::adapters::upload::ImageUploader;
use crate::config::Config;
use crate::db::DbPool;
use crate::jobs::JobClient;
use crate::jobs::broker::Broker;
use crate::jobs::inspector::Inspector;
use crate::models::webhook::WebhookProvider;
use crate::security::jwt::JwtService;

/// Built once at startup and cloned into every handler.
#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub config: Arc<Config>,
    pub jwt: Arc<JwtService>,
    pub jobs: JobClient,
    pub inspector: Inspector,
    /// Hosted checkout for card-funded top-ups and transfers.
    pub payments: Arc<dyn PaymentProcessor>,
    pub webhook_secrets: WebhookSecrets,
    pub uploader: Arc<dyn ImageUploader>,
}

impl AppState {
    /// Wire the shared dependencies from configuration.
    pub fn new(
        config: Config,
        pool: DbPool,
        broker: Arc<dyn Broker>,
        payments: Arc<dyn PaymentProcessor>,
        uploader: Arc<dyn ImageUploader>,
    ) -> Self {
        let jwt = JwtService::new(
            &config.jwt_secret_key,
            &config.refresh_secret(),
            &config.jwt_issuer,
            config.jwt_access_token_duration,
            config.jwt_refresh_token_duration,
        );
        let webhook_secrets = WebhookSecrets {
            paystack: config.paystack_secret_key.clone(),
            momo: config.momo_secret_key.clone(),
        };
        Self {
            pool,
            config: Arc::new(config),
            jwt: Arc::new(jwt),
            jobs: JobClient::new(broker.clone()),
            inspector: Inspector::new(broker),
            payments,
            webhook_secrets,
            uploader,
        }
    }

    pub fn fee_percent(&self) -> Decimal {
        self.config.fee_percent()
    }

    pub fn webhook_secret(&self, provider: WebhookProvider) -> &str {
        match provider {
            WebhookProvider::Paystack => &self.webhook_secrets.paystack,
            WebhookProvider::Momo => &self.webhook_secrets.momo,
        }
    }

    /// Where the processor sends the customer after checkout.
    pub fn checkout_callback_url(&self, reference: &str) -> String {
        format!(
            "{}/wallet/callback?reference={reference}",
            self.config.frontend_url.trim_end_matches('/')
        )
    }

    /// Secure cookies outside local development.
    pub fn secure_cookies(&self) -> bool {
        self.config.env() == crate::config::AppEnv::Production
    }
}

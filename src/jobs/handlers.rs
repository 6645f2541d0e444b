//! Task handlers: emails and the notification/activity projections.
//!
//! None of these touch a wallet. Each is safe to run twice: projection
//! writes are keyed by natural keys, and a duplicate email is harmless.

use std::sync::Arc;

use serde_json::json;

use super::JobError;
use super::middleware::{LoggingMiddleware, MetricsMiddleware};
use super::payloads::{
    ActivityJobPayload, CreateNotificationRequest, DeleteNotificationsRequest,
    EmailDeliveryPayload, MarkAllReadRequest, MarkReadRequest, PasswordResetEmailPayload,
    TransactionEmailPayload, TwoFactorEmailPayload, UpdateNotificationRequest,
    VerificationEmailPayload, WelcomeEmailPayload,
};
use super::registry::HandlerRegistry;
use crate::adapters::email::{EmailError, EmailSender};
use crate::db::DbPool;
use crate::services::{activity_service, notification_service};

/// Dependencies shared by all handlers.
#[derive(Clone)]
pub struct JobContext {
    pub pool: DbPool,
    pub email: Arc<dyn EmailSender>,
    pub frontend_url: String,
}

impl JobContext {
    fn link(&self, path: &str, token: &str) -> String {
        format!(
            "{}/{path}?token={token}",
            self.frontend_url.trim_end_matches('/')
        )
    }
}

impl From<EmailError> for JobError {
    fn from(err: EmailError) -> Self {
        match err {
            EmailError::NotConfigured | EmailError::UnknownTemplate(_) => {
                JobError::skip(err.to_string())
            }
            EmailError::SendFailed(msg) => JobError::retry(msg),
        }
    }
}

/// Build the registry with every task type bound, logging outermost.
pub fn build_registry(ctx: JobContext) -> HandlerRegistry {
    let mut registry = HandlerRegistry::new()
        .with_middleware(Arc::new(LoggingMiddleware))
        .with_middleware(Arc::new(MetricsMiddleware));

    let c = ctx.clone();
    registry.handle(move |p: WelcomeEmailPayload| {
        let c = c.clone();
        async move {
            let link = c.link("verify-email", &p.verification_token);
            c.email
                .send_templated(&p.to, "welcome", &json!({ "name": p.name, "link": link }))
                .await?;
            Ok(())
        }
    });

    let c = ctx.clone();
    registry.handle(move |p: VerificationEmailPayload| {
        let c = c.clone();
        async move {
            let link = c.link("verify-email", &p.token);
            c.email
                .send_templated(&p.to, "verification", &json!({ "name": p.name, "link": link }))
                .await?;
            Ok(())
        }
    });

    let c = ctx.clone();
    registry.handle(move |p: PasswordResetEmailPayload| {
        let c = c.clone();
        async move {
            let link = c.link("reset-password", &p.token);
            c.email
                .send_templated(&p.to, "password_reset", &json!({ "name": p.name, "link": link }))
                .await?;
            Ok(())
        }
    });

    let c = ctx.clone();
    registry.handle(move |p: TwoFactorEmailPayload| {
        let c = c.clone();
        async move {
            c.email
                .send_templated(&p.to, "two_factor", &json!({ "name": p.name, "code": p.code }))
                .await?;
            Ok(())
        }
    });

    let c = ctx.clone();
    registry.handle(move |p: TransactionEmailPayload| {
        let c = c.clone();
        async move {
            let data = json!({
                "name": p.name,
                "transaction_type": p.transaction_type.as_str(),
                "amount": p.amount.to_string(),
                "currency": p.currency.as_str(),
                "reference": p.reference,
                "status": p.status.as_str(),
            });
            c.email.send_templated(&p.to, "transaction", &data).await?;
            Ok(())
        }
    });

    let c = ctx.clone();
    registry.handle(move |p: EmailDeliveryPayload| {
        let c = c.clone();
        async move {
            c.email.send_simple(&p.to, &p.subject, &p.body).await?;
            Ok(())
        }
    });

    let c = ctx.clone();
    registry.handle(move |p: ActivityJobPayload| {
        let c = c.clone();
        async move {
            if !activity_service::record(&c.pool, &p).await? {
                tracing::debug!(user_id = %p.user_id, "Activity already recorded");
            }
            Ok(())
        }
    });

    let c = ctx.clone();
    registry.handle(move |p: CreateNotificationRequest| {
        let c = c.clone();
        async move {
            if !notification_service::insert(&c.pool, &p).await? {
                tracing::debug!(user_id = %p.user_id, dedup_key = ?p.dedup_key, "Notification already exists");
            }
            Ok(())
        }
    });

    let c = ctx.clone();
    registry.handle(move |p: UpdateNotificationRequest| {
        let c = c.clone();
        async move { notification_service::update(&c.pool, &p).await }
    });

    let c = ctx.clone();
    registry.handle(move |p: DeleteNotificationsRequest| {
        let c = c.clone();
        async move {
            let deleted = notification_service::delete(&c.pool, &p).await?;
            tracing::debug!(requested = p.ids.len(), deleted, "Notifications deleted");
            Ok(())
        }
    });

    let c = ctx.clone();
    registry.handle(move |p: MarkReadRequest| {
        let c = c.clone();
        async move { notification_service::mark_read(&c.pool, &p).await }
    });

    let c = ctx;
    registry.handle(move |p: MarkAllReadRequest| {
        let c = c.clone();
        async move {
            notification_service::mark_all_read(&c.pool, &p).await?;
            Ok(())
        }
    });

    registry
}

//! Email sender adapters.
//!
//! Supports two providers:
//! - `console`: logs emails (development)
//! - `http`: posts JSON to a mail relay API
//!
//! Only the email job handlers call these.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tracing::info;

use crate::config::{Config, EmailProvider};
use crate::error::AppError;

#[derive(Debug, Error)]
pub enum EmailError {
    #[error("Email service not configured")]
    NotConfigured,

    #[error("Unknown template: {0}")]
    UnknownTemplate(String),

    #[error("Failed to send email: {0}")]
    SendFailed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub body_text: String,
}

#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send(&self, message: EmailMessage) -> Result<(), EmailError>;

    async fn send_simple(&self, to: &str, subject: &str, body: &str) -> Result<(), EmailError> {
        self.send(EmailMessage {
            to: to.to_string(),
            subject: subject.to_string(),
            body_text: body.to_string(),
        })
        .await
    }

    async fn send_templated(
        &self,
        to: &str,
        template_id: &str,
        data: &Value,
    ) -> Result<(), EmailError> {
        let (subject, body_text) = render_template(template_id, data)?;
        self.send(EmailMessage {
            to: to.to_string(),
            subject,
            body_text,
        })
        .await
    }
}

fn field<'a>(data: &'a Value, key: &str) -> &'a str {
    data.get(key).and_then(Value::as_str).unwrap_or_default()
}

/// Render one of the built-in templates into `(subject, body)`.
pub fn render_template(template_id: &str, data: &Value) -> Result<(String, String), EmailError> {
    let name = field(data, "name");
    let greeting = if name.is_empty() {
        "Hi,".to_string()
    } else {
        format!("Hi {name},")
    };

    let rendered = match template_id {
        "welcome" => (
            "Welcome to JeanPay".to_string(),
            format!(
                "{greeting}\n\nYour JeanPay account is ready. Your NGN and GHS wallets have been created.\n\nPlease verify your email address:\n\n{}\n\nThe JeanPay Team",
                field(data, "link")
            ),
        ),
        "verification" => (
            "Verify your email address".to_string(),
            format!(
                "{greeting}\n\nPlease verify your email address by opening the link below:\n\n{}\n\nThis link expires in 24 hours.\n\nThe JeanPay Team",
                field(data, "link")
            ),
        ),
        "password_reset" => (
            "Reset your password".to_string(),
            format!(
                "{greeting}\n\nWe received a request to reset your password:\n\n{}\n\nThis link expires in 1 hour. If you did not request it, ignore this email.\n\nThe JeanPay Team",
                field(data, "link")
            ),
        ),
        "two_factor" => (
            "Your JeanPay login code".to_string(),
            format!(
                "{greeting}\n\nYour login code is {}. It expires in 10 minutes.\n\nThe JeanPay Team",
                field(data, "code")
            ),
        ),
        "transaction" => (
            format!("Transaction {}", field(data, "status")),
            format!(
                "{greeting}\n\nYour {} of {} {} (reference {}) is {}.\n\nThe JeanPay Team",
                field(data, "transaction_type"),
                field(data, "amount"),
                field(data, "currency"),
                field(data, "reference"),
                field(data, "status"),
            ),
        ),
        other => return Err(EmailError::UnknownTemplate(other.to_string())),
    };
    Ok(rendered)
}

/// Logs emails instead of sending them.
pub struct ConsoleEmailSender {
    from: String,
}

impl ConsoleEmailSender {
    pub fn new(from: &str) -> Self {
        Self {
            from: from.to_string(),
        }
    }
}

#[async_trait]
impl EmailSender for ConsoleEmailSender {
    async fn send(&self, message: EmailMessage) -> Result<(), EmailError> {
        info!(
            to = %message.to,
            from = %self.from,
            subject = %message.subject,
            body = %message.body_text,
            "Email (console provider)"
        );
        Ok(())
    }
}

/// Posts `{from, from_name, to, subject, text}` to a mail relay.
pub struct HttpEmailSender {
    http: reqwest::Client,
    api_url: String,
    api_key: String,
    from_email: String,
    from_name: String,
}

impl HttpEmailSender {
    pub fn new(
        api_url: &str,
        api_key: &str,
        from_email: &str,
        from_name: &str,
    ) -> Result<Self, EmailError> {
        if api_url.is_empty() {
            return Err(EmailError::NotConfigured);
        }
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(20))
            .build()
            .map_err(|e| EmailError::SendFailed(e.to_string()))?;
        Ok(Self {
            http,
            api_url: api_url.to_string(),
            api_key: api_key.to_string(),
            from_email: from_email.to_string(),
            from_name: from_name.to_string(),
        })
    }
}

#[async_trait]
impl EmailSender for HttpEmailSender {
    async fn send(&self, message: EmailMessage) -> Result<(), EmailError> {
        let body = serde_json::json!({
            "from": self.from_email,
            "from_name": self.from_name,
            "to": message.to,
            "subject": message.subject,
            "text": message.body_text,
        });

        let response = self
            .http
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| EmailError::SendFailed(format!("relay request failed: {e}")))?;

        if response.status().is_success() {
            info!(to = %message.to, subject = %message.subject, "Email sent via relay");
            Ok(())
        } else {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            Err(EmailError::SendFailed(format!("relay returned {status}: {text}")))
        }
    }
}

/// Build the sender selected by `EMAIL_PROVIDER`.
pub fn build_email_sender(config: &Config) -> Result<std::sync::Arc<dyn EmailSender>, AppError> {
    Ok(match config.email_provider() {
        EmailProvider::Console => std::sync::Arc::new(ConsoleEmailSender::new(&config.from_email)),
        EmailProvider::Http => std::sync::Arc::new(
            HttpEmailSender::new(
                &config.email_api_url,
                &config.email_api_key,
                &config.from_email,
                &config.from_name,
            )
            .map_err(|e| AppError::Internal(e.to_string()))?,
        ),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn renders_transaction_template() {
        let (subject, body) = render_template(
            "transaction",
            &json!({
                "name": "Ama",
                "transaction_type": "deposit",
                "amount": "5000.00",
                "currency": "NGN",
                "reference": "TOPUP_1",
                "status": "completed",
            }),
        )
        .unwrap();
        assert_eq!(subject, "Transaction completed");
        assert!(body.starts_with("Hi Ama,"));
        assert!(body.contains("deposit of 5000.00 NGN (reference TOPUP_1) is completed"));
    }

    #[test]
    fn unknown_template_is_an_error() {
        assert!(matches!(
            render_template("fax", &json!({})),
            Err(EmailError::UnknownTemplate(_))
        ));
    }

    #[test]
    fn http_sender_needs_a_url() {
        assert!(matches!(
            HttpEmailSender::new("", "key", "a@b.c", "JeanPay"),
            Err(EmailError::NotConfigured)
        ));
    }
}

//! Shared harness for the router tests.
//!
//! Tests need a Postgres database named by `TEST_DATABASE_URL`; without it
//! [`TestApp::spawn`] returns `None` and the test returns early.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use rust_decimal::Decimal;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;
use uuid::Uuid;

use jeanpay::{
    adapters::{
        email::ConsoleEmailSender,
        payment::{CheckoutRequest, CheckoutSession, PaymentProcessor},
        upload::LocalUploader,
    },
    build_job_server, build_router,
    config::Config,
    db::{self, DbPool},
    error::AppError,
    jobs::broker::{Broker, MemoryBroker},
    models::user::User,
    money::Currency,
    security::tokens::generate_public_user_id,
    services::{user_service, wallet_service},
    state::AppState,
};

pub const PAYSTACK_SECRET: &str = "sk_test_paystack";
pub const MOMO_SECRET: &str = "sk_test_momo";

/// Hosted checkout that never leaves the process.
pub struct FakeProcessor;

#[async_trait]
impl PaymentProcessor for FakeProcessor {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn initialize(&self, request: &CheckoutRequest) -> Result<CheckoutSession, AppError> {
        Ok(CheckoutSession {
            authorization_url: format!("https://checkout.test/{}", request.reference),
            reference: request.reference.clone(),
        })
    }
}

pub struct TestApp {
    pub state: AppState,
    pub broker: Arc<MemoryBroker>,
    pub router: Router,
}

pub struct TestUser {
    pub user: User,
    pub token: String,
}

impl TestApp {
    pub async fn spawn() -> Option<TestApp> {
        let Ok(url) = std::env::var("TEST_DATABASE_URL") else {
            eprintln!("TEST_DATABASE_URL not set; skipping");
            return None;
        };

        let upload_dir = std::env::temp_dir().join(format!("jeanpay-test-{}", Uuid::new_v4()));
        let config = Config::from_pairs([
            ("JWT_SECRET_KEY", "integration-test-secret"),
            ("APP_ENV", "test"),
            ("QUEUE_BACKEND", "memory"),
            ("DATABASE_URL", url.as_str()),
            ("PAYSTACK_SECRET_KEY", PAYSTACK_SECRET),
            ("MOMO_SECRET_KEY", MOMO_SECRET),
            ("UPLOAD_DIR", upload_dir.to_string_lossy().as_ref()),
        ])
        .expect("test config");

        let pool = db::create_pool(&config.database_url(), 5)
            .await
            .expect("connect to TEST_DATABASE_URL");
        db::run_migrations(&pool).await.expect("migrations");

        let broker = Arc::new(MemoryBroker::new());
        let uploader = Arc::new(LocalUploader::new(&upload_dir, &config.server_url));
        let state = AppState::new(
            config,
            pool,
            broker.clone(),
            Arc::new(FakeProcessor),
            uploader,
        );
        let router = build_router(state.clone());

        Some(TestApp {
            state,
            broker,
            router,
        })
    }

    pub fn pool(&self) -> &DbPool {
        &self.state.pool
    }

    /// A verified user with both wallets and a fresh access token.
    pub async fn create_user(&self, country: &str, is_admin: bool) -> TestUser {
        let id: Uuid = sqlx::query_scalar(
            r#"
            INSERT INTO users (user_id, full_name, email, password_hash, is_admin, is_verified, country)
            VALUES ($1, 'Test User', $2, 'not-a-hash', $3, true, $4::country_code)
            RETURNING id
            "#,
        )
        .bind(generate_public_user_id() + rand_suffix())
        .bind(format!("user-{}@jeanpay.test", Uuid::new_v4()))
        .bind(is_admin)
        .bind(country)
        .fetch_one(self.pool())
        .await
        .expect("insert user");

        let mut conn = self.pool().acquire().await.expect("acquire");
        wallet_service::find_or_create_wallets(&mut conn, id)
            .await
            .expect("wallets");
        drop(conn);

        let user = user_service::find_by_id(self.pool(), id).await.expect("user");
        let token = self.state.jwt.issue_pair(&user).expect("tokens").access_token;
        TestUser { user, token }
    }

    pub async fn set_balance(&self, user_id: Uuid, currency: Currency, amount: Decimal) {
        sqlx::query("UPDATE wallets SET balance = $3 WHERE user_id = $1 AND currency = $2")
            .bind(user_id)
            .bind(currency)
            .bind(amount)
            .execute(self.pool())
            .await
            .expect("set balance");
    }

    pub async fn balance(&self, user_id: Uuid, currency: Currency) -> Decimal {
        wallet_service::get_wallet(self.pool(), user_id, currency)
            .await
            .expect("wallet")
            .balance
    }

    pub async fn transaction_count(&self, user_id: Uuid) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM transactions WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(self.pool())
            .await
            .expect("count")
    }

    /// Send a request through the router. `body` is JSON when present.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("request");
        self.send(request).await
    }

    /// Post a raw webhook body with its signature header.
    pub async fn webhook(&self, provider: &str, body: &str, signature: &str) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(Method::POST)
            .uri(format!("/api/webhooks/{provider}"))
            .header(header::CONTENT_TYPE, "application/json")
            .header(format!("x-{provider}-signature"), signature)
            .body(Body::from(body.to_string()))
            .expect("request");
        self.send(request).await
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible");
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    /// Run the worker pool until every queued task has been handled.
    pub async fn drain_jobs(&self) {
        let shutdown = CancellationToken::new();
        let broker: Arc<dyn Broker> = self.broker.clone();
        let server = build_job_server(
            &self.state,
            broker,
            Arc::new(ConsoleEmailSender::new("no-reply@jeanpay.test")),
        );
        let handle = tokio::spawn(server.run(shutdown.clone()));

        for _ in 0..100 {
            let queues = self.state.inspector.queues().await.expect("queue stats");
            let busy: i64 = queues.iter().map(|q| q.pending + q.active).sum();
            if busy == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }

        shutdown.cancel();
        handle.await.expect("job server");
    }
}

fn rand_suffix() -> i64 {
    // Public ids are 7 digits; widen the space so parallel tests do not collide.
    (Uuid::new_v4().as_u128() % 1_000_000_000) as i64 * 10_000_000
}

pub fn dec(value: &str) -> Decimal {
    value.parse().expect("decimal literal")
}

pub fn data(body: &Value) -> &Value {
    &body["data"]
}

/// A money field from a response, whether rendered as string or number.
pub fn amount(value: &Value) -> Decimal {
    match value {
        Value::String(s) => s.parse().expect("decimal string"),
        Value::Number(n) => n.to_string().parse().expect("decimal number"),
        other => panic!("not an amount: {other}"),
    }
}

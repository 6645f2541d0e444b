//! JeanPay - NGN/GHS wallet and payments backend
//!
//! Users hold one wallet per supported currency, fund them through hosted
//! checkout, convert between them at admin-managed rates, and send money to
//! bank or mobile money recipients. Processor webhooks settle pending
//! transactions; admins approve or reject payouts.
//!
//! # Architecture
//!
//! - **Web Framework**: Axum (async HTTP server)
//! - **Database**: PostgreSQL with sqlx; every balance change runs inside a
//!   store transaction with the wallet row locked
//! - **Authentication**: JWT access/refresh pair, bearer header or cookies
//! - **Side effects**: notifications, activity lines and emails go through a
//!   prioritized job queue ([`jobs`]) after commit

pub mod adapters;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod jobs;
pub mod logging;
pub mod middleware;
pub mod models;
pub mod money;
pub mod security;
pub mod services;
pub mod state;

use std::sync::Arc;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{
        HeaderName, HeaderValue, Method,
        header::{AUTHORIZATION, CONTENT_TYPE},
    },
    middleware as axum_middleware,
    routing::{delete, get, patch, post, put},
};
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

use crate::adapters::email::EmailSender;
use crate::adapters::upload::MAX_IMAGE_BYTES;
use crate::jobs::broker::Broker;
use crate::jobs::handlers::{JobContext, build_registry};
use crate::jobs::server::JobServer;
use crate::middleware::auth::{require_admin, require_auth};
use crate::middleware::metrics::{metrics_handler, metrics_middleware};
use crate::state::AppState;

/// Default cap on request bodies; profile pictures get their own.
const BODY_LIMIT: usize = 1024 * 1024;

fn cors_layer(state: &AppState) -> CorsLayer {
    let origins: Vec<HeaderValue> = state
        .config
        .allowed_origins()
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    // Cookies ride along, so origins and headers are listed explicitly.
    CorsLayer::new()
        .allow_origin(origins)
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            AUTHORIZATION,
            CONTENT_TYPE,
            HeaderName::from_static("x-requested-with"),
        ])
}

fn admin_routes() -> Router<AppState> {
    use crate::handlers::admin;

    Router::new()
        .route("/dashboard", post(admin::dashboard))
        .route("/users/all", post(admin::list_users))
        .route("/users/block/{id}", patch(admin::block_user))
        .route("/users/unblock/{id}", patch(admin::unblock_user))
        .route("/transactions/all", post(admin::list_transactions))
        .route("/transactions/approve/{id}", patch(admin::approve_transaction))
        .route("/transactions/reject/{id}", patch(admin::reject_transaction))
        .route("/transactions/logs/{id}", get(admin::transaction_logs))
        .route("/rates/history", get(admin::rate_history))
        .route("/rates/add", post(admin::add_rate))
        .route("/queues", get(admin::list_queues))
        .route("/queues/{name}", delete(admin::delete_queue))
        .route("/queues/{name}/pause", post(admin::pause_queue))
        .route("/queues/{name}/unpause", post(admin::unpause_queue))
        .route_layer(axum_middleware::from_fn(require_admin))
}

fn protected_routes(state: &AppState) -> Router<AppState> {
    use crate::handlers::{convert, notifications, transactions, users, wallet};

    Router::new()
        // User
        .route("/user/retrieve", post(users::retrieve))
        .route(
            "/user/profile-picture",
            post(users::upload_profile_picture).layer(DefaultBodyLimit::max(MAX_IMAGE_BYTES)),
        )
        // Wallet
        .route("/wallet/balance", get(wallet::balance))
        .route("/wallet/topup", post(wallet::topup))
        .route("/wallet/topup/{id}", get(wallet::get_topup))
        .route("/wallet/withdraw", post(wallet::withdraw))
        .route("/wallet/history", get(wallet::history))
        // Conversion
        .route("/convert/rates", get(convert::rates))
        .route("/convert/calculate", post(convert::calculate))
        .route("/convert/exchange", post(convert::exchange))
        .route("/convert/history", get(convert::history))
        // Transactions
        .route("/transactions/new", post(transactions::create_transaction))
        .route("/transactions/history", get(transactions::history))
        .route("/transactions/details/{id}", get(transactions::details))
        .route("/transactions/filter", post(transactions::filter))
        .route("/transactions/stats", get(transactions::stats))
        // Notifications
        .route("/notifications/all", get(notifications::list))
        .route("/notifications/unread-count", get(notifications::unread_count))
        .route("/notifications/mark-read/{id}", put(notifications::mark_read))
        .route("/notifications/mark-all-read", put(notifications::mark_all_read))
        .route("/notifications/delete-bulk", delete(notifications::delete_bulk))
        .route("/activities", get(notifications::activities))
        .nest("/admin", admin_routes())
        .route_layer(axum_middleware::from_fn_with_state(state.clone(), require_auth))
}

fn public_routes() -> Router<AppState> {
    use crate::handlers::{auth, errors, webhooks};

    Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/verify", post(auth::verify_email))
        .route("/auth/verify-otp", post(auth::verify_otp))
        .route("/auth/resend-verification", post(auth::resend_verification))
        .route("/auth/password-reset-email", post(auth::password_reset_email))
        .route("/auth/reset-password", post(auth::reset_password))
        .route("/auth/refresh-token", post(auth::refresh_token))
        .route("/auth/logout", post(auth::logout))
        .route("/admin/login", post(auth::admin_login))
        .route("/webhooks/paystack", post(webhooks::paystack))
        .route("/webhooks/momo", post(webhooks::momo))
        .route("/errors", get(errors::list))
        .route("/errors/{code}", get(errors::get))
}

fn test_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/fund-wallet", post(crate::handlers::testing::fund_wallet))
        .route_layer(axum_middleware::from_fn_with_state(state.clone(), require_auth))
}

/// Build the full HTTP application.
///
/// # Layout
///
/// - `/api/*` public: auth, admin login, webhooks, error catalogue
/// - `/api/protected/*` behind [`require_auth`]
/// - `/api/protected/admin/*` additionally behind [`require_admin`]
/// - `/api/test/*` outside production only
/// - `/health`, `/metrics`, `/uploads/*`
pub fn build_router(state: AppState) -> Router {
    let mut api = public_routes().nest("/protected", protected_routes(&state));
    if state.config.test_endpoints_enabled() {
        api = api.nest("/test", test_routes(&state));
    }

    Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/metrics", get(metrics_handler))
        .nest("/api", api)
        .nest_service("/uploads", ServeDir::new(&state.config.upload_dir))
        .layer(DefaultBodyLimit::max(BODY_LIMIT))
        .layer(axum_middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&state))
        .with_state(state)
}

/// Bind every task handler to the broker behind `state.jobs`.
pub fn build_job_server(
    state: &AppState,
    broker: Arc<dyn Broker>,
    email: Arc<dyn EmailSender>,
) -> JobServer {
    let registry = build_registry(JobContext {
        pool: state.pool.clone(),
        email,
        frontend_url: state.config.frontend_url.clone(),
    });
    JobServer::new(broker, registry, state.config.queue())
}

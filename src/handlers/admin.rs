//! Admin console endpoints, mounted under `/api/protected/admin` behind
//! `require_auth` and `require_admin`.
//!
//! Every mutation writes an admin log line inside the same store
//! transaction as the change it records.

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
};
use serde::Serialize;
use uuid::Uuid;

use crate::{
    error::AppError,
    jobs::broker::QueueStats,
    middleware::auth::{AuthUser, ClientInfo},
    models::{
        admin_log::{AdminLog, DashboardStats, UserListRequest},
        rate::{ExchangeRate, RateHistoryQuery, SetRateRequest},
        response::{ApiResponse, PageParams},
        transaction::{RejectRequest, TransactionFilter, TransactionWithDetails},
        user::UserResponse,
    },
    services::{
        admin_service, rate_service,
        transaction_service::{self, Transition},
        transaction_store::{self, ListFilter},
    },
    state::AppState,
};

#[derive(Debug, Serialize)]
pub struct QueuePurged {
    pub queue: String,
    pub removed: u64,
}

/// Platform totals.
///
/// # Response (200)
///
/// ```json
/// {
///   "error": false,
///   "message": "Dashboard retrieved",
///   "data": {
///     "total_users": 120, "verified_users": 98, "blocked_users": 2,
///     "pending_transactions": 7, "completed_transactions": 1540, "failed_transactions": 31,
///     "volume": [{ "currency": "NGN", "completed_amount": "15400000.00" }],
///     "balances": [{ "currency": "GHS", "total_balance": "84210.55" }]
///   }
/// }
/// ```
pub async fn dashboard(
    State(state): State<AppState>,
) -> Result<ApiResponse<DashboardStats>, AppError> {
    let stats = admin_service::dashboard(&state.pool).await?;
    Ok(ApiResponse::ok("Dashboard retrieved", stats))
}

pub async fn list_users(
    State(state): State<AppState>,
    Json(request): Json<UserListRequest>,
) -> Result<ApiResponse<Vec<UserResponse>>, AppError> {
    let (users, meta) = admin_service::list_users(&state.pool, &request).await?;
    Ok(ApiResponse::paginated("Users retrieved", users, meta))
}

pub async fn block_user(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    client: ClientInfo,
    Path(id): Path<Uuid>,
) -> Result<ApiResponse<UserResponse>, AppError> {
    if id == auth.id {
        return Err(AppError::Validation("You cannot block yourself".to_string()));
    }
    let user = admin_service::set_blocked(&state.pool, &client.actor(&auth), id, true).await?;
    Ok(ApiResponse::ok("User blocked", user))
}

pub async fn unblock_user(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    client: ClientInfo,
    Path(id): Path<Uuid>,
) -> Result<ApiResponse<UserResponse>, AppError> {
    let user = admin_service::set_blocked(&state.pool, &client.actor(&auth), id, false).await?;
    Ok(ApiResponse::ok("User unblocked", user))
}

/// All transactions across users. `user_id` in the body narrows to one user.
pub async fn list_transactions(
    State(state): State<AppState>,
    Json(filter): Json<TransactionFilter>,
) -> Result<ApiResponse<Vec<TransactionWithDetails>>, AppError> {
    let page = PageParams {
        page: filter.page,
        limit: filter.limit,
    };
    let parsed = ListFilter::try_from(&filter)?;
    let (items, meta) = transaction_store::list(&state.pool, &parsed, page).await?;
    Ok(ApiResponse::paginated("Transactions retrieved", items, meta))
}

/// Approve a pending transaction.
///
/// Deposits credit the `to` wallet; withdrawals and wallet-funded transfers
/// were debited at creation, so approval only settles the row.
///
/// # Errors
///
/// - `404` unknown transaction
/// - `409` the transaction is no longer pending
pub async fn approve_transaction(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    client: ClientInfo,
    Path(id): Path<Uuid>,
) -> Result<ApiResponse<Transition>, AppError> {
    let transition = transaction_service::approve(&state, &client.actor(&auth), id).await?;
    Ok(ApiResponse::ok("Transaction approved", transition))
}

/// Reject a pending transaction. Funds that left the wallet at creation are
/// refunded in the same store transaction.
///
/// # Request Body
///
/// ```json
/// { "reason": "Account name does not match" }
/// ```
pub async fn reject_transaction(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    client: ClientInfo,
    Path(id): Path<Uuid>,
    Json(request): Json<RejectRequest>,
) -> Result<ApiResponse<Transition>, AppError> {
    let transition =
        transaction_service::reject(&state, &client.actor(&auth), id, &request.reason).await?;
    Ok(ApiResponse::ok("Transaction rejected", transition))
}

/// Admin actions recorded against one transaction.
pub async fn transaction_logs(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<ApiResponse<Vec<AdminLog>>, AppError> {
    let logs = admin_service::logs_for_target(&state.pool, "transaction", &id.to_string()).await?;
    Ok(ApiResponse::ok("Admin logs retrieved", logs))
}

pub async fn rate_history(
    State(state): State<AppState>,
    Query(query): Query<RateHistoryQuery>,
) -> Result<ApiResponse<Vec<ExchangeRate>>, AppError> {
    let (rates, meta) = rate_service::history(&state.pool, &query).await?;
    Ok(ApiResponse::paginated("Rate history retrieved", rates, meta))
}

/// Set the active rate for a pair. The previous active rate is closed.
///
/// # Request Body
///
/// ```json
/// { "from_currency": "NGN", "to_currency": "GHS", "rate": "0.0053" }
/// ```
pub async fn add_rate(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    client: ClientInfo,
    Json(request): Json<SetRateRequest>,
) -> Result<ApiResponse<ExchangeRate>, AppError> {
    let rate = rate_service::set_rate(&state.pool, &client.actor(&auth), &request).await?;
    Ok(ApiResponse::created("Exchange rate set", rate))
}

pub async fn list_queues(
    State(state): State<AppState>,
) -> Result<ApiResponse<Vec<QueueStats>>, AppError> {
    let queues = state.inspector.queues().await?;
    Ok(ApiResponse::ok("Queues retrieved", queues))
}

pub async fn pause_queue(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<ApiResponse<QueueStats>, AppError> {
    state.inspector.pause(&name).await?;
    let stats = state.inspector.queue(&name).await?;
    Ok(ApiResponse::ok("Queue paused", stats))
}

pub async fn unpause_queue(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<ApiResponse<QueueStats>, AppError> {
    state.inspector.unpause(&name).await?;
    let stats = state.inspector.queue(&name).await?;
    Ok(ApiResponse::ok("Queue resumed", stats))
}

pub async fn delete_queue(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<ApiResponse<QueuePurged>, AppError> {
    let removed = state.inspector.delete_queue(&name).await?;
    Ok(ApiResponse::ok(
        "Queue purged",
        QueuePurged {
            queue: name,
            removed,
        },
    ))
}

//! Transaction HTTP handlers.
//!
//! This module implements the user-facing transaction endpoints:
//! - POST /api/protected/transactions/new - Send money to a bank or momo recipient
//! - GET  /api/protected/transactions/history - Paginated history
//! - GET  /api/protected/transactions/details/{id} - One transaction
//! - POST /api/protected/transactions/filter - History with filters in the body
//! - GET  /api/protected/transactions/stats - Per-status counts and volume

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
};
use uuid::Uuid;

use crate::{
    error::AppError,
    middleware::auth::{AuthUser, ClientInfo},
    models::{
        response::{ApiResponse, PageParams},
        transaction::{
            CreateOutcome, CreateTransferRequest, TransactionFilter, TransactionStats,
            TransactionWithDetails,
        },
    },
    services::{
        transaction_service,
        transaction_store::{self, ListFilter},
    },
    state::AppState,
};

/// Create a transfer.
///
/// # Request Body
///
/// ```json
/// {
///   "amount": "25000.00",
///   "from_currency": "NGN",
///   "to_currency": "GHS",
///   "method_of_payment": "wallet",
///   "recipient_type": "momo",
///   "recipient_name": "Kofi Boateng",
///   "phone_number": "0241234567",
///   "network": "MTN"
/// }
/// ```
///
/// # Response (201)
///
/// The pending transaction. Wallet-funded transfers debit immediately and
/// wait for admin approval; `checkout` transfers also carry an
/// `authorization_url`.
pub async fn create_transaction(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    ClientInfo(meta): ClientInfo,
    Json(request): Json<CreateTransferRequest>,
) -> Result<ApiResponse<CreateOutcome>, AppError> {
    let outcome = transaction_service::create_transfer(&state, &auth.user, &request, &meta).await?;
    Ok(ApiResponse::created("Transaction created", outcome))
}

async fn list_for(
    state: &AppState,
    auth: &AuthUser,
    filter: &TransactionFilter,
) -> Result<ApiResponse<Vec<TransactionWithDetails>>, AppError> {
    let page = PageParams {
        page: filter.page,
        limit: filter.limit,
    };
    let mut parsed = ListFilter::try_from(filter)?;
    // Never trust a caller-supplied owner.
    parsed.user_id = Some(auth.id);
    let (items, meta) = transaction_store::list(&state.pool, &parsed, page).await?;
    Ok(ApiResponse::paginated("Transactions retrieved", items, meta))
}

pub async fn history(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Query(filter): Query<TransactionFilter>,
) -> Result<ApiResponse<Vec<TransactionWithDetails>>, AppError> {
    list_for(&state, &auth, &filter).await
}

/// Same listing as `history`, filters in a JSON body.
pub async fn filter(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(filter): Json<TransactionFilter>,
) -> Result<ApiResponse<Vec<TransactionWithDetails>>, AppError> {
    list_for(&state, &auth, &filter).await
}

/// # Errors
///
/// `404` when the transaction does not exist or belongs to someone else.
pub async fn details(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<ApiResponse<TransactionWithDetails>, AppError> {
    let transaction = transaction_store::find_for_user(&state.pool, auth.id, id).await?;
    Ok(ApiResponse::ok("Transaction retrieved", transaction))
}

pub async fn stats(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> Result<ApiResponse<TransactionStats>, AppError> {
    let stats = transaction_store::stats(&state.pool, Some(auth.id)).await?;
    Ok(ApiResponse::ok("Transaction stats retrieved", stats))
}

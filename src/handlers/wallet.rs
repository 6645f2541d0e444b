//! Wallet endpoints.
//!
//! - GET  /api/protected/wallet/balance
//! - POST /api/protected/wallet/topup
//! - GET  /api/protected/wallet/topup/{id}
//! - POST /api/protected/wallet/withdraw
//! - GET  /api/protected/wallet/history

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
        transaction::{CreateOutcome, TransactionFilter, TransactionWithDetails},
        wallet::{BalanceResponse, TopUpRequest, WithdrawRequest},
    },
    services::{
        transaction_service,
        transaction_store::{self, ListFilter},
        wallet_service,
    },
    state::AppState,
};

/// Both wallets and the balance in the user's home currency.
///
/// # Response (200)
///
/// ```json
/// {
///   "error": false,
///   "message": "Wallet balance retrieved",
///   "data": {
///     "wallets": [
///       { "currency": "NGN", "balance": "100000.00", "wallet_number": "3012345678", … },
///       { "currency": "GHS", "balance": "0.00", … }
///     ],
///     "total_balance": "100000.00",
///     "total_currency": "NGN"
///   }
/// }
/// ```
pub async fn balance(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> Result<ApiResponse<BalanceResponse>, AppError> {
    let wallets = wallet_service::get_wallets(&state.pool, auth.id).await?;
    let (total_balance, total_currency) =
        wallet_service::total_balance(&state.pool, &auth.user).await?;
    Ok(ApiResponse::ok(
        "Wallet balance retrieved",
        BalanceResponse {
            wallets,
            total_balance,
            total_currency,
        },
    ))
}

/// Start a top-up. The row stays `pending` until the processor's webhook
/// arrives; `authorization_url` is where the client sends the customer.
///
/// # Request Body
///
/// ```json
/// { "amount": "5000.00", "currency": "NGN", "payment_method": "card" }
/// ```
pub async fn topup(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    ClientInfo(meta): ClientInfo,
    Json(request): Json<TopUpRequest>,
) -> Result<ApiResponse<CreateOutcome>, AppError> {
    let outcome = transaction_service::deposit(&state, &auth.user, &request, &meta).await?;
    Ok(ApiResponse::created("Top-up initiated", outcome))
}

pub async fn get_topup(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<ApiResponse<TransactionWithDetails>, AppError> {
    let topup = transaction_service::get_topup(&state, auth.id, id).await?;
    Ok(ApiResponse::ok("Top-up retrieved", topup))
}

/// Request a payout. Funds leave the wallet immediately and the row waits
/// for admin approval; rejection refunds.
///
/// # Errors
///
/// - `400` `INSUFFICIENT_FUNDS` when the balance is short
/// - `400` missing account details for the chosen rail
pub async fn withdraw(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    ClientInfo(meta): ClientInfo,
    Json(request): Json<WithdrawRequest>,
) -> Result<ApiResponse<TransactionWithDetails>, AppError> {
    let transaction = transaction_service::withdraw(&state, &auth.user, &request, &meta).await?;
    Ok(ApiResponse::created(
        "Withdrawal submitted for approval",
        transaction,
    ))
}

/// Every transaction touching the caller's wallets, newest first.
pub async fn history(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Query(filter): Query<TransactionFilter>,
) -> Result<ApiResponse<Vec<TransactionWithDetails>>, AppError> {
    let page = PageParams {
        page: filter.page,
        limit: filter.limit,
    };
    let mut filter = ListFilter::try_from(&filter)?;
    filter.user_id = Some(auth.id);
    let (items, meta) = transaction_store::list(&state.pool, &filter, page).await?;
    Ok(ApiResponse::paginated("Wallet history retrieved", items, meta))
}

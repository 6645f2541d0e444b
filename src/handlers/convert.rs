//! Currency conversion endpoints.
//!
//! - GET  /api/protected/convert/rates
//! - POST /api/protected/convert/calculate
//! - POST /api/protected/convert/exchange
//! - GET  /api/protected/convert/history

use axum::{
    Extension, Json,
    extract::{Query, State},
};
use serde::Serialize;

use crate::{
    error::AppError,
    middleware::auth::{AuthUser, ClientInfo},
    models::{
        conversion::{ConversionQuote, ConversionRequest},
        rate::RateQuote,
        response::{ApiResponse, PageParams},
        transaction::TransactionWithDetails,
    },
    services::{conversion_service, rate_service},
    state::AppState,
};

#[derive(Debug, Serialize)]
pub struct ExchangeResponse {
    pub transaction: TransactionWithDetails,
    pub quote: ConversionQuote,
}

/// Current rate for every supported pair.
pub async fn rates(State(state): State<AppState>) -> Result<ApiResponse<Vec<RateQuote>>, AppError> {
    let rates = rate_service::all_rates(&state.pool).await?;
    Ok(ApiResponse::ok("Exchange rates retrieved", rates))
}

/// Price a conversion without moving money.
///
/// # Request Body
///
/// ```json
/// { "from": "NGN", "to": "GHS", "amount": "10000.00" }
/// ```
///
/// # Response (200)
///
/// ```json
/// {
///   "error": false,
///   "message": "Conversion calculated",
///   "data": {
///     "from": "NGN", "to": "GHS",
///     "original": "10000.00", "fee": "200.00", "fee_percent": "2",
///     "net": "9800.00", "converted": "51.94",
///     "rate": "0.0053", "rate_source": "manual", "eta": "instant"
///   }
/// }
/// ```
pub async fn calculate(
    State(state): State<AppState>,
    Json(request): Json<ConversionRequest>,
) -> Result<ApiResponse<ConversionQuote>, AppError> {
    let quote = conversion_service::calculate(&state.pool, state.fee_percent(), &request).await?;
    Ok(ApiResponse::ok("Conversion calculated", quote))
}

/// Convert between the caller's own wallets. Completes synchronously.
///
/// # Errors
///
/// - `400` `INSUFFICIENT_FUNDS`; nothing is written
/// - `400` same or unsupported currency pair, non-positive amount
pub async fn exchange(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    ClientInfo(meta): ClientInfo,
    Json(request): Json<ConversionRequest>,
) -> Result<ApiResponse<ExchangeResponse>, AppError> {
    let (transaction, quote) =
        conversion_service::execute(&state, &auth.user, &request, &meta).await?;
    Ok(ApiResponse::created(
        "Conversion successful",
        ExchangeResponse { transaction, quote },
    ))
}

pub async fn history(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Query(page): Query<PageParams>,
) -> Result<ApiResponse<Vec<TransactionWithDetails>>, AppError> {
    let (items, meta) = conversion_service::history(&state.pool, auth.id, page).await?;
    Ok(ApiResponse::paginated("Conversion history retrieved", items, meta))
}

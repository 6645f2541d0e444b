//! Endpoints for local and staging environments. Not mounted in production.

use axum::{Extension, Json, extract::State};

use crate::{
    error::AppError,
    middleware::auth::AuthUser,
    models::{response::ApiResponse, wallet::FundWalletRequest},
    money::Currency,
    services::{
        transaction_service::{self, Transition},
        user_service,
    },
    state::AppState,
};

/// Credit a wallet through a completed deposit, bypassing the processor.
///
/// # Request Body
///
/// ```json
/// { "currency": "NGN", "amount": "100000.00" }
/// ```
///
/// Admins may pass `user_id` to fund someone else's wallet.
pub async fn fund_wallet(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(request): Json<FundWalletRequest>,
) -> Result<ApiResponse<Transition>, AppError> {
    let currency: Currency = request.currency.parse()?;
    let user = match request.user_id {
        Some(id) if id != auth.id => {
            if !auth.is_admin {
                return Err(AppError::Forbidden(
                    "Only admins can fund another user's wallet".to_string(),
                ));
            }
            user_service::find_by_id(&state.pool, id).await?
        }
        _ => auth.user,
    };

    let transition = transaction_service::fund_wallet(&state, &user, currency, request.amount).await?;
    Ok(ApiResponse::ok("Wallet funded", transition))
}

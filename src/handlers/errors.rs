//! Catalogue of user-facing error codes, for front-ends to render.

use axum::extract::Path;

use crate::{
    error::AppError,
    models::{
        error_catalog::{ErrorCode, ErrorInfo},
        response::ApiResponse,
    },
};

/// `GET /api/errors`
pub async fn list() -> ApiResponse<Vec<ErrorInfo>> {
    let entries = ErrorCode::ALL.iter().map(ErrorCode::info).collect();
    ApiResponse::ok("Error catalogue retrieved", entries)
}

/// `GET /api/errors/{code}`, e.g. `/api/errors/INSUFFICIENT_FUNDS`.
pub async fn get(Path(code): Path<String>) -> Result<ApiResponse<ErrorInfo>, AppError> {
    let code = ErrorCode::parse(&code).ok_or_else(|| AppError::NotFound("Error code".to_string()))?;
    Ok(ApiResponse::ok("Error retrieved", code.info()))
}

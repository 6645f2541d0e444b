//! Profile endpoints.
//!
//! - POST /api/protected/user/retrieve
//! - POST /api/protected/user/profile-picture

use axum::{
    Extension,
    body::Bytes,
    extract::State,
    http::{HeaderMap, header::CONTENT_TYPE},
};

use crate::{
    adapters::upload::{MAX_IMAGE_BYTES, image_extension},
    error::AppError,
    middleware::auth::AuthUser,
    models::{response::ApiResponse, user::UserResponse},
    services::user_service::{self, UserProfile},
    state::AppState,
};

/// Profile plus both wallets.
pub async fn retrieve(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> Result<ApiResponse<UserProfile>, AppError> {
    let profile = user_service::retrieve(&state, auth.id).await?;
    Ok(ApiResponse::ok("User retrieved successfully", profile))
}

/// Upload a profile picture.
///
/// The body is the raw image; `Content-Type` must be one of
/// `image/jpeg`, `image/png`, `image/webp` or `image/gif`, at most 5 MB.
pub async fn upload_profile_picture(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<ApiResponse<UserResponse>, AppError> {
    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .filter(|ct| image_extension(ct).is_some())
        .ok_or_else(|| {
            AppError::Validation("Only JPEG, PNG, WebP or GIF images are accepted".to_string())
        })?;
    if body.len() > MAX_IMAGE_BYTES {
        return Err(AppError::Validation("Image is larger than 5 MB".to_string()));
    }

    let user = user_service::update_profile_picture(&state, auth.id, &body, content_type).await?;
    Ok(ApiResponse::ok("Profile picture updated", user))
}

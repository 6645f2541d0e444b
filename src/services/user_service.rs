//! User lookups and self-service profile changes.

use serde::Serialize;
use sqlx::PgExecutor;
use uuid::Uuid;

use crate::{
    error::AppError,
    models::{
        user::{User, UserResponse},
        wallet::Wallet,
    },
    services::wallet_service,
    state::AppState,
};

/// `POST /user/retrieve` payload.
#[derive(Debug, Serialize)]
pub struct UserProfile {
    pub user: UserResponse,
    pub wallets: Vec<Wallet>,
}

pub async fn find_by_id<'e, E: PgExecutor<'e>>(executor: E, id: Uuid) -> Result<User, AppError> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1 AND deleted_at IS NULL")
        .bind(id)
        .fetch_optional(executor)
        .await?
        .ok_or_else(|| AppError::NotFound("User".to_string()))
}

pub async fn find_by_email<'e, E: PgExecutor<'e>>(
    executor: E,
    email: &str,
) -> Result<Option<User>, AppError> {
    let user = sqlx::query_as::<_, User>(
        "SELECT * FROM users WHERE LOWER(email) = LOWER($1) AND deleted_at IS NULL",
    )
    .bind(email.trim())
    .fetch_optional(executor)
    .await?;
    Ok(user)
}

/// Blocked accounts keep their data but cannot act.
pub fn ensure_active(user: &User) -> Result<(), AppError> {
    if user.is_blocked {
        return Err(AppError::Forbidden("Account is blocked".to_string()));
    }
    Ok(())
}

/// Profile plus wallets. Wallets are created on first access if missing.
pub async fn retrieve(state: &AppState, user_id: Uuid) -> Result<UserProfile, AppError> {
    let user = find_by_id(&state.pool, user_id).await?;
    let mut conn = state.pool.acquire().await?;
    let wallets = wallet_service::find_or_create_wallets(&mut conn, user.id).await?;
    Ok(UserProfile {
        user: user.into(),
        wallets,
    })
}

/// Store a new profile picture and point the user at it.
pub async fn update_profile_picture(
    state: &AppState,
    user_id: Uuid,
    bytes: &[u8],
    content_type: &str,
) -> Result<UserResponse, AppError> {
    let url = state
        .uploader
        .upload(bytes, content_type, "profile_pictures")
        .await?;

    let user = sqlx::query_as::<_, User>(
        r#"
        UPDATE users SET profile_picture = $2, updated_at = NOW()
        WHERE id = $1 AND deleted_at IS NULL
        RETURNING *
        "#,
    )
    .bind(user_id)
    .bind(&url)
    .fetch_optional(&state.pool)
    .await?
    .ok_or_else(|| AppError::NotFound("User".to_string()))?;

    Ok(user.into())
}

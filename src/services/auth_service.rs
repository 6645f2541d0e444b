//! Registration, login and the one-time token flows.
//!
//! Verification links, reset links and two-factor codes share one pattern:
//! a random secret goes out by email, its SHA-256 is stored in
//! `auth_tokens` with an expiry, and consuming it is a single `UPDATE` that
//! only matches an unexpired, unconsumed row.

use chrono::Utc;
use sqlx::PgConnection;
use uuid::Uuid;

use crate::{
    error::AppError,
    jobs::payloads::{
        CreateNotificationRequest, PasswordResetEmailPayload, TwoFactorEmailPayload,
        VerificationEmailPayload, WelcomeEmailPayload,
    },
    models::{
        notification::NotificationType,
        user::{
            AuthTokenPurpose, Country, LoginOutcome, LoginRequest, RegisterRequest,
            ResetPasswordRequest, TokenPair, User, UserResponse, VerifyOtpRequest,
        },
    },
    security::{
        password::{hash_password, validate_password_strength, verify_password},
        tokens::{generate_link_token, generate_otp, generate_public_user_id, hash_token},
    },
    services::{
        activity_service::{self, ClientMeta},
        user_service, wallet_service,
    },
    state::AppState,
};

/// Draws of the public numeric id before registration gives up.
const PUBLIC_ID_ATTEMPTS: usize = 5;

fn invalid_token() -> AppError {
    AppError::Unauthorized("Invalid or expired token".to_string())
}

fn constraint_name(err: &AppError) -> Option<String> {
    match err {
        AppError::Database(sqlx::Error::Database(db)) => db.constraint().map(str::to_string),
        _ => None,
    }
}

fn normalize_email(email: &str) -> Result<String, AppError> {
    let email = email.trim().to_ascii_lowercase();
    let valid = email
        .split_once('@')
        .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'));
    if !valid {
        return Err(AppError::Validation("A valid email address is required".to_string()));
    }
    Ok(email)
}

/// Store a new secret for `(user, purpose)`, retiring older unused ones.
pub async fn issue_auth_token(
    conn: &mut PgConnection,
    user_id: Uuid,
    purpose: AuthTokenPurpose,
) -> Result<String, AppError> {
    let raw = match purpose {
        AuthTokenPurpose::TwoFactor => generate_otp(),
        AuthTokenPurpose::EmailVerification | AuthTokenPurpose::PasswordReset => {
            generate_link_token()
        }
    };

    sqlx::query(
        r#"
        UPDATE auth_tokens SET consumed_at = NOW()
        WHERE user_id = $1 AND purpose = $2 AND consumed_at IS NULL
        "#,
    )
    .bind(user_id)
    .bind(purpose)
    .execute(&mut *conn)
    .await?;

    sqlx::query(
        r#"
        INSERT INTO auth_tokens (user_id, purpose, token_hash, expires_at)
        VALUES ($1, $2, $3, $4)
        "#,
    )
    .bind(user_id)
    .bind(purpose)
    .bind(hash_token(&raw))
    .bind(Utc::now() + purpose.ttl())
    .execute(&mut *conn)
    .await?;

    Ok(raw)
}

/// Consume a secret and return its owner.
///
/// `owner` narrows the lookup for short codes, which can repeat across users.
pub async fn consume_auth_token(
    conn: &mut PgConnection,
    purpose: AuthTokenPurpose,
    raw: &str,
    owner: Option<Uuid>,
) -> Result<Uuid, AppError> {
    if raw.trim().is_empty() {
        return Err(invalid_token());
    }

    let user_id: Option<Uuid> = sqlx::query_scalar(
        r#"
        UPDATE auth_tokens SET consumed_at = NOW()
        WHERE id = (
            SELECT id FROM auth_tokens
            WHERE purpose = $1 AND token_hash = $2
              AND consumed_at IS NULL AND expires_at > NOW()
              AND ($3::uuid IS NULL OR user_id = $3)
            ORDER BY created_at DESC
            LIMIT 1
            FOR UPDATE
        )
        RETURNING user_id
        "#,
    )
    .bind(purpose)
    .bind(hash_token(raw))
    .bind(owner)
    .fetch_optional(&mut *conn)
    .await?;

    user_id.ok_or_else(invalid_token)
}

/// Create an account with both wallets and send the welcome email.
pub async fn register(
    state: &AppState,
    request: &RegisterRequest,
    meta: &ClientMeta,
) -> Result<UserResponse, AppError> {
    let full_name = request.full_name.trim();
    if full_name.is_empty() {
        return Err(AppError::Validation("full_name is required".to_string()));
    }
    let email = normalize_email(&request.email)?;
    let country: Country = request.country.parse()?;
    validate_password_strength(&request.password)?;

    if user_service::find_by_email(&state.pool, &email).await?.is_some() {
        return Err(AppError::Conflict("Email is already registered".to_string()));
    }

    let password_hash = hash_password(&request.password)?;
    let mut tx = state.pool.begin().await?;

    let mut created = None;
    for _ in 0..PUBLIC_ID_ATTEMPTS {
        // Savepoint, so a public id clash does not abort the outer transaction.
        let mut attempt = sqlx::Connection::begin(&mut *tx).await?;
        let result = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (user_id, full_name, email, password_hash, country)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(generate_public_user_id())
        .bind(full_name)
        .bind(&email)
        .bind(&password_hash)
        .bind(country)
        .fetch_one(&mut *attempt)
        .await
        .map_err(AppError::from);

        match result {
            Ok(user) => {
                attempt.commit().await?;
                created = Some(user);
                break;
            }
            Err(e) if e.is_unique_violation() => {
                attempt.rollback().await?;
                if constraint_name(&e).as_deref() == Some("idx_users_email") {
                    return Err(AppError::Conflict("Email is already registered".to_string()));
                }
            }
            Err(e) => return Err(e),
        }
    }
    let user = created
        .ok_or_else(|| AppError::Internal("could not allocate a public user id".to_string()))?;

    wallet_service::find_or_create_wallets(&mut tx, user.id).await?;
    let verification_token =
        issue_auth_token(&mut tx, user.id, AuthTokenPurpose::EmailVerification).await?;

    tx.commit().await?;

    tracing::info!(user_id = %user.id, country = ?country, "User registered");

    state
        .jobs
        .dispatch(&WelcomeEmailPayload {
            to: user.email.clone(),
            name: user.full_name.clone(),
            verification_token,
        })
        .await;
    activity_service::log(&state.jobs, user.id, "Account created", meta).await;

    Ok(user.into())
}

async fn check_password(state: &AppState, request: &LoginRequest) -> Result<User, AppError> {
    let invalid = || AppError::Unauthorized("Invalid email or password".to_string());
    let user = user_service::find_by_email(&state.pool, &request.email)
        .await?
        .ok_or_else(invalid)?;
    if !verify_password(&request.password, &user.password_hash)? {
        return Err(invalid());
    }
    user_service::ensure_active(&user)?;
    Ok(user)
}

async fn issue_session(
    state: &AppState,
    user: User,
    meta: &ClientMeta,
    what: &str,
) -> Result<LoginOutcome, AppError> {
    let tokens = state.jwt.issue_pair(&user)?;
    activity_service::log(&state.jobs, user.id, what, meta).await;
    Ok(LoginOutcome::Tokens { user, tokens })
}

/// Password login.
///
/// With two-factor enabled no token is issued; a code is emailed and the
/// client continues with [`verify_otp`].
pub async fn login(
    state: &AppState,
    request: &LoginRequest,
    meta: &ClientMeta,
) -> Result<LoginOutcome, AppError> {
    let user = check_password(state, request).await?;
    if !user.is_verified {
        return Err(AppError::Unverified);
    }

    if user.two_factor_enabled {
        let mut conn = state.pool.acquire().await?;
        let code = issue_auth_token(&mut conn, user.id, AuthTokenPurpose::TwoFactor).await?;
        state
            .jobs
            .dispatch(&TwoFactorEmailPayload {
                to: user.email.clone(),
                name: user.full_name.clone(),
                code,
            })
            .await;
        return Ok(LoginOutcome::TwoFactorChallenge { email: user.email });
    }

    issue_session(state, user, meta, "Logged in").await
}

/// Second step of a two-factor login.
pub async fn verify_otp(
    state: &AppState,
    request: &VerifyOtpRequest,
    meta: &ClientMeta,
) -> Result<LoginOutcome, AppError> {
    let user = user_service::find_by_email(&state.pool, &request.email)
        .await?
        .ok_or_else(invalid_token)?;
    user_service::ensure_active(&user)?;

    let mut conn = state.pool.acquire().await?;
    consume_auth_token(
        &mut conn,
        AuthTokenPurpose::TwoFactor,
        &request.code,
        Some(user.id),
    )
    .await?;

    issue_session(state, user, meta, "Logged in with two-factor code").await
}

/// Admin console login. Non-admin accounts are refused even with the right
/// password.
pub async fn admin_login(
    state: &AppState,
    request: &LoginRequest,
    meta: &ClientMeta,
) -> Result<LoginOutcome, AppError> {
    let user = check_password(state, request).await?;
    if !user.is_admin {
        tracing::warn!(user_id = %user.id, "Non-admin attempted admin login");
        return Err(AppError::Forbidden("Admin access required".to_string()));
    }
    issue_session(state, user, meta, "Logged in to admin console").await
}

/// Consume an email verification link.
pub async fn verify_email(state: &AppState, token: &str) -> Result<UserResponse, AppError> {
    let mut tx = state.pool.begin().await?;
    let user_id =
        consume_auth_token(&mut tx, AuthTokenPurpose::EmailVerification, token, None).await?;

    let user = sqlx::query_as::<_, User>(
        "UPDATE users SET is_verified = true, updated_at = NOW() WHERE id = $1 RETURNING *",
    )
    .bind(user_id)
    .fetch_one(&mut *tx)
    .await?;
    tx.commit().await?;

    tracing::info!(user_id = %user.id, "Email verified");
    Ok(user.into())
}

/// Send a fresh verification link to an unverified account.
pub async fn resend_verification(state: &AppState, email: &str) -> Result<(), AppError> {
    let Some(user) = user_service::find_by_email(&state.pool, email).await? else {
        return Ok(());
    };
    if user.is_verified {
        return Ok(());
    }
    let mut conn = state.pool.acquire().await?;
    let token = issue_auth_token(&mut conn, user.id, AuthTokenPurpose::EmailVerification).await?;
    state
        .jobs
        .dispatch(&VerificationEmailPayload {
            to: user.email,
            name: user.full_name,
            token,
        })
        .await;
    Ok(())
}

/// Email a reset link. Succeeds for unknown addresses too, so the endpoint
/// does not reveal which emails are registered.
pub async fn request_password_reset(state: &AppState, email: &str) -> Result<(), AppError> {
    let Some(user) = user_service::find_by_email(&state.pool, email).await? else {
        tracing::debug!("Password reset requested for unknown email");
        return Ok(());
    };
    let mut conn = state.pool.acquire().await?;
    let token = issue_auth_token(&mut conn, user.id, AuthTokenPurpose::PasswordReset).await?;
    state
        .jobs
        .dispatch(&PasswordResetEmailPayload {
            to: user.email,
            name: user.full_name,
            token,
        })
        .await;
    Ok(())
}

pub async fn reset_password(
    state: &AppState,
    request: &ResetPasswordRequest,
    meta: &ClientMeta,
) -> Result<(), AppError> {
    validate_password_strength(&request.password)?;
    let password_hash = hash_password(&request.password)?;

    let mut tx = state.pool.begin().await?;
    let user_id =
        consume_auth_token(&mut tx, AuthTokenPurpose::PasswordReset, &request.token, None).await?;
    sqlx::query("UPDATE users SET password_hash = $2, updated_at = NOW() WHERE id = $1")
        .bind(user_id)
        .bind(&password_hash)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    tracing::info!(user_id = %user_id, "Password reset");

    state
        .jobs
        .dispatch(&CreateNotificationRequest {
            user_id,
            kind: NotificationType::Security,
            title: "Password changed".to_string(),
            message: "Your password was reset. Contact support if this was not you.".to_string(),
            dedup_key: None,
        })
        .await;
    activity_service::log(&state.jobs, user_id, "Password reset", meta).await;
    Ok(())
}

/// Exchange a refresh token for a new pair.
pub async fn refresh(state: &AppState, refresh_token: &str) -> Result<(User, TokenPair), AppError> {
    let claims = state.jwt.validate_refresh(refresh_token)?;
    let user = user_service::find_by_id(&state.pool, claims.sub)
        .await
        .map_err(|_| AppError::Unauthorized("Invalid token".to_string()))?;
    user_service::ensure_active(&user)?;
    let tokens = state.jwt.issue_pair(&user)?;
    Ok((user, tokens))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emails_are_normalized() {
        assert_eq!(normalize_email("  Ama@Example.COM ").unwrap(), "ama@example.com");
        assert!(normalize_email("no-at-sign").is_err());
        assert!(normalize_email("@example.com").is_err());
        assert!(normalize_email("ama@localhost").is_err());
    }

    #[test]
    fn token_lifetimes() {
        assert_eq!(AuthTokenPurpose::TwoFactor.ttl(), chrono::Duration::minutes(10));
        assert_eq!(AuthTokenPurpose::PasswordReset.ttl(), chrono::Duration::hours(1));
        assert_eq!(
            AuthTokenPurpose::EmailVerification.ttl(),
            chrono::Duration::hours(24)
        );
    }
}

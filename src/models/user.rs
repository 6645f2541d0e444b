//! User data models and authentication request/response types.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{error::AppError, money::Currency};

/// Home country of a user; decides which wallet the dashboard totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "country_code", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Country {
    Nigeria,
    Ghana,
}

impl Country {
    pub fn home_currency(&self) -> Currency {
        match self {
            Country::Nigeria => Currency::Ngn,
            Country::Ghana => Currency::Ghs,
        }
    }
}

impl FromStr for Country {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "nigeria" | "ng" => Ok(Country::Nigeria),
            "ghana" | "gh" => Ok(Country::Ghana),
            other => Err(AppError::Validation(format!("Unsupported country: {other}"))),
        }
    }
}

/// What a one-time secret in `auth_tokens` unlocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "auth_token_purpose", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AuthTokenPurpose {
    EmailVerification,
    PasswordReset,
    TwoFactor,
}

impl AuthTokenPurpose {
    /// Lifetime of a freshly issued secret.
    pub fn ttl(&self) -> chrono::Duration {
        match self {
            AuthTokenPurpose::EmailVerification => chrono::Duration::hours(24),
            AuthTokenPurpose::PasswordReset => chrono::Duration::hours(1),
            AuthTokenPurpose::TwoFactor => chrono::Duration::minutes(10),
        }
    }
}

/// Represents a user record from the database.
///
/// # Identity
///
/// `id` is the internal primary key and the only key used to scope wallets,
/// transactions and notifications. `user_id` is the short numeric identity
/// shown to customers and support staff.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub user_id: i64,
    pub full_name: String,
    pub email: String,
    pub password_hash: String,
    pub is_admin: bool,
    pub is_verified: bool,
    pub is_blocked: bool,
    pub two_factor_enabled: bool,
    pub country: Country,
    pub profile_picture: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Public view of a user (no password hash).
#[derive(Debug, Clone, Serialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub user_id: i64,
    pub full_name: String,
    pub email: String,
    pub is_admin: bool,
    pub is_verified: bool,
    pub is_blocked: bool,
    pub two_factor_enabled: bool,
    pub country: Country,
    pub profile_picture: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            user_id: user.user_id,
            full_name: user.full_name,
            email: user.email,
            is_admin: user.is_admin,
            is_verified: user.is_verified,
            is_blocked: user.is_blocked,
            two_factor_enabled: user.two_factor_enabled,
            country: user.country,
            profile_picture: user.profile_picture,
            created_at: user.created_at,
        }
    }
}

/// Request body for `POST /api/auth/register`.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub full_name: String,
    pub email: String,
    pub password: String,
    pub country: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifyOtpRequest {
    pub email: String,
    pub code: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifyEmailRequest {
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct PasswordResetEmailRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub token: String,
    pub password: String,
}

/// The refresh token may come in the body or in the `refresh_token` cookie.
#[derive(Debug, Default, Deserialize)]
pub struct RefreshTokenRequest {
    pub refresh_token: Option<String>,
}

/// Issued access and refresh tokens.
#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub access_expires_at: DateTime<Utc>,
    pub refresh_expires_at: DateTime<Utc>,
}

/// Body returned by login, OTP verification and refresh.
#[derive(Debug, Clone, Serialize)]
pub struct SessionResponse {
    pub user: UserResponse,
    #[serde(flatten)]
    pub tokens: TokenPair,
}

/// Body returned when a login stops at the two-factor step.
#[derive(Debug, Clone, Serialize)]
pub struct TwoFactorChallengeResponse {
    pub two_factor_required: bool,
    pub email: String,
}

/// Result of a password check.
#[derive(Debug, Clone)]
pub enum LoginOutcome {
    Tokens { user: User, tokens: TokenPair },
    /// Two-factor is enabled; a code was sent and no token was issued.
    TwoFactorChallenge { email: String },
}

//! JWT token utilities.
//!
//! Access and refresh tokens are HS256 tokens signed with separate secrets,
//! so a leaked refresh secret cannot mint access tokens and vice versa.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::user::{TokenPair, User};

#[derive(Debug, Error)]
pub enum JwtError {
    #[error("Failed to encode token: {0}")]
    EncodingError(String),

    #[error("Token has expired")]
    TokenExpired,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Wrong token type")]
    WrongTokenType,
}

impl From<JwtError> for AppError {
    fn from(err: JwtError) -> Self {
        match err {
            JwtError::EncodingError(msg) => AppError::Internal(msg),
            JwtError::TokenExpired => AppError::Unauthorized("Token has expired".to_string()),
            JwtError::InvalidToken | JwtError::WrongTokenType => {
                AppError::Unauthorized("Invalid token".to_string())
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

/// JWT claims carried by both token kinds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Internal user id.
    pub sub: Uuid,
    /// External short id.
    pub user_id: i64,
    pub email: String,
    pub is_admin: bool,
    pub iss: String,
    pub exp: i64,
    pub iat: i64,
    pub jti: String,
    pub token_type: TokenType,
}

/// Signs and validates token pairs. Built once at startup.
#[derive(Clone)]
pub struct JwtService {
    access_encoding: EncodingKey,
    access_decoding: DecodingKey,
    refresh_encoding: EncodingKey,
    refresh_decoding: DecodingKey,
    issuer: String,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl std::fmt::Debug for JwtService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtService")
            .field("issuer", &self.issuer)
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .field("keys", &"[REDACTED]")
            .finish()
    }
}

impl JwtService {
    pub fn new(
        access_secret: &str,
        refresh_secret: &str,
        issuer: &str,
        access_ttl_minutes: i64,
        refresh_ttl_minutes: i64,
    ) -> Self {
        Self {
            access_encoding: EncodingKey::from_secret(access_secret.as_bytes()),
            access_decoding: DecodingKey::from_secret(access_secret.as_bytes()),
            refresh_encoding: EncodingKey::from_secret(refresh_secret.as_bytes()),
            refresh_decoding: DecodingKey::from_secret(refresh_secret.as_bytes()),
            issuer: issuer.to_string(),
            access_ttl: Duration::minutes(access_ttl_minutes),
            refresh_ttl: Duration::minutes(refresh_ttl_minutes),
        }
    }

    /// Issue an access + refresh pair for a user.
    pub fn issue_pair(&self, user: &User) -> Result<TokenPair, JwtError> {
        let (access_token, access_expires_at) =
            self.sign(user, TokenType::Access, &self.access_encoding, self.access_ttl)?;
        let (refresh_token, refresh_expires_at) = self.sign(
            user,
            TokenType::Refresh,
            &self.refresh_encoding,
            self.refresh_ttl,
        )?;

        Ok(TokenPair {
            access_token,
            refresh_token,
            access_expires_at,
            refresh_expires_at,
        })
    }

    fn sign(
        &self,
        user: &User,
        token_type: TokenType,
        key: &EncodingKey,
        ttl: Duration,
    ) -> Result<(String, DateTime<Utc>), JwtError> {
        let now = Utc::now();
        let expires_at = now + ttl;
        let claims = Claims {
            sub: user.id,
            user_id: user.user_id,
            email: user.email.clone(),
            is_admin: user.is_admin,
            iss: self.issuer.clone(),
            exp: expires_at.timestamp(),
            iat: now.timestamp(),
            jti: Uuid::new_v4().to_string(),
            token_type,
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, key)
            .map_err(|e| JwtError::EncodingError(e.to_string()))?;
        Ok((token, expires_at))
    }

    pub fn validate_access(&self, token: &str) -> Result<Claims, JwtError> {
        self.validate(token, &self.access_decoding, TokenType::Access)
    }

    pub fn validate_refresh(&self, token: &str) -> Result<Claims, JwtError> {
        self.validate(token, &self.refresh_decoding, TokenType::Refresh)
    }

    fn validate(
        &self,
        token: &str,
        key: &DecodingKey,
        expected: TokenType,
    ) -> Result<Claims, JwtError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[self.issuer.as_str()]);
        validation.leeway = 0;

        let data = decode::<Claims>(token, key, &validation).map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => JwtError::TokenExpired,
            _ => JwtError::InvalidToken,
        })?;

        if data.claims.token_type != expected {
            return Err(JwtError::WrongTokenType);
        }
        Ok(data.claims)
    }
}

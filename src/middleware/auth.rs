//! Bearer token authentication middleware.
//!
//! This middleware intercepts every protected request to:
//! 1. Find the access token (`Authorization: Bearer`, else the `token` or
//!    `admin_token` cookie)
//! 2. Validate its signature, issuer, expiry and type
//! 3. Load the user and refuse blocked or deleted accounts
//! 4. Inject [`AuthUser`] into the request extensions

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{HeaderMap, header::AUTHORIZATION, request::Parts},
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use crate::{
    error::AppError,
    middleware::cookies::{ACCESS_COOKIE, ADMIN_ACCESS_COOKIE, read_cookie},
    models::{admin_log::AdminActor, user::User},
    services::{activity_service::ClientMeta, user_service},
    state::AppState,
};

/// Authenticated caller, available to handlers via `Extension<AuthUser>`.
#[derive(Debug, Clone)]
pub struct AuthUser {
    /// Internal id; scopes every query.
    pub id: Uuid,
    /// Public numeric id.
    pub user_id: i64,
    pub email: String,
    pub is_admin: bool,
    /// Row as loaded for this request.
    pub user: User,
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let token = headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())?
        .strip_prefix("Bearer ")?
        .trim();
    (!token.is_empty()).then_some(token)
}

/// Header first, then cookies. The admin cookie wins over the user cookie
/// when a browser holds both.
pub fn access_token(headers: &HeaderMap) -> Option<&str> {
    bearer_token(headers)
        .or_else(|| read_cookie(headers, ADMIN_ACCESS_COOKIE))
        .or_else(|| read_cookie(headers, ACCESS_COOKIE))
}

/// Authentication middleware for `/api/protected`.
///
/// # Errors
///
/// - `Unauthorized` when the token is missing, invalid or expired, or the
///   user no longer exists
/// - `Forbidden` when the account is blocked
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = access_token(request.headers())
        .ok_or_else(|| AppError::Unauthorized("Authentication required".to_string()))?;
    let claims = state.jwt.validate_access(token)?;

    let user = user_service::find_by_id(&state.pool, claims.sub)
        .await
        .map_err(|e| match e {
            AppError::NotFound(_) => AppError::Unauthorized("Invalid token".to_string()),
            other => other,
        })?;
    user_service::ensure_active(&user)?;

    request.extensions_mut().insert(AuthUser {
        id: user.id,
        user_id: user.user_id,
        email: user.email.clone(),
        is_admin: user.is_admin,
        user,
    });

    Ok(next.run(request).await)
}

/// Admin gate for `/api/protected/admin`. Runs after [`require_auth`].
///
/// The database flag decides, not the token claim, so a demoted admin loses
/// access before their token expires.
pub async fn require_admin(request: Request, next: Next) -> Result<Response, AppError> {
    let is_admin = request
        .extensions()
        .get::<AuthUser>()
        .map(|auth| auth.user.is_admin)
        .ok_or_else(|| AppError::Unauthorized("Authentication required".to_string()))?;

    if !is_admin {
        return Err(AppError::Forbidden("Admin access required".to_string()));
    }
    Ok(next.run(request).await)
}

/// Caller IP and user agent, for activity lines and admin logs.
#[derive(Debug, Clone, Default)]
pub struct ClientInfo(pub ClientMeta);

impl ClientInfo {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|h| h.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
        };
        let ip_address = header("x-forwarded-for")
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .or_else(|| header("x-real-ip"))
            .map(str::to_string);
        let user_agent = header("user-agent").map(str::to_string);
        ClientInfo(ClientMeta {
            ip_address,
            user_agent,
        })
    }

    pub fn actor(&self, auth: &AuthUser) -> AdminActor {
        AdminActor {
            admin_id: auth.id,
            ip_address: self.0.ip_address.clone(),
            user_agent: self.0.user_agent.clone(),
        }
    }
}

impl<S: Send + Sync> FromRequestParts<S> for ClientInfo {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(ClientInfo::from_headers(&parts.headers))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn bearer_header_beats_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer header.jwt"));
        headers.insert(
            axum::http::header::COOKIE,
            HeaderValue::from_static("token=cookie.jwt"),
        );
        assert_eq!(access_token(&headers), Some("header.jwt"));
    }

    #[test]
    fn falls_back_to_cookies() {
        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::COOKIE,
            HeaderValue::from_static("token=user.jwt; admin_token=admin.jwt"),
        );
        assert_eq!(access_token(&headers), Some("admin.jwt"));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(access_token(&headers), Some("admin.jwt"));

        assert_eq!(access_token(&HeaderMap::new()), None);
    }

    #[test]
    fn client_info_prefers_first_forwarded_ip() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("41.58.1.2, 10.0.0.1"));
        headers.insert("x-real-ip", HeaderValue::from_static("10.0.0.9"));
        headers.insert("user-agent", HeaderValue::from_static("curl/8.0"));
        let ClientInfo(meta) = ClientInfo::from_headers(&headers);
        assert_eq!(meta.ip_address.as_deref(), Some("41.58.1.2"));
        assert_eq!(meta.user_agent.as_deref(), Some("curl/8.0"));
    }
}

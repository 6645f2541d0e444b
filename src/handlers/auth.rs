//! Authentication endpoints.
//!
//! - POST /api/auth/register
//! - POST /api/auth/login
//! - POST /api/auth/verify
//! - POST /api/auth/verify-otp
//! - POST /api/auth/resend-verification
//! - POST /api/auth/password-reset-email
//! - POST /api/auth/reset-password
//! - POST /api/auth/refresh-token
//! - POST /api/auth/logout
//! - POST /api/admin/login
//!
//! Successful logins return the token pair in the body and as HttpOnly
//! cookies.

use axum::{
    Json,
    extract::State,
    http::HeaderMap,
    response::{IntoResponse, Response},
};

use crate::{
    error::AppError,
    middleware::{
        auth::ClientInfo,
        cookies::{AuthCookies, REFRESH_COOKIE, read_cookie},
    },
    models::{
        response::ApiResponse,
        user::{
            LoginOutcome, LoginRequest, PasswordResetEmailRequest, RefreshTokenRequest,
            RegisterRequest, ResetPasswordRequest, SessionResponse, TwoFactorChallengeResponse,
            UserResponse, VerifyEmailRequest, VerifyOtpRequest,
        },
    },
    services::auth_service,
    state::AppState,
};

fn session(outcome: LoginOutcome, cookies: AuthCookies) -> Response {
    match outcome {
        LoginOutcome::Tokens { user, tokens } => {
            let mut headers = HeaderMap::new();
            cookies.set_tokens(&mut headers, &tokens);
            let body = SessionResponse {
                user: user.into(),
                tokens,
            };
            (headers, ApiResponse::ok("Login successful", body)).into_response()
        }
        LoginOutcome::TwoFactorChallenge { email } => ApiResponse::ok(
            "A login code has been sent to your email",
            TwoFactorChallengeResponse {
                two_factor_required: true,
                email,
            },
        )
        .into_response(),
    }
}

/// Register a new account.
///
/// # Request Body
///
/// ```json
/// {
///   "full_name": "Ama Mensah",
///   "email": "ama@example.com",
///   "password": "s3cretpass",
///   "country": "ghana"
/// }
/// ```
///
/// # Response (201)
///
/// The created user. NGN and GHS wallets exist from this point and a
/// verification email is queued.
///
/// # Errors
///
/// - `400` invalid email, weak password, unsupported country
/// - `409` email already registered
pub async fn register(
    State(state): State<AppState>,
    ClientInfo(meta): ClientInfo,
    Json(request): Json<RegisterRequest>,
) -> Result<ApiResponse<UserResponse>, AppError> {
    let user = auth_service::register(&state, &request, &meta).await?;
    Ok(ApiResponse::created(
        "Registration successful. Please check your email to verify your account",
        user,
    ))
}

/// Password login.
///
/// # Response (200)
///
/// ```json
/// {
///   "error": false,
///   "message": "Login successful",
///   "data": {
///     "user": { "id": "…", "email": "ama@example.com", … },
///     "access_token": "eyJ…",
///     "refresh_token": "eyJ…",
///     "access_expires_at": "…",
///     "refresh_expires_at": "…"
///   }
/// }
/// ```
///
/// With two-factor enabled, `data` is `{"two_factor_required": true, "email": …}`
/// and no token is issued.
pub async fn login(
    State(state): State<AppState>,
    ClientInfo(meta): ClientInfo,
    Json(request): Json<LoginRequest>,
) -> Result<Response, AppError> {
    let outcome = auth_service::login(&state, &request, &meta).await?;
    Ok(session(outcome, AuthCookies::user(state.secure_cookies())))
}

pub async fn verify_otp(
    State(state): State<AppState>,
    ClientInfo(meta): ClientInfo,
    Json(request): Json<VerifyOtpRequest>,
) -> Result<Response, AppError> {
    let outcome = auth_service::verify_otp(&state, &request, &meta).await?;
    Ok(session(outcome, AuthCookies::user(state.secure_cookies())))
}

/// Admin console login; sets the `admin_token` cookie.
pub async fn admin_login(
    State(state): State<AppState>,
    ClientInfo(meta): ClientInfo,
    Json(request): Json<LoginRequest>,
) -> Result<Response, AppError> {
    let outcome = auth_service::admin_login(&state, &request, &meta).await?;
    Ok(session(outcome, AuthCookies::admin(state.secure_cookies())))
}

pub async fn verify_email(
    State(state): State<AppState>,
    Json(request): Json<VerifyEmailRequest>,
) -> Result<ApiResponse<UserResponse>, AppError> {
    let user = auth_service::verify_email(&state, &request.token).await?;
    Ok(ApiResponse::ok("Email verified successfully", user))
}

pub async fn resend_verification(
    State(state): State<AppState>,
    Json(request): Json<PasswordResetEmailRequest>,
) -> Result<ApiResponse<()>, AppError> {
    auth_service::resend_verification(&state, &request.email).await?;
    Ok(ApiResponse::message(
        "If the account exists and is unverified, a verification email has been sent",
    ))
}

/// Always answers 200 so the endpoint cannot be used to probe for accounts.
pub async fn password_reset_email(
    State(state): State<AppState>,
    Json(request): Json<PasswordResetEmailRequest>,
) -> Result<ApiResponse<()>, AppError> {
    auth_service::request_password_reset(&state, &request.email).await?;
    Ok(ApiResponse::message(
        "If the email is registered, a password reset link has been sent",
    ))
}

pub async fn reset_password(
    State(state): State<AppState>,
    ClientInfo(meta): ClientInfo,
    Json(request): Json<ResetPasswordRequest>,
) -> Result<ApiResponse<()>, AppError> {
    auth_service::reset_password(&state, &request, &meta).await?;
    Ok(ApiResponse::message("Password reset successfully"))
}

/// Exchange a refresh token (body or `refresh_token` cookie) for a new pair.
pub async fn refresh_token(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Option<Json<RefreshTokenRequest>>,
) -> Result<Response, AppError> {
    let from_body = body.and_then(|Json(b)| b.refresh_token);
    let token = from_body
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .or_else(|| read_cookie(&headers, REFRESH_COOKIE))
        .ok_or_else(|| AppError::Unauthorized("Refresh token required".to_string()))?;

    let (user, tokens) = auth_service::refresh(&state, token).await?;
    let cookies = if user.is_admin {
        AuthCookies::admin(state.secure_cookies())
    } else {
        AuthCookies::user(state.secure_cookies())
    };
    let mut out = HeaderMap::new();
    cookies.set_tokens(&mut out, &tokens);
    let body = SessionResponse {
        user: user.into(),
        tokens,
    };
    Ok((out, ApiResponse::ok("Token refreshed", body)).into_response())
}

/// Clear both cookie sets. Tokens are stateless and simply expire.
pub async fn logout(State(state): State<AppState>) -> Response {
    let mut headers = HeaderMap::new();
    AuthCookies::user(state.secure_cookies()).clear_tokens(&mut headers);
    AuthCookies::admin(state.secure_cookies()).clear_tokens(&mut headers);
    (headers, ApiResponse::message("Logged out")).into_response()
}

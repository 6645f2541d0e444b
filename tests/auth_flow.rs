mod common;

use axum::{
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use serde_json::{Value, json};
use tower::ServiceExt;
use uuid::Uuid;

use common::{TestApp, data};
use jeanpay::{models::user::AuthTokenPurpose, services::auth_service};

const PASSWORD: &str = "Sup3rSecret";

fn fresh_email() -> String {
    format!("ama-{}@jeanpay.test", Uuid::new_v4())
}

async fn register(app: &TestApp, email: &str) -> Value {
    let (status, body) = app
        .request(
            Method::POST,
            "/api/auth/register",
            None,
            Some(json!({
                "full_name": "Ama Mensah",
                "email": email,
                "password": PASSWORD,
                "country": "ghana"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    data(&body).clone()
}

async fn verify(app: &TestApp, user_id: Uuid) {
    let mut conn = app.pool().acquire().await.unwrap();
    let token =
        auth_service::issue_auth_token(&mut conn, user_id, AuthTokenPurpose::EmailVerification)
            .await
            .unwrap();
    drop(conn);

    let (status, body) = app
        .request(Method::POST, "/api/auth/verify", None, Some(json!({ "token": token })))
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(data(&body)["is_verified"], true);

    let (status, _) = app
        .request(Method::POST, "/api/auth/verify", None, Some(json!({ "token": token })))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

fn login_body(email: &str, password: &str) -> Value {
    json!({ "email": email, "password": password })
}

#[tokio::test]
async fn register_verify_login_refresh() {
    let Some(app) = TestApp::spawn().await else { return };
    let email = fresh_email();
    let user = register(&app, &email).await;
    assert_eq!(user["is_verified"], false);
    assert_eq!(user["country"], "ghana");
    let user_id: Uuid = user["id"].as_str().unwrap().parse().unwrap();

    let wallets: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM wallets WHERE user_id = $1")
        .bind(user_id)
        .fetch_one(app.pool())
        .await
        .unwrap();
    assert_eq!(wallets, 2);

    let (status, body) = app
        .request(Method::POST, "/api/auth/login", None, Some(login_body(&email, PASSWORD)))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED, "{body}");

    verify(&app, user_id).await;

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/auth/login")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(login_body(&email, PASSWORD).to_string()))
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let cookies: Vec<String> = response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .map(|v| v.to_str().unwrap().to_string())
        .collect();
    assert!(cookies.iter().any(|c| c.starts_with("token=")), "{cookies:?}");
    assert!(cookies.iter().any(|c| c.starts_with("refresh_token=")));
    assert!(cookies.iter().all(|c| c.contains("HttpOnly")));

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    let access = data(&body)["access_token"].as_str().unwrap().to_string();
    let refresh = data(&body)["refresh_token"].as_str().unwrap().to_string();

    let (status, body) = app
        .request(Method::POST, "/api/protected/user/retrieve", Some(&access), None)
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(data(&body)["user"]["email"], email.as_str());

    let (status, body) = app
        .request(
            Method::POST,
            "/api/auth/refresh-token",
            None,
            Some(json!({ "refresh_token": refresh })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert!(data(&body)["access_token"].is_string());

    // An access token is not a refresh token.
    let (status, _) = app
        .request(
            Method::POST,
            "/api/auth/refresh-token",
            None,
            Some(json!({ "refresh_token": access })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn register_rejects_duplicates_and_weak_passwords() {
    let Some(app) = TestApp::spawn().await else { return };
    let email = fresh_email();
    register(&app, &email).await;

    let (status, body) = app
        .request(
            Method::POST,
            "/api/auth/register",
            None,
            Some(json!({
                "full_name": "Someone Else",
                "email": email.to_uppercase(),
                "password": PASSWORD,
                "country": "nigeria"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT, "{body}");

    for password in ["password", "12345678", "ab1"] {
        let (status, _) = app
            .request(
                Method::POST,
                "/api/auth/register",
                None,
                Some(json!({
                    "full_name": "Weak",
                    "email": fresh_email(),
                    "password": password,
                    "country": "nigeria"
                })),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{password}");
    }

    let (status, _) = app
        .request(
            Method::POST,
            "/api/auth/register",
            None,
            Some(json!({
                "full_name": "Elsewhere",
                "email": fresh_email(),
                "password": PASSWORD,
                "country": "kenya"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn password_reset_replaces_the_old_password() {
    let Some(app) = TestApp::spawn().await else { return };
    let email = fresh_email();
    let user = register(&app, &email).await;
    let user_id: Uuid = user["id"].as_str().unwrap().parse().unwrap();
    verify(&app, user_id).await;

    // Unknown addresses get the same answer as known ones.
    let (status, _) = app
        .request(
            Method::POST,
            "/api/auth/password-reset-email",
            None,
            Some(json!({ "email": "nobody@jeanpay.test" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let mut conn = app.pool().acquire().await.unwrap();
    let token = auth_service::issue_auth_token(&mut conn, user_id, AuthTokenPurpose::PasswordReset)
        .await
        .unwrap();
    drop(conn);

    let (status, body) = app
        .request(
            Method::POST,
            "/api/auth/reset-password",
            None,
            Some(json!({ "token": token, "password": "N3wPassword" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");

    let (status, _) = app
        .request(Method::POST, "/api/auth/login", None, Some(login_body(&email, PASSWORD)))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app
        .request(
            Method::POST,
            "/api/auth/login",
            None,
            Some(login_body(&email, "N3wPassword")),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn admin_login_refuses_regular_accounts() {
    let Some(app) = TestApp::spawn().await else { return };
    let email = fresh_email();
    let user = register(&app, &email).await;
    let user_id: Uuid = user["id"].as_str().unwrap().parse().unwrap();
    verify(&app, user_id).await;

    let (status, _) = app
        .request(Method::POST, "/api/admin/login", None, Some(login_body(&email, PASSWORD)))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

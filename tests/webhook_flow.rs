mod common;

use axum::http::{Method, StatusCode};
use serde_json::json;

use common::{PAYSTACK_SECRET, TestApp, amount, data, dec};
use jeanpay::{money::Currency, services::webhook_service::sign};

async fn start_topup(app: &TestApp, token: &str, amount: &str) -> String {
    let (status, body) = app
        .request(
            Method::POST,
            "/api/protected/wallet/topup",
            Some(token),
            Some(json!({ "amount": amount, "currency": "NGN", "payment_method": "checkout" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let reference = data(&body)["transaction"]["reference"]
        .as_str()
        .expect("reference")
        .to_string();
    assert!(reference.starts_with("TOPUP_"), "{reference}");
    assert_eq!(
        data(&body)["authorization_url"],
        format!("https://checkout.test/{reference}")
    );
    reference
}

fn charge_success(reference: &str, minor: i64) -> String {
    json!({
        "event": "charge.success",
        "data": {
            "reference": reference,
            "amount": minor,
            "currency": "NGN",
            "status": "success",
            "gateway_response": "Approved"
        }
    })
    .to_string()
}

#[tokio::test]
async fn duplicate_charge_success_credits_once() {
    let Some(app) = TestApp::spawn().await else { return };
    let user = app.create_user("nigeria", false).await;
    let reference = start_topup(&app, &user.token, "5000.00").await;
    assert_eq!(app.balance(user.user.id, Currency::Ngn).await, dec("0"));

    let body = charge_success(&reference, 500_000);
    let signature = sign(PAYSTACK_SECRET, body.as_bytes()).unwrap();

    let (status, first) = app.webhook("paystack", &body, &signature).await;
    assert_eq!(status, StatusCode::OK, "{first}");
    assert_eq!(data(&first)["status"], "processed");
    assert_eq!(app.balance(user.user.id, Currency::Ngn).await, dec("5000.00"));

    let (status, second) = app.webhook("paystack", &body, &signature).await;
    assert_eq!(status, StatusCode::OK, "{second}");
    assert_eq!(second["message"], "already_processed");
    assert_eq!(app.balance(user.user.id, Currency::Ngn).await, dec("5000.00"));

    app.drain_jobs().await;
    let notifications: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM notifications WHERE user_id = $1 AND dedup_key = $2",
    )
    .bind(user.user.id)
    .bind(format!("{reference}:completed"))
    .fetch_one(app.pool())
    .await
    .unwrap();
    assert_eq!(notifications, 1);

    let (status, body) = app
        .request(
            Method::GET,
            "/api/protected/transactions/stats",
            Some(&user.token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(data(&body)["completed"], 1);
}

#[tokio::test]
async fn bad_signature_is_rejected_without_an_event_row() {
    let Some(app) = TestApp::spawn().await else { return };
    let user = app.create_user("nigeria", false).await;
    let reference = start_topup(&app, &user.token, "100.00").await;
    let body = charge_success(&reference, 10_000);

    let (status, _) = app.webhook("paystack", &body, "deadbeef").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app.webhook("paystack", &body, "").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let events: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM webhook_events WHERE reference = $1")
        .bind(&reference)
        .fetch_one(app.pool())
        .await
        .unwrap();
    assert_eq!(events, 0);
    assert_eq!(app.balance(user.user.id, Currency::Ngn).await, dec("0"));
}

#[tokio::test]
async fn amount_mismatch_leaves_transaction_pending() {
    let Some(app) = TestApp::spawn().await else { return };
    let user = app.create_user("nigeria", false).await;
    let reference = start_topup(&app, &user.token, "5000.00").await;

    let body = charge_success(&reference, 100);
    let signature = sign(PAYSTACK_SECRET, body.as_bytes()).unwrap();
    let (status, ack) = app.webhook("paystack", &body, &signature).await;
    assert_eq!(status, StatusCode::OK, "{ack}");
    assert_eq!(data(&ack)["status"], "amount_mismatch");

    let status: String = sqlx::query_scalar(
        "SELECT status::text FROM transactions WHERE reference = $1",
    )
    .bind(&reference)
    .fetch_one(app.pool())
    .await
    .unwrap();
    assert_eq!(status, "pending");
    assert_eq!(app.balance(user.user.id, Currency::Ngn).await, dec("0"));
}

#[tokio::test]
async fn unknown_reference_is_acknowledged() {
    let Some(app) = TestApp::spawn().await else { return };
    let body = charge_success("TOPUP_does_not_exist", 100);
    let signature = sign(PAYSTACK_SECRET, body.as_bytes()).unwrap();

    let (status, ack) = app.webhook("paystack", &body, &signature).await;
    assert_eq!(status, StatusCode::OK, "{ack}");
    assert_eq!(data(&ack)["status"], "transaction_not_found");
}

#[tokio::test]
async fn approve_after_webhook_failure_is_refused() {
    let Some(app) = TestApp::spawn().await else { return };
    let user = app.create_user("ghana", false).await;
    let admin = app.create_user("ghana", true).await;
    app.set_balance(user.user.id, Currency::Ghs, dec("5000.00")).await;

    let (status, body) = app
        .request(
            Method::POST,
            "/api/protected/wallet/withdraw",
            Some(&user.token),
            Some(json!({
                "amount": "2000.00",
                "currency": "GHS",
                "withdrawal_method": "momo",
                "account_details": { "phone_number": "0241234567", "network": "MTN", "account_name": "Kofi" }
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let id = data(&body)["id"].as_str().unwrap().to_string();
    let reference = data(&body)["reference"].as_str().unwrap().to_string();
    assert_eq!(app.balance(user.user.id, Currency::Ghs).await, dec("3000.00"));

    let failure = json!({
        "event": "transfer.failed",
        "data": { "reference": reference, "status": "failed", "reason": "Recipient unreachable" }
    })
    .to_string();
    let signature = sign(PAYSTACK_SECRET, failure.as_bytes()).unwrap();
    let (status, ack) = app.webhook("paystack", &failure, &signature).await;
    assert_eq!(status, StatusCode::OK, "{ack}");
    assert_eq!(app.balance(user.user.id, Currency::Ghs).await, dec("5000.00"));

    let (status, body) = app
        .request(
            Method::PATCH,
            &format!("/api/protected/admin/transactions/approve/{id}"),
            Some(&admin.token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT, "{body}");
    assert_eq!(app.balance(user.user.id, Currency::Ghs).await, dec("5000.00"));

    let (status, body) = app
        .request(
            Method::GET,
            &format!("/api/protected/transactions/details/{id}"),
            Some(&user.token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(data(&body)["status"], "failed");
    assert_eq!(amount(&data(&body)["details"]["from_amount"]), dec("2000"));
}

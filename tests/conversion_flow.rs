mod common;

use axum::http::{Method, StatusCode};
use serde_json::json;

use common::{TestApp, amount, data, dec};
use jeanpay::{
    error::AppError,
    models::wallet::LedgerKind,
    money::Currency,
    services::wallet_service,
};

#[tokio::test]
async fn conversion_moves_money_between_own_wallets() {
    let Some(app) = TestApp::spawn().await else { return };
    let u1 = app.create_user("nigeria", false).await;
    app.set_balance(u1.user.id, Currency::Ngn, dec("100000.00")).await;

    let (status, body) = app
        .request(
            Method::POST,
            "/api/protected/convert/exchange",
            Some(&u1.token),
            Some(json!({ "from": "NGN", "to": "GHS", "amount": "10000.00" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");

    let quote = &data(&body)["quote"];
    assert_eq!(amount(&quote["fee"]), dec("200.00"));
    assert_eq!(amount(&quote["net"]), dec("9800.00"));
    assert_eq!(amount(&quote["converted"]), dec("51.94"));

    let transaction = &data(&body)["transaction"];
    assert_eq!(transaction["transaction_type"], "conversion");
    assert_eq!(transaction["status"], "completed");
    assert_eq!(transaction["direction"], "NGN→GHS");
    assert_eq!(amount(&transaction["details"]["to_amount"]), dec("51.94"));

    assert_eq!(app.balance(u1.user.id, Currency::Ngn).await, dec("90000.00"));
    assert_eq!(app.balance(u1.user.id, Currency::Ghs).await, dec("51.94"));
    assert_eq!(app.transaction_count(u1.user.id).await, 1);

    let (status, body) = app
        .request(Method::GET, "/api/protected/convert/history", Some(&u1.token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["pagination"]["total"], 1);
}

#[tokio::test]
async fn conversion_without_funds_writes_nothing() {
    let Some(app) = TestApp::spawn().await else { return };
    let u1 = app.create_user("nigeria", false).await;
    app.set_balance(u1.user.id, Currency::Ngn, dec("50.00")).await;

    let (status, body) = app
        .request(
            Method::POST,
            "/api/protected/convert/exchange",
            Some(&u1.token),
            Some(json!({ "from": "NGN", "to": "GHS", "amount": "100" })),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INSUFFICIENT_FUNDS");
    assert_eq!(app.balance(u1.user.id, Currency::Ngn).await, dec("50.00"));
    assert_eq!(app.balance(u1.user.id, Currency::Ghs).await, dec("0.00"));
    assert_eq!(app.transaction_count(u1.user.id).await, 0);
}

#[tokio::test]
async fn calculate_prices_without_moving_money() {
    let Some(app) = TestApp::spawn().await else { return };
    let user = app.create_user("ghana", false).await;

    let (status, body) = app
        .request(
            Method::POST,
            "/api/protected/convert/calculate",
            Some(&user.token),
            Some(json!({ "from": "NGN", "to": "NGN", "amount": "100" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");

    let (status, body) = app
        .request(
            Method::POST,
            "/api/protected/convert/calculate",
            Some(&user.token),
            Some(json!({ "from": "NGN", "to": "GHS", "amount": "0.001" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");

    let (status, body) = app
        .request(Method::GET, "/api/protected/convert/rates", Some(&user.token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(data(&body).as_array().map(Vec::len), Some(2));
    assert_eq!(app.transaction_count(user.user.id).await, 0);
}

#[tokio::test]
async fn protected_routes_require_a_token() {
    let Some(app) = TestApp::spawn().await else { return };

    let (status, body) = app
        .request(Method::GET, "/api/protected/wallet/balance", None, None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], true);

    let (status, _) = app
        .request(Method::GET, "/api/protected/wallet/balance", Some("garbage"), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn balance_reports_home_currency_total() {
    let Some(app) = TestApp::spawn().await else { return };
    let user = app.create_user("ghana", false).await;
    app.set_balance(user.user.id, Currency::Ghs, dec("75.50")).await;
    app.set_balance(user.user.id, Currency::Ngn, dec("1000.00")).await;

    let (status, body) = app
        .request(Method::GET, "/api/protected/wallet/balance", Some(&user.token), None)
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(data(&body)["total_currency"], "GHS");
    assert_eq!(amount(&data(&body)["total_balance"]), dec("75.50"));
    assert_eq!(data(&body)["wallets"].as_array().map(Vec::len), Some(2));
}

#[tokio::test]
async fn wallet_creation_is_idempotent() {
    let Some(app) = TestApp::spawn().await else { return };
    let user = app.create_user("ghana", false).await;
    let id = user.user.id;

    let mut conn = app.pool().acquire().await.unwrap();
    let first = wallet_service::find_or_create_wallets(&mut conn, id).await.unwrap();
    let again = wallet_service::find_or_create_wallets(&mut conn, id).await.unwrap();
    drop(conn);
    let numbers = |wallets: &[jeanpay::models::wallet::Wallet]| {
        wallets.iter().map(|w| w.wallet_number.clone()).collect::<Vec<_>>()
    };
    assert_eq!(first.len(), 2);
    assert_eq!(numbers(&first), numbers(&again));

    // Start over without wallets and race two creators.
    sqlx::query("DELETE FROM wallets WHERE user_id = $1")
        .bind(id)
        .execute(app.pool())
        .await
        .unwrap();
    let mut a = app.pool().acquire().await.unwrap();
    let mut b = app.pool().acquire().await.unwrap();
    let (left, right) = tokio::join!(
        wallet_service::find_or_create_wallets(&mut a, id),
        wallet_service::find_or_create_wallets(&mut b, id),
    );
    let (left, right) = (left.unwrap(), right.unwrap());
    assert_eq!(numbers(&left), numbers(&right));

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM wallets WHERE user_id = $1")
        .bind(id)
        .fetch_one(app.pool())
        .await
        .unwrap();
    assert_eq!(count, 2);
}

#[tokio::test]
async fn refund_then_withdrawal_restores_the_balance() {
    let Some(app) = TestApp::spawn().await else { return };
    let user = app.create_user("nigeria", false).await;
    let id = user.user.id;
    app.set_balance(id, Currency::Ngn, dec("1000.00")).await;

    let mut tx = app.pool().begin().await.unwrap();
    let credited =
        wallet_service::apply_delta(&mut tx, id, Currency::Ngn, dec("250.00"), LedgerKind::Refund)
            .await
            .unwrap();
    assert_eq!(credited.balance, dec("1250.00"));
    assert_eq!(credited.total_deposits, dec("0"));

    let debited = wallet_service::apply_delta(
        &mut tx,
        id,
        Currency::Ngn,
        dec("-250.00"),
        LedgerKind::Withdrawal,
    )
    .await
    .unwrap();
    assert_eq!(debited.balance, dec("1000.00"));
    assert_eq!(debited.total_withdrawals, dec("250.00"));

    let overdraw = wallet_service::apply_delta(
        &mut tx,
        id,
        Currency::Ngn,
        dec("-1000.01"),
        LedgerKind::Withdrawal,
    )
    .await;
    assert!(matches!(overdraw, Err(AppError::InsufficientFunds)));
    tx.commit().await.unwrap();

    assert_eq!(app.balance(id, Currency::Ngn).await, dec("1000.00"));
}

#[tokio::test]
async fn cross_currency_transfer_too_small_to_convert_is_refused() {
    let Some(app) = TestApp::spawn().await else { return };
    let user = app.create_user("nigeria", false).await;
    app.set_balance(user.user.id, Currency::Ngn, dec("100.00")).await;

    let (status, body) = app
        .request(
            Method::POST,
            "/api/protected/transactions/new",
            Some(&user.token),
            Some(json!({
                "amount": "0.50",
                "from_currency": "NGN",
                "to_currency": "GHS",
                "method_of_payment": "wallet",
                "recipient_type": "momo",
                "phone_number": "0241234567",
                "network": "MTN"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
    assert_eq!(app.balance(user.user.id, Currency::Ngn).await, dec("100.00"));
    assert_eq!(app.transaction_count(user.user.id).await, 0);
}

//! Wallet ledger.
//!
//! Balances change only through [`apply_delta`], which runs inside the
//! caller's database transaction and holds a `FOR UPDATE` lock on the wallet
//! row until that transaction ends.
//!
//! # Lifetime totals
//!
//! `total_deposits`, `total_withdrawals` and `total_conversions` only grow.
//! A refund restores the balance but leaves the totals alone; the refund is
//! audited through the failed transaction row instead.

use rust_decimal::Decimal;
use sqlx::PgConnection;
use uuid::Uuid;

use crate::{
    db::DbPool,
    error::AppError,
    models::{
        user::User,
        wallet::{LedgerKind, Wallet},
    },
    money::{Currency, round_currency},
    security::tokens::generate_wallet_number,
};

/// Attempts at drawing an unused wallet number before giving up.
const WALLET_NUMBER_ATTEMPTS: usize = 5;

/// Ensure the user holds exactly one wallet per supported currency.
///
/// Idempotent and safe under concurrent callers: the unique index on
/// `(user_id, currency)` turns a lost race into a no-op insert.
pub async fn find_or_create_wallets(
    conn: &mut PgConnection,
    user_id: Uuid,
) -> Result<Vec<Wallet>, AppError> {
    for currency in Currency::ALL {
        let mut created = false;
        for _ in 0..WALLET_NUMBER_ATTEMPTS {
            // ON CONFLICT without a target also absorbs a wallet_number clash,
            // so the existence check below decides whether to draw again.
            sqlx::query(
                r#"
                INSERT INTO wallets (user_id, wallet_number, currency)
                VALUES ($1, $2, $3)
                ON CONFLICT DO NOTHING
                "#,
            )
            .bind(user_id)
            .bind(generate_wallet_number())
            .bind(currency)
            .execute(&mut *conn)
            .await?;

            let exists: bool = sqlx::query_scalar(
                "SELECT EXISTS(SELECT 1 FROM wallets WHERE user_id = $1 AND currency = $2)",
            )
            .bind(user_id)
            .bind(currency)
            .fetch_one(&mut *conn)
            .await?;

            if exists {
                created = true;
                break;
            }
        }

        if !created {
            return Err(AppError::Internal(format!(
                "could not allocate a {currency} wallet number for user {user_id}"
            )));
        }
    }

    let wallets = sqlx::query_as::<_, Wallet>(
        "SELECT * FROM wallets WHERE user_id = $1 ORDER BY currency",
    )
    .bind(user_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(wallets)
}

/// Non-locking read of all wallets of a user.
pub async fn get_wallets(pool: &DbPool, user_id: Uuid) -> Result<Vec<Wallet>, AppError> {
    let wallets = sqlx::query_as::<_, Wallet>(
        "SELECT * FROM wallets WHERE user_id = $1 ORDER BY currency",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;
    Ok(wallets)
}

pub async fn get_wallet(
    pool: &DbPool,
    user_id: Uuid,
    currency: Currency,
) -> Result<Wallet, AppError> {
    sqlx::query_as::<_, Wallet>("SELECT * FROM wallets WHERE user_id = $1 AND currency = $2")
        .bind(user_id)
        .bind(currency)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::WalletNotFound)
}

/// Balance of the wallet in the user's home currency.
pub async fn total_balance(pool: &DbPool, user: &User) -> Result<(Decimal, Currency), AppError> {
    let currency = user.country.home_currency();
    let wallet = get_wallet(pool, user.id, currency).await?;
    Ok((wallet.balance, currency))
}

/// Increments of `(total_deposits, total_withdrawals, total_conversions)`
/// caused by a delta of the given kind.
///
/// Conversions count the amount converted out of a wallet, so the credited
/// leg of a conversion does not add to the total a second time.
pub fn lifetime_increments(kind: LedgerKind, delta: Decimal) -> (Decimal, Decimal, Decimal) {
    let zero = Decimal::ZERO;
    match kind {
        LedgerKind::Deposit if delta > zero => (delta, zero, zero),
        LedgerKind::Withdrawal if delta < zero => (zero, -delta, zero),
        LedgerKind::Conversion if delta < zero => (zero, zero, -delta),
        _ => (zero, zero, zero),
    }
}

/// Apply a signed balance change to one wallet.
///
/// Locks the wallet row, re-checks `balance + delta >= 0` under the lock,
/// writes the new balance and the matching lifetime total and stamps
/// `last_transaction_at`. The change becomes visible when the caller commits.
///
/// # Errors
///
/// - `WalletNotFound` if the user has no wallet in `currency`
/// - `InsufficientFunds` if the delta would take the balance below zero
pub async fn apply_delta(
    conn: &mut PgConnection,
    user_id: Uuid,
    currency: Currency,
    delta: Decimal,
    kind: LedgerKind,
) -> Result<Wallet, AppError> {
    let delta = round_currency(delta);

    let wallet = sqlx::query_as::<_, Wallet>(
        "SELECT * FROM wallets WHERE user_id = $1 AND currency = $2 FOR UPDATE",
    )
    .bind(user_id)
    .bind(currency)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or(AppError::WalletNotFound)?;

    if !wallet.is_active {
        return Err(AppError::Forbidden(format!("{currency} wallet is inactive")));
    }

    let new_balance = wallet.balance + delta;
    if new_balance < Decimal::ZERO {
        tracing::info!(
            wallet_id = %wallet.id,
            balance = %wallet.balance,
            delta = %delta,
            "Debit refused: insufficient funds"
        );
        return Err(AppError::InsufficientFunds);
    }

    let (deposits, withdrawals, conversions) = lifetime_increments(kind, delta);

    let updated = sqlx::query_as::<_, Wallet>(
        r#"
        UPDATE wallets
        SET balance = $2,
            total_deposits = total_deposits + $3,
            total_withdrawals = total_withdrawals + $4,
            total_conversions = total_conversions + $5,
            last_transaction_at = NOW(),
            updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(wallet.id)
    .bind(new_balance)
    .bind(deposits)
    .bind(withdrawals)
    .bind(conversions)
    .fetch_one(&mut *conn)
    .await?;

    tracing::debug!(
        wallet_id = %updated.id,
        currency = %currency,
        delta = %delta,
        kind = kind.as_str(),
        balance = %updated.balance,
        "Wallet delta applied"
    );

    Ok(updated)
}

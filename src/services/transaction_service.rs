//! Transaction engine: the `pending -> completed | failed` state machine.
//!
//! This service handles:
//! - User-initiated creation (deposit, withdrawal, transfer)
//! - Admin approve / reject
//! - Processor-driven completion and failure (called by the webhook pipeline)
//!
//! # Atomicity Guarantees
//!
//! A status change and the wallet delta it implies commit together. The
//! transaction row is locked `FOR UPDATE` before its status is checked, so of
//! two racing settlers (two admins, or an admin and a webhook) exactly one
//! sees `pending`; the other fails with `InvalidTransition` and never touches
//! a wallet.
//!
//! Side effects (notifications, emails) are enqueued after commit.

use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::PgConnection;
use uuid::Uuid;

use crate::{
    error::AppError,
    jobs::payloads::{CreateNotificationRequest, TransactionEmailPayload},
    models::{
        admin_log::AdminActor,
        notification::NotificationType,
        transaction::{
            CreateOutcome, CreateTransferRequest, NewTransaction, NewTransactionDetails,
            PaymentType, Recipient, Transaction, TransactionDetails, TransactionStatus,
            TransactionType, TransactionWithDetails,
        },
        user::User,
        wallet::{LedgerKind, TopUpRequest, WithdrawRequest},
    },
    money::{Currency, to_minor_units, validate_amount},
    adapters::payment::CheckoutRequest,
    services::{
        activity_service::{self, ClientMeta},
        admin_service, conversion_service, rate_service, transaction_store, user_service,
        wallet_service,
    },
    state::AppState,
};

/// A transaction after a status change, with what it did to the wallet.
#[derive(Debug, Clone, Serialize)]
pub struct Transition {
    pub transaction: Transaction,
    pub details: TransactionDetails,
    /// Amount credited back to the `from` wallet, if any.
    pub refunded: Option<Decimal>,
    /// Amount credited to the `to` wallet on completion, if any.
    pub credited: Option<Decimal>,
}

/// What a processor-driven settlement did.
#[derive(Debug, Clone)]
pub enum Settlement {
    Applied(Transition),
    NotFound,
    /// The transaction already left `pending`.
    NotPending(TransactionStatus),
    /// The processor reported a different amount or currency.
    AmountMismatch {
        expected: Decimal,
        expected_currency: Currency,
        received: Option<Decimal>,
        received_currency: Option<Currency>,
    },
}

/// Amount and currency a processor claims to have collected.
#[derive(Debug, Clone, Copy)]
pub struct Collected {
    pub amount: Option<Decimal>,
    pub currency: Option<Currency>,
}

/// Notification type and title for a transaction reaching `status`.
pub fn notification_copy(
    kind: TransactionType,
    status: TransactionStatus,
) -> (NotificationType, &'static str) {
    use TransactionStatus::*;
    use TransactionType::*;
    match (kind, status) {
        (Deposit, Pending) => (NotificationType::Topup, "Top-up initiated"),
        (Deposit, Completed) => (NotificationType::Topup, "Top-up successful"),
        (Deposit, Failed) => (NotificationType::Topup, "Top-up failed"),
        (Withdrawal, Pending) => (NotificationType::Withdraw, "Withdrawal requested"),
        (Withdrawal, Completed) => (NotificationType::Withdraw, "Withdrawal completed"),
        (Withdrawal, Failed) => (NotificationType::Withdraw, "Withdrawal failed"),
        (Conversion, Pending) => (NotificationType::Conversion, "Conversion pending"),
        (Conversion, Completed) => (NotificationType::Conversion, "Conversion successful"),
        (Conversion, Failed) => (NotificationType::Conversion, "Conversion failed"),
        (Transfer, Pending) => (NotificationType::Transfer, "Transfer initiated"),
        (Transfer, Completed) => (NotificationType::Transfer, "Transfer completed"),
        (Transfer, Failed) => (NotificationType::Transfer, "Transfer failed"),
    }
}

/// Enqueue the notification row and email for a transaction's current status.
///
/// The notification carries `"<reference>:<status>"` as its natural key, so a
/// replayed announcement cannot produce a second row.
pub async fn announce(state: &AppState, transaction: &Transaction, details: &TransactionDetails) {
    let (kind, title) = notification_copy(transaction.transaction_type, transaction.status);
    let message = match transaction.transaction_type {
        TransactionType::Conversion => format!(
            "{} {} converted to {} {} (ref {})",
            details.from_amount,
            details.from_currency,
            details.to_amount,
            details.to_currency,
            transaction.reference
        ),
        _ => format!(
            "{title}: {} {} (ref {})",
            details.from_amount, details.from_currency, transaction.reference
        ),
    };

    state
        .jobs
        .dispatch(&CreateNotificationRequest {
            user_id: transaction.user_id,
            kind,
            title: title.to_string(),
            message,
            dedup_key: Some(format!("{}:{}", transaction.reference, transaction.status)),
        })
        .await;

    match user_service::find_by_id(&state.pool, transaction.user_id).await {
        Ok(user) => {
            state
                .jobs
                .dispatch(&TransactionEmailPayload {
                    to: user.email,
                    name: user.full_name,
                    reference: transaction.reference.clone(),
                    transaction_type: transaction.transaction_type,
                    status: transaction.status,
                    amount: details.from_amount,
                    currency: details.from_currency,
                })
                .await;
        }
        Err(e) => {
            tracing::warn!(reference = %transaction.reference, error = %e, "No email for transaction owner");
        }
    }
}

/// Complete a locked pending transaction.
///
/// Deposits credit the `to` wallet; every other type moved its funds at
/// creation (wallet debit) or outside the ledger (processor payout).
pub async fn complete_locked(
    conn: &mut PgConnection,
    current: &Transaction,
    details: &TransactionDetails,
) -> Result<Transition, AppError> {
    current.status.transition_to(TransactionStatus::Completed)?;

    let credited = if current.transaction_type == TransactionType::Deposit {
        wallet_service::apply_delta(
            conn,
            current.user_id,
            details.to_currency,
            details.to_amount,
            LedgerKind::Deposit,
        )
        .await?;
        Some(details.to_amount)
    } else {
        None
    };

    let transaction =
        transaction_store::update_status(conn, current, TransactionStatus::Completed, None).await?;

    Ok(Transition {
        transaction,
        details: details.clone(),
        refunded: None,
        credited,
    })
}

/// Fail a locked pending transaction, refunding the `from` wallet when the
/// amount left it at creation.
pub async fn fail_locked(
    conn: &mut PgConnection,
    current: &Transaction,
    details: &TransactionDetails,
    label: &str,
    reason: &str,
) -> Result<Transition, AppError> {
    current.status.transition_to(TransactionStatus::Failed)?;

    let refunded = if current.wallet_debited {
        wallet_service::apply_delta(
            conn,
            current.user_id,
            details.from_currency,
            details.from_amount,
            LedgerKind::Refund,
        )
        .await?;
        Some(details.from_amount)
    } else {
        None
    };

    let description = transaction_store::append_reason(&current.description, label, reason);
    let transaction = transaction_store::update_status(
        conn,
        current,
        TransactionStatus::Failed,
        Some(description),
    )
    .await?;

    if let Some(amount) = refunded {
        tracing::info!(
            reference = %transaction.reference,
            amount = %amount,
            currency = %details.from_currency,
            "Refund credited"
        );
    }

    Ok(Transition {
        transaction,
        details: details.clone(),
        refunded,
        credited: None,
    })
}

/// Processor success for `reference`.
///
/// When `collected` carries an amount or currency it must match the
/// transaction's `from` side, otherwise nothing changes.
pub async fn mark_completed(
    conn: &mut PgConnection,
    reference: &str,
    collected: Collected,
) -> Result<Settlement, AppError> {
    let Some(current) = transaction_store::lock_by_reference(conn, reference).await? else {
        return Ok(Settlement::NotFound);
    };
    if current.status != TransactionStatus::Pending {
        return Ok(Settlement::NotPending(current.status));
    }
    let details = transaction_store::details_for(&mut *conn, current.id).await?;

    let amount_ok = collected.amount.is_none_or(|a| a == details.from_amount);
    let currency_ok = collected.currency.is_none_or(|c| c == details.from_currency);
    if !amount_ok || !currency_ok {
        return Ok(Settlement::AmountMismatch {
            expected: details.from_amount,
            expected_currency: details.from_currency,
            received: collected.amount,
            received_currency: collected.currency,
        });
    }

    Ok(Settlement::Applied(
        complete_locked(conn, &current, &details).await?,
    ))
}

/// Processor failure for `reference`.
pub async fn mark_failed(
    conn: &mut PgConnection,
    reference: &str,
    reason: &str,
) -> Result<Settlement, AppError> {
    let Some(current) = transaction_store::lock_by_reference(conn, reference).await? else {
        return Ok(Settlement::NotFound);
    };
    if current.status != TransactionStatus::Pending {
        return Ok(Settlement::NotPending(current.status));
    }
    let details = transaction_store::details_for(&mut *conn, current.id).await?;
    Ok(Settlement::Applied(
        fail_locked(conn, &current, &details, "Failed", reason).await?,
    ))
}

/// Start a hosted checkout for a pending transaction. If the processor
/// refuses, the transaction is failed so it does not linger as pending.
async fn start_checkout(
    state: &AppState,
    user: &User,
    created: &TransactionWithDetails,
    amount: Decimal,
    currency: Currency,
) -> Result<String, AppError> {
    let request = CheckoutRequest {
        reference: created.transaction.reference.clone(),
        email: user.email.clone(),
        amount: to_minor_units(amount)?,
        currency,
        callback_url: state.checkout_callback_url(&created.transaction.reference),
    };

    match state.payments.initialize(&request).await {
        Ok(session) => Ok(session.authorization_url),
        Err(err) => {
            tracing::error!(
                reference = %request.reference,
                processor = state.payments.name(),
                error = %err,
                "Checkout initialization failed"
            );
            let mut tx = state.pool.begin().await?;
            let current = transaction_store::lock_by_id(&mut tx, created.transaction.id).await?;
            if current.status == TransactionStatus::Pending {
                let details = transaction_store::details_for(&mut *tx, current.id).await?;
                fail_locked(&mut tx, &current, &details, "Failed", "checkout could not be started")
                    .await?;
            }
            tx.commit().await?;
            Err(err)
        }
    }
}

fn require_details(created: &TransactionWithDetails) -> Result<&TransactionDetails, AppError> {
    created
        .details
        .as_ref()
        .ok_or_else(|| AppError::Internal("transaction created without details".to_string()))
}

/// Top up a wallet.
///
/// - `checkout`: returns a processor URL; completion arrives by webhook
/// - `bank` / `momo`: stays pending until an admin approves
///
/// No wallet delta happens here.
pub async fn deposit(
    state: &AppState,
    user: &User,
    request: &TopUpRequest,
    meta: &ClientMeta,
) -> Result<CreateOutcome, AppError> {
    let amount = validate_amount(request.amount)?;
    let currency: Currency = request.currency.parse()?;
    let method: PaymentType = request.payment_method.parse()?;
    if method == PaymentType::Wallet {
        return Err(AppError::Validation(
            "Top-ups must use bank, momo or checkout".to_string(),
        ));
    }

    let new = NewTransaction {
        user_id: user.id,
        transaction_type: TransactionType::Deposit,
        payment_type: method,
        status: TransactionStatus::Pending,
        description: format!("{currency} wallet top-up via {}", method.as_str()),
        wallet_debited: false,
        details: NewTransactionDetails {
            from_currency: currency,
            to_currency: currency,
            from_amount: amount,
            to_amount: amount,
            fee: Decimal::ZERO,
            exchange_rate: None,
            recipient: Recipient {
                recipient_name: Some(user.full_name.clone()),
                ..Default::default()
            },
            method_of_payment: method.as_str().to_string(),
        },
    };

    let mut tx = state.pool.begin().await?;
    let created = transaction_store::create(&mut tx, &new).await?;
    tx.commit().await?;

    let authorization_url = if method == PaymentType::Checkout {
        Some(start_checkout(state, user, &created, amount, currency).await?)
    } else {
        None
    };

    announce(state, &created.transaction, require_details(&created)?).await;
    activity_service::log(
        &state.jobs,
        user.id,
        format!("Initiated {currency} top-up of {amount}"),
        meta,
    )
    .await;

    Ok(CreateOutcome {
        transaction: created,
        authorization_url,
    })
}

/// Withdraw to a bank account or mobile money wallet.
///
/// The wallet is debited immediately; a later failure refunds it.
pub async fn withdraw(
    state: &AppState,
    user: &User,
    request: &WithdrawRequest,
    meta: &ClientMeta,
) -> Result<TransactionWithDetails, AppError> {
    let amount = validate_amount(request.amount)?;
    let currency: Currency = request.currency.parse()?;
    let rail: PaymentType = request.withdrawal_method.parse()?;
    if !matches!(rail, PaymentType::Bank | PaymentType::Momo) {
        return Err(AppError::Validation(
            "Withdrawals must go to bank or momo".to_string(),
        ));
    }
    if request.account_details.is_empty() {
        return Err(AppError::Validation("account_details is required".to_string()));
    }
    let recipient = Recipient::from_map(&request.account_details);
    recipient.validate_for(rail)?;

    let description = format!(
        "Withdrawal to {}",
        recipient
            .bank_name
            .as_deref()
            .or(recipient.network.as_deref())
            .unwrap_or(rail.as_str())
    );

    let new = NewTransaction {
        user_id: user.id,
        transaction_type: TransactionType::Withdrawal,
        payment_type: rail,
        status: TransactionStatus::Pending,
        description,
        wallet_debited: true,
        details: NewTransactionDetails {
            from_currency: currency,
            to_currency: currency,
            from_amount: amount,
            to_amount: amount,
            fee: Decimal::ZERO,
            exchange_rate: None,
            recipient,
            method_of_payment: rail.as_str().to_string(),
        },
    };

    let mut tx = state.pool.begin().await?;
    wallet_service::apply_delta(&mut tx, user.id, currency, -amount, LedgerKind::Withdrawal)
        .await?;
    let created = transaction_store::create(&mut tx, &new).await?;
    tx.commit().await?;

    announce(state, &created.transaction, require_details(&created)?).await;
    activity_service::log(
        &state.jobs,
        user.id,
        format!("Requested {currency} withdrawal of {amount}"),
        meta,
    )
    .await;

    Ok(created)
}

/// Send money to a bank or momo recipient.
///
/// Funding comes from the wallet (debited now, refunded on failure) or from a
/// hosted checkout (nothing debited). When `to_currency` differs, the
/// recipient amount is priced like a conversion.
pub async fn create_transfer(
    state: &AppState,
    user: &User,
    request: &CreateTransferRequest,
    meta: &ClientMeta,
) -> Result<CreateOutcome, AppError> {
    let amount = validate_amount(request.amount)?;
    let from: Currency = request.from_currency.parse()?;
    let to: Currency = match request.to_currency.as_deref().map(str::trim) {
        Some(code) if !code.is_empty() => code.parse()?,
        _ => from,
    };
    let rail: PaymentType = request.recipient_type.parse()?;
    if !matches!(rail, PaymentType::Bank | PaymentType::Momo) {
        return Err(AppError::Validation(
            "recipient_type must be bank or momo".to_string(),
        ));
    }
    let recipient = request.recipient.normalized();
    recipient.validate_for(rail)?;
    let funding: PaymentType = request.method_of_payment.parse()?;
    if !matches!(funding, PaymentType::Wallet | PaymentType::Checkout) {
        return Err(AppError::Validation(
            "method_of_payment must be wallet or checkout".to_string(),
        ));
    }

    let (fee, to_amount, exchange_rate) = if from == to {
        (Decimal::ZERO, amount, None)
    } else {
        let rate = rate_service::current_rate(&state.pool, from, to).await?;
        let quote = conversion_service::price(rate, amount, state.fee_percent());
        if quote.converted <= Decimal::ZERO {
            return Err(AppError::Validation(
                "Amount is too small to convert".to_string(),
            ));
        }
        (quote.fee, quote.converted, Some(quote.rate))
    };

    let description = request
        .description
        .as_deref()
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| {
            format!(
                "Transfer to {}",
                recipient.recipient_name.as_deref().unwrap_or("recipient")
            )
        });

    let wallet_funded = funding == PaymentType::Wallet;
    let new = NewTransaction {
        user_id: user.id,
        transaction_type: TransactionType::Transfer,
        payment_type: rail,
        status: TransactionStatus::Pending,
        description,
        wallet_debited: wallet_funded,
        details: NewTransactionDetails {
            from_currency: from,
            to_currency: to,
            from_amount: amount,
            to_amount,
            fee,
            exchange_rate,
            recipient,
            method_of_payment: funding.as_str().to_string(),
        },
    };

    let mut tx = state.pool.begin().await?;
    if wallet_funded {
        wallet_service::apply_delta(&mut tx, user.id, from, -amount, LedgerKind::Withdrawal)
            .await?;
    }
    let created = transaction_store::create(&mut tx, &new).await?;
    tx.commit().await?;

    let authorization_url = if wallet_funded {
        None
    } else {
        Some(start_checkout(state, user, &created, amount, from).await?)
    };

    announce(state, &created.transaction, require_details(&created)?).await;
    activity_service::log(
        &state.jobs,
        user.id,
        format!("Initiated transfer of {amount} {from}"),
        meta,
    )
    .await;

    Ok(CreateOutcome {
        transaction: created,
        authorization_url,
    })
}

/// A deposit owned by `user_id`.
pub async fn get_topup(
    state: &AppState,
    user_id: Uuid,
    id: Uuid,
) -> Result<TransactionWithDetails, AppError> {
    let found = transaction_store::find_for_user(&state.pool, user_id, id).await?;
    if found.transaction.transaction_type != TransactionType::Deposit {
        return Err(AppError::TransactionNotFound);
    }
    Ok(found)
}

/// Admin approval of a pending transaction.
pub async fn approve(
    state: &AppState,
    actor: &AdminActor,
    id: Uuid,
) -> Result<Transition, AppError> {
    let mut tx = state.pool.begin().await?;
    let current = transaction_store::lock_by_id(&mut tx, id).await?;
    let details = transaction_store::details_for(&mut *tx, current.id).await?;

    let transition = complete_locked(&mut tx, &current, &details).await?;

    admin_service::record_action(
        &mut tx,
        actor,
        "approve_transaction",
        "transaction",
        &id.to_string(),
        serde_json::json!({
            "reference": current.reference,
            "type": current.transaction_type,
            "amount": details.from_amount,
            "currency": details.from_currency,
            "credited": transition.credited,
        }),
    )
    .await?;

    tx.commit().await?;

    announce(state, &transition.transaction, &transition.details).await;
    Ok(transition)
}

/// Admin rejection of a pending transaction. Refunds a debited wallet and
/// appends the reason to the description.
pub async fn reject(
    state: &AppState,
    actor: &AdminActor,
    id: Uuid,
    reason: &str,
) -> Result<Transition, AppError> {
    let reason = reason.trim();
    if reason.is_empty() {
        return Err(AppError::Validation("A rejection reason is required".to_string()));
    }

    let mut tx = state.pool.begin().await?;
    let current = transaction_store::lock_by_id(&mut tx, id).await?;
    let details = transaction_store::details_for(&mut *tx, current.id).await?;

    let transition = fail_locked(&mut tx, &current, &details, "Rejected", reason).await?;

    admin_service::record_action(
        &mut tx,
        actor,
        "reject_transaction",
        "transaction",
        &id.to_string(),
        serde_json::json!({
            "reference": current.reference,
            "reason": reason,
            "refunded": transition.refunded,
            "currency": details.from_currency,
        }),
    )
    .await?;

    tx.commit().await?;

    announce(state, &transition.transaction, &transition.details).await;
    Ok(transition)
}

/// Credit a wallet through a completed deposit. Mounted only outside
/// production.
pub async fn fund_wallet(
    state: &AppState,
    user: &User,
    currency: Currency,
    amount: Decimal,
) -> Result<Transition, AppError> {
    let amount = validate_amount(amount)?;
    let new = NewTransaction {
        user_id: user.id,
        transaction_type: TransactionType::Deposit,
        payment_type: PaymentType::Bank,
        status: TransactionStatus::Pending,
        description: "Test funding".to_string(),
        wallet_debited: false,
        details: NewTransactionDetails {
            from_currency: currency,
            to_currency: currency,
            from_amount: amount,
            to_amount: amount,
            fee: Decimal::ZERO,
            exchange_rate: None,
            recipient: Recipient::default(),
            method_of_payment: "test".to_string(),
        },
    };

    let mut tx = state.pool.begin().await?;
    wallet_service::find_or_create_wallets(&mut tx, user.id).await?;
    let created = transaction_store::create(&mut tx, &new).await?;
    let details = require_details(&created)?.clone();
    let transition = complete_locked(&mut tx, &created.transaction, &details).await?;
    tx.commit().await?;

    tracing::warn!(user_id = %user.id, amount = %amount, currency = %currency, "Test funding applied");
    Ok(transition)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_type_and_status_has_copy() {
        for kind in [
            TransactionType::Deposit,
            TransactionType::Withdrawal,
            TransactionType::Conversion,
            TransactionType::Transfer,
        ] {
            for status in [
                TransactionStatus::Pending,
                TransactionStatus::Completed,
                TransactionStatus::Failed,
            ] {
                let (_, title) = notification_copy(kind, status);
                assert!(!title.is_empty());
            }
        }
        assert_eq!(
            notification_copy(TransactionType::Deposit, TransactionStatus::Completed),
            (NotificationType::Topup, "Top-up successful")
        );
        assert_eq!(
            notification_copy(TransactionType::Withdrawal, TransactionStatus::Failed).0,
            NotificationType::Withdraw
        );
    }
}

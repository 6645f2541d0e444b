//! Wallet data models.
//!
//! A wallet is the ledger row for one `(user, currency)` pair. Balances are
//! `NUMERIC(20,2)` and never negative (database CHECK constraint plus the
//! check inside `wallet_service::apply_delta`).

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::money::Currency;

/// Represents a wallet record from the database.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct Wallet {
    pub id: Uuid,

    /// Owning user (internal id).
    pub user_id: Uuid,

    /// Customer-facing 10 to 12 digit wallet number.
    pub wallet_number: String,

    /// Immutable after creation.
    pub currency: Currency,

    pub balance: Decimal,

    /// Lifetime totals. They only grow; refunds are audited through
    /// transaction rows instead of decrementing these.
    pub total_deposits: Decimal,
    pub total_withdrawals: Decimal,
    pub total_conversions: Decimal,

    pub is_active: bool,
    pub last_transaction_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Which lifetime total a balance delta feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerKind {
    Deposit,
    Withdrawal,
    Conversion,
    /// Compensating credit; touches no lifetime total.
    Refund,
}

impl LedgerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LedgerKind::Deposit => "deposit",
            LedgerKind::Withdrawal => "withdrawal",
            LedgerKind::Conversion => "conversion",
            LedgerKind::Refund => "refund",
        }
    }
}

/// Response body for `GET /wallet/balance`.
#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    pub wallets: Vec<Wallet>,
    /// Balance of the wallet in the user's home currency.
    pub total_balance: Decimal,
    pub total_currency: Currency,
}

/// Request body for `POST /wallet/topup`.
#[derive(Debug, Deserialize)]
pub struct TopUpRequest {
    pub amount: Decimal,
    pub currency: String,
    pub payment_method: String,
}

/// Request body for `POST /wallet/withdraw`.
#[derive(Debug, Deserialize)]
pub struct WithdrawRequest {
    pub amount: Decimal,
    pub currency: String,
    pub withdrawal_method: String,
    /// Destination identifiers: `account_name`, `bank_name`,
    /// `account_number`, or `phone_number` + `network` for mobile money.
    pub account_details: std::collections::HashMap<String, String>,
}

/// Request body for `POST /api/test/fund-wallet`.
#[derive(Debug, Deserialize)]
pub struct FundWalletRequest {
    pub user_id: Option<Uuid>,
    pub currency: String,
    pub amount: Decimal,
}

//! Transaction data models and API request/response types.
//!
//! This module defines:
//! - `Transaction` and `TransactionDetails`: the two database rows behind
//!   every business event
//! - the state machine (`TransactionStatus::transition_to`)
//! - the direction tag derivation
//! - request types for transfers and history filters

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{error::AppError, money::Currency};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "transaction_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Deposit,
    Withdrawal,
    Conversion,
    Transfer,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Deposit => "deposit",
            TransactionType::Withdrawal => "withdrawal",
            TransactionType::Conversion => "conversion",
            TransactionType::Transfer => "transfer",
        }
    }

    /// Prefix of the public reference.
    pub fn reference_prefix(&self) -> &'static str {
        match self {
            TransactionType::Deposit => "TOPUP",
            TransactionType::Withdrawal => "WD",
            TransactionType::Conversion => "CONV",
            TransactionType::Transfer => "TRF",
        }
    }
}

impl FromStr for TransactionType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "deposit" | "topup" => Ok(TransactionType::Deposit),
            "withdrawal" | "withdraw" => Ok(TransactionType::Withdrawal),
            "conversion" | "convert" => Ok(TransactionType::Conversion),
            "transfer" => Ok(TransactionType::Transfer),
            other => Err(AppError::Validation(format!(
                "Unknown transaction type: {other}"
            ))),
        }
    }
}

/// Lifecycle of a transaction: `pending -> completed | failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "transaction_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Failed,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Completed => "completed",
            TransactionStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, TransactionStatus::Pending)
    }

    /// Validate a transition. Both sink states are terminal.
    pub fn transition_to(self, next: TransactionStatus) -> Result<TransactionStatus, AppError> {
        match (self, next) {
            (TransactionStatus::Pending, TransactionStatus::Completed)
            | (TransactionStatus::Pending, TransactionStatus::Failed) => Ok(next),
            (from, to) => Err(AppError::InvalidTransition(format!(
                "{} -> {}",
                from.as_str(),
                to.as_str()
            ))),
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(TransactionStatus::Pending),
            "completed" => Ok(TransactionStatus::Completed),
            "failed" => Ok(TransactionStatus::Failed),
            other => Err(AppError::Validation(format!("Unknown status: {other}"))),
        }
    }
}

/// How a transaction is funded or paid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "payment_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PaymentType {
    Bank,
    Momo,
    Wallet,
    Checkout,
}

impl PaymentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentType::Bank => "bank",
            PaymentType::Momo => "momo",
            PaymentType::Wallet => "wallet",
            PaymentType::Checkout => "checkout",
        }
    }
}

impl FromStr for PaymentType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bank" | "bank_transfer" => Ok(PaymentType::Bank),
            "momo" | "mobile_money" => Ok(PaymentType::Momo),
            "wallet" => Ok(PaymentType::Wallet),
            "checkout" | "card" | "paystack" => Ok(PaymentType::Checkout),
            other => Err(AppError::Validation(format!(
                "Unsupported payment method: {other}"
            ))),
        }
    }
}

/// Derive the direction tag from type and currency pair.
///
/// - conversions, and transfers that change currency: `NGN→GHS`
/// - deposits: `DEPOSIT-NGN`
/// - withdrawals: `WITHDRAW-NGN`
/// - same-currency transfers: `TRANSFER-NGN`
pub fn derive_direction(kind: TransactionType, from: Currency, to: Currency) -> String {
    match kind {
        TransactionType::Conversion => format!("{from}→{to}"),
        TransactionType::Transfer if from != to => format!("{from}→{to}"),
        TransactionType::Transfer => format!("TRANSFER-{from}"),
        TransactionType::Deposit => format!("DEPOSIT-{to}"),
        TransactionType::Withdrawal => format!("WITHDRAW-{from}"),
    }
}

/// Represents a transaction record from the database.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct Transaction {
    pub id: Uuid,

    /// Public reference, unique. Processors echo it back in webhooks.
    pub reference: String,

    pub user_id: Uuid,

    pub transaction_type: TransactionType,

    /// Written once at creation, see [`derive_direction`].
    pub direction: String,

    pub payment_type: PaymentType,

    pub status: TransactionStatus,

    pub description: String,

    /// True when the amount left the user's wallet at creation. A failed or
    /// rejected transaction with this flag gets a compensating credit.
    pub wallet_debited: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Operational side-car of a transaction (1:1, cascade delete).
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct TransactionDetails {
    pub id: Uuid,
    pub transaction_id: Uuid,
    pub from_currency: Currency,
    pub to_currency: Currency,
    pub from_amount: Decimal,
    pub to_amount: Decimal,
    pub fee: Decimal,
    /// Rate applied when the currencies differ.
    pub exchange_rate: Option<Decimal>,
    pub recipient_name: Option<String>,
    pub bank_name: Option<String>,
    pub account_number: Option<String>,
    pub phone_number: Option<String>,
    pub network: Option<String>,
    pub method_of_payment: String,
    pub created_at: DateTime<Utc>,
}

/// Values for a new details row.
#[derive(Debug, Clone)]
pub struct NewTransactionDetails {
    pub from_currency: Currency,
    pub to_currency: Currency,
    pub from_amount: Decimal,
    pub to_amount: Decimal,
    pub fee: Decimal,
    pub exchange_rate: Option<Decimal>,
    pub recipient: Recipient,
    pub method_of_payment: String,
}

/// Destination identifiers for payouts.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Recipient {
    pub recipient_name: Option<String>,
    pub bank_name: Option<String>,
    pub account_number: Option<String>,
    pub phone_number: Option<String>,
    pub network: Option<String>,
}

fn clean(value: &str) -> Option<String> {
    Some(value.trim().to_string()).filter(|v| !v.is_empty())
}

impl Recipient {
    /// Build from a free-form account details map (withdrawal requests).
    pub fn from_map(map: &std::collections::HashMap<String, String>) -> Self {
        let get = |keys: &[&str]| keys.iter().find_map(|k| map.get(*k)).and_then(|v| clean(v));
        Self {
            recipient_name: get(&["account_name", "recipient_name", "name"]),
            bank_name: get(&["bank_name", "bank"]),
            account_number: get(&["account_number"]),
            phone_number: get(&["phone_number", "phone"]),
            network: get(&["network"]),
        }
    }

    /// Trimmed copy with blank values dropped, as `from_map` produces.
    pub fn normalized(&self) -> Self {
        let get = |value: &Option<String>| value.as_deref().and_then(clean);
        Self {
            recipient_name: get(&self.recipient_name),
            bank_name: get(&self.bank_name),
            account_number: get(&self.account_number),
            phone_number: get(&self.phone_number),
            network: get(&self.network),
        }
    }

    /// Check that the identifiers required by a payout rail are present.
    pub fn validate_for(&self, rail: PaymentType) -> Result<(), AppError> {
        let ok = match rail {
            PaymentType::Bank => self.account_number.is_some() && self.bank_name.is_some(),
            PaymentType::Momo => self.phone_number.is_some() && self.network.is_some(),
            PaymentType::Wallet | PaymentType::Checkout => true,
        };
        if ok {
            Ok(())
        } else {
            Err(AppError::Validation(format!(
                "Missing account details for {} payout",
                rail.as_str()
            )))
        }
    }
}

/// Values for a new transaction row.
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub user_id: Uuid,
    pub transaction_type: TransactionType,
    pub payment_type: PaymentType,
    pub status: TransactionStatus,
    pub description: String,
    pub wallet_debited: bool,
    pub details: NewTransactionDetails,
}

/// A transaction together with its details row.
#[derive(Debug, Clone, Serialize)]
pub struct TransactionWithDetails {
    #[serde(flatten)]
    pub transaction: Transaction,
    pub details: Option<TransactionDetails>,
}

/// Request body for `POST /transactions/new`.
#[derive(Debug, Deserialize)]
pub struct CreateTransferRequest {
    pub amount: Decimal,
    pub from_currency: String,
    /// Defaults to `from_currency`.
    pub to_currency: Option<String>,
    /// `wallet` or `checkout`.
    pub method_of_payment: String,
    /// Payout rail of the recipient: `bank` or `momo`.
    pub recipient_type: String,
    #[serde(flatten)]
    pub recipient: Recipient,
    pub description: Option<String>,
}

/// Filters for history and admin listings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TransactionFilter {
    pub user_id: Option<Uuid>,
    pub status: Option<String>,
    #[serde(rename = "type")]
    pub transaction_type: Option<String>,
    pub currency: Option<String>,
    pub date_from: Option<DateTime<Utc>>,
    pub date_to: Option<DateTime<Utc>>,
    pub search: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

/// Outcome of a create call: the pending row and, for checkout funding, the
/// processor page the client must be redirected to.
#[derive(Debug, Clone, Serialize)]
pub struct CreateOutcome {
    pub transaction: TransactionWithDetails,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authorization_url: Option<String>,
}

/// Per-user aggregates for `GET /transactions/stats`.
#[derive(Debug, Clone, Serialize)]
pub struct TransactionStats {
    pub total: i64,
    pub pending: i64,
    pub completed: i64,
    pub failed: i64,
    pub volume: Vec<CurrencyVolume>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct CurrencyVolume {
    pub currency: Currency,
    pub completed_amount: Decimal,
}

/// Body of `PATCH /admin/transactions/reject/{id}`.
#[derive(Debug, Deserialize)]
pub struct RejectRequest {
    pub reason: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_moves_to_either_sink() {
        assert_eq!(
            TransactionStatus::Pending
                .transition_to(TransactionStatus::Completed)
                .unwrap(),
            TransactionStatus::Completed
        );
        assert_eq!(
            TransactionStatus::Pending
                .transition_to(TransactionStatus::Failed)
                .unwrap(),
            TransactionStatus::Failed
        );
    }

    #[test]
    fn sink_states_are_terminal() {
        for from in [TransactionStatus::Completed, TransactionStatus::Failed] {
            assert!(from.is_terminal());
            for to in [
                TransactionStatus::Pending,
                TransactionStatus::Completed,
                TransactionStatus::Failed,
            ] {
                assert!(matches!(
                    from.transition_to(to),
                    Err(AppError::InvalidTransition(_))
                ));
            }
        }
        assert!(
            TransactionStatus::Pending
                .transition_to(TransactionStatus::Pending)
                .is_err()
        );
    }

    #[test]
    fn direction_is_derived_from_type_and_pair() {
        use Currency::*;
        assert_eq!(derive_direction(TransactionType::Conversion, Ngn, Ghs), "NGN→GHS");
        assert_eq!(derive_direction(TransactionType::Deposit, Ngn, Ngn), "DEPOSIT-NGN");
        assert_eq!(derive_direction(TransactionType::Withdrawal, Ghs, Ghs), "WITHDRAW-GHS");
        assert_eq!(derive_direction(TransactionType::Transfer, Ghs, Ghs), "TRANSFER-GHS");
        assert_eq!(derive_direction(TransactionType::Transfer, Ghs, Ngn), "GHS→NGN");
    }

    #[test]
    fn payment_type_aliases() {
        assert_eq!("bank_transfer".parse::<PaymentType>().unwrap(), PaymentType::Bank);
        assert_eq!("mobile_money".parse::<PaymentType>().unwrap(), PaymentType::Momo);
        assert_eq!("card".parse::<PaymentType>().unwrap(), PaymentType::Checkout);
        assert!("crypto".parse::<PaymentType>().is_err());
    }

    #[test]
    fn recipient_from_account_details() {
        let mut map = std::collections::HashMap::new();
        map.insert("account_name".to_string(), "Ama Mensah".to_string());
        map.insert("phone_number".to_string(), "0241234567".to_string());
        map.insert("network".to_string(), "MTN".to_string());
        map.insert("bank_name".to_string(), "  ".to_string());

        let recipient = Recipient::from_map(&map);
        assert_eq!(recipient.recipient_name.as_deref(), Some("Ama Mensah"));
        assert_eq!(recipient.bank_name, None);
        assert!(recipient.validate_for(PaymentType::Momo).is_ok());
        assert!(recipient.validate_for(PaymentType::Bank).is_err());
    }

    #[test]
    fn blank_transfer_recipient_fails_validation() {
        let request: CreateTransferRequest = serde_json::from_value(serde_json::json!({
            "amount": "100",
            "from_currency": "NGN",
            "method_of_payment": "wallet",
            "recipient_type": "bank",
            "recipient_name": " Ada ",
            "account_number": "",
            "bank_name": "   "
        }))
        .unwrap();

        let recipient = request.recipient.normalized();
        assert_eq!(recipient.recipient_name.as_deref(), Some("Ada"));
        assert_eq!((recipient.account_number, recipient.bank_name.clone()), (None, None));
        assert!(matches!(
            request.recipient.normalized().validate_for(PaymentType::Bank),
            Err(AppError::Validation(_))
        ));
    }
}

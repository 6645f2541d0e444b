//! Catalogue of well-known error codes rendered by the front-ends.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    InsufficientFunds,
    InvalidAmounts,
    InvalidAccount,
    NetworkError,
    RateLimit,
    Maintenance,
    InternalServerError,
    NoPaymentReceived,
    TransactionNotFound,
}

/// What the UI shows for an error code.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorInfo {
    pub code: &'static str,
    pub title: &'static str,
    pub description: &'static str,
    pub action: &'static str,
}

impl ErrorCode {
    pub const ALL: [ErrorCode; 9] = [
        ErrorCode::InsufficientFunds,
        ErrorCode::InvalidAmounts,
        ErrorCode::InvalidAccount,
        ErrorCode::NetworkError,
        ErrorCode::RateLimit,
        ErrorCode::Maintenance,
        ErrorCode::InternalServerError,
        ErrorCode::NoPaymentReceived,
        ErrorCode::TransactionNotFound,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::InsufficientFunds => "INSUFFICIENT_FUNDS",
            ErrorCode::InvalidAmounts => "INVALID_AMOUNTS",
            ErrorCode::InvalidAccount => "INVALID_ACCOUNT",
            ErrorCode::NetworkError => "NETWORK_ERROR",
            ErrorCode::RateLimit => "RATE_LIMIT",
            ErrorCode::Maintenance => "MAINTENANCE",
            ErrorCode::InternalServerError => "INTERNAL_SERVER_ERROR",
            ErrorCode::NoPaymentReceived => "NO_PAYMENT_RECEIVED",
            ErrorCode::TransactionNotFound => "TRANSACTION_NOT_FOUND",
        }
    }

    pub fn parse(code: &str) -> Option<ErrorCode> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(code))
    }

    pub fn info(&self) -> ErrorInfo {
        let (title, description, action) = match self {
            ErrorCode::InsufficientFunds => (
                "Insufficient funds",
                "Your wallet balance is too low to complete this transaction.",
                "Top up your wallet and try again.",
            ),
            ErrorCode::InvalidAmounts => (
                "Invalid amount",
                "The amount entered is not valid for this transaction.",
                "Enter an amount greater than zero with at most two decimals.",
            ),
            ErrorCode::InvalidAccount => (
                "Invalid account",
                "The recipient account details could not be verified.",
                "Check the account number or phone number and try again.",
            ),
            ErrorCode::NetworkError => (
                "Network error",
                "We could not reach the payment network.",
                "Check your connection and retry in a few minutes.",
            ),
            ErrorCode::RateLimit => (
                "Too many requests",
                "You have made too many requests in a short period.",
                "Wait a moment before trying again.",
            ),
            ErrorCode::Maintenance => (
                "Scheduled maintenance",
                "This service is temporarily unavailable for maintenance.",
                "Please try again later.",
            ),
            ErrorCode::InternalServerError => (
                "Something went wrong",
                "An unexpected error occurred on our side.",
                "Try again. Contact support if the problem persists.",
            ),
            ErrorCode::NoPaymentReceived => (
                "No payment received",
                "We have not received a payment for this transaction yet.",
                "Complete the payment or wait for the processor to confirm it.",
            ),
            ErrorCode::TransactionNotFound => (
                "Transaction not found",
                "We could not find the transaction you are looking for.",
                "Check the reference and try again.",
            ),
        };
        ErrorInfo {
            code: self.as_str(),
            title,
            description,
            action,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_code_parses_back() {
        for code in ErrorCode::ALL {
            assert_eq!(ErrorCode::parse(code.as_str()), Some(code));
            assert_eq!(code.info().code, code.as_str());
        }
        assert_eq!(
            ErrorCode::parse("insufficient_funds"),
            Some(ErrorCode::InsufficientFunds)
        );
        assert_eq!(ErrorCode::parse("NOPE"), None);
    }
}

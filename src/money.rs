//! Money primitives: supported currencies, rounding and fee math.
//!
//! Every amount that crosses a service boundary goes through
//! [`round_currency`]. Amounts are `rust_decimal::Decimal` so that the
//! two-decimal ledger never sees binary floating point error.

use std::fmt;
use std::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Default conversion fee, in percent.
pub const DEFAULT_CONVERSION_FEE_PERCENT: Decimal = Decimal::from_parts(20, 0, 0, false, 1);

/// Currencies a wallet can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "currency_code", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Ngn,
    Ghs,
}

impl Currency {
    /// Every supported currency, in wallet creation order.
    pub const ALL: [Currency; 2] = [Currency::Ngn, Currency::Ghs];

    pub fn as_str(&self) -> &'static str {
        match self {
            Currency::Ngn => "NGN",
            Currency::Ghs => "GHS",
        }
    }

    /// The other side of the only supported pair.
    pub fn counterpart(&self) -> Currency {
        match self {
            Currency::Ngn => Currency::Ghs,
            Currency::Ghs => Currency::Ngn,
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Currency {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "NGN" => Ok(Currency::Ngn),
            "GHS" => Ok(Currency::Ghs),
            other => Err(AppError::Validation(format!(
                "Unsupported currency: {other}"
            ))),
        }
    }
}

/// Round half away from zero to two decimal places.
pub fn round_currency(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// `round_currency(amount * percent / 100)`.
pub fn calculate_fee(amount: Decimal, percent: Decimal) -> Decimal {
    round_currency(amount * percent / Decimal::ONE_HUNDRED)
}

/// Round a client supplied amount and reject anything that is not positive
/// after rounding (so `0.001` is refused as `0.00`).
pub fn validate_amount(amount: Decimal) -> Result<Decimal, AppError> {
    let rounded = round_currency(amount);
    if rounded <= Decimal::ZERO {
        return Err(AppError::Validation(
            "Amount must be greater than zero".to_string(),
        ));
    }
    Ok(rounded)
}

/// Convert a principal amount to processor minor units (kobo, pesewas).
pub fn to_minor_units(amount: Decimal) -> Result<i64, AppError> {
    use rust_decimal::prelude::ToPrimitive;

    (round_currency(amount) * Decimal::ONE_HUNDRED)
        .trunc()
        .to_i64()
        .ok_or_else(|| AppError::Validation("Amount is too large".to_string()))
}

/// Convert processor minor units back to a principal amount.
pub fn from_minor_units(minor: i64) -> Decimal {
    round_currency(Decimal::new(minor, 2))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn rounds_half_away_from_zero() {
        assert_eq!(round_currency(dec!(1.005)), dec!(1.01));
        assert_eq!(round_currency(dec!(1.004)), dec!(1.00));
        assert_eq!(round_currency(dec!(-1.005)), dec!(-1.01));
        assert_eq!(round_currency(dec!(51.94)), dec!(51.94));
    }

    #[test]
    fn fee_is_percent_of_amount() {
        assert_eq!(calculate_fee(dec!(10000), dec!(2.0)), dec!(200.00));
        assert_eq!(calculate_fee(dec!(33.33), dec!(2.0)), dec!(0.67));
        assert_eq!(DEFAULT_CONVERSION_FEE_PERCENT, dec!(2.0));
    }

    #[test]
    fn conversion_arithmetic_matches_reference_scenario() {
        let amount = dec!(10000.00);
        let fee = calculate_fee(amount, DEFAULT_CONVERSION_FEE_PERCENT);
        let net = amount - fee;
        let converted = round_currency(net * dec!(0.0053));
        assert_eq!(fee, dec!(200.00));
        assert_eq!(net, dec!(9800.00));
        assert_eq!(converted, dec!(51.94));
    }

    #[test]
    fn zero_and_sub_cent_amounts_are_rejected() {
        assert!(validate_amount(dec!(0)).is_err());
        assert!(validate_amount(dec!(0.001)).is_err());
        assert!(validate_amount(dec!(-5)).is_err());
        assert_eq!(validate_amount(dec!(0.005)).unwrap(), dec!(0.01));
        assert_eq!(validate_amount(dec!(100)).unwrap(), dec!(100.00));
    }

    #[test]
    fn parses_supported_currencies_only() {
        assert_eq!("ngn".parse::<Currency>().unwrap(), Currency::Ngn);
        assert_eq!(" GHS ".parse::<Currency>().unwrap(), Currency::Ghs);
        assert!("USD".parse::<Currency>().is_err());
        assert_eq!(Currency::Ngn.counterpart(), Currency::Ghs);
    }

    #[test]
    fn minor_units_round_trip() {
        assert_eq!(to_minor_units(dec!(5000.00)).unwrap(), 500000);
        assert_eq!(from_minor_units(500000), dec!(5000.00));
        assert_eq!(from_minor_units(1999), dec!(19.99));
    }

    #[test]
    fn currency_serializes_uppercase() {
        assert_eq!(serde_json::to_string(&Currency::Ghs).unwrap(), "\"GHS\"");
        let parsed: Currency = serde_json::from_str("\"NGN\"").unwrap();
        assert_eq!(parsed, Currency::Ngn);
    }
}

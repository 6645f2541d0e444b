//! Conversion pricing request/response types.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::rate::RateSource;
use crate::money::Currency;

/// Body of `POST /convert/calculate` and `POST /convert/exchange`.
#[derive(Debug, Clone, Deserialize)]
pub struct ConversionRequest {
    pub from: String,
    pub to: String,
    pub amount: Decimal,
}

/// Pricing preview. `converted = round((original - fee) * rate)`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConversionQuote {
    pub from: Currency,
    pub to: Currency,
    pub original: Decimal,
    pub fee: Decimal,
    pub fee_percent: Decimal,
    pub net: Decimal,
    pub converted: Decimal,
    pub rate: Decimal,
    pub rate_source: RateSource,
    pub eta: &'static str,
}

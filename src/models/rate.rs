//! Exchange rate models.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::money::Currency;

/// Where a rate came from. `Default` is never stored; it tags the built-in
/// fallback returned when no row is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "rate_source", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum RateSource {
    Manual,
    Feed,
    Default,
}

/// A directed exchange rate row.
///
/// Rows are never edited in place: setting a new rate closes the active row
/// (`is_active = false`, `valid_to = now`) and inserts a new one.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct ExchangeRate {
    pub id: Uuid,
    pub from_currency: Currency,
    pub to_currency: Currency,
    pub rate: Decimal,
    pub source: RateSource,
    pub set_by: Option<Uuid>,
    pub is_active: bool,
    pub valid_from: DateTime<Utc>,
    pub valid_to: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Resolved rate for a pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RateQuote {
    pub from: Currency,
    pub to: Currency,
    pub rate: Decimal,
    pub source: RateSource,
}

/// Request body for `POST /admin/rates/add`.
#[derive(Debug, Deserialize)]
pub struct SetRateRequest {
    pub from_currency: String,
    pub to_currency: String,
    pub rate: Decimal,
    #[serde(default)]
    pub source: Option<RateSource>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RateHistoryQuery {
    pub from_currency: Option<String>,
    pub to_currency: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

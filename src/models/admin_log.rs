//! Administrator audit trail.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Append-only record of an admin action.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct AdminLog {
    pub id: Uuid,
    pub admin_id: Uuid,
    /// e.g. `approve_transaction`, `reject_transaction`, `block_user`, `set_rate`.
    pub action: String,
    pub target_type: String,
    pub target_id: String,
    /// JSON detail blob.
    pub details: serde_json::Value,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// The admin performing an action, with request provenance.
#[derive(Debug, Clone)]
pub struct AdminActor {
    pub admin_id: Uuid,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

/// Dashboard figures for `POST /admin/dashboard`.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardStats {
    pub total_users: i64,
    pub verified_users: i64,
    pub blocked_users: i64,
    pub pending_transactions: i64,
    pub completed_transactions: i64,
    pub failed_transactions: i64,
    pub volume: Vec<crate::models::transaction::CurrencyVolume>,
    pub balances: Vec<CurrencyBalance>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct CurrencyBalance {
    pub currency: crate::money::Currency,
    pub total_balance: rust_decimal::Decimal,
}

/// Body of `POST /admin/users/all`.
#[derive(Debug, Default, Deserialize)]
pub struct UserListRequest {
    pub search: Option<String>,
    pub is_blocked: Option<bool>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

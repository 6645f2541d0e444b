//! Business logic, one module per concern.
//!
//! Services take the pool (or a connection already inside a database
//! transaction) and return domain types or [`crate::error::AppError`].
//! Handlers stay thin and never run SQL themselves.

pub mod activity_service;
pub mod admin_service;
pub mod auth_service;
pub mod conversion_service;
pub mod notification_service;
pub mod rate_service;
pub mod transaction_service;
pub mod transaction_store;
pub mod user_service;
pub mod wallet_service;
pub mod webhook_service;

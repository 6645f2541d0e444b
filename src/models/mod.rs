//! Data models representing database entities and API payloads.

pub mod admin_log;
pub mod conversion;
pub mod error_catalog;
pub mod notification;
pub mod rate;
pub mod response;
pub mod transaction;
pub mod user;
pub mod wallet;
pub mod webhook;

//! HTTP request handlers (route handlers).
//!
//! Each handler is an async function that:
//! 1. Extracts request data (JSON body, path, query, the authenticated user)
//! 2. Calls into `services`, which own every business rule
//! 3. Wraps the result in the [`ApiResponse`](crate::models::response::ApiResponse) envelope

pub mod admin;
pub mod auth;
pub mod convert;
pub mod errors;
pub mod health;
pub mod notifications;
pub mod testing;
pub mod transactions;
pub mod users;
pub mod wallet;
pub mod webhooks;

//! HTTP middleware components.
//!
//! - `auth`: bearer/cookie authentication and the admin gate
//! - `cookies`: HttpOnly token cookies
//! - `metrics`: Prometheus request metrics

pub mod auth;
pub mod cookies;
pub mod metrics;

//! Credential primitives used by the auth service and middleware.

pub mod jwt;
pub mod password;
pub mod tokens;

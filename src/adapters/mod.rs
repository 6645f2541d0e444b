//! Thin clients for third parties: payment processors, email delivery and
//! image storage.

pub mod email;
pub mod payment;
pub mod upload;

//! Business logic services.
//!
//! Services contain logic separated from HTTP handlers.
//! Data access lives in `crate::db`.

pub mod auth_service;

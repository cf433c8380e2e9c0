//! Data models representing database entities.
//!
//! This module contains the data structures that map to database tables.
//! `bank_accounts`, `budgets` and `notifications` exist in the schema but
//! have no API yet, so they have no model here.

/// Registered user model
pub mod user;
/// Income/expense transaction model
pub mod transaction;

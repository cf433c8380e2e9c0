//! HTTP request handlers (route handlers).
//!
//! Each handler is an async function that:
//! 1. Receives HTTP request data (JSON body, URL params, etc.)
//! 2. Calls the data access service
//! 3. Returns HTTP response (JSON, status code)

/// Signup, login and token refresh
pub mod auth;
/// Liveness and database health
pub mod health;
/// Transaction endpoints
pub mod transactions;

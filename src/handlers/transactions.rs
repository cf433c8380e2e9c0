//! Transaction HTTP handlers.
//!
//! This module implements transaction-related API endpoints:
//! - POST /api/transactions - Record an income or expense
//! - GET /api/transactions - List the caller's transactions
//! - GET /api/transactions/{id} - Get one transaction
//!
//! All routes sit behind the authorization middleware, which supplies
//! the `AuthContext`.

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::Utc;

use crate::{
    error::AppError,
    middleware::auth::AuthContext,
    models::transaction::{CreateTransactionRequest, NewTransaction, TransactionResponse},
    state::AppState,
};

/// Record a transaction for the authenticated user.
///
/// # Request Body
///
/// ```json
/// {
///   "amount_cents": 4250,
///   "transaction_type": "expense",
///   "category": "groceries"
/// }
/// ```
///
/// # Response
///
/// - **Success (201 Created)**: The stored transaction
/// - **Error (400)**: Non-positive amount or malformed currency
pub async fn create_transaction(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<CreateTransactionRequest>,
) -> Result<(StatusCode, Json<TransactionResponse>), AppError> {
    // Validate amount
    if request.amount_cents <= 0 {
        return Err(AppError::InvalidRequest(
            "Amount must be positive".to_string(),
        ));
    }

    let currency = request.currency.trim().to_ascii_uppercase();
    if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(AppError::InvalidRequest(
            "Currency must be a three-letter code".to_string(),
        ));
    }

    let transaction = state
        .db
        .create_transaction(NewTransaction {
            user_id: auth.user_id,
            amount_cents: request.amount_cents,
            currency,
            transaction_type: request.transaction_type,
            category: request.category,
            description: request.description,
            occurred_at: request.occurred_at.unwrap_or_else(Utc::now),
        })
        .await?;

    tracing::info!(
        transaction_id = transaction.id,
        user = %auth.email,
        "Transaction recorded"
    );
    Ok((StatusCode::CREATED, Json(transaction.into())))
}

/// List the authenticated user's transactions, newest first.
///
/// Returns an empty array when the user has none.
pub async fn list_transactions(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<Vec<TransactionResponse>>, AppError> {
    let user = state
        .db
        .get_user(auth.user_id)
        .await?
        .ok_or(AppError::Unauthorized)?;

    let transactions = state.db.get_transactions(&user).await;

    Ok(Json(transactions.into_iter().map(Into::into).collect()))
}

/// Get transaction by ID.
///
/// # Security
///
/// Returns 404 for transactions owned by another user, the same as for
/// ids that do not exist.
pub async fn get_transaction(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(transaction_id): Path<i64>,
) -> Result<Json<TransactionResponse>, AppError> {
    let transaction = state
        .db
        .get_transaction_by_id(transaction_id)
        .await
        .filter(|t| t.user_id == auth.user_id)
        .ok_or(AppError::TransactionNotFound)?;

    Ok(Json(transaction.into()))
}

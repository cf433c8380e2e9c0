//! Transaction data models and API request/response types.
//!
//! This module defines:
//! - `Transaction`: Database entity representing an income or expense
//! - `NewTransaction`: Values inserted for a new transaction
//! - `CreateTransactionRequest`: Request body for recording a transaction
//! - `TransactionResponse`: Response body returned to clients

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Represents a transaction record from the database.
///
/// # Database Table
///
/// Maps to the `transactions` table. Each transaction:
/// - Belongs to exactly one user (`user_id` foreign key)
/// - Stores amount in cents (never floats!)
/// - Is either "income" or "expense" (enforced by CHECK constraint)
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct Transaction {
    /// Unique identifier for this transaction
    pub id: i64,

    /// Owner of the transaction
    pub user_id: i64,

    /// Amount in cents
    ///
    /// Must be positive (enforced by CHECK constraint); direction comes from `transaction_type`
    pub amount_cents: i64,

    /// Currency code (ISO 4217)
    pub currency: String,

    /// "income" or "expense"
    pub transaction_type: String,

    /// Free-form category such as "groceries"
    pub category: Option<String>,

    /// Human-readable description
    pub description: Option<String>,

    /// When the money actually moved
    pub occurred_at: DateTime<Utc>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

/// Direction of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Income,
    Expense,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Income => "income",
            TransactionType::Expense => "expense",
        }
    }
}

/// Values for a transaction that has not been stored yet.
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub user_id: i64,
    pub amount_cents: i64,
    pub currency: String,
    pub transaction_type: TransactionType,
    pub category: Option<String>,
    pub description: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Request to record a transaction for the authenticated user.
///
/// # JSON Example
///
/// ```json
/// {
///   "amount_cents": 4250,
///   "transaction_type": "expense",
///   "currency": "EUR",
///   "category": "groceries",
///   "description": "Weekly shop",
///   "occurred_at": "2025-12-21T16:00:00Z"
/// }
/// ```
///
/// # Validation
///
/// - `amount_cents` must be positive
/// - `currency` must be three ASCII letters, defaults to "USD"
/// - `occurred_at` defaults to the time of the request
#[derive(Debug, Deserialize)]
pub struct CreateTransactionRequest {
    pub amount_cents: i64,

    pub transaction_type: TransactionType,

    #[serde(default = "default_currency")]
    pub currency: String,

    pub category: Option<String>,

    pub description: Option<String>,

    pub occurred_at: Option<DateTime<Utc>>,
}

/// Default currency value when not specified in request.
fn default_currency() -> String {
    "USD".to_string()
}

/// Response returned for transaction operations.
///
/// # JSON Example
///
/// ```json
/// {
///   "id": 17,
///   "amount_cents": 4250,
///   "currency": "EUR",
///   "transaction_type": "expense",
///   "category": "groceries",
///   "description": "Weekly shop",
///   "occurred_at": "2025-12-21T16:00:00Z",
///   "created_at": "2025-12-21T16:00:03Z"
/// }
/// ```
#[derive(Debug, Serialize, Deserialize)]
pub struct TransactionResponse {
    pub id: i64,
    pub amount_cents: i64,
    pub currency: String,
    pub transaction_type: String,
    pub category: Option<String>,
    pub description: Option<String>,
    pub occurred_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Convert database Transaction to API TransactionResponse.
///
/// The owner id is implied by the authenticated caller and left out.
impl From<Transaction> for TransactionResponse {
    fn from(transaction: Transaction) -> Self {
        Self {
            id: transaction.id,
            amount_cents: transaction.amount_cents,
            currency: transaction.currency,
            transaction_type: transaction.transaction_type,
            category: transaction.category,
            description: transaction.description,
            occurred_at: transaction.occurred_at,
            created_at: transaction.created_at,
        }
    }
}

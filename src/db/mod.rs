//! Database access.
//!
//! This module provides:
//! - The [`Service`] trait, the only way handlers reach the store
//! - Connection pool creation with idle/lifetime accounting
//! - Running database migrations automatically

pub mod health;
#[cfg(test)]
pub mod memory;
pub mod postgres;

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use sqlx::{
    Pool, Postgres,
    postgres::{PgConnectOptions, PgPoolOptions},
};

use crate::{
    config::DatabaseConfig,
    models::{
        transaction::{NewTransaction, Transaction},
        user::{NewUser, User},
    },
};
use health::{HealthReport, PoolCounters};

pub use postgres::PgService;

/// Type alias for PostgreSQL connection pool.
pub type DbPool = Pool<Postgres>;

/// Errors returned by [`Service`] operations.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),

    #[error(transparent)]
    Migrate(#[from] sqlx::migrate::MigrateError),

    /// The email is already registered; nothing was inserted.
    #[error("user with email {0} already exists")]
    UserExists(String),
}

/// Data access for users and transactions.
///
/// Lookups that find nothing return `None` rather than an error. The
/// transaction read paths log query failures and return an empty result.
#[async_trait]
pub trait Service: Send + Sync {
    /// Ping the database (1 second timeout) and report pool statistics.
    async fn health(&self) -> HealthReport;

    /// Close every pooled connection.
    async fn close(&self);

    async fn get_users(&self) -> Result<Vec<User>, DbError>;

    async fn get_user(&self, id: i64) -> Result<Option<User>, DbError>;

    /// Insert a user unless the email is taken, in which case
    /// [`DbError::UserExists`] is returned.
    async fn create_user(&self, user: NewUser) -> Result<User, DbError>;

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, DbError>;

    async fn create_transaction(&self, transaction: NewTransaction)
    -> Result<Transaction, DbError>;

    /// All transactions owned by `user`, newest first.
    async fn get_transactions(&self, user: &User) -> Vec<Transaction>;

    async fn get_transaction_by_id(&self, id: i64) -> Option<Transaction>;
}

/// Shared handle used as application state.
pub type DynService = Arc<dyn Service>;

/// Create a new PostgreSQL connection pool.
///
/// # Configuration
///
/// - Maximum connections: `DB_MAX_CONNECTIONS`
/// - `search_path` set to `DB_SCHEMA` on every connection
/// - Idle timeout and max lifetime as described in [`pool_options`]
///
/// # Errors
///
/// Returns an error if:
/// - The connection string cannot be built or parsed
/// - Cannot connect to PostgreSQL server
/// - Database authentication fails
pub async fn create_pool(
    config: &DatabaseConfig,
    counters: Arc<PoolCounters>,
) -> Result<DbPool, sqlx::Error> {
    let url = config
        .connection_url()
        .map_err(|e| sqlx::Error::Configuration(e.into()))?;

    // sqlx ignores search_path in the URL, so pass it as a startup option
    let options = url
        .as_str()
        .parse::<PgConnectOptions>()?
        .options([("search_path", config.schema.as_str())]);

    pool_options(config, counters).connect_with(options).await
}

/// Pool settings without a connection target.
///
/// Idle timeout and max lifetime are checked when an idle connection is
/// handed out; expired connections are discarded and counted in `counters`.
pub fn pool_options(config: &DatabaseConfig, counters: Arc<PoolCounters>) -> PgPoolOptions {
    let idle_timeout = config.idle_timeout();
    let max_lifetime = config.max_lifetime();

    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(config.acquire_timeout())
        .idle_timeout(None::<Duration>)
        .max_lifetime(None::<Duration>)
        .before_acquire(move |_conn, meta| {
            let counters = counters.clone();
            Box::pin(async move {
                if meta.age >= max_lifetime {
                    counters.record_lifetime_closed();
                    return Ok(false);
                }
                if meta.idle_for >= idle_timeout {
                    counters.record_idle_closed();
                    return Ok(false);
                }
                Ok::<_, sqlx::Error>(true)
            })
        })
}

/// Run database migrations from the `migrations/` directory.
///
/// Creates the `users`, `bank_accounts`, `transactions`, `budgets` and
/// `notifications` tables. Migrations are tracked in the `_sqlx_migrations`
/// table, so each one runs only once.
pub async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}

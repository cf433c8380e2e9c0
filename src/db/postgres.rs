//! PostgreSQL implementation of [`Service`].
//!
//! Every query checks out a connection through [`PgService::acquire`], which
//! holds one of `max_connections` checkout slots for as long as the
//! connection is in use. A checkout that finds no free slot is a wait.

use std::{
    ops::{Deref, DerefMut},
    sync::Arc,
    time::{Duration, Instant},
};

use async_trait::async_trait;
use sqlx::{Connection, PgConnection, Postgres, pool::PoolConnection};
use tokio::sync::{OwnedSemaphorePermit, Semaphore, TryAcquireError};

use super::{
    DbError, DbPool, Service, create_pool,
    health::{HealthReport, PoolCounters, PoolStats},
    run_migrations,
};
use crate::{
    config::DatabaseConfig,
    models::{
        transaction::{NewTransaction, Transaction},
        user::{NewUser, User},
    },
};

const PING_TIMEOUT: Duration = Duration::from_secs(1);

/// Pool-backed data access service.
///
/// Built once by `main` and shared by every request through application state.
pub struct PgService {
    pool: DbPool,
    counters: Arc<PoolCounters>,
    database: String,
    slots: Arc<Semaphore>,
    max_connections: u32,
    acquire_timeout: Duration,
}

/// A pooled connection and the checkout slot it occupies.
///
/// Dropping it frees the slot immediately; sqlx returns the connection to
/// the pool in the background.
struct Checkout {
    conn: PoolConnection<Postgres>,
    _slot: OwnedSemaphorePermit,
}

impl Deref for Checkout {
    type Target = PgConnection;

    fn deref(&self) -> &PgConnection {
        &self.conn
    }
}

impl DerefMut for Checkout {
    fn deref_mut(&mut self) -> &mut PgConnection {
        &mut self.conn
    }
}

impl PgService {
    /// Connect to PostgreSQL and bring the schema up to date.
    ///
    /// # Errors
    ///
    /// Returns an error if the pool cannot be created or a migration fails.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, DbError> {
        let counters = Arc::new(PoolCounters::default());
        let pool = create_pool(config, counters.clone()).await?;
        tracing::info!(database = %config.database, host = %config.host, "Database pool created");

        run_migrations(&pool).await?;
        tracing::info!("Database migrations complete");

        Ok(Self::from_pool(pool, counters, config.database.clone()))
    }

    /// Wrap an existing pool. Limits are taken from the pool's own options.
    pub fn from_pool(pool: DbPool, counters: Arc<PoolCounters>, database: String) -> Self {
        let max_connections = pool.options().get_max_connections();
        let acquire_timeout = pool.options().get_acquire_timeout();

        Self {
            pool,
            counters,
            database,
            slots: Arc::new(Semaphore::new(max_connections as usize)),
            max_connections,
            acquire_timeout,
        }
    }

    /// Check out a connection.
    ///
    /// A free slot is taken without waiting and counts nothing. Otherwise the
    /// time spent waiting for one is recorded, whether or not a slot frees up
    /// before the acquire timeout.
    async fn acquire(&self) -> Result<Checkout, sqlx::Error> {
        let slot = match self.slots.clone().try_acquire_owned() {
            Ok(slot) => slot,
            Err(TryAcquireError::Closed) => return Err(sqlx::Error::PoolClosed),
            Err(TryAcquireError::NoPermits) => self.wait_for_slot().await?,
        };

        let conn = self.pool.acquire().await?;
        Ok(Checkout { conn, _slot: slot })
    }

    async fn wait_for_slot(&self) -> Result<OwnedSemaphorePermit, sqlx::Error> {
        let started = Instant::now();
        let waited =
            tokio::time::timeout(self.acquire_timeout, self.slots.clone().acquire_owned()).await;
        self.counters.record_wait(started.elapsed());

        match waited {
            Ok(Ok(slot)) => Ok(slot),
            Ok(Err(_)) => Err(sqlx::Error::PoolClosed),
            Err(_) => Err(sqlx::Error::PoolTimedOut),
        }
    }

    /// Pool statistics; connections are in use while their slot is held.
    fn stats(&self) -> PoolStats {
        let open = self.pool.size();
        let in_use = self.max_connections as usize - self.slots.available_permits();
        let in_use = u32::try_from(in_use).unwrap_or(u32::MAX);
        self.counters.snapshot(open, open.saturating_sub(in_use))
    }

    async fn ping(&self) -> Result<(), sqlx::Error> {
        let mut conn = self.acquire().await?;
        conn.ping().await
    }

    async fn fetch_transactions(&self, user_id: i64) -> Result<Vec<Transaction>, sqlx::Error> {
        let mut conn = self.acquire().await?;
        sqlx::query_as::<_, Transaction>(
            r#"
            SELECT * FROM transactions
            WHERE user_id = $1
            ORDER BY occurred_at DESC, id DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&mut *conn)
        .await
    }

    async fn fetch_transaction(&self, id: i64) -> Result<Option<Transaction>, sqlx::Error> {
        let mut conn = self.acquire().await?;
        sqlx::query_as::<_, Transaction>("SELECT * FROM transactions WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await
    }
}

#[async_trait]
impl Service for PgService {
    async fn health(&self) -> HealthReport {
        let result = match tokio::time::timeout(PING_TIMEOUT, self.ping()).await {
            Ok(result) => result.map_err(|e| e.to_string()),
            Err(_) => Err(format!("ping timed out after {}s", PING_TIMEOUT.as_secs())),
        };

        if let Err(cause) = result {
            tracing::error!(database = %self.database, "db down: {}", cause);
            return HealthReport::down(cause);
        }

        // The ping's slot is already free here
        HealthReport::up(self.stats())
    }

    async fn close(&self) {
        tracing::info!("Disconnected from database: {}", self.database);
        self.slots.close();
        self.pool.close().await;
    }

    async fn get_users(&self) -> Result<Vec<User>, DbError> {
        let mut conn = self.acquire().await?;
        let users = sqlx::query_as::<_, User>("SELECT * FROM users ORDER BY id")
            .fetch_all(&mut *conn)
            .await?;

        Ok(users)
    }

    async fn get_user(&self, id: i64) -> Result<Option<User>, DbError> {
        let mut conn = self.acquire().await?;
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;

        Ok(user)
    }

    async fn create_user(&self, user: NewUser) -> Result<User, DbError> {
        let mut conn = self.acquire().await?;

        // The unique constraint decides; no separate existence check
        let created = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (name, email, password_hash, role)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (email) DO NOTHING
            RETURNING *
            "#,
        )
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.role)
        .fetch_optional(&mut *conn)
        .await?;

        created.ok_or(DbError::UserExists(user.email))
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, DbError> {
        let mut conn = self.acquire().await?;
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(&mut *conn)
            .await?;

        Ok(user)
    }

    async fn create_transaction(
        &self,
        transaction: NewTransaction,
    ) -> Result<Transaction, DbError> {
        let mut conn = self.acquire().await?;
        let created = sqlx::query_as::<_, Transaction>(
            r#"
            INSERT INTO transactions (
                user_id,
                amount_cents,
                currency,
                transaction_type,
                category,
                description,
                occurred_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(transaction.user_id)
        .bind(transaction.amount_cents)
        .bind(&transaction.currency)
        .bind(transaction.transaction_type.as_str())
        .bind(&transaction.category)
        .bind(&transaction.description)
        .bind(transaction.occurred_at)
        .fetch_one(&mut *conn)
        .await?;

        Ok(created)
    }

    async fn get_transactions(&self, user: &User) -> Vec<Transaction> {
        match self.fetch_transactions(user.id).await {
            Ok(transactions) => transactions,
            Err(e) => {
                tracing::error!(user_id = user.id, "Error fetching transactions: {}", e);
                Vec::new()
            }
        }
    }

    async fn get_transaction_by_id(&self, id: i64) -> Option<Transaction> {
        match self.fetch_transaction(id).await {
            Ok(transaction) => transaction,
            Err(e) => {
                tracing::error!(transaction_id = id, "Error fetching transaction: {}", e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    //! Run with: DATABASE_URL=postgres://... cargo test -- --ignored

    use std::collections::HashSet;

    use chrono::Utc;
    use sqlx::postgres::{PgConnectOptions, PgPoolOptions};

    use super::*;
    use crate::db::health::{HealthStatus, LIFETIME_CHURN};
    use crate::db::pool_options;
    use crate::models::transaction::TransactionType;

    fn service(pool: DbPool) -> PgService {
        PgService::from_pool(pool, Arc::new(PoolCounters::default()), "test".to_string())
    }

    fn pool_config(max_connections: u32) -> DatabaseConfig {
        DatabaseConfig {
            host: "localhost".to_string(),
            port: 5432,
            database: "test".to_string(),
            username: "test".to_string(),
            password: "test".to_string(),
            schema: "public".to_string(),
            max_connections,
            idle_timeout_secs: 600,
            max_lifetime_secs: 1800,
            acquire_timeout_secs: 1,
        }
    }

    /// Service over a pool built with this crate's pool settings.
    async fn configured_service(config: &DatabaseConfig, connect: PgConnectOptions) -> PgService {
        let counters = Arc::new(PoolCounters::default());
        let pool = pool_options(config, counters.clone())
            .connect_with(connect)
            .await
            .unwrap();
        PgService::from_pool(pool, counters, "test".to_string())
    }

    /// Wait for sqlx to put released connections back in the idle queue.
    async fn settle(db: &PgService) {
        for _ in 0..100 {
            if db.pool.num_idle() == db.pool.size() as usize {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    fn new_user(email: &str) -> NewUser {
        NewUser {
            name: "Ada".to_string(),
            email: email.to_string(),
            password_hash: "hash".to_string(),
            role: "user".to_string(),
        }
    }

    fn new_transaction(user_id: i64, amount_cents: i64) -> NewTransaction {
        NewTransaction {
            user_id,
            amount_cents,
            currency: "USD".to_string(),
            transaction_type: TransactionType::Expense,
            category: Some("groceries".to_string()),
            description: None,
            occurred_at: Utc::now(),
        }
    }

    #[sqlx::test]
    #[ignore]
    async fn created_user_is_found_by_email(pool: DbPool) {
        let db = service(pool);

        let created = db.create_user(new_user("ada@example.com")).await.unwrap();
        let found = db.get_user_by_email("ada@example.com").await.unwrap().unwrap();

        assert_eq!(found, created);
        assert_eq!(found.name, "Ada");
        assert_eq!(found.role, "user");
    }

    #[sqlx::test]
    #[ignore]
    async fn duplicate_email_is_rejected(pool: DbPool) {
        let db = service(pool);

        db.create_user(new_user("ada@example.com")).await.unwrap();
        let err = db.create_user(new_user("ada@example.com")).await.unwrap_err();

        assert!(matches!(err, DbError::UserExists(_)));
        assert_eq!(err.to_string(), "user with email ada@example.com already exists");
        assert_eq!(db.get_users().await.unwrap().len(), 1);
    }

    #[sqlx::test]
    #[ignore]
    async fn concurrent_duplicate_signups_insert_once(pool: DbPool) {
        let db = Arc::new(service(pool));

        let attempts: Vec<_> = (0..8)
            .map(|_| {
                let db = db.clone();
                tokio::spawn(async move { db.create_user(new_user("race@example.com")).await })
            })
            .collect();

        let mut created = 0;
        for attempt in attempts {
            if attempt.await.unwrap().is_ok() {
                created += 1;
            }
        }

        assert_eq!(created, 1);
        assert_eq!(db.get_users().await.unwrap().len(), 1);
    }

    #[sqlx::test]
    #[ignore]
    async fn unknown_user_id_is_none(pool: DbPool) {
        let db = service(pool);
        assert!(db.get_user(9_999).await.unwrap().is_none());
        assert!(db.get_user_by_email("nobody@example.com").await.unwrap().is_none());
    }

    #[sqlx::test]
    #[ignore]
    async fn transactions_are_scoped_to_their_owner(pool: DbPool) {
        let db = service(pool);
        let ada = db.create_user(new_user("ada@example.com")).await.unwrap();
        let bob = db.create_user(new_user("bob@example.com")).await.unwrap();

        assert!(db.get_transactions(&ada).await.is_empty());

        let first = db.create_transaction(new_transaction(ada.id, 1_200)).await.unwrap();
        db.create_transaction(new_transaction(ada.id, 300)).await.unwrap();
        db.create_transaction(new_transaction(bob.id, 50)).await.unwrap();

        let owners: HashSet<i64> = db
            .get_transactions(&ada)
            .await
            .iter()
            .map(|t| t.user_id)
            .collect();
        assert_eq!(owners, HashSet::from([ada.id]));
        assert_eq!(db.get_transactions(&ada).await.len(), 2);

        let fetched = db.get_transaction_by_id(first.id).await.unwrap();
        assert_eq!(fetched, first);
        assert_eq!(fetched.transaction_type, "expense");
        assert!(db.get_transaction_by_id(first.id + 1_000).await.is_none());
    }

    #[sqlx::test]
    #[ignore]
    async fn transaction_for_unknown_user_fails(pool: DbPool) {
        let db = service(pool);
        let result = db.create_transaction(new_transaction(424_242, 100)).await;
        assert!(matches!(result, Err(DbError::Sqlx(_))));
    }

    #[sqlx::test]
    #[ignore]
    async fn health_reports_up_with_pool_stats(pool: DbPool) {
        let db = service(pool);
        let report = db.health().await;

        assert_eq!(report.status, HealthStatus::Up);
        let stats = report.stats.unwrap();
        assert!(stats.open_connections >= 1);
        assert_eq!(stats.in_use, 0);
        assert_eq!(stats.idle, stats.open_connections);
        assert_eq!(stats.wait_count, 0);
    }

    #[sqlx::test]
    #[ignore]
    async fn timed_out_checkout_counts_as_a_wait(_: PgPoolOptions, connect: PgConnectOptions) {
        let db = configured_service(&pool_config(1), connect).await;

        let held = db.acquire().await.unwrap();
        let result = db.acquire().await;
        assert!(matches!(result, Err(sqlx::Error::PoolTimedOut)));
        drop(held);

        let stats = db.stats();
        assert_eq!(stats.wait_count, 1);
        assert!(stats.wait_duration >= Duration::from_secs(1));

        db.close().await;
    }

    #[sqlx::test]
    #[ignore]
    async fn checkout_released_while_waiting_counts_once(
        _: PgPoolOptions,
        connect: PgConnectOptions,
    ) {
        let db = configured_service(&pool_config(1), connect).await;

        let held = db.acquire().await.unwrap();
        let release = async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            drop(held);
        };
        let (_, waited) = tokio::join!(release, db.acquire());
        assert!(waited.is_ok());
        drop(waited);

        assert_eq!(db.stats().wait_count, 1);

        db.close().await;
    }

    #[sqlx::test]
    #[ignore]
    async fn sequential_queries_never_wait(_: PgPoolOptions, connect: PgConnectOptions) {
        let db = configured_service(&pool_config(2), connect).await;

        for _ in 0..20 {
            db.get_users().await.unwrap();
        }

        let report = db.health().await;
        let stats = report.stats.unwrap();
        assert_eq!(stats.wait_count, 0);
        assert_eq!(stats.in_use, 0);

        db.close().await;
    }

    #[sqlx::test]
    #[ignore]
    async fn expired_connections_count_as_lifetime_closures(
        _: PgPoolOptions,
        connect: PgConnectOptions,
    ) {
        let config = DatabaseConfig {
            max_lifetime_secs: 0,
            ..pool_config(1)
        };
        let db = configured_service(&config, connect).await;

        db.get_users().await.unwrap();
        settle(&db).await;

        // The ping checks out the now-expired idle connection
        let report = db.health().await;
        assert_eq!(report.status, HealthStatus::Up);
        let stats = report.stats.as_ref().unwrap();
        assert!(stats.max_lifetime_closed >= 1);
        assert_eq!(stats.max_idle_closed, 0);
        assert_eq!(report.message.as_deref(), Some(LIFETIME_CHURN));

        db.close().await;
    }

    #[sqlx::test]
    #[ignore]
    async fn idle_connections_past_timeout_are_counted(
        _: PgPoolOptions,
        connect: PgConnectOptions,
    ) {
        let config = DatabaseConfig {
            idle_timeout_secs: 0,
            ..pool_config(1)
        };
        let db = configured_service(&config, connect).await;

        db.get_users().await.unwrap();
        settle(&db).await;
        db.get_users().await.unwrap();

        let stats = db.stats();
        assert!(stats.max_idle_closed >= 1);
        assert_eq!(stats.max_lifetime_closed, 0);

        db.close().await;
    }

    #[sqlx::test]
    #[ignore]
    async fn health_reports_down_after_close(pool: DbPool) {
        let db = service(pool);
        db.close().await;

        let report = db.health().await;
        assert_eq!(report.status, HealthStatus::Down);
        assert!(report.error.unwrap().starts_with("db down: "));
    }
}

//! In-memory [`Service`] for exercising handlers without PostgreSQL.

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;

use super::{
    DbError, Service,
    health::{HealthReport, PoolStats},
};
use crate::models::{
    transaction::{NewTransaction, Transaction},
    user::{NewUser, User},
};

#[derive(Default)]
struct Tables {
    users: Vec<User>,
    transactions: Vec<Transaction>,
}

#[derive(Default)]
pub struct MemoryService {
    tables: Mutex<Tables>,
    down: Mutex<Option<String>>,
}

impl MemoryService {
    /// Make subsequent health checks report the database as down.
    pub fn fail_health(&self, cause: &str) {
        *self.down.lock().unwrap() = Some(cause.to_string());
    }

    pub fn transaction_count(&self) -> usize {
        self.tables.lock().unwrap().transactions.len()
    }
}

#[async_trait]
impl Service for MemoryService {
    async fn health(&self) -> HealthReport {
        match self.down.lock().unwrap().as_deref() {
            Some(cause) => HealthReport::down(cause),
            None => HealthReport::up(PoolStats {
                open_connections: 1,
                idle: 1,
                ..PoolStats::default()
            }),
        }
    }

    async fn close(&self) {}

    async fn get_users(&self) -> Result<Vec<User>, DbError> {
        Ok(self.tables.lock().unwrap().users.clone())
    }

    async fn get_user(&self, id: i64) -> Result<Option<User>, DbError> {
        let tables = self.tables.lock().unwrap();
        Ok(tables.users.iter().find(|u| u.id == id).cloned())
    }

    async fn create_user(&self, user: NewUser) -> Result<User, DbError> {
        let mut tables = self.tables.lock().unwrap();
        if tables.users.iter().any(|u| u.email == user.email) {
            return Err(DbError::UserExists(user.email));
        }

        let now = Utc::now();
        let created = User {
            id: tables.users.len() as i64 + 1,
            name: user.name,
            email: user.email,
            password_hash: user.password_hash,
            role: user.role,
            created_at: now,
            updated_at: now,
        };
        tables.users.push(created.clone());
        Ok(created)
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, DbError> {
        let tables = self.tables.lock().unwrap();
        Ok(tables.users.iter().find(|u| u.email == email).cloned())
    }

    async fn create_transaction(
        &self,
        transaction: NewTransaction,
    ) -> Result<Transaction, DbError> {
        let mut tables = self.tables.lock().unwrap();
        let now = Utc::now();
        let created = Transaction {
            id: tables.transactions.len() as i64 + 1,
            user_id: transaction.user_id,
            amount_cents: transaction.amount_cents,
            currency: transaction.currency,
            transaction_type: transaction.transaction_type.as_str().to_string(),
            category: transaction.category,
            description: transaction.description,
            occurred_at: transaction.occurred_at,
            created_at: now,
            updated_at: now,
        };
        tables.transactions.push(created.clone());
        Ok(created)
    }

    async fn get_transactions(&self, user: &User) -> Vec<Transaction> {
        let tables = self.tables.lock().unwrap();
        let mut owned: Vec<Transaction> = tables
            .transactions
            .iter()
            .filter(|t| t.user_id == user.id)
            .cloned()
            .collect();
        owned.sort_by(|a, b| b.occurred_at.cmp(&a.occurred_at).then(b.id.cmp(&a.id)));
        owned
    }

    async fn get_transaction_by_id(&self, id: i64) -> Option<Transaction> {
        let tables = self.tables.lock().unwrap();
        tables.transactions.iter().find(|t| t.id == id).cloned()
    }
}

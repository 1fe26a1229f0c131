//! Scripted `Connector` backed by sea-orm's `MockDatabase`.
//!
//! Enabled for this crate's own tests and, through the `testing` feature, for
//! downstream integration tests.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use sea_orm::{
    DatabaseConnection, DbErr, MockDatabase, MockDatabaseConnection, RuntimeErr, Transaction,
};

use crate::config::db::DatabaseConfig;
use crate::infra::db::pool::Connector;

enum Scripted {
    Connection(DatabaseConnection),
    Failure(String),
}

/// Hands out queued mock connections (or failures) in order, then falls back
/// to empty mock databases for the requested dialect.
#[derive(Default)]
pub struct MockConnector {
    script: Mutex<VecDeque<Scripted>>,
    rejected_password: Mutex<Option<String>>,
    issued: Mutex<Vec<Arc<MockDatabaseConnection>>>,
    calls: AtomicUsize,
}

impl MockConnector {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_connection(conn: DatabaseConnection) -> Self {
        let connector = Self::default();
        connector.push_connection(conn);
        connector
    }

    pub fn push_connection(&self, conn: DatabaseConnection) {
        self.script.lock().push_back(Scripted::Connection(conn));
    }

    pub fn push_failure(&self, message: impl Into<String>) {
        self.script.lock().push_back(Scripted::Failure(message.into()));
    }

    /// Fail every connect whose config carries `password`, the way a server
    /// rejects bad credentials.
    pub fn reject_password(&self, password: impl Into<String>) {
        *self.rejected_password.lock() = Some(password.into());
    }

    pub fn connect_calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Statements recorded by the most recently issued connection.
    pub fn transaction_log(&self) -> Vec<Transaction> {
        self.issued
            .lock()
            .last()
            .cloned()
            .map(|mock| DatabaseConnection::MockDatabaseConnection(mock).into_transaction_log())
            .unwrap_or_default()
    }

    /// Statement text only, in execution order.
    pub fn executed_sql(&self) -> Vec<String> {
        self.transaction_log()
            .iter()
            .flat_map(|txn| txn.statements().iter().map(|stmt| stmt.sql.clone()))
            .collect()
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self, cfg: &DatabaseConfig) -> Result<DatabaseConnection, DbErr> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if self.rejected_password.lock().as_deref() == Some(cfg.password.as_str()) {
            return Err(DbErr::Conn(RuntimeErr::Internal(format!(
                "password authentication failed for user \"{}\"",
                cfg.user
            ))));
        }

        let next = self.script.lock().pop_front();
        let conn = match next {
            Some(Scripted::Connection(conn)) => conn,
            Some(Scripted::Failure(message)) => {
                return Err(DbErr::Conn(RuntimeErr::Internal(message)))
            }
            None => MockDatabase::new(cfg.dialect.backend()).into_connection(),
        };
        if let DatabaseConnection::MockDatabaseConnection(mock) = &conn {
            self.issued.lock().push(Arc::clone(mock));
        }
        Ok(conn)
    }
}

//! Pool lifecycle and the dialect-neutral query adapter.
//!
//! One `ConnectionPool` owns at most one live sea-orm connection pool.
//! `connect` is idempotent, `teardown` is the only way to drop the pool, and
//! every query goes through `query`/`execute`, which accept `?` placeholders
//! and translate them for the active dialect.

use std::sync::Arc;

use async_trait::async_trait;
use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbErr, FromQueryResult,
    QueryResult, Statement, TransactionTrait, Value,
};
use serde_json::Value as JsonValue;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::db::{DatabaseConfig, Dialect};
use crate::error::DbInfraError;

pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;

/// Builds a live connection pool for a validated config.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, cfg: &DatabaseConfig) -> Result<DatabaseConnection, DbErr>;
}

/// Production connector: sea-orm over sqlx.
#[derive(Debug, Clone)]
pub struct SeaOrmConnector {
    max_connections: u32,
}

impl SeaOrmConnector {
    pub fn new(max_connections: u32) -> Self {
        Self { max_connections }
    }
}

impl Default for SeaOrmConnector {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CONNECTIONS)
    }
}

#[async_trait]
impl Connector for SeaOrmConnector {
    async fn connect(&self, cfg: &DatabaseConfig) -> Result<DatabaseConnection, DbErr> {
        let mut opt = ConnectOptions::new(cfg.dialect.connect_url(cfg));
        opt.min_connections(1)
            .max_connections(self.max_connections)
            .sqlx_logging(false);
        Database::connect(opt).await
    }
}

/// Shared handle to the live pool.
pub type PoolHandle = Arc<DatabaseConnection>;

struct LivePool {
    dialect: Dialect,
    conn: PoolHandle,
}

/// Result of `ConnectionPool::query`: rows normalized to JSON objects plus
/// the raw driver rows, identical in shape for both dialects.
#[derive(Debug)]
pub struct QueryOutput {
    pub rows: Vec<JsonValue>,
    pub raw: Vec<QueryResult>,
}

impl QueryOutput {
    pub fn first(&self) -> Option<&QueryResult> {
        self.raw.first()
    }
}

pub struct ConnectionPool {
    connector: Arc<dyn Connector>,
    slot: Mutex<Option<LivePool>>,
}

impl ConnectionPool {
    pub fn new(connector: Arc<dyn Connector>) -> Self {
        Self {
            connector,
            slot: Mutex::new(None),
        }
    }

    /// Return the live pool, creating it from `cfg` if none exists.
    ///
    /// An existing pool is returned unchanged even if `cfg` differs; call
    /// `teardown` first to switch databases.
    pub async fn connect(&self, cfg: &DatabaseConfig) -> Result<PoolHandle, DbInfraError> {
        let mut slot = self.slot.lock().await;
        if let Some(live) = slot.as_ref() {
            debug!(dialect = %live.dialect, "pool_connect=reused");
            return Ok(live.conn.clone());
        }

        cfg.validate()?;
        let conn = self
            .connector
            .connect(cfg)
            .await
            .map_err(|e| DbInfraError::connection(e.to_string()))?;

        info!(dialect = %cfg.dialect, target = %cfg.describe(), "pool_connect=created");
        let conn = Arc::new(conn);
        *slot = Some(LivePool {
            dialect: cfg.dialect,
            conn: conn.clone(),
        });
        Ok(conn)
    }

    /// Drain and discard the pool. A no-op when nothing is connected.
    ///
    /// The slot is cleared before closing, so a close failure still leaves the
    /// pool uninitialized and ready for a fresh `connect`.
    pub async fn teardown(&self) -> Result<(), DbInfraError> {
        let Some(live) = self.slot.lock().await.take() else {
            return Ok(());
        };

        match Arc::try_unwrap(live.conn) {
            Ok(conn) => conn
                .close()
                .await
                .map_err(|e| DbInfraError::connection(format!("pool close failed: {e}"))),
            Err(_) => {
                // In-flight queries still hold the handle; the pool closes
                // when the last of them drops it.
                warn!(dialect = %live.dialect, "pool_teardown=deferred");
                Ok(())
            }
        }
    }

    pub async fn is_connected(&self) -> bool {
        self.slot.lock().await.is_some()
    }

    pub async fn dialect(&self) -> Option<Dialect> {
        self.slot.lock().await.as_ref().map(|live| live.dialect)
    }

    async fn live(&self) -> Result<(Dialect, PoolHandle), DbInfraError> {
        self.slot
            .lock()
            .await
            .as_ref()
            .map(|live| (live.dialect, live.conn.clone()))
            .ok_or(DbInfraError::NotInitialized)
    }

    fn statement(dialect: Dialect, sql: &str, params: Vec<Value>) -> Statement {
        let sql = dialect.translate_query(sql);
        if params.is_empty() {
            Statement::from_string(dialect.backend(), sql.into_owned())
        } else {
            Statement::from_sql_and_values(dialect.backend(), sql, params)
        }
    }

    /// Run a row-returning statement written with `?` placeholders.
    pub async fn query(&self, sql: &str, params: Vec<Value>) -> Result<QueryOutput, DbInfraError> {
        let (dialect, conn) = self.live().await?;
        let raw = conn.query_all(Self::statement(dialect, sql, params)).await?;
        let rows = raw
            .iter()
            .map(|row| JsonValue::from_query_result(row, ""))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(QueryOutput { rows, raw })
    }

    /// Run a statement with no result set; returns the affected row count.
    pub async fn execute(&self, sql: &str, params: Vec<Value>) -> Result<u64, DbInfraError> {
        let (dialect, conn) = self.live().await?;
        let res = conn.execute(Self::statement(dialect, sql, params)).await?;
        Ok(res.rows_affected())
    }

    /// Run `statements` in one transaction. Any failure rolls back the whole
    /// batch; returns the total affected row count.
    pub async fn execute_in_transaction(
        &self,
        statements: Vec<(&str, Vec<Value>)>,
    ) -> Result<u64, DbInfraError> {
        let (dialect, conn) = self.live().await?;
        let txn = conn.begin().await?;
        let mut affected = 0;
        for (sql, params) in statements {
            affected += txn
                .execute(Self::statement(dialect, sql, params))
                .await?
                .rows_affected();
        }
        txn.commit().await?;
        Ok(affected)
    }

    /// Round-trip `SELECT 1` to prove the pool can reach the server.
    pub async fn verify(&self) -> Result<(), DbInfraError> {
        self.query("SELECT 1 AS ok", Vec::new())
            .await
            .map(|_| ())
            .map_err(|e| match e {
                DbInfraError::Query { message } => DbInfraError::Connection { message },
                other => other,
            })
    }

    /// Integer `column` of the first row, or 0 when no row came back.
    pub async fn scalar_i64(
        &self,
        sql: &str,
        params: Vec<Value>,
        column: &str,
    ) -> Result<i64, DbInfraError> {
        let out = self.query(sql, params).await?;
        match out.first() {
            Some(row) => Ok(row.try_get::<i64>("", column)?),
            None => Ok(0),
        }
    }
}

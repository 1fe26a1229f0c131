//! Idempotent schema application.
//!
//! There is no migration bookkeeping: every statement in the schema files is
//! create-if-absent or insert-if-absent, so the whole file is re-run on every
//! bootstrap. The `users` sentinel only tells a fresh database from an
//! existing one.

use tracing::{debug, info};

use super::pool::ConnectionPool;
use crate::config::db::Dialect;
use crate::error::DbInfraError;

pub const SENTINEL_TABLE: &str = "users";

/// Split a schema file into statements on `;` followed by a newline.
///
/// Chunks that hold only `--` comments or whitespace are dropped. Known
/// limitation: a `;` at the end of a line inside a string literal splits the
/// statement.
pub fn split_statements(source: &str) -> Vec<String> {
    let normalized = source.replace("\r\n", "\n");
    let mut statements: Vec<String> = normalized
        .split(";\n")
        .map(str::trim)
        .filter(|chunk| {
            chunk
                .lines()
                .any(|line| !line.trim().is_empty() && !line.trim_start().starts_with("--"))
        })
        .map(str::to_string)
        .collect();

    if let Some(last) = statements.last_mut() {
        if let Some(stripped) = last.strip_suffix(';') {
            *last = stripped.trim_end().to_string();
        }
    }
    statements
}

pub struct SchemaApplier<'a> {
    pool: &'a ConnectionPool,
    dialect: Dialect,
}

impl<'a> SchemaApplier<'a> {
    pub fn new(pool: &'a ConnectionPool, dialect: Dialect) -> Self {
        Self { pool, dialect }
    }

    /// True when the sentinel table exists.
    pub async fn is_applied(&self) -> Result<bool, DbInfraError> {
        let count = self
            .pool
            .scalar_i64(
                self.dialect.table_exists_sql(),
                vec![SENTINEL_TABLE.into()],
                "cnt",
            )
            .await?;
        debug!(dialect = %self.dialect, table = SENTINEL_TABLE, present = count > 0, "schema_sentinel");
        Ok(count > 0)
    }

    /// Run every schema statement in order, stopping at the first failure.
    ///
    /// Statements that already ran stay applied; re-running is safe because
    /// each one is idempotent. Returns the number of statements executed. A
    /// failure reports the 1-based position of the statement in the file.
    pub async fn apply(&self) -> Result<usize, DbInfraError> {
        let statements = split_statements(self.dialect.schema_source());
        for (position, sql) in (1..).zip(statements.iter()) {
            self.pool
                .execute(sql, Vec::new())
                .await
                .map_err(|e| DbInfraError::Schema {
                    index: position,
                    message: match e {
                        DbInfraError::Query { message } => message,
                        other => other.to_string(),
                    },
                })?;
        }
        info!(dialect = %self.dialect, statements = statements.len(), "schema_apply=done");
        Ok(statements.len())
    }
}

//! First privileged account.

use std::fmt;

use tracing::{info, warn};
use uuid::Uuid;

use super::pool::ConnectionPool;
use crate::config::env::EnvVars;
use crate::error::DbInfraError;

pub const ADMIN_MASTER_GROUP_ID: &str = "grp_admin_master";
pub const PRIVILEGED_ROLE: &str = "master";

const DEFAULT_PHONE: &str = "61999999999";
const DEFAULT_PASSWORD: &str = "Senha@Forte1!";
const DEFAULT_NATIONAL_ID: &str = "12345678909";
const DEFAULT_DISPLAY_NAME: &str = "Admin Master";
const HASH_COST: u32 = 10;

#[derive(Clone, PartialEq, Eq)]
pub struct PrivilegedAccountSeed {
    pub phone: String,
    pub password_plaintext: String,
    pub national_id: String,
    pub display_name: String,
}

impl PrivilegedAccountSeed {
    /// Read `ADMIN_MASTER_*` variables, falling back to the built-in defaults.
    pub fn from_env(env: &EnvVars) -> Self {
        if env.get("ADMIN_MASTER_PASSWORD").is_none() {
            warn!("ADMIN_MASTER_PASSWORD not set; the first admin account will use the default password");
        }
        Self {
            phone: env.get_or("ADMIN_MASTER_PHONE", DEFAULT_PHONE).to_string(),
            password_plaintext: env
                .get_or("ADMIN_MASTER_PASSWORD", DEFAULT_PASSWORD)
                .to_string(),
            national_id: env.get_or("ADMIN_MASTER_CPF", DEFAULT_NATIONAL_ID).to_string(),
            display_name: env
                .get_or("ADMIN_MASTER_NAME", DEFAULT_DISPLAY_NAME)
                .to_string(),
        }
    }
}

impl Default for PrivilegedAccountSeed {
    fn default() -> Self {
        Self::from_env(&EnvVars::empty())
    }
}

impl fmt::Debug for PrivilegedAccountSeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrivilegedAccountSeed")
            .field("phone", &self.phone)
            .field("password_plaintext", &"***")
            .field("national_id", &self.national_id)
            .field("display_name", &self.display_name)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SeedOutcome {
    Created { user_id: String },
    /// The users table already had rows; nothing was written.
    Skipped { existing_users: i64 },
}

/// Number of rows in `users`.
pub async fn count_users(pool: &ConnectionPool) -> Result<i64, DbInfraError> {
    pool.scalar_i64("SELECT COUNT(*) AS cnt FROM users", Vec::new(), "cnt")
        .await
}

/// Create the privileged account unless `users` already has a row.
///
/// The guard is the row count, not a uniqueness constraint on the role, so
/// re-running after any user exists never adds a second privileged account.
pub async fn seed_privileged_account(
    pool: &ConnectionPool,
    seed: &PrivilegedAccountSeed,
) -> Result<SeedOutcome, DbInfraError> {
    let existing_users = count_users(pool)
        .await
        .map_err(|e| DbInfraError::seed(e.to_string()))?;
    if existing_users > 0 {
        info!(existing_users, "privileged_seed=skipped");
        return Ok(SeedOutcome::Skipped { existing_users });
    }

    let password = seed.password_plaintext.clone();
    let password_hash = tokio::task::spawn_blocking(move || bcrypt::hash(password, HASH_COST))
        .await
        .map_err(|e| DbInfraError::seed(format!("password hashing task failed: {e}")))?
        .map_err(|e| DbInfraError::seed(format!("password hashing failed: {e}")))?;

    let user_id = Uuid::new_v4().to_string();
    // User row and group link land together, or a failed link would leave an
    // account that every later run skips.
    pool.execute_in_transaction(vec![
        (
            "INSERT INTO users (id, phone, password_hash, role, name, cpf, active) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
            vec![
                user_id.clone().into(),
                seed.phone.clone().into(),
                password_hash.into(),
                PRIVILEGED_ROLE.into(),
                seed.display_name.clone().into(),
                seed.national_id.clone().into(),
                true.into(),
            ],
        ),
        (
            "INSERT INTO user_groups (user_id, group_id) VALUES (?, ?)",
            vec![user_id.clone().into(), ADMIN_MASTER_GROUP_ID.into()],
        ),
    ])
    .await
    .map_err(|e| DbInfraError::seed(e.to_string()))?;

    info!(user_id = %user_id, phone = %seed.phone, "privileged_seed=created");
    Ok(SeedOutcome::Created { user_id })
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Arc;

    use sea_orm::{DatabaseBackend, DbErr, MockDatabase, MockExecResult, Value};

    use super::*;
    use crate::config::db::{DatabaseConfig, Dialect};
    use crate::testing::MockConnector;

    fn count_row(n: i64) -> Vec<BTreeMap<&'static str, Value>> {
        vec![BTreeMap::from([("cnt", Value::BigInt(Some(n)))])]
    }

    fn one_row() -> MockExecResult {
        MockExecResult {
            last_insert_id: 0,
            rows_affected: 1,
        }
    }

    async fn pool_with(db: sea_orm::DatabaseConnection, dialect: Dialect) -> (ConnectionPool, Arc<MockConnector>) {
        let connector = Arc::new(MockConnector::with_connection(db));
        let pool = ConnectionPool::new(connector.clone());
        pool.connect(&DatabaseConfig::new(dialect, "db", "app", "pw", "gabinete"))
            .await
            .unwrap();
        (pool, connector)
    }

    #[test]
    fn seed_reads_env_with_defaults() {
        let env = EnvVars::from_pairs([("ADMIN_MASTER_PHONE", "11988887777")]);
        let seed = PrivilegedAccountSeed::from_env(&env);
        assert_eq!(seed.phone, "11988887777");
        assert_eq!(seed.password_plaintext, DEFAULT_PASSWORD);
        assert_eq!(seed.display_name, "Admin Master");
        assert!(!format!("{seed:?}").contains(DEFAULT_PASSWORD));
    }

    #[tokio::test]
    async fn creates_account_when_users_empty() {
        let db = MockDatabase::new(DatabaseBackend::MySql)
            .append_query_results([count_row(0)])
            .append_exec_results([one_row(), one_row()])
            .into_connection();
        let (pool, connector) = pool_with(db, Dialect::MySql).await;

        let outcome = seed_privileged_account(&pool, &PrivilegedAccountSeed::default())
            .await
            .unwrap();
        assert!(matches!(outcome, SeedOutcome::Created { .. }));

        let log = connector.transaction_log();
        assert_eq!(log.len(), 2);
        let txn = log[1].statements();
        let sql: Vec<&str> = txn.iter().map(|stmt| stmt.sql.as_str()).collect();
        assert_eq!(sql.first(), Some(&"BEGIN"));
        assert_eq!(sql.last(), Some(&"COMMIT"));
        let insert = &txn[1];
        assert!(insert.sql.starts_with("INSERT INTO users"));
        assert!(txn[2].sql.starts_with("INSERT INTO user_groups"));
        let values = insert.values.as_ref().unwrap();
        let hash = match &values.0[2] {
            Value::String(Some(hash)) => hash.to_string(),
            other => panic!("unexpected hash value {other:?}"),
        };
        assert!(bcrypt::verify(DEFAULT_PASSWORD, &hash).unwrap());
        assert_eq!(values.0[3], Value::from(PRIVILEGED_ROLE));
    }

    #[tokio::test]
    async fn skips_when_any_user_exists() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([count_row(1)])
            .into_connection();
        let (pool, connector) = pool_with(db, Dialect::Postgres).await;

        let outcome = seed_privileged_account(&pool, &PrivilegedAccountSeed::default())
            .await
            .unwrap();
        assert_eq!(outcome, SeedOutcome::Skipped { existing_users: 1 });
        assert_eq!(connector.executed_sql().len(), 1);
    }

    #[tokio::test]
    async fn insert_failure_is_a_seed_error() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([count_row(0)])
            .append_exec_errors([DbErr::Custom("duplicate key value violates unique constraint".into())])
            .into_connection();
        let (pool, _) = pool_with(db, Dialect::Postgres).await;

        let err = seed_privileged_account(&pool, &PrivilegedAccountSeed::default())
            .await
            .unwrap_err();
        assert!(matches!(err, DbInfraError::Seed { .. }));
        assert!(err.to_string().contains("duplicate key"));
    }

    #[tokio::test]
    async fn failed_group_link_rolls_back_the_user_row() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([count_row(0)])
            .append_exec_results([one_row()])
            .append_exec_errors([DbErr::Custom("insert or update on table \"user_groups\" violates foreign key constraint".into())])
            .into_connection();
        let (pool, connector) = pool_with(db, Dialect::Postgres).await;

        let err = seed_privileged_account(&pool, &PrivilegedAccountSeed::default())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("foreign key"));

        let sql = connector.executed_sql();
        assert!(sql.iter().any(|s| s.starts_with("INSERT INTO users")));
        assert_eq!(sql.last().map(String::as_str), Some("ROLLBACK"));
        assert!(!sql.iter().any(|s| s == "COMMIT"));
    }
}

use thiserror::Error;

/// Failures raised by configuration resolution, the pool and the bootstrap
/// stages. The orchestrator converts every variant into `BootstrapState.error`.
#[derive(Debug, Error)]
pub enum DbInfraError {
    #[error(
        "database configuration missing: set POSTGRES_HOST/POSTGRES_USER/POSTGRES_DATABASE \
         (or the MYSQL_* equivalents), fill the fixed configuration block, or run setup"
    )]
    ConfigAbsent,
    #[error("invalid database configuration: {message}")]
    InvalidConfig { message: String },
    #[error("config file {path}: {message}")]
    ConfigFile { path: String, message: String },
    #[error("connection failed: {message}")]
    Connection { message: String },
    /// `index` is the 1-based position of the statement in the schema file.
    #[error("schema statement #{index} of the schema file failed: {message}")]
    Schema { index: usize, message: String },
    #[error("privileged account seed failed: {message}")]
    Seed { message: String },
    #[error("query failed: {message}")]
    Query { message: String },
    #[error("database pool not initialized")]
    NotInitialized,
    #[error("{stage} timed out after {elapsed_ms}ms")]
    Timeout { stage: &'static str, elapsed_ms: u128 },
}

impl DbInfraError {
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    pub fn seed(message: impl Into<String>) -> Self {
        Self::Seed {
            message: message.into(),
        }
    }

    /// True when no configuration source yielded a usable config. The operator
    /// guidance differs from every other failure (supply config vs. fix it).
    pub fn is_config_absent(&self) -> bool {
        matches!(self, Self::ConfigAbsent)
    }
}

impl From<sea_orm::DbErr> for DbInfraError {
    fn from(e: sea_orm::DbErr) -> Self {
        Self::Query {
            message: e.to_string(),
        }
    }
}

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::DbInfraError;

/// The two supported SQL engines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    #[serde(alias = "postgresql", alias = "pg")]
    Postgres,
    #[serde(alias = "mariadb")]
    MySql,
}

impl Dialect {
    pub fn default_port(self) -> u16 {
        match self {
            Dialect::Postgres => 5432,
            Dialect::MySql => 3306,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Dialect::Postgres => "postgres",
            Dialect::MySql => "mysql",
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalized connection settings for one database.
///
/// The `type`/`ssl` aliases accept config files written by earlier setup
/// tooling.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseConfig {
    #[serde(alias = "type")]
    pub dialect: Dialect,
    pub host: String,
    #[serde(default)]
    pub port: Option<u16>,
    pub user: String,
    #[serde(default)]
    pub password: String,
    pub database: String,
    #[serde(default, rename = "useTLS", alias = "useTls", alias = "ssl")]
    pub use_tls: bool,
}

impl DatabaseConfig {
    pub fn new(
        dialect: Dialect,
        host: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
        database: impl Into<String>,
    ) -> Self {
        Self {
            dialect,
            host: host.into(),
            port: None,
            user: user.into(),
            password: password.into(),
            database: database.into(),
            use_tls: false,
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn with_tls(mut self, use_tls: bool) -> Self {
        self.use_tls = use_tls;
        self
    }

    /// Explicit port, or the dialect default.
    pub fn effective_port(&self) -> u16 {
        self.port.unwrap_or_else(|| self.dialect.default_port())
    }

    /// A pool may only be built from a config with host, user and database set.
    pub fn validate(&self) -> Result<(), DbInfraError> {
        let missing: Vec<&str> = [
            ("host", &self.host),
            ("user", &self.user),
            ("database", &self.database),
        ]
        .into_iter()
        .filter(|(_, v)| v.trim().is_empty())
        .map(|(name, _)| name)
        .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(DbInfraError::invalid_config(format!(
                "{} config is missing {}",
                self.dialect,
                missing.join(", ")
            )))
        }
    }

    /// Log-safe one-line description (never includes the password).
    pub fn describe(&self) -> String {
        format!(
            "{}://{}@{}:{}/{}{}",
            self.dialect,
            self.user,
            self.host,
            self.effective_port(),
            self.database,
            if self.use_tls { " (tls)" } else { "" }
        )
    }
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("dialect", &self.dialect)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"***")
            .field("database", &self.database)
            .field("use_tls", &self.use_tls)
            .finish()
    }
}

/// Parse a TLS flag from its string form. Only exactly `1` and `true`
/// enable TLS.
pub fn parse_tls_flag(raw: &str) -> bool {
    matches!(raw, "1" | "true")
}

//! Operator-edited configuration block.
//!
//! Highest-precedence source. Leave `dialect` as `None` to fall through to
//! the environment and the config file; set it to pin the deployment to one
//! database regardless of what the environment says.

use super::db::{DatabaseConfig, Dialect};

#[derive(Debug, Clone, Copy)]
pub struct FixedDbConfig {
    pub dialect: Option<Dialect>,
    pub host: &'static str,
    pub port: Option<u16>,
    pub user: &'static str,
    pub password: &'static str,
    pub database: &'static str,
    pub use_tls: bool,
}

impl FixedDbConfig {
    pub const EMPTY: Self = Self {
        dialect: None,
        host: "",
        port: None,
        user: "",
        password: "",
        database: "",
        use_tls: false,
    };

    /// The block only counts once its dialect is set; empty fields are
    /// rejected later by `DatabaseConfig::validate`.
    pub fn to_config(&self) -> Option<DatabaseConfig> {
        let dialect = self.dialect?;
        Some(DatabaseConfig {
            dialect,
            host: self.host.to_string(),
            port: self.port,
            user: self.user.to_string(),
            password: self.password.to_string(),
            database: self.database.to_string(),
            use_tls: self.use_tls,
        })
    }
}

impl Default for FixedDbConfig {
    fn default() -> Self {
        Self::EMPTY
    }
}

pub const FIXED_DB_CONFIG: FixedDbConfig = FixedDbConfig::EMPTY;

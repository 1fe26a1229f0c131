//! Database configuration: shape, sources and layered resolution.

pub mod db;
pub mod env;
pub mod file;
pub mod fixed;
pub mod resolver;

pub use db::{DatabaseConfig, Dialect};
pub use env::EnvVars;
pub use file::{config_file_path, ConfigFile, PushCredentials};
pub use fixed::{FixedDbConfig, FIXED_DB_CONFIG};
pub use resolver::{ConfigResolver, ConfigSource, ResolvedConfig};

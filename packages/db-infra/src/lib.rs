//! Database bootstrap infrastructure: layered configuration, the pool and
//! query adapter for both dialects, schema application, the privileged seed
//! and the orchestrator that drives them. Used by the backend and the setup
//! CLI.

pub mod config;
pub mod error;
pub mod infra;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use config::db;
pub use error::DbInfraError;
pub use infra::db::{
    BootstrapOptions, BootstrapOrchestrator, BootstrapState, ConnectionPool, Connector, NotReady,
    PrivilegedAccountSeed, QueryOutput, SeaOrmConnector, Stage,
};

pub mod bootstrap;
pub mod dialect;
pub mod pool;
pub mod readiness;
pub mod schema;
pub mod seed;
pub mod state;

pub use bootstrap::{BootstrapOptions, BootstrapOrchestrator};
pub use pool::{ConnectionPool, Connector, QueryOutput, SeaOrmConnector};
pub use readiness::NotReady;
pub use schema::SchemaApplier;
pub use seed::{PrivilegedAccountSeed, SeedOutcome};
pub use state::{BootstrapState, ErrorCode, Stage, StepRecord};

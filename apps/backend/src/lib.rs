#![deny(clippy::wildcard_imports)]
#![cfg_attr(test, allow(clippy::wildcard_imports))]

pub mod config;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod state;
pub mod telemetry;
pub mod trace_ctx;

pub use config::ServerConfig;
pub use error::AppError;
pub use middleware::{ReadinessGate, RequestTrace, StructuredLogger, TraceSpan};
pub use state::app_state::AppState;
pub use state::builder::{build_state, StateBuilder};

// Auto-initialize logging for unit tests
#[cfg(test)]
#[ctor::ctor]
fn init_test_logging() {
    backend_test_support::logging::init();
}

use std::sync::Arc;

use db_infra::{BootstrapOrchestrator, ConnectionPool};

/// Shared across actix workers. The orchestrator owns the only pool.
#[derive(Clone)]
pub struct AppState {
    pub bootstrap: Arc<BootstrapOrchestrator>,
}

impl AppState {
    pub fn new(bootstrap: Arc<BootstrapOrchestrator>) -> Self {
        Self { bootstrap }
    }

    /// Query adapter. Handlers behind `ReadinessGate` may assume it is live.
    pub fn pool(&self) -> &ConnectionPool {
        self.bootstrap.pool()
    }
}

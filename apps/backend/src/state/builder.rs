use std::path::PathBuf;
use std::sync::Arc;

use db_infra::config::{config_file_path, ConfigResolver, EnvVars, FixedDbConfig, FIXED_DB_CONFIG};
use db_infra::{
    BootstrapOptions, BootstrapOrchestrator, ConnectionPool, Connector, PrivilegedAccountSeed,
    SeaOrmConnector,
};

use crate::error::AppError;
use crate::state::app_state::AppState;

/// Builds `AppState` for both `main` and tests.
///
/// Everything defaults to production wiring: the process environment, the
/// compiled-in fixed block, `GABINETE_CONFIG_FILE` and the sea-orm connector.
pub struct StateBuilder {
    env: Option<EnvVars>,
    fixed: FixedDbConfig,
    config_file: Option<PathBuf>,
    connector: Option<Arc<dyn Connector>>,
}

impl StateBuilder {
    pub fn new() -> Self {
        Self {
            env: None,
            fixed: FIXED_DB_CONFIG,
            config_file: None,
            connector: None,
        }
    }

    pub fn with_env(mut self, env: EnvVars) -> Self {
        self.env = Some(env);
        self
    }

    pub fn with_fixed(mut self, fixed: FixedDbConfig) -> Self {
        self.fixed = fixed;
        self
    }

    pub fn with_config_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_file = Some(path.into());
        self
    }

    pub fn with_connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connector = Some(connector);
        self
    }

    /// Assemble the orchestrator without starting it.
    pub fn build(self) -> Result<AppState, AppError> {
        let env = self.env.unwrap_or_else(EnvVars::from_process);
        let file = self
            .config_file
            .unwrap_or_else(|| config_file_path(&env));
        let options = BootstrapOptions::from_env(&env)?;
        let seed = PrivilegedAccountSeed::from_env(&env);
        let connector = self
            .connector
            .unwrap_or_else(|| Arc::new(SeaOrmConnector::default()));

        let orchestrator = BootstrapOrchestrator::new(
            ConfigResolver::new(self.fixed, env, file),
            ConnectionPool::new(connector),
            seed,
            options,
        );
        Ok(AppState::new(Arc::new(orchestrator)))
    }
}

impl Default for StateBuilder {
    fn default() -> Self {
        Self::new()
    }
}

pub fn build_state() -> StateBuilder {
    StateBuilder::new()
}

//! Bootstrap state machine.
//!
//! `ResolvingConfig → Connecting → VerifyingConnection → ApplyingSchema →
//! SeedingPrivilegedAccount → Ready`, with `Error` reachable from every
//! non-terminal stage. The `running` flag is the only mutual exclusion
//! between runs: a second trigger while one is in flight returns the current
//! status and does nothing else.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::pool::ConnectionPool;
use super::readiness::{self, NotReady};
use super::schema::SchemaApplier;
use super::seed::{seed_privileged_account, PrivilegedAccountSeed, SeedOutcome};
use super::state::{BootstrapState, ErrorCode, Stage};
use crate::config::env::EnvVars;
use crate::config::resolver::ConfigResolver;
use crate::error::DbInfraError;

pub const STAGE_TIMEOUT_ENV: &str = "BOOTSTRAP_STAGE_TIMEOUT_MS";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BootstrapOptions {
    /// Upper bound for each I/O stage. `None` waits indefinitely.
    pub stage_timeout: Option<Duration>,
}

impl BootstrapOptions {
    pub fn from_env(env: &EnvVars) -> Result<Self, DbInfraError> {
        let stage_timeout = match env.get(STAGE_TIMEOUT_ENV) {
            None => None,
            Some(raw) => {
                let ms = raw.trim().parse::<u64>().map_err(|_| {
                    DbInfraError::invalid_config(format!(
                        "{STAGE_TIMEOUT_ENV} must be a number of milliseconds, got '{raw}'"
                    ))
                })?;
                (ms > 0).then(|| Duration::from_millis(ms))
            }
        };
        Ok(Self { stage_timeout })
    }
}

/// Clears `running` when a run ends, however it ends. A run that unwinds or
/// is dropped mid-stage lands in `Error` instead of leaving the flag set.
struct RunGuard<'a> {
    state: &'a RwLock<BootstrapState>,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.state.write();
        if !state.running {
            return;
        }
        let stage = state.stage;
        warn!(stage = %stage, "bootstrap_run=aborted");
        state.fail(
            format!("bootstrap run aborted during {stage}"),
            ErrorCode::BootstrapFailed,
        );
    }
}

pub struct BootstrapOrchestrator {
    resolver: ConfigResolver,
    pool: ConnectionPool,
    seed: PrivilegedAccountSeed,
    options: BootstrapOptions,
    state: RwLock<BootstrapState>,
}

impl BootstrapOrchestrator {
    pub fn new(
        resolver: ConfigResolver,
        pool: ConnectionPool,
        seed: PrivilegedAccountSeed,
        options: BootstrapOptions,
    ) -> Self {
        Self {
            resolver,
            pool,
            seed,
            options,
            state: RwLock::new(BootstrapState::default()),
        }
    }

    pub fn resolver(&self) -> &ConfigResolver {
        &self.resolver
    }

    /// Query adapter for request handlers. Only meaningful once `is_ready`.
    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }

    pub fn status(&self) -> BootstrapState {
        self.state.read().clone()
    }

    pub fn is_ready(&self) -> bool {
        self.state.read().ready
    }

    pub fn is_running(&self) -> bool {
        self.state.read().running
    }

    pub fn check_ready(&self) -> Result<(), NotReady> {
        readiness::check(&self.state.read())
    }

    /// Run the full sequence once. Returns the final status, or the current
    /// one unchanged if a run is already in flight.
    pub async fn run(&self) -> BootstrapState {
        let Some(guard) = self.claim() else {
            debug!("bootstrap_run=skipped reason=already_running");
            return self.status();
        };
        self.drive(guard).await
    }

    /// Tear down the pool and run again from `ResolvingConfig`.
    ///
    /// Teardown errors are logged and swallowed. While a run is in flight
    /// this returns the current status and touches nothing.
    pub async fn retry(&self) -> BootstrapState {
        let Some(guard) = self.claim() else {
            debug!("bootstrap_retry=skipped reason=already_running");
            return self.status();
        };
        if let Err(e) = self.pool.teardown().await {
            warn!(error = %e, "bootstrap_retry teardown_failed=ignored");
        }
        info!("bootstrap_retry=started");
        self.drive(guard).await
    }

    /// Spawn `run` under a supervisor that records a panic into state.
    pub fn spawn_supervised(self: &Arc<Self>) -> JoinHandle<BootstrapState> {
        self.supervise(|orchestrator| async move { orchestrator.run().await })
    }

    /// Spawn `retry` the same way. The run belongs to the runtime, so a
    /// caller that stops waiting on the handle does not cancel it.
    pub fn spawn_retry(self: &Arc<Self>) -> JoinHandle<BootstrapState> {
        self.supervise(|orchestrator| async move { orchestrator.retry().await })
    }

    fn supervise<F, Fut>(self: &Arc<Self>, work: F) -> JoinHandle<BootstrapState>
    where
        F: FnOnce(Arc<Self>) -> Fut + Send + 'static,
        Fut: Future<Output = BootstrapState> + Send + 'static,
    {
        let orchestrator = Arc::clone(self);
        tokio::spawn(async move {
            match tokio::spawn(work(Arc::clone(&orchestrator))).await {
                Ok(state) => state,
                Err(join_err) => {
                    let reason = if join_err.is_panic() {
                        panic_message(join_err.into_panic())
                    } else {
                        "cancelled".to_string()
                    };
                    error!(reason = %reason, "bootstrap_task=crashed");
                    orchestrator.record_crash(&reason);
                    orchestrator.status()
                }
            }
        })
    }

    fn record_crash(&self, reason: &str) {
        let mut state = self.state.write();
        let error = format!("bootstrap task crashed: {reason}");
        if state.stage == Stage::Error {
            state.error = Some(error);
            state.error_code = Some(ErrorCode::BootstrapFailed);
        } else {
            state.fail(error, ErrorCode::BootstrapFailed);
        }
    }

    fn claim(&self) -> Option<RunGuard<'_>> {
        let mut state = self.state.write();
        if state.running {
            return None;
        }
        state.begin_attempt();
        Some(RunGuard { state: &self.state })
    }

    async fn drive(&self, guard: RunGuard<'_>) -> BootstrapState {
        let started = Instant::now();
        match self.run_stages().await {
            Ok(()) => {
                self.state.write().mark_ready();
                info!(elapsed_ms = started.elapsed().as_millis(), "bootstrap_run=ready");
            }
            Err(e) => {
                error!(error = %e, elapsed_ms = started.elapsed().as_millis(), "bootstrap_run=failed");
                self.state.write().mark_failed(&e);
            }
        }
        drop(guard);
        self.status()
    }

    fn enter(&self, stage: Stage, message: impl Into<String>) {
        let message = message.into();
        info!(stage = %stage, detail = %message, "bootstrap_stage");
        self.state.write().enter(stage, message);
    }

    fn note(&self, message: impl Into<String>) {
        let message = message.into();
        debug!(detail = %message, "bootstrap_step");
        self.state.write().push_step(message);
    }

    async fn bounded<T, F>(&self, stage: Stage, work: F) -> Result<T, DbInfraError>
    where
        F: Future<Output = Result<T, DbInfraError>>,
    {
        let Some(limit) = self.options.stage_timeout else {
            return work.await;
        };
        let started = Instant::now();
        match tokio::time::timeout(limit, work).await {
            Ok(result) => result,
            Err(_) => Err(DbInfraError::Timeout {
                stage: stage.as_str(),
                elapsed_ms: started.elapsed().as_millis(),
            }),
        }
    }

    async fn run_stages(&self) -> Result<(), DbInfraError> {
        self.enter(Stage::ResolvingConfig, "resolving database configuration");
        let resolved = self.resolver.resolve()?.ok_or(DbInfraError::ConfigAbsent)?;
        let cfg = resolved.config;

        self.enter(
            Stage::Connecting,
            format!("connecting to {} (from {})", cfg.describe(), resolved.source),
        );
        self.bounded(Stage::Connecting, self.pool.connect(&cfg))
            .await?;

        self.enter(Stage::VerifyingConnection, "verifying connection");
        self.bounded(Stage::VerifyingConnection, self.pool.verify())
            .await?;

        let applier = SchemaApplier::new(&self.pool, cfg.dialect);
        let applied = self
            .bounded(Stage::VerifyingConnection, applier.is_applied())
            .await?;
        // Every statement is idempotent, so the file runs in full even when
        // the sentinel exists: an earlier attempt may have stopped part way.
        if applied {
            self.enter(Stage::ApplyingSchema, "schema present, re-applying missing objects");
        } else {
            self.enter(Stage::ApplyingSchema, "applying schema");
        }
        let count = self.bounded(Stage::ApplyingSchema, applier.apply()).await?;
        self.note(format!("schema applied ({count} statements)"));

        self.enter(Stage::SeedingPrivilegedAccount, "seeding privileged account");
        let outcome = self
            .bounded(
                Stage::SeedingPrivilegedAccount,
                seed_privileged_account(&self.pool, &self.seed),
            )
            .await?;
        match outcome {
            SeedOutcome::Created { .. } => {
                self.note(format!("privileged account {} created", self.seed.phone))
            }
            SeedOutcome::Skipped { existing_users } => self.note(format!(
                "users table has {existing_users} row(s), privileged account seed skipped"
            )),
        }
        Ok(())
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic".to_string()
    }
}

//! Observable bootstrap progress.

use std::fmt;

use serde::Serialize;
use time::OffsetDateTime;

use crate::error::DbInfraError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Stage {
    Idle,
    ResolvingConfig,
    Connecting,
    VerifyingConnection,
    ApplyingSchema,
    SeedingPrivilegedAccount,
    Ready,
    Error,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Idle => "Idle",
            Stage::ResolvingConfig => "ResolvingConfig",
            Stage::Connecting => "Connecting",
            Stage::VerifyingConnection => "VerifyingConnection",
            Stage::ApplyingSchema => "ApplyingSchema",
            Stage::SeedingPrivilegedAccount => "SeedingPrivilegedAccount",
            Stage::Ready => "Ready",
            Stage::Error => "Error",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Machine-readable class of the last failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// No config source yielded anything; the operator has to supply one.
    SetupRequired,
    BootstrapFailed,
}

impl ErrorCode {
    pub fn for_error(err: &DbInfraError) -> Self {
        if err.is_config_absent() {
            ErrorCode::SetupRequired
        } else {
            ErrorCode::BootstrapFailed
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::SetupRequired => "setup_required",
            ErrorCode::BootstrapFailed => "bootstrap_failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepRecord {
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub message: String,
}

/// Snapshot returned by the status and retry endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BootstrapState {
    pub running: bool,
    pub ready: bool,
    pub stage: Stage,
    pub message: String,
    pub error: Option<String>,
    pub error_code: Option<ErrorCode>,
    pub steps: Vec<StepRecord>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_attempt_at: Option<OffsetDateTime>,
}

impl Default for BootstrapState {
    fn default() -> Self {
        Self {
            running: false,
            ready: false,
            stage: Stage::Idle,
            message: "waiting to start".to_string(),
            error: None,
            error_code: None,
            steps: Vec::new(),
            last_attempt_at: None,
        }
    }
}

impl BootstrapState {
    /// Reset for a new attempt: clears the step log and the previous error.
    pub(crate) fn begin_attempt(&mut self) {
        let now = OffsetDateTime::now_utc();
        self.running = true;
        self.ready = false;
        self.stage = Stage::Idle;
        self.error = None;
        self.error_code = None;
        self.steps.clear();
        self.last_attempt_at = Some(now);
    }

    pub(crate) fn enter(&mut self, stage: Stage, message: impl Into<String>) {
        let message = message.into();
        self.stage = stage;
        self.push_step(message);
    }

    pub(crate) fn push_step(&mut self, message: impl Into<String>) {
        let message = message.into();
        self.message = message.clone();
        self.steps.push(StepRecord {
            timestamp: OffsetDateTime::now_utc(),
            message,
        });
    }

    pub(crate) fn mark_ready(&mut self) {
        self.enter(Stage::Ready, "database ready");
        self.ready = true;
        self.running = false;
    }

    pub(crate) fn mark_failed(&mut self, err: &DbInfraError) {
        self.fail(err.to_string(), ErrorCode::for_error(err));
    }

    pub(crate) fn fail(&mut self, error: String, code: ErrorCode) {
        self.enter(Stage::Error, format!("bootstrap failed: {error}"));
        self.ready = false;
        self.running = false;
        self.error = Some(error);
        self.error_code = Some(code);
    }

    /// The last attempt found no configuration at all.
    pub fn needs_setup(&self) -> bool {
        self.error_code == Some(ErrorCode::SetupRequired)
    }
}

//! Readiness predicate consulted before any database-backed request.

use super::state::BootstrapState;

/// Why a request was refused while the database is not ready.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotReady {
    /// The last attempt found no configuration; a client should send the
    /// operator to setup instead of polling.
    SetupRequired,
    /// Bootstrap is running, idle or failed for another reason; poll status.
    Bootstrapping,
}

impl NotReady {
    pub fn tag(self) -> &'static str {
        match self {
            NotReady::SetupRequired => "setup_required",
            NotReady::Bootstrapping => "bootstrap_not_ready",
        }
    }
}

pub fn check(state: &BootstrapState) -> Result<(), NotReady> {
    if state.ready {
        Ok(())
    } else if state.needs_setup() {
        Err(NotReady::SetupRequired)
    } else {
        Err(NotReady::Bootstrapping)
    }
}

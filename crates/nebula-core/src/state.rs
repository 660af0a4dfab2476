//! Engine phases and the busy flag
//!
//! ```text
//! Idle -> Generating -> Auditing -> Annotating -> Idle
//! Idle -> Importing  -> Auditing -> Annotating -> Idle
//! Idle -> Auditing   -> Annotating -> Idle
//! Idle -> Fixing  -> Idle
//! Idle -> Syncing -> Idle
//! ```
//!
//! Every phase may also drop straight back to `Idle` on failure.

use crate::error::EngineError;
use crate::events::{EngineEvent, EventBus};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Engine phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnginePhase {
    /// No action in flight
    #[default]
    Idle,
    /// Waiting for the Drafter
    Generating,
    /// Waiting for the Drafter on hand-edited code
    Importing,
    /// Waiting for the Auditor
    Auditing,
    /// Attributing findings and committing
    Annotating,
    /// Waiting for the Fixer (or Syncer on resync)
    Fixing,
    /// Waiting for the Syncer
    Syncing,
}

impl EnginePhase {
    /// Check whether this phase blocks new actions
    #[inline]
    #[must_use]
    pub fn is_busy(self) -> bool {
        self != Self::Idle
    }
}

impl std::fmt::Display for EnginePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Generating => "generating",
            Self::Importing => "importing",
            Self::Auditing => "auditing",
            Self::Annotating => "annotating",
            Self::Fixing => "fixing",
            Self::Syncing => "syncing",
        };
        f.write_str(s)
    }
}

/// Phases reachable from `from`
#[must_use]
pub fn allowed_transitions(from: EnginePhase) -> Vec<EnginePhase> {
    use EnginePhase::{Annotating, Auditing, Fixing, Generating, Idle, Importing, Syncing};
    match from {
        Idle => vec![Generating, Importing, Auditing, Fixing, Syncing],
        Generating | Importing => vec![Auditing, Idle],
        Auditing => vec![Annotating, Idle],
        Annotating | Fixing | Syncing => vec![Idle],
    }
}

/// Validate a phase change
///
/// # Errors
/// Returns [`EngineError::IllegalTransition`] when `to` is not reachable.
pub fn validate_transition(from: EnginePhase, to: EnginePhase) -> Result<(), EngineError> {
    if allowed_transitions(from).contains(&to) {
        Ok(())
    } else {
        Err(EngineError::IllegalTransition { from, to })
    }
}

/// Current phase, shared by every action of one engine
#[derive(Debug, Default)]
pub(crate) struct PhaseCell {
    phase: Mutex<EnginePhase>,
}

impl PhaseCell {
    pub(crate) fn get(&self) -> EnginePhase {
        *self.phase.lock()
    }

    /// Leave `Idle` for `start`, or report busy
    pub(crate) fn begin<'a>(
        &'a self,
        start: EnginePhase,
        events: &'a EventBus,
    ) -> Result<PhaseGuard<'a>, EngineError> {
        let mut phase = self.phase.lock();
        if phase.is_busy() {
            tracing::debug!("Ignoring {} trigger while {}", start, *phase);
            return Err(EngineError::Busy(*phase));
        }
        validate_transition(*phase, start)?;
        *phase = start;
        drop(phase);

        events.emit(EngineEvent::PhaseChanged { phase: start });
        Ok(PhaseGuard { cell: self, events })
    }
}

/// Holds the busy flag for one action; returns to `Idle` on drop
#[derive(Debug)]
pub(crate) struct PhaseGuard<'a> {
    cell: &'a PhaseCell,
    events: &'a EventBus,
}

impl PhaseGuard<'_> {
    pub(crate) fn advance(&self, to: EnginePhase) -> Result<(), EngineError> {
        let mut phase = self.cell.phase.lock();
        validate_transition(*phase, to)?;
        *phase = to;
        drop(phase);
        self.events.emit(EngineEvent::PhaseChanged { phase: to });
        Ok(())
    }
}

impl Drop for PhaseGuard<'_> {
    fn drop(&mut self) {
        *self.cell.phase.lock() = EnginePhase::Idle;
        self.events.emit(EngineEvent::PhaseChanged {
            phase: EnginePhase::Idle,
        });
    }
}

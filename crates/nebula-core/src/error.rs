//! Engine errors

use crate::state::EnginePhase;
use nebula_agents::AgentError;
use nebula_graph::CanvasError;

/// Failure of one engine action
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    /// Another action is in flight; the trigger was ignored
    #[error("engine busy ({0})")]
    Busy(EnginePhase),

    /// Generate called with a blank intent
    #[error("intent is empty")]
    EmptyIntent,

    /// Request cannot be served with the current state
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Agent call failed
    #[error(transparent)]
    Agent(#[from] AgentError),

    /// Canvas edit rejected
    #[error(transparent)]
    Canvas(#[from] CanvasError),

    /// Phase change not allowed by the state machine
    #[error("illegal phase transition: {from} -> {to}")]
    IllegalTransition {
        /// Current phase
        from: EnginePhase,
        /// Requested phase
        to: EnginePhase,
    },
}

impl EngineError {
    /// Check whether re-triggering the same action may succeed
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Busy(_) | Self::Agent(_))
    }

    /// Short message for the result node
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Busy(_) => "Another action is still running.".to_string(),
            Self::EmptyIntent => "Please describe the infrastructure you want.".to_string(),
            Self::InvalidInput(msg) => msg.clone(),
            Self::Agent(e) => e.user_message(),
            Self::Canvas(e) => e.to_string(),
            Self::IllegalTransition { .. } => "Internal state error. Please retry.".to_string(),
        }
    }
}

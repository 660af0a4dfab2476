//! Agent errors

use crate::roles::AgentRole;

/// Failure of one agent call
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AgentError {
    /// Every provider attempt failed or produced unparseable output
    #[error("{role} agent returned no usable response")]
    NoResponse {
        /// Role that was invoked
        role: AgentRole,
    },

    /// Parsed response lacks a required field or has the wrong shape
    #[error("{role} agent response violated its contract: {reason}")]
    ContractViolation {
        /// Role that was invoked
        role: AgentRole,
        /// What was missing or malformed
        reason: String,
    },
}

impl AgentError {
    /// Create contract violation
    #[must_use]
    pub fn contract(role: AgentRole, reason: impl Into<String>) -> Self {
        Self::ContractViolation {
            role,
            reason: reason.into(),
        }
    }

    /// Role that failed
    #[inline]
    #[must_use]
    pub fn role(&self) -> AgentRole {
        match self {
            Self::NoResponse { role } | Self::ContractViolation { role, .. } => *role,
        }
    }

    /// Short message suitable for the result node
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::NoResponse { role } => {
                format!("{} is unavailable right now. Please try again.", role.display_name())
            }
            Self::ContractViolation { role, .. } => {
                format!("{} returned an incomplete response. Please try again.", role.display_name())
            }
        }
    }
}

//! Fix request discrimination

use nebula_agents::SYNC_SENTINEL;
use nebula_graph::Finding;

/// What a Fix trigger asks for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FixRequest {
    /// Rewrite the code to resolve these findings
    Repair {
        /// Findings to resolve
        findings: Vec<Finding>,
    },
    /// Regenerate the code from the current topology
    Resync,
}

impl FixRequest {
    /// Classify a legacy findings payload
    ///
    /// Any message containing the sync sentinel turns the whole request
    /// into a resync.
    #[must_use]
    pub fn from_findings(findings: Vec<Finding>) -> Self {
        if findings.iter().any(|f| f.message.contains(SYNC_SENTINEL)) {
            Self::Resync
        } else {
            Self::Repair { findings }
        }
    }

    /// Check whether this is a resync
    #[inline]
    #[must_use]
    pub fn is_resync(&self) -> bool {
        matches!(self, Self::Resync)
    }
}

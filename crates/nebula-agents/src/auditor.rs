//! Policy Auditor

use crate::error::AgentError;
use crate::roles::Auditor;
use crate::runner::AgentRunner;
use nebula_graph::{Finding, Severity};

/// Read-only policy check over a code document
#[derive(Debug, Clone)]
pub struct PolicyAuditor {
    runner: AgentRunner,
}

impl PolicyAuditor {
    /// Create auditor
    #[inline]
    #[must_use]
    pub fn new(runner: AgentRunner) -> Self {
        Self { runner }
    }

    /// Audit code; blank code yields no findings without a model call
    ///
    /// # Errors
    /// Propagates [`AgentError`] from the Auditor role.
    pub async fn audit(&self, code: &str) -> Result<Vec<Finding>, AgentError> {
        if code.trim().is_empty() {
            return Ok(Vec::new());
        }

        let findings = self.runner.run::<Auditor>(code).await?;
        let critical = findings
            .iter()
            .filter(|f| f.severity == Severity::Critical)
            .count();
        tracing::info!("Audit found {} issues ({} critical)", findings.len(), critical);
        Ok(findings)
    }
}

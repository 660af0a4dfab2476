//! Typed dispatch of agent roles over the gateway

use crate::error::AgentError;
use crate::gateway::ModelGateway;
use crate::roles::{
    Agent, Draft, DraftRequest, Drafter, Fixer, Repair, RepairRequest, SyncRequest, Synced, Syncer,
};

/// Runs [`Agent`] implementations through one [`ModelGateway`]
#[derive(Debug, Clone)]
pub struct AgentRunner {
    gateway: ModelGateway,
}

impl AgentRunner {
    /// Create runner
    #[inline]
    #[must_use]
    pub fn new(gateway: ModelGateway) -> Self {
        Self { gateway }
    }

    /// Underlying gateway
    #[inline]
    #[must_use]
    pub fn gateway(&self) -> &ModelGateway {
        &self.gateway
    }

    /// Invoke one role and validate its response
    ///
    /// # Errors
    /// [`AgentError::NoResponse`] when the gateway is exhausted,
    /// [`AgentError::ContractViolation`] when the response has the wrong
    /// shape or lacks a required field.
    pub async fn run<A: Agent>(&self, input: &A::Input) -> Result<A::Output, AgentError> {
        let role = A::ROLE;
        let payload = A::payload(input);
        tracing::debug!("{} payload: {} chars", role, payload.len());

        let value = self
            .gateway
            .invoke(role, role.instruction(), &payload)
            .await
            .ok_or(AgentError::NoResponse { role })?;

        let response: A::Response = serde_json::from_value(value)
            .map_err(|e| AgentError::contract(role, e.to_string()))?;

        A::finish(input, response).map_err(|e| {
            tracing::warn!("{}", e);
            e
        })
    }

    /// Run the Drafter
    ///
    /// # Errors
    /// See [`AgentRunner::run`].
    pub async fn draft(&self, request: &DraftRequest) -> Result<Draft, AgentError> {
        let draft = self.run::<Drafter>(request).await?;
        tracing::info!(
            "Drafter produced {} nodes, {} edges",
            draft.graph.nodes.len(),
            draft.graph.edges.len()
        );
        Ok(draft)
    }

    /// Run the Fixer
    ///
    /// # Errors
    /// See [`AgentRunner::run`].
    pub async fn fix(&self, request: &RepairRequest) -> Result<Repair, AgentError> {
        self.run::<Fixer>(request).await
    }

    /// Run the Syncer
    ///
    /// # Errors
    /// See [`AgentRunner::run`].
    pub async fn sync(&self, request: &SyncRequest) -> Result<Synced, AgentError> {
        self.run::<Syncer>(request).await
    }
}

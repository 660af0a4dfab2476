//! Nebula Agents - generative back-ends behind typed roles
//!
//! - [`ModelGateway`]: strict, permissive, then secondary provider; `None`
//!   when all three fail
//! - [`AgentRole`] and the [`Agent`] implementations [`Drafter`],
//!   [`Auditor`], [`Fixer`], [`Syncer`]
//! - [`PolicyAuditor`]: findings for a code document
//!
//! # Example
//!
//! ```rust,no_run
//! use nebula_agents::{AgentRunner, DraftRequest, GatewayConfig, ModelGateway};
//! use nebula_graph::GraphSummary;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = GatewayConfig::default().with_primary_key("gsk_...");
//! let runner = AgentRunner::new(ModelGateway::from_config(config)?);
//!
//! let request = DraftRequest::generate("create an S3 bucket", GraphSummary::default());
//! let draft = runner.draft(&request).await?;
//! println!("{}", draft.code.content);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod auditor;
pub mod config;
pub mod error;
pub mod gateway;
pub mod llm;
pub mod parse;
pub mod providers;
pub mod roles;
pub mod runner;

pub use auditor::PolicyAuditor;
pub use config::{GatewayConfig, ProviderConfig};
pub use error::AgentError;
pub use gateway::{Attempt, ModelGateway};
pub use llm::{LlmClient, LlmError, LlmRequest, ResponseFormat};
pub use providers::{GeminiClient, HttpLlmClient};
pub use roles::{
    Agent, AgentRole, Auditor, Draft, DraftRequest, Drafter, Fixer, Repair, RepairRequest,
    SyncRequest, Synced, Syncer, SYNC_SENTINEL,
};
pub use runner::AgentRunner;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

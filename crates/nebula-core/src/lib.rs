//! Nebula Core - Graph/Code Reconciliation Engine
//!
//! Keeps a visual architecture graph and its infrastructure code in step:
//! - Generate: natural-language intent to graph + code
//! - Import: hand-edited code to graph
//! - Audit / Fix: policy findings, node annotation and repair
//! - Sync: graph edits back into code
//! - Relayout: local, deterministic re-arrangement
//!
//! One action runs at a time; graph and code are committed together.
//!
//! # Example
//!
//! ```rust,no_run
//! use nebula_core::{NebulaConfig, ReconciliationEngine};
//! use nebula_agents::ModelGateway;
//! use nebula_graph::CanvasStore;
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = NebulaConfig::default().with_env();
//! let gateway = ModelGateway::from_config(config.gateway)?;
//! let engine = ReconciliationEngine::new(Arc::new(CanvasStore::new()), gateway, config.engine);
//!
//! let report = engine.generate("create an S3 bucket").await?;
//! println!("{} resources, ${}/month", report.resource_count, report.cost.total);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod annotate;
pub mod config;
pub mod cost;
pub mod engine;
pub mod error;
pub mod events;
pub mod request;
pub mod state;

pub use annotate::{FindingAttributor, LabelMatchAttributor};
pub use config::{ConfigError, EngineConfig, NebulaConfig};
pub use cost::CostEstimate;
pub use engine::{Action, ActionReport, ReconciliationEngine, EMPTY_CANVAS_SUMMARY};
pub use error::EngineError;
pub use events::{EngineEvent, NotificationLevel};
pub use request::FixRequest;
pub use state::EnginePhase;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

//! Nebula Graph - the visual half of an architecture
//!
//! Holds everything the reconciliation engine needs to know about the
//! canvas without knowing anything about models or prompts:
//! - Node/edge/finding data model and the three fixed infrastructure nodes
//! - Wire shapes exchanged with generative back-ends
//! - The copy-on-write canvas state store and its user edit operations
//! - A deterministic layered layout
//!
//! # Example
//!
//! ```rust
//! use nebula_graph::{CanvasStore, Direction, LayoutEngine, Position};
//!
//! let store = CanvasStore::new();
//! let vpc = store.drop_resource("vpc", "VPC", Position::default());
//! let ec2 = store.drop_resource("ec2", "EC2 Instance", Position::default());
//! store.connect(&vpc.id, &ec2.id).unwrap();
//!
//! let canvas = store.snapshot();
//! let engine = LayoutEngine::default();
//! let placed = engine.layout(
//!     canvas.resource_nodes().cloned().collect(),
//!     &canvas.resource_edges().cloned().collect::<Vec<_>>(),
//!     Direction::TopBottom,
//! );
//! assert_eq!(placed.len(), 2);
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod canvas;
pub mod error;
pub mod layout;
pub mod model;
pub mod wire;

pub use canvas::{Canvas, CanvasStore, ProjectSnapshot};
pub use error::CanvasError;
pub use layout::{Direction, LayoutConfig, LayoutEngine};
pub use model::{
    is_fixed_edge_id, is_fixed_node_id, CodeDocument, Edge, EngineSelection, Finding, Node,
    NodeData, NodeKind, NodeStatus, Position, PromptData, ResourceData, ResultData, Severity,
    ENGINE_NODE_ID, FIXED_EDGE_IDS, FIXED_NODE_IDS, PROMPT_NODE_ID, RESULT_NODE_ID,
};
pub use wire::{assign_edge_ids, GraphSummary, ResourceGraph, Topology, WireEdge, WireNode};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

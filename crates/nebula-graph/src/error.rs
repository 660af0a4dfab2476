//! Error types for canvas edit operations

/// Errors raised by direct user edits on the canvas
///
/// Agent merges never produce these: inconsistent agent output is
/// filtered silently instead.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CanvasError {
    /// Referenced node does not exist
    #[error("node not found: {0}")]
    NodeNotFound(String),

    /// Fixed infrastructure nodes cannot be deleted or wired by hand
    #[error("fixed infrastructure node cannot be modified: {0}")]
    FixedNode(String),

    /// Scaffolding edges between fixed nodes are immutable
    #[error("fixed scaffolding edge cannot be modified: {0}")]
    FixedEdge(String),

    /// A node cannot depend on itself
    #[error("self loop on node: {0}")]
    SelfLoop(String),
}

//! Core graph types
//!
//! A canvas always contains three fixed infrastructure nodes (prompt,
//! engine selector, result) wired by two scaffolding edges. Everything
//! else is a resource node produced by a user drop or an agent merge.

use serde::{Deserialize, Serialize};

/// Id of the prompt (input) node
pub const PROMPT_NODE_ID: &str = "1";
/// Id of the engine selector node
pub const ENGINE_NODE_ID: &str = "2";
/// Id of the result node, owner of the code document
pub const RESULT_NODE_ID: &str = "3";

/// All fixed infrastructure node ids, in canvas order
pub const FIXED_NODE_IDS: [&str; 3] = [PROMPT_NODE_ID, ENGINE_NODE_ID, RESULT_NODE_ID];

/// Scaffolding edge ids between the fixed nodes
pub const FIXED_EDGE_IDS: [&str; 2] = ["e1-2", "e2-3"];

/// Engine route recorded on a fresh canvas
pub const DEFAULT_ENGINE: &str = "groq-llama";

/// Check whether an id belongs to a fixed infrastructure node
#[inline]
#[must_use]
pub fn is_fixed_node_id(id: &str) -> bool {
    FIXED_NODE_IDS.contains(&id)
}

/// Check whether an id belongs to a scaffolding edge
#[inline]
#[must_use]
pub fn is_fixed_edge_id(id: &str) -> bool {
    FIXED_EDGE_IDS.contains(&id)
}

/// 2-D canvas coordinate (top-left anchor)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    /// Horizontal coordinate
    pub x: f64,
    /// Vertical coordinate
    pub y: f64,
}

impl Position {
    /// Create new position
    #[inline]
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Translate by another position
    #[inline]
    #[must_use]
    pub fn offset_by(self, delta: Position) -> Self {
        Self::new(self.x + delta.x, self.y + delta.y)
    }
}

/// Structural role of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NodeKind {
    /// User prompt
    Input,
    /// Model/route choice
    EngineSelector,
    /// Code document and audit state
    Result,
    /// One cloud resource
    Resource,
}

/// Audit status of a resource node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeStatus {
    /// No finding attributed
    #[default]
    Active,
    /// A finding was attributed to this node
    Error,
}

/// Finding severity
///
/// Parsing is lenient: model output is not trusted to use the exact
/// vocabulary, so unknown levels land on `Warning`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE", from = "String")]
pub enum Severity {
    /// Informational
    Info,
    /// Should be fixed
    Warning,
    /// Must be fixed
    Critical,
}

impl From<String> for Severity {
    fn from(value: String) -> Self {
        match value.trim().to_ascii_uppercase().as_str() {
            "CRITICAL" | "HIGH" | "ERROR" | "SEVERE" => Self::Critical,
            "INFO" | "LOW" | "NOTICE" => Self::Info,
            _ => Self::Warning,
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Info => "INFO",
            Self::Warning => "WARNING",
            Self::Critical => "CRITICAL",
        };
        f.write_str(s)
    }
}

/// One policy-audit output item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    /// Severity level
    pub severity: Severity,
    /// Free-text description
    pub message: String,
}

impl Finding {
    /// Create new finding
    #[inline]
    #[must_use]
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            severity,
            message: message.into(),
        }
    }
}

/// The declarative infrastructure document and its change summary
///
/// Opaque to the engine: always replaced whole, never patched.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CodeDocument {
    /// Document body
    pub content: String,
    /// Human-readable summary of the most recent change
    pub summary: String,
}

impl CodeDocument {
    /// Create new document
    #[inline]
    #[must_use]
    pub fn new(content: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            summary: summary.into(),
        }
    }

    /// Check whether the document has no content
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.content.trim().is_empty()
    }
}

/// Prompt node data
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PromptData {
    /// Last prompt text
    pub text: String,
}

/// Engine selector node data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineSelection {
    /// Selected model route
    pub model: String,
}

impl Default for EngineSelection {
    fn default() -> Self {
        Self {
            model: DEFAULT_ENGINE.to_string(),
        }
    }
}

/// Result node data
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ResultData {
    /// Current code document
    pub code: CodeDocument,
    /// Latest audit findings (replaced wholesale on every audit)
    #[serde(default)]
    pub findings: Vec<Finding>,
    /// Status or failure message shown to the user
    #[serde(default)]
    pub output: String,
}

/// Resource node data
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceData {
    /// Resource name/type (weak type signal for audit matching)
    pub label: String,
    /// Specific service (e.g. `ec2`, `s3`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_type: Option<String>,
    /// Audit status
    #[serde(default)]
    pub status: NodeStatus,
    /// Attributed finding message, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl ResourceData {
    /// Create active resource data
    #[inline]
    #[must_use]
    pub fn new(label: impl Into<String>, service_type: Option<String>) -> Self {
        Self {
            label: label.into(),
            service_type,
            status: NodeStatus::Active,
            error_message: None,
        }
    }

    /// Reset audit annotation
    #[inline]
    pub fn clear_annotation(&mut self) {
        self.status = NodeStatus::Active;
        self.error_message = None;
    }
}

/// Per-kind node payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "camelCase")]
pub enum NodeData {
    /// Prompt node
    Input(PromptData),
    /// Engine selector node
    EngineSelector(EngineSelection),
    /// Result node
    Result(ResultData),
    /// Cloud resource
    Resource(ResourceData),
}

/// A visual element on the canvas
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    /// Unique id within the canvas
    pub id: String,
    /// Kind-specific payload
    #[serde(flatten)]
    pub data: NodeData,
    /// Coordinate, owned by layout or an explicit user drag
    #[serde(default)]
    pub position: Position,
    /// Set when the user dragged the node; partial layouts leave it alone
    #[serde(default)]
    pub user_positioned: bool,
}

impl Node {
    /// Create a resource node at the origin
    #[must_use]
    pub fn resource(
        id: impl Into<String>,
        label: impl Into<String>,
        service_type: Option<String>,
    ) -> Self {
        Self {
            id: id.into(),
            data: NodeData::Resource(ResourceData::new(label, service_type)),
            position: Position::default(),
            user_positioned: false,
        }
    }

    /// The three fixed nodes of a fresh canvas
    #[must_use]
    pub fn fixed_nodes() -> Vec<Node> {
        vec![
            Self::fixed(PROMPT_NODE_ID, NodeData::Input(PromptData::default()), 50.0),
            Self::fixed(
                ENGINE_NODE_ID,
                NodeData::EngineSelector(EngineSelection::default()),
                450.0,
            ),
            Self::fixed(RESULT_NODE_ID, NodeData::Result(ResultData::default()), 900.0),
        ]
    }

    fn fixed(id: &str, data: NodeData, x: f64) -> Self {
        Self {
            id: id.to_string(),
            data,
            position: Position::new(x, 100.0),
            user_positioned: false,
        }
    }

    /// Builder: set position
    #[inline]
    #[must_use]
    pub fn at(mut self, position: Position) -> Self {
        self.position = position;
        self
    }

    /// Structural role
    #[must_use]
    pub fn kind(&self) -> NodeKind {
        match self.data {
            NodeData::Input(_) => NodeKind::Input,
            NodeData::EngineSelector(_) => NodeKind::EngineSelector,
            NodeData::Result(_) => NodeKind::Result,
            NodeData::Resource(_) => NodeKind::Resource,
        }
    }

    /// Display label
    #[must_use]
    pub fn label(&self) -> &str {
        match &self.data {
            NodeData::Input(_) => "Prompt",
            NodeData::EngineSelector(_) => "Engine",
            NodeData::Result(_) => "Result",
            NodeData::Resource(r) => &r.label,
        }
    }

    /// Check whether this is a fixed infrastructure node
    #[inline]
    #[must_use]
    pub fn is_fixed(&self) -> bool {
        is_fixed_node_id(&self.id)
    }

    /// Resource payload, if this is a resource node
    #[inline]
    #[must_use]
    pub fn as_resource(&self) -> Option<&ResourceData> {
        match &self.data {
            NodeData::Resource(r) => Some(r),
            _ => None,
        }
    }

    /// Mutable resource payload
    #[inline]
    pub fn as_resource_mut(&mut self) -> Option<&mut ResourceData> {
        match &mut self.data {
            NodeData::Resource(r) => Some(r),
            _ => None,
        }
    }

    /// Audit status (fixed nodes are always active)
    #[inline]
    #[must_use]
    pub fn status(&self) -> NodeStatus {
        self.as_resource().map_or(NodeStatus::Active, |r| r.status)
    }
}

/// A directed connection between two nodes
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Edge {
    /// Unique id within the canvas
    pub id: String,
    /// Upstream node id
    pub source: String,
    /// Downstream node id
    pub target: String,
}

impl Edge {
    /// Create new edge
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>, source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            target: target.into(),
        }
    }

    /// The two scaffolding edges of a fresh canvas
    #[must_use]
    pub fn fixed_edges() -> Vec<Edge> {
        vec![
            Self::new(FIXED_EDGE_IDS[0], PROMPT_NODE_ID, ENGINE_NODE_ID),
            Self::new(FIXED_EDGE_IDS[1], ENGINE_NODE_ID, RESULT_NODE_ID),
        ]
    }

    /// Check whether this is a scaffolding edge
    #[inline]
    #[must_use]
    pub fn is_fixed(&self) -> bool {
        is_fixed_edge_id(&self.id)
    }
}

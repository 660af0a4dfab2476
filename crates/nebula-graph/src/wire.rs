//! Wire shapes exchanged with generative back-ends
//!
//! Model output is noisy: ids come back as numbers, labels hide under
//! `data`, edges reference nodes that were never emitted. Everything here
//! is lenient on the way in and filters silently on the way to the canvas.

use crate::canvas::Canvas;
use crate::model::{is_fixed_edge_id, is_fixed_node_id, Edge, Node};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashSet;

/// Renderer node types that carry no service information
const RENDERER_TYPES: [&str; 3] = ["default", "cloudNode", "resource"];

/// Label used when a model omits one
const FALLBACK_LABEL: &str = "Resource";

/// Nested node data as emitted by a model
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct WireNodeData {
    /// Label
    #[serde(default)]
    pub label: Option<String>,
    /// Service type
    #[serde(default, rename = "serviceType")]
    pub service_type: Option<String>,
}

/// Node as emitted by a model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireNode {
    /// Node id
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    /// Label
    #[serde(default)]
    pub label: Option<String>,
    /// Renderer or service type
    #[serde(default, rename = "type")]
    pub node_type: Option<String>,
    /// Nested data
    #[serde(default)]
    pub data: Option<WireNodeData>,
}

impl WireNode {
    /// Resolved label: `label`, then `data.label`, then a placeholder
    #[must_use]
    pub fn resolved_label(&self) -> String {
        self.label
            .as_deref()
            .or_else(|| self.data.as_ref().and_then(|d| d.label.as_deref()))
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .unwrap_or(FALLBACK_LABEL)
            .to_string()
    }

    /// Resolved service type: `data.serviceType`, then a non-renderer `type`
    #[must_use]
    pub fn resolved_service_type(&self) -> Option<String> {
        self.data
            .as_ref()
            .and_then(|d| d.service_type.clone())
            .or_else(|| {
                self.node_type
                    .clone()
                    .filter(|t| !RENDERER_TYPES.contains(&t.as_str()))
            })
    }

    /// Convert into a resource node at the origin
    #[must_use]
    pub fn into_node(self) -> Node {
        let label = self.resolved_label();
        let service_type = self.resolved_service_type();
        Node::resource(self.id, label, service_type)
    }
}

/// Edge as emitted by a model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireEdge {
    /// Edge id (synthesized from position when absent)
    #[serde(default, deserialize_with = "optional_string_or_number")]
    pub id: Option<String>,
    /// Upstream node id
    #[serde(alias = "from", deserialize_with = "string_or_number")]
    pub source: String,
    /// Downstream node id
    #[serde(alias = "to", deserialize_with = "string_or_number")]
    pub target: String,
}

/// Give every wire edge an id that no other edge in the list uses
///
/// Supplied ids are kept, first occurrence wins. A missing or repeated id
/// becomes `edge-{index}`, suffixed with `-{n}` while that is taken.
#[must_use]
pub fn assign_edge_ids(edges: Vec<WireEdge>) -> Vec<Edge> {
    let supplied: HashSet<String> = edges.iter().filter_map(|e| e.id.clone()).collect();
    let mut used = HashSet::new();

    edges
        .into_iter()
        .enumerate()
        .map(|(index, e)| {
            let id = match e.id.filter(|id| !used.contains(id)) {
                Some(id) => id,
                None => {
                    let base = format!("edge-{index}");
                    let mut candidate = base.clone();
                    let mut n = 1;
                    while supplied.contains(&candidate) || used.contains(&candidate) {
                        candidate = format!("{base}-{n}");
                        n += 1;
                    }
                    candidate
                }
            };
            used.insert(id.clone());
            Edge::new(id, e.source, e.target)
        })
        .collect()
}

/// Resource nodes and edges extracted from a model response
///
/// Invariants after construction:
/// - no node or edge collides with a fixed id
/// - node ids and edge ids are unique (first occurrence wins)
/// - every edge references two nodes of this graph
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResourceGraph {
    /// Resource nodes, positions unset
    pub nodes: Vec<Node>,
    /// Edges between those nodes
    pub edges: Vec<Edge>,
}

impl ResourceGraph {
    /// Filter a model response into a consistent resource graph
    #[must_use]
    pub fn from_wire(nodes: Vec<WireNode>, edges: Vec<WireEdge>) -> Self {
        let mut seen = HashSet::new();
        let mut discarded = 0usize;
        let nodes: Vec<Node> = nodes
            .into_iter()
            .filter(|n| {
                let keep = !is_fixed_node_id(&n.id) && seen.insert(n.id.clone());
                if !keep {
                    discarded += 1;
                }
                keep
            })
            .map(WireNode::into_node)
            .collect();

        if discarded > 0 {
            tracing::debug!("Discarded {} colliding or duplicate nodes", discarded);
        }

        let edges = Self::filter_edges(assign_edge_ids(edges), &nodes);

        Self { nodes, edges }
    }

    /// Keep only edges that reference known resource nodes
    ///
    /// Drops scaffolding ids, self loops, duplicate ids and dangling edges.
    #[must_use]
    pub fn filter_edges(edges: impl IntoIterator<Item = Edge>, nodes: &[Node]) -> Vec<Edge> {
        let known: HashSet<&str> = nodes.iter().map(|n| n.id.as_str()).collect();
        let mut ids = HashSet::new();
        edges
            .into_iter()
            .filter(|e| {
                !is_fixed_edge_id(&e.id)
                    && e.source != e.target
                    && known.contains(e.source.as_str())
                    && known.contains(e.target.as_str())
                    && ids.insert(e.id.clone())
            })
            .collect()
    }

    /// Check whether the graph has no nodes
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Node entry of a [`GraphSummary`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryNode {
    /// Node id
    pub id: String,
    /// Label
    pub label: String,
    /// Service type, when known
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub node_type: Option<String>,
}

/// Edge entry of a [`GraphSummary`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryEdge {
    /// Upstream node id
    pub source: String,
    /// Downstream node id
    pub target: String,
}

/// Current resource graph as context for the Drafter
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GraphSummary {
    /// Resource nodes
    pub nodes: Vec<SummaryNode>,
    /// Resource edges
    pub edges: Vec<SummaryEdge>,
}

impl GraphSummary {
    /// Summarise the non-fixed part of a canvas
    #[must_use]
    pub fn from_canvas(canvas: &Canvas) -> Self {
        let nodes = canvas
            .resource_nodes()
            .filter_map(|n| {
                n.as_resource().map(|r| SummaryNode {
                    id: n.id.clone(),
                    label: r.label.clone(),
                    node_type: r.service_type.clone(),
                })
            })
            .collect();
        let edges = canvas
            .resource_edges()
            .map(|e| SummaryEdge {
                source: e.source.clone(),
                target: e.target.clone(),
            })
            .collect();
        Self { nodes, edges }
    }

    /// Check whether there is nothing to merge with
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Node entry of a [`Topology`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopologyNode {
    /// Node id
    pub id: String,
    /// Label
    pub label: String,
    /// Service type, `generic` when unknown
    #[serde(rename = "type")]
    pub node_type: String,
}

/// Edge entry of a [`Topology`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopologyEdge {
    /// Upstream node id
    pub from: String,
    /// Downstream node id
    pub to: String,
}

/// Simplified visual topology sent to the Syncer
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Topology {
    /// Resource nodes
    pub nodes: Vec<TopologyNode>,
    /// Resource edges
    pub edges: Vec<TopologyEdge>,
}

impl Topology {
    /// Simplify the non-fixed part of a canvas
    #[must_use]
    pub fn from_canvas(canvas: &Canvas) -> Self {
        let nodes = canvas
            .resource_nodes()
            .filter_map(|n| {
                n.as_resource().map(|r| TopologyNode {
                    id: n.id.clone(),
                    label: r.label.clone(),
                    node_type: r
                        .service_type
                        .clone()
                        .unwrap_or_else(|| "generic".to_string()),
                })
            })
            .collect();
        let edges = canvas
            .resource_edges()
            .map(|e| TopologyEdge {
                from: e.source.clone(),
                to: e.target.clone(),
            })
            .collect();
        Self { nodes, edges }
    }

    /// Check whether the canvas had no resources
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StringOrNumber {
    String(String),
    Int(i64),
    Float(f64),
}

impl From<StringOrNumber> for String {
    fn from(value: StringOrNumber) -> Self {
        match value {
            StringOrNumber::String(s) => s,
            StringOrNumber::Int(i) => i.to_string(),
            StringOrNumber::Float(f) => f.to_string(),
        }
    }
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    StringOrNumber::deserialize(deserializer).map(String::from)
}

fn optional_string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<StringOrNumber>::deserialize(deserializer).map(|v| v.map(String::from))
}

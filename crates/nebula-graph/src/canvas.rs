//! Canvas state store
//!
//! The store is the single shared mutable resource of a session. It holds
//! an immutable [`Canvas`] behind an `Arc`; every mutation builds a new
//! canvas and swaps it in, so readers always see a consistent snapshot and
//! a graph change and a code change made in one update are observed
//! together.

use crate::error::CanvasError;
use crate::model::{
    is_fixed_node_id, CodeDocument, Edge, EngineSelection, Finding, Node, NodeData, Position,
    PromptData, ResultData, ENGINE_NODE_ID, PROMPT_NODE_ID, RESULT_NODE_ID,
};
use crate::wire::ResourceGraph;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use ulid::Ulid;

/// Persisted project shape, consumed and produced by the save/load collaborator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectSnapshot {
    /// Project name
    pub name: String,
    /// All nodes, fixed ones included
    pub nodes: Vec<Node>,
    /// All edges, scaffolding included
    pub edges: Vec<Edge>,
}

/// Immutable view of the canvas
#[derive(Debug, Clone, PartialEq)]
pub struct Canvas {
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    revision: u64,
}

impl Default for Canvas {
    fn default() -> Self {
        Self {
            nodes: Node::fixed_nodes(),
            edges: Edge::fixed_edges(),
            revision: 0,
        }
    }
}

impl Canvas {
    /// Fresh canvas with only the fixed infrastructure
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a canvas from arbitrary parts
    ///
    /// Restores missing fixed nodes/edges, drops duplicate ids and any
    /// edge whose endpoints are unknown.
    #[must_use]
    pub fn from_parts(nodes: Vec<Node>, edges: Vec<Edge>) -> Self {
        let mut seen = HashSet::new();
        let mut all: Vec<Node> = nodes
            .into_iter()
            .filter(|n| seen.insert(n.id.clone()))
            .collect();

        for fixed in Node::fixed_nodes().into_iter().rev() {
            if !seen.contains(&fixed.id) {
                all.insert(0, fixed);
            }
        }

        let mut all_edges = Edge::fixed_edges();
        all_edges.extend(edges.into_iter().filter(|e| !e.is_fixed()));

        let known: HashSet<&str> = all.iter().map(|n| n.id.as_str()).collect();
        let mut edge_ids = HashSet::new();
        let all_edges = all_edges
            .into_iter()
            .filter(|e| {
                known.contains(e.source.as_str())
                    && known.contains(e.target.as_str())
                    && edge_ids.insert(e.id.clone())
            })
            .collect();

        Self {
            nodes: all,
            edges: all_edges,
            revision: 0,
        }
    }

    /// All nodes, fixed first
    #[inline]
    #[must_use]
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// All edges, scaffolding first
    #[inline]
    #[must_use]
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Monotonic revision, bumped on every committed update
    #[inline]
    #[must_use]
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Look up a node by id
    #[must_use]
    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Non-fixed nodes
    pub fn resource_nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter().filter(|n| !n.is_fixed())
    }

    /// Edges between non-fixed nodes
    pub fn resource_edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.iter().filter(|e| {
            !e.is_fixed() && !is_fixed_node_id(&e.source) && !is_fixed_node_id(&e.target)
        })
    }

    /// Number of resource nodes
    #[must_use]
    pub fn resource_count(&self) -> usize {
        self.resource_nodes().count()
    }

    /// Result node data
    #[must_use]
    pub fn result(&self) -> Option<&ResultData> {
        self.node(RESULT_NODE_ID).and_then(|n| match &n.data {
            NodeData::Result(r) => Some(r),
            _ => None,
        })
    }

    /// Current code document body (empty when none)
    #[must_use]
    pub fn code(&self) -> &str {
        self.result().map_or("", |r| r.code.content.as_str())
    }

    /// Latest audit findings
    #[must_use]
    pub fn findings(&self) -> &[Finding] {
        self.result().map_or(&[], |r| r.findings.as_slice())
    }

    /// Last prompt text
    #[must_use]
    pub fn prompt(&self) -> &str {
        self.node(PROMPT_NODE_ID)
            .and_then(|n| match &n.data {
                NodeData::Input(p) => Some(p.text.as_str()),
                _ => None,
            })
            .unwrap_or("")
    }

    /// Selected engine route
    #[must_use]
    pub fn engine(&self) -> Option<&EngineSelection> {
        self.node(ENGINE_NODE_ID).and_then(|n| match &n.data {
            NodeData::EngineSelector(e) => Some(e),
            _ => None,
        })
    }

    /// Copy with every non-fixed node/edge replaced
    ///
    /// Fixed nodes and scaffolding edges are kept untouched; incoming
    /// nodes that collide with a fixed id are ignored and dangling edges
    /// dropped.
    #[must_use]
    pub fn with_resources(&self, nodes: Vec<Node>, edges: Vec<Edge>) -> Self {
        let mut seen = HashSet::new();
        let resources: Vec<Node> = nodes
            .into_iter()
            .filter(|n| !n.is_fixed() && seen.insert(n.id.clone()))
            .collect();
        let resource_edges = ResourceGraph::filter_edges(edges, &resources);

        let mut all: Vec<Node> = self.nodes.iter().filter(|n| n.is_fixed()).cloned().collect();
        all.extend(resources);

        let mut all_edges: Vec<Edge> =
            self.edges.iter().filter(|e| e.is_fixed()).cloned().collect();
        all_edges.extend(resource_edges);

        Self {
            nodes: all,
            edges: all_edges,
            revision: self.revision,
        }
    }

    /// Copy with the result node data rewritten
    #[must_use]
    pub fn with_result(&self, f: impl FnOnce(&mut ResultData)) -> Self {
        let mut next = self.clone();
        if let Some(NodeData::Result(result)) = next
            .nodes
            .iter_mut()
            .find(|n| n.id == RESULT_NODE_ID)
            .map(|n| &mut n.data)
        {
            f(result);
        }
        next
    }

    /// Copy with the code document replaced atomically
    #[must_use]
    pub fn with_code(&self, code: CodeDocument, findings: Vec<Finding>) -> Self {
        self.with_result(|r| {
            r.output = format!("SUMMARY:\n{}\n\nCODE:\n{}", code.summary, code.content);
            r.code = code;
            r.findings = findings;
        })
    }

    /// Copy with the prompt node text replaced
    #[must_use]
    pub fn with_prompt(&self, text: &str) -> Self {
        self.map_nodes(|mut n| {
            if let NodeData::Input(_) = n.data {
                n.data = NodeData::Input(PromptData {
                    text: text.to_string(),
                });
            }
            n
        })
    }

    fn map_nodes(&self, f: impl Fn(Node) -> Node) -> Self {
        Self {
            nodes: self.nodes.iter().cloned().map(f).collect(),
            edges: self.edges.clone(),
            revision: self.revision,
        }
    }

    /// Export as a persistable snapshot
    #[must_use]
    pub fn to_snapshot(&self, name: impl Into<String>) -> ProjectSnapshot {
        ProjectSnapshot {
            name: name.into(),
            nodes: self.nodes.clone(),
            edges: self.edges.clone(),
        }
    }
}

/// Shared canvas store with copy-on-write updates
#[derive(Debug, Default)]
pub struct CanvasStore {
    current: RwLock<Arc<Canvas>>,
}

impl CanvasStore {
    /// Store holding a fresh canvas
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store holding the given canvas
    #[inline]
    #[must_use]
    pub fn from_canvas(canvas: Canvas) -> Self {
        Self {
            current: RwLock::new(Arc::new(canvas)),
        }
    }

    /// Store restored from a persisted snapshot
    #[must_use]
    pub fn restore(snapshot: ProjectSnapshot) -> Self {
        tracing::debug!(
            "Restoring project '{}' ({} nodes, {} edges)",
            snapshot.name,
            snapshot.nodes.len(),
            snapshot.edges.len()
        );
        Self::from_canvas(Canvas::from_parts(snapshot.nodes, snapshot.edges))
    }

    /// Current snapshot (cheap clone of an `Arc`)
    #[inline]
    #[must_use]
    pub fn snapshot(&self) -> Arc<Canvas> {
        Arc::clone(&self.current.read())
    }

    /// Export the current canvas
    #[must_use]
    pub fn export(&self, name: impl Into<String>) -> ProjectSnapshot {
        self.snapshot().to_snapshot(name)
    }

    /// Replace the canvas with `f(current)` in one step
    pub fn update(&self, f: impl FnOnce(&Canvas) -> Canvas) -> Arc<Canvas> {
        let mut guard = self.current.write();
        let mut next = f(&guard);
        next.revision = guard.revision + 1;
        let next = Arc::new(next);
        *guard = Arc::clone(&next);
        next
    }

    /// Like [`update`](Self::update), but `f` may reject the change
    ///
    /// # Errors
    /// Returns whatever `f` returns; the canvas is left untouched.
    pub fn try_update<E>(
        &self,
        f: impl FnOnce(&Canvas) -> Result<Canvas, E>,
    ) -> Result<Arc<Canvas>, E> {
        let mut guard = self.current.write();
        let mut next = f(&guard)?;
        next.revision = guard.revision + 1;
        let next = Arc::new(next);
        *guard = Arc::clone(&next);
        Ok(next)
    }

    /// Connect two resource nodes
    ///
    /// Connecting the same pair twice returns the existing edge.
    ///
    /// # Errors
    /// - `CanvasError::SelfLoop` when source equals target
    /// - `CanvasError::FixedNode` when either end is a fixed node
    /// - `CanvasError::NodeNotFound` when either end is unknown
    pub fn connect(&self, source: &str, target: &str) -> Result<Edge, CanvasError> {
        if source == target {
            return Err(CanvasError::SelfLoop(source.to_string()));
        }
        for id in [source, target] {
            if is_fixed_node_id(id) {
                return Err(CanvasError::FixedNode(id.to_string()));
            }
        }

        let mut created = None;
        self.try_update(|canvas| {
            for id in [source, target] {
                if canvas.node(id).is_none() {
                    return Err(CanvasError::NodeNotFound(id.to_string()));
                }
            }
            if let Some(existing) = canvas
                .edges
                .iter()
                .find(|e| e.source == source && e.target == target)
            {
                created = Some(existing.clone());
                return Ok(canvas.clone());
            }
            let edge = Edge::new(format!("edge-{}", Ulid::new()), source, target);
            let mut next = canvas.clone();
            next.edges.push(edge.clone());
            created = Some(edge);
            Ok(next)
        })?;

        created.ok_or_else(|| CanvasError::NodeNotFound(source.to_string()))
    }

    /// Drop a new resource node at a user-chosen position
    pub fn drop_resource(
        &self,
        service_type: &str,
        label: &str,
        position: Position,
    ) -> Node {
        let node = Node {
            user_positioned: true,
            ..Node::resource(
                format!("{service_type}-{}", Ulid::new()),
                label,
                Some(service_type.to_string()),
            )
            .at(position)
        };
        let added = node.clone();
        self.update(move |canvas| {
            let mut next = canvas.clone();
            next.nodes.push(added);
            next
        });
        node
    }

    /// Move a node by hand; partial layouts will preserve the new position
    ///
    /// # Errors
    /// `CanvasError::NodeNotFound` for unknown ids.
    pub fn move_node(&self, id: &str, position: Position) -> Result<(), CanvasError> {
        self.try_update(|canvas| {
            if canvas.node(id).is_none() {
                return Err(CanvasError::NodeNotFound(id.to_string()));
            }
            Ok(canvas.map_nodes(|n| {
                if n.id == id {
                    Node {
                        position,
                        user_positioned: true,
                        ..n
                    }
                } else {
                    n
                }
            }))
        })
        .map(|_| ())
    }

    /// Delete resource nodes and every edge attached to them
    ///
    /// Unknown ids are ignored. Returns the number of nodes removed.
    ///
    /// # Errors
    /// `CanvasError::FixedNode` if any id is a fixed node; nothing is deleted.
    pub fn delete_nodes(&self, ids: &[&str]) -> Result<usize, CanvasError> {
        if let Some(fixed) = ids.iter().find(|id| is_fixed_node_id(id)) {
            return Err(CanvasError::FixedNode((*fixed).to_string()));
        }
        let doomed: HashSet<&str> = ids.iter().copied().collect();
        let mut removed = 0;
        self.update(|canvas| {
            let nodes: Vec<Node> = canvas
                .nodes
                .iter()
                .filter(|n| !doomed.contains(n.id.as_str()))
                .cloned()
                .collect();
            removed = canvas.nodes.len() - nodes.len();
            let edges = canvas
                .edges
                .iter()
                .filter(|e| {
                    !doomed.contains(e.source.as_str()) && !doomed.contains(e.target.as_str())
                })
                .cloned()
                .collect();
            Canvas {
                nodes,
                edges,
                revision: canvas.revision,
            }
        });
        Ok(removed)
    }

    /// Delete edges by id
    ///
    /// # Errors
    /// `CanvasError::FixedEdge` if any id is a scaffolding edge; nothing is deleted.
    pub fn delete_edges(&self, ids: &[&str]) -> Result<usize, CanvasError> {
        if let Some(fixed) = ids.iter().find(|id| crate::model::is_fixed_edge_id(id)) {
            return Err(CanvasError::FixedEdge((*fixed).to_string()));
        }
        let doomed: HashSet<&str> = ids.iter().copied().collect();
        let mut removed = 0;
        self.update(|canvas| {
            let mut next = canvas.clone();
            next.edges.retain(|e| !doomed.contains(e.id.as_str()));
            removed = canvas.edges.len() - next.edges.len();
            next
        });
        Ok(removed)
    }

    /// Record prompt text on the input node
    pub fn set_prompt(&self, text: &str) {
        self.update(|canvas| canvas.with_prompt(text));
    }

    /// Record the engine route on the selector node
    pub fn select_engine(&self, model: &str) {
        self.update(|canvas| {
            canvas.map_nodes(|mut n| {
                if let NodeData::EngineSelector(_) = n.data {
                    n.data = NodeData::EngineSelector(EngineSelection {
                        model: model.to_string(),
                    });
                }
                n
            })
        });
    }

    /// Set the status message on the result node without touching code
    pub fn set_output(&self, message: &str) {
        self.update(|canvas| canvas.with_result(|r| r.output = message.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NodeKind;

    fn store_with(labels: &[(&str, &str)]) -> CanvasStore {
        let nodes = labels
            .iter()
            .map(|(id, label)| Node::resource(*id, *label, None))
            .collect();
        CanvasStore::from_canvas(Canvas::new().with_resources(nodes, vec![]))
    }

    #[test]
    fn fresh_canvas_has_fixed_infrastructure() {
        let canvas = CanvasStore::new().snapshot();
        assert_eq!(canvas.nodes().len(), 3);
        assert_eq!(canvas.edges().len(), 2);
        assert_eq!(canvas.resource_count(), 0);
        assert_eq!(canvas.code(), "");
        assert_eq!(canvas.engine().unwrap().model, "groq-llama");
    }

    #[test]
    fn connect_rejects_fixed_unknown_and_self() {
        let store = store_with(&[("a", "VPC"), ("b", "EC2")]);

        assert_eq!(store.connect("a", "a"), Err(CanvasError::SelfLoop("a".into())));
        assert_eq!(store.connect("a", "3"), Err(CanvasError::FixedNode("3".into())));
        assert_eq!(
            store.connect("a", "zzz"),
            Err(CanvasError::NodeNotFound("zzz".into()))
        );

        let edge = store.connect("a", "b").unwrap();
        let again = store.connect("a", "b").unwrap();
        assert_eq!(edge, again);
        assert_eq!(store.snapshot().resource_edges().count(), 1);
    }

    #[test]
    fn connect_ids_stay_distinct_for_hyphenated_node_ids() {
        let store = store_with(&[("a-b", "VPC"), ("c", "EC2"), ("a", "RDS"), ("b-c", "S3")]);
        let first = store.connect("a-b", "c").unwrap();
        let second = store.connect("a", "b-c").unwrap();
        assert_ne!(first.id, second.id);

        let restored = CanvasStore::restore(store.export("demo")).snapshot();
        let pairs: Vec<(&str, &str)> = restored
            .resource_edges()
            .map(|e| (e.source.as_str(), e.target.as_str()))
            .collect();
        assert_eq!(pairs, vec![("a-b", "c"), ("a", "b-c")]);
    }

    #[test]
    fn delete_nodes_removes_attached_edges() {
        let store = store_with(&[("a", "VPC"), ("b", "EC2"), ("c", "RDS")]);
        store.connect("a", "b").unwrap();
        store.connect("b", "c").unwrap();

        let removed = store.delete_nodes(&["b", "missing"]).unwrap();
        assert_eq!(removed, 1);

        let canvas = store.snapshot();
        assert_eq!(canvas.resource_count(), 2);
        assert_eq!(canvas.resource_edges().count(), 0);
        assert_eq!(canvas.edges().len(), 2);
    }

    #[test]
    fn fixed_nodes_and_edges_cannot_be_deleted() {
        let store = store_with(&[("a", "VPC")]);
        let before = store.snapshot();

        assert_eq!(
            store.delete_nodes(&["a", "1"]),
            Err(CanvasError::FixedNode("1".into()))
        );
        assert_eq!(
            store.delete_edges(&["e2-3"]),
            Err(CanvasError::FixedEdge("e2-3".into()))
        );
        assert_eq!(*store.snapshot(), *before);
    }

    #[test]
    fn drop_and_move_mark_user_positioned() {
        let store = CanvasStore::new();
        let node = store.drop_resource("s3", "S3 Bucket", Position::new(10.0, 20.0));
        assert!(node.id.starts_with("s3-"));
        assert!(node.user_positioned);

        store.move_node(&node.id, Position::new(5.0, 5.0)).unwrap();
        let moved = store.snapshot().node(&node.id).cloned().unwrap();
        assert_eq!(moved.position, Position::new(5.0, 5.0));
        assert!(moved.user_positioned);

        assert!(store.move_node("nope", Position::default()).is_err());
    }

    #[test]
    fn updates_swap_snapshots() {
        let store = CanvasStore::new();
        let before = store.snapshot();
        store.set_prompt("create an S3 bucket");
        let after = store.snapshot();

        assert_eq!(before.prompt(), "");
        assert_eq!(after.prompt(), "create an S3 bucket");
        assert!(after.revision() > before.revision());
    }

    #[test]
    fn with_resources_keeps_fixed_nodes_untouched() {
        let canvas = Canvas::new();
        let hostile = vec![
            Node::resource("3", "Hijacked", None),
            Node::resource("vpc", "VPC", None),
        ];
        let next = canvas.with_resources(hostile, vec![Edge::new("x", "vpc", "ghost")]);

        assert_eq!(next.node("3").unwrap().kind(), NodeKind::Result);
        assert_eq!(next.resource_count(), 1);
        assert_eq!(next.resource_edges().count(), 0);
    }

    #[test]
    fn restore_repairs_missing_fixed_nodes() {
        let snapshot = ProjectSnapshot {
            name: "demo".into(),
            nodes: vec![Node::resource("vpc", "VPC", None)],
            edges: vec![Edge::new("e", "vpc", "gone")],
        };
        let canvas = CanvasStore::restore(snapshot).snapshot();

        assert_eq!(canvas.nodes().len(), 4);
        assert_eq!(canvas.nodes()[0].id, "1");
        assert_eq!(canvas.edges().len(), 2);
    }

    #[test]
    fn with_code_replaces_document_and_findings() {
        let canvas = Canvas::new().with_code(
            CodeDocument::new("resource \"aws_s3_bucket\" \"b\" {}", "One bucket"),
            vec![Finding::new(crate::model::Severity::Info, "ok")],
        );
        assert!(canvas.code().contains("aws_s3_bucket"));
        assert_eq!(canvas.findings().len(), 1);
        assert!(canvas.result().unwrap().output.contains("One bucket"));
    }
}

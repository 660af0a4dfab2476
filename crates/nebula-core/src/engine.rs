//! Graph/Code Reconciliation Engine
//!
//! Coordinates the agents, merges their output into the canvas and keeps
//! the graph and the code document in step. Every action:
//! 1. takes the busy flag (a second trigger while busy is ignored)
//! 2. awaits the agents without touching the canvas
//! 3. commits graph and code in a single store update
//!
//! A failure leaves the canvas as it was and writes a short message to the
//! result node.

use crate::annotate::{annotate, FindingAttributor, LabelMatchAttributor};
use crate::config::EngineConfig;
use crate::cost::{self, CostEstimate};
use crate::error::EngineError;
use crate::events::{EngineEvent, EventBus, NotificationLevel};
use crate::request::FixRequest;
use crate::state::{EnginePhase, PhaseCell, PhaseGuard};
use nebula_agents::{
    AgentRunner, DraftRequest, ModelGateway, PolicyAuditor, Repair, RepairRequest, SyncRequest,
};
use nebula_graph::{
    Canvas, CanvasStore, CodeDocument, Edge, Finding, GraphSummary, LayoutEngine, Node,
    NodeStatus, ResourceGraph, Topology,
};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Summary written when Sync runs on an empty canvas
pub const EMPTY_CANVAS_SUMMARY: &str = "All resources removed from the visual canvas.";

/// Summary written when imported code is empty
pub const EMPTY_CODE_SUMMARY: &str = "All resources removed from the code.";

/// User-triggered action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// Intent to graph and code
    Generate,
    /// Hand-edited code to graph
    Import,
    /// Policy check of the current code
    Audit,
    /// Repair or resync of the code
    Fix,
    /// Graph to code
    Sync,
    /// Local re-layout
    Relayout,
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Generate => "generate",
            Self::Import => "import",
            Self::Audit => "audit",
            Self::Fix => "fix",
            Self::Sync => "sync",
            Self::Relayout => "relayout",
        };
        f.write_str(s)
    }
}

/// Outcome of a successful action
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionReport {
    /// Action that ran
    pub action: Action,
    /// Change summary of the committed code document
    pub summary: String,
    /// Findings now on the result node
    pub findings: Vec<Finding>,
    /// Resource nodes currently in `error`
    pub flagged_nodes: usize,
    /// Fix was served as a full topology resync
    pub resync_mode: bool,
    /// Canvas revision after the commit
    pub revision: u64,
    /// Resource node count after the commit
    pub resource_count: usize,
    /// Monthly cost estimate of the committed graph
    pub cost: CostEstimate,
}

impl ActionReport {
    fn from_canvas(action: Action, canvas: &Canvas) -> Self {
        let summary = canvas
            .result()
            .map(|r| r.code.summary.clone())
            .unwrap_or_default();
        Self {
            action,
            summary,
            findings: canvas.findings().to_vec(),
            flagged_nodes: canvas
                .resource_nodes()
                .filter(|n| n.status() == NodeStatus::Error)
                .count(),
            resync_mode: false,
            revision: canvas.revision(),
            resource_count: canvas.resource_count(),
            cost: cost::estimate(canvas.resource_nodes()),
        }
    }
}

/// The orchestrator
pub struct ReconciliationEngine {
    store: Arc<CanvasStore>,
    runner: AgentRunner,
    auditor: PolicyAuditor,
    layout: LayoutEngine,
    attributor: Arc<dyn FindingAttributor>,
    config: EngineConfig,
    phase: PhaseCell,
    events: EventBus,
}

impl std::fmt::Debug for ReconciliationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReconciliationEngine")
            .field("phase", &self.phase.get())
            .field("revision", &self.store.snapshot().revision())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ReconciliationEngine {
    /// Create engine over a shared store
    #[must_use]
    pub fn new(store: Arc<CanvasStore>, gateway: ModelGateway, config: EngineConfig) -> Self {
        let runner = AgentRunner::new(gateway);
        Self {
            store,
            auditor: PolicyAuditor::new(runner.clone()),
            runner,
            layout: LayoutEngine::new(config.layout),
            attributor: Arc::new(LabelMatchAttributor),
            config,
            phase: PhaseCell::default(),
            events: EventBus::default(),
        }
    }

    /// Replace the finding attribution strategy
    #[must_use]
    pub fn with_attributor(mut self, attributor: Arc<dyn FindingAttributor>) -> Self {
        self.attributor = attributor;
        self
    }

    /// Shared canvas store
    #[inline]
    #[must_use]
    pub fn store(&self) -> &Arc<CanvasStore> {
        &self.store
    }

    /// Engine settings
    #[inline]
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Current phase
    #[inline]
    #[must_use]
    pub fn phase(&self) -> EnginePhase {
        self.phase.get()
    }

    /// Check whether an action is in flight
    #[inline]
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.phase.get().is_busy()
    }

    /// Receive phase changes and notifications
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }

    // -----------------------------------------------------------------------
    // Actions
    // -----------------------------------------------------------------------

    /// Generate or extend the architecture from a natural-language intent
    ///
    /// # Errors
    /// - [`EngineError::Busy`] when another action is in flight (no-op)
    /// - [`EngineError::EmptyIntent`] for a blank intent (no model call)
    /// - [`EngineError::Agent`] when the Drafter fails
    pub async fn generate(&self, intent: &str) -> Result<ActionReport, EngineError> {
        let guard = self.phase.begin(EnginePhase::Generating, &self.events)?;
        let result = self.run_generate(&guard, intent).await;
        drop(guard);
        self.conclude(Action::Generate, result)
    }

    /// Derive the graph from hand-edited code, keeping the code verbatim
    ///
    /// Empty code removes every resource without a model call.
    ///
    /// # Errors
    /// [`EngineError::Busy`] or [`EngineError::Agent`].
    pub async fn import_code(&self, code: &str) -> Result<ActionReport, EngineError> {
        let guard = self.phase.begin(EnginePhase::Importing, &self.events)?;
        let result = self.run_import(&guard, code).await;
        drop(guard);
        self.conclude(Action::Import, result)
    }

    /// Audit the current code and annotate the graph
    ///
    /// # Errors
    /// [`EngineError::Busy`] or [`EngineError::Agent`].
    pub async fn audit(&self) -> Result<ActionReport, EngineError> {
        let guard = self.phase.begin(EnginePhase::Auditing, &self.events)?;
        let result = self.run_audit(&guard).await;
        drop(guard);
        self.conclude(Action::Audit, result)
    }

    /// Repair the code, or resync it from the topology
    ///
    /// # Errors
    /// - [`EngineError::Busy`] when another action is in flight (no-op)
    /// - [`EngineError::InvalidInput`] when there is no code to repair
    /// - [`EngineError::Agent`] when the Fixer or Syncer fails
    pub async fn fix(&self, request: FixRequest) -> Result<ActionReport, EngineError> {
        let guard = self.phase.begin(EnginePhase::Fixing, &self.events)?;
        let result = match request {
            FixRequest::Repair { findings } => self.run_repair(findings).await,
            FixRequest::Resync => self.run_sync().await.map(|mut report| {
                report.action = Action::Fix;
                report.resync_mode = true;
                report
            }),
        };
        drop(guard);
        self.conclude(Action::Fix, result)
    }

    /// Fix using the current findings on the result node
    ///
    /// # Errors
    /// See [`fix`](Self::fix).
    pub async fn fix_current(&self) -> Result<ActionReport, EngineError> {
        let findings = self.store.snapshot().findings().to_vec();
        self.fix(FixRequest::from_findings(findings)).await
    }

    /// Bring the code in line with a graph the user edited
    ///
    /// # Errors
    /// [`EngineError::Busy`] or [`EngineError::Agent`].
    pub async fn sync(&self) -> Result<ActionReport, EngineError> {
        let guard = self.phase.begin(EnginePhase::Syncing, &self.events)?;
        let result = self.run_sync().await;
        drop(guard);
        self.conclude(Action::Sync, result)
    }

    /// Lay out every resource node again, discarding manual positions
    pub fn relayout(&self) -> ActionReport {
        let direction = self.config.direction;
        let committed = self.store.update(|canvas| {
            let nodes: Vec<Node> = canvas
                .resource_nodes()
                .cloned()
                .map(|n| Node {
                    user_positioned: false,
                    ..n
                })
                .collect();
            let edges: Vec<Edge> = canvas.resource_edges().cloned().collect();
            let nodes = self.layout.layout(nodes, &edges, direction);
            canvas.with_resources(nodes, edges)
        });
        tracing::info!("Re-laid out {} nodes", committed.resource_count());
        ActionReport::from_canvas(Action::Relayout, &committed)
    }

    // -----------------------------------------------------------------------
    // Action bodies
    // -----------------------------------------------------------------------

    async fn run_generate(
        &self,
        guard: &PhaseGuard<'_>,
        intent: &str,
    ) -> Result<ActionReport, EngineError> {
        let intent = intent.trim();
        if intent.is_empty() {
            return Err(EngineError::EmptyIntent);
        }
        tracing::info!("Generating from intent: {}", intent);

        let current = GraphSummary::from_canvas(&self.store.snapshot());
        let draft = self
            .runner
            .draft(&DraftRequest::generate(intent, current))
            .await?;

        guard.advance(EnginePhase::Auditing)?;
        let findings = self.audit_or_empty(&draft.code.content).await;

        guard.advance(EnginePhase::Annotating)?;
        let committed = self.commit_graph(draft.graph, draft.code, findings, Some(intent));
        Ok(ActionReport::from_canvas(Action::Generate, &committed))
    }

    async fn run_import(
        &self,
        guard: &PhaseGuard<'_>,
        code: &str,
    ) -> Result<ActionReport, EngineError> {
        if code.trim().is_empty() {
            tracing::info!("Imported code is empty, clearing the canvas");
            let committed = self.store.update(|canvas| {
                canvas
                    .with_resources(Vec::new(), Vec::new())
                    .with_code(CodeDocument::new("", EMPTY_CODE_SUMMARY), Vec::new())
            });
            return Ok(ActionReport::from_canvas(Action::Import, &committed));
        }

        let current = GraphSummary::from_canvas(&self.store.snapshot());
        let draft = self
            .runner
            .draft(&DraftRequest::import(code, current))
            .await?;

        guard.advance(EnginePhase::Auditing)?;
        let findings = self.audit_or_empty(&draft.code.content).await;

        guard.advance(EnginePhase::Annotating)?;
        let committed = self.commit_graph(draft.graph, draft.code, findings, None);
        Ok(ActionReport::from_canvas(Action::Import, &committed))
    }

    async fn run_audit(&self, guard: &PhaseGuard<'_>) -> Result<ActionReport, EngineError> {
        let code = self.store.snapshot().code().to_string();
        let findings = self.auditor.audit(&code).await?;

        guard.advance(EnginePhase::Annotating)?;
        let attributor = Arc::clone(&self.attributor);
        let committed = self.store.update(move |canvas| {
            let mut nodes: Vec<Node> = canvas.resource_nodes().cloned().collect();
            annotate(&mut nodes, &findings, attributor.as_ref());
            let edges = canvas.resource_edges().cloned().collect();
            canvas
                .with_resources(nodes, edges)
                .with_result(|r| r.findings = findings)
        });
        Ok(ActionReport::from_canvas(Action::Audit, &committed))
    }

    async fn run_repair(&self, findings: Vec<Finding>) -> Result<ActionReport, EngineError> {
        let code = self.store.snapshot().code().to_string();
        if code.trim().is_empty() {
            return Err(EngineError::InvalidInput(
                "There is no code to fix yet.".to_string(),
            ));
        }
        tracing::info!("Repairing code for {} findings", findings.len());

        let repair = self.runner.fix(&RepairRequest { code, findings }).await?;
        let fallback = self.config.fix_fallback_position;
        let committed = self
            .store
            .update(move |canvas| merge_repair(canvas, repair, fallback));
        Ok(ActionReport::from_canvas(Action::Fix, &committed))
    }

    async fn run_sync(&self) -> Result<ActionReport, EngineError> {
        let snapshot = self.store.snapshot();
        let topology = Topology::from_canvas(&snapshot);

        if topology.is_empty() {
            tracing::info!("Canvas is empty, clearing the code document");
            let committed = self.store.update(|canvas| {
                canvas
                    .with_resources(Vec::new(), Vec::new())
                    .with_code(CodeDocument::new("", EMPTY_CANVAS_SUMMARY), Vec::new())
            });
            return Ok(ActionReport::from_canvas(Action::Sync, &committed));
        }

        tracing::info!(
            "Syncing {} nodes and {} edges to code",
            topology.nodes.len(),
            topology.edges.len()
        );
        let request = SyncRequest {
            code: snapshot.code().to_string(),
            topology,
        };
        let synced = self.runner.sync(&request).await?;

        let direction = self.config.direction;
        let committed = self.store.update(|canvas| {
            let (nodes, edges) = match synced.graph {
                Some(graph) if !graph.is_empty() => {
                    (pin_user_positions(canvas, graph.nodes), graph.edges)
                }
                _ => (
                    canvas.resource_nodes().cloned().collect(),
                    canvas.resource_edges().cloned().collect(),
                ),
            };
            let mut nodes = self.layout.arrange(nodes, &edges, direction);
            for resource in nodes.iter_mut().filter_map(Node::as_resource_mut) {
                resource.clear_annotation();
            }
            canvas
                .with_resources(nodes, edges)
                .with_code(synced.code, Vec::new())
        });
        Ok(ActionReport::from_canvas(Action::Sync, &committed))
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    async fn audit_or_empty(&self, code: &str) -> Vec<Finding> {
        match self.auditor.audit(code).await {
            Ok(findings) => findings,
            Err(e) => {
                tracing::warn!("Audit skipped: {}", e);
                Vec::new()
            }
        }
    }

    /// Replace the resource graph and code in one update
    fn commit_graph(
        &self,
        graph: ResourceGraph,
        code: CodeDocument,
        findings: Vec<Finding>,
        prompt: Option<&str>,
    ) -> Arc<Canvas> {
        let direction = self.config.direction;
        self.store.update(|canvas| {
            let ResourceGraph { nodes, edges } = graph;
            let nodes = pin_user_positions(canvas, nodes);
            let mut nodes = self.layout.arrange(nodes, &edges, direction);
            let flagged = annotate(&mut nodes, &findings, self.attributor.as_ref());
            tracing::info!(
                "Committing {} nodes, {} edges, {} flagged",
                nodes.len(),
                edges.len(),
                flagged
            );

            let next = canvas.with_resources(nodes, edges).with_code(code, findings);
            match prompt {
                Some(text) => next.with_prompt(text),
                None => next,
            }
        })
    }

    /// Report success or turn a failure into a user-visible message
    fn conclude(
        &self,
        action: Action,
        result: Result<ActionReport, EngineError>,
    ) -> Result<ActionReport, EngineError> {
        match result {
            Ok(report) => {
                tracing::info!(
                    "{} finished: {} resources, revision {}",
                    action,
                    report.resource_count,
                    report.revision
                );
                let message = match action {
                    Action::Fix if report.resync_mode => "Code re-synced with the canvas.",
                    Action::Fix => "Infrastructure repaired.",
                    Action::Sync => "Code synced with the canvas.",
                    Action::Audit => "Audit complete.",
                    _ => "Architecture updated.",
                };
                self.events.notify(NotificationLevel::Success, message);
                Ok(report)
            }
            Err(e) => {
                tracing::error!("{} failed: {}", action, e);
                let message = e.user_message();
                self.store.set_output(&message);
                self.events.notify(NotificationLevel::Error, message);
                Err(e)
            }
        }
    }
}

/// Carry over positions of nodes the user placed by hand
fn pin_user_positions(canvas: &Canvas, nodes: Vec<Node>) -> Vec<Node> {
    let pinned: HashMap<&str, &Node> = canvas
        .resource_nodes()
        .filter(|n| n.user_positioned)
        .map(|n| (n.id.as_str(), n))
        .collect();

    nodes
        .into_iter()
        .map(|n| match pinned.get(n.id.as_str()) {
            Some(old) => Node {
                position: old.position,
                user_positioned: true,
                ..n
            },
            None => n,
        })
        .collect()
}

/// Merge a Fix response without moving existing nodes
fn merge_repair(canvas: &Canvas, repair: Repair, fallback: nebula_graph::Position) -> Canvas {
    let existing: HashMap<&str, &Node> = canvas
        .resource_nodes()
        .map(|n| (n.id.as_str(), n))
        .collect();

    let nodes: Vec<Node> = match repair.nodes {
        Some(updated) => updated
            .into_iter()
            .map(|mut n| match existing.get(n.id.as_str()) {
                Some(old) => {
                    if let (Some(new), Some(prev)) = (n.as_resource_mut(), old.as_resource()) {
                        if new.service_type.is_none() {
                            new.service_type.clone_from(&prev.service_type);
                        }
                    }
                    Node {
                        position: old.position,
                        user_positioned: old.user_positioned,
                        ..n
                    }
                }
                None => n.at(fallback),
            })
            .collect(),
        None => canvas
            .resource_nodes()
            .cloned()
            .map(|mut n| {
                if let Some(resource) = n.as_resource_mut() {
                    resource.clear_annotation();
                }
                n
            })
            .collect(),
    };

    let edges = repair
        .edges
        .unwrap_or_else(|| canvas.resource_edges().cloned().collect());

    canvas
        .with_resources(nodes, edges)
        .with_code(repair.code, Vec::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use nebula_graph::{Position, Severity};

    fn canvas_with(nodes: Vec<Node>) -> Canvas {
        Canvas::new().with_resources(nodes, Vec::new())
    }

    #[test]
    fn repair_merge_keeps_positions_and_places_new_nodes() {
        let mut sg = Node::resource("sg", "Security Group", Some("sg".to_string()));
        sg.position = Position::new(640.0, 712.0);
        let canvas = canvas_with(vec![sg]);

        let repair = Repair {
            code: CodeDocument::new("fixed", "restricted ingress"),
            nodes: Some(vec![
                Node::resource("sg", "Restricted Security Group", None),
                Node::resource("nacl", "Network ACL", None),
            ]),
            edges: None,
        };
        let merged = merge_repair(&canvas, repair, Position::new(100.0, 450.0));

        let sg = merged.node("sg").unwrap();
        assert_eq!(sg.position, Position::new(640.0, 712.0));
        assert_eq!(sg.label(), "Restricted Security Group");
        assert_eq!(sg.as_resource().unwrap().service_type.as_deref(), Some("sg"));
        assert_eq!(merged.node("nacl").unwrap().position, Position::new(100.0, 450.0));
        assert_eq!(merged.code(), "fixed");
    }

    #[test]
    fn repair_without_nodes_clears_annotations() {
        let mut db = Node::resource("db", "RDS Database", None);
        db.as_resource_mut().unwrap().status = NodeStatus::Error;
        let canvas = canvas_with(vec![db]).with_code(
            CodeDocument::new("old", ""),
            vec![Finding::new(Severity::Critical, "database public")],
        );

        let repair = Repair {
            code: CodeDocument::new("new", "fixed"),
            nodes: None,
            edges: None,
        };
        let merged = merge_repair(&canvas, repair, Position::default());

        assert_eq!(merged.node("db").unwrap().status(), NodeStatus::Active);
        assert!(merged.findings().is_empty());
    }

    #[test]
    fn pinned_positions_survive_regeneration() {
        let mut moved = Node::resource("ec2", "EC2 Instance", None);
        moved.position = Position::new(-40.0, 20.0);
        moved.user_positioned = true;
        let canvas = canvas_with(vec![moved]);

        let nodes = pin_user_positions(
            &canvas,
            vec![
                Node::resource("ec2", "EC2 Instance", None),
                Node::resource("s3", "S3 Bucket", None),
            ],
        );
        assert!(nodes[0].user_positioned);
        assert_eq!(nodes[0].position, Position::new(-40.0, 20.0));
        assert!(!nodes[1].user_positioned);
    }
}

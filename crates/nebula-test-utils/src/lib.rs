//! Testing utilities for Nebula
//!
//! Scripted model back-ends and canned agent responses, so engine tests
//! run without network access.

#![allow(missing_docs)]

use nebula_agents::{AgentRole, GatewayConfig, LlmClient, LlmError, LlmRequest, ModelGateway};
use nebula_graph::{Canvas, CanvasStore, CodeDocument, Edge, Node, Position};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

type Reply = Result<String, LlmError>;

/// Model back-end answering from per-role queues
///
/// The role of a request is recognised from its system instruction. A
/// role whose queue is empty answers with an error, which makes the
/// gateway move on to its next attempt.
#[derive(Debug, Default)]
pub struct ScriptedClient {
    replies: Mutex<HashMap<AgentRole, VecDeque<Reply>>>,
    requests: Mutex<Vec<LlmRequest>>,
    delay: Option<Duration>,
}

impl ScriptedClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a JSON answer for `role`
    pub fn reply(self, role: AgentRole, body: Value) -> Self {
        self.reply_raw(role, body.to_string())
    }

    /// Queue a raw text answer for `role`
    pub fn reply_raw(self, role: AgentRole, raw: impl Into<String>) -> Self {
        self.replies
            .lock()
            .entry(role)
            .or_default()
            .push_back(Ok(raw.into()));
        self
    }

    /// Queue a provider failure for `role`
    pub fn fail(self, role: AgentRole) -> Self {
        self.replies
            .lock()
            .entry(role)
            .or_default()
            .push_back(Err(LlmError::Http("connection refused".to_string())));
        self
    }

    /// Sleep before every answer
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn requests(&self) -> Vec<LlmRequest> {
        self.requests.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().len()
    }

    /// Number of requests sent with `role`'s instruction
    pub fn calls_for(&self, role: AgentRole) -> usize {
        self.requests
            .lock()
            .iter()
            .filter(|r| role_of(r) == Some(role))
            .count()
    }
}

fn role_of(request: &LlmRequest) -> Option<AgentRole> {
    AgentRole::ALL
        .into_iter()
        .find(|role| request.system.starts_with(role.instruction()))
}

#[async_trait::async_trait]
impl LlmClient for ScriptedClient {
    async fn complete(&self, request: LlmRequest) -> Result<String, LlmError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let role = role_of(&request);
        self.requests.lock().push(request);

        let Some(role) = role else {
            return Err(LlmError::Response("unrecognised instruction".to_string()));
        };
        self.replies
            .lock()
            .get_mut(&role)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| Err(LlmError::Response(format!("no scripted reply for {role}"))))
    }
}

/// Gateway with `client` as its only provider
pub fn gateway_with(client: Arc<ScriptedClient>) -> ModelGateway {
    ModelGateway::new(GatewayConfig::default()).with_primary(client)
}

// ---------------------------------------------------------------------------
// Canned responses
// ---------------------------------------------------------------------------

pub fn s3_draft() -> Value {
    json!({
        "summary": "Added an S3 bucket",
        "nodes": [{ "id": "s3", "label": "S3 Bucket", "type": "s3" }],
        "edges": [],
        "codeDocument": "resource \"aws_s3_bucket\" \"main\" {}"
    })
}

pub fn web_stack_draft() -> Value {
    json!({
        "summary": "Web tier with a database",
        "nodes": [
            { "id": "vpc", "label": "VPC", "type": "vpc" },
            { "id": "ec2", "label": "EC2 Instance", "type": "ec2" },
            { "id": "db", "label": "RDS Database", "type": "rds" }
        ],
        "edges": [
            { "source": "vpc", "target": "ec2" },
            { "source": "ec2", "target": "db" }
        ],
        "codeDocument": "resource \"aws_vpc\" \"main\" {}\nresource \"aws_instance\" \"web\" {}\nresource \"aws_db_instance\" \"db\" {}"
    })
}

pub fn audit_with(findings: &[(&str, &str)]) -> Value {
    let findings: Vec<Value> = findings
        .iter()
        .map(|(severity, message)| json!({ "severity": severity, "message": message }))
        .collect();
    json!({ "findings": findings })
}

pub fn clean_audit() -> Value {
    json!({ "findings": [] })
}

pub fn code_only(code: &str, summary: &str) -> Value {
    json!({ "summary": summary, "codeDocument": code })
}

// ---------------------------------------------------------------------------
// Canvas fixtures
// ---------------------------------------------------------------------------

/// Resource node at a given position
pub fn resource_at(id: &str, label: &str, x: f64, y: f64) -> Node {
    Node::resource(id, label, Some(id.to_string())).at(Position::new(x, y))
}

/// Canvas holding `nodes`, `edges` and `code`
pub fn create_test_canvas(nodes: Vec<Node>, edges: Vec<Edge>, code: &str) -> Canvas {
    Canvas::new()
        .with_resources(nodes, edges)
        .with_code(CodeDocument::new(code, "fixture"), Vec::new())
}

pub fn setup_test_store(nodes: Vec<Node>, edges: Vec<Edge>, code: &str) -> Arc<CanvasStore> {
    Arc::new(CanvasStore::from_canvas(create_test_canvas(nodes, edges, code)))
}

/// Store with an EC2 instance wired to a database, already coded
pub fn setup_web_store() -> Arc<CanvasStore> {
    setup_test_store(
        vec![
            resource_at("ec2", "EC2 Instance", 100.0, 450.0),
            resource_at("db", "RDS Database", 100.0, 600.0),
        ],
        vec![Edge::new("e1", "ec2", "db")],
        "resource \"aws_instance\" \"web\" {}\nresource \"aws_db_instance\" \"db\" {}",
    )
}

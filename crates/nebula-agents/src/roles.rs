//! Agent roles
//!
//! Each role pairs a fixed instruction with a typed request payload and a
//! response contract. [`AgentRole`] is the closed set of roles; the unit
//! structs [`Drafter`], [`Auditor`], [`Fixer`] and [`Syncer`] implement
//! [`Agent`] and are dispatched through [`crate::AgentRunner`].

use crate::error::AgentError;
use nebula_graph::{
    assign_edge_ids, CodeDocument, Edge, Finding, GraphSummary, Node, ResourceGraph, Topology,
    WireEdge, WireNode,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Marker a legacy caller puts in a finding message to request a full
/// topology resync instead of a repair
pub const SYNC_SENTINEL: &str = "SYNC_REQUEST";

const DRAFTER_INSTRUCTION: &str = r#"
You are a Cloud Infrastructure Generator (Terraform).
Your goal is to generate Terraform code EXACTLY as requested by the user.

### CRITICAL RULES:
1. VISUALIZE EVERYTHING (MANDATORY):
   - You MUST generate "nodes" AND "edges" for the full topology.
   - EDGES ARE REQUIRED. Do not leave nodes floating. Connect VPC->Subnets->Instances.
   - Example Edge: { "id": "e1", "source": "vpc-1", "target": "subnet-1" }
   - Never use the ids "1", "2" or "3"; they are reserved.
2. MERGE, DO NOT OVERWRITE:
   - When a CURRENT STATE is given, keep every existing resource and its id
     unless the request explicitly replaces or removes it.
3. CODE FORMAT (STRICT):
   - Return a valid HCL string with newlines escaped.
   - NO JSON objects in the "codeDocument" field.

### LABELING RULES:
- VPC -> "VPC"
- Subnet -> "Public Subnet" / "Private Subnet"
- EC2 -> "EC2 Instance"
- RDS -> "RDS Database"
- Internet Gateway -> "Internet Gateway"
- Security Group -> "Security Group"

### OUTPUT FORMAT (JSON ONLY):
{
  "summary": "Brief description.",
  "nodes": [ { "id": "vpc-1", "label": "VPC", "data": { "serviceType": "vpc" } } ],
  "edges": [ { "id": "e1", "source": "vpc-1", "target": "subnet-1" } ],
  "codeDocument": "resource \"aws_vpc\" \"main\" {\n  cidr_block = \"10.0.0.0/16\"\n}"
}
"#;

const AUDITOR_INSTRUCTION: &str = r#"
You are an AWS Security & Compliance Auditor.
Your ONLY job is to find risks in Terraform code. Never rewrite the code.

### AUDIT CHECKLIST:
1. COST TRAP: 'instance_type' containing "xlarge", "2xlarge", "metal" or "gpu" -> CRITICAL cost issue.
2. OPEN ACCESS: '0.0.0.0/0' in ingress rules -> CRITICAL security risk.
   'publicly_accessible = true' on a database -> CRITICAL.
3. PUBLIC BUCKETS: aws_s3_bucket with acl "public-read" or "public-read-write",
   or a policy allowing "Principal": "*" -> CRITICAL data leak risk.
4. RELIABILITY: hardcoded "availability_zone" (e.g. "us-west-2a") -> WARNING single point of failure.

Name the affected resource in every message.

### OUTPUT FORMAT (JSON ONLY):
{
  "findings": [
    { "severity": "CRITICAL", "message": "Security Risk: S3 Bucket 'my-bucket' allows public-read access." },
    { "severity": "WARNING", "message": "Reliability Risk: Database is pinned to a single AZ." }
  ]
}
If no issues are found, return { "findings": [] }
"#;

const FIXER_INSTRUCTION: &str = r#"
You are a Senior DevOps Engineer & Security Expert.
Your task is to FIX the provided Terraform code so that every audit finding is resolved.

### RULES:
1. Restrict open ingress (0.0.0.0/0 -> 10.0.0.0/16).
2. Make public S3 buckets private.
3. Keep every resource that is not part of a finding exactly as it is.
4. Do not invent new resources unless a fix requires one.

### OUTPUT FORMAT (JSON ONLY):
{
  "summary": "Restricted SSH ingress and made the bucket private.",
  "codeDocument": "..."
}
"#;

const SYNCER_INSTRUCTION: &str = r#"
You are a Terraform Synchronization Engine.
Your goal is to UPDATE existing Terraform code to match a new visual topology.

### INPUTS:
1. CURRENT CODE: existing Terraform HCL.
2. VISUAL NODES: list of resources.
3. VISUAL EDGES: connections (e.g. EC2 -> RDS).

### CRITICAL RULES:
1. NO DUPLICATES: if a resource (e.g. "aws_instance.main") exists, UPDATE it. Do NOT create a copy.
2. ADD resources present in the topology but missing from the code.
   REMOVE resources present in the code but missing from the topology.
   Do NOT touch unrelated blocks (providers, variables).
3. CONNECTIONS: for each visual edge add the security group rules it implies and
   tag the source: tags = { Nebula_Connect = "TARGET_NAME" }
4. Return ONLY valid HCL inside the JSON. No markdown.

### OUTPUT FORMAT (JSON ONLY):
{
  "summary": "Brief summary of changes...",
  "codeDocument": "resource \"aws_instance\" \"...\" { ... }"
}
"#;

/// The four agent roles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AgentRole {
    /// Intent to full graph and code
    Drafter,
    /// Read-only policy check
    Auditor,
    /// Code repair from findings
    Fixer,
    /// Graph to code synchronisation
    Syncer,
}

impl AgentRole {
    /// All roles
    pub const ALL: [AgentRole; 4] = [Self::Drafter, Self::Auditor, Self::Fixer, Self::Syncer];

    /// Log tag
    #[inline]
    #[must_use]
    pub fn tag(self) -> &'static str {
        match self {
            Self::Drafter => "DRAFTER",
            Self::Auditor => "AUDITOR",
            Self::Fixer => "FIXER",
            Self::Syncer => "SYNC",
        }
    }

    /// Human-facing name
    #[must_use]
    pub fn display_name(self) -> &'static str {
        match self {
            Self::Drafter => "The drafting agent",
            Self::Auditor => "The policy auditor",
            Self::Fixer => "The repair agent",
            Self::Syncer => "The sync agent",
        }
    }

    /// System instruction
    #[must_use]
    pub fn instruction(self) -> &'static str {
        let text = match self {
            Self::Drafter => DRAFTER_INSTRUCTION,
            Self::Auditor => AUDITOR_INSTRUCTION,
            Self::Fixer => FIXER_INSTRUCTION,
            Self::Syncer => SYNCER_INSTRUCTION,
        };
        text.trim()
    }
}

impl std::fmt::Display for AgentRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}

/// A role with a typed request and a validated response
pub trait Agent {
    /// Role implemented
    const ROLE: AgentRole;
    /// Request
    type Input: ?Sized;
    /// Raw parsed response
    type Response: DeserializeOwned;
    /// Validated result
    type Output;

    /// Build the user payload
    fn payload(input: &Self::Input) -> String;

    /// Check the response contract and build the output
    ///
    /// # Errors
    /// Returns [`AgentError::ContractViolation`] when a required field is
    /// missing or blank.
    fn finish(input: &Self::Input, response: Self::Response) -> Result<Self::Output, AgentError>;
}

fn required_code(role: AgentRole, code: Option<String>) -> Result<String, AgentError> {
    code.filter(|c| !c.trim().is_empty())
        .ok_or_else(|| AgentError::contract(role, "missing codeDocument"))
}

// ---------------------------------------------------------------------------
// Drafter
// ---------------------------------------------------------------------------

/// Drafter request
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DraftRequest {
    /// Natural-language intent
    pub intent: String,
    /// Current resource graph, for merging
    pub current: GraphSummary,
    /// User-edited code to derive the graph from; kept verbatim
    pub code: Option<String>,
}

impl DraftRequest {
    /// Request a new or merged architecture
    #[must_use]
    pub fn generate(intent: impl Into<String>, current: GraphSummary) -> Self {
        Self {
            intent: intent.into(),
            current,
            code: None,
        }
    }

    /// Request the graph matching hand-edited code
    #[must_use]
    pub fn import(code: impl Into<String>, current: GraphSummary) -> Self {
        Self {
            intent: String::new(),
            current,
            code: Some(code.into()),
        }
    }
}

/// Drafter response as parsed
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DraftResponse {
    /// Change summary
    #[serde(default)]
    pub summary: Option<String>,
    /// Resource nodes
    #[serde(default)]
    pub nodes: Option<Vec<WireNode>>,
    /// Resource edges
    #[serde(default)]
    pub edges: Option<Vec<WireEdge>>,
    /// Code document
    #[serde(default, rename = "codeDocument", alias = "terraformCode", alias = "terraform_code")]
    pub code_document: Option<String>,
}

/// Validated Drafter output
#[derive(Debug, Clone, PartialEq)]
pub struct Draft {
    /// Filtered resource graph (fixed-id collisions removed)
    pub graph: ResourceGraph,
    /// New code document
    pub code: CodeDocument,
}

/// Drafter role
#[derive(Debug, Clone, Copy)]
pub struct Drafter;

impl Agent for Drafter {
    const ROLE: AgentRole = AgentRole::Drafter;
    type Input = DraftRequest;
    type Response = DraftResponse;
    type Output = Draft;

    fn payload(input: &DraftRequest) -> String {
        let mut payload = match &input.code {
            Some(code) => format!(
                "The user edited the code directly. Derive the visual topology from it.\n\
                 Return nodes and edges for every resource. Echo the code unchanged.\n\n\
                 ### CODE:\n{code}"
            ),
            None => format!("User Request: \"{}\"", input.intent),
        };

        if input.current.is_empty() {
            payload.push_str("\n\nStart from scratch.");
        } else {
            let context = serde_json::to_string(&input.current).unwrap_or_default();
            payload.push_str("\n\nCURRENT STATE (Merge new resources with these, keep their ids):\n");
            payload.push_str(&context);
        }
        payload
    }

    fn finish(input: &DraftRequest, response: DraftResponse) -> Result<Draft, AgentError> {
        let nodes = response
            .nodes
            .ok_or_else(|| AgentError::contract(Self::ROLE, "missing nodes"))?;
        let graph = ResourceGraph::from_wire(nodes, response.edges.unwrap_or_default());
        let summary = response.summary.unwrap_or_default();

        let content = match &input.code {
            Some(code) => code.clone(),
            None => required_code(Self::ROLE, response.code_document)?,
        };

        Ok(Draft {
            graph,
            code: CodeDocument::new(content, summary),
        })
    }
}

// ---------------------------------------------------------------------------
// Auditor
// ---------------------------------------------------------------------------

/// Auditor response as parsed
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuditResponse {
    /// Findings
    #[serde(default, alias = "auditReport", alias = "audit_report")]
    pub findings: Option<Vec<Finding>>,
}

/// Auditor role
#[derive(Debug, Clone, Copy)]
pub struct Auditor;

impl Agent for Auditor {
    const ROLE: AgentRole = AgentRole::Auditor;
    type Input = str;
    type Response = AuditResponse;
    type Output = Vec<Finding>;

    fn payload(code: &str) -> String {
        format!("AUDIT THIS TERRAFORM CODE:\n\n{code}")
    }

    fn finish(_code: &str, response: AuditResponse) -> Result<Vec<Finding>, AgentError> {
        response
            .findings
            .ok_or_else(|| AgentError::contract(Self::ROLE, "missing findings"))
    }
}

// ---------------------------------------------------------------------------
// Fixer
// ---------------------------------------------------------------------------

/// Fixer request
#[derive(Debug, Clone, PartialEq)]
pub struct RepairRequest {
    /// Code to repair
    pub code: String,
    /// Findings to resolve
    pub findings: Vec<Finding>,
}

/// Fixer response as parsed
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FixResponse {
    /// Change summary
    #[serde(default)]
    pub summary: Option<String>,
    /// Repaired code
    #[serde(default, rename = "codeDocument", alias = "terraformCode", alias = "terraform_code")]
    pub code_document: Option<String>,
    /// Optional updated node list
    #[serde(default)]
    pub nodes: Option<Vec<WireNode>>,
    /// Optional updated edge list
    #[serde(default)]
    pub edges: Option<Vec<WireEdge>>,
}

/// Validated Fixer output
#[derive(Debug, Clone, PartialEq)]
pub struct Repair {
    /// Repaired code
    pub code: CodeDocument,
    /// Node updates, when the model sent any (fixed ids removed)
    pub nodes: Option<Vec<Node>>,
    /// Edge list, when the model sent one (not yet filtered)
    pub edges: Option<Vec<Edge>>,
}

/// Fixer role
#[derive(Debug, Clone, Copy)]
pub struct Fixer;

impl Agent for Fixer {
    const ROLE: AgentRole = AgentRole::Fixer;
    type Input = RepairRequest;
    type Response = FixResponse;
    type Output = Repair;

    fn payload(input: &RepairRequest) -> String {
        let report = serde_json::to_string(&input.findings).unwrap_or_default();
        format!(
            "### CURRENT TERRAFORM CODE:\n{}\n\n\
             ### AUDIT REPORT (ISSUES TO FIX):\n{}\n\n\
             Please rewrite the code to fix these issues. Return valid JSON only.",
            input.code, report
        )
    }

    fn finish(_input: &RepairRequest, response: FixResponse) -> Result<Repair, AgentError> {
        let content = required_code(Self::ROLE, response.code_document)?;
        let nodes = response
            .nodes
            .map(|nodes| ResourceGraph::from_wire(nodes, Vec::new()).nodes);
        Ok(Repair {
            code: CodeDocument::new(content, response.summary.unwrap_or_default()),
            nodes,
            edges: response.edges.map(assign_edge_ids),
        })
    }
}

// ---------------------------------------------------------------------------
// Syncer
// ---------------------------------------------------------------------------

/// Syncer request
#[derive(Debug, Clone, PartialEq)]
pub struct SyncRequest {
    /// Current code
    pub code: String,
    /// Simplified visual topology
    pub topology: Topology,
}

/// Syncer response as parsed
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SyncResponse {
    /// Change summary
    #[serde(default)]
    pub summary: Option<String>,
    /// Synchronised code
    #[serde(default, rename = "codeDocument", alias = "terraformCode", alias = "terraform_code")]
    pub code_document: Option<String>,
    /// Optional restructured node list
    #[serde(default)]
    pub nodes: Option<Vec<WireNode>>,
    /// Optional restructured edge list
    #[serde(default)]
    pub edges: Option<Vec<WireEdge>>,
}

/// Validated Syncer output
#[derive(Debug, Clone, PartialEq)]
pub struct Synced {
    /// Synchronised code
    pub code: CodeDocument,
    /// Restructured graph, when the model sent one
    pub graph: Option<ResourceGraph>,
}

/// Syncer role
#[derive(Debug, Clone, Copy)]
pub struct Syncer;

impl Agent for Syncer {
    const ROLE: AgentRole = AgentRole::Syncer;
    type Input = SyncRequest;
    type Response = SyncResponse;
    type Output = Synced;

    fn payload(input: &SyncRequest) -> String {
        let code = if input.code.trim().is_empty() {
            "# No existing code"
        } else {
            input.code.as_str()
        };
        let nodes = serde_json::to_string_pretty(&input.topology.nodes).unwrap_or_default();
        let edges = serde_json::to_string_pretty(&input.topology.edges).unwrap_or_default();
        format!(
            "### CURRENT TERRAFORM CODE:\n{code}\n\n\
             ### NEW VISUAL TOPOLOGY:\nNodes: {nodes}\nEdges: {edges}\n\n\
             Please SYNC the Terraform code. Return raw JSON only."
        )
    }

    fn finish(_input: &SyncRequest, response: SyncResponse) -> Result<Synced, AgentError> {
        let content = required_code(Self::ROLE, response.code_document)?;
        let graph = response
            .nodes
            .map(|nodes| ResourceGraph::from_wire(nodes, response.edges.unwrap_or_default()));
        Ok(Synced {
            code: CodeDocument::new(content, response.summary.unwrap_or_default()),
            graph,
        })
    }
}

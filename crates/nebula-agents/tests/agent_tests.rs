//! Agent Runner Tests
//!
//! Role dispatch, contract validation and the auditor short-circuit,
//! driven through a mocked provider.

use mockall::mock;
use mockall::predicate::function;
use nebula_agents::{
    AgentError, AgentRole, AgentRunner, DraftRequest, GatewayConfig, LlmClient, LlmError,
    LlmRequest, ModelGateway, PolicyAuditor, RepairRequest, SyncRequest,
};
use nebula_graph::{Finding, GraphSummary, Severity, Topology};
use std::sync::Arc;

mock! {
    pub Provider {}

    #[async_trait::async_trait]
    impl LlmClient for Provider {
        async fn complete(&self, request: LlmRequest) -> Result<String, LlmError>;
    }
}

fn runner(primary: MockProvider) -> AgentRunner {
    AgentRunner::new(ModelGateway::new(GatewayConfig::default()).with_primary(Arc::new(primary)))
}

fn answering(body: &'static str) -> MockProvider {
    let mut provider = MockProvider::new();
    provider
        .expect_complete()
        .returning(move |_| Ok(body.to_string()));
    provider
}

#[tokio::test]
async fn test_draft_uses_drafter_instruction() {
    let mut provider = MockProvider::new();
    provider
        .expect_complete()
        .with(function(|r: &LlmRequest| {
            r.system.contains("Cloud Infrastructure Generator")
                && r.user.contains("create an S3 bucket")
        }))
        .times(1)
        .returning(|_| {
            Ok(r#"{"summary":"one bucket","nodes":[{"id":"s3-1","label":"S3 Bucket"}],
                  "edges":[],"codeDocument":"resource \"aws_s3_bucket\" \"b\" {}"}"#
                .to_string())
        });

    let draft = runner(provider)
        .draft(&DraftRequest::generate("create an S3 bucket", GraphSummary::default()))
        .await
        .unwrap();

    assert_eq!(draft.graph.nodes.len(), 1);
    assert_eq!(draft.code.summary, "one bucket");
}

#[tokio::test]
async fn test_exhausted_gateway_is_no_response() {
    let mut provider = MockProvider::new();
    provider
        .expect_complete()
        .times(2)
        .returning(|_| Err(LlmError::Http("connection refused".to_string())));

    let err = runner(provider)
        .fix(&RepairRequest {
            code: "x".to_string(),
            findings: Vec::new(),
        })
        .await
        .unwrap_err();

    assert_eq!(err, AgentError::NoResponse { role: AgentRole::Fixer });
}

#[tokio::test]
async fn test_wrong_shape_is_contract_violation() {
    let err = runner(answering(r#"{"nodes": "not a list", "codeDocument": "x"}"#))
        .draft(&DraftRequest::generate("x", GraphSummary::default()))
        .await
        .unwrap_err();
    assert!(matches!(err, AgentError::ContractViolation { role: AgentRole::Drafter, .. }));

    let err = runner(answering(r#"{"summary": "no code"}"#))
        .sync(&SyncRequest {
            code: "x".to_string(),
            topology: Topology::default(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, AgentError::ContractViolation { role: AgentRole::Syncer, .. }));
}

#[tokio::test]
async fn test_auditor_skips_blank_code() {
    let mut provider = MockProvider::new();
    provider.expect_complete().never();

    let auditor = PolicyAuditor::new(runner(provider));
    assert!(auditor.audit("").await.unwrap().is_empty());
    assert!(auditor.audit("  \n ").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_auditor_returns_findings() {
    let auditor = PolicyAuditor::new(runner(answering(
        r#"{"auditReport":[{"severity":"CRITICAL","message":"Database allows public access"}]}"#,
    )));

    let findings = auditor.audit("resource \"aws_db_instance\" \"db\" {}").await.unwrap();
    assert_eq!(
        findings,
        vec![Finding::new(Severity::Critical, "Database allows public access")]
    );
}

//! Reconciliation Engine Tests

use nebula_agents::{AgentError, AgentRole};
use nebula_core::{
    Action, EngineConfig, EngineError, EngineEvent, EnginePhase, FixRequest, NotificationLevel,
    ReconciliationEngine, EMPTY_CANVAS_SUMMARY,
};
use nebula_graph::{
    CanvasStore, Finding, NodeKind, NodeStatus, Position, Severity, ENGINE_NODE_ID, RESULT_NODE_ID,
};
use nebula_test_utils::{
    audit_with, clean_audit, code_only, gateway_with, resource_at, s3_draft, setup_test_store,
    setup_web_store, web_stack_draft, ScriptedClient,
};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

fn engine(store: Arc<CanvasStore>, client: &Arc<ScriptedClient>) -> ReconciliationEngine {
    ReconciliationEngine::new(store, gateway_with(Arc::clone(client)), EngineConfig::default())
}

fn fresh_engine(client: &Arc<ScriptedClient>) -> ReconciliationEngine {
    engine(Arc::new(CanvasStore::new()), client)
}

// ---------------------------------------------------------------------------
// Generate
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_generate_single_bucket() {
    let client = Arc::new(
        ScriptedClient::new()
            .reply(AgentRole::Drafter, s3_draft())
            .reply(AgentRole::Auditor, clean_audit()),
    );
    let engine = fresh_engine(&client);

    let report = engine.generate("create an S3 bucket").await.unwrap();

    assert_eq!(report.action, Action::Generate);
    assert_eq!(report.resource_count, 1);
    assert_eq!(report.summary, "Added an S3 bucket");
    assert_eq!(report.cost.total, 2.5);
    assert_eq!(client.calls_for(AgentRole::Drafter), 1);
    assert_eq!(client.calls_for(AgentRole::Auditor), 1);

    let canvas = engine.store().snapshot();
    assert!(canvas.code().contains("aws_s3_bucket"));
    assert_eq!(canvas.prompt(), "create an S3 bucket");
    let bucket = canvas.node("s3").unwrap();
    assert_eq!(bucket.status(), NodeStatus::Active);
    assert!(bucket.position.x >= 100.0 && bucket.position.y >= 450.0);
    assert_eq!(engine.phase(), EnginePhase::Idle);
}

#[tokio::test]
async fn test_generate_flags_public_database() {
    let client = Arc::new(
        ScriptedClient::new()
            .reply(AgentRole::Drafter, web_stack_draft())
            .reply(
                AgentRole::Auditor,
                audit_with(&[("CRITICAL", "Database allows public access")]),
            ),
    );
    let engine = fresh_engine(&client);

    let report = engine.generate("web server with a database").await.unwrap();

    assert_eq!(report.flagged_nodes, 1);
    assert_eq!(report.findings.len(), 1);
    assert_eq!(report.findings[0].severity, Severity::Critical);

    let canvas = engine.store().snapshot();
    let db = canvas.node("db").unwrap().as_resource().unwrap();
    assert_eq!(db.status, NodeStatus::Error);
    assert_eq!(db.error_message.as_deref(), Some("Database allows public access"));
    assert_eq!(canvas.node("ec2").unwrap().status(), NodeStatus::Active);
    assert_eq!(canvas.node("vpc").unwrap().status(), NodeStatus::Active);
}

#[tokio::test]
async fn test_generate_cannot_touch_fixed_nodes() {
    let mut draft = s3_draft();
    draft["nodes"]
        .as_array_mut()
        .unwrap()
        .push(json!({ "id": ENGINE_NODE_ID, "label": "Hijacked" }));
    let client = Arc::new(
        ScriptedClient::new()
            .reply(AgentRole::Drafter, draft)
            .reply(AgentRole::Auditor, clean_audit()),
    );
    let engine = fresh_engine(&client);
    let before = engine.store().snapshot();

    let report = engine.generate("bucket please").await.unwrap();

    let after = engine.store().snapshot();
    assert_eq!(report.resource_count, 1);
    assert_eq!(after.node(ENGINE_NODE_ID), before.node(ENGINE_NODE_ID));
}

#[tokio::test]
async fn test_generate_continues_when_audit_fails() {
    let client = Arc::new(ScriptedClient::new().reply(AgentRole::Drafter, s3_draft()));
    let engine = fresh_engine(&client);

    let report = engine.generate("create an S3 bucket").await.unwrap();

    assert_eq!(report.resource_count, 1);
    assert!(report.findings.is_empty());
    // strict and permissive attempts on the only provider
    assert_eq!(client.calls_for(AgentRole::Auditor), 2);
}

#[tokio::test]
async fn test_failed_generate_leaves_canvas_untouched() {
    let client = Arc::new(ScriptedClient::new());
    let store = setup_web_store();
    let engine = engine(Arc::clone(&store), &client);
    let before = store.snapshot();

    let err = engine.generate("add a queue").await.unwrap_err();

    assert_eq!(
        err,
        EngineError::Agent(AgentError::NoResponse {
            role: AgentRole::Drafter
        })
    );
    let after = store.snapshot();
    assert_eq!(after.code(), before.code());
    assert_eq!(
        after.resource_nodes().collect::<Vec<_>>(),
        before.resource_nodes().collect::<Vec<_>>()
    );
    assert_eq!(
        after.resource_edges().collect::<Vec<_>>(),
        before.resource_edges().collect::<Vec<_>>()
    );
    assert_eq!(after.result().unwrap().output, err.user_message());
    assert_eq!(engine.phase(), EnginePhase::Idle);
}

#[tokio::test]
async fn test_blank_intent_makes_no_call() {
    let client = Arc::new(ScriptedClient::new());
    let engine = fresh_engine(&client);

    let err = engine.generate("   \n").await.unwrap_err();

    assert_eq!(err, EngineError::EmptyIntent);
    assert_eq!(client.call_count(), 0);
    assert_eq!(engine.phase(), EnginePhase::Idle);
}

#[tokio::test]
async fn test_second_trigger_while_busy_is_ignored() {
    let client = Arc::new(
        ScriptedClient::new()
            .reply(AgentRole::Drafter, s3_draft())
            .reply(AgentRole::Auditor, clean_audit())
            .with_delay(Duration::from_millis(100)),
    );
    let engine = fresh_engine(&client);

    let (first, second) = tokio::join!(engine.generate("create an S3 bucket"), async {
        tokio::time::sleep(Duration::from_millis(20)).await;
        engine.sync().await
    });

    assert!(first.is_ok());
    assert_eq!(second.unwrap_err(), EngineError::Busy(EnginePhase::Generating));
    assert_eq!(client.calls_for(AgentRole::Syncer), 0);
    assert_eq!(engine.store().snapshot().code(), "resource \"aws_s3_bucket\" \"main\" {}");
}

// ---------------------------------------------------------------------------
// Import
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_import_keeps_code_verbatim() {
    let code = "# hand edited\nresource \"aws_vpc\" \"main\" {}";
    let mut draft = web_stack_draft();
    draft["codeDocument"] = json!("reformatted by the model");
    let client = Arc::new(
        ScriptedClient::new()
            .reply(AgentRole::Drafter, draft)
            .reply(AgentRole::Auditor, clean_audit()),
    );
    let engine = fresh_engine(&client);

    let report = engine.import_code(code).await.unwrap();

    assert_eq!(report.action, Action::Import);
    assert_eq!(report.resource_count, 3);
    assert_eq!(engine.store().snapshot().code(), code);
    assert!(client.requests()[0].user.contains("# hand edited"));
}

#[tokio::test]
async fn test_import_of_empty_code_clears_resources() {
    let client = Arc::new(ScriptedClient::new());
    let engine = engine(setup_web_store(), &client);

    let report = engine.import_code("  ").await.unwrap();

    assert_eq!(report.resource_count, 0);
    assert_eq!(engine.store().snapshot().code(), "");
    assert_eq!(client.call_count(), 0);
}

// ---------------------------------------------------------------------------
// Audit / Fix
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_audit_annotates_without_rewriting_code() {
    let client = Arc::new(ScriptedClient::new().reply(
        AgentRole::Auditor,
        audit_with(&[("HIGH", "Database allows public access")]),
    ));
    let engine = engine(setup_web_store(), &client);
    let code_before = engine.store().snapshot().code().to_string();

    let report = engine.audit().await.unwrap();

    assert_eq!(report.flagged_nodes, 1);
    let canvas = engine.store().snapshot();
    assert_eq!(canvas.code(), code_before);
    assert_eq!(canvas.node("db").unwrap().status(), NodeStatus::Error);
    assert_eq!(canvas.findings().len(), 1);
}

#[tokio::test]
async fn test_fix_keeps_existing_positions() {
    let client = Arc::new(ScriptedClient::new().reply(
        AgentRole::Fixer,
        json!({
            "summary": "Made the database private",
            "codeDocument": "resource \"aws_db_instance\" \"db\" { publicly_accessible = false }",
            "nodes": [
                { "id": "ec2", "label": "EC2 Instance" },
                { "id": "db", "label": "RDS Database" },
                { "id": "kms", "label": "KMS Key" }
            ]
        }),
    ));
    let engine = engine(setup_web_store(), &client);
    let findings = vec![Finding::new(Severity::Critical, "Database allows public access")];

    let report = engine.fix(FixRequest::from_findings(findings)).await.unwrap();

    assert!(!report.resync_mode);
    assert!(report.findings.is_empty());
    let canvas = engine.store().snapshot();
    assert_eq!(canvas.node("ec2").unwrap().position, Position::new(100.0, 450.0));
    assert_eq!(canvas.node("db").unwrap().position, Position::new(100.0, 600.0));
    assert_eq!(canvas.node("kms").unwrap().position, Position::new(100.0, 450.0));
    assert!(canvas.code().contains("publicly_accessible = false"));
    // edges were not returned, so the old ones stay
    assert_eq!(canvas.resource_edges().count(), 1);
}

#[tokio::test]
async fn test_sync_sentinel_routes_fix_to_syncer() {
    let client = Arc::new(
        ScriptedClient::new().reply(AgentRole::Syncer, code_only("synced code", "Regenerated")),
    );
    let engine = engine(setup_web_store(), &client);
    let request = FixRequest::from_findings(vec![Finding::new(Severity::Info, "SYNC_REQUEST")]);

    let report = engine.fix(request).await.unwrap();

    assert_eq!(report.action, Action::Fix);
    assert!(report.resync_mode);
    assert_eq!(client.calls_for(AgentRole::Fixer), 0);
    assert_eq!(client.calls_for(AgentRole::Syncer), 1);
    assert_eq!(engine.store().snapshot().code(), "synced code");
}

#[tokio::test]
async fn test_failed_fix_leaves_canvas_untouched() {
    let client = Arc::new(ScriptedClient::new());
    let store = setup_web_store();
    let engine = engine(Arc::clone(&store), &client);
    let before = store.snapshot();

    let err = engine
        .fix(FixRequest::Repair {
            findings: vec![Finding::new(Severity::Warning, "open ingress")],
        })
        .await
        .unwrap_err();

    assert_eq!(
        err,
        EngineError::Agent(AgentError::NoResponse {
            role: AgentRole::Fixer
        })
    );
    let after = store.snapshot();
    assert_eq!(after.code(), before.code());
    assert_eq!(
        after.resource_nodes().collect::<Vec<_>>(),
        before.resource_nodes().collect::<Vec<_>>()
    );
    assert_eq!(after.result().unwrap().output, err.user_message());
    assert_eq!(engine.phase(), EnginePhase::Idle);
}

#[tokio::test]
async fn test_fix_without_code_is_rejected() {
    let client = Arc::new(ScriptedClient::new());
    let engine = engine(
        setup_test_store(vec![resource_at("ec2", "EC2 Instance", 0.0, 0.0)], Vec::new(), ""),
        &client,
    );

    let err = engine
        .fix(FixRequest::Repair { findings: Vec::new() })
        .await
        .unwrap_err();

    assert!(matches!(err, EngineError::InvalidInput(_)));
    assert_eq!(client.call_count(), 0);
}

// ---------------------------------------------------------------------------
// Sync / Relayout
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_sync_of_empty_canvas_clears_code() {
    let client = Arc::new(ScriptedClient::new());
    let engine = engine(setup_test_store(Vec::new(), Vec::new(), "old code"), &client);

    let report = engine.sync().await.unwrap();

    assert_eq!(report.summary, EMPTY_CANVAS_SUMMARY);
    assert_eq!(engine.store().snapshot().code(), "");
    assert_eq!(client.call_count(), 0);
}

#[tokio::test]
async fn test_sync_sends_topology_and_keeps_graph() {
    let client = Arc::new(
        ScriptedClient::new().reply(AgentRole::Syncer, code_only("new code", "Added a queue")),
    );
    let store = setup_web_store();
    let engine = engine(Arc::clone(&store), &client);
    let queue = store.drop_resource("sqs", "SQS Queue", Position::new(700.0, 120.0));

    let report = engine.sync().await.unwrap();

    assert_eq!(report.resource_count, 3);
    let sent = &client.requests()[0].user;
    assert!(sent.contains("SQS Queue"));
    let canvas = store.snapshot();
    assert_eq!(canvas.node(&queue.id).unwrap().position, Position::new(700.0, 120.0));
    assert_eq!(canvas.code(), "new code");
}

#[tokio::test]
async fn test_sync_applies_restructured_graph() {
    let client = Arc::new(ScriptedClient::new().reply(
        AgentRole::Syncer,
        json!({
            "summary": "Queue behind the web tier",
            "nodes": [
                { "id": RESULT_NODE_ID, "label": "Hijacked" },
                { "id": "ec2", "label": "EC2 Instance", "type": "ec2" },
                { "id": "db", "label": "RDS Database", "type": "rds" },
                { "id": "sqs", "label": "SQS Queue", "type": "sqs" }
            ],
            "edges": [
                { "id": "e1", "source": "ec2", "target": "db" },
                { "source": "ec2", "target": "sqs" }
            ],
            "codeDocument": "resource \"aws_sqs_queue\" \"jobs\" {}"
        }),
    ));
    let store = setup_web_store();
    let engine = engine(Arc::clone(&store), &client);
    store.move_node("ec2", Position::new(700.0, 50.0)).unwrap();

    let report = engine.sync().await.unwrap();

    assert_eq!(report.resource_count, 3);
    let canvas = store.snapshot();
    let result = canvas.result().unwrap();
    assert!(!result.output.contains("Hijacked"));
    assert!(result.output.contains("Queue behind the web tier"));
    assert_eq!(canvas.node(RESULT_NODE_ID).unwrap().kind(), NodeKind::Result);
    assert_eq!(canvas.node("ec2").unwrap().position, Position::new(700.0, 50.0));
    assert!(canvas.node("sqs").is_some());
    assert_eq!(canvas.resource_edges().count(), 2);
    assert!(canvas.code().contains("aws_sqs_queue"));
}

#[tokio::test]
async fn test_failed_sync_leaves_canvas_untouched() {
    let client = Arc::new(
        ScriptedClient::new().reply(AgentRole::Syncer, json!({ "summary": "no code here" })),
    );
    let store = setup_web_store();
    let engine = engine(Arc::clone(&store), &client);
    let before = store.snapshot();

    let err = engine.sync().await.unwrap_err();

    assert!(matches!(err, EngineError::Agent(_)));
    let after = store.snapshot();
    assert_eq!(after.code(), before.code());
    assert_eq!(
        after.resource_nodes().collect::<Vec<_>>(),
        before.resource_nodes().collect::<Vec<_>>()
    );
    assert_eq!(
        after.resource_edges().collect::<Vec<_>>(),
        before.resource_edges().collect::<Vec<_>>()
    );
    assert_eq!(after.result().unwrap().output, err.user_message());
    assert_eq!(engine.phase(), EnginePhase::Idle);
}

#[test]
fn test_relayout_discards_manual_positions() {
    let client = Arc::new(ScriptedClient::new());
    let store = setup_test_store(
        vec![
            resource_at("a", "VPC", 900.0, 900.0),
            resource_at("b", "EC2 Instance", 900.0, 900.0),
        ],
        vec![nebula_graph::Edge::new("ab", "a", "b")],
        "",
    );
    store.move_node("a", Position::new(-50.0, -50.0)).unwrap();
    let engine = engine(Arc::clone(&store), &client);

    let report = engine.relayout();

    assert_eq!(report.action, Action::Relayout);
    let canvas = store.snapshot();
    let a = canvas.node("a").unwrap();
    let b = canvas.node("b").unwrap();
    assert!(!a.user_positioned);
    assert!(a.position.y < b.position.y);
    assert!(a.position.x >= 100.0 && a.position.y >= 450.0);
    assert_eq!(client.call_count(), 0);
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_events_follow_the_pipeline() {
    let client = Arc::new(
        ScriptedClient::new()
            .reply(AgentRole::Drafter, s3_draft())
            .reply(AgentRole::Auditor, clean_audit()),
    );
    let engine = fresh_engine(&client);
    let mut rx = engine.subscribe();

    engine.generate("create an S3 bucket").await.unwrap();

    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    let phases: Vec<EnginePhase> = events
        .iter()
        .filter_map(|e| match e {
            EngineEvent::PhaseChanged { phase } => Some(*phase),
            EngineEvent::Notification { .. } => None,
        })
        .collect();
    assert_eq!(
        phases,
        vec![
            EnginePhase::Generating,
            EnginePhase::Auditing,
            EnginePhase::Annotating,
            EnginePhase::Idle,
        ]
    );
    assert!(matches!(
        events.last(),
        Some(EngineEvent::Notification {
            level: NotificationLevel::Success,
            ..
        })
    ));
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn test_repair_never_moves_existing_nodes(
        positions in prop::collection::vec((-500.0f64..500.0, -500.0f64..500.0), 1..6),
        extra in 0usize..3,
    ) {
        let nodes: Vec<_> = positions
            .iter()
            .enumerate()
            .map(|(i, (x, y))| resource_at(&format!("n{i}"), &format!("Server {i}"), *x, *y))
            .collect();
        let mut returned: Vec<_> = nodes
            .iter()
            .rev()
            .map(|n| json!({ "id": n.id, "label": n.label() }))
            .collect();
        returned.extend((0..extra).map(|j| json!({ "id": format!("new{j}"), "label": "Queue" })));

        let client = Arc::new(ScriptedClient::new().reply(
            AgentRole::Fixer,
            json!({ "summary": "fixed", "codeDocument": "fixed", "nodes": returned }),
        ));
        let store = setup_test_store(nodes.clone(), Vec::new(), "broken");
        let engine = engine(Arc::clone(&store), &client);

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        runtime
            .block_on(engine.fix(FixRequest::Repair { findings: Vec::new() }))
            .unwrap();

        let canvas = store.snapshot();
        prop_assert_eq!(canvas.resource_count(), nodes.len() + extra);
        for node in &nodes {
            prop_assert_eq!(canvas.node(&node.id).unwrap().position, node.position);
        }
        for j in 0..extra {
            let id = format!("new{j}");
            prop_assert_eq!(canvas.node(&id).unwrap().position, Position::new(100.0, 450.0));
        }
    }
}

mod common;

use common::{Script, StubProvider, resource, sample_stack};
use serde_json::json;
use stackflow_engine::{
    ActionType, Declaration, Engine, EngineConfig, EngineError, EvaluationPlan, GraphBuilder,
    NodeState, Properties, Reference, SimulatedProvider, SkipReason, StackState,
};
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn test_sample_stack_runs_in_two_waves() {
    let provider = Arc::new(StubProvider::new());
    let engine = Engine::new(provider.clone());

    let report = engine.evaluate(sample_stack()).await.unwrap();

    assert!(report.is_success());
    assert_eq!(
        report.waves,
        vec![
            vec!["my-key", "session-cache", "app-db", "assets", "assets-key"],
            vec!["web-server"],
        ]
    );

    let web = report.get("web-server").unwrap();
    assert_eq!(web.wave, 1);
    assert_eq!(web.action, Some(ActionType::Create));
    assert_eq!(web.inputs["ssh_key_id"], json!("ssh_key-my-key"));
    assert_eq!(web.inputs["cache_endpoint"], json!("session-cache.internal"));
    assert_eq!(web.inputs["database_endpoint"], json!("app-db.internal"));

    // web-server is the only node that has to wait
    let calls = provider.call_names("apply");
    assert_eq!(calls.len(), 6);
    assert_eq!(calls.last().map(String::as_str), Some("web-server"));
}

#[tokio::test]
async fn test_failure_skips_dependents_only() {
    let provider = Arc::new(StubProvider::new().script("app-db", Script::Fail("quota exceeded".into())));
    let engine = Engine::new(provider.clone());

    let report = engine.evaluate(sample_stack()).await.unwrap();

    assert!(!report.is_success());
    assert_eq!(report.get("app-db").unwrap().error(), Some("quota exceeded"));
    assert_eq!(
        report.get("web-server").unwrap().skip_reason(),
        Some(&SkipReason::DependencyFailed {
            dependency: "app-db".to_string()
        })
    );
    for name in ["my-key", "session-cache", "assets", "assets-key"] {
        assert_eq!(report.get(name).unwrap().state(), NodeState::Succeeded, "{}", name);
    }
    assert!(!provider.call_names("apply").contains(&"web-server".to_string()));
    assert_eq!(
        report.summary().to_string(),
        "4 succeeded, 1 failed, 1 skipped, 0 deleted"
    );
}

#[tokio::test]
async fn test_failure_propagates_transitively() {
    let provider = Arc::new(StubProvider::new().script("net", Script::Fail("boom".into())));
    let engine = Engine::new(provider);

    let report = engine
        .evaluate(vec![
            resource("net", "firewall"),
            resource("vm", "vps").with_reference("firewall_id", "net", "id"),
            resource("snap", "vps_snapshot").with_reference("vps_id", "vm", "id"),
        ])
        .await
        .unwrap();

    assert_eq!(report.get("net").unwrap().state(), NodeState::Failed);
    for name in ["vm", "snap"] {
        assert_eq!(
            report.get(name).unwrap().skip_reason(),
            Some(&SkipReason::DependencyFailed {
                dependency: "net".to_string()
            })
        );
    }
}

#[tokio::test]
async fn test_partial_outputs_are_reported_on_failure() {
    let partial = Properties::from([("id".to_string(), json!("db-123"))]);
    let provider = Arc::new(
        StubProvider::new().script("app-db", Script::FailWithOutputs("timed out".into(), partial)),
    );
    let engine = Engine::new(provider);

    let report = engine
        .evaluate(vec![resource("app-db", "database")])
        .await
        .unwrap();

    let db = report.get("app-db").unwrap();
    assert_eq!(db.state(), NodeState::Failed);
    assert_eq!(db.outputs().unwrap()["id"], json!("db-123"));
    // failed nodes never satisfy exports
    assert!(report.output(&Reference::new("app-db", "id")).is_none());
}

#[tokio::test]
async fn test_missing_output_skips_node() {
    let provider = Arc::new(StubProvider::new().script("session-cache", Script::Omit("endpoint".into())));
    let engine = Engine::new(provider.clone());

    let report = engine.evaluate(sample_stack()).await.unwrap();

    assert_eq!(report.get("session-cache").unwrap().state(), NodeState::Succeeded);
    assert_eq!(
        report.get("web-server").unwrap().skip_reason(),
        Some(&SkipReason::MissingOutput {
            reference: Reference::new("session-cache", "endpoint")
        })
    );
    assert_eq!(provider.call_names("apply").len(), 5);
}

#[tokio::test]
async fn test_missing_output_cascades_as_skipped_dependency() {
    let provider = Arc::new(StubProvider::new().script("vm", Script::Omit("id".into())));
    let engine = Engine::new(provider);

    let report = engine
        .evaluate(vec![
            resource("vm", "vps"),
            resource("fw", "firewall").with_reference("vps_id", "vm", "id"),
            resource("snap", "vps_snapshot").with_reference("firewall_id", "fw", "id"),
        ])
        .await
        .unwrap();

    assert!(matches!(
        report.get("fw").unwrap().skip_reason(),
        Some(SkipReason::MissingOutput { .. })
    ));
    assert_eq!(
        report.get("snap").unwrap().skip_reason(),
        Some(&SkipReason::DependencySkipped {
            dependency: "fw".to_string()
        })
    );
}

#[tokio::test]
async fn test_provider_panic_fails_node() {
    let provider = Arc::new(StubProvider::new().script("assets", Script::Panic));
    let engine = Engine::new(provider);

    let report = engine.evaluate(sample_stack()).await.unwrap();

    let assets = report.get("assets").unwrap();
    assert_eq!(assets.state(), NodeState::Failed);
    assert!(assets.error().unwrap().contains("panicked"));
    assert_eq!(report.get("web-server").unwrap().state(), NodeState::Skipped);
    assert_eq!(report.get("assets-key").unwrap().state(), NodeState::Succeeded);
}

#[tokio::test]
async fn test_cycle_fails_before_any_provider_call() {
    let provider = Arc::new(StubProvider::new());
    let engine = Engine::new(provider.clone());

    let err = engine
        .evaluate(vec![
            resource("a", "vps").with_reference("x", "b", "id"),
            resource("b", "vps").with_reference("x", "a", "id"),
            resource("c", "vps"),
        ])
        .await
        .unwrap_err();

    match err {
        EngineError::CyclicDependency { cycle } => {
            assert!(cycle.contains(&"a".to_string()));
            assert!(cycle.contains(&"b".to_string()));
            assert!(!cycle.contains(&"c".to_string()));
        }
        other => panic!("expected cycle error, got {:?}", other),
    }
    assert!(provider.calls().is_empty());
}

#[tokio::test]
async fn test_unresolved_reference_fails_before_any_provider_call() {
    let provider = Arc::new(StubProvider::new());
    let engine = Engine::new(provider.clone());

    let err = engine
        .evaluate(vec![
            resource("key", "ssh_key"),
            resource("web", "vps").with_reference("ssh_key_id", "missing-key", "id"),
        ])
        .await
        .unwrap_err();

    assert!(matches!(err, EngineError::UnresolvedReference { .. }));
    assert!(err.is_build_error());
    assert!(provider.calls().is_empty());
}

#[tokio::test]
async fn test_runs_are_deterministic() {
    let engine = Engine::new(Arc::new(SimulatedProvider::default()));

    let mut first = engine.evaluate(sample_stack()).await.unwrap();
    let mut second = engine.evaluate(sample_stack()).await.unwrap();
    first.duration_ms = 0;
    second.duration_ms = 0;

    assert_eq!(first, second);
}

#[tokio::test]
async fn test_empty_stack() {
    let engine = Engine::new(Arc::new(StubProvider::new()));
    let report = engine.evaluate(Vec::new()).await.unwrap();

    assert!(report.results.is_empty());
    assert!(report.waves.is_empty());
    assert!(report.is_success());
}

#[tokio::test]
async fn test_max_parallel_bounds_concurrency() {
    let provider = Arc::new(StubProvider::new().with_delay(Duration::from_millis(30)));
    let engine = Engine::new(provider.clone()).with_config(EngineConfig {
        max_parallel: Some(2),
    });

    let report = engine.evaluate(sample_stack()).await.unwrap();

    assert!(report.is_success());
    assert!(provider.peak_concurrency() <= 2);
}

#[tokio::test]
async fn test_wave_runs_concurrently() {
    let provider = Arc::new(StubProvider::new().with_delay(Duration::from_millis(50)));
    let engine = Engine::new(provider.clone());

    engine.evaluate(sample_stack()).await.unwrap();

    assert!(provider.peak_concurrency() > 1);
}

#[tokio::test]
async fn test_cancel_before_run_skips_everything() {
    let provider = Arc::new(StubProvider::new());
    let engine = Engine::new(provider.clone());
    engine.cancellation_token().cancel();

    let report = engine.evaluate(sample_stack()).await.unwrap();

    assert!(report.cancelled);
    assert!(!report.is_success());
    assert!(
        report
            .results
            .iter()
            .all(|r| r.skip_reason() == Some(&SkipReason::Cancelled))
    );
    assert!(provider.calls().is_empty());
}

#[tokio::test]
async fn test_cancel_during_wave_lets_it_finish() {
    let provider = Arc::new(StubProvider::new().with_delay(Duration::from_millis(100)));
    let engine = Engine::new(provider.clone());
    let token = engine.cancellation_token();

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        token.cancel();
    });
    let report = engine.evaluate(sample_stack()).await.unwrap();

    assert!(report.cancelled);
    for name in ["my-key", "session-cache", "app-db", "assets", "assets-key"] {
        assert_eq!(report.get(name).unwrap().state(), NodeState::Succeeded, "{}", name);
    }
    assert_eq!(
        report.get("web-server").unwrap().skip_reason(),
        Some(&SkipReason::Cancelled)
    );
    assert_eq!(provider.call_names("apply").len(), 5);
}

#[tokio::test]
async fn test_cancel_stops_nodes_waiting_for_a_slot() {
    let provider = Arc::new(StubProvider::new().with_delay(Duration::from_millis(100)));
    let engine = Engine::new(provider.clone()).with_config(EngineConfig {
        max_parallel: Some(1),
    });
    let token = engine.cancellation_token();

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        token.cancel();
    });
    let report = engine.evaluate(sample_stack()).await.unwrap();

    assert!(report.cancelled);
    assert_eq!(provider.call_names("apply"), vec!["my-key".to_string()]);
    assert_eq!(report.get("my-key").unwrap().state(), NodeState::Succeeded);
    for name in ["session-cache", "app-db", "assets", "assets-key", "web-server"] {
        assert_eq!(
            report.get(name).unwrap().skip_reason(),
            Some(&SkipReason::Cancelled),
            "{}",
            name
        );
    }
}

async fn first_run(declarations: Vec<Declaration>) -> StackState {
    let engine = Engine::new(Arc::new(StubProvider::new()));
    let report = engine.evaluate(declarations).await.unwrap();
    let mut state = StackState::new();
    state.apply_report(&report);
    state
}

#[tokio::test]
async fn test_unchanged_stack_is_not_reapplied() {
    let state = first_run(sample_stack()).await;

    let provider = Arc::new(StubProvider::new());
    let engine = Engine::new(provider.clone());
    let graph = GraphBuilder::new().build(sample_stack()).unwrap();
    let plan = EvaluationPlan::schedule(&graph).unwrap();

    let report = engine.run(graph, &plan, Some(&state)).await.unwrap();

    assert!(report.is_success());
    assert!(
        report
            .results
            .iter()
            .all(|r| r.action == Some(ActionType::NoOp))
    );
    assert!(provider.calls().is_empty());
    assert_eq!(
        report.output(&Reference::new("my-key", "id")),
        Some(&json!("ssh_key-my-key"))
    );
}

#[tokio::test]
async fn test_changed_input_updates_node() {
    let state = first_run(sample_stack()).await;

    let mut declarations = sample_stack();
    declarations[3] = resource("app-db", "database").with_literal("engine", json!("mysql"));

    let provider = Arc::new(StubProvider::new());
    let engine = Engine::new(provider.clone());
    let graph = GraphBuilder::new().build(declarations).unwrap();
    let plan = EvaluationPlan::schedule(&graph).unwrap();

    let report = engine.run(graph, &plan, Some(&state)).await.unwrap();

    assert_eq!(report.get("app-db").unwrap().action, Some(ActionType::Update));
    // outputs of app-db are unchanged, so the server stays as it is
    assert_eq!(report.get("web-server").unwrap().action, Some(ActionType::NoOp));
    assert_eq!(provider.call_names("update"), vec!["app-db"]);
}

#[tokio::test]
async fn test_orphans_are_destroyed_after_last_wave() {
    let mut state = first_run(sample_stack()).await;
    state.set_resource(
        "legacy-cache".to_string(),
        stackflow_engine::ResourceState::new("cache").with_output("name", json!("legacy-cache")),
    );

    let provider = Arc::new(StubProvider::new());
    let engine = Engine::new(provider.clone());
    let graph = GraphBuilder::new().build(sample_stack()).unwrap();
    let plan = EvaluationPlan::schedule(&graph).unwrap();

    let report = engine.run(graph, &plan, Some(&state)).await.unwrap();

    assert_eq!(report.deleted.len(), 1);
    assert_eq!(report.deleted[0].name, "legacy-cache");
    assert!(report.deleted[0].is_success());
    assert_eq!(provider.call_names("destroy"), vec!["legacy-cache"]);

    state.apply_report(&report);
    assert!(state.get("legacy-cache").is_none());
    assert_eq!(state.resources.len(), 6);
}

#[tokio::test]
async fn test_destroy_all_tears_down_dependents_first() {
    let state = first_run(sample_stack()).await;

    let provider = Arc::new(StubProvider::new().script("assets", Script::Fail("bucket not empty".into())));
    let engine = Engine::new(provider.clone());

    let deleted = engine.destroy_all(&state).await;

    assert_eq!(deleted.len(), 6);
    assert_eq!(deleted[0].name, "web-server");
    let assets = deleted.iter().find(|d| d.name == "assets").unwrap();
    assert_eq!(assets.error.as_deref(), Some("bucket not empty"));
    assert_eq!(provider.call_names("destroy")[0], "web-server");
}

//! Test: Concurrent Runs - one engine, independent contexts

use crate::helpers::*;
use ptc::core::PipelineStatus;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

const PIPELINE: &str = r#"
id: "shared"
name: "Test: Shared engine"
steps:
  - id: "fetch"
    tool: "slow_echo"
    inputs:
      who: "${inputs.who}"
  - id: "report"
    tool: "slow_echo"
    dependsOn: ["fetch"]
    inputs:
      seen: "${results.fetch.who}"
"#;

/// Interleaved runs never see each other's inputs or results
#[tokio::test]
async fn test_runs_are_isolated() {
    let pipeline = Arc::new(pipeline_from_yaml(PIPELINE));
    let tool = MockTool::echo().with_delay(Duration::from_millis(20));
    let engine = Arc::new(engine_with(&[("slow_echo", &tool)]));

    let mut handles = Vec::new();
    for who in ["alice", "bob", "carol"] {
        let engine = engine.clone();
        let pipeline = pipeline.clone();
        handles.push(tokio::spawn(async move {
            let result = engine.execute(&pipeline, inputs(json!({ "who": who }))).await;
            (who, result)
        }));
    }

    let mut run_ids = Vec::new();
    for handle in handles {
        let (who, result) = handle.await.unwrap();
        assert_status(&result, PipelineStatus::Success);
        assert_eq!(result.context.inputs["who"], json!(who));
        assert_eq!(assert_step_succeeded(&result, "report"), &json!({ "seen": who }));
        assert_eq!(result.context.results.len(), 2);
        run_ids.push(result.run_id);
    }

    run_ids.sort();
    run_ids.dedup();
    assert_eq!(run_ids.len(), 3);
    assert_eq!(tool.calls(), 6);
}

/// A failing run does not disturb a concurrent successful one
#[tokio::test]
async fn test_failure_does_not_leak_between_runs() {
    let yaml = r#"
id: "mixed"
name: "Mixed"
steps:
  - id: "gate"
    tool: "echo"
    condition: "inputs.go == true"
  - id: "after"
    tool: "echo"
    dependsOn: ["gate"]
"#;
    let pipeline = pipeline_from_yaml(yaml);
    let tool = MockTool::echo().with_delay(Duration::from_millis(10));
    let engine = engine_with(&[("echo", &tool)]);

    let (go, stop) = tokio::join!(
        engine.execute(&pipeline, inputs(json!({"go": true}))),
        engine.execute(&pipeline, inputs(json!({"go": false}))),
    );

    assert_status(&go, PipelineStatus::Success);
    assert_step_succeeded(&go, "after");

    assert_status(&stop, PipelineStatus::Success);
    assert_step_skipped(&stop, "gate", "condition not met");
    assert_step_skipped(&stop, "after", "dependencies not met");
    assert!(stop.context.results.is_empty());
    assert_eq!(tool.calls(), 2);
}

/// Every event names its run, so listeners can split interleaved runs apart
#[tokio::test]
async fn test_events_partition_by_run() {
    let pipeline = pipeline_from_yaml(PIPELINE);
    let tool = MockTool::echo().with_delay(Duration::from_millis(15));
    let engine = engine_with(&[("slow_echo", &tool)]);
    let recorder = EventRecorder::attach(&engine).await;

    let (first, second) = tokio::join!(
        engine.execute(&pipeline, inputs(json!({"who": "alice"}))),
        engine.execute(&pipeline, inputs(json!({"who": "bob"}))),
    );
    assert_ne!(first.run_id, second.run_id);

    let events = recorder.events();
    assert_eq!(events.len(), 12);
    for result in [&first, &second] {
        let names: Vec<&str> = events
            .iter()
            .filter(|event| event.run_id() == result.run_id)
            .map(|event| event.name())
            .collect();
        assert_eq!(
            names,
            vec![
                "pipeline-start",
                "step-start",
                "step-complete",
                "step-start",
                "step-complete",
                "pipeline-complete",
            ]
        );
    }
}

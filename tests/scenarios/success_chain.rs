//! Test: Success Chain - dependency-ordered execution

use crate::helpers::*;
use ptc::core::PipelineStatus;
use serde_json::json;

/// Steps run after their dependencies regardless of declaration order
#[tokio::test]
async fn test_success_chain() {
    let yaml = r#"
id: "chain"
name: "Test: Success Chain"
description: "Verify steps execute in dependency order"
steps:
  - id: "review"
    tool: "review"
    dependsOn: ["implement"]
    inputs:
      code: "${results.implement.code}"
  - id: "implement"
    tool: "implement"
    dependsOn: ["plan"]
    inputs:
      plan: "${results.plan}"
  - id: "plan"
    tool: "plan"
    inputs:
      goal: "${inputs.goal}"
"#;
    let pipeline = pipeline_from_yaml(yaml);

    let plan = MockTool::returning(json!("1. write code"));
    let implement = MockTool::returning(json!({"code": "fn main() {}"}));
    let review = MockTool::returning(json!({"approved": true}));
    let engine = engine_with(&[("plan", &plan), ("implement", &implement), ("review", &review)]);

    let result = engine.execute(&pipeline, inputs(json!({"goal": "hello"}))).await;

    assert_status(&result, PipelineStatus::Success);
    assert_execution_order(&result, &["plan", "implement", "review"]);
    assert_eq!(assert_step_succeeded(&result, "review"), &json!({"approved": true}));

    assert_eq!(plan.calls(), 1);
    assert_eq!(implement.calls(), 1);
    assert_eq!(review.calls(), 1);
    assert_eq!(review.received()[0]["code"], json!("fn main() {}"));

    // No declared outputs: the whole results map
    assert_eq!(result.output["plan"], json!("1. write code"));
    assert_eq!(result.context.meta.completed_steps, vec!["plan", "implement", "review"]);
    assert!(result.validation_errors.is_empty());
}

/// Independent branches still run one at a time
#[tokio::test]
async fn test_independent_steps_run_sequentially() {
    let yaml = r#"
id: "fan"
name: "Fan out"
steps:
  - { id: "a", tool: "slow" }
  - { id: "b", tool: "slow" }
  - { id: "c", tool: "slow" }
"#;
    let pipeline = pipeline_from_yaml(yaml);
    let slow = MockTool::returning(json!(1)).with_delay(std::time::Duration::from_millis(30));
    let engine = engine_with(&[("slow", &slow)]);

    let result = engine.execute(&pipeline, Default::default()).await;

    assert_status(&result, PipelineStatus::Success);
    assert_execution_order(&result, &["a", "b", "c"]);
    assert!(result.duration_ms >= 90, "{}", summary(&result));
}

/// Declared outputs pick paths out of the context
#[tokio::test]
async fn test_declared_outputs() {
    let yaml = r#"
id: "outputs"
name: "Outputs"
steps:
  - { id: "fetch", tool: "fetch" }
outputs:
  - "results.fetch.items.1"
  - "results.fetch.total"
  - "inputs.user"
  - "results.missing.value"
"#;
    let pipeline = pipeline_from_yaml(yaml);
    let fetch = MockTool::returning(json!({"items": ["x", "y"], "total": 2}));
    let engine = engine_with(&[("fetch", &fetch)]);

    let result = engine.execute(&pipeline, inputs(json!({"user": "ada"}))).await;

    assert_status(&result, PipelineStatus::Success);
    assert_eq!(result.output["results.fetch.items.1"], json!("y"));
    assert_eq!(result.output["results.fetch.total"], json!(2));
    assert_eq!(result.output["inputs.user"], json!("ada"));
    assert_eq!(result.output["results.missing.value"], json!(null));

    // Reading the output again yields the same value
    let declared = pipeline.outputs.clone().unwrap();
    assert_eq!(result.context.extract_output(Some(&declared)), result.output);
}

/// Events follow the run from start to finish
#[tokio::test]
async fn test_event_sequence() {
    let yaml = r#"
id: "events"
name: "Events"
steps:
  - { id: "one", tool: "ok" }
  - { id: "two", tool: "ok", dependsOn: ["one"] }
"#;
    let pipeline = pipeline_from_yaml(yaml);
    let ok = MockTool::echo();
    let engine = engine_with(&[("ok", &ok)]);
    let recorder = EventRecorder::attach(&engine).await;

    let result = engine.execute(&pipeline, Default::default()).await;

    assert_status(&result, PipelineStatus::Success);
    assert_eq!(
        recorder.names(),
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

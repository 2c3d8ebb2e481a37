//! Test: Variable Substitution in step inputs
//!
//! `${path}` references resolve against run inputs, earlier results and
//! state. Unresolved references become null rather than failing the step.

use crate::helpers::*;
use ptc::core::{PipelineStatus, ToolDefinition};
use ptc::execution::ExecutionEngine;
use ptc::handler_fn;
use serde_json::json;

/// Nested result values are substituted with their original type
#[tokio::test]
async fn test_result_path_substitution() {
    let yaml = r#"
id: "subst"
name: "Test: Result substitution"
steps:
  - id: "step1"
    tool: "source"
  - id: "step2"
    tool: "sink"
    dependsOn: ["step1"]
    inputs:
      x: "${results.step1.value}"
      whole: "${results.step1}"
      first: "${results.step1.list.0}"
      literal: 7
      text: "value is ${results.step1.value}"
"#;
    let pipeline = pipeline_from_yaml(yaml);
    let source = MockTool::returning(json!({"value": 42, "list": ["a", "b"]}));
    let sink = MockTool::echo();
    let engine = engine_with(&[("source", &source), ("sink", &sink)]);

    let result = engine.execute(&pipeline, Default::default()).await;

    assert_status(&result, PipelineStatus::Success);
    let received = &sink.received()[0];
    assert_eq!(received["x"], json!(42));
    assert_eq!(received["whole"], json!({"value": 42, "list": ["a", "b"]}));
    assert_eq!(received["first"], json!("a"));
    assert_eq!(received["literal"], json!(7));
    // Only whole-string references are substituted
    assert_eq!(received["text"], json!("value is ${results.step1.value}"));
}

/// Run inputs and missing paths
#[tokio::test]
async fn test_input_substitution_and_missing_paths() {
    let yaml = r#"
id: "inputs"
name: "Inputs"
steps:
  - id: "only"
    tool: "sink"
    inputs:
      query: "${inputs.query}"
      limit: "${inputs.options.limit}"
      missing: "${inputs.nothing.here}"
      not_yet: "${results.later.value}"
  - id: "later"
    tool: "sink"
"#;
    let pipeline = pipeline_from_yaml(yaml);
    let sink = MockTool::echo();
    let engine = engine_with(&[("sink", &sink)]);

    let result = engine
        .execute(
            &pipeline,
            inputs(json!({"query": "rust", "options": {"limit": 5}})),
        )
        .await;

    assert_status(&result, PipelineStatus::Success);
    let received = &sink.received()[0];
    assert_eq!(received["query"], json!("rust"));
    assert_eq!(received["limit"], json!(5));
    assert_eq!(received["missing"], json!(null));
    // "later" has not run yet when "only" resolves its inputs
    assert_eq!(received["not_yet"], json!(null));
}

/// State written by a handler is visible to later steps
#[tokio::test]
async fn test_state_substitution() {
    let yaml = r#"
id: "state"
name: "State"
steps:
  - { id: "writer", tool: "writer" }
  - id: "reader"
    tool: "sink"
    dependsOn: ["writer"]
    inputs:
      token: "${state.session.token}"
"#;
    let pipeline = pipeline_from_yaml(yaml);
    let sink = MockTool::echo();
    let mut engine = ExecutionEngine::new(registry_with(&[("sink", &sink)]), test_config());
    engine.register_tool(
        ToolDefinition::new("writer", "writes session state"),
        handler_fn(|_inputs, ctx| async move {
            ctx.set_state("session", json!({"token": "abc123"}));
            Ok(json!("written"))
        }),
    );

    let result = engine.execute(&pipeline, Default::default()).await;

    assert_status(&result, PipelineStatus::Success);
    assert_eq!(sink.received()[0]["token"], json!("abc123"));
    assert_eq!(result.context.state["session"]["token"], json!("abc123"));
}

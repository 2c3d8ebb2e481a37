//! Test: Failure Handling - containment of step errors

use crate::helpers::*;
use ptc::core::PipelineStatus;
use serde_json::json;

const FAIL_THEN_DEPENDENT: &str = r#"
id: "contain"
name: "Test: Failure containment"
steps:
  - id: "A"
    tool: "broken"
  - id: "B"
    tool: "fine"
    dependsOn: ["A"]
"#;

/// A failing step skips its dependents; with no success the run is an error
#[tokio::test]
async fn test_failure_skips_dependents() {
    let pipeline = pipeline_from_yaml(FAIL_THEN_DEPENDENT);
    let broken = MockTool::failing("upstream exploded");
    let fine = MockTool::returning(json!("ok"));
    let engine = engine_with(&[("broken", &broken), ("fine", &fine)]);

    let result = engine.execute(&pipeline, Default::default()).await;

    assert_status(&result, PipelineStatus::Error);
    assert_step_failed(&result, "A", "upstream exploded");
    assert_step_skipped(&result, "B", "dependencies not met");
    assert_eq!(fine.calls(), 0);

    // Failed steps leave no result but are logged
    assert!(result.context.results.get("A").is_none());
    assert_eq!(result.context.meta.errors.len(), 1);
    assert_eq!(result.context.meta.errors[0].step, "A");
}

/// An unrelated success turns the same failure into a partial run
#[tokio::test]
async fn test_independent_success_gives_partial() {
    let yaml = format!(
        "{}  - id: \"C\"\n    tool: \"fine\"\n",
        FAIL_THEN_DEPENDENT
    );
    let pipeline = pipeline_from_yaml(&yaml);
    let broken = MockTool::failing("upstream exploded");
    let fine = MockTool::returning(json!("ok"));
    let engine = engine_with(&[("broken", &broken), ("fine", &fine)]);

    let result = engine.execute(&pipeline, Default::default()).await;

    assert_status(&result, PipelineStatus::Partial);
    assert_step_failed(&result, "A", "upstream exploded");
    assert_step_skipped(&result, "B", "dependencies not met");
    assert_eq!(assert_step_succeeded(&result, "C"), &json!("ok"));
    assert_eq!(fine.calls(), 1);
}

/// Skips cascade through the whole downstream chain
#[tokio::test]
async fn test_skip_cascades() {
    let yaml = r#"
id: "cascade"
name: "Cascade"
steps:
  - { id: "root", tool: "broken" }
  - { id: "mid", tool: "fine", dependsOn: ["root"] }
  - { id: "leaf", tool: "fine", dependsOn: ["mid"] }
"#;
    let pipeline = pipeline_from_yaml(yaml);
    let broken = MockTool::failing("nope");
    let fine = MockTool::echo();
    let engine = engine_with(&[("broken", &broken), ("fine", &fine)]);
    let recorder = EventRecorder::attach(&engine).await;

    let result = engine.execute(&pipeline, Default::default()).await;

    assert_status(&result, PipelineStatus::Error);
    assert_step_skipped(&result, "mid", "dependencies not met");
    assert_step_skipped(&result, "leaf", "dependencies not met");
    assert_eq!(
        recorder.names(),
        vec![
            "pipeline-start",
            "step-start",
            "step-error",
            "step-skip",
            "step-skip",
            "pipeline-complete",
        ]
    );
}

/// A timed-out attempt is an error and does not wait for the handler
#[tokio::test]
async fn test_timeout_is_a_step_error() {
    let yaml = r#"
id: "slow"
name: "Slow"
steps:
  - id: "sleepy"
    tool: "sleepy"
    timeout: 50
    retries: 0
"#;
    let pipeline = pipeline_from_yaml(yaml);
    let sleepy = MockTool::returning(json!("late")).with_delay(std::time::Duration::from_millis(200));
    let engine = engine_with(&[("sleepy", &sleepy)]);

    let result = engine.execute(&pipeline, Default::default()).await;

    assert_status(&result, PipelineStatus::Error);
    assert_step_failed(&result, "sleepy", "Timeout after 50ms");
    let step = result.step("sleepy").unwrap();
    assert!(step.duration_ms >= 45, "{:?}", step);
    assert!(step.duration_ms < 150, "{:?}", step);
    assert!(result.context.results.get("sleepy").is_none());
}

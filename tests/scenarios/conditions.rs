//! Test: Conditions - gating steps on expressions

use crate::helpers::*;
use ptc::core::PipelineStatus;
use serde_json::json;

fn gated(condition: &str) -> String {
    format!(
        r#"
id: "gated"
name: "Gated"
steps:
  - id: "a"
    tool: "check"
  - id: "b"
    tool: "guarded"
    dependsOn: ["a"]
    condition: '{}'
"#,
        condition
    )
}

async fn run_gated(condition: &str, check_output: serde_json::Value) -> (ptc::PipelineResult, MockTool) {
    let pipeline = pipeline_from_yaml(&gated(condition));
    let check = MockTool::returning(check_output);
    let guarded = MockTool::returning(json!("ran"));
    let engine = engine_with(&[("check", &check), ("guarded", &guarded)]);
    let result = engine
        .execute(&pipeline, inputs(json!({"threshold": 10, "mode": "deep"})))
        .await;
    (result, guarded)
}

/// A false condition skips the step without invoking its tool
#[tokio::test]
async fn test_false_condition_skips() {
    let (result, guarded) = run_gated("results.a.ok === true", json!({"ok": false})).await;

    assert_status(&result, PipelineStatus::Success);
    assert_step_skipped(&result, "b", "condition not met");
    assert_eq!(guarded.calls(), 0);
    assert!(result.context.results.get("b").is_none());
}

#[tokio::test]
async fn test_true_condition_runs() {
    let (result, guarded) = run_gated("results.a.ok === true", json!({"ok": true})).await;

    assert_status(&result, PipelineStatus::Success);
    assert_eq!(assert_step_succeeded(&result, "b"), &json!("ran"));
    assert_eq!(guarded.calls(), 1);
}

/// Comparisons, connectives and input references
#[tokio::test]
async fn test_compound_conditions() {
    let cases = [
        ("results.a.score > inputs.threshold && inputs.mode == \"deep\"", true),
        ("results.a.score >= 20 and not results.a.flagged", false),
        ("results.a.tags[1] === \"risky\" || results.a.score < 0", true),
        ("results.a.missing == null", true),
        ("results.a.missing === null", false),
        ("!(results.a.score <= 12)", false),
    ];

    for (condition, should_run) in cases {
        let (result, guarded) = run_gated(
            condition,
            json!({"score": 12, "flagged": true, "tags": ["new", "risky"]}),
        )
        .await;
        assert_eq!(
            guarded.calls() == 1,
            should_run,
            "condition {:?}: {}",
            condition,
            summary(&result)
        );
    }
}

/// Malformed conditions skip instead of failing the run
#[tokio::test]
async fn test_malformed_condition_skips() {
    for condition in ["results.a.ok ===", "window.alert(1)", "results.a.ok = 1"] {
        let (result, guarded) = run_gated(condition, json!({"ok": true})).await;

        assert_status(&result, PipelineStatus::Success);
        assert_step_skipped(&result, "b", "condition error");
        assert_eq!(guarded.calls(), 0, "condition {:?}", condition);
    }
}

/// Skipping by condition also skips dependents
#[tokio::test]
async fn test_condition_skip_propagates() {
    let yaml = r#"
id: "propagate"
name: "Propagate"
steps:
  - id: "optional"
    tool: "tool"
    condition: "inputs.enabled"
  - id: "after"
    tool: "tool"
    dependsOn: ["optional"]
  - id: "independent"
    tool: "tool"
"#;
    let pipeline = pipeline_from_yaml(yaml);
    let tool = MockTool::returning(json!(1));
    let engine = engine_with(&[("tool", &tool)]);

    let result = engine.execute(&pipeline, inputs(json!({"enabled": false}))).await;

    assert_status(&result, PipelineStatus::Success);
    assert_step_skipped(&result, "optional", "condition not met");
    assert_step_skipped(&result, "after", "dependencies not met");
    assert_step_succeeded(&result, "independent");
    assert_eq!(tool.calls(), 1);
}

//! Test: Retry Behavior - attempts, backoff and the retry event

use crate::helpers::*;
use ptc::core::{CoordinatorConfig, PipelineStatus};
use ptc::execution::{ExecutionEngine, ExecutionEvent};
use serde_json::json;
use std::time::Instant;

/// retries = 2 means three invocations before giving up
#[tokio::test]
async fn test_retries_exhausted() {
    let yaml = r#"
id: "retry"
name: "Test: Retries exhausted"
steps:
  - id: "task"
    tool: "broken"
    retries: 2
"#;
    let pipeline = pipeline_from_yaml(yaml);
    let broken = MockTool::failing("still broken");
    let engine = engine_with(&[("broken", &broken)]);

    let result = engine.execute(&pipeline, Default::default()).await;

    assert_status(&result, PipelineStatus::Error);
    assert_step_failed(&result, "task", "still broken");
    assert_eq!(broken.calls(), 3);
    assert_eq!(result.step("task").unwrap().attempts, 3);
    // One error record per step, not per attempt
    assert_eq!(result.context.meta.errors.len(), 1);
}

/// A flaky tool succeeds once its failures run out
#[tokio::test]
async fn test_retry_until_success() {
    let yaml = r#"
id: "flaky"
name: "Flaky"
steps:
  - id: "task"
    tool: "flaky"
    retries: 3
"#;
    let pipeline = pipeline_from_yaml(yaml);
    let flaky = MockTool::flaky(2, json!({"done": true}));
    let engine = engine_with(&[("flaky", &flaky)]);
    let recorder = EventRecorder::attach(&engine).await;

    let result = engine.execute(&pipeline, Default::default()).await;

    assert_status(&result, PipelineStatus::Success);
    assert_eq!(assert_step_succeeded(&result, "task"), &json!({"done": true}));
    assert_eq!(flaky.calls(), 3);
    assert_eq!(result.step("task").unwrap().attempts, 3);

    let retries: Vec<(u32, u64)> = recorder
        .events()
        .into_iter()
        .filter_map(|event| match event {
            ExecutionEvent::StepRetrying { attempt, delay_ms, .. } => Some((attempt, delay_ms)),
            _ => None,
        })
        .collect();
    assert_eq!(retries, vec![(1, 1), (2, 2)]);
}

/// The coordinator default applies when a step sets no retries
#[tokio::test]
async fn test_default_retries_from_config() {
    let yaml = r#"
id: "defaults"
name: "Defaults"
steps:
  - { id: "task", tool: "broken" }
"#;
    let pipeline = pipeline_from_yaml(yaml);
    let broken = MockTool::failing("nope");
    let engine = ExecutionEngine::new(
        registry_with(&[("broken", &broken)]),
        CoordinatorConfig::default()
            .with_default_retries(4)
            .with_retry_base_delay_ms(1),
    );

    let result = engine.execute(&pipeline, Default::default()).await;

    assert_status(&result, PipelineStatus::Error);
    assert_eq!(broken.calls(), 5);
}

/// Backoff doubles: base 20ms gives waits of 20, 40 and 80ms
#[tokio::test]
async fn test_exponential_backoff_timing() {
    let yaml = r#"
id: "backoff"
name: "Backoff"
steps:
  - { id: "task", tool: "broken", retries: 3 }
"#;
    let pipeline = pipeline_from_yaml(yaml);
    let broken = MockTool::failing("nope");
    let engine = ExecutionEngine::new(
        registry_with(&[("broken", &broken)]),
        test_config().with_retry_base_delay_ms(20),
    );

    let started = Instant::now();
    let result = engine.execute(&pipeline, Default::default()).await;

    assert_status(&result, PipelineStatus::Error);
    assert_eq!(broken.calls(), 4);
    assert!(started.elapsed().as_millis() >= 140, "{:?}", started.elapsed());
    assert!(result.step("task").unwrap().duration_ms >= 140);
}

/// Each attempt gets its own timeout
#[tokio::test]
async fn test_timeouts_are_retried() {
    let yaml = r#"
id: "timeouts"
name: "Timeouts"
steps:
  - id: "task"
    tool: "slow"
    timeout: 20
    retries: 1
"#;
    let pipeline = pipeline_from_yaml(yaml);
    let slow = MockTool::returning(json!(1)).with_delay(std::time::Duration::from_millis(100));
    let engine = engine_with(&[("slow", &slow)]);

    let result = engine.execute(&pipeline, Default::default()).await;

    assert_step_failed(&result, "task", "Timeout after 20ms");
    assert_eq!(slow.calls(), 2);
    assert_eq!(result.step("task").unwrap().attempts, 2);
}

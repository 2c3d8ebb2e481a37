//! Test: Validation - structural checks block runs before any step executes

use crate::helpers::*;
use ptc::core::PipelineStatus;
use serde_json::json;

/// A two-step cycle is rejected and nothing runs
#[tokio::test]
async fn test_cycle_blocks_run() {
    let yaml = r#"
id: "cycle"
name: "Test: Cycle"
steps:
  - { id: "A", tool: "tool", dependsOn: ["B"] }
  - { id: "B", tool: "tool", dependsOn: ["A"] }
"#;
    let pipeline = pipeline_from_yaml(yaml);
    let tool = MockTool::echo();
    let engine = engine_with(&[("tool", &tool)]);
    let recorder = EventRecorder::attach(&engine).await;

    let validation = engine.validate(&pipeline);
    assert!(!validation.valid);
    assert!(validation
        .errors
        .iter()
        .any(|e| e.message.contains("Circular dependency")));

    let result = engine.execute(&pipeline, Default::default()).await;

    assert_status(&result, PipelineStatus::Error);
    assert!(result.steps.is_empty());
    assert_eq!(tool.calls(), 0);
    assert!(result
        .validation_errors
        .iter()
        .any(|e| e.message.contains("Circular dependency")));
    assert_eq!(recorder.names(), vec!["pipeline-start", "pipeline-error"]);
}

/// Unknown tools and dangling dependencies are reported at their paths
#[tokio::test]
async fn test_structural_errors_are_located() {
    let yaml = r#"
id: "broken"
name: "Broken"
steps:
  - { id: "ok", tool: "tool" }
  - { id: "typo", tool: "tool_typo" }
  - { id: "orphan", tool: "tool", dependsOn: ["ok", "ghost"] }
"#;
    let pipeline = pipeline_from_yaml(yaml);
    let tool = MockTool::echo();
    let engine = engine_with(&[("tool", &tool)]);

    let validation = engine.validate(&pipeline);
    let paths: Vec<&str> = validation.errors.iter().map(|e| e.path.as_str()).collect();
    assert_eq!(paths, vec!["steps[1].tool", "steps[2].dependsOn[1]"]);
    assert!(validation.errors[0].message.contains("tool_typo"));

    // Even the valid step is not executed
    let result = engine.execute(&pipeline, Default::default()).await;
    assert_status(&result, PipelineStatus::Error);
    assert_eq!(tool.calls(), 0);
    assert_eq!(result.validation_errors, validation.errors);
}

/// Duplicate ids are structural errors
#[tokio::test]
async fn test_duplicate_ids() {
    let yaml = r#"
id: "dupes"
name: "Dupes"
steps:
  - { id: "same", tool: "tool" }
  - { id: "same", tool: "tool" }
"#;
    let pipeline = pipeline_from_yaml(yaml);
    let tool = MockTool::echo();
    let engine = engine_with(&[("tool", &tool)]);

    let validation = engine.validate(&pipeline);
    assert!(!validation.valid);
    assert_eq!(validation.errors[0].path, "steps[1].id");
}

/// Risk, cost and warnings never affect validity
#[tokio::test]
async fn test_risk_cost_and_warnings() {
    let mut yaml = String::from("id: big\nname: Big\nsteps:\n");
    for i in 0..12 {
        yaml.push_str(&format!("  - {{ id: \"s{}\", tool: \"tool\" }}\n", i));
    }
    yaml.push_str("  - { id: \"peek\", tool: \"tool\", inputs: { x: \"${results.s0}\" } }\n");
    let pipeline = pipeline_from_yaml(&yaml);
    let tool = MockTool::echo();
    let engine = engine_with(&[("tool", &tool)]);

    let validation = engine.validate(&pipeline);

    assert!(validation.valid);
    assert_eq!(validation.estimated_cost, 13 * 500);
    assert_eq!(validation.risk_score, 80);
    assert!(validation.warnings.iter().any(|w| w.path == "steps"));
    assert!(validation
        .warnings
        .iter()
        .any(|w| w.path == "steps[12].inputs.x"));

    // Declared risk level wins over the heuristic
    let mut declared = pipeline.clone();
    declared.metadata = Some(ptc::core::PipelineMetadata {
        risk_level: Some(ptc::core::RiskLevel::Critical),
        ..Default::default()
    });
    assert_eq!(engine.validate(&declared).risk_score, 95);

    let result = engine.execute(&pipeline, Default::default()).await;
    assert_status(&result, PipelineStatus::Success);
    assert_eq!(tool.calls(), 13);
    assert_eq!(result.output["peek"]["x"], json!({}));
}

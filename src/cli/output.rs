//! CLI output formatting

use crate::{
    core::{PipelineResult, PipelineStatus, StepResult, StepStatus, ToolDefinition},
    execution::{ExecutionEvent, ValidationResult},
    persistence::ExecutionSummary,
    Pipeline,
};
use console::Emoji;
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::Value;
use std::time::Duration;

pub use console::style;

pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "✓ ");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "✗ ");
pub static SPINNER: Emoji<'_, '_> = Emoji("⏳ ", "~ ");
pub static SKIP: Emoji<'_, '_> = Emoji("⏭️  ", "- ");
pub static INFO: Emoji<'_, '_> = Emoji("ℹ️  ", "i ");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "! ");
pub static ROCKET: Emoji<'_, '_> = Emoji("🚀 ", "> ");

/// Progress bar over a pipeline's steps
pub fn create_progress_bar(total: usize) -> ProgressBar {
    let progress = ProgressBar::new(total as u64);
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-");
    progress.set_style(style);
    progress.enable_steady_tick(Duration::from_millis(100));
    progress
}

/// Horizontal rule spanning the terminal, 80 columns when unknown
pub fn separator() -> String {
    let width = term_size::dimensions_stdout().map(|(w, _)| w).unwrap_or(80);
    "─".repeat(width.min(120))
}

fn short_id(id: &uuid::Uuid) -> String {
    id.to_string()[..8].to_string()
}

pub fn format_status(status: PipelineStatus) -> String {
    match status {
        PipelineStatus::Success => style("SUCCESS").green().to_string(),
        PipelineStatus::Partial => style("PARTIAL").yellow().to_string(),
        PipelineStatus::Error => style("ERROR").red().to_string(),
    }
}

fn status_icon(status: PipelineStatus) -> Emoji<'static, 'static> {
    match status {
        PipelineStatus::Success => CHECK,
        PipelineStatus::Partial => WARN,
        PipelineStatus::Error => CROSS,
    }
}

/// True for events that settle a step
pub fn is_step_settled(event: &ExecutionEvent) -> bool {
    matches!(
        event,
        ExecutionEvent::StepCompleted { .. }
            | ExecutionEvent::StepFailed { .. }
            | ExecutionEvent::StepSkipped { .. }
    )
}

/// Format an execution event for display
pub fn format_execution_event(event: &ExecutionEvent) -> String {
    match event {
        ExecutionEvent::PipelineStarted { run_id, pipeline_id } => format!(
            "{} Starting pipeline {} ({})",
            ROCKET,
            style(pipeline_id).bold(),
            style(short_id(run_id)).dim()
        ),
        ExecutionEvent::PipelineFailed { errors, .. } => {
            let mut out = format!("{} Pipeline is invalid:", CROSS);
            for error in errors {
                out.push_str(&format!("\n    {}", style(error).red()));
            }
            out
        }
        ExecutionEvent::StepStarted { step_id, attempt, .. } => {
            if *attempt > 1 {
                format!("{} {} (attempt {})", SPINNER, style(step_id).cyan(), style(attempt).dim())
            } else {
                format!("{} {}", SPINNER, style(step_id).cyan())
            }
        }
        ExecutionEvent::StepRetrying {
            step_id,
            attempt,
            delay_ms,
            error,
            ..
        } => format!(
            "{} {} attempt {} failed: {} (retrying in {}ms)",
            WARN,
            style(step_id).yellow(),
            attempt,
            style(error).dim(),
            delay_ms
        ),
        ExecutionEvent::StepCompleted {
            step_id, duration_ms, ..
        } => format!(
            "{} {} {}",
            CHECK,
            style(step_id).green(),
            style(format!("{}ms", duration_ms)).dim()
        ),
        ExecutionEvent::StepFailed { step_id, error, .. } => {
            format!("{} {}: {}", CROSS, style(step_id).red(), style(error).dim())
        }
        ExecutionEvent::StepSkipped { step_id, reason, .. } => {
            format!("{} {} ({})", SKIP, style(step_id).dim(), reason)
        }
        ExecutionEvent::PipelineCompleted {
            run_id,
            status,
            duration_ms,
            ..
        } => format!(
            "{} Pipeline ({}) finished {} in {}ms",
            status_icon(*status),
            style(short_id(run_id)).dim(),
            format_status(*status),
            duration_ms
        ),
    }
}

fn format_step_result(step: &StepResult) -> String {
    match step.status {
        StepStatus::Success => format!(
            "  {} {} ({} attempt(s), {}ms)",
            CHECK,
            style(&step.step_id).green(),
            step.attempts,
            step.duration_ms
        ),
        StepStatus::Error => format!(
            "  {} {}: {}",
            CROSS,
            style(&step.step_id).red(),
            style(step.error.as_deref().unwrap_or("unknown error")).dim()
        ),
        StepStatus::Skipped => format!(
            "  {} {} ({})",
            SKIP,
            style(&step.step_id).dim(),
            step.reason.as_deref().unwrap_or("skipped")
        ),
    }
}

/// Human-readable report of a finished run
pub fn format_pipeline_result(result: &PipelineResult) -> String {
    let mut lines = vec![
        separator(),
        format!(
            "{} {} {} ({} succeeded, {} failed, {} skipped) in {}ms",
            status_icon(result.status),
            style(&result.pipeline_id).bold(),
            format_status(result.status),
            result.count(StepStatus::Success),
            result.count(StepStatus::Error),
            result.count(StepStatus::Skipped),
            result.duration_ms
        ),
    ];

    for issue in &result.validation_errors {
        lines.push(format!("  {} {}", CROSS, style(issue).red()));
    }
    for step in &result.steps {
        lines.push(format_step_result(step));
    }

    lines.push(format!("\n{}", style("Output:").bold()));
    lines.push(format_output(&pretty(&result.output), 40));
    lines.join("\n")
}

/// Human-readable validation report
pub fn format_validation(pipeline: &Pipeline, validation: &ValidationResult) -> String {
    let mut lines = Vec::new();
    if validation.valid {
        lines.push(format!("{} {} is valid", CHECK, style(&pipeline.name).bold()));
    } else {
        lines.push(format!("{} {} is invalid", CROSS, style(&pipeline.name).bold()));
    }
    lines.push(format!("  Steps: {}", style(pipeline.steps.len()).cyan()));
    lines.push(format!("  Risk score: {}", style(validation.risk_score).cyan()));
    lines.push(format!("  Estimated cost: {}", style(validation.estimated_cost).cyan()));

    for error in &validation.errors {
        lines.push(format!("  {} {}", CROSS, style(error).red()));
    }
    for warning in &validation.warnings {
        lines.push(format!("  {} {}", WARN, style(warning).yellow()));
    }
    lines.join("\n")
}

/// One line per template
pub fn format_template(pipeline: &Pipeline) -> String {
    let (category, tags) = pipeline
        .metadata
        .as_ref()
        .map(|m| (m.category.clone().unwrap_or_default(), m.tags.join(", ")))
        .unwrap_or_default();

    format!(
        "  {} {} - {} [{}] {}",
        style(&pipeline.id).bold(),
        style(format!("v{}", pipeline.version)).dim(),
        pipeline.description,
        style(category).cyan(),
        style(tags).dim()
    )
}

pub fn format_tool(tool: &ToolDefinition) -> String {
    let required = if tool.input_schema.required.is_empty() {
        String::new()
    } else {
        format!(" (requires: {})", tool.input_schema.required.join(", "))
    };
    format!(
        "  {} - {}{}",
        style(&tool.name).bold(),
        tool.description,
        style(required).dim()
    )
}

/// Format a history entry for display
pub fn format_execution_summary(summary: &ExecutionSummary) -> String {
    let mut line = format!(
        "{} {} - {} - {} ({}/{} ok, {} failed, {} skipped) - {}",
        status_icon(summary.status),
        style(short_id(&summary.run_id)).dim(),
        style(&summary.pipeline_id).bold(),
        format_status(summary.status),
        summary.succeeded,
        summary.total_steps,
        summary.failed,
        summary.skipped,
        style(summary.started_at.format("%Y-%m-%d %H:%M:%S")).dim()
    );
    if let Some(error) = &summary.first_error {
        line.push_str(&format!("\n      {}", style(error).red()));
    }
    line
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

/// Format step output with truncation
pub fn format_output(output: &str, max_lines: usize) -> String {
    let lines: Vec<&str> = output.lines().collect();

    if lines.len() <= max_lines {
        output.to_string()
    } else {
        let truncated = lines[..max_lines].join("\n");
        format!(
            "{}\n{}... ({} more lines)",
            truncated,
            style("[truncated]").dim(),
            lines.len() - max_lines
        )
    }
}

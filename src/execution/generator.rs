//! Keyword-driven pipeline seeding
//!
//! This is scaffolding, not planning: the generated pipeline refers to fixed
//! tool names that may not be registered and must be validated before it is
//! executed.

use crate::core::{Pipeline, PipelineMetadata, Step};

const SEARCH_WORDS: &[&str] = &["search", "find", "research", "look up"];
const ANALYZE_WORDS: &[&str] = &["analyze", "analyse", "assess", "evaluate"];
const SUMMARIZE_WORDS: &[&str] = &["summarize", "summarise", "summary"];

const FALLBACK_TOOL: &str = "llm_call";

/// Build a seed pipeline from a free-text intent.
///
/// `search` words add a `web_search` step, `analyze` words an `analyze`
/// step fed by the search, `summarize` words a closing `summarize` step.
/// With no keyword match the result is a single step calling `llm_call`,
/// or the first available tool when `llm_call` is not among them.
pub fn generate_from_intent(intent: &str, available_tools: &[String]) -> Pipeline {
    let text = intent.to_lowercase();
    let mentions = |words: &[&str]| words.iter().any(|w| text.contains(w));

    let mut steps: Vec<Step> = Vec::new();

    if mentions(SEARCH_WORDS) {
        steps.push(Step::new("search", "web_search").with_input("query", "${inputs.query}"));
    }

    if mentions(ANALYZE_WORDS) {
        let step = match steps.last() {
            Some(prev) => Step::new("analyze", "analyze")
                .depends_on([prev.id.clone()])
                .with_input("data", format!("${{results.{}}}", prev.id)),
            None => Step::new("analyze", "analyze").with_input("data", "${inputs.data}"),
        };
        steps.push(step);
    }

    if mentions(SUMMARIZE_WORDS) {
        let step = match steps.last() {
            Some(prev) => Step::new("summarize", "summarize")
                .depends_on([prev.id.clone()])
                .with_input("content", format!("${{results.{}}}", prev.id)),
            None => Step::new("summarize", "summarize").with_input("content", "${inputs.content}"),
        };
        steps.push(step);
    }

    if steps.is_empty() {
        let tool = if available_tools.iter().any(|t| t == FALLBACK_TOOL) {
            FALLBACK_TOOL
        } else {
            available_tools.first().map(String::as_str).unwrap_or(FALLBACK_TOOL)
        };
        steps.push(Step::new("process", tool).with_input("prompt", intent.trim()));
    }

    let mut pipeline = Pipeline::new("generated", title(intent))
        .with_description(format!("Generated from intent: {}", intent.trim()))
        .with_metadata(PipelineMetadata {
            category: Some("generated".to_string()),
            ..PipelineMetadata::default()
        });
    for step in steps {
        pipeline = pipeline.with_step(step);
    }
    pipeline
}

fn title(intent: &str) -> String {
    let trimmed = intent.trim();
    match trimmed.char_indices().nth(60) {
        Some((cut, _)) => format!("{}...", &trimmed[..cut]),
        None if trimmed.is_empty() => "Generated pipeline".to_string(),
        None => trimmed.to_string(),
    }
}

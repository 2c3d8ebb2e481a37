//! Main execution engine - orchestrates a pipeline run

use crate::{
    core::{
        Condition, ConditionError, CoordinatorConfig, Pipeline, PipelineResult, PipelineStatus,
        SharedContext, StepResult, ToolDefinition, ToolHandler, ToolRegistry,
    },
    execution::{
        events::{EventBus, ExecutionEvent},
        generator,
        validator::{ValidationResult, Validator},
        ExecutionScheduler, StepExecutor,
    },
};
use chrono::Utc;
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

const DEPENDENCIES_NOT_MET: &str = "dependencies not met";

/// The pipeline coordinator
///
/// Tools are registered up front; after that the engine is only read, so a
/// single instance (behind an `Arc`) can serve concurrent `execute` calls.
/// Each call owns its own [`SharedContext`].
pub struct ExecutionEngine {
    registry: ToolRegistry,
    scheduler: ExecutionScheduler,
    executor: StepExecutor,
    events: EventBus,
}

impl ExecutionEngine {
    pub fn new(registry: ToolRegistry, config: CoordinatorConfig) -> Self {
        let events = EventBus::new();
        Self {
            registry,
            scheduler: ExecutionScheduler::default(),
            executor: StepExecutor::new(config, events.clone()),
            events,
        }
    }

    /// Register a tool; replaces an existing tool of the same name
    pub fn register_tool(&mut self, definition: ToolDefinition, handler: Arc<dyn ToolHandler>) {
        self.registry.register(definition, handler);
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn config(&self) -> &CoordinatorConfig {
        self.executor.config()
    }

    /// Add an event handler
    pub async fn add_event_handler<F>(&self, handler: F)
    where
        F: Fn(ExecutionEvent) + Send + Sync + 'static,
    {
        self.events.subscribe(handler).await;
    }

    /// Structural checks plus risk and cost estimate
    pub fn validate(&self, pipeline: &Pipeline) -> ValidationResult {
        Validator::new(&self.registry).validate(pipeline)
    }

    /// Seed a pipeline from free text using the registered tool names.
    ///
    /// Keyword matching only; validate the result before running it.
    pub fn generate_from_intent(&self, intent: &str) -> Pipeline {
        generator::generate_from_intent(intent, &self.registry.names())
    }

    /// Execute a pipeline.
    ///
    /// Never fails: structural problems, step errors and skips are all
    /// reported through the returned [`PipelineResult`].
    pub async fn execute(&self, pipeline: &Pipeline, inputs: Map<String, Value>) -> PipelineResult {
        let run_id = Uuid::new_v4();
        let started = Instant::now();
        let mut context = Arc::new(SharedContext::new(inputs));
        let started_at = context.meta.started_at;

        info!("Starting pipeline execution: {} ({})", pipeline.name, run_id);
        self.events
            .emit(ExecutionEvent::PipelineStarted {
                run_id,
                pipeline_id: pipeline.id.clone(),
            })
            .await;

        let validation = self.validate(pipeline);
        if !validation.valid {
            warn!(
                "Pipeline {} failed validation with {} error(s)",
                pipeline.id,
                validation.errors.len()
            );
            self.events
                .emit(ExecutionEvent::PipelineFailed {
                    run_id,
                    pipeline_id: pipeline.id.clone(),
                    errors: validation.errors.iter().map(ToString::to_string).collect(),
                })
                .await;

            return PipelineResult {
                run_id,
                pipeline_id: pipeline.id.clone(),
                status: PipelineStatus::Error,
                steps: Vec::new(),
                output: context.extract_output(pipeline.outputs.as_deref()),
                duration_ms: started.elapsed().as_millis() as u64,
                started_at,
                completed_at: Utc::now(),
                context: into_owned(context),
                validation_errors: validation.errors,
            };
        }

        let order = self.scheduler.execution_order(pipeline);
        debug!("Execution order for {}: {:?}", pipeline.id, order);

        let conditions: HashMap<&str, Result<Condition, ConditionError>> = pipeline
            .steps
            .iter()
            .filter_map(|s| {
                s.condition
                    .as_deref()
                    .map(|source| (s.id.as_str(), Condition::parse(source)))
            })
            .collect();

        let mut step_results = Vec::with_capacity(order.len());
        for step_id in &order {
            let Some(step) = pipeline.step(step_id) else {
                continue;
            };
            Arc::make_mut(&mut context).meta.current_step = Some(step.id.clone());

            let completed: HashSet<&str> =
                context.meta.completed_steps.iter().map(String::as_str).collect();
            if !step.dependencies_met(&completed) {
                step_results.push(self.skip(run_id, &step.id, DEPENDENCIES_NOT_MET).await);
                continue;
            }

            if let Some(condition) = conditions.get(step.id.as_str()) {
                let skip_reason = match condition {
                    Ok(condition) if condition.evaluate(&context) => None,
                    Ok(condition) => Some(format!("condition not met: {}", condition)),
                    Err(e) => Some(format!("condition error: {}", e)),
                };
                if let Some(reason) = skip_reason {
                    step_results.push(self.skip(run_id, &step.id, &reason).await);
                    continue;
                }
            }

            let Some(tool) = self.registry.get(&step.tool) else {
                // Unreachable after validation
                let message = format!("Unknown tool: {}", step.tool);
                Arc::make_mut(&mut context).record_error(&step.id, message.clone());
                step_results.push(StepResult::error(&step.id, message, 0, 0));
                continue;
            };

            let resolved = context.resolve_inputs(&step.inputs);
            debug!("Resolved inputs for {}: {:?}", step.id, resolved);

            let execution = self
                .executor
                .execute(run_id, step, tool, resolved, &context)
                .await;
            // Copies only if a timed-out handler still holds the snapshot
            let ctx = Arc::make_mut(&mut context);
            let duration_ms = execution.duration.as_millis() as u64;

            match execution.outcome {
                Ok(output) => {
                    ctx.record_success(&step.id, output.clone());
                    ctx.state.extend(execution.state_writes);
                    info!("Step {} completed in {}ms", step.id, duration_ms);
                    self.events
                        .emit(ExecutionEvent::StepCompleted {
                            run_id,
                            step_id: step.id.clone(),
                            duration_ms,
                        })
                        .await;
                    step_results.push(StepResult::success(
                        &step.id,
                        output,
                        execution.attempts,
                        duration_ms,
                    ));
                }
                Err(e) => {
                    let message = e.to_string();
                    ctx.record_error(&step.id, message.clone());
                    self.events
                        .emit(ExecutionEvent::StepFailed {
                            run_id,
                            step_id: step.id.clone(),
                            error: message.clone(),
                        })
                        .await;
                    step_results.push(StepResult::error(
                        &step.id,
                        message,
                        execution.attempts,
                        duration_ms,
                    ));
                }
            }
        }
        Arc::make_mut(&mut context).meta.current_step = None;

        let status = PipelineStatus::from_steps(&step_results);
        let output = context.extract_output(pipeline.outputs.as_deref());
        let duration_ms = started.elapsed().as_millis() as u64;

        info!(
            "Pipeline execution finished: {} - {} in {}ms",
            pipeline.name,
            status.as_str(),
            duration_ms
        );
        self.events
            .emit(ExecutionEvent::PipelineCompleted {
                run_id,
                pipeline_id: pipeline.id.clone(),
                status,
                duration_ms,
            })
            .await;

        PipelineResult {
            run_id,
            pipeline_id: pipeline.id.clone(),
            status,
            steps: step_results,
            output,
            duration_ms,
            started_at,
            completed_at: Utc::now(),
            context: into_owned(context),
            validation_errors: Vec::new(),
        }
    }

    async fn skip(&self, run_id: Uuid, step_id: &str, reason: &str) -> StepResult {
        info!("Skipping step {}: {}", step_id, reason);
        self.events
            .emit(ExecutionEvent::StepSkipped {
                run_id,
                step_id: step_id.to_string(),
                reason: reason.to_string(),
            })
            .await;
        StepResult::skipped(step_id, reason)
    }
}

fn into_owned(context: Arc<SharedContext>) -> SharedContext {
    Arc::try_unwrap(context).unwrap_or_else(|shared| (*shared).clone())
}

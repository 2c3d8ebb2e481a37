//! Step executor - invokes a step's tool with timeout, retry and backoff

use crate::core::{
    CoordinatorConfig, RegisteredTool, SharedContext, Step, StepError, ToolContext,
};
use crate::execution::events::{EventBus, ExecutionEvent};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Result of executing a step's attempt loop
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    /// Output of the successful attempt, or the last failure
    pub outcome: Result<Value, StepError>,

    /// Handler invocations made
    pub attempts: u32,

    /// State written by the successful attempt
    pub state_writes: Map<String, Value>,

    /// Wall time including backoff
    pub duration: Duration,
}

impl ExecutionResult {
    fn failed(error: StepError, attempts: u32, started: Instant) -> Self {
        Self {
            outcome: Err(error),
            attempts,
            state_writes: Map::new(),
            duration: started.elapsed(),
        }
    }
}

/// Executes a single step
#[derive(Debug, Clone)]
pub struct StepExecutor {
    config: CoordinatorConfig,
    events: EventBus,
}

impl StepExecutor {
    pub fn new(config: CoordinatorConfig, events: EventBus) -> Self {
        Self { config, events }
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    /// Retries after the first attempt for this step
    pub fn retries_for(&self, step: &Step) -> u32 {
        step.retries.unwrap_or(self.config.default_retries)
    }

    /// Per-attempt timeout for this step
    pub fn timeout_for(&self, step: &Step) -> Duration {
        Duration::from_millis(step.timeout_ms.unwrap_or(self.config.default_timeout_ms))
    }

    /// Run the attempt loop for one step.
    ///
    /// Each attempt races the handler against the step timeout. The handler
    /// runs on its own task: losing the race stops waiting for it but does
    /// not cancel it, so its side effects may still land later.
    ///
    /// Handlers see `context` through a shared snapshot; it is not copied.
    pub async fn execute(
        &self,
        run_id: Uuid,
        step: &Step,
        tool: &RegisteredTool,
        inputs: Map<String, Value>,
        context: &Arc<SharedContext>,
    ) -> ExecutionResult {
        let started = Instant::now();
        let max_retries = self.retries_for(step);
        let max_attempts = max_retries.saturating_add(1);
        let step_timeout = self.timeout_for(step);

        if self.config.enforce_input_schema {
            if let Err(reason) = tool.definition.input_schema.check(&inputs) {
                warn!("Step {} rejected before invocation: {}", step.id, reason);
                return ExecutionResult::failed(StepError::InvalidInput(reason), 0, started);
            }
        }

        let mut last_error = StepError::Execution("no attempt made".to_string());

        for attempt in 0..=max_retries {
            let attempt_number = attempt.saturating_add(1);
            info!("Executing step: {} (attempt {}/{})", step.id, attempt_number, max_attempts);
            self.events
                .emit(ExecutionEvent::StepStarted {
                    run_id,
                    step_id: step.id.clone(),
                    attempt: attempt_number,
                })
                .await;

            let tool_ctx = ToolContext::new(step.id.clone(), attempt_number, context.clone());
            match self.attempt(step, tool, inputs.clone(), tool_ctx.clone(), step_timeout).await {
                Ok(output) => {
                    debug!("Step {} output: {}", step.id, output);
                    return ExecutionResult {
                        outcome: Ok(output),
                        attempts: attempt_number,
                        state_writes: tool_ctx.take_state_writes(),
                        duration: started.elapsed(),
                    };
                }
                Err(e) => {
                    warn!("Step {} attempt {} failed: {}", step.id, attempt_number, e);
                    if attempt < max_retries {
                        let delay = self.config.backoff_delay(attempt);
                        self.events
                            .emit(ExecutionEvent::StepRetrying {
                                run_id,
                                step_id: step.id.clone(),
                                attempt: attempt_number,
                                delay_ms: delay.as_millis() as u64,
                                error: e.to_string(),
                            })
                            .await;
                        tokio::time::sleep(delay).await;
                    }
                    last_error = e;
                }
            }
        }

        error!(
            "Step {} failed after {} attempt(s): {}",
            step.id,
            max_attempts,
            last_error
        );
        ExecutionResult::failed(last_error, max_attempts, started)
    }

    async fn attempt(
        &self,
        step: &Step,
        tool: &RegisteredTool,
        inputs: Map<String, Value>,
        tool_ctx: ToolContext,
        step_timeout: Duration,
    ) -> Result<Value, StepError> {
        let handler = tool.handler.clone();
        let task = tokio::spawn(async move { handler.call(inputs, tool_ctx).await });

        match timeout(step_timeout, task).await {
            Ok(Ok(Ok(output))) => Ok(output),
            Ok(Ok(Err(e))) => Err(StepError::from(e)),
            Ok(Err(join_error)) => Err(StepError::Panicked(join_error.to_string())),
            Err(_) => {
                error!("Timeout for step {} after {}ms", step.id, step_timeout.as_millis());
                Err(StepError::Timeout {
                    timeout_ms: step_timeout.as_millis() as u64,
                })
            }
        }
    }
}

//! Execution events and the listener registry

use crate::core::PipelineStatus;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Events that can occur during pipeline execution
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionEvent {
    PipelineStarted {
        run_id: Uuid,
        pipeline_id: String,
    },
    /// Validation failed; no step ran
    PipelineFailed {
        run_id: Uuid,
        pipeline_id: String,
        errors: Vec<String>,
    },
    PipelineCompleted {
        run_id: Uuid,
        pipeline_id: String,
        status: PipelineStatus,
        duration_ms: u64,
    },
    StepStarted {
        run_id: Uuid,
        step_id: String,
        /// 1-based
        attempt: u32,
    },
    StepRetrying {
        run_id: Uuid,
        step_id: String,
        /// The attempt that just failed (1-based)
        attempt: u32,
        delay_ms: u64,
        error: String,
    },
    StepCompleted {
        run_id: Uuid,
        step_id: String,
        duration_ms: u64,
    },
    StepFailed {
        run_id: Uuid,
        step_id: String,
        error: String,
    },
    StepSkipped {
        run_id: Uuid,
        step_id: String,
        reason: String,
    },
}

impl ExecutionEvent {
    /// The run that produced this event
    pub fn run_id(&self) -> Uuid {
        match self {
            ExecutionEvent::PipelineStarted { run_id, .. }
            | ExecutionEvent::PipelineFailed { run_id, .. }
            | ExecutionEvent::PipelineCompleted { run_id, .. }
            | ExecutionEvent::StepStarted { run_id, .. }
            | ExecutionEvent::StepRetrying { run_id, .. }
            | ExecutionEvent::StepCompleted { run_id, .. }
            | ExecutionEvent::StepFailed { run_id, .. }
            | ExecutionEvent::StepSkipped { run_id, .. } => *run_id,
        }
    }

    /// Wire name, e.g. `step-skip`
    pub fn name(&self) -> &'static str {
        match self {
            ExecutionEvent::PipelineStarted { .. } => "pipeline-start",
            ExecutionEvent::PipelineFailed { .. } => "pipeline-error",
            ExecutionEvent::PipelineCompleted { .. } => "pipeline-complete",
            ExecutionEvent::StepStarted { .. } => "step-start",
            ExecutionEvent::StepRetrying { .. } => "step-retry",
            ExecutionEvent::StepCompleted { .. } => "step-complete",
            ExecutionEvent::StepFailed { .. } => "step-error",
            ExecutionEvent::StepSkipped { .. } => "step-skip",
        }
    }
}

/// Type for event handlers
pub type EventHandler = Arc<dyn Fn(ExecutionEvent) + Send + Sync>;

/// Listener registry shared by the engine and its executor
#[derive(Clone, Default)]
pub struct EventBus {
    handlers: Arc<Mutex<Vec<EventHandler>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an event handler
    pub async fn subscribe<F>(&self, handler: F)
    where
        F: Fn(ExecutionEvent) + Send + Sync + 'static,
    {
        self.handlers.lock().await.push(Arc::new(handler));
    }

    /// Emit an event to all handlers, in registration order
    pub async fn emit(&self, event: ExecutionEvent) {
        let handlers = self.handlers.lock().await.clone();
        for handler in handlers.iter() {
            handler(event.clone());
        }
    }

    pub async fn handler_count(&self) -> usize {
        self.handlers.lock().await.len()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus").finish_non_exhaustive()
    }
}

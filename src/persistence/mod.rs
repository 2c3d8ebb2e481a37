//! Persistence layer for run history

#[cfg(feature = "sqlite")]
pub mod store;

#[cfg(feature = "sqlite")]
pub use store::SqliteExecutionStore;

use crate::core::{Pipeline, PipelineResult, PipelineStatus, StepStatus};
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Summary of one pipeline run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionSummary {
    pub run_id: Uuid,

    pub pipeline_id: String,

    pub pipeline_name: String,

    pub status: PipelineStatus,

    pub started_at: DateTime<Utc>,

    pub completed_at: DateTime<Utc>,

    pub duration_ms: u64,

    pub succeeded: usize,

    pub failed: usize,

    pub skipped: usize,

    /// Steps declared by the pipeline
    pub total_steps: usize,

    /// First recorded step error or validation error
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_error: Option<String>,
}

/// Trait for persistence backends
#[async_trait::async_trait]
pub trait PersistenceBackend: Send + Sync {
    async fn save_execution(&self, summary: &ExecutionSummary) -> Result<()>;

    async fn load_execution(&self, run_id: Uuid) -> Result<Option<ExecutionSummary>>;

    /// Runs of one pipeline, newest first
    async fn list_executions(&self, pipeline_id: &str) -> Result<Vec<ExecutionSummary>>;

    /// Most recent runs across all pipelines
    async fn recent_executions(&self, limit: usize) -> Result<Vec<ExecutionSummary>>;

    /// Pipeline ids with at least one recorded run, sorted
    async fn list_pipelines(&self) -> Result<Vec<String>>;
}

/// In-memory persistence (for testing or ephemeral use)
#[derive(Default)]
pub struct InMemoryPersistence {
    executions: RwLock<HashMap<Uuid, ExecutionSummary>>,
}

impl InMemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }
}

fn newest_first(mut runs: Vec<ExecutionSummary>) -> Vec<ExecutionSummary> {
    runs.sort_by(|a, b| b.started_at.cmp(&a.started_at));
    runs
}

#[async_trait::async_trait]
impl PersistenceBackend for InMemoryPersistence {
    async fn save_execution(&self, summary: &ExecutionSummary) -> Result<()> {
        self.executions
            .write()
            .await
            .insert(summary.run_id, summary.clone());
        Ok(())
    }

    async fn load_execution(&self, run_id: Uuid) -> Result<Option<ExecutionSummary>> {
        Ok(self.executions.read().await.get(&run_id).cloned())
    }

    async fn list_executions(&self, pipeline_id: &str) -> Result<Vec<ExecutionSummary>> {
        let execs = self.executions.read().await;
        Ok(newest_first(
            execs
                .values()
                .filter(|s| s.pipeline_id == pipeline_id)
                .cloned()
                .collect(),
        ))
    }

    async fn recent_executions(&self, limit: usize) -> Result<Vec<ExecutionSummary>> {
        let execs = self.executions.read().await;
        let mut runs = newest_first(execs.values().cloned().collect());
        runs.truncate(limit);
        Ok(runs)
    }

    async fn list_pipelines(&self) -> Result<Vec<String>> {
        let execs = self.executions.read().await;
        let mut ids: Vec<String> = execs.values().map(|s| s.pipeline_id.clone()).collect();
        ids.sort();
        ids.dedup();
        Ok(ids)
    }
}

/// Create a summary from a finished run
pub fn create_summary(pipeline: &Pipeline, result: &PipelineResult) -> ExecutionSummary {
    let first_error = result
        .validation_errors
        .first()
        .map(ToString::to_string)
        .or_else(|| result.context.meta.errors.first().map(|e| format!("{}: {}", e.step, e.error)));

    ExecutionSummary {
        run_id: result.run_id,
        pipeline_id: result.pipeline_id.clone(),
        pipeline_name: pipeline.name.clone(),
        status: result.status,
        started_at: result.started_at,
        completed_at: result.completed_at,
        duration_ms: result.duration_ms,
        succeeded: result.count(StepStatus::Success),
        failed: result.count(StepStatus::Error),
        skipped: result.count(StepStatus::Skipped),
        total_steps: pipeline.steps.len(),
        first_error,
    }
}

//! Execution scheduler - determines the order steps run in

use crate::core::Pipeline;
use std::collections::{HashMap, HashSet};

/// Strategy for scheduling step execution
///
/// Only sequential execution is offered: independent branches still run
/// one after another, in dependency order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SchedulingStrategy {
    /// Execute steps in dependency order, one at a time
    #[default]
    Sequential,
}

/// Computes the run order of a pipeline
pub struct ExecutionScheduler {
    strategy: SchedulingStrategy,
}

impl ExecutionScheduler {
    pub fn new(strategy: SchedulingStrategy) -> Self {
        Self { strategy }
    }

    pub fn strategy(&self) -> SchedulingStrategy {
        self.strategy
    }

    /// Topological order: every step after all of its dependencies.
    ///
    /// Roots are visited in declaration order. A single visited set makes
    /// this terminate even on cyclic input; unknown dependency ids are ignored.
    pub fn execution_order(&self, pipeline: &Pipeline) -> Vec<String> {
        let steps: HashMap<&str, &Vec<String>> = pipeline
            .steps
            .iter()
            .map(|s| (s.id.as_str(), &s.depends_on))
            .collect();

        let mut order = Vec::with_capacity(pipeline.steps.len());
        let mut visited = HashSet::new();

        for step in &pipeline.steps {
            Self::visit(&step.id, &steps, &mut visited, &mut order);
        }

        order
    }

    fn visit<'p>(
        step_id: &'p str,
        steps: &HashMap<&'p str, &'p Vec<String>>,
        visited: &mut HashSet<&'p str>,
        order: &mut Vec<String>,
    ) {
        let Some(&deps) = steps.get(step_id) else {
            return;
        };
        if !visited.insert(step_id) {
            return;
        }

        for dep in deps {
            Self::visit(dep, steps, visited, order);
        }

        order.push(step_id.to_string());
    }
}

impl Default for ExecutionScheduler {
    fn default() -> Self {
        Self::new(SchedulingStrategy::Sequential)
    }
}

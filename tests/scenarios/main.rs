//! Scenario-based tests for ptc

#[path = "../helpers.rs"]
mod helpers;

mod concurrent_runs;
mod conditions;
mod failure_handling;
mod retry_behavior;
mod success_chain;
mod validation;
mod variable_substitution;

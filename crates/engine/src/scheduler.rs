// SPDX-License-Identifier: MIT

//! `findNextReadyStep` (spec §4.3): deterministic scheduling over a
//! workflow's ordered steps and a run's per-step state.

use ferretbot_registry::WorkflowDefinition;

use crate::run::{Run, StepState};

/// Outcome of a scheduling pass.
pub enum Readiness {
    /// A step is ready to activate.
    Ready(String),
    /// No step is ready, but the run is done: every step is terminal.
    Complete,
    /// No step is ready and at least one is still suspended
    /// (active/waiting); the run stays as-is.
    Suspended,
}

/// Walk `workflow.steps` in source order and return the first one whose
/// run-state is `pending` and whose every `dependsOn` id has resolved to
/// `completed` or `skipped`. Ties are broken by source order.
pub fn find_next_ready_step(workflow: &WorkflowDefinition, run: &Run) -> Readiness {
    for step in &workflow.steps {
        let Some(run_step) = run.steps.get(&step.id) else { continue };
        if run_step.state != StepState::Pending {
            continue;
        }
        let deps_ready = step
            .depends_on
            .iter()
            .all(|dep| run.steps.get(dep).map(|d| d.state.is_terminal_ready()).unwrap_or(false));
        if deps_ready {
            return Readiness::Ready(step.id.clone());
        }
    }

    let all_terminal = run.steps.values().all(|s| matches!(s.state, StepState::Completed | StepState::Skipped));
    if all_terminal {
        Readiness::Complete
    } else {
        Readiness::Suspended
    }
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;

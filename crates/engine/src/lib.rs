// SPDX-License-Identifier: MIT

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! ferretbot-engine: the workflow engine (spec §4.3). Owns run records,
//! schedules step execution over a workflow's DAG, coordinates retries and
//! approval/wait-for-input gates, and persists every mutation as a JSON
//! snapshot.

mod engine;
mod error;
mod name_extractor;
mod persistence;
mod run;
mod scheduler;
mod template;
mod workspace;

pub use engine::Engine;
pub use error::EngineError;
pub use name_extractor::{HeuristicNameExtractor, NameExtractor};
pub use run::{CheckResultRecord, Run, RunFailure, RunState, RunStep, RunSummary, StepResultMeta, StepState};
pub use scheduler::{find_next_ready_step, Readiness};
pub use template::render_template;
pub use workspace::{Workspace, WorkspaceError};

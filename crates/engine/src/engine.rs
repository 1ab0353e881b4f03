// SPDX-License-Identifier: MIT

//! The workflow engine (spec §4.3): owns run records, schedules step
//! execution, coordinates retries and failure classification, and persists
//! every mutation to `<storage_dir>/run-<id>.json`.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use ferretbot_bus::EventBus;
use ferretbot_checks::{Check, CheckContext, CheckRegistry};
use ferretbot_core::{Clock, PartialEnvelope};
use ferretbot_registry::{OnFail, StepKind, WorkflowDefinition, WorkflowRegistry, WorkflowStep};
use futures::future::BoxFuture;
use parking_lot::Mutex;
use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};

use crate::error::EngineError;
use crate::name_extractor::NameExtractor;
use crate::persistence;
use crate::run::{CheckResultRecord, Run, RunFailure, RunState, RunStep, RunSummary, StepState, StepResultMeta};
use crate::scheduler::{find_next_ready_step, Readiness};
use crate::template::render_template;
use crate::workspace::Workspace;

struct Inner {
    bus: EventBus,
    registry: WorkflowRegistry,
    workspace: Arc<dyn Workspace>,
    storage_dir: PathBuf,
    clock: Arc<dyn Clock>,
    name_extractor: Arc<dyn NameExtractor>,
    check_registry: CheckRegistry,
    runs: Mutex<HashMap<u64, Run>>,
    next_id: AtomicU64,
    /// Envelopes (session_id, timestamp_ms) a `wait_for_input` gate has
    /// already consumed, so a second subscriber checking in can skip them.
    /// See spec.md §4.3's "mark the envelope as consumed" clause — there is
    /// no mutable field on `Envelope` itself since each subscriber receives
    /// its own clone, so consumption is tracked out of band here instead.
    consumed_inputs: Mutex<HashSet<(String, u64)>>,
}

/// Owns every in-flight and completed run. Cheaply clonable; every clone
/// shares the same run table and bus subscriptions.
#[derive(Clone)]
pub struct Engine {
    inner: Arc<Inner>,
}

impl Engine {
    /// Build an engine over `storage_dir`, recovering any `run-<id>.json`
    /// snapshots already there, and install its bus subscriptions. Seeds its
    /// own built-in `CheckRegistry`; use [`Engine::with_check_registry`] to
    /// inject one carrying additional check kinds.
    pub fn new(
        bus: EventBus,
        registry: WorkflowRegistry,
        workspace: Arc<dyn Workspace>,
        storage_dir: PathBuf,
        clock: Arc<dyn Clock>,
        name_extractor: Arc<dyn NameExtractor>,
    ) -> Self {
        Self::with_check_registry(bus, registry, workspace, storage_dir, clock, name_extractor, CheckRegistry::new())
    }

    /// As [`Engine::new`], but with an explicit, caller-supplied
    /// [`CheckRegistry`] — the dependency-injection point design note §9
    /// calls for rather than a process-wide global.
    #[allow(clippy::too_many_arguments)]
    pub fn with_check_registry(
        bus: EventBus,
        registry: WorkflowRegistry,
        workspace: Arc<dyn Workspace>,
        storage_dir: PathBuf,
        clock: Arc<dyn Clock>,
        name_extractor: Arc<dyn NameExtractor>,
        check_registry: CheckRegistry,
    ) -> Self {
        let recovered = persistence::recover_runs(&storage_dir);
        let next_id = recovered.iter().map(|r| r.id).max().map(|id| id + 1).unwrap_or(1);
        let runs: HashMap<u64, Run> = recovered.into_iter().map(|r| (r.id, r)).collect();
        tracing::info!(count = runs.len(), "recovered run snapshots");

        let inner = Arc::new(Inner {
            bus,
            registry,
            workspace,
            storage_dir,
            clock,
            name_extractor,
            check_registry,
            runs: Mutex::new(runs),
            next_id: AtomicU64::new(next_id),
            consumed_inputs: Mutex::new(HashSet::new()),
        });
        let engine = Self { inner };
        engine.install_subscriptions();
        engine
    }

    fn install_subscriptions(&self) {
        let on_complete = self.clone();
        self.inner.bus.subscribe("workflow:step:complete", move |envelope| {
            let engine = on_complete.clone();
            Box::pin(async move {
                engine.on_step_complete_event(envelope).await;
                Ok(())
            })
        });

        let on_input = self.clone();
        self.inner.bus.subscribe("user:input", move |envelope| {
            let engine = on_input.clone();
            Box::pin(async move {
                engine.on_user_input(envelope).await;
                Ok(())
            })
        });
    }

    fn now(&self) -> u64 {
        self.inner.clock.epoch_ms()
    }

    pub fn list_runs(&self) -> Vec<RunSummary> {
        let mut runs: Vec<RunSummary> = self.inner.runs.lock().values().map(RunSummary::from).collect();
        runs.sort_by_key(|r| r.id);
        runs
    }

    pub fn get_run(&self, run_id: u64) -> Option<Run> {
        self.inner.runs.lock().get(&run_id).cloned()
    }

    fn workflow_for(&self, run: &Run) -> Option<WorkflowDefinition> {
        self.inner.registry.get(&run.workflow_id, Some(&run.workflow_version))
    }

    fn save(&self, run: &Run) {
        if let Err(e) = persistence::persist_run(&self.inner.storage_dir, run) {
            tracing::error!(run_id = run.id, error = %e, "failed to persist run snapshot");
        }
    }

    async fn emit(&self, r#type: &str, content: Value) {
        self.inner.bus.emit(PartialEnvelope::new(r#type, content)).await;
    }

    /// Validate the workflow exists, allocate a run id, snapshot every step
    /// as `pending`, and kick off scheduling.
    pub async fn start_run(
        &self,
        workflow_id: &str,
        version: Option<&str>,
        args: Map<String, Value>,
    ) -> Result<u64, EngineError> {
        let workflow = self.inner.registry.get(workflow_id, version).ok_or_else(|| {
            EngineError::WorkflowNotFound { id: workflow_id.to_string(), version: version.map(str::to_string) }
        })?;

        let id = self.inner.next_id.fetch_add(1, Ordering::SeqCst);
        let now = self.now();
        let steps = workflow.steps.iter().map(|s| (s.id.clone(), RunStep::pending(&s.id))).collect();
        let run = Run {
            id,
            workflow_id: workflow.id.clone(),
            workflow_version: workflow.version.clone(),
            state: RunState::Queued,
            args,
            steps,
            failure: None,
            created_at_ms: now,
            updated_at_ms: now,
        };
        tracing::info!(run_id = id, workflow_id = %workflow.id, version = %workflow.version, "run queued");
        self.save(&run);
        self.inner.runs.lock().insert(id, run);
        self.emit("workflow:run:queued", json!({"runId": id, "workflowId": workflow.id, "workflowVersion": workflow.version})).await;

        self.advance(id).await;
        Ok(id)
    }

    /// Resume a run that was suspended at an approval gate.
    pub async fn resume_run(&self, run_id: u64) -> Result<(), EngineError> {
        let mut run = self.inner.runs.lock().get(&run_id).cloned().ok_or(EngineError::RunNotFound(run_id))?;
        if run.state != RunState::WaitingApproval {
            return Ok(());
        }
        let workflow = self.workflow_for(&run).ok_or_else(|| EngineError::WorkflowNotFound {
            id: run.workflow_id.clone(),
            version: Some(run.workflow_version.clone()),
        })?;
        if let Readiness::Ready(step_id) = find_next_ready_step(&workflow, &run) {
            if let Some(step) = run.steps.get_mut(&step_id) {
                step.approved = true;
            }
        }
        run.state = RunState::Running;
        run.updated_at_ms = self.now();
        self.save(&run);
        self.inner.runs.lock().insert(run_id, run);
        self.advance(run_id).await;
        Ok(())
    }

    /// Unconditionally cancel a run.
    pub async fn cancel_run(&self, run_id: u64) -> Result<(), EngineError> {
        let mut run = self.inner.runs.lock().get(&run_id).cloned().ok_or(EngineError::RunNotFound(run_id))?;
        run.state = RunState::Cancelled;
        run.failure = None;
        run.updated_at_ms = self.now();
        tracing::info!(run_id, "run cancelled");
        self.save(&run);
        self.inner.runs.lock().insert(run_id, run);
        self.emit("workflow:run:complete", json!({"runId": run_id, "state": "cancelled"})).await;
        Ok(())
    }

    /// Drive scheduling forward. Selects the next ready step, handles the
    /// approval and wait-for-input gates, executes system steps inline, and
    /// (via `complete_active_step`) re-enters itself as the spec prescribes.
    pub fn advance(&self, run_id: u64) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            let Some(mut run) = self.inner.runs.lock().get(&run_id).cloned() else {
                tracing::warn!(run_id, "advance called for unknown run");
                return;
            };
            if run.state != RunState::Queued && run.state != RunState::Running {
                return;
            }
            let Some(workflow) = self.workflow_for(&run) else {
                tracing::error!(run_id, workflow_id = %run.workflow_id, "workflow definition missing during advance");
                return;
            };

            match find_next_ready_step(&workflow, &run) {
                Readiness::Complete => {
                    run.state = RunState::Completed;
                    run.updated_at_ms = self.now();
                    tracing::info!(run_id, "run completed");
                    self.save(&run);
                    self.inner.runs.lock().insert(run_id, run);
                    self.emit("workflow:run:complete", json!({"runId": run_id, "state": "completed"})).await;
                }
                Readiness::Suspended => {}
                Readiness::Ready(step_id) => {
                    // `step_id` was just returned by `find_next_ready_step`
                    // scanning this same `workflow.steps`, so the lookup
                    // cannot fail.
                    #[allow(clippy::expect_used)]
                    let step_def =
                        workflow.steps.iter().find(|s| s.id == step_id).expect("scheduler returned unknown step");

                    if step_def.approval && !run.steps.get(&step_id).map(|s| s.approved).unwrap_or(false) {
                        run.state = RunState::WaitingApproval;
                        run.updated_at_ms = self.now();
                        tracing::info!(run_id, step_id = %step_id, "run waiting for approval");
                        self.save(&run);
                        self.inner.runs.lock().insert(run_id, run);
                        self.emit("workflow:needs_approval", json!({"runId": run_id, "stepId": step_id})).await;
                        return;
                    }

                    if step_def.kind == StepKind::WaitForInput {
                        run.state = RunState::WaitingInput;
                        run.updated_at_ms = self.now();
                        if let Some(step) = run.steps.get_mut(&step_id) {
                            step.state = StepState::Active;
                            step.started_at_ms = Some(self.now());
                        }
                        let prompt = step_def.prompt.clone().unwrap_or_default();
                        tracing::info!(run_id, step_id = %step_id, "run waiting for input");
                        self.save(&run);
                        self.inner.runs.lock().insert(run_id, run);
                        self.emit("workflow:needs_input", json!({"runId": run_id, "stepId": step_id, "prompt": prompt})).await;
                        self.emit("agent:response", json!({"text": prompt})).await;
                        return;
                    }

                    if let Some(step) = run.steps.get_mut(&step_id) {
                        step.state = StepState::Active;
                        step.started_at_ms = Some(self.now());
                    }
                    run.state = RunState::Running;
                    run.updated_at_ms = self.now();
                    tracing::info!(run_id, step_id = %step_id, kind = ?step_def.kind, "step activated");
                    self.save(&run);
                    self.inner.runs.lock().insert(run_id, run.clone());
                    self.emit(
                        "workflow:step:start",
                        json!({
                            "runId": run_id,
                            "workflowId": workflow.id,
                            "workflowVersion": workflow.version,
                            "stepId": step_id,
                            "workflowDir": workflow.dir,
                            "totalSteps": workflow.steps.len(),
                        }),
                    )
                    .await;

                    if step_def.kind.is_system() {
                        let (result, meta) = self.execute_system_step(step_def, &run).await;
                        self.complete_active_step(run_id, &step_id, result, meta, false).await;
                    }
                    // Agent steps: the bus carries `workflow:step:complete` from the agent loop.
                }
            }
        })
    }

    async fn execute_system_step(&self, step: &WorkflowStep, run: &Run) -> (String, StepResultMeta) {
        let args_value = json!({"args": run.args});
        let path = step.path.as_deref().unwrap_or_default();
        let rendered_path = render_template(path, &args_value);
        let outcome = match step.kind {
            StepKind::SystemWriteFile => {
                let content = render_template(step.content.as_deref().unwrap_or_default(), &args_value);
                self.inner.workspace.write_text_file(&rendered_path, &content).await
            }
            StepKind::SystemEnsureFile => {
                let content = render_template(step.content.as_deref().unwrap_or_default(), &args_value);
                self.inner.workspace.ensure_text_file(&rendered_path, &content).await
            }
            StepKind::SystemDeleteFile => self.inner.workspace.remove_path(&rendered_path).await,
            StepKind::Agent | StepKind::WaitForInput => unreachable!("non-system step routed to execute_system_step"),
        };
        match outcome {
            Ok(()) => ("ok".to_string(), StepResultMeta::default()),
            Err(e) => (format!("tool_error: {e}"), StepResultMeta::default()),
        }
    }

    /// Process a completion signal for the currently-active step of `run_id`
    /// — either from the bus (`workflow:step:complete` for agent/wait steps)
    /// or called inline by `advance` for system steps.
    pub fn complete_active_step(
        &self,
        run_id: u64,
        step_id: &str,
        result: String,
        meta: StepResultMeta,
        reemit: bool,
    ) -> BoxFuture<'_, ()> {
        let step_id = step_id.to_string();
        Box::pin(async move {
            let Some(mut run) = self.inner.runs.lock().get(&run_id).cloned() else { return };
            if run.state != RunState::Running && run.state != RunState::Queued {
                tracing::debug!(run_id, step_id = %step_id, state = ?run.state, "ignoring stale step completion");
                return;
            }
            let Some(workflow) = self.workflow_for(&run) else { return };
            let Some(step_def) = workflow.steps.iter().find(|s| s.id == step_id).cloned() else {
                tracing::warn!(run_id, step_id = %step_id, "completion for unknown step");
                return;
            };
            {
                let Some(run_step) = run.steps.get(&step_id) else { return };
                if run_step.state != StepState::Active {
                    tracing::debug!(run_id, step_id = %step_id, state = ?run_step.state, "ignoring completion for inactive step");
                    return;
                }
            }

            if let Some(run_step) = run.steps.get_mut(&step_id) {
                run_step.attempt_count += 1;
            }

            let step_results: HashMap<String, Value> = run
                .steps
                .iter()
                .filter(|(_, s)| s.state == StepState::Completed)
                .map(|(id, s)| (id.clone(), Value::String(s.result.clone())))
                .collect();
            let checks: Vec<Check> =
                step_def.done_when.iter().map(|c| Check::new(c.r#type.clone(), c.params.clone())).collect();
            let ctx = CheckContext {
                step_output: result.clone(),
                tool_results: meta.tool_results.clone(),
                workflow_inputs: run.args.clone(),
                step_results,
            };
            let outcome = self.inner.check_registry.evaluate(&checks, &ctx);
            let check_records: Vec<CheckResultRecord> = outcome.results.iter().map(CheckResultRecord::from).collect();

            if outcome.passed {
                let now = self.now();
                if let Some(run_step) = run.steps.get_mut(&step_id) {
                    run_step.state = StepState::Completed;
                    run_step.result = result.clone();
                    run_step.result_meta = meta.clone();
                    run_step.last_failure_hash = None;
                    run_step.completed_at_ms = Some(now);
                    run_step.check_results = check_records;
                }
                run.updated_at_ms = now;
                tracing::info!(run_id, step_id = %step_id, "step completed");
                self.save(&run);
                self.inner.runs.lock().insert(run_id, run);
                if reemit {
                    self.emit(
                        "workflow:step:complete",
                        json!({"runId": run_id, "stepId": step_id, "result": result, "toolResults": meta.tool_results, "artifacts": meta.artifacts}),
                    )
                    .await;
                }
                self.advance(run_id).await;
                return;
            }

            let failure_hash = hash_failure(&result, &meta);
            let previously_failed_same_way = run.steps.get(&step_id).and_then(|s| s.last_failure_hash.as_deref()) == Some(failure_hash.as_str());

            if previously_failed_same_way {
                run.state = RunState::Blocked;
                run.failure = Some(RunFailure {
                    code: "no_progress".to_string(),
                    message: "identical failed output twice".to_string(),
                    step_id: Some(step_id.clone()),
                    attempts: run.steps.get(&step_id).map(|s| s.attempt_count).unwrap_or(0),
                });
                if let Some(run_step) = run.steps.get_mut(&step_id) {
                    run_step.state = StepState::Failed;
                    run_step.check_results = check_records;
                }
                run.updated_at_ms = self.now();
                tracing::warn!(run_id, step_id = %step_id, "no-progress detected, run blocked");
                self.save(&run);
                self.inner.runs.lock().insert(run_id, run);
                self.emit("workflow:run:complete", json!({"runId": run_id, "state": "blocked"})).await;
                return;
            }

            if let Some(run_step) = run.steps.get_mut(&step_id) {
                run_step.last_failure_hash = Some(failure_hash);
                run_step.check_results = check_records.clone();
            }

            let retries = step_def.retries;
            let retry_count = run.steps.get(&step_id).map(|s| s.retry_count).unwrap_or(0);
            if retry_count < retries {
                if let Some(run_step) = run.steps.get_mut(&step_id) {
                    run_step.retry_count += 1;
                    run_step.state = StepState::Pending;
                    run_step.started_at_ms = None;
                }
                run.updated_at_ms = self.now();
                tracing::info!(run_id, step_id = %step_id, retry_count = retry_count + 1, "step check failed, retrying");
                self.save(&run);
                self.inner.runs.lock().insert(run_id, run);
                self.advance(run_id).await;
                return;
            }

            let message = check_records.iter().find(|r| !r.passed).and_then(|r| r.message.clone()).unwrap_or_else(|| "doneWhen check failed".to_string());
            if let Some(run_step) = run.steps.get_mut(&step_id) {
                run_step.state = StepState::Failed;
            }
            run.failure = Some(RunFailure {
                code: "check_failed".to_string(),
                message,
                step_id: Some(step_id.clone()),
                attempts: run.steps.get(&step_id).map(|s| s.attempt_count).unwrap_or(0),
            });
            run.state = if step_def.on_fail == OnFail::Blocked { RunState::Blocked } else { RunState::Failed };
            run.updated_at_ms = self.now();
            tracing::warn!(run_id, step_id = %step_id, state = ?run.state, "step failed, retries exhausted");
            let final_state = run.state;
            self.save(&run);
            self.inner.runs.lock().insert(run_id, run);
            let state_str = match final_state {
                RunState::Blocked => "blocked",
                _ => "failed",
            };
            self.emit("workflow:run:complete", json!({"runId": run_id, "state": state_str})).await;
        })
    }

    async fn on_step_complete_event(&self, envelope: ferretbot_core::Envelope) {
        let Some(run_id) = envelope.content.get("runId").and_then(Value::as_u64) else { return };
        let Some(step_id) = envelope.content.get("stepId").and_then(Value::as_str) else { return };
        // Events re-emitted by this engine for downstream observers (`reemit`)
        // would otherwise be picked straight back up here; ignore completions
        // for steps that are no longer active rather than special-casing the
        // re-emit in the subscription itself.
        let Some(run) = self.inner.runs.lock().get(&run_id).cloned() else { return };
        if run.steps.get(step_id).map(|s| s.state != StepState::Active).unwrap_or(true) {
            return;
        }
        let result = envelope.content.get("result").and_then(Value::as_str).unwrap_or_default().to_string();
        let meta = StepResultMeta {
            tool_calls: envelope.content.get("toolCalls").and_then(Value::as_array).cloned().unwrap_or_default(),
            tool_results: envelope.content.get("toolResults").and_then(Value::as_array).cloned().unwrap_or_default(),
            artifacts: envelope.content.get("artifacts").and_then(Value::as_array).cloned().unwrap_or_default(),
        };
        self.complete_active_step(run_id, step_id, result, meta, false).await;
    }

    async fn on_user_input(&self, envelope: ferretbot_core::Envelope) {
        let key = (envelope.session_id.clone(), envelope.timestamp_ms);
        if self.inner.consumed_inputs.lock().contains(&key) {
            return;
        }
        let text = envelope.content.get("text").and_then(Value::as_str).unwrap_or_default().trim().to_string();

        let waiting_runs: Vec<u64> = self
            .inner
            .runs
            .lock()
            .values()
            .filter(|r| r.state == RunState::WaitingInput)
            .map(|r| r.id)
            .collect();

        for run_id in waiting_runs {
            let Some(mut run) = self.inner.runs.lock().get(&run_id).cloned() else { continue };
            let bound_session = run.args.get("sessionId").and_then(Value::as_str).map(str::to_string);
            // A run started with `args.bootstrap = true` is the one that
            // greets a freshly-connected client before any session is
            // established; unlike an ordinary run it is allowed to rebind
            // to a new sessionId on reconnect instead of staying pinned.
            let is_bootstrap_run = run.args.get("bootstrap").and_then(Value::as_bool).unwrap_or(false);
            let unbound = bound_session.is_none();
            let rebinding = is_bootstrap_run && bound_session.as_deref().is_some_and(|b| b != envelope.session_id);
            if let Some(bound) = &bound_session {
                if bound != &envelope.session_id && !rebinding {
                    continue;
                }
            }

            let Some(workflow) = self.workflow_for(&run) else { continue };
            // The waiting step was already moved to `Active` by `advance`
            // when the run entered `WaitingInput`, so it is no longer
            // `Pending` and `find_next_ready_step` would never see it.
            let Some((step_id, _)) =
                run.steps.iter().find(|(_, s)| s.state == StepState::Active).map(|(id, s)| (id.clone(), s))
            else {
                continue;
            };
            let Some(step_def) = workflow.steps.iter().find(|s| s.id == step_id) else { continue };
            if step_def.kind != StepKind::WaitForInput {
                continue;
            }

            if unbound || rebinding {
                run.args.insert("sessionId".to_string(), Value::String(envelope.session_id.clone()));
            }
            if rebinding {
                // Reconnect on a bootstrap run: rebind and re-show the
                // prompt rather than consuming this message as the answer.
                run.updated_at_ms = self.now();
                self.save(&run);
                self.inner.runs.lock().insert(run_id, run);
                self.inner.consumed_inputs.lock().insert(key.clone());
                let prompt = step_def.prompt.clone().unwrap_or_default();
                self.emit("workflow:needs_input", json!({"runId": run_id, "stepId": step_id, "prompt": prompt})).await;
                self.emit("agent:response", json!({"text": prompt})).await;
                return;
            }

            let wants_name = step_def.prompt.as_deref().unwrap_or_default().to_lowercase().contains("name");
            let resolved = if wants_name { self.inner.name_extractor.resolve_name_reply(&text) } else { Some(text.clone()) };

            let Some(resolved) = resolved else {
                // No recognizable name in this reply (spec.md §8 scenario
                // 5): the session is now bound, but the gate stays open for
                // another attempt rather than completing on a guess.
                run.updated_at_ms = self.now();
                self.save(&run);
                self.inner.runs.lock().insert(run_id, run);
                self.inner.consumed_inputs.lock().insert(key.clone());
                return;
            };

            if let Some(key_name) = &step_def.response_key {
                run.args.insert(key_name.clone(), Value::String(resolved));
            }
            // The run is still `WaitingInput` here; `complete_active_step`
            // only progresses runs in `Running`/`Queued` (spec.md §4.3 — a
            // run resumes to `running` once the wait-for-input response is
            // captured), so flip it back before handing off the completion.
            run.state = RunState::Running;
            run.updated_at_ms = self.now();
            self.save(&run);
            self.inner.runs.lock().insert(run_id, run);
            self.inner.consumed_inputs.lock().insert(key.clone());

            self.complete_active_step(run_id, &step_id, text.clone(), StepResultMeta::default(), false).await;
            return;
        }
    }
}

fn hash_failure(result: &str, meta: &StepResultMeta) -> String {
    let canonical = json!({"resultText": result, "toolResults": meta.tool_results, "artifacts": meta.artifacts});
    let mut hasher = Sha256::new();
    hasher.update(canonical.to_string().as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;

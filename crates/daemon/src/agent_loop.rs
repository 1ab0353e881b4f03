// SPDX-License-Identifier: MIT

//! The agent loop (spec §4.7): turns one `workflow:step:start` event for an
//! `Agent` step into a bounded sequence of `Provider::chat_completion` /
//! `ToolRegistry::execute` rounds, then emits `workflow:step:complete`.
//!
//! Thin glue over the four collaborator traits of §6 — not part of the
//! core triad, not subject to §8's invariants — but implemented for real so
//! the daemon binary runs an agent step end to end against a configured
//! `Provider`.

use std::sync::Arc;

use ferretbot_bus::EventBus;
use ferretbot_collab::{
    ChatRequest, Provider, SessionMemory, SkillLoader, SkillRequest, ToolCall, ToolRegistry,
    Workspace,
};
use ferretbot_context::{BuildMessagesRequest, ContextAssembler, LayerBudgets, Message, Role};
use ferretbot_core::PartialEnvelope;
use ferretbot_registry::{StepKind, WorkflowRegistry};
use serde_json::{json, Value};

/// Default cap on provider/tool round-trips for a single agent step (spec
/// §4.7); exceeding it surfaces as a `tool_error` rather than looping
/// forever against a provider that never stops calling tools.
pub const DEFAULT_MAX_TOOL_ITERATIONS: usize = 8;

pub struct AgentLoop {
    bus: EventBus,
    registry: WorkflowRegistry,
    tools: Arc<dyn ToolRegistry>,
    skills: Arc<dyn SkillLoader>,
    provider: Option<Arc<dyn Provider>>,
    memory: Arc<dyn SessionMemory>,
    workspace: Arc<dyn Workspace>,
    context: ContextAssembler,
    model: String,
    max_tool_iterations: usize,
}

impl AgentLoop {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        bus: EventBus,
        registry: WorkflowRegistry,
        tools: Arc<dyn ToolRegistry>,
        skills: Arc<dyn SkillLoader>,
        provider: Option<Arc<dyn Provider>>,
        memory: Arc<dyn SessionMemory>,
        workspace: Arc<dyn Workspace>,
        context: ContextAssembler,
        model: impl Into<String>,
    ) -> Arc<Self> {
        let loop_ = Arc::new(Self {
            bus,
            registry,
            tools,
            skills,
            provider,
            memory,
            workspace,
            context,
            model: model.into(),
            max_tool_iterations: DEFAULT_MAX_TOOL_ITERATIONS,
        });
        loop_.install_subscription();
        loop_
    }

    fn install_subscription(self: &Arc<Self>) {
        let this = Arc::clone(self);
        self.bus.subscribe("workflow:step:start", move |envelope| {
            let this = Arc::clone(&this);
            Box::pin(async move {
                this.on_step_start(envelope).await;
                Ok(())
            })
        });
    }

    async fn on_step_start(&self, envelope: ferretbot_core::Envelope) {
        let content = &envelope.content;
        let Some(run_id) = content.get("runId").and_then(Value::as_u64) else { return };
        let Some(workflow_id) = content.get("workflowId").and_then(Value::as_str) else { return };
        let Some(workflow_version) = content.get("workflowVersion").and_then(Value::as_str) else { return };
        let Some(step_id) = content.get("stepId").and_then(Value::as_str) else { return };

        let Some(workflow) = self.registry.get(workflow_id, Some(workflow_version)) else {
            tracing::warn!(run_id, workflow_id, "agent loop: unknown workflow for step:start");
            return;
        };
        let Some(step) = workflow.steps.iter().find(|s| s.id == step_id) else {
            tracing::warn!(run_id, step_id, "agent loop: unknown step for step:start");
            return;
        };
        if step.kind != StepKind::Agent {
            // System and wait-for-input steps are handled by the engine
            // itself; this loop only ever drives `Agent` steps.
            return;
        }

        let session_id = format!("run-{run_id}");
        let skill_bundle = self
            .skills
            .load_skills_for_step(SkillRequest {
                step_id: step_id.to_string(),
                tool_names: step.tools.clone(),
                tags: step.load_skills.clone(),
            })
            .await;

        let tool_schemas: Vec<_> = step.tools.iter().filter_map(|name| self.tools.get(name)).collect();
        if tool_schemas.len() != step.tools.len() {
            tracing::warn!(run_id, step_id, "agent loop: one or more declared tools are not registered");
        }

        let Some(provider) = &self.provider else {
            self.complete_with_tool_error(run_id, step_id, "no provider configured for agent steps").await;
            return;
        };

        let conversation = self.memory.collect_conversation(&session_id, self.context.config().input_budget() as usize).await;
        let request = BuildMessagesRequest {
            system_prompt: format!(
                "You are an autonomous agent executing step '{step_id}' of workflow '{}'.",
                workflow.id
            ),
            step_instruction: step.instruction.clone(),
            tool_schemas: tool_schemas.iter().map(|s| format!("{}: {}", s.name, s.description)).collect(),
            skill_content: skill_bundle.content.clone(),
            prior_compressed: None,
            conversation_summary: conversation.summary.clone(),
            conversation: conversation.turns.clone(),
            user_input: None,
            layer_budgets: LayerBudgets::default(),
        };
        let assembled = self.context.build_messages(&request);

        let mut messages = assembled.messages;
        let mut tool_calls_seen: Vec<Value> = Vec::new();
        let mut tool_results_seen: Vec<Value> = Vec::new();

        for _ in 0..self.max_tool_iterations {
            let chat_request = ChatRequest {
                model: self.model.clone(),
                messages: messages.clone(),
                tools: tool_schemas.clone(),
                temperature: None,
                max_tokens: Some(assembled.max_output_tokens),
            };
            let response = match provider.chat_completion(chat_request).await {
                Ok(response) => response,
                Err(e) => {
                    self.complete_with_tool_error(run_id, step_id, &format!("provider call failed: {e}")).await;
                    return;
                }
            };
            self.memory.record_turn(&session_id, Role::Assistant, response.message.content.clone()).await;

            if response.tool_calls.is_empty() {
                let outputs = self.collect_outputs(step_id, &step.outputs).await;
                self.emit_complete(run_id, step_id, &response.message.content, &tool_calls_seen, &tool_results_seen, &outputs).await;
                return;
            }

            messages.push(response.message.clone());
            for call in response.tool_calls {
                tool_calls_seen.push(tool_call_to_value(&call));
                let tool_result = match self.tools.execute(call).await {
                    Ok(result) => result,
                    Err(e) => {
                        self.complete_with_tool_error(run_id, step_id, &format!("tool execution failed: {e}")).await;
                        return;
                    }
                };
                tool_results_seen.push(json!({
                    "id": tool_result.id,
                    "output": tool_result.output,
                    "isError": tool_result.is_error,
                }));
                messages.push(Message::tool(tool_result.output));
            }
        }

        self.complete_with_tool_error(
            run_id,
            step_id,
            &format!("exceeded max_tool_iterations ({})", self.max_tool_iterations),
        )
        .await;
    }

    async fn collect_outputs(&self, step_id: &str, declared: &[String]) -> Vec<Value> {
        let mut outputs = Vec::with_capacity(declared.len());
        for path in declared {
            match self.workspace.read_text_file(path).await {
                Ok(content) => outputs.push(json!({"path": path, "content": content})),
                Err(e) => {
                    tracing::warn!(step_id, path, error = %e, "agent loop: declared output not readable");
                }
            }
        }
        outputs
    }

    async fn emit_complete(&self, run_id: u64, step_id: &str, result: &str, tool_calls: &[Value], tool_results: &[Value], artifacts: &[Value]) {
        self.bus
            .emit(PartialEnvelope::new(
                "workflow:step:complete",
                json!({
                    "runId": run_id,
                    "stepId": step_id,
                    "result": result,
                    "toolCalls": tool_calls,
                    "toolResults": tool_results,
                    "artifacts": artifacts,
                }),
            ))
            .await;
    }

    async fn complete_with_tool_error(&self, run_id: u64, step_id: &str, message: &str) {
        tracing::warn!(run_id, step_id, message, "agent loop: step ended in tool_error");
        self.emit_complete(run_id, step_id, &format!("tool_error: {message}"), &[], &[], &[]).await;
    }
}

fn tool_call_to_value(call: &ToolCall) -> Value {
    json!({"id": call.id, "name": call.name, "arguments": call.arguments})
}

#[cfg(test)]
#[path = "agent_loop_tests.rs"]
mod tests;

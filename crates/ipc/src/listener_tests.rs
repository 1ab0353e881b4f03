use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use ferretbot_bus::EventBus;
use ferretbot_engine::{Engine, HeuristicNameExtractor, Workspace, WorkspaceError};
use ferretbot_registry::{
    CheckSpec, StepKind, WorkflowDefinition, WorkflowDefinitionFile, WorkflowRegistry, WorkflowStep,
};
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use super::*;

struct TestWorkspace {
    root: PathBuf,
}

#[async_trait]
impl Workspace for TestWorkspace {
    async fn write_text_file(&self, path: &str, content: &str) -> Result<(), WorkspaceError> {
        let full = self.root.join(path);
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(full, content).await?;
        Ok(())
    }

    async fn ensure_text_file(&self, path: &str, content: &str) -> Result<(), WorkspaceError> {
        if self.exists(path).await {
            return Ok(());
        }
        self.write_text_file(path, content).await
    }

    async fn remove_path(&self, path: &str) -> Result<(), WorkspaceError> {
        let full = self.root.join(path);
        match tokio::fs::remove_file(&full).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn exists(&self, path: &str) -> bool {
        tokio::fs::try_exists(self.root.join(path)).await.unwrap_or(false)
    }

    async fn read_text_file(&self, path: &str) -> Result<String, WorkspaceError> {
        Ok(tokio::fs::read_to_string(self.root.join(path)).await?)
    }
}

fn single_step_workflow(out_path: &std::path::Path) -> WorkflowDefinition {
    let file = WorkflowDefinitionFile {
        id: "greet".to_string(),
        version: "1.0.0".to_string(),
        name: Some("Greet".to_string()),
        description: None,
        inputs: Vec::new(),
        steps: vec![WorkflowStep {
            id: "write".to_string(),
            kind: StepKind::SystemWriteFile,
            path: Some("out.txt".to_string()),
            content: Some("hello".to_string()),
            done_when: vec![CheckSpec {
                r#type: "file_exists".to_string(),
                params: serde_json::Map::from_iter([(
                    "path".to_string(),
                    Value::String(out_path.display().to_string()),
                )]),
            }],
            ..Default::default()
        }],
    };
    WorkflowDefinition::from_file(file, PathBuf::from(".")).expect("valid definition")
}

async fn build_gateway(tmp: &tempfile::TempDir) -> Arc<Gateway> {
    let bus = EventBus::new();
    let registry = WorkflowRegistry::new();
    registry.register(single_step_workflow(&tmp.path().join("out.txt"))).expect("register");
    let workspace: Arc<dyn Workspace> = Arc::new(TestWorkspace { root: tmp.path().to_path_buf() });
    let engine = Engine::new(
        bus.clone(),
        registry,
        workspace,
        tmp.path().join("runs"),
        Arc::new(ferretbot_core::SystemClock),
        Arc::new(HeuristicNameExtractor),
    );
    Gateway::new(bus, engine)
}

/// Drives one end of an in-process duplex connection through the gateway,
/// exposing a line writer and a line reader to the test body.
struct Harness {
    write_half: tokio::io::WriteHalf<tokio::io::DuplexStream>,
    lines: tokio::io::Lines<BufReader<tokio::io::ReadHalf<tokio::io::DuplexStream>>>,
}

impl Harness {
    async fn connect(gateway: Arc<Gateway>) -> Self {
        let (server, client) = tokio::io::duplex(8192);
        let (server_read, server_write) = tokio::io::split(server);
        tokio::spawn(async move { gateway.handle_connection(server_read, server_write).await });
        let (client_read, client_write) = tokio::io::split(client);
        Self { write_half: client_write, lines: BufReader::new(client_read).lines() }
    }

    async fn send(&mut self, value: Value) {
        let mut line = value.to_string();
        line.push('\n');
        self.write_half.write_all(line.as_bytes()).await.expect("write");
    }

    async fn next_value(&mut self) -> Value {
        let line = tokio::time::timeout(Duration::from_secs(2), self.lines.next_line())
            .await
            .expect("timed out waiting for a line")
            .expect("read error")
            .expect("connection closed unexpectedly");
        serde_json::from_str(&line).expect("line is valid json")
    }

    /// Read lines until one matches `predicate`, ignoring broadcast chatter
    /// (`workflow:run:queued`, `workflow:step:start`, ...) along the way.
    async fn next_matching(&mut self, predicate: impl Fn(&Value) -> bool) -> Value {
        for _ in 0..50 {
            let value = self.next_value().await;
            if predicate(&value) {
                return value;
            }
        }
        panic!("no matching line seen");
    }
}

#[tokio::test]
async fn greets_a_new_connection_with_system_hello() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let gateway = build_gateway(&tmp).await;
    let mut harness = Harness::connect(gateway).await;

    let hello = harness.next_value().await;
    assert_eq!(hello["type"], "system:hello");
    assert!(hello["content"]["clientId"].is_string());
}

#[tokio::test]
async fn malformed_line_is_discarded_and_connection_stays_open() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let gateway = build_gateway(&tmp).await;
    let mut harness = Harness::connect(gateway).await;
    let _hello = harness.next_value().await;

    harness.send(Value::String("not an object".to_string())).await;
    harness.send(json!("also not helpful")).await;
    harness.send(json!({"type": "system:ping"})).await;

    let pong = harness.next_matching(|v| v["type"] == "system:pong").await;
    assert!(pong["content"]["version"].is_string());
    assert!(pong["content"]["uptimeMs"].is_number());
}

#[tokio::test]
async fn workflow_run_start_reports_success_and_eventually_completes() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let gateway = build_gateway(&tmp).await;
    let mut harness = Harness::connect(gateway).await;
    let _hello = harness.next_value().await;

    harness
        .send(json!({"type": "workflow:run:start", "content": {"workflowId": "greet", "requestId": "r1"}}))
        .await;

    let result = harness
        .next_matching(|v| v["content"]["kind"] == "workflow_command_result" && v["content"]["command"] == "workflow:run:start")
        .await;
    assert_eq!(result["content"]["requestId"], "r1");
    assert_eq!(result["content"]["ok"], true);
    let run_id = result["content"]["data"]["runId"].as_u64().expect("runId");

    let complete = harness.next_matching(|v| v["type"] == "workflow:run:complete").await;
    assert_eq!(complete["content"]["runId"].as_u64(), Some(run_id));
    assert_eq!(complete["content"]["state"], "completed");
    assert!(tmp.path().join("out.txt").exists());
}

#[tokio::test]
async fn workflow_run_start_with_unknown_workflow_reports_failure() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let gateway = build_gateway(&tmp).await;
    let mut harness = Harness::connect(gateway).await;
    let _hello = harness.next_value().await;

    harness
        .send(json!({"type": "workflow:run:start", "content": {"workflowId": "nope", "requestId": "r2"}}))
        .await;

    let result = harness
        .next_matching(|v| v["content"]["kind"] == "workflow_command_result" && v["content"]["requestId"] == "r2")
        .await;
    assert_eq!(result["content"]["ok"], false);
    assert!(result["content"]["message"].is_string());
}

#[tokio::test]
async fn workflow_run_list_reports_every_started_run() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let gateway = build_gateway(&tmp).await;
    let mut harness = Harness::connect(gateway).await;
    let _hello = harness.next_value().await;

    harness
        .send(json!({"type": "workflow:run:start", "content": {"workflowId": "greet", "requestId": "r1"}}))
        .await;
    let _ = harness
        .next_matching(|v| v["content"]["command"] == "workflow:run:start")
        .await;

    harness.send(json!({"type": "workflow:run:list", "content": {"requestId": "r3"}})).await;
    let result = harness
        .next_matching(|v| v["content"]["command"] == "workflow:run:list")
        .await;
    assert_eq!(result["content"]["ok"], true);
    let runs = result["content"]["data"]["runs"].as_array().expect("runs array");
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0]["workflow_id"], "greet");
}

#[tokio::test]
async fn workflow_run_cancel_transitions_an_unfinished_run() {
    let tmp = tempfile::tempdir().expect("tempdir");
    // A workflow whose only step waits for input never completes on its
    // own, so there's something to cancel before it races to `completed`.
    let bus = EventBus::new();
    let registry = WorkflowRegistry::new();
    let file = WorkflowDefinitionFile {
        id: "waits".to_string(),
        version: "1.0.0".to_string(),
        name: None,
        description: None,
        inputs: Vec::new(),
        steps: vec![WorkflowStep {
            id: "ask".to_string(),
            kind: StepKind::WaitForInput,
            prompt: Some("What is your name?".to_string()),
            response_key: Some("name".to_string()),
            ..Default::default()
        }],
    };
    registry.register(WorkflowDefinition::from_file(file, PathBuf::from(".")).expect("valid")).expect("register");
    let workspace: Arc<dyn Workspace> = Arc::new(TestWorkspace { root: tmp.path().to_path_buf() });
    let engine = Engine::new(
        bus.clone(),
        registry,
        workspace,
        tmp.path().join("runs"),
        Arc::new(ferretbot_core::SystemClock),
        Arc::new(HeuristicNameExtractor),
    );
    let gateway = Gateway::new(bus, engine);
    let mut harness = Harness::connect(gateway).await;
    let _hello = harness.next_value().await;

    harness
        .send(json!({"type": "workflow:run:start", "content": {"workflowId": "waits", "requestId": "r1"}}))
        .await;
    let started = harness
        .next_matching(|v| v["content"]["command"] == "workflow:run:start")
        .await;
    let run_id = started["content"]["data"]["runId"].as_u64().expect("runId");

    harness
        .send(json!({"type": "workflow:run:cancel", "content": {"runId": run_id, "requestId": "r2"}}))
        .await;
    let cancelled = harness
        .next_matching(|v| v["content"]["command"] == "workflow:run:cancel")
        .await;
    assert_eq!(cancelled["content"]["ok"], true);

    let complete = harness.next_matching(|v| v["type"] == "workflow:run:complete").await;
    assert_eq!(complete["content"]["state"], "cancelled");
}

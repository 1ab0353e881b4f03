// SPDX-License-Identifier: MIT

//! `ferretbotd`: wires the event bus, workflow registry, engine, agent loop
//! and IPC gateway together into a running process (spec §4, §9, §10).
//!
//! Logging follows `oj-daemon`'s pattern: a `tracing-subscriber` `EnvFilter`
//! read from `FERRETBOT_LOG` (default `info`), plus a `tracing-appender`
//! daily-rolling file writer under `<state_dir>/logs` so a long-running
//! daemon's history survives past its in-memory log buffer.

mod agent_loop;
mod workspace_adapter;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use ferretbot_bus::EventBus;
use ferretbot_collab::{
    BuiltinToolRegistry, DirectorySkillLoader, HttpProvider, InMemorySessionMemory, LocalWorkspace,
    Provider,
};
use ferretbot_context::{ContextAssembler, ContextConfig};
use ferretbot_core::{config, SystemClock};
use ferretbot_engine::{Engine, HeuristicNameExtractor};
use ferretbot_ipc::Gateway;
use ferretbot_registry::WorkflowRegistry;
use tokio::net::{TcpListener, UnixListener};

use agent_loop::AgentLoop;
use workspace_adapter::EngineWorkspaceAdapter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let state_dir = config::state_dir().context(
        "could not determine a state directory; set FERRETBOT_STATE_DIR, XDG_STATE_HOME, or HOME",
    )?;
    let workspace_dir = state_dir.join("workspace");
    let workflows_dir = state_dir.join("workflows");
    let skills_dir = state_dir.join("skills");
    let runs_dir = state_dir.join("runs");
    let logs_dir = state_dir.join("logs");
    for dir in [&workspace_dir, &workflows_dir, &skills_dir, &runs_dir, &logs_dir] {
        std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    }

    let _log_guard = init_logging(&logs_dir);

    let bus = EventBus::new();

    let registry = WorkflowRegistry::new();
    let loaded = registry
        .load_all(&workflows_dir)
        .with_context(|| format!("loading workflow definitions from {}", workflows_dir.display()))?;
    tracing::info!(count = loaded, dir = %workflows_dir.display(), "loaded workflow definitions");

    let collab_workspace: Arc<dyn ferretbot_collab::Workspace> = Arc::new(LocalWorkspace::new(&workspace_dir));
    let engine_workspace = Arc::new(EngineWorkspaceAdapter::new(Arc::clone(&collab_workspace)));

    let engine = Engine::new(
        bus.clone(),
        registry.clone(),
        engine_workspace,
        runs_dir,
        Arc::new(SystemClock),
        Arc::new(HeuristicNameExtractor::default()),
    );

    let tool_registry: Arc<dyn ferretbot_collab::ToolRegistry> =
        Arc::new(BuiltinToolRegistry::new(Arc::clone(&collab_workspace), Vec::new()));
    let skill_loader: Arc<dyn ferretbot_collab::SkillLoader> = Arc::new(DirectorySkillLoader::new(&skills_dir));
    let session_memory = Arc::new(InMemorySessionMemory::default());
    let provider: Option<Arc<dyn Provider>> = HttpProvider::from_env().map(|p| Arc::new(p) as Arc<dyn Provider>);
    if provider.is_none() {
        tracing::warn!("FERRETBOT_PROVIDER_URL is not set; agent steps will fail with a tool_error");
    }
    let model = std::env::var("FERRETBOT_MODEL").unwrap_or_else(|_| "default".to_string());

    let mut context_config = ContextConfig::default();
    if let Some(limit) = config::context_limit() {
        context_config = ContextConfig::with_context_limit(limit);
    }
    if let Some(reserve) = config::output_reserve() {
        context_config.output_reserve = reserve;
    }
    let context = ContextAssembler::new(context_config);

    let _agent_loop = AgentLoop::new(
        bus.clone(),
        registry,
        tool_registry,
        skill_loader,
        provider,
        session_memory,
        collab_workspace,
        context,
        model,
    );

    let gateway = Gateway::new(bus, engine);

    let socket_path = config::socket_path().context("could not determine an IPC socket path")?;
    let unix_listener = bind_unix_socket(&socket_path)
        .with_context(|| format!("binding unix socket at {}", socket_path.display()))?;
    tracing::info!(path = %socket_path.display(), "listening on unix socket");
    tokio::spawn(Arc::clone(&gateway).serve_unix(unix_listener));

    if let Some(port) = config::tcp_port() {
        let tcp_listener = TcpListener::bind(("0.0.0.0", port))
            .await
            .with_context(|| format!("binding tcp listener on port {port}"))?;
        tracing::info!(port, "listening on tcp");
        tokio::spawn(gateway.serve_tcp(tcp_listener));
    }

    tokio::signal::ctrl_c().await.context("waiting for ctrl-c")?;
    tracing::info!("shutting down");
    Ok(())
}

fn bind_unix_socket(path: &PathBuf) -> std::io::Result<UnixListener> {
    if path.exists() {
        std::fs::remove_file(path)?;
    }
    UnixListener::bind(path)
}

fn init_logging(logs_dir: &std::path::Path) -> tracing_appender::non_blocking::WorkerGuard {
    use tracing_subscriber::fmt::writer::MakeWriterExt;

    let file_appender = tracing_appender::rolling::daily(logs_dir, "ferretbotd.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = tracing_subscriber::EnvFilter::try_from_env("FERRETBOT_LOG")
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(non_blocking.and(std::io::stderr))
        .init();

    guard
}

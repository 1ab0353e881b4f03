// SPDX-License-Identifier: MIT

//! `ferret`'s subcommands (spec §10.3): a message to the current agent
//! session, and workflow run/cancel/list against the daemon's IPC Gateway.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use serde_json::{Map, Value};

use crate::client::{DaemonClient, Endpoint};

#[derive(Parser)]
#[command(name = "ferret", about = "Talk to a running ferretbotd daemon")]
pub struct Cli {
    /// Unix socket path. Defaults to FERRETBOT_SOCKET / the state dir.
    #[arg(long, global = true)]
    pub socket: Option<PathBuf>,

    /// Connect over TCP to this host instead of the unix socket.
    #[arg(long, global = true)]
    pub host: Option<String>,

    /// TCP port to connect to (requires --host, or defaults to 127.0.0.1).
    #[arg(long, global = true)]
    pub port: Option<u16>,

    /// Stream run progress until it reaches a terminal state.
    #[arg(long, global = true)]
    pub watch: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Send a message to the current agent session.
    Message(MessageArgs),
    /// Manage workflow runs.
    Workflow {
        #[command(subcommand)]
        command: WorkflowCommand,
    },
}

#[derive(Args)]
pub struct MessageArgs {
    /// Message text, if not given via -m/--message.
    #[arg(value_name = "TEXT")]
    pub text: Option<String>,

    #[arg(short = 'm', long = "message", value_name = "TEXT")]
    pub flag: Option<String>,
}

#[derive(Subcommand)]
pub enum WorkflowCommand {
    /// Start a run of a registered workflow.
    Run {
        /// Workflow id.
        id: String,
        /// Workflow version; defaults to the highest registered.
        #[arg(long)]
        version: Option<String>,
        /// Input argument, repeatable: --arg key=value.
        #[arg(long = "arg", value_parser = parse_key_value)]
        args: Vec<(String, String)>,
    },
    /// Cancel a run.
    Cancel {
        /// Run id, as printed by `workflow run` or `workflow list`.
        run_id: u64,
    },
    /// List every known run.
    List,
}

/// Parse a `key=value` string for `--arg`.
fn parse_key_value(s: &str) -> Result<(String, String), String> {
    let pos = s.find('=').ok_or_else(|| format!("invalid argument '{s}': must be key=value"))?;
    Ok((s[..pos].to_string(), s[pos + 1..].to_string()))
}

pub fn endpoint(cli: &Cli) -> Endpoint {
    if cli.host.is_some() || cli.port.is_some() {
        let host = cli.host.clone().unwrap_or_else(|| "127.0.0.1".to_string());
        let port = cli.port.unwrap_or(4287);
        return Endpoint::Tcp(host, port);
    }
    let socket = cli
        .socket
        .clone()
        .or_else(ferretbot_core::config::socket_path)
        .unwrap_or_else(|| PathBuf::from("ferretbot.sock"));
    Endpoint::Unix(socket)
}

/// Run the parsed command. Returns the process exit code: 0 on success, 1
/// on a connection failure or an `ok: false` response from the daemon.
pub async fn run(cli: Cli) -> anyhow::Result<i32> {
    let endpoint = endpoint(&cli);
    let mut client = DaemonClient::connect(&endpoint).await?;

    match cli.command {
        Command::Message(args) => {
            let Some(text) = args.flag.or(args.text) else {
                eprintln!("error: a message is required (positional TEXT or -m/--message)");
                return Ok(1);
            };
            client.send_message(&text).await?;
            Ok(0)
        }
        Command::Workflow { command } => run_workflow(&mut client, command, cli.watch).await,
    }
}

async fn run_workflow(client: &mut DaemonClient, command: WorkflowCommand, watch: bool) -> anyhow::Result<i32> {
    match command {
        WorkflowCommand::Run { id, version, args } => {
            let mut content = Map::new();
            content.insert("workflowId".to_string(), Value::String(id));
            if let Some(version) = version {
                content.insert("version".to_string(), Value::String(version));
            }
            let mut arg_map = Map::new();
            for (key, value) in args {
                arg_map.insert(key, Value::String(value));
            }
            content.insert("args".to_string(), Value::Object(arg_map));

            let result = client.command("workflow:run:start", Value::Object(content)).await?;
            if !result.ok {
                eprintln!("error: {}", result.message.unwrap_or_else(|| "run failed to start".to_string()));
                return Ok(1);
            }
            let Some(run_id) = result.data.get("runId").and_then(Value::as_u64) else {
                eprintln!("error: daemon accepted the run but returned no runId");
                return Ok(1);
            };
            println!("started run {run_id}");

            if watch {
                let state = client.watch_run(run_id).await?;
                return Ok(if state == "completed" { 0 } else { 1 });
            }
            Ok(0)
        }
        WorkflowCommand::Cancel { run_id } => {
            let content = serde_json::json!({ "runId": run_id });
            let result = client.command("workflow:run:cancel", content).await?;
            print_result(&result)
        }
        WorkflowCommand::List => {
            let result = client.command("workflow:run:list", Value::Object(Map::new())).await?;
            if !result.ok {
                eprintln!("error: {}", result.message.unwrap_or_default());
                return Ok(1);
            }
            let runs = result.data.get("runs").and_then(Value::as_array).cloned().unwrap_or_default();
            if runs.is_empty() {
                println!("no runs");
            }
            for run in &runs {
                println!(
                    "{} {} {} {}",
                    run.get("id").and_then(Value::as_u64).unwrap_or_default(),
                    run.get("workflow_id").and_then(Value::as_str).unwrap_or("?"),
                    run.get("workflow_version").and_then(Value::as_str).unwrap_or("?"),
                    run.get("state").and_then(Value::as_str).unwrap_or("?"),
                );
            }
            Ok(0)
        }
    }
}

fn print_result(result: &crate::client::CommandResult) -> anyhow::Result<i32> {
    if result.ok {
        println!("ok");
        Ok(0)
    } else {
        eprintln!("error: {}", result.message.clone().unwrap_or_default());
        Ok(1)
    }
}

#[cfg(test)]
#[path = "commands_tests.rs"]
mod tests;

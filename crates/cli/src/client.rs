// SPDX-License-Identifier: MIT

//! A minimal client over the IPC Gateway's newline-delimited JSON protocol
//! (spec §4.6). Grounded on the teacher's `DaemonClient` (one `send` per
//! request, response matched by shape rather than a connection-per-call
//! abstraction), adapted to this crate's line-oriented wire format instead
//! of the teacher's length-prefixed framing.

use std::path::PathBuf;

use anyhow::{bail, Context};
use ferretbot_core::Envelope;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::{TcpStream, UnixStream};

/// Where to reach the daemon.
pub enum Endpoint {
    Unix(PathBuf),
    Tcp(String, u16),
}

pub struct DaemonClient {
    reader: BufReader<Box<dyn AsyncRead + Unpin + Send>>,
    writer: Box<dyn AsyncWrite + Unpin + Send>,
}

impl DaemonClient {
    #[cfg(test)]
    async fn from_io(
        reader: impl AsyncRead + Unpin + Send + 'static,
        writer: impl AsyncWrite + Unpin + Send + 'static,
        drain_hello: bool,
    ) -> anyhow::Result<Self> {
        let mut client = Self { reader: BufReader::new(Box::new(reader)), writer: Box::new(writer) };
        if drain_hello {
            let _hello = client.next_envelope().await?;
        }
        Ok(client)
    }

    pub async fn connect(endpoint: &Endpoint) -> anyhow::Result<Self> {
        let (reader, writer): (Box<dyn AsyncRead + Unpin + Send>, Box<dyn AsyncWrite + Unpin + Send>) =
            match endpoint {
                Endpoint::Unix(path) => {
                    let stream = UnixStream::connect(path)
                        .await
                        .with_context(|| format!("connecting to {}", path.display()))?;
                    let (r, w) = tokio::io::split(stream);
                    (Box::new(r), Box::new(w))
                }
                Endpoint::Tcp(host, port) => {
                    let stream = TcpStream::connect((host.as_str(), *port))
                        .await
                        .with_context(|| format!("connecting to {host}:{port}"))?;
                    let (r, w) = tokio::io::split(stream);
                    (Box::new(r), Box::new(w))
                }
            };

        let mut client = Self { reader: BufReader::new(reader), writer };
        // The gateway always greets first; draining it up front keeps every
        // later `next_envelope` call focused on the traffic the caller asked
        // for.
        let _hello = client.next_envelope().await?;
        Ok(client)
    }

    async fn next_envelope(&mut self) -> anyhow::Result<Option<Envelope>> {
        let mut line = String::new();
        loop {
            line.clear();
            let n = self.reader.read_line(&mut line).await.context("reading from daemon")?;
            if n == 0 {
                return Ok(None);
            }
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            return Ok(Some(serde_json::from_str(trimmed).context("parsing envelope from daemon")?));
        }
    }

    async fn send(&mut self, r#type: &str, content: Value) -> anyhow::Result<()> {
        let mut line = serde_json::to_string(&serde_json::json!({ "type": r#type, "content": content }))?;
        line.push('\n');
        self.writer.write_all(line.as_bytes()).await.context("writing to daemon")?;
        Ok(())
    }

    /// Send a `user:input` line; the daemon doesn't answer this one with a
    /// `workflow_command_result`, so there's nothing further to wait for.
    pub async fn send_message(&mut self, text: &str) -> anyhow::Result<()> {
        self.send("user:input", serde_json::json!({ "text": text })).await
    }

    /// Send a command and wait for its matching `agent:status` /
    /// `workflow_command_result` response.
    pub async fn command(&mut self, r#type: &str, content: Value) -> anyhow::Result<CommandResult> {
        self.send(r#type, content).await?;
        loop {
            let Some(envelope) = self.next_envelope().await? else {
                bail!("daemon closed the connection before responding to '{type}'");
            };
            if envelope.r#type != "agent:status" {
                continue;
            }
            if envelope.content.get("kind").and_then(Value::as_str) != Some("workflow_command_result") {
                continue;
            }
            if envelope.content.get("command").and_then(Value::as_str) != Some(r#type) {
                continue;
            }
            let ok = envelope.content.get("ok").and_then(Value::as_bool).unwrap_or(false);
            let message = envelope.content.get("message").and_then(Value::as_str).map(str::to_string);
            let data = envelope.content.get("data").cloned().unwrap_or(Value::Null);
            return Ok(CommandResult { ok, message, data });
        }
    }

    /// Stream further envelopes for `run_id` until `workflow:run:complete`,
    /// printing progress, and return the terminal state string.
    pub async fn watch_run(&mut self, run_id: u64) -> anyhow::Result<String> {
        loop {
            let Some(envelope) = self.next_envelope().await? else {
                bail!("daemon closed the connection while watching run {run_id}");
            };
            let matches_run = envelope.content.get("runId").and_then(Value::as_u64) == Some(run_id);
            if !matches_run {
                continue;
            }
            match envelope.r#type.as_str() {
                "workflow:run:complete" => {
                    let state = envelope.content.get("state").and_then(Value::as_str).unwrap_or("unknown");
                    println!("run {run_id}: {state}");
                    return Ok(state.to_string());
                }
                "workflow:step:start" => {
                    if let Some(step_id) = envelope.content.get("stepId").and_then(Value::as_str) {
                        println!("run {run_id}: step '{step_id}' started");
                    }
                }
                "workflow:step:complete" => {
                    if let Some(step_id) = envelope.content.get("stepId").and_then(Value::as_str) {
                        println!("run {run_id}: step '{step_id}' complete");
                    }
                }
                "workflow:needs_approval" => println!("run {run_id}: waiting for approval"),
                "workflow:needs_input" => println!("run {run_id}: waiting for input"),
                _ => {}
            }
        }
    }
}

pub struct CommandResult {
    pub ok: bool,
    pub message: Option<String>,
    pub data: Value,
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;

// SPDX-License-Identifier: MIT

//! The IPC Gateway (spec §4.6): accepts Unix/TCP connections, greets each
//! with `system:hello`, translates inbound command lines into bus emissions
//! or direct `Engine` calls, and routes every outbound envelope back to the
//! connection it belongs to (or broadcasts it, when `client_id` is unset).
//!
//! Grounded on the teacher's `daemon::listener` module (`ListenCtx`, a
//! generic `handle_connection<R, W>`, dual unix/tcp accept loops): same
//! connection-handling shape, different wire format (newline-delimited JSON
//! here, the teacher's 4-byte length-prefixed framing there — spec.md §4.6
//! requires newline-delimited JSON).

use std::sync::Arc;
use std::time::Instant;

use ferretbot_bus::EventBus;
use ferretbot_core::{Clock, Envelope, PartialEnvelope, SystemClock};
use ferretbot_engine::Engine;
use serde_json::{json, Map, Value};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, UnixListener};
use tokio::sync::mpsc;

use crate::protocol::parse_inbound_line;

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Shared gateway state: a bus handle and an engine handle, both already
/// cheaply clonable, plus a clock for `system:pong`'s uptime and a fixed
/// start instant to measure it against.
pub struct Gateway {
    bus: EventBus,
    engine: Engine,
    clock: Arc<dyn Clock>,
    start: Instant,
}

impl Gateway {
    pub fn new(bus: EventBus, engine: Engine) -> Arc<Self> {
        Self::with_clock(bus, engine, Arc::new(SystemClock))
    }

    pub fn with_clock(bus: EventBus, engine: Engine, clock: Arc<dyn Clock>) -> Arc<Self> {
        let start = clock.now();
        Arc::new(Self { bus, engine, clock, start })
    }

    /// Accept connections on a Unix socket until the listener is dropped or
    /// errors. Removes a stale socket file left by a previous run first.
    pub async fn serve_unix(self: Arc<Self>, listener: UnixListener) {
        loop {
            match listener.accept().await {
                Ok((stream, _addr)) => {
                    let gateway = Arc::clone(&self);
                    let (read_half, write_half) = stream.into_split();
                    tokio::spawn(async move { gateway.handle_connection(read_half, write_half).await });
                }
                Err(e) => {
                    tracing::error!(error = %e, "unix listener accept failed");
                    return;
                }
            }
        }
    }

    /// Accept connections on a TCP listener, for remote clients (spec §10.3's
    /// `FERRETBOT_TCP_PORT`).
    pub async fn serve_tcp(self: Arc<Self>, listener: TcpListener) {
        loop {
            match listener.accept().await {
                Ok((stream, addr)) => {
                    tracing::info!(%addr, "tcp client connected");
                    let gateway = Arc::clone(&self);
                    let (read_half, write_half) = stream.into_split();
                    tokio::spawn(async move { gateway.handle_connection(read_half, write_half).await });
                }
                Err(e) => {
                    tracing::error!(error = %e, "tcp listener accept failed");
                    return;
                }
            }
        }
    }

    /// Drive one connection end to end: greet, forward matching bus
    /// envelopes out, read and dispatch inbound lines in, until EOF or a
    /// read/write error.
    async fn handle_connection<R, W>(self: Arc<Self>, reader: R, writer: W)
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let client_id = nanoid::nanoid!(10);
        tracing::info!(%client_id, "client connected");

        let (tx, rx) = mpsc::unbounded_channel::<Envelope>();

        let hello = Envelope::new(
            "system:hello",
            json!({"clientId": client_id, "version": VERSION}),
            self.clock.epoch_ms(),
        );
        // Queued before the subscription is installed, and the channel is
        // FIFO, so this is always the first line the client receives — no
        // separate bypass path needed for the greeting.
        let _ = tx.send(hello);

        let forward_client_id = client_id.clone();
        let forward_tx = tx.clone();
        let unsubscribe = self.bus.subscribe_all(move |envelope: Envelope| {
            let tx = forward_tx.clone();
            let client_id = forward_client_id.clone();
            Box::pin(async move {
                let targeted = match &envelope.client_id {
                    None => true,
                    Some(target) => target == &client_id,
                };
                if targeted {
                    let _ = tx.send(envelope);
                }
                Ok(())
            })
        });

        let writer_task = tokio::spawn(write_loop(writer, rx));

        let mut lines = BufReader::new(reader).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    if line.trim().is_empty() {
                        continue;
                    }
                    self.handle_line(&client_id, &line).await;
                }
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!(%client_id, error = %e, "connection read error");
                    break;
                }
            }
        }

        unsubscribe();
        drop(tx);
        let _ = writer_task.await;
        tracing::info!(%client_id, "client disconnected");
    }

    async fn handle_line(&self, client_id: &str, line: &str) {
        let Some(inbound) = parse_inbound_line(line) else {
            tracing::debug!(%client_id, %line, "discarding malformed or untyped inbound line");
            return;
        };

        let session_id = inbound
            .content
            .get("sessionId")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| client_id.to_string());

        match inbound.r#type.as_str() {
            "user:input" => {
                self.bus
                    .emit(
                        PartialEnvelope::new("user:input", inbound.content)
                            .session_id(session_id)
                            .client_id(client_id.to_string()),
                    )
                    .await;
            }
            "workflow:run:start" => self.handle_run_start(client_id, inbound.content).await,
            "workflow:run:cancel" => self.handle_run_cancel(client_id, inbound.content).await,
            "workflow:run:resume" => self.handle_run_resume(client_id, inbound.content).await,
            "workflow:run:list" => self.handle_run_list(client_id, inbound.content).await,
            "workflow:run:status" => self.handle_run_status(client_id, inbound.content).await,
            "system:ping" => self.handle_ping(client_id, inbound.content).await,
            other => {
                tracing::debug!(%client_id, command = %other, "discarding unrecognized command type");
            }
        }
    }

    async fn handle_run_start(&self, client_id: &str, content: Value) {
        let request_id = request_id_of(&content);
        let Some(workflow_id) = content.get("workflowId").and_then(Value::as_str) else {
            self.respond_error(client_id, "workflow:run:start", request_id, "missing 'workflowId'").await;
            return;
        };
        let version = content.get("version").and_then(Value::as_str);
        let args: Map<String, Value> = content
            .get("args")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();

        match self.engine.start_run(workflow_id, version, args).await {
            Ok(run_id) => {
                self.respond_ok(client_id, "workflow:run:start", request_id, json!({"runId": run_id})).await;
            }
            Err(e) => self.respond_error(client_id, "workflow:run:start", request_id, &e.to_string()).await,
        }
    }

    async fn handle_run_cancel(&self, client_id: &str, content: Value) {
        let request_id = request_id_of(&content);
        let Some(run_id) = content.get("runId").and_then(Value::as_u64) else {
            self.respond_error(client_id, "workflow:run:cancel", request_id, "missing 'runId'").await;
            return;
        };
        match self.engine.cancel_run(run_id).await {
            Ok(()) => self.respond_ok(client_id, "workflow:run:cancel", request_id, json!({"runId": run_id})).await,
            Err(e) => self.respond_error(client_id, "workflow:run:cancel", request_id, &e.to_string()).await,
        }
    }

    async fn handle_run_resume(&self, client_id: &str, content: Value) {
        let request_id = request_id_of(&content);
        let Some(run_id) = content.get("runId").and_then(Value::as_u64) else {
            self.respond_error(client_id, "workflow:run:resume", request_id, "missing 'runId'").await;
            return;
        };
        match self.engine.resume_run(run_id).await {
            Ok(()) => self.respond_ok(client_id, "workflow:run:resume", request_id, json!({"runId": run_id})).await,
            Err(e) => self.respond_error(client_id, "workflow:run:resume", request_id, &e.to_string()).await,
        }
    }

    async fn handle_run_list(&self, client_id: &str, content: Value) {
        let request_id = request_id_of(&content);
        let runs = self.engine.list_runs();
        self.respond_ok(client_id, "workflow:run:list", request_id, json!({"runs": runs})).await;
    }

    async fn handle_run_status(&self, client_id: &str, content: Value) {
        let request_id = request_id_of(&content);
        let Some(run_id) = content.get("runId").and_then(Value::as_u64) else {
            self.respond_error(client_id, "workflow:run:status", request_id, "missing 'runId'").await;
            return;
        };
        match self.engine.get_run(run_id) {
            Some(run) => {
                let summary = ferretbot_engine::RunSummary::from(&run);
                self.respond_ok(client_id, "workflow:run:status", request_id, json!({"run": summary})).await;
            }
            None => self.respond_error(client_id, "workflow:run:status", request_id, &format!("run {run_id} not found")).await,
        }
    }

    /// `system:ping` -> `system:pong` (§11): a cheap liveness/version check
    /// that doesn't touch the engine at all.
    async fn handle_ping(&self, client_id: &str, content: Value) {
        let uptime_ms = self.clock.now().saturating_duration_since(self.start).as_millis() as u64;
        self.bus
            .emit(
                PartialEnvelope::new("system:pong", json!({"version": VERSION, "uptimeMs": uptime_ms}))
                    .client_id(client_id.to_string()),
            )
            .await;
        let _ = content;
    }

    async fn respond_ok(&self, client_id: &str, command: &str, request_id: Option<String>, data: Value) {
        self.respond(client_id, command, request_id, true, None, data).await;
    }

    async fn respond_error(&self, client_id: &str, command: &str, request_id: Option<String>, message: &str) {
        self.respond(client_id, command, request_id, false, Some(message.to_string()), Value::Null).await;
    }

    /// Every command response travels the same path as any other outbound
    /// envelope: emitted onto the bus with `client_id` set, so there is only
    /// one delivery mechanism (the `subscribe_all` forwarder) to reason
    /// about for a connection's outbound traffic.
    async fn respond(
        &self,
        client_id: &str,
        command: &str,
        request_id: Option<String>,
        ok: bool,
        message: Option<String>,
        data: Value,
    ) {
        self.bus
            .emit(
                PartialEnvelope::new(
                    "agent:status",
                    json!({
                        "kind": "workflow_command_result",
                        "command": command,
                        "requestId": request_id,
                        "ok": ok,
                        "message": message,
                        "data": data,
                    }),
                )
                .client_id(client_id.to_string()),
            )
            .await;
    }
}

fn request_id_of(content: &Value) -> Option<String> {
    content.get("requestId").and_then(Value::as_str).map(str::to_string)
}

async fn write_loop<W>(mut writer: W, mut rx: mpsc::UnboundedReceiver<Envelope>)
where
    W: AsyncWrite + Unpin,
{
    while let Some(envelope) = rx.recv().await {
        let Ok(mut line) = serde_json::to_string(&envelope) else {
            tracing::error!(event_type = %envelope.r#type, "failed to serialize outbound envelope");
            continue;
        };
        line.push('\n');
        if writer.write_all(line.as_bytes()).await.is_err() {
            break;
        }
    }
    let _ = writer.shutdown().await;
}

#[cfg(test)]
#[path = "listener_tests.rs"]
mod tests;

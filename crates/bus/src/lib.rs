// SPDX-License-Identifier: MIT

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! The event bus: a single logical consumer that serializes dispatch of
//! every event in the system, so every other component can reason about
//! "what happened, in what order" without its own locking.
//!
//! `emit` resolves only after every handler subscribed to that event (typed,
//! then wildcard, each registration-ordered) has been awaited to completion.
//! A handler that returns an error is logged and does not stop its siblings
//! or poison the bus — one bad subscriber cannot wedge the system.
//!
//! A handler is allowed to call `emit` itself (a step completion handler
//! advancing a workflow and emitting the next step's start, say). Such a
//! call dispatches in place on the consumer task rather than round-tripping
//! through the channel: the channel's ack can only be sent by this same
//! task looping back to `recv`, which can't happen while it's still awaiting
//! the handler that issued the nested emit.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use std::panic::AssertUnwindSafe;

use ferretbot_core::{Clock, Envelope, PartialEnvelope, SystemClock};
use futures::future::BoxFuture;
use futures::FutureExt;
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};

/// A subscribed handler. Boxed so typed and wildcard handlers share a type.
pub type Handler = Arc<dyn Fn(Envelope) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

#[derive(Default)]
struct Registry {
    typed: HashMap<String, Vec<Handler>>,
    wildcard: Vec<Handler>,
}

/// Returned by `subscribe`/`subscribe_all`; call it to remove the handler.
/// An explicit unsubscribe closure rather than drop-to-remove, since
/// subscriptions are typically held for the process lifetime and an
/// implicit removal-on-drop would be surprising for a long-lived `Arc`.
pub type Unsubscribe = Box<dyn FnOnce() + Send>;

struct Job {
    envelope: Envelope,
    ack: oneshot::Sender<()>,
}

tokio::task_local! {
    static IN_DISPATCH: ();
}

/// Clonable handle to the bus; internally wraps an `Arc` so every clone
/// shares the same registry and consumer task.
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<Inner>,
}

struct Inner {
    registry: Mutex<Registry>,
    tx: mpsc::UnboundedSender<Job>,
    clock: Arc<dyn Clock>,
    queue_depth: AtomicUsize,
}

impl EventBus {
    /// Construct a new bus and spawn its consumer loop.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let inner = Arc::new(Inner {
            registry: Mutex::new(Registry::default()),
            tx,
            clock,
            queue_depth: AtomicUsize::new(0),
        });
        let bus = Self { inner };
        bus.spawn_consumer(rx);
        bus
    }

    fn spawn_consumer(&self, mut rx: mpsc::UnboundedReceiver<Job>) {
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            while let Some(job) = rx.recv().await {
                inner.queue_depth.fetch_sub(1, Ordering::SeqCst);
                IN_DISPATCH.scope((), dispatch(&inner, &job.envelope)).await;
                let _ = job.ack.send(());
            }
        });
    }

    /// Register a handler for a specific event type. Returns a closure that
    /// removes the handler when called.
    pub fn subscribe<F>(&self, event_type: impl Into<String>, handler: F) -> Unsubscribe
    where
        F: Fn(Envelope) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync + 'static,
    {
        let event_type = event_type.into();
        let handler: Handler = Arc::new(handler);
        let slot = handler.clone();
        self.inner.registry.lock().typed.entry(event_type.clone()).or_default().push(handler);

        let inner = Arc::clone(&self.inner);
        Box::new(move || {
            let mut registry = inner.registry.lock();
            if let Some(list) = registry.typed.get_mut(&event_type) {
                list.retain(|h| !Arc::ptr_eq(h, &slot));
            }
        })
    }

    /// Register a handler invoked for every event, regardless of type.
    pub fn subscribe_all<F>(&self, handler: F) -> Unsubscribe
    where
        F: Fn(Envelope) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync + 'static,
    {
        let handler: Handler = Arc::new(handler);
        let slot = handler.clone();
        self.inner.registry.lock().wildcard.push(handler);

        let inner = Arc::clone(&self.inner);
        Box::new(move || {
            inner.registry.lock().wildcard.retain(|h| !Arc::ptr_eq(h, &slot));
        })
    }

    /// Emit an event. Resolves once every subscribed handler has completed,
    /// in FIFO order relative to other `emit` calls.
    pub async fn emit(&self, partial: PartialEnvelope) {
        let envelope = partial.into_envelope(self.inner.clock.epoch_ms());
        if IN_DISPATCH.try_with(|_| ()).is_ok() {
            dispatch(&self.inner, &envelope).await;
            return;
        }
        let (ack_tx, ack_rx) = oneshot::channel();
        self.inner.queue_depth.fetch_add(1, Ordering::SeqCst);
        if self.inner.tx.send(Job { envelope, ack: ack_tx }).is_err() {
            tracing::error!("event bus consumer task is gone, dropping event");
            self.inner.queue_depth.fetch_sub(1, Ordering::SeqCst);
            return;
        }
        let _ = ack_rx.await;
    }

    /// Number of events enqueued but not yet fully dispatched.
    pub fn queue_depth(&self) -> usize {
        self.inner.queue_depth.load(Ordering::SeqCst)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

async fn dispatch(inner: &Arc<Inner>, envelope: &Envelope) {
    let handlers = {
        let registry = inner.registry.lock();
        let mut matched: Vec<Handler> =
            registry.typed.get(&envelope.r#type).cloned().unwrap_or_default();
        matched.extend(registry.wildcard.iter().cloned());
        matched
    };
    for handler in handlers {
        // A handler is third-party-ish glue (an agent loop, a gateway
        // forwarder); one panicking must not take the whole consumer task,
        // and with it every other subscriber, down with it.
        match AssertUnwindSafe(handler(envelope.clone())).catch_unwind().await {
            Ok(Ok(())) => {}
            Ok(Err(error)) => {
                tracing::error!(event_type = %envelope.r#type, %error, "event handler failed");
            }
            Err(panic) => {
                let message = panic_message(&panic);
                tracing::error!(event_type = %envelope.r#type, panic = %message, "event handler panicked");
            }
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;

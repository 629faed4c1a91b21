//! # Dispatch loop: the single consumer of a gate's queue.
//!
//! ```text
//! loop {
//!   ├─► wait for next event (or cancellation)
//!   ├─► registry.begin_dispatch()          (snapshot, staging on)
//!   ├─► for listener in snapshot:
//!   │     └─ event.deliver_to(listener)    (panic caught, logged, counted)
//!   └─► guard dropped                       (staged adds, then removes)
//! }
//!
//! On exit (cancel or drop):
//!   running = false ─► discard queued events ─► return queue to the gate
//! ```
//!
//! ## Rules
//! - Exactly one [`Dispatcher`] exists per gate at a time (it owns the receiver).
//! - Events are delivered strictly in queue order, listeners in registration order.
//! - Cancellation may interrupt a delivery: listeners already notified stay
//!   notified, the rest are skipped.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::handle::EventGate;
use crate::diagnostics::{Diagnostic, DiagnosticKind};
use crate::events::Event;

/// Dispatch worker of one gate. Obtained from [`EventGate::dispatcher`].
pub struct Dispatcher {
    gate: EventGate,
    rx: Option<mpsc::Receiver<Arc<Event>>>,
}

impl Dispatcher {
    pub(crate) fn new(gate: EventGate, rx: mpsc::Receiver<Arc<Event>>) -> Self {
        Self { gate, rx: Some(rx) }
    }

    /// The gate this worker serves.
    pub fn gate(&self) -> &EventGate {
        &self.gate
    }

    /// Drains the queue until `token` is cancelled.
    pub async fn run(mut self, token: CancellationToken) {
        let inner = &self.gate.inner;
        tracing::debug!(gate = %inner.name, "dispatch worker started");
        inner.diagnose(Diagnostic::new(DiagnosticKind::DispatchStarted));

        loop {
            let Some(rx) = self.rx.as_mut() else { break };
            let event = tokio::select! {
                biased;
                _ = token.cancelled() => break,
                ev = rx.recv() => match ev {
                    Some(ev) => ev,
                    None => break,
                },
            };

            tokio::select! {
                biased;
                _ = token.cancelled() => {
                    tracing::debug!(gate = %self.gate.inner.name, seq = event.seq, "delivery interrupted by cancellation");
                    break;
                }
                _ = deliver(&self.gate, &event) => {}
            }
        }
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        let inner = &self.gate.inner;
        inner.set_running(false);

        let mut discarded = 0usize;
        if let Some(mut rx) = self.rx.take() {
            while rx.try_recv().is_ok() {
                discarded += 1;
            }
            *inner.rx_slot() = Some(rx);
        }

        tracing::debug!(gate = %inner.name, discarded, "dispatch worker stopped");
        inner.diagnose(
            Diagnostic::new(DiagnosticKind::DispatchStopped)
                .with_reason(format!("discarded={discarded}")),
        );
    }
}

/// Delivers one event to every listener currently registered at `gate`.
async fn deliver(gate: &EventGate, event: &Event) {
    let inner = &gate.inner;
    let guard = inner.listeners.begin_dispatch();
    tracing::trace!(
        gate = %inner.name,
        seq = event.seq,
        event = event.type_identity(),
        listeners = guard.listeners().len(),
        "delivering"
    );

    for listener in guard.listeners() {
        let fut = event.deliver_to(listener.as_ref());
        if let Err(panic_err) = AssertUnwindSafe(fut).catch_unwind().await {
            let info = panic_message(&*panic_err);
            inner.stats.record_listener_panic();
            tracing::error!(
                gate = %inner.name,
                listener = listener.name(),
                event = event.type_identity(),
                panic = %info,
                "listener panicked while handling event"
            );
            inner.diagnose(Diagnostic::listener_panicked(event.type_identity(), info));
        }
    }

    inner.stats.record_delivered();
    drop(guard);
}

fn panic_message(any: &(dyn Any + Send)) -> String {
    if let Some(msg) = any.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = any.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

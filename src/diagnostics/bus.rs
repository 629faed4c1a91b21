//! # Diagnostics bus.
//!
//! [`Bus`] is a thin wrapper around [`tokio::sync::broadcast`] that lets gates
//! report what they silently absorb (overflow, idle drops, listener panics,
//! rejected remote deliveries) without ever blocking the producer.
//!
//! ```text
//! Publishers (many):               Receivers (any):
//!   gate "a" ──┐
//!   gate "b" ──┼──────► Bus ───────► test assertions / metrics exporters / loggers
//!   remote   ──┘  (broadcast chan)
//! ```
//!
//! ## Rules
//! - **Non-blocking publish**: `publish()` never blocks; it calls `broadcast::Sender::send`.
//! - **Bounded capacity**: one ring buffer shared by all receivers.
//! - **Lag handling**: slow receivers get `RecvError::Lagged(n)` and skip `n` oldest items.
//! - **No persistence**: diagnostics are lost if nobody is subscribed at send time.

use tokio::sync::broadcast;

use super::diagnostic::Diagnostic;

/// Broadcast channel for fabric diagnostics.
///
/// Cheap to clone (internally holds an `Arc`-backed sender).
#[derive(Clone, Debug)]
pub struct Bus {
    tx: broadcast::Sender<Diagnostic>,
}

impl Bus {
    /// Creates a new bus with the given channel capacity (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (tx, _rx) = broadcast::channel::<Diagnostic>(capacity);
        Self { tx }
    }

    /// Publishes a diagnostic to all active receivers.
    ///
    /// If there are no receivers, the diagnostic is dropped.
    pub fn publish(&self, d: Diagnostic) {
        let _ = self.tx.send(d);
    }

    /// Creates a new receiver that will observe subsequent diagnostics.
    pub fn subscribe(&self) -> broadcast::Receiver<Diagnostic> {
        self.tx.subscribe()
    }
}

impl Default for Bus {
    fn default() -> Self {
        Self::new(1024)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::DiagnosticKind;

    #[tokio::test]
    async fn receivers_only_see_later_diagnostics() {
        let bus = Bus::new(4);
        bus.publish(Diagnostic::new(DiagnosticKind::GateIdle).with_gate("early"));

        let mut rx = bus.subscribe();
        bus.publish(Diagnostic::new(DiagnosticKind::QueueOverflow).with_gate("late"));

        let d = rx.recv().await.unwrap();
        assert_eq!(d.kind, DiagnosticKind::QueueOverflow);
        assert_eq!(d.gate.as_deref(), Some("late"));
    }

    #[test]
    fn zero_capacity_is_clamped() {
        let bus = Bus::new(0);
        let _rx = bus.subscribe();
        bus.publish(Diagnostic::new(DiagnosticKind::DispatchStarted));
    }
}

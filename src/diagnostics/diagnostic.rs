//! # Diagnostics emitted by gates.
//!
//! The [`DiagnosticKind`] enum classifies what a gate reports:
//! - **Loss**: events absorbed without delivery (overflow, idle gate, unknown wire type)
//! - **Faults**: listener panics, rejected remote deliveries
//! - **Lifecycle**: dispatch worker start/stop
//!
//! None of these are surfaced to producers; they exist so that operators and
//! tests can observe the fabric's backpressure and failure behavior.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::SystemTime;

/// Global sequence counter for diagnostic ordering.
static DIAG_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of fabric diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticKind {
    /// An event was dropped because the gate's queue was full.
    ///
    /// Sets:
    /// - `gate`: receiving gate
    /// - `event_type`: type identity of the dropped event
    QueueOverflow,

    /// An event was dropped because the gate's dispatch worker is not running.
    ///
    /// Sets:
    /// - `gate`: receiving gate
    /// - `event_type`: type identity of the dropped event
    GateIdle,

    /// A listener panicked while handling an event.
    ///
    /// Sets:
    /// - `gate`: dispatching gate
    /// - `event_type`: type identity of the event
    /// - `reason`: panic message
    ListenerPanicked,

    /// The dispatch worker of a gate started.
    ///
    /// Sets:
    /// - `gate`
    DispatchStarted,

    /// The dispatch worker of a gate stopped.
    ///
    /// Sets:
    /// - `gate`
    /// - `reason`: number of pending events discarded
    DispatchStopped,

    /// A remote gate answered an outbound delivery with a non-success status.
    ///
    /// Sets:
    /// - `gate`: sending gate
    /// - `event_type`
    /// - `reason`: status code and target
    RemoteRejected,

    /// An inbound HTTP event announced a type no instantiator knows.
    ///
    /// Sets:
    /// - `gate`: receiving remote gate
    /// - `event_type`: announced type identity
    UnknownEventType,
}

impl DiagnosticKind {
    /// Short stable label (snake_case) for logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            DiagnosticKind::QueueOverflow => "queue_overflow",
            DiagnosticKind::GateIdle => "gate_idle",
            DiagnosticKind::ListenerPanicked => "listener_panicked",
            DiagnosticKind::DispatchStarted => "dispatch_started",
            DiagnosticKind::DispatchStopped => "dispatch_stopped",
            DiagnosticKind::RemoteRejected => "remote_rejected",
            DiagnosticKind::UnknownEventType => "unknown_event_type",
        }
    }
}

/// Diagnostic record with optional metadata.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Classification.
    pub kind: DiagnosticKind,
    /// Name of the gate that reported it.
    pub gate: Option<Arc<str>>,
    /// Type identity of the event involved, if any.
    pub event_type: Option<Arc<str>>,
    /// Human-readable detail.
    pub reason: Option<Arc<str>>,
}

impl Diagnostic {
    /// Creates a diagnostic of the given kind with current timestamp and next sequence number.
    pub fn new(kind: DiagnosticKind) -> Self {
        Self {
            seq: DIAG_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            gate: None,
            event_type: None,
            reason: None,
        }
    }

    #[inline]
    pub fn with_gate(mut self, gate: impl Into<Arc<str>>) -> Self {
        self.gate = Some(gate.into());
        self
    }

    #[inline]
    pub fn with_event_type(mut self, event_type: impl Into<Arc<str>>) -> Self {
        self.event_type = Some(event_type.into());
        self
    }

    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Creates a listener panic diagnostic.
    pub(crate) fn listener_panicked(event_type: &str, info: String) -> Self {
        Diagnostic::new(DiagnosticKind::ListenerPanicked)
            .with_event_type(event_type)
            .with_reason(info)
    }
}

//! # EventGate: addressable node of the fabric.
//!
//! A gate owns a bounded inbound queue, a [`ListenerRegistry`] and a set of
//! symmetric links to other gates.
//!
//! ## Data flow
//! ```text
//! producer ── post(e) ──► snapshot partners ──► partner B.enqueue(e) ──► [queue B] ──► B's dispatch loop
//!                                          └──► partner C.enqueue(e) ──► [queue C] ──► C's dispatch loop
//!
//! producer ── post_local(e) ──► self.enqueue(e) ──► [own queue] ──► own dispatch loop
//! ```
//!
//! ## Rules
//! - **One hop**: `post` forwards to direct partners only; partners never re-forward.
//! - **No self-delivery**: `post` never enqueues into the posting gate's own queue.
//! - **Non-blocking**: enqueue uses `try_send`; a full queue or an idle gate drops
//!   the event for that destination only. Producers are never told; drops are
//!   counted in [`StatsSnapshot`] and published on the diagnostics [`Bus`].
//! - **Fixed capacity**: set at construction, never resized.
//!
//! ## Example
//! ```rust
//! use gatefabric::{AddItem, Event, EventGate};
//! use tokio_util::sync::CancellationToken;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), gatefabric::GateError> {
//! let app = EventGate::new("app");
//! let model = EventGate::new("model");
//! app.link(&model)?;
//!
//! let token = CancellationToken::new();
//! let worker = model.start(token.clone())?;
//!
//! app.post(Event::new(AddItem::new("item-1")));
//!
//! token.cancel();
//! let _ = worker.await;
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::dispatch::Dispatcher;
use super::links::{self, Links};
use super::stats::{GateStats, StatsSnapshot};
use crate::diagnostics::{Bus, Diagnostic, DiagnosticKind};
use crate::error::GateError;
use crate::events::Event;
use crate::listeners::{Listener, ListenerRegistry, Mutation};

/// Default number of queue slots per gate.
pub const DEFAULT_QUEUE_CAPACITY: usize = 20;

/// Source of unique gate ids (lock ordering key).
static GATE_IDS: AtomicU64 = AtomicU64::new(1);

type Receiver = mpsc::Receiver<Arc<Event>>;

pub(crate) struct GateInner {
    pub(crate) id: u64,
    pub(crate) name: Arc<str>,
    pub(crate) capacity: usize,
    pub(crate) links: Links,
    pub(crate) listeners: ListenerRegistry,
    pub(crate) stats: GateStats,
    pub(crate) bus: Option<Bus>,
    running: AtomicBool,
    tx: mpsc::Sender<Arc<Event>>,
    rx: Mutex<Option<Receiver>>,
}

impl GateInner {
    pub(crate) fn rx_slot(&self) -> MutexGuard<'_, Option<Receiver>> {
        self.rx.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn set_running(&self, running: bool) {
        self.running.store(running, Ordering::Release);
    }

    pub(crate) fn diagnose(&self, d: Diagnostic) {
        if let Some(bus) = &self.bus {
            bus.publish(d.with_gate(Arc::clone(&self.name)));
        }
    }

    /// Best-effort enqueue into this gate's own queue.
    pub(crate) fn enqueue(&self, event: Arc<Event>) -> bool {
        if !self.running.load(Ordering::Acquire) {
            self.stats.record_dropped_idle();
            tracing::debug!(gate = %self.name, event = event.type_identity(), "dispatch worker not running; event dropped");
            self.diagnose(
                Diagnostic::new(DiagnosticKind::GateIdle).with_event_type(event.type_identity()),
            );
            return false;
        }

        match self.tx.try_send(event) {
            Ok(()) => {
                self.stats.record_accepted();
                true
            }
            Err(mpsc::error::TrySendError::Full(event)) => {
                self.stats.record_dropped_full();
                tracing::warn!(gate = %self.name, event = event.type_identity(), capacity = self.capacity, "queue full; event dropped");
                self.diagnose(
                    Diagnostic::new(DiagnosticKind::QueueOverflow)
                        .with_event_type(event.type_identity()),
                );
                false
            }
            Err(mpsc::error::TrySendError::Closed(event)) => {
                self.stats.record_dropped_idle();
                tracing::debug!(gate = %self.name, event = event.type_identity(), "queue closed; event dropped");
                self.diagnose(
                    Diagnostic::new(DiagnosticKind::GateIdle)
                        .with_event_type(event.type_identity())
                        .with_reason("closed"),
                );
                false
            }
        }
    }
}

impl Drop for GateInner {
    fn drop(&mut self) {
        links::detach(self.id, self.links.get_mut());
    }
}

/// Handle to a gate. Cheap to clone; clones refer to the same gate.
#[derive(Clone)]
pub struct EventGate {
    pub(crate) inner: Arc<GateInner>,
}

impl EventGate {
    /// Creates a gate with [`DEFAULT_QUEUE_CAPACITY`] slots and no diagnostics bus.
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self::builder(name).build()
    }

    /// Starts configuring a gate.
    pub fn builder(name: impl Into<Arc<str>>) -> GateBuilder {
        GateBuilder::new(name)
    }

    /// Diagnostic name (not a routing key).
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Queue capacity fixed at construction.
    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    /// Returns true while a dispatch worker owns this gate's queue.
    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::Acquire)
    }

    /// Current counters.
    pub fn stats(&self) -> StatsSnapshot {
        self.inner.stats.snapshot()
    }

    /// Non-owning handle, for listeners that need to reach the gate they are
    /// registered at without keeping it alive.
    pub fn downgrade(&self) -> WeakGate {
        WeakGate {
            inner: Arc::downgrade(&self.inner),
        }
    }

    // ---- link graph ----

    /// Links this gate and `other` symmetrically.
    ///
    /// Returns `Ok(false)` if they were already linked.
    pub fn link(&self, other: &EventGate) -> Result<bool, GateError> {
        if self.inner.id == other.inner.id {
            return Err(GateError::SelfLink {
                gate: self.name().to_owned(),
            });
        }
        let added = links::link(&self.inner, &other.inner);
        if added {
            tracing::debug!(gate = %self.inner.name, partner = %other.inner.name, "linked");
        }
        Ok(added)
    }

    /// Removes the link with `other`, if any. Returns true if a link was removed.
    pub fn unlink(&self, other: &EventGate) -> bool {
        if self.inner.id == other.inner.id {
            return false;
        }
        let removed = links::unlink(&self.inner, &other.inner);
        if removed {
            tracing::debug!(gate = %self.inner.name, partner = %other.inner.name, "unlinked");
        }
        removed
    }

    /// Removes every link of this gate. Returns the number of links removed.
    pub fn unlink_all(&self) -> usize {
        let removed = links::unlink_all(&self.inner);
        tracing::debug!(gate = %self.inner.name, removed, "unlinked from all partners");
        removed
    }

    /// Returns true if this gate is linked to `other`.
    pub fn is_linked_to(&self, other: &EventGate) -> bool {
        self.inner.links.contains(other.inner.id)
    }

    /// Current partners.
    pub fn partners(&self) -> Vec<EventGate> {
        self.inner
            .links
            .snapshot()
            .into_iter()
            .map(|inner| EventGate { inner })
            .collect()
    }

    /// Number of partners.
    pub fn partner_count(&self) -> usize {
        self.inner.links.len()
    }

    // ---- posting ----

    /// Forwards `event` to every linked partner's queue (never to this gate's own queue).
    pub fn post(&self, event: Event) {
        self.post_arc(Arc::new(event));
    }

    /// Same as [`post`](Self::post) for an already shared event.
    pub fn post_arc(&self, event: Arc<Event>) {
        let targets = self.inner.links.snapshot();
        for target in &targets {
            target.enqueue(Arc::clone(&event));
        }
    }

    /// Forwards each event to every partner, preserving the events' order at each destination.
    pub fn post_batch<I>(&self, events: I)
    where
        I: IntoIterator<Item = Event>,
    {
        let events: Vec<Arc<Event>> = events.into_iter().map(Arc::new).collect();
        let targets = self.inner.links.snapshot();
        for target in &targets {
            for event in &events {
                target.enqueue(Arc::clone(event));
            }
        }
    }

    /// Injects `event` into this gate's own queue, bypassing the link graph.
    pub fn post_local(&self, event: Event) {
        self.inner.enqueue(Arc::new(event));
    }

    // ---- listeners ----

    /// Registers a listener. Staged if called while an event is being delivered.
    pub fn add_listener(&self, listener: Arc<dyn Listener>) -> Mutation {
        self.inner.listeners.add(listener)
    }

    /// Unregisters a listener by identity. Staged if called while an event is being delivered.
    ///
    /// A listener can remove itself from inside its own callback with
    /// `gate.remove_listener(self)`.
    pub fn remove_listener(&self, listener: &dyn Listener) -> Mutation {
        self.inner.listeners.remove(listener)
    }

    /// Drops every registered listener.
    pub fn clear_all_listeners(&self) {
        self.inner.listeners.clear();
    }

    /// Number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.inner.listeners.len()
    }

    // ---- dispatch worker ----

    /// Hands out this gate's dispatch worker and marks the gate running.
    ///
    /// Events left over from a previous run are discarded. Fails if a worker
    /// already owns the queue.
    pub fn dispatcher(&self) -> Result<Dispatcher, GateError> {
        let mut slot = self.inner.rx_slot();
        let Some(mut rx) = slot.take() else {
            return Err(GateError::AlreadyRunning {
                gate: self.name().to_owned(),
            });
        };
        while rx.try_recv().is_ok() {}
        self.inner.set_running(true);
        Ok(Dispatcher::new(self.clone(), rx))
    }

    /// Spawns this gate's dispatch worker on the current tokio runtime.
    ///
    /// The worker runs until `token` is cancelled.
    pub fn start(&self, token: CancellationToken) -> Result<JoinHandle<()>, GateError> {
        let dispatcher = self.dispatcher()?;
        Ok(tokio::spawn(dispatcher.run(token)))
    }
}

impl PartialEq for EventGate {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl Eq for EventGate {}

impl fmt::Debug for EventGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventGate")
            .field("id", &self.inner.id)
            .field("name", &self.inner.name)
            .field("running", &self.is_running())
            .finish()
    }
}

/// Non-owning reference to an [`EventGate`], obtained with [`EventGate::downgrade`].
#[derive(Clone, Debug, Default)]
pub struct WeakGate {
    inner: Weak<GateInner>,
}

impl WeakGate {
    /// The gate, if it is still alive.
    pub fn upgrade(&self) -> Option<EventGate> {
        self.inner.upgrade().map(|inner| EventGate { inner })
    }
}

/// Builder for [`EventGate`].
pub struct GateBuilder {
    name: Arc<str>,
    capacity: usize,
    bus: Option<Bus>,
}

impl GateBuilder {
    fn new(name: impl Into<Arc<str>>) -> Self {
        Self {
            name: name.into(),
            capacity: DEFAULT_QUEUE_CAPACITY,
            bus: None,
        }
    }

    /// Sets the queue capacity (minimum 1).
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self
    }

    /// Publishes this gate's diagnostics on `bus`.
    pub fn diagnostics(mut self, bus: Bus) -> Self {
        self.bus = Some(bus);
        self
    }

    /// Builds the gate (not running).
    pub fn build(self) -> EventGate {
        let (tx, rx) = mpsc::channel(self.capacity);
        EventGate {
            inner: Arc::new(GateInner {
                id: GATE_IDS.fetch_add(1, Ordering::Relaxed),
                listeners: ListenerRegistry::new(Arc::clone(&self.name)),
                name: self.name,
                capacity: self.capacity,
                links: Links::default(),
                stats: GateStats::default(),
                bus: self.bus,
                running: AtomicBool::new(false),
                tx,
                rx: Mutex::new(Some(rx)),
            }),
        }
    }
}

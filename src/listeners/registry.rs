//! # Listener registry with staged mutation.
//!
//! Holds the listeners of one gate. The dispatch loop iterates a snapshot of
//! the registry for each event; listeners may add or remove listeners while
//! that iteration is in progress (including removing themselves).
//!
//! ## Mutation rules
//! ```text
//! add/remove ──► lock state
//!                 ├─ dispatching == false ─► apply to live list immediately
//!                 └─ dispatching == true  ─► push to pending_add / pending_remove
//!
//! DispatchGuard::drop ──► lock state
//!                          ├─ apply all pending adds (in order)
//!                          ├─ apply all pending removes
//!                          └─ dispatching = false
//! ```
//!
//! The `dispatching` flag is set for the whole delivery of one event, so a
//! mutation issued from *any* task during that window is staged and becomes
//! visible before the next event is delivered.
//!
//! Listeners are identified by object address: registering the same object
//! twice on one registry is a no-op; the same object may be registered on
//! several registries independently.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::listener::{Listener, ListenerKey};

/// Outcome of a registry mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutation {
    /// The live listener list was changed.
    Applied,
    /// A delivery is in progress; the change is deferred until it completes.
    Staged,
    /// Nothing to do (already registered / not registered).
    Unchanged,
}

#[derive(Default)]
struct State {
    live: Vec<Arc<dyn Listener>>,
    dispatching: bool,
    pending_add: Vec<Arc<dyn Listener>>,
    pending_remove: Vec<ListenerKey>,
}

impl State {
    fn contains(&self, key: ListenerKey) -> bool {
        self.live.iter().any(|l| ListenerKey::of(l.as_ref()) == key)
    }

    fn apply_pending(&mut self) -> (usize, usize) {
        let mut added = 0;
        for l in std::mem::take(&mut self.pending_add) {
            if !self.contains(ListenerKey::of(l.as_ref())) {
                self.live.push(l);
                added += 1;
            }
        }

        let before = self.live.len();
        let removes = std::mem::take(&mut self.pending_remove);
        self.live
            .retain(|l| !removes.contains(&ListenerKey::of(l.as_ref())));
        (added, before - self.live.len())
    }
}

/// Listener set of one gate.
pub struct ListenerRegistry {
    gate: Arc<str>,
    state: Mutex<State>,
}

impl ListenerRegistry {
    /// Creates an empty registry owned by the gate named `gate`.
    pub fn new(gate: impl Into<Arc<str>>) -> Self {
        Self {
            gate: gate.into(),
            state: Mutex::new(State::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers a listener (immediately, or staged during a delivery).
    pub fn add(&self, listener: Arc<dyn Listener>) -> Mutation {
        let mut st = self.lock();
        if st.dispatching {
            tracing::debug!(gate = %self.gate, listener = listener.name(), "listener add staged until delivery completes");
            st.pending_add.push(listener);
            return Mutation::Staged;
        }
        if st.contains(ListenerKey::of(listener.as_ref())) {
            return Mutation::Unchanged;
        }
        st.live.push(listener);
        tracing::debug!(gate = %self.gate, listeners = st.live.len(), "listener added");
        Mutation::Applied
    }

    /// Unregisters a listener (immediately, or staged during a delivery).
    pub fn remove(&self, listener: &dyn Listener) -> Mutation {
        let key = ListenerKey::of(listener);
        let mut st = self.lock();
        if st.dispatching {
            tracing::debug!(gate = %self.gate, listener = listener.name(), "listener removal staged until delivery completes");
            st.pending_remove.push(key);
            return Mutation::Staged;
        }
        let before = st.live.len();
        st.live.retain(|l| ListenerKey::of(l.as_ref()) != key);
        if st.live.len() == before {
            return Mutation::Unchanged;
        }
        tracing::debug!(gate = %self.gate, listeners = st.live.len(), "listener removed");
        Mutation::Applied
    }

    /// Drops every listener, including staged additions.
    pub fn clear(&self) {
        let mut st = self.lock();
        st.live.clear();
        st.pending_add.clear();
    }

    /// Number of live listeners.
    pub fn len(&self) -> usize {
        self.lock().live.len()
    }

    /// Returns true if no listener is registered.
    pub fn is_empty(&self) -> bool {
        self.lock().live.is_empty()
    }

    /// Marks a delivery as in progress and returns the listeners to notify.
    ///
    /// Staged mutations are applied when the returned guard is dropped, which
    /// also happens if delivery is cancelled or unwinds.
    pub(crate) fn begin_dispatch(&self) -> DispatchGuard<'_> {
        let mut st = self.lock();
        debug_assert!(!st.dispatching, "nested dispatch on one registry");
        st.dispatching = true;
        DispatchGuard {
            registry: self,
            listeners: st.live.clone(),
        }
    }
}

/// Snapshot of listeners for one delivery; applies staged changes on drop.
pub(crate) struct DispatchGuard<'a> {
    registry: &'a ListenerRegistry,
    listeners: Vec<Arc<dyn Listener>>,
}

impl DispatchGuard<'_> {
    pub(crate) fn listeners(&self) -> &[Arc<dyn Listener>] {
        &self.listeners
    }
}

impl Drop for DispatchGuard<'_> {
    fn drop(&mut self) {
        let mut st = self.registry.lock();
        let (added, removed) = st.apply_pending();
        st.dispatching = false;
        if added + removed > 0 {
            tracing::debug!(
                gate = %self.registry.gate,
                added,
                removed,
                listeners = st.live.len(),
                "staged listener changes applied"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Nop;
    impl Listener for Nop {}

    #[test]
    fn add_is_idempotent_per_object() {
        let reg = ListenerRegistry::new("g");
        let l: Arc<dyn Listener> = Arc::new(Nop);

        assert_eq!(reg.add(Arc::clone(&l)), Mutation::Applied);
        assert_eq!(reg.add(Arc::clone(&l)), Mutation::Unchanged);
        assert_eq!(reg.len(), 1);

        assert_eq!(reg.add(Arc::new(Nop)), Mutation::Applied);
        assert_eq!(reg.len(), 2);
    }

    #[test]
    fn remove_unknown_is_unchanged() {
        let reg = ListenerRegistry::new("g");
        assert_eq!(reg.remove(&Nop), Mutation::Unchanged);
    }

    #[test]
    fn mutations_during_dispatch_are_staged() {
        let reg = ListenerRegistry::new("g");
        let a: Arc<dyn Listener> = Arc::new(Nop);
        let b: Arc<dyn Listener> = Arc::new(Nop);
        reg.add(Arc::clone(&a));

        {
            let guard = reg.begin_dispatch();
            assert_eq!(guard.listeners().len(), 1);

            assert_eq!(reg.remove(a.as_ref()), Mutation::Staged);
            assert_eq!(reg.add(Arc::clone(&b)), Mutation::Staged);
            assert_eq!(reg.len(), 1);
        }

        assert_eq!(reg.len(), 1);
        let guard = reg.begin_dispatch();
        assert_eq!(
            ListenerKey::of(guard.listeners()[0].as_ref()),
            ListenerKey::of(b.as_ref())
        );
    }

    #[test]
    fn staged_add_then_remove_nets_to_removed() {
        let reg = ListenerRegistry::new("g");
        let a: Arc<dyn Listener> = Arc::new(Nop);
        {
            let _guard = reg.begin_dispatch();
            reg.add(Arc::clone(&a));
            reg.remove(a.as_ref());
        }
        assert!(reg.is_empty());
    }

    #[test]
    fn clear_drops_staged_additions() {
        let reg = ListenerRegistry::new("g");
        reg.add(Arc::new(Nop));
        {
            let _guard = reg.begin_dispatch();
            reg.add(Arc::new(Nop));
            reg.clear();
        }
        assert!(reg.is_empty());
    }
}

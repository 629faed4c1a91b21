//! # Core listener trait
//!
//! `Listener` is the extension point applications implement to receive events
//! from a gate. It is a capability set: one callback per event type, each
//! defaulting to a no-op. A listener that only cares about [`ItemAdded`]
//! overrides `on_item_added` and is silently skipped for everything else.
//!
//! ## Contract
//! - Callbacks run on the gate's dispatch worker, one event at a time, in
//!   registration order. A slow listener delays the others on the same gate.
//! - Callbacks may call [`EventGate::add_listener`](crate::EventGate::add_listener)
//!   or [`EventGate::remove_listener`](crate::EventGate::remove_listener) on the
//!   gate that is delivering to them; the change takes effect before the next event.
//! - A panicking callback is isolated: it is logged and the remaining listeners
//!   still receive the event.
//! - A gate owns its listeners. A listener that stores a strong
//!   [`EventGate`](crate::EventGate) of the gate it is registered at forms a
//!   reference cycle: the gate is never dropped (and never leaves the link
//!   graph) until the listener is removed. Store a
//!   [`WeakGate`](crate::WeakGate) from `EventGate::downgrade` instead.
//!
//! ## Example
//! ```rust
//! use gatefabric::{Event, ItemAdded, Listener};
//! use async_trait::async_trait;
//!
//! struct Inventory;
//!
//! #[async_trait]
//! impl Listener for Inventory {
//!     async fn on_item_added(&self, _ev: &Event, item: &ItemAdded) {
//!         println!("added {}", item.source_item_uid);
//!     }
//!     fn name(&self) -> &'static str { "inventory" }
//! }
//! ```

use async_trait::async_trait;

use crate::events::{AddItem, CustomEvent, Event, ItemAdded, NewItem};

/// Typed event handlers registered at a gate.
#[async_trait]
pub trait Listener: Send + Sync + 'static {
    /// Called for [`NewItem`] events.
    async fn on_new_item(&self, _event: &Event, _item: &NewItem) {}

    /// Called for [`AddItem`] events.
    async fn on_add_item(&self, _event: &Event, _request: &AddItem) {}

    /// Called for [`ItemAdded`] events.
    async fn on_item_added(&self, _event: &Event, _item: &ItemAdded) {}

    /// Called for application-defined events.
    async fn on_custom(&self, _event: &Event, _custom: &CustomEvent) {}

    /// Human-readable name (for logs/diagnostics).
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// Identity of a listener object, independent of the `Arc` used to register it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct ListenerKey(usize);

impl ListenerKey {
    #[inline]
    pub(crate) fn of(listener: &dyn Listener) -> Self {
        Self(listener as *const dyn Listener as *const () as usize)
    }
}

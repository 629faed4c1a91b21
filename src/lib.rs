//! # gatefabric
//!
//! **gatefabric** is an in-process event fabric: named gates, linked to each
//! other symmetrically, forwarding typed events one hop to their partners and
//! delivering them to listeners from a single dispatch worker per gate.
//! Remote gates extend the fabric across processes over plain HTTP.
//!
//! ## Architecture
//! ```text
//!   producer
//!      │ post(e)
//!      ▼
//! ┌──────────┐  link  ┌──────────┐  link  ┌──────────────┐
//! │ gate "a" │◄──────►│ gate "b" │◄──────►│ remote "hub" │◄─── POST /event-gate/hub
//! └──────────┘        └────┬─────┘        └──────┬───────┘       (other process)
//!                          │ bounded queue        │ bounded queue
//!                          ▼                      ▼
//!                   dispatch worker         dispatch worker ──► post_http_event(url, e)
//!                          │                      │
//!                   listener, listener…     listener, listener…
//! ```
//!
//! - **One hop**: `post` reaches direct partners only, never the posting gate.
//! - **Best effort**: queues are bounded; a full or idle gate drops the event.
//!   Drops are counted ([`StatsSnapshot`]) and reported on the diagnostics [`Bus`].
//! - **Ordered per gate**: a gate's listeners see its events in arrival order.
//! - **Re-entrant listeners**: listeners may add or remove listeners (themselves
//!   included) while handling an event; the change applies after that event.
//!
//! ## Features
//! | Feature   | Description                                     |
//! |-----------|-------------------------------------------------|
//! | `logging` | Exports [`LogListener`], a `tracing`-based listener. |
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use gatefabric::{AddItem, Event, GateHost, HostConfig, Listener};
//!
//! struct Printer;
//!
//! #[async_trait::async_trait]
//! impl Listener for Printer {
//!     async fn on_add_item(&self, _event: &Event, item: &AddItem) {
//!         println!("add {}", item.source_item_uid);
//!     }
//! }
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let host = GateHost::builder(HostConfig::default()).build();
//! let app = host.create_gate("app")?;
//! let model = host.create_gate("model")?;
//! app.link(&model)?;
//! model.add_listener(Arc::new(Printer));
//!
//! host.start()?;
//! app.post(Event::new(AddItem::new("lamp-1")));
//! host.shutdown().await?;
//! # Ok(())
//! # }
//! ```

mod config;
mod diagnostics;
mod error;
mod events;
mod gate;
mod host;
mod listeners;
mod remote;

pub use config::{DEFAULT_BASE_PATH, GateConfig, HostConfig, HttpConfig};
pub use diagnostics::{Bus, Diagnostic, DiagnosticKind};
pub use error::{EndpointError, GateError, HostError, InstantiateError, TransportError};
pub use events::wire;
pub use events::{
    AddItem, CapabilitySelection, CustomEvent, Event, ItemAdded, ItemType, NewItem, Payload,
};
pub use gate::{
    DEFAULT_QUEUE_CAPACITY, Dispatcher, EventGate, GateBuilder, StatsSnapshot, WeakGate,
};
pub use host::{GateHost, GateHostBuilder, wait_for_shutdown_signal};
#[cfg(feature = "logging")]
pub use listeners::LogListener;
pub use listeners::{Listener, ListenerRegistry, Mutation};
pub use remote::{
    AddressMode, AddressProbe, AxumEndpoints, EndpointHandler, EndpointRegistry,
    EventInstantiator, JsonInstantiator, RemoteGate, SystemProbe, resolve_host, sender_address,
};

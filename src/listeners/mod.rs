//! # Event listeners for gates.
//!
//! This module provides the [`Listener`] trait and the per-gate
//! [`ListenerRegistry`] that the dispatch loop iterates.
//!
//! ## Architecture
//! ```text
//! dispatch loop ── pop(Event) ──► registry.begin_dispatch()
//!                                    │   (snapshot, dispatching = true)
//!                                    ├──► event.deliver_to(listener 1)
//!                                    ├──► event.deliver_to(listener 2)
//!                                    │         └─ may call gate.add/remove_listener → staged
//!                                    └──► guard dropped → staged changes applied
//! ```
//!
//! ## Implementing a listener
//! ```no_run
//! use gatefabric::{Event, NewItem, Listener};
//! use async_trait::async_trait;
//!
//! struct Discovery;
//!
//! #[async_trait]
//! impl Listener for Discovery {
//!     async fn on_new_item(&self, _ev: &Event, item: &NewItem) {
//!         // propose the item to the user...
//!     }
//! }
//! ```

mod listener;
mod registry;

#[cfg(feature = "logging")]
mod log;

pub use listener::Listener;
pub use registry::{ListenerRegistry, Mutation};

#[cfg(feature = "logging")]
pub use log::LogListener;

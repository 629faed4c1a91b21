//! # LogListener: simple event tracer
//!
//! A minimal listener that writes every delivered event to `tracing` at INFO.
//! Use it for tests or demos.
//!
//! ## Example output
//! ```text
//! INFO gatefabric: new item pem="zigbee" item="0x12ab" kind=Sensor
//! INFO gatefabric: add item item="0x12ab" props=1
//! INFO gatefabric: item added pem="zigbee" item="0x12ab" sender=Some("node-b.local:8080")
//! INFO gatefabric: custom event event_type="acme.lights.Dimmed"
//! ```

use async_trait::async_trait;

use crate::events::{AddItem, CustomEvent, Event, ItemAdded, NewItem};
use crate::listeners::Listener;

/// Event tracer listener.
#[derive(Default)]
pub struct LogListener;

impl LogListener {
    /// Construct a new [`LogListener`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Listener for LogListener {
    async fn on_new_item(&self, e: &Event, item: &NewItem) {
        tracing::info!(
            seq = e.seq,
            pem = %item.pem_uid,
            item = %item.source_item_uid,
            kind = ?item.item_type,
            "new item"
        );
    }

    async fn on_add_item(&self, e: &Event, req: &AddItem) {
        tracing::info!(
            seq = e.seq,
            item = %req.source_item_uid,
            props = req.user_properties.len(),
            "add item"
        );
    }

    async fn on_item_added(&self, e: &Event, item: &ItemAdded) {
        tracing::info!(
            seq = e.seq,
            pem = %item.pem_uid,
            item = %item.source_item_uid,
            sender = ?e.sender,
            "item added"
        );
    }

    async fn on_custom(&self, e: &Event, custom: &CustomEvent) {
        tracing::info!(seq = e.seq, event_type = %custom.type_name, sender = ?e.sender, "custom event");
    }

    fn name(&self) -> &'static str {
        "LogListener"
    }
}

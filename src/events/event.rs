//! # Events carried by the gate fabric.
//!
//! An [`Event`] is a [`Payload`] plus the metadata the fabric needs around it:
//! a global sequence number, a local timestamp and the network address of the
//! node that sent it over HTTP (if it crossed one).
//!
//! [`Payload`] is a closed set of built-in device-model events plus
//! [`CustomEvent`] for application-defined types. Each variant has a stable
//! **type identity** used both for local dispatch and for wire addressing.
//!
//! ## Dispatch
//! ```text
//! Event::deliver_to(listener)
//!   ├─ Payload::NewItem   ─► listener.on_new_item()
//!   ├─ Payload::AddItem   ─► listener.on_add_item()
//!   ├─ Payload::ItemAdded ─► listener.on_item_added()
//!   └─ Payload::Custom    ─► listener.on_custom()
//! ```
//! Listener methods default to no-ops, so a listener that does not handle a
//! variant is simply skipped.
//!
//! ## Example
//! ```rust
//! use gatefabric::{AddItem, Event, Payload};
//!
//! let ev = Event::new(AddItem::new("item-7").with_user_property("room", "kitchen"));
//!
//! assert_eq!(ev.type_identity(), "gatefabric.pem.AddItem");
//! assert!(ev.sender.is_none());
//! assert!(matches!(ev.payload, Payload::AddItem(_)));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::listeners::Listener;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Kind of physical item announced by a device model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ItemType {
    Sensor,
    Actuator,
    SensorAndActuator,
    Other,
}

/// Whether capabilities of a discovered item must be picked by the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CapabilitySelection {
    #[default]
    No,
    Single,
    Multiple,
}

/// A device model discovered an item that is not yet part of the environment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewItem {
    pub source_item_uid: String,
    pub pem_uid: String,
    pub item_type: ItemType,
    #[serde(default)]
    pub capabilities: Vec<String>,
    #[serde(default)]
    pub capability_selection: CapabilitySelection,
}

impl NewItem {
    pub const TYPE: &'static str = "gatefabric.pem.NewItem";
}

/// An application asks a device model to add an item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddItem {
    pub source_item_uid: String,
    #[serde(default)]
    pub user_properties: Map<String, Value>,
    #[serde(default)]
    pub capabilities: Option<Vec<String>>,
}

impl AddItem {
    pub const TYPE: &'static str = "gatefabric.pem.AddItem";

    /// Creates a request for `source_item_uid` with no user properties.
    pub fn new(source_item_uid: impl Into<String>) -> Self {
        Self {
            source_item_uid: source_item_uid.into(),
            user_properties: Map::new(),
            capabilities: None,
        }
    }

    /// Attaches one user property.
    #[inline]
    pub fn with_user_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.user_properties
            .insert(key.into(), Value::String(value.into()));
        self
    }

    /// Sets the capabilities the item should expose.
    #[inline]
    pub fn with_capabilities<I, S>(mut self, caps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.capabilities = Some(caps.into_iter().map(Into::into).collect());
        self
    }
}

/// A device model confirms an item was added.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemAdded {
    pub source_item_uid: String,
    pub pem_uid: String,
    pub item_type: ItemType,
    #[serde(default)]
    pub user_properties: Map<String, Value>,
    #[serde(default)]
    pub capabilities: Vec<String>,
    #[serde(default)]
    pub configuration: Option<Value>,
}

impl ItemAdded {
    pub const TYPE: &'static str = "gatefabric.pem.ItemAdded";
}

/// Application-defined event: a type identity plus a free-form JSON object.
#[derive(Debug, Clone, PartialEq)]
pub struct CustomEvent {
    /// Fully qualified type identity, e.g. `"acme.lights.Dimmed"`.
    pub type_name: Arc<str>,
    /// Event state.
    pub data: Value,
}

impl CustomEvent {
    pub fn new(type_name: impl Into<Arc<str>>, data: Value) -> Self {
        Self {
            type_name: type_name.into(),
            data,
        }
    }
}

/// Event body: one variant per event type.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    NewItem(NewItem),
    AddItem(AddItem),
    ItemAdded(ItemAdded),
    Custom(CustomEvent),
}

impl Payload {
    /// Stable type identity (local dispatch key and wire address).
    pub fn type_identity(&self) -> &str {
        match self {
            Payload::NewItem(_) => NewItem::TYPE,
            Payload::AddItem(_) => AddItem::TYPE,
            Payload::ItemAdded(_) => ItemAdded::TYPE,
            Payload::Custom(c) => &*c.type_name,
        }
    }
}

impl From<NewItem> for Payload {
    fn from(p: NewItem) -> Self {
        Payload::NewItem(p)
    }
}

impl From<AddItem> for Payload {
    fn from(p: AddItem) -> Self {
        Payload::AddItem(p)
    }
}

impl From<ItemAdded> for Payload {
    fn from(p: ItemAdded) -> Self {
        Payload::ItemAdded(p)
    }
}

impl From<CustomEvent> for Payload {
    fn from(p: CustomEvent) -> Self {
        Payload::Custom(p)
    }
}

/// Event flowing through gates.
///
/// - `seq`: monotonic global sequence (local only, never on the wire)
/// - `at`: creation timestamp (local only)
/// - `sender`: `host:port` of the remote gate that transmitted the event, if any
///
/// Once enqueued, the fabric never mutates an event: queues hold `Arc<Event>`.
/// The HTTP transport stamps `sender` on its own copy before transmission.
#[derive(Debug, Clone)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock creation timestamp.
    pub at: SystemTime,
    /// Network address of the sending node.
    pub sender: Option<Arc<str>>,
    /// Type-specific state.
    pub payload: Payload,
}

impl Event {
    /// Creates a new event with the current timestamp and next sequence number.
    pub fn new(payload: impl Into<Payload>) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            sender: None,
            payload: payload.into(),
        }
    }

    /// Attaches a sender address.
    #[inline]
    pub fn with_sender(mut self, sender: impl Into<Arc<str>>) -> Self {
        self.sender = Some(sender.into());
        self
    }

    /// Type identity of the payload.
    #[inline]
    pub fn type_identity(&self) -> &str {
        self.payload.type_identity()
    }

    /// Invokes the listener callback matching this event's type.
    pub async fn deliver_to(&self, listener: &dyn Listener) {
        match &self.payload {
            Payload::NewItem(p) => listener.on_new_item(self, p).await,
            Payload::AddItem(p) => listener.on_add_item(self, p).await,
            Payload::ItemAdded(p) => listener.on_item_added(self, p).await,
            Payload::Custom(p) => listener.on_custom(self, p).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn sequence_numbers_increase() {
        let a = Event::new(AddItem::new("a"));
        let b = Event::new(AddItem::new("b"));
        assert!(b.seq > a.seq);
    }

    #[test]
    fn custom_events_use_their_own_identity() {
        let ev = Event::new(CustomEvent::new("acme.lights.Dimmed", json!({ "level": 40 })));
        assert_eq!(ev.type_identity(), "acme.lights.Dimmed");
    }

    #[test]
    fn builtin_payloads_use_camel_case_fields() {
        let p = NewItem {
            source_item_uid: "s1".into(),
            pem_uid: "pem".into(),
            item_type: ItemType::SensorAndActuator,
            capabilities: vec!["temp".into()],
            capability_selection: CapabilitySelection::Single,
        };
        let v = serde_json::to_value(&p).unwrap();
        assert_eq!(v["sourceItemUid"], "s1");
        assert_eq!(v["itemType"], "SENSOR_AND_ACTUATOR");
        assert_eq!(v["capabilitySelection"], "SINGLE");
    }
}

//! # Rebuilding events from the wire.
//!
//! An [`EventInstantiator`] maps a type identity and a serialized body back to
//! an [`Event`]. Returning `Ok(None)` means "type unknown here": the remote
//! gate logs and drops the request without failing it.

use std::collections::HashSet;

use crate::error::InstantiateError;
use crate::events::{Event, wire};

/// Reconstructs inbound events.
pub trait EventInstantiator: Send + Sync + 'static {
    /// Returns the event for `type_name`, or `None` if the type is unknown.
    fn instantiate(&self, type_name: &str, body: &[u8]) -> Result<Option<Event>, InstantiateError>;
}

/// JSON instantiator for the built-in payloads plus any registered custom types.
///
/// Custom types are rebuilt as [`CustomEvent`](crate::CustomEvent)s carrying
/// the received JSON as-is.
#[derive(Debug, Default, Clone)]
pub struct JsonInstantiator {
    custom: HashSet<String>,
}

impl JsonInstantiator {
    /// Knows the built-in payload types only.
    pub fn new() -> Self {
        Self::default()
    }

    /// Accepts `type_name` as a custom event type.
    ///
    /// Built-in type identities are reserved and keep decoding as their
    /// built-in payload.
    pub fn with_custom_type(mut self, type_name: impl Into<String>) -> Self {
        let type_name = type_name.into();
        if wire::is_builtin(&type_name) {
            tracing::warn!(event = %type_name, "built-in type identity cannot be registered as custom");
        } else {
            self.custom.insert(type_name);
        }
        self
    }

    /// Whether `type_name` is accepted, built-in or custom.
    pub fn knows(&self, type_name: &str) -> bool {
        wire::is_builtin(type_name) || self.custom.contains(type_name)
    }
}

impl EventInstantiator for JsonInstantiator {
    fn instantiate(&self, type_name: &str, body: &[u8]) -> Result<Option<Event>, InstantiateError> {
        if !self.knows(type_name) {
            return Ok(None);
        }
        let malformed = |source| InstantiateError::Malformed {
            type_name: type_name.to_owned(),
            source,
        };

        let (value, sender) = wire::parse_body(body).map_err(malformed)?;
        let payload = if self.custom.contains(type_name) {
            wire::decode_custom(type_name, value)
        } else {
            match wire::decode_builtin(type_name, value) {
                Some(res) => res.map_err(malformed)?,
                None => return Ok(None),
            }
        };

        let mut event = Event::new(payload);
        if let Some(sender) = sender {
            event = event.with_sender(sender);
        }
        Ok(Some(event))
    }
}

//! # Wire format for events crossing HTTP.
//!
//! ```text
//! POST <base>/<gate-name>
//! Content-Type: application/vnd.<type-identity>;charset=utf-8
//!
//! { "sender": "host:port", "event": { ...payload fields... } }
//! ```
//!
//! The body wraps the JSON mapping of the payload next to the sender address,
//! so custom payloads of any JSON shape travel unchanged. `seq` and `at` are
//! local and never transmitted.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::event::{AddItem, CustomEvent, Event, ItemAdded, NewItem, Payload};

const CONTENT_TYPE_PREFIX: &str = "application/vnd.";
const CONTENT_TYPE_CHARSET: &str = ";charset=utf-8";

#[derive(Serialize, Deserialize)]
struct Envelope<P> {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    sender: Option<String>,
    event: P,
}

/// Builds the request content type announcing `type_name`.
pub fn content_type(type_name: &str) -> String {
    format!("{CONTENT_TYPE_PREFIX}{type_name}{CONTENT_TYPE_CHARSET}")
}

/// Extracts the type identity from a request content type.
///
/// Returns `None` when the header is not of the `application/vnd.<type>` form.
pub fn type_identity(content_type: &str) -> Option<&str> {
    let rest = content_type.trim().strip_prefix(CONTENT_TYPE_PREFIX)?;
    let name = rest.split(';').next().unwrap_or_default().trim();
    (!name.is_empty()).then_some(name)
}

/// Serializes an event into its wire body.
pub fn encode(event: &Event) -> Result<Vec<u8>, serde_json::Error> {
    let sender = event.sender.as_deref().map(str::to_owned);
    match &event.payload {
        Payload::NewItem(p) => serde_json::to_vec(&Envelope { sender, event: p }),
        Payload::AddItem(p) => serde_json::to_vec(&Envelope { sender, event: p }),
        Payload::ItemAdded(p) => serde_json::to_vec(&Envelope { sender, event: p }),
        Payload::Custom(p) => serde_json::to_vec(&Envelope {
            sender,
            event: &p.data,
        }),
    }
}

/// Parses a wire body into the payload JSON and the sender address.
pub fn parse_body(body: &[u8]) -> Result<(Value, Option<String>), serde_json::Error> {
    let envelope: Envelope<Value> = serde_json::from_slice(body)?;
    Ok((envelope.event, envelope.sender))
}

/// Whether `type_name` names one of the built-in payloads.
pub fn is_builtin(type_name: &str) -> bool {
    matches!(type_name, NewItem::TYPE | AddItem::TYPE | ItemAdded::TYPE)
}

/// Rebuilds a built-in event from its type identity and parsed body.
///
/// Returns `None` if `type_name` is not a built-in type.
pub fn decode_builtin(type_name: &str, body: Value) -> Option<Result<Payload, serde_json::Error>> {
    let payload = match type_name {
        NewItem::TYPE => serde_json::from_value::<NewItem>(body).map(Payload::from),
        AddItem::TYPE => serde_json::from_value::<AddItem>(body).map(Payload::from),
        ItemAdded::TYPE => serde_json::from_value::<ItemAdded>(body).map(Payload::from),
        _ => return None,
    };
    Some(payload)
}

/// Wraps a parsed body as a [`CustomEvent`] of the given type.
pub fn decode_custom(type_name: &str, body: Value) -> Payload {
    Payload::Custom(CustomEvent::new(type_name, body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::ItemType;
    use serde_json::json;

    #[test]
    fn content_type_carries_type_identity() {
        let ct = content_type(AddItem::TYPE);
        assert_eq!(ct, "application/vnd.gatefabric.pem.AddItem;charset=utf-8");
        assert_eq!(type_identity(&ct), Some(AddItem::TYPE));
    }

    #[test]
    fn type_identity_rejects_foreign_content_types() {
        assert_eq!(type_identity("application/json"), None);
        assert_eq!(type_identity("application/vnd.;charset=utf-8"), None);
        assert_eq!(type_identity("application/vnd.acme.Ping"), Some("acme.Ping"));
    }

    #[test]
    fn sender_travels_beside_the_payload() {
        let ev = Event::new(ItemAdded {
            source_item_uid: "s".into(),
            pem_uid: "p".into(),
            item_type: ItemType::Sensor,
            user_properties: Default::default(),
            capabilities: vec![],
            configuration: Some(json!({ "period": 5 })),
        })
        .with_sender("node-a.local:8080");

        let bytes = encode(&ev).unwrap();
        let (body, sender) = parse_body(&bytes).unwrap();
        assert_eq!(sender.as_deref(), Some("node-a.local:8080"));
        assert!(body.get("sender").is_none());

        let payload = decode_builtin(ItemAdded::TYPE, body).unwrap().unwrap();
        assert_eq!(payload, ev.payload);
    }

    #[test]
    fn custom_data_of_any_shape_is_kept_verbatim() {
        for data in [json!({ "sender": "alice", "n": 1 }), json!([1, 2, 3]), json!("plain")] {
            let ev = Event::new(CustomEvent::new("acme.Ping", data.clone())).with_sender("h:1");
            let (body, sender) = parse_body(&encode(&ev).unwrap()).unwrap();
            assert_eq!(body, data);
            assert_eq!(sender.as_deref(), Some("h:1"));
        }
    }

    #[test]
    fn body_without_envelope_is_rejected() {
        assert!(parse_body(br#"{"sourceItemUid":"x"}"#).is_err());
    }

    #[test]
    fn unknown_types_are_not_builtin() {
        assert!(decode_builtin("acme.Ping", json!({})).is_none());
        assert!(!is_builtin("acme.Ping"));
        assert!(is_builtin(NewItem::TYPE));
    }

    #[test]
    fn malformed_builtin_body_is_an_error() {
        let res = decode_builtin(NewItem::TYPE, json!({ "pemUid": 3 })).unwrap();
        assert!(res.is_err());
    }
}

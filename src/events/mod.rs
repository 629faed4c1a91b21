//! Fabric events: data model and wire codec.
//!
//! ## Contents
//! - [`Event`], [`Payload`] and the built-in payload types
//! - [`wire`] content-type and JSON body encoding used by remote gates
//!
//! Producers build an [`Event`] and post it to a gate; the gate's dispatch loop
//! calls [`Event::deliver_to`] for every registered listener.

mod event;
pub mod wire;

pub use event::{
    AddItem, CapabilitySelection, CustomEvent, Event, ItemAdded, ItemType, NewItem, Payload,
};

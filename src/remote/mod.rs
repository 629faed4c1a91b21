//! # Remote gates: the HTTP transport of the fabric.
//!
//! - [`RemoteGate`] wraps an [`EventGate`](crate::EventGate) with an inbound endpoint and an outbound client.
//! - [`AddressMode`] and [`AddressProbe`] compute the sender address stamped on outbound events.
//! - [`EndpointRegistry`] is the contract with whatever serves HTTP; [`AxumEndpoints`] implements it.
//! - [`EventInstantiator`] rebuilds inbound events; [`JsonInstantiator`] is the bundled one.

mod address;
mod endpoint;
mod gate;
mod instantiator;

pub use address::{AddressMode, AddressProbe, SystemProbe, resolve_host, sender_address};
pub use endpoint::{AxumEndpoints, EndpointHandler, EndpointRegistry};
pub use gate::RemoteGate;
pub use instantiator::{EventInstantiator, JsonInstantiator};

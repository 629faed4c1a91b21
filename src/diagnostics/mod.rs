//! Fabric diagnostics: record types and broadcast bus.
//!
//! Gates built with a [`Bus`] publish a [`Diagnostic`] whenever they absorb a
//! failure on behalf of a producer. Gates built without one only log and count
//! (see [`StatsSnapshot`](crate::StatsSnapshot)).

mod bus;
mod diagnostic;

pub use bus::Bus;
pub use diagnostic::{Diagnostic, DiagnosticKind};

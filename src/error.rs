//! Error types used by the gate fabric.
//!
//! - [`GateError`]: construction and wiring failures of a gate (link graph, worker, address).
//! - [`TransportError`]: outbound HTTP delivery failures returned to the caller of
//!   [`RemoteGate::post_http_event`](crate::RemoteGate::post_http_event).
//! - [`InstantiateError`]: an inbound payload could not be turned back into an event.
//! - [`EndpointError`]: the HTTP host refused an endpoint registration.
//! - [`HostError`]: failures raised by the owning [`GateHost`](crate::GateHost).
//!
//! Queue overflow and posts to idle gates are **not** errors: they are counted in
//! [`StatsSnapshot`](crate::StatsSnapshot) and reported on the diagnostics bus.

use std::time::Duration;
use thiserror::Error;

use crate::remote::AddressMode;

/// # Errors produced while building or wiring a gate.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum GateError {
    /// A gate cannot be linked to itself.
    #[error("gate {gate:?} cannot be linked to itself")]
    SelfLink {
        /// Name of the offending gate.
        gate: String,
    },

    /// The dispatch worker of this gate is already running.
    #[error("gate {gate:?} already has a running dispatch worker")]
    AlreadyRunning {
        /// Name of the gate.
        gate: String,
    },

    /// No externally reachable address matches the requested addressing mode.
    #[error("no local address available for addressing mode {mode:?}")]
    NoAddress {
        /// The addressing mode that could not be satisfied.
        mode: AddressMode,
    },

    /// The outbound HTTP client could not be built.
    #[error("http client setup failed: {error}")]
    HttpClient {
        /// The underlying error message.
        error: String,
    },

    /// The endpoint for a remote gate could not be registered.
    #[error(transparent)]
    Endpoint(#[from] EndpointError),
}

impl GateError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use gatefabric::GateError;
    ///
    /// let err = GateError::SelfLink { gate: "a".into() };
    /// assert_eq!(err.as_label(), "gate_self_link");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            GateError::SelfLink { .. } => "gate_self_link",
            GateError::AlreadyRunning { .. } => "gate_already_running",
            GateError::NoAddress { .. } => "gate_no_address",
            GateError::HttpClient { .. } => "gate_http_client",
            GateError::Endpoint(_) => "gate_endpoint",
        }
    }
}

/// # Errors produced by the HTTP host while (un)registering endpoints.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum EndpointError {
    /// Another handler already serves this path.
    #[error("endpoint {path:?} is already registered")]
    PathTaken {
        /// The contested path.
        path: String,
    },
}

/// # Errors produced by outbound remote delivery.
///
/// A non-2xx reply from the peer is **not** an error; it is returned as a status code.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum TransportError {
    /// The event could not be serialized into its wire body.
    #[error("cannot encode event {type_name:?}: {source}")]
    Encode {
        /// Type identity of the event.
        type_name: String,
        /// Serializer error.
        #[source]
        source: serde_json::Error,
    },

    /// A custom event uses the type identity of a built-in payload.
    ///
    /// The peer would decode it as that built-in type, so it is never sent.
    #[error("custom event uses reserved type identity {type_name:?}")]
    ReservedType {
        /// The reserved type identity.
        type_name: String,
    },

    /// Connecting to the peer or exchanging the request failed.
    #[error("request to {url} failed: {source}")]
    Request {
        /// Target URL.
        url: String,
        /// Client error (connect, timeout, I/O).
        #[source]
        source: reqwest::Error,
    },
}

impl TransportError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            TransportError::Encode { .. } => "transport_encode",
            TransportError::ReservedType { .. } => "transport_reserved_type",
            TransportError::Request { source, .. } if source.is_timeout() => "transport_timeout",
            TransportError::Request { source, .. } if source.is_connect() => "transport_connect",
            TransportError::Request { .. } => "transport_request",
        }
    }

    /// Indicates whether retrying the same delivery could succeed.
    ///
    /// The fabric never retries on its own; this is a hint for callers.
    pub fn is_retryable(&self) -> bool {
        matches!(self, TransportError::Request { .. })
    }
}

/// # Errors produced while reconstructing an inbound event.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum InstantiateError {
    /// The body is not valid JSON or does not match the payload shape of a known type.
    #[error("malformed {type_name:?} payload: {source}")]
    Malformed {
        /// Type identity announced by the sender.
        type_name: String,
        /// Deserializer error.
        #[source]
        source: serde_json::Error,
    },
}

/// # Errors produced by the gate host.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum HostError {
    /// Shutdown grace period was exceeded; some dispatch workers did not stop in time.
    #[error("shutdown timeout {grace:?} exceeded; stuck: {stuck:?}")]
    GraceExceeded {
        /// The configured grace duration.
        grace: Duration,
        /// Names of gates whose worker was still running.
        stuck: Vec<String>,
    },

    /// A gate could not be created or started.
    #[error(transparent)]
    Gate(#[from] GateError),

    /// OS signal handlers could not be installed.
    #[error("signal handler registration failed: {0}")]
    Signal(#[source] std::io::Error),
}

impl HostError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use gatefabric::HostError;
    /// use std::time::Duration;
    ///
    /// let err = HostError::GraceExceeded { grace: Duration::from_secs(5), stuck: vec![] };
    /// assert_eq!(err.as_label(), "host_grace_exceeded");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            HostError::GraceExceeded { .. } => "host_grace_exceeded",
            HostError::Gate(_) => "host_gate",
            HostError::Signal(_) => "host_signal",
        }
    }
}

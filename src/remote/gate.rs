//! # RemoteGate: an EventGate reachable over HTTP.
//!
//! ```text
//! outbound:  post_http_event(url, e)
//!              └─ copy e, stamp sender = "host:port" ─► POST url
//!                   Content-Type: application/vnd.<type>;charset=utf-8
//!                   └─ status returned to caller (non-200 also logged + diagnosed)
//!
//! inbound:   POST <base>/<name> ─► type from Content-Type ─► read body
//!              └─ instantiator.instantiate(type, body)
//!                   ├─ Some(e) ─► post_local(e) ─► 200
//!                   ├─ None    ─► warn + UnknownEventType ─► 200
//!                   └─ Err     ─► 500
//! ```
//!
//! ## Rules
//! - The sender address is resolved once, at construction; failure to resolve
//!   fails construction ([`GateError::NoAddress`]).
//! - The endpoint is registered at construction and withdrawn by
//!   [`terminate`](RemoteGate::terminate). Terminating neither unlinks the gate nor
//!   stops its worker.
//! - Outbound delivery is never retried here.

use std::ops::Deref;
use std::sync::Arc;

use async_trait::async_trait;
use axum::body;
use axum::extract::Request;
use axum::http::{Method, StatusCode, header};
use axum::response::{IntoResponse, Response};
use url::Url;

use super::address::{self, AddressProbe, SystemProbe};
use super::endpoint::{EndpointHandler, EndpointRegistry};
use super::instantiator::EventInstantiator;
use crate::config::HttpConfig;
use crate::diagnostics::{Diagnostic, DiagnosticKind};
use crate::error::{GateError, TransportError};
use crate::events::{Event, Payload, wire};
use crate::gate::EventGate;

/// Body of the 500 reply when an inbound body cannot be read.
const BODY_UNREADABLE: &str = "Cannot get event data";

/// Handle to a remote gate. Cheap to clone; derefs to its [`EventGate`].
#[derive(Clone)]
pub struct RemoteGate {
    inner: Arc<RemoteInner>,
}

struct RemoteInner {
    gate: EventGate,
    path: String,
    sender: Arc<str>,
    client: reqwest::Client,
    endpoints: Arc<dyn EndpointRegistry>,
}

impl RemoteGate {
    /// Wraps `gate`, resolving the sender address from the running system.
    pub fn new(
        gate: EventGate,
        http: &HttpConfig,
        instantiator: Arc<dyn EventInstantiator>,
        endpoints: Arc<dyn EndpointRegistry>,
    ) -> Result<Self, GateError> {
        Self::with_probe(gate, http, instantiator, endpoints, &SystemProbe)
    }

    /// Same as [`new`](Self::new) with a custom address probe.
    pub fn with_probe(
        gate: EventGate,
        http: &HttpConfig,
        instantiator: Arc<dyn EventInstantiator>,
        endpoints: Arc<dyn EndpointRegistry>,
        probe: &dyn AddressProbe,
    ) -> Result<Self, GateError> {
        let host = match &http.advertised_host {
            Some(host) => host.clone(),
            None => address::resolve_host(http.mode, probe)?,
        };
        let sender: Arc<str> = address::sender_address(&host, http.port).into();

        let client = reqwest::Client::builder()
            .connect_timeout(http.connect_timeout)
            .timeout(http.request_timeout)
            .build()
            .map_err(|e| GateError::HttpClient {
                error: e.to_string(),
            })?;

        let path = http.endpoint_path(gate.name());
        let handler = Arc::new(Inbound {
            gate: gate.clone(),
            instantiator,
            max_body_bytes: http.max_body_bytes,
        });
        endpoints.register(&path, handler)?;
        tracing::info!(gate = %gate.name(), %path, %sender, mode = %http.mode, "remote gate endpoint registered");

        Ok(Self {
            inner: Arc::new(RemoteInner {
                gate,
                path,
                sender,
                client,
                endpoints,
            }),
        })
    }

    /// The wrapped local gate.
    pub fn gate(&self) -> &EventGate {
        &self.inner.gate
    }

    /// Path this gate's endpoint is registered under.
    pub fn endpoint_path(&self) -> &str {
        &self.inner.path
    }

    /// `host:port` stamped on outbound events.
    pub fn sender_address(&self) -> &str {
        &self.inner.sender
    }

    /// POSTs `event` to `target` and returns the peer's status code.
    ///
    /// `event` itself is not modified; the transmitted copy carries this
    /// gate's sender address. Custom events named like a built-in payload are
    /// refused with [`TransportError::ReservedType`]. Any status other than 200 is logged and reported
    /// on the diagnostics bus but still returned as `Ok`.
    pub async fn post_http_event(
        &self,
        target: &Url,
        event: &Event,
    ) -> Result<reqwest::StatusCode, TransportError> {
        let inner = &self.inner;
        let type_name = event.type_identity();
        if matches!(event.payload, Payload::Custom(_)) && wire::is_builtin(type_name) {
            return Err(TransportError::ReservedType {
                type_name: type_name.to_owned(),
            });
        }
        let stamped = event.clone().with_sender(Arc::clone(&inner.sender));
        let body = wire::encode(&stamped).map_err(|source| TransportError::Encode {
            type_name: type_name.to_owned(),
            source,
        })?;

        let response = inner
            .client
            .post(target.clone())
            .header(reqwest::header::CONTENT_TYPE, wire::content_type(type_name))
            .body(body)
            .send()
            .await
            .map_err(|source| TransportError::Request {
                url: target.to_string(),
                source,
            })?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            tracing::warn!(
                gate = %inner.gate.name(),
                event = type_name,
                %target,
                status = status.as_u16(),
                "remote gate did not accept event"
            );
            inner.gate.inner.diagnose(
                Diagnostic::new(DiagnosticKind::RemoteRejected)
                    .with_event_type(type_name)
                    .with_reason(format!("{} from {target}", status.as_u16())),
            );
        }
        Ok(status)
    }

    /// Withdraws the HTTP endpoint. Returns `false` if it was already withdrawn.
    pub fn terminate(&self) -> bool {
        let removed = self.inner.endpoints.unregister(&self.inner.path);
        if removed {
            tracing::info!(gate = %self.inner.gate.name(), path = %self.inner.path, "remote gate endpoint withdrawn");
        }
        removed
    }
}

impl Deref for RemoteGate {
    type Target = EventGate;

    fn deref(&self) -> &EventGate {
        &self.inner.gate
    }
}

impl std::fmt::Debug for RemoteGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteGate")
            .field("gate", &self.inner.gate)
            .field("path", &self.inner.path)
            .field("sender", &self.inner.sender)
            .finish()
    }
}

/// Endpoint handler injecting received events into the gate's own queue.
struct Inbound {
    gate: EventGate,
    instantiator: Arc<dyn EventInstantiator>,
    max_body_bytes: usize,
}

#[async_trait]
impl EndpointHandler for Inbound {
    async fn handle(&self, request: Request) -> Response {
        let gate = self.gate.name();
        if request.method() != Method::POST {
            return StatusCode::METHOD_NOT_ALLOWED.into_response();
        }

        let type_name = request
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .and_then(wire::type_identity)
            .map(str::to_owned);
        let Some(type_name) = type_name else {
            tracing::warn!(gate, "inbound event without application/vnd.<type> content type");
            return (StatusCode::BAD_REQUEST, "Missing event type").into_response();
        };

        let bytes = match body::to_bytes(request.into_body(), self.max_body_bytes).await {
            Ok(bytes) => bytes,
            Err(err) => {
                tracing::warn!(gate, event = %type_name, error = %err, "cannot read inbound event body");
                return (StatusCode::INTERNAL_SERVER_ERROR, BODY_UNREADABLE).into_response();
            }
        };

        match self.instantiator.instantiate(&type_name, &bytes) {
            Ok(Some(event)) => {
                tracing::trace!(gate, event = %type_name, sender = ?event.sender, "inbound event");
                self.gate.post_local(event);
                StatusCode::OK.into_response()
            }
            Ok(None) => {
                tracing::warn!(gate, event = %type_name, "cannot instantiate event of unknown type");
                self.gate.inner.diagnose(
                    Diagnostic::new(DiagnosticKind::UnknownEventType).with_event_type(type_name),
                );
                StatusCode::OK.into_response()
            }
            Err(err) => {
                tracing::warn!(gate, event = %type_name, error = %err, "malformed inbound event");
                (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response()
            }
        }
    }
}

//! # HTTP endpoint registration.
//!
//! Remote gates do not own an HTTP server. They register a handler under
//! `<base-path>/<gate-name>` with whatever hosts the server, through the
//! [`EndpointRegistry`] contract, and withdraw it on termination.
//!
//! [`AxumEndpoints`] is the bundled registry: a path → handler table served
//! by an `axum` router whose fallback looks the request path up at request
//! time, so endpoints can come and go while the server runs. Paths are
//! compared percent-decoded, so `/event-gate/living%20room` and
//! `/event-gate/living room` name the same endpoint.
//!
//! ```text
//! axum::serve(listener, endpoints.router())
//!   request ─► fallback ─► table[path]? ─► handler.handle(request)
//!                                  └─ none ─► 404
//! ```

use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use axum::Router;
use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::error::EndpointError;

/// Serves requests for one registered path.
#[async_trait]
pub trait EndpointHandler: Send + Sync + 'static {
    async fn handle(&self, request: Request) -> Response;
}

/// Registration contract offered by an HTTP host.
pub trait EndpointRegistry: Send + Sync + 'static {
    /// Starts routing `path` to `handler`.
    fn register(&self, path: &str, handler: Arc<dyn EndpointHandler>) -> Result<(), EndpointError>;

    /// Stops routing `path`. Returns `false` if nothing was registered there.
    fn unregister(&self, path: &str) -> bool;
}

type Table = HashMap<String, Arc<dyn EndpointHandler>>;

/// Endpoint table served through an `axum` [`Router`].
#[derive(Clone, Default)]
pub struct AxumEndpoints {
    table: Arc<RwLock<Table>>,
}

impl AxumEndpoints {
    pub fn new() -> Self {
        Self::default()
    }

    /// Router serving every currently registered endpoint.
    pub fn router(&self) -> Router {
        Router::new().fallback(route).with_state(self.clone())
    }

    /// Registered paths, sorted.
    pub fn paths(&self) -> Vec<String> {
        let table = self.table.read().unwrap_or_else(PoisonError::into_inner);
        let mut paths: Vec<String> = table.keys().cloned().collect();
        paths.sort();
        paths
    }

    fn lookup(&self, path: &str) -> Option<Arc<dyn EndpointHandler>> {
        let table = self.table.read().unwrap_or_else(PoisonError::into_inner);
        table.get(decoded(path).as_ref()).cloned()
    }
}

/// Percent-decoded form of `path`; undecodable paths are kept as-is.
fn decoded(path: &str) -> Cow<'_, str> {
    urlencoding::decode(path).unwrap_or(Cow::Borrowed(path))
}

impl EndpointRegistry for AxumEndpoints {
    fn register(&self, path: &str, handler: Arc<dyn EndpointHandler>) -> Result<(), EndpointError> {
        let key = decoded(path).into_owned();
        let mut table = self.table.write().unwrap_or_else(PoisonError::into_inner);
        if table.contains_key(&key) {
            return Err(EndpointError::PathTaken { path: key });
        }
        table.insert(key, handler);
        tracing::debug!(path, "endpoint registered");
        Ok(())
    }

    fn unregister(&self, path: &str) -> bool {
        let mut table = self.table.write().unwrap_or_else(PoisonError::into_inner);
        let removed = table.remove(decoded(path).as_ref()).is_some();
        if removed {
            tracing::debug!(path, "endpoint unregistered");
        }
        removed
    }
}

async fn route(State(endpoints): State<AxumEndpoints>, request: Request) -> Response {
    match endpoints.lookup(request.uri().path()) {
        Some(handler) => handler.handle(request).await,
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Teapot;

    #[async_trait]
    impl EndpointHandler for Teapot {
        async fn handle(&self, _request: Request) -> Response {
            StatusCode::IM_A_TEAPOT.into_response()
        }
    }

    #[test]
    fn a_path_can_only_be_registered_once() {
        let eps = AxumEndpoints::new();
        eps.register("/event-gate/a", Arc::new(Teapot)).unwrap();
        let err = eps.register("/event-gate/a", Arc::new(Teapot)).unwrap_err();
        assert!(matches!(err, EndpointError::PathTaken { path } if path == "/event-gate/a"));

        assert!(eps.unregister("/event-gate/a"));
        assert!(!eps.unregister("/event-gate/a"));
        assert!(eps.register("/event-gate/a", Arc::new(Teapot)).is_ok());
    }

    #[test]
    fn encoded_and_raw_paths_name_the_same_endpoint() {
        let eps = AxumEndpoints::new();
        eps.register("/event-gate/living%20room", Arc::new(Teapot)).unwrap();
        assert!(eps.lookup("/event-gate/living room").is_some());
        assert!(matches!(
            eps.register("/event-gate/living room", Arc::new(Teapot)),
            Err(EndpointError::PathTaken { .. })
        ));
        assert!(eps.unregister("/event-gate/living room"));
        assert!(eps.paths().is_empty());
    }

    #[tokio::test]
    async fn router_follows_the_live_table() {
        let eps = AxumEndpoints::new();
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let router = eps.router();
        tokio::spawn(async move {
            let _ = axum::serve(listener, router).await;
        });

        let client = reqwest::Client::new();
        let url = format!("http://{addr}/event-gate/pot");
        assert_eq!(client.post(&url).send().await.unwrap().status(), 404);

        eps.register("/event-gate/pot", Arc::new(Teapot)).unwrap();
        assert_eq!(client.post(&url).send().await.unwrap().status(), 418);

        eps.unregister("/event-gate/pot");
        assert_eq!(client.post(&url).send().await.unwrap().status(), 404);
    }
}

//! # Example: remote_pair
//!
//! Two nodes in one process, each with its own HTTP server, exchanging an
//! event over loopback.
//!
//! ## Flow
//! ```text
//! node A: remote "a-hub"
//!            │ post_http_event(url of b-hub)
//!            ▼
//! node B: POST /event-gate/b-hub ──► remote "b-hub" ──► Printer listener
//! ```
//!
//! ## Run
//! ```bash
//! RUST_LOG=gatefabric=debug cargo run --example remote_pair
//! ```

use std::sync::Arc;
use std::time::Duration;

use gatefabric::{
    AddressMode, AxumEndpoints, CapabilitySelection, Event, GateHost, HostConfig, ItemType,
    JsonInstantiator, Listener, NewItem,
};
use tracing_subscriber::EnvFilter;
use url::Url;

struct Printer;

#[async_trait::async_trait]
impl Listener for Printer {
    async fn on_new_item(&self, event: &Event, item: &NewItem) {
        println!(
            "[b-hub] new item {} ({:?}) from {}",
            item.source_item_uid,
            item.item_type,
            event.sender.as_deref().unwrap_or("?")
        );
    }
}

/// Builds a host whose remote gates are served on a fresh loopback port.
async fn node() -> Result<(GateHost, u16), Box<dyn std::error::Error>> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let port = listener.local_addr()?.port();

    let endpoints = AxumEndpoints::new();
    let router = endpoints.router();
    tokio::spawn(async move {
        if let Err(err) = axum::serve(listener, router).await {
            tracing::error!(%err, "http server stopped");
        }
    });

    let mut cfg = HostConfig::from_env();
    cfg.http.port = port;
    cfg.http.advertised_host = Some("127.0.0.1".into());
    let host = GateHost::builder(cfg)
        .with_endpoints(Arc::new(endpoints))
        .build();
    Ok((host, port))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let (host_a, _) = node().await?;
    let (host_b, port_b) = node().await?;

    let instantiator = Arc::new(JsonInstantiator::new());
    let a_hub = host_a.create_remote_gate("a-hub", instantiator.clone(), AddressMode::Dns)?;
    let b_hub = host_b.create_remote_gate("b-hub", instantiator, AddressMode::Dns)?;
    b_hub.add_listener(Arc::new(Printer));

    host_a.start()?;
    host_b.start()?;

    let target = Url::parse(&format!("http://127.0.0.1:{port_b}{}", b_hub.endpoint_path()))?;
    let event = Event::new(NewItem {
        source_item_uid: "0x12ab".into(),
        pem_uid: "zigbee".into(),
        item_type: ItemType::Sensor,
        capabilities: vec!["temperature".into()],
        capability_selection: CapabilitySelection::No,
    });
    let status = a_hub.post_http_event(&target, &event).await?;
    println!("[a-hub] delivered with status {status}");

    tokio::time::sleep(Duration::from_millis(200)).await;
    host_a.shutdown().await?;
    host_b.shutdown().await?;
    Ok(())
}

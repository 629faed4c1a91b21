//! # Example: relay
//!
//! Three linked gates in one process, with a listener that re-posts.
//!
//! Shows how to:
//! - Create gates through a [`GateHost`] and link them.
//! - Attach the built-in [`LogListener`] and a custom [`Listener`].
//! - Watch drops on the diagnostics bus.
//!
//! ## Flow
//! ```text
//! app ──post(AddItem)──► model ──(Bridge listener: post(ItemAdded))──► app, ui
//!                          │                                          │
//!                       LogListener                               LogListener
//! ```
//!
//! ## Run
//! ```bash
//! RUST_LOG=info cargo run --example relay --features logging
//! ```

use std::sync::Arc;
use std::time::Duration;

use gatefabric::{
    AddItem, Event, GateHost, HostConfig, ItemAdded, ItemType, Listener, LogListener, WeakGate,
};
use tracing_subscriber::EnvFilter;

/// Answers every `AddItem` with an `ItemAdded` posted to the gate's partners.
struct Bridge {
    gate: WeakGate,
}

#[async_trait::async_trait]
impl Listener for Bridge {
    async fn on_add_item(&self, _event: &Event, req: &AddItem) {
        let Some(gate) = self.gate.upgrade() else { return };
        gate.post(Event::new(ItemAdded {
            source_item_uid: req.source_item_uid.clone(),
            pem_uid: "demo-pem".into(),
            item_type: ItemType::Actuator,
            user_properties: req.user_properties.clone(),
            capabilities: req.capabilities.clone().unwrap_or_default(),
            configuration: None,
        }));
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let host = GateHost::builder(HostConfig::from_env()).build();
    let mut diagnostics = host.subscribe();

    let app = host.create_gate("app")?;
    let model = host.create_gate("model")?;
    let ui = host.create_gate("ui")?;
    app.link(&model)?;
    model.link(&ui)?;

    model.add_listener(Arc::new(Bridge {
        gate: model.downgrade(),
    }));
    app.add_listener(Arc::new(LogListener::new()));
    ui.add_listener(Arc::new(LogListener::new()));

    host.start()?;

    for i in 0..5 {
        app.post(Event::new(
            AddItem::new(format!("lamp-{i}")).with_user_property("room", "hall"),
        ));
    }
    tokio::time::sleep(Duration::from_millis(200)).await;

    for gate in host.gates() {
        let s = gate.stats();
        println!(
            "[stats] {:<6} accepted={} delivered={} dropped={}",
            gate.name(),
            s.accepted,
            s.delivered,
            s.dropped()
        );
    }

    host.shutdown().await?;

    if let Some(rx) = diagnostics.as_mut() {
        while let Ok(d) = rx.try_recv() {
            println!(
                "[diag] {:<18} gate={}",
                d.kind.as_label(),
                d.gate.as_deref().unwrap_or("-")
            );
        }
    }
    Ok(())
}

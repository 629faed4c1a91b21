//! ## Lifecycle
//! ```text
//! GateHost::builder(cfg).build()
//!   ├─ create_gate / create_remote_gate   (gates share the host's bus and queue sizing)
//!   ├─ start()                             (one dispatch worker per gate, in a JoinSet)
//!   │     gates created after start() get their worker immediately
//!   └─ shutdown()
//!         ├─ unlink_all() on every gate
//!         ├─ terminate() on every remote gate (endpoints withdrawn)
//!         ├─ cancel worker tokens
//!         └─ wait up to cfg.grace
//!               ├─ all stopped ─► Ok(())
//!               └─ timeout     ─► HostError::GraceExceeded { stuck }
//! ```
//!
//! After `shutdown` the host can be started again; gates keep their
//! listeners but not their links.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::broadcast;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use super::builder::GateHostBuilder;
use super::shutdown;
use crate::config::HostConfig;
use crate::diagnostics::{Bus, Diagnostic};
use crate::error::{GateError, HostError};
use crate::gate::EventGate;
use crate::remote::{AddressMode, EndpointRegistry, EventInstantiator, RemoteGate};

/// Creates gates, runs their dispatch workers and shuts them down in order.
pub struct GateHost {
    cfg: HostConfig,
    bus: Option<Bus>,
    endpoints: Arc<dyn EndpointRegistry>,
    state: Mutex<State>,
}

struct State {
    gates: Vec<EventGate>,
    remotes: Vec<RemoteGate>,
    workers: JoinSet<Arc<str>>,
    running: Vec<Arc<str>>,
    token: CancellationToken,
    started: bool,
}

impl GateHost {
    /// Starts configuring a host.
    pub fn builder(cfg: HostConfig) -> GateHostBuilder {
        GateHostBuilder::new(cfg)
    }

    pub(super) fn new_internal(
        cfg: HostConfig,
        bus: Option<Bus>,
        endpoints: Arc<dyn EndpointRegistry>,
    ) -> Self {
        Self {
            cfg,
            bus,
            endpoints,
            state: Mutex::new(State {
                gates: Vec::new(),
                remotes: Vec::new(),
                workers: JoinSet::new(),
                running: Vec::new(),
                token: CancellationToken::new(),
                started: false,
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Host configuration.
    pub fn config(&self) -> &HostConfig {
        &self.cfg
    }

    /// Registry remote gates publish their endpoints into.
    pub fn endpoints(&self) -> &Arc<dyn EndpointRegistry> {
        &self.endpoints
    }

    /// Subscribes to the diagnostics of every gate of this host.
    ///
    /// Returns `None` when diagnostics are disabled (`bus_capacity = 0`).
    pub fn subscribe(&self) -> Option<broadcast::Receiver<Diagnostic>> {
        self.bus.as_ref().map(Bus::subscribe)
    }

    /// All gates created by this host, remote ones included.
    pub fn gates(&self) -> Vec<EventGate> {
        self.state().gates.clone()
    }

    /// Remote gates created by this host.
    pub fn remote_gates(&self) -> Vec<RemoteGate> {
        self.state().remotes.clone()
    }

    fn build_gate(&self, name: &str) -> EventGate {
        let mut builder = EventGate::builder(name).capacity(self.cfg.gate.queue_capacity_clamped());
        if let Some(bus) = &self.bus {
            builder = builder.diagnostics(bus.clone());
        }
        builder.build()
    }

    /// Creates a local gate. Its worker starts now if the host is started.
    ///
    /// Must be called within a tokio runtime once the host is started.
    pub fn create_gate(&self, name: &str) -> Result<EventGate, GateError> {
        let gate = self.build_gate(name);
        let mut state = self.state();
        if state.started {
            spawn_worker(&mut state, &gate)?;
        }
        state.gates.push(gate.clone());
        tracing::debug!(gate = name, "gate created");
        Ok(gate)
    }

    /// Creates a remote gate whose sender address follows `mode`.
    ///
    /// All other HTTP settings come from the host configuration.
    pub fn create_remote_gate(
        &self,
        name: &str,
        instantiator: Arc<dyn EventInstantiator>,
        mode: AddressMode,
    ) -> Result<RemoteGate, GateError> {
        let mut http = self.cfg.http.clone();
        http.mode = mode;
        let remote = RemoteGate::new(
            self.build_gate(name),
            &http,
            instantiator,
            Arc::clone(&self.endpoints),
        )?;

        let mut state = self.state();
        if state.started {
            if let Err(err) = spawn_worker(&mut state, &remote) {
                remote.terminate();
                return Err(err);
            }
        }
        state.gates.push(remote.gate().clone());
        state.remotes.push(remote.clone());
        Ok(remote)
    }

    /// Starts the dispatch worker of every gate that has none.
    ///
    /// Must be called within a tokio runtime. Calling it twice is a no-op.
    pub fn start(&self) -> Result<(), HostError> {
        let mut state = self.state();
        if state.started {
            return Ok(());
        }
        let gates = state.gates.clone();
        for gate in gates.iter().filter(|g| !g.is_running()) {
            spawn_worker(&mut state, gate)?;
        }
        state.started = true;
        tracing::info!(gates = gates.len(), workers = state.running.len(), "gate host started");
        Ok(())
    }

    /// Stops the fabric: unlinks every gate, withdraws every endpoint, stops
    /// every worker and waits for them up to the configured grace.
    pub async fn shutdown(&self) -> Result<(), HostError> {
        let (mut workers, mut pending) = {
            let mut state = self.state();
            for gate in &state.gates {
                gate.unlink_all();
            }
            for remote in &state.remotes {
                remote.terminate();
            }
            state.token.cancel();
            state.token = CancellationToken::new();
            state.started = false;
            (
                std::mem::take(&mut state.workers),
                std::mem::take(&mut state.running),
            )
        };

        let grace = self.cfg.grace;
        tracing::info!(workers = pending.len(), ?grace, "gate host shutting down");
        if grace.is_zero() {
            workers.detach_all();
            return Ok(());
        }

        let done = async {
            while let Some(joined) = workers.join_next().await {
                if let Ok(name) = joined {
                    if let Some(i) = pending.iter().position(|n| *n == name) {
                        pending.swap_remove(i);
                    }
                }
            }
        };
        let outcome = tokio::time::timeout(grace, done).await;
        match outcome {
            Ok(()) => {
                tracing::info!("all dispatch workers stopped within grace");
                Ok(())
            }
            Err(_) => {
                let stuck: Vec<String> = pending.iter().map(|n| n.to_string()).collect();
                tracing::error!(?grace, ?stuck, "dispatch workers did not stop within grace");
                Err(HostError::GraceExceeded { grace, stuck })
            }
        }
    }

    /// Starts the host, waits for a termination signal, then shuts down.
    pub async fn run_until_signal(&self) -> Result<(), HostError> {
        self.start()?;
        shutdown::wait_for_shutdown_signal()
            .await
            .map_err(HostError::Signal)?;
        self.shutdown().await
    }
}

fn spawn_worker(state: &mut State, gate: &EventGate) -> Result<(), GateError> {
    let dispatcher = gate.dispatcher()?;
    let token = state.token.child_token();
    let name: Arc<str> = Arc::from(gate.name());
    state.running.push(Arc::clone(&name));
    state.workers.spawn(async move {
        dispatcher.run(token).await;
        name
    });
    Ok(())
}

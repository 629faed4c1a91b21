use std::sync::Arc;

use super::gate_host::GateHost;
use crate::config::HostConfig;
use crate::diagnostics::Bus;
use crate::remote::{AxumEndpoints, EndpointRegistry};

/// Builder for [`GateHost`].
pub struct GateHostBuilder {
    cfg: HostConfig,
    endpoints: Option<Arc<dyn EndpointRegistry>>,
}

impl GateHostBuilder {
    pub(super) fn new(cfg: HostConfig) -> Self {
        Self {
            cfg,
            endpoints: None,
        }
    }

    /// Registers remote gate endpoints with `endpoints`.
    ///
    /// Without this, the host keeps its own [`AxumEndpoints`], reachable
    /// through [`GateHost::endpoints`] but served by nobody until its router is mounted.
    pub fn with_endpoints(mut self, endpoints: Arc<dyn EndpointRegistry>) -> Self {
        self.endpoints = Some(endpoints);
        self
    }

    /// Builds the host. No gate exists and no worker runs yet.
    pub fn build(self) -> GateHost {
        let bus = self.cfg.diagnostics_capacity().map(Bus::new);
        let endpoints = self
            .endpoints
            .unwrap_or_else(|| Arc::new(AxumEndpoints::new()));
        GateHost::new_internal(self.cfg, bus, endpoints)
    }
}

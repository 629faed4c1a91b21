//! # Fabric configuration.
//!
//! Provides the settings used by [`GateHost`](crate::GateHost) and the remote gates it creates:
//! - [`GateConfig`]: per-gate queue sizing
//! - [`HttpConfig`]: HTTP endpoint layout, sender address and client timeouts
//! - [`HostConfig`]: the above plus shutdown and diagnostics settings
//!
//! Every struct has a documented [`Default`]. [`HostConfig::from_env`] applies
//! `GATEFABRIC_*` environment overrides on top of the defaults.
//!
//! ## Sentinel values
//! - `queue_capacity = 0` → clamped to 1 (a gate always has a slot)
//! - `bus_capacity = 0` → no diagnostics bus
//! - `grace = 0s` → do not wait for workers after cancelling them

use std::time::Duration;

use crate::gate::DEFAULT_QUEUE_CAPACITY;
use crate::remote::AddressMode;

/// Default path prefix of remote gate endpoints.
pub const DEFAULT_BASE_PATH: &str = "/event-gate";

/// Per-gate settings.
#[derive(Clone, Debug)]
pub struct GateConfig {
    /// Number of queue slots. Events posted while all slots are taken are dropped.
    pub queue_capacity: usize,
}

impl GateConfig {
    /// Queue capacity clamped to a minimum of 1.
    #[inline]
    pub fn queue_capacity_clamped(&self) -> usize {
        self.queue_capacity.max(1)
    }
}

impl Default for GateConfig {
    /// `queue_capacity = 20`
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

/// HTTP settings of remote gates.
///
/// ## Field semantics
/// - `base_path`: endpoint prefix; a gate named `n` serves `<base_path>/n`
/// - `port`: port the hosting HTTP server listens on (advertised in the sender address)
/// - `mode`: how the host part of the sender address is computed
/// - `advertised_host`: explicit host part; skips address probing when set
/// - `connect_timeout` / `request_timeout`: outbound client limits
/// - `max_body_bytes`: inbound bodies above this size are rejected
#[derive(Clone, Debug)]
pub struct HttpConfig {
    pub base_path: String,
    pub port: u16,
    pub mode: AddressMode,
    pub advertised_host: Option<String>,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub max_body_bytes: usize,
}

impl HttpConfig {
    /// Endpoint path of the gate named `gate`, with the name percent-encoded.
    pub fn endpoint_path(&self, gate: &str) -> String {
        format!(
            "{}/{}",
            self.base_path.trim_end_matches('/'),
            urlencoding::encode(gate)
        )
    }
}

impl Default for HttpConfig {
    /// Default configuration:
    ///
    /// - `base_path = "/event-gate"`
    /// - `port = 8080`
    /// - `mode = AddressMode::Dns`
    /// - `advertised_host = None` (probe the system)
    /// - `connect_timeout = 5s`, `request_timeout = 10s`
    /// - `max_body_bytes = 1 MiB`
    fn default() -> Self {
        Self {
            base_path: DEFAULT_BASE_PATH.to_owned(),
            port: 8080,
            mode: AddressMode::Dns,
            advertised_host: None,
            connect_timeout: Duration::from_secs(5),
            request_timeout: Duration::from_secs(10),
            max_body_bytes: 1024 * 1024,
        }
    }
}

/// Settings of a [`GateHost`](crate::GateHost).
#[derive(Clone, Debug)]
pub struct HostConfig {
    /// Maximum wait for dispatch workers to stop after cancellation.
    ///
    /// Exceeding it makes `shutdown` return `HostError::GraceExceeded`.
    pub grace: Duration,

    /// Defaults for gates created by the host.
    pub gate: GateConfig,

    /// Capacity of the diagnostics bus (`0` = no bus).
    pub bus_capacity: usize,

    /// Settings for remote gates created by the host.
    pub http: HttpConfig,
}

impl HostConfig {
    /// Returns the diagnostics bus capacity as an `Option`.
    ///
    /// - `None` → diagnostics disabled
    /// - `Some(n)` → bus with `n` slots
    #[inline]
    pub fn diagnostics_capacity(&self) -> Option<usize> {
        if self.bus_capacity == 0 {
            None
        } else {
            Some(self.bus_capacity)
        }
    }

    /// Defaults overridden by environment variables.
    ///
    /// | Variable                         | Field                     |
    /// |----------------------------------|---------------------------|
    /// | `GATEFABRIC_GRACE_MS`            | `grace`                   |
    /// | `GATEFABRIC_QUEUE_CAPACITY`      | `gate.queue_capacity`     |
    /// | `GATEFABRIC_BUS_CAPACITY`        | `bus_capacity`            |
    /// | `GATEFABRIC_BASE_PATH`           | `http.base_path`          |
    /// | `GATEFABRIC_PORT`                | `http.port`               |
    /// | `GATEFABRIC_ADDRESS_MODE`        | `http.mode` (`dns`/`ipv4`/`ipv6`) |
    /// | `GATEFABRIC_ADVERTISED_HOST`     | `http.advertised_host`    |
    /// | `GATEFABRIC_CONNECT_TIMEOUT_MS`  | `http.connect_timeout`    |
    /// | `GATEFABRIC_REQUEST_TIMEOUT_MS`  | `http.request_timeout`    |
    ///
    /// Unparseable values are ignored with a warning.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut cfg = Self::default();
        let parsed = |key: &str| -> Option<String> { lookup(key).map(|v| v.trim().to_owned()) };

        if let Some(ms) = parse(&parsed, "GATEFABRIC_GRACE_MS") {
            cfg.grace = Duration::from_millis(ms);
        }
        if let Some(n) = parse(&parsed, "GATEFABRIC_QUEUE_CAPACITY") {
            cfg.gate.queue_capacity = n;
        }
        if let Some(n) = parse(&parsed, "GATEFABRIC_BUS_CAPACITY") {
            cfg.bus_capacity = n;
        }
        if let Some(path) = parsed("GATEFABRIC_BASE_PATH").filter(|p| !p.is_empty()) {
            cfg.http.base_path = path;
        }
        if let Some(port) = parse(&parsed, "GATEFABRIC_PORT") {
            cfg.http.port = port;
        }
        if let Some(mode) = parse(&parsed, "GATEFABRIC_ADDRESS_MODE") {
            cfg.http.mode = mode;
        }
        if let Some(host) = parsed("GATEFABRIC_ADVERTISED_HOST").filter(|h| !h.is_empty()) {
            cfg.http.advertised_host = Some(host);
        }
        if let Some(ms) = parse(&parsed, "GATEFABRIC_CONNECT_TIMEOUT_MS") {
            cfg.http.connect_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = parse(&parsed, "GATEFABRIC_REQUEST_TIMEOUT_MS") {
            cfg.http.request_timeout = Duration::from_millis(ms);
        }
        cfg
    }
}

fn parse<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let raw = lookup(key)?;
    match raw.parse() {
        Ok(v) => Some(v),
        Err(err) => {
            tracing::warn!(key, value = %raw, error = %err, "ignoring invalid configuration value");
            None
        }
    }
}

impl Default for HostConfig {
    /// Default configuration:
    ///
    /// - `grace = 5s`
    /// - `gate = GateConfig::default()` (20 queue slots)
    /// - `bus_capacity = 1024`
    /// - `http = HttpConfig::default()`
    fn default() -> Self {
        Self {
            grace: Duration::from_secs(5),
            gate: GateConfig::default(),
            bus_capacity: 1024,
            http: HttpConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_match_the_documented_values() {
        let cfg = HostConfig::default();
        assert_eq!(cfg.grace, Duration::from_secs(5));
        assert_eq!(cfg.gate.queue_capacity, 20);
        assert_eq!(cfg.diagnostics_capacity(), Some(1024));
        assert_eq!(cfg.http.endpoint_path("kitchen"), "/event-gate/kitchen");
        assert_eq!(cfg.http.endpoint_path("living room"), "/event-gate/living%20room");
    }

    #[test]
    fn environment_overrides_defaults() {
        let cfg = HostConfig::from_lookup(lookup(&[
            ("GATEFABRIC_GRACE_MS", "250"),
            ("GATEFABRIC_QUEUE_CAPACITY", "64"),
            ("GATEFABRIC_BUS_CAPACITY", "0"),
            ("GATEFABRIC_BASE_PATH", "/gates/"),
            ("GATEFABRIC_ADDRESS_MODE", "IPv6"),
            ("GATEFABRIC_ADVERTISED_HOST", "gw.example"),
        ]));
        assert_eq!(cfg.grace, Duration::from_millis(250));
        assert_eq!(cfg.gate.queue_capacity, 64);
        assert_eq!(cfg.diagnostics_capacity(), None);
        assert_eq!(cfg.http.endpoint_path("a"), "/gates/a");
        assert_eq!(cfg.http.mode, AddressMode::Ipv6);
        assert_eq!(cfg.http.advertised_host.as_deref(), Some("gw.example"));
    }

    #[test]
    fn invalid_values_keep_defaults() {
        let cfg = HostConfig::from_lookup(lookup(&[
            ("GATEFABRIC_PORT", "eighty"),
            ("GATEFABRIC_ADDRESS_MODE", "smoke-signals"),
        ]));
        assert_eq!(cfg.http.port, 8080);
        assert_eq!(cfg.http.mode, AddressMode::Dns);
    }

    #[test]
    fn zero_queue_capacity_is_clamped() {
        let gate = GateConfig { queue_capacity: 0 };
        assert_eq!(gate.queue_capacity_clamped(), 1);
    }
}

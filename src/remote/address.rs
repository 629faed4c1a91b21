//! # Sender address of a remote gate.
//!
//! A remote gate stamps every outbound event with `host:port`, where `host`
//! is computed once, at construction, according to an [`AddressMode`]:
//!
//! | Mode   | Host part                                                        |
//! |--------|------------------------------------------------------------------|
//! | `Dns`  | first label of the local hostname + `.local`                     |
//! | `Ipv4` | IPv4 address of the primary (default-route) interface            |
//! | `Ipv6` | IPv6 address of the primary interface, written as `[addr]`       |
//!
//! ## Rules
//! - Loopback, unspecified and link-local addresses never qualify.
//! - When nothing qualifies, construction fails with [`GateError::NoAddress`];
//!   the gate never advertises a partial address.
//! - Probing is behind [`AddressProbe`] so hosts with unusual network setups
//!   (and tests) can supply their own answers.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, UdpSocket};
use std::str::FromStr;

use crate::error::GateError;

const DNS_SUFFIX: &str = ".local";

/// How a remote gate computes the host part of its sender address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AddressMode {
    /// Local hostname with the `.local` domain suffix.
    #[default]
    Dns,
    /// IPv4 literal of the primary interface.
    Ipv4,
    /// IPv6 literal of the primary interface.
    Ipv6,
}

impl AddressMode {
    /// Short stable label, also accepted by [`FromStr`].
    pub fn as_label(&self) -> &'static str {
        match self {
            AddressMode::Dns => "dns",
            AddressMode::Ipv4 => "ipv4",
            AddressMode::Ipv6 => "ipv6",
        }
    }
}

impl fmt::Display for AddressMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_label())
    }
}

impl FromStr for AddressMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dns" => Ok(AddressMode::Dns),
            "ipv4" | "ip4" => Ok(AddressMode::Ipv4),
            "ipv6" | "ip6" => Ok(AddressMode::Ipv6),
            other => Err(format!("unknown address mode {other:?}")),
        }
    }
}

/// Source of local naming facts used to build a sender address.
pub trait AddressProbe: Send + Sync {
    /// Local hostname, possibly fully qualified.
    fn hostname(&self) -> Option<String>;

    /// Address of the primary interface for the given family.
    fn primary_address(&self, ipv6: bool) -> Option<IpAddr>;
}

/// Probes the running system.
///
/// The hostname comes from the operating system. The primary interface is the one the kernel would route a packet through
/// to a documentation-range destination; no traffic is sent.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemProbe;

impl AddressProbe for SystemProbe {
    fn hostname(&self) -> Option<String> {
        match hostname::get() {
            Ok(name) => Some(name.to_string_lossy().trim().to_owned()).filter(|h| !h.is_empty()),
            Err(err) => {
                tracing::debug!(error = %err, "failed to query hostname");
                None
            }
        }
    }

    fn primary_address(&self, ipv6: bool) -> Option<IpAddr> {
        let (bind, probe): (SocketAddr, SocketAddr) = if ipv6 {
            (
                (Ipv6Addr::UNSPECIFIED, 0).into(),
                (Ipv6Addr::new(0x2001, 0xdb8, 0, 0, 0, 0, 0, 1), 9).into(),
            )
        } else {
            (
                (Ipv4Addr::UNSPECIFIED, 0).into(),
                (Ipv4Addr::new(192, 0, 2, 1), 9).into(),
            )
        };
        let socket = UdpSocket::bind(bind).ok()?;
        socket.connect(probe).ok()?;
        socket.local_addr().ok().map(|a| a.ip())
    }
}

/// Computes the host part of the sender address for `mode`.
pub fn resolve_host(mode: AddressMode, probe: &dyn AddressProbe) -> Result<String, GateError> {
    let host = match mode {
        AddressMode::Dns => probe.hostname().and_then(|h| dns_name(&h)),
        AddressMode::Ipv4 => probe
            .primary_address(false)
            .filter(|ip| ip.is_ipv4() && qualifies(ip))
            .map(|ip| ip.to_string()),
        AddressMode::Ipv6 => probe
            .primary_address(true)
            .filter(|ip| ip.is_ipv6() && qualifies(ip))
            .map(|ip| format!("[{ip}]")),
    };
    host.ok_or(GateError::NoAddress { mode })
}

/// Joins a host part and a port into a sender address.
#[inline]
pub fn sender_address(host: &str, port: u16) -> String {
    format!("{host}:{port}")
}

fn dns_name(hostname: &str) -> Option<String> {
    let label = hostname.split('.').next()?.trim();
    (!label.is_empty()).then(|| format!("{label}{DNS_SUFFIX}"))
}

fn qualifies(ip: &IpAddr) -> bool {
    if ip.is_loopback() || ip.is_unspecified() {
        return false;
    }
    match ip {
        IpAddr::V4(v4) => !v4.is_link_local(),
        IpAddr::V6(v6) => (v6.segments()[0] & 0xffc0) != 0xfe80,
    }
}

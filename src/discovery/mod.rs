//! Receiver discovery over mDNS / DNS-SD.

pub mod iface;
pub mod mdns;
pub mod scanner;

use std::net::IpAddr;
use std::time::Duration;

use tokio::sync::mpsc;

pub use scanner::{DeviceRecord, DeviceScan, Scanner};

/// Service type advertised by cast receivers.
pub const CAST_SERVICE_TYPE: &str = "_googlecast._tcp.local.";

/// Scan window used when the caller gives none (or an unparsable one).
pub const DEFAULT_SCAN_WAIT: Duration = Duration::from_secs(3);

#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    #[error("network interface {0:?} not found")]
    UnknownInterface(String),
    #[error("unable to create discovery resolver: {0}")]
    Resolver(String),
    #[error("unable to browse for {service}: {reason}")]
    Browse { service: String, reason: String },
}

/// A resolved service advertisement, as reported by the discovery client.
#[derive(Debug, Clone, Default)]
pub struct Advertisement {
    /// Full DNS-SD instance name, e.g. `Living-Room-abc._googlecast._tcp.local.`
    pub fullname: String,
    pub hostname: String,
    pub port: u16,
    pub addresses: Vec<IpAddr>,
    /// Raw TXT entries in `key=value` form.
    pub txt: Vec<String>,
}

/// Source of service advertisements.
///
/// `browse` starts background discovery and returns the receiving end of a
/// bounded channel. Implementations must stop all background work once that
/// receiver is dropped.
pub trait DiscoveryClient: Send + Sync + 'static {
    fn browse(
        &self,
        service_type: &str,
        interface: Option<&str>,
    ) -> Result<mpsc::Receiver<Advertisement>, DiscoveryError>;
}

/// Parse a `wait` query value (whole seconds). Missing or garbage values
/// fall back to `default`.
pub fn parse_wait(raw: Option<&str>, default: Duration) -> Duration {
    raw.and_then(|s| s.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or(default)
}

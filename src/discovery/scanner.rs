use std::collections::BTreeMap;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::discovery::{iface, Advertisement, DiscoveryClient, DiscoveryError, CAST_SERVICE_TYPE};

/// One discovered receiver. Built fresh for every scan, never cached.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceRecord {
    pub uuid: String,
    pub addr_v4: Option<Ipv4Addr>,
    pub addr_v6: Option<Ipv6Addr>,
    pub port: u16,
    /// DNS-SD instance name.
    pub name: String,
    pub host: String,
    /// Model from the `md` TXT entry.
    pub device_type: String,
    /// Receiver status text from the `rs` TXT entry.
    pub status: String,
    /// Friendly name from the `fn` TXT entry.
    pub device_name: String,
    /// Every TXT entry, verbatim.
    pub info_fields: BTreeMap<String, String>,
}

/// JSON shape returned by the `/devices` endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceDescriptor {
    pub addr: String,
    pub port: u16,
    pub name: String,
    pub host: String,
    pub uuid: String,
    pub device_type: String,
    pub status: String,
    pub device_name: String,
    pub info_fields: BTreeMap<String, String>,
}

impl DeviceRecord {
    pub fn from_advertisement(adv: Advertisement) -> Self {
        let mut record = DeviceRecord {
            addr_v4: adv.addresses.iter().find_map(|a| match a {
                IpAddr::V4(v4) => Some(*v4),
                IpAddr::V6(_) => None,
            }),
            addr_v6: adv.addresses.iter().find_map(|a| match a {
                IpAddr::V6(v6) => Some(*v6),
                IpAddr::V4(_) => None,
            }),
            port: adv.port,
            name: instance_name(&adv.fullname),
            host: adv.hostname.trim_end_matches('.').to_string(),
            ..Default::default()
        };

        for entry in &adv.txt {
            let Some((key, val)) = entry.split_once('=') else {
                continue;
            };
            match key {
                "fn" => record.device_name = val.to_string(),
                "md" => record.device_type = val.to_string(),
                "id" => record.uuid = val.to_string(),
                "rs" => record.status = val.to_string(),
                _ => {}
            }
            record.info_fields.insert(key.to_string(), val.to_string());
        }
        record
    }

    pub fn descriptor(&self) -> DeviceDescriptor {
        DeviceDescriptor {
            addr: self.addr_v4.map(|a| a.to_string()).unwrap_or_default(),
            port: self.port,
            name: self.name.clone(),
            host: self.host.clone(),
            uuid: self.uuid.clone(),
            device_type: self.device_type.clone(),
            status: self.status.clone(),
            device_name: self.device_name.clone(),
            info_fields: self.info_fields.clone(),
        }
    }
}

fn instance_name(fullname: &str) -> String {
    let suffix = format!(".{}", CAST_SERVICE_TYPE);
    fullname
        .strip_suffix(suffix.as_str())
        .unwrap_or(fullname)
        .to_string()
}

/// Time-bounded receiver discovery.
#[derive(Clone)]
pub struct Scanner {
    client: Arc<dyn DiscoveryClient>,
    service_type: String,
}

impl Scanner {
    pub fn new(client: Arc<dyn DiscoveryClient>) -> Self {
        Self {
            client,
            service_type: CAST_SERVICE_TYPE.to_string(),
        }
    }

    /// Start a scan that ends after `budget` or when cancelled, whichever comes first.
    ///
    /// An unknown `interface` fails immediately, before any discovery work starts.
    pub fn scan(&self, budget: Duration, interface: Option<&str>) -> Result<DeviceScan, DiscoveryError> {
        if let Some(name) = interface {
            if !iface::interface_exists(name) {
                return Err(DiscoveryError::UnknownInterface(name.to_string()));
            }
        }
        let rx = self.client.browse(&self.service_type, interface)?;
        tracing::debug!(
            "Scanning for {} for {:?}{}",
            self.service_type,
            budget,
            interface.map(|i| format!(" on {i}")).unwrap_or_default()
        );
        Ok(DeviceScan {
            rx: Some(rx),
            deadline: Instant::now() + budget,
            cancel: CancellationToken::new(),
        })
    }

    /// Every record seen within the budget, in arrival order.
    pub async fn collect(
        &self,
        budget: Duration,
        interface: Option<&str>,
    ) -> Result<Vec<DeviceRecord>, DiscoveryError> {
        let mut scan = self.scan(budget, interface)?;
        let mut devices = Vec::new();
        while let Some(device) = scan.next().await {
            devices.push(device);
        }
        tracing::info!("Discovery found {} device(s)", devices.len());
        Ok(devices)
    }

    /// First record advertising `uuid` with an IPv4 address; the scan stops
    /// as soon as one is seen. IPv6-only sightings are skipped, since a
    /// later announcement of the same device usually carries the v4 address.
    pub async fn find(
        &self,
        uuid: &str,
        budget: Duration,
        interface: Option<&str>,
    ) -> Result<Option<DeviceRecord>, DiscoveryError> {
        let mut scan = self.scan(budget, interface)?;
        while let Some(device) = scan.next().await {
            if device.uuid == uuid && device.addr_v4.is_some() {
                scan.cancel();
                return Ok(Some(device));
            }
        }
        Ok(None)
    }
}

/// A running scan. Yields records until the deadline passes or the scan is
/// cancelled; afterwards `next` keeps returning `None`.
///
/// Dropping the scan drops the advertisement receiver, which stops the
/// discovery client's background work.
pub struct DeviceScan {
    rx: Option<mpsc::Receiver<Advertisement>>,
    deadline: Instant,
    cancel: CancellationToken,
}

impl DeviceScan {
    pub async fn next(&mut self) -> Option<DeviceRecord> {
        let rx = self.rx.as_mut()?;
        let advert = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            _ = tokio::time::sleep_until(self.deadline) => None,
            advert = rx.recv() => advert,
        };
        match advert {
            Some(advert) => Some(DeviceRecord::from_advertisement(advert)),
            None => {
                self.rx = None;
                None
            }
        }
    }

    /// Token that ends the scan early when cancelled from anywhere.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }
}

impl Drop for DeviceScan {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

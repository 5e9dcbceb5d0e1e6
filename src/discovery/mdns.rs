use mdns_sd::{IfKind, ServiceDaemon, ServiceEvent, ServiceInfo};
use tokio::sync::mpsc;

use crate::discovery::{Advertisement, DiscoveryClient, DiscoveryError};

/// Resolved advertisements buffered between the mDNS daemon and the scan consumer.
const ADVERTISEMENT_QUEUE: usize = 5;

/// [`DiscoveryClient`] backed by an `mdns-sd` daemon.
///
/// Every `browse` call owns a fresh daemon; it is shut down when the returned
/// receiver is dropped, so nothing outlives the scan that asked for it.
#[derive(Debug, Default, Clone, Copy)]
pub struct MdnsClient;

impl DiscoveryClient for MdnsClient {
    fn browse(
        &self,
        service_type: &str,
        interface: Option<&str>,
    ) -> Result<mpsc::Receiver<Advertisement>, DiscoveryError> {
        let daemon = ServiceDaemon::new().map_err(|e| DiscoveryError::Resolver(e.to_string()))?;

        if let Some(name) = interface {
            let restrict = daemon
                .disable_interface(IfKind::All)
                .and_then(|_| daemon.enable_interface(IfKind::Name(name.to_string())));
            if let Err(e) = restrict {
                let _ = daemon.shutdown();
                return Err(DiscoveryError::Resolver(format!(
                    "cannot restrict discovery to {name}: {e}"
                )));
            }
        }

        let events = match daemon.browse(service_type) {
            Ok(events) => events,
            Err(e) => {
                let _ = daemon.shutdown();
                return Err(DiscoveryError::Browse {
                    service: service_type.to_string(),
                    reason: e.to_string(),
                });
            }
        };

        let (tx, rx) = mpsc::channel(ADVERTISEMENT_QUEUE);
        let service = service_type.to_string();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = tx.closed() => break,
                    event = events.recv_async() => match event {
                        Ok(ServiceEvent::ServiceResolved(info)) => {
                            tracing::debug!("mDNS: resolved {}", info.get_fullname());
                            if tx.send(advertisement_from(&info)).await.is_err() {
                                break;
                            }
                        }
                        Ok(other) => tracing::trace!("mDNS: {:?}", other),
                        Err(e) => {
                            tracing::warn!("mDNS: browse channel for {} closed: {}", service, e);
                            break;
                        }
                    }
                }
            }
            if let Err(e) = daemon.stop_browse(&service) {
                tracing::debug!("mDNS: failed to stop browse cleanly: {}", e);
            }
            if let Err(e) = daemon.shutdown() {
                tracing::debug!("mDNS: daemon shutdown failed: {}", e);
            }
        });

        Ok(rx)
    }
}

fn advertisement_from(info: &ServiceInfo) -> Advertisement {
    let mut addresses: Vec<_> = info.get_addresses().iter().copied().collect();
    addresses.sort();

    let txt = info
        .get_properties()
        .iter()
        .filter_map(|prop| prop.val().map(|_| format!("{}={}", prop.key(), prop.val_str())))
        .collect();

    Advertisement {
        fullname: info.get_fullname().to_string(),
        hostname: info.get_hostname().to_string(),
        port: info.get_port(),
        addresses,
        txt,
    }
}

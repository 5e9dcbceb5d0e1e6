use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::discovery::{DeviceRecord, DiscoveryError, Scanner, DEFAULT_SCAN_WAIT};
use crate::media::catalog::{content_type_for, MediaLinks};
use crate::media::mime;
use crate::session::{SessionConnector, SessionError, SessionRegistry, SessionState};

#[derive(Debug, Clone)]
pub struct ConnectRequest {
    pub uuid: String,
    pub addr: Option<String>,
    pub port: Option<String>,
    pub interface: Option<String>,
    /// Discovery window used when `addr`/`port` must be looked up.
    pub wait: Duration,
}

impl ConnectRequest {
    pub fn new(uuid: impl Into<String>) -> Self {
        Self {
            uuid: uuid.into(),
            addr: None,
            port: None,
            interface: None,
            wait: DEFAULT_SCAN_WAIT,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoadRequest {
    pub uuid: String,
    /// Local path (served by the media server) or a URL the device can fetch itself.
    pub path: String,
    /// Overrides the type derived from the path.
    pub content_type: Option<String>,
}

/// Drives connect / disconnect / load against the registry, the scanner and
/// the control-session connector.
pub struct SessionManager {
    registry: SessionRegistry,
    scanner: Scanner,
    connector: Arc<dyn SessionConnector>,
    links: MediaLinks,
}

fn non_empty(s: Option<String>) -> Option<String> {
    s.filter(|v| !v.trim().is_empty())
}

impl SessionManager {
    pub fn new(
        registry: SessionRegistry,
        scanner: Scanner,
        connector: Arc<dyn SessionConnector>,
        links: MediaLinks,
    ) -> Self {
        Self {
            registry,
            scanner,
            connector,
            links,
        }
    }

    pub async fn list_devices(
        &self,
        interface: Option<&str>,
        wait: Duration,
    ) -> Result<Vec<DeviceRecord>, DiscoveryError> {
        self.scanner.collect(wait, interface).await
    }

    pub fn connected(&self) -> Vec<(String, SessionState)> {
        self.registry.snapshot()
    }

    pub async fn connect(&self, req: ConnectRequest) -> Result<(), SessionError> {
        let uuid = req.uuid;
        if self.registry.state(&uuid) != SessionState::Unconnected {
            return Err(SessionError::AlreadyConnected(uuid));
        }

        let mut addr = non_empty(req.addr);
        let mut port = non_empty(req.port);
        if addr.is_none() || port.is_none() {
            tracing::info!(
                "device addr and/or port are missing, trying to lookup address for uuid {:?}",
                uuid
            );
            match self
                .scanner
                .find(&uuid, req.wait, req.interface.as_deref())
                .await
            {
                Ok(Some(device)) => {
                    if let Some(v4) = device.addr_v4 {
                        addr = Some(v4.to_string());
                        port = Some(device.port.to_string());
                    }
                }
                Ok(None) => {}
                Err(e) => tracing::warn!("error discovering entries: {}", e),
            }
        }

        let (Some(addr), Some(port)) = (addr, port) else {
            return Err(SessionError::AddressResolution(uuid));
        };
        let port: u16 = port
            .trim()
            .parse()
            .map_err(|_| SessionError::InvalidPort(port.clone()))?;

        let reservation = self.registry.reserve(&uuid)?;
        tracing::info!("connecting {} to addr={} port={}...", uuid, addr, port);
        let session = self
            .connector
            .start(&addr, port)
            .await
            .map_err(SessionError::Connection)?;
        reservation.commit(session);
        tracing::info!("connected {}", uuid);
        Ok(())
    }

    pub async fn disconnect(&self, uuid: &str, stop_media: bool) -> Result<(), SessionError> {
        let session = self
            .registry
            .remove(uuid)
            .ok_or_else(|| SessionError::NotConnected(uuid.to_string()))?;
        if let Err(e) = session.close(stop_media).await {
            tracing::warn!("error closing session for {}: {}", uuid, e);
        }
        tracing::info!("disconnected {}", uuid);
        Ok(())
    }

    pub async fn load(&self, req: LoadRequest) -> Result<(), SessionError> {
        let session = self
            .registry
            .get(&req.uuid)
            .ok_or_else(|| SessionError::NotConnected(req.uuid.clone()))?;
        if let Err(e) = session.update().await {
            tracing::warn!("stale session for {}: {}", req.uuid, e);
            return Err(SessionError::NotConnected(req.uuid));
        }

        let (media_url, content_type) = self.media_target(&req.path, req.content_type);
        tracing::info!("loading {} ({}) on {}", media_url, content_type, req.uuid);
        session
            .load(&media_url, &content_type)
            .await
            .map_err(SessionError::Load)
    }

    /// URL and content type the device is told to fetch for `path`.
    pub fn media_target(&self, path: &str, content_type: Option<String>) -> (String, String) {
        let media_url = if path.contains("://") {
            path.to_string()
        } else {
            self.links.url_for(Path::new(path), false)
        };
        let content_type = non_empty(content_type).unwrap_or_else(|| {
            mime::lookup(Path::new(path))
                .map(str::to_string)
                .unwrap_or_else(|| content_type_for(Path::new(path)))
        });
        (media_url, content_type)
    }
}

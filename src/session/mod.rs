//! Per-device control sessions.

pub mod manager;
pub mod registry;
pub mod tcp;

use std::sync::Arc;

use async_trait::async_trait;

use crate::discovery::DiscoveryError;

pub use manager::{ConnectRequest, LoadRequest, SessionManager};
pub use registry::{SessionRegistry, SessionState};

/// Failure reported by a control-session collaborator.
#[derive(Debug, thiserror::Error)]
pub enum ControlError {
    #[error("cannot reach {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error("timed out connecting to {0}")]
    Timeout(String),
    #[error("control channel closed by {0}")]
    Closed(String),
    #[error("{0}")]
    Rejected(String),
}

/// Handle on one device's control channel.
///
/// Implementations do their own internal synchronisation; the registry only
/// guards which handle belongs to which device.
#[async_trait]
pub trait ControlSession: Send + Sync {
    /// Heartbeat. Fails once the device is no longer reachable.
    async fn update(&self) -> Result<(), ControlError>;

    /// Ask the device to fetch and play `media_url`.
    async fn load(&self, media_url: &str, content_type: &str) -> Result<(), ControlError>;

    /// Tear the control channel down, optionally stopping playback first.
    async fn close(&self, stop_media: bool) -> Result<(), ControlError>;
}

/// Opens control sessions.
#[async_trait]
pub trait SessionConnector: Send + Sync {
    async fn start(&self, host: &str, port: u16) -> Result<Arc<dyn ControlSession>, ControlError>;
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("device uuid is already connected")]
    AlreadyConnected(String),
    #[error("device uuid is not connected")]
    NotConnected(String),
    #[error("'port' and 'addr' missing from query params and uuid device lookup returned no results")]
    AddressResolution(String),
    #[error("'port' is not a number: {0:?}")]
    InvalidPort(String),
    #[error("unable to start application: {0}")]
    Connection(#[source] ControlError),
    #[error("unable to load media: {0}")]
    Load(#[source] ControlError),
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),
}

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::Mutex;

use crate::session::{ControlError, ControlSession, SessionConnector};

/// Opens [`TcpControlSession`]s, giving up after `timeout`.
#[derive(Debug, Clone)]
pub struct TcpConnector {
    timeout: Duration,
}

impl TcpConnector {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl SessionConnector for TcpConnector {
    async fn start(&self, host: &str, port: u16) -> Result<Arc<dyn ControlSession>, ControlError> {
        let peer = format!("{host}:{port}");
        let stream = tokio::time::timeout(self.timeout, TcpStream::connect((host, port)))
            .await
            .map_err(|_| ControlError::Timeout(peer.clone()))?
            .map_err(|source| ControlError::Connect {
                addr: peer.clone(),
                source,
            })?;
        if let Err(e) = stream.set_nodelay(true) {
            tracing::debug!("could not set TCP_NODELAY for {}: {}", peer, e);
        }
        tracing::debug!("control channel open to {}", peer);
        let session = TcpControlSession {
            peer,
            inner: Mutex::new(Link {
                stream: Some(stream),
                media: None,
            }),
        };
        Ok(Arc::new(session) as Arc<dyn ControlSession>)
    }
}

struct Link {
    stream: Option<TcpStream>,
    /// Media URL and content type last handed to the device.
    media: Option<(String, String)>,
}

/// Holds a TCP connection to the receiver's control port.
///
/// Liveness is the socket's: the session goes stale once the device closes
/// the connection. The receiver's own control protocol is not spoken here.
pub struct TcpControlSession {
    peer: String,
    inner: Mutex<Link>,
}

impl TcpControlSession {
    fn check_alive(&self, link: &mut Link) -> Result<(), ControlError> {
        let Some(stream) = link.stream.as_ref() else {
            return Err(ControlError::Closed(self.peer.clone()));
        };
        let mut probe = [0u8; 64];
        match stream.try_read(&mut probe) {
            Ok(0) => {
                link.stream = None;
                Err(ControlError::Closed(self.peer.clone()))
            }
            Ok(_) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => Ok(()),
            Err(_) => {
                link.stream = None;
                Err(ControlError::Closed(self.peer.clone()))
            }
        }
    }
}

#[async_trait]
impl ControlSession for TcpControlSession {
    async fn update(&self) -> Result<(), ControlError> {
        let mut link = self.inner.lock().await;
        self.check_alive(&mut link)
    }

    /// Checks the socket and remembers the media. Nothing is sent to the
    /// device: playback commands need the receiver's own protocol.
    async fn load(&self, media_url: &str, content_type: &str) -> Result<(), ControlError> {
        let mut link = self.inner.lock().await;
        self.check_alive(&mut link)?;
        tracing::info!("{}: media set to {} ({})", self.peer, media_url, content_type);
        link.media = Some((media_url.to_string(), content_type.to_string()));
        Ok(())
    }

    async fn close(&self, stop_media: bool) -> Result<(), ControlError> {
        let mut link = self.inner.lock().await;
        if stop_media {
            if let Some((url, _)) = link.media.take() {
                tracing::info!("{}: stopping {}", self.peer, url);
            }
        }
        match link.stream.take() {
            Some(mut stream) => stream.shutdown().await.map_err(|source| ControlError::Connect {
                addr: self.peer.clone(),
                source,
            }),
            None => Ok(()),
        }
    }
}

#![allow(dead_code)]

use std::net::{IpAddr, Ipv4Addr};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use tokio::sync::mpsc;

use pusher::discovery::{Advertisement, DiscoveryClient, DiscoveryError, Scanner};
use pusher::http::{build_control_router, state::ControlState};
use pusher::media::catalog::MediaLinks;
use pusher::session::{
    ControlError, ControlSession, SessionConnector, SessionManager, SessionRegistry,
};

pub fn links() -> MediaLinks {
    MediaLinks::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 9002).unwrap()
}

pub fn advert(uuid: &str, addr: &str, port: u16) -> Advertisement {
    Advertisement {
        fullname: format!("Receiver-{uuid}._googlecast._tcp.local."),
        hostname: format!("{uuid}.local."),
        port,
        addresses: vec![addr.parse().unwrap()],
        txt: vec![
            format!("id={uuid}"),
            "fn=Living Room TV".to_string(),
            "md=Chromecast".to_string(),
            "rs=".to_string(),
        ],
    }
}

/// Replays canned advertisements, then stays silent until the scan hangs up.
#[derive(Default)]
pub struct FakeDiscovery {
    pub adverts: Vec<Advertisement>,
    pub browses: AtomicUsize,
    /// Incremented when a browse's background task observes the consumer is gone.
    pub stopped: Arc<AtomicUsize>,
}

impl FakeDiscovery {
    pub fn with(adverts: Vec<Advertisement>) -> Self {
        Self {
            adverts,
            ..Default::default()
        }
    }
}

impl DiscoveryClient for FakeDiscovery {
    fn browse(
        &self,
        _service_type: &str,
        _interface: Option<&str>,
    ) -> Result<mpsc::Receiver<Advertisement>, DiscoveryError> {
        self.browses.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = mpsc::channel(5);
        let adverts = self.adverts.clone();
        let stopped = Arc::clone(&self.stopped);
        tokio::spawn(async move {
            for advert in adverts {
                if tx.send(advert).await.is_err() {
                    break;
                }
            }
            tx.closed().await;
            stopped.fetch_add(1, Ordering::SeqCst);
        });
        Ok(rx)
    }
}

/// Always fails to create a resolver.
pub struct BrokenDiscovery;

impl DiscoveryClient for BrokenDiscovery {
    fn browse(
        &self,
        _service_type: &str,
        _interface: Option<&str>,
    ) -> Result<mpsc::Receiver<Advertisement>, DiscoveryError> {
        Err(DiscoveryError::Resolver("no multicast here".to_string()))
    }
}

pub struct FakeSession {
    pub host: String,
    pub port: u16,
    pub alive: AtomicBool,
    pub loads: Mutex<Vec<(String, String)>>,
    pub closed_with: Mutex<Option<bool>>,
    /// Makes `close` report a teardown failure.
    pub fail_close: AtomicBool,
}

#[async_trait]
impl ControlSession for FakeSession {
    async fn update(&self) -> Result<(), ControlError> {
        if self.alive.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(ControlError::Closed(self.host.clone()))
        }
    }

    async fn load(&self, media_url: &str, content_type: &str) -> Result<(), ControlError> {
        self.loads
            .lock()
            .unwrap()
            .push((media_url.to_string(), content_type.to_string()));
        Ok(())
    }

    async fn close(&self, stop_media: bool) -> Result<(), ControlError> {
        *self.closed_with.lock().unwrap() = Some(stop_media);
        if self.fail_close.load(Ordering::SeqCst) {
            return Err(ControlError::Rejected(format!("{} hung up mid-teardown", self.host)));
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeConnector {
    pub starts: AtomicUsize,
    pub fail: AtomicBool,
    /// Seeds `fail_close` on every session started from here on.
    pub fail_close: AtomicBool,
    pub delay: Duration,
    pub sessions: Mutex<Vec<Arc<FakeSession>>>,
}

impl FakeConnector {
    pub fn slow(delay: Duration) -> Self {
        Self {
            delay,
            ..Default::default()
        }
    }

    pub fn last_session(&self) -> Arc<FakeSession> {
        Arc::clone(self.sessions.lock().unwrap().last().expect("no session started"))
    }
}

#[async_trait]
impl SessionConnector for FakeConnector {
    async fn start(&self, host: &str, port: u16) -> Result<Arc<dyn ControlSession>, ControlError> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(ControlError::Rejected(format!("{host}:{port} refused")));
        }
        let session = Arc::new(FakeSession {
            host: host.to_string(),
            port,
            alive: AtomicBool::new(true),
            loads: Mutex::new(Vec::new()),
            closed_with: Mutex::new(None),
            fail_close: AtomicBool::new(self.fail_close.load(Ordering::SeqCst)),
        });
        self.sessions.lock().unwrap().push(Arc::clone(&session));
        Ok(session as Arc<dyn ControlSession>)
    }
}

pub fn manager(
    discovery: Arc<dyn DiscoveryClient>,
    connector: Arc<FakeConnector>,
) -> (SessionManager, SessionRegistry) {
    let registry = SessionRegistry::new();
    let manager = SessionManager::new(
        registry.clone(),
        Scanner::new(discovery),
        connector,
        links(),
    );
    (manager, registry)
}

pub fn control_app(
    discovery: Arc<dyn DiscoveryClient>,
    connector: Arc<FakeConnector>,
) -> (Router, SessionRegistry) {
    let (manager, registry) = manager(discovery, connector);
    let app = build_control_router(ControlState {
        sessions: Arc::new(manager),
        default_wait: Duration::from_secs(1),
    });
    (app, registry)
}

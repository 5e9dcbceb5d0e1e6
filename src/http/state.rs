use std::sync::{Arc, RwLock};
use std::time::Duration;

use crate::media::catalog::{MediaCatalog, MediaLinks};
use crate::session::SessionManager;

/// State shared by the control router's handlers.
#[derive(Clone)]
pub struct ControlState {
    pub sessions: Arc<SessionManager>,
    /// Discovery window for requests that carry no usable `wait`.
    pub default_wait: Duration,
}

/// State shared by the media router's handlers.
/// `catalog` is `None` until the first successful `/load`; each load swaps
/// in a whole new catalog. The lock is never held across an `.await`.
#[derive(Clone)]
pub struct MediaState {
    pub catalog: Arc<RwLock<Option<MediaCatalog>>>,
    pub links: MediaLinks,
}

impl MediaState {
    pub fn new(links: MediaLinks) -> Self {
        Self {
            catalog: Arc::new(RwLock::new(None)),
            links,
        }
    }
}

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;

use crate::session::{ControlSession, SessionError};

/// Observable lifecycle of one device identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Unconnected,
    Connecting,
    Connected,
}

enum Slot {
    Connecting,
    Connected(Arc<dyn ControlSession>),
}

/// Device identity → control session, at most one per identity.
///
/// The mutex guards map membership only and is released before any
/// collaborator call.
#[derive(Clone, Default)]
pub struct SessionRegistry {
    slots: Arc<Mutex<HashMap<String, Slot>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn slots(&self) -> MutexGuard<'_, HashMap<String, Slot>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn state(&self, uuid: &str) -> SessionState {
        match self.slots().get(uuid) {
            None => SessionState::Unconnected,
            Some(Slot::Connecting) => SessionState::Connecting,
            Some(Slot::Connected(_)) => SessionState::Connected,
        }
    }

    /// Claim `uuid` for a connect in progress. Fails if any slot exists.
    pub fn reserve(&self, uuid: &str) -> Result<Reservation, SessionError> {
        let mut slots = self.slots();
        if slots.contains_key(uuid) {
            return Err(SessionError::AlreadyConnected(uuid.to_string()));
        }
        slots.insert(uuid.to_string(), Slot::Connecting);
        Ok(Reservation {
            registry: self.clone(),
            uuid: uuid.to_string(),
            committed: false,
        })
    }

    /// The connected session for `uuid`. Slots still connecting are not returned.
    pub fn get(&self, uuid: &str) -> Option<Arc<dyn ControlSession>> {
        match self.slots().get(uuid) {
            Some(Slot::Connected(session)) => Some(Arc::clone(session)),
            _ => None,
        }
    }

    /// Take the connected session for `uuid` out of the registry.
    pub fn remove(&self, uuid: &str) -> Option<Arc<dyn ControlSession>> {
        let mut slots = self.slots();
        if !matches!(slots.get(uuid), Some(Slot::Connected(_))) {
            return None;
        }
        match slots.remove(uuid) {
            Some(Slot::Connected(session)) => Some(session),
            _ => None,
        }
    }

    /// Every tracked identity with its state, sorted by identity.
    pub fn snapshot(&self) -> Vec<(String, SessionState)> {
        let mut entries: Vec<_> = self
            .slots()
            .iter()
            .map(|(uuid, slot)| {
                let state = match slot {
                    Slot::Connecting => SessionState::Connecting,
                    Slot::Connected(_) => SessionState::Connected,
                };
                (uuid.clone(), state)
            })
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }

    pub fn is_empty(&self) -> bool {
        self.slots().is_empty()
    }
}

/// A `Connecting` slot. Committing turns it into `Connected`; dropping it
/// uncommitted (start failed, request abandoned) frees the identity again.
pub struct Reservation {
    registry: SessionRegistry,
    uuid: String,
    committed: bool,
}

impl Reservation {
    pub fn commit(mut self, session: Arc<dyn ControlSession>) {
        self.registry
            .slots()
            .insert(self.uuid.clone(), Slot::Connected(session));
        self.committed = true;
    }
}

impl Drop for Reservation {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        let mut slots = self.registry.slots();
        if matches!(slots.get(&self.uuid), Some(Slot::Connecting)) {
            slots.remove(&self.uuid);
        }
    }
}

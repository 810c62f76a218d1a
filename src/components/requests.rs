use crate::error::{AppResult, Error};
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

/// Kinds of request that supersede each other
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestKind {
    /// Full list or filtered list
    Refresh,
    Create,
    Update,
    Delete,
    /// RSVP and un-RSVP for one event
    Attendance,
    AttendeeList,
    /// Calendar add and remove for one event
    Calendar,
}

/// Identity of a request slot
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestKey {
    pub kind: RequestKind,
    pub target: Option<String>,
}

impl RequestKey {
    pub fn new(kind: RequestKind) -> Self {
        Self { kind, target: None }
    }

    pub fn for_event(kind: RequestKind, id: &str) -> Self {
        Self {
            kind,
            target: Some(id.to_string()),
        }
    }
}

type ActiveMap = HashMap<RequestKey, (Uuid, CancellationToken)>;

/// Tracks requests still waiting on the network.
///
/// Starting a request cancels the older one under the same key, so a
/// quick RSVP then un-RSVP only lets the later one land.
#[derive(Clone)]
pub struct InFlight {
    root: CancellationToken,
    active: Arc<Mutex<ActiveMap>>,
}

impl Default for InFlight {
    fn default() -> Self {
        Self::new()
    }
}

impl InFlight {
    pub fn new() -> Self {
        Self {
            root: CancellationToken::new(),
            active: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ActiveMap> {
        self.active.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Register a request, cancelling whatever held the same key
    pub fn begin(&self, key: RequestKey) -> RequestTicket {
        let id = Uuid::new_v4();
        let token = self.root.child_token();

        if let Some((old_id, old_token)) = self.lock().insert(key.clone(), (id, token.clone())) {
            debug!("Request {} for {:?} superseded by {}", old_id, key, id);
            old_token.cancel();
        }

        RequestTicket {
            id,
            key,
            token,
            active: Arc::clone(&self.active),
        }
    }

    /// Cancel everything, including requests not started yet
    pub fn cancel_all(&self) {
        self.root.cancel();
        self.lock().clear();
    }

    pub fn is_shut_down(&self) -> bool {
        self.root.is_cancelled()
    }

    /// Requests currently registered
    pub fn active_count(&self) -> usize {
        self.lock().len()
    }
}

/// One registered request; releases its slot when dropped
pub struct RequestTicket {
    id: Uuid,
    key: RequestKey,
    token: CancellationToken,
    active: Arc<Mutex<ActiveMap>>,
}

impl RequestTicket {
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Error out if a newer request took this slot
    pub fn ensure_current(&self) -> AppResult<()> {
        if self.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Run a future unless this request gets cancelled first
    pub async fn guard<F, T>(&self, fut: F) -> AppResult<T>
    where
        F: Future<Output = AppResult<T>>,
    {
        tokio::select! {
            biased;
            _ = self.token.cancelled() => {
                debug!("Request {} for {:?} cancelled", self.id, self.key);
                Err(Error::Cancelled)
            }
            result = fut => result,
        }
    }
}

impl Drop for RequestTicket {
    fn drop(&mut self) {
        let mut active = self
            .active
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if active.get(&self.key).map(|(id, _)| *id) == Some(self.id) {
            active.remove(&self.key);
        }
    }
}

use parking_lot::Mutex;
use sip_core::IncomingRequest;
use slotmap::{Key, SlotMap};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Notify, mpsc};

slotmap::new_key_type! {
    /// Identifies an active session inside the [`SessionRegistry`]
    pub struct SessionId;
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session-{:x}", self.data().as_ffi())
    }
}

/// Interruption state of one session, shared by its task, handle and registry entry
#[derive(Debug, Default)]
pub(crate) struct Interrupt {
    flag: AtomicBool,
    abort: Notify,
}

impl Interrupt {
    /// Suppress further events and the outcome, the session keeps running
    pub(crate) fn set(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    /// Interrupt and wake an established session so it ends itself
    pub(crate) fn abort(&self) {
        self.set();
        self.abort.notify_one();
    }

    pub(crate) fn is_set(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }

    /// Resolves once [`Interrupt::abort`] was called, also if that happened before
    pub(crate) async fn aborted(&self) {
        self.abort.notified().await;
    }
}

struct Entry {
    call_id: String,
    requests: mpsc::UnboundedSender<IncomingRequest>,
    interrupt: Arc<Interrupt>,
}

#[derive(Default)]
struct Sessions {
    entries: SlotMap<SessionId, Entry>,
    by_call_id: HashMap<String, SessionId>,
}

/// All active sessions, shared between the [`SessionManager`](super::SessionManager) and
/// the [`SessionLayer`](super::SessionLayer) which routes in-dialog requests by Call-ID.
#[derive(Clone, Default)]
pub struct SessionRegistry {
    sessions: Arc<Mutex<Sessions>>,
}

impl fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionRegistry")
            .field("active", &self.len())
            .finish()
    }
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a session, requests with its Call-ID are routed to the returned registration
    pub(crate) fn register(&self, call_id: &str) -> Registration {
        let (sender, requests) = mpsc::unbounded_channel();
        let interrupt = Arc::new(Interrupt::default());

        let mut sessions = self.sessions.lock();

        let id = sessions.entries.insert(Entry {
            call_id: call_id.to_owned(),
            requests: sender,
            interrupt: interrupt.clone(),
        });

        if let Some(previous) = sessions.by_call_id.insert(call_id.to_owned(), id) {
            log::warn!("{previous} with call-id {call_id} replaced by {id}");
        }

        Registration {
            registry: self.clone(),
            id,
            requests,
            interrupt,
            released: false,
        }
    }

    /// Sender feeding requests to the session with `call_id`
    pub(crate) fn route(&self, call_id: &str) -> Option<mpsc::UnboundedSender<IncomingRequest>> {
        let sessions = self.sessions.lock();

        let id = sessions.by_call_id.get(call_id)?;

        sessions
            .entries
            .get(*id)
            .map(|entry| entry.requests.clone())
    }

    fn remove(&self, id: SessionId) {
        let mut sessions = self.sessions.lock();

        let Some(entry) = sessions.entries.remove(id) else {
            return;
        };

        if sessions.by_call_id.get(&entry.call_id) == Some(&id) {
            sessions.by_call_id.remove(&entry.call_id);
        }
    }

    /// Interrupt every session, returns how many were interrupted.
    ///
    /// Established sessions end with a BYE and leave the registry, sessions still being
    /// set up leave it once their pending wait resolves.
    pub fn interrupt_all(&self) -> usize {
        let sessions = self.sessions.lock();

        for entry in sessions.entries.values() {
            entry.interrupt.abort();
        }

        sessions.entries.len()
    }

    pub fn contains(&self, id: SessionId) -> bool {
        self.sessions.lock().entries.contains_key(id)
    }

    pub fn ids(&self) -> Vec<SessionId> {
        self.sessions.lock().entries.keys().collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Membership of one session in the registry, removed on release or drop
pub(crate) struct Registration {
    registry: SessionRegistry,
    id: SessionId,
    pub(crate) requests: mpsc::UnboundedReceiver<IncomingRequest>,
    pub(crate) interrupt: Arc<Interrupt>,
    released: bool,
}

impl Registration {
    pub(crate) fn id(&self) -> SessionId {
        self.id
    }

    pub(crate) fn is_interrupted(&self) -> bool {
        self.interrupt.is_set()
    }

    pub(crate) fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.registry.remove(self.id);
        }
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("id", &self.id)
            .field("released", &self.released)
            .finish()
    }
}

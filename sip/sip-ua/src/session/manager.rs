use super::handle::SessionHandle;
use super::layer::{IncomingSession, SessionLayer};
use super::registry::{Registration, SessionRegistry};
use super::task::SessionTask;
use super::{Admission, AdmissionPolicy, MaxSessions, SessionKind};
use crate::config::{Identity, SessionConfig};
use crate::dialog::DialogPath;
use crate::util::random_call_id;
use sip_core::Endpoint;
use sip_types::header::typed::{CallID, Contact};
use sip_types::uri::{NameAddr, Uri};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot};

const EVENT_CAPACITY: usize = 16;

/// Runs INVITE sessions of any [`SessionKind`] on top of an [`Endpoint`].
///
/// The endpoint must contain a [`SessionLayer`].
#[derive(Debug, Clone)]
pub struct SessionManager {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    endpoint: Endpoint,
    identity: Identity,
    config: SessionConfig,
    registry: SessionRegistry,
    contact: Contact,
}

impl SessionManager {
    /// Panics if the endpoint has no [`SessionLayer`]
    pub fn new(endpoint: Endpoint, identity: Identity, config: SessionConfig) -> Self {
        let registry = endpoint.layer::<SessionLayer>().registry().clone();
        let contact = Contact::new(NameAddr::uri(identity.contact_uri(endpoint.sent_by())));

        Self {
            inner: Arc::new(Inner {
                endpoint,
                identity,
                config,
                registry,
                contact,
            }),
        }
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.inner.endpoint
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.inner.registry
    }

    /// Number of sessions being set up or established
    pub fn active_sessions(&self) -> usize {
        self.inner.registry.len()
    }

    /// Send an INVITE to `remote` and run the session in the background
    pub fn start_originating<K: SessionKind>(&self, kind: K, remote: Uri) -> SessionHandle {
        let inner = &self.inner;

        let host = inner.endpoint.sent_by().ip().to_string();
        let call_id = random_call_id(&host);

        let dialog = DialogPath::originating(
            CallID::new(call_id.clone()),
            inner.identity.name_addr(),
            NameAddr::uri(remote.clone()),
            remote,
            inner.contact.clone(),
            inner.config.service_route.clone(),
        );

        let registration = inner.registry.register(&call_id);

        log::debug!(
            "starting {} {} to {}",
            kind.name(),
            registration.id(),
            dialog.target()
        );

        let (task, handle) = self.create_task(Box::new(kind), registration, call_id);

        tokio::spawn(task.run_originating(dialog));

        handle
    }

    /// Run the terminating side of an incoming session in the background.
    ///
    /// The INVITE is answered with 180 Ringing right away, the session then waits for
    /// [`SessionHandle::accept`] or [`SessionHandle::reject`].
    pub fn accept_incoming<K: SessionKind>(
        &self,
        kind: K,
        incoming: IncomingSession,
    ) -> SessionHandle {
        let IncomingSession {
            invite,
            registration,
        } = incoming;

        let call_id = invite.base_headers.call_id.0.clone();

        log::debug!("accepting {} as {}", registration.id(), kind.name());

        let (task, handle) = self.create_task(Box::new(kind), registration, call_id);

        tokio::spawn(task.run_terminating(invite));

        handle
    }

    /// Decide whether an incoming session may proceed.
    ///
    /// The configured session limit is checked before `policy`. A rejected INVITE is
    /// answered with the admission's status code here, the `IncomingSession` must then be
    /// dropped.
    pub async fn admit(
        &self,
        incoming: &IncomingSession,
        policy: &impl AdmissionPolicy,
    ) -> Admission {
        // The incoming session itself is already registered
        let active = self.inner.registry.len().saturating_sub(1);

        let mut admission = match self.inner.config.max_sessions {
            Some(max) => MaxSessions(max).admit(&incoming.invite, active),
            None => Admission::Accept,
        };

        if admission == Admission::Accept {
            admission = policy.admit(&incoming.invite, active);
        }

        let Some(code) = admission.rejection_code() else {
            return admission;
        };

        log::info!(
            "rejecting {} with {code}, {admission:?} ({active} active)",
            incoming.id()
        );

        let endpoint = &self.inner.endpoint;
        let response = endpoint.create_response(&incoming.invite, code, None);

        if let Err(e) = endpoint.send_response(&incoming.invite, response).await {
            log::warn!("failed to reject {}, {e}", incoming.id());
        }

        admission
    }

    /// Interrupt every session, e.g. when the network connection is lost.
    ///
    /// Interrupted sessions never deliver their outcome or further events. Established
    /// sessions send a best effort BYE and leave the registry.
    pub fn abort_all(&self) -> usize {
        let count = self.inner.registry.interrupt_all();

        if count > 0 {
            log::info!("interrupted {count} sessions");
        }

        count
    }

    fn create_task(
        &self,
        kind: Box<dyn SessionKind>,
        registration: Registration,
        call_id: bytesstr::BytesStr,
    ) -> (SessionTask, SessionHandle) {
        let (outcome_tx, outcome_rx) = oneshot::channel();
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();

        let handle = SessionHandle::new(
            registration.id(),
            call_id,
            outcome_rx,
            events.clone(),
            commands_tx,
            registration.interrupt.clone(),
        );

        let task = SessionTask::new(
            self.inner.endpoint.clone(),
            self.inner.identity.clone(),
            self.inner.config.clone(),
            self.inner.contact.clone(),
            kind,
            registration,
            commands_rx,
            events,
            outcome_tx,
        );

        (task, handle)
    }
}

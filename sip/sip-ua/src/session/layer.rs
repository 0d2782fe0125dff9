use super::registry::{Registration, SessionId, SessionRegistry};
use sip_core::{Endpoint, EndpointBuilder, IncomingRequest, Layer, MayTake};
use sip_types::{Code, Method};
use std::fmt;
use tokio::sync::mpsc;

/// Endpoint layer which routes requests to the sessions they belong to.
///
/// Requests are matched by Call-ID. New INVITEs are registered as sessions and handed out
/// through [`IncomingSessions`], requests for unknown dialogs are answered with 481.
pub struct SessionLayer {
    registry: SessionRegistry,
    incoming: mpsc::UnboundedSender<IncomingSession>,
}

/// Receiver of new incoming INVITEs
#[derive(Debug)]
pub struct IncomingSessions {
    receiver: mpsc::UnboundedReceiver<IncomingSession>,
}

impl IncomingSessions {
    pub async fn recv(&mut self) -> Option<IncomingSession> {
        self.receiver.recv().await
    }
}

/// An INVITE starting a new session.
///
/// Pass it to [`SessionManager::admit`](super::SessionManager::admit) and
/// [`SessionManager::accept_incoming`](super::SessionManager::accept_incoming).
/// Dropping it without either leaves the INVITE unanswered.
pub struct IncomingSession {
    pub(crate) invite: IncomingRequest,
    pub(crate) registration: Registration,
}

impl fmt::Debug for IncomingSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IncomingSession")
            .field("id", &self.registration.id())
            .field("invite", &self.invite.line)
            .finish()
    }
}

impl IncomingSession {
    pub fn id(&self) -> SessionId {
        self.registration.id()
    }

    pub fn invite(&self) -> &IncomingRequest {
        &self.invite
    }
}

impl SessionLayer {
    pub fn new() -> (Self, IncomingSessions) {
        let (incoming, receiver) = mpsc::unbounded_channel();

        (
            Self {
                registry: SessionRegistry::new(),
                incoming,
            },
            IncomingSessions { receiver },
        )
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    async fn respond(endpoint: &Endpoint, request: &IncomingRequest, code: Code) {
        let response = endpoint.create_response(request, code, None);

        if let Err(e) = endpoint.send_response(request, response).await {
            log::warn!("failed to respond {code} to {request}, {e}");
        }
    }
}

#[async_trait::async_trait]
impl Layer for SessionLayer {
    fn name(&self) -> &'static str {
        "session"
    }

    fn init(&mut self, endpoint: &mut EndpointBuilder) {
        endpoint.add_allow(Method::INVITE);
        endpoint.add_allow(Method::ACK);
        endpoint.add_allow(Method::CANCEL);
        endpoint.add_allow(Method::BYE);
    }

    async fn receive(&self, endpoint: &Endpoint, request: MayTake<'_, IncomingRequest>) {
        let call_id = request.base_headers.call_id.0.clone();

        if let Some(session) = self.registry.route(&call_id) {
            if let Err(e) = session.send(request.take()) {
                let request = e.0;

                log::debug!("session of {request} ended while routing");
                if request.line.method != Method::ACK {
                    Self::respond(endpoint, &request, Code::CALL_OR_TRANSACTION_DOES_NOT_EXIST)
                        .await;
                }
            }

            return;
        }

        let in_dialog = request.base_headers.to.tag.is_some();
        let method = request.line.method.clone();

        if method == Method::INVITE && !in_dialog {
            let invite = request.take();
            let registration = self.registry.register(&call_id);

            log::debug!("new incoming {} for {}", registration.id(), invite);

            if let Err(e) = self.incoming.send(IncomingSession {
                invite,
                registration,
            }) {
                let IncomingSession {
                    invite,
                    registration,
                } = e.0;

                // Release before responding so the session count is accurate
                drop(registration);
                Self::respond(endpoint, &invite, Code::TEMPORARILY_UNAVAILABLE).await;
            }

            return;
        }

        if method == Method::ACK {
            // Left to the endpoint which drops it
            return;
        }

        if in_dialog || method == Method::CANCEL || method == Method::BYE {
            let request = request.take();

            log::debug!("no session for {request} with call-id {call_id}");
            Self::respond(endpoint, &request, Code::CALL_OR_TRANSACTION_DOES_NOT_EXIST).await;
        }
    }
}

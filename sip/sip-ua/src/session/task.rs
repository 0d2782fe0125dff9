use super::registry::Registration;
use super::{Command, Outcome, SessionEvent, SessionKind};
use crate::config::{Identity, SessionConfig};
use crate::dialog::DialogPath;
use sip_core::{Endpoint, IncomingRequest};
use sip_types::Code;
use sip_types::header::typed::Contact;
use tokio::sync::{broadcast, mpsc, oneshot};

/// State of one running session, owned by its task
pub(crate) struct SessionTask {
    pub(crate) endpoint: Endpoint,
    pub(crate) identity: Identity,
    pub(crate) config: SessionConfig,
    pub(crate) contact: Contact,

    pub(crate) kind: Box<dyn SessionKind>,
    pub(crate) registration: Registration,
    pub(crate) commands: mpsc::UnboundedReceiver<Command>,

    events: broadcast::Sender<SessionEvent>,
    outcome: Option<oneshot::Sender<Outcome>>,
}

impl SessionTask {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        endpoint: Endpoint,
        identity: Identity,
        config: SessionConfig,
        contact: Contact,
        kind: Box<dyn SessionKind>,
        registration: Registration,
        commands: mpsc::UnboundedReceiver<Command>,
        events: broadcast::Sender<SessionEvent>,
        outcome: oneshot::Sender<Outcome>,
    ) -> Self {
        Self {
            endpoint,
            identity,
            config,
            contact,
            kind,
            registration,
            commands,
            events,
            outcome: Some(outcome),
        }
    }

    pub(crate) fn is_interrupted(&self) -> bool {
        self.registration.is_interrupted()
    }

    /// Publish an event unless the session was interrupted
    pub(crate) fn publish(&self, event: SessionEvent) {
        if self.is_interrupted() {
            return;
        }

        // No subscribers is fine
        let _ = self.events.send(event);
    }

    /// Deliver the outcome of the attempt.
    ///
    /// Only the first call has an effect. Sessions that did not get established leave the
    /// registry before the outcome is visible. Interrupted sessions deliver nothing.
    pub(crate) fn finish(&mut self, outcome: Outcome) {
        let Some(sender) = self.outcome.take() else {
            log::warn!(
                "{} already finished, dropping {outcome:?}",
                self.registration.id()
            );
            return;
        };

        if outcome != Outcome::Established {
            self.registration.release();
        }

        if self.is_interrupted() {
            log::debug!(
                "{} interrupted, suppressing {outcome:?}",
                self.registration.id()
            );
            return;
        }

        log::info!(
            "{} {} finished with {outcome:?}",
            self.kind.name(),
            self.registration.id()
        );

        self.publish(SessionEvent::Outcome(outcome.clone()));

        // The handle may have been dropped
        let _ = sender.send(outcome);
    }

    /// Best effort response to a request, failures are logged
    pub(crate) async fn respond(&self, request: &IncomingRequest, code: Code) {
        let response = self.endpoint.create_response(request, code, None);

        if let Err(e) = self.endpoint.send_response(request, response).await {
            log::warn!("failed to respond {code} to {request}, {e}");
        }
    }

    /// Respond 405 with the methods allowed inside the dialog
    pub(crate) async fn respond_not_allowed(&self, request: &IncomingRequest) {
        let mut response =
            self.endpoint
                .create_response(request, Code::METHOD_NOT_ALLOWED, None);

        for allow in self.endpoint.allowed() {
            response.headers.insert_named(allow);
        }

        if let Err(e) = self.endpoint.send_response(request, response).await {
            log::warn!("failed to respond 405 to {request}, {e}");
        }
    }

    /// Send a BYE and wait for its response, the result only gets logged
    pub(crate) async fn send_bye(&self, dialog: &mut DialogPath) {
        let bye = dialog.create_request(sip_types::Method::BYE);

        let mut pending = match self.endpoint.send_request(bye).await {
            Ok(pending) => pending,
            Err(e) => {
                log::warn!("failed to send BYE, {e}");
                return;
            }
        };

        match self
            .endpoint
            .transactions()
            .await_response(&mut pending, self.config.transaction_timeout)
            .await
        {
            Some(response) => log::debug!("BYE answered with {response}"),
            None => log::debug!("BYE not answered"),
        }
    }
}

use super::registry::Interrupt;
use super::{Command, Outcome, SessionEvent, SessionId};
use bytesstr::BytesStr;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot};

/// Handle to a session running inside the [`SessionManager`](super::SessionManager)
#[derive(Debug)]
pub struct SessionHandle {
    id: SessionId,
    call_id: BytesStr,
    outcome: Option<oneshot::Receiver<Outcome>>,
    events: broadcast::Sender<SessionEvent>,
    commands: mpsc::UnboundedSender<Command>,
    interrupt: Arc<Interrupt>,
}

impl SessionHandle {
    pub(crate) fn new(
        id: SessionId,
        call_id: BytesStr,
        outcome: oneshot::Receiver<Outcome>,
        events: broadcast::Sender<SessionEvent>,
        commands: mpsc::UnboundedSender<Command>,
        interrupt: Arc<Interrupt>,
    ) -> Self {
        Self {
            id,
            call_id,
            outcome: Some(outcome),
            events,
            commands,
            interrupt,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn call_id(&self) -> &BytesStr {
        &self.call_id
    }

    /// Wait for the outcome of the attempt.
    ///
    /// Resolves once. Returns `None` if the outcome was already taken or the session
    /// was interrupted before it ended. Cancel safe.
    pub async fn outcome(&mut self) -> Option<Outcome> {
        let receiver = self.outcome.as_mut()?;
        let outcome = receiver.await.ok();
        self.outcome = None;
        outcome
    }

    /// Receive the events of the session from now on
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Accept a ringing incoming session
    pub fn accept(&self) {
        self.command(Command::Accept);
    }

    /// Decline a ringing incoming session with 603
    pub fn reject(&self) {
        self.command(Command::Reject);
    }

    /// End the session, with CANCEL while it is being set up or BYE once established
    pub fn terminate(&self) {
        self.command(Command::Terminate);
    }

    /// Mark the session as interrupted.
    ///
    /// The session keeps running until its pending wait resolves but no longer publishes
    /// events or an outcome.
    pub fn interrupt(&self) {
        self.interrupt.set();
    }

    pub fn is_interrupted(&self) -> bool {
        self.interrupt.is_set()
    }

    fn command(&self, command: Command) {
        if self.commands.send(command).is_err() {
            log::debug!("{} already ended", self.id);
        }
    }
}

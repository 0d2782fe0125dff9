use super::DialogPath;
use std::fmt;

/// Lifecycle of a [`DialogPath`].
///
/// Moves forward only: `Initial → SignalingEstablished → SessionEstablished`, with
/// `Cancelled`, `Terminated` and `TerminatedByRemote` as terminal states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialogState {
    Initial,
    SignalingEstablished,
    SessionEstablished,
    Cancelled,
    Terminated,
    TerminatedByRemote,
}

impl DialogState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            DialogState::Cancelled | DialogState::Terminated | DialogState::TerminatedByRemote
        )
    }
}

impl fmt::Display for DialogState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DialogState::Initial => "initial",
            DialogState::SignalingEstablished => "signaling-established",
            DialogState::SessionEstablished => "session-established",
            DialogState::Cancelled => "cancelled",
            DialogState::Terminated => "terminated",
            DialogState::TerminatedByRemote => "terminated-by-remote",
        };

        f.write_str(name)
    }
}

impl DialogPath {
    fn transition(&mut self, valid: &[DialogState], next: DialogState) {
        assert!(
            valid.contains(&self.state),
            "invalid dialog transition {} -> {next} (call-id {})",
            self.state,
            self.call_id.0
        );

        log::trace!("dialog {} {} -> {next}", self.call_id.0, self.state);

        self.state = next;
    }

    /// The INVITE has been answered with a 2xx
    ///
    /// # Panics
    ///
    /// If the dialog is not in the `Initial` state
    pub fn signaling_established(&mut self) {
        self.transition(&[DialogState::Initial], DialogState::SignalingEstablished);
    }

    /// The 2xx has been acknowledged
    ///
    /// # Panics
    ///
    /// If signaling has not been established before
    pub fn session_established(&mut self) {
        self.transition(
            &[DialogState::SignalingEstablished],
            DialogState::SessionEstablished,
        );
    }

    /// # Panics
    ///
    /// If the dialog left the `Initial` state
    pub fn cancelled(&mut self) {
        self.transition(&[DialogState::Initial], DialogState::Cancelled);
    }

    /// # Panics
    ///
    /// If the dialog is already in a terminal state
    pub fn terminated(&mut self) {
        self.transition(
            &[
                DialogState::Initial,
                DialogState::SignalingEstablished,
                DialogState::SessionEstablished,
            ],
            DialogState::Terminated,
        );
    }

    /// # Panics
    ///
    /// If signaling was never established or the dialog is already terminated
    pub fn terminated_by_remote(&mut self) {
        self.transition(
            &[
                DialogState::SignalingEstablished,
                DialogState::SessionEstablished,
            ],
            DialogState::TerminatedByRemote,
        );
    }

    pub fn state(&self) -> DialogState {
        self.state
    }

    pub fn is_signaling_established(&self) -> bool {
        matches!(
            self.state,
            DialogState::SignalingEstablished | DialogState::SessionEstablished
        )
    }

    pub fn is_session_established(&self) -> bool {
        self.state == DialogState::SessionEstablished
    }

    pub fn is_terminated(&self) -> bool {
        self.state.is_terminal()
    }
}

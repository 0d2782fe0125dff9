//! Session establishment shared by every RCS service.
//!
//! A session type (chat, content sharing, IP call, ...) only describes its media through
//! [`SessionKind`], the INVITE exchange itself is run by the [`SessionManager`].

use crate::dialog::DialogPath;
use bytes::Bytes;
use bytesstr::BytesStr;
use sdp_types::{
    LocalMedia, MediaDescription, NegotiatedMedia, NoCommonMedia, ParseSessionDescriptionError,
    SessionDescription,
};
use sip_core::Request;
use sip_types::Code;
use sip_types::header::HeaderError;
use sip_types::header::typed::ContentType;
use std::fmt;

mod admission;
mod established;
mod handle;
mod layer;
mod manager;
mod originating;
mod registry;
mod task;
mod terminating;

pub use admission::{Admission, AdmissionPolicy, MaxSessions};
pub use handle::SessionHandle;
pub use layer::{IncomingSession, IncomingSessions, SessionLayer};
pub use manager::SessionManager;
pub use registry::{SessionId, SessionRegistry};

pub(crate) const CONTENT_TYPE_SDP: &str = "application/sdp";

/// Describes the media of one kind of session.
///
/// Implemented per service, the manager calls into it at the points where the
/// INVITE exchange needs service specific data.
pub trait SessionKind: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    /// Media types and formats supported locally, used to negotiate offers and answers
    fn local_media(&self) -> Vec<LocalMedia>;

    /// Add service specific headers to the initial INVITE and return the SDP offer
    fn build_initial_request(&mut self, request: &mut Request) -> Result<Bytes, SessionError>;

    /// Build the SDP answer for an accepted incoming session
    fn build_answer(&mut self, negotiated: &[NegotiatedMedia]) -> Result<Bytes, SessionError>;

    /// The dialog reached the session established state
    fn on_established(&mut self, dialog: &DialogPath) {
        let _ = dialog;
    }

    /// Called once per negotiated media with the remote end's address
    fn on_media_ready(&mut self, media: MediaReady) {
        let _ = media;
    }
}

/// Negotiated media handed to the media layer once the session is established
#[derive(Debug, Clone)]
pub struct MediaReady {
    pub host: String,
    pub port: u16,
    /// Format selected from the local candidates
    pub format: BytesStr,
    pub media: MediaDescription,
}

/// Terminal result of a session attempt, delivered exactly once
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Established,
    /// The remote user declined (603)
    Declined,
    /// Cancelled before it was established (487)
    Cancelled,
    Failed(Failure),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Failure {
    /// No final response or ACK arrived in time
    Timeout,
    /// Final non-2xx response
    Rejected {
        code: Code,
        reason: Option<BytesStr>,
    },
    /// Malformed message or SDP, or a local error
    Local(String),
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Failure::Timeout => f.write_str("timed out"),
            Failure::Rejected {
                code,
                reason: Some(reason),
            } => write!(f, "rejected with {} {reason}", code.into_u16()),
            Failure::Rejected { code, reason: None } => write!(f, "rejected with {code}"),
            Failure::Local(error) => write!(f, "local error, {error}"),
        }
    }
}

impl Outcome {
    pub(crate) fn local(error: impl fmt::Display) -> Self {
        Outcome::Failed(Failure::Local(error.to_string()))
    }

    pub(crate) fn rejected(code: Code, reason: Option<BytesStr>) -> Self {
        Outcome::Failed(Failure::Rejected { code, reason })
    }
}

/// Events published to every subscriber of a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// The remote side is alerting, or an incoming session started ringing
    Ringing,
    /// The attempt ended, carries the same value as [`SessionHandle::outcome`]
    Outcome(Outcome),
    /// An established session received a BYE
    TerminatedByRemote,
    /// An established session was ended locally
    Terminated,
}

/// Error raised while building or processing session messages.
///
/// Ends the attempt with [`Outcome::Failed`].
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Core(#[from] sip_core::Error),
    #[error(transparent)]
    Header(#[from] HeaderError),
    #[error("message has no SDP body")]
    MissingSdp,
    #[error("unsupported body type {0}")]
    UnsupportedContent(BytesStr),
    #[error("SDP body is not valid UTF-8")]
    InvalidUtf8(#[from] std::str::Utf8Error),
    #[error(transparent)]
    InvalidSdp(#[from] ParseSessionDescriptionError),
    #[error(transparent)]
    NoCommonMedia(#[from] NoCommonMedia),
    #[error(transparent)]
    Auth(#[from] sip_auth::DigestError),
    #[error("{0}")]
    Kind(String),
}

impl SessionError {
    /// Error raised by a [`SessionKind`] implementation
    pub fn kind(error: impl fmt::Display) -> Self {
        SessionError::Kind(error.to_string())
    }
}

/// Parse the SDP body of a message
pub(crate) fn parse_sdp(
    headers: &sip_types::Headers,
    body: &Bytes,
) -> Result<SessionDescription, SessionError> {
    if body.is_empty() {
        return Err(SessionError::MissingSdp);
    }

    if let Some(content_type) = headers.try_get_named::<ContentType>() {
        let content_type = content_type?;

        if !content_type.is(CONTENT_TYPE_SDP) {
            return Err(SessionError::UnsupportedContent(content_type.0));
        }
    }

    let sdp = BytesStr::from_utf8_bytes(body.clone())?;

    Ok(SessionDescription::parse(&sdp)?)
}

/// Pair negotiated media with the address they must be sent to
pub(crate) fn media_ready(
    sdp: &SessionDescription,
    negotiated: &[NegotiatedMedia],
) -> Vec<MediaReady> {
    negotiated
        .iter()
        .map(|negotiated| {
            let host = match sdp.connection_for(&negotiated.remote) {
                Some(connection) => connection.address.host(),
                None => sdp.origin.address.host(),
            };

            MediaReady {
                host,
                port: negotiated.remote.media.port,
                format: negotiated.format.clone(),
                media: negotiated.remote.clone(),
            }
        })
        .collect()
}

/// Commands a [`SessionHandle`] sends to the session task
#[derive(Debug)]
pub(crate) enum Command {
    Accept,
    Reject,
    Terminate,
}

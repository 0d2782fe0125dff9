//! # RCS session signaling
//!
//! Establishes, negotiates and tears down the INVITE sessions used by RCS services and
//! discovers the capabilities of peers with OPTIONS.
//!
//! Notable types are
//!
//! - [`SessionManager`] starts outgoing sessions and runs incoming ones, parameterized by a [`SessionKind`]
//! - [`SessionHandle`] delivers the single [`Outcome`] of an attempt and a stream of [`SessionEvent`]s
//! - [`SessionLayer`] routes incoming requests to their sessions
//! - [`capability::CapabilityClient`] and [`capability::CapabilityLayer`] query and answer capabilities
//!
//! The modules [`dialog`] and [`util`] contain implementation details used inside the top level
//! abstractions and can be used for more specialized use cases.

pub mod capability;
pub mod dialog;
pub mod session;
pub mod util;

mod config;

pub use config::{Identity, SessionConfig};
pub use session::{
    Admission, AdmissionPolicy, Failure, IncomingSession, IncomingSessions, MaxSessions,
    MediaReady, Outcome, SessionError, SessionEvent, SessionHandle, SessionId, SessionKind,
    SessionLayer, SessionManager, SessionRegistry,
};

//! Typed representations of the headers used by the engine

mod auth;
mod call_id;
mod contact;
mod cseq;
mod from_to;
mod lists;
mod misc;
mod routing;
mod via;

pub use auth::{
    Algorithm, AuthChallenge, AuthParams, AuthResponse, AuthenticationInfo, DigestChallenge,
    DigestResponse, ProxyAuthenticate, ProxyAuthorization, QopOption, WWWAuthenticate,
    Authorization,
};
pub use call_id::CallID;
pub use contact::{AcceptContact, Contact};
pub use cseq::CSeq;
pub use from_to::FromTo;
pub use lists::{Accept, Allow, Require, Supported};
pub use misc::{ContentLength, ContentType, Expires, MaxForwards, Server, Subject, UserAgent};
pub use routing::Routing;
pub use via::Via;

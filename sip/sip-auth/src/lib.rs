//! Digest authentication for outgoing SIP requests.
//!
//! An [`AuthAgent`] belongs to a single request attempt. It reads the challenge of a 401/407
//! response and writes the matching credentials into the retried request.

use sip_types::Headers;
use sip_types::msg::{RequestLine, StatusLine};

mod digest;

pub use digest::{AuthAgent, DigestError, DigestUser};

/// Information about the request that has to be authenticated
#[derive(Debug, Clone, Copy)]
pub struct RequestParts<'s> {
    pub line: &'s RequestLine,
    pub body: &'s [u8],
}

/// Information about a response which may carry a challenge or `Authentication-Info`
#[derive(Debug, Clone, Copy)]
pub struct ResponseParts<'s> {
    pub line: &'s StatusLine,
    pub headers: &'s Headers,
}

use crate::BaseHeaders;
use bytesstr::BytesStr;
use sip_types::header::HeaderError;
use sip_types::header::typed::{CSeq, CallID};
use sip_types::{Headers, Method};
use std::fmt;

/// Identifies a transaction context inside the [`TransactionManager`](super::TransactionManager).
///
/// Built from `Call-ID`, the `CSeq` number and method. An `ACK` maps onto the key of the
/// `INVITE` it acknowledges, so it reaches the context that retransmits the 2xx.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TsxKey {
    pub call_id: BytesStr,
    pub cseq: u32,
    pub method: Method,
}

impl fmt::Display for TsxKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.call_id, self.cseq, self.method)
    }
}

impl TsxKey {
    pub fn new(call_id: impl Into<BytesStr>, cseq: u32, method: Method) -> Self {
        let method = if method == Method::ACK {
            Method::INVITE
        } else {
            method
        };

        Self {
            call_id: call_id.into(),
            cseq,
            method,
        }
    }

    pub fn from_headers(headers: &Headers) -> Result<Self, HeaderError> {
        let CallID(call_id) = headers.get_named()?;
        let CSeq { cseq, method } = headers.get_named()?;

        Ok(Self::new(call_id, cseq, method))
    }

    pub fn from_base_headers(base_headers: &BaseHeaders) -> Self {
        Self::new(
            base_headers.call_id.0.clone(),
            base_headers.cseq.cseq,
            base_headers.cseq.method.clone(),
        )
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use sip_types::Name;

    #[test]
    fn ack_maps_to_invite() {
        let mut headers = Headers::new();
        headers.insert(Name::CALL_ID, "abc");
        headers.insert(Name::CSEQ, "3 ACK");

        let key = TsxKey::from_headers(&headers).unwrap();

        assert_eq!(key, TsxKey::new("abc", 3, Method::INVITE));
        assert_ne!(key, TsxKey::new("abc", 3, Method::CANCEL));
    }

    #[test]
    fn missing_cseq() {
        let mut headers = Headers::new();
        headers.insert(Name::CALL_ID, "abc");

        assert!(TsxKey::from_headers(&headers).is_err());
    }
}

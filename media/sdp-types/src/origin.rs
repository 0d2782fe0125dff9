use crate::{TaggedAddress, not_whitespace};
use bytes::Bytes;
use bytesstr::BytesStr;
use internal::{IResult, ws};
use nom::bytes::complete::take_while1;
use nom::combinator::map;
use nom::error::context;
use std::fmt;

/// Origin field (`o=`)
///
/// [RFC8866](https://www.rfc-editor.org/rfc/rfc8866.html#section-5.2)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Origin {
    pub username: BytesStr,
    pub session_id: BytesStr,
    /// Incremented with every modified offer or answer
    pub session_version: BytesStr,
    pub address: TaggedAddress,
}

impl Origin {
    pub fn parse<'i>(src: &Bytes, i: &'i str) -> IResult<&'i str, Self> {
        context(
            "origin",
            map(
                ws((
                    take_while1(not_whitespace),
                    take_while1(not_whitespace),
                    take_while1(not_whitespace),
                    |i| TaggedAddress::parse(src, i),
                )),
                |(username, session_id, session_version, address)| Origin {
                    username: BytesStr::from_parse(src, username),
                    session_id: BytesStr::from_parse(src, session_id),
                    session_version: BytesStr::from_parse(src, session_version),
                    address,
                },
            ),
        )(i)
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {}",
            self.username, self.session_id, self.session_version, self.address
        )
    }
}

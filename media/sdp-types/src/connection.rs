use crate::{TaggedAddress, slash_num};
use bytes::Bytes;
use internal::IResult;
use nom::combinator::opt;
use nom::sequence::pair;
use std::fmt;

/// Connection field (`c=`)
///
/// [RFC8866](https://www.rfc-editor.org/rfc/rfc8866.html#section-5.7)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connection {
    pub address: TaggedAddress,
    /// Multicast TTL, IPv4 only
    pub ttl: Option<u32>,
    pub num: Option<u32>,
}

impl Connection {
    pub fn new(address: TaggedAddress) -> Self {
        Self {
            address,
            ttl: None,
            num: None,
        }
    }

    pub fn parse<'i>(src: &Bytes, i: &'i str) -> IResult<&'i str, Self> {
        let (i, address) = TaggedAddress::parse(src, i)?;

        match address {
            TaggedAddress::IP4(_) | TaggedAddress::IP4FQDN(_) => {
                let (i, ttl_num) = opt(pair(slash_num, opt(slash_num)))(i)?;
                let (ttl, num) = ttl_num.map_or((None, None), |(ttl, num)| (Some(ttl), num));

                Ok((i, Connection { address, ttl, num }))
            }
            TaggedAddress::IP6(_) | TaggedAddress::IP6FQDN(_) => {
                let (i, num) = opt(slash_num)(i)?;

                Ok((
                    i,
                    Connection {
                        address,
                        ttl: None,
                        num,
                    },
                ))
            }
        }
    }
}

impl fmt::Display for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.address)?;

        if let Some(ttl) = self.ttl {
            write!(f, "/{ttl}")?;
        }

        if let Some(num) = self.num {
            write!(f, "/{num}")?;
        }

        Ok(())
    }
}

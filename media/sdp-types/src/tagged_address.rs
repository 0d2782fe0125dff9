use crate::{probe_host, probe_host6};
use bytes::Bytes;
use bytesstr::BytesStr;
use internal::IResult;
use nom::branch::alt;
use nom::bytes::complete::{tag, take_while1};
use nom::combinator::map;
use nom::error::context;
use nom::sequence::preceded;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

/// `IN IP4 <addr>` / `IN IP6 <addr>` as used by origin and connection fields
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaggedAddress {
    IP4(Ipv4Addr),
    IP4FQDN(BytesStr),
    IP6(Ipv6Addr),
    IP6FQDN(BytesStr),
}

impl TaggedAddress {
    pub fn parse<'i>(src: &Bytes, i: &'i str) -> IResult<&'i str, Self> {
        context(
            "tagged address",
            alt((
                preceded(
                    tag("IN IP4 "),
                    map(take_while1(probe_host), |host: &str| match host.parse() {
                        Ok(ip) => Self::IP4(ip),
                        Err(_) => Self::IP4FQDN(BytesStr::from_parse(src, host)),
                    }),
                ),
                preceded(
                    tag("IN IP6 "),
                    map(take_while1(probe_host6), |host: &str| match host.parse() {
                        Ok(ip) => Self::IP6(ip),
                        Err(_) => Self::IP6FQDN(BytesStr::from_parse(src, host)),
                    }),
                ),
            )),
        )(i)
    }

    /// Host part without the network and address type
    pub fn host(&self) -> String {
        match self {
            Self::IP4(ip) => ip.to_string(),
            Self::IP6(ip) => ip.to_string(),
            Self::IP4FQDN(host) | Self::IP6FQDN(host) => host.to_string(),
        }
    }
}

impl From<IpAddr> for TaggedAddress {
    fn from(ip: IpAddr) -> Self {
        match ip {
            IpAddr::V4(ip) => Self::IP4(ip),
            IpAddr::V6(ip) => Self::IP6(ip),
        }
    }
}

impl fmt::Display for TaggedAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IP4(ip) => write!(f, "IN IP4 {ip}"),
            Self::IP4FQDN(host) => write!(f, "IN IP4 {host}"),
            Self::IP6(ip) => write!(f, "IN IP6 {ip}"),
            Self::IP6FQDN(host) => write!(f, "IN IP6 {host}"),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn ip4_and_fqdn() {
        let input = BytesStr::from_static("IN IP4 10.0.0.1");
        let (rem, addr) = TaggedAddress::parse(input.as_ref(), &input).unwrap();
        assert!(rem.is_empty());
        assert_eq!(addr, TaggedAddress::IP4(Ipv4Addr::new(10, 0, 0, 1)));

        let input = BytesStr::from_static("IN IP4 host.example.org");
        let (_, addr) = TaggedAddress::parse(input.as_ref(), &input).unwrap();
        assert_eq!(addr.host(), "host.example.org");
    }

    #[test]
    fn ip6() {
        let input = BytesStr::from_static("IN IP6 ::1");
        let (_, addr) = TaggedAddress::parse(input.as_ref(), &input).unwrap();
        assert_eq!(addr.to_string(), "IN IP6 ::1");
    }

    #[test]
    fn unknown_network() {
        let input = BytesStr::from_static("XX IP4 10.0.0.1");
        assert!(TaggedAddress::parse(input.as_ref(), &input).is_err());
    }
}

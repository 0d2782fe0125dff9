//! URIs, name-addr and generic `;name=value` parameters

use bytes::Bytes;
use bytesstr::BytesStr;
use internal::IResult;
use nom::bytes::complete::{take_while, take_while1};
use nom::character::complete::char;
use nom::combinator::verify;
use nom::error::context;
use nom::sequence::terminated;
use std::fmt;

mod name_addr;
mod params;

pub use name_addr::NameAddr;
pub use params::{Param, Params};

/// Any absolute URI (`sip:`, `sips:`, `tel:`, ...) kept as written.
///
/// The engine only needs to compare, print and route on URIs, so the text is not split
/// into components beyond the scheme and the host part.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Uri(BytesStr);

fn scheme_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.')
}

fn uri_char(c: char) -> bool {
    !c.is_ascii_whitespace() && !matches!(c, '<' | '>' | '"')
}

fn uri_char_no_params(c: char) -> bool {
    uri_char(c) && !matches!(c, ';' | ',' | '?')
}

impl Uri {
    /// Create from a string, returns `None` if it has no scheme
    pub fn new(uri: impl Into<BytesStr>) -> Option<Self> {
        let uri = uri.into();

        let (rem, _) = Self::scheme(uri.as_str()).ok()?;

        if rem.contains(|c: char| !uri_char(c)) {
            return None;
        }

        Some(Self(uri))
    }

    fn scheme(i: &str) -> IResult<&str, &str> {
        context(
            "uri scheme",
            terminated(
                verify(take_while1(scheme_char), |s: &str| {
                    s.starts_with(|c: char| c.is_ascii_alphabetic())
                }),
                char(':'),
            ),
        )(i)
    }

    /// Parse an URI that may carry parameters. Stops at whitespace or `>`
    pub fn parse<'i>(src: &Bytes, i: &'i str) -> IResult<&'i str, Self> {
        let (rem, _) = Self::scheme(i)?;
        let (rem, _) = take_while(uri_char)(rem)?;

        let uri = &i[..i.len() - rem.len()];
        Ok((rem, Self(BytesStr::from_parse(src, uri))))
    }

    /// Parse an URI outside of angle brackets where `;` starts header parameters
    pub fn parse_no_params<'i>(src: &Bytes, i: &'i str) -> IResult<&'i str, Self> {
        let (rem, _) = Self::scheme(i)?;
        let (rem, _) = take_while(uri_char_no_params)(rem)?;

        let uri = &i[..i.len() - rem.len()];
        Ok((rem, Self(BytesStr::from_parse(src, uri))))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    pub fn scheme_str(&self) -> &str {
        self.0.split_once(':').map(|(s, _)| s).unwrap_or_default()
    }

    pub fn is_sip(&self) -> bool {
        self.scheme_str().eq_ignore_ascii_case("sip") || self.scheme_str().eq_ignore_ascii_case("sips")
    }

    /// `host[:port]` of a SIP URI
    pub fn host_port(&self) -> Option<&str> {
        if !self.is_sip() {
            return None;
        }

        let (_, rest) = self.0.split_once(':')?;
        let rest = rest.rsplit_once('@').map(|(_, h)| h).unwrap_or(rest);
        let end = rest.find([';', '?']).unwrap_or(rest.len());

        Some(&rest[..end])
    }

    /// `user` part of a SIP URI or the number of a `tel:` URI
    pub fn user(&self) -> Option<&str> {
        let (scheme, rest) = self.0.split_once(':')?;

        if scheme.eq_ignore_ascii_case("tel") {
            let end = rest.find(';').unwrap_or(rest.len());
            return Some(&rest[..end]);
        }

        rest.rsplit_once('@').map(|(user, _)| user)
    }

    /// Returns if the URI carries the `lr` parameter (loose routing)
    pub fn is_loose_route(&self) -> bool {
        self.0
            .split(';')
            .skip(1)
            .any(|p| p.eq_ignore_ascii_case("lr") || p.to_ascii_lowercase().starts_with("lr="))
    }
}

impl fmt::Display for Uri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parse_sip_with_params() {
        let src = Bytes::from_static(b"sip:bob@example.org:5060;transport=udp SIP/2.0");
        let i = std::str::from_utf8(&src).unwrap();

        let (rem, uri) = Uri::parse(&src, i).unwrap();
        assert_eq!(rem, " SIP/2.0");
        assert_eq!(uri.scheme_str(), "sip");
        assert_eq!(uri.user(), Some("bob"));
        assert_eq!(uri.host_port(), Some("example.org:5060"));
    }

    #[test]
    fn parse_no_params_stops_at_semicolon() {
        let src = Bytes::from_static(b"sip:alice@a.org;tag=123");
        let i = std::str::from_utf8(&src).unwrap();

        let (rem, uri) = Uri::parse_no_params(&src, i).unwrap();
        assert_eq!(rem, ";tag=123");
        assert_eq!(uri.as_str(), "sip:alice@a.org");
    }

    #[test]
    fn tel_uri() {
        let uri = Uri::new("tel:+4912345;phone-context=x").unwrap();
        assert_eq!(uri.user(), Some("+4912345"));
        assert_eq!(uri.host_port(), None);
    }

    #[test]
    fn reject_without_scheme() {
        assert!(Uri::new("bob@example.org").is_none());
        assert!(Uri::new("sip:has space").is_none());
    }

    #[test]
    fn loose_route() {
        assert!(Uri::new("sip:p1.example.org;lr").unwrap().is_loose_route());
        assert!(!Uri::new("sip:p1.example.org").unwrap().is_loose_route());
    }
}

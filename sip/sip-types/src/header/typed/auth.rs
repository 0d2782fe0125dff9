//! Digest authentication headers ([RFC3261 22.4](https://tools.ietf.org/html/rfc3261#section-22.4),
//! [RFC7616](https://tools.ietf.org/html/rfc7616))

use crate::Name;
use crate::header::{ConstNamed, HeaderParse, nom_error};
use crate::parse::parse_quoted;
use anyhow::{Context, Result};
use bytes::Bytes;
use bytesstr::BytesStr;
use internal::{Finish, IResult, token, ws};
use nom::branch::alt;
use nom::bytes::complete::take_while1;
use nom::character::complete::char;
use nom::combinator::map;
use nom::multi::separated_list0;
use std::fmt;

fn unquoted_value_char(c: char) -> bool {
    !c.is_ascii_whitespace() && c != ','
}

/// `name=value` pairs of an authentication header, values are stored without quotes
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct AuthParams(pub Vec<(BytesStr, BytesStr)>);

impl AuthParams {
    pub fn parse<'i>(src: &Bytes, i: &'i str) -> IResult<&'i str, Self> {
        map(
            separated_list0(
                ws((char(','),)),
                map(
                    ws((
                        take_while1(token),
                        char('='),
                        alt((parse_quoted, take_while1(unquoted_value_char))),
                    )),
                    |(name, _, value)| {
                        (
                            BytesStr::from_parse(src, name),
                            BytesStr::from_parse(src, value),
                        )
                    },
                ),
            ),
            AuthParams,
        )(i)
    }

    pub fn get(&self, name: &str) -> Option<&BytesStr> {
        self.0
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v)
    }

    fn parse_complete(src: &Bytes, i: &str) -> Result<Self> {
        let (_, params) = Self::parse(src, i).finish().map_err(nom_error)?;
        Ok(params)
    }
}

/// Hash algorithm of a digest challenge
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Algorithm {
    MD5,
    MD5Sess,
    SHA256,
    SHA256Sess,
    SHA512256,
    SHA512256Sess,
    Other(BytesStr),
}

impl Algorithm {
    /// `-sess` variants mix the client nonce into A1
    pub fn is_session(&self) -> bool {
        matches!(self, Self::MD5Sess | Self::SHA256Sess | Self::SHA512256Sess)
    }
}

impl From<BytesStr> for Algorithm {
    fn from(s: BytesStr) -> Self {
        match s.to_ascii_uppercase().as_str() {
            "MD5" => Self::MD5,
            "MD5-SESS" => Self::MD5Sess,
            "SHA-256" => Self::SHA256,
            "SHA-256-SESS" => Self::SHA256Sess,
            "SHA-512-256" => Self::SHA512256,
            "SHA-512-256-SESS" => Self::SHA512256Sess,
            _ => Self::Other(s),
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::MD5 => "MD5",
            Self::MD5Sess => "MD5-sess",
            Self::SHA256 => "SHA-256",
            Self::SHA256Sess => "SHA-256-sess",
            Self::SHA512256 => "SHA-512-256",
            Self::SHA512256Sess => "SHA-512-256-sess",
            Self::Other(other) => other,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QopOption {
    Auth,
    AuthInt,
    Other(BytesStr),
}

impl From<BytesStr> for QopOption {
    fn from(s: BytesStr) -> Self {
        if s.eq_ignore_ascii_case("auth") {
            Self::Auth
        } else if s.eq_ignore_ascii_case("auth-int") {
            Self::AuthInt
        } else {
            Self::Other(s)
        }
    }
}

impl fmt::Display for QopOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Auth => "auth",
            Self::AuthInt => "auth-int",
            Self::Other(other) => other,
        })
    }
}

/// Parse the `scheme param, param...` layout shared by challenges and credentials
fn parse_scheme<'i>(i: &'i str) -> Result<(&'i str, &'i str)> {
    let i = i.trim_start();
    let end = i.find(|c: char| !token(c)).unwrap_or(i.len());

    if end == 0 {
        anyhow::bail!("missing auth scheme");
    }

    Ok((&i[..end], &i[end..]))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestChallenge {
    pub realm: BytesStr,
    pub nonce: BytesStr,
    pub domain: Option<BytesStr>,
    pub opaque: Option<BytesStr>,
    pub stale: bool,
    pub algorithm: Algorithm,
    pub qop: Vec<QopOption>,
}

impl DigestChallenge {
    fn from_params(params: AuthParams) -> Result<Self> {
        let qop = params
            .get("qop")
            .map(|qop| {
                qop.split(',')
                    .map(|q| QopOption::from(qop.slice_ref(q.trim())))
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            realm: params.get("realm").cloned().context("challenge without realm")?,
            nonce: params.get("nonce").cloned().context("challenge without nonce")?,
            domain: params.get("domain").cloned(),
            opaque: params.get("opaque").cloned(),
            stale: params
                .get("stale")
                .is_some_and(|s| s.eq_ignore_ascii_case("true")),
            algorithm: params
                .get("algorithm")
                .cloned()
                .map(Algorithm::from)
                .unwrap_or(Algorithm::MD5),
            qop,
        })
    }
}

impl fmt::Display for DigestChallenge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest realm=\"{}\", nonce=\"{}\"", self.realm, self.nonce)?;

        if let Some(domain) = &self.domain {
            write!(f, ", domain=\"{}\"", domain)?;
        }

        if let Some(opaque) = &self.opaque {
            write!(f, ", opaque=\"{}\"", opaque)?;
        }

        if self.stale {
            f.write_str(", stale=true")?;
        }

        write!(f, ", algorithm={}", self.algorithm)?;

        if !self.qop.is_empty() {
            let qop: Vec<String> = self.qop.iter().map(ToString::to_string).collect();
            write!(f, ", qop=\"{}\"", qop.join(","))?;
        }

        Ok(())
    }
}

/// Value of a `WWW-Authenticate` or `Proxy-Authenticate` header
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthChallenge {
    Digest(DigestChallenge),
    Other { scheme: BytesStr, params: AuthParams },
}

impl HeaderParse for AuthChallenge {
    fn parse<'i>(src: &Bytes, i: &'i str) -> Result<(&'i str, Self)> {
        let (scheme, rest) = parse_scheme(i)?;
        let params = AuthParams::parse_complete(src, rest)?;

        let challenge = if scheme.eq_ignore_ascii_case("Digest") {
            Self::Digest(DigestChallenge::from_params(params)?)
        } else {
            Self::Other {
                scheme: BytesStr::from_parse(src, scheme),
                params,
            }
        };

        Ok(("", challenge))
    }
}

impl fmt::Display for AuthChallenge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Digest(digest) => fmt::Display::fmt(digest, f),
            Self::Other { scheme, params } => print_other(f, scheme, params),
        }
    }
}

fn print_other(f: &mut fmt::Formatter<'_>, scheme: &str, params: &AuthParams) -> fmt::Result {
    f.write_str(scheme)?;

    for (idx, (name, value)) in params.0.iter().enumerate() {
        let sep = if idx == 0 { " " } else { ", " };
        write!(f, "{sep}{name}=\"{value}\"")?;
    }

    Ok(())
}

/// Digest credentials sent inside `Authorization` or `Proxy-Authorization`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestResponse {
    pub username: BytesStr,
    pub realm: BytesStr,
    pub nonce: BytesStr,
    pub uri: BytesStr,
    pub response: BytesStr,
    pub algorithm: Algorithm,
    pub opaque: Option<BytesStr>,
    /// `(qop, cnonce, nc)`, only present if the challenge offered a qop
    pub qop_response: Option<(QopOption, BytesStr, u32)>,
}

impl DigestResponse {
    fn from_params(params: AuthParams) -> Result<Self> {
        let qop_response = match params.get("qop") {
            Some(qop) => Some((
                QopOption::from(qop.clone()),
                params.get("cnonce").cloned().context("qop without cnonce")?,
                u32::from_str_radix(params.get("nc").context("qop without nc")?, 16)?,
            )),
            None => None,
        };

        Ok(Self {
            username: params.get("username").cloned().context("missing username")?,
            realm: params.get("realm").cloned().context("missing realm")?,
            nonce: params.get("nonce").cloned().context("missing nonce")?,
            uri: params.get("uri").cloned().context("missing uri")?,
            response: params.get("response").cloned().context("missing response")?,
            algorithm: params
                .get("algorithm")
                .cloned()
                .map(Algorithm::from)
                .unwrap_or(Algorithm::MD5),
            opaque: params.get("opaque").cloned(),
            qop_response,
        })
    }
}

impl fmt::Display for DigestResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Digest username=\"{}\", realm=\"{}\", nonce=\"{}\", uri=\"{}\", response=\"{}\", algorithm={}",
            self.username, self.realm, self.nonce, self.uri, self.response, self.algorithm
        )?;

        if let Some(opaque) = &self.opaque {
            write!(f, ", opaque=\"{}\"", opaque)?;
        }

        if let Some((qop, cnonce, nc)) = &self.qop_response {
            write!(f, ", qop={}, nc={:08x}, cnonce=\"{}\"", qop, nc, cnonce)?;
        }

        Ok(())
    }
}

/// Value of an `Authorization` or `Proxy-Authorization` header
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthResponse {
    Digest(DigestResponse),
    Other { scheme: BytesStr, params: AuthParams },
}

impl HeaderParse for AuthResponse {
    fn parse<'i>(src: &Bytes, i: &'i str) -> Result<(&'i str, Self)> {
        let (scheme, rest) = parse_scheme(i)?;
        let params = AuthParams::parse_complete(src, rest)?;

        let response = if scheme.eq_ignore_ascii_case("Digest") {
            Self::Digest(DigestResponse::from_params(params)?)
        } else {
            Self::Other {
                scheme: BytesStr::from_parse(src, scheme),
                params,
            }
        };

        Ok(("", response))
    }
}

impl fmt::Display for AuthResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Digest(digest) => fmt::Display::fmt(digest, f),
            Self::Other { scheme, params } => print_other(f, scheme, params),
        }
    }
}

macro_rules! named_auth_header {
    ($(#[$meta:meta])* $name:ident, $inner:ty, $header_name:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq)]
        pub struct $name(pub $inner);

        impl ConstNamed for $name {
            const NAME: Name = $header_name;
        }

        impl HeaderParse for $name {
            fn parse<'i>(src: &Bytes, i: &'i str) -> Result<(&'i str, Self)> {
                let (rem, inner) = <$inner>::parse(src, i)?;
                Ok((rem, Self(inner)))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }
    };
}

named_auth_header!(WWWAuthenticate, AuthChallenge, Name::WWW_AUTHENTICATE);
named_auth_header!(ProxyAuthenticate, AuthChallenge, Name::PROXY_AUTHENTICATE);
named_auth_header!(Authorization, AuthResponse, Name::AUTHORIZATION);
named_auth_header!(ProxyAuthorization, AuthResponse, Name::PROXY_AUTHORIZATION);

/// `Authentication-Info` header sent with a successful response
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct AuthenticationInfo {
    /// Nonce to use for the next request
    pub next_nonce: Option<BytesStr>,
    pub qop: Option<QopOption>,
    pub rspauth: Option<BytesStr>,
    pub cnonce: Option<BytesStr>,
    pub nc: Option<BytesStr>,
}

impl ConstNamed for AuthenticationInfo {
    const NAME: Name = Name::AUTHENTICATION_INFO;
}

impl HeaderParse for AuthenticationInfo {
    fn parse<'i>(src: &Bytes, i: &'i str) -> Result<(&'i str, Self)> {
        let params = AuthParams::parse_complete(src, i)?;

        Ok((
            "",
            Self {
                next_nonce: params.get("nextnonce").cloned(),
                qop: params.get("qop").cloned().map(QopOption::from),
                rspauth: params.get("rspauth").cloned(),
                cnonce: params.get("cnonce").cloned(),
                nc: params.get("nc").cloned(),
            },
        ))
    }
}

impl fmt::Display for AuthenticationInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = vec![];

        if let Some(next_nonce) = &self.next_nonce {
            parts.push(format!("nextnonce=\"{next_nonce}\""));
        }
        if let Some(qop) = &self.qop {
            parts.push(format!("qop={qop}"));
        }
        if let Some(rspauth) = &self.rspauth {
            parts.push(format!("rspauth=\"{rspauth}\""));
        }
        if let Some(cnonce) = &self.cnonce {
            parts.push(format!("cnonce=\"{cnonce}\""));
        }
        if let Some(nc) = &self.nc {
            parts.push(format!("nc={nc}"));
        }

        f.write_str(&parts.join(", "))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::Headers;

    #[test]
    fn proxy_challenge() {
        let mut headers = Headers::new();
        headers.insert(
            Name::PROXY_AUTHENTICATE,
            r#"Digest realm="ims.example.org", nonce="3b6f2e", qop="auth,auth-int", algorithm=MD5, opaque="xyz""#,
        );

        let ProxyAuthenticate(AuthChallenge::Digest(digest)) =
            headers.get_named::<ProxyAuthenticate>().unwrap()
        else {
            panic!("expected digest challenge");
        };

        assert_eq!(digest.realm, "ims.example.org");
        assert_eq!(digest.nonce, "3b6f2e");
        assert_eq!(digest.qop, [QopOption::Auth, QopOption::AuthInt]);
        assert_eq!(digest.algorithm, Algorithm::MD5);
        assert_eq!(digest.opaque.as_deref(), Some("xyz"));
    }

    #[test]
    fn challenge_without_nonce_is_malformed() {
        let mut headers = Headers::new();
        headers.insert(Name::WWW_AUTHENTICATE, r#"Digest realm="a""#);

        assert!(headers.get_named::<WWWAuthenticate>().is_err());
    }

    #[test]
    fn response_round_trip() {
        let response = DigestResponse {
            username: "alice".into(),
            realm: "example.org".into(),
            nonce: "abc".into(),
            uri: "sip:example.org".into(),
            response: "0123".into(),
            algorithm: Algorithm::MD5,
            opaque: None,
            qop_response: Some((QopOption::Auth, "c1".into(), 2)),
        };

        let mut headers = Headers::new();
        headers.insert_named(&ProxyAuthorization(AuthResponse::Digest(response.clone())));

        let ProxyAuthorization(AuthResponse::Digest(parsed)) =
            headers.get_named::<ProxyAuthorization>().unwrap()
        else {
            panic!("expected digest response");
        };

        assert_eq!(parsed, response);
    }

    #[test]
    fn authentication_info() {
        let mut headers = Headers::new();
        headers.insert(
            Name::AUTHENTICATION_INFO,
            r#"nextnonce="47364c23432d2e131a5fb210812c", qop=auth, nc=00000001"#,
        );

        let info: AuthenticationInfo = headers.get_named().unwrap();
        assert_eq!(info.next_nonce.as_deref(), Some("47364c23432d2e131a5fb210812c"));
        assert_eq!(info.qop, Some(QopOption::Auth));
    }
}

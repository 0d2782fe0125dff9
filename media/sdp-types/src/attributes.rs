use bytes::Bytes;
use bytesstr::BytesStr;
use internal::{IResult, ws};
use nom::bytes::complete::take_while1;
use nom::character::complete::{char, digit1};
use nom::combinator::{map, map_res, opt, rest};
use nom::error::context;
use nom::sequence::preceded;
use std::fmt;
use std::str::FromStr;

/// Generic attribute (`a=<name>[:<value>]`), attributes are kept in the order they appear
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: BytesStr,
    pub value: Option<BytesStr>,
}

impl Attribute {
    pub fn new(name: impl Into<BytesStr>, value: impl Into<BytesStr>) -> Self {
        Self {
            name: name.into(),
            value: Some(value.into()),
        }
    }

    pub fn flag(name: impl Into<BytesStr>) -> Self {
        Self {
            name: name.into(),
            value: None,
        }
    }

    pub(crate) fn parse(src: &Bytes, line: &str) -> Self {
        match line.split_once(':') {
            Some((name, value)) => Self {
                name: BytesStr::from_parse(src, name.trim()),
                value: Some(BytesStr::from_parse(src, value.trim())),
            },
            None => Self::flag(BytesStr::from_parse(src, line.trim())),
        }
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Some(value) => write!(f, "a={}:{}", self.name, value),
            None => write!(f, "a={}", self.name),
        }
    }
}

/// Media direction attribute
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    #[default]
    SendRecv,
    SendOnly,
    RecvOnly,
    Inactive,
}

impl Direction {
    pub fn from_attribute_name(name: &str) -> Option<Self> {
        match name {
            "sendrecv" => Some(Self::SendRecv),
            "sendonly" => Some(Self::SendOnly),
            "recvonly" => Some(Self::RecvOnly),
            "inactive" => Some(Self::Inactive),
            _ => None,
        }
    }

    /// Direction to answer with when the offer has `self`
    pub fn flipped(self) -> Self {
        match self {
            Self::SendOnly => Self::RecvOnly,
            Self::RecvOnly => Self::SendOnly,
            other => other,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::SendRecv => "sendrecv",
            Self::SendOnly => "sendonly",
            Self::RecvOnly => "recvonly",
            Self::Inactive => "inactive",
        }
    }
}

/// Rtpmap attribute value (`<payload> <encoding>/<clock rate>[/<params>]`)
///
/// [RFC8866](https://www.rfc-editor.org/rfc/rfc8866.html#section-6.6)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RtpMap {
    pub payload: u8,
    pub encoding: BytesStr,
    pub clock_rate: u32,
    pub params: Option<BytesStr>,
}

impl RtpMap {
    pub fn parse<'i>(src: &Bytes, i: &'i str) -> IResult<&'i str, Self> {
        context(
            "rtpmap",
            map(
                ws((
                    map_res(digit1, FromStr::from_str),
                    take_while1(|c: char| c != '/'),
                    preceded(char('/'), map_res(digit1, FromStr::from_str)),
                    opt(preceded(char('/'), rest)),
                )),
                |(payload, encoding, clock_rate, params): (_, &str, _, Option<&str>)| RtpMap {
                    payload,
                    encoding: BytesStr::from_parse(src, encoding.trim()),
                    clock_rate,
                    params: params.map(|p| BytesStr::from_parse(src, p)),
                },
            ),
        )(i)
    }
}

impl fmt::Display for RtpMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}/{}", self.payload, self.encoding, self.clock_rate)?;

        if let Some(params) = &self.params {
            write!(f, "/{params}")?;
        }

        Ok(())
    }
}

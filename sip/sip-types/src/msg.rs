//! Message head parsing: the leading line, header lines and a pull parser to split a buffer into lines

use crate::code::Code;
use crate::method::Method;
use crate::parse::whitespace;
use crate::uri::Uri;
use crate::Name;
use bytes::Bytes;
use bytesstr::BytesStr;
use internal::{IResult, token, ws};
use memchr::memchr;
use nom::branch::alt;
use nom::bytes::complete::{tag, take_while, take_while1, take_while_m_n};
use nom::character::complete::char;
use nom::combinator::{map, map_res};
use nom::sequence::{preceded, terminated, tuple};
use std::fmt;
use std::str::FromStr;

/// A `name: value` header line
#[derive(Debug)]
pub struct Line {
    pub name: Name,
    pub value: BytesStr,
}

impl Line {
    pub fn parse<'i>(src: &Bytes, i: &'i str) -> IResult<&'i str, Self> {
        map(
            ws((take_while1(token), char(':'), internal::rest())),
            |(name, _, value): (&str, _, &str)| Line {
                name: Name::from_bytesstr(BytesStr::from_parse(src, name)),
                value: BytesStr::from_parse(src, value.trim()),
            },
        )(i)
    }
}

/// First line of a message
#[derive(Debug, Clone)]
pub enum MessageLine {
    Request(RequestLine),
    Response(StatusLine),
}

impl MessageLine {
    pub fn parse<'i>(src: &Bytes, i: &'i str) -> IResult<&'i str, Self> {
        alt((
            map(|i| StatusLine::parse(src, i), MessageLine::Response),
            map(|i| RequestLine::parse(src, i), MessageLine::Request),
        ))(i)
    }

    pub fn is_request(&self) -> bool {
        matches!(self, Self::Request(..))
    }
}

impl fmt::Display for MessageLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageLine::Request(line) => fmt::Display::fmt(line, f),
            MessageLine::Response(line) => fmt::Display::fmt(line, f),
        }
    }
}

/// `METHOD uri SIP/2.0`
#[derive(Debug, Clone)]
pub struct RequestLine {
    pub method: Method,
    pub uri: Uri,
}

impl RequestLine {
    pub fn parse<'i>(src: &Bytes, i: &'i str) -> IResult<&'i str, Self> {
        map(
            tuple((
                Method::parse(src),
                preceded(take_while1(whitespace), |i| Uri::parse(src, i)),
                preceded(take_while1(whitespace), tag("SIP/2.0")),
            )),
            |(method, uri, _)| RequestLine { method, uri },
        )(i)
    }
}

impl fmt::Display for RequestLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} SIP/2.0", self.method, self.uri)
    }
}

/// `SIP/2.0 code reason`
#[derive(Debug, Clone)]
pub struct StatusLine {
    pub code: Code,
    pub reason: Option<BytesStr>,
}

impl StatusLine {
    pub fn parse<'i>(src: &Bytes, i: &'i str) -> IResult<&'i str, Self> {
        map(
            tuple((
                terminated(tag("SIP/2.0"), take_while1(whitespace)),
                map_res(
                    take_while_m_n(3, 3, |c: char| c.is_ascii_digit()),
                    u16::from_str,
                ),
                take_while(|c| c != '\r' && c != '\n'),
            )),
            |(_, code, reason): (_, u16, &str)| StatusLine {
                code: Code::from(code),
                reason: match reason.trim() {
                    "" => None,
                    reason => Some(BytesStr::from_parse(src, reason)),
                },
            },
        )(i)
    }
}

impl fmt::Display for StatusLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SIP/2.0 {}", self.code.into_u16())?;

        match (&self.reason, self.code.text()) {
            (Some(reason), _) => write!(f, " {}", reason),
            (None, Some(text)) => write!(f, " {}", text),
            (None, None) => Ok(()),
        }
    }
}

/// The message head ended before the terminating empty line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Incomplete;

/// Splits the head of a message into lines.
///
/// Lines end with `\r\n` or `\n`. A line followed by one starting with a space or tab is
/// folded into it. Iteration stops at the empty line separating head and body,
/// after which [`PullParser::head_end`] points to the first body byte.
///
/// ```
/// use rcse_sip_types::msg::{Incomplete, PullParser};
///
/// let msg = b"OPTIONS sip:bob@example.org SIP/2.0\r\nAccept: application/sdp,\r\n  text/plain\r\nl: 0\r\n\r\n";
/// let mut parser = PullParser::new(msg, 0);
///
/// assert_eq!(parser.next(), Some(Ok(&b"OPTIONS sip:bob@example.org SIP/2.0"[..])));
/// assert_eq!(parser.next(), Some(Ok(&b"Accept: application/sdp,\r\n  text/plain"[..])));
/// assert_eq!(parser.next(), Some(Ok(&b"l: 0"[..])));
/// assert_eq!(parser.next(), None);
/// assert_eq!(parser.head_end(), msg.len());
///
/// let mut parser = PullParser::new(b"OPTIONS sip:bob@example.org SIP/2.0\r\nl: 0\r\n", 0);
/// assert!(parser.next().is_some_and(|line| line.is_ok()));
/// assert_eq!(parser.next(), Some(Err(Incomplete)));
/// ```
pub struct PullParser<'i> {
    input: &'i [u8],
    progress: usize,
}

impl<'i> PullParser<'i> {
    pub fn new(input: &'i [u8], progress: usize) -> Self {
        Self { input, progress }
    }

    pub fn head_end(&self) -> usize {
        self.progress
    }
}

impl<'i> Iterator for PullParser<'i> {
    type Item = Result<&'i [u8], Incomplete>;

    fn next(&mut self) -> Option<Self::Item> {
        let start = self.progress;
        let mut search = start;

        loop {
            let Some(newline) = self.input.get(search..).and_then(|rest| memchr(b'\n', rest)) else {
                return Some(Err(Incomplete));
            };

            let newline = search + newline;

            let mut end = newline;
            if end > start && self.input[end - 1] == b'\r' {
                end -= 1;
            }

            if end == start {
                self.progress = newline + 1;
                return None;
            }

            match self.input.get(newline + 1) {
                Some(b' ' | b'\t') => {
                    search = newline + 1;
                }
                Some(_) => {
                    self.progress = newline + 1;
                    return Some(Ok(&self.input[start..end]));
                }
                None => return Some(Err(Incomplete)),
            }
        }
    }
}

use super::Uri;
use crate::parse::parse_quoted;
use bytes::Bytes;
use bytesstr::BytesStr;
use internal::IResult;
use nom::branch::alt;
use nom::bytes::complete::take_while;
use nom::character::complete::char;
use nom::combinator::{map, opt};
use nom::sequence::{delimited, preceded, tuple};
use std::fmt;

/// `[display-name] <uri>` or a bare URI as found in From, To, Contact and Route headers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameAddr {
    pub name: Option<BytesStr>,
    pub uri: Uri,
}

fn display_name_char(c: char) -> bool {
    c != '<' && c != '"'
}

impl NameAddr {
    pub fn uri(uri: Uri) -> Self {
        Self { name: None, uri }
    }

    pub fn new(name: impl Into<BytesStr>, uri: Uri) -> Self {
        Self {
            name: Some(name.into()),
            uri,
        }
    }

    pub fn parse<'i>(src: &Bytes, i: &'i str) -> IResult<&'i str, Self> {
        alt((
            map(
                tuple((
                    opt(alt((parse_quoted, take_while(display_name_char)))),
                    preceded(
                        take_while(char::is_whitespace),
                        delimited(char('<'), |i| Uri::parse(src, i), char('>')),
                    ),
                )),
                |(name, uri)| NameAddr {
                    name: name
                        .map(str::trim)
                        .filter(|name| !name.is_empty())
                        .map(|name| BytesStr::from_parse(src, name)),
                    uri,
                },
            ),
            map(|i| Uri::parse_no_params(src, i), NameAddr::uri),
        ))(i)
    }
}

impl fmt::Display for NameAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(name) = &self.name {
            write!(f, "\"{}\" ", name)?;
        }

        write!(f, "<{}>", self.uri)
    }
}

//! Small parsing helpers shared by the header and message parsers

use internal::IResult;
use nom::bytes::complete::{escaped, is_not};
use nom::character::complete::{char, one_of};
use nom::combinator::{map, opt};
use nom::sequence::delimited;

pub use internal::token;

pub(crate) fn whitespace(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\r' | '\n')
}

/// Parse a quoted-string, returning the content between the quotes with escapes left untouched
pub fn parse_quoted(i: &str) -> IResult<&str, &str> {
    delimited(
        char('"'),
        map(opt(escaped(is_not("\"\\"), '\\', one_of("\"\\"))), |s| {
            s.unwrap_or("")
        }),
        char('"'),
    )(i)
}

/// Strip one layer of surrounding quotes if present
pub fn unquote(s: &str) -> &str {
    s.strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(s)
}

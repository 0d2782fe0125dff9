use bytes::Bytes;
use bytesstr::BytesStr;
use internal::IResult;
use nom::bytes::complete::take_while1;
use nom::character::complete::{char, digit1};
use nom::combinator::{map, map_res};
use nom::sequence::separated_pair;
use std::fmt;
use std::str::FromStr;

/// Bandwidth field (`b=<type>:<kbps>`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bandwidth {
    pub kind: BytesStr,
    pub value: u32,
}

impl Bandwidth {
    pub fn parse<'i>(src: &Bytes, i: &'i str) -> IResult<&'i str, Self> {
        map(
            separated_pair(
                take_while1(|c: char| c.is_ascii_alphanumeric() || c == '-'),
                char(':'),
                map_res(digit1, FromStr::from_str),
            ),
            |(kind, value)| Bandwidth {
                kind: BytesStr::from_parse(src, kind),
                value,
            },
        )(i)
    }
}

impl fmt::Display for Bandwidth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.value)
    }
}

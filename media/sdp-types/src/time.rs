use internal::{IResult, ws};
use nom::character::complete::digit1;
use nom::combinator::{map, map_res};
use nom::error::context;
use std::fmt;
use std::str::FromStr;

/// Time field (`t=`), `0 0` for unbounded sessions
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Time {
    pub start: u64,
    pub stop: u64,
}

impl Time {
    pub fn parse(i: &str) -> IResult<&str, Self> {
        context(
            "time",
            map(
                ws((
                    map_res(digit1, FromStr::from_str),
                    map_res(digit1, FromStr::from_str),
                )),
                |(start, stop)| Time { start, stop },
            ),
        )(i)
    }
}

impl fmt::Display for Time {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.start, self.stop)
    }
}

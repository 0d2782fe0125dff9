use crate::parse::{parse_quoted, unquote};
use bytes::Bytes;
use bytesstr::BytesStr;
use internal::{IResult, token};
use nom::branch::alt;
use nom::bytes::complete::{take_while, take_while1};
use nom::character::complete::char;
use nom::combinator::{map, opt, recognize};
use nom::sequence::{preceded, tuple};
use std::fmt;

/// A single `name[=value]` parameter. Quoted values keep their quotes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    pub name: BytesStr,
    pub value: Option<BytesStr>,
}

impl Param {
    pub fn name(name: impl Into<BytesStr>) -> Self {
        Self {
            name: name.into(),
            value: None,
        }
    }

    pub fn value(name: impl Into<BytesStr>, value: impl Into<BytesStr>) -> Self {
        Self {
            name: name.into(),
            value: Some(value.into()),
        }
    }

    fn parse<'i>(src: &Bytes, i: &'i str) -> IResult<&'i str, Self> {
        map(
            tuple((
                take_while1(token),
                opt(preceded(
                    tuple((take_while(char::is_whitespace), char('='), take_while(char::is_whitespace))),
                    alt((recognize(parse_quoted), take_while1(param_value_char))),
                )),
            )),
            |(name, value)| Param {
                name: BytesStr::from_parse(src, name),
                value: value.map(|v| BytesStr::from_parse(src, v)),
            },
        )(i)
    }
}

fn param_value_char(c: char) -> bool {
    !c.is_ascii_whitespace() && !matches!(c, ';' | ',' | '>' | '"')
}

impl fmt::Display for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Some(value) => write!(f, "{}={}", self.name, value),
            None => f.write_str(&self.name),
        }
    }
}

/// List of `;` prefixed parameters
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Params(pub Vec<Param>);

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parse<'i>(src: &Bytes, mut i: &'i str) -> IResult<&'i str, Self> {
        let mut params = vec![];

        loop {
            let (rem, semi) = opt(preceded(
                take_while(char::is_whitespace),
                char::<_, nom::error::VerboseError<&str>>(';'),
            ))(i)?;

            if semi.is_none() {
                break;
            }

            let (rem, param) = preceded(take_while(char::is_whitespace), |i| Param::parse(src, i))(rem)?;
            params.push(param);
            i = rem;
        }

        Ok((i, Self(params)))
    }

    pub fn with(mut self, param: Param) -> Self {
        self.0.push(param);
        self
    }

    pub fn push(&mut self, param: Param) {
        self.0.push(param);
    }

    pub fn get(&self, name: &str) -> Option<&Param> {
        self.0.iter().find(|p| p.name.eq_ignore_ascii_case(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Value of the parameter as written
    pub fn get_val(&self, name: &str) -> Option<&BytesStr> {
        self.get(name)?.value.as_ref()
    }

    /// Value of the parameter with surrounding quotes removed
    pub fn get_unquoted(&self, name: &str) -> Option<&str> {
        self.get_val(name).map(|v| unquote(v))
    }

    /// Removes the parameter and returns its value, if any
    pub fn take(&mut self, name: &str) -> Option<Option<BytesStr>> {
        let idx = self.0.iter().position(|p| p.name.eq_ignore_ascii_case(name))?;
        Some(self.0.remove(idx).value)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Param> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Params {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for param in &self.0 {
            write!(f, ";{}", param)?;
        }

        Ok(())
    }
}

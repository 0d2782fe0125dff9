use crate::Method;
use crate::Name;
use crate::header::{ConstNamed, HeaderParse, nom_error};
use anyhow::Result;
use bytes::Bytes;
use internal::{Finish, ws};
use nom::character::complete::digit1;
use nom::combinator::map_res;
use std::fmt;
use std::str::FromStr;

/// `CSeq` header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CSeq {
    pub cseq: u32,
    pub method: Method,
}

impl CSeq {
    pub const fn new(cseq: u32, method: Method) -> Self {
        Self { cseq, method }
    }
}

impl ConstNamed for CSeq {
    const NAME: Name = Name::CSEQ;
}

impl HeaderParse for CSeq {
    fn parse<'i>(src: &Bytes, i: &'i str) -> Result<(&'i str, Self)> {
        let (rem, (cseq, method)) = ws((
            map_res(digit1, u32::from_str),
            Method::parse(src),
        ))(i)
        .finish()
        .map_err(nom_error)?;

        Ok((rem, CSeq { cseq, method }))
    }
}

impl fmt::Display for CSeq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.cseq, self.method)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::Headers;

    #[test]
    fn cseq() {
        let mut headers = Headers::new();
        headers.insert(Name::CSEQ, "314159 INVITE");

        let cseq: CSeq = headers.get_named().unwrap();
        assert_eq!(cseq, CSeq::new(314159, Method::INVITE));
        assert_eq!(cseq.to_string(), "314159 INVITE");
    }

    #[test]
    fn cseq_garbage() {
        let mut headers = Headers::new();
        headers.insert(Name::CSEQ, "INVITE 1");

        assert!(headers.get_named::<CSeq>().is_err());
    }
}

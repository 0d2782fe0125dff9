use crate::Name;
use crate::header::{ConstNamed, HeaderParse, nom_error};
use crate::uri::{Param, Params};
use anyhow::Result;
use bytes::Bytes;
use bytesstr::BytesStr;
use internal::{Finish, IResult, token, ws};
use nom::bytes::complete::{tag_no_case, take_while1};
use nom::character::complete::char;
use nom::combinator::map;
use std::fmt;

/// `Via` header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Via {
    /// Transport name, e.g. `UDP`
    pub transport: BytesStr,
    /// `host[:port]` the response must be sent to
    pub sent_by: BytesStr,
    pub params: Params,
}

fn sent_by_char(c: char) -> bool {
    !c.is_ascii_whitespace() && !matches!(c, ';' | ',')
}

impl Via {
    pub fn new(
        transport: impl Into<BytesStr>,
        sent_by: impl Into<BytesStr>,
        branch: impl Into<BytesStr>,
    ) -> Self {
        Self {
            transport: transport.into(),
            sent_by: sent_by.into(),
            params: Params::new().with(Param::value("branch", branch)),
        }
    }

    pub fn branch(&self) -> Option<&BytesStr> {
        self.params.get_val("branch")
    }

    fn parse_protocol<'i>(src: &Bytes, i: &'i str) -> IResult<&'i str, (BytesStr, BytesStr)> {
        map(
            ws((
                tag_no_case("SIP"),
                char('/'),
                tag_no_case("2.0"),
                char('/'),
                take_while1(token),
                take_while1(sent_by_char),
            )),
            |(_, _, _, _, transport, sent_by)| {
                (
                    BytesStr::from_parse(src, transport),
                    BytesStr::from_parse(src, sent_by),
                )
            },
        )(i)
    }
}

impl ConstNamed for Via {
    const NAME: Name = Name::VIA;
}

impl HeaderParse for Via {
    fn parse<'i>(src: &Bytes, i: &'i str) -> Result<(&'i str, Self)> {
        let (i, (transport, sent_by)) = Self::parse_protocol(src, i).finish().map_err(nom_error)?;
        let (i, params) = Params::parse(src, i).finish().map_err(nom_error)?;

        Ok((
            i,
            Via {
                transport,
                sent_by,
                params,
            },
        ))
    }
}

impl fmt::Display for Via {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SIP/2.0/{} {}{}", self.transport, self.sent_by, self.params)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::Headers;

    #[test]
    fn via_list() {
        let mut headers = Headers::new();
        headers.insert(
            Name::VIA,
            "SIP/2.0/UDP pc33.atlanta.com;branch=z9hG4bK776asdhds, SIP / 2.0 / TCP [::1]:5061;branch=z9hG4bKx;rport",
        );

        let vias: Vec<Via> = headers.get_named().unwrap();
        assert_eq!(vias.len(), 2);
        assert_eq!(vias[0].transport, "UDP");
        assert_eq!(vias[0].sent_by, "pc33.atlanta.com");
        assert_eq!(vias[0].branch().unwrap(), "z9hG4bK776asdhds");
        assert_eq!(vias[1].transport, "TCP");
        assert_eq!(vias[1].sent_by, "[::1]:5061");
        assert!(vias[1].params.contains("rport"));
    }

    #[test]
    fn print() {
        let via = Via::new("UDP", "10.0.0.1:5060", "z9hG4bKabc");
        assert_eq!(via.to_string(), "SIP/2.0/UDP 10.0.0.1:5060;branch=z9hG4bKabc");
    }
}

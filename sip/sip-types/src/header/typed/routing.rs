use crate::header::{HeaderParse, nom_error};
use crate::uri::{NameAddr, Params};
use anyhow::Result;
use bytes::Bytes;
use internal::Finish;
use std::fmt;

/// Entry of a `Route` or `Record-Route` header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Routing {
    pub uri: NameAddr,
    pub params: Params,
}

impl HeaderParse for Routing {
    fn parse<'i>(src: &Bytes, i: &'i str) -> Result<(&'i str, Self)> {
        let (i, uri) = NameAddr::parse(src, i.trim_start()).finish().map_err(nom_error)?;
        let (i, params) = Params::parse(src, i).finish().map_err(nom_error)?;

        Ok((i, Routing { uri, params }))
    }
}

impl fmt::Display for Routing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.uri, self.params)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{Headers, Name};

    #[test]
    fn record_route_list() {
        let mut headers = Headers::new();
        headers.insert(
            Name::RECORD_ROUTE,
            "<sip:p2.example.com;lr>, <sip:p1.example.com;lr>",
        );
        headers.insert(Name::RECORD_ROUTE, "<sip:p0.example.com;lr>");

        let routes: Vec<Routing> = headers.get(Name::RECORD_ROUTE).unwrap();
        let uris: Vec<_> = routes.iter().map(|r| r.uri.uri.as_str()).collect();

        assert_eq!(
            uris,
            [
                "sip:p2.example.com;lr",
                "sip:p1.example.com;lr",
                "sip:p0.example.com;lr"
            ]
        );
    }
}

use crate::header::{HeaderParse, nom_error};
use crate::uri::{NameAddr, Params, Uri};
use anyhow::Result;
use bytes::Bytes;
use bytesstr::BytesStr;
use internal::Finish;
use std::fmt;

/// `From` and `To` headers. Used with [`Name::FROM`](crate::Name::FROM) and [`Name::TO`](crate::Name::TO).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FromTo {
    pub uri: NameAddr,
    pub tag: Option<BytesStr>,
    /// Parameters other than `tag`
    pub params: Params,
}

impl FromTo {
    pub fn new(uri: NameAddr, tag: Option<BytesStr>) -> Self {
        Self {
            uri,
            tag,
            params: Params::new(),
        }
    }

    pub fn from_uri(uri: Uri) -> Self {
        Self::new(NameAddr::uri(uri), None)
    }
}

impl HeaderParse for FromTo {
    fn parse<'i>(src: &Bytes, i: &'i str) -> Result<(&'i str, Self)> {
        let (i, uri) = NameAddr::parse(src, i.trim_start()).finish().map_err(nom_error)?;
        let (i, mut params) = Params::parse(src, i).finish().map_err(nom_error)?;

        let tag = params.take("tag").flatten();

        Ok((i, FromTo { uri, tag, params }))
    }
}

impl fmt::Display for FromTo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.uri)?;

        if let Some(tag) = &self.tag {
            write!(f, ";tag={}", tag)?;
        }

        write!(f, "{}", self.params)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{Headers, Name};

    #[test]
    fn from_with_tag() {
        let mut headers = Headers::new();
        headers.insert(
            Name::FROM,
            r#""Alice" <sip:alice@atlanta.com>;tag=1928301774;x=y"#,
        );

        let from: FromTo = headers.get(Name::FROM).unwrap();
        assert_eq!(from.tag.as_deref(), Some("1928301774"));
        assert_eq!(from.uri.uri.as_str(), "sip:alice@atlanta.com");
        assert!(from.params.contains("x"));
        assert_eq!(
            from.to_string(),
            r#""Alice" <sip:alice@atlanta.com>;tag=1928301774;x=y"#
        );
    }

    #[test]
    fn to_without_tag() {
        let mut headers = Headers::new();
        headers.insert("t", "sip:bob@biloxi.com");

        let to: FromTo = headers.get(Name::TO).unwrap();
        assert!(to.tag.is_none());
        assert_eq!(to.to_string(), "<sip:bob@biloxi.com>");
    }
}

use crate::Name;
use crate::header::{ConstNamed, HeaderParse, nom_error};
use crate::uri::{NameAddr, Params};
use anyhow::{Result, bail};
use bytes::Bytes;
use internal::Finish;
use std::fmt;

/// `Contact` header. Feature tags are stored inside `params`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contact {
    pub uri: NameAddr,
    pub params: Params,
}

impl Contact {
    pub fn new(uri: NameAddr) -> Self {
        Self {
            uri,
            params: Params::new(),
        }
    }
}

impl ConstNamed for Contact {
    const NAME: Name = Name::CONTACT;
}

impl HeaderParse for Contact {
    fn parse<'i>(src: &Bytes, i: &'i str) -> Result<(&'i str, Self)> {
        let (i, uri) = NameAddr::parse(src, i.trim_start()).finish().map_err(nom_error)?;
        let (i, params) = Params::parse(src, i).finish().map_err(nom_error)?;

        Ok((i, Contact { uri, params }))
    }
}

impl fmt::Display for Contact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.uri, self.params)
    }
}

/// `Accept-Contact: *;feature-tag...` ([RFC3841](https://tools.ietf.org/html/rfc3841))
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct AcceptContact {
    pub params: Params,
}

impl ConstNamed for AcceptContact {
    const NAME: Name = Name::ACCEPT_CONTACT;
}

impl HeaderParse for AcceptContact {
    fn parse<'i>(src: &Bytes, i: &'i str) -> Result<(&'i str, Self)> {
        let Some(i) = i.trim_start().strip_prefix('*') else {
            bail!("accept-contact value must start with '*'");
        };

        let (i, params) = Params::parse(src, i).finish().map_err(nom_error)?;

        Ok((i, AcceptContact { params }))
    }
}

impl fmt::Display for AcceptContact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "*{}", self.params)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::Headers;

    #[test]
    fn contact_with_feature_tags() {
        let mut headers = Headers::new();
        headers.insert(
            Name::CONTACT,
            r#"<sip:bob@10.0.0.2:5060>;+g.3gpp.iari-ref="urn%3Aurn-7%3A3gpp-application.ims.iari.rcse.im";+g.3gpp.cs-voice"#,
        );

        let contact: Contact = headers.get_named().unwrap();
        assert_eq!(contact.uri.uri.as_str(), "sip:bob@10.0.0.2:5060");
        assert!(contact.params.contains("+g.3gpp.cs-voice"));
        assert_eq!(
            contact.params.get_unquoted("+g.3gpp.iari-ref"),
            Some("urn%3Aurn-7%3A3gpp-application.ims.iari.rcse.im")
        );
    }

    #[test]
    fn accept_contact() {
        let mut headers = Headers::new();
        headers.insert("a", "*;+g.oma.sip-im;explicit");

        let accept_contact: AcceptContact = headers.get_named().unwrap();
        assert!(accept_contact.params.contains("+g.oma.sip-im"));
        assert_eq!(accept_contact.to_string(), "*;+g.oma.sip-im;explicit");
    }
}

use crate::{Attribute, Bandwidth, Connection, Direction, Media, RtpMap};
use bytesstr::BytesStr;
use internal::Finish;
use std::fmt;

/// Media block (`m=` line with all following lines up to the next `m=`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaDescription {
    pub media: Media,

    /// Media title (`i=`)
    pub title: Option<BytesStr>,

    /// Connection of this media, falls back to the session connection if absent
    pub connection: Option<Connection>,

    pub bandwidth: Vec<Bandwidth>,

    /// Encryption key (`k=`), obsolete but preserved
    pub key: Option<BytesStr>,

    pub attributes: Vec<Attribute>,
}

impl MediaDescription {
    pub fn new(media: Media) -> Self {
        Self {
            media,
            title: None,
            connection: None,
            bandwidth: vec![],
            key: None,
            attributes: vec![],
        }
    }

    pub fn with_attribute(mut self, attribute: Attribute) -> Self {
        self.attributes.push(attribute);
        self
    }

    /// First attribute with exactly the given name
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|attr| attr.name == name)
    }

    /// Value of the first attribute with exactly the given name
    pub fn attribute_value(&self, name: &str) -> Option<&BytesStr> {
        self.attribute(name)?.value.as_ref()
    }

    pub fn attributes_named<'s>(&'s self, name: &'s str) -> impl Iterator<Item = &'s Attribute> + 's {
        self.attributes.iter().filter(move |attr| attr.name == name)
    }

    /// All well-formed `a=rtpmap` entries
    pub fn rtpmaps(&self) -> Vec<RtpMap> {
        self.attributes_named("rtpmap")
            .filter_map(|attr| {
                let value = attr.value.as_ref()?;

                match RtpMap::parse(value.as_ref(), value).finish() {
                    Ok((_, rtpmap)) => Some(rtpmap),
                    Err(e) => {
                        log::debug!("ignoring malformed rtpmap {value:?}: {e:?}");
                        None
                    }
                }
            })
            .collect()
    }

    /// MIME types listed by `a=accept-types`
    pub fn accept_types(&self) -> Vec<&str> {
        self.attribute_value("accept-types")
            .map(|types| types.split_ascii_whitespace().collect())
            .unwrap_or_default()
    }

    /// The direction attribute, `sendrecv` if absent
    pub fn direction(&self) -> Direction {
        self.attributes
            .iter()
            .filter(|attr| attr.value.is_none())
            .find_map(|attr| Direction::from_attribute_name(&attr.name))
            .unwrap_or_default()
    }
}

impl fmt::Display for MediaDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "m={}\r\n", self.media)?;

        if let Some(title) = &self.title {
            write!(f, "i={title}\r\n")?;
        }

        if let Some(connection) = &self.connection {
            write!(f, "c={connection}\r\n")?;
        }

        for bandwidth in &self.bandwidth {
            write!(f, "b={bandwidth}\r\n")?;
        }

        if let Some(key) = &self.key {
            write!(f, "k={key}\r\n")?;
        }

        for attr in &self.attributes {
            write!(f, "{attr}\r\n")?;
        }

        Ok(())
    }
}

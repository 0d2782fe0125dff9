use crate::parser::{ParseSessionDescriptionError, Parser};
use crate::{Attribute, Bandwidth, Connection, MediaDescription, MediaType, Origin, Time};
use bytesstr::BytesStr;
use std::fmt;

/// A complete session description. Printed as SDP through its [`fmt::Display`] implementation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionDescription {
    pub origin: Origin,

    /// Session name (`s=`)
    pub name: BytesStr,

    /// Session information (`i=`)
    pub title: Option<BytesStr>,

    pub connection: Option<Connection>,

    pub bandwidth: Vec<Bandwidth>,

    pub time: Time,

    pub key: Option<BytesStr>,

    /// Session level attributes
    pub attributes: Vec<Attribute>,

    pub media_descriptions: Vec<MediaDescription>,
}

impl SessionDescription {
    pub fn new(origin: Origin, name: impl Into<BytesStr>) -> Self {
        Self {
            origin,
            name: name.into(),
            title: None,
            connection: None,
            bandwidth: vec![],
            time: Time::default(),
            key: None,
            attributes: vec![],
            media_descriptions: vec![],
        }
    }

    /// Parse a description from text. Lines may be separated with `\r\n` or `\n`.
    pub fn parse(src: &BytesStr) -> Result<Self, ParseSessionDescriptionError> {
        let mut parser = Parser::default();

        for line in src.split(['\r', '\n']).filter(|line| !line.is_empty()) {
            parser.parse_line(src, line)?;
        }

        parser.finish()
    }

    /// First media block of the given type
    pub fn find_media(&self, media_type: &MediaType) -> Option<&MediaDescription> {
        self.media_descriptions
            .iter()
            .find(|desc| &desc.media.media_type == media_type)
    }

    pub fn find_all_media<'s>(
        &'s self,
        media_type: &'s MediaType,
    ) -> impl Iterator<Item = &'s MediaDescription> + 's {
        self.media_descriptions
            .iter()
            .filter(move |desc| &desc.media.media_type == media_type)
    }

    /// Connection of the media block, or the session connection if the block has none
    pub fn connection_for<'s>(&'s self, media: &'s MediaDescription) -> Option<&'s Connection> {
        media.connection.as_ref().or(self.connection.as_ref())
    }

    /// First session level attribute with exactly the given name
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|attr| attr.name == name)
    }
}

impl fmt::Display for SessionDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v=0\r\n")?;
        write!(f, "o={}\r\n", self.origin)?;
        write!(f, "s={}\r\n", self.name)?;

        if let Some(title) = &self.title {
            write!(f, "i={title}\r\n")?;
        }

        if let Some(connection) = &self.connection {
            write!(f, "c={connection}\r\n")?;
        }

        for bandwidth in &self.bandwidth {
            write!(f, "b={bandwidth}\r\n")?;
        }

        write!(f, "t={}\r\n", self.time)?;

        if let Some(key) = &self.key {
            write!(f, "k={key}\r\n")?;
        }

        for attr in &self.attributes {
            write!(f, "{attr}\r\n")?;
        }

        for media_description in &self.media_descriptions {
            write!(f, "{media_description}")?;
        }

        Ok(())
    }
}

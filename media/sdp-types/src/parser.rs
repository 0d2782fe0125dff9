use crate::{
    Attribute, Bandwidth, Connection, Media, MediaDescription, Origin, SessionDescription, Time,
};
use bytes::Bytes;
use bytesstr::BytesStr;
use internal::{Finish, verbose_error_to_owned};

#[derive(Debug, thiserror::Error)]
pub enum ParseSessionDescriptionError {
    #[error("{0}")]
    ParseError(nom::error::VerboseError<String>),
    #[error("line {0:?} is too short")]
    Incomplete(String),
    #[error("description is missing the version field (v=)")]
    MissingVersion,
    #[error("description is missing the origin field (o=)")]
    MissingOrigin,
    #[error("description is missing the name field (s=)")]
    MissingName,
    #[error("description is missing the time field (t=)")]
    MissingTime,
}

impl From<nom::error::VerboseError<&str>> for ParseSessionDescriptionError {
    fn from(e: nom::error::VerboseError<&str>) -> Self {
        Self::ParseError(verbose_error_to_owned(e))
    }
}

/// Collects the fields of a description while reading it line by line
#[derive(Default)]
pub(crate) struct Parser {
    version: bool,
    origin: Option<Origin>,
    name: Option<BytesStr>,
    title: Option<BytesStr>,
    connection: Option<Connection>,
    bandwidth: Vec<Bandwidth>,
    time: Option<Time>,
    key: Option<BytesStr>,
    attributes: Vec<Attribute>,
    media_descriptions: Vec<MediaDescription>,
}

impl Parser {
    pub(crate) fn parse_line(
        &mut self,
        src: &BytesStr,
        line: &str,
    ) -> Result<(), ParseSessionDescriptionError> {
        let value = line
            .get(2..)
            .filter(|_| line.as_bytes().get(1) == Some(&b'='))
            .ok_or_else(|| ParseSessionDescriptionError::Incomplete(line.into()))?;

        let src_bytes: &Bytes = src.as_ref();

        match line.as_bytes()[0] {
            b'v' => self.version = true,
            b'o' => {
                let (_, origin) = Origin::parse(src_bytes, value).finish()?;
                self.origin = Some(origin);
            }
            b's' => self.name = Some(BytesStr::from_parse(src_bytes, value.trim())),
            b't' => {
                let (_, time) = Time::parse(value).finish()?;
                self.time = Some(time);
            }
            b'm' => {
                let (_, media) = Media::parse(src_bytes, value).finish()?;
                self.media_descriptions.push(MediaDescription::new(media));
            }
            b'i' => {
                let title = Some(BytesStr::from_parse(src_bytes, value));

                match self.media_descriptions.last_mut() {
                    Some(media) => media.title = title,
                    None => self.title = title,
                }
            }
            b'c' => {
                let (_, connection) = Connection::parse(src_bytes, value).finish()?;

                match self.media_descriptions.last_mut() {
                    Some(media) => media.connection = Some(connection),
                    None => self.connection = Some(connection),
                }
            }
            b'b' => {
                let (_, bandwidth) = Bandwidth::parse(src_bytes, value).finish()?;

                match self.media_descriptions.last_mut() {
                    Some(media) => media.bandwidth.push(bandwidth),
                    None => self.bandwidth.push(bandwidth),
                }
            }
            b'k' => {
                let key = Some(BytesStr::from_parse(src_bytes, value));

                match self.media_descriptions.last_mut() {
                    Some(media) => media.key = key,
                    None => self.key = key,
                }
            }
            b'a' => {
                let attribute = Attribute::parse(src_bytes, value);

                match self.media_descriptions.last_mut() {
                    Some(media) => media.attributes.push(attribute),
                    None => self.attributes.push(attribute),
                }
            }
            _ => log::trace!("skipping sdp line {line:?}"),
        }

        Ok(())
    }

    pub(crate) fn finish(self) -> Result<SessionDescription, ParseSessionDescriptionError> {
        if !self.version {
            return Err(ParseSessionDescriptionError::MissingVersion);
        }

        Ok(SessionDescription {
            origin: self
                .origin
                .ok_or(ParseSessionDescriptionError::MissingOrigin)?,
            name: self.name.ok_or(ParseSessionDescriptionError::MissingName)?,
            title: self.title,
            connection: self.connection,
            bandwidth: self.bandwidth,
            time: self.time.ok_or(ParseSessionDescriptionError::MissingTime)?,
            key: self.key,
            attributes: self.attributes,
            media_descriptions: self.media_descriptions,
        })
    }
}

#[cfg(test)]
mod test {
    use crate::{ParseSessionDescriptionError, SessionDescription};
    use bytesstr::BytesStr;

    #[test]
    fn missing_mandatory_lines() {
        let no_time = BytesStr::from_static("v=0\r\no=- 1 1 IN IP4 10.0.0.1\r\ns=-\r\n");
        assert!(matches!(
            SessionDescription::parse(&no_time),
            Err(ParseSessionDescriptionError::MissingTime)
        ));

        let no_origin = BytesStr::from_static("v=0\r\ns=-\r\nt=0 0\r\n");
        assert!(matches!(
            SessionDescription::parse(&no_origin),
            Err(ParseSessionDescriptionError::MissingOrigin)
        ));

        let no_version = BytesStr::from_static("o=- 1 1 IN IP4 10.0.0.1\r\ns=-\r\nt=0 0\r\n");
        assert!(matches!(
            SessionDescription::parse(&no_version),
            Err(ParseSessionDescriptionError::MissingVersion)
        ));
    }

    #[test]
    fn malformed_media_line() {
        let input = BytesStr::from_static(
            "v=0\r\no=- 1 1 IN IP4 10.0.0.1\r\ns=-\r\nt=0 0\r\nm=audio notaport RTP/AVP 0\r\n",
        );

        assert!(matches!(
            SessionDescription::parse(&input),
            Err(ParseSessionDescriptionError::ParseError(_))
        ));
    }

    #[test]
    fn garbage_line() {
        let input = BytesStr::from_static("hello world");
        assert!(matches!(
            SessionDescription::parse(&input),
            Err(ParseSessionDescriptionError::Incomplete(_))
        ));
    }
}

use crate::{not_whitespace, slash_num};
use bytes::Bytes;
use bytesstr::BytesStr;
use internal::{IResult, ws};
use nom::bytes::complete::take_while1;
use nom::character::complete::digit1;
use nom::combinator::{map, map_res, opt};
use nom::error::context;
use nom::multi::many1;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MediaType {
    Audio,
    Video,
    Text,
    Application,
    /// MSRP based messaging, used for chat and file transfer
    Message,
    Other(BytesStr),
}

impl MediaType {
    fn from_parse(src: &Bytes, s: &str) -> Self {
        match s {
            "audio" => Self::Audio,
            "video" => Self::Video,
            "text" => Self::Text,
            "application" => Self::Application,
            "message" => Self::Message,
            other => Self::Other(BytesStr::from_parse(src, other)),
        }
    }

    /// Media carried over RTP with payloads described by `a=rtpmap`
    pub fn is_rtp(&self) -> bool {
        matches!(self, Self::Audio | Self::Video | Self::Text)
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Audio => "audio",
            Self::Video => "video",
            Self::Text => "text",
            Self::Application => "application",
            Self::Message => "message",
            Self::Other(other) => other,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportProtocol {
    /// RTP over UDP
    RtpAvp,
    /// SRTP over UDP
    RtpSavp,
    /// MSRP over TCP ([RFC4975](https://www.rfc-editor.org/rfc/rfc4975.html))
    TcpMsrp,
    /// MSRP over TLS
    TcpTlsMsrp,
    Udp,
    Other(BytesStr),
}

impl TransportProtocol {
    fn from_parse(src: &Bytes, s: &str) -> Self {
        match s {
            "RTP/AVP" => Self::RtpAvp,
            "RTP/SAVP" => Self::RtpSavp,
            "TCP/MSRP" => Self::TcpMsrp,
            "TCP/TLS/MSRP" => Self::TcpTlsMsrp,
            "udp" => Self::Udp,
            other => Self::Other(BytesStr::from_parse(src, other)),
        }
    }
}

impl fmt::Display for TransportProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::RtpAvp => "RTP/AVP",
            Self::RtpSavp => "RTP/SAVP",
            Self::TcpMsrp => "TCP/MSRP",
            Self::TcpTlsMsrp => "TCP/TLS/MSRP",
            Self::Udp => "udp",
            Self::Other(other) => other,
        })
    }
}

/// Media field (`m=`)
///
/// Formats are kept as text since MSRP media uses `*` instead of payload numbers.
///
/// [RFC8866](https://www.rfc-editor.org/rfc/rfc8866.html#section-5.14)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Media {
    pub media_type: MediaType,
    pub port: u16,
    pub ports_num: Option<u32>,
    pub proto: TransportProtocol,
    pub fmts: Vec<BytesStr>,
}

impl Media {
    pub fn parse<'i>(src: &Bytes, i: &'i str) -> IResult<&'i str, Self> {
        context(
            "media field",
            map(
                ws((
                    take_while1(not_whitespace),
                    map_res(digit1, FromStr::from_str),
                    opt(slash_num),
                    take_while1(not_whitespace),
                    many1(map(ws((take_while1(not_whitespace),)), |(fmt,)| fmt)),
                )),
                |(media_type, port, ports_num, proto, fmts): (&str, _, _, &str, Vec<&str>)| Media {
                    media_type: MediaType::from_parse(src, media_type),
                    port,
                    ports_num,
                    proto: TransportProtocol::from_parse(src, proto),
                    fmts: fmts
                        .into_iter()
                        .map(|fmt| BytesStr::from_parse(src, fmt))
                        .collect(),
                },
            ),
        )(i)
    }

    /// Payload formats as RTP payload numbers, skipping everything that is not a number
    pub fn payload_types(&self) -> impl Iterator<Item = u8> + '_ {
        self.fmts.iter().filter_map(|fmt| fmt.parse().ok())
    }
}

impl fmt::Display for Media {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.media_type, self.port)?;

        if let Some(ports_num) = self.ports_num {
            write!(f, "/{ports_num}")?;
        }

        write!(f, " {}", self.proto)?;

        for fmt in &self.fmts {
            write!(f, " {fmt}")?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn rtp_media() {
        let input = BytesStr::from_static("audio 49170 RTP/AVP 0 8 97");
        let (rem, media) = Media::parse(input.as_ref(), &input).unwrap();

        assert!(rem.is_empty());
        assert_eq!(media.media_type, MediaType::Audio);
        assert_eq!(media.port, 49170);
        assert_eq!(media.proto, TransportProtocol::RtpAvp);
        assert_eq!(media.payload_types().collect::<Vec<_>>(), [0, 8, 97]);
    }

    #[test]
    fn msrp_media() {
        let input = BytesStr::from_static("message 0 TCP/MSRP *");
        let (_, media) = Media::parse(input.as_ref(), &input).unwrap();

        assert_eq!(media.media_type, MediaType::Message);
        assert_eq!(media.proto, TransportProtocol::TcpMsrp);
        assert_eq!(media.fmts, ["*"]);
        assert_eq!(media.to_string(), "message 0 TCP/MSRP *");
    }

    #[test]
    fn media_without_formats() {
        let input = BytesStr::from_static("video 5000 RTP/AVP");
        assert!(Media::parse(input.as_ref(), &input).is_err());
    }
}

use crate::{MediaDescription, MediaType, SessionDescription};
use bytesstr::BytesStr;
use std::collections::HashSet;

/// Media type supported locally with the formats that can be used for it.
///
/// For RTP media the formats are encoding names (`H264`, `PCMA`), for everything
/// else they are MIME types (`text/plain`, `message/cpim`). `*` accepts any format.
#[derive(Debug, Clone)]
pub struct LocalMedia {
    pub media_type: MediaType,
    pub formats: Vec<BytesStr>,
}

impl LocalMedia {
    pub fn new<F>(media_type: MediaType, formats: impl IntoIterator<Item = F>) -> Self
    where
        F: Into<BytesStr>,
    {
        Self {
            media_type,
            formats: formats.into_iter().map(Into::into).collect(),
        }
    }
}

/// Media type that survived the negotiation
#[derive(Debug, Clone)]
pub struct NegotiatedMedia {
    pub media_type: MediaType,

    /// Index of the selected block inside the offer
    pub index: usize,

    /// The local format that matched
    pub format: BytesStr,

    /// Offered payload type for RTP media
    pub payload: Option<u8>,

    pub remote: MediaDescription,
}

#[derive(Debug, thiserror::Error)]
#[error("offer contains no media supported locally")]
pub struct NoCommonMedia;

/// Intersect a remote offer with the local media support.
///
/// Only the first block of each offered media type is considered. Types without a local
/// counterpart are dropped, the whole negotiation fails only if no type is left.
pub fn negotiate(
    local: &[LocalMedia],
    offer: &SessionDescription,
) -> Result<Vec<NegotiatedMedia>, NoCommonMedia> {
    let mut seen = HashSet::new();
    let mut negotiated = vec![];

    for (index, remote) in offer.media_descriptions.iter().enumerate() {
        let media_type = &remote.media.media_type;

        if !seen.insert(media_type.clone()) {
            continue;
        }

        let Some(local) = local.iter().find(|l| l.media_type == *media_type) else {
            log::debug!("dropping offered {media_type} media, not supported locally");
            continue;
        };

        let selected = if media_type.is_rtp() {
            select_rtp(local, remote)
        } else {
            select_mime(local, remote).map(|format| (format, None))
        };

        match selected {
            Some((format, payload)) => negotiated.push(NegotiatedMedia {
                media_type: media_type.clone(),
                index,
                format,
                payload,
                remote: remote.clone(),
            }),
            None => log::debug!("dropping offered {media_type} media, no common format"),
        }
    }

    if negotiated.is_empty() {
        Err(NoCommonMedia)
    } else {
        Ok(negotiated)
    }
}

fn select_rtp(local: &LocalMedia, remote: &MediaDescription) -> Option<(BytesStr, Option<u8>)> {
    let rtpmaps = remote.rtpmaps();

    for payload in remote.media.payload_types() {
        let encoding = match rtpmaps.iter().find(|map| map.payload == payload) {
            Some(rtpmap) => &rtpmap.encoding[..],
            None => match static_encoding(payload) {
                Some(encoding) => encoding,
                None => continue,
            },
        };

        let format = local
            .formats
            .iter()
            .find(|f| is_wildcard(f) || f.eq_ignore_ascii_case(encoding));

        if let Some(format) = format {
            return Some((format.clone(), Some(payload)));
        }
    }

    None
}

/// Encoding of the static RTP payload types, RFC 3551 section 6
fn static_encoding(payload: u8) -> Option<&'static str> {
    let encoding = match payload {
        0 => "PCMU",
        3 => "GSM",
        4 => "G723",
        5 | 6 | 16 | 17 => "DVI4",
        7 => "LPC",
        8 => "PCMA",
        9 => "G722",
        10 | 11 => "L16",
        12 => "QCELP",
        13 => "CN",
        14 => "MPA",
        15 => "G728",
        18 => "G729",
        25 => "CelB",
        26 => "JPEG",
        28 => "nv",
        31 => "H261",
        32 => "MPV",
        33 => "MP2T",
        34 => "H263",
        _ => return None,
    };

    Some(encoding)
}

fn select_mime(local: &LocalMedia, remote: &MediaDescription) -> Option<BytesStr> {
    let offered = remote.accept_types();

    if offered.contains(&"*") {
        return local.formats.first().cloned();
    }

    for mime in offered {
        let format = local
            .formats
            .iter()
            .find(|f| is_wildcard(f) || f.eq_ignore_ascii_case(mime));

        match format {
            Some(f) if is_wildcard(f) => return Some(BytesStr::from(mime)),
            Some(f) => return Some(f.clone()),
            None => {}
        }
    }

    None
}

fn is_wildcard(format: &str) -> bool {
    format == "*"
}

#[cfg(test)]
mod test {
    use super::*;

    fn offer(media: &str) -> SessionDescription {
        let text = format!(
            "v=0\r\no=- 1 1 IN IP4 192.0.2.10\r\ns=-\r\nc=IN IP4 192.0.2.10\r\nt=0 0\r\n{media}"
        );

        SessionDescription::parse(&BytesStr::from(text)).unwrap()
    }

    const VIDEO: &str = "m=video 5000 RTP/AVP 96 97\r\n\
        a=rtpmap:96 VP8/90000\r\n\
        a=rtpmap:97 H264/90000\r\n";

    const MESSAGE: &str = "m=message 7394 TCP/MSRP *\r\n\
        a=accept-types:message/cpim text/plain\r\n\
        a=path:msrp://192.0.2.10:7394/abc;tcp\r\n";

    #[test]
    fn partial_negotiation_keeps_supported_types() {
        let offer = offer(&format!("{VIDEO}{MESSAGE}"));
        let local = [LocalMedia::new(MediaType::Message, ["text/plain"])];

        let negotiated = negotiate(&local, &offer).unwrap();

        assert_eq!(negotiated.len(), 1);
        assert_eq!(negotiated[0].media_type, MediaType::Message);
        assert_eq!(negotiated[0].index, 1);
        assert_eq!(negotiated[0].format, "text/plain");
        assert_eq!(negotiated[0].payload, None);
    }

    #[test]
    fn no_common_media() {
        let offer = offer(VIDEO);
        let local = [LocalMedia::new(MediaType::Message, ["text/plain"])];

        assert!(negotiate(&local, &offer).is_err());
    }

    #[test]
    fn rtp_matches_encoding_case_insensitive() {
        let offer = offer(VIDEO);
        let local = [LocalMedia::new(MediaType::Video, ["h264"])];

        let negotiated = negotiate(&local, &offer).unwrap();

        assert_eq!(negotiated[0].format, "h264");
        assert_eq!(negotiated[0].payload, Some(97));
    }

    #[test]
    fn first_offered_format_wins() {
        let offer = offer(VIDEO);
        let local = [LocalMedia::new(MediaType::Video, ["H264", "VP8"])];

        let negotiated = negotiate(&local, &offer).unwrap();

        assert_eq!(negotiated[0].payload, Some(96));
        assert_eq!(negotiated[0].format, "VP8");
    }

    #[test]
    fn static_payload_without_rtpmap() {
        let offer = offer(
            "m=audio 6000 RTP/AVP 18 0 96\r\n\
            a=rtpmap:96 opus/48000/2\r\n",
        );
        let local = [LocalMedia::new(MediaType::Audio, ["PCMU", "opus"])];

        let negotiated = negotiate(&local, &offer).unwrap();

        assert_eq!(negotiated[0].format, "PCMU");
        assert_eq!(negotiated[0].payload, Some(0));
    }

    #[test]
    fn unknown_payload_without_rtpmap() {
        let offer = offer("m=audio 6000 RTP/AVP 97\r\n");
        let local = [LocalMedia::new(MediaType::Audio, ["*"])];

        assert!(negotiate(&local, &offer).is_err());
    }

    #[test]
    fn wildcard_accept_types() {
        let offer = offer(
            "m=message 7394 TCP/MSRP *\r\n\
            a=accept-types:*\r\n",
        );
        let local = [LocalMedia::new(
            MediaType::Message,
            ["message/cpim", "text/plain"],
        )];

        let negotiated = negotiate(&local, &offer).unwrap();
        assert_eq!(negotiated[0].format, "message/cpim");
    }

    #[test]
    fn only_first_block_per_type() {
        let offer = offer(
            "m=message 7394 TCP/MSRP *\r\n\
            a=accept-types:image/png\r\n\
            m=message 7395 TCP/MSRP *\r\n\
            a=accept-types:text/plain\r\n",
        );
        let local = [LocalMedia::new(MediaType::Message, ["text/plain"])];

        assert!(negotiate(&local, &offer).is_err());
    }
}

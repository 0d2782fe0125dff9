//! Capability discovery with OPTIONS.
//!
//! Capabilities are advertised as feature tags in the `Contact` (or `Accept-Contact`) header
//! and refined by the media blocks of an SDP body.

use bytes::Bytes;
use bytesstr::BytesStr;
use sdp_types::{
    Attribute, Connection, Media, MediaDescription, MediaType, Origin, SessionDescription,
    TaggedAddress, TransportProtocol,
};
use sip_types::Headers;
use sip_types::header::HeaderError;
use sip_types::header::typed::{AcceptContact, Contact};
use sip_types::uri::{Param, Params};
use std::collections::BTreeSet;
use std::net::IpAddr;
use std::time::SystemTime;

mod client;
mod layer;

pub use client::CapabilityClient;
pub use layer::{CapabilityLayer, RemoteCapabilities};

/// Feature tag of video share, only advertised while in a call
pub const FEATURE_VIDEO_SHARE: &str = "+g.3gpp.cs-voice";

/// Feature tag carrying a list of IMS application references
pub const FEATURE_IARI_REF: &str = "+g.3gpp.iari-ref";

const IARI_PREFIX: &str = "urn%3Aurn-7%3A3gpp-application.ims.iari.";

const IARI_CHAT: &str = "rcse.im";
const IARI_FILE_TRANSFER: &str = "rcse.ft";
const IARI_IMAGE_SHARE: &str = "gsma-is";
const IARI_PRESENCE_DISCOVERY: &str = "rcse.dp";
const IARI_SOCIAL_PRESENCE: &str = "rcse.sp";

/// Services supported by a peer
#[derive(Debug, Clone)]
pub struct Capabilities {
    /// IM session
    pub chat: bool,
    pub file_transfer: bool,
    pub image_share: bool,
    pub video_share: bool,
    pub presence_discovery: bool,
    pub social_presence: bool,

    /// Application references that are not known services
    pub extensions: BTreeSet<String>,

    /// When these capabilities were learned
    pub timestamp: SystemTime,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self {
            chat: false,
            file_transfer: false,
            image_share: false,
            video_share: false,
            presence_discovery: false,
            social_presence: false,
            extensions: BTreeSet::new(),
            timestamp: SystemTime::now(),
        }
    }
}

impl Capabilities {
    /// Add extensions from a `;` separated list, e.g. `rcse.orange.game;rcse.orange.map`
    pub fn with_extensions(mut self, list: &str) -> Self {
        self.extensions.extend(
            list.split(';')
                .map(str::trim)
                .filter(|token| !token.is_empty())
                .map(ToOwned::to_owned),
        );
        self
    }

    /// Whether no service at all is supported
    pub fn is_empty(&self) -> bool {
        !(self.chat
            || self.file_transfer
            || self.image_share
            || self.video_share
            || self.presence_discovery
            || self.social_presence)
            && self.extensions.is_empty()
    }

    /// Read the feature tags of every `Contact` and `Accept-Contact` header
    pub fn from_headers(headers: &Headers) -> Result<Self, HeaderError> {
        let contacts: Vec<Contact> = headers.try_get_named().transpose()?.unwrap_or_default();
        let accept_contacts: Vec<AcceptContact> =
            headers.try_get_named().transpose()?.unwrap_or_default();

        let mut capabilities = Capabilities::default();

        let params = contacts
            .iter()
            .map(|contact| &contact.params)
            .chain(accept_contacts.iter().map(|accept| &accept.params));

        for params in params {
            capabilities.read_feature_tags(params);
        }

        Ok(capabilities)
    }

    fn read_feature_tags(&mut self, params: &Params) {
        for param in params.iter() {
            if param.name.eq_ignore_ascii_case(FEATURE_VIDEO_SHARE) {
                self.video_share = true;
            } else if param.name.eq_ignore_ascii_case(FEATURE_IARI_REF) {
                let Some(value) = &param.value else {
                    continue;
                };

                for urn in value.trim_matches('"').split(',') {
                    self.read_iari(urn.trim());
                }
            }
        }
    }

    fn read_iari(&mut self, urn: &str) {
        let Some(application) = urn.strip_prefix(IARI_PREFIX) else {
            if !urn.is_empty() {
                self.extensions.insert(urn.to_owned());
            }
            return;
        };

        match application {
            IARI_CHAT => self.chat = true,
            IARI_FILE_TRANSFER => self.file_transfer = true,
            IARI_IMAGE_SHARE => self.image_share = true,
            IARI_PRESENCE_DISCOVERY => self.presence_discovery = true,
            IARI_SOCIAL_PRESENCE => self.social_presence = true,
            extension => {
                self.extensions.insert(extension.to_owned());
            }
        }
    }

    /// Encode as feature tag parameters.
    ///
    /// Video share and image share require an active call and are left out otherwise.
    pub fn feature_tags(&self, in_call: bool) -> Params {
        let mut params = Params::new();

        if self.video_share && in_call {
            params.push(Param::name(FEATURE_VIDEO_SHARE));
        }

        let known = [
            (self.chat, IARI_CHAT),
            (self.file_transfer, IARI_FILE_TRANSFER),
            (self.image_share && in_call, IARI_IMAGE_SHARE),
            (self.presence_discovery, IARI_PRESENCE_DISCOVERY),
            (self.social_presence, IARI_SOCIAL_PRESENCE),
        ];

        let urns: Vec<String> = known
            .into_iter()
            .filter(|(supported, _)| *supported)
            .map(|(_, application)| format!("{IARI_PREFIX}{application}"))
            .chain(self.extensions.iter().map(|extension| {
                if extension.starts_with("urn") {
                    extension.clone()
                } else {
                    format!("{IARI_PREFIX}{extension}")
                }
            }))
            .collect();

        if !urns.is_empty() {
            params.push(Param::value(
                FEATURE_IARI_REF,
                format!("\"{}\"", urns.join(",")),
            ));
        }

        params
    }

    /// Clear video and image share if the SDP shows no format usable by both sides
    pub fn refine_with_sdp(&mut self, sdp: &SessionDescription, config: &CapabilityConfig) {
        let video_codec = sdp
            .find_all_media(&MediaType::Video)
            .flat_map(|media| media.rtpmaps())
            .any(|rtpmap| config.supports_video_codec(&rtpmap.encoding));

        if !video_codec {
            self.video_share = false;
        }

        let image_type = sdp
            .find_all_media(&MediaType::Message)
            .any(|media| {
                media
                    .accept_types()
                    .into_iter()
                    .any(|mime| config.supports_image_type(mime))
            });

        if !image_type {
            self.image_share = false;
        }
    }

    /// Capabilities of the sender of an OPTIONS request or response.
    ///
    /// Malformed headers or SDP are skipped, the capabilities found so far are kept.
    pub fn from_message(headers: &Headers, body: &Bytes, config: &CapabilityConfig) -> Self {
        let mut capabilities = match Capabilities::from_headers(headers) {
            Ok(capabilities) => capabilities,
            Err(e) => {
                log::debug!("ignoring malformed feature tags, {e}");
                Capabilities::default()
            }
        };

        if body.is_empty() {
            return capabilities;
        }

        let sdp = BytesStr::from_utf8_bytes(body.clone())
            .map_err(|e| e.to_string())
            .and_then(|sdp| SessionDescription::parse(&sdp).map_err(|e| e.to_string()));

        match sdp {
            Ok(sdp) => capabilities.refine_with_sdp(&sdp, config),
            Err(e) => log::debug!("not refining capabilities with malformed SDP, {e}"),
        }

        capabilities
    }
}

/// Local capabilities and the media formats backing them
#[derive(Debug, Clone)]
pub struct CapabilityConfig {
    /// Video encodings usable for video share
    pub video_codecs: Vec<String>,

    /// MIME types usable for image share
    pub image_types: Vec<String>,

    pub capabilities: Capabilities,
}

impl Default for CapabilityConfig {
    fn default() -> Self {
        Self {
            video_codecs: vec!["H264".into(), "H263-2000".into()],
            image_types: vec![
                "image/jpeg".into(),
                "image/png".into(),
                "image/gif".into(),
                "image/bmp".into(),
            ],
            capabilities: Capabilities::default(),
        }
    }
}

impl CapabilityConfig {
    pub fn supports_video_codec(&self, encoding: &str) -> bool {
        self.video_codecs
            .iter()
            .any(|codec| codec.eq_ignore_ascii_case(encoding))
    }

    pub fn supports_image_type(&self, mime: &str) -> bool {
        self.image_types
            .iter()
            .any(|image_type| image_type.eq_ignore_ascii_case(mime))
    }

    /// SDP listing the local video codecs and image types, both with port 0
    pub fn local_sdp(&self, address: IpAddr) -> SessionDescription {
        let session_id: BytesStr = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .map(|since| since.as_secs())
            .unwrap_or_default()
            .to_string()
            .into();

        let origin = Origin {
            username: BytesStr::from_static("-"),
            session_id: session_id.clone(),
            session_version: session_id,
            address: TaggedAddress::from(address),
        };

        let mut sdp = SessionDescription::new(origin, "-");
        sdp.connection = Some(Connection::new(TaggedAddress::from(address)));

        if self.capabilities.video_share && !self.video_codecs.is_empty() {
            let payloads = (96u8..).take(self.video_codecs.len());

            let mut video = MediaDescription::new(Media {
                media_type: MediaType::Video,
                port: 0,
                ports_num: None,
                proto: TransportProtocol::RtpAvp,
                fmts: payloads.clone().map(|pt| pt.to_string().into()).collect(),
            });

            for (pt, codec) in payloads.zip(&self.video_codecs) {
                video = video.with_attribute(Attribute::new("rtpmap", format!("{pt} {codec}/90000")));
            }

            sdp.media_descriptions.push(video);
        }

        if self.capabilities.image_share && !self.image_types.is_empty() {
            let image = MediaDescription::new(Media {
                media_type: MediaType::Message,
                port: 0,
                ports_num: None,
                proto: TransportProtocol::TcpMsrp,
                fmts: vec![BytesStr::from_static("*")],
            })
            .with_attribute(Attribute::new("accept-types", self.image_types.join(" ")));

            sdp.media_descriptions.push(image);
        }

        sdp
    }
}

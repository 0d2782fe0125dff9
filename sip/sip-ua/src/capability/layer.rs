use super::{Capabilities, CapabilityConfig};
use crate::session::CONTENT_TYPE_SDP;
use bytes::Bytes;
use bytesstr::BytesStr;
use sip_core::{Endpoint, EndpointBuilder, IncomingRequest, Layer, MayTake};
use sip_types::header::typed::{Accept, Contact, ContentType};
use sip_types::uri::{NameAddr, Uri};
use sip_types::{Code, Method};
use tokio::sync::broadcast;

const NOTIFICATION_CAPACITY: usize = 64;

/// Capabilities a peer sent along with its OPTIONS request
#[derive(Debug, Clone)]
pub struct RemoteCapabilities {
    /// URI of the `From` header
    pub remote: Uri,
    pub capabilities: Capabilities,
}

/// Endpoint layer answering capability queries.
///
/// Every OPTIONS outside of a dialog is answered with 200 and the local capabilities,
/// the capabilities of the sender are published to [`CapabilityLayer::subscribe`]rs.
pub struct CapabilityLayer {
    config: CapabilityConfig,
    notifications: broadcast::Sender<RemoteCapabilities>,
}

impl CapabilityLayer {
    pub fn new(config: CapabilityConfig) -> Self {
        let (notifications, _) = broadcast::channel(NOTIFICATION_CAPACITY);

        Self {
            config,
            notifications,
        }
    }

    pub fn config(&self) -> &CapabilityConfig {
        &self.config
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RemoteCapabilities> {
        self.notifications.subscribe()
    }

    async fn answer(&self, endpoint: &Endpoint, options: &IncomingRequest) {
        let sent_by = endpoint.sent_by();

        let mut response = endpoint.create_response(options, Code::OK, None);

        if let Some(uri) = Uri::new(format!("sip:{sent_by}")) {
            let mut contact = Contact::new(NameAddr::uri(uri));
            contact.params = self.config.capabilities.feature_tags(false);
            response.headers.insert_named(&contact);
        }

        for allow in endpoint.allowed() {
            response.headers.insert_named(allow);
        }

        response
            .headers
            .insert_named(&Accept(BytesStr::from_static(CONTENT_TYPE_SDP)));
        response
            .headers
            .insert_named(&ContentType::new(CONTENT_TYPE_SDP));
        response.body = Bytes::from(self.config.local_sdp(sent_by.ip()).to_string());

        if let Err(e) = endpoint.send_response(options, response).await {
            log::warn!("failed to answer {options}, {e}");
        }
    }
}

#[async_trait::async_trait]
impl Layer for CapabilityLayer {
    fn name(&self) -> &'static str {
        "capability"
    }

    fn init(&mut self, endpoint: &mut EndpointBuilder) {
        endpoint.add_allow(Method::OPTIONS);
        endpoint.add_accept(CONTENT_TYPE_SDP);
    }

    async fn receive(&self, endpoint: &Endpoint, request: MayTake<'_, IncomingRequest>) {
        if request.line.method != Method::OPTIONS || request.base_headers.to.tag.is_some() {
            return;
        }

        let options = request.take();

        self.answer(endpoint, &options).await;

        let capabilities = Capabilities::from_message(&options.headers, &options.body, &self.config);

        log::debug!("{} sent capabilities {capabilities:?}", options.base_headers.from.uri.uri);

        // Nobody listening is fine
        let _ = self.notifications.send(RemoteCapabilities {
            remote: options.base_headers.from.uri.uri.clone(),
            capabilities,
        });
    }
}

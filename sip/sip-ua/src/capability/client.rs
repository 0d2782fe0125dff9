use super::{Capabilities, CapabilityConfig};
use crate::config::{Identity, SessionConfig};
use crate::dialog::DialogPath;
use crate::session::CONTENT_TYPE_SDP;
use crate::util::random_call_id;
use bytesstr::BytesStr;
use sip_auth::{AuthAgent, RequestParts, ResponseParts};
use sip_core::{Endpoint, Request};
use sip_types::header::typed::{Accept, CallID, Contact, UserAgent};
use sip_types::uri::{NameAddr, Uri};
use sip_types::{Code, Method};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Queries the capabilities of peers with OPTIONS
#[derive(Debug, Clone)]
pub struct CapabilityClient {
    endpoint: Endpoint,
    identity: Identity,
    session: SessionConfig,
    config: Arc<CapabilityConfig>,
    in_call: Arc<AtomicBool>,
}

impl CapabilityClient {
    pub fn new(
        endpoint: Endpoint,
        identity: Identity,
        session: SessionConfig,
        config: CapabilityConfig,
    ) -> Self {
        Self {
            endpoint,
            identity,
            session,
            config: Arc::new(config),
            in_call: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Advertise the in-call services (video and image share) in the next queries
    pub fn set_in_call(&self, in_call: bool) {
        self.in_call.store(in_call, Ordering::Relaxed);
    }

    /// Ask `remote` for its capabilities.
    ///
    /// Only a 200 carries capabilities. Any other response, a timeout or a local error
    /// yields `None`, which only means that nothing is known about the peer.
    #[tracing::instrument(name = "options", skip_all, fields(remote = %remote))]
    pub async fn query(&self, remote: Uri) -> Option<Capabilities> {
        let mut dialog = self.query_path(remote);
        let mut auth = AuthAgent::new(self.identity.digest_user());
        let mut challenged = false;

        loop {
            let options = match self.build_options(&mut dialog, &mut auth) {
                Ok(options) => options,
                Err(e) => {
                    log::warn!("cannot build OPTIONS, {e}");
                    return None;
                }
            };

            let mut pending = match self.endpoint.send_request(options).await {
                Ok(pending) => pending,
                Err(e) => {
                    log::warn!("failed to send OPTIONS, {e}");
                    return None;
                }
            };

            let Some(response) = self
                .endpoint
                .transactions()
                .await_response(&mut pending, self.session.transaction_timeout)
                .await
            else {
                log::info!("OPTIONS not answered in time");
                return None;
            };

            match response.code() {
                Code::OK => {
                    return Some(Capabilities::from_message(
                        &response.headers,
                        &response.body,
                        &self.config,
                    ));
                }
                Code::UNAUTHORIZED | Code::PROXY_AUTHENTICATION_REQUIRED if !challenged => {
                    challenged = true;

                    let parts = ResponseParts {
                        line: &response.line,
                        headers: &response.headers,
                    };

                    if let Err(e) = auth.read_challenge(parts) {
                        log::warn!("cannot answer challenge, {e}");
                        return None;
                    }

                    log::debug!("retrying OPTIONS with credentials");
                }
                code => {
                    log::debug!("OPTIONS answered with {code}, capabilities unknown");
                    return None;
                }
            }
        }
    }

    /// Path of the query, it never becomes a dialog
    fn query_path(&self, remote: Uri) -> DialogPath {
        let host = self.endpoint.sent_by().ip().to_string();

        let mut contact = Contact::new(NameAddr::uri(
            self.identity.contact_uri(self.endpoint.sent_by()),
        ));
        contact.params = self
            .config
            .capabilities
            .feature_tags(self.in_call.load(Ordering::Relaxed));

        DialogPath::originating(
            CallID::new(random_call_id(&host)),
            self.identity.name_addr(),
            NameAddr::uri(remote.clone()),
            remote,
            contact,
            self.session.service_route.clone(),
        )
    }

    fn build_options(
        &self,
        dialog: &mut DialogPath,
        auth: &mut AuthAgent,
    ) -> Result<Request, sip_auth::DigestError> {
        let mut options = dialog.create_request(Method::OPTIONS);

        options
            .headers
            .insert_named(&Accept(BytesStr::from_static(CONTENT_TYPE_SDP)));

        if let Some(user_agent) = &self.session.user_agent {
            options
                .headers
                .insert_named(&UserAgent::new(user_agent.as_str()));
        }

        let parts = RequestParts {
            line: &options.line,
            body: &options.body,
        };

        auth.write_credentials(parts, &mut options.headers)?;

        Ok(options)
    }
}

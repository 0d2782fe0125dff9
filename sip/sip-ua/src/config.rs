use sip_auth::DigestUser;
use sip_core::transaction::consts::T2;
use sip_types::header::typed::Routing;
use sip_types::uri::{NameAddr, Uri};
use std::net::SocketAddr;
use std::time::Duration;

/// The local user, used for From headers, Contact and authentication
#[derive(Debug, Clone)]
pub struct Identity {
    /// Public identity, e.g. `sip:+33600000000@ims.example.org`
    pub public_uri: Uri,

    /// Private identity used as digest username
    pub private_id: String,
    pub password: String,
    pub home_domain: String,
    pub display_name: Option<String>,
}

impl Identity {
    pub fn name_addr(&self) -> NameAddr {
        match &self.display_name {
            Some(name) => NameAddr::new(name.as_str(), self.public_uri.clone()),
            None => NameAddr::uri(self.public_uri.clone()),
        }
    }

    /// `sip:<user>@<sent-by>`, the address the local user is reachable at
    pub fn contact_uri(&self, sent_by: SocketAddr) -> Uri {
        let uri = match self.public_uri.user() {
            Some(user) => format!("sip:{user}@{sent_by}"),
            None => format!("sip:{sent_by}"),
        };

        Uri::new(uri).unwrap_or_else(|| self.public_uri.clone())
    }

    pub(crate) fn digest_user(&self) -> DigestUser {
        DigestUser::new(self.private_id.as_str(), self.password.as_bytes())
    }
}

/// Timeouts and limits applied to every session
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// How long an incoming session rings before it is given up,
    /// also the time an outgoing session waits for an answer
    pub ringing_period: Duration,

    /// How long a 200 OK to an INVITE waits for the ACK
    pub ack_timeout: Duration,

    /// Added to the ringing period when waiting for a final response
    pub transaction_timeout: Duration,

    /// Maximum number of concurrently active sessions
    pub max_sessions: Option<usize>,

    /// Value of the `User-Agent` header of outgoing requests
    pub user_agent: Option<String>,

    /// Route set learned at registration, preloaded into every originating dialog
    pub service_route: Vec<Routing>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ringing_period: Duration::from_secs(30),
            ack_timeout: T2,
            transaction_timeout: T2,
            max_sessions: None,
            user_agent: Some(format!("rcse/{}", env!("CARGO_PKG_VERSION"))),
            service_route: vec![],
        }
    }
}

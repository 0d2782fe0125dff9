#![allow(dead_code)]

use bytes::Bytes;
use parking_lot::Mutex;
use rcse_sip_ua::capability::{CapabilityConfig, CapabilityLayer};
use rcse_sip_ua::{
    IncomingSessions, MediaReady, SessionConfig, SessionError, SessionKind, SessionLayer,
    SessionManager, Identity,
};
use sdp_types::{LocalMedia, MediaType, NegotiatedMedia};
use sip_core::transport::{MemoryInbox, MemoryTransport, Transport};
use sip_core::{Endpoint, Message, Request, Response};
use sip_types::header::typed::{AcceptContact, FromTo};
use sip_types::uri::{Param, Params, Uri};
use sip_types::{Code, Method, Name};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn alice_addr() -> SocketAddr {
    "10.0.0.1:5060".parse().unwrap()
}

pub fn bob_addr() -> SocketAddr {
    "10.0.0.2:5060".parse().unwrap()
}

pub fn alice_uri() -> Uri {
    Uri::new("sip:alice@10.0.0.1:5060").unwrap()
}

pub fn bob_uri() -> Uri {
    Uri::new("sip:bob@10.0.0.2:5060").unwrap()
}

pub fn identity(user: &str, host: &str) -> Identity {
    Identity {
        public_uri: Uri::new(format!("sip:{user}@{host}")).unwrap(),
        private_id: user.into(),
        password: "secret".into(),
        home_domain: host.into(),
        display_name: None,
    }
}

pub fn chat_sdp(host: &str, port: u16) -> Bytes {
    format!(
        "v=0\r\n\
         o=- 2890844526 2890844526 IN IP4 {host}\r\n\
         s=-\r\n\
         c=IN IP4 {host}\r\n\
         t=0 0\r\n\
         m=message {port} TCP/MSRP *\r\n\
         a=accept-types:message/cpim text/plain\r\n\
         a=path:msrp://{host}:{port}/s1;tcp\r\n"
    )
    .into()
}

/// One-to-one chat over MSRP
#[derive(Clone)]
pub struct Chat {
    pub host: &'static str,
    pub port: u16,
    pub formats: Vec<&'static str>,
    pub ready: Arc<Mutex<Vec<MediaReady>>>,
    pub established: Arc<Mutex<usize>>,
}

impl Chat {
    pub fn new(host: &'static str) -> Self {
        Self {
            host,
            port: 7394,
            formats: vec!["message/cpim", "text/plain"],
            ready: Default::default(),
            established: Default::default(),
        }
    }

    /// Chat which only understands the given MIME types
    pub fn with_formats(mut self, formats: Vec<&'static str>) -> Self {
        self.formats = formats;
        self
    }
}

impl SessionKind for Chat {
    fn name(&self) -> &'static str {
        "chat"
    }

    fn local_media(&self) -> Vec<LocalMedia> {
        vec![LocalMedia::new(MediaType::Message, self.formats.clone())]
    }

    fn build_initial_request(&mut self, request: &mut Request) -> Result<Bytes, SessionError> {
        request.headers.insert_named(&AcceptContact {
            params: Params::new().with(Param::value(
                "+g.3gpp.iari-ref",
                "\"urn%3Aurn-7%3A3gpp-application.ims.iari.rcse.im\"",
            )),
        });

        Ok(chat_sdp(self.host, self.port))
    }

    fn build_answer(&mut self, negotiated: &[NegotiatedMedia]) -> Result<Bytes, SessionError> {
        if negotiated.is_empty() {
            return Err(SessionError::kind("nothing negotiated"));
        }

        Ok(chat_sdp(self.host, self.port))
    }

    fn on_established(&mut self, _: &rcse_sip_ua::dialog::DialogPath) {
        *self.established.lock() += 1;
    }

    fn on_media_ready(&mut self, media: MediaReady) {
        self.ready.lock().push(media);
    }
}

/// A user agent with its own endpoint
pub struct Peer {
    pub endpoint: Endpoint,
    pub manager: SessionManager,
    pub incoming: IncomingSessions,
    pub transport: MemoryTransport,
}

fn build_peer(
    transport: MemoryTransport,
    inbox: MemoryInbox,
    identity: Identity,
    config: SessionConfig,
    capabilities: CapabilityConfig,
) -> Peer {
    let (layer, incoming) = SessionLayer::new();

    let mut builder = Endpoint::builder();
    builder.add_layer(layer);
    builder.add_layer(CapabilityLayer::new(capabilities));
    transport.attach(inbox, &mut builder);

    let endpoint = builder.build().unwrap();
    let manager = SessionManager::new(endpoint.clone(), identity, config);

    Peer {
        endpoint,
        manager,
        incoming,
        transport,
    }
}

/// Alice and Bob connected to each other
pub fn peers(alice_config: SessionConfig, bob_config: SessionConfig) -> (Peer, Peer) {
    peers_with_capabilities(
        (alice_config, CapabilityConfig::default()),
        (bob_config, CapabilityConfig::default()),
    )
}

pub fn peers_with_capabilities(
    alice: (SessionConfig, CapabilityConfig),
    bob: (SessionConfig, CapabilityConfig),
) -> (Peer, Peer) {
    init_logging();

    let ((a_tp, a_inbox), (b_tp, b_inbox)) = MemoryTransport::pair(alice_addr(), bob_addr());

    (
        build_peer(a_tp, a_inbox, identity("alice", "10.0.0.1"), alice.0, alice.1),
        build_peer(b_tp, b_inbox, identity("bob", "10.0.0.2"), bob.0, bob.1),
    )
}

/// Alice connected to a peer which is driven by the test itself
pub fn alice_and_script(config: SessionConfig) -> (Peer, Script) {
    init_logging();

    let ((a_tp, a_inbox), (b_tp, b_inbox)) = MemoryTransport::pair(alice_addr(), bob_addr());

    // Every message reaches the script exactly once
    a_tp.set_reliable(true);

    let alice = build_peer(
        a_tp,
        a_inbox,
        identity("alice", "10.0.0.1"),
        config,
        CapabilityConfig::default(),
    );

    (
        alice,
        Script {
            transport: b_tp,
            inbox: b_inbox,
        },
    )
}

/// Raw end of the connection, messages are read and written by hand
pub struct Script {
    pub transport: MemoryTransport,
    pub inbox: MemoryInbox,
}

impl Script {
    pub async fn next_message(&mut self) -> Message {
        let (bytes, _) = timeout(Duration::from_secs(600), self.inbox.recv())
            .await
            .expect("no message received")
            .expect("transport closed");

        Message::parse(bytes).unwrap()
    }

    /// Next request with the given method, everything else is skipped
    pub async fn next_request(&mut self, method: Method) -> Request {
        loop {
            if let Message::Request(request) = self.next_message().await {
                if request.line.method == method {
                    return request;
                }
            }
        }
    }

    pub async fn next_response(&mut self) -> Response {
        loop {
            if let Message::Response(response) = self.next_message().await {
                return response;
            }
        }
    }

    /// Methods of every request received so far without waiting
    pub fn pending_requests(&mut self) -> Vec<Method> {
        let mut methods = vec![];

        while let Some((bytes, _)) = self.inbox.try_recv() {
            if let Ok(Message::Request(request)) = Message::parse(bytes) {
                methods.push(request.line.method);
            }
        }

        methods
    }

    pub async fn send(&self, message: impl Into<Message>) {
        let mut message = message.into();

        self.transport
            .send(&message.to_bytes(), alice_addr())
            .await
            .unwrap();
    }

    pub async fn respond(&self, request: &Request, code: Code) {
        self.send(response_to(request, code)).await;
    }
}

pub fn response_to(request: &Request, code: Code) -> Response {
    let mut response = Response::new(code);

    for name in [Name::VIA, Name::FROM, Name::CALL_ID, Name::CSEQ] {
        request
            .headers
            .clone_into(&mut response.headers, name)
            .unwrap();
    }

    let mut to: FromTo = request.headers.get(Name::TO).unwrap();
    if to.tag.is_none() && code != Code::TRYING {
        to.tag = Some("script-tag".into());
    }
    response.headers.insert_type(Name::TO, &to);

    response
}

pub fn proxy_challenge(request: &Request, nonce: &str) -> Response {
    let mut response = response_to(request, Code::PROXY_AUTHENTICATION_REQUIRED);

    response.headers.insert(
        Name::PROXY_AUTHENTICATE,
        format!("Digest realm=\"10.0.0.2\", nonce=\"{nonce}\", qop=\"auth\", algorithm=MD5"),
    );

    response
}

/// INVITE as sent by a remote caller to Alice
pub fn remote_invite(call_id: &str) -> Request {
    let mut invite = Request::new(Method::INVITE, alice_uri());

    invite.headers.insert(
        Name::VIA,
        format!("SIP/2.0/MEM 10.0.0.2:5060;branch=z9hG4bK{call_id}"),
    );
    invite.headers.insert(Name::MAX_FORWARDS, "70");
    invite
        .headers
        .insert(Name::FROM, "<sip:bob@10.0.0.2>;tag=remote-tag");
    invite.headers.insert(Name::TO, "<sip:alice@10.0.0.1>");
    invite.headers.insert(Name::CALL_ID, call_id.to_owned());
    invite.headers.insert(Name::CSEQ, "1 INVITE");
    invite
        .headers
        .insert(Name::CONTACT, "<sip:bob@10.0.0.2:5060>");
    invite
        .headers
        .insert(Name::CONTENT_TYPE, "application/sdp");
    invite.body = chat_sdp("10.0.0.2", 9000);

    invite
}

/// Request sent by the remote caller inside the dialog created by `invite` and `response`
pub fn in_dialog(invite: &Request, response: &Response, method: Method, cseq: u32) -> Request {
    let target = response
        .headers
        .get_named::<sip_types::header::typed::Contact>()
        .map(|contact| contact.uri.uri)
        .unwrap_or_else(|_| alice_uri());

    let mut request = Request::new(method.clone(), target);

    request.headers.insert(
        Name::VIA,
        format!("SIP/2.0/MEM 10.0.0.2:5060;branch=z9hG4bKindialog{cseq}"),
    );
    invite
        .headers
        .clone_into(&mut request.headers, Name::FROM)
        .unwrap();
    response
        .headers
        .clone_into(&mut request.headers, Name::TO)
        .unwrap();
    invite
        .headers
        .clone_into(&mut request.headers, Name::CALL_ID)
        .unwrap();
    request
        .headers
        .insert(Name::CSEQ, format!("{cseq} {method}"));

    request
}

use crate::transaction::{
    Incoming, OutgoingMessage, PendingTransaction, TimerConfig, TransactionManager, TsxKey,
};
use crate::transport::Transport;
use crate::{BaseHeaders, IncomingRequest, Layer, MayTake, Message, Request, Response, Result};
use bytes::Bytes;
use bytesstr::BytesStr;
use sip_types::header::typed::{Accept, Allow, Routing, Via};
use sip_types::msg::StatusLine;
use sip_types::uri::Uri;
use sip_types::{Code, CodeKind, Headers, Method, Name};
use std::any::type_name;
use std::fmt;
use std::mem::take;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::Instrument;

const DEFAULT_PORT: u16 = 5060;

/// The endpoint is the centerpiece of the signaling engine. It owns the transport, the
/// [`TransactionManager`] and a stack of [`Layer`]s which build the logic on top.
///
/// It being a wrapper of a `Arc<Inner>` makes it cheap to clone and store where needed,
/// but the endpoint may never contain itself to avoid cyclic references.
#[derive(Clone)]
pub struct Endpoint {
    inner: Arc<Inner>,
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("inner_refcount", &Arc::strong_count(&self.inner))
            .finish_non_exhaustive()
    }
}

struct Inner {
    // capabilities
    accept: Vec<Accept>,
    allow: Vec<Allow>,

    sent_by: SocketAddr,
    outbound_proxy: Option<SocketAddr>,

    transactions: TransactionManager,

    layer: Box<[Box<dyn Layer>]>,
}

impl Endpoint {
    /// Construct a new [`EndpointBuilder`]
    pub fn builder() -> EndpointBuilder {
        EndpointBuilder::new()
    }

    pub fn transactions(&self) -> &TransactionManager {
        &self.inner.transactions
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        self.inner.transactions.transport()
    }

    /// Address put into the `Via` and `Contact` headers
    pub fn sent_by(&self) -> SocketAddr {
        self.inner.sent_by
    }

    /// Returns all ALLOW headers this endpoint supports
    pub fn allowed(&self) -> &[Allow] {
        &self.inner.allow
    }

    /// Returns all ACCEPT headers this endpoint supports
    pub fn accepted(&self) -> &[Accept] {
        &self.inner.accept
    }

    /// Create a VIA header with a fresh branch
    pub fn create_via(&self) -> Via {
        Via::new(
            self.transport().name(),
            self.sent_by().to_string(),
            crate::transaction::generate_branch(),
        )
    }

    /// Insert a new topmost VIA header into the request
    pub fn add_via(&self, request: &mut Request) {
        request.headers.insert_named_front(&self.create_via());
    }

    /// Find the address the request must be sent to.
    ///
    /// Uses the outbound proxy if configured, else the topmost `Route` or the request URI.
    pub async fn destination_for(&self, request: &Request) -> Result<SocketAddr> {
        if let Some(proxy) = self.inner.outbound_proxy {
            return Ok(proxy);
        }

        let route = match request.headers.try_get::<Vec<Routing>>(Name::ROUTE) {
            Some(Ok(routes)) => routes.into_iter().next().map(|route| route.uri.uri),
            Some(Err(e)) => return Err(e.into()),
            None => None,
        };

        let uri = route.unwrap_or_else(|| request.line.uri.clone());

        resolve(&uri).await
    }

    /// Send a request, tracking it inside a transaction context until a response is received.
    ///
    /// Adds a VIA header if the request has none.
    pub async fn send_request(&self, mut request: Request) -> Result<PendingTransaction> {
        if !request.headers.contains(&Name::VIA) {
            self.add_via(&mut request);
        }

        let destination = self.destination_for(&request).await?;

        log::debug!("sending {request} to {destination}");

        self.transactions()
            .send_and_track(OutgoingMessage::new(request, destination))
            .await
    }

    /// Send a request which is not answered (ACK)
    pub async fn send_ack(&self, mut request: Request) -> Result<()> {
        debug_assert_eq!(request.line.method, Method::ACK);

        if !request.headers.contains(&Name::VIA) {
            self.add_via(&mut request);
        }

        let destination = self.destination_for(&request).await?;

        self.send_untracked(request, destination).await
    }

    /// Send a response back to where the request came from
    pub async fn send_response(&self, request: &IncomingRequest, response: Response) -> Result<()> {
        log::debug!("responding {response} to {request}");

        self.send_untracked(response, request.source).await
    }

    /// Send a 2xx response to an INVITE, it is retransmitted until the ACK arrives.
    ///
    /// The ACK is delivered through the returned [`PendingTransaction`].
    pub async fn send_accept(
        &self,
        request: &IncomingRequest,
        response: Response,
    ) -> Result<PendingTransaction> {
        debug_assert_eq!(request.line.method, Method::INVITE);
        debug_assert_eq!(response.code().kind(), CodeKind::Success);

        log::debug!("accepting {request} with {response}");

        self.transactions()
            .send_and_track(OutgoingMessage::new(response, request.source))
            .await
    }

    /// Send a message without creating a transaction context
    pub async fn send_untracked(
        &self,
        message: impl Into<Message>,
        destination: SocketAddr,
    ) -> Result<()> {
        self.transactions()
            .send(OutgoingMessage::new(message, destination))
            .await
    }

    /// Create a response to an incoming request with a given status code and optional reason
    pub fn create_response(
        &self,
        request: &IncomingRequest,
        code: Code,
        reason: Option<BytesStr>,
    ) -> Response {
        let mut headers = Headers::with_capacity(5);

        for via in &request.base_headers.via {
            headers.insert_named(via);
        }

        let mut to = request.base_headers.to.clone();
        if to.tag.is_none() && code != Code::TRYING {
            to.tag = Some(request.local_tag.clone());
        }

        headers.insert_type(Name::FROM, &request.base_headers.from);
        headers.insert_type(Name::TO, &to);
        headers.insert_named(&request.base_headers.call_id);
        headers.insert_named(&request.base_headers.cseq);

        Response {
            line: StatusLine { code, reason },
            headers,
            body: Bytes::new(),
        }
    }

    /// Pass a received datagram to the endpoint for further processing
    ///
    /// Spawns a task internally which records the message with the transaction manager and
    /// lets every registered layer have a look at new requests.
    pub fn receive(&self, bytes: Bytes, source: SocketAddr) {
        tokio::spawn(self.clone().do_receive(bytes, source));
    }

    #[tracing::instrument(level = "debug", skip(self, bytes))]
    async fn do_receive(self, bytes: Bytes, source: SocketAddr) {
        let message = match Message::parse(bytes) {
            Ok(message) => message,
            Err(e) => {
                log::debug!("discarding unparsable message from {source}, {e}");
                return;
            }
        };

        log::trace!("received {message} from {source}");

        match self.transactions().record_incoming(&message, source).await {
            Incoming::NewRequest => {}
            Incoming::Matched | Incoming::Retransmission => return,
            Incoming::Unmatched => {
                log::debug!("dropping unmatched {message}");
                return;
            }
        }

        let Message::Request(request) = message else {
            return;
        };

        let base_headers = match BaseHeaders::extract_from(&request.headers) {
            Ok(base_headers) => base_headers,
            Err(e) => {
                log::warn!("Failed to get base headers for incoming request, {e}");
                return;
            }
        };

        let local_tag = base_headers
            .to
            .tag
            .clone()
            .unwrap_or_else(|| random_tag().into());

        let incoming = IncomingRequest {
            source,
            tsx_key: TsxKey::from_base_headers(&base_headers),
            local_tag,
            line: request.line,
            base_headers,
            headers: request.headers,
            body: request.body,
        };

        let mut request = Some(incoming);

        for layer in self.inner.layer.iter() {
            let span = tracing::info_span!("receive", layer = %layer.name());

            layer
                .receive(&self, MayTake::new(&mut request))
                .instrument(span)
                .await;

            if request.is_none() {
                return;
            }
        }

        let Some(request) = request else {
            return;
        };

        log::debug!("No layer handled {request}");

        if let Err(e) = self.handle_unwanted_request(request).await {
            log::error!("Failed to respond to unhandled incoming request, {e}");
        }
    }

    async fn handle_unwanted_request(&self, request: IncomingRequest) -> Result<()> {
        if request.line.method == Method::ACK {
            // Cannot respond to unhandled ACK requests
            return Ok(());
        }

        let response = self.create_response(&request, Code::NOT_IMPLEMENTED, None);

        self.send_response(&request, response).await
    }

    /// Access a layer inside the endpoint
    ///
    /// Panics if the layer does not exist in the endpoint
    pub fn layer<L: Layer>(&self) -> &L {
        self.inner
            .layer
            .iter()
            .find_map(|l| l.downcast_ref())
            .unwrap_or_else(|| panic!("endpoint is missing layer {}", type_name::<L>()))
    }
}

async fn resolve(uri: &Uri) -> Result<SocketAddr> {
    let Some(host_port) = uri.host_port() else {
        bail_status!(Code::BAD_REQUEST, "cannot route to {uri}");
    };

    // bracketed IPv6 or a port makes it a complete socket address
    let lookup = if host_port.ends_with(']') || !host_port.contains(':') {
        format!("{host_port}:{DEFAULT_PORT}")
    } else {
        host_port.to_string()
    };

    let mut addresses = tokio::net::lookup_host(lookup.as_str()).await?;

    match addresses.next() {
        Some(address) => Ok(address),
        None => bail_status!(Code::NOT_FOUND, "no address found for {uri}"),
    }
}

fn random_tag() -> String {
    use rand::distr::Alphanumeric;
    use rand::{Rng, rng};

    rng()
        .sample_iter(Alphanumeric)
        .take(16)
        .map(char::from)
        .collect()
}

/// [`EndpointBuilder::build`] was called without setting a transport
#[derive(Debug, thiserror::Error)]
#[error("endpoint requires a transport")]
pub struct MissingTransport;

/// Builder instance for [`Endpoint`]
pub struct EndpointBuilder {
    sender: broadcast::Sender<Endpoint>,

    // capabilities
    accept: Vec<Accept>,
    allow: Vec<Allow>,

    transport: Option<Arc<dyn Transport>>,
    timer_config: TimerConfig,
    sent_by: Option<SocketAddr>,
    outbound_proxy: Option<SocketAddr>,

    layer: Vec<Box<dyn Layer>>,
}

impl Default for EndpointBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl EndpointBuilder {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(1);

        Self {
            sender,
            accept: vec![],
            allow: vec![],
            transport: None,
            timer_config: TimerConfig::default(),
            sent_by: None,
            outbound_proxy: None,
            layer: Default::default(),
        }
    }

    /// Add an ACCEPT header to the endpoints capabilities
    pub fn add_accept<A>(&mut self, accepted: A)
    where
        A: Into<BytesStr>,
    {
        self.accept.push(Accept(accepted.into()))
    }

    /// Add an ALLOW header to the endpoints capabilities
    pub fn add_allow(&mut self, allowed: Method) {
        if !self.allow.iter().any(|Allow(method)| *method == allowed) {
            self.allow.push(Allow(allowed))
        }
    }

    /// Set the transport used for all messages
    pub fn set_transport<T: Transport>(&mut self, transport: T) -> &mut Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    pub fn set_timer_config(&mut self, config: TimerConfig) -> &mut Self {
        self.timer_config = config;
        self
    }

    /// Override the address announced in VIA and Contact headers (e.g. a public address)
    pub fn set_sent_by(&mut self, sent_by: SocketAddr) -> &mut Self {
        self.sent_by = Some(sent_by);
        self
    }

    /// Send all requests to this address instead of resolving their target
    pub fn set_outbound_proxy(&mut self, proxy: SocketAddr) -> &mut Self {
        self.outbound_proxy = Some(proxy);
        self
    }

    /// Add a implementation of [`Layer`] to the endpoint.
    ///
    /// Note that the insertion order is relevant in how the stack may react to requests,
    /// as its the same order in that layers are called on incoming requests.
    ///
    /// Layers can be accessed using [`Endpoint::layer`]
    pub fn add_layer<L>(&mut self, layer: L)
    where
        L: Layer,
    {
        self.layer.push(Box::new(layer));
    }

    /// "Subscribe" to the creation of the endpoint.
    ///
    /// The broadcast channel will receive the endpoint on successful creation or error if the
    /// builder is prematurely dropped. On error any task waiting for the endpoint should exit.
    pub fn subscribe(&self) -> broadcast::Receiver<Endpoint> {
        self.sender.subscribe()
    }

    /// Complete building the endpoint, must be called inside a tokio runtime
    pub fn build(&mut self) -> Result<Endpoint, MissingTransport> {
        let mut layer = take(&mut self.layer).into_boxed_slice();
        for layer in layer.iter_mut() {
            layer.init(self);
        }

        let transport = self.transport.take().ok_or(MissingTransport)?;
        let sent_by = self.sent_by.unwrap_or_else(|| transport.bound());

        let inner = Inner {
            accept: take(&mut self.accept),
            allow: take(&mut self.allow),
            sent_by,
            outbound_proxy: self.outbound_proxy,
            transactions: TransactionManager::new(transport, self.timer_config),
            layer,
        };

        let endpoint = Endpoint {
            inner: Arc::new(inner),
        };

        let _ = self.sender.send(endpoint.clone());

        Ok(endpoint)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::transport::{MemoryInbox, MemoryTransport};
    use sip_types::header::typed::FromTo;
    use std::time::Duration;

    fn alice() -> SocketAddr {
        "10.0.0.1:5060".parse().unwrap()
    }

    fn bob() -> SocketAddr {
        "10.0.0.2:5060".parse().unwrap()
    }

    struct Echo;

    #[async_trait::async_trait]
    impl Layer for Echo {
        fn name(&self) -> &'static str {
            "echo"
        }

        fn init(&mut self, endpoint: &mut EndpointBuilder) {
            endpoint.add_allow(Method::MESSAGE);
        }

        async fn receive(&self, endpoint: &Endpoint, request: MayTake<'_, IncomingRequest>) {
            if request.line.method != Method::MESSAGE {
                return;
            }

            let request = request.take();
            let mut response = endpoint.create_response(&request, Code::OK, None);
            response.body = request.body.clone();

            endpoint.send_response(&request, response).await.unwrap();
        }
    }

    fn endpoint_with_peer() -> (Endpoint, MemoryTransport, MemoryInbox) {
        let _ = env_logger::builder().is_test(true).try_init();

        let ((a_tp, a_inbox), (b_tp, b_inbox)) = MemoryTransport::pair(alice(), bob());

        let mut builder = Endpoint::builder();
        builder.add_layer(Echo);
        a_tp.attach(a_inbox, &mut builder);

        (builder.build().unwrap(), b_tp, b_inbox)
    }

    fn raw_request(method: &str, cseq: u32) -> Bytes {
        format!(
            "{method} sip:alice@10.0.0.1 SIP/2.0\r\n\
            Via: SIP/2.0/MEM 10.0.0.2:5060;branch=z9hG4bKraw{cseq}\r\n\
            From: <sip:bob@10.0.0.2>;tag=b1\r\n\
            To: <sip:alice@10.0.0.1>\r\n\
            Call-ID: raw-call\r\n\
            CSeq: {cseq} {method}\r\n\
            Content-Length: 5\r\n\
            \r\n\
            hello"
        )
        .into()
    }

    async fn next_response(inbox: &mut MemoryInbox) -> Response {
        let (bytes, _) = inbox.recv().await.unwrap();

        match Message::parse(bytes).unwrap() {
            Message::Response(response) => response,
            Message::Request(request) => panic!("expected response, got {request}"),
        }
    }

    #[tokio::test]
    async fn layer_handles_request() {
        let (endpoint, peer, mut inbox) = endpoint_with_peer();
        assert_eq!(endpoint.allowed(), [Allow(Method::MESSAGE)]);

        peer.send(&raw_request("MESSAGE", 1), alice()).await.unwrap();

        let response = next_response(&mut inbox).await;
        assert_eq!(response.code(), Code::OK);
        assert_eq!(response.body, Bytes::from_static(b"hello"));

        let to: FromTo = response.headers.get(Name::TO).unwrap();
        assert!(to.tag.is_some());
    }

    #[tokio::test]
    async fn unhandled_request_is_not_implemented() {
        let (_endpoint, peer, mut inbox) = endpoint_with_peer();

        peer.send(&raw_request("INFO", 2), alice()).await.unwrap();

        assert_eq!(next_response(&mut inbox).await.code(), Code::NOT_IMPLEMENTED);
    }

    #[tokio::test(start_paused = true)]
    async fn unhandled_ack_is_dropped() {
        let (_endpoint, peer, mut inbox) = endpoint_with_peer();

        peer.send(&raw_request("ACK", 3), alice()).await.unwrap();

        assert!(
            tokio::time::timeout(Duration::from_secs(1), inbox.recv())
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn retransmitted_request_gets_same_response() {
        let (_endpoint, peer, mut inbox) = endpoint_with_peer();

        peer.send(&raw_request("MESSAGE", 4), alice()).await.unwrap();
        let first = next_response(&mut inbox).await;

        peer.send(&raw_request("MESSAGE", 4), alice()).await.unwrap();
        let second = next_response(&mut inbox).await;

        let first: FromTo = first.headers.get(Name::TO).unwrap();
        let second: FromTo = second.headers.get(Name::TO).unwrap();
        assert_eq!(first.tag, second.tag);
    }

    #[tokio::test]
    async fn build_without_transport() {
        assert!(Endpoint::builder().build().is_err());
    }

    #[tokio::test]
    async fn outbound_proxy_wins() {
        let ((tp, _inbox), _) = MemoryTransport::pair(alice(), bob());
        let proxy: SocketAddr = "192.0.2.1:5060".parse().unwrap();

        let mut builder = Endpoint::builder();
        builder.set_transport(tp).set_outbound_proxy(proxy);
        let endpoint = builder.build().unwrap();

        let request = Request::new(Method::OPTIONS, Uri::new("sip:bob@example.org").unwrap());
        assert_eq!(endpoint.destination_for(&request).await.unwrap(), proxy);
    }

    #[tokio::test]
    async fn route_before_request_uri() {
        let ((tp, _inbox), _) = MemoryTransport::pair(alice(), bob());

        let mut builder = Endpoint::builder();
        builder.set_transport(tp);
        let endpoint = builder.build().unwrap();

        let mut request = Request::new(Method::OPTIONS, Uri::new("sip:bob@198.51.100.7").unwrap());
        assert_eq!(
            endpoint.destination_for(&request).await.unwrap(),
            "198.51.100.7:5060".parse::<SocketAddr>().unwrap()
        );

        request.headers.insert(Name::ROUTE, "<sip:198.51.100.1:5070;lr>");
        assert_eq!(
            endpoint.destination_for(&request).await.unwrap(),
            "198.51.100.1:5070".parse::<SocketAddr>().unwrap()
        );
    }
}

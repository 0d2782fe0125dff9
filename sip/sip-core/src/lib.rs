//! Core part of the RCS signaling engine
//!
//! Provides the message types, transports, the transaction & retransmission manager and the
//! [`Endpoint`] which ties them together and dispatches incoming requests to [`Layer`]s.

use bytes::{BufMut, Bytes, BytesMut};
use downcast_rs::{Downcast, impl_downcast};
use sip_types::header::HeaderError;
use sip_types::header::typed::{CSeq, CallID, FromTo, Via};
use sip_types::msg::{MessageLine, RequestLine, StatusLine};
use sip_types::uri::Uri;
use sip_types::{Code, Headers, Method, Name};
use std::fmt;
use std::fmt::Write;
use std::net::SocketAddr;
use transaction::TsxKey;

#[macro_use]
mod error;
mod endpoint;
mod may_take;
pub mod transaction;
pub mod transport;

pub use endpoint::{Endpoint, EndpointBuilder, MissingTransport};
pub use error::{Error, Result, WithStatus};
pub use may_take::MayTake;

#[doc(hidden)]
pub use anyhow;

/// Basic Response
#[derive(Debug, Clone)]
pub struct Response {
    pub line: StatusLine,
    pub headers: Headers,
    pub body: Bytes,
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.line, f)
    }
}

impl Response {
    pub fn new(code: Code) -> Self {
        Self {
            line: StatusLine { code, reason: None },
            headers: Headers::new(),
            body: Bytes::new(),
        }
    }

    pub fn code(&self) -> Code {
        self.line.code
    }
}

/// Basic request
#[derive(Debug, Clone)]
pub struct Request {
    pub line: RequestLine,
    pub headers: Headers,
    pub body: Bytes,
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.line, f)
    }
}

impl Request {
    /// Create an empty request
    pub fn new(method: Method, uri: Uri) -> Self {
        Self {
            line: RequestLine { method, uri },
            headers: Default::default(),
            body: Bytes::new(),
        }
    }

    pub fn method(&self) -> &Method {
        &self.line.method
    }
}

/// Either a request or a response
#[derive(Debug, Clone)]
pub enum Message {
    Request(Request),
    Response(Response),
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Message::Request(request) => fmt::Display::fmt(request, f),
            Message::Response(response) => fmt::Display::fmt(response, f),
        }
    }
}

impl Message {
    /// Parse a complete message from a datagram
    pub fn parse(buffer: Bytes) -> Result<Self, transport::ParseError> {
        let (line, headers, body) = transport::parse_message(buffer)?;

        Ok(match line {
            MessageLine::Request(line) => Message::Request(Request {
                line,
                headers,
                body,
            }),
            MessageLine::Response(line) => Message::Response(Response {
                line,
                headers,
                body,
            }),
        })
    }

    pub fn headers(&self) -> &Headers {
        match self {
            Message::Request(request) => &request.headers,
            Message::Response(response) => &response.headers,
        }
    }

    pub fn headers_mut(&mut self) -> &mut Headers {
        match self {
            Message::Request(request) => &mut request.headers,
            Message::Response(response) => &mut response.headers,
        }
    }

    pub fn body(&self) -> &Bytes {
        match self {
            Message::Request(request) => &request.body,
            Message::Response(response) => &response.body,
        }
    }

    /// Print the message into its wire format, setting `Content-Length` to the body size
    pub fn to_bytes(&mut self) -> Bytes {
        let body_len = self.body().len();
        let headers = self.headers_mut();
        headers.remove(&Name::CONTENT_LENGTH);
        headers.insert(Name::CONTENT_LENGTH, body_len.to_string());

        let mut buffer = String::new();

        // Writing into a String cannot fail
        let _ = match self {
            Message::Request(request) => {
                write!(buffer, "{}\r\n{}\r\n", request.line, request.headers)
            }
            Message::Response(response) => {
                write!(buffer, "{}\r\n{}\r\n", response.line, response.headers)
            }
        };

        let mut bytes = BytesMut::with_capacity(buffer.len() + body_len);
        bytes.put(buffer.as_bytes());
        bytes.put(self.body().clone());
        bytes.freeze()
    }
}

impl From<Request> for Message {
    fn from(request: Request) -> Self {
        Message::Request(request)
    }
}

impl From<Response> for Message {
    fn from(response: Response) -> Self {
        Message::Response(response)
    }
}

/// Parsed SIP headers that are part of every message
#[derive(Debug, Clone)]
pub struct BaseHeaders {
    /// All via headers, must be guaranteed to not be empty
    pub via: Vec<Via>,
    pub from: FromTo,
    pub to: FromTo,
    pub call_id: CallID,
    pub cseq: CSeq,
}

impl BaseHeaders {
    pub fn extract_from(headers: &Headers) -> Result<Self, HeaderError> {
        let via: Vec<Via> = headers.get_named()?;

        if via.is_empty() {
            return Err(HeaderError::missing(Name::VIA));
        }

        Ok(BaseHeaders {
            via,
            from: headers.get(Name::FROM)?,
            to: headers.get(Name::TO)?,
            call_id: headers.get_named()?,
            cseq: headers.get_named()?,
        })
    }
}

/// Request received by the endpoint and passed to every layer
#[derive(Debug)]
pub struct IncomingRequest {
    /// Address the request was received from, responses are sent back there
    pub source: SocketAddr,
    pub tsx_key: TsxKey,

    /// Tag put into the `To` header of responses if the request has none
    pub local_tag: bytesstr::BytesStr,

    pub line: RequestLine,
    pub base_headers: BaseHeaders,
    pub headers: Headers,
    pub body: Bytes,
}

impl fmt::Display for IncomingRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.line, f)
    }
}

impl IncomingRequest {
    /// Make a clone of the request data
    pub fn clone_request(&self) -> Request {
        Request {
            line: self.line.clone(),
            headers: self.headers.clone(),
            body: self.body.clone(),
        }
    }
}

/// Layers are extensions to the endpoint.
///
/// They can be added to the endpoint in the building stage by calling
/// [`EndpointBuilder::add_layer`], and later be accessed via [`Endpoint::layer`].
#[async_trait::async_trait]
pub trait Layer: Downcast + Send + Sync + 'static {
    /// Return a descriptive and unique name of the layer
    fn name(&self) -> &'static str;

    /// When building the endpoint each layer may make modifications to the [`EndpointBuilder`]
    fn init(&mut self, _endpoint: &mut EndpointBuilder) {}

    /// Whenever the endpoint receives a new request it will call this function
    /// on each layer (in insertion order).
    ///
    /// The message is wrapped inside a [`MayTake`] which allows the layer to inspect
    /// and modify the request or take ownership of it. If it takes the request the
    /// endpoint will not pass the request to the remaining layers.
    async fn receive(&self, endpoint: &Endpoint, request: MayTake<'_, IncomingRequest>);
}

impl_downcast!(Layer);

//! Per session dialog state: tags, route set, CSeq, SDP and lifecycle

use crate::util::{random_sequence_number, random_string};
use bytes::Bytes;
use bytesstr::BytesStr;
use sip_core::{IncomingRequest, Request, Response};
use sip_types::header::HeaderError;
use sip_types::header::typed::{CSeq, CallID, Contact, FromTo, MaxForwards, Routing, Via};
use sip_types::uri::{NameAddr, Uri};
use sip_types::{CodeKind, Method, Name};

mod route;
mod state;

pub use route::{Role, route_from_record_route};
pub use state::DialogState;

const MAX_FORWARDS: u32 = 70;

/// State of a single dialog, owned by the session that created it.
///
/// Identified by the Call-ID and the local tag.
#[derive(Debug)]
pub struct DialogPath {
    role: Role,
    state: DialogState,

    call_id: CallID,
    local: FromTo,
    remote: FromTo,

    /// Request-URI of requests sent inside the dialog
    target: Uri,
    local_contact: Contact,

    local_cseq: u32,
    remote_cseq: Option<u32>,

    route_set: Vec<Routing>,

    local_sdp: Option<Bytes>,
    remote_sdp: Option<Bytes>,
}

impl DialogPath {
    /// Dialog for a session this side initiates.
    ///
    /// A fresh local tag is generated. The `service_route` is used as route set until
    /// the dialog learns one from `Record-Route`.
    pub fn originating(
        call_id: CallID,
        local: NameAddr,
        remote: NameAddr,
        target: Uri,
        local_contact: Contact,
        service_route: Vec<Routing>,
    ) -> Self {
        Self {
            role: Role::Caller,
            state: DialogState::Initial,
            call_id,
            local: FromTo::new(local, Some(random_string())),
            remote: FromTo::new(remote, None),
            target,
            local_contact,
            local_cseq: random_sequence_number(),
            remote_cseq: None,
            route_set: service_route,
            local_sdp: None,
            remote_sdp: None,
        }
    }

    /// Dialog for a received INVITE.
    ///
    /// The route set is taken from `Record-Route` in order of receipt, the remote target from `Contact`.
    pub fn terminating(
        request: &IncomingRequest,
        local_tag: BytesStr,
        local_contact: Contact,
    ) -> Result<Self, HeaderError> {
        let base_headers = &request.base_headers;

        let contact: Contact = request.headers.get_named()?;
        let record_route: Vec<Routing> = request
            .headers
            .try_get(Name::RECORD_ROUTE)
            .transpose()?
            .unwrap_or_default();

        let mut local = base_headers.to.clone();
        local.tag = Some(local_tag);

        Ok(Self {
            role: Role::Callee,
            state: DialogState::Initial,
            call_id: base_headers.call_id.clone(),
            local,
            remote: base_headers.from.clone(),
            target: contact.uri.uri,
            local_contact,
            local_cseq: random_sequence_number(),
            remote_cseq: Some(base_headers.cseq.cseq),
            route_set: route_from_record_route(record_route, Role::Callee),
            local_sdp: None,
            remote_sdp: None,
        })
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn call_id(&self) -> &CallID {
        &self.call_id
    }

    pub fn local(&self) -> &FromTo {
        &self.local
    }

    pub fn remote(&self) -> &FromTo {
        &self.remote
    }

    pub fn target(&self) -> &Uri {
        &self.target
    }

    pub fn route_set(&self) -> &[Routing] {
        &self.route_set
    }

    pub fn local_cseq(&self) -> u32 {
        self.local_cseq
    }

    pub fn remote_cseq(&self) -> Option<u32> {
        self.remote_cseq
    }

    pub fn local_sdp(&self) -> Option<&Bytes> {
        self.local_sdp.as_ref()
    }

    pub fn remote_sdp(&self) -> Option<&Bytes> {
        self.remote_sdp.as_ref()
    }

    pub fn set_remote_tag(&mut self, tag: BytesStr) {
        self.remote.tag = Some(tag);
    }

    pub fn set_route(&mut self, route_set: Vec<Routing>) {
        self.route_set = route_set;
    }

    pub fn increment_cseq(&mut self) -> u32 {
        self.local_cseq += 1;
        self.local_cseq
    }

    pub fn set_local_sdp(&mut self, sdp: Bytes) {
        self.local_sdp = Some(sdp);
    }

    pub fn set_remote_sdp(&mut self, sdp: Bytes) {
        self.remote_sdp = Some(sdp);
    }

    /// Remember the CSeq of a request received inside the dialog
    pub fn set_remote_cseq(&mut self, cseq: u32) {
        self.remote_cseq = Some(cseq);
    }

    /// Build a new request inside the dialog using a fresh CSeq number
    pub fn create_request(&mut self, method: Method) -> Request {
        let cseq = self.increment_cseq();

        let mut request = Request::new(method.clone(), self.target.clone());

        request.headers.insert_named(&MaxForwards(MAX_FORWARDS));
        request.headers.insert_type(Name::FROM, &self.local);
        request.headers.insert_type(Name::TO, &self.remote);
        request.headers.insert_named(&self.call_id);
        request.headers.insert_named(&CSeq::new(cseq, method));

        for route in &self.route_set {
            request.headers.insert_type(Name::ROUTE, route);
        }

        request.headers.insert_named(&self.local_contact);

        request
    }

    /// Build the ACK for a final response to `invite`.
    ///
    /// A 2xx is acknowledged with a new transaction to the remote target, any other
    /// final response inside the INVITE's transaction (same branch, request URI and routes).
    pub fn create_ack(&self, invite: &Request, response: &Response) -> Result<Request, HeaderError> {
        let CSeq { cseq, .. } = invite.headers.get_named()?;

        if response.code().kind() == CodeKind::Success {
            let mut ack = Request::new(Method::ACK, self.target.clone());

            ack.headers.insert_named(&MaxForwards(MAX_FORWARDS));
            ack.headers.insert_type(Name::FROM, &self.local);
            ack.headers.insert_type(Name::TO, &self.remote);
            ack.headers.insert_named(&self.call_id);
            ack.headers.insert_named(&CSeq::new(cseq, Method::ACK));

            for route in &self.route_set {
                ack.headers.insert_type(Name::ROUTE, route);
            }

            return Ok(ack);
        }

        let mut ack = Request::new(Method::ACK, invite.line.uri.clone());

        ack.headers.insert_named(&top_via(invite)?);
        ack.headers.insert_named(&MaxForwards(MAX_FORWARDS));
        invite.headers.clone_into(&mut ack.headers, Name::FROM)?;
        response.headers.clone_into(&mut ack.headers, Name::TO)?;
        ack.headers.insert_named(&self.call_id);
        ack.headers.insert_named(&CSeq::new(cseq, Method::ACK));
        copy_routes(invite, &mut ack);

        Ok(ack)
    }

    /// Build a CANCEL for a pending `invite`, matching its transaction
    pub fn create_cancel(&self, invite: &Request) -> Result<Request, HeaderError> {
        let CSeq { cseq, .. } = invite.headers.get_named()?;

        let mut cancel = Request::new(Method::CANCEL, invite.line.uri.clone());

        cancel.headers.insert_named(&top_via(invite)?);
        cancel.headers.insert_named(&MaxForwards(MAX_FORWARDS));
        invite.headers.clone_into(&mut cancel.headers, Name::FROM)?;
        invite.headers.clone_into(&mut cancel.headers, Name::TO)?;
        cancel.headers.insert_named(&self.call_id);
        cancel.headers.insert_named(&CSeq::new(cseq, Method::CANCEL));
        copy_routes(invite, &mut cancel);

        Ok(cancel)
    }

    /// Learn the remote tag, remote target and route set from a response creating the dialog
    pub fn update_from_response(&mut self, response: &Response) -> Result<(), HeaderError> {
        let to: FromTo = response.headers.get(Name::TO)?;

        if let Some(tag) = to.tag {
            self.set_remote_tag(tag);
        }

        if let Some(contact) = response.headers.try_get_named::<Contact>() {
            self.target = contact?.uri.uri;
        }

        if let Some(record_route) = response.headers.try_get::<Vec<Routing>>(Name::RECORD_ROUTE) {
            self.route_set = route_from_record_route(record_route?, self.role);
        }

        Ok(())
    }
}

fn top_via(request: &Request) -> Result<Via, HeaderError> {
    let via: Vec<Via> = request.headers.get_named()?;

    via.into_iter()
        .next()
        .ok_or_else(|| HeaderError::missing(Name::VIA))
}

fn copy_routes(src: &Request, dst: &mut Request) {
    // Absent routes are fine
    let _ = src.headers.clone_into(&mut dst.headers, Name::ROUTE);
}

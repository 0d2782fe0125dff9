use super::task::SessionTask;
use super::{
    CONTENT_TYPE_SDP, Command, Failure, Outcome, SessionEvent, media_ready, parse_sdp,
};
use crate::dialog::DialogPath;
use sdp_types::negotiate;
use sip_core::IncomingRequest;
use sip_types::header::typed::ContentType;
use sip_types::{Code, Method};
use std::pin::pin;
use tokio::select;
use tokio::time::sleep;

enum Decision {
    Accept,
    Reject,
    Cancel(IncomingRequest),
    Unanswered,
}

impl SessionTask {
    #[tracing::instrument(name = "terminating", skip_all, fields(id = %self.registration.id(), call_id = %invite.base_headers.call_id.0))]
    pub(crate) async fn run_terminating(mut self, invite: IncomingRequest) {
        match self.answer(&invite).await {
            Ok(dialog) => {
                self.finish(Outcome::Established);
                self.run_established(dialog).await;
            }
            Err(outcome) => self.finish(outcome),
        }
    }

    async fn answer(&mut self, invite: &IncomingRequest) -> Result<DialogPath, Outcome> {
        let mut dialog =
            match DialogPath::terminating(invite, invite.local_tag.clone(), self.contact.clone()) {
                Ok(dialog) => dialog,
                Err(e) => {
                    log::info!("rejecting malformed INVITE, {e}");
                    self.respond(invite, Code::BAD_REQUEST).await;
                    return Err(Outcome::local(e));
                }
            };

        let offer = match parse_sdp(&invite.headers, &invite.body) {
            Ok(offer) => offer,
            Err(e) => {
                log::info!("rejecting INVITE with unusable offer, {e}");
                self.respond(invite, Code::BAD_REQUEST).await;
                dialog.terminated();
                return Err(Outcome::local(e));
            }
        };

        let negotiated = match negotiate(&self.kind.local_media(), &offer) {
            Ok(negotiated) => negotiated,
            Err(e) => {
                log::info!("rejecting INVITE, {e}");
                self.respond(invite, Code::UNSUPPORTED_MEDIA_TYPE).await;
                dialog.terminated();
                return Err(Outcome::rejected(Code::UNSUPPORTED_MEDIA_TYPE, None));
            }
        };

        dialog.set_remote_sdp(invite.body.clone());

        let mut ringing = self.endpoint.create_response(invite, Code::RINGING, None);
        ringing.headers.insert_named(&self.contact);

        if let Err(e) = self.endpoint.send_response(invite, ringing).await {
            log::warn!("failed to send 180 Ringing, {e}");
        }

        self.publish(SessionEvent::Ringing);

        match self.await_decision().await {
            Decision::Accept => {}
            Decision::Reject => {
                self.respond(invite, Code::DECLINE).await;
                dialog.terminated();
                return Err(Outcome::Declined);
            }
            Decision::Unanswered => {
                log::info!("incoming session not answered in time");
                self.respond(invite, Code::DECLINE).await;
                dialog.terminated();
                return Err(Outcome::Failed(Failure::Timeout));
            }
            Decision::Cancel(cancel) => {
                self.respond(&cancel, Code::OK).await;
                self.respond(invite, Code::REQUEST_TERMINATED).await;
                dialog.cancelled();
                return Err(Outcome::Cancelled);
            }
        }

        let answer = match self.kind.build_answer(&negotiated) {
            Ok(answer) => answer,
            Err(e) => {
                log::warn!("failed to build SDP answer, {e}");
                self.respond(invite, Code::SERVER_INTERNAL_ERROR).await;
                dialog.terminated();
                return Err(Outcome::local(e));
            }
        };

        let mut ok = self.endpoint.create_response(invite, Code::OK, None);
        ok.headers.insert_named(&self.contact);
        for allow in self.endpoint.allowed() {
            ok.headers.insert_named(allow);
        }
        ok.headers.insert_named(&ContentType::new(CONTENT_TYPE_SDP));
        ok.body = answer.clone();

        dialog.set_local_sdp(answer);

        let mut pending = match self.endpoint.send_accept(invite, ok).await {
            Ok(pending) => pending,
            Err(e) => {
                dialog.terminated();
                return Err(Outcome::local(e));
            }
        };

        dialog.signaling_established();

        let ack = self
            .endpoint
            .transactions()
            .await_ack(&mut pending, self.config.ack_timeout)
            .await;

        if ack.is_none() {
            log::info!("200 OK to INVITE was never acknowledged");

            if self.answer_queued_requests().await {
                dialog.terminated_by_remote();
            } else {
                self.send_bye(&mut dialog).await;
                dialog.terminated();
            }

            return Err(Outcome::Failed(Failure::Timeout));
        }

        if self.is_interrupted() {
            log::debug!("interrupted before the ACK arrived, ending the session");
            self.send_bye(&mut dialog).await;
            dialog.terminated();
            return Err(Outcome::Cancelled);
        }

        dialog.session_established();

        self.kind.on_established(&dialog);

        for media in media_ready(&offer, &negotiated) {
            self.kind.on_media_ready(media);
        }

        Ok(dialog)
    }

    /// Answer the requests received while waiting for the ACK, the dialog is about to end.
    ///
    /// Returns whether the peer already sent a BYE.
    async fn answer_queued_requests(&mut self) -> bool {
        let mut bye = false;

        while let Ok(request) = self.registration.requests.try_recv() {
            match request.line.method {
                Method::BYE => {
                    bye = true;
                    self.respond(&request, Code::OK).await;
                }
                Method::ACK => {}
                _ => {
                    self.respond(&request, Code::CALL_OR_TRANSACTION_DOES_NOT_EXIST)
                        .await;
                }
            }
        }

        bye
    }

    /// Wait for the local user to accept or reject while ringing
    async fn await_decision(&mut self) -> Decision {
        let mut ringing = pin!(sleep(self.config.ringing_period));

        loop {
            select! {
                _ = &mut ringing => return Decision::Unanswered,
                Some(command) = self.commands.recv() => {
                    match command {
                        Command::Accept => return Decision::Accept,
                        Command::Reject | Command::Terminate => return Decision::Reject,
                    }
                }
                Some(request) = self.registration.requests.recv() => {
                    if request.line.method == Method::CANCEL {
                        return Decision::Cancel(request);
                    }

                    log::debug!("{request} received while ringing");
                    self.respond(&request, Code::CALL_OR_TRANSACTION_DOES_NOT_EXIST).await;
                }
            }
        }
    }
}

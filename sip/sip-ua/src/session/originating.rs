use super::task::SessionTask;
use super::{CONTENT_TYPE_SDP, Command, Outcome, SessionEvent, media_ready, parse_sdp};
use crate::dialog::DialogPath;
use sdp_types::{LocalMedia, negotiate};
use sip_auth::{AuthAgent, RequestParts, ResponseParts};
use sip_core::transaction::PendingTransaction;
use sip_core::{Request, Response};
use sip_types::header::typed::{ContentType, UserAgent};
use sip_types::{Code, CodeKind, Method};
use tokio::select;
use tokio::time::Instant;

/// Final response to an INVITE and whether a CANCEL was sent while waiting for it
struct Answer {
    response: Response,
    cancelled: bool,
}

impl SessionTask {
    #[tracing::instrument(name = "originating", skip_all, fields(id = %self.registration.id(), call_id = %dialog.call_id().0))]
    pub(crate) async fn run_originating(mut self, mut dialog: DialogPath) {
        match self.originate(&mut dialog).await {
            Ok(()) => {
                self.finish(Outcome::Established);
                self.run_established(dialog).await;
            }
            Err(outcome) => self.finish(outcome),
        }
    }

    /// Send the INVITE and classify its final response.
    ///
    /// A 401/407 is answered once with credentials, a second challenge ends the attempt.
    async fn originate(&mut self, dialog: &mut DialogPath) -> Result<(), Outcome> {
        let mut auth = AuthAgent::new(self.identity.digest_user());
        let local_media = self.kind.local_media();
        let wait = self.config.ringing_period + self.config.transaction_timeout;

        let mut challenged = false;

        loop {
            let invite = self.build_invite(dialog, &mut auth)?;

            let mut pending = self
                .endpoint
                .send_request(invite.clone())
                .await
                .map_err(Outcome::local)?;

            let Some(answer) = self.await_answer(dialog, &invite, &mut pending, wait).await
            else {
                log::info!("INVITE {} not answered in time", dialog.call_id().0);
                dialog.terminated();
                return Err(Outcome::Failed(super::Failure::Timeout));
            };

            let Answer {
                response,
                cancelled,
            } = answer;

            let code = response.code();

            if code.kind() == CodeKind::Success {
                return self
                    .on_success(dialog, &invite, response, cancelled, &local_media, &mut auth)
                    .await;
            }

            self.acknowledge(dialog, &invite, &response).await;

            if matches!(
                code,
                Code::UNAUTHORIZED | Code::PROXY_AUTHENTICATION_REQUIRED
            ) && !challenged
                && !cancelled
            {
                challenged = true;

                let parts = ResponseParts {
                    line: &response.line,
                    headers: &response.headers,
                };

                match auth.read_challenge(parts) {
                    Ok(()) => {
                        log::debug!("retrying INVITE with credentials");
                        continue;
                    }
                    Err(e) => log::warn!("cannot answer challenge, {e}"),
                }
            }

            return Err(classify_failure(dialog, response));
        }
    }

    fn build_invite(
        &mut self,
        dialog: &mut DialogPath,
        auth: &mut AuthAgent,
    ) -> Result<Request, Outcome> {
        let mut invite = dialog.create_request(Method::INVITE);

        if let Some(user_agent) = &self.config.user_agent {
            invite
                .headers
                .insert_named(&UserAgent::new(user_agent.as_str()));
        }

        let offer = self
            .kind
            .build_initial_request(&mut invite)
            .map_err(Outcome::local)?;

        invite
            .headers
            .insert_named(&ContentType::new(CONTENT_TYPE_SDP));
        invite.body = offer.clone();
        dialog.set_local_sdp(offer);

        let parts = RequestParts {
            line: &invite.line,
            body: &invite.body,
        };

        auth.write_credentials(parts, &mut invite.headers)
            .map_err(Outcome::local)?;

        // The Via is needed to build a matching CANCEL
        self.endpoint.add_via(&mut invite);

        Ok(invite)
    }

    /// Wait for the final response, a terminate command sends a CANCEL meanwhile
    async fn await_answer(
        &mut self,
        dialog: &DialogPath,
        invite: &Request,
        pending: &mut PendingTransaction,
        wait: std::time::Duration,
    ) -> Option<Answer> {
        let deadline = Instant::now() + wait;
        let mut cancelled = false;
        let mut ringing = false;

        loop {
            select! {
                response = pending.next_response(deadline) => {
                    let response = response?;
                    let code = response.code();

                    if code.is_final() {
                        return Some(Answer { response, cancelled });
                    }

                    if !ringing && matches!(code, Code::RINGING | Code::SESSION_PROGRESS) {
                        ringing = true;
                        self.publish(SessionEvent::Ringing);
                    }
                }
                Some(command) = self.commands.recv(), if !cancelled => {
                    match command {
                        Command::Terminate => {
                            cancelled = true;
                            self.send_cancel(dialog, invite).await;
                        }
                        Command::Accept | Command::Reject => {
                            log::debug!("ignoring {command:?} on an originating session");
                        }
                    }
                }
            }
        }
    }

    async fn send_cancel(&self, dialog: &DialogPath, invite: &Request) {
        let cancel = match dialog.create_cancel(invite) {
            Ok(cancel) => cancel,
            Err(e) => {
                log::warn!("cannot build CANCEL, {e}");
                return;
            }
        };

        // The CANCEL's own response is not interesting, the INVITE gets a 487
        if let Err(e) = self.endpoint.send_request(cancel).await {
            log::warn!("failed to send CANCEL, {e}");
        }
    }

    async fn acknowledge(&self, dialog: &DialogPath, invite: &Request, response: &Response) {
        let ack = match dialog.create_ack(invite, response) {
            Ok(ack) => ack,
            Err(e) => {
                log::warn!("cannot build ACK for {response}, {e}");
                return;
            }
        };

        if let Err(e) = self.endpoint.send_ack(ack).await {
            log::warn!("failed to send ACK for {response}, {e}");
        }
    }

    async fn on_success(
        &mut self,
        dialog: &mut DialogPath,
        invite: &Request,
        response: Response,
        cancelled: bool,
        local_media: &[LocalMedia],
        auth: &mut AuthAgent,
    ) -> Result<(), Outcome> {
        // Picks up a nextnonce, there is no challenge to fail here
        let _ = auth.read_challenge(ResponseParts {
            line: &response.line,
            headers: &response.headers,
        });

        dialog.signaling_established();

        if let Err(e) = dialog.update_from_response(&response) {
            log::warn!("2xx to INVITE is malformed, {e}");
            self.acknowledge(dialog, invite, &response).await;
            self.send_bye(dialog).await;
            dialog.terminated();
            return Err(Outcome::local(e));
        }

        self.acknowledge(dialog, invite, &response).await;

        if cancelled || self.is_interrupted() {
            log::debug!("INVITE accepted after CANCEL or interruption, ending the session");
            self.send_bye(dialog).await;
            dialog.terminated();
            return Err(Outcome::Cancelled);
        }

        let negotiated = parse_sdp(&response.headers, &response.body).and_then(|answer| {
            let negotiated = negotiate(local_media, &answer)?;
            Ok((answer, negotiated))
        });

        let (answer, negotiated) = match negotiated {
            Ok(negotiated) => negotiated,
            Err(e) => {
                log::warn!("unusable SDP answer, {e}");
                self.send_bye(dialog).await;
                dialog.terminated();
                return Err(Outcome::local(e));
            }
        };

        dialog.set_remote_sdp(response.body.clone());
        dialog.session_established();

        self.kind.on_established(dialog);

        for media in media_ready(&answer, &negotiated) {
            self.kind.on_media_ready(media);
        }

        Ok(())
    }
}

/// Map a final non-2xx response to the outcome, moving the dialog into its terminal state
fn classify_failure(dialog: &mut DialogPath, response: Response) -> Outcome {
    let code = response.code();

    match code {
        Code::DECLINE => {
            dialog.terminated();
            Outcome::Declined
        }
        Code::REQUEST_TERMINATED => {
            dialog.cancelled();
            Outcome::Cancelled
        }
        _ => {
            dialog.terminated();
            Outcome::rejected(code, response.line.reason)
        }
    }
}

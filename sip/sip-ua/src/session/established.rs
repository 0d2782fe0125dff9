use super::task::SessionTask;
use super::{Command, SessionEvent};
use crate::dialog::DialogPath;
use sip_types::{Code, Method};
use tokio::select;

impl SessionTask {
    /// Serve requests inside an established dialog until it ends.
    ///
    /// Session modifications are not supported, re-INVITE and UPDATE are refused.
    /// An aborted session ends the dialog with a BYE.
    pub(crate) async fn run_established(mut self, mut dialog: DialogPath) {
        let interrupt = self.registration.interrupt.clone();

        loop {
            select! {
                _ = interrupt.aborted() => {
                    log::info!("{} aborted, ending the dialog", self.registration.id());
                    self.send_bye(&mut dialog).await;
                    dialog.terminated();
                    return;
                }
                Some(request) = self.registration.requests.recv() => {
                    dialog.set_remote_cseq(request.base_headers.cseq.cseq);

                    match request.line.method {
                        Method::BYE => {
                            self.respond(&request, Code::OK).await;
                            dialog.terminated_by_remote();
                            self.publish(SessionEvent::TerminatedByRemote);
                            return;
                        }
                        Method::INVITE | Method::UPDATE => {
                            self.respond_not_allowed(&request).await;
                        }
                        Method::CANCEL => {
                            // Nothing left to cancel
                            self.respond(&request, Code::OK).await;
                        }
                        Method::ACK => {}
                        _ => self.respond_not_allowed(&request).await,
                    }
                }
                Some(command) = self.commands.recv() => {
                    match command {
                        Command::Terminate => {
                            self.send_bye(&mut dialog).await;
                            dialog.terminated();
                            self.publish(SessionEvent::Terminated);
                            return;
                        }
                        Command::Accept | Command::Reject => {
                            log::debug!("ignoring {command:?}, session is established");
                        }
                    }
                }
                else => {
                    // The registry entry and every handle are gone
                    return;
                }
            }
        }
    }
}

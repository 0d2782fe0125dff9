//! Transaction & retransmission tracking
//!
//! Every request sent over an unreliable transport is retransmitted with exponential backoff
//! starting at [`T1`](consts::T1) until a response is recorded or the [`T2`](consts::T2) horizon
//! is reached. Every context is removed after `T2`, no matter what happened to it.
//!
//! A single timer task serves all contexts of a [`TransactionManager`].

use crate::transport::Transport;
use crate::{Message, Request, Response};
use bytes::Bytes;
use bytesstr::BytesStr;
use parking_lot::Mutex;
use sip_types::Method;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::time::DelayQueue;

mod key;

pub use key::TsxKey;

pub mod consts {
    use std::time::Duration;

    /// Initial retransmission interval
    pub const T1: Duration = Duration::from_millis(500);

    /// Retransmission horizon and lifetime of every transaction context
    pub const T2: Duration = Duration::from_millis(500 * 64);

    pub const RFC3261_BRANCH_PREFIX: &str = "z9hG4bK";
}

/// Timer values used by the [`TransactionManager`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerConfig {
    pub t1: Duration,
    pub t2: Duration,
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            t1: consts::T1,
            t2: consts::T1 * 64,
        }
    }
}

/// Message to be sent to `destination`
#[derive(Debug)]
pub struct OutgoingMessage {
    pub message: Message,
    pub destination: SocketAddr,
}

impl OutgoingMessage {
    pub fn new(message: impl Into<Message>, destination: SocketAddr) -> Self {
        Self {
            message: message.into(),
            destination,
        }
    }
}

/// Result of [`TransactionManager::record_incoming`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Incoming {
    /// No context exists for the message
    Unmatched,
    /// The message was delivered to its context
    Matched,
    /// A request without a context, a new one has been created
    NewRequest,
    /// The message was already seen, the stored reply (if any) has been sent again
    Retransmission,
}

/// Handle to a context created by [`TransactionManager::send_and_track`].
///
/// Receives every message recorded for the context. Dropping it stops delivery,
/// retransmissions continue until a response arrives or the context expires.
#[must_use]
#[derive(Debug)]
pub struct PendingTransaction {
    key: TsxKey,
    slot: Slot,
    waiter_id: u64,
    receiver: mpsc::UnboundedReceiver<Message>,
    manager: TransactionManager,
}

impl PendingTransaction {
    pub fn key(&self) -> &TsxKey {
        &self.key
    }

    /// Receive the next response, provisional or final.
    ///
    /// Returns `None` once `deadline` is reached.
    pub async fn next_response(&mut self, deadline: Instant) -> Option<Response> {
        loop {
            match tokio::time::timeout_at(deadline, self.receiver.recv()).await {
                Ok(Some(Message::Response(response))) => return Some(response),
                Ok(Some(Message::Request(request))) => {
                    log::trace!("ignoring {request} while waiting for a response");
                }
                Ok(None) | Err(_) => return None,
            }
        }
    }

    /// Receive the next request (e.g. the ACK to a tracked 2xx response)
    pub async fn next_request(&mut self, deadline: Instant) -> Option<Request> {
        loop {
            match tokio::time::timeout_at(deadline, self.receiver.recv()).await {
                Ok(Some(Message::Request(request))) => return Some(request),
                Ok(Some(Message::Response(response))) => {
                    log::trace!("ignoring {response} while waiting for a request");
                }
                Ok(None) | Err(_) => return None,
            }
        }
    }
}

impl Drop for PendingTransaction {
    fn drop(&mut self) {
        let mut state = self.manager.inner.state.lock();

        let key = (self.slot, self.key.clone());

        if state
            .waiters
            .get(&key)
            .is_some_and(|waiter| waiter.id == self.waiter_id)
        {
            state.waiters.remove(&key);
        }
    }
}

/// Contexts are kept apart by the side which sent the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Slot {
    /// We sent the request
    Client,
    /// We received the request
    Server,
}

type ContextKey = (Slot, TsxKey);

#[derive(Debug)]
struct Context {
    /// Message being retransmitted
    outgoing: Option<(Bytes, SocketAddr)>,
    /// Message sent again when the peer retransmits (a response, or the ACK to a 2xx)
    replay: Option<(Bytes, SocketAddr)>,
    /// An incoming message has been recorded, which stops retransmissions
    answered: bool,
    final_received: bool,
    retransmissions: u32,
    sent_at: Instant,
    generation: u64,
}

impl Context {
    fn new(generation: u64) -> Self {
        Self {
            outgoing: None,
            replay: None,
            answered: false,
            final_received: false,
            retransmissions: 0,
            sent_at: Instant::now(),
            generation,
        }
    }
}

#[derive(Debug)]
struct Waiter {
    id: u64,
    sender: mpsc::UnboundedSender<Message>,
}

#[derive(Debug, Default)]
struct State {
    contexts: HashMap<ContextKey, Context>,
    waiters: HashMap<ContextKey, Waiter>,
    next_id: u64,
}

impl State {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn deliver(&mut self, key: &ContextKey, message: Message, is_final: bool) -> bool {
        let Some(waiter) = self.waiters.get(key) else {
            return false;
        };

        if waiter.sender.send(message).is_err() || is_final {
            self.waiters.remove(key);
        }

        true
    }
}

#[derive(Debug)]
enum TimerKind {
    Retransmit { interval: Duration },
    Expire,
}

#[derive(Debug)]
struct TimerEntry {
    key: ContextKey,
    generation: u64,
    kind: TimerKind,
}

struct Inner {
    transport: Arc<dyn Transport>,
    config: TimerConfig,
    state: Mutex<State>,
    timer: mpsc::UnboundedSender<(TimerEntry, Duration)>,
}

/// Owns all transaction contexts of an endpoint.
///
/// Cheap to clone. All mutation of the context table happens under one lock,
/// which is never held across an await point.
#[derive(Clone)]
pub struct TransactionManager {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for TransactionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionManager")
            .field("transport", &self.inner.transport)
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

impl TransactionManager {
    /// Create a manager and spawn its timer task
    pub fn new(transport: Arc<dyn Transport>, config: TimerConfig) -> Self {
        let (timer, commands) = mpsc::unbounded_channel();

        let inner = Arc::new(Inner {
            transport,
            config,
            state: Mutex::new(State::default()),
            timer,
        });

        tokio::spawn(timer_task(Arc::downgrade(&inner), commands));

        Self { inner }
    }

    pub fn config(&self) -> &TimerConfig {
        &self.inner.config
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.inner.transport
    }

    /// Send a message and track it until a message answering it is recorded.
    ///
    /// Requests create a client context. Responses (2xx to INVITE) update the context
    /// created when the request was received, so the response is retransmitted until the ACK.
    /// A failed send is logged, the retransmission timer tries again.
    #[tracing::instrument(level = "debug", skip_all, fields(destination = %outgoing.destination))]
    pub async fn send_and_track(
        &self,
        mut outgoing: OutgoingMessage,
    ) -> crate::Result<PendingTransaction> {
        let key = TsxKey::from_headers(outgoing.message.headers())?;
        let slot = match &outgoing.message {
            Message::Request(_) => Slot::Client,
            Message::Response(_) => Slot::Server,
        };

        let bytes = outgoing.message.to_bytes();
        let destination = outgoing.destination;
        let context_key = (slot, key.clone());

        let (sender, receiver) = mpsc::unbounded_channel();

        let (generation, waiter_id) = {
            let mut state = self.inner.state.lock();

            let generation = state.next_id();
            let waiter_id = state.next_id();

            let context = state
                .contexts
                .entry(context_key.clone())
                .or_insert_with(|| Context::new(generation));

            context.outgoing = Some((bytes.clone(), destination));
            context.answered = false;
            context.retransmissions = 0;
            context.sent_at = Instant::now();
            context.generation = generation;

            if slot == Slot::Server {
                context.replay = Some((bytes.clone(), destination));
            }

            state.waiters.insert(
                context_key.clone(),
                Waiter {
                    id: waiter_id,
                    sender,
                },
            );

            (generation, waiter_id)
        };

        if let Err(e) = self.inner.transport.send(&bytes, destination).await {
            log::warn!("failed to send {key} to {destination}, {e}");
        }

        if !self.inner.transport.reliable() {
            self.schedule(
                context_key.clone(),
                generation,
                TimerKind::Retransmit {
                    interval: self.inner.config.t1,
                },
                self.inner.config.t1,
            );
        }

        self.schedule(
            context_key,
            generation,
            TimerKind::Expire,
            self.inner.config.t2,
        );

        Ok(PendingTransaction {
            key,
            slot,
            waiter_id,
            receiver,
            manager: self.clone(),
        })
    }

    /// Send a message without tracking it.
    ///
    /// Responses are stored on the context of the request they answer and an ACK is stored
    /// on its INVITE context, both are replayed when the peer retransmits.
    pub async fn send(&self, mut outgoing: OutgoingMessage) -> crate::Result<()> {
        let key = TsxKey::from_headers(outgoing.message.headers())?;
        let bytes = outgoing.message.to_bytes();
        let destination = outgoing.destination;

        let slot = match &outgoing.message {
            Message::Request(request) if request.line.method == Method::ACK => Some(Slot::Client),
            Message::Request(_) => None,
            Message::Response(_) => Some(Slot::Server),
        };

        if let Some(slot) = slot {
            let mut state = self.inner.state.lock();

            if let Some(context) = state.contexts.get_mut(&(slot, key)) {
                context.replay = Some((bytes.clone(), destination));
            }
        }

        self.inner.transport.send(&bytes, destination).await?;

        Ok(())
    }

    /// Record a received message and deliver it to the waiting [`PendingTransaction`].
    ///
    /// Requests without a context create one which only expires, so retransmissions of
    /// the request can be detected and answered with the stored response.
    pub async fn record_incoming(&self, message: &Message, source: SocketAddr) -> Incoming {
        let key = match TsxKey::from_headers(message.headers()) {
            Ok(key) => key,
            Err(e) => {
                log::debug!("cannot match message without transaction key, {e}");
                return Incoming::Unmatched;
            }
        };

        let (incoming, replay) = match message {
            Message::Response(response) => self.record_response(key, response),
            Message::Request(request) => self.record_request(key, request, source),
        };

        if let Some((bytes, destination)) = replay {
            if let Err(e) = self.inner.transport.send(&bytes, destination).await {
                log::warn!("failed to replay message to {destination}, {e}");
            }
        }

        incoming
    }

    fn record_response(
        &self,
        key: TsxKey,
        response: &Response,
    ) -> (Incoming, Option<(Bytes, SocketAddr)>) {
        let context_key = (Slot::Client, key);
        let is_final = response.code().is_final();

        let mut state = self.inner.state.lock();

        let Some(context) = state.contexts.get_mut(&context_key) else {
            if state.deliver(&context_key, response.clone().into(), is_final) {
                return (Incoming::Matched, None);
            }

            log::debug!("unmatched response {response} for {}", context_key.1);
            return (Incoming::Unmatched, None);
        };

        context.answered = true;

        // A repeated final response means the ACK got lost, whatever the code
        if is_final && context.final_received {
            return (Incoming::Retransmission, context.replay.clone());
        }

        context.final_received |= is_final;

        state.deliver(&context_key, response.clone().into(), is_final);

        (Incoming::Matched, None)
    }

    fn record_request(
        &self,
        key: TsxKey,
        request: &Request,
        source: SocketAddr,
    ) -> (Incoming, Option<(Bytes, SocketAddr)>) {
        let is_ack = request.line.method == Method::ACK;
        let context_key = (Slot::Server, key);

        let mut state = self.inner.state.lock();

        if let Some(context) = state.contexts.get_mut(&context_key) {
            if is_ack {
                if context.answered {
                    return (Incoming::Retransmission, None);
                }

                context.answered = true;
                state.deliver(&context_key, request.clone().into(), true);

                return (Incoming::Matched, None);
            }

            return (Incoming::Retransmission, context.replay.clone());
        }

        if is_ack {
            if state.deliver(&context_key, request.clone().into(), true) {
                return (Incoming::Matched, None);
            }

            return (Incoming::Unmatched, None);
        }

        let generation = state.next_id();
        state
            .contexts
            .insert(context_key.clone(), Context::new(generation));

        drop(state);

        log::trace!("new server context {} from {source}", context_key.1);

        self.schedule(
            context_key,
            generation,
            TimerKind::Expire,
            self.inner.config.t2,
        );

        (Incoming::NewRequest, None)
    }

    /// Wait for the final response of a pending transaction, skipping provisional ones.
    ///
    /// Returns `None` if none arrives within `timeout`.
    pub async fn await_response(
        &self,
        pending: &mut PendingTransaction,
        timeout: Duration,
    ) -> Option<Response> {
        let deadline = Instant::now() + timeout;

        loop {
            let response = pending.next_response(deadline).await?;

            if response.code().is_final() {
                return Some(response);
            }
        }
    }

    /// Wait for the ACK of a tracked 2xx response
    pub async fn await_ack(
        &self,
        pending: &mut PendingTransaction,
        timeout: Duration,
    ) -> Option<Request> {
        pending.next_request(Instant::now() + timeout).await
    }

    /// Number of retransmissions sent for the context `key`, if it still exists
    pub fn retransmissions(&self, key: &TsxKey) -> Option<u32> {
        let state = self.inner.state.lock();

        [Slot::Client, Slot::Server]
            .into_iter()
            .find_map(|slot| state.contexts.get(&(slot, key.clone())))
            .map(|context| context.retransmissions)
    }

    /// Number of live contexts
    pub fn context_count(&self) -> usize {
        self.inner.state.lock().contexts.len()
    }

    fn schedule(&self, key: ContextKey, generation: u64, kind: TimerKind, delay: Duration) {
        let entry = TimerEntry {
            key,
            generation,
            kind,
        };

        if self.inner.timer.send((entry, delay)).is_err() {
            log::error!("transaction timer task is gone");
        }
    }
}

impl Inner {
    /// Handle an expired timer entry, returns the entry to schedule next
    async fn fire(&self, entry: TimerEntry) -> Option<(TimerEntry, Duration)> {
        let interval = match entry.kind {
            TimerKind::Expire => {
                let mut state = self.state.lock();

                if state
                    .contexts
                    .get(&entry.key)
                    .is_some_and(|context| context.generation == entry.generation)
                {
                    log::trace!("context {} expired", entry.key.1);
                    state.contexts.remove(&entry.key);
                    state.waiters.retain(|_, waiter| !waiter.sender.is_closed());
                }

                return None;
            }
            TimerKind::Retransmit { interval } => interval,
        };

        let (bytes, destination, delay) = {
            let mut state = self.state.lock();

            let context = state.contexts.get_mut(&entry.key)?;

            if context.generation != entry.generation || context.answered {
                return None;
            }

            let elapsed = context.sent_at.elapsed();

            if elapsed >= self.config.t2 {
                log::trace!("{} reached retransmission horizon", entry.key.1);
                return None;
            }

            let (bytes, destination) = context.outgoing.clone()?;
            context.retransmissions += 1;

            log::trace!(
                "retransmitting {} (#{}, next in {:?})",
                entry.key.1,
                context.retransmissions,
                interval * 2
            );

            (bytes, destination, (interval * 2).min(self.config.t2 - elapsed))
        };

        if let Err(e) = self.transport.send(&bytes, destination).await {
            log::warn!(
                "retransmission of {} to {destination} failed, stopping, {e}",
                entry.key.1
            );
            return None;
        }

        Some((
            TimerEntry {
                key: entry.key,
                generation: entry.generation,
                kind: TimerKind::Retransmit {
                    interval: interval * 2,
                },
            },
            delay,
        ))
    }
}

async fn timer_task(
    inner: Weak<Inner>,
    mut commands: mpsc::UnboundedReceiver<(TimerEntry, Duration)>,
) {
    let mut queue: DelayQueue<TimerEntry> = DelayQueue::new();

    loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some((entry, delay)) => {
                    queue.insert(entry, delay);
                }
                None => return,
            },
            Some(expired) = std::future::poll_fn(|cx| queue.poll_expired(cx)), if !queue.is_empty() => {
                let Some(inner) = inner.upgrade() else {
                    return;
                };

                if let Some((entry, delay)) = inner.fire(expired.into_inner()).await {
                    queue.insert(entry, delay);
                }
            }
        }
    }
}

/// Generate a new RFC3261 compliant branch parameter
pub fn generate_branch() -> BytesStr {
    use rand::distr::Alphanumeric;
    use rand::{Rng, rng};

    consts::RFC3261_BRANCH_PREFIX
        .bytes()
        .chain(rng().sample_iter(Alphanumeric).take(23))
        .map(char::from)
        .collect::<String>()
        .into()
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::transport::{MemoryInbox, MemoryTransport};
    use sip_types::uri::Uri;
    use sip_types::{Code, Name};
    use tokio::time::sleep_until;

    fn alice() -> SocketAddr {
        "10.0.0.1:5060".parse().unwrap()
    }

    fn bob() -> SocketAddr {
        "10.0.0.2:5060".parse().unwrap()
    }

    fn request(method: Method, call_id: &str, cseq: u32) -> Request {
        let mut request = Request::new(method.clone(), Uri::new("sip:bob@10.0.0.2").unwrap());
        request.headers.insert(
            Name::VIA,
            format!("SIP/2.0/UDP 10.0.0.1:5060;branch={}", generate_branch()),
        );
        request.headers.insert(Name::FROM, "<sip:alice@10.0.0.1>;tag=a1");
        request.headers.insert(Name::TO, "<sip:bob@10.0.0.2>");
        request.headers.insert(Name::CALL_ID, call_id.to_string());
        request.headers.insert(Name::CSEQ, format!("{cseq} {method}"));
        request
    }

    fn response_to(request: &Request, code: Code) -> Response {
        let mut response = Response::new(code);
        for name in [Name::VIA, Name::FROM, Name::TO, Name::CALL_ID, Name::CSEQ] {
            request.headers.clone_into(&mut response.headers, name).unwrap();
        }
        response
    }

    fn parse(bytes: Bytes) -> Message {
        Message::parse(bytes).unwrap()
    }

    struct Side {
        transport: MemoryTransport,
        inbox: MemoryInbox,
        manager: TransactionManager,
    }

    fn pair() -> (Side, Side) {
        let _ = env_logger::builder().is_test(true).try_init();

        let ((a_tp, a_inbox), (b_tp, b_inbox)) = MemoryTransport::pair(alice(), bob());

        (
            Side {
                manager: TransactionManager::new(Arc::new(a_tp.clone()), TimerConfig::default()),
                transport: a_tp,
                inbox: a_inbox,
            },
            Side {
                manager: TransactionManager::new(Arc::new(b_tp.clone()), TimerConfig::default()),
                transport: b_tp,
                inbox: b_inbox,
            },
        )
    }

    #[tokio::test(start_paused = true)]
    async fn retransmission_backoff() {
        let (alice, mut bob) = pair();
        let start = Instant::now();

        let pending = alice
            .manager
            .send_and_track(OutgoingMessage::new(request(Method::INVITE, "c1", 1), self::bob()))
            .await
            .unwrap();

        // initial transmission
        bob.inbox.recv().await.unwrap();

        let mut fired = vec![];
        for _ in 0..6 {
            bob.inbox.recv().await.unwrap();
            fired.push(start.elapsed());
        }

        let expected = [500, 1500, 3500, 7500, 15500, 31500].map(Duration::from_millis);
        assert_eq!(fired, expected);

        sleep_until(start + Duration::from_millis(31_999)).await;
        assert_eq!(alice.manager.retransmissions(pending.key()), Some(6));
        assert_eq!(alice.manager.context_count(), 1);

        sleep_until(start + Duration::from_millis(32_001)).await;
        assert_eq!(alice.manager.retransmissions(pending.key()), None);
        assert_eq!(alice.manager.context_count(), 0);
        assert!(bob.inbox.try_recv().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn response_stops_retransmission() {
        let (mut alice, mut bob) = pair();

        let invite = request(Method::INVITE, "c2", 1);
        let mut pending = alice
            .manager
            .send_and_track(OutgoingMessage::new(invite.clone(), self::bob()))
            .await
            .unwrap();

        // lose the first copy, answer the retransmission
        bob.inbox.recv().await.unwrap();
        let (bytes, source) = bob.inbox.recv().await.unwrap();
        let received = parse(bytes);
        assert_eq!(
            bob.manager.record_incoming(&received, source).await,
            Incoming::NewRequest
        );

        let Message::Request(received) = received else {
            panic!("expected request");
        };

        bob.manager
            .send(OutgoingMessage::new(
                response_to(&received, Code::BUSY_HERE),
                source,
            ))
            .await
            .unwrap();

        let (bytes, source) = alice.inbox.recv().await.unwrap();
        assert_eq!(
            alice.manager.record_incoming(&parse(bytes), source).await,
            Incoming::Matched
        );

        let response = alice
            .manager
            .await_response(&mut pending, Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(response.code(), Code::BUSY_HERE);
        assert_eq!(alice.manager.retransmissions(pending.key()), Some(1));

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(alice.manager.retransmissions(pending.key()), Some(1));
        assert!(bob.inbox.try_recv().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn retransmitted_request_replays_response() {
        let (mut alice, mut bob) = pair();

        let options = request(Method::OPTIONS, "c3", 7);
        let _pending = alice
            .manager
            .send_and_track(OutgoingMessage::new(options.clone(), self::bob()))
            .await
            .unwrap();

        let (bytes, source) = bob.inbox.recv().await.unwrap();
        assert_eq!(
            bob.manager.record_incoming(&parse(bytes), source).await,
            Incoming::NewRequest
        );

        bob.manager
            .send(OutgoingMessage::new(response_to(&options, Code::OK), source))
            .await
            .unwrap();
        alice.inbox.recv().await.unwrap();

        // the response got lost on its way, alice retransmits
        let (bytes, source) = bob.inbox.recv().await.unwrap();
        assert_eq!(
            bob.manager.record_incoming(&parse(bytes), source).await,
            Incoming::Retransmission
        );

        let (bytes, _) = alice.inbox.recv().await.unwrap();
        let Message::Response(replayed) = parse(bytes) else {
            panic!("expected response");
        };
        assert_eq!(replayed.code(), Code::OK);
    }

    #[tokio::test(start_paused = true)]
    async fn ok_retransmitted_until_ack() {
        let (mut alice, mut bob) = pair();

        let invite = request(Method::INVITE, "c4", 1);
        let mut client = alice
            .manager
            .send_and_track(OutgoingMessage::new(invite.clone(), self::bob()))
            .await
            .unwrap();

        let (bytes, source) = bob.inbox.recv().await.unwrap();
        bob.manager.record_incoming(&parse(bytes), source).await;

        let mut server = bob
            .manager
            .send_and_track(OutgoingMessage::new(response_to(&invite, Code::OK), source))
            .await
            .unwrap();

        // alice loses the first 200, receives the retransmission at T1
        let _lost = alice.inbox.recv().await.unwrap();
        let (bytes, source) = alice.inbox.recv().await.unwrap();
        alice.manager.record_incoming(&parse(bytes), source).await;

        let ok = alice
            .manager
            .await_response(&mut client, Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(ok.code(), Code::OK);

        let mut ack = request(Method::ACK, "c4", 1);
        ack.headers.remove(&Name::TO);
        ok.headers.clone_into(&mut ack.headers, Name::TO).unwrap();
        alice
            .manager
            .send(OutgoingMessage::new(ack, source))
            .await
            .unwrap();

        // skip alice's INVITE retransmission sent alongside the 200 retransmission
        let (ack, source) = loop {
            let (bytes, source) = bob.inbox.recv().await.unwrap();
            match parse(bytes) {
                Message::Request(request) if request.line.method == Method::ACK => {
                    break (request, source);
                }
                _ => continue,
            }
        };
        assert_eq!(
            bob.manager.record_incoming(&ack.into(), source).await,
            Incoming::Matched
        );

        let ack = bob
            .manager
            .await_ack(&mut server, Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(ack.line.method, Method::ACK);
        assert_eq!(bob.manager.retransmissions(server.key()), Some(1));
    }

    #[tokio::test(start_paused = true)]
    async fn ok_retransmission_replays_ack() {
        let (mut alice, mut bob) = pair();

        let invite = request(Method::INVITE, "c5", 1);
        let mut client = alice
            .manager
            .send_and_track(OutgoingMessage::new(invite.clone(), self::bob()))
            .await
            .unwrap();
        bob.inbox.recv().await.unwrap();

        let ok = Message::from(response_to(&invite, Code::OK));
        assert_eq!(
            alice.manager.record_incoming(&ok, self::bob()).await,
            Incoming::Matched
        );
        alice
            .manager
            .await_response(&mut client, Duration::from_secs(1))
            .await
            .unwrap();

        alice
            .manager
            .send(OutgoingMessage::new(request(Method::ACK, "c5", 1), self::bob()))
            .await
            .unwrap();
        bob.inbox.recv().await.unwrap();

        assert_eq!(
            alice.manager.record_incoming(&ok, self::bob()).await,
            Incoming::Retransmission
        );

        let (bytes, _) = bob.inbox.recv().await.unwrap();
        let Message::Request(replayed) = parse(bytes) else {
            panic!("expected request");
        };
        assert_eq!(replayed.line.method, Method::ACK);
    }

    #[tokio::test(start_paused = true)]
    async fn rejection_retransmission_replays_ack() {
        let (mut alice, mut bob) = pair();

        let invite = request(Method::INVITE, "c9", 1);
        let mut client = alice
            .manager
            .send_and_track(OutgoingMessage::new(invite.clone(), self::bob()))
            .await
            .unwrap();
        bob.inbox.recv().await.unwrap();

        let busy = Message::from(response_to(&invite, Code::BUSY_HERE));
        assert_eq!(
            alice.manager.record_incoming(&busy, self::bob()).await,
            Incoming::Matched
        );
        alice
            .manager
            .await_response(&mut client, Duration::from_secs(1))
            .await
            .unwrap();

        alice
            .manager
            .send(OutgoingMessage::new(request(Method::ACK, "c9", 1), self::bob()))
            .await
            .unwrap();
        bob.inbox.recv().await.unwrap();

        assert_eq!(
            alice.manager.record_incoming(&busy, self::bob()).await,
            Incoming::Retransmission
        );

        let (bytes, _) = bob.inbox.recv().await.unwrap();
        let Message::Request(replayed) = parse(bytes) else {
            panic!("expected request");
        };
        assert_eq!(replayed.line.method, Method::ACK);
        assert!(bob.inbox.try_recv().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn reliable_transport_is_not_retransmitted() {
        let (alice, mut bob) = pair();
        alice.transport.set_reliable(true);

        let pending = alice
            .manager
            .send_and_track(OutgoingMessage::new(request(Method::MESSAGE, "c6", 1), self::bob()))
            .await
            .unwrap();

        bob.inbox.recv().await.unwrap();

        tokio::time::sleep(Duration::from_secs(20)).await;
        assert!(bob.inbox.try_recv().is_none());
        assert_eq!(alice.manager.retransmissions(pending.key()), Some(0));
    }

    #[tokio::test(start_paused = true)]
    async fn send_failure_stops_retransmission_silently() {
        let (alice, mut bob) = pair();

        let mut pending = alice
            .manager
            .send_and_track(OutgoingMessage::new(request(Method::OPTIONS, "c7", 1), self::bob()))
            .await
            .unwrap();
        bob.inbox.recv().await.unwrap();

        alice.transport.set_offline(true);
        tokio::time::sleep(Duration::from_millis(600)).await;
        alice.transport.set_offline(false);

        assert!(
            alice
                .manager
                .await_response(&mut pending, Duration::from_secs(10))
                .await
                .is_none()
        );
        assert!(bob.inbox.try_recv().is_none());
        assert_eq!(alice.manager.retransmissions(pending.key()), Some(1));
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_contexts_are_isolated() {
        const SESSIONS: u32 = 5;

        let (alice, bob) = pair();
        let Side {
            inbox: mut alice_inbox,
            manager: alice_manager,
            ..
        } = alice;

        // feed alice's inbox into her manager
        let receiver = alice_manager.clone();
        tokio::spawn(async move {
            while let Some((bytes, source)) = alice_inbox.recv().await {
                receiver.record_incoming(&parse(bytes), source).await;
            }
        });

        // bob answers session `i` once he has seen `i` retransmissions of it
        let Side {
            transport: bob_transport,
            inbox: mut bob_inbox,
            ..
        } = bob;
        tokio::spawn(async move {
            let mut seen: HashMap<String, u32> = HashMap::new();

            while let Some((bytes, source)) = bob_inbox.recv().await {
                let Message::Request(request) = parse(bytes) else {
                    continue;
                };

                let key = TsxKey::from_headers(&request.headers).unwrap();
                let count = seen.entry(key.call_id.to_string()).or_default();

                if *count == key.cseq {
                    let mut response = Message::from(response_to(&request, Code::OK));
                    bob_transport.send(&response.to_bytes(), source).await.unwrap();
                }

                *count += 1;
            }
        });

        let tasks: Vec<_> = (0..SESSIONS)
            .map(|i| {
                let manager = alice_manager.clone();

                tokio::spawn(async move {
                    // the cseq tells bob how many retransmissions to wait for
                    let mut pending = manager
                        .send_and_track(OutgoingMessage::new(
                            request(Method::INVITE, &format!("session-{i}"), i),
                            self::bob(),
                        ))
                        .await
                        .unwrap();

                    let response = manager
                        .await_response(&mut pending, Duration::from_secs(32))
                        .await
                        .unwrap();

                    assert_eq!(response.code(), Code::OK);

                    (i, manager.retransmissions(pending.key()))
                })
            })
            .collect();

        for task in tasks {
            let (i, retransmissions) = task.await.unwrap();
            assert_eq!(retransmissions, Some(i));
        }
    }

    #[test]
    fn branch_format() {
        let branch = generate_branch();

        assert!(branch.starts_with(consts::RFC3261_BRANCH_PREFIX));
        assert_eq!(branch.len(), 30);
        assert_ne!(branch, generate_branch());
    }

    #[test]
    fn default_timers() {
        let config = TimerConfig::default();

        assert_eq!(config.t1, Duration::from_millis(500));
        assert_eq!(config.t2, Duration::from_millis(32_000));
    }
}

use crate::transport::Transport;
use crate::{Endpoint, EndpointBuilder};
use bytes::Bytes;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::{fmt, io};
use tokio::sync::{broadcast, mpsc};

const MEMORY: &str = "MEM";

type Datagram = (Bytes, SocketAddr);

#[derive(Debug)]
struct Inner {
    bound: SocketAddr,
    peer: mpsc::UnboundedSender<Datagram>,
    reliable: AtomicBool,
    offline: AtomicBool,
    drop_next: AtomicUsize,
    sent: AtomicUsize,
}

/// One end of an in-process datagram link.
///
/// Everything sent is delivered to the [`MemoryInbox`] of the other end, the target address
/// is ignored. Packet loss and network outages can be simulated.
#[derive(Debug, Clone)]
pub struct MemoryTransport {
    inner: Arc<Inner>,
}

/// Receiving half belonging to a [`MemoryTransport`]
#[derive(Debug)]
pub struct MemoryInbox {
    receiver: mpsc::UnboundedReceiver<Datagram>,
}

impl MemoryInbox {
    /// Next datagram together with the address of the sending end
    pub async fn recv(&mut self) -> Option<(Bytes, SocketAddr)> {
        self.receiver.recv().await
    }

    pub fn try_recv(&mut self) -> Option<(Bytes, SocketAddr)> {
        self.receiver.try_recv().ok()
    }
}

impl fmt::Display for MemoryTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "mem:bound={}", self.inner.bound)
    }
}

impl MemoryTransport {
    /// Create two connected ends bound to the addresses `a` and `b`
    pub fn pair(
        a: SocketAddr,
        b: SocketAddr,
    ) -> ((MemoryTransport, MemoryInbox), (MemoryTransport, MemoryInbox)) {
        let (to_a, a_receiver) = mpsc::unbounded_channel();
        let (to_b, b_receiver) = mpsc::unbounded_channel();

        (
            (
                Self::new(a, to_b),
                MemoryInbox {
                    receiver: a_receiver,
                },
            ),
            (
                Self::new(b, to_a),
                MemoryInbox {
                    receiver: b_receiver,
                },
            ),
        )
    }

    fn new(bound: SocketAddr, peer: mpsc::UnboundedSender<Datagram>) -> Self {
        Self {
            inner: Arc::new(Inner {
                bound,
                peer,
                reliable: AtomicBool::new(false),
                offline: AtomicBool::new(false),
                drop_next: AtomicUsize::new(0),
                sent: AtomicUsize::new(0),
            }),
        }
    }

    /// Set the transport as the endpoint's transport and feed the inbox into the endpoint once built
    pub fn attach(&self, mut inbox: MemoryInbox, builder: &mut EndpointBuilder) {
        let mut endpoint = builder.subscribe();

        tokio::spawn(async move {
            let endpoint: Endpoint = match endpoint.recv().await {
                Ok(endpoint) => endpoint,
                Err(broadcast::error::RecvError::Closed | broadcast::error::RecvError::Lagged(_)) => {
                    return;
                }
            };

            while let Some((bytes, source)) = inbox.recv().await {
                endpoint.receive(bytes, source);
            }
        });

        builder.set_transport(self.clone());
    }

    /// Report the transport as reliable, disabling retransmissions
    pub fn set_reliable(&self, reliable: bool) {
        self.inner.reliable.store(reliable, Ordering::Relaxed);
    }

    /// While offline every send fails
    pub fn set_offline(&self, offline: bool) {
        self.inner.offline.store(offline, Ordering::Relaxed);
    }

    /// Silently lose the next `n` outgoing datagrams
    pub fn drop_next(&self, n: usize) {
        self.inner.drop_next.store(n, Ordering::Relaxed);
    }

    /// Number of datagrams sent successfully, including lost ones
    pub fn sent(&self) -> usize {
        self.inner.sent.load(Ordering::Relaxed)
    }
}

#[async_trait::async_trait]
impl Transport for MemoryTransport {
    fn name(&self) -> &'static str {
        MEMORY
    }

    fn reliable(&self) -> bool {
        self.inner.reliable.load(Ordering::Relaxed)
    }

    fn bound(&self) -> SocketAddr {
        self.inner.bound
    }

    async fn send(&self, message: &[u8], _target: SocketAddr) -> io::Result<()> {
        if self.inner.offline.load(Ordering::Relaxed) {
            return Err(io::Error::new(
                io::ErrorKind::NotConnected,
                "memory transport is offline",
            ));
        }

        self.inner.sent.fetch_add(1, Ordering::Relaxed);

        let lose = self
            .inner
            .drop_next
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1))
            .is_ok();

        if lose {
            log::trace!("{self} losing datagram");
            return Ok(());
        }

        self.inner
            .peer
            .send((Bytes::copy_from_slice(message), self.inner.bound))
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "peer inbox dropped"))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn addrs() -> (SocketAddr, SocketAddr) {
        ("127.0.0.1:5060".parse().unwrap(), "127.0.0.2:5060".parse().unwrap())
    }

    #[tokio::test]
    async fn delivers_to_peer() {
        let (a, b) = addrs();
        let ((a_tp, _a_inbox), (_b_tp, mut b_inbox)) = MemoryTransport::pair(a, b);

        a_tp.send(b"hello", b).await.unwrap();

        let (bytes, source) = b_inbox.recv().await.unwrap();
        assert_eq!(bytes, Bytes::from_static(b"hello"));
        assert_eq!(source, a);
    }

    #[tokio::test]
    async fn loss_and_outage() {
        let (a, b) = addrs();
        let ((a_tp, _a_inbox), (_b_tp, mut b_inbox)) = MemoryTransport::pair(a, b);

        a_tp.drop_next(1);
        a_tp.send(b"lost", b).await.unwrap();
        a_tp.send(b"kept", b).await.unwrap();

        assert_eq!(b_inbox.recv().await.unwrap().0, Bytes::from_static(b"kept"));
        assert_eq!(a_tp.sent(), 2);

        a_tp.set_offline(true);
        assert!(a_tp.send(b"fails", b).await.is_err());
        assert!(b_inbox.try_recv().is_none());
    }
}

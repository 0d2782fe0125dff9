use crate::transport::Transport;
use crate::{Endpoint, EndpointBuilder};
use bytes::Bytes;
use std::net::SocketAddr;
use std::sync::Arc;
use std::{fmt, io};
use tokio::net::{ToSocketAddrs, UdpSocket};
use tokio::sync::broadcast;

const UDP: &str = "UDP";
const MAX_MSG_SIZE: usize = u16::MAX as usize;

#[derive(Debug)]
struct Inner {
    bound: SocketAddr,
    socket: UdpSocket,
}

#[derive(Debug, Clone)]
pub struct Udp {
    inner: Arc<Inner>,
}

impl fmt::Display for Udp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "udp:bound={}", self.inner.bound)
    }
}

impl Udp {
    /// Bind a UDP socket and set it as the endpoint's transport.
    ///
    /// The receive task starts once the endpoint is built.
    pub async fn spawn<A>(builder: &mut EndpointBuilder, addr: A) -> io::Result<Udp>
    where
        A: ToSocketAddrs,
    {
        let socket = UdpSocket::bind(addr).await?;
        let bound = socket.local_addr()?;

        log::info!("Bound UDP to {bound}");

        let udp = Udp {
            inner: Arc::new(Inner { bound, socket }),
        };

        tokio::spawn(receive_task(builder.subscribe(), udp.inner.clone()));

        builder.set_transport(udp.clone());

        Ok(udp)
    }
}

#[async_trait::async_trait]
impl Transport for Udp {
    fn name(&self) -> &'static str {
        UDP
    }

    fn reliable(&self) -> bool {
        false
    }

    fn bound(&self) -> SocketAddr {
        self.inner.bound
    }

    async fn send(&self, bytes: &[u8], target: SocketAddr) -> io::Result<()> {
        self.inner.socket.send_to(bytes, target).await.map(|_| ())
    }
}

async fn receive_task(mut endpoint: broadcast::Receiver<Endpoint>, inner: Arc<Inner>) {
    let endpoint = match endpoint.recv().await.ok() {
        Some(endpoint) => endpoint,
        None => return,
    };

    let mut buffer = vec![0u8; MAX_MSG_SIZE];

    loop {
        let (len, remote) = match inner.socket.recv_from(&mut buffer).await {
            Ok(received) => received,
            Err(e) => {
                log::error!("UDP recv error {e:?}");
                continue;
            }
        };

        let datagram = &buffer[..len];

        // keep-alive
        if datagram.iter().all(u8::is_ascii_whitespace) {
            continue;
        }

        endpoint.receive(Bytes::copy_from_slice(datagram), remote);
    }
}

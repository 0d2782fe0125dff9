use std::fmt::{Debug, Display};
use std::io;
use std::net::SocketAddr;

mod memory;
mod parse;
mod udp;

pub use memory::{MemoryInbox, MemoryTransport};
pub use parse::ParseError;
pub use udp::Udp;

pub(crate) use parse::parse_message;

/// Abstraction over a transport
#[async_trait::async_trait]
pub trait Transport: Debug + Display + Send + Sync + 'static {
    /// Must return the name of the transport. (e.g. UDP, TCP, TLS ...)
    fn name(&self) -> &'static str;

    /// Is the transport reliable, reliable transports do not get retransmissions
    fn reliable(&self) -> bool;

    /// The local address of the transport
    fn bound(&self) -> SocketAddr;

    /// Use the given transport to send `message` to `target`.
    async fn send(&self, message: &[u8], target: SocketAddr) -> io::Result<()>;
}

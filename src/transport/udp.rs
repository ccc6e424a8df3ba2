//! UDP listener for client queries.
//!
//! Each datagram is handled on its own task, so a slow upstream only
//! delays the query that is waiting on it.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use hickory_proto::op::{Message, MessageType};
use tokio::net::UdpSocket;
use tracing::{debug, error, info, warn};

use super::MAX_DNS_PACKET_SIZE;
use crate::dispatcher::Dispatcher;

/// UDP transport for one listen address.
pub struct UdpTransport {
    socket: Arc<UdpSocket>,
}

impl UdpTransport {
    /// Bind the listening socket.
    pub async fn bind(addr: impl tokio::net::ToSocketAddrs) -> io::Result<Self> {
        let socket = UdpSocket::bind(addr).await?;
        Ok(Self {
            socket: Arc::new(socket),
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Receive queries until the socket fails.
    ///
    /// Undecodable datagrams and inbound responses are dropped without a
    /// reply. Responses that cannot be
    /// encoded or sent are logged and dropped; the client retries.
    pub async fn serve(self, dispatcher: Arc<Dispatcher>) -> io::Result<()> {
        let local = self.local_addr()?;
        info!(addr = %local, "listening on udp");

        let mut buf = [0u8; MAX_DNS_PACKET_SIZE];
        loop {
            let (len, src) = match self.socket.recv_from(&mut buf).await {
                Ok(r) => r,
                Err(e) if is_transient(&e) => {
                    debug!(addr = %local, error = %e, "udp recv error");
                    continue;
                }
                Err(e) => {
                    error!(addr = %local, error = %e, "udp listener failed");
                    return Err(e);
                }
            };

            let query = match Message::from_vec(&buf[..len]) {
                Ok(query) => query,
                Err(e) => {
                    debug!(client = %src, len, error = %e, "dropping undecodable query");
                    continue;
                }
            };

            // Answering a response would turn the listener into a reflector
            // for whoever forged its source address.
            if query.message_type() == MessageType::Response {
                debug!(client = %src, id = query.id(), "dropping inbound response");
                continue;
            }

            let socket = Arc::clone(&self.socket);
            let dispatcher = Arc::clone(&dispatcher);
            tokio::spawn(async move {
                let response = dispatcher.handle(&query).await;
                if let Err(e) = respond(&socket, &response, src).await {
                    warn!(client = %src, id = response.id(), error = %e, "failed to write response");
                }
            });
        }
    }
}

async fn respond(socket: &UdpSocket, response: &Message, to: SocketAddr) -> io::Result<()> {
    let bytes = response
        .to_vec()
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    socket.send_to(&bytes, to).await?;
    Ok(())
}

/// Errors a client can provoke on a UDP socket without breaking it,
/// e.g. ICMP port unreachable from an earlier reply.
fn is_transient(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionRefused
            | io::ErrorKind::Interrupted
            | io::ErrorKind::WouldBlock
    )
}

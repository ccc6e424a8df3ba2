//! Client-facing listeners.
//!
//! Only UDP is served to clients; upstream transports live in
//! [`crate::upstream`].

pub mod udp;

pub use udp::UdpTransport;

/// Receive buffer size for client datagrams.
pub const MAX_DNS_PACKET_SIZE: usize = 4096;

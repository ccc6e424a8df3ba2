//! Connections to upstream resolvers.
//!
//! Every exchange opens a fresh connection and drops it afterwards.
//! Stream transports (TCP, TLS) prefix each DNS message with a 2-byte
//! big-endian length.

use async_trait::async_trait;
use std::io;
use std::net::SocketAddr;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpStream, UdpSocket};
use tokio_rustls::client::TlsStream;

/// Moves whole DNS messages over one connection.
#[async_trait]
pub trait MessageStream: Send {
    async fn write_msg(&mut self, msg: &[u8]) -> io::Result<()>;

    /// Read the next complete message.
    async fn read_msg(&mut self) -> io::Result<Vec<u8>>;
}

/// An open connection to one upstream.
pub enum Connection {
    /// Connected UDP socket; datagrams from other sources never reach it.
    Udp { socket: UdpSocket, recv_size: usize },
    Tcp(TcpStream),
    Tls(Box<TlsStream<TcpStream>>),
}

impl Connection {
    /// Open a connected UDP socket to `addr`.
    pub async fn udp(addr: &str, recv_size: u16) -> io::Result<Self> {
        let remote = resolve(addr).await?;
        let bind_addr: SocketAddr = if remote.is_ipv4() {
            SocketAddr::from(([0, 0, 0, 0], 0))
        } else {
            SocketAddr::from(([0u16; 8], 0))
        };

        let socket = UdpSocket::bind(bind_addr).await?;
        socket.connect(remote).await?;

        Ok(Connection::Udp {
            socket,
            recv_size: usize::from(recv_size),
        })
    }

    pub async fn tcp(addr: &str) -> io::Result<Self> {
        Ok(Connection::Tcp(connect_tcp(addr).await?))
    }

    pub async fn tls(
        addr: &str,
        connector: &tokio_rustls::TlsConnector,
        server_name: rustls::pki_types::ServerName<'static>,
    ) -> io::Result<Self> {
        let tcp = connect_tcp(addr).await?;
        let tls = connector.connect(server_name, tcp).await?;
        Ok(Connection::Tls(Box::new(tls)))
    }
}

#[async_trait]
impl MessageStream for Connection {
    async fn write_msg(&mut self, msg: &[u8]) -> io::Result<()> {
        match self {
            Connection::Udp { socket, .. } => socket.send(msg).await.map(|_| ()),
            Connection::Tcp(stream) => write_framed(stream, msg).await,
            Connection::Tls(stream) => write_framed(&mut **stream, msg).await,
        }
    }

    async fn read_msg(&mut self) -> io::Result<Vec<u8>> {
        match self {
            Connection::Udp { socket, recv_size } => {
                let mut buf = vec![0u8; *recv_size];
                let len = socket.recv(&mut buf).await?;
                buf.truncate(len);
                Ok(buf)
            }
            Connection::Tcp(stream) => read_framed(stream).await,
            Connection::Tls(stream) => read_framed(&mut **stream).await,
        }
    }
}

async fn resolve(addr: &str) -> io::Result<SocketAddr> {
    tokio::net::lookup_host(addr).await?.next().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::NotFound,
            format!("no addresses found for {addr}"),
        )
    })
}

async fn connect_tcp(addr: &str) -> io::Result<TcpStream> {
    let stream = TcpStream::connect(addr).await?;
    stream.set_nodelay(true)?;
    Ok(stream)
}

/// Write a length-prefixed DNS message.
pub async fn write_framed<S>(stream: &mut S, msg: &[u8]) -> io::Result<()>
where
    S: AsyncWrite + Unpin + ?Sized,
{
    let len = u16::try_from(msg.len()).map_err(|_| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("DNS message too large: {} bytes", msg.len()),
        )
    })?;

    let mut framed = Vec::with_capacity(msg.len() + 2);
    framed.extend_from_slice(&len.to_be_bytes());
    framed.extend_from_slice(msg);
    stream.write_all(&framed).await?;
    stream.flush().await
}

/// Read a length-prefixed DNS message, returning it without the prefix.
pub async fn read_framed<S>(stream: &mut S) -> io::Result<Vec<u8>>
where
    S: AsyncRead + Unpin + ?Sized,
{
    let mut len_buf = [0u8; 2];
    stream.read_exact(&mut len_buf).await?;

    let mut msg = vec![0u8; usize::from(u16::from_be_bytes(len_buf))];
    stream.read_exact(&mut msg).await?;
    Ok(msg)
}

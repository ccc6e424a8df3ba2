//! Upstream client for UDP, TCP and DNS-over-TLS resolvers.
//!
//! The three transports differ only in how a connection is opened; the
//! exchange on top of it is shared.

use async_trait::async_trait;
use rustls::pki_types::ServerName;
use std::sync::{Arc, LazyLock};

use hickory_proto::op::Message;
use tokio::time::{Instant, timeout_at};
use tokio_rustls::TlsConnector;
use tracing::{debug, warn};

use super::Upstream;
use super::conn::Connection;
use super::exchange::{self, Acceptance, exchange};
use crate::config::{FilterMode, TransportKind, UpstreamConfig};
use crate::dns::{self, MIN_MSG_SIZE};
use crate::error::{ConfigError, UpstreamError};

/// Shared TLS config, built once for every DoT upstream.
static TLS_CONFIG: LazyLock<Arc<rustls::ClientConfig>> = LazyLock::new(|| {
    let mut root_store = rustls::RootCertStore::empty();
    root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

    let config = rustls::ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth();

    Arc::new(config)
});

enum Transport {
    Udp,
    Tcp,
    Tls {
        connector: TlsConnector,
        server_name: ServerName<'static>,
    },
}

/// Client for one configured upstream resolver.
///
/// Holds no per-query state; every `resolve` opens its own connection.
pub struct Client {
    name: String,
    addr: String,
    transport: Transport,
    filter: FilterMode,
    udp_size: u16,
}

impl Client {
    pub fn new(config: &UpstreamConfig) -> Result<Self, ConfigError> {
        let host = split_host_port(&config.addr).map_err(|reason| ConfigError::InvalidAddress {
            name: config.name.clone(),
            addr: config.addr.clone(),
            reason,
        })?;

        let transport = match config.kind {
            TransportKind::Udp => Transport::Udp,
            TransportKind::Tcp => Transport::Tcp,
            TransportKind::Dot => {
                let server_name = config.tls_server_name.as_deref().unwrap_or(host);
                let server_name = ServerName::try_from(server_name.to_string()).map_err(|_| {
                    ConfigError::InvalidServerName {
                        name: config.name.clone(),
                        server_name: server_name.to_string(),
                    }
                })?;
                Transport::Tls {
                    connector: TlsConnector::from(TLS_CONFIG.clone()),
                    server_name,
                }
            }
        };

        if config.kind != TransportKind::Dot && config.tls_server_name.is_some() {
            warn!(
                upstream = %config.name,
                kind = config.kind.as_str(),
                "tls_server_name is only used by dot upstreams"
            );
        }

        Ok(Self {
            name: config.name.clone(),
            addr: config.addr.clone(),
            transport,
            filter: config.filter,
            udp_size: config.udp_size.unwrap_or(MIN_MSG_SIZE),
        })
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    pub fn filter(&self) -> FilterMode {
        self.filter
    }

    pub fn kind(&self) -> TransportKind {
        match self.transport {
            Transport::Udp => TransportKind::Udp,
            Transport::Tcp => TransportKind::Tcp,
            Transport::Tls { .. } => TransportKind::Dot,
        }
    }

    /// TLS server name verified for DoT upstreams.
    pub fn server_name(&self) -> Option<String> {
        match &self.transport {
            Transport::Tls { server_name, .. } => Some(server_name.to_str().into_owned()),
            _ => None,
        }
    }

    async fn connect(&self, udp_size: u16) -> std::io::Result<Connection> {
        match &self.transport {
            Transport::Udp => Connection::udp(&self.addr, udp_size).await,
            Transport::Tcp => Connection::tcp(&self.addr).await,
            Transport::Tls {
                connector,
                server_name,
            } => Connection::tls(&self.addr, connector, server_name.clone()).await,
        }
    }
}

#[async_trait]
impl Upstream for Client {
    fn name(&self) -> &str {
        &self.name
    }

    async fn resolve(
        &self,
        query: &Message,
        deadline: Option<Instant>,
    ) -> Result<Message, UpstreamError> {
        let mut request = query.clone();
        if self.filter != FilterMode::None {
            dns::mark_query(&mut request);
        }
        let acceptance = Acceptance::for_filter(self.filter);
        let udp_size = dns::udp_payload_size(&request, self.udp_size);

        let deadline = exchange::deadline(Instant::now(), deadline);
        let mut conn = timeout_at(deadline, self.connect(udp_size)).await??;

        let exchanged = exchange(&mut conn, &request, acceptance, deadline).await?;

        debug!(
            upstream = %self.name,
            rtt_ms = exchanged.rtt.as_secs_f64() * 1000.0,
            discarded = exchanged.discarded,
            "upstream answered"
        );
        Ok(exchanged.response)
    }
}

/// Split `host:port`, returning the host without IPv6 brackets.
fn split_host_port(addr: &str) -> Result<&str, &'static str> {
    let (host, port) = addr.rsplit_once(':').ok_or("missing port")?;
    let port: u16 = port.parse().map_err(|_| "invalid port")?;
    if port == 0 {
        return Err("port must be non-zero");
    }

    let host = host
        .strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host);
    if host.is_empty() {
        return Err("missing host");
    }
    Ok(host)
}

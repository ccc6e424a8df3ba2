//! Error types for junction.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while turning configuration into a running server.
///
/// Every variant is fatal: the process refuses to start.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("upstream `{name}`: invalid address `{addr}`: {reason}")]
    InvalidAddress {
        name: String,
        addr: String,
        reason: &'static str,
    },

    #[error("upstream `{name}`: invalid TLS server name `{server_name}`")]
    InvalidServerName { name: String, server_name: String },

    #[error("duplicate upstream name `{0}`")]
    DuplicateUpstream(String),

    #[error("duplicate matcher name `{0}`")]
    DuplicateMatcher(String),

    #[error("matcher `{name}`: {reason}")]
    Matcher { name: String, reason: String },

    #[error("no `default` rule configured")]
    MissingDefaultRoute,

    #[error("rule `{rule}` refers to unknown upstream `{upstream}`")]
    UnknownUpstream { rule: String, upstream: String },
}

/// Errors returned by a single upstream exchange.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("timed out waiting for upstream")]
    Timeout,

    #[error("DNS protocol error: {0}")]
    Proto(#[from] hickory_proto::error::ProtoError),
}

impl From<tokio::time::error::Elapsed> for UpstreamError {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        UpstreamError::Timeout
    }
}

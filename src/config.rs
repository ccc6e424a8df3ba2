//! Configuration model.
//!
//! The whole file is read and validated at startup; nothing here is
//! consulted again once the server is built.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cache::DEFAULT_CAPACITY;
use crate::error::ConfigError;

/// Listen address used when none is configured.
pub const ALL_INTERFACES: &str = "[::]:53";

/// Name of the mandatory fallback rule.
pub const DEFAULT_RULE: &str = "default";

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// UDP addresses to serve on.
    #[serde(default)]
    pub listen: Vec<String>,

    /// Log level filter (e.g., "info", "junction=debug,warn").
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Optional per-query deadline handed to upstream exchanges.
    #[serde(default)]
    pub query_timeout_ms: Option<u64>,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub upstreams: Vec<UpstreamConfig>,

    /// Matchers in evaluation order.
    #[serde(default)]
    pub matches: Vec<MatchConfig>,

    /// Rule name -> upstream name. Must contain `default`.
    #[serde(default)]
    pub rules: BTreeMap<String, String>,
}

impl Config {
    /// Read and parse a TOML configuration file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        contents.parse()
    }

    pub fn query_timeout(&self) -> Option<Duration> {
        self.query_timeout_ms.map(Duration::from_millis)
    }
}

impl std::str::FromStr for Config {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(toml::from_str(s)?)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CacheConfig {
    #[serde(default = "default_cache_capacity")]
    pub capacity: usize,

    /// Seconds between sweeps of expired entries.
    #[serde(default = "default_cleanup_interval")]
    pub cleanup_interval_secs: u64,
}

impl CacheConfig {
    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs.max(1))
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: default_cache_capacity(),
            cleanup_interval_secs: default_cleanup_interval(),
        }
    }
}

/// One upstream resolver.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpstreamConfig {
    pub name: String,

    #[serde(rename = "type")]
    pub kind: TransportKind,

    /// `host:port` of the resolver.
    pub addr: String,

    /// Certificate name to verify for DoT; defaults to the host of `addr`.
    #[serde(default)]
    pub tls_server_name: Option<String>,

    #[serde(default)]
    pub filter: FilterMode,

    /// UDP payload size used when a query carries no usable EDNS size.
    #[serde(default)]
    pub udp_size: Option<u16>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    Udp,
    Tcp,
    Dot,
}

impl TransportKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TransportKind::Udp => "udp",
            TransportKind::Tcp => "tcp",
            TransportKind::Dot => "dot",
        }
    }
}

/// Defense against spoofed replies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterMode {
    /// Plain exchange.
    #[default]
    None,
    /// Mark outgoing queries only; filtering is left to the host firewall.
    Kernel,
    /// Mark outgoing queries and drop replies that do not echo the marker.
    User,
}

impl FilterMode {
    pub fn as_str(self) -> &'static str {
        match self {
            FilterMode::None => "none",
            FilterMode::Kernel => "kernel",
            FilterMode::User => "user",
        }
    }
}

/// One matcher definition.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MatchConfig {
    pub name: String,

    #[serde(rename = "type")]
    pub kind: MatchKind,

    #[serde(default)]
    pub domains: Vec<String>,

    /// File with one domain per line.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchKind {
    DomainList,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_cache_capacity() -> usize {
    DEFAULT_CAPACITY
}

fn default_cleanup_interval() -> u64 {
    1800
}

//! Upstream resolvers.
//!
//! An [`Upstream`] takes one query and returns one response. [`Client`]
//! is the network implementation; the dispatcher and router only see the
//! trait, so tests can substitute their own.

mod client;
pub mod conn;
pub mod exchange;

pub use client::Client;

use async_trait::async_trait;
use rustc_hash::FxHashMap;
use std::sync::Arc;

use hickory_proto::op::Message;
use tokio::time::Instant;
use tracing::info;

use crate::config::UpstreamConfig;
use crate::error::{ConfigError, UpstreamError};

/// A resolver queries can be forwarded to.
///
/// Implementations are shared read-only between all in-flight queries.
#[async_trait]
pub trait Upstream: Send + Sync {
    fn name(&self) -> &str;

    /// Exchange `query` for a response.
    ///
    /// `deadline` can only shorten the built-in exchange timeout.
    async fn resolve(
        &self,
        query: &Message,
        deadline: Option<Instant>,
    ) -> Result<Message, UpstreamError>;
}

/// Upstreams by name, built once at startup.
#[derive(Default)]
pub struct UpstreamRegistry {
    upstreams: FxHashMap<String, Arc<dyn Upstream>>,
}

impl UpstreamRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a [`Client`] for every definition.
    pub fn from_configs(configs: &[UpstreamConfig]) -> Result<Self, ConfigError> {
        let mut registry = Self::new();
        for config in configs {
            let client = Client::new(config)?;
            info!(
                upstream = %config.name,
                kind = client.kind().as_str(),
                addr = %client.addr(),
                filter = client.filter().as_str(),
                "upstream ready"
            );
            registry.register(Arc::new(client))?;
        }
        Ok(registry)
    }

    /// Add an upstream; names must be unique.
    pub fn register(&mut self, upstream: Arc<dyn Upstream>) -> Result<(), ConfigError> {
        let name = upstream.name().to_string();
        if self.upstreams.contains_key(&name) {
            return Err(ConfigError::DuplicateUpstream(name));
        }
        self.upstreams.insert(name, upstream);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Upstream>> {
        self.upstreams.get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.upstreams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.upstreams.is_empty()
    }
}

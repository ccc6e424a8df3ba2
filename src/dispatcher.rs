//! Per-query pipeline: cache, route, resolve, store.

use std::time::Duration;

use hickory_proto::op::{Message, OpCode, ResponseCode};
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::cache::{QueryCache, cache_ttl};
use crate::config::Config;
use crate::dns::{self, Fingerprint};
use crate::error::ConfigError;
use crate::matcher;
use crate::router::Router;
use crate::stats::Stats;
use crate::upstream::UpstreamRegistry;

/// Answers client queries.
///
/// Shared by every listener; the cache and counters are the only state
/// that changes after construction.
pub struct Dispatcher {
    cache: QueryCache,
    router: Router,
    stats: Stats,
    query_timeout: Option<Duration>,
}

impl Dispatcher {
    pub fn new(router: Router, cache: QueryCache, query_timeout: Option<Duration>) -> Self {
        Self {
            cache,
            router,
            stats: Stats::new(),
            query_timeout,
        }
    }

    /// Build upstreams, matchers and routes from `config`.
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let registry = UpstreamRegistry::from_configs(&config.upstreams)?;
        let matchers = matcher::build_all(&config.matches)?;
        let router = Router::from_rules(matchers, &config.rules, &registry)?;
        let cache = QueryCache::with_capacity(config.cache.capacity);

        Ok(Self::new(router, cache, config.query_timeout()))
    }

    /// Produce the response for one client query.
    ///
    /// Never fails: upstream errors become SERVFAIL, opcodes other than
    /// QUERY become NOTIMP and anything but exactly one question becomes
    /// FORMERR. Callers drop inbound responses before getting here.
    pub async fn handle(&self, query: &Message) -> Message {
        self.stats.record_query();

        if query.op_code() != OpCode::Query {
            debug!(id = query.id(), op_code = ?query.op_code(), "unsupported opcode");
            return dns::error_response(query, ResponseCode::NotImp);
        }

        let fingerprint = match Fingerprint::of(query) {
            Some(fingerprint) if query.queries().len() == 1 => fingerprint,
            _ => {
                debug!(
                    id = query.id(),
                    questions = query.queries().len(),
                    "malformed question section"
                );
                return dns::error_response(query, ResponseCode::FormErr);
            }
        };

        if let Some(hit) = self.cache.get(&fingerprint, query) {
            self.stats.record_cache_hit();
            debug!(
                name = fingerprint.name(),
                qtype = fingerprint.qtype(),
                age_ms = hit.age.as_millis() as u64,
                "cache hit"
            );
            return hit.response;
        }

        let upstream = self.router.select(query);
        let deadline = self.query_timeout.map(|timeout| Instant::now() + timeout);
        let started = Instant::now();

        match upstream.resolve(query, deadline).await {
            Ok(response) => {
                let elapsed = started.elapsed();
                self.stats.record_forwarded(elapsed);
                debug!(
                    name = fingerprint.name(),
                    qtype = fingerprint.qtype(),
                    upstream = upstream.name(),
                    rcode = %response.response_code(),
                    answers = response.answers().len(),
                    upstream_ms = elapsed.as_secs_f64() * 1000.0,
                    "forwarded"
                );
                if let Some(ttl) = cache_ttl(&response) {
                    self.cache.put(fingerprint, &response, ttl);
                }
                response
            }
            Err(e) => {
                self.stats.record_failure();
                warn!(
                    name = fingerprint.name(),
                    upstream = upstream.name(),
                    error = %e,
                    "upstream resolve failed"
                );
                dns::servfail(query)
            }
        }
    }

    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }
}

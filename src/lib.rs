//! Junction - a rule-routing DNS forwarder.
//!
//! Queries are answered from a TTL cache when possible, otherwise routed
//! to one of several upstream resolvers (UDP, TCP or DNS-over-TLS) by
//! ordered domain rules. Upstreams on hostile networks can filter forged
//! UDP replies with a resolver-fingerprinting marker.

pub mod cache;
pub mod config;
pub mod dispatcher;
pub mod dns;
pub mod error;
pub mod matcher;
pub mod proxy;
pub mod router;
pub mod stats;
pub mod telemetry;
pub mod transport;
pub mod upstream;

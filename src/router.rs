//! Rule-based upstream selection.
//!
//! Matchers are tried in configured order. The first one that both
//! matches the query and has a rule binding decides the upstream;
//! otherwise the `default` rule applies.

use rustc_hash::FxHashMap;
use std::collections::BTreeMap;
use std::sync::Arc;

use hickory_proto::op::Message;
use tracing::warn;

use crate::config::DEFAULT_RULE;
use crate::error::ConfigError;
use crate::matcher::Matcher;
use crate::upstream::{Upstream, UpstreamRegistry};

/// Immutable routing table.
pub struct Router {
    matchers: Vec<Box<dyn Matcher>>,
    rules: FxHashMap<String, Arc<dyn Upstream>>,
    default: Arc<dyn Upstream>,
}

impl Router {
    /// Build a router from matchers and resolved rule bindings.
    ///
    /// Fails without a `default` binding. Matchers with no binding are
    /// kept but can never be selected.
    pub fn new(
        matchers: Vec<Box<dyn Matcher>>,
        mut rules: FxHashMap<String, Arc<dyn Upstream>>,
    ) -> Result<Self, ConfigError> {
        let default = rules
            .remove(DEFAULT_RULE)
            .ok_or(ConfigError::MissingDefaultRoute)?;

        for matcher in &matchers {
            if !rules.contains_key(matcher.name()) {
                warn!(matcher = matcher.name(), "matcher is not used by any rule");
            }
        }

        Ok(Self {
            matchers,
            rules,
            default,
        })
    }

    /// Resolve rule bindings by upstream name, then build the router.
    ///
    /// The `default` rule must name a known upstream. Other rules naming
    /// an unknown upstream are dropped with a warning.
    pub fn from_rules(
        matchers: Vec<Box<dyn Matcher>>,
        bindings: &BTreeMap<String, String>,
        registry: &UpstreamRegistry,
    ) -> Result<Self, ConfigError> {
        let mut rules = FxHashMap::default();
        for (rule, upstream_name) in bindings {
            match registry.get(upstream_name) {
                Some(upstream) => {
                    rules.insert(rule.clone(), upstream);
                }
                None if rule == DEFAULT_RULE => {
                    return Err(ConfigError::UnknownUpstream {
                        rule: rule.clone(),
                        upstream: upstream_name.clone(),
                    });
                }
                None => {
                    warn!(rule = %rule, upstream = %upstream_name, "rule refers to unknown upstream, ignoring");
                }
            }
        }
        Self::new(matchers, rules)
    }

    /// Pick the upstream for `query`.
    pub fn select(&self, query: &Message) -> &Arc<dyn Upstream> {
        self.matchers
            .iter()
            .find_map(|matcher| {
                let upstream = self.rules.get(matcher.name())?;
                matcher.matches(query).then_some(upstream)
            })
            .unwrap_or(&self.default)
    }

    pub fn default_upstream(&self) -> &Arc<dyn Upstream> {
        &self.default
    }
}

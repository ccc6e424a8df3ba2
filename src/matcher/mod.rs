//! Query matchers.
//!
//! The router only depends on the [`Matcher`] trait. `domain_list` is the
//! predicate bundled with the binary.

mod domain_list;

pub use domain_list::DomainList;

use hickory_proto::op::Message;
use rustc_hash::FxHashSet;
use tracing::info;

use crate::config::{MatchConfig, MatchKind};
use crate::error::ConfigError;

/// A named predicate over inbound queries.
pub trait Matcher: Send + Sync {
    /// Rule name this matcher answers to.
    fn name(&self) -> &str;

    fn matches(&self, query: &Message) -> bool;
}

/// Build one matcher from its definition.
pub fn build(config: &MatchConfig) -> Result<Box<dyn Matcher>, ConfigError> {
    match config.kind {
        MatchKind::DomainList => {
            let mut list = DomainList::new(config.name.clone(), &config.domains);
            if let Some(path) = &config.path {
                list.load_file(path)?;
            }
            if list.is_empty() {
                return Err(ConfigError::Matcher {
                    name: config.name.clone(),
                    reason: "domain list is empty".to_string(),
                });
            }
            info!(matcher = %config.name, domains = list.len(), "loaded domain list");
            Ok(Box::new(list))
        }
    }
}

/// Build all matchers, keeping their configured order.
pub fn build_all(configs: &[MatchConfig]) -> Result<Vec<Box<dyn Matcher>>, ConfigError> {
    let mut seen = FxHashSet::default();
    configs
        .iter()
        .map(|config| {
            if !seen.insert(config.name.as_str()) {
                return Err(ConfigError::DuplicateMatcher(config.name.clone()));
            }
            build(config)
        })
        .collect()
}

//! Domain list matcher.
//!
//! Matches a query when its name is a listed domain or a subdomain of
//! one. Domains come inline from the config and/or from a list file.

use rustc_hash::FxHashSet;
use std::fs;
use std::path::Path;

use hickory_proto::op::Message;

use super::Matcher;
use crate::error::ConfigError;

/// A set of domains for suffix lookup.
pub struct DomainList {
    name: String,
    domains: FxHashSet<String>,
}

impl DomainList {
    /// Build a matcher from inline domains.
    pub fn new<I, S>(name: impl Into<String>, domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let domains = domains
            .into_iter()
            .filter_map(|domain| normalize(domain.as_ref()))
            .collect();

        Self {
            name: name.into(),
            domains,
        }
    }

    /// Add every domain listed in `path`, one per line.
    ///
    /// Blank lines and lines starting with `#` are skipped.
    pub fn load_file(&mut self, path: &Path) -> Result<usize, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::Matcher {
            name: self.name.clone(),
            reason: format!("failed to read {}: {e}", path.display()),
        })?;

        let before = self.domains.len();
        self.domains.extend(contents.lines().filter_map(|line| {
            let line = line.trim();
            if line.starts_with('#') {
                return None;
            }
            normalize(line)
        }));
        Ok(self.domains.len() - before)
    }

    /// Check if a domain is listed.
    ///
    /// Performs exact match and subdomain matching (e.g., contains
    /// "ads.example.com" if "example.com" is listed).
    pub fn contains(&self, domain: &str) -> bool {
        let Some(domain) = normalize(domain) else {
            return false;
        };
        let mut current = domain.as_str();

        loop {
            if self.domains.contains(current) {
                return true;
            }
            match current.find('.') {
                Some(pos) => current = &current[pos + 1..],
                None => return false,
            }
        }
    }

    /// Returns the number of listed domains.
    pub fn len(&self) -> usize {
        self.domains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.domains.is_empty()
    }
}

impl Matcher for DomainList {
    fn name(&self) -> &str {
        &self.name
    }

    fn matches(&self, query: &Message) -> bool {
        query
            .queries()
            .first()
            .is_some_and(|q| self.contains(&q.name().to_ascii()))
    }
}

fn normalize(domain: &str) -> Option<String> {
    let domain = domain.trim().trim_end_matches('.');
    if domain.is_empty() {
        None
    } else {
        Some(domain.to_ascii_lowercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dns::test_util::query;
    use std::io::Write;

    fn list() -> DomainList {
        DomainList::new("ads", ["doubleclick.com", "Tracker.Example."])
    }

    #[test]
    fn new_parses_domains() {
        assert_eq!(list().len(), 2);
    }

    #[test]
    fn contains_exact_match() {
        assert!(list().contains("doubleclick.com"));
        assert!(list().contains("tracker.example"));
    }

    #[test]
    fn contains_subdomain_match() {
        let list = list();

        assert!(list.contains("ads.doubleclick.com"));
        assert!(list.contains("tracker.ads.doubleclick.com."));
    }

    #[test]
    fn contains_case_insensitive() {
        let list = list();

        assert!(list.contains("DOUBLECLICK.COM"));
        assert!(list.contains("ADS.doubleclick.com"));
    }

    #[test]
    fn contains_returns_false_for_other_domains() {
        let list = list();

        assert!(!list.contains("google.com"));
        assert!(!list.contains("notdoubleclick.com"));
        assert!(!list.contains("example"));
    }

    #[test]
    fn contains_handles_empty_input() {
        assert!(!list().contains(""));
        assert!(!list().contains("."));
    }

    #[test]
    fn matches_first_question() {
        let list = list();

        assert!(list.matches(&query("www.DoubleClick.com.", 1)));
        assert!(!list.matches(&query("example.org.", 1)));
        assert!(!list.matches(&Message::new()));
    }

    #[test]
    fn load_file_skips_comments_and_blanks() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "# corp zones\n\ncorp.example\n  lab.example.  \n").unwrap();

        let mut list = DomainList::new("corp", Vec::<String>::new());
        let added = list.load_file(file.path()).unwrap();

        assert_eq!(added, 2);
        assert!(list.contains("git.corp.example"));
        assert!(list.contains("lab.example"));
    }

    #[test]
    fn load_file_reports_missing_file() {
        let mut list = DomainList::new("corp", Vec::<String>::new());
        let err = list
            .load_file(Path::new("/nonexistent/junction/list.txt"))
            .unwrap_err();

        assert!(matches!(err, ConfigError::Matcher { name, .. } if name == "corp"));
    }
}

//! DNS response cache with TTL-based expiration.

use rustc_hash::FxHashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use hickory_proto::op::{Message, ResponseCode};

use crate::dns::Fingerprint;

/// Default number of entries kept before eviction kicks in.
pub const DEFAULT_CAPACITY: usize = 4096;

struct CacheEntry {
    response: Message,
    inserted_at: Instant,
    expires_at: Instant,
}

/// How long a resolved response may be served from cache.
///
/// Returns `None` for responses that must not be cached: server
/// failures, responses without answer records, and answers whose first
/// record has a zero TTL. Otherwise the first answer's TTL is used as is,
/// even when later records carry shorter TTLs.
pub fn cache_ttl(response: &Message) -> Option<Duration> {
    if response.response_code() == ResponseCode::ServFail {
        return None;
    }

    match response.answers().first() {
        Some(record) if record.ttl() > 0 => Some(Duration::from_secs(u64::from(record.ttl()))),
        _ => None,
    }
}

/// A response served from cache.
#[derive(Debug)]
pub struct CacheHit {
    pub response: Message,
    /// Time since the entry was stored.
    pub age: Duration,
}

/// TTL-based query cache keyed by [`Fingerprint`].
///
/// Safe to share between tasks; a single `RwLock` keeps lookups
/// concurrent. There is no request coalescing: callers that miss on the
/// same fingerprint at the same time each resolve on their own.
pub struct QueryCache {
    entries: RwLock<FxHashMap<Fingerprint, CacheEntry>>,
    capacity: usize,
}

impl QueryCache {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: RwLock::new(FxHashMap::default()),
            capacity: capacity.max(1),
        }
    }

    /// Look up a cached response for `query`.
    ///
    /// The returned copy carries the ID and question section of `query`,
    /// so clients that randomise the letter case of names get their own
    /// spelling back.
    pub fn get(&self, fingerprint: &Fingerprint, query: &Message) -> Option<CacheHit> {
        let now = Instant::now();

        {
            let Ok(entries) = self.entries.read() else {
                return None;
            };
            match entries.get(fingerprint) {
                Some(entry) if now < entry.expires_at => {
                    let mut response = entry.response.clone();
                    response.set_id(query.id());
                    *response.queries_mut() = query.queries().to_vec();
                    return Some(CacheHit {
                        response,
                        age: now.saturating_duration_since(entry.inserted_at),
                    });
                }
                Some(_) => {}
                None => return None,
            }
        }

        let Ok(mut entries) = self.entries.write() else {
            return None;
        };
        if entries
            .get(fingerprint)
            .is_some_and(|entry| now >= entry.expires_at)
        {
            entries.remove(fingerprint);
        }
        None
    }

    /// Store `response` for `ttl`. A zero TTL stores nothing.
    pub fn put(&self, fingerprint: Fingerprint, response: &Message, ttl: Duration) {
        if ttl.is_zero() {
            return;
        }

        let now = Instant::now();
        let Ok(mut entries) = self.entries.write() else {
            return;
        };

        if entries.len() >= self.capacity && !entries.contains_key(&fingerprint) {
            entries.retain(|_, entry| now < entry.expires_at);
            if entries.len() >= self.capacity {
                evict_soonest(&mut entries);
            }
        }

        entries.insert(
            fingerprint,
            CacheEntry {
                response: response.clone(),
                inserted_at: now,
                expires_at: now + ttl,
            },
        );
    }

    /// Drop every expired entry, returning how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let Ok(mut entries) = self.entries.write() else {
            return 0;
        };
        let before = entries.len();
        entries.retain(|_, entry| now < entry.expires_at);
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::new()
    }
}

fn evict_soonest(entries: &mut FxHashMap<Fingerprint, CacheEntry>) {
    let victim = entries
        .iter()
        .min_by_key(|(_, entry)| entry.expires_at)
        .map(|(fingerprint, _)| fingerprint.clone());
    if let Some(fingerprint) = victim {
        entries.remove(&fingerprint);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dns::servfail;
    use crate::dns::test_util::{answer, query};

    fn fingerprint(domain: &str) -> Fingerprint {
        Fingerprint::of(&query(domain, 0)).unwrap()
    }

    #[test]
    fn get_rewrites_transaction_id() {
        let cache = QueryCache::new();
        let original = query("example.com.", 0x1111);
        let response = answer(&original, &[300]);
        cache.put(fingerprint("example.com."), &response, Duration::from_secs(300));

        let hit = cache
            .get(&fingerprint("example.com."), &query("example.com.", 0x2222))
            .unwrap();

        assert_eq!(hit.response.id(), 0x2222);
        assert_eq!(hit.response.answers(), response.answers());
        assert_eq!(hit.response.queries(), response.queries());
        assert!(hit.age < Duration::from_secs(1));
    }

    #[test]
    fn get_misses_after_ttl() {
        let cache = QueryCache::new();
        let response = answer(&query("example.com.", 1), &[1]);
        cache.put(fingerprint("example.com."), &response, Duration::from_millis(50));

        assert!(cache.get(&fingerprint("example.com."), &query("example.com.", 1)).is_some());

        std::thread::sleep(Duration::from_millis(80));

        assert!(cache.get(&fingerprint("example.com."), &query("example.com.", 1)).is_none());
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn get_is_case_insensitive() {
        let cache = QueryCache::new();
        let response = answer(&query("example.com.", 1), &[60]);
        cache.put(fingerprint("example.com."), &response, Duration::from_secs(60));

        assert!(cache.get(&fingerprint("ExAmPle.COM."), &query("ExAmPle.COM.", 9)).is_some());
    }

    #[test]
    fn get_echoes_question_case_of_current_query() {
        let cache = QueryCache::new();
        let response = answer(&query("example.com.", 1), &[60]);
        cache.put(fingerprint("example.com."), &response, Duration::from_secs(60));

        let current = query("eXaMpLe.CoM.", 9);
        let hit = cache.get(&fingerprint("eXaMpLe.CoM."), &current).unwrap();

        assert_eq!(hit.response.queries(), current.queries());
        assert_eq!(hit.response.queries()[0].name().to_string(), "eXaMpLe.CoM.");
        assert_eq!(hit.response.answers(), response.answers());
    }

    #[test]
    fn get_reports_entry_age() {
        let cache = QueryCache::new();
        let response = answer(&query("example.com.", 1), &[60]);
        cache.put(fingerprint("example.com."), &response, Duration::from_secs(60));

        std::thread::sleep(Duration::from_millis(30));
        let hit = cache
            .get(&fingerprint("example.com."), &query("example.com.", 2))
            .unwrap();

        assert!(hit.age >= Duration::from_millis(30));
    }

    #[test]
    fn put_with_zero_ttl_stores_nothing() {
        let cache = QueryCache::new();
        let response = answer(&query("example.com.", 1), &[0]);
        cache.put(fingerprint("example.com."), &response, Duration::ZERO);

        assert!(cache.is_empty());
    }

    #[test]
    fn put_evicts_when_full() {
        let cache = QueryCache::with_capacity(2);
        let a = answer(&query("a.example.", 1), &[60]);
        let b = answer(&query("b.example.", 1), &[600]);
        let c = answer(&query("c.example.", 1), &[600]);

        cache.put(fingerprint("a.example."), &a, Duration::from_secs(60));
        cache.put(fingerprint("b.example."), &b, Duration::from_secs(600));
        cache.put(fingerprint("c.example."), &c, Duration::from_secs(600));

        assert_eq!(cache.len(), 2);
        assert!(cache.get(&fingerprint("a.example."), &query("a.example.", 1)).is_none());
        assert!(cache.get(&fingerprint("b.example."), &query("b.example.", 1)).is_some());
        assert!(cache.get(&fingerprint("c.example."), &query("c.example.", 1)).is_some());
    }

    #[test]
    fn purge_expired_removes_only_stale_entries() {
        let cache = QueryCache::new();
        let short = answer(&query("short.example.", 1), &[1]);
        let long = answer(&query("long.example.", 1), &[600]);
        cache.put(fingerprint("short.example."), &short, Duration::from_millis(20));
        cache.put(fingerprint("long.example."), &long, Duration::from_secs(600));

        std::thread::sleep(Duration::from_millis(40));

        assert_eq!(cache.purge_expired(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn cache_ttl_uses_first_answer() {
        let response = answer(&query("example.com.", 1), &[300, 5]);

        assert_eq!(cache_ttl(&response), Some(Duration::from_secs(300)));
    }

    #[test]
    fn cache_ttl_rejects_failures_and_empty_answers() {
        let request = query("example.com.", 1);

        assert_eq!(cache_ttl(&servfail(&request)), None);
        assert_eq!(cache_ttl(&answer(&request, &[])), None);
        assert_eq!(cache_ttl(&answer(&request, &[0, 300])), None);
    }
}

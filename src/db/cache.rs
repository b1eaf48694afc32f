use anyhow::Result;
use lru::LruCache;
use serde::Serialize;
use std::fmt;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

use super::models::ResultTable;
use crate::config::CacheConfig;
use crate::query::Params;

/// Capacity used when none is configured.
pub const DEFAULT_MAX_ENTRIES: NonZeroUsize = NonZeroUsize::MIN.saturating_add(255);

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    sql: String,
    params: Params,
}

#[derive(Debug)]
struct CacheEntry {
    table: Arc<ResultTable>,
    created_at: Instant,
}

/// Hit/miss counters, logged at debug level after a render.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

/// Query result cache keyed by (SQL text, parameter mapping) with a fixed TTL
/// and a bounded number of entries (least recently used evicted first).
///
/// Entries are never invalidated by data changes; they expire by age or when
/// the process exits. A zero TTL disables storage entirely.
pub struct QueryCache {
    lru: LruCache<CacheKey, CacheEntry>,
    ttl: Duration,
    hits: u64,
    misses: u64,
}

impl fmt::Debug for QueryCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryCache")
            .field("entries", &self.lru.len())
            .field("capacity", &self.lru.cap())
            .field("ttl", &self.ttl)
            .finish()
    }
}

impl QueryCache {
    pub fn new(ttl: Duration) -> Self {
        Self::with_capacity(ttl, DEFAULT_MAX_ENTRIES)
    }

    pub fn with_capacity(ttl: Duration, capacity: NonZeroUsize) -> Self {
        QueryCache {
            lru: LruCache::new(capacity),
            ttl,
            hits: 0,
            misses: 0,
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::with_capacity(config.ttl(), config.capacity())
    }

    pub fn disabled() -> Self {
        Self::new(Duration::ZERO)
    }

    fn key(sql: &str, params: &Params) -> CacheKey {
        CacheKey {
            sql: sql.to_string(),
            params: params.clone(),
        }
    }

    /// Fresh cached result for this query, dropping it if it has expired.
    pub fn get(&mut self, sql: &str, params: &Params) -> Option<Arc<ResultTable>> {
        if self.ttl.is_zero() {
            self.misses += 1;
            return None;
        }
        let key = Self::key(sql, params);
        if let Some(entry) = self.lru.get(&key) {
            if entry.created_at.elapsed() < self.ttl {
                self.hits += 1;
                return Some(Arc::clone(&entry.table));
            }
        }
        self.lru.pop(&key);
        self.misses += 1;
        None
    }

    /// Drop expired entries from the least recently used end.
    fn evict_expired(&mut self) {
        while let Some((_, entry)) = self.lru.peek_lru() {
            if entry.created_at.elapsed() < self.ttl {
                break;
            }
            self.lru.pop_lru();
        }
    }

    pub fn insert(&mut self, sql: &str, params: &Params, table: ResultTable) -> Arc<ResultTable> {
        let table = Arc::new(table);
        if self.ttl.is_zero() {
            return table;
        }
        self.evict_expired();
        self.lru.put(
            Self::key(sql, params),
            CacheEntry {
                table: Arc::clone(&table),
                created_at: Instant::now(),
            },
        );
        table
    }

    /// Return the cached result, or run `fetch` and remember what it returns.
    /// Errors from `fetch` are passed through and nothing is cached.
    pub fn get_or_fetch<F>(&mut self, sql: &str, params: &Params, fetch: F) -> Result<Arc<ResultTable>>
    where
        F: FnOnce() -> Result<ResultTable>,
    {
        if let Some(table) = self.get(sql, params) {
            debug!(rows = table.len(), "query cache hit");
            return Ok(table);
        }
        let table = fetch()?;
        debug!(rows = table.len(), "query cache miss");
        Ok(self.insert(sql, params, table))
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits,
            misses: self.misses,
            entries: self.lru.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::Cell;
    use std::cell::Cell as Counter;

    fn table(n: i64) -> ResultTable {
        ResultTable {
            columns: vec!["n".into()],
            rows: vec![vec![Cell::Integer(n)]],
        }
    }

    fn params(pairs: &[(&str, &str)]) -> Params {
        let mut p = Params::new();
        for (k, v) in pairs {
            p.insert(*k, *v);
        }
        p
    }

    #[test]
    fn test_identical_query_is_served_from_cache() {
        let mut cache = QueryCache::new(Duration::from_secs(60));
        let calls = Counter::new(0);
        let p = params(&[("c_0", "Canada")]);

        for _ in 0..3 {
            let t = cache
                .get_or_fetch("SELECT 1", &p, || {
                    calls.set(calls.get() + 1);
                    Ok(table(1))
                })
                .unwrap();
            assert_eq!(t.rows[0][0], Cell::Integer(1));
        }

        assert_eq!(calls.get(), 1);
        assert_eq!(
            cache.stats(),
            CacheStats {
                hits: 2,
                misses: 1,
                entries: 1
            }
        );
    }

    #[test]
    fn test_different_params_miss() {
        let mut cache = QueryCache::new(Duration::from_secs(60));
        cache.insert("SELECT 1", &params(&[("c_0", "Canada")]), table(1));

        assert!(cache.get("SELECT 1", &params(&[("c_0", "USA")])).is_none());
        assert!(cache.get("SELECT 2", &params(&[("c_0", "Canada")])).is_none());
        assert!(cache.get("SELECT 1", &params(&[("c_0", "Canada")])).is_some());
    }

    #[test]
    fn test_zero_ttl_never_hits() {
        let mut cache = QueryCache::disabled();
        let calls = Counter::new(0);
        for _ in 0..2 {
            cache
                .get_or_fetch("SELECT 1", &Params::new(), || {
                    calls.set(calls.get() + 1);
                    Ok(table(1))
                })
                .unwrap();
        }
        assert_eq!(calls.get(), 2);
        assert_eq!(cache.stats().entries, 0);
    }

    #[test]
    fn test_expired_entry_is_refetched() {
        let mut cache = QueryCache::new(Duration::from_millis(20));
        cache.insert("SELECT 1", &Params::new(), table(1));
        std::thread::sleep(Duration::from_millis(40));

        let t = cache
            .get_or_fetch("SELECT 1", &Params::new(), || Ok(table(2)))
            .unwrap();
        assert_eq!(t.rows[0][0], Cell::Integer(2));
    }

    #[test]
    fn test_fetch_error_is_not_cached() {
        let mut cache = QueryCache::new(Duration::from_secs(60));
        let err = cache.get_or_fetch("SELECT nope", &Params::new(), || Err(anyhow::anyhow!("no such column")));
        assert!(err.is_err());
        assert_eq!(cache.stats().entries, 0);

        let ok = cache.get_or_fetch("SELECT nope", &Params::new(), || Ok(table(7)));
        assert!(ok.is_ok());
    }

    #[test]
    fn test_capacity_evicts_least_recently_used() {
        let cap = NonZeroUsize::new(2).unwrap();
        let mut cache = QueryCache::with_capacity(Duration::from_secs(60), cap);
        cache.insert("SELECT 1", &Params::new(), table(1));
        cache.insert("SELECT 2", &Params::new(), table(2));

        // touch 1 so 2 becomes the least recently used
        assert!(cache.get("SELECT 1", &Params::new()).is_some());
        cache.insert("SELECT 3", &Params::new(), table(3));

        assert_eq!(cache.stats().entries, 2);
        assert!(cache.get("SELECT 2", &Params::new()).is_none());
        assert!(cache.get("SELECT 1", &Params::new()).is_some());
        assert!(cache.get("SELECT 3", &Params::new()).is_some());
    }

    #[test]
    fn test_expired_entries_are_dropped_on_insert() {
        let mut cache = QueryCache::with_capacity(
            Duration::from_millis(250),
            NonZeroUsize::new(2000).unwrap(),
        );
        for i in 0..1000 {
            cache.insert(&format!("SELECT {i}"), &Params::new(), table(i));
        }
        assert_eq!(cache.stats().entries, 1000);
        std::thread::sleep(Duration::from_millis(300));

        cache.insert("SELECT 'fresh'", &Params::new(), table(0));
        assert_eq!(cache.stats().entries, 1);
    }

    #[test]
    fn test_from_config_uses_max_entries() {
        let config = CacheConfig {
            ttl_secs: 60,
            max_entries: 1,
        };
        let mut cache = QueryCache::from_config(&config);
        cache.insert("SELECT 1", &Params::new(), table(1));
        cache.insert("SELECT 2", &Params::new(), table(2));
        assert_eq!(cache.stats().entries, 1);
    }
}

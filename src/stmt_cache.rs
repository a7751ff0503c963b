//! Per-client prepared-statement bookkeeping: last-used + in-use tracking
//! and a background idle reaper.
//!
//! `sqlx` already maintains its own internal statement cache keyed by SQL
//! text inside each pooled connection. This cache layers the busy/idle
//! bookkeeping the spec's reaper needs on top of that — the "handle" held
//! here is the query string itself, not a raw driver statement object.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;
use tracing::{debug, trace};

/// Default idle timeout before an unreferenced cache entry is reaped.
pub const DEFAULT_MAX_IDLE: Duration = Duration::from_secs(180);

struct Entry {
    in_use: bool,
    last_used: Instant,
}

/// A query-string-keyed cache of in-use/last-used bookkeeping for prepared
/// statements.
pub struct StmtCache {
    entries: Mutex<HashMap<String, Entry>>,
    max_idle: Duration,
}

/// RAII guard released automatically on drop, marking the entry free for
/// reaping again and bumping its last-used time.
///
/// Holding the guard (e.g. for the lifetime of a `Rows`/`Row` scan) keeps
/// the reaper from evicting the entry out from under an in-flight read.
pub struct StmtGuard {
    cache: Arc<StmtCache>,
    query: String,
}

impl Drop for StmtGuard {
    fn drop(&mut self) {
        self.cache.release(&self.query);
    }
}

impl StmtCache {
    /// Creates a cache reaping entries idle for longer than `max_idle`.
    pub fn new(max_idle: Duration) -> Arc<StmtCache> {
        Arc::new(StmtCache {
            entries: Mutex::new(HashMap::new()),
            max_idle,
        })
    }

    /// Marks `query` in-use, inserting a fresh entry if this is the first
    /// reference, and returns a guard that releases it on drop.
    pub fn acquire(self: &Arc<Self>, query: &str) -> StmtGuard {
        let mut entries = self.entries.lock().unwrap();
        match entries.get_mut(query) {
            Some(e) => {
                e.in_use = true;
                e.last_used = Instant::now();
                trace!(query, "statement cache hit");
            }
            None => {
                entries.insert(
                    query.to_string(),
                    Entry {
                        in_use: true,
                        last_used: Instant::now(),
                    },
                );
                trace!(query, "statement cache miss, preparing");
            }
        }
        StmtGuard {
            cache: self.clone(),
            query: query.to_string(),
        }
    }

    fn release(&self, query: &str) {
        let mut entries = self.entries.lock().unwrap();
        if let Some(e) = entries.get_mut(query) {
            e.in_use = false;
            e.last_used = Instant::now();
        }
    }

    /// Scans entries once, removing any that are idle (`!in_use` and
    /// `last_used` older than `max_idle`).
    pub fn reap_once(&self) {
        let mut entries = self.entries.lock().unwrap();
        let cutoff = Instant::now();
        entries.retain(|query, e| {
            let expired = !e.in_use && cutoff.duration_since(e.last_used) >= self.max_idle;
            if expired {
                debug!(query, "reaping idle prepared statement");
            }
            !expired
        });
    }

    /// Spawns the long-lived background reaper task for this cache.
    pub fn spawn_reaper(self: Arc<Self>) -> JoinHandle<()> {
        let max_idle = self.max_idle;
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(max_idle);
            loop {
                interval.tick().await;
                self.reap_once();
            }
        })
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_then_release_clears_in_use() {
        let cache = StmtCache::new(Duration::from_millis(10));
        {
            let _guard = cache.acquire("SELECT 1");
            assert_eq!(cache.len(), 1);
        }
        cache.reap_once();
        // Not yet idle long enough to be reaped immediately, but should not
        // still be marked in-use.
        let entries = cache.entries.lock().unwrap();
        assert!(!entries.get("SELECT 1").unwrap().in_use);
    }

    #[test]
    fn reaper_removes_idle_unreferenced_entries() {
        let cache = StmtCache::new(Duration::from_millis(1));
        {
            let _guard = cache.acquire("SELECT 1");
        }
        std::thread::sleep(Duration::from_millis(5));
        cache.reap_once();
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn in_use_entries_survive_reaping() {
        let cache = StmtCache::new(Duration::from_millis(1));
        let _guard = cache.acquire("SELECT 1");
        std::thread::sleep(Duration::from_millis(5));
        cache.reap_once();
        assert_eq!(cache.len(), 1);
    }
}

//! Concurrent key/validity cache with per-entry TTL and background eviction.
//!
//! The gate records "this token validated successfully" here so repeat
//! requests inside the freshness window skip the remote calendar-service
//! call. Two timing knobs are deliberately independent:
//!
//! - **TTL** (seconds): how long an entry is *readable*. Checked on every
//!   read, so correctness never depends on the sweeper.
//! - **Sweep interval** (hours): how often expired entries are *physically
//!   removed* to bound memory. Its cadence only affects footprint.
//!
//! # Thread Safety
//!
//! All operations go through a `tokio::sync::RwLock` held for short critical
//! sections only; callers never take locks themselves. The background sweep
//! task is managed with `TaskTracker` + `CancellationToken` and stops when
//! [`ExpiringCache::shutdown`] is awaited.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::time::{Instant, interval};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, trace};

/// Storage abstraction the gate writes validated tokens into.
///
/// Kept as a trait so another backend (e.g. a shared distributed cache)
/// can be substituted without touching the gate itself.
pub trait ValidityCache: Clone + Send + Sync + 'static {
    /// Insert or overwrite `key`. A `ttl` of [`Duration::ZERO`] means
    /// "use the cache's configured default freshness".
    fn set(&self, key: &str, valid: bool, ttl: Duration) -> impl Future<Output = ()> + Send;

    /// True iff an entry exists for `key`, is marked valid, and has not
    /// logically expired at the time of the call.
    fn has(&self, key: &str) -> impl Future<Output = bool> + Send;
}

/// A single cached validity verdict.
#[derive(Debug, Clone, Copy)]
struct CacheEntry {
    valid: bool,
    valid_until: Instant,
}

impl CacheEntry {
    fn is_live(&self, now: Instant) -> bool {
        self.valid && now < self.valid_until
    }
}

/// In-memory [`ValidityCache`] with background eviction.
///
/// Cloning is cheap and all clones share the same entries. Construction
/// spawns the sweep task; call [`shutdown`](Self::shutdown) during process
/// teardown to stop it cleanly.
#[derive(Clone)]
pub struct ExpiringCache {
    entries: Arc<RwLock<HashMap<String, CacheEntry>>>,
    default_ttl: Duration,
    task_tracker: TaskTracker,
    cancellation_token: CancellationToken,
}

impl ExpiringCache {
    /// Create a cache with the given default entry TTL and eviction cadence.
    ///
    /// `sweep_interval` is typically much coarser than `default_ttl`
    /// (hours vs. seconds); expired entries are unreadable either way.
    pub fn new(default_ttl: Duration, sweep_interval: Duration) -> Self {
        let cache = Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            default_ttl,
            task_tracker: TaskTracker::new(),
            cancellation_token: CancellationToken::new(),
        };
        cache.spawn_sweep_task(sweep_interval);
        cache
    }

    /// Number of physically present entries, expired ones included.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// True if no entries are physically present.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Remove entries whose `valid_until` has passed. Returns the number
    /// of entries removed.
    pub async fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| now < entry.valid_until);
        before - entries.len()
    }

    /// Spawn the periodic eviction task.
    fn spawn_sweep_task(&self, sweep_interval: Duration) {
        let cache = self.clone();
        let cancel = self.cancellation_token.clone();

        self.task_tracker.spawn(async move {
            let mut ticker = interval(sweep_interval);
            ticker.tick().await; // Skip the first immediate tick

            loop {
                tokio::select! {
                    biased; // Check cancellation first

                    _ = cancel.cancelled() => {
                        debug!("Cache sweep task received cancellation signal");
                        break;
                    }
                    _ = ticker.tick() => {
                        let removed = cache.purge_expired().await;
                        let remaining = cache.len().await;
                        crate::metrics::set_cache_entries(remaining);
                        if removed > 0 {
                            debug!(removed, remaining, "Evicted expired cache entries");
                        } else {
                            trace!(remaining, "Cache sweep found nothing to evict");
                        }
                    }
                }
            }

            debug!("Cache sweep task shutting down");
        });
    }

    /// Stop the background sweep task and wait for it to finish.
    pub async fn shutdown(&self) {
        self.cancellation_token.cancel();
        self.task_tracker.close();
        self.task_tracker.wait().await;
        debug!("Cache shut down");
    }
}

impl ValidityCache for ExpiringCache {
    async fn set(&self, key: &str, valid: bool, ttl: Duration) {
        let effective_ttl = if ttl.is_zero() { self.default_ttl } else { ttl };
        let entry = CacheEntry {
            valid,
            valid_until: Instant::now() + effective_ttl,
        };

        let mut entries = self.entries.write().await;
        entries.insert(key.to_string(), entry);
        crate::metrics::set_cache_entries(entries.len());
    }

    async fn has(&self, key: &str) -> bool {
        // Freshness is checked here on every read: an expired entry the
        // sweeper has not reached yet must never count as a hit.
        let now = Instant::now();
        self.entries
            .read()
            .await
            .get(key)
            .is_some_and(|entry| entry.is_live(now))
    }
}

use std::{fmt::Debug, future::Future, hash::Hash, time::Duration};

use metrics::counter;
use mini_moka::sync::Cache;
use tracing::{instrument, trace, Level};

/// Time-based cache owned by a single source adapter.
///
/// An entry is returned only while it is younger than the configured ttl; expired entries
/// behave as absent and are replaced by the next successful fetch. Clones share the same
/// storage, so an adapter and a test can hold the same cache. Concurrent writers race with
/// last-write-wins semantics and readers never wait on writers.
///
/// A zero ttl turns the cache into a pass-through: nothing is stored and every lookup misses.
#[derive(Clone)]
pub struct TtlCache<K, V> {
    name: String,
    ttl: Duration,
    inner: Option<Cache<K, V>>,
}

impl<K, V> TtlCache<K, V>
where
    K: Clone + Hash + Eq + Send + Sync + Debug + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub fn new(name: &str, ttl: Duration) -> Self {
        let inner = (!ttl.is_zero()).then(|| {
            Cache::builder()
                .time_to_live(ttl)
                .build()
        });
        Self { name: name.to_string(), ttl, inner }
    }

    /// A cache that never retains values.
    pub fn always_live(name: &str) -> Self {
        Self::new(name, Duration::ZERO)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn get(&self, key: &K) -> Option<V> {
        self.inner
            .as_ref()
            .and_then(|cache| cache.get(key))
    }

    pub fn set(&self, key: K, value: V) {
        if let Some(cache) = self.inner.as_ref() {
            cache.insert(key, value);
        }
    }

    /// Returns the cached value for `key`, or awaits `fetch` and caches its result.
    ///
    /// Errors are passed through untouched and never cached.
    #[instrument(
        name = "source.cache.get",
        level = Level::TRACE,
        fields(miss, cache = %self.name),
        skip(self, fetch)
    )]
    pub async fn get_or_fetch<E, Fut, F>(&self, key: K, fetch: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        if let Some(value) = self.get(&key) {
            tracing::Span::current().record("miss", false);
            trace!(cache = %self.name, "CacheHit");
            counter!("source_cache_hits", "cache" => self.name.clone()).increment(1);
            return Ok(value);
        }

        tracing::Span::current().record("miss", true);
        trace!(cache = %self.name, "CacheMiss");
        counter!("source_cache_misses", "cache" => self.name.clone()).increment(1);

        let value = fetch().await?;
        self.set(key, value.clone());
        Ok(value)
    }
}

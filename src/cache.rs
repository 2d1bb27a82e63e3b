//! Expiry-aware memoization of token exchanges
//!
//! [`TokenCache`] maps a key to the last value produced for it and only calls
//! the factory again once that value has expired. Each key has its own async
//! slot lock which is held while the factory runs, so concurrent callers for
//! the same key share one exchange while distinct keys proceed in parallel.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::hash::Hash;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::clock::Clock;

/// A value that knows when it should no longer be served from cache.
pub trait Expiring {
    /// Returns `true` if the value must be refreshed at `now`.
    fn is_expiring_at(&self, now: DateTime<Utc>) -> bool;
}

#[derive(Debug)]
struct CacheEntry<V> {
    value: V,
    created_at: DateTime<Utc>,
}

type Slot<V> = Arc<tokio::sync::Mutex<Option<CacheEntry<V>>>>;
type ExpiryPolicy<V> = Box<dyn Fn(&CacheEntry<V>, DateTime<Utc>) -> bool + Send + Sync>;

/// Per-key memoizing cache with at most one factory call in flight per key.
///
/// Entries are replaced when they expire and never removed, so the cache
/// grows with the number of distinct keys seen.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use std::time::Duration;
/// use maskinporten_client::cache::TokenCache;
/// use maskinporten_client::clock::SystemClock;
///
/// # #[tokio::main]
/// # async fn main() {
/// let cache: TokenCache<String, u32> =
///     TokenCache::with_ttl(Duration::from_secs(60), Arc::new(SystemClock));
///
/// let first = cache
///     .get_token(&"key".to_string(), || async { Ok::<_, std::io::Error>(1) })
///     .await
///     .unwrap();
/// let second = cache
///     .get_token(&"key".to_string(), || async { Ok::<_, std::io::Error>(2) })
///     .await
///     .unwrap();
/// assert_eq!((first, second), (1, 1));
/// # }
/// ```
pub struct TokenCache<K, V> {
    slots: Mutex<HashMap<K, Slot<V>>>,
    is_expired: ExpiryPolicy<V>,
    clock: Arc<dyn Clock>,
}

impl<K, V> TokenCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone + Expiring + 'static,
{
    /// Creates a cache that asks each value whether it is expiring.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self::with_policy(
            Box::new(|entry: &CacheEntry<V>, now: DateTime<Utc>| {
                entry.value.is_expiring_at(now)
            }),
            clock,
        )
    }
}

impl<K, V> TokenCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone + 'static,
{
    /// Creates a cache whose entries expire `ttl` after they were stored.
    pub fn with_ttl(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self::with_expiry(move |_| ttl, clock)
    }

    /// Creates a cache whose entries expire after a lifetime computed from
    /// the stored value.
    pub fn with_expiry<F>(lifetime: F, clock: Arc<dyn Clock>) -> Self
    where
        F: Fn(&V) -> Duration + Send + Sync + 'static,
    {
        Self::with_policy(
            Box::new(move |entry: &CacheEntry<V>, now: DateTime<Utc>| {
                let lifetime = chrono::Duration::from_std(lifetime(&entry.value))
                    .unwrap_or(chrono::Duration::MAX);
                match entry.created_at.checked_add_signed(lifetime) {
                    Some(expires_at) => now >= expires_at,
                    None => false,
                }
            }),
            clock,
        )
    }

    fn with_policy(is_expired: ExpiryPolicy<V>, clock: Arc<dyn Clock>) -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
            is_expired,
            clock,
        }
    }

    /// Returns the cached value for `key`, or runs `factory` to produce one.
    ///
    /// While `factory` runs, other callers for the same key wait and then
    /// reuse its result. A factory error is returned to its caller and
    /// leaves any previous entry untouched; a waiting caller then runs its
    /// own factory. Dropping the returned future releases the key without
    /// storing anything.
    ///
    /// # Errors
    ///
    /// Returns whatever error `factory` returns.
    pub async fn get_token<F, Fut, E>(&self, key: &K, factory: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        let slot = self.slot(key);
        let mut entry = slot.lock().await;

        match entry.as_ref() {
            Some(cached) if !(self.is_expired)(cached, self.clock.now()) => {
                debug!("Token cache hit");
                return Ok(cached.value.clone());
            }
            Some(_) => debug!("Cached token expired, refreshing"),
            None => debug!("Token cache miss"),
        }

        let value = factory().await?;
        *entry = Some(CacheEntry {
            value: value.clone(),
            created_at: self.clock.now(),
        });
        Ok(value)
    }

    /// Number of keys that have a slot.
    pub fn len(&self) -> usize {
        self.lock_slots().len()
    }

    /// Returns `true` if no key has been seen yet.
    pub fn is_empty(&self) -> bool {
        self.lock_slots().is_empty()
    }

    fn slot(&self, key: &K) -> Slot<V> {
        let mut slots = self.lock_slots();
        Arc::clone(slots.entry(key.clone()).or_default())
    }

    fn lock_slots(&self) -> std::sync::MutexGuard<'_, HashMap<K, Slot<V>>> {
        self.slots.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl<K, V> fmt::Debug for TokenCache<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let keys = self
            .slots
            .lock()
            .map(|slots| slots.len())
            .unwrap_or_default();
        f.debug_struct("TokenCache")
            .field("keys", &keys)
            .field("clock", &self.clock)
            .finish_non_exhaustive()
    }
}

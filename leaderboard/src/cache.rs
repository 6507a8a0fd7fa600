// In-memory response cache shared by discovery, the zone directory and the
// records engine. Every entry carries its own TTL; concurrent initialisation of
// one key is coalesced into a single future.
use crate::discovery::RelayEndpoint;
use crate::metrics_defs::{CACHE_HIT, CACHE_MISS, counter};
use crate::model::{Source, ZoneMap};
use crate::records::SourceRecords;
use moka::Expiry;
use moka::future::Cache;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum CacheKey {
    Records {
        source: Source,
        map_uid: String,
        zone: String,
    },
    RelayUrl(Source),
    Zones,
}

impl CacheKey {
    pub fn records(source: Source, map_uid: &str, zone: &str) -> Self {
        CacheKey::Records {
            source,
            map_uid: map_uid.to_string(),
            zone: zone.to_string(),
        }
    }

    fn purpose(&self) -> &'static str {
        match self {
            CacheKey::Records { .. } => "records",
            CacheKey::RelayUrl(_) => "relay_url",
            CacheKey::Zones => "zones",
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheKey::Records {
                source,
                map_uid,
                zone,
            } => write!(f, "Records_{source}_{map_uid}_{zone}"),
            CacheKey::RelayUrl(source) => write!(f, "RelayUrl_{source}"),
            CacheKey::Zones => f.write_str("Zones"),
        }
    }
}

#[derive(Clone, Debug)]
pub enum CachedValue {
    Records(Arc<SourceRecords>),
    RelayUrl(RelayEndpoint),
    Zones(Arc<ZoneMap>),
}

impl CachedValue {
    pub fn into_records(self) -> Option<Arc<SourceRecords>> {
        match self {
            CachedValue::Records(records) => Some(records),
            _ => None,
        }
    }

    pub fn into_relay_url(self) -> Option<RelayEndpoint> {
        match self {
            CachedValue::RelayUrl(endpoint) => Some(endpoint),
            _ => None,
        }
    }

    pub fn into_zones(self) -> Option<Arc<ZoneMap>> {
        match self {
            CachedValue::Zones(zones) => Some(zones),
            _ => None,
        }
    }
}

#[derive(Clone)]
struct CacheEntry {
    value: CachedValue,
    ttl: Duration,
}

/// Expires each entry after the TTL it was written with. Overwriting a key
/// restarts the clock with the new entry's TTL.
struct PerEntryTtl;

impl Expiry<CacheKey, CacheEntry> for PerEntryTtl {
    fn expire_after_create(
        &self,
        _key: &CacheKey,
        value: &CacheEntry,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &CacheKey,
        value: &CacheEntry,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

#[derive(Clone)]
pub struct ResponseCache {
    cache: Cache<CacheKey, CacheEntry>,
}

impl ResponseCache {
    pub fn new(max_capacity: u64) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_capacity)
            .expire_after(PerEntryTtl)
            .build();

        ResponseCache { cache }
    }

    pub async fn get(&self, key: &CacheKey) -> Option<CachedValue> {
        let entry = self.cache.get(key).await;
        let metric_def = if entry.is_some() {
            CACHE_HIT
        } else {
            CACHE_MISS
        };
        counter!(metric_def, "purpose" => key.purpose()).increment(1);
        entry.map(|entry| entry.value)
    }

    /// Writes a value, replacing any previous entry for the key.
    pub async fn insert(&self, key: CacheKey, value: CachedValue, ttl: Duration) {
        tracing::debug!("Caching {key} for {ttl:?}");
        self.cache.insert(key, CacheEntry { value, ttl }).await;
    }

    /// Returns the cached value for `key`, or runs `init` to produce it.
    ///
    /// Concurrent callers for the same key wait on a single `init` future and
    /// all receive its result. Errors are shared with every waiter and are not
    /// cached, so the next call runs `init` again.
    pub async fn try_get_with<F, E>(
        &self,
        key: CacheKey,
        ttl: Duration,
        init: F,
    ) -> Result<CachedValue, Arc<E>>
    where
        F: Future<Output = Result<CachedValue, E>>,
        E: Send + Sync + 'static,
    {
        let purpose = key.purpose();
        let entry = self
            .cache
            .entry(key)
            .or_try_insert_with(async move { init.await.map(|value| CacheEntry { value, ttl }) })
            .await?;

        let metric_def = if entry.is_fresh() {
            CACHE_MISS
        } else {
            CACHE_HIT
        };
        counter!(metric_def, "purpose" => purpose).increment(1);

        Ok(entry.into_value().value)
    }

    pub async fn invalidate(&self, key: &CacheKey) {
        self.cache.invalidate(key).await;
    }
}

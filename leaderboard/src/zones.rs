use crate::cache::{CacheKey, CachedValue, ResponseCache};
use crate::client::BackendClient;
use crate::errors::{LeaderboardError, ValidationError};
use crate::model::{Source, Zone, ZoneMap};
use crate::protocol::{XmlElement, XmlRequest};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Zone used when a query does not name one.
pub const DEFAULT_ZONE: &str = "World";

/// Merged league taxonomy of all sources, cached as a whole.
#[derive(Clone)]
pub struct ZoneDirectory {
    client: BackendClient,
    cache: ResponseCache,
    ttl: Duration,
}

impl ZoneDirectory {
    pub fn new(client: BackendClient, cache: ResponseCache, ttl: Duration) -> Self {
        ZoneDirectory { client, cache, ttl }
    }

    /// Returns the cached directory, loading it on a miss.
    ///
    /// Concurrent callers share one load. The load is not tied to any
    /// caller's token, so `cancel` only abandons this caller's wait.
    pub async fn get_zones(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Arc<ZoneMap>, LeaderboardError> {
        let load = self.cache.try_get_with(CacheKey::Zones, self.ttl, async {
            self.fetch_zones().await.map(CachedValue::Zones)
        });

        let value = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(LeaderboardError::Canceled),
            value = load => value.map_err(|e| (*e).clone())?,
        };

        value.into_zones().ok_or(LeaderboardError::ZonesUnavailable)
    }

    async fn fetch_zones(&self) -> Result<Arc<ZoneMap>, LeaderboardError> {
        let detached = CancellationToken::new();
        let mut join_set = JoinSet::new();
        for source in Source::ALL {
            let client = self.client.clone();
            let cancel = detached.clone();
            join_set.spawn(async move {
                let result = client
                    .send(source, &XmlRequest::get_leagues(), &cancel)
                    .await;
                (source, result)
            });
        }

        let mut zones = ZoneMap::new();
        let mut answered = 0;

        while let Some(join_result) = join_set.join_next().await {
            match join_result {
                Ok((source, Ok(content))) => {
                    answered += 1;
                    merge_leagues(&mut zones, source, &content);
                }
                Ok((source, Err(e))) => {
                    tracing::warn!("Could not load zones from {source}: {e}");
                }
                Err(e) => tracing::error!("Task panicked: {}", e),
            }
        }

        if answered == 0 {
            return Err(LeaderboardError::ZonesUnavailable);
        }

        tracing::info!("Loaded {} zones from {answered} sources", zones.len());
        Ok(Arc::new(zones))
    }
}

/// Adds the `<l>` entries of one `GetLeagues` response to `zones`.
///
/// Zones are keyed by `parent|name`, or by `name` alone for roots. A zone
/// reported by several sources is kept once with all of them.
pub fn merge_leagues(zones: &mut ZoneMap, source: Source, content: &XmlElement) {
    for league in content.children("l") {
        let name = league.child_text("a").unwrap_or_default();
        if name.is_empty() {
            continue;
        }

        let qualified = match league.child_text("b") {
            Some(parent) if !parent.is_empty() => format!("{parent}|{name}"),
            _ => name.to_string(),
        };

        zones
            .entry(qualified.clone())
            .or_insert_with(|| Zone {
                name: qualified,
                sources: BTreeSet::new(),
            })
            .sources
            .insert(source);
    }
}

/// Validates a requested zone, defaulting blank input to [`DEFAULT_ZONE`].
pub fn resolve_zone(zones: &ZoneMap, zone: Option<&str>) -> Result<String, ValidationError> {
    let zone = match zone.map(str::trim) {
        Some(zone) if !zone.is_empty() => zone,
        _ => DEFAULT_ZONE,
    };

    if zones.contains_key(zone) {
        Ok(zone.to_string())
    } else {
        Err(ValidationError::UnknownZone(zone.to_string()))
    }
}

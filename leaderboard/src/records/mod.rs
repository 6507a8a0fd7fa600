//! Aggregated leaderboard queries.
//!
//! A query validates its input, serves every requested source from the cache
//! where it can, fetches the rest concurrently and merges everything into one
//! ranked list with a distribution graph.

pub mod decode;
pub mod graph;
pub mod ranking;
pub mod task_executor;

use crate::cache::{CacheKey, CachedValue, ResponseCache};
use crate::errors::{BackendError, LeaderboardError, ValidationError};
use crate::metrics_defs::{RECORDS_QUERY_DURATION, histogram};
use crate::model::{RankedRecord, Record, Source, SourceSet};
use crate::zones::{ZoneDirectory, resolve_zone};
use chrono::{DateTime, Utc};
use graph::{DistributionGraph, distribution_graph};
use ranking::rank_records;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};
use task_executor::SourceFetcher;
use tokio_util::sync::CancellationToken;

/// Leaderboard of one source for one map and zone, as cached.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SourceRecords {
    /// Response date reported by the backend
    pub timestamp: Option<DateTime<Utc>>,
    pub records: Vec<Record>,
    /// Set when the source could not provide records
    pub error: Option<String>,
}

impl SourceRecords {
    pub fn failed(error: impl Into<String>) -> Self {
        SourceRecords {
            timestamp: None,
            records: Vec::new(),
            error: Some(error.into()),
        }
    }

    pub fn summary(&self) -> SourceSummary {
        SourceSummary {
            count: self.records.iter().map(|r| u64::from(r.count)).sum(),
            timestamp: self.timestamp,
            error: self.error.clone(),
        }
    }
}

/// Per-source metadata of an aggregated response.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceSummary {
    /// Total runs over all records, 0 for a failed source
    pub count: u64,
    pub timestamp: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordsResponse {
    pub platforms: BTreeMap<Source, SourceSummary>,
    #[serde(rename = "recordDistributionGraph")]
    pub distribution_graph: DistributionGraph,
    pub records: Vec<RankedRecord>,
}

impl RecordsResponse {
    pub fn assemble(sources: &BTreeMap<Source, Arc<SourceRecords>>) -> Self {
        let merged = sources
            .values()
            .flat_map(|source| source.records.iter().copied())
            .collect();
        let records = rank_records(merged);

        RecordsResponse {
            platforms: sources
                .iter()
                .map(|(source, records)| (*source, records.summary()))
                .collect(),
            distribution_graph: distribution_graph(&records),
            records,
        }
    }
}

fn map_uid_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[a-zA-Z0-9_]{26,27}$").expect("map uid pattern"))
}

pub fn validate_map_uid(map_uid: &str) -> Result<(), ValidationError> {
    if map_uid_pattern().is_match(map_uid) {
        Ok(())
    } else {
        Err(ValidationError::InvalidMapUid(map_uid.to_string()))
    }
}

/// Answers aggregated records queries.
#[derive(Clone)]
pub struct RecordService {
    zones: ZoneDirectory,
    fetcher: SourceFetcher,
    cache: ResponseCache,
    ttl: Duration,
}

impl RecordService {
    pub fn new(
        zones: ZoneDirectory,
        fetcher: SourceFetcher,
        cache: ResponseCache,
        ttl: Duration,
    ) -> Self {
        RecordService {
            zones,
            fetcher,
            cache,
            ttl,
        }
    }

    pub async fn get_records(
        &self,
        sources: &SourceSet,
        map_uid: &str,
        zone: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<RecordsResponse, LeaderboardError> {
        let started = Instant::now();

        if sources.is_empty() {
            return Err(ValidationError::EmptySourceSet.into());
        }
        validate_map_uid(map_uid)?;

        let zones = self.zones.get_zones(cancel).await?;
        let zone = resolve_zone(&zones, zone)?;

        let mut resolved = BTreeMap::new();
        let mut missing = Vec::new();

        for source in sources.iter() {
            let key = CacheKey::records(source, map_uid, &zone);
            match self.cache.get(&key).await.and_then(CachedValue::into_records) {
                Some(records) => {
                    resolved.insert(source, records);
                }
                None => missing.push(source),
            }
        }

        if !missing.is_empty() {
            tracing::debug!("Fetching {map_uid} in {zone} from {missing:?}");

            let fetched = self
                .fetcher
                .fetch_all(missing, map_uid, &zone, cancel)
                .await?;

            for (source, result) in fetched {
                let records = self.store(source, map_uid, &zone, result).await;
                resolved.insert(source, records);
            }
        }

        let response = RecordsResponse::assemble(&resolved);

        histogram!(RECORDS_QUERY_DURATION).record(started.elapsed().as_secs_f64());
        Ok(response)
    }

    /// Caches a fetch result where that is useful and returns it.
    ///
    /// Records and backend `<e>` errors are cached. Transport failures,
    /// timeouts and cancellations are not, so the next query retries them.
    async fn store(
        &self,
        source: Source,
        map_uid: &str,
        zone: &str,
        result: Result<SourceRecords, BackendError>,
    ) -> Arc<SourceRecords> {
        let (records, cacheable) = match result {
            Ok(records) => (Arc::new(records), true),
            Err(BackendError::Protocol(_, message)) => {
                tracing::error!("XML-RPC error from {source} for {map_uid}: {message}");
                (Arc::new(SourceRecords::failed(message)), true)
            }
            Err(e) => {
                tracing::warn!("Could not fetch {map_uid} from {source}: {e}");
                (Arc::new(SourceRecords::failed(e.to_string())), false)
            }
        };

        if cacheable {
            self.cache
                .insert(
                    CacheKey::records(source, map_uid, zone),
                    CachedValue::Records(records.clone()),
                    self.ttl,
                )
                .await;
        }

        records
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutils::{MockBackend, error_body, records_body};
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, ResponseTemplate};

    const MAP_UID: &str = "abcdefghijklmnopqrstuvwxyz";

    fn summary(response: &RecordsResponse) -> Vec<(u32, Source, Option<i32>)> {
        response
            .records
            .iter()
            .map(|r| (r.rank, r.record.source, r.record.time))
            .collect()
    }

    #[test]
    fn test_validate_map_uid() {
        assert_eq!(
            validate_map_uid("short"),
            Err(ValidationError::InvalidMapUid("short".into()))
        );
        assert!(validate_map_uid("abcdefghijklmnopqrstuvwxyz").is_ok());
        assert!(validate_map_uid("ABCDEFGHIJKLMNOPQRSTUVWXY_1").is_ok());
        assert!(validate_map_uid("abcdefghijklmnopqrstuvwxyz12").is_err());
        assert!(validate_map_uid("abcdefghijklmnopqrstuvwxy-").is_err());
    }

    #[tokio::test]
    async fn test_validation_happens_before_fetching() {
        let backend = MockBackend::start().await;
        backend.mount_discovery_all().await;
        backend.mount_leagues_all(&[("World", ""), ("France", "World")]).await;
        for source in Source::ALL {
            Mock::given(method("POST"))
                .and(path("/game/request.php"))
                .and(body_string_contains("GetLeaderBoardSummary"))
                .respond_with(ResponseTemplate::new(200).set_body_string(records_body(0, &[])))
                .expect(0)
                .mount(backend.server(source))
                .await;
        }

        let service = backend.leaderboard().records;
        let cancel = CancellationToken::new();
        let all = SourceSet::all();

        assert_eq!(
            service.get_records(&all, "short", None, &cancel).await,
            Err(LeaderboardError::Validation(ValidationError::InvalidMapUid(
                "short".into()
            )))
        );
        assert_eq!(
            service
                .get_records(&all, MAP_UID, Some("Atlantis"), &cancel)
                .await,
            Err(LeaderboardError::Validation(ValidationError::UnknownZone(
                "Atlantis".into()
            )))
        );
        assert_eq!(
            service
                .get_records(&SourceSet::from_iter(std::iter::empty()), MAP_UID, None, &cancel)
                .await,
            Err(LeaderboardError::Validation(ValidationError::EmptySourceSet))
        );
    }

    #[tokio::test]
    async fn test_three_source_merge() {
        let backend = MockBackend::start().await;
        backend.mount_discovery_all().await;
        backend.mount_leagues_all(&[("World", "")]).await;
        backend
            .mount_records(Source::Pc, records_body(1_700_000_000, &[(41000, 1), (42000, 3)]))
            .await;
        backend
            .mount_records(Source::Xb1, records_body(1_700_000_100, &[(41000, 2), (43000, 1)]))
            .await;
        backend
            .mount_records(Source::Ps4, records_body(1_700_000_200, &[(-1, 4), (-1, 5)]))
            .await;

        let response = backend
            .leaderboard()
            .records
            .get_records(&SourceSet::all(), MAP_UID, Some(""), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(
            summary(&response),
            [
                (1, Source::Pc, Some(41000)),
                (1, Source::Xb1, Some(41000)),
                (3, Source::Pc, Some(42000)),
                (4, Source::Xb1, Some(43000)),
                (4, Source::Ps4, None),
                (4, Source::Ps4, None),
            ]
        );

        assert_eq!(response.platforms[&Source::Pc].count, 4);
        assert_eq!(response.platforms[&Source::Ps4].count, 9);
        assert_eq!(
            response.platforms[&Source::Xb1].timestamp,
            DateTime::from_timestamp(1_700_000_100, 0)
        );
        assert!(response.distribution_graph.y.contains_key(&Source::Pc));
        assert!(!response.distribution_graph.y.contains_key(&Source::Ps4));
    }

    #[tokio::test]
    async fn test_protocol_error_degrades_one_source() {
        let backend = MockBackend::start().await;
        backend.mount_discovery_all().await;
        backend.mount_leagues_all(&[("World", "")]).await;
        backend
            .mount_records(Source::Pc, records_body(1_700_000_000, &[(50000, 1), (51000, 1)]))
            .await;
        Mock::given(method("POST"))
            .and(path("/game/request.php"))
            .and(body_string_contains("GetLeaderBoardSummary"))
            .respond_with(ResponseTemplate::new(200).set_body_string(error_body("Unknown map")))
            .expect(1)
            .mount(backend.server(Source::Xb1))
            .await;

        let service = backend.leaderboard().records;
        let sources = SourceSet::parse("pc,xb1").unwrap();
        let cancel = CancellationToken::new();

        let response = service
            .get_records(&sources, MAP_UID, None, &cancel)
            .await
            .unwrap();

        assert_eq!(response.records.len(), 2);
        assert!(response.records.iter().all(|r| r.record.source == Source::Pc));
        assert_eq!(
            response.platforms[&Source::Xb1],
            SourceSummary {
                count: 0,
                timestamp: None,
                error: Some("Unknown map".into()),
            }
        );
        assert_eq!(response.platforms[&Source::Pc].error, None);

        // The error is cached like a regular answer
        let again = service
            .get_records(&sources, MAP_UID, None, &cancel)
            .await
            .unwrap();
        assert_eq!(again, response);
    }

    #[tokio::test]
    async fn test_transport_errors_are_not_cached() {
        let backend = MockBackend::start().await;
        backend.mount_discovery_all().await;
        backend.mount_leagues_all(&[("World", "")]).await;
        Mock::given(method("POST"))
            .and(path("/game/request.php"))
            .and(body_string_contains("GetLeaderBoardSummary"))
            .respond_with(ResponseTemplate::new(500))
            .expect(2)
            .mount(backend.server(Source::Ps4))
            .await;

        let service = backend.leaderboard().records;
        let sources = SourceSet::parse("ps4").unwrap();
        let cancel = CancellationToken::new();

        for _ in 0..2 {
            let response = service
                .get_records(&sources, MAP_UID, None, &cancel)
                .await
                .unwrap();
            assert!(response.records.is_empty());
            assert!(response.platforms[&Source::Ps4].error.is_some());
        }
    }

    #[tokio::test]
    async fn test_records_are_cached_per_source() {
        let backend = MockBackend::start().await;
        backend.mount_discovery_all().await;
        backend.mount_leagues_all(&[("World", ""), ("Japan", "World")]).await;
        for source in [Source::Pc, Source::Ps4] {
            Mock::given(method("POST"))
                .and(path("/game/request.php"))
                .and(body_string_contains("GetLeaderBoardSummary"))
                .and(body_string_contains("<z>World|Japan</z>"))
                .respond_with(
                    ResponseTemplate::new(200)
                        .set_body_string(records_body(1_700_000_000, &[(30000, 1)])),
                )
                .expect(1)
                .mount(backend.server(source))
                .await;
        }

        let service = backend.leaderboard().records;
        let cancel = CancellationToken::new();
        let zone = Some("World|Japan");

        let pc = SourceSet::parse("pc").unwrap();
        service.get_records(&pc, MAP_UID, zone, &cancel).await.unwrap();

        // PC comes from the cache, only PS4 is fetched
        let both = SourceSet::parse("pc,ps4").unwrap();
        let response = service.get_records(&both, MAP_UID, zone, &cancel).await.unwrap();
        assert_eq!(
            summary(&response),
            [(1, Source::Pc, Some(30000)), (1, Source::Ps4, Some(30000))]
        );

        service.get_records(&both, MAP_UID, zone, &cancel).await.unwrap();
    }

    #[tokio::test]
    async fn test_cached_records_expire() {
        let backend = MockBackend::start().await;
        backend.mount_discovery_all().await;
        backend.mount_leagues_all(&[("World", "")]).await;
        Mock::given(method("POST"))
            .and(path("/game/request.php"))
            .and(body_string_contains("GetLeaderBoardSummary"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string(records_body(0, &[(30000, 1)])),
            )
            .expect(2)
            .mount(backend.server(Source::Pc))
            .await;

        let mut config = backend.config();
        config.cache.records_ttl_secs = 1;
        let service = crate::Leaderboard::new(&config).unwrap().records;
        let sources = SourceSet::parse("pc").unwrap();
        let cancel = CancellationToken::new();

        service.get_records(&sources, MAP_UID, None, &cancel).await.unwrap();
        service.get_records(&sources, MAP_UID, None, &cancel).await.unwrap();
        tokio::time::sleep(Duration::from_millis(1200)).await;
        service.get_records(&sources, MAP_UID, None, &cancel).await.unwrap();
    }

    #[test]
    fn test_response_serialization() {
        let mut sources = BTreeMap::new();
        sources.insert(
            Source::Xb1,
            Arc::new(SourceRecords {
                timestamp: DateTime::from_timestamp(1_700_000_000, 0),
                records: vec![Record {
                    source_rank: 1,
                    time: Some(41250),
                    count: 3,
                    source: Source::Xb1,
                }],
                error: None,
            }),
        );

        let json = serde_json::to_value(RecordsResponse::assemble(&sources)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "platforms": {
                    "XB1": {"count": 3, "timestamp": "2023-11-14T22:13:20Z", "error": null}
                },
                "recordDistributionGraph": {"x": ["+0s"], "y": {"XB1": [3]}},
                "records": [
                    {"rank": 1, "sourceRank": 1, "time": 41250, "count": 3, "source": "XB1"}
                ]
            })
        );
    }
}

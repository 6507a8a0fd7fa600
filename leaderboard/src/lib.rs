//! Leaderboard aggregation over the TMTurbo platform backends.
//!
//! Each platform runs its own backend cluster behind an XML-RPC dialect and a
//! discovery handshake. [`Leaderboard`] hides all of that behind two queries:
//! merged records for a map and the zone directory.

pub mod api;
pub mod cache;
pub mod client;
pub mod config;
pub mod discovery;
pub mod errors;
pub mod metrics_defs;
pub mod model;
pub mod protocol;
pub mod records;
pub mod zones;

#[cfg(test)]
mod testutils;

use crate::api::ServeError;
use crate::cache::ResponseCache;
use crate::client::{BackendClient, build_http_client};
use crate::config::Config;
use crate::discovery::Discovery;
use crate::errors::Result;
use crate::model::{SourceSet, ZoneMap};
use crate::records::task_executor::SourceFetcher;
use crate::records::{RecordService, RecordsResponse};
use crate::zones::ZoneDirectory;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Entry point wiring discovery, zones and records over one shared cache.
#[derive(Clone)]
pub struct Leaderboard {
    pub(crate) discovery: Discovery,
    pub(crate) zones: ZoneDirectory,
    pub(crate) records: RecordService,
}

impl Leaderboard {
    pub fn new(config: &Config) -> Result<Self> {
        let http = build_http_client(&config.backend)?;
        let cache = ResponseCache::new(config.cache.max_capacity);

        let discovery = Discovery::new(
            http.clone(),
            Arc::new(config.backend.clone()),
            cache.clone(),
            config.cache.relay_ttl(),
        );
        let client = BackendClient::new(http, discovery.clone());
        let zones = ZoneDirectory::new(client.clone(), cache.clone(), config.cache.zones_ttl());
        let fetcher = SourceFetcher::new(client, config.backend.fetch_timeout());
        let records = RecordService::new(
            zones.clone(),
            fetcher,
            cache,
            config.cache.records_ttl(),
        );

        Ok(Leaderboard {
            discovery,
            zones,
            records,
        })
    }

    /// Discovers every source's relay endpoint. Failures are logged only.
    pub async fn warm_up(&self, cancel: &CancellationToken) {
        self.discovery.warm_up(cancel).await;
    }

    pub async fn get_records(
        &self,
        sources: &SourceSet,
        map_uid: &str,
        zone: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<RecordsResponse> {
        self.records
            .get_records(sources, map_uid, zone, cancel)
            .await
    }

    pub async fn get_zones(&self, cancel: &CancellationToken) -> Result<Arc<ZoneMap>> {
        self.zones.get_zones(cancel).await
    }
}

/// Warms up discovery, then serves the HTTP API until `shutdown` is cancelled.
pub async fn run(config: Config, shutdown: CancellationToken) -> std::result::Result<(), ServeError> {
    let leaderboard = Leaderboard::new(&config)?;

    tracing::info!("Discovering relay endpoints");
    leaderboard.warm_up(&shutdown).await;

    api::serve(&config.listener, leaderboard, shutdown).await
}

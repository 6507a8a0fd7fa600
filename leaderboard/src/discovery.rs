use crate::cache::{CacheKey, CachedValue, ResponseCache};
use crate::client::post_envelope;
use crate::config::BackendConfig;
use crate::errors::BackendError;
use crate::metrics_defs::{DISCOVERY_FAILURE, DISCOVERY_SUCCESS, counter};
use crate::model::Source;
use crate::protocol::{XmlElement, XmlRequest};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Address that record and zone requests for one source are posted to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RelayEndpoint {
    pub url: String,
    /// Display name of the relay, only used in logs
    pub name: Option<String>,
}

impl RelayEndpoint {
    /// Reads the first master server out of a `GetWaitingParams` response.
    ///
    /// The backends return a bare host; it is turned into a request URL with
    /// `scheme`. Values that already contain a scheme are kept as they are.
    pub fn from_waiting_params(
        source: Source,
        content: &XmlElement,
        scheme: &str,
    ) -> Result<Self, BackendError> {
        let master = content
            .child("ms")
            .ok_or(BackendError::MissingRelayInfo(source, "no master server node"))?;

        let raw = master.child_text("c").unwrap_or_default();
        if raw.is_empty() {
            return Err(BackendError::MissingRelayInfo(source, "empty relay url"));
        }

        let url = if raw.contains("://") {
            raw.to_string()
        } else {
            format!("{scheme}://{raw}/game/request.php")
        };

        let name = master
            .child_text("b")
            .filter(|name| !name.is_empty())
            .map(String::from);

        Ok(RelayEndpoint { url, name })
    }
}

/// Resolves and caches the relay endpoint of every source.
#[derive(Clone)]
pub struct Discovery {
    http: reqwest::Client,
    backend: Arc<BackendConfig>,
    cache: ResponseCache,
    ttl: Duration,
}

impl Discovery {
    pub fn new(
        http: reqwest::Client,
        backend: Arc<BackendConfig>,
        cache: ResponseCache,
        ttl: Duration,
    ) -> Self {
        Discovery {
            http,
            backend,
            cache,
            ttl,
        }
    }

    /// Runs the handshake against the bootstrap address, bypassing the cache.
    pub async fn discover(&self, source: Source) -> Result<RelayEndpoint, BackendError> {
        let bootstrap_url = self.backend.bootstrap_url(source);
        let result = post_envelope(
            &self.http,
            &bootstrap_url,
            source,
            &XmlRequest::get_waiting_params(),
        )
        .await
        .and_then(|content| {
            RelayEndpoint::from_waiting_params(source, &content, &self.backend.relay_scheme)
        });

        match &result {
            Ok(endpoint) => {
                tracing::info!(
                    "Discovered relay for {source}: {} ({})",
                    endpoint.url,
                    endpoint.name.as_deref().unwrap_or("unnamed")
                );
                counter!(DISCOVERY_SUCCESS, "source" => source.slug()).increment(1);
            }
            Err(e) => {
                tracing::warn!("Discovery failed for {source}: {e}");
                counter!(DISCOVERY_FAILURE, "source" => source.slug(), "kind" => e.kind())
                    .increment(1);
            }
        }

        result
    }

    /// Returns the cached relay endpoint, discovering it first if needed.
    ///
    /// At most one handshake per source is in flight; concurrent callers wait
    /// for it. Failed handshakes are not cached.
    pub async fn relay_endpoint(&self, source: Source) -> Result<RelayEndpoint, BackendError> {
        let value = self
            .cache
            .try_get_with(CacheKey::RelayUrl(source), self.ttl, async {
                self.discover(source).await.map(CachedValue::RelayUrl)
            })
            .await
            .map_err(|e| (*e).clone())?;

        value.into_relay_url().ok_or_else(|| {
            BackendError::Malformed(source, "cached value is not a relay endpoint".into())
        })
    }

    /// Drops the cached endpoint so the next request rediscovers it.
    pub async fn invalidate(&self, source: Source) {
        tracing::debug!("Invalidating relay endpoint for {source}");
        self.cache.invalidate(&CacheKey::RelayUrl(source)).await;
    }

    /// Discovers every source concurrently and waits for all of them.
    ///
    /// Failures are logged and otherwise ignored; queries for a source whose
    /// warm-up failed discover on demand.
    pub async fn warm_up(&self, cancel: &CancellationToken) {
        let mut join_set = JoinSet::new();

        for source in Source::ALL {
            let discovery = self.clone();
            join_set.spawn(async move { (source, discovery.relay_endpoint(source).await) });
        }

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Discovery warm-up canceled");
                    join_set.abort_all();
                    break;
                }
                join_result = join_set.join_next() => {
                    match join_result {
                        Some(Ok((_, Ok(_)))) => {}
                        Some(Ok((source, Err(e)))) => {
                            tracing::warn!("Warm-up could not reach {source}: {e}");
                        }
                        Some(Err(e)) => tracing::error!("Task panicked: {}", e),
                        None => break,
                    }
                }
            }
        }
    }
}

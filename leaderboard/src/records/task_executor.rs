use super::SourceRecords;
use super::decode::decode_records;
use crate::client::BackendClient;
use crate::errors::{BackendError, LeaderboardError};
use crate::model::Source;
use crate::protocol::XmlRequest;
use std::collections::HashMap;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

pub type FetchResult = Result<SourceRecords, BackendError>;

/// Fetches leaderboards from several sources at once.
#[derive(Clone)]
pub struct SourceFetcher {
    client: BackendClient,
    fetch_timeout: Duration,
}

impl SourceFetcher {
    pub fn new(client: BackendClient, fetch_timeout: Duration) -> Self {
        SourceFetcher {
            client,
            fetch_timeout,
        }
    }

    /// Runs one fetch task per source and waits for every one of them.
    ///
    /// A source that fails, times out or is canceled on its own only affects
    /// its own result. Cancelling `cancel` aborts all tasks and fails the call.
    pub async fn fetch_all(
        &self,
        sources: Vec<Source>,
        map_uid: &str,
        zone: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<(Source, FetchResult)>, LeaderboardError> {
        let request = XmlRequest::get_leaderboard_summary(map_uid, zone);
        let mut join_set = JoinSet::new();
        let mut pending = HashMap::new();

        for source in sources {
            let client = self.client.clone();
            let request = request.clone();
            let token = cancel.child_token();
            let fetch_timeout = self.fetch_timeout;

            let handle = join_set.spawn(async move {
                fetch_source(&client, source, &request, &token, fetch_timeout).await
            });
            pending.insert(handle.id(), source);
        }

        let mut results = Vec::with_capacity(pending.len());

        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    tracing::debug!("Records fetch canceled with {} sources pending", pending.len());
                    join_set.abort_all();
                    return Err(LeaderboardError::Canceled);
                }
                join_result = join_set.join_next_with_id() => {
                    match join_result {
                        Some(Ok((id, result))) => {
                            if let Some(source) = pending.remove(&id) {
                                results.push((source, result));
                            }
                        }
                        Some(Err(e)) => {
                            tracing::error!("Task panicked: {}", e);
                            if let Some(source) = pending.remove(&e.id()) {
                                let error = BackendError::Transport(source, "fetch task failed".into());
                                results.push((source, Err(error)));
                            }
                        }
                        // No more tasks
                        None => break,
                    }
                }
            }
        }

        Ok(results)
    }
}

async fn fetch_source(
    client: &BackendClient,
    source: Source,
    request: &XmlRequest,
    cancel: &CancellationToken,
    fetch_timeout: Duration,
) -> FetchResult {
    let content = tokio::time::timeout(fetch_timeout, client.send(source, request, cancel))
        .await
        .map_err(|_| BackendError::Timeout(source))??;

    decode_records(source, &content)
}

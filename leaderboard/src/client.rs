use crate::config::BackendConfig;
use crate::discovery::Discovery;
use crate::errors::{BackendError, LeaderboardError};
use crate::metrics_defs::{BACKEND_REQUEST_DURATION, BACKEND_REQUEST_ERROR, counter, histogram};
use crate::model::Source;
use crate::protocol::{EnvelopeError, XmlElement, XmlRequest, parse_envelope};
use reqwest::header::CONTENT_TYPE;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

/// Builds the pooled HTTP client shared by discovery and protocol requests.
pub fn build_http_client(config: &BackendConfig) -> Result<reqwest::Client, LeaderboardError> {
    reqwest::Client::builder()
        .gzip(true)
        .deflate(true)
        .timeout(config.http_timeout())
        .build()
        .map_err(|e| LeaderboardError::HttpClient(e.to_string()))
}

/// Send one request envelope and return the parsed `<c>` content.
///
/// HTTP failures, non-success statuses and unparseable bodies are reported
/// separately from a well-formed `<e>` error envelope, which becomes
/// [`BackendError::Protocol`].
pub(crate) async fn post_envelope(
    http: &reqwest::Client,
    url: &str,
    source: Source,
    request: &XmlRequest,
) -> Result<XmlElement, BackendError> {
    let started = Instant::now();

    let result = async {
        let response = http
            .post(url)
            .header(CONTENT_TYPE, "application/xml")
            .body(request.to_xml())
            .send()
            .await
            .map_err(|e| classify(source, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(BackendError::Transport(source, format!("HTTP status {status}")));
        }

        let body = response.text().await.map_err(|e| classify(source, e))?;

        parse_envelope(&body).map_err(|e| match e {
            EnvelopeError::Protocol(message) => BackendError::Protocol(source, message),
            EnvelopeError::Malformed(message) => BackendError::Malformed(source, message),
        })
    }
    .await;

    histogram!(
        BACKEND_REQUEST_DURATION,
        "source" => source.slug(),
        "request" => request.name()
    )
    .record(started.elapsed().as_secs_f64());

    if let Err(e) = &result {
        counter!(
            BACKEND_REQUEST_ERROR,
            "source" => source.slug(),
            "request" => request.name(),
            "kind" => e.kind()
        )
        .increment(1);
    }

    result
}

fn classify(source: Source, error: reqwest::Error) -> BackendError {
    if error.is_timeout() {
        BackendError::Timeout(source)
    } else {
        BackendError::Transport(source, error.to_string())
    }
}

/// Sends XML-RPC requests to the relay endpoint of a source.
///
/// The relay address is resolved through [`Discovery`] on every call, which is a
/// cache read unless the endpoint expired or was never discovered.
#[derive(Clone)]
pub struct BackendClient {
    http: reqwest::Client,
    discovery: Discovery,
}

impl BackendClient {
    pub fn new(http: reqwest::Client, discovery: Discovery) -> Self {
        BackendClient { http, discovery }
    }

    pub async fn send(
        &self,
        source: Source,
        request: &XmlRequest,
        cancel: &CancellationToken,
    ) -> Result<XmlElement, BackendError> {
        tokio::select! {
            _ = cancel.cancelled() => Err(BackendError::Canceled(source)),
            result = self.send_to_relay(source, request) => result,
        }
    }

    async fn send_to_relay(
        &self,
        source: Source,
        request: &XmlRequest,
    ) -> Result<XmlElement, BackendError> {
        let relay = self.discovery.relay_endpoint(source).await?;
        let result = post_envelope(&self.http, &relay.url, source, request).await;

        // The relay may have moved; rediscover on the next request.
        if let Err(BackendError::Transport(..)) = &result {
            self.discovery.invalidate(source).await;
        }

        result
    }
}

use crate::Leaderboard;
use crate::config::Listener as ListenerConfig;
use crate::errors::LeaderboardError;
use crate::model::{CompactRecord, SourceSet};
use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

#[derive(thiserror::Error, Debug)]
pub enum ServeError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error(transparent)]
    Leaderboard(#[from] LeaderboardError),
}

#[derive(Clone)]
struct AppState {
    leaderboard: Leaderboard,
    shutdown: CancellationToken,
}

pub fn router(leaderboard: Leaderboard, shutdown: CancellationToken) -> Router {
    Router::new()
        .route("/api/v1/records/{sources}/{map_uid}", get(records_handler))
        .route("/api/v1/records/{sources}/{map_uid}/{zone}", get(records_handler))
        .route("/api/v1/zones", get(zones_handler))
        .with_state(AppState {
            leaderboard,
            shutdown,
        })
}

pub async fn serve(
    listener: &ListenerConfig,
    leaderboard: Leaderboard,
    shutdown: CancellationToken,
) -> Result<(), ServeError> {
    let addr = format!("{}:{}", listener.host, listener.port);
    let listener = TcpListener::bind(addr).await?;
    serve_on(listener, leaderboard, shutdown).await
}

/// Serves on an already bound listener until `shutdown` is cancelled.
pub async fn serve_on(
    listener: TcpListener,
    leaderboard: Leaderboard,
    shutdown: CancellationToken,
) -> Result<(), ServeError> {
    tracing::info!("Listening on {}", listener.local_addr()?);

    let app = router(leaderboard, shutdown.clone());
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await?;
    Ok(())
}

#[derive(Deserialize, Debug)]
struct RecordsPath {
    sources: String,
    map_uid: String,
    zone: Option<String>,
}

#[derive(Deserialize, Debug)]
struct RecordsParams {
    #[serde(default)]
    verbose: bool,
}

#[derive(Serialize)]
struct ApiErrorResponse {
    error_message: String,
}

async fn records_handler(
    State(state): State<AppState>,
    Path(path): Path<RecordsPath>,
    Query(params): Query<RecordsParams>,
) -> Result<Response, LeaderboardError> {
    // Dropping the request future (client went away) cancels the backend calls
    let cancel = state.shutdown.child_token();
    let _guard = cancel.clone().drop_guard();

    let sources = SourceSet::parse(&path.sources)?;
    let response = state
        .leaderboard
        .get_records(&sources, &path.map_uid, path.zone.as_deref(), &cancel)
        .await?;

    if params.verbose {
        return Ok(Json(response).into_response());
    }

    let compact: Vec<CompactRecord> = response.records.into_iter().map(CompactRecord).collect();
    Ok(Json(compact).into_response())
}

async fn zones_handler(State(state): State<AppState>) -> Result<Response, LeaderboardError> {
    let cancel = state.shutdown.child_token();
    let _guard = cancel.clone().drop_guard();

    let zones = state.leaderboard.get_zones(&cancel).await?;
    Ok(Json(&*zones).into_response())
}

impl IntoResponse for LeaderboardError {
    fn into_response(self) -> Response {
        let status = match self {
            LeaderboardError::Validation(_) => StatusCode::BAD_REQUEST,
            LeaderboardError::ZonesUnavailable | LeaderboardError::Canceled => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            LeaderboardError::Backend(_) | LeaderboardError::HttpClient(_) => {
                tracing::error!("Request failed: {self}");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = Json(ApiErrorResponse {
            error_message: self.to_string(),
        });

        (status, body).into_response()
    }
}

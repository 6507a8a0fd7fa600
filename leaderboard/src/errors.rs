use crate::model::Source;
use thiserror::Error;

/// Result type alias for leaderboard operations
pub type Result<T, E = LeaderboardError> = std::result::Result<T, E>;

/// Rejections raised before any backend is contacted.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Unknown source: {0}")]
    UnknownSource(String),

    #[error("No sources requested")]
    EmptySourceSet,

    #[error("Invalid map UID: {0}")]
    InvalidMapUid(String),

    #[error("Unknown zone: {0}")]
    UnknownZone(String),
}

/// Failures talking to a single backend cluster.
///
/// Every variant carries the source it happened on so the aggregate response can
/// attribute it, and none of them is fatal to a multi-source query.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("Request to {0} failed: {1}")]
    Transport(Source, String),

    #[error("Request to {0} timed out")]
    Timeout(Source),

    #[error("Malformed response from {0}: {1}")]
    Malformed(Source, String),

    #[error("XML-RPC error from {0}: {1}")]
    Protocol(Source, String),

    #[error("Missing relay info from {0}: {1}")]
    MissingRelayInfo(Source, &'static str),

    #[error("Request to {0} was canceled")]
    Canceled(Source),
}

impl BackendError {
    pub fn backend(&self) -> Source {
        match self {
            BackendError::Transport(source, _)
            | BackendError::Timeout(source)
            | BackendError::Malformed(source, _)
            | BackendError::Protocol(source, _)
            | BackendError::MissingRelayInfo(source, _)
            | BackendError::Canceled(source) => *source,
        }
    }

    /// Short label used for metric tags.
    pub fn kind(&self) -> &'static str {
        match self {
            BackendError::Transport(..) => "transport",
            BackendError::Timeout(_) => "timeout",
            BackendError::Malformed(..) => "malformed",
            BackendError::Protocol(..) => "protocol",
            BackendError::MissingRelayInfo(..) => "missing_relay_info",
            BackendError::Canceled(_) => "canceled",
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LeaderboardError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("Zone directory unavailable: no source returned any zone")]
    ZonesUnavailable,

    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("Request canceled")]
    Canceled,
}

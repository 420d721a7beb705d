use thiserror::Error;

/// Failure of a single session-store call.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("session id {0} is already taken")]
    SessionExists(String),

    #[error("server returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("invalid endpoint: {0}")]
    Url(#[from] url::ParseError),

    /// Injected or otherwise synthetic failure (test stores, adapters).
    #[error("{0}")]
    Rejected(String),
}

/// Failure on the push channel. Never surfaced to the user; the channel
/// logs it and schedules a reconnect.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("websocket: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("invalid push endpoint: {0}")]
    Url(#[from] url::ParseError),

    #[error("cannot derive a push endpoint from {0}")]
    Scheme(String),

    #[error("malformed frame: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("store: {0}")]
    Store(#[from] StoreError),
}

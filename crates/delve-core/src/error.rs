use thiserror::Error;

/// Unified error type for the entire Delve runtime.
#[derive(Error, Debug)]
pub enum DelveError {
    // ── Remote API errors ──────────────────────────────────────
    #[error("api transport error: {0}")]
    Transport(String),

    #[error("api decode error: {0}")]
    Decode(String),

    #[error("api request failed: HTTP {status}: {message}")]
    Request { status: u16, message: String },

    #[error("api resource not found: {0}")]
    NotFound(String),

    // ── Model errors ───────────────────────────────────────────
    #[error("invalid command token: {0}")]
    CommandToken(String),

    #[error("unknown command kind: {0}")]
    CommandKind(String),

    // ── Session errors ─────────────────────────────────────────
    #[error("session error: {0}")]
    Session(String),

    #[error("session cancelled")]
    Cancelled,

    #[error("session timed out after {0}s")]
    Timeout(u64),

    #[error("request dispatcher has been stopped")]
    DispatcherStopped,

    // ── Config errors ──────────────────────────────────────────
    #[error("config error: {0}")]
    Config(String),

    // ── Generic wrappers ───────────────────────────────────────
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DelveError {
    /// Whether this error came from the network layer rather than from a
    /// malformed or rejected payload.
    pub fn is_transport(&self) -> bool {
        matches!(self, DelveError::Transport(_))
    }
}

pub type Result<T> = std::result::Result<T, DelveError>;

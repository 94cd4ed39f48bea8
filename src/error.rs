use thiserror::Error;

/// Failure kinds surfaced by providers, the state store and the orchestrator.
///
/// A track that cannot be resolved is not an error: resolvers return
/// `Ok(None)` and the orchestrator drops the entry.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Network failure, rate limiting or a 5xx; worth retrying.
    #[error("transient remote failure: {message}")]
    RemoteTransient {
        message: String,
        retry_after: Option<u64>,
    },

    /// Authentication or permission failure; the whole run stops.
    #[error("fatal remote failure: {0}")]
    RemoteFatal(String),

    /// The remote refused one request (bad id, malformed body, ...).
    #[error("remote rejected request ({status}): {body}")]
    RemoteRejected { status: u16, body: String },

    #[error("sync state store unreadable: {0}")]
    StoreCorrupt(String),

    #[error("cancelled")]
    Cancelled,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl SyncError {
    pub fn is_transient(&self) -> bool {
        matches!(self, SyncError::RemoteTransient { .. })
    }

    /// Errors that must stop the run instead of just the current playlist.
    pub fn aborts_run(&self) -> bool {
        matches!(self, SyncError::RemoteFatal(_) | SyncError::Cancelled)
    }

    pub fn retry_after(&self) -> Option<u64> {
        match self {
            SyncError::RemoteTransient { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            return SyncError::Other(anyhow::anyhow!("decoding response: {}", e));
        }
        SyncError::RemoteTransient {
            message: e.to_string(),
            retry_after: None,
        }
    }
}

impl From<rusqlite::Error> for SyncError {
    fn from(e: rusqlite::Error) -> Self {
        SyncError::StoreCorrupt(e.to_string())
    }
}

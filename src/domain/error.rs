use thiserror::Error;

/// Why a single work item (or the ledger write) failed.
///
/// Payloads are plain strings so results can be cloned into progress events.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AppError {
    #[error("resolution failed: {0}")]
    Resolution(String),

    #[error("link not found")]
    LinkNotFound,

    #[error("transfer failed: {0}")]
    Transfer(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error("could not write failure ledger: {0}")]
    LedgerWrite(String),

    #[error("cancelled before dispatch")]
    Cancelled,
}

/// Errors that stop a run before any item is dispatched.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("no valid links in intake")]
    EmptyIntake,

    #[error("destination {path} is unavailable: {source}")]
    Destination {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("run task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

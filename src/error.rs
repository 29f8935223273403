use thiserror::Error;

/// Failure of a capability provided by the embedding host.
#[derive(Debug, Error)]
pub enum HostError {
    #[error("clipboard write failed: {0}")]
    Clipboard(String),
    #[error("cannot present the selection menu: {0}")]
    Menu(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StreamError {
    #[error("parse worker has shut down")]
    WorkerGone,
    #[error("failed to spawn parse worker: {0}")]
    Spawn(String),
}

use std::path::PathBuf;

use thiserror::Error;

use retro_core::ItemId;

/// Error surface for orchestration, downloads and the interactive session.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("store error: {0}")]
    Store(#[from] retro_core::StoreError),

    #[error("client error: {0}")]
    Client(#[from] retro_client::ClientError),

    #[error("no API key available after selection")]
    CredentialMissing,

    #[error("item {id} has no restored image")]
    NotCompleted { id: ItemId },

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("background task failed: {0}")]
    Join(String),
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> RuntimeError {
    RuntimeError::Io {
        path: path.into(),
        source,
    }
}

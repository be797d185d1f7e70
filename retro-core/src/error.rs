//! Error types for retro-core.

use std::path::PathBuf;

use thiserror::Error;

use crate::handles::HandleId;
use crate::types::{ItemId, RestorationStatus};

/// All errors that can arise from item store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No item with this identifier is in the store.
    #[error("item {id} not found")]
    NotFound { id: ItemId },

    /// The requested status change is not allowed from the item's current status.
    #[error("item {id}: cannot move from {from} to {to}")]
    InvalidTransition {
        id: ItemId,
        from: RestorationStatus,
        to: RestorationStatus,
    },

    /// The handle was never acquired or has already been released.
    #[error("handle {handle} is not live")]
    HandleReleased { handle: HandleId },

    /// Reading a source image failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file's media type is not `image/*`.
    #[error("not an image: {path}")]
    NotAnImage { path: PathBuf },
}

/// All errors that can arise from loading or saving the config file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// YAML parse error on load, with the offending file path.
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// `dirs::home_dir()` returned `None`.
    #[error("cannot determine home directory; set $HOME or equivalent")]
    HomeNotFound,
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.into(),
        source,
    }
}

//! Error types for retro-client.

use std::path::PathBuf;

use thiserror::Error;

use retro_core::ConfigError;

/// Failures of a single restoration call or of credential handling.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The remote call failed outright (network, auth, quota). Message is verbatim.
    #[error("{0}")]
    Upstream(String),

    /// The call succeeded but returned no content parts.
    #[error("No content returned from the restoration model.")]
    EmptyResponse,

    /// Content parts came back but none carried image data.
    #[error("No image data found in the response.")]
    NoImageInResponse,

    /// No API credential is selected.
    #[error("no API key selected; run `retrorestore key set` or set GEMINI_API_KEY")]
    CredentialMissing,

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("config error: {0}")]
    Config(#[from] ConfigError),
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> ClientError {
    ClientError::Io {
        path: path.into(),
        source,
    }
}

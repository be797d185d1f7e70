//! # retro-client
//!
//! One outbound restoration call per [`RestorationClient::restore`], plus the
//! credential sources the API key is resolved from.

use async_trait::async_trait;

use retro_core::ImagePayload;

pub mod credentials;
pub mod error;
pub mod gemini;
pub mod prompt;

pub use credentials::{ApiKey, ChainCredentials, CredentialSource, EnvCredentials, FileCredentials, StaticCredentials};
pub use error::ClientError;
pub use gemini::{GeminiClient, GeminiConfig};
pub use prompt::RESTORATION_PROMPT;

/// A remote image-restoration capability.
///
/// Implementations make exactly one attempt per call; retrying is the
/// caller's decision.
#[async_trait]
pub trait RestorationClient: Send + Sync {
    async fn restore(&self, image: &ImagePayload) -> Result<ImagePayload, ClientError>;
}

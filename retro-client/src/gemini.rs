//! Gemini image-generation client.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use serde::{Deserialize, Serialize};

use retro_core::{config, ImagePayload, MediaType, RestoreConfig};

use crate::credentials::CredentialSource;
use crate::error::ClientError;
use crate::prompt::RESTORATION_PROMPT;
use crate::RestorationClient;

/// Gemini client configuration.
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    /// Model name, e.g. `gemini-3-pro-image-preview`.
    pub model: String,
    /// Base endpoint URL, without the `/models/...` suffix.
    pub endpoint: String,
    /// Resolution hint sent as `imageConfig.imageSize`.
    pub image_size: String,
    pub timeout_secs: u64,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            model: config::DEFAULT_MODEL.to_string(),
            endpoint: config::DEFAULT_ENDPOINT.to_string(),
            image_size: config::DEFAULT_IMAGE_SIZE.to_string(),
            timeout_secs: config::DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl From<&RestoreConfig> for GeminiConfig {
    fn from(cfg: &RestoreConfig) -> Self {
        Self {
            model: cfg.model.clone(),
            endpoint: cfg.endpoint.clone(),
            image_size: cfg.image_size.clone(),
            timeout_secs: cfg.timeout_secs,
        }
    }
}

/// Restoration client backed by the Gemini `generateContent` endpoint.
///
/// The API key is resolved from the credential source on every call, so a
/// key selected after construction is picked up.
pub struct GeminiClient {
    client: reqwest::Client,
    config: GeminiConfig,
    credentials: Arc<dyn CredentialSource>,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig, credentials: Arc<dyn CredentialSource>) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ClientError::Upstream(e.to_string()))?;
        Ok(Self {
            client,
            config,
            credentials,
        })
    }

    fn build_url(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.config.endpoint.trim_end_matches('/'),
            self.config.model
        )
    }
}

// ---------------------------------------------------------------------------
// Wire format
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GenerateRequest {
    contents: Vec<RequestContent>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct RequestContent {
    role: &'static str,
    parts: Vec<RequestPart>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
enum RequestPart {
    InlineData(InlineData),
    Text(String),
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    #[serde(default)]
    mime_type: Option<String>,
    #[serde(default)]
    data: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    image_config: ImageConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ImageConfig {
    image_size: String,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct GenerateResponse {
    #[serde(default)]
    candidates: Option<Vec<Candidate>>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Option<Vec<ResponsePart>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResponsePart {
    #[serde(default)]
    inline_data: Option<InlineData>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}

pub(crate) fn build_request(image: &ImagePayload, image_size: &str) -> GenerateRequest {
    GenerateRequest {
        contents: vec![RequestContent {
            role: "user",
            parts: vec![
                RequestPart::InlineData(InlineData {
                    mime_type: Some(image.media_type().to_string()),
                    data: Some(general_purpose::STANDARD.encode(image.bytes())),
                }),
                RequestPart::Text(RESTORATION_PROMPT.to_string()),
            ],
        }],
        generation_config: GenerationConfig {
            image_config: ImageConfig {
                image_size: image_size.to_string(),
            },
        },
    }
}

/// Pull the restored image out of a response.
///
/// Only the first candidate is considered; within it the first part carrying
/// non-empty inline data wins.
pub(crate) fn extract_image(response: GenerateResponse) -> Result<ImagePayload, ClientError> {
    let parts = response
        .candidates
        .and_then(|candidates| candidates.into_iter().next())
        .and_then(|candidate| candidate.content)
        .and_then(|content| content.parts)
        .filter(|parts| !parts.is_empty())
        .ok_or(ClientError::EmptyResponse)?;

    let inline = parts
        .into_iter()
        .filter_map(|part| part.inline_data)
        .find(|inline| inline.data.as_deref().is_some_and(|d| !d.is_empty()))
        .ok_or(ClientError::NoImageInResponse)?;

    let data = inline.data.unwrap_or_default();
    let bytes = general_purpose::STANDARD
        .decode(data.as_bytes())
        .map_err(|e| ClientError::Upstream(format!("invalid image data in response: {e}")))?;
    let media_type = inline
        .mime_type
        .filter(|m| !m.is_empty())
        .map(MediaType::from)
        .unwrap_or_else(MediaType::png);
    Ok(ImagePayload::new(bytes, media_type))
}

/// Best human-readable message for a non-2xx response body.
fn upstream_message(status: reqwest::StatusCode, body: &str) -> String {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => envelope.error.message,
        Err(_) if body.trim().is_empty() => format!("HTTP {status}"),
        Err(_) => format!("HTTP {status}: {}", body.trim()),
    }
}

#[async_trait]
impl RestorationClient for GeminiClient {
    async fn restore(&self, image: &ImagePayload) -> Result<ImagePayload, ClientError> {
        let key = self
            .credentials
            .selected()
            .await
            .ok_or(ClientError::CredentialMissing)?;
        let body = build_request(image, &self.config.image_size);

        tracing::debug!(
            model = %self.config.model,
            bytes = image.len(),
            media_type = %image.media_type(),
            "sending restoration request",
        );

        let response = self
            .client
            .post(self.build_url())
            .header("x-goog-api-key", key.expose())
            .json(&body)
            .send()
            .await
            .map_err(|e| ClientError::Upstream(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ClientError::Upstream(e.to_string()))?;

        if !status.is_success() {
            let message = upstream_message(status, &text);
            tracing::warn!(status = %status, error = %message, "restoration request failed");
            return Err(ClientError::Upstream(message));
        }

        let parsed: GenerateResponse = serde_json::from_str(&text)
            .map_err(|e| ClientError::Upstream(format!("malformed response: {e}")))?;
        extract_image(parsed)
    }
}

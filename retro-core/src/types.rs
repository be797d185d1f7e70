//! Domain types for restoration items.
//!
//! A [`RestorationItem`] keeps its fields private: status, result handle and
//! error message only change through [`crate::store::ItemStore`], which is
//! what keeps "result iff COMPLETED, error iff ERROR" true.

use std::fmt;
use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{io_err, StoreError};
use crate::handles::HandleId;

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// Opaque, stable identifier of a restoration item.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ItemId(pub String);

impl ItemId {
    /// Mint a fresh random identifier.
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// First eight characters, for tables and prompts.
    pub fn short(&self) -> &str {
        let end = self.0.len().min(8);
        &self.0[..end]
    }
}

impl Default for ItemId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for ItemId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ItemId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// A declared media type such as `image/jpeg`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MediaType(pub String);

impl MediaType {
    pub fn png() -> Self {
        Self::from("image/png")
    }

    /// Infer the media type from a file extension. `None` for unknown extensions.
    pub fn from_path(path: &Path) -> Option<Self> {
        image::ImageFormat::from_path(path)
            .ok()
            .map(|format| Self::from(format.to_mime_type()))
    }

    pub fn is_image(&self) -> bool {
        self.0.starts_with("image/")
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for MediaType {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for MediaType {
    fn from(s: String) -> Self {
        Self(s)
    }
}

// ---------------------------------------------------------------------------
// Image payloads
// ---------------------------------------------------------------------------

/// Immutable image bytes plus their declared media type.
///
/// Cloning shares the underlying buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePayload {
    bytes: Arc<[u8]>,
    media_type: MediaType,
}

impl ImagePayload {
    pub fn new(bytes: impl Into<Arc<[u8]>>, media_type: MediaType) -> Self {
        Self {
            bytes: bytes.into(),
            media_type,
        }
    }

    /// Read a file into a payload, inferring the media type from its extension.
    pub async fn read(path: &Path) -> Result<Self, StoreError> {
        let media_type = MediaType::from_path(path)
            .filter(MediaType::is_image)
            .ok_or_else(|| StoreError::NotAnImage {
                path: path.to_path_buf(),
            })?;
        let bytes = tokio::fs::read(path).await.map_err(|e| io_err(path, e))?;
        Ok(Self::new(bytes, media_type))
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn media_type(&self) -> &MediaType {
        &self.media_type
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Pixel dimensions read from an image header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    /// Probe dimensions without decoding pixel data. `None` if the header is unreadable.
    pub fn detect(bytes: &[u8]) -> Option<Self> {
        let (width, height) = image::ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .ok()?
            .into_dimensions()
            .ok()?;
        Some(Self { width, height })
    }
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// An uploaded file: its original name and payload.
#[derive(Debug, Clone)]
pub struct SourceImage {
    pub name: String,
    pub payload: ImagePayload,
    pub dimensions: Option<Dimensions>,
}

impl SourceImage {
    pub fn new(name: impl Into<String>, payload: ImagePayload) -> Self {
        let dimensions = Dimensions::detect(payload.bytes());
        Self {
            name: name.into(),
            payload,
            dimensions,
        }
    }

    /// Read `path` and name the source after its file name.
    pub async fn from_path(path: &Path) -> Result<Self, StoreError> {
        let payload = ImagePayload::read(path).await?;
        let name = path
            .file_name()
            .unwrap_or_else(|| path.as_os_str())
            .to_string_lossy()
            .into_owned();
        Ok(Self::new(name, payload))
    }
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Lifecycle status of an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum RestorationStatus {
    #[default]
    Idle,
    Processing,
    Completed,
    Error,
}

impl RestorationStatus {
    /// Whether a restore may be dispatched from this status.
    pub fn is_dispatchable(self) -> bool {
        matches!(self, RestorationStatus::Idle | RestorationStatus::Error)
    }
}

impl fmt::Display for RestorationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RestorationStatus::Idle => write!(f, "IDLE"),
            RestorationStatus::Processing => write!(f, "PROCESSING"),
            RestorationStatus::Completed => write!(f, "COMPLETED"),
            RestorationStatus::Error => write!(f, "ERROR"),
        }
    }
}

// ---------------------------------------------------------------------------
// Items
// ---------------------------------------------------------------------------

/// One uploaded image and its restoration lifecycle record.
#[derive(Debug, Clone)]
pub struct RestorationItem {
    pub(crate) id: ItemId,
    pub(crate) source: SourceImage,
    pub(crate) preview: HandleId,
    pub(crate) result: Option<HandleId>,
    pub(crate) status: RestorationStatus,
    pub(crate) error: Option<String>,
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) updated_at: DateTime<Utc>,
}

impl RestorationItem {
    pub fn id(&self) -> &ItemId {
        &self.id
    }

    pub fn source(&self) -> &SourceImage {
        &self.source
    }

    pub fn name(&self) -> &str {
        &self.source.name
    }

    pub fn preview(&self) -> HandleId {
        self.preview
    }

    pub fn result(&self) -> Option<HandleId> {
        self.result
    }

    pub fn status(&self) -> RestorationStatus {
        self.status
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn snapshot(&self) -> ItemSnapshot {
        ItemSnapshot {
            id: self.id.clone(),
            name: self.source.name.clone(),
            status: self.status,
            error: self.error.clone(),
            dimensions: self.source.dimensions,
            has_result: self.result.is_some(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Read-only, serializable view of an item for rendering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemSnapshot {
    pub id: ItemId,
    pub name: String,
    pub status: RestorationStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<Dimensions>,
    pub has_result: bool,
    pub created_at: DateTime<Utc>,
    /// Time of the last status change.
    pub updated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn item_ids_are_unique() {
        let a = ItemId::new();
        let b = ItemId::new();
        assert_ne!(a, b);
        assert_eq!(a.short().len(), 8);
    }

    #[test]
    fn media_type_from_extension() {
        assert_eq!(
            MediaType::from_path(Path::new("scan.JPG")),
            Some(MediaType::from("image/jpeg"))
        );
        assert_eq!(
            MediaType::from_path(Path::new("photo.png")),
            Some(MediaType::png())
        );
        assert_eq!(MediaType::from_path(Path::new("notes.txt")), None);
    }

    #[test]
    fn status_display_and_dispatchable() {
        assert_eq!(RestorationStatus::Processing.to_string(), "PROCESSING");
        assert!(RestorationStatus::Idle.is_dispatchable());
        assert!(RestorationStatus::Error.is_dispatchable());
        assert!(!RestorationStatus::Processing.is_dispatchable());
        assert!(!RestorationStatus::Completed.is_dispatchable());
    }

    #[test]
    fn dimensions_detect_rejects_garbage() {
        assert_eq!(Dimensions::detect(b"definitely not an image"), None);
    }

    #[tokio::test]
    async fn read_rejects_non_image_extension() {
        let dir = tempfile::TempDir::new().expect("tempdir");
        let path = dir.path().join("readme.txt");
        std::fs::write(&path, b"hello").expect("write");
        let err = ImagePayload::read(&path).await.unwrap_err();
        assert!(matches!(err, StoreError::NotAnImage { .. }), "got: {err}");
    }

    #[tokio::test]
    async fn read_missing_file_reports_path() {
        let dir = tempfile::TempDir::new().expect("tempdir");
        let path = dir.path().join("gone.png");
        let err = ImagePayload::read(&path).await.unwrap_err();
        assert!(matches!(err, StoreError::Io { .. }));
        assert!(err.to_string().contains("gone.png"));
    }
}

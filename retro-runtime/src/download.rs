//! Download surface: writes restored images out as `<stem>_restored.png`.
//!
//! Downloads are planned under the store lock (cheap `Arc` clones of the
//! result payloads) and written after it is released. Writes use the same
//! atomic `.tmp` + rename flow as the config file.

use std::collections::HashSet;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use retro_core::{ImagePayload, ItemId, ItemStore, MediaType, RestorationStatus};

use crate::error::{io_err, RuntimeError};
use crate::orchestrator::Orchestrator;

/// `old.photo.jpg` → `old.photo_restored.png`, `scan` → `scan_restored.png`.
pub fn restored_file_name(source_name: &str) -> String {
    let stem = Path::new(source_name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "image".to_string());
    format!("{stem}_restored.png")
}

/// A restored image ready to be written.
#[derive(Debug, Clone)]
pub struct Download {
    pub id: ItemId,
    pub file_name: String,
    pub payload: ImagePayload,
}

impl Download {
    /// Plan the download of one item. Only COMPLETED items have one.
    pub fn plan(store: &ItemStore, id: &ItemId) -> Result<Self, RuntimeError> {
        let item = store.get(id).ok_or_else(|| retro_core::StoreError::NotFound {
            id: id.clone(),
        })?;
        let payload = match (item.status(), store.result_payload(id)) {
            (RestorationStatus::Completed, Some(payload)) => payload.clone(),
            _ => return Err(RuntimeError::NotCompleted { id: id.clone() }),
        };
        Ok(Self {
            id: id.clone(),
            file_name: restored_file_name(item.name()),
            payload,
        })
    }

    /// One download per COMPLETED item, in list order.
    ///
    /// Names that collide within the batch get the item's short id appended.
    pub fn plan_all(store: &ItemStore) -> Vec<Self> {
        let mut seen = HashSet::new();
        let mut downloads = Vec::new();
        for item in store.iter() {
            let Ok(mut download) = Self::plan(store, item.id()) else {
                continue;
            };
            if !seen.insert(download.file_name.clone()) {
                let stem = download.file_name.trim_end_matches(".png").to_string();
                download.file_name = format!("{stem}-{}.png", item.id().short());
                seen.insert(download.file_name.clone());
            }
            downloads.push(download);
        }
        downloads
    }

    /// Write the PNG into `out_dir` (created if missing) and return its path.
    pub async fn write(self, out_dir: &Path) -> Result<PathBuf, RuntimeError> {
        let out_dir = out_dir.to_path_buf();
        tokio::task::spawn_blocking(move || self.write_blocking(&out_dir))
            .await
            .map_err(|e| RuntimeError::Join(e.to_string()))?
    }

    fn write_blocking(&self, out_dir: &Path) -> Result<PathBuf, RuntimeError> {
        std::fs::create_dir_all(out_dir).map_err(|e| io_err(out_dir, e))?;
        let path = out_dir.join(&self.file_name);
        let tmp = path.with_extension("png.tmp");
        let bytes = png_bytes(&self.payload);
        std::fs::write(&tmp, &bytes).map_err(|e| io_err(&tmp, e))?;
        std::fs::rename(&tmp, &path).map_err(|e| io_err(&path, e))?;
        tracing::info!(item = %self.id, path = %path.display(), "saved restored image");
        Ok(path)
    }
}

/// The payload as PNG bytes. Undecodable payloads are passed through.
fn png_bytes(payload: &ImagePayload) -> Vec<u8> {
    if payload.media_type() == &MediaType::png() {
        return payload.bytes().to_vec();
    }
    let encoded = image::load_from_memory(payload.bytes()).and_then(|img| {
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, image::ImageFormat::Png)?;
        Ok(out.into_inner())
    });
    match encoded {
        Ok(bytes) => bytes,
        Err(err) => {
            tracing::warn!(
                media_type = payload.media_type().as_str(),
                error = %err,
                "could not re-encode as PNG; writing bytes as received",
            );
            payload.bytes().to_vec()
        }
    }
}

// ---------------------------------------------------------------------------
// Orchestrator entry points
// ---------------------------------------------------------------------------

/// Save one completed item.
pub async fn save_item(
    orch: &Orchestrator,
    id: &ItemId,
    out_dir: &Path,
) -> Result<PathBuf, RuntimeError> {
    let download = {
        let store = orch.store();
        let store = store.lock().await;
        Download::plan(&store, id)?
    };
    download.write(out_dir).await
}

/// Save every completed item. Items in any other status produce no file.
pub async fn save_all(orch: &Orchestrator, out_dir: &Path) -> Result<Vec<PathBuf>, RuntimeError> {
    let downloads = {
        let store = orch.store();
        let store = store.lock().await;
        Download::plan_all(&store)
    };
    let mut written = Vec::with_capacity(downloads.len());
    for download in downloads {
        written.push(download.write(out_dir).await?);
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use retro_core::SourceImage;

    #[test]
    fn restored_names() {
        assert_eq!(restored_file_name("old.photo.jpg"), "old.photo_restored.png");
        assert_eq!(restored_file_name("scan"), "scan_restored.png");
        assert_eq!(restored_file_name("grandma.PNG"), "grandma_restored.png");
    }

    fn completed_store(names: &[&str]) -> (ItemStore, Vec<ItemId>) {
        let mut store = ItemStore::new();
        let ids = store.add(names.iter().map(|n| {
            SourceImage::new(*n, ImagePayload::new(n.as_bytes().to_vec(), MediaType::png()))
        }));
        for id in &ids {
            store.set_processing(id).expect("processing");
            store
                .set_completed(id, ImagePayload::new(b"png".to_vec(), MediaType::png()))
                .expect("completed");
        }
        (store, ids)
    }

    #[test]
    fn plan_refuses_unfinished_items() {
        let mut store = ItemStore::new();
        let ids = store.add([SourceImage::new(
            "a.jpg",
            ImagePayload::new(b"a".to_vec(), MediaType::png()),
        )]);
        let err = Download::plan(&store, &ids[0]).unwrap_err();
        assert!(matches!(err, RuntimeError::NotCompleted { .. }));
    }

    #[test]
    fn colliding_names_are_disambiguated() {
        let (store, ids) = completed_store(&["a.jpg", "a.png"]);
        let names: Vec<_> = Download::plan_all(&store)
            .into_iter()
            .map(|d| d.file_name)
            .collect();
        assert_eq!(names[0], "a_restored.png");
        assert_eq!(names[1], format!("a_restored-{}.png", ids[1].short()));
    }

    #[test]
    fn undecodable_non_png_is_written_verbatim() {
        let payload = ImagePayload::new(b"not really".to_vec(), MediaType::from("image/jpeg"));
        assert_eq!(png_bytes(&payload), b"not really");
    }

    #[tokio::test]
    async fn write_is_atomic() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (store, _) = completed_store(&["a.jpg"]);
        let download = Download::plan_all(&store).remove(0);
        let path = download.write(dir.path()).await.expect("write");
        assert_eq!(path, dir.path().join("a_restored.png"));
        assert_eq!(std::fs::read(&path).expect("read"), b"png");
        assert!(!dir.path().join("a_restored.png.tmp").exists());
    }
}

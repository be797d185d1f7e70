//! Ordered item store and status transitions.
//!
//! # Transitions
//!
//! ```text
//! IDLE ──► PROCESSING ──► COMPLETED
//!  ▲            │
//!  │            └──────► ERROR ──► PROCESSING (re-dispatch)
//! ```
//!
//! Every mutation looks up one item by id and replaces only that item, so
//! out-of-order completions for different items never disturb each other.

use chrono::Utc;

use crate::error::StoreError;
use crate::handles::{HandleId, HandleTable};
use crate::types::{ImagePayload, ItemId, ItemSnapshot, RestorationItem, RestorationStatus, SourceImage};

/// Per-status counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct StoreStats {
    pub total: usize,
    pub idle: usize,
    pub processing: usize,
    pub completed: usize,
    pub error: usize,
}

/// The ordered collection of restoration items and the handles they own.
#[derive(Debug, Default)]
pub struct ItemStore {
    items: Vec<RestorationItem>,
    handles: HandleTable,
}

impl ItemStore {
    pub fn new() -> Self {
        Self::default()
    }

    // -----------------------------------------------------------------------
    // 1. Add / remove
    // -----------------------------------------------------------------------

    /// Append new items in arrival order. Each starts IDLE with a fresh preview handle.
    pub fn add(&mut self, sources: impl IntoIterator<Item = SourceImage>) -> Vec<ItemId> {
        let mut ids = Vec::new();
        for source in sources {
            let now = Utc::now();
            let id = ItemId::new();
            let preview = self.handles.acquire(source.payload.clone());
            self.items.push(RestorationItem {
                id: id.clone(),
                source,
                preview,
                result: None,
                status: RestorationStatus::Idle,
                error: None,
                created_at: now,
                updated_at: now,
            });
            ids.push(id);
        }
        ids
    }

    /// Release the item's handles and delete it.
    ///
    /// Both handles are released even if one release fails; the first
    /// failure is returned after the item is gone.
    pub fn remove(&mut self, id: &ItemId) -> Result<RestorationItem, StoreError> {
        let index = self.index_of(id)?;
        let item = self.items.remove(index);
        let preview = self.handles.release(item.preview);
        let result = match item.result {
            Some(handle) => self.handles.release(handle),
            None => Ok(()),
        };
        preview.and(result)?;
        Ok(item)
    }

    // -----------------------------------------------------------------------
    // 2. Status transitions
    // -----------------------------------------------------------------------

    /// IDLE | ERROR → PROCESSING. Clears any previous error message.
    pub fn set_processing(&mut self, id: &ItemId) -> Result<(), StoreError> {
        let item = self.find_mut(id)?;
        if !item.status.is_dispatchable() {
            return Err(invalid(item, RestorationStatus::Processing));
        }
        item.status = RestorationStatus::Processing;
        item.error = None;
        item.updated_at = Utc::now();
        Ok(())
    }

    /// PROCESSING → COMPLETED, attaching a result handle for `result`.
    pub fn set_completed(&mut self, id: &ItemId, result: ImagePayload) -> Result<HandleId, StoreError> {
        let index = self.index_of(id)?;
        if self.items[index].status != RestorationStatus::Processing {
            return Err(invalid(&self.items[index], RestorationStatus::Completed));
        }
        let handle = self.handles.acquire(result);
        let item = &mut self.items[index];
        item.status = RestorationStatus::Completed;
        item.result = Some(handle);
        item.updated_at = Utc::now();
        Ok(handle)
    }

    /// PROCESSING → ERROR with a human-readable message.
    pub fn set_error(&mut self, id: &ItemId, message: impl Into<String>) -> Result<(), StoreError> {
        let item = self.find_mut(id)?;
        if item.status != RestorationStatus::Processing {
            return Err(invalid(item, RestorationStatus::Error));
        }
        item.status = RestorationStatus::Error;
        item.error = Some(message.into());
        item.updated_at = Utc::now();
        Ok(())
    }

    // -----------------------------------------------------------------------
    // 3. Queries
    // -----------------------------------------------------------------------

    pub fn get(&self, id: &ItemId) -> Option<&RestorationItem> {
        self.items.iter().find(|item| &item.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &RestorationItem> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Ids of IDLE and ERROR items, in store order.
    pub fn pending_ids(&self) -> Vec<ItemId> {
        self.items
            .iter()
            .filter(|item| item.status.is_dispatchable())
            .map(|item| item.id.clone())
            .collect()
    }

    /// Resolve a full id or a unique id prefix.
    pub fn resolve(&self, prefix: &str) -> Option<ItemId> {
        let mut matches = self.items.iter().filter(|item| item.id.0.starts_with(prefix));
        let first = matches.next()?;
        if matches.next().is_some() {
            return None;
        }
        Some(first.id.clone())
    }

    pub fn stats(&self) -> StoreStats {
        let mut stats = StoreStats {
            total: self.items.len(),
            ..StoreStats::default()
        };
        for item in &self.items {
            match item.status {
                RestorationStatus::Idle => stats.idle += 1,
                RestorationStatus::Processing => stats.processing += 1,
                RestorationStatus::Completed => stats.completed += 1,
                RestorationStatus::Error => stats.error += 1,
            }
        }
        stats
    }

    pub fn snapshot(&self) -> Vec<ItemSnapshot> {
        self.items.iter().map(RestorationItem::snapshot).collect()
    }

    pub fn source_payload(&self, id: &ItemId) -> Option<ImagePayload> {
        self.get(id).map(|item| item.source.payload.clone())
    }

    pub fn preview_payload(&self, id: &ItemId) -> Option<&ImagePayload> {
        self.get(id).and_then(|item| self.handles.get(item.preview))
    }

    pub fn result_payload(&self, id: &ItemId) -> Option<&ImagePayload> {
        self.get(id)
            .and_then(|item| item.result)
            .and_then(|handle| self.handles.get(handle))
    }

    pub fn live_handles(&self) -> usize {
        self.handles.live()
    }

    /// Drop every item and release all outstanding handles.
    pub fn shutdown(&mut self) -> usize {
        self.items.clear();
        self.handles.release_all()
    }

    // -----------------------------------------------------------------------
    // Private helpers
    // -----------------------------------------------------------------------

    fn index_of(&self, id: &ItemId) -> Result<usize, StoreError> {
        self.items
            .iter()
            .position(|item| &item.id == id)
            .ok_or_else(|| StoreError::NotFound { id: id.clone() })
    }

    fn find_mut(&mut self, id: &ItemId) -> Result<&mut RestorationItem, StoreError> {
        let index = self.index_of(id)?;
        Ok(&mut self.items[index])
    }
}

fn invalid(item: &RestorationItem, to: RestorationStatus) -> StoreError {
    StoreError::InvalidTransition {
        id: item.id.clone(),
        from: item.status,
        to,
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

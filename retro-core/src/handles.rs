//! Preview and result handles.
//!
//! A [`HandleId`] stands for displayable image data owned by the store. Every
//! acquired handle must be released exactly once; [`HandleTable::release`]
//! refuses a second release instead of ignoring it.

use std::collections::HashMap;
use std::fmt;

use serde::Serialize;

use crate::error::StoreError;
use crate::types::ImagePayload;

/// Identifier of a live handle in a [`HandleTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct HandleId(u64);

impl fmt::Display for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "h{}", self.0)
    }
}

/// Arena of live handles.
#[derive(Debug, Default)]
pub struct HandleTable {
    next: u64,
    live: HashMap<HandleId, ImagePayload>,
}

impl HandleTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn acquire(&mut self, payload: ImagePayload) -> HandleId {
        self.next += 1;
        let id = HandleId(self.next);
        self.live.insert(id, payload);
        id
    }

    pub fn get(&self, id: HandleId) -> Option<&ImagePayload> {
        self.live.get(&id)
    }

    pub fn release(&mut self, id: HandleId) -> Result<(), StoreError> {
        self.live
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::HandleReleased { handle: id })
    }

    /// Number of handles acquired and not yet released.
    pub fn live(&self) -> usize {
        self.live.len()
    }

    /// Release every outstanding handle; returns how many were released.
    pub fn release_all(&mut self) -> usize {
        let count = self.live.len();
        self.live.clear();
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MediaType;

    fn payload() -> ImagePayload {
        ImagePayload::new(vec![1u8, 2, 3], MediaType::png())
    }

    #[test]
    fn acquire_hands_out_distinct_ids() {
        let mut table = HandleTable::new();
        let a = table.acquire(payload());
        let b = table.acquire(payload());
        assert_ne!(a, b);
        assert_eq!(table.live(), 2);
        assert_eq!(table.get(a), Some(&payload()));
    }

    #[test]
    fn double_release_is_an_error() {
        let mut table = HandleTable::new();
        let id = table.acquire(payload());
        table.release(id).expect("first release");
        let err = table.release(id).unwrap_err();
        assert!(matches!(err, StoreError::HandleReleased { handle } if handle == id));
        assert_eq!(table.live(), 0);
    }

    #[test]
    fn release_all_counts_outstanding() {
        let mut table = HandleTable::new();
        table.acquire(payload());
        table.acquire(payload());
        assert_eq!(table.release_all(), 2);
        assert_eq!(table.live(), 0);
    }
}

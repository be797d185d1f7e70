//! RetroRestore core library: item data model, item store, handles, config.
//!
//! Public API surface:
//! - [`types`]: newtypes, image payloads and the restoration item record
//! - [`handles`]: preview/result handle table
//! - [`store`]: the ordered [`ItemStore`] and its status transitions
//! - [`config`]: `~/.retrorestore/config.yaml` load / save
//! - [`error`]: [`StoreError`], [`ConfigError`]

pub mod config;
pub mod error;
pub mod handles;
pub mod store;
pub mod types;

pub use config::RestoreConfig;
pub use error::{ConfigError, StoreError};
pub use handles::{HandleId, HandleTable};
pub use store::{ItemStore, StoreStats};
pub use types::{
    Dimensions, ImagePayload, ItemId, ItemSnapshot, MediaType, RestorationItem,
    RestorationStatus, SourceImage,
};

//! Restoration runtime: orchestrator, downloads and the interactive session.

pub mod download;
mod error;
mod logging;
pub mod orchestrator;
pub mod session;

pub use download::{restored_file_name, save_all, save_item, Download};
pub use error::RuntimeError;
pub use logging::init_tracing;
pub use orchestrator::{AddReport, BatchReport, DispatchOutcome, Orchestrator};
pub use session::{parse_command, run_session, SessionCommand};

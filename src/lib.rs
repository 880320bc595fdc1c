//! Transync - translation file synchronization and merge engine
//!
//! Keeps translation files living in version-controlled checkouts in sync
//! with a database of translation units.
//!
//! # Features
//!
//! - Synchronizer: re-reads a changed file into the unit database
//! - Merge engine: folds uploaded files (or suggestions) into the database
//! - Commit coordinator: writes pending edits back and commits them
//! - Gettext PO ⇄ Excel workbook interchange
//! - Editor locks, zip and multi-language downloads
//!
//! # Example
//!
//! ```no_run
//! use transync::config::Settings;
//! use transync::workspace::Workspace;
//! use std::path::Path;
//!
//! let settings = Settings::load(Path::new("transync.yaml"))?;
//! let mut workspace = Workspace::open(&settings)?;
//!
//! for report in workspace.sync_all(false)? {
//!     println!("{}: synced={}", report.translation, report.synced);
//! }
//! # Ok::<(), transync::error::TransyncError>(())
//! ```

pub mod api;
pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod format;
pub mod hooks;
pub mod language;
pub mod spreadsheet;
pub mod translation;
pub mod units;
pub mod vcs;
pub mod workspace;

// Re-export commonly used types
pub use error::{TransyncError, TransyncResult};
pub use translation::{MergeSummary, Translation, TranslationStats};
pub use workspace::Workspace;

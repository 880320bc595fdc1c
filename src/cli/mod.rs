//! CLI command handlers

pub mod commands;

pub use commands::{commit, export, import, status, sync, upload, watch, UploadArgs};

//! Transync API Server module
//!
//! HTTP interface for downloads, uploads, synchronization and commits.
//! Run with `transync serve` or `transync-server`.

pub mod handlers;
pub mod server;

pub use server::run_api_server;

//! Harbor Backup Library
//!
//! Enumerates a Harbor registry, resolves every artifact to pullable image
//! references, and saves them to disk as full or delta backup runs.

pub mod config;
pub mod executor;
pub mod registry;
pub mod report;
pub mod resolver;
pub mod store;
pub mod sync;
pub mod tool;
pub mod utils;

// Re-export commonly used types
pub use config::Config;
pub use utils::errors::{BackupError, Result};

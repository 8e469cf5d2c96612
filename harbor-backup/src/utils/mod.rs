//! Utility modules for the registry backup tool.

pub mod errors;
pub mod logger;

pub use errors::{BackupError, CatalogEntity, Result};

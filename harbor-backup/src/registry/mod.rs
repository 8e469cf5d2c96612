//! Registry catalog access: HTTP client, catalog models and paginated inventory.

pub mod client;
pub mod inventory;
pub mod models;

pub use client::{HarborClient, PageFetcher};
pub use inventory::{Inventory, InventoryClient};
pub use models::{Artifact, Platform, Project, Reference, Repository};

use crate::utils::errors::{BackupError, Result};
use url::Url;

/// Append path segments to the API base URL, percent-encoding each segment once.
pub fn endpoint(base: &Url, segments: &[&str]) -> Result<Url> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| BackupError::Config(format!("registry URL cannot be a base: {}", base)))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

/// Percent-encode `segment` as a single URL path segment.
///
/// `/` becomes `%2F` and a space `%20`; characters legal in a path segment
/// are left as they are.
pub fn escape_segment(segment: &str) -> Result<String> {
    let mut scratch = Url::parse("http://localhost/")?;
    scratch
        .path_segments_mut()
        .map_err(|_| BackupError::Config("scratch URL cannot be a base".to_string()))?
        .clear()
        .push(segment);
    Ok(scratch.path().trim_start_matches('/').to_string())
}

//! Backup state: per-run manifests and the last-full-backup pointer.
//!
//! Delta runs read their baseline through this store, so the pointer is only
//! ever moved after the manifest it points at has been written.

use crate::executor::manifest::{parse_manifest, render_manifest};
use crate::utils::errors::Result;
use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;

#[async_trait]
pub trait BaselineStore: Send + Sync {
    /// Persist a complete reference set at `path`.
    async fn write_manifest(&self, path: &Path, references: &BTreeSet<String>) -> Result<()>;

    /// Load the reference set stored at `path`.
    async fn read_manifest(&self, path: &Path) -> Result<BTreeSet<String>>;

    /// Directory of the most recent full backup, if one was recorded.
    async fn last_full_backup(&self) -> Result<Option<PathBuf>>;

    /// Record `dir` as the most recent full backup.
    async fn set_last_full_backup(&self, dir: &Path) -> Result<()>;
}

/// Filesystem store: manifests live inside run directories, the pointer in a single file.
#[derive(Debug, Clone)]
pub struct FsBaselineStore {
    pointer_file: PathBuf,
}

impl FsBaselineStore {
    pub fn new(pointer_file: impl Into<PathBuf>) -> Self {
        Self {
            pointer_file: pointer_file.into(),
        }
    }

    pub fn pointer_file(&self) -> &Path {
        &self.pointer_file
    }
}

/// Write to a sibling temp file, then rename over the target.
async fn write_replace(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let mut tmp_name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    tmp_name.push(".tmp");
    let tmp = path.with_file_name(tmp_name);

    tokio::fs::write(&tmp, contents).await?;
    tokio::fs::rename(&tmp, path).await
}

#[async_trait]
impl BaselineStore for FsBaselineStore {
    async fn write_manifest(&self, path: &Path, references: &BTreeSet<String>) -> Result<()> {
        write_replace(path, render_manifest(references).as_bytes()).await?;
        Ok(())
    }

    async fn read_manifest(&self, path: &Path) -> Result<BTreeSet<String>> {
        let text = tokio::fs::read_to_string(path).await?;
        Ok(parse_manifest(&text))
    }

    async fn last_full_backup(&self) -> Result<Option<PathBuf>> {
        match tokio::fs::read_to_string(&self.pointer_file).await {
            Ok(content) => {
                let trimmed = content.trim();
                if trimmed.is_empty() {
                    Ok(None)
                } else {
                    Ok(Some(PathBuf::from(trimmed)))
                }
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn set_last_full_backup(&self, dir: &Path) -> Result<()> {
        if let Some(parent) = self.pointer_file.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        write_replace(&self.pointer_file, dir.to_string_lossy().as_bytes()).await?;
        Ok(())
    }
}

/// In-memory store for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryBaselineStore {
    manifests: RwLock<HashMap<PathBuf, BTreeSet<String>>>,
    pointer: RwLock<Option<PathBuf>>,
}

impl MemoryBaselineStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of manifests written so far
    pub async fn manifest_count(&self) -> usize {
        self.manifests.read().await.len()
    }
}

#[async_trait]
impl BaselineStore for MemoryBaselineStore {
    async fn write_manifest(&self, path: &Path, references: &BTreeSet<String>) -> Result<()> {
        let mut manifests = self.manifests.write().await;
        manifests.insert(path.to_path_buf(), references.clone());
        Ok(())
    }

    async fn read_manifest(&self, path: &Path) -> Result<BTreeSet<String>> {
        let manifests = self.manifests.read().await;
        manifests.get(path).cloned().ok_or_else(|| {
            std::io::Error::new(
                ErrorKind::NotFound,
                format!("no manifest at {}", path.display()),
            )
            .into()
        })
    }

    async fn last_full_backup(&self) -> Result<Option<PathBuf>> {
        Ok(self.pointer.read().await.clone())
    }

    async fn set_last_full_backup(&self, dir: &Path) -> Result<()> {
        *self.pointer.write().await = Some(dir.to_path_buf());
        Ok(())
    }
}

//! Error types for registry backup runs.

use std::fmt;
use thiserror::Error;

/// Which catalog lookup failed while resolving an artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogEntity {
    Project,
    Repository,
}

impl fmt::Display for CatalogEntity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CatalogEntity::Project => write!(f, "project"),
            CatalogEntity::Repository => write!(f, "repository"),
        }
    }
}

#[derive(Error, Debug)]
pub enum BackupError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Decode error: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Catalog inconsistency: {kind} id {id} is not present in the registry snapshot")]
    CatalogConsistency { kind: CatalogEntity, id: i64 },

    #[error("Baseline missing: {0}")]
    BaselineMissing(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid repository name: {0}")]
    InvalidRepositoryName(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl BackupError {
    /// True for failures reaching the registry or spawning the image tool.
    pub fn is_transport(&self) -> bool {
        matches!(self, BackupError::Transport(_) | BackupError::Http(_))
    }
}

pub type Result<T> = std::result::Result<T, BackupError>;

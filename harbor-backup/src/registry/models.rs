//! Catalog objects returned by the registry API.
//!
//! Only the fields the backup pipeline and the listing actions read are
//! modelled; everything else in the response bodies is ignored.

use serde::{Deserialize, Serialize};

/// Platform value the registry reports when it cannot identify OS or architecture.
pub const UNKNOWN_PLATFORM: &str = "unknown";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    #[serde(rename = "project_id")]
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub owner_name: Option<String>,
    #[serde(default)]
    pub repo_count: Option<i64>,
    #[serde(default)]
    pub creation_time: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Repository {
    pub id: i64,
    pub project_id: i64,
    /// `<project>/<repo-path>`
    pub name: String,
    #[serde(default)]
    pub artifact_count: Option<i64>,
    #[serde(default)]
    pub pull_count: Option<i64>,
    #[serde(default)]
    pub creation_time: Option<String>,
}

impl Repository {
    /// Repository path below its project (`lib/team/app` -> `team/app`).
    pub fn path_in_project<'a>(&'a self, project: &str) -> Option<&'a str> {
        self.name
            .strip_prefix(project)
            .and_then(|rest| rest.strip_prefix('/'))
            .filter(|rest| !rest.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    pub id: i64,
    pub project_id: i64,
    pub repository_id: i64,
    pub digest: String,
    /// Child manifests of an index; null or empty for single-architecture images
    #[serde(default)]
    pub references: Option<Vec<Reference>>,
    #[serde(default)]
    pub media_type: Option<String>,
    #[serde(default)]
    pub size: Option<i64>,
    #[serde(default)]
    pub push_time: Option<String>,
}

impl Artifact {
    pub fn references(&self) -> &[Reference] {
        self.references.as_deref().unwrap_or(&[])
    }

    pub fn is_multi_arch(&self) -> bool {
        !self.references().is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reference {
    pub child_digest: String,
    #[serde(default)]
    pub platform: Option<Platform>,
}

impl Reference {
    /// A child without a platform entry is treated as a concrete image.
    pub fn has_unknown_platform(&self) -> bool {
        self.platform.as_ref().is_some_and(Platform::is_unknown)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Platform {
    #[serde(default)]
    pub os: String,
    #[serde(default)]
    pub architecture: String,
    #[serde(default)]
    pub variant: Option<String>,
}

impl Platform {
    pub fn is_unknown(&self) -> bool {
        self.os == UNKNOWN_PLATFORM || self.architecture == UNKNOWN_PLATFORM
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Statistics {
    #[serde(default)]
    pub private_project_count: i64,
    #[serde(default)]
    pub private_repo_count: i64,
    #[serde(default)]
    pub public_project_count: i64,
    #[serde(default)]
    pub public_repo_count: i64,
    #[serde(default)]
    pub total_project_count: i64,
    #[serde(default)]
    pub total_repo_count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    #[serde(default)]
    pub components: Vec<HealthComponent>,
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        self.status == "healthy"
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthComponent {
    pub name: String,
    pub status: String,
}

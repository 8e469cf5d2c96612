//! Resolution of catalog artifacts into pullable image references.
//!
//! A single-architecture artifact yields `host/project/repo@digest`. An image
//! index yields one `host/project/repo@child` per child whose platform is
//! known; children reporting an `unknown` OS or architecture are excluded.
//! All report buckets are filled in the same pass over one snapshot.

use crate::registry::client::PageFetcher;
use crate::registry::inventory::{Inventory, InventoryClient};
use crate::registry::models::Repository;
use crate::utils::errors::{BackupError, CatalogEntity, Result};
use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap};

/// Output of one resolution pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedReferences {
    /// References handed to the backup pipeline
    pub pullable: BTreeSet<String>,
    /// `host/project/repo@digest` for artifacts without children
    pub single_arch: Vec<String>,
    /// `host/project/repo@digest` of image indexes
    pub multi_arch: Vec<String>,
    /// `host/project/repo@index::child` for every child of every index
    pub multi_arch_children: Vec<String>,
    /// `host/project/repo@index::child` for children with an unknown platform
    pub unknown_platform: Vec<String>,
}

/// Resolve every artifact in `inventory` against the registry `host`.
///
/// An artifact whose project or repository id is missing from the snapshot
/// fails the whole resolution.
pub fn resolve(host: &str, inventory: &Inventory) -> Result<ResolvedReferences> {
    let project_names: HashMap<i64, &str> = inventory
        .projects
        .iter()
        .map(|p| (p.id, p.name.as_str()))
        .collect();
    let repositories: HashMap<i64, &Repository> =
        inventory.repositories.iter().map(|r| (r.id, r)).collect();

    let mut resolved = ResolvedReferences::default();

    for artifact in &inventory.artifacts {
        let project = project_names
            .get(&artifact.project_id)
            .copied()
            .ok_or(BackupError::CatalogConsistency {
                kind: CatalogEntity::Project,
                id: artifact.project_id,
            })?;
        let repository = repositories
            .get(&artifact.repository_id)
            .copied()
            .ok_or(BackupError::CatalogConsistency {
                kind: CatalogEntity::Repository,
                id: artifact.repository_id,
            })?;
        let path = repository
            .path_in_project(project)
            .ok_or_else(|| BackupError::InvalidRepositoryName(repository.name.clone()))?;

        let locator = format!("{}/{}/{}", host, project, path);
        let top_level = format!("{}@{}", locator, artifact.digest);

        if !artifact.is_multi_arch() {
            resolved.single_arch.push(top_level.clone());
            resolved.pullable.insert(top_level);
            continue;
        }

        resolved.multi_arch.push(top_level.clone());
        for child in artifact.references() {
            let audit = format!("{}::{}", top_level, child.child_digest);
            resolved.multi_arch_children.push(audit.clone());

            if child.has_unknown_platform() {
                resolved.unknown_platform.push(audit);
                continue;
            }
            resolved
                .pullable
                .insert(format!("{}@{}", locator, child.child_digest));
        }
    }

    Ok(resolved)
}

/// Produces the current pullable reference set for a backup run.
#[async_trait]
pub trait ReferenceSource: Send + Sync {
    async fn pullable_references(&self) -> Result<BTreeSet<String>>;
}

/// Live registry: snapshot the catalog, then resolve it.
pub struct RegistryReferences<F> {
    inventory: InventoryClient<F>,
    host: String,
}

impl<F: PageFetcher> RegistryReferences<F> {
    pub fn new(inventory: InventoryClient<F>, host: impl Into<String>) -> Self {
        Self {
            inventory,
            host: host.into(),
        }
    }

    /// Snapshot and resolve, keeping every report bucket.
    pub async fn resolve_all(&self) -> Result<ResolvedReferences> {
        let snapshot = self.inventory.snapshot().await?;
        resolve(&self.host, &snapshot)
    }
}

#[async_trait]
impl<F: PageFetcher> ReferenceSource for RegistryReferences<F> {
    async fn pullable_references(&self) -> Result<BTreeSet<String>> {
        Ok(self.resolve_all().await?.pullable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::models::{Artifact, Platform, Project, Reference};

    fn project(id: i64, name: &str) -> Project {
        Project {
            id,
            name: name.into(),
            owner_name: None,
            repo_count: None,
            creation_time: None,
        }
    }

    fn repository(id: i64, project_id: i64, name: &str) -> Repository {
        Repository {
            id,
            project_id,
            name: name.into(),
            artifact_count: None,
            pull_count: None,
            creation_time: None,
        }
    }

    fn artifact(id: i64, repository_id: i64, digest: &str, children: &[(&str, &str, &str)]) -> Artifact {
        let references = children
            .iter()
            .map(|(digest, os, arch)| Reference {
                child_digest: digest.to_string(),
                platform: Some(Platform {
                    os: os.to_string(),
                    architecture: arch.to_string(),
                    variant: None,
                }),
            })
            .collect::<Vec<_>>();
        Artifact {
            id,
            project_id: 1,
            repository_id,
            digest: digest.into(),
            references: if references.is_empty() { None } else { Some(references) },
            media_type: None,
            size: None,
            push_time: None,
        }
    }

    fn inventory(artifacts: Vec<Artifact>) -> Inventory {
        Inventory {
            projects: vec![project(1, "lib")],
            repositories: vec![repository(10, 1, "lib/app"), repository(11, 1, "lib/tools/cli")],
            artifacts,
        }
    }

    #[test]
    fn test_single_arch_yields_one_reference() {
        let inv = inventory(vec![artifact(1, 10, "sha256:aaa", &[])]);
        let resolved = resolve("harbor.local", &inv).unwrap();

        assert_eq!(
            resolved.pullable.into_iter().collect::<Vec<_>>(),
            vec!["harbor.local/lib/app@sha256:aaa".to_string()]
        );
        assert_eq!(resolved.single_arch, vec!["harbor.local/lib/app@sha256:aaa"]);
        assert!(resolved.multi_arch.is_empty());
    }

    #[test]
    fn test_unknown_platform_child_is_excluded() {
        let inv = inventory(vec![artifact(
            1,
            10,
            "sha256:ccc",
            &[("sha256:c1", "linux", "amd64"), ("sha256:c2", "unknown", "unknown")],
        )]);
        let resolved = resolve("harbor.local", &inv).unwrap();

        assert_eq!(resolved.pullable.len(), 1);
        assert!(resolved.pullable.contains("harbor.local/lib/app@sha256:c1"));
        assert_eq!(resolved.multi_arch, vec!["harbor.local/lib/app@sha256:ccc"]);
        assert_eq!(resolved.multi_arch_children.len(), 2);
        assert_eq!(
            resolved.unknown_platform,
            vec!["harbor.local/lib/app@sha256:ccc::sha256:c2"]
        );
    }

    #[test]
    fn test_multi_arch_yields_k_minus_u_references() {
        let children = [
            ("sha256:k1", "linux", "amd64"),
            ("sha256:k2", "linux", "arm64"),
            ("sha256:k3", "unknown", "arm64"),
            ("sha256:k4", "linux", "unknown"),
            ("sha256:k5", "windows", "amd64"),
        ];
        let inv = inventory(vec![artifact(1, 10, "sha256:idx", &children)]);
        let resolved = resolve("harbor.local", &inv).unwrap();

        // 5 children, 2 with an unknown field
        assert_eq!(resolved.pullable.len(), 3);
        for digest in ["sha256:k3", "sha256:k4"] {
            assert!(!resolved.pullable.iter().any(|r| r.ends_with(digest)));
        }
    }

    #[test]
    fn test_nested_repository_path() {
        let inv = inventory(vec![artifact(1, 11, "sha256:bbb", &[])]);
        let resolved = resolve("harbor.local:8443", &inv).unwrap();
        assert!(resolved.pullable.contains("harbor.local:8443/lib/tools/cli@sha256:bbb"));
    }

    #[test]
    fn test_missing_repository_is_fatal() {
        let inv = inventory(vec![artifact(1, 10, "sha256:aaa", &[]), artifact(2, 99, "sha256:bbb", &[])]);
        let err = resolve("harbor.local", &inv).unwrap_err();
        assert!(matches!(
            err,
            BackupError::CatalogConsistency { kind: CatalogEntity::Repository, id: 99 }
        ));
    }

    #[test]
    fn test_missing_project_is_fatal() {
        let mut orphan = artifact(1, 10, "sha256:aaa", &[]);
        orphan.project_id = 7;
        let err = resolve("harbor.local", &inventory(vec![orphan])).unwrap_err();
        assert!(matches!(
            err,
            BackupError::CatalogConsistency { kind: CatalogEntity::Project, id: 7 }
        ));
    }

    #[test]
    fn test_resolution_is_idempotent() {
        let inv = inventory(vec![
            artifact(1, 10, "sha256:aaa", &[]),
            artifact(2, 11, "sha256:idx", &[("sha256:c1", "linux", "amd64"), ("sha256:c2", "linux", "s390x")]),
        ]);
        let first = resolve("harbor.local", &inv).unwrap();
        let second = resolve("harbor.local", &inv).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.pullable.len(), 3);
    }

    #[test]
    fn test_shared_child_digest_is_pulled_once() {
        let inv = inventory(vec![
            artifact(1, 10, "sha256:idx1", &[("sha256:shared", "linux", "amd64")]),
            artifact(2, 10, "sha256:idx2", &[("sha256:shared", "linux", "amd64")]),
        ]);
        let resolved = resolve("harbor.local", &inv).unwrap();
        assert_eq!(resolved.pullable.len(), 1);
        assert_eq!(resolved.multi_arch_children.len(), 2);
    }
}

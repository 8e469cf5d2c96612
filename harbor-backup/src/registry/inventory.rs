//! Paginated enumeration of the registry catalog.
//!
//! Pages are requested sequentially starting at 1; an empty page is the only
//! termination signal. A failed page aborts the whole listing and nothing
//! collected so far is returned.

use super::client::PageFetcher;
use super::{endpoint, escape_segment};
use super::models::{Artifact, Project, Repository};
use crate::utils::errors::{BackupError, Result};
use serde::de::DeserializeOwned;
use tracing::{debug, info};
use url::Url;

/// Flat snapshot of the catalog taken in a single enumeration pass.
#[derive(Debug, Clone, Default)]
pub struct Inventory {
    pub projects: Vec<Project>,
    pub repositories: Vec<Repository>,
    pub artifacts: Vec<Artifact>,
}

pub struct InventoryClient<F> {
    fetcher: F,
    api_base: Url,
    page_size: u32,
}

impl<F: PageFetcher> InventoryClient<F> {
    pub fn new(fetcher: F, api_base: Url, page_size: u32) -> Self {
        Self {
            fetcher,
            api_base,
            page_size: page_size.max(1),
        }
    }

    pub async fn list_projects(&self) -> Result<Vec<Project>> {
        self.collect_pages(&["projects"]).await
    }

    pub async fn list_repositories(&self, project: &Project) -> Result<Vec<Repository>> {
        self.collect_pages(&["projects", &project.name, "repositories"])
            .await
    }

    /// The repository path is encoded before it is placed in the URL, so a
    /// nested path such as `team/app` reaches the API as `team%252Fapp`.
    pub async fn list_artifacts(&self, repository: &Repository) -> Result<Vec<Artifact>> {
        let (project, path) = repository
            .name
            .split_once('/')
            .filter(|(p, r)| !p.is_empty() && !r.is_empty())
            .ok_or_else(|| BackupError::InvalidRepositoryName(repository.name.clone()))?;
        let encoded = escape_segment(path)?;

        self.collect_pages(&["projects", project, "repositories", &encoded, "artifacts"])
            .await
    }

    /// Enumerate projects, then repositories per project, then artifacts per repository.
    pub async fn snapshot(&self) -> Result<Inventory> {
        let projects = self.list_projects().await?;

        let mut repositories = Vec::new();
        for project in &projects {
            repositories.extend(self.list_repositories(project).await?);
        }

        let mut artifacts = Vec::new();
        for repository in &repositories {
            artifacts.extend(self.list_artifacts(repository).await?);
        }

        info!(
            "Inventory: {} projects, {} repositories, {} artifacts",
            projects.len(),
            repositories.len(),
            artifacts.len()
        );

        Ok(Inventory {
            projects,
            repositories,
            artifacts,
        })
    }

    async fn collect_pages<T: DeserializeOwned>(&self, segments: &[&str]) -> Result<Vec<T>> {
        let collection = endpoint(&self.api_base, segments)?;
        let mut items = Vec::new();
        let mut page = 1u32;

        loop {
            let mut url = collection.clone();
            url.query_pairs_mut()
                .append_pair("page", &page.to_string())
                .append_pair("page_size", &self.page_size.to_string());

            let body = self.fetcher.fetch(&url).await?;
            let batch: Vec<T> = serde_json::from_slice(&body)?;
            if batch.is_empty() {
                break;
            }

            debug!(url = %collection, page, count = batch.len(), "Fetched page");
            items.extend(batch);
            page += 1;
        }

        Ok(items)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Serves JSON pages keyed by collection path; pages past the end are empty.
    #[derive(Default)]
    pub(crate) struct FakeCatalog {
        pub pages: HashMap<String, Vec<Value>>,
        pub fail_on: Option<(String, u32)>,
        pub requests: Mutex<Vec<String>>,
    }

    impl FakeCatalog {
        pub fn with(mut self, path: &str, pages: Vec<Value>) -> Self {
            self.pages.insert(path.to_string(), pages);
            self
        }

        pub fn request_count(&self) -> usize {
            self.requests.lock().map(|r| r.len()).unwrap_or(0)
        }
    }

    #[async_trait]
    impl PageFetcher for FakeCatalog {
        async fn fetch(&self, url: &Url) -> Result<Vec<u8>> {
            self.requests.lock().unwrap().push(url.to_string());

            let path = url.path().trim_start_matches("/api/v2.0/").to_string();
            let page: u32 = url
                .query_pairs()
                .find(|(k, _)| k == "page")
                .and_then(|(_, v)| v.parse().ok())
                .unwrap_or(1);

            if let Some((fail_path, fail_page)) = &self.fail_on {
                if *fail_path == path && *fail_page == page {
                    return Err(BackupError::Transport(format!("GET {} returned status 503", url)));
                }
            }

            let body = self
                .pages
                .get(&path)
                .and_then(|pages| pages.get(page as usize - 1))
                .cloned()
                .unwrap_or_else(|| json!([]));
            Ok(serde_json::to_vec(&body)?)
        }
    }

    fn base() -> Url {
        Url::parse("https://harbor.local/api/v2.0").unwrap()
    }

    #[tokio::test]
    async fn test_pagination_stops_at_first_empty_page() {
        let catalog = FakeCatalog::default().with(
            "projects",
            vec![
                json!([{"project_id": 1, "name": "a"}, {"project_id": 2, "name": "b"}]),
                json!([{"project_id": 3, "name": "c"}, {"project_id": 4, "name": "d"}]),
                json!([{"project_id": 5, "name": "e"}]),
            ],
        );
        let client = InventoryClient::new(catalog, base(), 2);

        let projects = client.list_projects().await.unwrap();
        let names: Vec<_> = projects.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c", "d", "e"]);
        // pages 1-3 plus the terminating empty page 4
        assert_eq!(client.fetcher.request_count(), 4);

        let requests = client.fetcher.requests.lock().unwrap();
        assert!(requests[3].ends_with("projects?page=4&page_size=2"));
    }

    #[tokio::test]
    async fn test_failed_page_discards_partial_results() {
        let mut catalog = FakeCatalog::default().with(
            "projects",
            vec![json!([{"project_id": 1, "name": "a"}]), json!([{"project_id": 2, "name": "b"}])],
        );
        catalog.fail_on = Some(("projects".to_string(), 2));
        let client = InventoryClient::new(catalog, base(), 1);

        let err = client.list_projects().await.unwrap_err();
        assert!(err.is_transport());
    }

    #[tokio::test]
    async fn test_undecodable_page_is_decode_error() {
        let catalog = FakeCatalog::default().with("projects", vec![json!({"errors": []})]);
        let client = InventoryClient::new(catalog, base(), 10);

        let err = client.list_projects().await.unwrap_err();
        assert!(matches!(err, BackupError::Decode(_)));
    }

    #[tokio::test]
    async fn test_artifact_listing_double_encodes_nested_repository() {
        let catalog = FakeCatalog::default();
        let client = InventoryClient::new(catalog, base(), 10);
        let repo = Repository {
            id: 1,
            project_id: 1,
            name: "lib/team/app".into(),
            artifact_count: None,
            pull_count: None,
            creation_time: None,
        };

        let artifacts = client.list_artifacts(&repo).await.unwrap();
        assert!(artifacts.is_empty());

        let requests = client.fetcher.requests.lock().unwrap();
        assert_eq!(
            requests[0],
            "https://harbor.local/api/v2.0/projects/lib/repositories/team%252Fapp/artifacts?page=1&page_size=10"
        );
    }

    #[tokio::test]
    async fn test_artifact_listing_encodes_space_as_percent_20() {
        let client = InventoryClient::new(FakeCatalog::default(), base(), 10);
        let repo = Repository {
            id: 1,
            project_id: 1,
            name: "lib/my app".into(),
            artifact_count: None,
            pull_count: None,
            creation_time: None,
        };

        client.list_artifacts(&repo).await.unwrap();

        let requests = client.fetcher.requests.lock().unwrap();
        assert!(requests[0].contains("/repositories/my%2520app/artifacts"));
    }

    #[tokio::test]
    async fn test_repository_name_without_project_is_rejected() {
        let client = InventoryClient::new(FakeCatalog::default(), base(), 10);
        let repo = Repository {
            id: 1,
            project_id: 1,
            name: "orphan".into(),
            artifact_count: None,
            pull_count: None,
            creation_time: None,
        };

        let err = client.list_artifacts(&repo).await.unwrap_err();
        assert!(matches!(err, BackupError::InvalidRepositoryName(_)));
    }

    #[tokio::test]
    async fn test_snapshot_walks_hierarchy() {
        let catalog = FakeCatalog::default()
            .with("projects", vec![json!([{"project_id": 1, "name": "lib"}])])
            .with(
                "projects/lib/repositories",
                vec![json!([{"id": 10, "project_id": 1, "name": "lib/app"}])],
            )
            .with(
                "projects/lib/repositories/app/artifacts",
                vec![json!([{"id": 100, "project_id": 1, "repository_id": 10, "digest": "sha256:aaa"}])],
            );
        let client = InventoryClient::new(catalog, base(), 100);

        let inventory = client.snapshot().await.unwrap();
        assert_eq!(inventory.projects.len(), 1);
        assert_eq!(inventory.repositories.len(), 1);
        assert_eq!(inventory.artifacts.len(), 1);
        assert_eq!(inventory.artifacts[0].digest, "sha256:aaa");
    }
}

use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::config::Config;

/// Page size the GitHub list endpoint is driven with
const PER_PAGE: u32 = 30;

/// A repository as returned by the list endpoint
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct RepoSummary {
    pub id: u64,
    pub name: String,
    pub full_name: String,
    pub fork: bool,
    pub clone_url: String,
}

/// A fork with its parent metadata, as returned by the detail endpoint
#[derive(Debug, Clone)]
pub struct RepoDetail {
    pub id: u64,
    pub name: String,
    pub full_name: String,
    pub clone_url: String,
    pub parent: RepoSummary,
    pub default_branch: String,
}

#[derive(Debug, Deserialize)]
struct RawRepoDetail {
    id: u64,
    name: String,
    full_name: String,
    clone_url: String,
    parent: Option<RepoSummary>,
    default_branch: String,
}

/// Repository directory failures; fatal for the whole run
#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("repository directory request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("repository directory returned HTTP {status} for {url}")]
    Status { status: u16, url: String },

    #[error("fork {0} has no parent repository")]
    MissingParent(String),
}

/// Read access to the repository hosting service
///
/// The orchestrator only talks to the directory through this trait, so tests
/// can substitute a canned implementation.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RepoDirectory: Send + Sync {
    /// Fetch one page of the owner's repositories; an empty page signals the
    /// end of pagination.
    async fn list_repositories(
        &self,
        owner: &str,
        page: u32,
    ) -> Result<Vec<RepoSummary>, DirectoryError>;

    /// Fetch the detailed record for one repository, including its parent.
    async fn repository_detail(
        &self,
        owner: &str,
        name: &str,
    ) -> Result<RepoDetail, DirectoryError>;
}

/// GitHub REST API client
pub struct GitHubClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl GitHubClient {
    pub fn new(config: &Config) -> Result<Self, DirectoryError> {
        // GitHub rejects requests without a User-Agent
        let http = reqwest::Client::builder()
            .user_agent(concat!(
                env!("CARGO_PKG_NAME"),
                "/",
                env!("CARGO_PKG_VERSION")
            ))
            .build()?;

        Ok(Self {
            http,
            base_url: config.api_url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
        })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: String,
    ) -> Result<T, DirectoryError> {
        debug!("GET {}", url);

        let response = self
            .http
            .get(&url)
            .header(AUTHORIZATION, format!("token {}", self.token))
            .header(ACCEPT, "application/vnd.github.v3+json")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(DirectoryError::Status {
                status: status.as_u16(),
                url,
            });
        }

        Ok(response.json::<T>().await?)
    }
}

#[async_trait]
impl RepoDirectory for GitHubClient {
    async fn list_repositories(
        &self,
        owner: &str,
        page: u32,
    ) -> Result<Vec<RepoSummary>, DirectoryError> {
        let url = format!(
            "{}/users/{}/repos?page={}&per_page={}",
            self.base_url, owner, page, PER_PAGE
        );
        self.get_json(url).await
    }

    async fn repository_detail(
        &self,
        owner: &str,
        name: &str,
    ) -> Result<RepoDetail, DirectoryError> {
        let url = format!("{}/repos/{}/{}", self.base_url, owner, name);
        let raw: RawRepoDetail = self.get_json(url).await?;

        // Every true fork resolves to a detail record with a parent; a
        // missing one means the directory contradicted its own listing.
        let parent = raw
            .parent
            .ok_or_else(|| DirectoryError::MissingParent(raw.full_name.clone()))?;

        Ok(RepoDetail {
            id: raw.id,
            name: raw.name,
            full_name: raw.full_name,
            clone_url: raw.clone_url,
            parent,
            default_branch: raw.default_branch,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_deserializes_from_list_entry() {
        let json = r#"{
            "id": 42,
            "name": "linguist",
            "full_name": "octocat/linguist",
            "fork": true,
            "clone_url": "https://github.com/octocat/linguist.git",
            "stargazers_count": 3
        }"#;

        let summary: RepoSummary = serde_json::from_str(json).expect("Failed to deserialize");

        assert_eq!(summary.id, 42);
        assert_eq!(summary.name, "linguist");
        assert_eq!(summary.full_name, "octocat/linguist");
        assert!(summary.fork);
        assert_eq!(summary.clone_url, "https://github.com/octocat/linguist.git");
    }

    #[test]
    fn test_detail_parent_is_optional_in_wire_format() {
        let json = r#"{
            "id": 7,
            "name": "own-project",
            "full_name": "octocat/own-project",
            "fork": false,
            "clone_url": "https://github.com/octocat/own-project.git",
            "default_branch": "main"
        }"#;

        let raw: RawRepoDetail = serde_json::from_str(json).expect("Failed to deserialize");
        assert!(raw.parent.is_none());
        assert_eq!(raw.default_branch, "main");
    }
}

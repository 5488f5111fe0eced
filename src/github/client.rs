//! Octocrab client wrapper scoped to a specific repository.

use octocrab::Octocrab;
use serde::Serialize;

use crate::types::{PrNumber, RepoId};

use super::error::ApiError;
use super::{PrHost, RemotePr};

/// A GitHub API client scoped to a specific repository.
#[derive(Clone)]
pub struct GitHubClient {
    /// The underlying octocrab client.
    client: Octocrab,

    /// The repository this client is scoped to.
    repo: RepoId,
}

impl GitHubClient {
    /// Creates a client from a GitHub access token.
    pub fn from_token(token: impl Into<String>, repo: RepoId) -> Result<Self, ApiError> {
        let client = Octocrab::builder()
            .personal_token(token.into())
            .build()
            .map_err(ApiError::from_octocrab)?;
        Ok(Self { client, repo })
    }

    /// Returns the repository owner.
    pub fn owner(&self) -> &str {
        &self.repo.owner
    }

    /// Returns the repository name.
    pub fn repo_name(&self) -> &str {
        &self.repo.repo
    }
}

impl std::fmt::Debug for GitHubClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubClient")
            .field("repo", &self.repo)
            .finish_non_exhaustive()
    }
}

impl PrHost for GitHubClient {
    async fn find_pr_by_head(&self, branch: &str) -> Result<Option<RemotePr>, ApiError> {
        // GitHub's head filter needs the owner-qualified form.
        let head = format!("{}:{}", self.owner(), branch);
        let page = self
            .client
            .pulls(self.owner(), self.repo_name())
            .list()
            .state(octocrab::params::State::Open)
            .head(head)
            .per_page(10)
            .send()
            .await
            .map_err(ApiError::from_octocrab)?;

        Ok(page.items.into_iter().next().map(|pull| RemotePr {
            number: PrNumber(pull.number),
            title: pull.title.unwrap_or_default(),
            body: pull.body.unwrap_or_default(),
            base: pull.base.ref_field,
        }))
    }

    async fn create_pr(
        &self,
        head: &str,
        base: &str,
        title: &str,
        body: &str,
        draft: bool,
    ) -> Result<RemotePr, ApiError> {
        let pull = self
            .client
            .pulls(self.owner(), self.repo_name())
            .create(title, head, base)
            .body(body)
            .draft(draft)
            .send()
            .await
            .map_err(ApiError::from_octocrab)?;

        Ok(RemotePr {
            number: PrNumber(pull.number),
            title: pull.title.unwrap_or_else(|| title.to_string()),
            body: pull.body.unwrap_or_else(|| body.to_string()),
            base: pull.base.ref_field,
        })
    }

    async fn update_pr(
        &self,
        number: PrNumber,
        title: &str,
        base: &str,
        body: &str,
    ) -> Result<(), ApiError> {
        self.client
            .pulls(self.owner(), self.repo_name())
            .update(number.0)
            .title(title)
            .base(base)
            .body(body)
            .send()
            .await
            .map_err(ApiError::from_octocrab)?;
        Ok(())
    }

    async fn request_reviewers(
        &self,
        number: PrNumber,
        reviewers: &[String],
    ) -> Result<(), ApiError> {
        if reviewers.is_empty() {
            return Ok(());
        }

        // octocrab has no typed endpoint for review requests; use a raw POST.
        let url = format!(
            "/repos/{}/{}/pulls/{}/requested_reviewers",
            self.owner(),
            self.repo_name(),
            number.0
        );

        #[derive(Serialize)]
        struct ReviewRequest<'a> {
            reviewers: &'a [String],
        }

        let _: serde_json::Value = self
            .client
            .post(&url, Some(&ReviewRequest { reviewers }))
            .await
            .map_err(ApiError::from_octocrab)?;
        Ok(())
    }
}

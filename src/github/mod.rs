//! GitHub pull request access.
//!
//! [`PrHost`] is the seam between the synchronizer and the network: find a
//! PR by head branch, create one, update one, request reviewers. The real
//! implementation is [`GitHubClient`] (octocrab); tests use an in-memory
//! fake.

mod client;
mod error;

pub use client::GitHubClient;
pub use error::ApiError;

use crate::types::PrNumber;

/// A pull request as known to the remote host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemotePr {
    pub number: PrNumber,
    pub title: String,
    pub body: String,
    pub base: String,
}

/// The remote operations PR synchronization needs.
///
/// All operations are issued sequentially and awaited; any error aborts the
/// caller's run.
pub trait PrHost {
    /// Finds the open PR whose head is `branch`, if one exists.
    async fn find_pr_by_head(&self, branch: &str) -> Result<Option<RemotePr>, ApiError>;

    /// Creates a PR and returns it as the remote recorded it.
    async fn create_pr(
        &self,
        head: &str,
        base: &str,
        title: &str,
        body: &str,
        draft: bool,
    ) -> Result<RemotePr, ApiError>;

    /// Updates a PR's title, base, and body.
    async fn update_pr(
        &self,
        number: PrNumber,
        title: &str,
        base: &str,
        body: &str,
    ) -> Result<(), ApiError>;

    /// Requests reviews from the given users.
    async fn request_reviewers(
        &self,
        number: PrNumber,
        reviewers: &[String],
    ) -> Result<(), ApiError>;
}

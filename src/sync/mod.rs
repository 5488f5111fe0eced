//! Idempotent PR synchronization for a whole train.
//!
//! Two passes, both strictly in train order:
//!
//! 1. Ensure one remote PR per branch. Existing PRs (found by head-branch
//!    lookup) keep their remote title and body as source of truth; missing
//!    PRs are created from the branch's tip commit message (or the
//!    user-supplied title for the combined branch). Results land in an
//!    ordered branch-to-PR directory.
//! 2. With the directory complete, render each PR's navigation block (which
//!    cites every sibling's PR number, including ones created moments ago in
//!    pass 1), upsert it into the body, and push title/base/body updates to
//!    the remote.
//!
//! Any API failure aborts the whole run: a missing PR number would corrupt
//! the cross-links of every sibling's navigation block, so partial
//! completion is not considered safe. Re-running after a fix is cheap
//! because of the head-branch lookup and the marker-based upsert.

use std::ops::Range;
use std::path::Path;

use crate::error::Error;
use crate::git;
use crate::github::PrHost;
use crate::nav::{self, NavigationEntry};
use crate::types::{PrNumber, Train};

/// Whether a PR already existed on the remote or was created by this run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrStatus {
    Existing,
    New,
}

/// The synchronized PR for one branch of the train.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrRecord {
    /// The head branch.
    pub branch: String,

    /// The remote PR number. Stable across runs.
    pub number: PrNumber,

    /// PR title. For existing PRs this is the remote's current title
    /// (manual edits are preserved, local recomputation discarded).
    pub title: String,

    /// PR body, before the navigation block is upserted.
    pub body: String,

    /// The resolved base branch.
    pub base: String,

    pub status: PrStatus,

    /// Reviewers to request in pass 2.
    pub reviewers: Vec<String>,
}

/// Ordered branch-to-PR mapping, keyed by branch name.
///
/// Written during pass 1, read-only during pass 2. Iteration order is
/// insertion order, which is train order.
#[derive(Debug, Default)]
pub struct PrDirectory {
    records: Vec<PrRecord>,
}

impl PrDirectory {
    fn insert(&mut self, record: PrRecord) {
        debug_assert!(
            self.get(&record.branch).is_none(),
            "branch '{}' synchronized twice",
            record.branch
        );
        self.records.push(record);
    }

    /// Looks up a record by branch name.
    pub fn get(&self, branch: &str) -> Option<&PrRecord> {
        self.records.iter().find(|r| r.branch == branch)
    }

    /// Records in train order.
    pub fn iter(&self) -> impl Iterator<Item = &PrRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Options for one synchronization run.
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// The branch the train ultimately merges into.
    pub stable_branch: String,

    /// Create new PRs as drafts.
    pub draft: bool,

    /// Title for the combined branch's PR. Defaults to the train name.
    pub combined_title: Option<String>,

    /// Reviewers to request on every PR.
    pub reviewers: Vec<String>,

    /// Restrict synchronization to these train indices (half-open).
    ///
    /// Branches outside the range are still looked up, so their existing PR
    /// numbers appear in navigation blocks, but they are never created or
    /// updated. `None` covers the whole train.
    pub range: Option<Range<usize>>,
}

impl SyncOptions {
    fn covers(&self, index: usize) -> bool {
        self.range.as_ref().is_none_or(|r| r.contains(&index))
    }
}

/// Synchronizes every branch of the train with the remote.
///
/// Returns the completed directory so callers can print a summary.
pub async fn sync_train<H: PrHost>(
    host: &H,
    workdir: &Path,
    train: &Train,
    opts: &SyncOptions,
) -> Result<PrDirectory, Error> {
    let mut directory = PrDirectory::default();

    // Pass 1: one PR per branch, in train order.
    for branch in train.branches() {
        let base = train.base_of(branch.index, &opts.stable_branch).to_string();

        let record = match host.find_pr_by_head(&branch.name).await.map_err(Error::Api)? {
            Some(remote) => {
                tracing::info!(branch = %branch.name, pr = %remote.number, "found existing PR");
                PrRecord {
                    branch: branch.name.clone(),
                    number: remote.number,
                    title: remote.title,
                    body: remote.body,
                    base,
                    status: PrStatus::Existing,
                    reviewers: opts.reviewers.clone(),
                }
            }
            None if !opts.covers(branch.index) => {
                tracing::debug!(
                    branch = %branch.name,
                    "outside requested range and has no PR; skipping"
                );
                continue;
            }
            None => {
                let (title, body) = if branch.is_combined {
                    (combined_title(train, opts), String::new())
                } else {
                    git::tip_message(workdir, &branch.name).map_err(Error::Git)?
                };
                let created = host
                    .create_pr(&branch.name, &base, &title, &body, opts.draft)
                    .await
                    .map_err(Error::Api)?;
                tracing::info!(branch = %branch.name, pr = %created.number, "created PR");
                PrRecord {
                    branch: branch.name.clone(),
                    number: created.number,
                    title: created.title,
                    body: created.body,
                    base,
                    status: PrStatus::New,
                    reviewers: opts.reviewers.clone(),
                }
            }
        };
        directory.insert(record);
    }

    // Pass 2: with every sibling's PR number known, cross-link and update.
    for record in directory.iter() {
        let Some(index) = train.position_of(&record.branch) else {
            continue;
        };
        if !opts.covers(index) {
            continue;
        }
        let base = train.base_of(index, &opts.stable_branch);
        let block = nav::render(&navigation_entries(train, &directory, &record.branch));
        let body = nav::upsert(&record.body, &block);

        host.update_pr(record.number, &record.title, base, &body)
            .await
            .map_err(Error::Api)?;

        if !record.reviewers.is_empty() {
            host.request_reviewers(record.number, &record.reviewers)
                .await
                .map_err(Error::Api)?;
        }
        tracing::info!(branch = %record.branch, pr = %record.number, "updated PR");
    }

    Ok(directory)
}

/// The title for the combined branch's PR.
fn combined_title(train: &Train, opts: &SyncOptions) -> String {
    opts.combined_title
        .clone()
        .unwrap_or_else(|| train.name.clone())
}

/// Builds the navigation entries for the PR owned by `owning_branch`.
fn navigation_entries(
    train: &Train,
    directory: &PrDirectory,
    owning_branch: &str,
) -> Vec<NavigationEntry> {
    directory
        .iter()
        .map(|record| {
            let is_combined = train
                .branches()
                .iter()
                .any(|b| b.name == record.branch && b.is_combined);
            NavigationEntry {
                number: record.number,
                title: record.title.clone(),
                is_combined,
                is_current: record.branch == owning_branch,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::checkout;
    use crate::github::{ApiError, RemotePr};
    use crate::nav::{TOC_END, TOC_START};
    use crate::test_utils::{commit_file, create_branch, init_repo};
    use crate::types::BranchRef;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// In-memory PR host. PR numbers are assigned from 101 upward.
    #[derive(Debug, Default)]
    struct FakeHost {
        state: Mutex<FakeState>,
    }

    #[derive(Debug)]
    struct FakeState {
        next_number: u64,
        prs: Vec<FakePr>,
        fail_create_for: Option<String>,
        update_calls: usize,
    }

    impl Default for FakeState {
        fn default() -> Self {
            FakeState {
                next_number: 101,
                prs: Vec::new(),
                fail_create_for: None,
                update_calls: 0,
            }
        }
    }

    #[derive(Debug, Clone)]
    struct FakePr {
        number: PrNumber,
        head: String,
        base: String,
        title: String,
        body: String,
        reviewers: Vec<String>,
    }

    impl FakeHost {
        fn seed(&self, head: &str, title: &str, body: &str, base: &str) -> PrNumber {
            let mut state = self.state.lock().unwrap();
            let number = PrNumber(state.next_number);
            state.next_number += 1;
            state.prs.push(FakePr {
                number,
                head: head.to_string(),
                base: base.to_string(),
                title: title.to_string(),
                body: body.to_string(),
                reviewers: Vec::new(),
            });
            number
        }

        fn pr_for(&self, head: &str) -> FakePr {
            self.state
                .lock()
                .unwrap()
                .prs
                .iter()
                .find(|pr| pr.head == head)
                .cloned()
                .unwrap()
        }

        fn pr_count(&self) -> usize {
            self.state.lock().unwrap().prs.len()
        }

        fn update_calls(&self) -> usize {
            self.state.lock().unwrap().update_calls
        }
    }

    impl PrHost for FakeHost {
        async fn find_pr_by_head(&self, branch: &str) -> Result<Option<RemotePr>, ApiError> {
            let state = self.state.lock().unwrap();
            Ok(state.prs.iter().find(|pr| pr.head == branch).map(|pr| {
                RemotePr {
                    number: pr.number,
                    title: pr.title.clone(),
                    body: pr.body.clone(),
                    base: pr.base.clone(),
                }
            }))
        }

        async fn create_pr(
            &self,
            head: &str,
            base: &str,
            title: &str,
            body: &str,
            _draft: bool,
        ) -> Result<RemotePr, ApiError> {
            let mut state = self.state.lock().unwrap();
            if state.fail_create_for.as_deref() == Some(head) {
                return Err(ApiError::message(format!("create failed for {}", head)));
            }
            let number = PrNumber(state.next_number);
            state.next_number += 1;
            state.prs.push(FakePr {
                number,
                head: head.to_string(),
                base: base.to_string(),
                title: title.to_string(),
                body: body.to_string(),
                reviewers: Vec::new(),
            });
            Ok(RemotePr {
                number,
                title: title.to_string(),
                body: body.to_string(),
                base: base.to_string(),
            })
        }

        async fn update_pr(
            &self,
            number: PrNumber,
            title: &str,
            base: &str,
            body: &str,
        ) -> Result<(), ApiError> {
            let mut state = self.state.lock().unwrap();
            state.update_calls += 1;
            let pr = state
                .prs
                .iter_mut()
                .find(|pr| pr.number == number)
                .ok_or_else(|| ApiError::message("no such PR"))?;
            pr.title = title.to_string();
            pr.base = base.to_string();
            pr.body = body.to_string();
            Ok(())
        }

        async fn request_reviewers(
            &self,
            number: PrNumber,
            reviewers: &[String],
        ) -> Result<(), ApiError> {
            let mut state = self.state.lock().unwrap();
            let pr = state
                .prs
                .iter_mut()
                .find(|pr| pr.number == number)
                .ok_or_else(|| ApiError::message("no such PR"))?;
            pr.reviewers.extend_from_slice(reviewers);
            Ok(())
        }
    }

    /// master -> feat-1 -> feat-2 -> feat-3, with feat-3 the combined branch.
    fn scenario_repo() -> TempDir {
        let tmp = TempDir::new().unwrap();
        init_repo(tmp.path());
        commit_file(tmp.path(), "base.txt", "base", "base commit");
        create_branch(tmp.path(), "feat-1");
        commit_file(
            tmp.path(),
            "one.txt",
            "one",
            "Add parser\n\nFirst slice of the feature.",
        );
        create_branch(tmp.path(), "feat-2");
        commit_file(tmp.path(), "two.txt", "two", "Add codegen");
        create_branch(tmp.path(), "feat-3");
        commit_file(tmp.path(), "three.txt", "three", "combined tip");
        checkout(tmp.path(), "feat-1").unwrap();
        tmp
    }

    fn scenario_train() -> Train {
        let mut combined = BranchRef::new("feat-3", 2);
        combined.is_combined = true;
        Train::new(
            "big-feature",
            vec![
                BranchRef::new("feat-1", 0),
                BranchRef::new("feat-2", 1),
                combined,
            ],
        )
    }

    fn options() -> SyncOptions {
        SyncOptions {
            stable_branch: "master".to_string(),
            draft: false,
            combined_title: Some("Whole feature".to_string()),
            reviewers: Vec::new(),
            range: None,
        }
    }

    #[tokio::test]
    async fn round_trip_creates_one_pr_per_branch() {
        let repo = scenario_repo();
        let host = FakeHost::default();
        let train = scenario_train();

        let directory = sync_train(&host, repo.path(), &train, &options())
            .await
            .unwrap();

        assert_eq!(directory.len(), 3);
        assert_eq!(host.pr_count(), 3);

        let pr1 = host.pr_for("feat-1");
        let pr2 = host.pr_for("feat-2");
        let pr3 = host.pr_for("feat-3");

        assert_eq!(pr1.number, PrNumber(101));
        assert_eq!(pr2.number, PrNumber(102));
        assert_eq!(pr3.number, PrNumber(103));

        // Base resolution: stable for the first and the combined branch.
        assert_eq!(pr1.base, "master");
        assert_eq!(pr2.base, "feat-1");
        assert_eq!(pr3.base, "master");

        // Titles: tip commit first line, user-supplied for combined.
        assert_eq!(pr1.title, "Add parser");
        assert_eq!(pr2.title, "Add codegen");
        assert_eq!(pr3.title, "Whole feature");

        // Every body carries exactly one navigation block listing all three.
        for pr in [&pr1, &pr2, &pr3] {
            assert_eq!(pr.body.matches(TOC_START).count(), 1);
            assert_eq!(pr.body.matches(TOC_END).count(), 1);
            for number in ["#101", "#102", "#103"] {
                assert!(pr.body.contains(number), "{} missing {}", pr.head, number);
            }
            assert!(pr.body.contains("[combined branch] Whole feature"));
        }

        // Each PR's own entry is marked as current.
        assert!(pr1.body.contains("👉 #101 Add parser **YOU ARE HERE**"));
        assert!(pr2.body.contains("👉 #102 Add codegen **YOU ARE HERE**"));
        assert!(
            pr3.body
                .contains("👉 #103 [combined branch] Whole feature **YOU ARE HERE**")
        );

        // The non-combined body keeps the commit message remainder.
        assert!(pr1.body.starts_with("First slice of the feature."));
    }

    #[tokio::test]
    async fn rerun_creates_nothing_and_never_duplicates_navigation() {
        let repo = scenario_repo();
        let host = FakeHost::default();
        let train = scenario_train();
        let opts = options();

        sync_train(&host, repo.path(), &train, &opts).await.unwrap();
        let bodies_after_first: Vec<String> = ["feat-1", "feat-2", "feat-3"]
            .iter()
            .map(|b| host.pr_for(b).body)
            .collect();

        let directory = sync_train(&host, repo.path(), &train, &opts).await.unwrap();

        assert_eq!(host.pr_count(), 3, "re-run must not create new PRs");
        assert!(directory.iter().all(|r| r.status == PrStatus::Existing));
        for (branch, before) in ["feat-1", "feat-2", "feat-3"].iter().zip(bodies_after_first) {
            let after = host.pr_for(branch).body;
            assert_eq!(after, before, "{} body changed on identical re-run", branch);
            assert_eq!(after.matches(TOC_START).count(), 1);
        }
    }

    #[tokio::test]
    async fn existing_pr_keeps_remote_title_and_body() {
        let repo = scenario_repo();
        let host = FakeHost::default();
        host.seed(
            "feat-1",
            "Hand-tuned title",
            "Hand-written description.",
            "master",
        );
        let train = scenario_train();

        sync_train(&host, repo.path(), &train, &options())
            .await
            .unwrap();

        let pr1 = host.pr_for("feat-1");
        // Local recomputation is discarded for existing PRs.
        assert_eq!(pr1.title, "Hand-tuned title");
        assert!(pr1.body.starts_with("Hand-written description."));
        assert!(pr1.body.contains(TOC_START));
    }

    #[tokio::test]
    async fn create_failure_aborts_before_any_update() {
        let repo = scenario_repo();
        let host = FakeHost::default();
        host.state.lock().unwrap().fail_create_for = Some("feat-2".to_string());
        let train = scenario_train();

        let err = sync_train(&host, repo.path(), &train, &options())
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Api(_)));
        // Pass 2 never ran: no PR body was touched.
        assert_eq!(host.update_calls(), 0);
    }

    #[tokio::test]
    async fn range_limits_which_prs_are_created() {
        let repo = scenario_repo();
        let host = FakeHost::default();
        let train = scenario_train();
        let mut opts = options();
        opts.range = Some(0..2);

        let directory = sync_train(&host, repo.path(), &train, &opts).await.unwrap();

        assert_eq!(host.pr_count(), 2);
        assert!(directory.get("feat-3").is_none());

        // Navigation covers exactly the PRs that exist.
        let pr1 = host.pr_for("feat-1");
        assert!(pr1.body.contains("#101"));
        assert!(pr1.body.contains("#102"));
        assert!(!pr1.body.contains("#103"));
    }

    #[tokio::test]
    async fn out_of_range_existing_pr_still_appears_in_navigation() {
        let repo = scenario_repo();
        let host = FakeHost::default();
        let seeded = host.seed("feat-3", "Whole feature", "", "master");
        let train = scenario_train();
        let mut opts = options();
        opts.range = Some(0..2);

        sync_train(&host, repo.path(), &train, &opts).await.unwrap();

        let pr1 = host.pr_for("feat-1");
        assert!(pr1.body.contains(&seeded.to_string()));
        // The out-of-range PR itself was not rewritten.
        assert_eq!(host.pr_for("feat-3").body, "");
    }

    #[tokio::test]
    async fn reviewers_are_requested_on_every_pr() {
        let repo = scenario_repo();
        let host = FakeHost::default();
        let train = scenario_train();
        let mut opts = options();
        opts.reviewers = vec!["alice".to_string(), "bob".to_string()];

        sync_train(&host, repo.path(), &train, &opts).await.unwrap();

        for branch in ["feat-1", "feat-2", "feat-3"] {
            assert_eq!(host.pr_for(branch).reviewers, opts.reviewers);
        }
    }
}

//! Local git operations.
//!
//! Everything here shells out to `git` with a clean environment (no system or
//! user config) so behavior is reproducible across machines. Operations run
//! in the user's working tree, so multi-step commands must acquire the
//! working branch through [`WorkingBranchGuard`] to guarantee the user's
//! checkout is restored on every exit path.

pub mod combine;
pub mod push;

pub use combine::{Strategy, combine};
pub use push::{push, unmerged_branches};

use std::path::{Path, PathBuf};
use std::process::Output;

use thiserror::Error;

use crate::error::PreconditionError;
use crate::types::{RepoId, Sha};

/// Errors from git operations.
#[derive(Debug, Error)]
pub enum GitError {
    /// Git command failed.
    #[error("git command failed: {command}\nstderr: {stderr}")]
    CommandFailed { command: String, stderr: String },

    /// Merge or rebase conflict. Never resolved automatically; the user must
    /// fix it manually and re-run.
    #[error("conflict while updating '{branch}': {}", conflicting_files.join(", "))]
    MergeConflict {
        branch: String,
        conflicting_files: Vec<String>,
    },

    /// IO error spawning git.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for git operations.
pub type GitResult<T> = Result<T, GitError>;

/// Create a git Command with clean environment (no system/user config).
///
/// This ensures consistent behavior across different machines by ignoring
/// system and user git configuration (e.g., rerere, hooks, aliases).
pub(crate) fn git_command(workdir: &Path) -> std::process::Command {
    use std::process::Command;

    let mut cmd = Command::new("git");
    cmd.current_dir(workdir);

    cmd.env("GIT_CONFIG_NOSYSTEM", "1");
    cmd.env("GIT_CONFIG_GLOBAL", "/dev/null");

    // Disable terminal prompts
    cmd.env("GIT_TERMINAL_PROMPT", "0");

    cmd
}

/// Run a git command in the given working directory.
///
/// Returns the command output on success, or a GitError on failure.
pub fn run_git(workdir: &Path, args: &[&str]) -> GitResult<Output> {
    let output = git_command(workdir).args(args).output()?;

    if output.status.success() {
        Ok(output)
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();
        let command = format!("git {}", args.join(" "));
        Err(GitError::CommandFailed { command, stderr })
    }
}

/// Run a git command and return stdout as a trimmed string.
pub fn run_git_stdout(workdir: &Path, args: &[&str]) -> GitResult<String> {
    let output = run_git(workdir, args)?;
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Check if one revision is an ancestor of another. Pure query, no side
/// effects.
pub fn is_ancestor(workdir: &Path, potential_ancestor: &str, descendant: &str) -> GitResult<bool> {
    let output = git_command(workdir)
        .args(["merge-base", "--is-ancestor", potential_ancestor, descendant])
        .output()?;

    // Exit 0 = is ancestor, exit 1 = not ancestor, other = error
    match output.status.code() {
        Some(0) => Ok(true),
        Some(1) => Ok(false),
        _ => {
            let stderr = String::from_utf8_lossy(&output.stderr).to_string();
            Err(GitError::CommandFailed {
                command: format!(
                    "git merge-base --is-ancestor {} {}",
                    potential_ancestor, descendant
                ),
                stderr,
            })
        }
    }
}

/// Get the SHA of a revision.
pub fn rev_parse(workdir: &Path, rev: &str) -> GitResult<Sha> {
    Ok(Sha::new(run_git_stdout(workdir, &["rev-parse", rev])?))
}

/// The name of the currently checked-out branch.
pub fn current_branch(workdir: &Path) -> GitResult<String> {
    run_git_stdout(workdir, &["rev-parse", "--abbrev-ref", "HEAD"])
}

/// Checkout a branch.
pub fn checkout(workdir: &Path, branch: &str) -> GitResult<()> {
    run_git(workdir, &["checkout", branch])?;
    Ok(())
}

/// The full commit message of a branch's tip commit.
///
/// Returns `(title, body)`: the first line and the remainder, both trimmed.
pub fn tip_message(workdir: &Path, branch: &str) -> GitResult<(String, String)> {
    let message = run_git_stdout(workdir, &["log", "-1", "--format=%B", branch])?;
    let mut lines = message.lines();
    let title = lines.next().unwrap_or("").trim().to_string();
    let body = lines.collect::<Vec<_>>().join("\n").trim().to_string();
    Ok((title, body))
}

/// The repository root for the current directory, or a precondition error if
/// we are not inside a git repository.
pub fn repo_root() -> Result<PathBuf, PreconditionError> {
    let cwd = Path::new(".");
    run_git_stdout(cwd, &["rev-parse", "--show-toplevel"])
        .map(PathBuf::from)
        .map_err(|_| PreconditionError::NotARepository)
}

/// The URL configured for the given remote.
pub fn remote_url(workdir: &Path, remote: &str) -> GitResult<String> {
    run_git_stdout(workdir, &["remote", "get-url", remote])
}

/// Parse a GitHub remote URL into owner/repo.
///
/// Handles the two shapes git produces:
/// - `git@github.com:owner/repo.git`
/// - `https://github.com/owner/repo.git`
pub fn parse_remote_url(url: &str) -> Option<RepoId> {
    let path = if let Some(rest) = url.strip_prefix("git@") {
        rest.split_once(':')?.1
    } else if url.starts_with("https://") || url.starts_with("http://") || url.starts_with("ssh://")
    {
        // Everything after the host segment.
        let without_scheme = url.split_once("://")?.1;
        without_scheme.split_once('/')?.1
    } else {
        return None;
    };

    let path = path.trim_end_matches('/').trim_end_matches(".git");
    let (owner, repo) = path.split_once('/')?;
    if owner.is_empty() || repo.is_empty() || repo.contains('/') {
        return None;
    }
    Some(RepoId::new(owner, repo))
}

/// Scoped ownership of the working branch (git HEAD).
///
/// Records the branch checked out at acquisition and restores it on drop.
/// A conflicted combine calls [`leave_in_place`](Self::leave_in_place) so the
/// user stays on the conflicted branch to resolve it manually.
#[derive(Debug)]
pub struct WorkingBranchGuard {
    workdir: PathBuf,
    original: String,
    restore: bool,
}

impl WorkingBranchGuard {
    /// Records the current branch so it can be restored later.
    pub fn acquire(workdir: &Path) -> GitResult<Self> {
        let original = current_branch(workdir)?;
        Ok(WorkingBranchGuard {
            workdir: workdir.to_path_buf(),
            original,
            restore: true,
        })
    }

    /// The branch that was checked out when the guard was acquired.
    pub fn original(&self) -> &str {
        &self.original
    }

    /// Skip restoration, leaving HEAD wherever the last operation put it.
    pub fn leave_in_place(&mut self) {
        self.restore = false;
    }
}

impl Drop for WorkingBranchGuard {
    fn drop(&mut self) {
        if !self.restore {
            return;
        }
        if let Err(e) = checkout(&self.workdir, &self.original) {
            tracing::warn!(
                branch = %self.original,
                error = %e,
                "failed to restore original branch"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{commit_file, create_branch, init_repo};
    use tempfile::TempDir;

    #[test]
    fn is_ancestor_detects_linear_history() {
        let tmp = TempDir::new().unwrap();
        init_repo(tmp.path());
        commit_file(tmp.path(), "a.txt", "a", "first");
        let first = rev_parse(tmp.path(), "HEAD").unwrap();
        commit_file(tmp.path(), "b.txt", "b", "second");

        assert!(is_ancestor(tmp.path(), first.as_str(), "HEAD").unwrap());
        assert!(!is_ancestor(tmp.path(), "HEAD", first.as_str()).unwrap());
    }

    #[test]
    fn is_ancestor_works_on_branch_names() {
        let tmp = TempDir::new().unwrap();
        init_repo(tmp.path());
        commit_file(tmp.path(), "a.txt", "a", "first");
        create_branch(tmp.path(), "feature");
        commit_file(tmp.path(), "b.txt", "b", "feature work");
        checkout(tmp.path(), "master").unwrap();

        assert!(is_ancestor(tmp.path(), "master", "feature").unwrap());
        assert!(!is_ancestor(tmp.path(), "feature", "master").unwrap());
    }

    #[test]
    fn tip_message_splits_title_and_body() {
        let tmp = TempDir::new().unwrap();
        init_repo(tmp.path());
        commit_file(
            tmp.path(),
            "a.txt",
            "a",
            "Add a parser\n\nHandles the simple cases.\nMore to come.",
        );

        let (title, body) = tip_message(tmp.path(), "master").unwrap();
        assert_eq!(title, "Add a parser");
        assert_eq!(body, "Handles the simple cases.\nMore to come.");
    }

    #[test]
    fn tip_message_single_line() {
        let tmp = TempDir::new().unwrap();
        init_repo(tmp.path());
        commit_file(tmp.path(), "a.txt", "a", "Just a title");

        let (title, body) = tip_message(tmp.path(), "master").unwrap();
        assert_eq!(title, "Just a title");
        assert_eq!(body, "");
    }

    #[test]
    fn guard_restores_original_branch() {
        let tmp = TempDir::new().unwrap();
        init_repo(tmp.path());
        commit_file(tmp.path(), "a.txt", "a", "first");
        create_branch(tmp.path(), "feature");
        checkout(tmp.path(), "master").unwrap();

        {
            let _guard = WorkingBranchGuard::acquire(tmp.path()).unwrap();
            checkout(tmp.path(), "feature").unwrap();
        }
        assert_eq!(current_branch(tmp.path()).unwrap(), "master");
    }

    #[test]
    fn guard_leave_in_place_skips_restore() {
        let tmp = TempDir::new().unwrap();
        init_repo(tmp.path());
        commit_file(tmp.path(), "a.txt", "a", "first");
        create_branch(tmp.path(), "feature");
        checkout(tmp.path(), "master").unwrap();

        {
            let mut guard = WorkingBranchGuard::acquire(tmp.path()).unwrap();
            checkout(tmp.path(), "feature").unwrap();
            guard.leave_in_place();
        }
        assert_eq!(current_branch(tmp.path()).unwrap(), "feature");
    }

    mod remote_url_parsing {
        use super::*;

        #[test]
        fn ssh_form() {
            let id = parse_remote_url("git@github.com:acme/widgets.git").unwrap();
            assert_eq!(id, RepoId::new("acme", "widgets"));
        }

        #[test]
        fn https_form() {
            let id = parse_remote_url("https://github.com/acme/widgets.git").unwrap();
            assert_eq!(id, RepoId::new("acme", "widgets"));
        }

        #[test]
        fn https_without_git_suffix() {
            let id = parse_remote_url("https://github.com/acme/widgets").unwrap();
            assert_eq!(id, RepoId::new("acme", "widgets"));
        }

        #[test]
        fn rejects_garbage() {
            assert!(parse_remote_url("not-a-url").is_none());
            assert!(parse_remote_url("https://github.com/justowner").is_none());
            assert!(parse_remote_url("git@github.com:nopath").is_none());
        }
    }
}

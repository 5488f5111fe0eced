//! Checkout-and-combine: incorporate one branch into the next via merge or
//! rebase.
//!
//! Failures are classified explicitly before deciding what to do with them:
//! a reported conflict list is fatal (the user resolves it manually), while
//! a failure without one is treated as transient lock contention and retried
//! exactly once after a fixed delay. The retry deliberately covers any
//! non-conflict failure, matching the long-standing behavior of the tool.

use std::path::Path;
use std::time::Duration;

use super::{GitError, GitResult, git_command, run_git_stdout};

/// Delay before the single retry of a combine that failed without a
/// conflict list.
pub const COMBINE_RETRY_DELAY: Duration = Duration::from_secs(1);

/// How one branch's changes are propagated into the next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// `git merge --no-edit <from>`: creates a merge commit.
    Merge,
    /// `git rebase <from>`: rewrites the target branch's history atop `from`.
    Rebase,
}

impl Strategy {
    /// The verb for log output.
    pub fn verb(&self) -> &'static str {
        match self {
            Strategy::Merge => "merge",
            Strategy::Rebase => "rebase",
        }
    }
}

/// How a single combine attempt failed.
enum CombineFailure {
    /// A conflict list was reported. Fatal; never retried.
    Conflict { conflicting_files: Vec<String> },
    /// Anything else (classically, git's index lock still being held).
    Unknown { command: String, stderr: String },
}

/// Checks out `to` and incorporates `from` using the given strategy.
///
/// A conflict is returned as [`GitError::MergeConflict`], leaving the
/// repository mid-merge (or mid-rebase) for manual resolution. A failure
/// with no conflict list is retried once after [`COMBINE_RETRY_DELAY`].
pub fn combine(workdir: &Path, from: &str, to: &str, strategy: Strategy) -> GitResult<()> {
    match attempt(workdir, from, to, strategy) {
        Ok(()) => Ok(()),
        Err(CombineFailure::Conflict { conflicting_files }) => Err(GitError::MergeConflict {
            branch: to.to_string(),
            conflicting_files,
        }),
        Err(CombineFailure::Unknown { command, stderr }) => {
            tracing::warn!(
                %command,
                %stderr,
                delay_ms = COMBINE_RETRY_DELAY.as_millis() as u64,
                "combine failed without a conflict list; retrying once"
            );
            std::thread::sleep(COMBINE_RETRY_DELAY);
            match attempt(workdir, from, to, strategy) {
                Ok(()) => Ok(()),
                Err(CombineFailure::Conflict { conflicting_files }) => {
                    Err(GitError::MergeConflict {
                        branch: to.to_string(),
                        conflicting_files,
                    })
                }
                Err(CombineFailure::Unknown { command, stderr }) => {
                    Err(GitError::CommandFailed { command, stderr })
                }
            }
        }
    }
}

/// One checkout + merge/rebase attempt.
fn attempt(workdir: &Path, from: &str, to: &str, strategy: Strategy) -> Result<(), CombineFailure> {
    run_classified(workdir, &["checkout", to])?;
    let args: &[&str] = match strategy {
        Strategy::Merge => &["merge", "--no-edit", from],
        Strategy::Rebase => &["rebase", from],
    };
    run_classified(workdir, args)
}

/// Runs a git command, classifying failure as conflict vs unknown.
fn run_classified(workdir: &Path, args: &[&str]) -> Result<(), CombineFailure> {
    let output = git_command(workdir)
        .args(args)
        .output()
        .map_err(|e| CombineFailure::Unknown {
            command: format!("git {}", args.join(" ")),
            stderr: e.to_string(),
        })?;

    if output.status.success() {
        return Ok(());
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);

    // git reports merge conflicts on stdout and rebase conflicts on stderr.
    let combined = format!("{}{}", stdout, stderr);
    if combined.contains("CONFLICT")
        || combined.contains("Automatic merge failed")
        || combined.contains("could not apply")
    {
        let conflicting_files = conflicting_files(workdir);
        return Err(CombineFailure::Conflict { conflicting_files });
    }

    Err(CombineFailure::Unknown {
        command: format!("git {}", args.join(" ")),
        stderr: stderr.to_string(),
    })
}

/// The list of files with merge conflicts, best effort.
fn conflicting_files(workdir: &Path) -> Vec<String> {
    // git diff --name-only --diff-filter=U lists unmerged files
    match run_git_stdout(workdir, &["diff", "--name-only", "--diff-filter=U"]) {
        Ok(output) => output.lines().map(|s| s.to_string()).collect(),
        Err(_) => Vec::new(),
    }
}

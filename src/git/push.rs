//! Pushing train branches and merged-branch filtering.

use std::path::Path;

use super::{GitResult, run_git, run_git_stdout};

/// Pushes the given branches to `remote` in a single `git push` call.
///
/// An empty branch list is a no-op. `force` adds `--force` (reflowed
/// branches routinely rewrite history, so forced pushes are expected).
pub fn push(workdir: &Path, branches: &[&str], force: bool, remote: &str) -> GitResult<()> {
    if branches.is_empty() {
        return Ok(());
    }

    let mut args = vec!["push", remote];
    args.extend_from_slice(branches);
    if force {
        args.push("--force");
    }
    run_git(workdir, &args)?;
    Ok(())
}

/// Branches already merged into `stable_branch`, per git's merged listing.
fn merged_branches(workdir: &Path, stable_branch: &str) -> GitResult<Vec<String>> {
    let output = run_git_stdout(
        workdir,
        &[
            "branch",
            "--merged",
            stable_branch,
            "--format=%(refname:short)",
        ],
    )?;
    Ok(output
        .lines()
        .map(|line| line.trim().to_string())
        .filter(|line| !line.is_empty())
        .collect())
}

/// The subset of `branches` not yet merged into `stable_branch`, in the
/// original order.
pub fn unmerged_branches(
    workdir: &Path,
    branches: &[&str],
    stable_branch: &str,
) -> GitResult<Vec<String>> {
    let merged = merged_branches(workdir, stable_branch)?;
    Ok(branches
        .iter()
        .filter(|b| !merged.iter().any(|m| m == *b))
        .map(|b| b.to_string())
        .collect())
}

//! Shared helpers for tests that need real git repositories.

use std::path::{Path, PathBuf};

use crate::git::run_git;

/// Initializes a repository with a `master` branch and a local identity, so
/// commits work with the global/system git config disabled.
pub fn init_repo(dir: &Path) {
    run_git(dir, &["init", "--initial-branch=master"]).unwrap();
    run_git(dir, &["config", "user.name", "Test"]).unwrap();
    run_git(dir, &["config", "user.email", "test@test.invalid"]).unwrap();
}

/// Writes a file and commits it with the given message.
pub fn commit_file(dir: &Path, name: &str, content: &str, message: &str) {
    std::fs::write(dir.join(name), content).unwrap();
    run_git(dir, &["add", name]).unwrap();
    run_git(dir, &["commit", "-m", message]).unwrap();
}

/// Creates a branch at the current HEAD and checks it out.
pub fn create_branch(dir: &Path, name: &str) {
    run_git(dir, &["checkout", "-b", name]).unwrap();
}

/// Creates a bare repository next to `work` and wires it up as `origin`.
///
/// Returns the path to the bare repository.
pub fn init_bare_remote(base: &Path, work: &Path) -> PathBuf {
    let remote = base.join("remote.git");
    std::fs::create_dir_all(&remote).unwrap();
    run_git(&remote, &["init", "--bare", "--initial-branch=master"]).unwrap();
    run_git(
        work,
        &["remote", "add", "origin", remote.to_str().unwrap()],
    )
    .unwrap();
    remote
}

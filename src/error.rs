//! Top-level error taxonomy and process exit codes.
//!
//! Every pipeline stage propagates failures upward; nothing is swallowed.
//! Each condition family maps to a distinct non-zero exit code so shell
//! callers can distinguish misconfiguration from git failures from remote
//! API failures.

use std::path::PathBuf;

use thiserror::Error;

use crate::config::ConfigError;
use crate::git::GitError;
use crate::github::ApiError;

/// Fatal preconditions checked before any pipeline stage runs.
#[derive(Debug, Error)]
pub enum PreconditionError {
    /// The current directory is not inside a git repository.
    #[error("not a git repository (or any parent up to filesystem root)")]
    NotARepository,

    /// The current branch is not part of any configured train.
    #[error("branch '{branch}' is not part of any configured train")]
    BranchNotInTrain { branch: String },

    /// The per-user GitHub token file is missing or empty.
    #[error("missing GitHub token file at {path}; put a single access token line there")]
    MissingTokenFile { path: PathBuf },

    /// The configured remote URL does not look like a GitHub repository.
    #[error("cannot parse owner/repo from remote URL '{url}'")]
    UnparseableRemoteUrl { url: String },

    /// A branch selector did not resolve to a branch of the current train.
    #[error("no branch at '{selector}' in train '{train}' ({len} branches)")]
    BranchNotFound {
        selector: String,
        train: String,
        len: usize,
    },
}

impl PreconditionError {
    /// A distinct exit code per precondition.
    fn exit_code(&self) -> i32 {
        match self {
            PreconditionError::NotARepository => 3,
            PreconditionError::BranchNotInTrain { .. } => 4,
            PreconditionError::MissingTokenFile { .. } => 5,
            PreconditionError::UnparseableRemoteUrl { .. } => 6,
            PreconditionError::BranchNotFound { .. } => 7,
        }
    }
}

/// Any failure the binary can terminate with.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Precondition(#[from] PreconditionError),

    #[error(transparent)]
    Git(#[from] GitError),

    #[error(transparent)]
    Api(#[from] ApiError),

    /// Malformed CLI input (e.g., an unparseable branch range).
    #[error("{0}")]
    Usage(String),
}

impl Error {
    /// The process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Config(_) => 2,
            Error::Precondition(e) => e.exit_code(),
            Error::Git(_) => 8,
            Error::Api(_) => 9,
            Error::Usage(_) => 64,
        }
    }
}

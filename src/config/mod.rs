//! Train configuration loading.
//!
//! The configuration lives in `.pr-train.yml` at the repository root and maps
//! train names to ordered branch lists. A branch entry is either a bare name
//! or a name with options:
//!
//! ```yaml
//! trains:
//!   big-feature:
//!     - feat-1
//!     - feat-2
//!     - feat-3:
//!         combined: true
//!         initSha: 0a1b2c3d
//! ```
//!
//! Heterogeneous entry shapes are resolved into the uniform [`BranchEntry`]
//! variant once at load time; nothing downstream branches on the raw YAML
//! shape again.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::error::PreconditionError;
use crate::types::{BranchRef, Sha, Train};

/// File name of the train configuration, relative to the repository root.
pub const CONFIG_FILE_NAME: &str = ".pr-train.yml";

/// File name of the per-user GitHub token file, relative to the home directory.
pub const TOKEN_FILE_NAME: &str = ".pr-train-token";

/// Errors from configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file does not exist.
    #[error("no {CONFIG_FILE_NAME} found at {path}; create one to define your trains")]
    Missing { path: PathBuf },

    /// The configuration file could not be read.
    #[error("failed to read {path}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid YAML for the expected schema.
    #[error("malformed {CONFIG_FILE_NAME}: {0}")]
    Malformed(#[from] serde_yaml::Error),

    /// A branch entry with options did not have exactly one branch name key.
    #[error("train '{train}': branch entry must have exactly one branch name")]
    AmbiguousEntry { train: String },

    /// More than one branch in a train is flagged combined.
    #[error("train '{train}': more than one branch is marked combined")]
    MultipleCombined { train: String },

    /// The combined branch is not the last entry of its train.
    #[error("train '{train}': combined branch '{branch}' must be the last entry")]
    CombinedNotLast { train: String, branch: String },
}

/// Per-branch options in the configuration file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct BranchOptions {
    /// True if this branch accumulates the whole train's changes.
    #[serde(default)]
    pub combined: bool,

    /// The commit the branch was created from. Informational only.
    #[serde(default)]
    pub init_sha: Option<String>,
}

/// Raw YAML shape of one branch entry: a bare name or a single-key map of
/// name to options.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawEntry {
    Simple(String),
    WithOptions(BTreeMap<String, BranchOptions>),
}

/// A branch entry resolved to a uniform tagged shape.
#[derive(Debug, Clone, PartialEq)]
pub enum BranchEntry {
    Simple(String),
    WithOptions {
        name: String,
        combined: bool,
        init_sha: Option<String>,
    },
}

impl BranchEntry {
    pub fn name(&self) -> &str {
        match self {
            BranchEntry::Simple(name) => name,
            BranchEntry::WithOptions { name, .. } => name,
        }
    }

    fn is_combined(&self) -> bool {
        matches!(self, BranchEntry::WithOptions { combined: true, .. })
    }

    fn into_branch_ref(self, index: usize) -> BranchRef {
        match self {
            BranchEntry::Simple(name) => BranchRef {
                name,
                index,
                is_combined: false,
                init_sha: None,
            },
            BranchEntry::WithOptions {
                name,
                combined,
                init_sha,
            } => BranchRef {
                name,
                index,
                is_combined: combined,
                init_sha: init_sha.map(Sha::new),
            },
        }
    }
}

/// Top-level shape of `.pr-train.yml`.
#[derive(Debug, Deserialize)]
struct RawConfig {
    trains: BTreeMap<String, Vec<RawEntry>>,
}

/// The loaded train configuration.
#[derive(Debug, Clone)]
pub struct TrainConfig {
    trains: Vec<Train>,
}

impl TrainConfig {
    /// Loads and validates the configuration from the repository root.
    pub fn load(repo_root: &Path) -> Result<Self, ConfigError> {
        let path = repo_root.join(CONFIG_FILE_NAME);
        if !path.exists() {
            return Err(ConfigError::Missing { path });
        }
        let text = std::fs::read_to_string(&path)
            .map_err(|source| ConfigError::Unreadable { path, source })?;
        Self::parse(&text)
    }

    /// Parses and validates configuration text.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let raw: RawConfig = serde_yaml::from_str(text)?;
        let mut trains = Vec::with_capacity(raw.trains.len());
        for (train_name, entries) in raw.trains {
            let resolved = resolve_entries(&train_name, entries)?;
            validate_combined(&train_name, &resolved)?;
            let branches = resolved
                .into_iter()
                .enumerate()
                .map(|(i, entry)| entry.into_branch_ref(i))
                .collect();
            trains.push(Train::new(train_name, branches));
        }
        Ok(TrainConfig { trains })
    }

    /// All configured trains.
    pub fn trains(&self) -> &[Train] {
        &self.trains
    }

    /// The train containing the given branch, or a precondition error if the
    /// branch is not part of any configured train.
    pub fn train_for_branch(&self, branch: &str) -> Result<&Train, PreconditionError> {
        self.trains
            .iter()
            .find(|t| t.contains(branch))
            .ok_or_else(|| PreconditionError::BranchNotInTrain {
                branch: branch.to_string(),
            })
    }
}

/// Resolves raw YAML entries to the uniform tagged shape.
fn resolve_entries(
    train_name: &str,
    entries: Vec<RawEntry>,
) -> Result<Vec<BranchEntry>, ConfigError> {
    entries
        .into_iter()
        .map(|raw| match raw {
            RawEntry::Simple(name) => Ok(BranchEntry::Simple(name)),
            RawEntry::WithOptions(map) => {
                if map.len() != 1 {
                    return Err(ConfigError::AmbiguousEntry {
                        train: train_name.to_string(),
                    });
                }
                let (name, options) = map.into_iter().next().expect("len checked above");
                Ok(BranchEntry::WithOptions {
                    name,
                    combined: options.combined,
                    init_sha: options.init_sha,
                })
            }
        })
        .collect()
}

/// Validates the combined-branch invariants: at most one, and last.
fn validate_combined(train_name: &str, entries: &[BranchEntry]) -> Result<(), ConfigError> {
    let combined_count = entries.iter().filter(|e| e.is_combined()).count();
    if combined_count > 1 {
        return Err(ConfigError::MultipleCombined {
            train: train_name.to_string(),
        });
    }
    if let Some(entry) = entries.iter().rev().skip(1).find(|e| e.is_combined()) {
        return Err(ConfigError::CombinedNotLast {
            train: train_name.to_string(),
            branch: entry.name().to_string(),
        });
    }
    Ok(())
}

/// Reads the GitHub access token from the per-user token file.
///
/// The file contains a single line with the token; surrounding whitespace is
/// trimmed. Its absence is a fatal precondition for PR commands.
pub fn github_token() -> Result<String, PreconditionError> {
    let path = dirs::home_dir()
        .map(|home| home.join(TOKEN_FILE_NAME))
        .unwrap_or_else(|| PathBuf::from(TOKEN_FILE_NAME));
    let text = std::fs::read_to_string(&path)
        .map_err(|_| PreconditionError::MissingTokenFile { path: path.clone() })?;
    let token = text.trim().to_string();
    if token.is_empty() {
        return Err(PreconditionError::MissingTokenFile { path });
    }
    Ok(token)
}

//! pr-train - manage a train of dependent branches and their linked GitHub PRs.
//!
//! This library provides the train data model, the reflow engine, and the
//! idempotent PR synchronizer behind the `git-pr-train` binary.

pub mod commands;
pub mod config;
pub mod error;
pub mod git;
pub mod github;
pub mod nav;
pub mod reflow;
pub mod sync;
pub mod types;

#[cfg(test)]
pub mod test_utils;

//! Core domain types for the PR train.

mod ids;
mod train;

pub use ids::{PrNumber, RepoId, Sha};
pub use train::{BranchRef, BranchSelector, Train};

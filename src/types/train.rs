//! The branch-train data model.
//!
//! A train is an ordered chain of dependent branches, from the branch closest
//! to the stable branch up to the tip. The optional combined branch
//! accumulates the whole train's changes and is always the last element.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::ids::Sha;

/// A single branch within a train.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchRef {
    /// The branch name, unique within the train.
    pub name: String,

    /// Position within the train (0 = closest to the stable branch).
    pub index: usize,

    /// True if this is the combined branch accumulating the whole train.
    pub is_combined: bool,

    /// The commit the branch was originally created from. Informational only;
    /// no logic depends on it.
    pub init_sha: Option<Sha>,
}

impl BranchRef {
    pub fn new(name: impl Into<String>, index: usize) -> Self {
        BranchRef {
            name: name.into(),
            index,
            is_combined: false,
            init_sha: None,
        }
    }
}

impl fmt::Display for BranchRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Selects a branch within a train: either by position or the literal
/// combined branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BranchSelector {
    Index(usize),
    Combined,
}

impl BranchSelector {
    /// Parses a selector from CLI input: a decimal index or the literal
    /// `combined`.
    pub fn parse(s: &str) -> Option<Self> {
        if s.eq_ignore_ascii_case("combined") {
            return Some(BranchSelector::Combined);
        }
        s.parse().ok().map(BranchSelector::Index)
    }
}

impl fmt::Display for BranchSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BranchSelector::Index(i) => write!(f, "{}", i),
            BranchSelector::Combined => write!(f, "combined"),
        }
    }
}

/// An ordered chain of dependent branches.
///
/// INVARIANTS (enforced at construction from config):
/// - Branch indices are 0..N-1 with no gaps, matching vector positions.
/// - At most one branch is combined, and it is the last element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Train {
    /// The train's name in the configuration file.
    pub name: String,

    /// Branches in dependency order, stable side first.
    branches: Vec<BranchRef>,
}

impl Train {
    /// Creates a train from branches already in dependency order.
    ///
    /// Indices are (re)assigned from vector positions, so callers only need
    /// to supply the order.
    pub fn new(name: impl Into<String>, mut branches: Vec<BranchRef>) -> Self {
        for (i, branch) in branches.iter_mut().enumerate() {
            branch.index = i;
        }
        Train {
            name: name.into(),
            branches,
        }
    }

    /// All branches in train order.
    pub fn branches(&self) -> &[BranchRef] {
        &self.branches
    }

    pub fn len(&self) -> usize {
        self.branches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.branches.is_empty()
    }

    /// The combined branch, if the train has one.
    pub fn combined(&self) -> Option<&BranchRef> {
        self.branches.iter().find(|b| b.is_combined)
    }

    /// Looks up a branch by selector. `None` if the index is out of range or
    /// `combined` was requested on a train without a combined branch.
    pub fn branch_at(&self, selector: &BranchSelector) -> Option<&BranchRef> {
        match selector {
            BranchSelector::Index(i) => self.branches.get(*i),
            BranchSelector::Combined => self.combined(),
        }
    }

    /// Position of a branch by name.
    pub fn position_of(&self, name: &str) -> Option<usize> {
        self.branches.iter().position(|b| b.name == name)
    }

    /// True if the named branch is part of this train.
    pub fn contains(&self, name: &str) -> bool {
        self.position_of(name).is_some()
    }

    /// The base branch for the branch at `index`.
    ///
    /// The first branch and the combined branch sit on the stable branch;
    /// every other branch sits on its predecessor.
    pub fn base_of<'a>(&'a self, index: usize, stable_branch: &'a str) -> &'a str {
        let branch = &self.branches[index];
        if index == 0 || branch.is_combined {
            stable_branch
        } else {
            &self.branches[index - 1].name
        }
    }
}

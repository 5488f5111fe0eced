//! The reflow engine: propagate changes downstream through the train.
//!
//! Walks the branch sequence pairwise from the stable side toward the tip,
//! combining each branch into its successor. Pairs already in ancestor
//! relation are skipped, which makes re-running the engine after a conflict
//! (or for no reason at all) idempotent.
//!
//! Execution is strictly sequential. Every step checks out a branch and
//! mutates the shared index and HEAD, so concurrent steps would corrupt the
//! working tree.

use std::path::Path;
use std::time::Duration;

use crate::git::{self, GitError, GitResult, Strategy, WorkingBranchGuard};
use crate::types::Train;

/// Pause after each combine so git can release its index lock before the
/// next checkout.
pub const SETTLE_DELAY: Duration = Duration::from_millis(500);

/// What happened to one branch pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// The upstream branch was already an ancestor of the downstream one.
    Skipped,
    /// The upstream branch was combined into the downstream one.
    Combined,
}

/// The processed branch pairs of one reflow run, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReflowStep {
    pub from: String,
    pub to: String,
    pub outcome: StepOutcome,
}

/// Summary of a completed reflow run.
#[derive(Debug, Clone, Default)]
pub struct ReflowSummary {
    pub steps: Vec<ReflowStep>,
}

impl ReflowSummary {
    /// Number of pairs that actually required a combine.
    pub fn combined_count(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| s.outcome == StepOutcome::Combined)
            .count()
    }
}

/// Runs the reflow over the whole train with a single strategy.
///
/// On success (and on any non-conflict failure) the branch that was checked
/// out before the run is restored. An unresolved conflict aborts the
/// remaining pairs and leaves the user on the conflicted branch; the
/// ancestor-skip makes the eventual re-run cheap.
pub fn reflow(workdir: &Path, train: &Train, strategy: Strategy) -> GitResult<ReflowSummary> {
    let mut guard = WorkingBranchGuard::acquire(workdir)?;
    let mut summary = ReflowSummary::default();

    let branches = train.branches();
    for pair in branches.windows(2) {
        let (from, to) = (&pair[0].name, &pair[1].name);

        if git::is_ancestor(workdir, from, to)? {
            tracing::debug!(%from, %to, "already an ancestor; skipping");
            summary.steps.push(ReflowStep {
                from: from.clone(),
                to: to.clone(),
                outcome: StepOutcome::Skipped,
            });
            continue;
        }

        tracing::info!(%from, %to, strategy = strategy.verb(), "combining");
        match git::combine(workdir, from, to, strategy) {
            Ok(()) => {}
            Err(e @ GitError::MergeConflict { .. }) => {
                // Leave HEAD on the conflicted branch for manual resolution.
                guard.leave_in_place();
                return Err(e);
            }
            Err(e) => return Err(e),
        }
        summary.steps.push(ReflowStep {
            from: from.clone(),
            to: to.clone(),
            outcome: StepOutcome::Combined,
        });

        std::thread::sleep(SETTLE_DELAY);
    }

    Ok(summary)
}

//! CLI surface and command dispatch.
//!
//! Every command starts from the same context: locate the repository root,
//! load `.pr-train.yml`, and resolve the train containing the currently
//! checked-out branch. Commands that talk to GitHub additionally read the
//! per-user token and parse the remote URL into owner/repo.

use std::ops::Range;
use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::config::{self, TrainConfig};
use crate::error::{Error, PreconditionError};
use crate::git::{self, Strategy};
use crate::github::GitHubClient;
use crate::reflow;
use crate::sync::{self, SyncOptions};
use crate::types::{BranchSelector, Train};

/// Branch the train merges into unless overridden.
pub const DEFAULT_STABLE_BRANCH: &str = "master";

/// Remote pushed to and synced against unless overridden.
pub const DEFAULT_REMOTE: &str = "origin";

#[derive(Debug, Parser)]
#[command(
    name = "git-pr-train",
    version,
    about = "Manage a train of dependent branches and their linked PRs"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List the branches of the current train.
    List,

    /// Check out a train branch by index, or the literal `combined`.
    Checkout {
        /// Branch index (0-based) or `combined`.
        target: String,
    },

    /// Check out the next branch of the train.
    Next,

    /// Check out the previous branch of the train.
    Prev,

    /// Push the train's branches to the remote.
    Push {
        /// Force-push (reflowed branches routinely rewrite history).
        #[arg(long)]
        force: bool,

        /// Also push branches already merged into the stable branch.
        #[arg(long)]
        include_merged: bool,

        /// Restrict to a branch index range, inclusive on both ends
        /// (e.g. `1..3`).
        #[arg(long)]
        range: Option<String>,

        #[arg(long, default_value = DEFAULT_STABLE_BRANCH)]
        stable_branch: String,

        #[arg(long, default_value = DEFAULT_REMOTE)]
        remote: String,
    },

    /// Create or update the train's PRs and their navigation blocks.
    Pr {
        /// Create new PRs as drafts.
        #[arg(long)]
        draft: bool,

        /// Title for the combined branch's PR.
        #[arg(long)]
        title: Option<String>,

        /// Request a review from this user; repeatable.
        #[arg(long = "reviewer")]
        reviewers: Vec<String>,

        /// Restrict to a branch index range, inclusive on both ends.
        #[arg(long)]
        range: Option<String>,

        #[arg(long, default_value = DEFAULT_STABLE_BRANCH)]
        stable_branch: String,

        #[arg(long, default_value = DEFAULT_REMOTE)]
        remote: String,
    },

    /// Propagate changes downstream through the train.
    Reflow {
        #[arg(long, value_enum, default_value_t = ReflowStrategy::Merge)]
        strategy: ReflowStrategy,
    },
}

/// How the reflow engine combines each branch pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReflowStrategy {
    Merge,
    Rebase,
}

impl From<ReflowStrategy> for Strategy {
    fn from(s: ReflowStrategy) -> Self {
        match s {
            ReflowStrategy::Merge => Strategy::Merge,
            ReflowStrategy::Rebase => Strategy::Rebase,
        }
    }
}

/// Everything a command needs before doing any work.
struct Context {
    root: PathBuf,
    train: Train,
    current: String,
}

fn context() -> Result<Context, Error> {
    let root = git::repo_root()?;
    let config = TrainConfig::load(&root)?;
    let current = git::current_branch(&root)?;
    let train = config.train_for_branch(&current)?.clone();
    Ok(Context {
        root,
        train,
        current,
    })
}

/// Runs the parsed command to completion.
pub async fn run(cli: Cli) -> Result<(), Error> {
    let ctx = context()?;
    match cli.command {
        Command::List => run_list(&ctx),
        Command::Checkout { target } => run_checkout(&ctx, &target),
        Command::Next => step(&ctx, 1),
        Command::Prev => step(&ctx, -1),
        Command::Push {
            force,
            include_merged,
            range,
            stable_branch,
            remote,
        } => run_push(&ctx, force, include_merged, range, &stable_branch, &remote),
        Command::Pr {
            draft,
            title,
            reviewers,
            range,
            stable_branch,
            remote,
        } => run_pr(&ctx, draft, title, reviewers, range, stable_branch, &remote).await,
        Command::Reflow { strategy } => run_reflow(&ctx, strategy),
    }
}

fn run_list(ctx: &Context) -> Result<(), Error> {
    println!("train '{}' ({} branches):", ctx.train.name, ctx.train.len());
    for branch in ctx.train.branches() {
        let here = if branch.name == ctx.current { "*" } else { " " };
        let combined = if branch.is_combined { " [combined]" } else { "" };
        println!("{} {}. {}{}", here, branch.index, branch.name, combined);
    }
    Ok(())
}

fn run_checkout(ctx: &Context, target: &str) -> Result<(), Error> {
    let selector = BranchSelector::parse(target).ok_or_else(|| {
        Error::Usage(format!(
            "invalid branch selector '{}'; use a branch index or 'combined'",
            target
        ))
    })?;
    let branch = ctx
        .train
        .branch_at(&selector)
        .ok_or_else(|| branch_not_found(&ctx.train, selector.to_string()))?;
    git::checkout(&ctx.root, &branch.name)?;
    println!("switched to '{}'", branch.name);
    Ok(())
}

/// Checks out the branch `delta` positions away from the current one.
fn step(ctx: &Context, delta: isize) -> Result<(), Error> {
    let position = ctx
        .train
        .position_of(&ctx.current)
        .ok_or_else(|| PreconditionError::BranchNotInTrain {
            branch: ctx.current.clone(),
        })?;
    let target = position as isize + delta;
    let branch = usize::try_from(target)
        .ok()
        .and_then(|i| ctx.train.branch_at(&BranchSelector::Index(i)))
        .ok_or_else(|| branch_not_found(&ctx.train, target.to_string()))?;
    git::checkout(&ctx.root, &branch.name)?;
    println!("switched to '{}'", branch.name);
    Ok(())
}

fn run_push(
    ctx: &Context,
    force: bool,
    include_merged: bool,
    range: Option<String>,
    stable_branch: &str,
    remote: &str,
) -> Result<(), Error> {
    let range = range.as_deref().map(parse_range).transpose()?;
    let selected = selected_branches(&ctx.train, range)?;

    let to_push = if include_merged {
        selected.iter().map(|s| s.to_string()).collect()
    } else {
        git::unmerged_branches(&ctx.root, &selected, stable_branch)?
    };

    let refs: Vec<&str> = to_push.iter().map(String::as_str).collect();
    git::push(&ctx.root, &refs, force, remote)?;
    println!("pushed {} branch(es) to '{}'", refs.len(), remote);
    Ok(())
}

async fn run_pr(
    ctx: &Context,
    draft: bool,
    title: Option<String>,
    reviewers: Vec<String>,
    range: Option<String>,
    stable_branch: String,
    remote: &str,
) -> Result<(), Error> {
    let range = range.as_deref().map(parse_range).transpose()?;

    // PRs need their head branches on the remote first.
    let selected = selected_branches(&ctx.train, range.clone())?;
    let to_push = git::unmerged_branches(&ctx.root, &selected, &stable_branch)?;
    let refs: Vec<&str> = to_push.iter().map(String::as_str).collect();
    git::push(&ctx.root, &refs, false, remote)?;

    let token = config::github_token()?;
    let url = git::remote_url(&ctx.root, remote)?;
    let repo = git::parse_remote_url(&url)
        .ok_or(PreconditionError::UnparseableRemoteUrl { url })?;
    let client = GitHubClient::from_token(token, repo)?;

    let opts = SyncOptions {
        stable_branch,
        draft,
        combined_title: title,
        reviewers,
        range,
    };
    let directory = sync::sync_train(&client, &ctx.root, &ctx.train, &opts).await?;
    for record in directory.iter() {
        println!(
            "{} {} ({} <- {})",
            record.number, record.title, record.base, record.branch
        );
    }
    Ok(())
}

fn run_reflow(ctx: &Context, strategy: ReflowStrategy) -> Result<(), Error> {
    let summary = reflow::reflow(&ctx.root, &ctx.train, strategy.into())?;
    println!(
        "reflow complete: {} of {} pair(s) combined",
        summary.combined_count(),
        summary.steps.len()
    );
    Ok(())
}

/// Parses an inclusive `start..end` branch range into a half-open slice
/// range: `"1..3"` selects indices 1, 2, and 3.
fn parse_range(s: &str) -> Result<Range<usize>, Error> {
    let invalid = || {
        Error::Usage(format!(
            "invalid range '{}'; expected <start>..<end> with start <= end",
            s
        ))
    };
    let (start, end) = s.split_once("..").ok_or_else(invalid)?;
    let start: usize = start.trim().parse().map_err(|_| invalid())?;
    let end: usize = end.trim().parse().map_err(|_| invalid())?;
    if end < start {
        return Err(invalid());
    }
    Ok(start..end + 1)
}

/// The names of the train branches covered by `range` (all of them when no
/// range was given).
fn selected_branches(train: &Train, range: Option<Range<usize>>) -> Result<Vec<&str>, Error> {
    let branches = train.branches();
    let slice = match range {
        Some(range) => branches.get(range.clone()).ok_or_else(|| {
            Error::Usage(format!(
                "range {}..{} is out of bounds for a train of {} branches",
                range.start,
                range.end.saturating_sub(1),
                branches.len()
            ))
        })?,
        None => branches,
    };
    Ok(slice.iter().map(|b| b.name.as_str()).collect())
}

fn branch_not_found(train: &Train, selector: String) -> Error {
    Error::Precondition(PreconditionError::BranchNotFound {
        selector,
        train: train.name.clone(),
        len: train.len(),
    })
}

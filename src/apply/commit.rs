// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Commit handling between patch sets.
//!
//! Each applied patch set can become its own commit in the target
//! repository. Whether that happens depends on the [`AutoCommitMode`] and on
//! whether the patch set is the last one of the run:
//!
//! | mode          | not last | last                                  |
//! |---------------|----------|---------------------------------------|
//! | `all`         | commit   | commit                                |
//! | `off`         | skip     | skip                                  |
//! | `skip-last`   | commit   | skip                                  |
//! | `interactive` | commit   | prompt, or commit without a terminal  |
//!
//! A patch set with file errors is never committed. Whatever it left in the
//! working tree stays out of every later commit of the run too.

use crate::{
    apply::set::PatchSetStats,
    config::AutoCommitMode,
    git::{GitClient, GitError},
    prompt::{Confirm, Confirmation},
};

use std::{collections::BTreeSet, path::PathBuf};
use tracing::{debug, info, instrument, warn};

/// What to do with a freshly applied patch set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitDecision {
    Commit,
    Skip,
    Prompt,
}

/// Decide how to treat a patch set from commit mode and its position.
pub fn decide(mode: AutoCommitMode, is_last: bool) -> CommitDecision {
    match (mode, is_last) {
        (AutoCommitMode::All, _) => CommitDecision::Commit,
        (AutoCommitMode::Off, _) => CommitDecision::Skip,
        (AutoCommitMode::SkipLast, false) => CommitDecision::Commit,
        (AutoCommitMode::SkipLast, true) => CommitDecision::Skip,
        (AutoCommitMode::Interactive, false) => CommitDecision::Commit,
        (AutoCommitMode::Interactive, true) => CommitDecision::Prompt,
    }
}

/// What actually happened to a patch set after it was applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    Committed,

    /// Commit mode said not to commit.
    Skipped,

    /// User said no, or dismissed the prompt.
    Declined,

    /// Patch set had file errors, so it was left uncommitted.
    Withheld,
}

/// Commit message used for a patch set.
pub fn commit_message(name: &str) -> String {
    format!("Apply patch set: {name}")
}

/// Carry out commit decisions against the target repository.
pub struct CommitController<'a, G, C>
where
    G: GitClient,
    C: Confirm,
{
    git: &'a G,
    confirm: &'a mut C,
    mode: AutoCommitMode,
    withheld: BTreeSet<PathBuf>,
}

impl<'a, G, C> CommitController<'a, G, C>
where
    G: GitClient,
    C: Confirm,
{
    pub fn new(git: &'a G, confirm: &'a mut C, mode: AutoCommitMode) -> Self {
        Self {
            git,
            confirm,
            mode,
            withheld: BTreeSet::new(),
        }
    }

    /// Make sure the working tree has nothing pending.
    ///
    /// # Errors
    ///
    /// - Return [`CommitError::DirtyTree`] if anything is modified, staged, or
    ///   untracked.
    /// - Return [`CommitError::Git`] if status cannot be read.
    #[instrument(skip(self), level = "debug")]
    pub fn ensure_clean(&self) -> Result<()> {
        let paths = self.git.status()?;
        if !paths.is_empty() {
            return Err(CommitError::DirtyTree { paths });
        }

        Ok(())
    }

    /// Commit, skip, or ask about an applied patch set.
    ///
    /// # Errors
    ///
    /// - Return [`CommitError::Git`] if status cannot be read, or staging or
    ///   committing fails.
    #[instrument(skip(self, stats), fields(set = %stats.name), level = "debug")]
    pub fn finalize(&mut self, stats: &PatchSetStats, is_last: bool) -> Result<CommitOutcome> {
        if stats.has_errors() {
            warn!("patch set {} has errors, leaving it uncommitted", stats.name);
            self.withheld.extend(self.git.status()?);
            return Ok(CommitOutcome::Withheld);
        }

        let commit = match decide(self.mode, is_last) {
            CommitDecision::Commit => true,
            CommitDecision::Skip => false,
            CommitDecision::Prompt if !self.confirm.is_interactive() => true,
            CommitDecision::Prompt => {
                let question = format!("Commit changes from patch set {:?}?", stats.name);
                match self.confirm.confirm(&question) {
                    Confirmation::Yes => true,
                    Confirmation::No | Confirmation::Cancelled => {
                        println!("  Leaving {} uncommitted", stats.name);
                        return Ok(CommitOutcome::Declined);
                    }
                }
            }
        };

        if !commit {
            info!("skip commit of {}", stats.name);
            return Ok(CommitOutcome::Skipped);
        }

        let message = commit_message(&stats.name);
        self.stage()?;
        self.git.commit(&message)?;
        println!("  Committed \"{message}\"");

        Ok(CommitOutcome::Committed)
    }

    fn stage(&self) -> Result<()> {
        if self.withheld.is_empty() {
            self.git.add(".")?;
            return Ok(());
        }

        for path in self.git.status()? {
            if self.withheld.contains(&path) {
                debug!("keep {} out of commit, an earlier patch set failed on it", path.display());
                continue;
            }
            self.git.add(&path.to_string_lossy())?;
        }

        Ok(())
    }
}

/// Commit error types.
#[derive(Debug, thiserror::Error)]
pub enum CommitError {
    /// Target working tree has pending changes.
    #[error(
        "target repository has uncommitted changes in {} path(s), commit or stash them first",
        paths.len()
    )]
    DirtyTree { paths: Vec<PathBuf> },

    /// Git refused to stage or commit.
    #[error(transparent)]
    Git(#[from] GitError),
}

/// Friendly result alias :3
pub type Result<T, E = CommitError> = std::result::Result<T, E>;

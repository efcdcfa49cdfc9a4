// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Patch set orchestration.
//!
//! Patch sets are applied one after another in name order. Each patch set is
//! handed to [`set::apply_patch_set`], and the result is handed to
//! [`commit::CommitController`] before moving on, because later patch sets
//! may build on files and commits left behind by earlier ones.
//!
//! # Failure Handling
//!
//! Two kinds of failure exist. Fatal failures become [`ApplyError`] and stop
//! the run on the spot: bad flags, unknown patch sets, a dirty working tree,
//! broken hooks, and failed commits. File failures are kept inside
//! [`set::PatchSetStats`] so every patch file gets a chance to apply, and are
//! reported together by [`ApplySummary`] once all patch sets are done.

pub mod commit;
pub mod hook;
pub mod resolve;
pub mod set;

use crate::{
    config::{AutoCommitMode, ConflictMode, PatchyConfig},
    git::GitClient,
    patch::collect::CollectError,
    prompt::Confirm,
};
use commit::{CommitController, CommitError};
use hook::HookError;
use resolve::{resolve_patch_sets, ResolveError};
use set::{apply_patch_set, PatchSetStats};

use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    path::PathBuf,
};
use tracing::{info, instrument};

/// Everything a run needs to know.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyOptions {
    pub target_repo: PathBuf,
    pub patches_dir: PathBuf,
    pub base_revision: Option<String>,
    pub hook_prefix: String,
    pub fuzz_factor: usize,
    pub auto_commit: AutoCommitMode,
    pub conflict_mode: ConflictMode,

    /// Apply only this patch set.
    pub only: Option<String>,

    /// Apply patch sets up to and including this one.
    pub until: Option<String>,

    /// Shortcut for committing every patch set.
    pub all: bool,

    /// Shortcut for leaving the last patch set uncommitted.
    pub edit: bool,

    pub dry_run: bool,
    pub verbose: bool,
}

impl ApplyOptions {
    /// Construct options out of configuration file settings.
    pub fn from_config(config: &PatchyConfig) -> Self {
        Self {
            target_repo: config.target_repo.clone(),
            patches_dir: config.patches_dir.clone(),
            base_revision: config.base_revision.clone(),
            hook_prefix: config.hook_prefix.clone(),
            fuzz_factor: config.fuzz_factor,
            auto_commit: config.auto_commit,
            conflict_mode: config.conflict_mode,
            only: None,
            until: None,
            all: false,
            edit: false,
            dry_run: false,
            verbose: config.verbose,
        }
    }

    /// Commit mode after applying `--all` and `--edit` shortcuts.
    ///
    /// # Errors
    ///
    /// - Return [`ApplyError::ConflictingCommitFlags`] if both shortcuts are
    ///   set.
    pub fn commit_mode(&self) -> Result<AutoCommitMode> {
        match (self.all, self.edit) {
            (true, true) => Err(ApplyError::ConflictingCommitFlags),
            (true, false) => Ok(AutoCommitMode::All),
            (false, true) => Ok(AutoCommitMode::SkipLast),
            (false, false) => Ok(self.auto_commit),
        }
    }
}

impl Default for ApplyOptions {
    fn default() -> Self {
        Self::from_config(&PatchyConfig::default())
    }
}

/// Apply every selected patch set to the target repository.
///
/// Nothing is written, committed, or run as a hook under dry-run. Returns a
/// summary even when some patch files failed. Check
/// [`ApplySummary::has_errors`] to find out.
///
/// # Errors
///
/// - Return [`ApplyError::ConflictingCommitFlags`] if `--all` and `--edit`
///   are both set.
/// - Return [`ApplyError::Resolve`] if patch set selection fails.
/// - Return [`ApplyError::Commit`] if the working tree is dirty, or a commit
///   fails.
/// - Return [`ApplyError::Hook`] if a hook is broken or fails.
/// - Return [`ApplyError::Collect`] if a patch set cannot be walked.
#[instrument(skip(options, git, confirm), level = "debug")]
pub fn apply<G, C>(options: &ApplyOptions, git: &G, confirm: &mut C) -> Result<ApplySummary>
where
    G: GitClient,
    C: Confirm,
{
    let mode = options.commit_mode()?;
    let patch_sets = resolve_patch_sets(
        &options.patches_dir,
        options.only.as_deref(),
        options.until.as_deref(),
    )?;

    let mut summary = ApplySummary {
        dry_run: options.dry_run,
        patch_sets: Vec::with_capacity(patch_sets.len()),
    };
    if patch_sets.is_empty() {
        return Ok(summary);
    }

    let mut controller = CommitController::new(git, confirm, mode);
    if !options.dry_run {
        controller.ensure_clean()?;
    }

    let last = patch_sets.len() - 1;
    for patch_set in &patch_sets {
        info!("apply patch set {}", patch_set.name);
        let stats = apply_patch_set(patch_set, options)?;
        if !options.dry_run {
            controller.finalize(&stats, patch_set.position == last)?;
        }
        summary.patch_sets.push(stats);
    }

    Ok(summary)
}

/// Aggregate result of a run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ApplySummary {
    pub dry_run: bool,
    pub patch_sets: Vec<PatchSetStats>,
}

impl ApplySummary {
    pub fn total_files(&self) -> usize {
        self.patch_sets.iter().map(|stats| stats.file_count).sum()
    }

    pub fn has_errors(&self) -> bool {
        self.patch_sets.iter().any(PatchSetStats::has_errors)
    }

    /// List files left with conflict markers, if any.
    pub fn conflict_report(&self) -> Option<String> {
        let lines = self
            .patch_sets
            .iter()
            .flat_map(|stats| {
                stats.conflicts.iter().map(|(path, count)| {
                    format!("  {}/{}: {count} conflict(s)", stats.name, path.display())
                })
            })
            .collect::<Vec<_>>();

        if lines.is_empty() {
            return None;
        }

        Some(format!(
            "Conflict markers need manual resolution:\n{}",
            lines.join("\n")
        ))
    }
}

impl Display for ApplySummary {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        if self.patch_sets.is_empty() {
            return write!(fmt, "No patch sets found.");
        }

        if self.has_errors() {
            write!(fmt, "Errors occurred while applying patches:")?;
            for stats in &self.patch_sets {
                for (path, message) in &stats.errors {
                    write!(fmt, "\n  {}/{}: {message}", stats.name, path.display())?;
                }
            }
            return Ok(());
        }

        let verb = if self.dry_run {
            "Would apply"
        } else {
            "Successfully applied"
        };
        write!(
            fmt,
            "{verb} {} patch file(s) across {} patch set(s).",
            self.total_files(),
            self.patch_sets.len()
        )
    }
}

/// Broad kind of fatal failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Usage,
    Precondition,
    HookExecution,
    Commit,
    Io,
}

/// Fatal error types of a run.
#[derive(Debug, thiserror::Error)]
pub enum ApplyError {
    /// Both commit shortcuts given at once.
    #[error("Cannot use both --all and --edit flags together")]
    ConflictingCommitFlags,

    /// Patch set selection fails.
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    /// Hook is broken or fails.
    #[error(transparent)]
    Hook(#[from] HookError),

    /// Patch set cannot be walked.
    #[error(transparent)]
    Collect(#[from] CollectError),

    /// Precondition or commit fails.
    #[error(transparent)]
    Commit(#[from] CommitError),
}

impl ApplyError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::ConflictingCommitFlags => ErrorCategory::Usage,
            Self::Resolve(ResolveError::ReadDir { .. }) => ErrorCategory::Io,
            Self::Resolve(_) => ErrorCategory::Usage,
            Self::Hook(HookError::NotExecutable { .. }) => ErrorCategory::Precondition,
            Self::Hook(HookError::Metadata { .. }) => ErrorCategory::Io,
            Self::Hook(_) => ErrorCategory::HookExecution,
            Self::Collect(_) => ErrorCategory::Io,
            Self::Commit(CommitError::DirtyTree { .. }) => ErrorCategory::Precondition,
            Self::Commit(_) => ErrorCategory::Commit,
        }
    }
}

/// Friendly result alias :3
pub type Result<T, E = ApplyError> = std::result::Result<T, E>;

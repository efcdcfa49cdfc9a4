// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Application of a single patch set.
//!
//! Runs the pre-apply hook, applies every patch file, then runs the
//! post-apply hook. Hook failures abort. File failures are recorded in the
//! returned [`PatchSetStats`] and do not stop the remaining files of the set.

use crate::{
    apply::{
        hook::{hook_file_names, run_hook, HookEnv, HookInfo, PatchSetHooks},
        ApplyError, ApplyOptions,
    },
    config::ConflictMode,
    patch::{
        collect::collect_patch_files,
        conflict::resolve,
        diff::{DiffError, UnifiedDiff},
        ApplyOutcome, PatchFile, PatchKind, PatchSet,
    },
};

use mkdirp::mkdirp;
use std::{
    fs::{copy, read_to_string, write},
    path::{Path, PathBuf},
};
use tracing::{debug, info, instrument};

/// Tally of one applied patch set.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PatchSetStats {
    pub name: String,
    pub file_count: usize,

    /// Files that failed, with the reason.
    pub errors: Vec<(PathBuf, String)>,

    /// Files written with conflict markers, with the number of conflicts.
    pub conflicts: Vec<(PathBuf, usize)>,
}

impl PatchSetStats {
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// Apply every file of a patch set, surrounded by its hooks.
///
/// Under dry-run, hooks are not run and nothing is written.
///
/// # Errors
///
/// - Return [`ApplyError::Hook`] if a hook is not executable or fails.
/// - Return [`ApplyError::Collect`] if the patch set cannot be walked.
#[instrument(skip(set, options), fields(set = %set.name), level = "debug")]
pub fn apply_patch_set(set: &PatchSet, options: &ApplyOptions) -> Result<PatchSetStats, ApplyError> {
    let hooks = PatchSetHooks::find(&set.path, &options.hook_prefix)?;
    let files = collect_patch_files(
        &set.path,
        &options.target_repo,
        &hook_file_names(&options.hook_prefix),
    )?;

    println!("{}", set.name);

    let env = HookEnv {
        target_repo: options.target_repo.clone(),
        patch_set: set.name.clone(),
        patches_dir: options.patches_dir.clone(),
        patch_set_dir: set.path.clone(),
        base_revision: options.base_revision.clone(),
    };
    run_optional_hook(hooks.pre_apply.as_ref(), &env, options)?;

    let mut stats = PatchSetStats {
        name: set.name.clone(),
        file_count: files.len(),
        ..Default::default()
    };

    for file in &files {
        if options.dry_run {
            println!("  would apply {} ({})", file.relative_path.display(), file.kind);
            continue;
        }

        let outcome = apply_patch_file(file, options.fuzz_factor, options.conflict_mode);
        report_file(file, &outcome, options.verbose);
        match outcome {
            ApplyOutcome::Success => {}
            ApplyOutcome::Conflicted { conflicts } => {
                stats.conflicts.push((file.target_relative_path.clone(), conflicts));
            }
            ApplyOutcome::Error { message } => {
                stats.errors.push((file.relative_path.clone(), message));
            }
        }
    }

    println!("{}", tally(&stats, options.dry_run));

    run_optional_hook(hooks.post_apply.as_ref(), &env, options)?;

    Ok(stats)
}

fn run_optional_hook(
    hook: Option<&HookInfo>,
    env: &HookEnv,
    options: &ApplyOptions,
) -> Result<(), ApplyError> {
    let Some(hook) = hook else {
        return Ok(());
    };

    if options.dry_run {
        println!("  would run {}", hook.name);
        return Ok(());
    }

    info!("run hook {}", hook.name);
    run_hook(hook, env, options.verbose).into_result(hook)?;

    Ok(())
}

fn report_file(file: &PatchFile, outcome: &ApplyOutcome, verbose: bool) {
    let path = file.relative_path.display();
    match outcome {
        ApplyOutcome::Success if verbose => println!("  ✔ {path} ({})", file.kind),
        ApplyOutcome::Success => {}
        ApplyOutcome::Conflicted { conflicts } => {
            println!("  ! {path} ({}) has {conflicts} conflict(s)", file.kind)
        }
        ApplyOutcome::Error { message } => eprintln!("  ✖ {path} ({}): {message}", file.kind),
    }
}

fn tally(stats: &PatchSetStats, dry_run: bool) -> String {
    if dry_run {
        return format!("  ✔ {} file(s) would be applied", stats.file_count);
    }

    let failed = stats.errors.len();
    let mut line = format!(
        "  ✔ {} file(s) applied  ✖ {failed} failed",
        stats.file_count - failed
    );
    if !stats.conflicts.is_empty() {
        line.push_str(&format!("  ! {} with conflicts", stats.conflicts.len()));
    }
    line
}

/// Apply a single patch file to its target.
///
/// Copies overwrite their target, creating parent directories as needed.
/// Diffs require their target to exist, and leave it untouched when they fail.
pub fn apply_patch_file(file: &PatchFile, fuzz_factor: usize, mode: ConflictMode) -> ApplyOutcome {
    let result = match file.kind {
        PatchKind::Copy => copy_file(file).map(|_| ApplyOutcome::Success),
        PatchKind::Diff => apply_diff_file(file, fuzz_factor, mode),
    };

    result.unwrap_or_else(ApplyOutcome::error)
}

fn copy_file(file: &PatchFile) -> Result<(), FileError> {
    if let Some(parent) = file.target_path.parent() {
        mkdirp(parent).map_err(|err| FileError::Write {
            source: err,
            path: parent.to_path_buf(),
        })?;
    }

    copy(&file.source_path, &file.target_path).map_err(|err| FileError::Write {
        source: err,
        path: file.target_relative_path.clone(),
    })?;
    debug!("copied {:?}", file.target_path.display());

    Ok(())
}

fn apply_diff_file(
    file: &PatchFile,
    fuzz_factor: usize,
    mode: ConflictMode,
) -> Result<ApplyOutcome, FileError> {
    if !file.target_path.is_file() {
        return Err(FileError::MissingTarget {
            path: file.target_relative_path.clone(),
        });
    }

    let diff: UnifiedDiff = read_file(&file.source_path, &file.relative_path)?.parse()?;
    let content = read_file(&file.target_path, &file.target_relative_path)?;
    let resolution = resolve(&content, &diff, fuzz_factor, mode)?;

    if resolution.content != content {
        write(&file.target_path, resolution.content.as_bytes()).map_err(|err| FileError::Write {
            source: err,
            path: file.target_relative_path.clone(),
        })?;
    }
    debug!("patched {:?}", file.target_path.display());

    if resolution.conflicts > 0 {
        return Ok(ApplyOutcome::Conflicted {
            conflicts: resolution.conflicts,
        });
    }

    Ok(ApplyOutcome::Success)
}

fn read_file(path: &Path, shown: &Path) -> Result<String, FileError> {
    read_to_string(path).map_err(|err| FileError::Read {
        source: err,
        path: shown.to_path_buf(),
    })
}

/// File-level error types.
///
/// Never abort a run. They are rendered into [`ApplyOutcome::Error`].
#[derive(Debug, thiserror::Error)]
pub enum FileError {
    /// Diff target is missing from the target repository.
    #[error("Target file does not exist: {}", path.display())]
    MissingTarget { path: PathBuf },

    /// Diff cannot be parsed or applied.
    #[error(transparent)]
    Diff(#[from] DiffError),

    /// File cannot be read.
    #[error("failed to read {}: {source}", path.display())]
    Read {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// File cannot be written.
    #[error("failed to write {}: {source}", path.display())]
    Write {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sealed_test::prelude::*;
    use std::{env::current_dir, fs};

    fn patch_file(kind: PatchKind, relative: &str, target: &str) -> anyhow::Result<PatchFile> {
        let root = current_dir()?;
        Ok(PatchFile {
            relative_path: PathBuf::from(relative),
            kind,
            source_path: root.join("set").join(relative),
            target_relative_path: PathBuf::from(target),
            target_path: root.join("repo").join(target),
        })
    }

    #[sealed_test]
    fn copy_creates_parents_and_overwrites() -> anyhow::Result<()> {
        fs::create_dir_all("set/deep/er")?;
        fs::create_dir_all("repo")?;
        fs::write("set/deep/er/new.txt", "patched\n")?;
        let file = patch_file(PatchKind::Copy, "deep/er/new.txt", "deep/er/new.txt")?;

        for _ in 0..2 {
            let outcome = apply_patch_file(&file, 0, ConflictMode::Error);
            assert_eq!(outcome, ApplyOutcome::Success);
            assert_eq!(fs::read_to_string("repo/deep/er/new.txt")?, "patched\n");
        }

        Ok(())
    }

    #[sealed_test]
    fn diff_with_missing_target_fails() -> anyhow::Result<()> {
        fs::create_dir_all("set")?;
        fs::create_dir_all("repo")?;
        fs::write("set/gone.txt.diff", "@@ -1 +1 @@\n-a\n+b\n")?;
        let file = patch_file(PatchKind::Diff, "gone.txt.diff", "gone.txt")?;

        let outcome = apply_patch_file(&file, 2, ConflictMode::Error);
        assert_eq!(outcome.message(), Some("Target file does not exist: gone.txt"));
        assert!(!Path::new("repo/gone.txt").exists());

        Ok(())
    }

    #[sealed_test]
    fn failed_diff_leaves_target_untouched() -> anyhow::Result<()> {
        fs::create_dir_all("set")?;
        fs::create_dir_all("repo")?;
        fs::write("repo/app.js", "one\ntwo\n")?;
        fs::write("set/app.js.diff", "@@ -1 +1 @@\n-three\n+THREE\n")?;
        let file = patch_file(PatchKind::Diff, "app.js.diff", "app.js")?;

        let outcome = apply_patch_file(&file, 0, ConflictMode::Error);
        assert!(outcome.is_error());
        assert!(outcome.message().unwrap_or_default().contains("Patch failed to apply"));
        assert_eq!(fs::read_to_string("repo/app.js")?, "one\ntwo\n");

        Ok(())
    }

    #[sealed_test]
    fn conflicted_diff_is_written_and_counted() -> anyhow::Result<()> {
        fs::create_dir_all("set")?;
        fs::create_dir_all("repo")?;
        fs::write("repo/app.js", "one\ntwo\n")?;
        fs::write("set/app.js.diff", "@@ -1 +1 @@\n-one\n+ONE\n@@ -2 +2 @@\n-three\n+THREE\n")?;
        let file = patch_file(PatchKind::Diff, "app.js.diff", "app.js")?;

        let outcome = apply_patch_file(&file, 0, ConflictMode::ConflictMarker);
        assert_eq!(outcome.conflicts(), Some(1));
        let content = fs::read_to_string("repo/app.js")?;
        assert!(content.starts_with("ONE\n<<<<<<< current\ntwo\n=======\nTHREE\n"));

        Ok(())
    }

    #[test]
    fn tally_counts_failures_and_conflicts() {
        let stats = PatchSetStats {
            name: "001-first".into(),
            file_count: 4,
            errors: vec![(PathBuf::from("a.diff"), "nope".into())],
            conflicts: vec![(PathBuf::from("b"), 2)],
        };
        assert_eq!(
            tally(&stats, false),
            "  ✔ 3 file(s) applied  ✖ 1 failed  ! 1 with conflicts"
        );
        assert_eq!(tally(&stats, true), "  ✔ 4 file(s) would be applied");
    }
}

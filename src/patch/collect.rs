// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Patch file enumeration.
//!
//! Walks a patch set directory and sorts every regular file into a
//! [`PatchFile`]. Ignore files are not honored, since anything placed in a
//! patch set is meant to be applied. Output is sorted by relative path so
//! repeated runs list files in the same order.

use crate::patch::{PatchFile, PatchKind, DIFF_SUFFIX};

use ignore::WalkBuilder;
use std::{
    collections::HashSet,
    path::{Path, PathBuf},
};
use tracing::{debug, instrument};

/// Collect patch files of a patch set.
///
/// Files whose name is in `excluded` are skipped wherever they appear. This
/// is how hook files stay out of the patch file listing.
///
/// # Errors
///
/// - Return [`CollectError::Walk`] if the patch set directory cannot be read.
#[instrument(skip(set_dir, target_repo, excluded), level = "debug")]
pub fn collect_patch_files(
    set_dir: impl AsRef<Path>,
    target_repo: impl AsRef<Path>,
    excluded: &HashSet<String>,
) -> Result<Vec<PatchFile>> {
    let set_dir = set_dir.as_ref();
    let mut files = Vec::new();

    let walker = WalkBuilder::new(set_dir)
        .standard_filters(false)
        .sort_by_file_name(|a, b| a.cmp(b))
        .build();

    for entry in walker {
        let entry = entry?;
        if !entry.file_type().is_some_and(|kind| kind.is_file()) {
            continue;
        }

        let file_name = entry.file_name().to_string_lossy();
        // INVARIANT: Only files directly under the patch set can be hooks.
        if entry.depth() == 1 && excluded.contains(file_name.as_ref()) {
            debug!("skip hook file {:?}", entry.path().display());
            continue;
        }

        let relative_path = entry
            .path()
            .strip_prefix(set_dir)
            .map_err(|_| CollectError::OutsideSet {
                path: entry.path().to_path_buf(),
            })?
            .to_path_buf();

        files.push(classify(relative_path, set_dir, target_repo.as_ref()));
    }

    files.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));

    Ok(files)
}

fn classify(relative_path: PathBuf, set_dir: &Path, target_repo: &Path) -> PatchFile {
    let as_text = relative_path.to_string_lossy();
    let (kind, target_relative_path) = match as_text.strip_suffix(DIFF_SUFFIX) {
        Some(stripped) if !stripped.is_empty() && !stripped.ends_with(['/', '\\']) => {
            (PatchKind::Diff, PathBuf::from(stripped))
        }
        _ => (PatchKind::Copy, relative_path.clone()),
    };

    PatchFile {
        source_path: set_dir.join(&relative_path),
        target_path: target_repo.join(&target_relative_path),
        relative_path,
        kind,
        target_relative_path,
    }
}

/// Patch file collection error types.
#[derive(Debug, thiserror::Error)]
pub enum CollectError {
    /// Directory walk failed.
    #[error(transparent)]
    Walk(#[from] ignore::Error),

    /// Walker produced a path outside of the patch set directory.
    #[error("path {:?} is not inside its patch set", path.display())]
    OutsideSet { path: PathBuf },
}

/// Friendly result alias :3
pub type Result<T, E = CollectError> = std::result::Result<T, E>;

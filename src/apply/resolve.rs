// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Patch set selection.
//!
//! Every directory directly under the patches directory is a patch set.
//! Patch sets are ordered by name. `--only` narrows the run down to a single
//! patch set, while `--until` stops after the named one.

use crate::patch::PatchSet;

use std::{
    fs::read_dir,
    io::ErrorKind,
    path::{Path, PathBuf},
};
use tracing::{instrument, warn};

/// List patch sets to process, in application order.
///
/// A missing patches directory has no patch sets.
///
/// # Errors
///
/// - Return [`ResolveError::ConflictingFlags`] if both `only` and `until`
///   are given, whether or not they name real patch sets.
/// - Return [`ResolveError::NotFound`] if `only` or `until` names a patch
///   set that does not exist.
/// - Return [`ResolveError::ReadDir`] if the patches directory cannot be
///   read.
#[instrument(skip(patches_dir), level = "debug")]
pub fn resolve_patch_sets(
    patches_dir: impl AsRef<Path>,
    only: Option<&str>,
    until: Option<&str>,
) -> Result<Vec<PatchSet>> {
    if only.is_some() && until.is_some() {
        return Err(ResolveError::ConflictingFlags);
    }

    let patches_dir = patches_dir.as_ref();
    let names = list_patch_set_names(patches_dir)?;

    let selected = match (only, until) {
        (Some(only), _) => {
            let name = find(&names, only)?;
            vec![name.clone()]
        }
        (_, Some(until)) => {
            find(&names, until)?;
            let end = names.iter().position(|name| name == until).map_or(0, |at| at + 1);
            names[..end].to_vec()
        }
        (None, None) => names,
    };

    Ok(selected
        .into_iter()
        .enumerate()
        .map(|(position, name)| PatchSet {
            path: patches_dir.join(&name),
            name,
            position,
        })
        .collect())
}

fn find<'a>(names: &'a [String], wanted: &str) -> Result<&'a String> {
    names
        .iter()
        .find(|name| *name == wanted)
        .ok_or_else(|| ResolveError::NotFound(wanted.to_string()))
}

fn list_patch_set_names(patches_dir: &Path) -> Result<Vec<String>> {
    let entries = match read_dir(patches_dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            warn!("patches directory {:?} does not exist", patches_dir.display());
            return Ok(Vec::new());
        }
        Err(err) => {
            return Err(ResolveError::ReadDir {
                source: err,
                path: patches_dir.to_path_buf(),
            })
        }
    };

    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|err| ResolveError::ReadDir {
            source: err,
            path: patches_dir.to_path_buf(),
        })?;

        if entry.path().is_dir() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    names.sort();

    Ok(names)
}

/// Patch set selection error types.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    /// Both selection flags given at once.
    #[error("Cannot use both --only and --until flags together")]
    ConflictingFlags,

    /// Named patch set does not exist.
    #[error("Patch set not found: {0}")]
    NotFound(String),

    /// Patches directory cannot be listed.
    #[error("failed to read patches directory {:?}", path.display())]
    ReadDir {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },
}

/// Friendly result alias :3
pub type Result<T, E = ResolveError> = std::result::Result<T, E>;

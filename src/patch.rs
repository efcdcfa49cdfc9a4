// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Patch set domain representation.
//!
//! A __patch set__ is a named directory under the patches directory that
//! holds the files needed to reapply one logical customization on top of an
//! upstream repository. Patch set names are sorted lexically to determine the
//! order of application, so they conventionally carry a numeric prefix, e.g.,
//! `001-branding`, `002-telemetry-off`.
//!
//! # Patch Files
//!
//! Every regular file inside a patch set is a __patch file__ of one of two
//! kinds:
//!
//! - A __diff__ is a file ending in `.diff` that holds a unified diff. It
//!   targets the file at the same relative path minus the suffix, which must
//!   already exist in the target repository.
//! - A __copy__ is any other file. Its content overwrites the file at the same
//!   relative path in the target repository, creating it if needed.
//!
//! Files named after a hook, e.g., `patchy-pre-apply`, are never treated as
//! patch files.
//!
//! # See Also
//!
//! 1. [`collect`]
//! 2. [`diff`]
//! 3. [`conflict`]

pub mod collect;
pub mod conflict;
pub mod diff;

use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    path::PathBuf,
};

/// File suffix marking a patch file as a unified diff.
pub const DIFF_SUFFIX: &str = ".diff";

/// A patch set directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchSet {
    /// Directory name of the patch set.
    pub name: String,

    /// Zero-based position in the resolved application order.
    pub position: usize,

    /// Absolute path to the patch set directory.
    pub path: PathBuf,
}

/// Kind of change a patch file describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchKind {
    /// Raw file content that overwrites the target.
    Copy,

    /// Unified diff applied against an existing target.
    Diff,
}

impl Display for PatchKind {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(match self {
            Self::Copy => "copy",
            Self::Diff => "diff",
        })
    }
}

/// A single file inside a patch set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchFile {
    /// Path relative to the patch set directory.
    pub relative_path: PathBuf,

    /// Copy or diff.
    pub kind: PatchKind,

    /// Absolute path of the patch file itself.
    pub source_path: PathBuf,

    /// Path relative to the target repository, diff suffix stripped.
    pub target_relative_path: PathBuf,

    /// Absolute path of the file this patch file changes.
    pub target_path: PathBuf,
}

/// Result of applying one patch file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// Applied cleanly.
    Success,

    /// Written, but with conflict markers that need manual resolution.
    Conflicted { conflicts: usize },

    /// Not applied. Target left untouched.
    Error { message: String },
}

impl ApplyOutcome {
    /// Construct error outcome from anything printable.
    pub fn error(message: impl Display) -> Self {
        Self::Error {
            message: message.to_string(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }

    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Error { message } => Some(message.as_str()),
            _ => None,
        }
    }

    pub fn conflicts(&self) -> Option<usize> {
        match self {
            Self::Conflicted { conflicts } => Some(*conflicts),
            _ => None,
        }
    }
}

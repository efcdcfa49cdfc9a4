// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Hunk failure handling.
//!
//! Decides what happens to a file when some of its hunks cannot be placed.
//! Under [`ConflictMode::Error`] the whole file fails and nothing is written.
//! Under [`ConflictMode::ConflictMarker`] every hunk that can be placed is
//! applied, and every hunk that cannot is embedded where it was expected:
//!
//! ```text
//! <<<<<<< current
//! lines currently in the file
//! =======
//! lines the hunk wanted to leave
//! >>>>>>> patch
//! ```

use crate::{
    config::ConflictMode,
    patch::diff::{apply_hunks, DiffError, Hunk, HunkApplier, HunkPlan, UnifiedDiff},
};

use tracing::warn;

pub const CONFLICT_START: &str = "<<<<<<< current";
pub const CONFLICT_SEPARATOR: &str = "=======";
pub const CONFLICT_END: &str = ">>>>>>> patch";

/// New file content, with the number of conflicts embedded in it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub content: String,
    pub conflicts: usize,
}

/// Apply diff to content under a conflict mode.
///
/// # Errors
///
/// - Return [`DiffError::HunkFailed`] if any hunk fails under
///   [`ConflictMode::Error`]. Never returned under
///   [`ConflictMode::ConflictMarker`].
pub fn resolve(
    content: &str,
    diff: &UnifiedDiff,
    fuzz_factor: usize,
    mode: ConflictMode,
) -> Result<Resolution, DiffError> {
    if mode == ConflictMode::Error {
        return Ok(Resolution {
            content: apply_hunks(content, diff, fuzz_factor)?,
            conflicts: 0,
        });
    }

    let mut applier = HunkApplier::new(content, fuzz_factor);
    let ordered = diff.ordered_hunks();
    let hunks = ordered.iter().map(|(_, hunk)| *hunk).collect::<Vec<_>>();
    let plans = applier.plan(&hunks);

    let mut conflicts = 0;
    for ((index, hunk), plan) in ordered.iter().zip(plans) {
        match plan {
            HunkPlan::Placed(placement) => applier.apply(hunk, &placement),
            HunkPlan::Unplaced { start, end } => {
                warn!("hunk #{index} ({hunk}) does not apply, embedding conflict markers");
                embed_conflict(&mut applier, hunk, start, end);
                conflicts += 1;
            }
        }
    }

    Ok(Resolution {
        content: applier.finish(),
        conflicts,
    })
}

fn embed_conflict(applier: &mut HunkApplier, hunk: &Hunk, start: usize, end: usize) {
    let mut block = vec![CONFLICT_START.to_string()];
    block.extend(applier.current(start, end).iter().cloned());
    block.push(CONFLICT_SEPARATOR.to_string());
    block.extend(hunk.new_lines().map(str::to_owned));
    block.push(CONFLICT_END.to_string());

    applier.replace(start, end - start, block);
}

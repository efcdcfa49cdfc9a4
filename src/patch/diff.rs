// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Unified diff parsing and application.
//!
//! Patchy understands a small, line-oriented subset of the unified diff
//! format. File headers (`---`/`+++`), `diff --git` preambles, and
//! `\ No newline at end of file` markers are skipped. Everything of interest
//! lives in hunks:
//!
//! ```text
//! @@ -oldStart[,oldCount] +newStart[,newCount] @@
//!  context line
//! -deleted line
//! +inserted line
//! ```
//!
//! Omitted counts default to 1. A blank line inside a hunk is an empty
//! context line.
//!
//! # Hunk Placement
//!
//! Hunks are applied in ascending order of their old start line. Each hunk is
//! __anchored__ at original line `oldStart - 1` (or `oldStart` for pure
//! insertions). If the hunk's context and deleted lines match the content at the anchor,
//! it is applied there.
//!
//! Otherwise, a non-zero __fuzz factor__ `f` lets the hunk drift:
//!
//! 1. Candidate start lines are scanned by ascending distance from the anchor,
//!    the earlier line winning when two candidates are equally far away. The
//!    scan never goes past either end of the file.
//! 2. At each candidate, up to `f` leading and up to `f` trailing context
//!    lines may be ignored. Ignored context is neither matched nor written.
//!    Fewer ignored lines are tried first.
//!
//! A fuzz factor of zero demands an exact match at the anchor. Raising `f`
//! only ever adds candidates.
//!
//! Placements are chosen for all hunks together, in original line numbers.
//! A hunk never starts before the end of the hunk placed right before it, and
//! takes its first matching candidate that still leaves every later hunk
//! somewhere to go. So a diff that applies at some fuzz factor also applies
//! at any larger one, whatever number of hunks it has.

use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    str::FromStr,
};
use tracing::debug;

/// One line of a hunk body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HunkLine {
    Context(String),
    Delete(String),
    Insert(String),
}

/// Contiguous block of changes in a unified diff.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hunk {
    pub old_start: usize,
    pub old_count: usize,
    pub new_start: usize,
    pub new_count: usize,
    pub lines: Vec<HunkLine>,
}

impl Hunk {
    /// Construct new hunk with an empty body.
    pub fn new(old_start: usize, old_count: usize, new_start: usize, new_count: usize) -> Self {
        Self {
            old_start,
            old_count,
            new_start,
            new_count,
            lines: Vec::new(),
        }
    }

    /// Lines this hunk expects to find in the target, i.e., context and
    /// deleted lines.
    pub fn old_lines(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().filter_map(|line| match line {
            HunkLine::Context(text) | HunkLine::Delete(text) => Some(text.as_str()),
            HunkLine::Insert(_) => None,
        })
    }

    /// Lines this hunk leaves in the target, i.e., context and inserted
    /// lines.
    pub fn new_lines(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().filter_map(|line| match line {
            HunkLine::Context(text) | HunkLine::Insert(text) => Some(text.as_str()),
            HunkLine::Delete(_) => None,
        })
    }

    /// Number of context lines before the first change.
    pub fn leading_context(&self) -> usize {
        self.lines
            .iter()
            .take_while(|line| matches!(line, HunkLine::Context(_)))
            .count()
    }

    /// Number of context lines after the last change.
    pub fn trailing_context(&self) -> usize {
        self.lines
            .iter()
            .rev()
            .take_while(|line| matches!(line, HunkLine::Context(_)))
            .count()
    }

    /// Zero-based line the hunk expects to start at before any shifting.
    pub fn base_anchor(&self) -> usize {
        // INVARIANT: Pure insertions name the line they follow, not the line
        // they replace.
        if self.old_lines().next().is_none() {
            self.old_start
        } else {
            self.old_start.saturating_sub(1)
        }
    }

    fn is_complete(&self) -> bool {
        self.old_lines().count() >= self.old_count && self.new_lines().count() >= self.new_count
    }
}

impl Display for Hunk {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        write!(
            fmt,
            "@@ -{},{} +{},{} @@",
            self.old_start, self.old_count, self.new_start, self.new_count
        )
    }
}

/// Parsed unified diff.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct UnifiedDiff {
    pub hunks: Vec<Hunk>,
}

impl UnifiedDiff {
    /// Hunks sorted by old start line, paired with their one-based position
    /// in the diff text.
    pub fn ordered_hunks(&self) -> Vec<(usize, &Hunk)> {
        let mut hunks = self
            .hunks
            .iter()
            .enumerate()
            .map(|(index, hunk)| (index + 1, hunk))
            .collect::<Vec<_>>();
        hunks.sort_by_key(|(_, hunk)| hunk.old_start);
        hunks
    }
}

impl FromStr for UnifiedDiff {
    type Err = DiffError;

    fn from_str(text: &str) -> Result<Self> {
        let mut hunks = Vec::new();
        let mut current: Option<Hunk> = None;

        for (number, line) in split_lines(text).into_iter().enumerate() {
            if line.starts_with("@@") {
                hunks.extend(current.take());
                let hunk = parse_hunk_header(line).ok_or_else(|| DiffError::MalformedHeader {
                    line: number + 1,
                    header: line.trim_end().to_string(),
                })?;
                current = Some(hunk);
                continue;
            }

            let Some(hunk) = current.as_mut() else {
                // Preamble and file headers carry nothing we need.
                continue;
            };

            // INVARIANT: Only treat header-like lines as headers once the hunk
            // has every line its header promised. Before that, "---" is a
            // deleted line that happens to start with dashes.
            let is_blank = line.trim_end_matches('\r').is_empty();
            if hunk.is_complete() && (is_blank || is_file_header(line)) {
                hunks.extend(current.take());
                continue;
            }

            match line.as_bytes().first() {
                _ if is_blank => hunk.lines.push(HunkLine::Context(line.to_string())),
                Some(b' ') => hunk.lines.push(HunkLine::Context(line[1..].to_string())),
                Some(b'-') => hunk.lines.push(HunkLine::Delete(line[1..].to_string())),
                Some(b'+') => hunk.lines.push(HunkLine::Insert(line[1..].to_string())),
                Some(b'\\') => continue,
                _ => hunks.extend(current.take()),
            }
        }
        hunks.extend(current);

        Ok(Self { hunks })
    }
}

fn is_file_header(line: &str) -> bool {
    line.starts_with("---") || line.starts_with("+++")
}

fn parse_hunk_header(line: &str) -> Option<Hunk> {
    let rest = line.strip_prefix("@@ ")?;
    let (ranges, _) = rest.split_once(" @@")?;
    let (old, new) = ranges.split_once(' ')?;
    let (old_start, old_count) = parse_range(old.strip_prefix('-')?)?;
    let (new_start, new_count) = parse_range(new.strip_prefix('+')?)?;

    Some(Hunk::new(old_start, old_count, new_start, new_count))
}

fn parse_range(range: &str) -> Option<(usize, usize)> {
    match range.split_once(',') {
        Some((start, count)) => Some((start.parse().ok()?, count.parse().ok()?)),
        None => Some((range.parse().ok()?, 1)),
    }
}

/// Split text on `\n`, without producing a trailing empty line.
fn split_lines(text: &str) -> Vec<&str> {
    let mut lines = text.split('\n').collect::<Vec<_>>();
    if lines.last() == Some(&"") {
        lines.pop();
    }
    lines
}

/// Where a hunk landed, in lines of the original content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    /// Zero-based start of the untrimmed hunk.
    pub position: isize,

    /// Distance from the anchor.
    pub offset: isize,

    /// Leading context lines ignored.
    pub trim_leading: usize,

    /// Trailing context lines ignored.
    pub trim_trailing: usize,

    /// Original lines the hunk replaces.
    pub matched: usize,
}

impl Placement {
    /// First original line the hunk replaces.
    pub fn start(&self) -> usize {
        (self.position + self.trim_leading as isize).max(0) as usize
    }

    /// Original line right after the replaced ones.
    pub fn end(&self) -> usize {
        self.start() + self.matched
    }
}

/// What becomes of one hunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HunkPlan {
    Placed(Placement),

    /// Hunk fits nowhere. Original lines `start..end` are where it was
    /// expected.
    Unplaced { start: usize, end: usize },
}

/// Working copy of a file that hunks get applied to one by one.
///
/// Hunks are planned against the original content first, then applied in
/// order. Every position handed to [`HunkApplier::replace`] is a line of the
/// original content, shifted internally by whatever earlier replacements
/// added or removed.
#[derive(Debug, Clone)]
pub struct HunkApplier {
    lines: Vec<String>,
    original_len: usize,
    trailing_newline: bool,
    fuzz_factor: usize,
    delta: isize,
}

impl HunkApplier {
    /// Construct new applier over file content.
    pub fn new(content: &str, fuzz_factor: usize) -> Self {
        let lines = split_lines(content)
            .into_iter()
            .map(str::to_owned)
            .collect::<Vec<_>>();
        Self {
            original_len: lines.len(),
            lines,
            trailing_newline: content.is_empty() || content.ends_with('\n'),
            fuzz_factor,
            delta: 0,
        }
    }

    /// Current working lines.
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Every placement of a hunk in the original content within the fuzz
    /// factor, most preferred first.
    pub fn placements(&self, hunk: &Hunk) -> Vec<Placement> {
        let old = hunk.old_lines().collect::<Vec<_>>();
        let anchor = hunk.base_anchor() as isize;
        let placement = |position: isize, lead: usize, trail: usize| Placement {
            position,
            offset: position - anchor,
            trim_leading: lead,
            trim_trailing: trail,
            matched: old.len() - lead - trail,
        };

        if self.fuzz_factor == 0 {
            return match self.matches_at(&old, anchor, 0, 0) {
                true => vec![placement(anchor, 0, 0)],
                false => Vec::new(),
            };
        }

        let trims = trim_pairs(
            hunk.leading_context().min(self.fuzz_factor),
            hunk.trailing_context().min(self.fuzz_factor),
            old.len(),
        );

        // INVARIANT: Scan outward from the anchor, earlier line first on ties.
        // Every start outside of this radius would put the match past either
        // end of the file.
        let mut found = Vec::new();
        let radius = anchor.abs() + (self.original_len + old.len()) as isize;
        for distance in 0..=radius {
            let candidates = if distance == 0 {
                vec![anchor]
            } else {
                vec![anchor - distance, anchor + distance]
            };

            for position in candidates {
                for &(lead, trail) in &trims {
                    if self.matches_at(&old, position, lead, trail) {
                        found.push(placement(position, lead, trail));
                    }
                }
            }
        }

        found
    }

    /// Most preferred placement of a lone hunk.
    pub fn place(&self, hunk: &Hunk) -> Option<Placement> {
        self.placements(hunk).into_iter().next()
    }

    /// Decide where every hunk goes.
    ///
    /// Hunks must come in application order. Each one takes its most
    /// preferred placement that starts after the previous hunk and still
    /// leaves room for all hunks after it. When no placement leaves room, the
    /// most preferred one is taken anyway and a later hunk ends up unplaced.
    pub fn plan(&self, hunks: &[&Hunk]) -> Vec<HunkPlan> {
        let candidates = hunks
            .iter()
            .map(|hunk| self.placements(hunk))
            .collect::<Vec<_>>();

        let mut floor = 0;
        let mut plans = Vec::with_capacity(hunks.len());
        for (at, hunk) in hunks.iter().enumerate() {
            let rest = &candidates[at + 1..];
            let mut reachable = candidates[at].iter().filter(move |p| p.start() >= floor);
            let chosen = reachable
                .clone()
                .find(|p| leaves_room(rest, p.end()))
                .or_else(|| reachable.next());

            match chosen {
                Some(placement) => {
                    debug!(
                        "{hunk} placed at offset {:+} ignoring {} leading and {} trailing context lines",
                        placement.offset, placement.trim_leading, placement.trim_trailing
                    );
                    floor = placement.end();
                    plans.push(HunkPlan::Placed(*placement));
                }
                None => {
                    let start = hunk.base_anchor().max(floor).min(self.original_len);
                    let end = (start + hunk.old_lines().count()).min(self.original_len);
                    floor = end;
                    plans.push(HunkPlan::Unplaced { start, end });
                }
            }
        }

        plans
    }

    /// Apply hunk at a planned placement.
    pub fn apply(&mut self, hunk: &Hunk, placement: &Placement) {
        let kept = &hunk.lines[placement.trim_leading..hunk.lines.len() - placement.trim_trailing];
        let new = kept
            .iter()
            .filter_map(|line| match line {
                HunkLine::Context(text) | HunkLine::Insert(text) => Some(text.clone()),
                HunkLine::Delete(_) => None,
            })
            .collect::<Vec<_>>();

        self.replace(placement.start(), placement.matched, new);
    }

    /// Working lines that stand where original lines `start..end` were.
    ///
    /// Only meaningful for lines no replacement has touched yet.
    pub fn current(&self, start: usize, end: usize) -> &[String] {
        let (start, end) = self.working_range(start, end);
        &self.lines[start..end]
    }

    /// Replace `len` original lines starting at original line `start`.
    ///
    /// Replacements must come in ascending, non-overlapping order.
    pub fn replace(&mut self, start: usize, len: usize, with: Vec<String>) {
        let (start, end) = self.working_range(start, start + len);
        let added = with.len();
        self.lines.splice(start..end, with);
        self.delta += added as isize - (end - start) as isize;
    }

    /// Render working lines back into file content.
    pub fn finish(self) -> String {
        let mut content = self.lines.join("\n");
        if self.trailing_newline && !self.lines.is_empty() {
            content.push('\n');
        }
        content
    }

    fn working_range(&self, start: usize, end: usize) -> (usize, usize) {
        let len = self.lines.len();
        let start = ((start as isize + self.delta).max(0) as usize).min(len);
        let end = ((end as isize + self.delta).max(0) as usize).clamp(start, len);
        (start, end)
    }

    fn matches_at(&self, old: &[&str], position: isize, lead: usize, trail: usize) -> bool {
        let start = position + lead as isize;
        if start < 0 {
            return false;
        }

        let start = start as usize;
        let kept = &old[lead..old.len() - trail];
        let end = start + kept.len();
        if end > self.lines.len() {
            return false;
        }

        self.lines[start..end]
            .iter()
            .zip(kept)
            .all(|(have, want)| have == want)
    }
}

/// Whether every remaining hunk still finds a place after `floor`.
///
/// Taking the placement that ends earliest never leaves less room for the
/// hunks after it, so the greedy walk answers exactly.
fn leaves_room(rest: &[Vec<Placement>], mut floor: usize) -> bool {
    for candidates in rest {
        let earliest_end = candidates
            .iter()
            .filter(|p| p.start() >= floor)
            .map(Placement::end)
            .min();

        match earliest_end {
            Some(end) => floor = end,
            None => return false,
        }
    }

    true
}

/// Every allowed (leading, trailing) trim, fewest ignored lines first.
fn trim_pairs(max_lead: usize, max_trail: usize, old_len: usize) -> Vec<(usize, usize)> {
    let mut pairs = Vec::new();
    for total in 0..=(max_lead + max_trail) {
        for lead in 0..=total.min(max_lead) {
            let trail = total - lead;
            if trail > max_trail {
                continue;
            }

            // INVARIANT: Keep at least one line to match against.
            if old_len > 0 && lead + trail >= old_len {
                continue;
            }

            pairs.push((lead, trail));
        }
    }
    pairs
}

/// Apply every hunk of a diff to file content.
///
/// # Errors
///
/// - Return [`DiffError::HunkFailed`] for the first hunk that cannot be
///   placed. Nothing is written either way; the caller owns the file.
pub fn apply_hunks(content: &str, diff: &UnifiedDiff, fuzz_factor: usize) -> Result<String> {
    let mut applier = HunkApplier::new(content, fuzz_factor);
    let ordered = diff.ordered_hunks();
    let hunks = ordered.iter().map(|(_, hunk)| *hunk).collect::<Vec<_>>();
    let plans = applier.plan(&hunks);

    for ((index, hunk), plan) in ordered.iter().zip(plans) {
        match plan {
            HunkPlan::Placed(placement) => applier.apply(hunk, &placement),
            HunkPlan::Unplaced { .. } => {
                return Err(DiffError::HunkFailed {
                    index: *index,
                    header: hunk.to_string(),
                })
            }
        }
    }

    Ok(applier.finish())
}

/// Unified diff error types.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum DiffError {
    /// Hunk header could not be parsed.
    #[error("malformed hunk header on line {line}: {header:?}")]
    MalformedHeader { line: usize, header: String },

    /// Hunk does not match the target content within the fuzz factor.
    #[error("Patch failed to apply: hunk #{index} ({header}) does not match target content")]
    HunkFailed { index: usize, header: String },
}

/// Friendly result alias :3
pub type Result<T, E = DiffError> = std::result::Result<T, E>;

// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Keep customizations of an upstream repository as patch sets.
//!
//! A __patch set__ is a directory of files layered on top of a target
//! repository. Plain files are copied over their target, while files ending
//! in `.diff` are unified diffs applied with some tolerance for upstream
//! drift. Patch sets are applied in name order, may carry pre-apply and
//! post-apply hooks, and can each be recorded as a commit in the target
//! repository. Reapplying them after pulling upstream brings the
//! customizations back.
//!
//! # See Also
//!
//! 1. [GNU diffutils - Unified Format](https://www.gnu.org/software/diffutils/manual/html_node/Unified-Format.html)

pub mod apply;
pub mod config;
pub mod git;
pub mod patch;
pub mod prompt;

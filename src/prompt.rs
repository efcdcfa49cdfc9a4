// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! User confirmation.
//!
//! Commit logic asks yes/no questions through [`Confirm`] instead of talking
//! to the terminal itself. The terminal-backed implementation uses
//! [`inquire`], and tests substitute [`ScriptedConfirm`].

use inquire::{Confirm as ConfirmPrompt, InquireError};
use std::{
    collections::VecDeque,
    io::{stdin, stdout, IsTerminal},
};
use tracing::warn;

/// Answer to a confirmation prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    Yes,
    No,

    /// Prompt was dismissed without an answer.
    Cancelled,
}

/// Ability to ask the user a yes/no question.
pub trait Confirm {
    /// Whether a user is around to answer at all.
    fn is_interactive(&self) -> bool;

    /// Ask the question and wait for an answer.
    fn confirm(&mut self, message: &str) -> Confirmation;
}

/// Confirmation through the controlling terminal.
#[derive(Debug, Default)]
pub struct TerminalConfirm;

impl TerminalConfirm {
    pub fn new() -> Self {
        Self
    }
}

impl Confirm for TerminalConfirm {
    fn is_interactive(&self) -> bool {
        stdin().is_terminal() && stdout().is_terminal()
    }

    fn confirm(&mut self, message: &str) -> Confirmation {
        match ConfirmPrompt::new(message).with_default(true).prompt() {
            Ok(true) => Confirmation::Yes,
            Ok(false) => Confirmation::No,
            Err(InquireError::OperationCanceled | InquireError::OperationInterrupted) => {
                Confirmation::Cancelled
            }
            Err(error) => {
                warn!("confirmation prompt failed: {error}");
                Confirmation::Cancelled
            }
        }
    }
}

/// Confirmation that replays canned answers.
///
/// Runs out of answers by cancelling. Every question asked is recorded.
#[derive(Debug, Default, Clone)]
pub struct ScriptedConfirm {
    interactive: bool,
    answers: VecDeque<Confirmation>,
    asked: Vec<String>,
}

impl ScriptedConfirm {
    /// Construct responder that acts like an attached terminal.
    pub fn new(answers: impl IntoIterator<Item = Confirmation>) -> Self {
        Self {
            interactive: true,
            answers: answers.into_iter().collect(),
            asked: Vec::new(),
        }
    }

    /// Construct responder that acts like no terminal is attached.
    pub fn detached() -> Self {
        Self::default()
    }

    /// Questions asked so far.
    pub fn asked(&self) -> &[String] {
        &self.asked
    }
}

impl Confirm for ScriptedConfirm {
    fn is_interactive(&self) -> bool {
        self.interactive
    }

    fn confirm(&mut self, message: &str) -> Confirmation {
        self.asked.push(message.to_string());
        self.answers.pop_front().unwrap_or(Confirmation::Cancelled)
    }
}

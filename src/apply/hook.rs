// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Patch set hooks.
//!
//! A patch set may carry two executables directly inside its directory:
//! `<prefix>pre-apply`, run before any of its files are applied, and
//! `<prefix>post-apply`, run after. The prefix defaults to `patchy-`.
//!
//! Hooks run from the root of the target repository with stdin inherited.
//! Their stdout and stderr are streamed through a spinner that only shows the
//! latest line, unless verbose output was asked for. The following variables
//! are exported to them:
//!
//! - `PATCHY_TARGET_REPO`
//! - `PATCHY_PATCH_SET`
//! - `PATCHY_PATCHES_DIR`
//! - `PATCHY_PATCH_SET_DIR`
//! - `PATCHY_HOOK_TYPE`
//! - `PATCHY_BASE_REVISION`, when known

use indicatif::{ProgressBar, ProgressStyle};
use std::{
    collections::HashSet,
    ffi::OsString,
    fmt::{Display, Formatter, Result as FmtResult},
    fs::metadata,
    io::{BufRead, BufReader, Read},
    path::{Path, PathBuf},
    process::{Command, ExitStatus, Stdio},
    sync::mpsc::{channel, Sender},
    thread::{self, JoinHandle},
    time::Duration,
};
use tracing::{debug, instrument};

/// When a hook runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookKind {
    PreApply,
    PostApply,
}

impl HookKind {
    /// File name of this hook under a prefix.
    pub fn file_name(self, prefix: &str) -> String {
        format!("{prefix}{self}")
    }
}

impl Display for HookKind {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(match self {
            Self::PreApply => "pre-apply",
            Self::PostApply => "post-apply",
        })
    }
}

/// File names that are hooks under a prefix.
pub fn hook_file_names(prefix: &str) -> HashSet<String> {
    [HookKind::PreApply, HookKind::PostApply]
        .into_iter()
        .map(|kind| kind.file_name(prefix))
        .collect()
}

/// Hook found in a patch set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookInfo {
    pub path: PathBuf,
    pub name: String,
    pub kind: HookKind,
}

/// Hooks of one patch set.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PatchSetHooks {
    pub pre_apply: Option<HookInfo>,
    pub post_apply: Option<HookInfo>,
}

impl PatchSetHooks {
    /// Look up hooks inside a patch set directory.
    ///
    /// # Errors
    ///
    /// - Return [`HookError::NotExecutable`] if a hook file exists but cannot
    ///   be executed.
    /// - Return [`HookError::Metadata`] if a hook file cannot be inspected.
    pub fn find(set_dir: impl AsRef<Path>, prefix: &str) -> Result<Self> {
        Ok(Self {
            pre_apply: find_hook(set_dir.as_ref(), prefix, HookKind::PreApply)?,
            post_apply: find_hook(set_dir.as_ref(), prefix, HookKind::PostApply)?,
        })
    }
}

fn find_hook(set_dir: &Path, prefix: &str, kind: HookKind) -> Result<Option<HookInfo>> {
    let name = kind.file_name(prefix);
    let path = set_dir.join(&name);
    if !path.is_file() {
        return Ok(None);
    }

    let meta = metadata(&path).map_err(|err| HookError::Metadata {
        source: err,
        path: path.clone(),
    })?;
    if !is_executable(&meta) {
        return Err(HookError::NotExecutable { path });
    }

    Ok(Some(HookInfo { path, name, kind }))
}

#[cfg(unix)]
fn is_executable(meta: &std::fs::Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;
    meta.permissions().mode() & 0o111 != 0
}

#[cfg(not(unix))]
fn is_executable(_meta: &std::fs::Metadata) -> bool {
    true
}

/// Environment handed to hooks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookEnv {
    pub target_repo: PathBuf,
    pub patch_set: String,
    pub patches_dir: PathBuf,
    pub patch_set_dir: PathBuf,
    pub base_revision: Option<String>,
}

impl HookEnv {
    /// Variables to export to a hook of a given kind.
    pub fn vars(&self, kind: HookKind) -> Vec<(&'static str, OsString)> {
        let mut vars = vec![
            ("PATCHY_TARGET_REPO", self.target_repo.clone().into_os_string()),
            ("PATCHY_PATCH_SET", OsString::from(&self.patch_set)),
            ("PATCHY_PATCHES_DIR", self.patches_dir.clone().into_os_string()),
            ("PATCHY_PATCH_SET_DIR", self.patch_set_dir.clone().into_os_string()),
            ("PATCHY_HOOK_TYPE", OsString::from(kind.to_string())),
        ];

        if let Some(revision) = &self.base_revision {
            vars.push(("PATCHY_BASE_REVISION", OsString::from(revision)));
        }

        vars
    }
}

/// How a failed hook ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookExit {
    Code(i32),
    Signal(i32),
}

impl Display for HookExit {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Code(code) => write!(fmt, "exited with code {code}"),
            Self::Signal(signal) => write!(fmt, "terminated by signal {signal}"),
        }
    }
}

/// Result of running a hook to completion.
#[derive(Debug)]
pub enum HookOutcome {
    Success,
    Failed(HookExit),
    SpawnError(std::io::Error),
}

impl HookOutcome {
    /// Turn anything but success into an error naming the hook.
    pub fn into_result(self, hook: &HookInfo) -> Result<()> {
        match self {
            Self::Success => Ok(()),
            Self::Failed(exit) => Err(HookError::Failed {
                name: hook.name.clone(),
                exit,
            }),
            Self::SpawnError(source) => Err(HookError::Spawn {
                name: hook.name.clone(),
                source,
            }),
        }
    }
}

/// Run hook and block until it exits.
///
/// No timeout is imposed. A hook that never exits blocks the run.
#[instrument(skip(hook, env), fields(name = %hook.name), level = "debug")]
pub fn run_hook(hook: &HookInfo, env: &HookEnv, verbose: bool) -> HookOutcome {
    let mut command = Command::new(&hook.path);
    command
        .current_dir(&env.target_repo)
        .envs(env.vars(hook.kind))
        .stdin(Stdio::inherit())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let mut child = match command.spawn() {
        Ok(child) => child,
        Err(err) => return HookOutcome::SpawnError(err),
    };

    // INVARIANT: Drain stdout and stderr side by side, so a hook that fills
    // one pipe never stalls while we wait on the other.
    let (sender, receiver) = channel();
    let readers = [
        child.stdout.take().map(|out| forward_lines(out, sender.clone())),
        child.stderr.take().map(|err| forward_lines(err, sender.clone())),
    ];
    drop(sender);

    let mut console = HookConsole::start(hook, verbose);
    for line in receiver {
        console.line(line);
    }
    for reader in readers.into_iter().flatten() {
        let _ = reader.join();
    }

    let outcome = match child.wait() {
        Ok(status) => classify(status),
        Err(err) => HookOutcome::SpawnError(err),
    };
    debug!("hook finished: {outcome:?}");
    console.finish(&outcome);

    outcome
}

fn forward_lines(stream: impl Read + Send + 'static, sender: Sender<String>) -> JoinHandle<()> {
    thread::spawn(move || {
        for chunk in BufReader::new(stream).split(b'\n') {
            let Ok(chunk) = chunk else { break };
            let line = String::from_utf8_lossy(&chunk).trim_end_matches('\r').to_string();
            if sender.send(line).is_err() {
                break;
            }
        }
    })
}

fn classify(status: ExitStatus) -> HookOutcome {
    if status.success() {
        return HookOutcome::Success;
    }

    match (status.code(), signal_of(&status)) {
        (Some(code), _) => HookOutcome::Failed(HookExit::Code(code)),
        (None, Some(signal)) => HookOutcome::Failed(HookExit::Signal(signal)),
        (None, None) => HookOutcome::Failed(HookExit::Code(-1)),
    }
}

#[cfg(unix)]
fn signal_of(status: &ExitStatus) -> Option<i32> {
    use std::os::unix::process::ExitStatusExt;
    status.signal()
}

#[cfg(not(unix))]
fn signal_of(_status: &ExitStatus) -> Option<i32> {
    None
}

/// Collapsible view of hook output.
struct HookConsole {
    bar: ProgressBar,
    name: String,
    verbose: bool,
    lines: Vec<String>,
}

impl HookConsole {
    fn start(hook: &HookInfo, verbose: bool) -> Self {
        let style = ProgressStyle::with_template("  {spinner:.cyan} {prefix}  {wide_msg:.dim}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        let bar = ProgressBar::new_spinner()
            .with_style(style)
            .with_prefix(hook.name.clone());
        bar.enable_steady_tick(Duration::from_millis(100));

        Self {
            bar,
            name: hook.name.clone(),
            verbose,
            lines: Vec::new(),
        }
    }

    fn line(&mut self, line: String) {
        if self.verbose {
            self.bar.suspend(|| println!("  │ {line}"));
        }
        self.bar.set_message(line.clone());
        self.lines.push(line);
    }

    fn finish(self, outcome: &HookOutcome) {
        self.bar.finish_and_clear();
        match outcome {
            HookOutcome::Success => println!("  ✔ {}", self.name),
            HookOutcome::Failed(exit) => {
                // INVARIANT: Expand collapsed output on failure, unless it was
                // already printed in full.
                if !self.verbose {
                    for line in &self.lines {
                        eprintln!("  │ {line}");
                    }
                }
                eprintln!("  ✖ {} {exit}", self.name);
            }
            HookOutcome::SpawnError(err) => eprintln!("  ✖ {} could not run: {err}", self.name),
        }
    }
}

/// Hook error types.
#[derive(Debug, thiserror::Error)]
pub enum HookError {
    /// Hook file exists but lacks execute permission.
    #[error("hook {:?} is not executable, run `chmod +x {}` to fix it", path.display(), path.display())]
    NotExecutable { path: PathBuf },

    /// Hook file cannot be inspected.
    #[error("failed to inspect hook {:?}", path.display())]
    Metadata {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Hook ran but did not succeed.
    #[error("hook {name} {exit}")]
    Failed { name: String, exit: HookExit },

    /// Hook process could not be started or waited on.
    #[error("failed to run hook {name}")]
    Spawn {
        name: String,
        #[source]
        source: std::io::Error,
    },
}

/// Friendly result alias :3
pub type Result<T, E = HookError> = std::result::Result<T, E>;

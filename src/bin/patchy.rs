// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use patchy::{
    apply::{apply, ApplyOptions},
    config::{AutoCommitMode, ConflictMode, PatchyConfig, DEFAULT_CONFIG_FILE},
    git::LazyGit2Client,
    prompt::TerminalConfirm,
};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::{
    env::current_dir,
    fs::read_to_string,
    io::ErrorKind,
    path::{Path, PathBuf},
    process::exit,
};
use tracing::{debug, error};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, Clone, Parser)]
#[command(
    about,
    override_usage = "patchy [options] <patchy-command>",
    subcommand_help_heading = "Commands",
    version
)]
struct Cli {
    /// Path to configuration file instead of ./patchy.toml.
    #[arg(short, long, global = true, value_name = "path")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    fn verbose(&self) -> bool {
        match &self.command {
            Command::Apply(opts) => opts.verbose,
        }
    }

    fn run(self) -> Result<bool> {
        let config = load_config(self.config.as_deref())?;
        match self.command {
            Command::Apply(opts) => run_apply(config, opts),
        }
    }
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Apply patch sets to target repository.
    #[command(override_usage = "patchy apply [options]")]
    Apply(ApplyArgs),
}

#[derive(Args, Clone, Debug)]
#[command(author, about, long_about)]
struct ApplyArgs {
    /// Apply only this patch set.
    #[arg(long, value_name = "name")]
    pub only: Option<String>,

    /// Apply patch sets up to and including this one.
    #[arg(long, value_name = "name")]
    pub until: Option<String>,

    /// Show what would be applied without changing anything.
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Print every applied file and hook output line.
    #[arg(short, long)]
    pub verbose: bool,

    /// Number of context lines a hunk may drop to find its place.
    #[arg(short, long, value_name = "n")]
    pub fuzz_factor: Option<usize>,

    /// Commit behavior: all, off, skip-last, or interactive.
    #[arg(long, value_name = "mode")]
    pub auto_commit: Option<AutoCommitMode>,

    /// Commit every patch set, including the last one.
    #[arg(short, long)]
    pub all: bool,

    /// Leave the last patch set uncommitted for editing.
    #[arg(short, long)]
    pub edit: bool,

    /// Handling of hunks that do not apply: error or conflict-marker.
    #[arg(long, value_name = "mode")]
    pub conflict_mode: Option<ConflictMode>,

    /// Repository to apply patch sets to.
    #[arg(long, value_name = "path")]
    pub target_repo: Option<PathBuf>,

    /// Directory holding patch sets.
    #[arg(long, value_name = "path")]
    pub patches_dir: Option<PathBuf>,

    /// Prefix of hook file names inside patch sets.
    #[arg(long, value_name = "prefix")]
    pub hook_prefix: Option<String>,

    /// Upstream revision patch sets were written against.
    #[arg(long = "ref", value_name = "revision")]
    pub base_revision: Option<String>,
}

fn main() {
    let cli = Cli::parse();

    let layer = fmt::layer()
        .compact()
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr);
    let default_level = if cli.verbose() { "info" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::registry()
        .with(layer)
        .with(filter)
        .init();

    match cli.run() {
        Ok(true) => exit(0),
        Ok(false) => exit(1),
        Err(error) => {
            error!("{error:#}");
            exit(1);
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<PatchyConfig> {
    let cwd = current_dir().context("cannot determine current directory")?;
    let (path, required) = match path {
        Some(path) => (path.to_path_buf(), true),
        None => (cwd.join(DEFAULT_CONFIG_FILE), false),
    };

    let mut config = match read_to_string(&path) {
        Ok(data) => data
            .parse::<PatchyConfig>()
            .with_context(|| format!("invalid configuration in {:?}", path.display()))?,
        Err(err) if err.kind() == ErrorKind::NotFound && !required => {
            debug!("no configuration file at {:?}, using defaults", path.display());
            PatchyConfig::default()
        }
        Err(err) => {
            return Err(err).with_context(|| format!("failed to read {:?}", path.display()))
        }
    };
    config.resolve_paths(&cwd);

    Ok(config)
}

fn run_apply(mut config: PatchyConfig, opts: ApplyArgs) -> Result<bool> {
    let cwd = current_dir().context("cannot determine current directory")?;
    if let Some(path) = opts.target_repo {
        config.target_repo = cwd.join(path);
    }
    if let Some(path) = opts.patches_dir {
        config.patches_dir = cwd.join(path);
    }
    if let Some(prefix) = opts.hook_prefix {
        config.hook_prefix = prefix;
    }
    if let Some(revision) = opts.base_revision {
        config.base_revision = Some(revision);
    }
    if let Some(fuzz_factor) = opts.fuzz_factor {
        config.fuzz_factor = fuzz_factor;
    }
    if let Some(mode) = opts.auto_commit {
        config.auto_commit = mode;
    }
    if let Some(mode) = opts.conflict_mode {
        config.conflict_mode = mode;
    }
    config.verbose |= opts.verbose;
    config.validate()?;

    let options = ApplyOptions {
        only: opts.only,
        until: opts.until,
        all: opts.all,
        edit: opts.edit,
        dry_run: opts.dry_run,
        ..ApplyOptions::from_config(&config)
    };

    let git = LazyGit2Client::new(&options.target_repo);
    let mut confirm = TerminalConfirm::new();
    let summary = apply(&options, &git, &mut confirm)?;

    if let Some(report) = summary.conflict_report() {
        println!("{report}");
    }

    if summary.has_errors() {
        eprintln!("{summary}");
        return Ok(false);
    }
    println!("{summary}");

    Ok(true)
}

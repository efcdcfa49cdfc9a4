// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Git client for the target repository.
//!
//! Patchy only needs three things from Git: whether the working tree is
//! clean, staging everything a patch set touched, and committing it. Those
//! are modeled by [`GitClient`] so that commit logic can be exercised without
//! a real repository. [`LazyGit2Client`] defers opening the repository until
//! Git is actually needed.

use git2::{IndexAddOption, Repository, Signature, Status, StatusOptions};
use std::{
    cell::OnceCell,
    path::{Path, PathBuf},
};
use tracing::{debug, instrument};

/// Layer of indirection for Git access.
pub trait GitClient {
    /// List paths with staged, unstaged, or untracked changes.
    fn status(&self) -> Result<Vec<PathBuf>>;

    /// Stage every change under a pathspec, including removals.
    fn add(&self, pathspec: &str) -> Result<()>;

    /// Commit the index on top of HEAD.
    fn commit(&self, message: &str) -> Result<()>;
}

/// Git access through libgit2.
pub struct Git2Client {
    repository: Repository,
}

impl Git2Client {
    /// Open repository at target path.
    ///
    /// # Errors
    ///
    /// - Return [`GitError::Open`] if no repository lives at the path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let repository = Repository::open(path.as_ref()).map_err(|err| GitError::Open {
            source: err,
            path: path.as_ref().to_path_buf(),
        })?;

        Ok(Self { repository })
    }

    // INVARIANT: Fall back to a fixed identity when none is configured, so
    // fresh CI machines can still record patch set commits.
    fn signature(&self) -> Result<Signature<'static>> {
        match self.repository.signature() {
            Ok(signature) => Ok(signature),
            Err(_) => Ok(Signature::now("patchy", "patchy@localhost")?),
        }
    }
}

impl GitClient for Git2Client {
    #[instrument(skip(self), level = "debug")]
    fn status(&self) -> Result<Vec<PathBuf>> {
        let mut opts = StatusOptions::new();
        opts.include_untracked(true)
            .recurse_untracked_dirs(true)
            .include_ignored(false)
            .exclude_submodules(true);

        let statuses = self.repository.statuses(Some(&mut opts))?;
        let paths = statuses
            .iter()
            .filter(|entry| entry.status() != Status::CURRENT && !entry.status().is_ignored())
            .filter_map(|entry| entry.path().map(PathBuf::from))
            .collect::<Vec<_>>();
        debug!("{} changed paths", paths.len());

        Ok(paths)
    }

    #[instrument(skip(self), level = "debug")]
    fn add(&self, pathspec: &str) -> Result<()> {
        let mut index = self.repository.index()?;
        index.add_all([pathspec], IndexAddOption::DEFAULT, None)?;
        index.update_all([pathspec], None)?;
        index.write()?;

        Ok(())
    }

    #[instrument(skip(self), level = "debug")]
    fn commit(&self, message: &str) -> Result<()> {
        let mut index = self.repository.index()?;
        let tree_oid = index.write_tree()?;
        let tree = self.repository.find_tree(tree_oid)?;
        let signature = self.signature()?;

        // INVARIANT: Append to HEAD when it exists, otherwise make a root commit.
        let mut parents = Vec::new();
        if let Some(oid) = self.repository.head().ok().and_then(|head| head.target()) {
            parents.push(self.repository.find_commit(oid)?);
        }
        let parents = parents.iter().collect::<Vec<_>>();

        let oid = self.repository.commit(
            Some("HEAD"),
            &signature,
            &signature,
            message,
            &tree,
            &parents,
        )?;
        debug!("committed {oid}");

        Ok(())
    }
}

/// [`Git2Client`] that opens the repository on first use.
///
/// Runs that never touch Git, like ones with no patch sets to apply, work
/// even when the target is not a repository.
pub struct LazyGit2Client {
    path: PathBuf,
    client: OnceCell<Git2Client>,
}

impl LazyGit2Client {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            client: OnceCell::new(),
        }
    }

    fn client(&self) -> Result<&Git2Client> {
        if let Some(client) = self.client.get() {
            return Ok(client);
        }

        debug!("open repository at {:?}", self.path.display());
        let client = Git2Client::open(&self.path)?;
        Ok(self.client.get_or_init(|| client))
    }
}

impl GitClient for LazyGit2Client {
    fn status(&self) -> Result<Vec<PathBuf>> {
        self.client()?.status()
    }

    fn add(&self, pathspec: &str) -> Result<()> {
        self.client()?.add(pathspec)
    }

    fn commit(&self, message: &str) -> Result<()> {
        self.client()?.commit(message)
    }
}

/// Git error types.
#[derive(Debug, thiserror::Error)]
pub enum GitError {
    /// Target path is not a repository.
    #[error("failed to open git repository at {:?}", path.display())]
    Open {
        #[source]
        source: git2::Error,
        path: PathBuf,
    },

    /// Operations from libgit2 fail.
    #[error(transparent)]
    Git2(#[from] git2::Error),
}

/// Friendly result alias :3
pub type Result<T, E = GitError> = std::result::Result<T, E>;

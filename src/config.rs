// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Configuration layout.
//!
//! Specify the layout of the `patchy.toml` configuration file that Patchy
//! reads before applying patch sets. File I/O is left to the caller to figure
//! out, and command-line flags are expected to override whatever is parsed
//! here.
//!
//! # General Layout
//!
//! Every key is optional. Missing keys fall back to the defaults listed on
//! [`PatchyConfig`]:
//!
//! ```toml
//! target_repo = "~/src/upstream"
//! patches_dir = "./patches"
//! ref = "v1.2.0"
//! hook_prefix = "patchy-"
//! fuzz_factor = 2
//! auto_commit = "interactive"
//! conflict_mode = "error"
//! verbose = false
//! ```

use serde::{Deserialize, Serialize};
use std::{
    fmt::{Display, Error as FmtError, Formatter, Result as FmtResult},
    path::{Path, PathBuf},
    str::FromStr,
};

/// Default prefix that names hook files inside a patch set.
pub const DEFAULT_HOOK_PREFIX: &str = "patchy-";

/// Default tolerance used when hunks no longer line up with their target.
pub const DEFAULT_FUZZ_FACTOR: usize = 2;

/// Default name of the configuration file looked up in the current directory.
pub const DEFAULT_CONFIG_FILE: &str = "patchy.toml";

/// Patchy configuration file layout.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct PatchyConfig {
    /// Repository that patch sets get applied to. Defaults to `.`.
    pub target_repo: PathBuf,

    /// Directory holding one sub-directory per patch set. Defaults to
    /// `./patches`.
    pub patches_dir: PathBuf,

    /// Upstream revision the patch sets were written against, if known.
    #[serde(rename = "ref", skip_serializing_if = "Option::is_none")]
    pub base_revision: Option<String>,

    /// Prefix of `pre-apply` and `post-apply` hook file names.
    pub hook_prefix: String,

    /// Context drift tolerance for diff hunks.
    pub fuzz_factor: usize,

    /// How commits are made after each patch set.
    pub auto_commit: AutoCommitMode,

    /// What to do with hunks that cannot be placed.
    pub conflict_mode: ConflictMode,

    /// Print every file and hook line while applying.
    pub verbose: bool,
}

impl Default for PatchyConfig {
    fn default() -> Self {
        Self {
            target_repo: PathBuf::from("."),
            patches_dir: PathBuf::from("./patches"),
            base_revision: None,
            hook_prefix: DEFAULT_HOOK_PREFIX.into(),
            fuzz_factor: DEFAULT_FUZZ_FACTOR,
            auto_commit: AutoCommitMode::default(),
            conflict_mode: ConflictMode::default(),
            verbose: false,
        }
    }
}

impl PatchyConfig {
    /// Resolve relative paths against a base directory.
    ///
    /// Paths that are already absolute are left as-is.
    pub fn resolve_paths(&mut self, base: impl AsRef<Path>) {
        if self.target_repo.is_relative() {
            self.target_repo = base.as_ref().join(&self.target_repo);
        }

        if self.patches_dir.is_relative() {
            self.patches_dir = base.as_ref().join(&self.patches_dir);
        }
    }

    /// Check settings that serde cannot check on its own.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError::InvalidHookPrefix`] if the hook prefix contains
    ///   a path separator.
    pub fn validate(&self) -> Result<()> {
        if self.hook_prefix.contains(['/', std::path::MAIN_SEPARATOR]) {
            return Err(ConfigError::InvalidHookPrefix(self.hook_prefix.clone()));
        }

        Ok(())
    }
}

impl FromStr for PatchyConfig {
    type Err = ConfigError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let mut config: PatchyConfig = toml::de::from_str(data).map_err(ConfigError::Deserialize)?;

        // INVARIANT: Perform shell expansion on every path field.
        config.target_repo = expand_path(&config.target_repo)?;
        config.patches_dir = expand_path(&config.patches_dir)?;

        config.validate()?;

        Ok(config)
    }
}

impl Display for PatchyConfig {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(
            toml::ser::to_string_pretty(self)
                .map_err(ConfigError::Serialize)?
                .as_str(),
        )
    }
}

fn expand_path(path: &Path) -> Result<PathBuf> {
    Ok(PathBuf::from(
        shellexpand::full(path.to_string_lossy().as_ref())
            .map_err(ConfigError::ShellExpansion)?
            .into_owned(),
    ))
}

/// Commit behavior after each patch set.
///
/// | mode          | not last set | last set                  |
/// |---------------|--------------|---------------------------|
/// | `all`         | commit       | commit                    |
/// | `off`         | skip         | skip                      |
/// | `skip-last`   | commit       | skip                      |
/// | `interactive` | commit       | prompt                    |
#[derive(Default, Debug, PartialEq, Eq, Clone, Copy, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum AutoCommitMode {
    All,
    Off,
    SkipLast,
    #[default]
    Interactive,
}

impl FromStr for AutoCommitMode {
    type Err = ConfigError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        match data {
            "all" => Ok(Self::All),
            "off" => Ok(Self::Off),
            "skip-last" => Ok(Self::SkipLast),
            "interactive" => Ok(Self::Interactive),
            other => Err(ConfigError::UnknownAutoCommitMode(other.into())),
        }
    }
}

impl Display for AutoCommitMode {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(match self {
            Self::All => "all",
            Self::Off => "off",
            Self::SkipLast => "skip-last",
            Self::Interactive => "interactive",
        })
    }
}

/// Handling of hunks that cannot be placed in their target file.
#[derive(Default, Debug, PartialEq, Eq, Clone, Copy, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConflictMode {
    /// Fail the file and leave it untouched.
    #[default]
    Error,

    /// Write the file with conflict markers around every failed hunk.
    ConflictMarker,
}

impl FromStr for ConflictMode {
    type Err = ConfigError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        match data {
            "error" => Ok(Self::Error),
            "conflict-marker" => Ok(Self::ConflictMarker),
            other => Err(ConfigError::UnknownConflictMode(other.into())),
        }
    }
}

impl Display for ConflictMode {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(match self {
            Self::Error => "error",
            Self::ConflictMarker => "conflict-marker",
        })
    }
}

/// Configuration error types.
#[derive(Clone, Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to deserialize configuration.
    #[error(transparent)]
    Deserialize(#[from] toml::de::Error),

    /// Failed to serialize configuration.
    #[error(transparent)]
    Serialize(#[from] toml::ser::Error),

    /// Failed to perform shell expansion on configuration.
    #[error(transparent)]
    ShellExpansion(#[from] shellexpand::LookupError<std::env::VarError>),

    /// Auto-commit mode is not one of the known modes.
    #[error("unknown auto-commit mode {0:?}, expected one of: all, off, skip-last, interactive")]
    UnknownAutoCommitMode(String),

    /// Conflict mode is not one of the known modes.
    #[error("unknown conflict mode {0:?}, expected one of: error, conflict-marker")]
    UnknownConflictMode(String),

    /// Hook prefix would name a file outside of the patch set directory.
    #[error("hook prefix {0:?} must not contain a path separator")]
    InvalidHookPrefix(String),
}

impl From<ConfigError> for FmtError {
    fn from(_: ConfigError) -> Self {
        FmtError
    }
}

/// Friendly result alias :3
type Result<T, E = ConfigError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use pretty_assertions::assert_eq;
    use sealed_test::prelude::*;
    use simple_test_case::test_case;

    #[sealed_test(env = [("UPSTREAM", "/home/blah/upstream")])]
    fn deserialize_patchy_config() -> anyhow::Result<()> {
        let result: PatchyConfig = r#"
            target_repo = "$UPSTREAM"
            patches_dir = "patches"
            ref = "v1.2.0"
            hook_prefix = "fork-"
            fuzz_factor = 3
            auto_commit = "skip-last"
            conflict_mode = "conflict-marker"
            verbose = true
        "#
        .parse()?;

        let expect = PatchyConfig {
            target_repo: PathBuf::from("/home/blah/upstream"),
            patches_dir: PathBuf::from("patches"),
            base_revision: Some("v1.2.0".into()),
            hook_prefix: "fork-".into(),
            fuzz_factor: 3,
            auto_commit: AutoCommitMode::SkipLast,
            conflict_mode: ConflictMode::ConflictMarker,
            verbose: true,
        };

        assert_eq!(result, expect);

        Ok(())
    }

    #[test]
    fn deserialize_empty_config_uses_defaults() -> anyhow::Result<()> {
        let result: PatchyConfig = "".parse()?;
        assert_eq!(result, PatchyConfig::default());
        assert_eq!(result.hook_prefix, "patchy-");
        assert_eq!(result.fuzz_factor, 2);
        assert_eq!(result.auto_commit, AutoCommitMode::Interactive);

        Ok(())
    }

    #[test]
    fn reject_unknown_keys() {
        let result = "repo_url = \"https://blah.org/foo.git\"".parse::<PatchyConfig>();
        assert!(matches!(result, Err(ConfigError::Deserialize(_))));
    }

    #[test]
    fn reject_hook_prefix_with_separator() {
        let result = "hook_prefix = \"hooks/\"".parse::<PatchyConfig>();
        assert!(matches!(result, Err(ConfigError::InvalidHookPrefix(_))));
    }

    #[test]
    fn serialize_patchy_config() {
        let result = PatchyConfig {
            target_repo: PathBuf::from("/home/blah/upstream"),
            base_revision: Some("main".into()),
            ..Default::default()
        }
        .to_string();

        let expect = indoc! {r#"
            target_repo = "/home/blah/upstream"
            patches_dir = "./patches"
            ref = "main"
            hook_prefix = "patchy-"
            fuzz_factor = 2
            auto_commit = "interactive"
            conflict_mode = "error"
            verbose = false
        "#};

        assert_eq!(result, expect);
    }

    #[test]
    fn resolve_relative_paths() {
        let mut config = PatchyConfig {
            target_repo: PathBuf::from("/abs/upstream"),
            ..Default::default()
        };
        config.resolve_paths("/work");

        assert_eq!(config.target_repo, PathBuf::from("/abs/upstream"));
        assert_eq!(config.patches_dir, PathBuf::from("/work/./patches"));
    }

    #[test_case("all", AutoCommitMode::All; "all")]
    #[test_case("off", AutoCommitMode::Off; "off")]
    #[test_case("skip-last", AutoCommitMode::SkipLast; "skip last")]
    #[test_case("interactive", AutoCommitMode::Interactive; "interactive")]
    #[test]
    fn parse_auto_commit_mode(input: &str, expect: AutoCommitMode) -> anyhow::Result<()> {
        let result: AutoCommitMode = input.parse()?;
        pretty_assertions::assert_eq!(result, expect);
        pretty_assertions::assert_eq!(result.to_string(), input);

        Ok(())
    }

    #[test]
    fn reject_unknown_auto_commit_mode() {
        let result = "sometimes".parse::<AutoCommitMode>();
        assert!(matches!(result, Err(ConfigError::UnknownAutoCommitMode(_))));
    }
}

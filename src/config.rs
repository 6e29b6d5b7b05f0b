//! Configuration for pumlgen paths.
//!
//! The hook only supports running under pre-commit: pre-commit exports
//! `PRE_COMMIT` and installs hooks into a managed virtualenv, so the jar
//! cache lives at `$VIRTUAL_ENV/bin/plantuml.jar`. All environment access
//! happens here; the rest of the crate receives an explicit [`Config`].

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Errors resolving the hook environment. Fatal before any work starts.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("not running under pre-commit (PRE_COMMIT is not set)")]
    NotPreCommit,

    #[error("VIRTUAL_ENV is not set; cannot locate the jar cache directory")]
    MissingVirtualEnv,
}

/// Resolved configuration with the artifact install directory.
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory holding the cached PlantUML jar.
    pub install_dir: PathBuf,
}

impl Config {
    /// Resolve the config from the pre-commit environment.
    ///
    /// Both `PRE_COMMIT` and `VIRTUAL_ENV` must be present; neither is
    /// defaulted.
    pub fn from_env() -> Result<Self, ConfigError> {
        if std::env::var_os("PRE_COMMIT").is_none() {
            return Err(ConfigError::NotPreCommit);
        }

        let venv = std::env::var_os("VIRTUAL_ENV").ok_or(ConfigError::MissingVirtualEnv)?;
        Ok(Self::with_install_dir(Path::new(&venv).join("bin")))
    }

    /// Build a config with an explicit install directory (used by tests).
    pub fn with_install_dir(install_dir: impl Into<PathBuf>) -> Self {
        Self {
            install_dir: install_dir.into(),
        }
    }

    /// Local path for the cached jar.
    pub fn jar_path(&self) -> PathBuf {
        self.install_dir.join("plantuml.jar")
    }
}

//! Runtime configuration: global CLI flags layered over environment
//! variables and defaults.

use std::path::{Path, PathBuf};

use crate::logging::LogLevel;

pub const DB_PATH_ENV: &str = "ARBOR_DB_PATH";
pub const OWNER_ENV: &str = "ARBOR_OWNER";

/// Global flags as parsed from the command line.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub db: Option<PathBuf>,
    pub json: bool,
    pub no_color: bool,
    pub owner: Option<String>,
    pub log_level: Option<LogLevel>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub db_path: PathBuf,
    pub json: bool,
    /// Set by `--no-color` only; env and TTY checks happen in the printer.
    pub no_color: bool,
    /// Acting party recorded as owner of containers created by this process.
    pub owner: String,
    pub log_level: Option<LogLevel>,
}

impl Config {
    /// Resolve against the process environment and current directory.
    pub fn from_env(overrides: Overrides) -> Self {
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self::resolve(overrides, &cwd, |key| std::env::var(key).ok())
    }

    /// Resolution order:
    /// - db path: `--db` > `ARBOR_DB_PATH` > `<cwd>/.arbor/tasks.db`
    /// - owner: `--owner` > `ARBOR_OWNER` > `USER` > `"unknown"`
    pub fn resolve(
        overrides: Overrides,
        cwd: &Path,
        env: impl Fn(&str) -> Option<String>,
    ) -> Self {
        let non_empty = |key: &str| env(key).filter(|v| !v.trim().is_empty());

        let db_path = overrides
            .db
            .or_else(|| non_empty(DB_PATH_ENV).map(PathBuf::from))
            .unwrap_or_else(|| default_db_path(cwd));

        let owner = overrides
            .owner
            .filter(|o| !o.trim().is_empty())
            .or_else(|| non_empty(OWNER_ENV))
            .or_else(|| non_empty("USER"))
            .unwrap_or_else(|| "unknown".to_string());

        Self {
            db_path,
            json: overrides.json,
            no_color: overrides.no_color,
            owner,
            log_level: overrides.log_level,
        }
    }
}

pub fn default_db_path(base: &Path) -> PathBuf {
    base.join(".arbor").join("tasks.db")
}

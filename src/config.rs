//! File locations for the two documents.

use std::path::PathBuf;

/// Default tasks document, relative to the working directory.
pub const DEFAULT_TASKS_FILE: &str = "simple-taskmanager/tasks.json";
/// Default definitions document, relative to the working directory.
pub const DEFAULT_DEFINITIONS_FILE: &str = "simple-taskmanager/definitions.json";

/// Where the tasks and definitions documents live.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    /// From `TASKS_FILE_PATH`.
    pub tasks_file: PathBuf,
    /// From `DEFINITIONS_FILE_PATH`.
    pub definitions_file: PathBuf,
}

impl Config {
    /// Load paths from environment variables, falling back to the defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let path = |key: &str, default: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(default))
        };
        Self {
            tasks_file: path("TASKS_FILE_PATH", DEFAULT_TASKS_FILE),
            definitions_file: path("DEFINITIONS_FILE_PATH", DEFAULT_DEFINITIONS_FILE),
        }
    }

    /// Override either path, e.g. from command-line flags.
    pub fn with_overrides(mut self, tasks_file: Option<PathBuf>, definitions_file: Option<PathBuf>) -> Self {
        if let Some(path) = tasks_file {
            self.tasks_file = path;
        }
        if let Some(path) = definitions_file {
            self.definitions_file = path;
        }
        self
    }
}

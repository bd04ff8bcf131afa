//! Task and definitions stores plus the handle that owns both.

mod definitions;
mod persistence;
mod tasks;

pub use definitions::DefinitionsStore;
pub use persistence::{InMemory, JsonFile, Persistence};
pub use tasks::TaskStore;

use crate::config::Config;
use crate::error::Result;
use crate::models::{DefinitionsDocument, InitReport, TasksDocument};
use crate::validation::{self, ValidationReport};

/// Non-blocking findings are logged where they are raised.
fn log_warnings(warnings: &[String]) {
    for warning in warnings {
        tracing::warn!("{}", warning);
    }
}

/// Both stores, constructed once per process and shared by every surface.
///
/// Cloning is cheap; clones share the same documents.
#[derive(Clone)]
pub struct Workspace {
    pub tasks: TaskStore,
    pub definitions: DefinitionsStore,
}

/// A context to create during project initialization.
#[derive(Debug, Clone)]
pub struct ContextInit {
    pub name: String,
    pub description: Option<String>,
}

impl Workspace {
    pub fn open(config: &Config) -> Result<Self> {
        tracing::debug!(
            "Opening tasks at {} and definitions at {}",
            config.tasks_file.display(),
            config.definitions_file.display()
        );
        Self::with_persistence(
            JsonFile::<TasksDocument>::new(&config.tasks_file),
            JsonFile::<DefinitionsDocument>::new(&config.definitions_file),
        )
    }

    pub fn in_memory() -> Result<Self> {
        Self::with_persistence(InMemory::new(), InMemory::new())
    }

    pub fn with_persistence(
        tasks: impl Persistence<TasksDocument> + 'static,
        definitions: impl Persistence<DefinitionsDocument> + 'static,
    ) -> Result<Self> {
        let definitions = DefinitionsStore::open(definitions)?;
        let tasks = TaskStore::open(tasks, definitions.clone())?;
        Ok(Self { tasks, definitions })
    }

    /// Write both documents if absent and create any missing contexts.
    pub fn init_project(&self, contexts: &[ContextInit]) -> Result<InitReport> {
        let requested: Vec<(String, Option<String>)> = contexts
            .iter()
            .map(|c| (c.name.clone(), c.description.clone()))
            .collect();
        let report = self.tasks.init_contexts(&requested)?;
        self.definitions.persist()?;
        tracing::info!(
            "Project initialized: {} context(s) created, {} already present",
            report.created.len(),
            report.existing.len()
        );
        Ok(report)
    }

    /// Run every validation rule over the current documents.
    pub fn validate_project_files(&self) -> ValidationReport {
        validation::validate_documents(&self.tasks.snapshot(), &self.definitions.snapshot())
    }
}

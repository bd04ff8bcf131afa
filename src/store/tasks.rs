use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;

use super::definitions::DefinitionsStore;
use super::log_warnings;
use super::persistence::Persistence;
use crate::error::{NotFound, Result, StoreError, ValidationError};
use crate::ids::next_id;
use crate::models::*;
use crate::navigator;
use crate::validation::{self, Validation};

struct TaskState {
    doc: TasksDocument,
    persistence: Box<dyn Persistence<TasksDocument>>,
}

/// Owner of the tasks document.
///
/// Every mutation validates first, applies to a copy of the document, saves
/// the copy, and only then swaps it in. A failed save leaves memory exactly
/// as it was. One mutex serializes the whole sequence.
#[derive(Clone)]
pub struct TaskStore {
    state: Arc<Mutex<TaskState>>,
    definitions: DefinitionsStore,
}

/// Field checks shared by tasks and subtasks.
struct CheckedFields {
    tags: Vec<String>,
    dependencies: Vec<DependencyRef>,
    warnings: Vec<String>,
}

impl TaskStore {
    pub fn open(
        persistence: impl Persistence<TasksDocument> + 'static,
        definitions: DefinitionsStore,
    ) -> Result<Self> {
        let doc = persistence.load()?;
        Ok(Self {
            state: Arc::new(Mutex::new(TaskState {
                doc,
                persistence: Box::new(persistence),
            })),
            definitions,
        })
    }

    fn lock(&self) -> MutexGuard<'_, TaskState> {
        self.state.lock().expect("task store lock poisoned")
    }

    fn commit<T>(&self, mutate: impl FnOnce(&mut TasksDocument) -> Result<T>) -> Result<T> {
        let mut state = self.lock();
        let mut next = state.doc.clone();
        let out = mutate(&mut next)?;
        if let Err(e) = state.persistence.save(&next) {
            tracing::error!("Failed to save tasks document: {}", e);
            return Err(e);
        }
        state.doc = next;
        Ok(out)
    }

    /// A copy of the current document.
    pub fn snapshot(&self) -> TasksDocument {
        self.lock().doc.clone()
    }

    pub fn context_names(&self) -> Vec<String> {
        self.lock().doc.contexts.keys().cloned().collect()
    }

    // ============================================================
    // Contexts
    // ============================================================

    /// Create the listed contexts that do not exist yet and write the
    /// document, even if nothing changed. All names are validated before
    /// anything is created.
    pub fn init_contexts(&self, contexts: &[(String, Option<String>)]) -> Result<InitReport> {
        for (name, _) in contexts {
            validation::validate_context_name(name).into_result("context", name)?;
        }
        let definitions = self.definitions.snapshot();

        let report = self.commit(|doc| {
            let now = Utc::now();
            let mut report = InitReport::default();
            for (name, description) in contexts {
                if doc.contexts.contains_key(name) {
                    report.existing.push(name.clone());
                    continue;
                }
                doc.contexts
                    .insert(name.clone(), Context::new(name, description.clone(), now));
                report.created.push(name.clone());
                if !definitions.has_feature(name) {
                    report.warnings.push(undeclared_context(name));
                }
            }
            Ok(report)
        })?;

        for name in &report.created {
            tracing::info!("Context '{}' created", name);
        }
        log_warnings(&report.warnings);
        Ok(report)
    }

    /// Create a single context. Fails if it already exists.
    pub fn create_context(&self, name: &str, description: Option<String>) -> Result<Checked<Context>> {
        validation::validate_context_name(name).into_result("context", name)?;
        let declared = self.definitions.snapshot().has_feature(name);

        let context = self.commit(|doc| {
            if doc.contexts.contains_key(name) {
                return Err(StoreError::Duplicate {
                    kind: "Context",
                    name: name.to_string(),
                });
            }
            let context = Context::new(name, description, Utc::now());
            doc.contexts.insert(name.to_string(), context.clone());
            Ok(context)
        })?;

        tracing::info!("Context '{}' created", name);
        let warnings = if declared {
            Vec::new()
        } else {
            vec![undeclared_context(name)]
        };
        log_warnings(&warnings);
        Ok(Checked::new(context, warnings))
    }

    // ============================================================
    // Tasks
    // ============================================================

    pub fn add_task(&self, context: &str, input: NewTask) -> Result<Checked<Task>> {
        let priority = Priority::parse(&input.priority).ok_or_else(|| {
            ValidationError::new("priority", &input.priority, "Unknown priority")
                .with_allowed(Priority::ALL.map(|p| p.as_str()))
        })?;
        let definitions = self.definitions.snapshot();

        let checked = self.commit(|doc| {
            navigator::find_context(doc, context)?;
            let fields = check_fields(
                doc,
                &definitions,
                context,
                &input.title,
                &input.tags,
                &input.dependencies,
            )?;

            let now = Utc::now();
            let ctx = navigator::find_context_mut(doc, context)?;
            let task = Task {
                id: next_id(&ctx.tasks)?,
                title: input.title,
                description: input.description,
                priority,
                status: Status::Todo,
                tags: fields.tags,
                dependencies: fields.dependencies,
                blockers: Vec::new(),
                notes: String::new(),
                creation_date: now,
                completed_date: None,
                subtasks: Vec::new(),
            };
            ctx.tasks.push(task.clone());
            ctx.touch(now);
            Ok(Checked::new(task, fields.warnings))
        })?;

        tracing::info!("Task {} created in context '{}'", checked.item.id, context);
        log_warnings(&checked.warnings);
        Ok(checked)
    }

    /// Tasks in document order: contexts by name, tasks by insertion.
    pub fn list_tasks(&self, filter: &TaskFilter) -> TaskPage {
        let context = filter.context.as_deref();
        let tag = filter.tag.as_deref();

        let state = self.lock();
        let matching: Vec<ContextTask> = state
            .doc
            .contexts
            .iter()
            .filter(|(name, _)| context.is_none_or(|c| c == name.as_str()))
            .flat_map(|(name, ctx)| {
                ctx.tasks
                    .iter()
                    .filter(move |t| tag.is_none_or(|tag| t.tags.iter().any(|own| own == tag)))
                    .map(move |t| ContextTask {
                        context: name.clone(),
                        task: t.clone(),
                    })
            })
            .collect();

        TaskPage {
            total: matching.len(),
            tasks: matching
                .into_iter()
                .skip(filter.offset)
                .take(filter.limit)
                .collect(),
        }
    }

    pub fn get_task(&self, context: &str, task_id: u32) -> Result<Task> {
        let state = self.lock();
        Ok(navigator::find_task(&state.doc, context, task_id)?.clone())
    }

    pub fn update_task_status(&self, context: &str, task_id: u32, status: &str) -> Result<Task> {
        let task = self.commit(|doc| {
            transition(doc, context, task_id, &[], status)?;
            Ok(navigator::find_task(doc, context, task_id)?.clone())
        })?;
        tracing::info!(
            "Task {} in context '{}' moved to '{}'",
            task_id,
            context,
            task.status
        );
        Ok(task)
    }

    /// Remove a task together with its whole subtask tree.
    pub fn delete_task(&self, context: &str, task_id: u32) -> Result<()> {
        self.commit(|doc| {
            let ctx = navigator::find_context_mut(doc, context)?;
            let index = ctx
                .tasks
                .iter()
                .position(|t| t.id == task_id)
                .ok_or_else(|| NotFound::Task {
                    context: context.to_string(),
                    task_id,
                })?;
            ctx.tasks.remove(index);
            ctx.touch(Utc::now());
            Ok(())
        })?;
        tracing::info!("Task {} deleted from context '{}'", task_id, context);
        Ok(())
    }

    // ============================================================
    // Subtasks
    // ============================================================

    /// Add a subtask under the task itself (empty `parent_path`) or under the
    /// subtask that `parent_path` addresses.
    pub fn add_subtask(
        &self,
        context: &str,
        task_id: u32,
        parent_path: &[u32],
        input: NewSubtask,
    ) -> Result<Checked<SubtaskEntry>> {
        let definitions = self.definitions.snapshot();

        let checked = self.commit(|doc| {
            navigator::find(doc, context, task_id, parent_path)?;
            let fields = check_fields(
                doc,
                &definitions,
                context,
                &input.title,
                &input.tags,
                &input.dependencies,
            )?;

            let now = Utc::now();
            let siblings = navigator::children_mut(doc, context, task_id, parent_path)?;
            let subtask = Subtask {
                id: next_id(siblings.as_slice())?,
                title: input.title,
                description: input.description,
                status: Status::Todo,
                tags: fields.tags,
                dependencies: fields.dependencies,
                blockers: Vec::new(),
                notes: String::new(),
                creation_date: now,
                completed_date: None,
                subtasks: Vec::new(),
            };
            siblings.push(subtask.clone());
            navigator::find_context_mut(doc, context)?.touch(now);

            let mut path = parent_path.to_vec();
            path.push(subtask.id);
            let entry = SubtaskEntry {
                depth: parent_path.len(),
                path,
                subtask,
            };
            Ok(Checked::new(entry, fields.warnings))
        })?;

        tracing::info!(
            "Subtask {:?} created under task {} in context '{}'",
            checked.item.path,
            task_id,
            context
        );
        log_warnings(&checked.warnings);
        Ok(checked)
    }

    /// Children of the task (or of the subtask at `parent_path`). With
    /// `recursive` every descendant is listed depth-first.
    pub fn list_subtasks(
        &self,
        context: &str,
        task_id: u32,
        parent_path: &[u32],
        recursive: bool,
    ) -> Result<Vec<SubtaskEntry>> {
        let state = self.lock();
        let parent = navigator::find(&state.doc, context, task_id, parent_path)?;
        Ok(navigator::flatten(parent.subtasks(), parent_path, recursive))
    }

    pub fn get_subtask(&self, context: &str, task_id: u32, path: &[u32]) -> Result<Subtask> {
        require_path(path)?;
        let state = self.lock();
        Ok(navigator::find_subtask(&state.doc, context, task_id, path)?.clone())
    }

    pub fn update_subtask_status(
        &self,
        context: &str,
        task_id: u32,
        path: &[u32],
        status: &str,
    ) -> Result<Subtask> {
        require_path(path)?;
        let subtask = self.commit(|doc| {
            transition(doc, context, task_id, path, status)?;
            Ok(navigator::find_subtask(doc, context, task_id, path)?.clone())
        })?;
        tracing::info!(
            "Subtask {:?} of task {} in context '{}' moved to '{}'",
            path,
            task_id,
            context,
            subtask.status
        );
        Ok(subtask)
    }

    /// Remove a subtask together with everything below it.
    pub fn delete_subtask(&self, context: &str, task_id: u32, path: &[u32]) -> Result<()> {
        let (last, parent_path) = path.split_last().ok_or_else(empty_path)?;
        self.commit(|doc| {
            let siblings = navigator::children_mut(doc, context, task_id, parent_path)?;
            let index = siblings
                .iter()
                .position(|s| s.id == *last)
                .ok_or_else(|| NotFound::Subtask {
                    context: context.to_string(),
                    task_id,
                    path: path.to_vec(),
                })?;
            siblings.remove(index);
            navigator::find_context_mut(doc, context)?.touch(Utc::now());
            Ok(())
        })?;
        tracing::info!(
            "Subtask {:?} deleted from task {} in context '{}'",
            path,
            task_id,
            context
        );
        Ok(())
    }
}

/// Apply a status change to the item at `path`, rejecting moves that are
/// not in the transition table.
fn transition(
    doc: &mut TasksDocument,
    context: &str,
    task_id: u32,
    path: &[u32],
    status: &str,
) -> Result<()> {
    let to = Status::parse(status).ok_or_else(|| {
        ValidationError::new("status", status, "Unknown status")
            .with_allowed(Status::ALL.map(|s| s.as_str()))
    })?;

    let now = Utc::now();
    let node = navigator::find_mut(doc, context, task_id, path)?;
    let from = node.status();
    if let Validation::Invalid(reason) = validation::validate_status_transition(from, to) {
        tracing::warn!("Rejected transition in context '{}': {}", context, reason);
        return Err(StoreError::Transition {
            from,
            to,
            allowed: from.allowed_next().to_vec(),
        });
    }
    node.set_status(to, now);
    navigator::find_context_mut(doc, context)?.touch(now);
    Ok(())
}

fn check_fields(
    doc: &TasksDocument,
    definitions: &DefinitionsDocument,
    context: &str,
    title: &str,
    tags: &[String],
    dependencies: &[String],
) -> Result<CheckedFields> {
    if title.trim().is_empty() {
        return Err(ValidationError::new("title", title, "Title must not be empty").into());
    }

    let mut warnings = Vec::new();
    warnings.extend(validation::validate_title_format(title).into_result("title", title)?);

    let mut unique_tags: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        validation::validate_tag_name(tag).into_result("tag", tag)?;
        if unique_tags.contains(tag) {
            continue;
        }
        if !definitions.has_tech_tag(tag) {
            warnings.push(format!("Tag '{tag}' is not a declared tech tag"));
        }
        unique_tags.push(tag.clone());
    }

    let mut refs = Vec::with_capacity(dependencies.len());
    for raw in dependencies {
        let dep: DependencyRef = raw
            .parse()
            .map_err(|e: DependencyParseError| ValidationError::new("dependency", raw, e.reason))?;
        warnings.extend(
            validation::check_dependency(&dep, context, doc).into_result("dependency", raw)?,
        );
        refs.push(dep);
    }

    if !definitions.has_feature(context) {
        warnings.push(undeclared_context(context));
    }

    Ok(CheckedFields {
        tags: unique_tags,
        dependencies: refs,
        warnings,
    })
}

fn undeclared_context(context: &str) -> String {
    format!("Context '{context}' is not a declared feature")
}

fn require_path(path: &[u32]) -> Result<()> {
    if path.is_empty() {
        return Err(empty_path().into());
    }
    Ok(())
}

fn empty_path() -> ValidationError {
    ValidationError::new("subtask_path", "[]", "A subtask path needs at least one id")
}

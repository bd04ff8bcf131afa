//! Path lookups over the tasks document.
//!
//! A path is `(context, task id, subtask ids...)`; each subtask id descends
//! one level. Descent is a loop, not recursion, so nesting depth is bounded
//! only by memory. Every miss reports which segment failed.

use crate::error::NotFound;
use crate::models::{Context, Node, Subtask, SubtaskEntry, Task, TasksDocument};

/// A resolved item: either a top-level task or a subtask somewhere below one.
#[derive(Debug, Clone, Copy)]
pub enum Located<'a> {
    Task(&'a Task),
    Subtask(&'a Subtask),
}

impl Located<'_> {
    pub fn subtasks(&self) -> &[Subtask] {
        match self {
            Self::Task(task) => &task.subtasks,
            Self::Subtask(subtask) => &subtask.subtasks,
        }
    }
}

pub fn find_context<'a>(doc: &'a TasksDocument, context: &str) -> Result<&'a Context, NotFound> {
    doc.contexts.get(context).ok_or_else(|| NotFound::Context {
        context: context.to_string(),
    })
}

pub fn find_context_mut<'a>(
    doc: &'a mut TasksDocument,
    context: &str,
) -> Result<&'a mut Context, NotFound> {
    doc.contexts.get_mut(context).ok_or_else(|| NotFound::Context {
        context: context.to_string(),
    })
}

pub fn find_task<'a>(doc: &'a TasksDocument, context: &str, task_id: u32) -> Result<&'a Task, NotFound> {
    find_context(doc, context)?
        .tasks
        .iter()
        .find(|t| t.id == task_id)
        .ok_or_else(|| task_missing(context, task_id))
}

pub fn find_task_mut<'a>(
    doc: &'a mut TasksDocument,
    context: &str,
    task_id: u32,
) -> Result<&'a mut Task, NotFound> {
    find_context_mut(doc, context)?
        .tasks
        .iter_mut()
        .find(|t| t.id == task_id)
        .ok_or_else(|| task_missing(context, task_id))
}

/// Resolve a full path. An empty `subtask_path` addresses the task itself.
pub fn find<'a>(
    doc: &'a TasksDocument,
    context: &str,
    task_id: u32,
    subtask_path: &[u32],
) -> Result<Located<'a>, NotFound> {
    let task = find_task(doc, context, task_id)?;
    if subtask_path.is_empty() {
        return Ok(Located::Task(task));
    }
    descend(&task.subtasks, subtask_path)
        .map(Located::Subtask)
        .map_err(|depth| subtask_missing(context, task_id, &subtask_path[..=depth]))
}

/// Resolve a subtask path. An empty path never resolves.
pub fn find_subtask<'a>(
    doc: &'a TasksDocument,
    context: &str,
    task_id: u32,
    path: &[u32],
) -> Result<&'a Subtask, NotFound> {
    let task = find_task(doc, context, task_id)?;
    if path.is_empty() {
        return Err(subtask_missing(context, task_id, path));
    }
    descend(&task.subtasks, path).map_err(|depth| subtask_missing(context, task_id, &path[..=depth]))
}

/// Mutable counterpart of [`find`].
pub fn find_mut<'a>(
    doc: &'a mut TasksDocument,
    context: &str,
    task_id: u32,
    subtask_path: &[u32],
) -> Result<&'a mut dyn Node, NotFound> {
    let task = find_task_mut(doc, context, task_id)?;
    if subtask_path.is_empty() {
        return Ok(task as &mut dyn Node);
    }
    descend_mut(&mut task.subtasks, subtask_path)
        .map(|subtask| subtask as &mut dyn Node)
        .map_err(|depth| subtask_missing(context, task_id, &subtask_path[..=depth]))
}

/// The child list of the item at `parent_path`, for insertion and removal.
pub fn children_mut<'a>(
    doc: &'a mut TasksDocument,
    context: &str,
    task_id: u32,
    parent_path: &[u32],
) -> Result<&'a mut Vec<Subtask>, NotFound> {
    find_mut(doc, context, task_id, parent_path).map(|node| node.subtasks_mut())
}

/// Walk `subtasks` depth-first in document order.
///
/// With `recursive` every descendant is returned and each entry's own
/// `subtasks` is emptied, since its children follow it in the list. Without
/// it only the immediate children are returned, intact.
pub fn flatten(subtasks: &[Subtask], base: &[u32], recursive: bool) -> Vec<SubtaskEntry> {
    let mut entries = Vec::new();
    let mut stack: Vec<(&Subtask, Vec<u32>)> = subtasks
        .iter()
        .rev()
        .map(|s| (s, extend(base, s.id)))
        .collect();

    while let Some((node, path)) = stack.pop() {
        let mut subtask = node.clone();
        if recursive {
            for child in node.subtasks.iter().rev() {
                stack.push((child, extend(&path, child.id)));
            }
            subtask.subtasks.clear();
        }
        entries.push(SubtaskEntry {
            depth: path.len() - base.len() - 1,
            path,
            subtask,
        });
    }
    entries
}

fn extend(path: &[u32], id: u32) -> Vec<u32> {
    let mut next = path.to_vec();
    next.push(id);
    next
}

/// On a miss, returns the index of the first unresolved segment.
fn descend<'a>(children: &'a [Subtask], path: &[u32]) -> Result<&'a Subtask, usize> {
    let mut level = children;
    let mut found = None;
    for (depth, id) in path.iter().enumerate() {
        let node = level.iter().find(|s| s.id == *id).ok_or(depth)?;
        level = &node.subtasks;
        found = Some(node);
    }
    found.ok_or(0)
}

fn descend_mut<'a>(children: &'a mut [Subtask], path: &[u32]) -> Result<&'a mut Subtask, usize> {
    let Some((last, parents)) = path.split_last() else {
        return Err(0);
    };
    let mut level = children;
    for (depth, id) in parents.iter().enumerate() {
        level = match level.iter_mut().find(|s| s.id == *id) {
            Some(node) => &mut node.subtasks,
            None => return Err(depth),
        };
    }
    level
        .iter_mut()
        .find(|s| s.id == *last)
        .ok_or(parents.len())
}

fn task_missing(context: &str, task_id: u32) -> NotFound {
    NotFound::Task {
        context: context.to_string(),
        task_id,
    }
}

fn subtask_missing(context: &str, task_id: u32, path: &[u32]) -> NotFound {
    NotFound::Subtask {
        context: context.to_string(),
        task_id,
        path: path.to_vec(),
    }
}

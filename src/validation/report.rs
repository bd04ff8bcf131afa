//! Whole-project validation over raw JSON.
//!
//! Works on `serde_json::Value` rather than the typed documents so that a
//! file with an unknown status or a malformed dependency is reported line by
//! line instead of failing to load.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::*;
use crate::models::{DefinitionsDocument, DependencyRef, TasksDocument};

/// A single problem and where it was found.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    /// Slash-separated location, e.g. `auth/3/subtasks/1`.
    pub location: String,
    pub message: String,
}

/// Aggregated outcome of [`validate_project`]. Nothing is mutated.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<Finding>,
    pub warnings: Vec<Finding>,
}

impl ValidationReport {
    fn record(&mut self, location: &str, outcome: Validation) {
        match outcome {
            Validation::Valid => {}
            Validation::Warning(message) => self.warn(location, message),
            Validation::Invalid(message) => self.error(location, message),
        }
    }

    fn error(&mut self, location: &str, message: impl Into<String>) {
        self.errors.push(Finding {
            location: location.to_string(),
            message: message.into(),
        });
    }

    fn warn(&mut self, location: &str, message: impl Into<String>) {
        self.warnings.push(Finding {
            location: location.to_string(),
            message: message.into(),
        });
    }
}

/// Run every rule across both documents.
pub fn validate_project(tasks: &Value, definitions: &Value) -> ValidationReport {
    let mut report = ValidationReport::default();

    let declared = check_definitions(definitions, &mut report);
    check_tasks(tasks, &declared, &mut report);

    report.valid = report.errors.is_empty();
    report
}

/// Definitions that parsed well enough to cross-check against.
#[derive(Default)]
struct Declared {
    features: HashSet<String>,
    tech_tags: HashSet<String>,
}

fn check_definitions(definitions: &Value, report: &mut ValidationReport) -> Declared {
    let mut declared = Declared::default();
    let Some(root) = as_object(definitions, "definitions", report) else {
        return declared;
    };

    if let Some(tags) = root.get("tech_tags") {
        if let Some(tags) = as_object(tags, "definitions/tech_tags", report) {
            for (name, description) in tags {
                let location = format!("definitions/tech_tags/{name}");
                report.record(&location, validate_tag_name(name));
                if !description.is_string() {
                    report.error(&location, "Description must be a string");
                }
                declared.tech_tags.insert(name.clone());
            }
        }
    }

    if let Some(features) = root.get("features") {
        if let Some(features) = as_object(features, "definitions/features", report) {
            for (name, feature) in features {
                let location = format!("definitions/features/{name}");
                report.record(&location, validate_feature_name(name));
                declared.features.insert(name.clone());

                for tag in strings(feature.get("common_tags"), &location, "common_tags", report) {
                    report.record(&location, validate_tag_name(tag));
                    if !declared.tech_tags.contains(tag) {
                        report.warn(&location, format!("Tag '{tag}' is not a declared tech tag"));
                    }
                }
                for context in strings(
                    feature.get("related_contexts"),
                    &location,
                    "related_contexts",
                    report,
                ) {
                    report.record(&location, validate_context_name(context));
                }
            }
        }
    }

    declared
}

fn check_tasks(tasks: &Value, declared: &Declared, report: &mut ValidationReport) {
    let Some(root) = as_object(tasks, "tasks", report) else {
        return;
    };
    // Dependency resolution needs the typed document.
    let typed: Option<TasksDocument> = serde_json::from_value(tasks.clone()).ok();
    if typed.is_none() {
        report.warn(
            "tasks",
            "Dependency resolution skipped: the tasks document does not load as a whole",
        );
    }

    for (context, body) in root {
        report.record(context, validate_context_name(context));
        if !declared.features.contains(context) {
            report.warn(context, format!("Context '{context}' is not a declared feature"));
        }
        let Some(body) = as_object(body, context, report) else {
            continue;
        };
        if !body.get("metadata").is_some_and(Value::is_object) {
            report.error(context, "Missing metadata object");
        }
        let Some(items) = body.get("tasks").and_then(Value::as_array) else {
            report.error(context, "Missing tasks array");
            continue;
        };

        let mut pending: Vec<(&Vec<Value>, String, bool)> = vec![(items, context.clone(), true)];
        while let Some((siblings, parent, top_level)) = pending.pop() {
            let mut seen = HashSet::new();
            for item in siblings {
                let location = check_item(item, &parent, top_level, &mut seen, report);
                check_item_refs(item, context, &location, declared, typed.as_ref(), report);
                match item.get("subtasks") {
                    Some(Value::Array(children)) => {
                        pending.push((children, format!("{location}/subtasks"), false));
                    }
                    Some(_) => report.error(&location, "subtasks must be an array"),
                    None => report.error(&location, "Missing subtasks array"),
                }
            }
        }
    }
}

/// Structural checks on one task or subtask. Returns its location.
fn check_item(
    item: &Value,
    parent: &str,
    top_level: bool,
    seen: &mut HashSet<u64>,
    report: &mut ValidationReport,
) -> String {
    let id = item.get("id").and_then(Value::as_u64).filter(|id| *id > 0);
    let location = match id {
        Some(id) => format!("{parent}/{id}"),
        None => format!("{parent}/?"),
    };
    match id {
        Some(id) if !seen.insert(id) => {
            report.error(&location, format!("Duplicate id {id} among siblings"));
        }
        Some(_) => {}
        None => report.error(&location, "id must be a positive integer"),
    }

    match item.get("title").and_then(Value::as_str) {
        Some(title) if title.trim().is_empty() => report.error(&location, "Title must not be empty"),
        Some(title) => report.record(&location, validate_title_format(title)),
        None => report.error(&location, "Missing title"),
    }

    if top_level {
        match item.get("priority").and_then(Value::as_str) {
            Some(priority) => report.record(&location, validate_priority(priority)),
            None => report.error(&location, "Missing priority"),
        }
    }

    match item.get("status").and_then(Value::as_str) {
        Some(status) => report.record(&location, validate_status(status)),
        None => report.error(&location, "Missing status"),
    }

    location
}

/// Tag and dependency checks on one task or subtask.
fn check_item_refs(
    item: &Value,
    context: &str,
    location: &str,
    declared: &Declared,
    typed: Option<&TasksDocument>,
    report: &mut ValidationReport,
) {
    for tag in strings(item.get("tags"), location, "tags", report) {
        report.record(location, validate_tag_name(tag));
        if !declared.tech_tags.contains(tag) {
            report.warn(location, format!("Tag '{tag}' is not a declared tech tag"));
        }
    }

    let Some(dependencies) = item.get("dependencies") else {
        return;
    };
    let Some(dependencies) = dependencies.as_array() else {
        report.error(location, "dependencies must be an array");
        return;
    };
    for raw in dependencies {
        let parsed = match raw {
            Value::Number(n) => n
                .as_u64()
                .filter(|id| *id > 0)
                .and_then(|id| u32::try_from(id).ok())
                .map(DependencyRef::Local)
                .ok_or_else(|| format!("Dependency id {n} must be a positive integer")),
            Value::String(s) => s.parse::<DependencyRef>().map_err(|e| e.to_string()),
            other => Err(format!("Dependency {other} must be an integer or a string")),
        };
        match (parsed, typed) {
            (Err(message), _) => report.error(location, message),
            (Ok(dep), Some(doc)) => report.record(location, check_dependency(&dep, context, doc)),
            (Ok(_), None) => {}
        }
    }
}

fn as_object<'a>(
    value: &'a Value,
    location: &str,
    report: &mut ValidationReport,
) -> Option<&'a Map<String, Value>> {
    let object = value.as_object();
    if object.is_none() {
        report.error(location, "Expected a JSON object");
    }
    object
}

fn strings<'a>(
    value: Option<&'a Value>,
    location: &str,
    field: &str,
    report: &mut ValidationReport,
) -> Vec<&'a str> {
    match value {
        None => Vec::new(),
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| {
                let s = item.as_str();
                if s.is_none() {
                    report.error(location, format!("{field} entries must be strings"));
                }
                s
            })
            .collect(),
        Some(_) => {
            report.error(location, format!("{field} must be an array of strings"));
            Vec::new()
        }
    }
}

/// Validate the typed documents held by the stores.
pub fn validate_documents(tasks: &TasksDocument, definitions: &DefinitionsDocument) -> ValidationReport {
    let tasks = serde_json::to_value(tasks).unwrap_or(Value::Null);
    let definitions = serde_json::to_value(definitions).unwrap_or(Value::Null);
    validate_project(&tasks, &definitions)
}

//! Pure validation rules.
//!
//! Every rule returns a [`Validation`] outcome instead of failing. Callers
//! decide what an `Invalid` means for them; the stores turn it into a
//! [`ValidationError`] and leave warnings attached to the result.
//!
//! Warnings and errors are split unevenly across fields: a title without a
//! `[TAG]` prefix or an undeclared tag only warns, while a bad context name
//! or tag pattern always rejects.

mod report;

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

pub use report::{validate_documents, validate_project, Finding, ValidationReport};

use crate::error::ValidationError;
use crate::models::{DependencyRef, Priority, Status, TasksDocument};
use crate::navigator;

static CONTEXT_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z][a-z0-9-]*$").expect("context pattern compiles"));
static TAG_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9-]+$").expect("tag pattern compiles"));
static TITLE_FORMAT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\[[A-Z]+\]\s+.+").expect("title pattern compiles"));

/// Outcome of a single rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "message", rename_all = "snake_case")]
pub enum Validation {
    Valid,
    Warning(String),
    Invalid(String),
}

impl Validation {
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }

    pub fn is_invalid(&self) -> bool {
        matches!(self, Self::Invalid(_))
    }

    /// Reject on `Invalid`, pass warnings through.
    pub fn into_result(
        self,
        field: &'static str,
        value: &str,
    ) -> Result<Option<String>, ValidationError> {
        match self {
            Self::Valid => Ok(None),
            Self::Warning(message) => Ok(Some(message)),
            Self::Invalid(reason) => Err(ValidationError::new(field, value, reason)),
        }
    }
}

pub fn is_context_name(name: &str) -> bool {
    CONTEXT_NAME.is_match(name)
}

pub fn is_tag_name(tag: &str) -> bool {
    TAG_NAME.is_match(tag)
}

pub fn validate_context_name(name: &str) -> Validation {
    if is_context_name(name) {
        Validation::Valid
    } else {
        Validation::Invalid(format!(
            "'{name}' must start with a lowercase letter and contain only lowercase letters, digits and '-'"
        ))
    }
}

/// Feature names follow the context-name pattern.
pub fn validate_feature_name(name: &str) -> Validation {
    validate_context_name(name)
}

pub fn validate_tag_name(tag: &str) -> Validation {
    if is_tag_name(tag) {
        Validation::Valid
    } else {
        Validation::Invalid(format!(
            "'{tag}' must contain only lowercase letters, digits and '-'"
        ))
    }
}

pub fn validate_title_format(title: &str) -> Validation {
    if TITLE_FORMAT.is_match(title) {
        Validation::Valid
    } else {
        Validation::Warning(format!(
            "Title '{title}' should start with a bracketed tag, e.g. '[API] {title}'"
        ))
    }
}

pub fn validate_priority(value: &str) -> Validation {
    match Priority::parse(value) {
        Some(_) => Validation::Valid,
        None => Validation::Invalid(format!(
            "Must be one of: {}",
            Priority::ALL.map(|p| p.as_str()).join(", ")
        )),
    }
}

pub fn validate_status(value: &str) -> Validation {
    match Status::parse(value) {
        Some(_) => Validation::Valid,
        None => Validation::Invalid(format!(
            "Must be one of: {}",
            Status::ALL.map(|s| s.as_str()).join(", ")
        )),
    }
}

/// Check a move against the transition table. Creation is not a transition:
/// new items always start as `todo`.
pub fn validate_status_transition(from: Status, to: Status) -> Validation {
    if from.can_transition_to(to) {
        return Validation::Valid;
    }
    let allowed = from.allowed_next();
    if allowed.is_empty() {
        Validation::Invalid(format!("'{from}' is terminal; no further transitions allowed"))
    } else {
        Validation::Invalid(format!(
            "'{from}' can only move to: {}",
            allowed.iter().map(Status::as_str).collect::<Vec<_>>().join(", ")
        ))
    }
}

/// Check that a parsed reference resolves in `doc`. Dangling references only
/// warn; nothing cascades when the target later disappears.
pub fn check_dependency(dep: &DependencyRef, current_context: &str, doc: &TasksDocument) -> Validation {
    let context = dep.context(current_context);
    let path: Vec<u32> = dep.subtask_id().into_iter().collect();
    match navigator::find(doc, context, dep.task_id(), &path) {
        Ok(_) => Validation::Valid,
        Err(missing) => Validation::Warning(format!("Dependency '{dep}' does not resolve: {missing}")),
    }
}

/// Parse and resolve a wire-format dependency reference.
pub fn validate_dependency_reference(
    raw: &str,
    current_context: &str,
    doc: &TasksDocument,
) -> Validation {
    match raw.parse::<DependencyRef>() {
        Ok(dep) => check_dependency(&dep, current_context, doc),
        Err(e) => Validation::Invalid(e.to_string()),
    }
}

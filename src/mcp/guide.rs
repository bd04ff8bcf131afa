use crate::models::Status;

const NAMING: &str = r#"# Taskbook guidelines

## Contexts and features
- A context partitions tasks by business feature area: 'auth', 'billing', 'user-profile'.
- Context and feature names: lowercase, start with a letter, then letters, digits or '-'.
- Declare each context as a feature (add_project_feature) so validation stays quiet.
- Create contexts with init_project before adding tasks to them.

## Tech tags
- Tags mark the technical layer of a task: 'api', 'frontend', 'db', 'ci'.
- Tag names: lowercase letters, digits or '-'.
- Undeclared tags are accepted with a warning; declare them with add_tech_tag.

## Titles
- Prefix titles with an uppercase tag in brackets: '[API] Add login endpoint'.
- Titles without the prefix are accepted with a warning.

## Priorities
low, medium, high, critical

## Dependencies
- '3'          task 3 in the same context
- 'auth:3'     task 3 in context 'auth'
- 'auth:3:1'   subtask 1 of task 3 in context 'auth'
A dependency on something that does not exist yet is accepted with a warning.

## Subtasks
- Subtasks nest without limit. Address one by its id path: [2, 1] is subtask 1 under subtask 2.
- Ids count from 1 among siblings. Deleting the highest id lets the next insert reuse it.
- Deleting a task or subtask deletes everything below it.
"#;

/// The naming and workflow guide, ending with the status transition table.
pub fn guidelines() -> String {
    let mut text = String::from(NAMING);
    text.push_str("\n## Status transitions\n");
    for status in Status::ALL {
        let next = status.allowed_next();
        let targets = if next.is_empty() {
            "(terminal)".to_string()
        } else {
            next.iter().map(Status::as_str).collect::<Vec<_>>().join(", ")
        };
        text.push_str(&format!("- {:<10} -> {}\n", status.as_str(), targets));
    }
    text
}

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use speculate2::speculate;
use taskbook::error::{NotFound, StoreError};
use taskbook::models::*;
use taskbook::store::{ContextInit, InMemory, JsonFile, Persistence, Workspace};

fn init(workspace: &Workspace, names: &[&str]) {
    let contexts: Vec<ContextInit> = names
        .iter()
        .map(|name| ContextInit {
            name: name.to_string(),
            description: None,
        })
        .collect();
    workspace
        .init_project(&contexts)
        .expect("Failed to init project");
}

fn declare(workspace: &Workspace, names: &[&str]) {
    for name in names {
        workspace
            .definitions
            .add_feature(CreateFeatureInput {
                name: name.to_string(),
                ..Default::default()
            })
            .expect("Failed to add feature");
    }
}

fn new_task(title: &str) -> NewTask {
    NewTask {
        title: title.to_string(),
        description: "Something to do".to_string(),
        priority: "high".to_string(),
        ..Default::default()
    }
}

fn new_subtask(title: &str) -> NewSubtask {
    NewSubtask {
        title: title.to_string(),
        ..Default::default()
    }
}

/// Persistence that can be told to fail every save.
struct Switchable {
    inner: InMemory<TasksDocument>,
    failing: Arc<AtomicBool>,
}

impl Persistence<TasksDocument> for Switchable {
    fn load(&self) -> taskbook::error::Result<TasksDocument> {
        self.inner.load()
    }

    fn save(&self, doc: &TasksDocument) -> taskbook::error::Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Persistence("disk unavailable".to_string()));
        }
        self.inner.save(doc)
    }
}

speculate! {
    before {
        let workspace = Workspace::in_memory().expect("Failed to open workspace");
        declare(&workspace, &["auth", "billing"]);
        init(&workspace, &["auth", "billing"]);
    }

    describe "init_project" {
        it "reports created and existing contexts" {
            let report = workspace
                .init_project(&[
                    ContextInit { name: "auth".to_string(), description: None },
                    ContextInit { name: "search".to_string(), description: Some("Full text".to_string()) },
                ])
                .expect("Failed to init");

            assert_eq!(report.created, vec!["search"]);
            assert_eq!(report.existing, vec!["auth"]);
            assert_eq!(report.warnings.len(), 1);
        }

        it "rejects an invalid context name before creating anything" {
            let err = workspace
                .init_project(&[
                    ContextInit { name: "search".to_string(), description: None },
                    ContextInit { name: "Auth".to_string(), description: None },
                ])
                .unwrap_err();

            assert!(matches!(err, StoreError::Validation(_)));
            assert_eq!(workspace.tasks.context_names(), vec!["auth", "billing"]);
        }

        it "fills in default metadata" {
            let doc = workspace.tasks.snapshot();
            let metadata = &doc.contexts["auth"].metadata;
            assert_eq!(metadata.description, "Context for auth");
            assert_eq!(metadata.version, "1.0.0");
        }
    }

    describe "create_context" {
        it "rejects a duplicate" {
            let err = workspace.tasks.create_context("auth", None).unwrap_err();
            assert!(matches!(err, StoreError::Duplicate { .. }));
        }

        it "accepts a hyphenated name" {
            let created = workspace.tasks.create_context("auth-service2", None).expect("Failed to create");
            assert_eq!(created.item.tasks.len(), 0);
        }
    }

    describe "add_task" {
        it "assigns ids 1..N in a fresh context" {
            for n in 1..=3 {
                let task = workspace.tasks.add_task("auth", new_task("[API] Work")).expect("Failed to add");
                assert_eq!(task.item.id, n);
                assert_eq!(task.item.status, Status::Todo);
            }
        }

        it "numbers contexts independently" {
            workspace.tasks.add_task("auth", new_task("[API] One")).unwrap();
            workspace.tasks.add_task("auth", new_task("[API] Two")).unwrap();
            let other = workspace.tasks.add_task("billing", new_task("[API] One")).unwrap();
            assert_eq!(other.item.id, 1);
        }

        it "warns about a title without a tag prefix" {
            let task = workspace.tasks.add_task("auth", new_task("Fix bug")).expect("Failed to add");
            assert_eq!(task.warnings.len(), 1);

            let tagged = workspace.tasks.add_task("auth", new_task("[API] Fix bug")).expect("Failed to add");
            assert!(tagged.warnings.is_empty());
        }

        it "rejects an unknown priority with the allowed values" {
            let mut input = new_task("[API] Login");
            input.priority = "urgent".to_string();

            match workspace.tasks.add_task("auth", input).unwrap_err() {
                StoreError::Validation(e) => {
                    assert_eq!(e.field, "priority");
                    assert_eq!(e.allowed, vec!["low", "medium", "high", "critical"]);
                }
                other => panic!("unexpected error: {other}"),
            }
        }

        it "rejects a missing context" {
            let err = workspace.tasks.add_task("search", new_task("[API] Query")).unwrap_err();
            assert!(matches!(err, StoreError::NotFound(NotFound::Context { .. })));
        }

        it "rejects a malformed tag" {
            let mut input = new_task("[API] Login");
            input.tags = vec!["Backend".to_string()];
            assert!(matches!(
                workspace.tasks.add_task("auth", input).unwrap_err(),
                StoreError::Validation(_)
            ));
        }

        it "accepts a dangling dependency with a warning" {
            let mut input = new_task("[API] Login");
            input.dependencies = vec!["billing:9".to_string()];

            let task = workspace.tasks.add_task("auth", input).expect("Failed to add");
            assert_eq!(
                task.item.dependencies,
                vec![DependencyRef::CrossTask { context: "billing".to_string(), task_id: 9 }]
            );
            assert!(task.warnings.iter().any(|w| w.contains("billing:9")));
        }

        it "rejects a malformed dependency" {
            let mut input = new_task("[API] Login");
            input.dependencies = vec!["auth:x".to_string()];
            assert!(workspace.tasks.add_task("auth", input).is_err());
            assert_eq!(workspace.tasks.list_tasks(&TaskFilter::default()).total, 0);
        }
    }

    describe "id reuse" {
        before {
            for _ in 0..3 {
                workspace.tasks.add_task("auth", new_task("[API] Work")).unwrap();
            }
        }

        it "reuses the id of a deleted maximum" {
            workspace.tasks.delete_task("auth", 3).unwrap();
            let task = workspace.tasks.add_task("auth", new_task("[API] Again")).unwrap();
            assert_eq!(task.item.id, 3);
        }

        it "rejects a new sibling once the id space is exhausted" {
            let mut doc = workspace.tasks.snapshot();
            doc.contexts.get_mut("auth").unwrap().tasks[2].id = u32::MAX;
            let store = Workspace::with_persistence(InMemory::with_document(doc), InMemory::new())
                .expect("Failed to open workspace");

            let err = store.tasks.add_task("auth", new_task("[API] Overflow")).unwrap_err();
            assert!(matches!(err, StoreError::Validation(_)));
            assert!(store.tasks.get_task("auth", u32::MAX).is_ok());
            assert_eq!(store.tasks.list_tasks(&TaskFilter::default()).total, 3);
        }

        it "never reuses a deleted id below the maximum" {
            workspace.tasks.delete_task("auth", 2).unwrap();
            let task = workspace.tasks.add_task("auth", new_task("[API] Again")).unwrap();
            assert_eq!(task.item.id, 4);
        }
    }

    describe "update_task_status" {
        before {
            workspace.tasks.add_task("auth", new_task("[API] Login")).unwrap();
        }

        it "follows the transition table" {
            let task = workspace.tasks.update_task_status("auth", 1, "inprogress").expect("todo -> inprogress");
            assert_eq!(task.status, Status::InProgress);

            let err = workspace.tasks.update_task_status("auth", 1, "todo").unwrap_err();
            match err {
                StoreError::Transition { from, to, allowed } => {
                    assert_eq!(from, Status::InProgress);
                    assert_eq!(to, Status::Todo);
                    assert!(!allowed.contains(&Status::Todo));
                }
                other => panic!("unexpected error: {other}"),
            }
            assert_eq!(workspace.tasks.get_task("auth", 1).unwrap().status, Status::InProgress);

            let done = workspace.tasks.update_task_status("auth", 1, "done").expect("inprogress -> done");
            assert_eq!(done.status, Status::Done);
            assert!(done.completed_date.is_some());
        }

        it "treats done as terminal" {
            workspace.tasks.update_task_status("auth", 1, "inprogress").unwrap();
            workspace.tasks.update_task_status("auth", 1, "done").unwrap();

            for next in Status::ALL {
                assert!(workspace.tasks.update_task_status("auth", 1, next.as_str()).is_err());
            }
        }

        it "rejects an unknown status" {
            let err = workspace.tasks.update_task_status("auth", 1, "started").unwrap_err();
            assert!(matches!(err, StoreError::Validation(_)));
        }

        it "touches the context" {
            let before = workspace.tasks.snapshot().contexts["auth"].metadata.updated;
            workspace.tasks.update_task_status("auth", 1, "blocked").unwrap();
            assert!(workspace.tasks.snapshot().contexts["auth"].metadata.updated >= before);
        }
    }

    describe "subtasks" {
        before {
            workspace.tasks.add_task("auth", new_task("[API] Login")).unwrap();
            workspace.tasks.add_subtask("auth", 1, &[], new_subtask("[API] Route")).unwrap();
            workspace.tasks.add_subtask("auth", 1, &[], new_subtask("[API] Handler")).unwrap();
            workspace.tasks.add_subtask("auth", 1, &[2], new_subtask("[DB] Query")).unwrap();
        }

        it "numbers siblings independently at each level" {
            let nested = workspace.tasks
                .add_subtask("auth", 1, &[2], new_subtask("[DB] Index"))
                .unwrap();
            assert_eq!(nested.item.path, vec![2, 2]);
            assert_eq!(nested.item.depth, 1);

            let deeper = workspace.tasks
                .add_subtask("auth", 1, &[2, 1], new_subtask("[DB] Column"))
                .unwrap();
            assert_eq!(deeper.item.path, vec![2, 1, 1]);
        }

        it "lists direct children or every descendant" {
            let direct = workspace.tasks.list_subtasks("auth", 1, &[], false).unwrap();
            assert_eq!(direct.len(), 2);

            let all: Vec<Vec<u32>> = workspace.tasks
                .list_subtasks("auth", 1, &[], true)
                .unwrap()
                .into_iter()
                .map(|e| e.path)
                .collect();
            assert_eq!(all, vec![vec![1], vec![2], vec![2, 1]]);
        }

        it "gets and updates a nested subtask" {
            let subtask = workspace.tasks.get_subtask("auth", 1, &[2, 1]).unwrap();
            assert_eq!(subtask.title, "[DB] Query");

            let moved = workspace.tasks.update_subtask_status("auth", 1, &[2, 1], "inprogress").unwrap();
            assert_eq!(moved.status, Status::InProgress);
            assert!(workspace.tasks.update_subtask_status("auth", 1, &[2, 1], "todo").is_err());
        }

        it "reports which path segment is missing" {
            let err = workspace.tasks.get_subtask("auth", 1, &[2, 7]).unwrap_err();
            match err {
                StoreError::NotFound(NotFound::Subtask { path, .. }) => assert_eq!(path, vec![2, 7]),
                other => panic!("unexpected error: {other}"),
            }
        }

        it "deletes a subtask with its descendants" {
            workspace.tasks.delete_subtask("auth", 1, &[2]).unwrap();
            let all = workspace.tasks.list_subtasks("auth", 1, &[], true).unwrap();
            assert_eq!(all.len(), 1);
            assert!(workspace.tasks.get_subtask("auth", 1, &[2, 1]).is_err());
        }

        it "deletes the whole tree with its task" {
            workspace.tasks.delete_task("auth", 1).unwrap();
            let err = workspace.tasks.list_subtasks("auth", 1, &[], true).unwrap_err();
            assert!(matches!(err, StoreError::NotFound(NotFound::Task { .. })));
        }
    }

    describe "dependency resolution" {
        before {
            workspace.tasks.add_task("auth", new_task("[API] Login")).unwrap();
            workspace.tasks.add_task("billing", new_task("[API] Invoice")).unwrap();
            workspace
                .tasks
                .add_subtask("auth", 1, &[], new_subtask("[API] Route"))
                .unwrap();
        }

        it "accepts references that resolve without warnings" {
            let mut input = new_task("[API] Logout");
            input.dependencies = vec![
                "1".to_string(),
                "billing:1".to_string(),
                "auth:1:1".to_string(),
            ];

            let task = workspace.tasks.add_task("auth", input).expect("Failed to add");
            assert!(task.warnings.is_empty(), "{:?}", task.warnings);
            assert_eq!(
                task.item.dependencies,
                vec![
                    DependencyRef::Local(1),
                    DependencyRef::CrossTask { context: "billing".to_string(), task_id: 1 },
                    DependencyRef::CrossSubtask {
                        context: "auth".to_string(),
                        task_id: 1,
                        subtask_id: 1,
                    },
                ]
            );
            assert!(workspace.validate_project_files().warnings.is_empty());
        }

        it "resolves a bare id in the dependent's own context" {
            let mut input = new_task("[API] Refund");
            input.dependencies = vec!["1".to_string()];
            let task = workspace.tasks.add_task("billing", input).unwrap();
            assert!(task.warnings.is_empty(), "{:?}", task.warnings);

            let mut input = new_task("[API] Refund");
            input.dependencies = vec!["2".to_string()];
            let task = workspace.tasks.add_task("billing", input).unwrap();
            assert!(task.warnings.is_empty(), "{:?}", task.warnings);

            let mut input = new_task("[API] Credit");
            input.dependencies = vec!["9".to_string()];
            let task = workspace.tasks.add_task("billing", input).unwrap();
            assert_eq!(task.warnings.len(), 1);
        }

        it "leaves a dependency dangling when its target subtask is deleted" {
            let mut input = new_task("[API] Logout");
            input.dependencies = vec!["auth:1:1".to_string()];
            workspace.tasks.add_task("auth", input).unwrap();

            workspace.tasks.delete_subtask("auth", 1, &[1]).unwrap();

            let task = workspace.tasks.get_task("auth", 2).unwrap();
            assert_eq!(task.dependencies.len(), 1);
            let report = workspace.validate_project_files();
            assert!(report.valid);
            assert!(report
                .warnings
                .iter()
                .any(|w| w.location == "auth/2" && w.message.contains("auth:1:1")));
        }
    }

    describe "list_tasks" {
        before {
            let mut tagged = new_task("[API] Login");
            tagged.tags = vec!["api".to_string()];
            workspace.tasks.add_task("auth", tagged).unwrap();
            workspace.tasks.add_task("auth", new_task("[UI] Form")).unwrap();
            workspace.tasks.add_task("billing", new_task("[API] Invoice")).unwrap();
        }

        it "annotates tasks with their context in document order" {
            let page = workspace.tasks.list_tasks(&TaskFilter::default());
            assert_eq!(page.total, 3);
            let seen: Vec<(&str, u32)> = page.tasks.iter().map(|t| (t.context.as_str(), t.task.id)).collect();
            assert_eq!(seen, vec![("auth", 1), ("auth", 2), ("billing", 1)]);
        }

        it "filters by tag and context" {
            let page = workspace.tasks.list_tasks(&TaskFilter { tag: Some("api".to_string()), ..Default::default() });
            assert_eq!(page.total, 1);

            let page = workspace.tasks.list_tasks(&TaskFilter { context: Some("billing".to_string()), ..Default::default() });
            assert_eq!(page.total, 1);

            let page = workspace.tasks.list_tasks(&TaskFilter { context: Some("search".to_string()), ..Default::default() });
            assert_eq!(page.total, 0);
        }

        it "paginates after counting" {
            let page = workspace.tasks.list_tasks(&TaskFilter { limit: 1, offset: 1, ..Default::default() });
            assert_eq!(page.total, 3);
            assert_eq!(page.tasks.len(), 1);
            assert_eq!(page.tasks[0].task.title, "[UI] Form");
        }
    }

    describe "definitions" {
        it "warns when a feature uses undeclared tags" {
            let feature = workspace
                .definitions
                .add_feature(CreateFeatureInput {
                    name: "search".to_string(),
                    description: "Full text".to_string(),
                    common_tags: vec!["api".to_string()],
                    related_contexts: vec!["search".to_string()],
                })
                .expect("Failed to add feature");
            assert_eq!(feature.warnings.len(), 1);
        }

        it "rejects a duplicate feature" {
            let err = workspace.definitions.add_feature(CreateFeatureInput {
                name: "auth".to_string(),
                ..Default::default()
            }).unwrap_err();
            assert!(matches!(err, StoreError::Duplicate { .. }));
        }

        it "rejects a duplicate tech tag" {
            workspace.definitions.add_tech_tag("api", "HTTP").unwrap();
            assert!(matches!(
                workspace.definitions.add_tech_tag("api", "again").unwrap_err(),
                StoreError::Duplicate { .. }
            ));
        }

        it "updates only the fields given" {
            workspace.definitions.update_feature("auth", UpdateFeatureInput {
                description: Some("Sign in".to_string()),
                ..Default::default()
            }).unwrap();

            let updated = workspace.definitions.update_feature("auth", UpdateFeatureInput {
                related_contexts: Some(vec!["auth".to_string()]),
                ..Default::default()
            }).unwrap();
            assert_eq!(updated.item.spec.description, "Sign in");
            assert_eq!(updated.item.spec.related_contexts, vec!["auth"]);
        }

        it "warns when an update introduces undeclared tags" {
            let updated = workspace.definitions.update_feature("auth", UpdateFeatureInput {
                common_tags: Some(vec!["api".to_string()]),
                ..Default::default()
            }).expect("Failed to update feature");
            assert_eq!(updated.warnings.len(), 1);
            assert!(updated.warnings[0].contains("api"));

            workspace.definitions.add_tech_tag("api", "HTTP").unwrap();
            let updated = workspace.definitions.update_feature("auth", UpdateFeatureInput {
                common_tags: Some(vec!["api".to_string()]),
                ..Default::default()
            }).unwrap();
            assert!(updated.warnings.is_empty());
        }

        it "keeps tasks when a feature is removed" {
            workspace.tasks.add_task("auth", new_task("[API] Login")).unwrap();

            workspace.definitions.remove_feature("auth").unwrap();
            assert!(workspace.tasks.get_task("auth", 1).is_ok());
            let report = workspace.validate_project_files();
            assert!(report.warnings.iter().any(|w| w.location == "auth"));
        }

        it "reports a missing tech tag" {
            let err = workspace.definitions.remove_tech_tag("api").unwrap_err();
            assert!(matches!(err, StoreError::NotFound(NotFound::TechTag { .. })));
        }
    }
}

#[test]
fn failed_save_leaves_memory_unchanged() {
    let failing = Arc::new(AtomicBool::new(false));
    let workspace = Workspace::with_persistence(
        Switchable {
            inner: InMemory::new(),
            failing: failing.clone(),
        },
        InMemory::new(),
    )
    .expect("Failed to open workspace");
    workspace
        .init_project(&[ContextInit {
            name: "auth".to_string(),
            description: None,
        }])
        .unwrap();
    workspace.tasks.add_task("auth", new_task("[API] Login")).unwrap();
    let before = workspace.tasks.snapshot();

    failing.store(true, Ordering::SeqCst);
    let err = workspace
        .tasks
        .add_task("auth", new_task("[API] Logout"))
        .unwrap_err();
    assert!(matches!(err, StoreError::Persistence(_)));
    assert!(workspace.tasks.update_task_status("auth", 1, "inprogress").is_err());
    assert_eq!(workspace.tasks.snapshot(), before);

    failing.store(false, Ordering::SeqCst);
    let task = workspace
        .tasks
        .add_task("auth", new_task("[API] Logout"))
        .unwrap();
    assert_eq!(task.item.id, 2);
}

#[test]
fn documents_survive_a_reopen() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let tasks_file = dir.path().join("nested/tasks.json");
    let definitions_file = dir.path().join("nested/definitions.json");

    let open = || {
        Workspace::with_persistence(
            JsonFile::<TasksDocument>::new(&tasks_file),
            JsonFile::<DefinitionsDocument>::new(&definitions_file),
        )
        .expect("Failed to open workspace")
    };

    let workspace = open();
    init(&workspace, &["auth"]);
    workspace.tasks.add_task("auth", new_task("[API] Login")).unwrap();
    workspace
        .tasks
        .add_subtask("auth", 1, &[], new_subtask("[API] Route"))
        .unwrap();
    assert!(definitions_file.exists());

    let reopened = open();
    let task = reopened.tasks.get_task("auth", 1).unwrap();
    assert_eq!(task.subtasks.len(), 1);
    assert_eq!(reopened.tasks.snapshot(), workspace.tasks.snapshot());
}

#[test]
fn loads_documents_with_offset_less_dates() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let tasks_file = dir.path().join("tasks.json");
    std::fs::write(
        &tasks_file,
        r#"{
  "auth": {
    "tasks": [
      {
        "id": 1,
        "title": "[API] Login",
        "description": "Password login",
        "priority": "high",
        "status": "done",
        "dependencies": [],
        "creationDate": "2025-01-02T03:04:05",
        "completedDate": "2025-01-03T10:00:00",
        "tags": ["api"],
        "blockers": [],
        "notes": "",
        "subtasks": [
          {
            "id": 1,
            "title": "[API] Route",
            "description": "",
            "status": "todo",
            "dependencies": [],
            "creationDate": "2025-01-02T03:05:00",
            "tags": [],
            "blockers": [],
            "notes": "",
            "subtasks": []
          }
        ]
      }
    ],
    "metadata": {
      "created": "2025-01-02T03:04:05.123456+00:00",
      "updated": "2025-01-03T10:00:00.000001+00:00",
      "description": "Context for auth",
      "version": "1.0.0"
    }
  }
}"#,
    )
    .expect("Failed to write tasks file");

    let workspace = Workspace::with_persistence(
        JsonFile::<TasksDocument>::new(&tasks_file),
        JsonFile::<DefinitionsDocument>::new(dir.path().join("definitions.json")),
    )
    .expect("Failed to open workspace");

    let task = workspace.tasks.get_task("auth", 1).unwrap();
    assert_eq!(task.creation_date.to_rfc3339(), "2025-01-02T03:04:05+00:00");
    assert!(task.completed_date.is_some());
    assert_eq!(task.subtasks.len(), 1);

    workspace
        .tasks
        .add_task("auth", new_task("[API] Logout"))
        .expect("Failed to add task");
    let written = std::fs::read_to_string(&tasks_file).unwrap();
    assert!(written.contains("2025-01-02T03:04:05Z"));
}

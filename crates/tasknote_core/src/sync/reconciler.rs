//! Two-way reconciliation between note fragments and the task store.
//!
//! # Responsibility
//! - Turn edited note content into task creations and updates.
//! - Turn task completion changes into single-fragment patches.
//!
//! # Invariants
//! - The reconciler owns no state; every call reads the stores it is given.
//! - After `on_note_content_changed` every fragment carries an id and maps
//!   to exactly one task.
//! - Content events own `text` and `checked`; task toggles own pushing
//!   `completed` back into the note.

use crate::content::{self, markup};
use crate::model::fragment::{FragmentAttrs, FragmentId};
use crate::model::note::NoteId;
use crate::model::task::{SourceRef, Task, TaskSection, TaskType};
use crate::store::id_registry::IdentifierRegistry;
use crate::store::note_store::NoteStore;
use crate::store::task_store::{TaskStore, TextUpdate};
use log::{debug, info, warn};

/// Result of reconciling one content change.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ContentSync {
    /// Content after quick capture and id assignment.
    pub content: String,
    /// True when `content` differs from the input.
    pub rewritten: bool,
    pub created: Vec<Task>,
    pub updated: Vec<Task>,
}

impl ContentSync {
    pub fn touched_tasks(&self) -> bool {
        !self.created.is_empty() || !self.updated.is_empty()
    }
}

/// Attribute update for one fragment of one note.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FragmentPatch {
    pub note_id: NoteId,
    pub fragment_id: FragmentId,
    pub attrs: FragmentAttrs,
    /// Note content with the patch applied.
    pub content: String,
}

/// Outcome of pushing a task's completion into its note.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionSync {
    /// The task was not created from a note.
    NoSource,
    NoteMissing,
    FragmentMissing,
    /// The fragment already shows the task's state.
    InSync,
    Patched(FragmentPatch),
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Reconciler {
    registry: IdentifierRegistry,
}

impl Reconciler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Processes edited note content.
    ///
    /// Steps, in order: quick capture, id assignment for new fragments,
    /// then create-or-update of the task behind every non-blank fragment.
    /// The caller stores `ContentSync::content` as the note's new content.
    pub fn on_note_content_changed(
        &self,
        note_id: NoteId,
        content: &str,
        tasks: &mut TaskStore,
    ) -> ContentSync {
        let mut sync = ContentSync::default();

        let capture = content::capture_quick_tasks(content);
        for text in &capture.captured {
            match tasks.create(text, TaskType::Work, TaskSection::Todo, None) {
                Ok(task) => {
                    info!(
                        "event=quick_capture module=reconciler status=ok note_id={} task_id={}",
                        note_id, task.id
                    );
                    sync.created.push(task);
                }
                Err(err) => warn!(
                    "event=quick_capture module=reconciler status=rejected note_id={} error={}",
                    note_id, err
                ),
            }
        }

        let registry = self.registry;
        let (rewritten, fragments) =
            markup::with_fragment_ids(&capture.content, |fragment| registry.ensure_id(fragment));

        for fragment in fragments {
            let Some(fragment_id) = fragment.fragment_id else {
                continue;
            };
            if fragment.text.trim().is_empty() {
                continue;
            }

            let existing = tasks
                .find_by_source(note_id, &fragment_id)
                .map(|task| (task.id, task.text != fragment.text.trim(), task.completed));

            match existing {
                None => {
                    let source = SourceRef::new(note_id, fragment_id.clone());
                    let created = tasks.create(
                        &fragment.text,
                        fragment.task_type,
                        fragment.section,
                        Some(source),
                    );
                    match created {
                        Ok(task) => {
                            let task = if fragment.checked {
                                tasks.set_completed(task.id, true).ok();
                                tasks.get(task.id).cloned().unwrap_or(task)
                            } else {
                                task
                            };
                            debug!(
                                "event=fragment_sync module=reconciler status=created note_id={} fragment_id={} task_id={}",
                                note_id, fragment_id, task.id
                            );
                            sync.created.push(task);
                        }
                        Err(err) => warn!(
                            "event=fragment_sync module=reconciler status=rejected note_id={} fragment_id={} error={}",
                            note_id, fragment_id, err
                        ),
                    }
                }
                Some((task_id, text_differs, completed)) => {
                    let mut changed = false;
                    if text_differs {
                        changed |= matches!(
                            tasks.update_text(task_id, &fragment.text),
                            Ok(TextUpdate::Updated(_))
                        );
                    }
                    if completed != fragment.checked {
                        changed |= tasks.set_completed(task_id, fragment.checked).unwrap_or(false);
                    }
                    if changed {
                        if let Some(task) = tasks.get(task_id) {
                            sync.updated.push(task.clone());
                        }
                    }
                }
            }
        }

        sync.rewritten = rewritten != content;
        sync.content = rewritten;
        sync
    }

    /// Computes the fragment patch that mirrors `task.completed` into its
    /// note. Never rewrites anything but the fragment's checked flag.
    pub fn on_task_completed_changed(&self, task: &Task, notes: &NoteStore) -> CompletionSync {
        let Some(source) = task.source.as_ref() else {
            return CompletionSync::NoSource;
        };
        let Some(note) = notes.get(source.note_id) else {
            debug!(
                "event=completion_sync module=reconciler status=note_missing task_id={} note_id={}",
                task.id, source.note_id
            );
            return CompletionSync::NoteMissing;
        };
        let Some(fragment) = markup::find_fragment(&note.content, &source.fragment_id) else {
            return CompletionSync::FragmentMissing;
        };
        if fragment.checked == task.completed {
            return CompletionSync::InSync;
        }

        let attrs = FragmentAttrs {
            checked: task.completed,
        };
        match markup::patch_fragment(&note.content, &source.fragment_id, attrs) {
            Some(content) => CompletionSync::Patched(FragmentPatch {
                note_id: source.note_id,
                fragment_id: source.fragment_id.clone(),
                attrs,
                content,
            }),
            None => CompletionSync::FragmentMissing,
        }
    }

    /// Pushes a checkbox click inside a note into the linked task.
    ///
    /// Returns the task when its completion changed.
    pub fn on_fragment_toggled(
        &self,
        note_id: NoteId,
        fragment_id: &FragmentId,
        checked: bool,
        tasks: &mut TaskStore,
    ) -> Option<Task> {
        let Some(task_id) = tasks
            .find_by_source(note_id, fragment_id)
            .map(|task| task.id)
        else {
            debug!(
                "event=fragment_toggle module=reconciler status=unlinked note_id={} fragment_id={}",
                note_id, fragment_id
            );
            return None;
        };
        match tasks.set_completed(task_id, checked) {
            Ok(true) => tasks.get(task_id).cloned(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{CompletionSync, Reconciler};
    use crate::clock::ManualClock;
    use crate::content::extract_fragments;
    use crate::model::fragment::FragmentId;
    use crate::model::note::FolderRef;
    use crate::store::note_store::NoteStore;
    use crate::store::task_store::TaskStore;
    use std::rc::Rc;

    fn stores() -> (TaskStore, NoteStore) {
        let clock = Rc::new(ManualClock::new(1_000));
        (TaskStore::new(clock.clone()), NoteStore::new(clock))
    }

    const BUY_MILK: &str = r#"<ul data-type="taskList"><li data-type="taskItem" data-checked="false"><p>Buy milk</p></li></ul>"#;

    #[test]
    fn new_fragment_gets_id_and_one_task() {
        let (mut tasks, _) = stores();
        let reconciler = Reconciler::new();
        let note_id = uuid::Uuid::new_v4();

        let sync = reconciler.on_note_content_changed(note_id, BUY_MILK, &mut tasks);
        assert!(sync.rewritten);
        assert_eq!(sync.created.len(), 1);

        let fragments = extract_fragments(&sync.content);
        let fragment_id = fragments[0].fragment_id.clone().unwrap();
        assert!(fragment_id.as_str().starts_with("note-task-"));
        let task = tasks.find_exact(note_id, &fragment_id).unwrap();
        assert_eq!(task.text, "Buy milk");

        let again = reconciler.on_note_content_changed(note_id, &sync.content, &mut tasks);
        assert!(!again.rewritten);
        assert!(!again.touched_tasks());
        assert_eq!(tasks.len(), 1);
    }

    #[test]
    fn blank_fragments_are_skipped() {
        let (mut tasks, _) = stores();
        let content = r#"<ul data-type="taskList"><li data-type="taskItem" data-checked="false"><p></p></li></ul>"#;
        let sync = Reconciler::new().on_note_content_changed(uuid::Uuid::new_v4(), content, &mut tasks);
        assert!(sync.rewritten);
        assert!(tasks.is_empty());
    }

    #[test]
    fn completion_without_source_or_note_is_noop() {
        let (mut tasks, notes) = stores();
        let reconciler = Reconciler::new();
        let plain = tasks
            .create(
                "x",
                crate::model::task::TaskType::Work,
                crate::model::task::TaskSection::Todo,
                None,
            )
            .unwrap();
        assert_eq!(
            reconciler.on_task_completed_changed(&plain, &notes),
            CompletionSync::NoSource
        );

        let sync = reconciler.on_note_content_changed(uuid::Uuid::new_v4(), BUY_MILK, &mut tasks);
        assert_eq!(
            reconciler.on_task_completed_changed(&sync.created[0], &notes),
            CompletionSync::NoteMissing
        );
    }

    #[test]
    fn completion_patches_only_the_fragment() {
        let (mut tasks, mut notes) = stores();
        let reconciler = Reconciler::new();
        let note = notes.create(FolderRef::All).unwrap();
        let sync = reconciler.on_note_content_changed(note.id, BUY_MILK, &mut tasks);
        notes.update_content(note.id, &sync.content).unwrap();

        let task = tasks.toggle_completed(sync.created[0].id).unwrap();
        let CompletionSync::Patched(patch) = reconciler.on_task_completed_changed(&task, &notes)
        else {
            panic!("expected a fragment patch");
        };
        assert!(patch.attrs.checked);
        assert_eq!(
            patch.content,
            sync.content
                .replace(r#"data-checked="false""#, r#"data-checked="true""#)
        );

        notes.update_content(note.id, &patch.content).unwrap();
        assert_eq!(
            reconciler.on_task_completed_changed(&task, &notes),
            CompletionSync::InSync
        );
    }

    #[test]
    fn fragment_toggle_updates_linked_task_only() {
        let (mut tasks, _) = stores();
        let reconciler = Reconciler::new();
        let note_id = uuid::Uuid::new_v4();
        let sync = reconciler.on_note_content_changed(note_id, BUY_MILK, &mut tasks);
        let fragment_id = sync.created[0]
            .source
            .as_ref()
            .map(|source| source.fragment_id.clone())
            .unwrap();

        let toggled = reconciler
            .on_fragment_toggled(note_id, &fragment_id, true, &mut tasks)
            .unwrap();
        assert!(toggled.completed);
        assert!(reconciler
            .on_fragment_toggled(note_id, &fragment_id, true, &mut tasks)
            .is_none());
        assert!(reconciler
            .on_fragment_toggled(note_id, &FragmentId::new("note-task-unknown"), true, &mut tasks)
            .is_none());
    }
}

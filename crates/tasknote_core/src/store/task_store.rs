//! Canonical task collection.
//!
//! # Responsibility
//! - Create, toggle, edit, move and delete tasks.
//! - Resolve tasks by their note fragment reference.
//! - Remove long-completed tasks in the archive sweep.
//!
//! # Invariants
//! - `create` with a `SourceRef` is idempotent: one task per fragment.
//! - `completed_at` is stamped on false→true and cleared on true→false.
//! - `delete` of an absent task is a no-op.
//! - Blank text never reaches storage; editing a task to blank deletes it.

use crate::clock::{Clock, EpochMs, DAY_MS};
use crate::model::fragment::FragmentId;
use crate::model::note::NoteId;
use crate::model::task::{normalize_task_text, SourceRef, Task, TaskId, TaskSection, TaskType};
use crate::store::{StoreError, StoreResult};
use log::{debug, info, warn};
use std::collections::HashSet;
use std::rc::Rc;

/// Outcome of [`TaskStore::update_text`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextUpdate {
    Updated(Task),
    Unchanged(Task),
    /// Blank text removed the task.
    Deleted(Task),
}

pub struct TaskStore {
    tasks: Vec<Task>,
    clock: Rc<dyn Clock>,
    archive_after_ms: EpochMs,
}

impl TaskStore {
    pub fn new(clock: Rc<dyn Clock>) -> Self {
        Self {
            tasks: Vec::new(),
            clock,
            archive_after_ms: DAY_MS,
        }
    }

    /// Overrides the 24h archive threshold.
    pub fn with_archive_after(mut self, archive_after_ms: EpochMs) -> Self {
        self.archive_after_ms = archive_after_ms;
        self
    }

    pub fn archive_after_ms(&self) -> EpochMs {
        self.archive_after_ms
    }

    /// Creates a task, or returns the existing one for the same `source`.
    ///
    /// # Errors
    /// - `StoreError::Validation(EmptyText)` when `text` is blank.
    pub fn create(
        &mut self,
        text: &str,
        task_type: TaskType,
        section: TaskSection,
        source: Option<SourceRef>,
    ) -> StoreResult<Task> {
        self.create_or_existing(text, task_type, section, source)
            .map(|(task, _)| task)
    }

    /// Same as [`create`](Self::create); the flag tells whether a new task
    /// was inserted.
    pub fn create_or_existing(
        &mut self,
        text: &str,
        task_type: TaskType,
        section: TaskSection,
        source: Option<SourceRef>,
    ) -> StoreResult<(Task, bool)> {
        if let Some(source) = source.as_ref() {
            if let Some(existing) = self.find_exact(source.note_id, &source.fragment_id) {
                debug!(
                    "event=task_create module=task_store status=exists task_id={} fragment_id={}",
                    existing.id, source.fragment_id
                );
                return Ok((existing.clone(), false));
            }
        }

        let task = Task::new(text, task_type, section, source, self.clock.now_ms())?;
        info!(
            "event=task_create module=task_store status=ok task_id={} type={} section={} note_derived={}",
            task.id,
            task.task_type.as_str(),
            task.section.as_str(),
            task.is_note_derived()
        );
        self.tasks.insert(0, task.clone());
        Ok((task, true))
    }

    /// Flips completion.
    ///
    /// # Errors
    /// - `StoreError::TaskNotFound` for unknown ids.
    pub fn toggle_completed(&mut self, task_id: TaskId) -> StoreResult<Task> {
        let now = self.clock.now_ms();
        let task = self.get_mut(task_id)?;
        let next = !task.completed;
        task.set_completed(next, now);
        Ok(task.clone())
    }

    /// Sets completion to an explicit value. Returns whether it changed.
    pub fn set_completed(&mut self, task_id: TaskId, completed: bool) -> StoreResult<bool> {
        let now = self.clock.now_ms();
        Ok(self.get_mut(task_id)?.set_completed(completed, now))
    }

    /// Replaces task text; blank text deletes the task.
    pub fn update_text(&mut self, task_id: TaskId, text: &str) -> StoreResult<TextUpdate> {
        let Some(normalized) = normalize_task_text(text) else {
            let removed = self
                .delete(task_id)
                .ok_or(StoreError::TaskNotFound(task_id))?;
            return Ok(TextUpdate::Deleted(removed));
        };

        let task = self.get_mut(task_id)?;
        if task.text == normalized {
            return Ok(TextUpdate::Unchanged(task.clone()));
        }
        task.text = normalized;
        Ok(TextUpdate::Updated(task.clone()))
    }

    /// Moves a task to another list and/or section.
    pub fn move_to(
        &mut self,
        task_id: TaskId,
        task_type: TaskType,
        section: TaskSection,
    ) -> StoreResult<Task> {
        let task = self.get_mut(task_id)?;
        task.task_type = task_type;
        task.section = section;
        Ok(task.clone())
    }

    /// Removes a task. Absent ids are a no-op returning `None`.
    pub fn delete(&mut self, task_id: TaskId) -> Option<Task> {
        let index = self.tasks.iter().position(|task| task.id == task_id)?;
        Some(self.tasks.remove(index))
    }

    pub fn get(&self, task_id: TaskId) -> Option<&Task> {
        self.tasks.iter().find(|task| task.id == task_id)
    }

    pub fn all(&self) -> &[Task] {
        &self.tasks
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Looks a task up by fragment reference.
    ///
    /// Exact match first. When that fails, falls back to substring
    /// containment between stored and queried fragment ids within the same
    /// note; every fallback hit is logged.
    pub fn find_by_source(&self, note_id: NoteId, fragment_id: &FragmentId) -> Option<&Task> {
        if let Some(task) = self.find_exact(note_id, fragment_id) {
            return Some(task);
        }

        let fallback = self.tasks.iter().find(|task| {
            task.source.as_ref().is_some_and(|source| {
                source.note_id == note_id && source.fragment_id.loosely_matches(fragment_id)
            })
        })?;
        warn!(
            "event=task_source_lookup module=task_store status=fuzzy_match note_id={} queried={} matched={} task_id={}",
            note_id,
            fragment_id,
            fallback
                .source
                .as_ref()
                .map_or("", |source| source.fragment_id.as_str()),
            fallback.id
        );
        Some(fallback)
    }

    /// Exact `(note_id, fragment_id)` match only.
    pub fn find_exact(&self, note_id: NoteId, fragment_id: &FragmentId) -> Option<&Task> {
        self.tasks.iter().find(|task| {
            task.source.as_ref().is_some_and(|source| {
                source.note_id == note_id && &source.fragment_id == fragment_id
            })
        })
    }

    /// Tasks derived from one note.
    pub fn tasks_for_note(&self, note_id: NoteId) -> Vec<&Task> {
        self.tasks
            .iter()
            .filter(|task| {
                task.source
                    .as_ref()
                    .is_some_and(|source| source.note_id == note_id)
            })
            .collect()
    }

    /// Removes every completed task whose `completed_at` is at least the
    /// archive threshold older than `now`. Returns the removed tasks.
    pub fn sweep_archive(&mut self, now: EpochMs) -> Vec<Task> {
        let archive_after_ms = self.archive_after_ms;
        let (archived, kept): (Vec<Task>, Vec<Task>) = std::mem::take(&mut self.tasks)
            .into_iter()
            .partition(|task| task.is_archivable(now, archive_after_ms));
        self.tasks = kept;

        if !archived.is_empty() {
            info!(
                "event=archive_sweep module=task_store status=ok removed={} remaining={}",
                archived.len(),
                self.tasks.len()
            );
        }
        archived
    }

    /// Tasks of one list section: pending first, completed after, each in
    /// store order.
    pub fn list(&self, task_type: TaskType, section: TaskSection) -> Vec<&Task> {
        let (pending, completed): (Vec<&Task>, Vec<&Task>) = self
            .tasks
            .iter()
            .filter(|task| task.task_type == task_type && task.section == section)
            .partition(|task| !task.completed);
        pending.into_iter().chain(completed).collect()
    }

    /// Number of pending tasks in one list section.
    pub fn pending_count(&self, task_type: TaskType, section: TaskSection) -> usize {
        self.tasks
            .iter()
            .filter(|task| task.task_type == task_type && task.section == section)
            .filter(|task| !task.completed)
            .count()
    }

    /// True when the sweep will remove this task within `window_ms`.
    pub fn archives_within(&self, task: &Task, now: EpochMs, window_ms: EpochMs) -> bool {
        match (task.completed, task.completed_at) {
            (true, Some(completed_at)) => completed_at + self.archive_after_ms - now < window_ms,
            _ => false,
        }
    }

    /// Replaces the whole collection (hydration). Later duplicates of the
    /// same `SourceRef` are dropped.
    pub fn replace_all(&mut self, tasks: Vec<Task>) {
        let mut seen: HashSet<SourceRef> = HashSet::new();
        let before = tasks.len();
        self.tasks = tasks
            .into_iter()
            .filter(|task| match &task.source {
                Some(source) => seen.insert(source.clone()),
                None => true,
            })
            .collect();
        if self.tasks.len() != before {
            warn!(
                "event=task_hydrate module=task_store status=deduplicated dropped={}",
                before - self.tasks.len()
            );
        }
    }

    fn get_mut(&mut self, task_id: TaskId) -> StoreResult<&mut Task> {
        self.tasks
            .iter_mut()
            .find(|task| task.id == task_id)
            .ok_or(StoreError::TaskNotFound(task_id))
    }
}

#[cfg(test)]
mod tests {
    use super::{TaskStore, TextUpdate};
    use crate::clock::{ManualClock, DAY_MS};
    use crate::model::fragment::FragmentId;
    use crate::model::task::{SourceRef, TaskSection, TaskType};
    use crate::model::ValidationError;
    use crate::store::StoreError;
    use std::rc::Rc;
    use uuid::Uuid;

    fn store_at(now: i64) -> (TaskStore, ManualClock) {
        let clock = ManualClock::new(now);
        (TaskStore::new(Rc::new(clock.clone())), clock)
    }

    #[test]
    fn create_rejects_blank_text() {
        let (mut store, _) = store_at(0);
        let err = store
            .create("  ", TaskType::Work, TaskSection::Todo, None)
            .unwrap_err();
        assert_eq!(err, StoreError::Validation(ValidationError::EmptyText));
        assert!(store.is_empty());
    }

    #[test]
    fn create_with_same_source_is_idempotent() {
        let (mut store, _) = store_at(0);
        let source = SourceRef::new(Uuid::new_v4(), FragmentId::new("note-task-1"));
        let first = store
            .create("a", TaskType::Work, TaskSection::Todo, Some(source.clone()))
            .unwrap();
        let second = store
            .create("b", TaskType::Private, TaskSection::Waiting, Some(source))
            .unwrap();
        assert_eq!(first, second);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn new_tasks_are_prepended() {
        let (mut store, _) = store_at(0);
        store
            .create("first", TaskType::Work, TaskSection::Todo, None)
            .unwrap();
        store
            .create("second", TaskType::Work, TaskSection::Todo, None)
            .unwrap();
        assert_eq!(store.all()[0].text, "second");
    }

    #[test]
    fn toggle_sets_and_clears_completed_at() {
        let (mut store, clock) = store_at(1_000);
        let task = store
            .create("x", TaskType::Work, TaskSection::Todo, None)
            .unwrap();
        clock.set(5_000);
        let done = store.toggle_completed(task.id).unwrap();
        assert!(done.completed);
        assert_eq!(done.completed_at, Some(5_000));
        let undone = store.toggle_completed(task.id).unwrap();
        assert!(!undone.completed);
        assert_eq!(undone.completed_at, None);
    }

    #[test]
    fn toggle_unknown_task_is_not_found() {
        let (mut store, _) = store_at(0);
        let id = Uuid::new_v4();
        assert_eq!(
            store.toggle_completed(id).unwrap_err(),
            StoreError::TaskNotFound(id)
        );
    }

    #[test]
    fn update_text_to_blank_deletes() {
        let (mut store, _) = store_at(0);
        let task = store
            .create("x", TaskType::Work, TaskSection::Todo, None)
            .unwrap();
        assert!(matches!(
            store.update_text(task.id, " y ").unwrap(),
            TextUpdate::Updated(ref updated) if updated.text == "y"
        ));
        assert!(matches!(
            store.update_text(task.id, "y").unwrap(),
            TextUpdate::Unchanged(_)
        ));
        assert!(matches!(
            store.update_text(task.id, "   ").unwrap(),
            TextUpdate::Deleted(_)
        ));
        assert!(store.get(task.id).is_none());
    }

    #[test]
    fn delete_is_idempotent() {
        let (mut store, _) = store_at(0);
        let task = store
            .create("x", TaskType::Work, TaskSection::Todo, None)
            .unwrap();
        assert!(store.delete(task.id).is_some());
        assert!(store.delete(task.id).is_none());
    }

    #[test]
    fn find_by_source_falls_back_to_containment_within_note() {
        let (mut store, _) = store_at(0);
        let note_id = Uuid::new_v4();
        let other_note = Uuid::new_v4();
        store
            .create(
                "x",
                TaskType::Work,
                TaskSection::Todo,
                Some(SourceRef::new(note_id, FragmentId::new("note-task-abc"))),
            )
            .unwrap();

        assert!(store
            .find_by_source(note_id, &FragmentId::new("note-task-abc"))
            .is_some());
        assert!(store.find_exact(note_id, &FragmentId::new("abc")).is_none());
        assert!(store
            .find_by_source(note_id, &FragmentId::new("abc"))
            .is_some());
        assert!(store
            .find_by_source(other_note, &FragmentId::new("abc"))
            .is_none());
        assert!(store.find_by_source(note_id, &FragmentId::new("")).is_none());
    }

    #[test]
    fn sweep_removes_only_tasks_completed_a_day_ago() {
        let (mut store, clock) = store_at(0);
        let old_done = store
            .create("old done", TaskType::Work, TaskSection::Todo, None)
            .unwrap();
        let recent_done = store
            .create("recent done", TaskType::Work, TaskSection::Todo, None)
            .unwrap();
        let pending = store
            .create("pending", TaskType::Work, TaskSection::Todo, None)
            .unwrap();
        store.toggle_completed(old_done.id).unwrap();
        clock.set(DAY_MS / 2);
        store.toggle_completed(recent_done.id).unwrap();

        let now = DAY_MS;
        let removed = store.sweep_archive(now);
        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0].id, old_done.id);
        assert!(store.sweep_archive(now).is_empty());
        assert!(store.get(pending.id).is_some());
        assert!(store.get(recent_done.id).is_some());

        assert!(store.sweep_archive(now * 365).len() == 1);
        assert!(store.get(pending.id).is_some());
    }

    #[test]
    fn list_puts_completed_last_and_counts_pending() {
        let (mut store, _) = store_at(0);
        let a = store
            .create("a", TaskType::Work, TaskSection::Todo, None)
            .unwrap();
        store
            .create("b", TaskType::Work, TaskSection::Todo, None)
            .unwrap();
        store
            .create("c", TaskType::Private, TaskSection::Todo, None)
            .unwrap();
        store.toggle_completed(a.id).unwrap();
        store
            .move_to(a.id, TaskType::Work, TaskSection::Todo)
            .unwrap();

        let texts: Vec<&str> = store
            .list(TaskType::Work, TaskSection::Todo)
            .into_iter()
            .map(|task| task.text.as_str())
            .collect();
        assert_eq!(texts, vec!["b", "a"]);
        assert_eq!(store.pending_count(TaskType::Work, TaskSection::Todo), 1);
        assert_eq!(store.pending_count(TaskType::Private, TaskSection::Todo), 1);
    }

    #[test]
    fn archives_within_reports_last_hour() {
        let (mut store, clock) = store_at(0);
        let task = store
            .create("x", TaskType::Work, TaskSection::Todo, None)
            .unwrap();
        let done = store.toggle_completed(task.id).unwrap();
        let hour = 60 * 60 * 1000;
        clock.set(DAY_MS - 2 * hour);
        assert!(!store.archives_within(&done, DAY_MS - 2 * hour, hour));
        assert!(store.archives_within(&done, DAY_MS - hour / 2, hour));
    }
}

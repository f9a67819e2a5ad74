//! Workspace use-case facade.
//!
//! # Responsibility
//! - Apply user operations and editor events to the stores optimistically.
//! - Route every change through the reconciler and the persistence gateway.
//! - Drive time-based work (save debounce, empty-note cleanup, archive
//!   sweep) from `tick`.
//!
//! # Invariants
//! - Stores change before any persistence is attempted.
//! - Unknown ids on user operations return `false`/`None` and log a warning.
//! - `teardown` leaves no pending timer and no unsent write behind.

use crate::clock::{Clock, EpochMs};
use crate::config::SyncConfig;
use crate::content::markup;
use crate::model::fragment::{FragmentAttrs, FragmentId};
use crate::model::note::{Folder, FolderId, FolderRef, Note, NoteId, EMPTY_DOCUMENT};
use crate::model::task::{Task, TaskId, TaskSection, TaskType};
use crate::persist::{
    Debouncer, DispatchFailure, FailurePolicy, LocalCache, PersistenceGateway, RemoteStore,
};
use crate::session::{AuthStateSource, SessionChange, SessionContext, User};
use crate::store::note_store::NoteStore;
use crate::store::task_store::{TaskStore, TextUpdate};
use crate::store::StoreResult;
use crate::sync::{CompletionSync, EditorEvent, EditorSurface, Reconciler};
use log::{info, warn};
use std::rc::Rc;

/// External collaborators of a workspace.
pub struct WorkspaceDeps<E> {
    pub clock: Rc<dyn Clock>,
    pub remote: Box<dyn RemoteStore>,
    pub cache: Box<dyn LocalCache>,
    pub auth: Box<dyn AuthStateSource>,
    pub editor: E,
}

/// Work done by one [`WorkspaceService::tick`].
#[derive(Debug, Default)]
pub struct TickReport {
    pub session_changes: Vec<SessionChange>,
    pub saved_notes: Vec<NoteId>,
    pub removed_empty_notes: Vec<NoteId>,
    pub archived: Vec<Task>,
    pub failed_writes: Vec<DispatchFailure>,
}

pub struct WorkspaceService<E: EditorSurface> {
    clock: Rc<dyn Clock>,
    config: SyncConfig,
    tasks: TaskStore,
    notes: NoteStore,
    reconciler: Reconciler,
    gateway: PersistenceGateway,
    session: SessionContext,
    editor: E,
    blur_cleanup: Debouncer<NoteId>,
    next_sweep_at: EpochMs,
}

impl<E: EditorSurface> WorkspaceService<E> {
    pub fn new(deps: WorkspaceDeps<E>, config: SyncConfig) -> Self {
        let now = deps.clock.now_ms();
        Self {
            tasks: TaskStore::new(Rc::clone(&deps.clock))
                .with_archive_after(config.archive_after_ms),
            notes: NoteStore::new(Rc::clone(&deps.clock)),
            reconciler: Reconciler::new(),
            gateway: PersistenceGateway::new(deps.remote, deps.cache, config.save_debounce_ms),
            session: SessionContext::new(deps.auth),
            editor: deps.editor,
            blur_cleanup: Debouncer::new(config.blur_cleanup_ms),
            next_sweep_at: now + config.sweep_interval_ms,
            clock: deps.clock,
            config,
        }
    }

    /// Restores the local mirror, then the signed-in user's remote data.
    pub fn init(&mut self) {
        let tasks = self.gateway.load_cached_tasks();
        let notes = self.gateway.load_cached_notes();
        let folders = self.gateway.load_cached_folders();
        info!(
            "event=workspace_init module=workspace status=cached tasks={} notes={} folders={}",
            tasks.len(),
            notes.len(),
            folders.len()
        );
        self.tasks.replace_all(tasks);
        self.notes.replace_all(notes, folders);

        if let Some(user) = self.session.init().cloned() {
            self.on_signed_in(&user);
        }
        self.next_sweep_at = self.clock.now_ms() + self.config.sweep_interval_ms;
    }

    /// Flushes pending saves, sends queued writes and unsubscribes from
    /// auth events.
    pub fn teardown(&mut self) {
        for note_id in self.gateway.drain_note_saves() {
            self.save_note_now(note_id);
        }
        self.blur_cleanup.drain();
        let failures = self.gateway.dispatch();
        self.apply_failures(&failures);
        self.session.teardown();
        info!(
            "event=workspace_teardown module=workspace status=ok failed_writes={}",
            failures.len()
        );
    }

    /// Runs everything that is due at the clock's current instant.
    pub fn tick(&mut self) -> TickReport {
        let now = self.clock.now_ms();
        let mut report = TickReport {
            session_changes: self.session.poll(),
            ..TickReport::default()
        };
        for change in &report.session_changes {
            match change {
                SessionChange::SignedIn(user) => self.on_signed_in(user),
                SessionChange::SignedOut => self.gateway.set_user(None),
            }
        }

        for note_id in self.gateway.due_note_saves(now) {
            if self.save_note_now(note_id) {
                report.saved_notes.push(note_id);
            }
        }

        for note_id in self.blur_cleanup.due(now) {
            if self.notes.is_empty_note(note_id).unwrap_or(false) && self.delete_note(note_id) {
                info!(
                    "event=empty_note_cleanup module=workspace status=ok note_id={}",
                    note_id
                );
                report.removed_empty_notes.push(note_id);
            }
        }

        if now >= self.next_sweep_at {
            report.archived = self.sweep_archive();
            self.next_sweep_at = now + self.config.sweep_interval_ms;
        }

        report.failed_writes = self.gateway.dispatch();
        self.apply_failures(&report.failed_writes);
        report
    }

    pub fn tasks(&self) -> &TaskStore {
        &self.tasks
    }

    pub fn notes(&self) -> &NoteStore {
        &self.notes
    }

    pub fn gateway(&self) -> &PersistenceGateway {
        &self.gateway
    }

    pub fn editor(&self) -> &E {
        &self.editor
    }

    pub fn editor_mut(&mut self) -> &mut E {
        &mut self.editor
    }

    pub fn current_user(&self) -> Option<&User> {
        self.session.current_user()
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    // Tasks

    pub fn add_task(
        &mut self,
        text: &str,
        task_type: TaskType,
        section: TaskSection,
    ) -> StoreResult<Task> {
        let task = self.tasks.create(text, task_type, section, None)?;
        self.gateway.insert_task(&task);
        self.gateway.mirror_tasks(self.tasks.all());
        Ok(task)
    }

    /// Flips completion and mirrors it into the source fragment, if any.
    pub fn toggle_task(&mut self, task_id: TaskId) -> Option<Task> {
        let task = found("toggle_task", self.tasks.toggle_completed(task_id))?;
        self.gateway.update_task(&task);
        self.gateway.mirror_tasks(self.tasks.all());
        self.push_completion_to_note(&task);
        Some(task)
    }

    /// Replaces task text; blank text deletes the task.
    pub fn edit_task_text(&mut self, task_id: TaskId, text: &str) -> Option<TextUpdate> {
        let update = found("edit_task_text", self.tasks.update_text(task_id, text))?;
        match &update {
            TextUpdate::Updated(task) => self.gateway.update_task(task),
            TextUpdate::Deleted(task) => self.gateway.delete_task(task.id),
            TextUpdate::Unchanged(_) => return Some(update),
        }
        self.gateway.mirror_tasks(self.tasks.all());
        Some(update)
    }

    pub fn move_task(
        &mut self,
        task_id: TaskId,
        task_type: TaskType,
        section: TaskSection,
    ) -> Option<Task> {
        let task = found(
            "move_task",
            self.tasks.move_to(task_id, task_type, section),
        )?;
        self.gateway.update_task(&task);
        self.gateway.mirror_tasks(self.tasks.all());
        Some(task)
    }

    /// Deletes a task. Absent ids are a no-op returning `false`.
    pub fn delete_task(&mut self, task_id: TaskId) -> bool {
        if self.tasks.delete(task_id).is_none() {
            return false;
        }
        self.gateway.delete_task(task_id);
        self.gateway.mirror_tasks(self.tasks.all());
        true
    }

    /// Removes tasks completed longer than the archive threshold ago.
    pub fn sweep_archive(&mut self) -> Vec<Task> {
        let archived = self.tasks.sweep_archive(self.clock.now_ms());
        if !archived.is_empty() {
            for task in &archived {
                self.gateway.delete_task(task.id);
            }
            self.gateway.mirror_tasks(self.tasks.all());
        }
        archived
    }

    /// True when the sweep removes `task` within the warning window.
    pub fn archives_soon(&self, task: &Task) -> bool {
        self.tasks
            .archives_within(task, self.clock.now_ms(), self.config.archive_warning_ms)
    }

    // Notes

    /// Creates an empty note, opens it and shows it in the editor.
    pub fn create_note(&mut self, folder: FolderRef) -> Option<Note> {
        let note = found("create_note", self.notes.create(folder))?;
        self.gateway.insert_note(&note);
        self.gateway.mirror_notes(self.notes.all());
        self.open_note(note.id);
        Some(note)
    }

    /// Switches the editor to another note, saving the current one first.
    pub fn open_note(&mut self, note_id: NoteId) -> bool {
        if self.notes.get(note_id).is_none() {
            warn!(
                "event=open_note module=workspace status=not_found note_id={}",
                note_id
            );
            return false;
        }
        if let Some(current) = self.notes.active_id() {
            if current != note_id {
                self.flush_note(current);
            }
        }
        let content = match self.notes.open(note_id) {
            Ok(note) => note.content.clone(),
            Err(_) => return false,
        };
        self.editor.render(Some(note_id), &content);
        true
    }

    pub fn close_note(&mut self) {
        if let Some(current) = self.notes.active_id() {
            self.flush_note(current);
        }
        self.notes.close();
        self.editor.render(None, EMPTY_DOCUMENT);
    }

    /// Saves a note now if a debounced save is pending. Returns whether a
    /// save was queued.
    pub fn flush_note(&mut self, note_id: NoteId) -> bool {
        self.gateway.take_pending_save(note_id) && self.save_note_now(note_id)
    }

    pub fn handle_editor_event(&mut self, event: EditorEvent) {
        match event {
            EditorEvent::ContentChanged { note_id, content } => {
                self.on_content_changed(note_id, &content)
            }
            EditorEvent::CheckboxToggled {
                note_id,
                fragment_id,
                checked,
            } => self.on_checkbox_toggled(note_id, &fragment_id, checked),
            EditorEvent::Focus { note_id } => {
                self.blur_cleanup.cancel(&note_id);
            }
            EditorEvent::Blur { note_id } => {
                self.blur_cleanup.touch(note_id, self.clock.now_ms());
            }
        }
    }

    /// Flips the pin flag. Reverted later if the remote write fails.
    pub fn toggle_pin(&mut self, note_id: NoteId) -> Option<bool> {
        let pinned = found("toggle_pin", self.notes.toggle_pinned(note_id))?;
        self.gateway.set_note_pinned(note_id, pinned, !pinned);
        self.gateway.mirror_notes(self.notes.all());
        Some(pinned)
    }

    /// Deletes a note. Tasks created from it stay in the task store.
    pub fn delete_note(&mut self, note_id: NoteId) -> bool {
        let Some(deletion) = found("delete_note", self.notes.delete(note_id)) else {
            return false;
        };
        self.blur_cleanup.cancel(&note_id);
        self.gateway.delete_note(note_id);
        self.gateway.mirror_notes(self.notes.all());

        if self.editor.note_id() == Some(note_id) {
            match deletion.next_active.and_then(|next| self.notes.get(next)) {
                Some(next) => {
                    let content = next.content.clone();
                    self.editor.render(Some(next.id), &content);
                }
                None => self.editor.render(None, EMPTY_DOCUMENT),
            }
        }
        true
    }

    pub fn list_notes(&self, folder: FolderRef) -> Vec<&Note> {
        self.notes.list_by_folder(folder)
    }

    pub fn create_folder(&mut self, name: &str) -> StoreResult<Folder> {
        let folder = self.notes.create_folder(name)?;
        self.gateway.insert_folder(&folder);
        self.gateway.mirror_folders(&self.owned_folders());
        Ok(folder)
    }

    /// Deletes a folder; its notes move back to "All Notes".
    pub fn delete_folder(&mut self, folder_id: FolderId) -> bool {
        let Some(folder) = self.notes.folder(folder_id).cloned() else {
            warn!(
                "event=delete_folder module=workspace status=not_found folder_id={}",
                folder_id
            );
            return false;
        };
        let Some(moved) = found("delete_folder", self.notes.delete_folder(folder_id)) else {
            return false;
        };
        for note_id in moved {
            if let Some(note) = self.notes.get(note_id).cloned() {
                self.gateway.save_note(&note);
            }
        }
        self.gateway.delete_folder(&folder);
        self.gateway.mirror_folders(&self.owned_folders());
        self.gateway.mirror_notes(self.notes.all());
        true
    }

    fn on_content_changed(&mut self, note_id: NoteId, content: &str) {
        if self.notes.get(note_id).is_none() {
            warn!(
                "event=content_changed module=workspace status=not_found note_id={}",
                note_id
            );
            return;
        }
        self.blur_cleanup.cancel(&note_id);

        let sync = self
            .reconciler
            .on_note_content_changed(note_id, content, &mut self.tasks);
        let Some(note) = found(
            "content_changed",
            self.notes.update_content(note_id, &sync.content),
        ) else {
            return;
        };

        if sync.rewritten && self.editor.note_id() == Some(note_id) {
            self.editor.render(Some(note_id), &note.content);
        }
        for task in &sync.created {
            self.gateway.insert_task(task);
        }
        for task in &sync.updated {
            self.gateway.update_task(task);
        }
        if sync.touched_tasks() {
            self.gateway.mirror_tasks(self.tasks.all());
        }
        self.gateway.mirror_notes(self.notes.all());
        self.gateway
            .schedule_note_save(note_id, self.clock.now_ms());
    }

    fn on_checkbox_toggled(&mut self, note_id: NoteId, fragment_id: &FragmentId, checked: bool) {
        let patched = self
            .notes
            .get(note_id)
            .and_then(|note| markup::patch_fragment(&note.content, fragment_id, FragmentAttrs { checked }));
        if let Some(content) = patched {
            if self.notes.update_content(note_id, &content).is_ok() {
                self.gateway.mirror_notes(self.notes.all());
                self.gateway
                    .schedule_note_save(note_id, self.clock.now_ms());
            }
        }

        if let Some(task) =
            self.reconciler
                .on_fragment_toggled(note_id, fragment_id, checked, &mut self.tasks)
        {
            self.gateway.update_task(&task);
            self.gateway.mirror_tasks(self.tasks.all());
        }
    }

    fn push_completion_to_note(&mut self, task: &Task) {
        let CompletionSync::Patched(patch) =
            self.reconciler.on_task_completed_changed(task, &self.notes)
        else {
            return;
        };
        if self.notes.update_content(patch.note_id, &patch.content).is_err() {
            return;
        }
        if self.editor.note_id() == Some(patch.note_id) {
            self.editor
                .update_fragment_attribute(&patch.fragment_id, patch.attrs);
        }
        self.gateway.mirror_notes(self.notes.all());
        self.gateway
            .schedule_note_save(patch.note_id, self.clock.now_ms());
    }

    fn save_note_now(&mut self, note_id: NoteId) -> bool {
        match self.notes.get(note_id) {
            Some(note) => {
                let note = note.clone();
                self.gateway.save_note(&note);
                true
            }
            None => false,
        }
    }

    fn on_signed_in(&mut self, user: &User) {
        self.gateway.set_user(Some(user.id.clone()));
        self.hydrate_from_remote();
    }

    /// Replaces each local collection with the remote one when the remote
    /// collection is non-empty. Load failures keep local data.
    fn hydrate_from_remote(&mut self) {
        match self.gateway.load_remote_tasks() {
            Ok(tasks) if !tasks.is_empty() => {
                self.tasks.replace_all(tasks);
                self.gateway.mirror_tasks(self.tasks.all());
            }
            Ok(_) => {}
            Err(err) => warn!(
                "event=hydrate module=workspace status=error collection=tasks error={}",
                err
            ),
        }

        let notes = self.gateway.load_remote_notes();
        let folders = self.gateway.load_remote_folders();
        match (notes, folders) {
            (Ok(notes), Ok(folders)) if !notes.is_empty() || !folders.is_empty() => {
                let folders = if folders.is_empty() {
                    self.owned_folders()
                } else {
                    folders
                };
                self.notes.replace_all(notes, folders);
                self.gateway.mirror_notes(self.notes.all());
                self.gateway.mirror_folders(&self.owned_folders());
                self.refresh_editor();
            }
            (Ok(_), Ok(_)) => {}
            (Err(err), _) | (_, Err(err)) => warn!(
                "event=hydrate module=workspace status=error collection=notes error={}",
                err
            ),
        }
    }

    fn refresh_editor(&mut self) {
        let shown = self
            .notes
            .active()
            .map(|note| (note.id, note.content.clone()));
        match shown {
            Some((note_id, content)) => self.editor.render(Some(note_id), &content),
            None => self.editor.render(None, EMPTY_DOCUMENT),
        }
    }

    fn apply_failures(&mut self, failures: &[DispatchFailure]) {
        let mut reverted = false;
        for failure in failures {
            if let FailurePolicy::RevertPin { note_id, previous } = failure.policy {
                if self.notes.set_pinned(note_id, previous).is_ok() {
                    warn!(
                        "event=pin_revert module=workspace status=reverted note_id={} pinned={}",
                        note_id, previous
                    );
                    reverted = true;
                }
            }
        }
        if reverted {
            self.gateway.mirror_notes(self.notes.all());
        }
    }

    fn owned_folders(&self) -> Vec<Folder> {
        self.notes.folders().into_iter().cloned().collect()
    }
}

/// Unwraps a store result for a user operation, logging the failure.
fn found<T>(operation: &str, result: StoreResult<T>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(err) => {
            let status = if err.is_not_found() {
                "not_found"
            } else {
                "rejected"
            };
            warn!("event={operation} module=workspace status={status} error={err}");
            None
        }
    }
}

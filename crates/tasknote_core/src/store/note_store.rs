//! Canonical note and folder collection.
//!
//! # Responsibility
//! - Own note records, their markup content, and the folder list.
//! - Track which note is open in the editor.
//!
//! # Invariants
//! - Note content is never the empty string (see `EMPTY_DOCUMENT`).
//! - Deleting the open note selects the most recently updated remaining
//!   note of the same folder, or nothing.
//! - Deleting a folder moves its notes back to `FolderRef::All`.

use crate::clock::Clock;
use crate::content;
use crate::model::note::{normalize_content, Folder, FolderId, FolderRef, Note, NoteId};
use crate::store::{StoreError, StoreResult};
use log::info;
use std::cmp::Reverse;
use std::rc::Rc;

/// Result of deleting a note.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteDeletion {
    pub removed: Note,
    /// Note selected in place of the removed one when it was open.
    pub next_active: Option<NoteId>,
}

pub struct NoteStore {
    notes: Vec<Note>,
    folders: Vec<Folder>,
    active: Option<NoteId>,
    clock: Rc<dyn Clock>,
}

impl NoteStore {
    pub fn new(clock: Rc<dyn Clock>) -> Self {
        Self {
            notes: Vec::new(),
            folders: Vec::new(),
            active: None,
            clock,
        }
    }

    /// Creates an empty note in `folder`.
    ///
    /// # Errors
    /// - `StoreError::FolderNotFound` when `folder` names an unknown folder.
    pub fn create(&mut self, folder: FolderRef) -> StoreResult<Note> {
        if let FolderRef::Folder(folder_id) = folder {
            self.folder(folder_id)
                .ok_or(StoreError::FolderNotFound(folder_id))?;
        }
        let note = Note::new(folder, self.clock.now_ms());
        info!(
            "event=note_create module=note_store status=ok note_id={}",
            note.id
        );
        self.notes.push(note.clone());
        Ok(note)
    }

    /// Replaces note content. Blank content becomes the empty paragraph.
    pub fn update_content(&mut self, note_id: NoteId, content: &str) -> StoreResult<Note> {
        let now = self.clock.now_ms();
        let note = self.get_mut(note_id)?;
        let normalized = normalize_content(content);
        if note.content != normalized {
            note.content = normalized;
            note.updated_at = now;
        }
        Ok(note.clone())
    }

    /// Flips the pin flag and returns the new value.
    pub fn toggle_pinned(&mut self, note_id: NoteId) -> StoreResult<bool> {
        let note = self.get_mut(note_id)?;
        note.is_pinned = !note.is_pinned;
        Ok(note.is_pinned)
    }

    pub fn set_pinned(&mut self, note_id: NoteId, pinned: bool) -> StoreResult<()> {
        self.get_mut(note_id)?.is_pinned = pinned;
        Ok(())
    }

    /// Removes a note; reselects when it was the open note.
    pub fn delete(&mut self, note_id: NoteId) -> StoreResult<NoteDeletion> {
        let index = self
            .notes
            .iter()
            .position(|note| note.id == note_id)
            .ok_or(StoreError::NoteNotFound(note_id))?;
        let removed = self.notes.remove(index);

        let next_active = if self.active == Some(note_id) {
            let next = self
                .notes
                .iter()
                .filter(|note| note.folder == removed.folder)
                .max_by_key(|note| note.updated_at)
                .map(|note| note.id);
            self.active = next;
            next
        } else {
            self.active
        };

        info!(
            "event=note_delete module=note_store status=ok note_id={} reselected={}",
            note_id,
            next_active.is_some()
        );
        Ok(NoteDeletion {
            removed,
            next_active,
        })
    }

    /// Notes of a folder (`FolderRef::All` lists all): pinned first, then
    /// most recently updated.
    pub fn list_by_folder(&self, folder: FolderRef) -> Vec<&Note> {
        let mut listed: Vec<&Note> = self
            .notes
            .iter()
            .filter(|note| folder == FolderRef::All || note.folder == folder)
            .collect();
        listed.sort_by_key(|note| (!note.is_pinned, Reverse(note.updated_at)));
        listed
    }

    pub fn get(&self, note_id: NoteId) -> Option<&Note> {
        self.notes.iter().find(|note| note.id == note_id)
    }

    pub fn all(&self) -> &[Note] {
        &self.notes
    }

    /// Marks a note as open in the editor.
    pub fn open(&mut self, note_id: NoteId) -> StoreResult<&Note> {
        let index = self
            .notes
            .iter()
            .position(|note| note.id == note_id)
            .ok_or(StoreError::NoteNotFound(note_id))?;
        self.active = Some(note_id);
        Ok(&self.notes[index])
    }

    pub fn close(&mut self) {
        self.active = None;
    }

    pub fn active_id(&self) -> Option<NoteId> {
        self.active
    }

    pub fn active(&self) -> Option<&Note> {
        self.active.and_then(|note_id| self.get(note_id))
    }

    /// True when the note's markup-stripped content is blank.
    pub fn is_empty_note(&self, note_id: NoteId) -> StoreResult<bool> {
        self.get(note_id)
            .map(|note| content::is_blank(&note.content))
            .ok_or(StoreError::NoteNotFound(note_id))
    }

    pub fn create_folder(&mut self, name: &str) -> StoreResult<Folder> {
        let folder = Folder::new(name)?;
        self.folders.push(folder.clone());
        Ok(folder)
    }

    /// Deletes a folder and returns the ids of notes moved back to `All`.
    pub fn delete_folder(&mut self, folder_id: FolderId) -> StoreResult<Vec<NoteId>> {
        let index = self
            .folders
            .iter()
            .position(|folder| folder.id == folder_id)
            .ok_or(StoreError::FolderNotFound(folder_id))?;
        self.folders.remove(index);

        let now = self.clock.now_ms();
        let mut moved = Vec::new();
        for note in self
            .notes
            .iter_mut()
            .filter(|note| note.folder == FolderRef::Folder(folder_id))
        {
            note.folder = FolderRef::All;
            note.updated_at = now;
            moved.push(note.id);
        }
        Ok(moved)
    }

    pub fn folder(&self, folder_id: FolderId) -> Option<&Folder> {
        self.folders.iter().find(|folder| folder.id == folder_id)
    }

    /// Folders sorted by name.
    pub fn folders(&self) -> Vec<&Folder> {
        let mut folders: Vec<&Folder> = self.folders.iter().collect();
        folders.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
        folders
    }

    /// Replaces notes and folders (hydration). Clears the open note when it
    /// no longer exists.
    pub fn replace_all(&mut self, notes: Vec<Note>, folders: Vec<Folder>) {
        self.notes = notes;
        self.folders = folders;
        if let Some(active) = self.active {
            if self.get(active).is_none() {
                self.active = None;
            }
        }
    }

    fn get_mut(&mut self, note_id: NoteId) -> StoreResult<&mut Note> {
        self.notes
            .iter_mut()
            .find(|note| note.id == note_id)
            .ok_or(StoreError::NoteNotFound(note_id))
    }
}

#[cfg(test)]
mod tests {
    use super::NoteStore;
    use crate::clock::ManualClock;
    use crate::model::note::{FolderRef, EMPTY_DOCUMENT};
    use crate::model::ValidationError;
    use crate::store::StoreError;
    use std::rc::Rc;
    use uuid::Uuid;

    fn store() -> (NoteStore, ManualClock) {
        let clock = ManualClock::new(100);
        (NoteStore::new(Rc::new(clock.clone())), clock)
    }

    #[test]
    fn create_initializes_empty_paragraph() {
        let (mut store, _) = store();
        let note = store.create(FolderRef::All).unwrap();
        assert_eq!(note.content, EMPTY_DOCUMENT);
        assert!(store.is_empty_note(note.id).unwrap());
    }

    #[test]
    fn create_in_unknown_folder_fails() {
        let (mut store, _) = store();
        let folder_id = Uuid::new_v4();
        assert_eq!(
            store.create(FolderRef::Folder(folder_id)).unwrap_err(),
            StoreError::FolderNotFound(folder_id)
        );
    }

    #[test]
    fn update_content_normalizes_blank_and_bumps_updated_at() {
        let (mut store, clock) = store();
        let note = store.create(FolderRef::All).unwrap();
        clock.set(200);
        let updated = store.update_content(note.id, "<p>hello</p>").unwrap();
        assert_eq!(updated.updated_at, 200);
        let blanked = store.update_content(note.id, "").unwrap();
        assert_eq!(blanked.content, EMPTY_DOCUMENT);
    }

    #[test]
    fn deleting_open_note_selects_latest_in_same_folder() {
        let (mut store, clock) = store();
        let folder = store.create_folder("Work").unwrap();
        let scope = FolderRef::Folder(folder.id);
        let older = store.create(scope).unwrap();
        clock.set(300);
        let newer = store.create(scope).unwrap();
        clock.set(400);
        let elsewhere = store.create(FolderRef::All).unwrap();
        clock.set(500);
        let open = store.create(scope).unwrap();

        store.open(open.id).unwrap();
        let deletion = store.delete(open.id).unwrap();
        assert_eq!(deletion.next_active, Some(newer.id));
        assert_eq!(store.active_id(), Some(newer.id));

        store.delete(newer.id).unwrap();
        store.open(older.id).unwrap();
        let last = store.delete(older.id).unwrap();
        assert_eq!(last.next_active, None);
        assert!(store.active().is_none());
        assert!(store.get(elsewhere.id).is_some());
    }

    #[test]
    fn deleting_other_note_keeps_selection() {
        let (mut store, _) = store();
        let open = store.create(FolderRef::All).unwrap();
        let other = store.create(FolderRef::All).unwrap();
        store.open(open.id).unwrap();
        let deletion = store.delete(other.id).unwrap();
        assert_eq!(deletion.next_active, Some(open.id));
        assert!(store.delete(other.id).unwrap_err().is_not_found());
    }

    #[test]
    fn list_orders_pinned_then_recent() {
        let (mut store, clock) = store();
        let a = store.create(FolderRef::All).unwrap();
        clock.set(200);
        let b = store.create(FolderRef::All).unwrap();
        clock.set(300);
        let c = store.create(FolderRef::All).unwrap();
        assert!(store.toggle_pinned(a.id).unwrap());

        let ids: Vec<_> = store
            .list_by_folder(FolderRef::All)
            .into_iter()
            .map(|note| note.id)
            .collect();
        assert_eq!(ids, vec![a.id, c.id, b.id]);
    }

    #[test]
    fn deleting_folder_moves_notes_to_all() {
        let (mut store, _) = store();
        let folder = store.create_folder("  Ideas ").unwrap();
        assert_eq!(folder.name, "Ideas");
        let note = store.create(FolderRef::Folder(folder.id)).unwrap();
        let moved = store.delete_folder(folder.id).unwrap();
        assert_eq!(moved, vec![note.id]);
        assert_eq!(store.get(note.id).unwrap().folder, FolderRef::All);
        assert_eq!(
            store.create_folder(" ").unwrap_err(),
            StoreError::Validation(ValidationError::EmptyFolderName)
        );
    }
}

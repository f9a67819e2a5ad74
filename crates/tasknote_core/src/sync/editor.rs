//! Editor surface contract.
//!
//! The rich-text engine is external; core talks to it through
//! [`EditorSurface`] and receives [`EditorEvent`]s from it.

use crate::content::markup;
use crate::model::fragment::{FragmentAttrs, FragmentId};
use crate::model::note::{NoteId, EMPTY_DOCUMENT};

/// Events emitted by the editor for the note it shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditorEvent {
    ContentChanged {
        note_id: NoteId,
        content: String,
    },
    CheckboxToggled {
        note_id: NoteId,
        fragment_id: FragmentId,
        checked: bool,
    },
    Focus {
        note_id: NoteId,
    },
    Blur {
        note_id: NoteId,
    },
}

pub trait EditorSurface {
    /// Replaces the whole document (note switch or rewritten content).
    fn render(&mut self, note_id: Option<NoteId>, content: &str);
    fn content(&self) -> String;
    fn note_id(&self) -> Option<NoteId>;
    /// Patches one fragment in place. Returns false when it is not shown.
    fn update_fragment_attribute(&mut self, fragment_id: &FragmentId, attrs: FragmentAttrs)
        -> bool;
}

/// In-memory editor used by the CLI and tests.
#[derive(Debug, Clone, Default)]
pub struct HeadlessEditor {
    note_id: Option<NoteId>,
    content: String,
    renders: usize,
    patches: usize,
}

impl HeadlessEditor {
    pub fn new() -> Self {
        Self {
            content: EMPTY_DOCUMENT.to_string(),
            ..Self::default()
        }
    }

    /// Simulates typing: replaces the document and returns the change
    /// event, or `None` when no note is shown.
    pub fn type_content(&mut self, content: &str) -> Option<EditorEvent> {
        let note_id = self.note_id?;
        self.content = content.to_string();
        Some(EditorEvent::ContentChanged {
            note_id,
            content: self.content.clone(),
        })
    }

    /// Simulates a checkbox click on a shown fragment.
    pub fn click_checkbox(&mut self, fragment_id: &FragmentId) -> Option<EditorEvent> {
        let note_id = self.note_id?;
        let fragment = markup::find_fragment(&self.content, fragment_id)?;
        let checked = !fragment.checked;
        self.content = markup::patch_fragment(&self.content, fragment_id, FragmentAttrs { checked })?;
        Some(EditorEvent::CheckboxToggled {
            note_id,
            fragment_id: fragment_id.clone(),
            checked,
        })
    }

    pub fn render_count(&self) -> usize {
        self.renders
    }

    pub fn patch_count(&self) -> usize {
        self.patches
    }
}

impl EditorSurface for HeadlessEditor {
    fn render(&mut self, note_id: Option<NoteId>, content: &str) {
        self.note_id = note_id;
        self.content = content.to_string();
        self.renders += 1;
    }

    fn content(&self) -> String {
        self.content.clone()
    }

    fn note_id(&self) -> Option<NoteId> {
        self.note_id
    }

    fn update_fragment_attribute(
        &mut self,
        fragment_id: &FragmentId,
        attrs: FragmentAttrs,
    ) -> bool {
        match markup::patch_fragment(&self.content, fragment_id, attrs) {
            Some(patched) => {
                self.content = patched;
                self.patches += 1;
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{EditorEvent, EditorSurface, HeadlessEditor};
    use crate::model::fragment::{FragmentAttrs, FragmentId};
    use uuid::Uuid;

    const ITEM: &str = r#"<ul data-type="taskList"><li data-type="taskItem" data-checked="false" data-note-task-id="note-task-1"><p>a</p></li></ul>"#;

    #[test]
    fn typing_without_a_note_emits_nothing() {
        let mut editor = HeadlessEditor::new();
        assert!(editor.type_content("<p>x</p>").is_none());
    }

    #[test]
    fn checkbox_click_flips_and_reports() {
        let mut editor = HeadlessEditor::new();
        let note_id = Uuid::new_v4();
        editor.render(Some(note_id), ITEM);
        let event = editor.click_checkbox(&FragmentId::new("note-task-1")).unwrap();
        assert_eq!(
            event,
            EditorEvent::CheckboxToggled {
                note_id,
                fragment_id: FragmentId::new("note-task-1"),
                checked: true,
            }
        );
        assert!(editor.content().contains(r#"data-checked="true""#));
    }

    #[test]
    fn attribute_update_counts_patches_not_renders() {
        let mut editor = HeadlessEditor::new();
        editor.render(Some(Uuid::new_v4()), ITEM);
        let id = FragmentId::new("note-task-1");
        assert!(editor.update_fragment_attribute(&id, FragmentAttrs { checked: true }));
        assert!(!editor.update_fragment_attribute(
            &FragmentId::new("missing"),
            FragmentAttrs { checked: true }
        ));
        assert_eq!(editor.render_count(), 1);
        assert_eq!(editor.patch_count(), 1);
    }
}

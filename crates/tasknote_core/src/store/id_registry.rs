//! Identifier registry for task fragments.

use crate::model::fragment::{FragmentId, TaskFragment};
use uuid::Uuid;

const FRAGMENT_ID_PREFIX: &str = "note-task-";

/// Assigns stable fragment identifiers.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentifierRegistry;

impl IdentifierRegistry {
    pub fn new() -> Self {
        Self
    }

    /// Returns the fragment's id, generating and attaching one if absent.
    ///
    /// Idempotent: an existing id is returned unchanged.
    pub fn ensure_id(&self, fragment: &mut TaskFragment) -> FragmentId {
        if let Some(existing) = &fragment.fragment_id {
            return existing.clone();
        }
        let id = self.generate();
        fragment.fragment_id = Some(id.clone());
        id
    }

    /// Generates a fresh `note-task-<uuid>` identifier.
    pub fn generate(&self) -> FragmentId {
        FragmentId::new(format!("{FRAGMENT_ID_PREFIX}{}", Uuid::new_v4()))
    }
}

//! Note and folder records.
//!
//! # Invariants
//! - `content` is well-formed markup; empty is [`EMPTY_DOCUMENT`], never "".
//! - `FolderRef::All` is a sentinel, not a stored folder.

use crate::clock::EpochMs;
use crate::model::task::RecordError;
use crate::model::ValidationError;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type NoteId = Uuid;
pub type FolderId = Uuid;

/// Empty paragraph used in place of empty content.
pub const EMPTY_DOCUMENT: &str = "<p></p>";

/// Folder scope of a note.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FolderRef {
    /// Sentinel for "All Notes"; lists every note when used as a filter.
    #[default]
    All,
    Folder(FolderId),
}

impl FolderRef {
    pub fn folder_id(self) -> Option<FolderId> {
        match self {
            Self::All => None,
            Self::Folder(id) => Some(id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Note {
    pub id: NoteId,
    pub folder: FolderRef,
    pub content: String,
    pub is_pinned: bool,
    pub created_at: EpochMs,
    pub updated_at: EpochMs,
}

impl Note {
    pub fn new(folder: FolderRef, now: EpochMs) -> Self {
        Self {
            id: Uuid::new_v4(),
            folder,
            content: EMPTY_DOCUMENT.to_string(),
            is_pinned: false,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Returns `content`, or the empty paragraph when it is blank.
pub fn normalize_content(content: &str) -> String {
    if content.trim().is_empty() {
        EMPTY_DOCUMENT.to_string()
    } else {
        content.to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Folder {
    pub id: FolderId,
    pub name: String,
}

impl Folder {
    pub fn new(name: &str) -> Result<Self, ValidationError> {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::EmptyFolderName);
        }
        Ok(Self {
            id: Uuid::new_v4(),
            name: trimmed.to_string(),
        })
    }
}

/// Persisted note shape (hosted `notes` table).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteRecord {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default)]
    pub folder_id: Option<String>,
    pub content: String,
    #[serde(default)]
    pub is_pinned: bool,
    pub created_at: EpochMs,
    pub updated_at: EpochMs,
}

impl NoteRecord {
    pub fn from_note(note: &Note, user_id: Option<&str>) -> Self {
        Self {
            id: note.id.to_string(),
            user_id: user_id.map(str::to_string),
            folder_id: note.folder.folder_id().map(|id| id.to_string()),
            content: note.content.clone(),
            is_pinned: note.is_pinned,
            created_at: note.created_at,
            updated_at: note.updated_at,
        }
    }

    pub fn into_note(self) -> Result<Note, RecordError> {
        let id = parse_id(&self.id)?;
        let folder = match self.folder_id {
            Some(folder_id) => FolderRef::Folder(parse_id(&folder_id)?),
            None => FolderRef::All,
        };
        Ok(Note {
            id,
            folder,
            content: normalize_content(&self.content),
            is_pinned: self.is_pinned,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// Persisted folder shape (hosted `folders` table).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderRecord {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub name: String,
}

impl FolderRecord {
    pub fn from_folder(folder: &Folder, user_id: Option<&str>) -> Self {
        Self {
            id: folder.id.to_string(),
            user_id: user_id.map(str::to_string),
            name: folder.name.clone(),
        }
    }

    pub fn into_folder(self) -> Result<Folder, RecordError> {
        let id = parse_id(&self.id)?;
        let mut folder = Folder::new(&self.name).map_err(RecordError::Validation)?;
        folder.id = id;
        Ok(folder)
    }
}

fn parse_id(value: &str) -> Result<Uuid, RecordError> {
    Uuid::parse_str(value).map_err(|_| RecordError::InvalidId(value.to_string()))
}

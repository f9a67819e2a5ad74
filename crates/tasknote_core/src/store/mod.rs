//! In-memory canonical stores.
//!
//! # Responsibility
//! - Own task and note records and enforce their invariants.
//! - Assign stable identifiers to task fragments.
//!
//! # Invariants
//! - Stores mutate synchronously; persistence is the gateway's concern.
//! - At most one task exists per `SourceRef`.
//! - Unknown ids surface as `StoreError::*NotFound`, never as panics.

pub mod id_registry;
pub mod note_store;
pub mod task_store;

use crate::model::note::{FolderId, NoteId};
use crate::model::task::TaskId;
use crate::model::ValidationError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    Validation(ValidationError),
    TaskNotFound(TaskId),
    NoteNotFound(NoteId),
    FolderNotFound(FolderId),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::TaskNotFound(_) | Self::NoteNotFound(_) | Self::FolderNotFound(_)
        )
    }
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::TaskNotFound(id) => write!(f, "task not found: {id}"),
            Self::NoteNotFound(id) => write!(f, "note not found: {id}"),
            Self::FolderNotFound(id) => write!(f, "folder not found: {id}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ValidationError> for StoreError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

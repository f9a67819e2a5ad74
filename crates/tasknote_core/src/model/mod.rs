//! Domain model for tasks, notes and the task fragments embedded in notes.
//!
//! # Responsibility
//! - Define canonical records owned by the task and note stores.
//! - Define the persisted record shapes and the boundary conversions
//!   between them and the domain types.
//!
//! # Invariants
//! - A fragment reference never exists without its note id (`SourceRef`).
//! - Note content is never the empty string.

pub mod fragment;
pub mod note;
pub mod task;

use std::error::Error;
use std::fmt::{Display, Formatter};

/// Local validation failure. Never reaches the remote store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Task text is blank after trimming.
    EmptyText,
    /// Folder name is blank after trimming.
    EmptyFolderName,
    /// A persisted record is missing a required field.
    MissingField(&'static str),
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyText => write!(f, "task text must not be blank"),
            Self::EmptyFolderName => write!(f, "folder name must not be blank"),
            Self::MissingField(field) => write!(f, "required field missing: {field}"),
        }
    }
}

impl Error for ValidationError {}

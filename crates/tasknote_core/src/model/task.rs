//! Task domain model.
//!
//! # Invariants
//! - `text` is non-empty after trimming.
//! - `completed_at` is `Some` exactly when `completed` is `true`.
//! - A note-derived task references its fragment through [`SourceRef`],
//!   which always carries the owning note id.

use crate::clock::EpochMs;
use crate::model::fragment::FragmentId;
use crate::model::note::NoteId;
use crate::model::ValidationError;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type TaskId = Uuid;

/// Which list a task belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    #[default]
    Work,
    Private,
}

impl TaskType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Work => "work",
            Self::Private => "private",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "work" => Some(Self::Work),
            "private" => Some(Self::Private),
            _ => None,
        }
    }
}

/// Section inside a task list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskSection {
    #[default]
    Todo,
    Waiting,
}

impl TaskSection {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Todo => "todo",
            Self::Waiting => "waiting",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "todo" => Some(Self::Todo),
            "waiting" => Some(Self::Waiting),
            _ => None,
        }
    }
}

/// Reference from a task to the note fragment that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceRef {
    pub note_id: NoteId,
    pub fragment_id: FragmentId,
}

impl SourceRef {
    pub fn new(note_id: NoteId, fragment_id: FragmentId) -> Self {
        Self {
            note_id,
            fragment_id,
        }
    }
}

/// Canonical task record owned by the task store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    pub id: TaskId,
    pub text: String,
    pub task_type: TaskType,
    pub section: TaskSection,
    pub completed: bool,
    pub completed_at: Option<EpochMs>,
    pub source: Option<SourceRef>,
    pub created_at: EpochMs,
}

impl Task {
    /// Builds a pending task with a fresh id.
    ///
    /// # Errors
    /// - `ValidationError::EmptyText` when `text` is blank.
    pub fn new(
        text: &str,
        task_type: TaskType,
        section: TaskSection,
        source: Option<SourceRef>,
        now: EpochMs,
    ) -> Result<Self, ValidationError> {
        let text = normalize_task_text(text).ok_or(ValidationError::EmptyText)?;
        Ok(Self {
            id: Uuid::new_v4(),
            text,
            task_type,
            section,
            completed: false,
            completed_at: None,
            source,
            created_at: now,
        })
    }

    /// Sets completion and keeps `completed_at` in step. Returns whether the
    /// flag actually changed.
    pub fn set_completed(&mut self, completed: bool, now: EpochMs) -> bool {
        if self.completed == completed {
            return false;
        }
        self.completed = completed;
        self.completed_at = if completed { Some(now) } else { None };
        true
    }

    /// True when this task is due for removal by the archive sweep.
    pub fn is_archivable(&self, now: EpochMs, archive_after_ms: EpochMs) -> bool {
        match (self.completed, self.completed_at) {
            (true, Some(completed_at)) => now - completed_at >= archive_after_ms,
            _ => false,
        }
    }

    pub fn is_note_derived(&self) -> bool {
        self.source.is_some()
    }
}

/// Trims task text; `None` when nothing is left.
pub fn normalize_task_text(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Persisted task shape, shared by the remote store and the local cache.
///
/// Column names follow the hosted `tasks` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub text: String,
    #[serde(rename = "type")]
    pub task_type: TaskType,
    pub section: TaskSection,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub completed_at: Option<EpochMs>,
    #[serde(default)]
    pub note_id: Option<String>,
    #[serde(default)]
    pub note_task_id: Option<String>,
    pub created_at: EpochMs,
}

impl TaskRecord {
    pub fn from_task(task: &Task, user_id: Option<&str>) -> Self {
        Self {
            id: task.id.to_string(),
            user_id: user_id.map(str::to_string),
            text: task.text.clone(),
            task_type: task.task_type,
            section: task.section,
            completed: task.completed,
            completed_at: task.completed_at,
            note_id: task.source.as_ref().map(|source| source.note_id.to_string()),
            note_task_id: task
                .source
                .as_ref()
                .map(|source| source.fragment_id.as_str().to_string()),
            created_at: task.created_at,
        }
    }

    /// Converts a persisted row into a domain task.
    ///
    /// The `SourceRef` is only built when both reference columns are present;
    /// a fragment id without a note id is rejected.
    pub fn into_task(self) -> Result<Task, RecordError> {
        let id = Uuid::parse_str(&self.id).map_err(|_| RecordError::InvalidId(self.id.clone()))?;
        let text = normalize_task_text(&self.text)
            .ok_or(RecordError::Validation(ValidationError::EmptyText))?;
        let source = match (self.note_id, self.note_task_id) {
            (Some(note_id), Some(fragment_id)) if !fragment_id.trim().is_empty() => {
                let note_id =
                    Uuid::parse_str(&note_id).map_err(|_| RecordError::InvalidId(note_id))?;
                Some(SourceRef::new(note_id, FragmentId::new(fragment_id)))
            }
            (None, Some(_)) => {
                return Err(RecordError::Validation(ValidationError::MissingField(
                    "note_id",
                )));
            }
            _ => None,
        };
        let completed_at = if self.completed {
            self.completed_at
        } else {
            None
        };

        Ok(Task {
            id,
            text,
            task_type: self.task_type,
            section: self.section,
            completed: self.completed,
            completed_at,
            source,
            created_at: self.created_at,
        })
    }
}

/// Failure converting a persisted record into a domain value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordError {
    InvalidId(String),
    Validation(ValidationError),
}

impl std::fmt::Display for RecordError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidId(value) => write!(f, "invalid record id `{value}`"),
            Self::Validation(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for RecordError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::InvalidId(_) => None,
        }
    }
}

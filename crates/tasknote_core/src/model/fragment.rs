//! Task fragments embedded in note content.
//!
//! A fragment is one task-list item inside a note. Its `fragment_id` is
//! generated once and never regenerated for the same item.

use crate::model::task::{TaskSection, TaskType};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Stable identifier of a task fragment (`note-task-<uuid>`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FragmentId(String);

impl FragmentId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Substring containment in either direction. Used only by the logged
    /// fallback lookup; empty ids never match.
    pub fn loosely_matches(&self, other: &FragmentId) -> bool {
        if self.0.is_empty() || other.0.is_empty() {
            return false;
        }
        self.0.contains(other.0.as_str()) || other.0.contains(self.0.as_str())
    }
}

impl Display for FragmentId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One task-list item as seen in note content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskFragment {
    /// `None` until the identifier registry assigns one.
    pub fragment_id: Option<FragmentId>,
    pub checked: bool,
    pub text: String,
    /// Inferred from `data-task-type`, defaults to work.
    pub task_type: TaskType,
    /// Inferred from `data-section`, defaults to todo.
    pub section: TaskSection,
}

/// Attribute patch applied to a single fragment in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FragmentAttrs {
    pub checked: bool,
}

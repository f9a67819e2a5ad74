//! Note/task synchronization.
//!
//! The [`Reconciler`] keeps task fragments and the task store eventually
//! consistent; the [`EditorSurface`] is the seam to the external editor.

pub mod editor;
pub mod reconciler;

pub use editor::{EditorEvent, EditorSurface, HeadlessEditor};
pub use reconciler::{CompletionSync, ContentSync, FragmentPatch, Reconciler};

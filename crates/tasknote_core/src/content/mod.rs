//! Note content (serialized rich-text markup) helpers.
//!
//! The editing engine itself is external; core only needs to locate task
//! items, rewrite single start tags, and detect blank documents.

pub mod markup;
pub mod quick_capture;

pub use markup::{
    extract_fragments, find_fragment, is_blank, patch_fragment, plain_text, render_task_list,
    with_fragment_ids,
};
pub use quick_capture::{capture_quick_tasks, QuickCapture, COMPLETION_MARKER};

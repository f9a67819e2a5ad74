//! `TW:` quick-capture lines.
//!
//! A finished paragraph or plain line starting with `TW:` becomes a work
//! task in the todo section, and the line is rewritten to show the
//! completion marker so the same line is never captured twice.
//!
//! A paragraph is finished once another block follows it; a plain line once
//! it ends in a newline. Lines inside task items are never captured.

use crate::content::markup::{decode_entities, escape_text, task_item_spans};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::ops::Range;

pub const QUICK_CAPTURE_PREFIX: &str = "TW:";
pub const COMPLETION_MARKER: &str = "\u{2713}";

static PARAGRAPH_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<p>\s*TW:([^<]*)</p>").expect("valid paragraph capture regex"));
static LINE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^[ \t]*TW:([^\n<]*)\n").expect("valid line capture regex"));

/// Result of one quick-capture pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuickCapture {
    /// Content with captured lines rewritten.
    pub content: String,
    /// Captured task texts in document order.
    pub captured: Vec<String>,
}

/// Rewrites every finished `TW: <text>` line and returns the captured texts.
///
/// Lines with nothing after the prefix are left untouched.
pub fn capture_quick_tasks(content: &str) -> QuickCapture {
    let mut captured = Vec::new();

    let items = task_item_spans(content);
    let paragraphs = PARAGRAPH_RE.replace_all(content, |caps: &Captures<'_>| {
        let whole = &caps[0];
        let finished = caps
            .get(0)
            .is_some_and(|m| !content[m.end()..].trim().is_empty());
        if !finished || in_task_item(&items, caps) {
            return whole.to_string();
        }
        match captured_text(caps) {
            Some(text) => {
                captured.push(decode(&text));
                format!("<p>{COMPLETION_MARKER} {text}</p>")
            }
            None => whole.to_string(),
        }
    });

    let items = task_item_spans(&paragraphs);
    let lines = LINE_RE.replace_all(&paragraphs, |caps: &Captures<'_>| {
        if in_task_item(&items, caps) {
            return caps[0].to_string();
        }
        match captured_text(caps) {
            Some(text) => {
                let text = decode(&text);
                let line = format!("{COMPLETION_MARKER} {}\n", escape_text(&text));
                captured.push(text);
                line
            }
            None => caps[0].to_string(),
        }
    });

    QuickCapture {
        content: lines.into_owned(),
        captured,
    }
}

fn captured_text(caps: &Captures<'_>) -> Option<String> {
    let text = caps.get(1)?.as_str().trim();
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

fn in_task_item(items: &[Range<usize>], caps: &Captures<'_>) -> bool {
    caps.get(0)
        .is_some_and(|m| items.iter().any(|item| item.contains(&m.start())))
}

fn decode(value: &str) -> String {
    decode_entities(value).trim().to_string()
}

//! Task-item scanning and in-place rewriting of note markup.
//!
//! # Responsibility
//! - Find task-list items (`<li data-type="taskItem" ...>`) in serialized
//!   note content and project them into [`TaskFragment`]s.
//! - Rewrite the start tag of a single item (id assignment, checked flag)
//!   without touching the rest of the document.
//!
//! # Invariants
//! - Only `<li>` start tags are ever rewritten; item bodies are preserved.
//! - Nested items are reported in document order.

use crate::model::fragment::{FragmentAttrs, FragmentId, TaskFragment};
use crate::model::task::{TaskSection, TaskType};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use std::ops::Range;

pub const ATTR_ITEM_TYPE: &str = "data-type";
pub const ATTR_FRAGMENT_ID: &str = "data-note-task-id";
pub const ATTR_CHECKED: &str = "data-checked";
pub const ATTR_TASK_TYPE: &str = "data-task-type";
pub const ATTR_SECTION: &str = "data-section";
const TASK_ITEM: &str = "taskItem";
const TASK_LIST: &str = "taskList";

static LI_TAG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<(/?)li\b([^>]*)>").expect("valid li tag regex"));
static ATTR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"([A-Za-z_:][-A-Za-z0-9_:.]*)(?:\s*=\s*"([^"]*)")?"#).expect("valid attr regex")
});
static NESTED_LIST_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<(ul|ol)\b").expect("valid nested list regex"));
static BLOCK_TAG_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)</?(p|div|br|li|ul|ol|h[1-6]|blockquote|pre)\b[^>]*>")
        .expect("valid block tag regex")
});
static ANY_TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("valid tag regex"));
static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid ws regex"));

/// One task item located in content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedFragment {
    pub fragment: TaskFragment,
    /// Byte span of the `<li ...>` start tag.
    pub start_tag: Range<usize>,
    /// Byte span of the whole item, start tag through `</li>`.
    pub item: Range<usize>,
    attrs: Vec<(String, Option<String>)>,
}

/// Scans `content` for task items in document order.
pub fn scan_fragments(content: &str) -> Vec<ScannedFragment> {
    let mut open: Vec<(Range<usize>, Vec<(String, Option<String>)>)> = Vec::new();
    let mut found = Vec::new();

    for caps in LI_TAG_RE.captures_iter(content) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        let closing = caps.get(1).is_some_and(|m| !m.as_str().is_empty());
        if !closing {
            let attrs = parse_attrs(caps.get(2).map_or("", |m| m.as_str()));
            open.push((whole.range(), attrs));
            continue;
        }

        let Some((start_tag, attrs)) = open.pop() else {
            continue;
        };
        if !is_task_item(&attrs) {
            continue;
        }
        let body = &content[start_tag.end..whole.start()];
        found.push(ScannedFragment {
            fragment: fragment_from(&attrs, body),
            item: start_tag.start..whole.end(),
            start_tag,
            attrs,
        });
    }

    found.sort_by_key(|scanned| scanned.start_tag.start);
    found
}

/// Projects every task item in `content` into a fragment.
pub fn extract_fragments(content: &str) -> Vec<TaskFragment> {
    scan_fragments(content)
        .into_iter()
        .map(|scanned| scanned.fragment)
        .collect()
}

/// Finds one fragment by id.
pub fn find_fragment(content: &str, fragment_id: &FragmentId) -> Option<TaskFragment> {
    scan_fragments(content)
        .into_iter()
        .map(|scanned| scanned.fragment)
        .find(|fragment| fragment.fragment_id.as_ref() == Some(fragment_id))
}

/// Byte spans of every task item in `content`.
pub(crate) fn task_item_spans(content: &str) -> Vec<Range<usize>> {
    scan_fragments(content)
        .into_iter()
        .map(|scanned| scanned.item)
        .collect()
}

/// Gives every fragment lacking an id the one returned by `assign`, and
/// rewrites the affected start tags.
///
/// A repeat of an id already seen earlier in the document (a pasted copy)
/// counts as missing; the first occurrence keeps it.
///
/// Returns the (possibly rewritten) content and all fragments with ids set.
pub fn with_fragment_ids<F>(content: &str, mut assign: F) -> (String, Vec<TaskFragment>)
where
    F: FnMut(&mut TaskFragment) -> FragmentId,
{
    let scanned = scan_fragments(content);
    let mut edits = Vec::new();
    let mut fragments = Vec::with_capacity(scanned.len());
    let mut seen = HashSet::new();

    for mut item in scanned {
        let duplicate = item
            .fragment
            .fragment_id
            .as_ref()
            .is_some_and(|id| !seen.insert(id.clone()));
        if duplicate {
            item.fragment.fragment_id = None;
        }
        if item.fragment.fragment_id.is_none() {
            let id = assign(&mut item.fragment);
            item.fragment.fragment_id = Some(id.clone());
            set_attr(&mut item.attrs, ATTR_FRAGMENT_ID, Some(id.as_str()));
            edits.push((item.start_tag.clone(), render_start_tag(&item.attrs)));
            seen.insert(id);
        }
        fragments.push(item.fragment);
    }

    (apply_edits(content, edits), fragments)
}

/// Applies `attrs` to the fragment with `fragment_id` only.
///
/// Returns `None` when no such fragment exists.
pub fn patch_fragment(
    content: &str,
    fragment_id: &FragmentId,
    attrs: FragmentAttrs,
) -> Option<String> {
    let mut item = scan_fragments(content)
        .into_iter()
        .find(|scanned| scanned.fragment.fragment_id.as_ref() == Some(fragment_id))?;

    remove_attr(&mut item.attrs, "checked");
    set_attr(
        &mut item.attrs,
        ATTR_CHECKED,
        Some(if attrs.checked { "true" } else { "false" }),
    );
    let edit = (item.start_tag.clone(), render_start_tag(&item.attrs));
    Some(apply_edits(content, vec![edit]))
}

/// Content stripped of markup, entity-decoded and whitespace-collapsed.
pub fn plain_text(content: &str) -> String {
    let spaced = BLOCK_TAG_RE.replace_all(content, " ");
    let stripped = ANY_TAG_RE.replace_all(&spaced, "");
    let decoded = decode_entities(&stripped);
    WHITESPACE_RE
        .replace_all(&decoded, " ")
        .trim()
        .to_string()
}

/// True when the content has no visible text.
pub fn is_blank(content: &str) -> bool {
    plain_text(content).is_empty()
}

/// Renders fragments as one task list.
pub fn render_task_list(fragments: &[TaskFragment]) -> String {
    let mut out = format!("<ul {ATTR_ITEM_TYPE}=\"{TASK_LIST}\">");
    for fragment in fragments {
        let mut attrs: Vec<(String, Option<String>)> =
            vec![(ATTR_ITEM_TYPE.to_string(), Some(TASK_ITEM.to_string()))];
        if let Some(id) = &fragment.fragment_id {
            attrs.push((ATTR_FRAGMENT_ID.to_string(), Some(id.as_str().to_string())));
        }
        attrs.push((
            ATTR_CHECKED.to_string(),
            Some(fragment.checked.to_string()),
        ));
        if fragment.task_type != TaskType::default() {
            attrs.push((
                ATTR_TASK_TYPE.to_string(),
                Some(fragment.task_type.as_str().to_string()),
            ));
        }
        if fragment.section != TaskSection::default() {
            attrs.push((
                ATTR_SECTION.to_string(),
                Some(fragment.section.as_str().to_string()),
            ));
        }
        out.push_str(&render_start_tag(&attrs));
        out.push_str("<p>");
        out.push_str(&escape_text(&fragment.text));
        out.push_str("</p></li>");
    }
    out.push_str("</ul>");
    out
}

fn fragment_from(attrs: &[(String, Option<String>)], body: &str) -> TaskFragment {
    let own_body = match NESTED_LIST_RE.find(body) {
        Some(nested) => &body[..nested.start()],
        None => body,
    };
    let fragment_id = attr(attrs, ATTR_FRAGMENT_ID)
        .flatten()
        .filter(|value| !value.trim().is_empty())
        .map(FragmentId::new);

    TaskFragment {
        fragment_id,
        checked: is_checked(attrs),
        text: plain_text(own_body),
        task_type: attr(attrs, ATTR_TASK_TYPE)
            .flatten()
            .and_then(|value| TaskType::parse(&value))
            .unwrap_or_default(),
        section: attr(attrs, ATTR_SECTION)
            .flatten()
            .and_then(|value| TaskSection::parse(&value))
            .unwrap_or_default(),
    }
}

fn is_task_item(attrs: &[(String, Option<String>)]) -> bool {
    attr(attrs, ATTR_ITEM_TYPE)
        .flatten()
        .is_some_and(|value| value.eq_ignore_ascii_case(TASK_ITEM))
}

fn is_checked(attrs: &[(String, Option<String>)]) -> bool {
    if let Some(value) = attr(attrs, ATTR_CHECKED).flatten() {
        return value.eq_ignore_ascii_case("true");
    }
    match attr(attrs, "checked") {
        // Bare `checked` attribute.
        Some(None) => true,
        Some(Some(value)) => value.eq_ignore_ascii_case("true") || value == "checked",
        None => false,
    }
}

fn parse_attrs(raw: &str) -> Vec<(String, Option<String>)> {
    ATTR_RE
        .captures_iter(raw)
        .filter_map(|caps| {
            let name = caps.get(1)?.as_str().to_ascii_lowercase();
            let value = caps.get(2).map(|m| decode_entities(m.as_str()));
            Some((name, value))
        })
        .collect()
}

/// `None` when the attribute is absent, `Some(None)` when it is bare.
fn attr(attrs: &[(String, Option<String>)], name: &str) -> Option<Option<String>> {
    attrs
        .iter()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.clone())
}

fn set_attr(attrs: &mut Vec<(String, Option<String>)>, name: &str, value: Option<&str>) {
    let value = value.map(str::to_string);
    match attrs.iter_mut().find(|(key, _)| key == name) {
        Some(slot) => slot.1 = value,
        None => attrs.push((name.to_string(), value)),
    }
}

fn remove_attr(attrs: &mut Vec<(String, Option<String>)>, name: &str) {
    attrs.retain(|(key, _)| key != name);
}

fn render_start_tag(attrs: &[(String, Option<String>)]) -> String {
    let mut tag = String::from("<li");
    for (name, value) in attrs {
        tag.push(' ');
        tag.push_str(name);
        if let Some(value) = value {
            tag.push_str("=\"");
            tag.push_str(&escape_attr(value));
            tag.push('"');
        }
    }
    tag.push('>');
    tag
}

/// Applies non-overlapping span replacements back to front.
fn apply_edits(content: &str, mut edits: Vec<(Range<usize>, String)>) -> String {
    if edits.is_empty() {
        return content.to_string();
    }
    edits.sort_by_key(|(span, _)| std::cmp::Reverse(span.start));
    let mut out = content.to_string();
    for (span, replacement) in edits {
        out.replace_range(span, &replacement);
    }
    out
}

pub(crate) fn decode_entities(value: &str) -> String {
    value
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

pub(crate) fn escape_text(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn escape_attr(value: &str) -> String {
    escape_text(value).replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_ITEMS: &str = concat!(
        r#"<p>Groceries</p><ul data-type="taskList">"#,
        r#"<li data-type="taskItem" data-checked="true" data-note-task-id="note-task-a"><p>Buy &amp; carry milk</p></li>"#,
        r#"<li data-type="taskItem" data-checked="false" data-task-type="private" data-section="waiting"><p>Call <b>mom</b></p></li>"#,
        r#"</ul>"#
    );

    #[test]
    fn scan_reads_ids_checked_text_and_inferred_lists() {
        let fragments = extract_fragments(TWO_ITEMS);
        assert_eq!(fragments.len(), 2);
        assert_eq!(
            fragments[0].fragment_id,
            Some(FragmentId::new("note-task-a"))
        );
        assert!(fragments[0].checked);
        assert_eq!(fragments[0].text, "Buy & carry milk");
        assert_eq!(fragments[1].fragment_id, None);
        assert_eq!(fragments[1].text, "Call mom");
        assert_eq!(fragments[1].task_type, TaskType::Private);
        assert_eq!(fragments[1].section, TaskSection::Waiting);
    }

    #[test]
    fn plain_list_items_are_not_fragments() {
        let content = "<ul><li><p>not a task</p></li></ul>";
        assert!(extract_fragments(content).is_empty());
    }

    #[test]
    fn bare_checked_attribute_counts_as_checked() {
        let content = r#"<li data-type="taskItem" checked><p>done</p></li>"#;
        assert!(extract_fragments(content)[0].checked);
    }

    #[test]
    fn nested_item_text_excludes_child_list() {
        let content = concat!(
            r#"<ul data-type="taskList"><li data-type="taskItem"><p>parent</p>"#,
            r#"<ul data-type="taskList"><li data-type="taskItem"><p>child</p></li></ul>"#,
            r#"</li></ul>"#
        );
        let fragments = extract_fragments(content);
        assert_eq!(fragments.len(), 2);
        assert_eq!(fragments[0].text, "parent");
        assert_eq!(fragments[1].text, "child");
    }

    #[test]
    fn with_fragment_ids_only_touches_items_without_id() {
        let mut counter = 0;
        let (rewritten, fragments) = with_fragment_ids(TWO_ITEMS, |_| {
            counter += 1;
            FragmentId::new(format!("note-task-gen{counter}"))
        });
        assert_eq!(counter, 1);
        assert_eq!(
            fragments[1].fragment_id,
            Some(FragmentId::new("note-task-gen1"))
        );
        assert!(rewritten.contains(r#"data-note-task-id="note-task-gen1""#));
        assert!(rewritten.contains(r#"data-note-task-id="note-task-a""#));
        assert!(rewritten.contains("<p>Call <b>mom</b></p>"));

        let (again, _) = with_fragment_ids(&rewritten, |_| panic!("ids already assigned"));
        assert_eq!(again, rewritten);
    }

    #[test]
    fn repeated_id_is_reassigned_on_the_later_copy() {
        let pasted = concat!(
            r#"<ul data-type="taskList">"#,
            r#"<li data-type="taskItem" data-checked="false" data-note-task-id="note-task-a"><p>Buy milk</p></li>"#,
            r#"<li data-type="taskItem" data-checked="true" data-note-task-id="note-task-a"><p>Buy bread</p></li>"#,
            r#"</ul>"#
        );
        let (rewritten, fragments) =
            with_fragment_ids(pasted, |_| FragmentId::new("note-task-fresh"));

        assert_eq!(fragments[0].fragment_id, Some(FragmentId::new("note-task-a")));
        assert_eq!(
            fragments[1].fragment_id,
            Some(FragmentId::new("note-task-fresh"))
        );
        assert_eq!(rewritten.matches(r#"data-note-task-id="note-task-a""#).count(), 1);
        assert!(rewritten.contains(r#"data-note-task-id="note-task-fresh""#));
        assert!(rewritten.contains("<p>Buy bread</p>"));
    }

    #[test]
    fn patch_fragment_updates_only_target_item() {
        let patched = patch_fragment(
            TWO_ITEMS,
            &FragmentId::new("note-task-a"),
            FragmentAttrs { checked: false },
        )
        .expect("fragment exists");
        let fragments = extract_fragments(&patched);
        assert!(!fragments[0].checked);
        assert_eq!(fragments[0].text, "Buy & carry milk");
        assert!(patched.contains(
            r#"<li data-type="taskItem" data-checked="false" data-task-type="private" data-section="waiting">"#
        ));

        assert!(patch_fragment(
            TWO_ITEMS,
            &FragmentId::new("missing"),
            FragmentAttrs { checked: true }
        )
        .is_none());
    }

    #[test]
    fn plain_text_strips_markup() {
        assert_eq!(plain_text("<p></p>"), "");
        assert!(is_blank("<p> &nbsp; </p><p><br></p>"));
        assert_eq!(plain_text("<h1>Title</h1><p>a<b>b</b>c</p>"), "Title abc");
    }

    #[test]
    fn rendered_task_list_scans_back() {
        let fragment = TaskFragment {
            fragment_id: Some(FragmentId::new("note-task-x")),
            checked: true,
            text: "a < b".to_string(),
            task_type: TaskType::Private,
            section: TaskSection::Todo,
        };
        let content = render_task_list(std::slice::from_ref(&fragment));
        assert_eq!(extract_fragments(&content), vec![fragment]);
    }
}

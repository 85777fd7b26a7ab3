//! Field location and in-place patching over the typed document model.
//!
//! A field can appear on a page three ways: a `label: value` paragraph,
//! a label paragraph whose value sits in the following paragraph, or
//! one line of a soft-break-delimited group paragraph. The locator
//! classifies the shape, the patcher rewrites only the matched block,
//! and the orchestrator folds a commit's updates over one body in
//! extraction order so a later update to the same field wins.

use serde::Serialize;

use crate::document::{Block, Document, Paragraph};
use crate::extract::CommitUpdate;
use crate::normalize::normalize;

/// Located position of a field within a document. Recomputed on every
/// patch attempt, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldSite {
    /// One `label: value` line inside a soft-break group paragraph.
    LineDelimited { block: usize, line: usize },
    /// `label: value` sharing a single paragraph.
    Inline { block: usize },
    /// Label paragraph with an empty value; the value lives in the next
    /// paragraph when one exists.
    Split { label: usize, value: Option<usize> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PatchAction {
    ReplacedLine,
    ReplacedInline,
    ReplacedNextParagraph,
    InsertedValueParagraph,
    AppendedField,
}

impl PatchAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ReplacedLine => "replaced_line",
            Self::ReplacedInline => "replaced_inline",
            Self::ReplacedNextParagraph => "replaced_next_paragraph",
            Self::InsertedValueParagraph => "inserted_value_paragraph",
            Self::AppendedField => "appended_field",
        }
    }
}

/// One applied update, reported back to the caller instead of logged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldPatch {
    pub field: String,
    pub value: String,
    pub action: PatchAction,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApplyReport {
    pub body: String,
    pub changed: bool,
    pub patches: Vec<FieldPatch>,
}

/// Find the block(s) declaring `field_label`.
///
/// Grouped (line-delimited) paragraphs are scanned first across the
/// whole document: several short fields sharing one block must not be
/// confused with a long-form field declared elsewhere. Only then are
/// single paragraphs scanned top-to-bottom for inline and split shapes.
pub fn locate(doc: &Document, field_label: &str) -> Option<FieldSite> {
    let target = normalize(field_label);
    if target.is_empty() {
        return None;
    }

    for (block_idx, block) in doc.blocks().iter().enumerate() {
        let Block::Paragraph(paragraph) = block else {
            continue;
        };
        if paragraph.lines().len() < 2 {
            continue;
        }
        for line_idx in 0..paragraph.lines().len() {
            let line = paragraph.line_text(line_idx);
            let Some((key_part, _)) = line.split_once(':') else {
                continue;
            };
            if normalize(key_part) == target {
                return Some(FieldSite::LineDelimited {
                    block: block_idx,
                    line: line_idx,
                });
            }
        }
    }

    for (block_idx, block) in doc.blocks().iter().enumerate() {
        let Block::Paragraph(paragraph) = block else {
            continue;
        };
        let text = paragraph.text();
        if text.is_empty() {
            continue;
        }
        let (label_part, value_part) = match text.split_once(':') {
            Some((label, value)) => (label, Some(value)),
            None => (text.as_str(), None),
        };
        if normalize(label_part) != target {
            continue;
        }
        return Some(match value_part {
            Some(value) if !value.trim().is_empty() => FieldSite::Inline { block: block_idx },
            _ => FieldSite::Split {
                label: block_idx,
                value: next_paragraph_index(doc, block_idx),
            },
        });
    }

    None
}

/// Effective value at the field's current site, for callers that need
/// to read rather than write.
pub fn field_value(doc: &Document, field_label: &str) -> Option<String> {
    match locate(doc, field_label)? {
        FieldSite::LineDelimited { block, line } => doc
            .paragraph(block)?
            .line_text(line)
            .split_once(':')
            .map(|(_, value)| value.trim().to_string()),
        FieldSite::Inline { block } => doc
            .paragraph(block)?
            .text()
            .split_once(':')
            .map(|(_, value)| value.trim().to_string()),
        FieldSite::Split { value, .. } => Some(doc.paragraph(value?)?.text()),
    }
}

/// Rewrite `field_label` to `new_value`, appending the field when it is
/// absent. Only the matched block is touched; an edited paragraph left
/// without visible text is removed.
pub fn patch(doc: &mut Document, field_label: &str, new_value: &str) -> PatchAction {
    match locate(doc, field_label) {
        Some(FieldSite::LineDelimited { block, line }) => {
            if let Some(Block::Paragraph(paragraph)) = doc.blocks.get_mut(block) {
                let line_text = paragraph.line_text(line);
                let key_part = match line_text.split_once(':') {
                    Some((key, _)) => key.trim().to_string(),
                    None => line_text,
                };
                paragraph.set_line(line, format!("{key_part}: {new_value}"));
            }
            PatchAction::ReplacedLine
        }
        Some(FieldSite::Inline { block }) => {
            if let Some(Block::Paragraph(paragraph)) = doc.blocks.get_mut(block) {
                let text = paragraph.text();
                let label_part = match text.split_once(':') {
                    Some((label, _)) => label.to_string(),
                    None => text,
                };
                paragraph.set_text(format!("{label_part}: {new_value}"));
            }
            PatchAction::ReplacedInline
        }
        Some(FieldSite::Split { label, value }) => match value {
            Some(value_idx) => {
                if let Some(Block::Paragraph(paragraph)) = doc.blocks.get_mut(value_idx) {
                    paragraph.set_text(new_value.to_string());
                }
                remove_if_blank(doc, value_idx);
                PatchAction::ReplacedNextParagraph
            }
            None => {
                doc.insert_paragraph(label + 1, Paragraph::from_text(new_value));
                PatchAction::InsertedValueParagraph
            }
        },
        None => {
            doc.push_paragraph(Paragraph::from_text(format!("{field_label}: {new_value}")));
            PatchAction::AppendedField
        }
    }
}

/// Fold a commit's updates over one body in extraction order. `changed`
/// is exact string inequality against the input; an empty update list
/// returns the input verbatim so callers can skip the write entirely.
pub fn apply_updates(body: &str, updates: &[CommitUpdate]) -> ApplyReport {
    if updates.is_empty() {
        return ApplyReport {
            body: body.to_string(),
            changed: false,
            patches: Vec::new(),
        };
    }

    let mut doc = Document::parse(body);
    let mut patches = Vec::with_capacity(updates.len());
    for update in updates {
        let action = patch(&mut doc, &update.field, &update.value);
        patches.push(FieldPatch {
            field: update.field.clone(),
            value: update.value.clone(),
            action,
        });
    }

    let rendered = doc.render();
    let changed = rendered != body;
    ApplyReport {
        body: rendered,
        changed,
        patches,
    }
}

fn next_paragraph_index(doc: &Document, after: usize) -> Option<usize> {
    doc.blocks()
        .iter()
        .enumerate()
        .skip(after + 1)
        .find_map(|(idx, block)| matches!(block, Block::Paragraph(_)).then_some(idx))
}

fn remove_if_blank(doc: &mut Document, index: usize) {
    let blank = matches!(doc.blocks().get(index), Some(Block::Paragraph(paragraph)) if paragraph.is_blank());
    if blank {
        doc.remove_block(index);
    }
}

#[cfg(test)]
mod tests {
    use super::{FieldSite, PatchAction, apply_updates, field_value, locate, patch};
    use crate::document::Document;
    use crate::extract::CommitUpdate;

    fn update(field: &str, value: &str) -> CommitUpdate {
        CommitUpdate {
            field: field.to_string(),
            value: value.to_string(),
        }
    }

    #[test]
    fn locate_inline_site() {
        let doc = Document::parse("<p>Status: pending</p><p>Owner: bob</p>");
        assert_eq!(locate(&doc, "Status"), Some(FieldSite::Inline { block: 0 }));
        assert_eq!(locate(&doc, "Owner"), Some(FieldSite::Inline { block: 1 }));
    }

    #[test]
    fn locate_split_site() {
        let doc = Document::parse("<p>Status:</p><p>pending</p>");
        assert_eq!(
            locate(&doc, "Status"),
            Some(FieldSite::Split {
                label: 0,
                value: Some(1),
            })
        );
    }

    #[test]
    fn locate_split_site_without_colon_label() {
        let doc = Document::parse("<p>Status</p><p>pending</p>");
        assert_eq!(
            locate(&doc, "status -"),
            Some(FieldSite::Split {
                label: 0,
                value: Some(1),
            })
        );
    }

    #[test]
    fn locate_trailing_label_has_no_value_paragraph() {
        let doc = Document::parse("<p>Notes</p><p>Status:</p>");
        assert_eq!(
            locate(&doc, "Status"),
            Some(FieldSite::Split {
                label: 1,
                value: None,
            })
        );
    }

    #[test]
    fn line_delimited_group_beats_later_paragraph_match() {
        let doc =
            Document::parse("<p>Owner: bob<br/>Status: open</p><p>Status: stale duplicate</p>");
        assert_eq!(
            locate(&doc, "Status"),
            Some(FieldSite::LineDelimited { block: 0, line: 1 })
        );
    }

    #[test]
    fn locate_returns_none_for_unknown_field() {
        let doc = Document::parse("<p>Notes</p>");
        assert_eq!(locate(&doc, "Owner"), None);
        assert_eq!(locate(&doc, ""), None);
    }

    #[test]
    fn patch_inline_preserves_label_and_neighbours() {
        let mut doc = Document::parse("<p>Status: pending</p><p>Owner: bob</p>");
        let action = patch(&mut doc, "Status", "done");
        assert_eq!(action, PatchAction::ReplacedInline);
        assert_eq!(doc.render(), "<p>Status: done</p><p>Owner: bob</p>");
    }

    #[test]
    fn patch_split_rewrites_the_following_paragraph() {
        let mut doc = Document::parse("<p>Status:</p><p>pending</p>");
        let action = patch(&mut doc, "Status", "done");
        assert_eq!(action, PatchAction::ReplacedNextParagraph);
        assert_eq!(doc.render(), "<p>Status:</p><p>done</p>");
    }

    #[test]
    fn patch_trailing_label_inserts_a_value_paragraph() {
        let mut doc = Document::parse("<p>Notes</p><p>Status:</p>");
        let action = patch(&mut doc, "Status", "done");
        assert_eq!(action, PatchAction::InsertedValueParagraph);
        assert_eq!(doc.render(), "<p>Notes</p><p>Status:</p><p>done</p>");
    }

    #[test]
    fn patch_line_delimited_touches_one_line_only() {
        let mut doc =
            Document::parse("<p>Status: open<br/>Owner: bob<br/>Due: friday</p><p>Footer</p>");
        let action = patch(&mut doc, "Owner", "carol");
        assert_eq!(action, PatchAction::ReplacedLine);
        assert_eq!(
            doc.render(),
            "<p>Status: open<br/>Owner: carol<br/>Due: friday</p><p>Footer</p>"
        );
    }

    #[test]
    fn patch_missing_field_appends_at_the_end() {
        let mut doc = Document::parse("<p>Notes</p>");
        let action = patch(&mut doc, "Owner", "carol");
        assert_eq!(action, PatchAction::AppendedField);
        assert_eq!(doc.render(), "<p>Notes</p><p>Owner: carol</p>");
    }

    #[test]
    fn patch_empty_body_appends() {
        let mut doc = Document::parse("");
        patch(&mut doc, "Owner", "carol");
        assert_eq!(doc.render(), "<p>Owner: carol</p>");
    }

    #[test]
    fn locate_after_patch_finds_the_new_value_for_every_shape() {
        let bodies = [
            "",
            "<p>Status: pending</p>",
            "<p>Status:</p><p>pending</p>",
            "<p>Status: open<br/>Owner: bob</p>",
        ];
        for body in bodies {
            let mut doc = Document::parse(body);
            patch(&mut doc, "Status", "done");
            let reparsed = Document::parse(&doc.render());
            assert_eq!(
                field_value(&reparsed, "Status").as_deref(),
                Some("done"),
                "body: {body:?}"
            );
        }
    }

    #[test]
    fn patching_one_field_leaves_other_fields_alone() {
        let mut doc = Document::parse("<p>Status: open<br/>Owner: bob</p><p>Due: friday</p>");
        patch(&mut doc, "Status", "closed");
        let reparsed = Document::parse(&doc.render());
        assert_eq!(field_value(&reparsed, "Owner").as_deref(), Some("bob"));
        assert_eq!(field_value(&reparsed, "Due").as_deref(), Some("friday"));
    }

    #[test]
    fn normalized_labels_match_across_shapes() {
        let mut doc = Document::parse("<p>Leave - Policy: old</p>");
        patch(&mut doc, "Leave Policy", "new");
        assert_eq!(doc.render(), "<p>Leave - Policy: new</p>");
    }

    #[test]
    fn split_value_cleared_to_blank_removes_the_paragraph() {
        let mut doc = Document::parse("<p>Status:</p><p>pending</p><p>Footer</p>");
        patch(&mut doc, "Status", "");
        assert_eq!(doc.render(), "<p>Status:</p><p>Footer</p>");
    }

    #[test]
    fn apply_updates_with_empty_list_is_a_no_op() {
        let body = "<p>Status: open</p>";
        let report = apply_updates(body, &[]);
        assert!(!report.changed);
        assert_eq!(report.body, body);
        assert!(report.patches.is_empty());
    }

    #[test]
    fn apply_updates_threads_the_body_between_updates() {
        let report = apply_updates(
            "<p>Status: pending</p><p>Owner: bob</p>",
            &[update("Status", "done"), update("Owner", "alice")],
        );
        assert!(report.changed);
        assert_eq!(report.body, "<p>Status: done</p><p>Owner: alice</p>");
        assert_eq!(report.patches.len(), 2);
    }

    #[test]
    fn later_update_to_the_same_field_wins() {
        let report = apply_updates(
            "<p>Status: pending</p>",
            &[update("Status", "open"), update("Status", "closed")],
        );
        let doc = Document::parse(&report.body);
        assert_eq!(field_value(&doc, "Status").as_deref(), Some("closed"));
    }

    #[test]
    fn apply_updates_reports_unchanged_for_identical_value() {
        let body = "<p>Status: done</p>";
        let report = apply_updates(body, &[update("Status", "done")]);
        assert!(!report.changed);
        assert_eq!(report.body, body);
    }

    #[test]
    fn non_paragraph_markup_survives_patching() {
        let report = apply_updates(
            "<h2>Page</h2><p>Status: open</p><table><tr/></table>",
            &[update("Status", "closed")],
        );
        assert_eq!(
            report.body,
            "<h2>Page</h2><p>Status: closed</p><table><tr/></table>"
        );
    }
}

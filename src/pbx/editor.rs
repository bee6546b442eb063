//! Structural editing of a manifest buffer.
//!
//! The editor owns the buffer and its parsed model, and turns requested
//! operations into [`Edit`] plans against exact byte spans. Plans are
//! returned rather than applied, so callers can inspect, refuse, or batch
//! them; applying a plan re-parses the buffer, invalidating nothing for the
//! caller because spans never escape this module.

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use crate::edit::Edit;
use crate::ident::ObjectId;
use crate::pbx::errors::PbxError;
use crate::pbx::model::{AttrValue, PbxDocument, Span};
use crate::pbx::normalize::normalize;
use crate::pbx::parser::parse;

/// A planned mutation: either a batch of span edits or a reasoned no-op.
#[derive(Debug)]
pub enum PbxPlan {
    Edits(Vec<Edit>),
    NoOp(String),
}

impl PbxPlan {
    pub fn is_noop(&self) -> bool {
        matches!(self, PbxPlan::NoOp(_))
    }
}

pub struct PbxEditor {
    content: String,
    doc: PbxDocument,
}

impl PbxEditor {
    /// Parse a manifest buffer into an editor.
    pub fn parse(content: impl Into<String>) -> Result<Self, PbxError> {
        let content = content.into();
        let doc = parse(&content)?;
        Ok(PbxEditor { content, doc })
    }

    /// Read and parse a manifest file.
    pub fn from_path(path: &Path) -> Result<Self, PbxError> {
        let content = fs::read_to_string(path)?;
        Self::parse(content)
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn document(&self) -> &PbxDocument {
        &self.doc
    }

    /// Plan inserting a complete definition (one or more full lines, newline
    /// terminated) directly after a section's begin marker.
    ///
    /// A missing section is a no-op, not an error; the caller decides how
    /// loudly to report it.
    pub fn plan_insert_definition(&self, section: &str, definition: &str) -> PbxPlan {
        match self.doc.section(section) {
            Some(section) => PbxPlan::Edits(vec![Edit::insert(section.body_start, definition)]),
            None => PbxPlan::NoOp(format!("no {section} section in manifest")),
        }
    }

    /// Plan appending `id /* comment */,` as the last entry of an ordered
    /// list attribute.
    pub fn plan_append_entry(
        &self,
        owner: &ObjectId,
        key: &str,
        id: &ObjectId,
        comment: &str,
    ) -> Result<PbxPlan, PbxError> {
        let record = self
            .doc
            .record(owner)
            .ok_or_else(|| PbxError::ObjectNotFound {
                id: owner.to_string(),
            })?;
        let list = match record.list(key) {
            Some(list) => list,
            None => {
                return Ok(PbxPlan::NoOp(format!(
                    "object {owner} has no {key} list"
                )))
            }
        };
        if list.entry_for(id).is_some() {
            return Ok(PbxPlan::NoOp(format!("{id} already listed in {key}")));
        }

        let close_line_start = line_start(&self.content, list.close);
        let edit = if close_line_start < list.close
            || self.content[..list.close].ends_with('\n')
            || list.close == 0
        {
            // Multiline list: the closing parenthesis sits on its own line.
            // New entries go just above it, one level deeper.
            let indent = &self.content[close_line_start..list.close];
            Edit::insert(
                close_line_start,
                format!("{indent}\t{id} /* {comment} */,\n"),
            )
        } else {
            // Inline list: rewrite as multiline while inserting, indented
            // off the line that owns the list.
            let owner_line_start = full_line_start(&self.content, list.open);
            let indent: String = self.content[owner_line_start..]
                .chars()
                .take_while(|c| *c == '\t' || *c == ' ')
                .collect();
            Edit::insert(
                list.close,
                format!("\n{indent}\t{id} /* {comment} */,\n{indent}"),
            )
        };
        Ok(PbxPlan::Edits(vec![edit]))
    }

    /// Plan removing a set of objects: every definition whose id is in the
    /// set, plus every ordered-list entry naming one of them. Entries inside
    /// a definition that is itself being removed vanish with it.
    pub fn plan_remove_objects(&self, ids: &BTreeSet<ObjectId>) -> PbxPlan {
        if ids.is_empty() {
            return PbxPlan::NoOp("no identifiers to remove".to_string());
        }

        let mut record_spans: Vec<Span> = Vec::new();
        for record in self.doc.records() {
            if ids.contains(&record.id) {
                record_spans.push(record.span);
            }
        }

        let mut spans = record_spans.clone();
        for record in self.doc.records() {
            if ids.contains(&record.id) {
                continue;
            }
            for attr in &record.attrs {
                if let AttrValue::List(list) = &attr.value {
                    for entry in &list.entries {
                        let named = entry.object_id().map_or(false, |id| ids.contains(&id));
                        if !named {
                            continue;
                        }
                        let span = removal_span(&self.content, entry.span);
                        if record_spans
                            .iter()
                            .any(|rs| span.start >= rs.start && span.end <= rs.end)
                        {
                            continue;
                        }
                        spans.push(span);
                    }
                }
            }
        }

        if spans.is_empty() {
            return PbxPlan::NoOp("identifiers not present in manifest".to_string());
        }

        // Adjacent entries can widen over the same separator (the final,
        // comma-less entry reaches back through the comma its predecessor's
        // span already covers); merge overlaps so the batch stays disjoint.
        spans.sort_by_key(|s| (s.start, s.end));
        let mut merged: Vec<Span> = Vec::new();
        for span in spans {
            match merged.last_mut() {
                Some(prev) if span.start <= prev.end => prev.end = prev.end.max(span.end),
                _ => merged.push(span),
            }
        }

        let edits = merged
            .into_iter()
            .map(|span| Edit::delete(span.start, span.end, span.slice(&self.content)))
            .collect();
        PbxPlan::Edits(edits)
    }

    /// Apply a plan to the buffer and re-parse. Returns whether the buffer
    /// changed.
    pub fn apply(&mut self, plan: PbxPlan) -> Result<bool, PbxError> {
        match plan {
            PbxPlan::NoOp(_) => Ok(false),
            PbxPlan::Edits(edits) if edits.is_empty() => Ok(false),
            PbxPlan::Edits(edits) => {
                let new_content = Edit::apply_batch_to(edits, &self.content)?;
                let changed = new_content != self.content;
                if changed {
                    self.doc = parse(&new_content)?;
                    self.content = new_content;
                }
                Ok(changed)
            }
        }
    }

    /// Run separator repair over the whole buffer and re-parse if anything
    /// changed.
    pub fn normalize(&mut self) -> Result<bool, PbxError> {
        let repaired = normalize(&self.content);
        if repaired == self.content {
            return Ok(false);
        }
        self.doc = parse(&repaired)?;
        self.content = repaired;
        Ok(true)
    }
}

/// Start of the line containing `offset`, unconditionally.
fn full_line_start(content: &str, offset: usize) -> usize {
    content[..offset].rfind('\n').map_or(0, |i| i + 1)
}

/// Start of the line containing `offset`, provided only indentation
/// precedes `offset` on that line; otherwise `offset` itself.
fn line_start(content: &str, offset: usize) -> usize {
    let bytes = content.as_bytes();
    let mut i = offset;
    while i > 0 {
        match bytes[i - 1] {
            b'\n' => return i,
            b' ' | b'\t' => i -= 1,
            _ => return offset,
        }
    }
    0
}

/// Widen a list-entry span to cover its separators: the whole line when the
/// entry ends with a comma, or back through the preceding comma when it is
/// the final, unterminated entry.
fn removal_span(content: &str, span: Span) -> Span {
    let bytes = content.as_bytes();

    let mut j = span.end;
    while j < bytes.len() && matches!(bytes[j], b' ' | b'\t') {
        j += 1;
    }
    if j < bytes.len() && bytes[j] == b',' {
        j += 1;
        let mut k = j;
        while k < bytes.len() && matches!(bytes[k], b' ' | b'\t' | b'\r') {
            k += 1;
        }
        let start = line_start(content, span.start);
        if k < bytes.len() && bytes[k] == b'\n' {
            return Span::new(start, k + 1);
        }
        return Span::new(start, j);
    }

    // Final entry without a trailing comma: consume the separator before it.
    let mut i = span.start;
    while i > 0 && bytes[i - 1].is_ascii_whitespace() {
        i -= 1;
    }
    if i > 0 && bytes[i - 1] == b',' {
        return Span::new(i - 1, span.end);
    }
    Span::new(line_start(content, span.start), span.end)
}

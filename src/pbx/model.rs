//! Parsed manifest model.
//!
//! Every node carries the byte span of its source text, so editing operations
//! can compile down to span-verified buffer edits. The model is rebuilt from
//! the buffer after each applied edit; spans are only valid against the exact
//! buffer they were parsed from.

use std::collections::BTreeSet;

use crate::ident::ObjectId;

/// Half-open byte range into the manifest buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Span { start, end }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn slice<'a>(&self, content: &'a str) -> &'a str {
        &content[self.start..self.end]
    }
}

/// One value in an ordered list, with its decoded text and trailing comment.
///
/// The span covers the value token through the end of the comment (when one
/// is present), but not the separating comma.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListEntry {
    pub value: String,
    pub comment: Option<String>,
    pub span: Span,
}

impl ListEntry {
    /// The entry's value as an object identifier, when it has that shape.
    pub fn object_id(&self) -> Option<ObjectId> {
        ObjectId::parse(&self.value).ok()
    }
}

/// An ordered list value: `( entry, entry, ... )`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PbxList {
    /// Byte offset of the opening parenthesis.
    pub open: usize,
    /// Byte offset of the closing parenthesis.
    pub close: usize,
    pub entries: Vec<ListEntry>,
}

impl PbxList {
    pub fn entry_for(&self, id: &ObjectId) -> Option<&ListEntry> {
        self.entries.iter().find(|e| e.value == id.as_str())
    }
}

/// A record attribute value. Nested dictionaries are parsed for balance but
/// their contents are not retained; no editing operation reaches inside them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttrValue {
    Scalar {
        value: String,
        comment: Option<String>,
    },
    List(PbxList),
    Dict,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attr {
    pub key: String,
    pub value: AttrValue,
}

/// One object definition: `ID /* comment */ = { isa = ...; ... };`.
///
/// The span runs from the start of the definition's first line through the
/// newline after the closing `;`, so deleting the span removes whole lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub id: ObjectId,
    pub comment: Option<String>,
    pub attrs: Vec<Attr>,
    pub span: Span,
}

impl Record {
    /// Record type, from the conventional `isa` attribute.
    pub fn isa(&self) -> Option<&str> {
        self.attr("isa")
    }

    /// Scalar attribute value by key.
    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attrs.iter().find_map(|a| match &a.value {
            AttrValue::Scalar { value, .. } if a.key == key => Some(value.as_str()),
            _ => None,
        })
    }

    /// List attribute by key.
    pub fn list(&self, key: &str) -> Option<&PbxList> {
        self.attrs.iter().find_map(|a| match &a.value {
            AttrValue::List(list) if a.key == key => Some(list),
            _ => None,
        })
    }
}

/// A marker-delimited run of record definitions, grouped by record type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub name: String,
    /// Span of the `/* Begin ... section */` comment token.
    pub begin_span: Span,
    /// Byte offset just past the begin marker's line, where new definitions
    /// are inserted.
    pub body_start: usize,
    /// Span of the `/* End ... section */` comment token.
    pub end_span: Span,
    pub records: Vec<Record>,
}

/// The whole manifest: document-level attributes plus the sectioned object
/// table.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PbxDocument {
    /// Top-level keys other than the object table itself (archiveVersion,
    /// objectVersion, rootObject, ...).
    pub attrs: Vec<Attr>,
    pub sections: Vec<Section>,
}

impl PbxDocument {
    pub fn section(&self, name: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.name == name)
    }

    /// All record definitions, in document order.
    pub fn records(&self) -> impl Iterator<Item = &Record> {
        self.sections.iter().flat_map(|s| s.records.iter())
    }

    pub fn record(&self, id: &ObjectId) -> Option<&Record> {
        self.records().find(|r| &r.id == id)
    }

    pub fn records_of_kind<'a>(&'a self, isa: &'a str) -> impl Iterator<Item = &'a Record> {
        self.records().filter(move |r| r.isa() == Some(isa))
    }

    /// Identifiers with a definition in the object table.
    pub fn defined_ids(&self) -> BTreeSet<ObjectId> {
        self.records().map(|r| r.id.clone()).collect()
    }

    /// Identifiers mentioned anywhere as a value: scalar attributes and
    /// ordered-list entries, at both document and record level.
    pub fn referenced_ids(&self) -> BTreeSet<ObjectId> {
        let mut ids = BTreeSet::new();
        let mut visit = |attrs: &[Attr]| {
            for attr in attrs {
                match &attr.value {
                    AttrValue::Scalar { value, .. } => {
                        if let Ok(id) = ObjectId::parse(value) {
                            ids.insert(id);
                        }
                    }
                    AttrValue::List(list) => {
                        ids.extend(list.entries.iter().filter_map(|e| e.object_id()));
                    }
                    AttrValue::Dict => {}
                }
            }
        };
        visit(&self.attrs);
        for record in self.records() {
            visit(&record.attrs);
        }
        ids
    }

    /// Every identifier the manifest mentions; the seed set for a fresh
    /// [`IdGenerator`](crate::ident::IdGenerator).
    pub fn all_ids(&self) -> BTreeSet<ObjectId> {
        let mut ids = self.defined_ids();
        ids.extend(self.referenced_ids());
        ids
    }

    /// References whose definition is missing.
    pub fn dangling_ids(&self) -> BTreeSet<ObjectId> {
        let defined = self.defined_ids();
        self.referenced_ids()
            .into_iter()
            .filter(|id| !defined.contains(id))
            .collect()
    }
}

/// Render a scalar for the manifest, quoting when the bare form would not
/// survive a reparse.
pub fn quoted(value: &str) -> String {
    let bare_ok = !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '/' | '$' | '-'));
    if bare_ok {
        return value.to_string();
    }

    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            other => out.push(other),
        }
    }
    out.push('"');
    out
}

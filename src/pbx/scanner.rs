//! Reference scanning: resolve a display name to every identifier that
//! mentions it.
//!
//! Three rules contribute to a match, and their results are unioned:
//!
//! 1. a definition or list-entry comment that is the name, optionally
//!    followed by a phase suffix ("Name in Sources");
//! 2. a `path` attribute whose final component is the name;
//! 3. a `name` attribute equal to the name.
//!
//! A query containing `/` is path-qualified: when any record's `path`
//! attribute equals the whole query, matching is scoped to those records
//! (plus their build-file wrappers) so that same-named files elsewhere in
//! the tree are left alone. When nothing matches the full path, the final
//! component falls back through the three rules above.

use std::collections::BTreeSet;

use crate::ident::ObjectId;
use crate::pbx::model::{AttrValue, PbxDocument};

/// All identifiers the given display name or project-relative path resolves
/// to. An empty set means the manifest does not mention the name.
pub fn find_ids_for(doc: &PbxDocument, query: &str) -> BTreeSet<ObjectId> {
    if query.contains('/') {
        let exact: BTreeSet<ObjectId> = doc
            .records()
            .filter(|r| r.attr("path") == Some(query))
            .map(|r| r.id.clone())
            .collect();
        if !exact.is_empty() {
            return with_build_file_wrappers(doc, exact);
        }
    }

    let name = basename(query);
    let mut ids = BTreeSet::new();

    for record in doc.records() {
        if let Some(comment) = &record.comment {
            if comment_matches(comment, name) {
                ids.insert(record.id.clone());
            }
        }
        if let Some(path) = record.attr("path") {
            if path_matches(path, name) {
                ids.insert(record.id.clone());
            }
        }
        if record.attr("name") == Some(name) {
            ids.insert(record.id.clone());
        }

        for attr in &record.attrs {
            if let AttrValue::List(list) = &attr.value {
                for entry in &list.entries {
                    if let Some(id) = entry.object_id() {
                        if let Some(comment) = &entry.comment {
                            if comment_matches(comment, name) {
                                ids.insert(id);
                            }
                        }
                    }
                }
            }
        }
    }

    with_build_file_wrappers(doc, ids)
}

/// Close a match set over build-file wrappers: any `PBXBuildFile` whose
/// `fileRef` points into the set belongs to the same file.
fn with_build_file_wrappers(doc: &PbxDocument, mut ids: BTreeSet<ObjectId>) -> BTreeSet<ObjectId> {
    let wrappers: Vec<ObjectId> = doc
        .records_of_kind("PBXBuildFile")
        .filter(|r| {
            r.attr("fileRef")
                .and_then(|v| ObjectId::parse(v).ok())
                .is_some_and(|target| ids.contains(&target))
        })
        .map(|r| r.id.clone())
        .collect();
    ids.extend(wrappers);
    ids
}

/// The name itself, or the name followed by a phase suffix ("in Sources").
fn comment_matches(comment: &str, name: &str) -> bool {
    match comment.strip_prefix(name) {
        Some("") => true,
        Some(rest) => rest.starts_with(" in "),
        None => false,
    }
}

/// Exact file name or a whole final path component. `Sources/Keychain.m`
/// matches `Keychain.m`; `Sources/SomeKeychain.m` does not.
fn path_matches(path: &str, name: &str) -> bool {
    path == name || path.ends_with(&format!("/{name}"))
}

fn basename(query: &str) -> &str {
    query.rsplit('/').next().unwrap_or(query)
}

/// Names the manifest does mention, ranked by similarity to a query that
/// matched nothing. Used for "did you mean" reporting.
pub fn similar_names(doc: &PbxDocument, query: &str, limit: usize) -> Vec<String> {
    let name = basename(query);
    let mut candidates: BTreeSet<String> = BTreeSet::new();

    for record in doc.records() {
        if let Some(comment) = &record.comment {
            let display = comment
                .split_once(" in ")
                .map(|(head, _)| head)
                .unwrap_or(comment);
            candidates.insert(display.to_string());
        }
        if let Some(n) = record.attr("name") {
            candidates.insert(n.to_string());
        }
        if let Some(path) = record.attr("path") {
            candidates.insert(basename(path).to_string());
        }
    }

    let mut scored: Vec<(f64, String)> = candidates
        .into_iter()
        .map(|c| (strsim::jaro_winkler(name, &c), c))
        .filter(|(score, _)| *score >= 0.7)
        .collect();
    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
    scored.into_iter().take(limit).map(|(_, c)| c).collect()
}

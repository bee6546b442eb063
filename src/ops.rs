//! Mutation orchestration: the add-file and remove-files operations.
//!
//! A [`MutationSession`] owns one manifest buffer for the duration of an
//! invocation. The buffer is read once, mutated through planned span edits
//! (re-parsed after each applied plan), and handed back to the caller for a
//! single persist. Non-fatal conditions (duplicate names, missing groups,
//! missing sections) are collected into reports instead of failing the
//! operation.

use std::collections::BTreeSet;
use std::path::Path;

use crate::classify::{classify, BuildPhase};
use crate::ident::{IdGenerator, ObjectId};
use crate::pbx::model::{quoted, PbxDocument, Record};
use crate::pbx::{find_ids_for, similar_names, PbxEditor, PbxError, PbxPlan};

/// Outcome of wiring one new file into the manifest.
#[derive(Debug)]
pub struct AddReport {
    /// Base name recorded in comments and the `name` attribute.
    pub file_name: String,
    /// Identifier of the new file-reference definition.
    pub file_ref: ObjectId,
    /// Identifier of the build-file wrapper, when the file builds.
    pub build_file: Option<ObjectId>,
    /// Build phase the wrapper was routed to.
    pub phase: Option<BuildPhase>,
    /// Non-fatal conditions encountered along the way.
    pub warnings: Vec<String>,
}

/// Outcome of one name in a remove batch.
#[derive(Debug)]
pub struct RemoveReport {
    pub query: String,
    /// Identifiers whose definitions and references were deleted.
    pub removed: BTreeSet<ObjectId>,
    /// Near-miss display names, populated when nothing matched.
    pub suggestions: Vec<String>,
}

impl RemoveReport {
    pub fn matched(&self) -> bool {
        !self.removed.is_empty()
    }
}

/// One manifest, one invocation: parse once, mutate in memory, persist once.
pub struct MutationSession {
    editor: PbxEditor,
    ids: IdGenerator,
    original: String,
}

impl MutationSession {
    pub fn parse(content: impl Into<String>) -> Result<Self, PbxError> {
        let editor = PbxEditor::parse(content)?;
        let ids = IdGenerator::with_seen(editor.document().all_ids());
        let original = editor.content().to_string();
        Ok(MutationSession {
            editor,
            ids,
            original,
        })
    }

    pub fn from_path(path: &Path) -> Result<Self, PbxError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(content)
    }

    pub fn content(&self) -> &str {
        self.editor.content()
    }

    pub fn document(&self) -> &PbxDocument {
        self.editor.document()
    }

    /// Whether any applied operation changed the buffer.
    pub fn changed(&self) -> bool {
        self.editor.content() != self.original
    }

    pub fn id_generator(&mut self) -> &mut IdGenerator {
        &mut self.ids
    }

    /// Wire a project-relative file into the manifest: a file-reference
    /// definition, a build-file wrapper and phase entry when the extension
    /// routes to a build phase, and a group children entry when the parent
    /// directory names an existing group.
    pub fn add_file(&mut self, rel_path: &str, target: Option<&str>) -> Result<AddReport, PbxError> {
        let file_name = rel_path
            .rsplit('/')
            .next()
            .unwrap_or(rel_path)
            .to_string();
        let mut warnings = Vec::new();

        // Heuristic duplicate check against the raw text, not the model: a
        // mention in any comment or attribute counts.
        if self.editor.content().contains(&file_name) {
            warnings.push(format!(
                "{file_name} already appears in the manifest; adding anyway"
            ));
        }

        let class = classify(rel_path);
        let file_ref = self.ids.next_id();
        let build_file = class.phase.map(|_| self.ids.next_id());

        if let (Some(build_id), Some(phase)) = (&build_file, class.phase) {
            let definition = format!(
                "\t\t{build_id} /* {name} in {phase} */ = {{isa = PBXBuildFile; fileRef = {file_ref} /* {name} */; }};\n",
                name = file_name,
                phase = phase.label(),
            );
            let plan = self.editor.plan_insert_definition("PBXBuildFile", &definition);
            self.apply_reporting(plan, &mut warnings)?;
        }

        let definition = format!(
            "\t\t{file_ref} /* {comment} */ = {{isa = PBXFileReference; lastKnownFileType = {kind}; name = {name}; path = {path}; sourceTree = SOURCE_ROOT; }};\n",
            comment = file_name,
            kind = class.file_type,
            name = quoted(&file_name),
            path = quoted(rel_path),
        );
        let plan = self.editor.plan_insert_definition("PBXFileReference", &definition);
        self.apply_reporting(plan, &mut warnings)?;

        if class.group.is_empty() {
            warnings.push(format!(
                "{file_name} is at the project root; not listing it in any group"
            ));
        } else {
            match find_group(self.editor.document(), &class.group) {
                Some(group_id) => {
                    let plan = self
                        .editor
                        .plan_append_entry(&group_id, "children", &file_ref, &file_name)?;
                    self.apply_reporting(plan, &mut warnings)?;
                }
                None => warnings.push(format!(
                    "no group named {} in the manifest; {} was not listed in any group",
                    class.group, file_name
                )),
            }
        }

        if let (Some(build_id), Some(phase)) = (&build_file, class.phase) {
            match find_build_phase(self.editor.document(), target, phase) {
                Ok(phase_id) => {
                    let comment = format!("{} in {}", file_name, phase.label());
                    let plan =
                        self.editor
                            .plan_append_entry(&phase_id, "files", build_id, &comment)?;
                    self.apply_reporting(plan, &mut warnings)?;
                }
                Err(PbxError::SectionNotFound { name }) => warnings.push(format!(
                    "no {name} build phase found; {file_name} was not added to the build"
                )),
                Err(other) => return Err(other),
            }
        }

        Ok(AddReport {
            file_name,
            file_ref,
            build_file,
            phase: class.phase,
            warnings,
        })
    }

    /// Delete every definition and reference a display name (or
    /// project-relative path) resolves to. A zero-match name leaves the
    /// buffer untouched and the report carries suggestions instead.
    pub fn remove_file(&mut self, query: &str) -> Result<RemoveReport, PbxError> {
        let removed = find_ids_for(self.editor.document(), query);
        if removed.is_empty() {
            return Ok(RemoveReport {
                query: query.to_string(),
                removed,
                suggestions: similar_names(self.editor.document(), query, 3),
            });
        }

        let plan = self.editor.plan_remove_objects(&removed);
        self.editor.apply(plan)?;
        Ok(RemoveReport {
            query: query.to_string(),
            removed,
            suggestions: Vec::new(),
        })
    }

    /// Separator repair over the whole buffer; run once after a remove batch.
    pub fn normalize(&mut self) -> Result<bool, PbxError> {
        self.editor.normalize()
    }

    fn apply_reporting(
        &mut self,
        plan: PbxPlan,
        warnings: &mut Vec<String>,
    ) -> Result<(), PbxError> {
        if let PbxPlan::NoOp(reason) = &plan {
            warnings.push(reason.clone());
        }
        self.editor.apply(plan)?;
        Ok(())
    }
}

/// The native target driving an operation: the named one, or the first
/// defined when no name is given.
pub fn find_native_target<'a>(
    doc: &'a PbxDocument,
    name: Option<&str>,
) -> Result<&'a Record, PbxError> {
    let mut targets = doc.records_of_kind("PBXNativeTarget");
    let found = match name {
        Some(name) => targets.find(|r| r.attr("name") == Some(name)),
        None => targets.next(),
    };
    found.ok_or_else(|| PbxError::TargetNotFound {
        name: name.unwrap_or("<any>").to_string(),
    })
}

/// Resolve a build phase by walking the target's `buildPhases` list to the
/// record with the matching type, rather than trusting any fixed identifier.
fn find_build_phase(
    doc: &PbxDocument,
    target: Option<&str>,
    phase: BuildPhase,
) -> Result<ObjectId, PbxError> {
    let target = find_native_target(doc, target)?;
    let phases = target
        .list("buildPhases")
        .ok_or_else(|| PbxError::SectionNotFound {
            name: phase.isa().to_string(),
        })?;

    for entry in &phases.entries {
        if let Some(id) = entry.object_id() {
            if let Some(record) = doc.record(&id) {
                if record.isa() == Some(phase.isa()) {
                    return Ok(id);
                }
            }
        }
    }
    Err(PbxError::SectionNotFound {
        name: phase.isa().to_string(),
    })
}

/// Group lookup by display name: the definition comment, falling back to the
/// `name` attribute, falling back to the final component of `path`.
fn find_group(doc: &PbxDocument, label: &str) -> Option<ObjectId> {
    doc.records_of_kind("PBXGroup")
        .find(|r| {
            r.comment.as_deref() == Some(label)
                || r.attr("name") == Some(label)
                || r.attr("path")
                    .map_or(false, |p| p.rsplit('/').next() == Some(label))
        })
        .map(|r| r.id.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session_fixture() -> String {
        [
            "// !$*UTF8*$!",
            "{",
            "\tarchiveVersion = 1;",
            "\tobjectVersion = 46;",
            "\tobjects = {",
            "",
            "/* Begin PBXBuildFile section */",
            "\t\t6C2A189E1F4D3B2A00E1A9C4 /* AppDelegate.m in Sources */ = {isa = PBXBuildFile; fileRef = 6C2A189B1F4D3B2A00E1A9C4 /* AppDelegate.m */; };",
            "/* End PBXBuildFile section */",
            "",
            "/* Begin PBXFileReference section */",
            "\t\t6C2A189A1F4D3B2A00E1A9C4 /* AppDelegate.h */ = {isa = PBXFileReference; lastKnownFileType = sourcecode.c.h; name = AppDelegate.h; path = Sources/AppDelegate.h; sourceTree = SOURCE_ROOT; };",
            "\t\t6C2A189B1F4D3B2A00E1A9C4 /* AppDelegate.m */ = {isa = PBXFileReference; lastKnownFileType = sourcecode.c.objc; name = AppDelegate.m; path = Sources/AppDelegate.m; sourceTree = SOURCE_ROOT; };",
            "/* End PBXFileReference section */",
            "",
            "/* Begin PBXGroup section */",
            "\t\t6C2A18C11F4D3B2A00E1A9C4 /* Sources */ = {",
            "\t\t\tisa = PBXGroup;",
            "\t\t\tchildren = (",
            "\t\t\t\t6C2A189A1F4D3B2A00E1A9C4 /* AppDelegate.h */,",
            "\t\t\t\t6C2A189B1F4D3B2A00E1A9C4 /* AppDelegate.m */,",
            "\t\t\t);",
            "\t\t\tpath = Sources;",
            "\t\t\tsourceTree = \"<group>\";",
            "\t\t};",
            "/* End PBXGroup section */",
            "",
            "/* Begin PBXNativeTarget section */",
            "\t\t6C2A18D01F4D3B2A00E1A9C4 /* Atlas */ = {",
            "\t\t\tisa = PBXNativeTarget;",
            "\t\t\tbuildPhases = (",
            "\t\t\t\t6C2A18D11F4D3B2A00E1A9C4 /* Sources */,",
            "\t\t\t\t6C2A18D21F4D3B2A00E1A9C4 /* Resources */,",
            "\t\t\t);",
            "\t\t\tname = Atlas;",
            "\t\t\tproductName = Atlas;",
            "\t\t};",
            "/* End PBXNativeTarget section */",
            "",
            "/* Begin PBXResourcesBuildPhase section */",
            "\t\t6C2A18D21F4D3B2A00E1A9C4 /* Resources */ = {",
            "\t\t\tisa = PBXResourcesBuildPhase;",
            "\t\t\tfiles = (",
            "\t\t\t);",
            "\t\t};",
            "/* End PBXResourcesBuildPhase section */",
            "",
            "/* Begin PBXSourcesBuildPhase section */",
            "\t\t6C2A18D11F4D3B2A00E1A9C4 /* Sources */ = {",
            "\t\t\tisa = PBXSourcesBuildPhase;",
            "\t\t\tfiles = (",
            "\t\t\t\t6C2A189E1F4D3B2A00E1A9C4 /* AppDelegate.m in Sources */,",
            "\t\t\t);",
            "\t\t};",
            "/* End PBXSourcesBuildPhase section */",
            "\t};",
            "}",
            "",
        ]
        .join("\n")
    }

    #[test]
    fn test_add_source_file_wires_all_four_places() {
        let mut session = MutationSession::parse(session_fixture()).unwrap();
        let report = session.add_file("Sources/Keychain.m", None).unwrap();

        assert_eq!(report.file_name, "Keychain.m");
        assert_eq!(report.phase, Some(BuildPhase::Sources));
        let build_id = report.build_file.as_ref().unwrap();

        let doc = session.document();
        let file_ref = doc.record(&report.file_ref).unwrap();
        assert_eq!(file_ref.isa(), Some("PBXFileReference"));
        assert_eq!(file_ref.attr("path"), Some("Sources/Keychain.m"));
        assert_eq!(file_ref.attr("lastKnownFileType"), Some("sourcecode.c.objc"));

        let wrapper = doc.record(build_id).unwrap();
        assert_eq!(wrapper.isa(), Some("PBXBuildFile"));
        assert_eq!(wrapper.attr("fileRef"), Some(report.file_ref.as_str()));

        let group = doc
            .record(&ObjectId::parse("6C2A18C11F4D3B2A00E1A9C4").unwrap())
            .unwrap();
        let children = group.list("children").unwrap();
        assert_eq!(children.entries.last().unwrap().value, report.file_ref.as_str());
        assert_eq!(children.entries.len(), 3);

        let phase = doc
            .record(&ObjectId::parse("6C2A18D11F4D3B2A00E1A9C4").unwrap())
            .unwrap();
        let files = phase.list("files").unwrap();
        assert_eq!(files.entries.last().unwrap().value, build_id.as_str());

        assert!(doc.dangling_ids().is_empty());
        assert!(session.changed());
    }

    #[test]
    fn test_add_header_gets_no_build_file() {
        let mut session = MutationSession::parse(session_fixture()).unwrap();
        let report = session.add_file("Sources/Keychain.h", None).unwrap();
        assert!(report.build_file.is_none());
        assert!(report.phase.is_none());
        assert!(session
            .document()
            .record(&report.file_ref)
            .is_some());
        // The sources phase still lists only the pre-existing entry.
        let doc = session.document();
        let phase = doc
            .record(&ObjectId::parse("6C2A18D11F4D3B2A00E1A9C4").unwrap())
            .unwrap();
        assert_eq!(phase.list("files").unwrap().entries.len(), 1);
    }

    #[test]
    fn test_add_duplicate_name_warns_but_proceeds() {
        let mut session = MutationSession::parse(session_fixture()).unwrap();
        let report = session.add_file("Sources/AppDelegate.m", None).unwrap();
        assert!(report
            .warnings
            .iter()
            .any(|w| w.contains("already appears")));
        assert!(session.document().record(&report.file_ref).is_some());
    }

    #[test]
    fn test_add_with_unknown_group_still_adds_reference() {
        let mut session = MutationSession::parse(session_fixture()).unwrap();
        let report = session.add_file("Vendored/Blob.m", None).unwrap();
        assert!(report
            .warnings
            .iter()
            .any(|w| w.contains("no group named Vendored")));
        let doc = session.document();
        assert!(doc.record(&report.file_ref).is_some());
        // The reference exists but no group lists it.
        let group = doc
            .record(&ObjectId::parse("6C2A18C11F4D3B2A00E1A9C4").unwrap())
            .unwrap();
        assert!(group
            .list("children")
            .unwrap()
            .entry_for(&report.file_ref)
            .is_none());
    }

    #[test]
    fn test_add_respects_named_target() {
        let mut session = MutationSession::parse(session_fixture()).unwrap();
        let err = session.add_file("Sources/Keychain.m", Some("Ghost")).unwrap_err();
        assert!(matches!(err, PbxError::TargetNotFound { .. }));
    }

    #[test]
    fn test_remove_then_readd_is_structurally_stable() {
        let mut session = MutationSession::parse(session_fixture()).unwrap();
        let before: BTreeSet<ObjectId> = session.document().defined_ids();

        let report = session.add_file("Sources/Keychain.m", None).unwrap();
        let removed = session.remove_file("Keychain.m").unwrap();
        session.normalize().unwrap();

        let mut expected: BTreeSet<ObjectId> = [report.file_ref].into_iter().collect();
        expected.extend(report.build_file);
        assert_eq!(removed.removed, expected);
        assert_eq!(session.document().defined_ids(), before);
        assert!(session.document().dangling_ids().is_empty());
    }

    #[test]
    fn test_remove_name_shared_by_adjacent_tail_entries() {
        // Two references resolve to the same display name and sit as the
        // last two children, the final one without a trailing comma. One
        // remove call must delete both definitions and both entries.
        let content = [
            "// !$*UTF8*$!",
            "{",
            "\tobjects = {",
            "",
            "/* Begin PBXFileReference section */",
            "\t\t6C2A18E11F4D3B2A00E1A9C4 /* Keep.m */ = {isa = PBXFileReference; name = Keep.m; path = Sources/Keep.m; sourceTree = SOURCE_ROOT; };",
            "\t\t6C2A18E21F4D3B2A00E1A9C4 /* Dup.m */ = {isa = PBXFileReference; name = Dup.m; path = Sources/Dup.m; sourceTree = SOURCE_ROOT; };",
            "\t\t6C2A18E31F4D3B2A00E1A9C4 /* Dup.m */ = {isa = PBXFileReference; name = Dup.m; path = Legacy/Dup.m; sourceTree = SOURCE_ROOT; };",
            "/* End PBXFileReference section */",
            "",
            "/* Begin PBXGroup section */",
            "\t\t6C2A18C11F4D3B2A00E1A9C4 /* Sources */ = {",
            "\t\t\tisa = PBXGroup;",
            "\t\t\tchildren = (",
            "\t\t\t\t6C2A18E11F4D3B2A00E1A9C4 /* Keep.m */,",
            "\t\t\t\t6C2A18E21F4D3B2A00E1A9C4 /* Dup.m */,",
            "\t\t\t\t6C2A18E31F4D3B2A00E1A9C4 /* Dup.m */",
            "\t\t\t);",
            "\t\t\tpath = Sources;",
            "\t\t\tsourceTree = \"<group>\";",
            "\t\t};",
            "/* End PBXGroup section */",
            "\t};",
            "}",
            "",
        ]
        .join("\n");

        let mut session = MutationSession::parse(content).unwrap();
        let report = session.remove_file("Dup.m").unwrap();
        session.normalize().unwrap();

        assert_eq!(report.removed.len(), 2);
        for gone in ["6C2A18E21F4D3B2A00E1A9C4", "6C2A18E31F4D3B2A00E1A9C4"] {
            assert!(!session.content().contains(gone), "{gone} still present");
        }
        let doc = session.document();
        let group = doc
            .record(&ObjectId::parse("6C2A18C11F4D3B2A00E1A9C4").unwrap())
            .unwrap();
        let children = group.list("children").unwrap();
        assert_eq!(children.entries.len(), 1);
        assert_eq!(children.entries[0].value, "6C2A18E11F4D3B2A00E1A9C4");
        assert!(doc.dangling_ids().is_empty());
    }

    #[test]
    fn test_remove_zero_match_reports_suggestions() {
        let mut session = MutationSession::parse(session_fixture()).unwrap();
        let before = session.content().to_string();
        let report = session.remove_file("AppDelegat.m").unwrap();
        assert!(!report.matched());
        assert!(report.suggestions.iter().any(|s| s == "AppDelegate.m"));
        assert_eq!(session.content(), before);
        assert!(!session.changed());
    }

    #[test]
    fn test_find_native_target_by_name_and_default() {
        let content = session_fixture();
        let editor = PbxEditor::parse(content).unwrap();
        let doc = editor.document();
        assert_eq!(
            find_native_target(doc, Some("Atlas")).unwrap().attr("name"),
            Some("Atlas")
        );
        assert_eq!(find_native_target(doc, None).unwrap().attr("name"), Some("Atlas"));
        assert!(find_native_target(doc, Some("Ghost")).is_err());
    }
}

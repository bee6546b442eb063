//! File classification: manifest file kind, build-phase routing, and the
//! group a new file should be listed under.

use std::path::Path;

/// File kind recorded for paths whose extension is not recognised.
pub const OPAQUE_KIND: &str = "file";

/// Build phase a file participates in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildPhase {
    Sources,
    Resources,
}

impl BuildPhase {
    /// Display name used inside manifest comments ("X in Sources").
    pub fn label(&self) -> &'static str {
        match self {
            BuildPhase::Sources => "Sources",
            BuildPhase::Resources => "Resources",
        }
    }

    /// Record type of the corresponding build-phase node.
    pub fn isa(&self) -> &'static str {
        match self {
            BuildPhase::Sources => "PBXSourcesBuildPhase",
            BuildPhase::Resources => "PBXResourcesBuildPhase",
        }
    }
}

/// Everything the mutation pipeline needs to know about one file path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    /// Manifest file-kind string (`lastKnownFileType` value).
    pub file_type: &'static str,
    /// Build phase to wire the file into, if it participates in the build.
    pub phase: Option<BuildPhase>,
    /// Display name of the group the file belongs in. Empty for files at the
    /// project root, which are left unlisted.
    pub group: String,
}

/// Classify a project-relative file path.
pub fn classify(path: &str) -> Classification {
    let ext = extension_of(path);
    Classification {
        file_type: file_type_for(&ext),
        phase: phase_for(&ext),
        group: group_for(path),
    }
}

fn extension_of(path: &str) -> String {
    Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e.to_ascii_lowercase()))
        .unwrap_or_default()
}

/// Manifest file-kind string for an extension (lowercased, leading dot).
fn file_type_for(ext: &str) -> &'static str {
    match ext {
        ".swift" => "sourcecode.swift",
        ".m" => "sourcecode.c.objc",
        ".h" => "sourcecode.c.h",
        ".c" => "sourcecode.c.c",
        ".xib" => "file.xib",
        ".storyboard" => "file.storyboard",
        ".png" => "image.png",
        ".pdf" => "image.pdf",
        ".icns" => "image.icns",
        ".plist" => "text.plist.xml",
        ".strings" => "text.plist.strings",
        ".rtf" => "text.rtf",
        ".json" => "text.json",
        ".sdef" => "sourcecode.sdef",
        _ => OPAQUE_KIND,
    }
}

fn phase_for(ext: &str) -> Option<BuildPhase> {
    match ext {
        ".swift" | ".m" | ".c" => Some(BuildPhase::Sources),
        ".xib" | ".storyboard" | ".png" | ".pdf" | ".icns" | ".plist" | ".strings" | ".rtf"
        | ".json" | ".sdef" => Some(BuildPhase::Resources),
        _ => None,
    }
}

/// Group display name for a path, derived from its immediate parent directory.
///
/// Known project-layout directories map to the group of the same name; any
/// other directory name passes through unchanged, so project-specific layouts
/// keep working without a table entry.
fn group_for(path: &str) -> String {
    let parent = Path::new(path)
        .parent()
        .and_then(|p| p.file_name())
        .and_then(|n| n.to_str())
        .unwrap_or("");

    match parent {
        "Sources" | "Resources" | "Controllers" | "Models" | "Views" | "ViewModels"
        | "Utilities" | "Integration" | "Icons" => parent.to_string(),
        other => other.to_string(),
    }
}

//! Pbx Patcher: automated editing of Xcode project manifests
//!
//! Keeps a `project.pbxproj` object graph consistent under programmatic
//! mutation: adding a file wires it into the file-reference section, its
//! group, and the right build phase; removing a file deletes its definitions
//! and every reference to them, then repairs list separators.
//!
//! # Architecture
//!
//! All mutations compile down to a single primitive: [`Edit`], a verified
//! byte-span replacement. Spans come from a recursive-descent parse of the
//! manifest ([`pbx::parser`]), never from pattern matching over the raw text,
//! so brace balance and marker ordering are facts of the model rather than
//! assumptions of the editor.
//!
//! # Safety
//!
//! - All edits verify expected before-text before applying
//! - Atomic file writes (tempfile + fsync + rename)
//! - Project boundary enforcement for added files
//! - Identifiers are checked against every id the manifest already mentions
//!
//! # Example
//!
//! ```no_run
//! use pbx_patcher::ops::MutationSession;
//! use std::path::Path;
//!
//! # fn main() -> Result<(), pbx_patcher::pbx::PbxError> {
//! let mut session = MutationSession::from_path(Path::new(
//!     "Atlas.xcodeproj/project.pbxproj",
//! ))?;
//! let report = session.add_file("Sources/Utilities/NewFile.swift", None)?;
//! println!("added as {}", report.file_ref);
//! # Ok(())
//! # }
//! ```

pub mod classify;
pub mod edit;
pub mod ident;
pub mod ops;
pub mod pbx;
pub mod safety;
pub mod template;

// Re-exports
pub use classify::{classify, BuildPhase, Classification};
pub use edit::{atomic_write, Edit, EditError, EditVerification};
pub use ident::{IdGenerator, InvalidObjectId, ObjectId};
pub use ops::{AddReport, MutationSession, RemoveReport};
pub use pbx::{find_ids_for, normalize, parse, similar_names, PbxDocument, PbxEditor, PbxError};
pub use safety::{ProjectGuard, SafetyError};

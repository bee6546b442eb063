pub mod editor;
pub mod errors;
pub mod model;
pub mod normalize;
pub mod parser;
pub mod scanner;

pub use editor::{PbxEditor, PbxPlan};
pub use errors::PbxError;
pub use model::{Attr, AttrValue, ListEntry, PbxDocument, PbxList, Record, Section, Span};
pub use normalize::normalize;
pub use parser::parse;
pub use scanner::{find_ids_for, similar_names};

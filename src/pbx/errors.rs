use thiserror::Error;

#[derive(Error, Debug)]
pub enum PbxError {
    #[error("invalid manifest syntax at byte {offset}: {message}")]
    Syntax { offset: usize, message: String },

    #[error("section not found: {name}")]
    SectionNotFound { name: String },

    #[error("object not found: {id}")]
    ObjectNotFound { id: String },

    #[error("no native target named {name:?}")]
    TargetNotFound { name: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("edit error: {0}")]
    Edit(#[from] crate::edit::EditError),

    #[error(transparent)]
    InvalidId(#[from] crate::ident::InvalidObjectId),
}

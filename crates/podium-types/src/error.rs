use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TypesError {
    #[error("Unknown role: {0}")]
    UnknownRole(String),

    #[error("Unknown entity kind: {0}")]
    UnknownEntityKind(String),

    #[error("Unknown status: {0}")]
    UnknownStatus(String),
}

pub type Result<T> = std::result::Result<T, TypesError>;

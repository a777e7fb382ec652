use podium_storage::StorageError;
use serde::Serialize;
use thiserror::Error;

/// Certification operation result type
pub type Result<T> = std::result::Result<T, CertificationError>;

/// Coarse error class, stable across variants; the HTTP layer keys off this
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    NotFound,
    Forbidden,
    Conflict,
    Service,
}

/// Certification errors
#[derive(Debug, Error)]
pub enum CertificationError {
    #[error("{0}")]
    Validation(String),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Service error: {0}")]
    Service(String),
}

impl CertificationError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Forbidden(_) => ErrorKind::Forbidden,
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::Storage(StorageError::NotFound(_)) => ErrorKind::NotFound,
            Self::Storage(StorageError::AlreadyExists(_))
            | Self::Storage(StorageError::VersionConflict { .. }) => ErrorKind::Conflict,
            Self::Storage(_) | Self::Service(_) => ErrorKind::Service,
        }
    }

    pub fn status_code(&self) -> u16 {
        match self.kind() {
            ErrorKind::Validation => 400,
            ErrorKind::Forbidden => 403,
            ErrorKind::NotFound => 404,
            ErrorKind::Conflict => 409,
            ErrorKind::Service => 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            CertificationError::validation("Judge must certify first").status_code(),
            400
        );
        assert_eq!(CertificationError::forbidden("no").status_code(), 403);
        assert_eq!(
            CertificationError::not_found("Category", "cat_1").status_code(),
            404
        );
        assert_eq!(CertificationError::conflict("dup").status_code(), 409);
        assert_eq!(
            CertificationError::Service("boom".into()).status_code(),
            500
        );
    }

    #[test]
    fn test_storage_errors_keep_their_meaning() {
        let err: CertificationError = StorageError::VersionConflict {
            id: "crf_1".into(),
            expected: 1,
            found: 2,
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::Conflict);

        let err: CertificationError = StorageError::BackendError("disk".into()).into();
        assert_eq!(err.status_code(), 500);
    }

    #[test]
    fn test_messages_are_passed_through() {
        let err = CertificationError::validation("Cannot reject a finalized certification");
        assert_eq!(err.to_string(), "Cannot reject a finalized certification");
        let err = CertificationError::not_found("Category", "cat_9");
        assert_eq!(err.to_string(), "Category not found: cat_9");
    }
}

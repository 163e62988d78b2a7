//! Service error types with a machine-readable code per variant.
//!
//! [`ServiceError`] is the unified error type for all service operations.
//! [`ServiceError::detail`] produces the structured form callers print or
//! send over the wire.

use coursegraph_core::course::CourseSource;
use coursegraph_core::error::{ContentError, ErrorKind};
use coursegraph_core::id::CourseKey;
use coursegraph_storage::StorageError;
use serde::Serialize;

use crate::schema::diagnostics::Diagnostic;

/// Structured error detail.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g., "NOT_FOUND", "CONFLICT").
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<ErrorKind>,
    /// Blocking diagnostics, for validation failures.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<Diagnostic>,
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("course not found: {0}")]
    CourseNotFound(CourseKey),

    /// The caller edited one storage form while another is authoritative.
    #[error("course {course} is stored as {stored}, not {requested}")]
    SourceMismatch {
        course: CourseKey,
        stored: CourseSource,
        requested: CourseSource,
    },

    /// Both storage forms claim the course.
    #[error("course {course} is indexed as file '{path}' but is also stored in the database")]
    MixedState { course: CourseKey, path: String },

    #[error("validation failed with {} blocking problem(s)", .errors.len())]
    ValidationFailed {
        errors: Vec<Diagnostic>,
        warnings: Vec<Diagnostic>,
    },

    #[error(transparent)]
    Content(#[from] ContentError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl ServiceError {
    /// The content-taxonomy kind of this failure.
    ///
    /// `None` for infrastructure failures (I/O, database) and for a course
    /// that does not exist.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            ServiceError::CourseNotFound(_) => None,
            ServiceError::SourceMismatch { .. } | ServiceError::MixedState { .. } => {
                Some(ErrorKind::StorageConflict)
            }
            ServiceError::ValidationFailed { errors, .. } => errors.iter().find_map(|d| d.kind),
            ServiceError::Content(e) => Some(e.kind()),
            ServiceError::Storage(e) => e.content_kind(),
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::CourseNotFound(_) => "NOT_FOUND",
            ServiceError::SourceMismatch { .. } => "SOURCE_MISMATCH",
            ServiceError::MixedState { .. } => "MIXED_STATE",
            ServiceError::ValidationFailed { .. } => "VALIDATION_FAILED",
            ServiceError::Content(_) => "BAD_REQUEST",
            ServiceError::Storage(StorageError::Conflict { .. }) => "CONFLICT",
            ServiceError::Storage(StorageError::CourseNotFound(_))
            | ServiceError::Storage(StorageError::NotInIndex(_)) => "NOT_FOUND",
            ServiceError::Storage(e) if e.content_kind().is_some() => "BAD_REQUEST",
            ServiceError::Storage(_) => "STORAGE_ERROR",
        }
    }

    pub fn detail(&self) -> ErrorDetail {
        let details = match self {
            ServiceError::ValidationFailed { errors, .. } => errors.clone(),
            _ => Vec::new(),
        };
        ErrorDetail {
            code: self.code().to_string(),
            message: self.to_string(),
            kind: self.kind(),
            details,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coursegraph_core::id::AccountId;
    use coursegraph_storage::ContentHash;

    #[test]
    fn stale_revision_is_a_storage_conflict() {
        let err = ServiceError::from(StorageError::Conflict {
            course: "1/intro".into(),
            expected: ContentHash::of_bytes(b"old"),
            actual: ContentHash::of_bytes(b"new"),
        });
        assert_eq!(err.code(), "CONFLICT");
        assert_eq!(err.kind(), Some(ErrorKind::StorageConflict));
    }

    #[test]
    fn source_mismatch_detail() {
        let err = ServiceError::SourceMismatch {
            course: CourseKey::new(AccountId(1), "intro"),
            stored: CourseSource::Database,
            requested: CourseSource::YamlFile,
        };
        let detail = err.detail();
        assert_eq!(detail.code, "SOURCE_MISMATCH");
        assert_eq!(detail.message, "course 1/intro is stored as database, not yaml_file");
        assert!(detail.details.is_empty());
    }
}

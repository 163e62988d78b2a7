//! Storage error types using thiserror.

use coursegraph_core::error::{ContentError, ErrorKind};
use coursegraph_core::id::{CourseId, CourseKey};
use thiserror::Error;

use crate::hash::ContentHash;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("migration error: {0}")]
    Migration(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),

    #[error("i/o error on '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("course not found: {0}")]
    CourseNotFound(CourseKey),

    #[error("course already exists: {0}")]
    CourseExists(CourseKey),

    #[error("course '{0}' is not listed in the course index")]
    NotInIndex(CourseId),

    #[error("course '{0}' is stored in the database, not in a YAML file")]
    StoredInDatabase(CourseId),

    /// Another writer saved the course since the caller last read it.
    #[error("course '{course}' changed since revision {expected} (now {actual})")]
    Conflict {
        course: String,
        expected: ContentHash,
        actual: ContentHash,
    },

    #[error("invalid course path '{path}': {reason}")]
    InvalidPath { path: String, reason: &'static str },

    #[error("invalid course id '{0}': expected letters, digits, '_' or '-'")]
    InvalidCourseId(String),

    #[error(transparent)]
    Content(#[from] ContentError),

    #[error("integrity error: {reason}")]
    IntegrityError { reason: String },
}

impl StorageError {
    /// Content-taxonomy kind, if this failure maps onto one.
    ///
    /// I/O and database failures have no content kind; callers report them
    /// as infrastructure errors.
    pub fn content_kind(&self) -> Option<ErrorKind> {
        match self {
            StorageError::Conflict { .. } => Some(ErrorKind::StorageConflict),
            StorageError::Content(e) => Some(e.kind()),
            StorageError::Serialization(_) | StorageError::Yaml(_) => {
                Some(ErrorKind::MalformedInput)
            }
            StorageError::InvalidPath { .. } | StorageError::InvalidCourseId(_) => {
                Some(ErrorKind::SchemaViolation)
            }
            _ => None,
        }
    }

    pub(crate) fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        StorageError::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coursegraph_core::id::AccountId;

    #[test]
    fn test_conflict_maps_to_storage_conflict() {
        let err = StorageError::Conflict {
            course: CourseKey::new(AccountId(1), "intro").to_string(),
            expected: ContentHash::of_bytes(b"a"),
            actual: ContentHash::of_bytes(b"b"),
        };
        assert_eq!(err.content_kind(), Some(ErrorKind::StorageConflict));
        assert!(err.to_string().starts_with("course '1/intro' changed since revision"));
    }

    #[test]
    fn test_content_errors_keep_their_kind() {
        let err = StorageError::from(ContentError::malformed("bad"));
        assert_eq!(err.content_kind(), Some(ErrorKind::MalformedInput));
        let err = StorageError::CourseNotFound(CourseKey::new(AccountId(1), "x"));
        assert_eq!(err.content_kind(), None);
    }
}

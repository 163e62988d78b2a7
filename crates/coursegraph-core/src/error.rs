//! Error taxonomy shared by every course-content component.
//!
//! Uses `thiserror` for structured, matchable error variants. Every failure
//! carries a kind, the offending element id when one is known, and a
//! human-readable message, so callers never have to parse strings.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::id::ElementId;

/// Classification of content failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Unparseable YAML/JSON, or a structurally wrong document.
    MalformedInput,
    /// Unknown element type, missing required field, or an invalid value.
    SchemaViolation,
    /// A `goto`, prefix, or entry reference that resolves to nothing.
    UnresolvedReference,
    /// Two elements share an id.
    DuplicateIdentifier,
    /// A concurrent save won the race at the transaction layer.
    StorageConflict,
}

impl ErrorKind {
    /// Every kind blocks a save unless a caller's policy relaxes it.
    pub fn is_fatal_on_save(self) -> bool {
        true
    }

    /// On read only whole-document failures are fatal; element-level
    /// problems degrade to warnings.
    pub fn is_fatal_on_read(self) -> bool {
        matches!(self, ErrorKind::MalformedInput | ErrorKind::StorageConflict)
    }
}

/// Content errors produced by the codecs and the validator.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ContentError {
    #[error("malformed input{}: {message}", at(.element))]
    MalformedInput {
        element: Option<ElementId>,
        message: String,
    },

    #[error("schema violation at '{element}': {message}")]
    SchemaViolation { element: ElementId, message: String },

    #[error("unresolved reference from '{element}' to '{target}'")]
    UnresolvedReference { element: ElementId, target: String },

    #[error("duplicate element id '{element}'")]
    DuplicateIdentifier { element: ElementId },

    #[error("storage conflict on course '{course}': {message}")]
    StorageConflict { course: String, message: String },
}

fn at(element: &Option<ElementId>) -> String {
    match element {
        Some(id) => format!(" at '{id}'"),
        None => String::new(),
    }
}

impl ContentError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ContentError::MalformedInput { .. } => ErrorKind::MalformedInput,
            ContentError::SchemaViolation { .. } => ErrorKind::SchemaViolation,
            ContentError::UnresolvedReference { .. } => ErrorKind::UnresolvedReference,
            ContentError::DuplicateIdentifier { .. } => ErrorKind::DuplicateIdentifier,
            ContentError::StorageConflict { .. } => ErrorKind::StorageConflict,
        }
    }

    /// The offending element, if the failure is tied to one.
    pub fn element(&self) -> Option<&ElementId> {
        match self {
            ContentError::MalformedInput { element, .. } => element.as_ref(),
            ContentError::SchemaViolation { element, .. }
            | ContentError::UnresolvedReference { element, .. }
            | ContentError::DuplicateIdentifier { element } => Some(element),
            ContentError::StorageConflict { .. } => None,
        }
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        ContentError::MalformedInput {
            element: None,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_element() {
        let err = ContentError::MalformedInput {
            element: Some(ElementId::new("m1")),
            message: "bad json".into(),
        };
        assert_eq!(err.to_string(), "malformed input at 'm1': bad json");
        assert_eq!(
            ContentError::malformed("not a mapping").to_string(),
            "malformed input: not a mapping"
        );
    }

    #[test]
    fn kinds_and_read_fatality() {
        let dup = ContentError::DuplicateIdentifier {
            element: ElementId::new("a"),
        };
        assert_eq!(dup.kind(), ErrorKind::DuplicateIdentifier);
        assert_eq!(dup.element(), Some(&ElementId::new("a")));
        assert!(ErrorKind::MalformedInput.is_fatal_on_read());
        assert!(!ErrorKind::SchemaViolation.is_fatal_on_read());
        assert!(!ErrorKind::UnresolvedReference.is_fatal_on_read());
        assert!(ErrorKind::UnresolvedReference.is_fatal_on_save());
    }
}

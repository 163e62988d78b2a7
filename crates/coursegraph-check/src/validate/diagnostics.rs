//! Validation problems with enough context to locate and fix each one.
//!
//! [`Problem`] identifies the offending element (when one is known), the
//! field within it, and a message. Every variant maps onto the shared
//! [`ErrorKind`] taxonomy so callers can apply save/read policies uniformly.

use coursegraph_core::error::{ContentError, ErrorKind};
use coursegraph_core::id::ElementId;
use serde::{Deserialize, Serialize};

/// Where an unresolved reference was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceRole {
    /// A `goto` on a message option or jump option.
    Goto,
    /// A revision or test `prefix` that matches no other element.
    Prefix,
    /// The course entry point.
    Entry,
}

/// A single validation problem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[serde(tag = "problem", rename_all = "snake_case")]
pub enum Problem {
    /// Two elements share an id. Reported at the later occurrence.
    #[error("duplicate element id '{element}' (first defined at position {first_position})")]
    DuplicateId {
        element: ElementId,
        /// Position of the first occurrence.
        first_position: usize,
    },

    /// The element's `type` is not one of the closed set.
    #[error("element at position {position}: {message}")]
    UnknownType {
        element: Option<ElementId>,
        position: usize,
        message: String,
    },

    /// The element could not be decoded at all.
    #[error("element at position {position} is malformed: {message}")]
    Malformed {
        element: Option<ElementId>,
        position: usize,
        message: String,
    },

    /// A required field is absent or empty.
    #[error("element '{element}' is missing required field '{field}'")]
    MissingField { element: ElementId, field: String },

    /// A field is present but its value violates a constraint.
    #[error("element '{element}' has an invalid '{field}': {message}")]
    InvalidValue {
        element: ElementId,
        field: String,
        message: String,
    },

    /// A reference that resolves to nothing.
    #[error("element '{element}' field '{field}' references unknown '{target}'")]
    UnresolvedReference {
        element: ElementId,
        field: String,
        target: String,
        reference: ReferenceRole,
    },
}

/// How strictly problems are enforced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckMode {
    /// Loading a course for display. Nothing blocks.
    Read,
    /// Saving from the editor. Unmatched prefixes only warn.
    EditorSave,
    /// Automated import. Everything blocks.
    ImportSave,
}

impl Problem {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Problem::DuplicateId { .. } => ErrorKind::DuplicateIdentifier,
            Problem::UnknownType { .. }
            | Problem::MissingField { .. }
            | Problem::InvalidValue { .. } => ErrorKind::SchemaViolation,
            Problem::Malformed { .. } => ErrorKind::MalformedInput,
            Problem::UnresolvedReference { .. } => ErrorKind::UnresolvedReference,
        }
    }

    pub fn element(&self) -> Option<&ElementId> {
        match self {
            Problem::UnknownType { element, .. } | Problem::Malformed { element, .. } => {
                element.as_ref()
            }
            Problem::DuplicateId { element, .. }
            | Problem::MissingField { element, .. }
            | Problem::InvalidValue { element, .. }
            | Problem::UnresolvedReference { element, .. } => Some(element),
        }
    }

    /// Whether this problem stops a save under `mode`.
    pub fn blocks(&self, mode: CheckMode) -> bool {
        match mode {
            CheckMode::Read => false,
            CheckMode::EditorSave => !matches!(
                self,
                Problem::UnresolvedReference {
                    reference: ReferenceRole::Prefix,
                    ..
                }
            ),
            CheckMode::ImportSave => true,
        }
    }

    /// Converts into the shared structured error.
    pub fn to_error(&self) -> ContentError {
        match self {
            Problem::DuplicateId { element, .. } => ContentError::DuplicateIdentifier {
                element: element.clone(),
            },
            Problem::Malformed {
                element, message, ..
            } => ContentError::MalformedInput {
                element: element.clone(),
                message: message.clone(),
            },
            Problem::UnresolvedReference {
                element, target, ..
            } => ContentError::UnresolvedReference {
                element: element.clone(),
                target: target.clone(),
            },
            Problem::UnknownType { element, .. } => ContentError::SchemaViolation {
                element: element.clone().unwrap_or_else(|| ElementId::new("")),
                message: self.to_string(),
            },
            Problem::MissingField { element, .. } | Problem::InvalidValue { element, .. } => {
                ContentError::SchemaViolation {
                    element: element.clone(),
                    message: self.to_string(),
                }
            }
        }
    }
}

//! Surface codecs between stored / edited forms and canonical elements.
//!
//! # Architecture
//!
//! Every surface decoder funnels each element through [`decode_payload`]:
//!
//! 1. The raw element is converted into a `serde_json::Value` (YAML values,
//!    row blobs, and editor blocks all end up here).
//! 2. [`crate::legacy::normalize_payload`] rewrites historical flag spellings.
//! 3. The `type` tag is read and the strict payload struct for that tag is
//!    deserialized via [`ElementKind::deserialize_as`].
//!
//! A failure in any step skips that element only; the decoder records a
//! [`SkippedElement`] and carries on, so one corrupt element never makes a
//! whole course unreadable.

pub mod block;
pub mod yaml;

use serde_json::Value;
use thiserror::Error;

use crate::element::{Element, ElementKind, ElementType};
use crate::error::{ContentError, ErrorKind};
use crate::id::ElementId;
use crate::legacy;

/// An element the decoder could not turn into canonical form.
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedElement {
    /// Zero-based index in the decoded input order.
    pub position: usize,
    pub element: Option<ElementId>,
    pub kind: ErrorKind,
    pub message: String,
}

impl SkippedElement {
    pub fn new(position: usize, element: Option<ElementId>, error: &PayloadError) -> Self {
        SkippedElement {
            position,
            element,
            kind: error.kind(),
            message: error.to_string(),
        }
    }

    pub fn malformed(
        position: usize,
        element: Option<ElementId>,
        message: impl Into<String>,
    ) -> Self {
        SkippedElement {
            position,
            element,
            kind: ErrorKind::MalformedInput,
            message: message.into(),
        }
    }

    pub fn to_error(&self) -> ContentError {
        match (self.kind, &self.element) {
            (ErrorKind::SchemaViolation, Some(id)) => ContentError::SchemaViolation {
                element: id.clone(),
                message: self.message.clone(),
            },
            _ => ContentError::MalformedInput {
                element: self.element.clone(),
                message: self.message.clone(),
            },
        }
    }
}

/// Result of decoding a whole course from one surface form.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Decoded {
    /// Successfully decoded elements, in input order.
    pub elements: Vec<Element>,
    /// Elements skipped with a warning, in input order.
    pub skipped: Vec<SkippedElement>,
}

impl Decoded {
    /// True if nothing was skipped.
    pub fn is_clean(&self) -> bool {
        self.skipped.is_empty()
    }

    /// Number of elements in the input, decoded or not.
    pub fn input_len(&self) -> usize {
        self.elements.len() + self.skipped.len()
    }

    /// Fails with the first skipped element, if any.
    pub fn into_strict(self) -> Result<Vec<Element>, ContentError> {
        match self.skipped.first() {
            Some(skipped) => Err(skipped.to_error()),
            None => Ok(self.elements),
        }
    }
}

/// Why a single element payload could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PayloadError {
    #[error("element is not a mapping")]
    NotAMapping,

    #[error("element has no 'type' field")]
    MissingType,

    #[error("unknown element type '{0}'")]
    UnknownType(String),

    /// The tag is known but a field has the wrong shape.
    #[error("invalid {ty} element: {message}")]
    Invalid { ty: ElementType, message: String },
}

impl PayloadError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PayloadError::NotAMapping | PayloadError::Invalid { .. } => ErrorKind::MalformedInput,
            PayloadError::MissingType | PayloadError::UnknownType(_) => ErrorKind::SchemaViolation,
        }
    }
}

/// Decodes one raw element payload into its canonical kind.
pub fn decode_payload(mut payload: Value) -> Result<ElementKind, PayloadError> {
    if !payload.is_object() {
        return Err(PayloadError::NotAMapping);
    }
    legacy::normalize_payload(&mut payload);

    let tag = match payload.get("type") {
        Some(Value::String(tag)) => tag.clone(),
        Some(Value::Null) | None => return Err(PayloadError::MissingType),
        Some(other) => return Err(PayloadError::UnknownType(other.to_string())),
    };
    let ty: ElementType = tag
        .parse()
        .map_err(|_| PayloadError::UnknownType(tag.clone()))?;

    ElementKind::deserialize_as(ty, payload).map_err(|e| PayloadError::Invalid {
        ty,
        message: e.to_string(),
    })
}

/// Encodes a canonical kind into the canonical JSON payload shape.
pub fn encode_payload(kind: &ElementKind) -> Result<Value, ContentError> {
    serde_json::to_value(kind).map_err(|e| ContentError::malformed(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::{Answer, Quiz};
    use serde_json::json;

    #[test]
    fn decode_payload_normalizes_legacy_flags() {
        let kind = decode_payload(json!({
            "type": "quiz",
            "text": "2+2?",
            "answers": [
                {"text": "4", "correct": "YES"},
                {"text": "5", "correct": "no"}
            ]
        }))
        .unwrap();
        let ElementKind::Quiz(Quiz { answers, .. }) = kind else {
            panic!("expected quiz");
        };
        assert_eq!(
            answers,
            vec![
                Answer {
                    text: "4".into(),
                    correct: true,
                    feedback: String::new()
                },
                Answer {
                    text: "5".into(),
                    ..Default::default()
                },
            ]
        );
    }

    #[test]
    fn decode_payload_classifies_failures() {
        assert_eq!(decode_payload(json!("text")), Err(PayloadError::NotAMapping));
        assert_eq!(decode_payload(json!({"text": "x"})), Err(PayloadError::MissingType));
        assert_eq!(
            decode_payload(json!({"type": "delay"})),
            Err(PayloadError::UnknownType("delay".into()))
        );
        let invalid = decode_payload(json!({"type": "audio", "media": "not-a-list"})).unwrap_err();
        assert_eq!(invalid.kind(), ErrorKind::MalformedInput);
    }

    #[test]
    fn into_strict_reports_first_skip() {
        let decoded = Decoded {
            elements: vec![],
            skipped: vec![SkippedElement::new(
                0,
                Some(ElementId::new("x")),
                &PayloadError::UnknownType("delay".into()),
            )],
        };
        let err = decoded.into_strict().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SchemaViolation);
        assert_eq!(err.element(), Some(&ElementId::new("x")));
    }
}

//! YAML course documents: a top-level mapping `element_id -> element fields`.

use serde_yaml_ng::{Mapping, Value};

use super::{decode_payload, Decoded, SkippedElement};
use crate::element::{Element, ElementKind};
use crate::error::ContentError;
use crate::id::ElementId;

/// Decodes a course document mapping, skipping elements that fail to decode.
pub fn decode_yaml(doc: &Mapping) -> Decoded {
    let mut decoded = Decoded::default();

    for (position, (key, value)) in doc.iter().enumerate() {
        let Some(id) = scalar_key(key) else {
            decoded.skipped.push(SkippedElement::malformed(
                position,
                None,
                "element key is not a scalar",
            ));
            continue;
        };

        let payload = match serde_json::to_value(value) {
            Ok(payload) => payload,
            Err(e) => {
                decoded
                    .skipped
                    .push(SkippedElement::malformed(position, Some(id), e.to_string()));
                continue;
            }
        };

        match decode_payload(payload) {
            Ok(kind) => decoded.elements.push(Element { id, kind }),
            Err(e) => decoded
                .skipped
                .push(SkippedElement::new(position, Some(id), &e)),
        }
    }

    decoded
}

/// Encodes elements into a course document mapping in element order.
pub fn encode_yaml(elements: &[Element]) -> Result<Mapping, ContentError> {
    let mut doc = Mapping::with_capacity(elements.len());
    for element in elements {
        let value = encode_kind(&element.kind).map_err(|message| ContentError::MalformedInput {
            element: Some(element.id.clone()),
            message,
        })?;
        doc.insert(Value::String(element.id.0.clone()), value);
    }
    Ok(doc)
}

/// Parses YAML text into a course.
///
/// Unparseable text and documents that are not a mapping fail as a whole;
/// individual broken elements are skipped.
pub fn parse_yaml(text: &str) -> Result<Decoded, ContentError> {
    let doc: Value =
        serde_yaml_ng::from_str(text).map_err(|e| ContentError::malformed(e.to_string()))?;
    match doc {
        Value::Mapping(mapping) => Ok(decode_yaml(&mapping)),
        Value::Null => Ok(Decoded::default()),
        _ => Err(ContentError::malformed("course document is not a mapping")),
    }
}

/// Renders elements as YAML text.
pub fn to_yaml_string(elements: &[Element]) -> Result<String, ContentError> {
    let doc = encode_yaml(elements)?;
    serde_yaml_ng::to_string(&doc).map_err(|e| ContentError::malformed(e.to_string()))
}

fn encode_kind(kind: &ElementKind) -> Result<Value, String> {
    serde_yaml_ng::to_value(kind).map_err(|e| e.to_string())
}

fn scalar_key(key: &Value) -> Option<ElementId> {
    match key {
        Value::String(s) => Some(ElementId::new(s.clone())),
        Value::Number(n) => Some(ElementId::new(n.to_string())),
        Value::Bool(b) => Some(ElementId::new(b.to_string())),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::{ElementType, Test};
    use crate::error::ErrorKind;

    const COURSE: &str = r#"
intro:
  type: message
  text: Welcome!
  button: Start
q1:
  type: quiz
  text: Capital of France?
  answers:
    - text: Paris
      correct: yes
      feedback: Right
    - text: Rome
      feedback: No
later:
  type: delay
  text: not supported
final_test:
  type: test
  text: "{score} of {maxscore}"
  score:
    20: Excellent
    65: Good
    100: Try again
bye:
  type: end
"#;

    #[test]
    fn decodes_in_document_order_and_skips_unknown_types() {
        let decoded = parse_yaml(COURSE).unwrap();
        let ids: Vec<_> = decoded.elements.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["intro", "q1", "final_test", "bye"]);
        assert_eq!(decoded.skipped.len(), 1);
        assert_eq!(decoded.skipped[0].position, 2);
        assert_eq!(decoded.skipped[0].kind, ErrorKind::SchemaViolation);
    }

    #[test]
    fn integer_score_keys_decode() {
        let decoded = parse_yaml(COURSE).unwrap();
        let test = &decoded.elements[2];
        assert_eq!(test.element_type(), ElementType::Test);
        let ElementKind::Test(Test { score, .. }) = &test.kind else {
            panic!("expected test");
        };
        let keys: Vec<u32> = score.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec![20, 65, 100]);
    }

    #[test]
    fn encode_preserves_order_and_writes_bool_flags() {
        let decoded = parse_yaml(COURSE).unwrap();
        let text = to_yaml_string(&decoded.elements).unwrap();
        let intro = text.find("intro:").unwrap();
        let bye = text.find("bye:").unwrap();
        assert!(intro < bye);
        assert!(text.contains("correct: true"));
        assert!(!text.contains("correct: false"));

        let again = parse_yaml(&text).unwrap();
        assert!(again.is_clean());
        assert_eq!(again.elements, decoded.elements);
    }

    #[test]
    fn rejects_non_mapping_documents() {
        let err = parse_yaml("- just\n- a list\n").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedInput);
        assert!(parse_yaml("intro: [unclosed").is_err());
    }

    #[test]
    fn non_mapping_element_is_skipped() {
        let decoded = parse_yaml("a: just text\nb:\n  type: end\n").unwrap();
        assert_eq!(decoded.elements.len(), 1);
        assert_eq!(decoded.skipped[0].element, Some(ElementId::new("a")));
        assert_eq!(decoded.skipped[0].kind, ErrorKind::MalformedInput);
    }
}

//! Relational codec: canonical elements to and from element rows.
//!
//! Each element becomes one row holding its id, its type tag, its position in
//! the course, and the canonical payload wrapped in the legacy row envelope
//! `{"element_data": {...}}`. Rows written before the envelope existed hold
//! the bare payload; both shapes decode.

use std::collections::HashSet;

use serde_json::{Map, Value};

use coursegraph_core::codec::{decode_payload, encode_payload, Decoded, SkippedElement};
use coursegraph_core::element::Element;
use coursegraph_core::error::ContentError;
use coursegraph_core::id::{CourseKey, ElementId};

use crate::error::StorageError;
use crate::hash::ContentHash;
use crate::types::{ElementRow, RowWriteSet};

/// Key of the row envelope around the canonical payload.
pub const ENVELOPE_KEY: &str = "element_data";

/// Encodes a whole course into its replacement row set.
///
/// Fails on the first duplicate id; the row table cannot hold two elements
/// with the same id in one course.
pub fn encode_rows(key: &CourseKey, elements: &[Element]) -> Result<RowWriteSet, StorageError> {
    let mut seen = HashSet::with_capacity(elements.len());
    let mut rows = Vec::with_capacity(elements.len());

    for (position, element) in elements.iter().enumerate() {
        if !seen.insert(element.id.as_str()) {
            return Err(ContentError::DuplicateIdentifier {
                element: element.id.clone(),
            }
            .into());
        }
        rows.push(encode_row(position, element)?);
    }

    let hash = ContentHash::of_rows(&rows);
    Ok(RowWriteSet {
        key: key.clone(),
        rows,
        hash,
    })
}

fn encode_row(position: usize, element: &Element) -> Result<ElementRow, StorageError> {
    let payload = encode_payload(&element.kind)?;
    let mut envelope = Map::with_capacity(1);
    envelope.insert(ENVELOPE_KEY.to_string(), payload);

    Ok(ElementRow {
        element_id: element.id.0.clone(),
        element_type: element.element_type().as_str().to_string(),
        position: position as i64,
        json: serde_json::to_string(&Value::Object(envelope))?,
    })
}

/// Decodes rows into canonical elements ordered by `position`.
///
/// Row order on input does not matter. A row whose JSON is broken or whose
/// payload fails to decode is skipped with its position in sorted order.
pub fn decode_rows(mut rows: Vec<ElementRow>) -> Decoded {
    rows.sort_by_key(|row| row.position);
    let mut decoded = Decoded::default();

    for (position, row) in rows.into_iter().enumerate() {
        let id = ElementId::new(row.element_id);
        let value: Value = match serde_json::from_str(&row.json) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(element = %id, error = %e, "skipping row with unparseable json");
                decoded
                    .skipped
                    .push(SkippedElement::malformed(position, Some(id), e.to_string()));
                continue;
            }
        };

        match decode_payload(unwrap_envelope(value)) {
            Ok(kind) => {
                let ty = kind.element_type();
                if ty.as_str() != row.element_type {
                    tracing::warn!(
                        element = %id,
                        column = %row.element_type,
                        payload = %ty,
                        "element_type column disagrees with payload; using payload"
                    );
                }
                decoded.elements.push(Element { id, kind });
            }
            Err(e) => {
                tracing::warn!(element = %id, error = %e, "skipping undecodable row");
                decoded
                    .skipped
                    .push(SkippedElement::new(position, Some(id), &e));
            }
        }
    }

    decoded
}

fn unwrap_envelope(value: Value) -> Value {
    match value {
        Value::Object(mut map) if map.contains_key(ENVELOPE_KEY) => {
            map.remove(ENVELOPE_KEY).unwrap_or(Value::Null)
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coursegraph_core::element::{
        Answer, ElementKind, ElementType, End, JumpOption, Message, ParseMode, Quiz, ScoreTable,
        Test,
    };
    use coursegraph_core::error::ErrorKind;
    use coursegraph_core::id::AccountId;
    use proptest::prelude::*;

    fn key() -> CourseKey {
        CourseKey::new(AccountId(1), "intro")
    }

    fn sample() -> Vec<Element> {
        vec![
            Element::new(
                "m1",
                ElementKind::Message(Message {
                    text: "Привет".into(),
                    ..Default::default()
                }),
            ),
            Element::new("fin", ElementKind::End(End::default())),
        ]
    }

    #[test]
    fn test_rows_use_envelope_and_positions() {
        let write = encode_rows(&key(), &sample()).unwrap();
        assert_eq!(write.rows.len(), 2);
        assert_eq!(write.rows[0].element_type, "message");
        assert_eq!(write.rows[1].position, 1);
        let json: Value = serde_json::from_str(&write.rows[0].json).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"element_data": {"type": "message", "text": "Привет"}})
        );
        assert_eq!(write.hash, ContentHash::of_rows(&write.rows));
    }

    #[test]
    fn test_decode_ignores_row_order() {
        let mut rows = encode_rows(&key(), &sample()).unwrap().rows;
        rows.reverse();
        assert_eq!(decode_rows(rows).elements, sample());
    }

    #[test]
    fn test_bare_payload_rows_decode() {
        let rows = vec![ElementRow {
            element_id: "q".into(),
            element_type: "end".into(),
            position: 0,
            json: r#"{"type":"end","text":"bye"}"#.into(),
        }];
        let decoded = decode_rows(rows);
        assert!(decoded.is_clean());
        assert_eq!(decoded.elements[0].element_type(), ElementType::End);
    }

    #[test]
    fn test_payload_type_wins_over_column() {
        let rows = vec![ElementRow {
            element_id: "x".into(),
            element_type: "quiz".into(),
            position: 0,
            json: r#"{"element_data":{"type":"end"}}"#.into(),
        }];
        assert_eq!(decode_rows(rows).elements[0].element_type(), ElementType::End);
    }

    #[test]
    fn test_broken_rows_are_skipped() {
        let mut rows = encode_rows(&key(), &sample()).unwrap().rows;
        rows.push(ElementRow {
            element_id: "bad".into(),
            element_type: "message".into(),
            position: 5,
            json: "{not json".into(),
        });
        rows.push(ElementRow {
            element_id: "odd".into(),
            element_type: "delay".into(),
            position: 3,
            json: r#"{"element_data":{"type":"delay"}}"#.into(),
        });

        let decoded = decode_rows(rows);
        assert_eq!(decoded.elements, sample());
        assert_eq!(decoded.skipped.len(), 2);
        assert_eq!(decoded.skipped[0].position, 2);
        assert_eq!(decoded.skipped[0].kind, ErrorKind::SchemaViolation);
        assert_eq!(decoded.skipped[1].position, 3);
        assert_eq!(decoded.skipped[1].kind, ErrorKind::MalformedInput);
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let mut elements = sample();
        elements.push(Element::new("m1", ElementKind::End(End::default())));
        let err = encode_rows(&key(), &elements).unwrap_err();
        assert_eq!(err.content_kind(), Some(ErrorKind::DuplicateIdentifier));
    }

    #[test]
    fn test_empty_rows_decode_to_empty_course() {
        let decoded = decode_rows(Vec::new());
        assert!(decoded.elements.is_empty());
        assert!(decoded.is_clean());
    }

    fn text() -> impl Strategy<Value = String> {
        "[A-Za-z][A-Za-z0-9 ]{0,12}"
    }

    fn kind() -> impl Strategy<Value = ElementKind> {
        let option = (text(), prop::option::of("e[0-9]{1,2}")).prop_map(|(text, goto)| {
            JumpOption {
                text,
                goto: goto.map(ElementId::new),
                ..Default::default()
            }
        });
        let answer = (text(), any::<bool>()).prop_map(|(text, correct)| Answer {
            text,
            correct,
            feedback: String::new(),
        });
        prop_oneof![
            (
                text(),
                prop_oneof![Just(None), Just(Some(ParseMode::Html))],
                prop::collection::vec(option, 0..3)
            )
                .prop_map(|(text, parse_mode, options)| {
                    ElementKind::Message(Message {
                        text,
                        parse_mode,
                        options,
                        ..Default::default()
                    })
                }),
            (text(), prop::collection::vec(answer, 0..4)).prop_map(|(text, answers)| {
                ElementKind::Quiz(Quiz {
                    text,
                    answers,
                    ..Default::default()
                })
            }),
            (text(), prop::collection::btree_map(0u32..=100, text(), 0..3)).prop_map(
                |(text, score)| {
                    ElementKind::Test(Test {
                        text,
                        score: ScoreTable(score),
                        ..Default::default()
                    })
                }
            ),
            text().prop_map(|text| ElementKind::End(End {
                text,
                ..Default::default()
            })),
        ]
    }

    /// A course plus its row order after shuffling.
    fn course_and_order() -> impl Strategy<Value = (Vec<Element>, Vec<usize>)> {
        prop::collection::vec(kind(), 0..10).prop_flat_map(|kinds| {
            let elements: Vec<Element> = kinds
                .into_iter()
                .enumerate()
                .map(|(i, kind)| Element::new(format!("e{i}"), kind))
                .collect();
            let order = Just((0..elements.len()).collect::<Vec<_>>()).prop_shuffle();
            (Just(elements), order)
        })
    }

    proptest! {
        #[test]
        fn test_rows_round_trip_in_any_order((elements, order) in course_and_order()) {
            let write = encode_rows(&key(), &elements).unwrap();
            let mut rows: Vec<Option<ElementRow>> = write.rows.into_iter().map(Some).collect();
            let shuffled: Vec<ElementRow> = order.iter().filter_map(|&i| rows[i].take()).collect();
            prop_assert_eq!(ContentHash::of_rows(&shuffled), write.hash);

            let decoded = decode_rows(shuffled);
            prop_assert!(decoded.is_clean(), "{:?}", decoded.skipped);
            prop_assert_eq!(decoded.elements, elements);
        }
    }
}

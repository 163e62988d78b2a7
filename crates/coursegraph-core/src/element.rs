//! Canonical element schema.
//!
//! An [`Element`] is one typed node of a course's content graph. The payload
//! is a closed tagged union, [`ElementKind`], with one struct per element
//! type. Field types are strict: booleans are booleans, optional text is an
//! empty `String`, optional lists are empty `Vec`s. Serialization omits every
//! empty or default field, so the canonical JSON shape never carries stray
//! nulls and `decode(encode(x))` is field-for-field equal to `x`.
//!
//! Tolerance for historical encodings lives in [`crate::legacy`], never here.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::de::{self, Deserializer, MapAccess, Visitor};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::id::ElementId;

fn is_false(b: &bool) -> bool {
    !*b
}

// ---------------------------------------------------------------------------
// Type tags
// ---------------------------------------------------------------------------

/// The closed set of element type tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementType {
    Section,
    Message,
    Quiz,
    Question,
    MultiChoice,
    Input,
    Audio,
    Dialog,
    Revision,
    Jump,
    Test,
    End,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown element type '{0}'")]
pub struct UnknownElementType(pub String);

impl ElementType {
    pub const ALL: [ElementType; 12] = [
        ElementType::Section,
        ElementType::Message,
        ElementType::Quiz,
        ElementType::Question,
        ElementType::MultiChoice,
        ElementType::Input,
        ElementType::Audio,
        ElementType::Dialog,
        ElementType::Revision,
        ElementType::Jump,
        ElementType::Test,
        ElementType::End,
    ];

    /// Wire name, as used in the `type` field and the denormalized row column.
    pub fn as_str(self) -> &'static str {
        match self {
            ElementType::Section => "section",
            ElementType::Message => "message",
            ElementType::Quiz => "quiz",
            ElementType::Question => "question",
            ElementType::MultiChoice => "multi_choice",
            ElementType::Input => "input",
            ElementType::Audio => "audio",
            ElementType::Dialog => "dialog",
            ElementType::Revision => "revision",
            ElementType::Jump => "jump",
            ElementType::Test => "test",
            ElementType::End => "end",
        }
    }

    /// Element types whose answers are graded and can become revision
    /// material.
    pub fn is_graded(self) -> bool {
        matches!(
            self,
            ElementType::Quiz | ElementType::MultiChoice | ElementType::Input
        )
    }
}

impl FromStr for ElementType {
    type Err = UnknownElementType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ElementType::ALL
            .into_iter()
            .find(|ty| ty.as_str() == s)
            .ok_or_else(|| UnknownElementType(s.to_string()))
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Shared field types
// ---------------------------------------------------------------------------

/// Text formatting of an element. Absent means plain text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParseMode {
    #[serde(rename = "MARKDOWN")]
    Markdown,
    #[serde(rename = "HTML")]
    Html,
    /// HTML for the element text and for model replies (dialogs).
    #[serde(rename = "HTML!")]
    HtmlModel,
}

/// How free-text input is compared against the expected answer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputType {
    /// Trimmed, case-insensitive comparison.
    #[default]
    Text,
    /// Digits only; separators are ignored.
    Sequence,
}

impl InputType {
    fn is_default(&self) -> bool {
        *self == InputType::Text
    }
}

/// A learner-selectable button that may branch to another element.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JumpOption {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub text: String,
    /// Target element; `None` continues with the next element in order.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub goto: Option<ElementId>,
    /// Delay before continuing, e.g. `"1d"`.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub wait: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub wait_text: String,
}

/// A gradable answer (quiz, multi-choice).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Answer {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub text: String,
    #[serde(skip_serializing_if = "is_false")]
    pub correct: bool,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub feedback: String,
}

/// An open-ended answer with optional feedback (question).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuestionAnswer {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub text: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub feedback: String,
}

/// Mistake-percentage thresholds mapped to graded messages.
///
/// Keys are whole percentages. Decoding accepts integer keys (YAML) as well
/// as numeric string keys (JSON objects).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScoreTable(pub BTreeMap<u32, String>);

impl ScoreTable {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &str)> {
        self.0.iter().map(|(k, v)| (*k, v.as_str()))
    }
}

impl FromIterator<(u32, String)> for ScoreTable {
    fn from_iter<I: IntoIterator<Item = (u32, String)>>(iter: I) -> Self {
        ScoreTable(iter.into_iter().collect())
    }
}

impl Serialize for ScoreTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (threshold, message) in &self.0 {
            map.serialize_entry(threshold, message)?;
        }
        map.end()
    }
}

struct Threshold(u32);

struct ThresholdVisitor;

impl<'de> Visitor<'de> for ThresholdVisitor {
    type Value = Threshold;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a non-negative whole percentage")
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Threshold, E> {
        u32::try_from(v)
            .map(Threshold)
            .map_err(|_| E::invalid_value(de::Unexpected::Unsigned(v), &self))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Threshold, E> {
        u32::try_from(v)
            .map(Threshold)
            .map_err(|_| E::invalid_value(de::Unexpected::Signed(v), &self))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Threshold, E> {
        if v.fract() == 0.0 && (0.0..=u32::MAX as f64).contains(&v) {
            Ok(Threshold(v as u32))
        } else {
            Err(E::invalid_value(de::Unexpected::Float(v), &self))
        }
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Threshold, E> {
        let trimmed = v.trim();
        if let Ok(n) = trimmed.parse::<u32>() {
            return Ok(Threshold(n));
        }
        match trimmed.parse::<f64>() {
            Ok(f) => self.visit_f64(f),
            Err(_) => Err(E::invalid_value(de::Unexpected::Str(v), &self)),
        }
    }
}

impl<'de> Deserialize<'de> for Threshold {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(ThresholdVisitor)
    }
}

struct ScoreTableVisitor;

impl<'de> Visitor<'de> for ScoreTableVisitor {
    type Value = ScoreTable;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a mapping of percentage thresholds to messages")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<ScoreTable, A::Error> {
        let mut table = BTreeMap::new();
        while let Some((Threshold(key), message)) = access.next_entry::<Threshold, String>()? {
            table.insert(key, message);
        }
        Ok(ScoreTable(table))
    }

    fn visit_unit<E: de::Error>(self) -> Result<ScoreTable, E> {
        Ok(ScoreTable::default())
    }
}

impl<'de> Deserialize<'de> for ScoreTable {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(ScoreTableVisitor)
    }
}

// ---------------------------------------------------------------------------
// Payloads
// ---------------------------------------------------------------------------

/// Navigation marker for the table of contents.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Section {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub title: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Message {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parse_mode: Option<ParseMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link_preview: Option<bool>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub media: Vec<String>,
    /// Continue-button label; empty means the flow does not wait.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub button: String,
    /// Inline jump buttons.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<JumpOption>,
}

/// Single-select question with exactly one correct answer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Quiz {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parse_mode: Option<ParseMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link_preview: Option<bool>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub answers: Vec<Answer>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub media: Vec<String>,
}

/// Single-select question without a correct answer; feedback only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Question {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parse_mode: Option<ParseMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link_preview: Option<bool>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub answers: Vec<QuestionAnswer>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub media: Vec<String>,
}

/// Multi-select question with partial credit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MultiChoice {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parse_mode: Option<ParseMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link_preview: Option<bool>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub answers: Vec<Answer>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub feedback_correct: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub feedback_partial: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub feedback_incorrect: String,
}

/// Free-text answer, optionally graded against `correct_answer`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Input {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parse_mode: Option<ParseMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link_preview: Option<bool>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub correct_answer: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub feedback_correct: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub feedback_incorrect: String,
    #[serde(skip_serializing_if = "InputType::is_default")]
    pub input_type: InputType,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Audio {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parse_mode: Option<ParseMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link_preview: Option<bool>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub media: Vec<String>,
}

/// LLM-backed open conversation. Ends when the model signals a stop.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Dialog {
    /// Opening message shown to the learner.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub text: String,
    /// System prompt; may reference earlier elements as `{{element_id}}`.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parse_mode: Option<ParseMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link_preview: Option<bool>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub reasoning: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_messages: Option<u32>,
    #[serde(skip_serializing_if = "is_false")]
    pub auto_start: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub voice_response: bool,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub transcription_language: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub tts_voice: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub tts_model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tts_speed: Option<f64>,
}

/// Replays previously-missed elements whose id starts with `prefix`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Revision {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub text: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub prefix: String,
    /// Shown instead of the replay when nothing was missed.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub no_mistakes: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub button: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parse_mode: Option<ParseMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link_preview: Option<bool>,
}

/// Learner-chosen branch to one of several targets.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Jump {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub text: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<JumpOption>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub button: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parse_mode: Option<ParseMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link_preview: Option<bool>,
}

/// Aggregates the session's mistakes into a graded message.
///
/// `text` may contain `{score}` and `{maxscore}` placeholders.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Test {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub text: String,
    /// Restricts the tally to elements whose id starts with this prefix.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub prefix: String,
    #[serde(skip_serializing_if = "ScoreTable::is_empty")]
    pub score: ScoreTable,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub button: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parse_mode: Option<ParseMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link_preview: Option<bool>,
}

/// Terminal node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct End {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parse_mode: Option<ParseMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link_preview: Option<bool>,
}

// ---------------------------------------------------------------------------
// Element
// ---------------------------------------------------------------------------

/// The type-specific payload of an element.
///
/// Serializes internally tagged: `{"type": "quiz", "text": ..., ...}`.
/// Deserialization goes through [`ElementKind::deserialize_as`] once the tag
/// has been read, so that each surface decoder controls how the tag is found
/// and how failures are reported.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ElementKind {
    Section(Section),
    Message(Message),
    Quiz(Quiz),
    Question(Question),
    MultiChoice(MultiChoice),
    Input(Input),
    Audio(Audio),
    Dialog(Dialog),
    Revision(Revision),
    Jump(Jump),
    Test(Test),
    End(End),
}

impl ElementKind {
    pub fn element_type(&self) -> ElementType {
        match self {
            ElementKind::Section(_) => ElementType::Section,
            ElementKind::Message(_) => ElementType::Message,
            ElementKind::Quiz(_) => ElementType::Quiz,
            ElementKind::Question(_) => ElementType::Question,
            ElementKind::MultiChoice(_) => ElementType::MultiChoice,
            ElementKind::Input(_) => ElementType::Input,
            ElementKind::Audio(_) => ElementType::Audio,
            ElementKind::Dialog(_) => ElementType::Dialog,
            ElementKind::Revision(_) => ElementType::Revision,
            ElementKind::Jump(_) => ElementType::Jump,
            ElementKind::Test(_) => ElementType::Test,
            ElementKind::End(_) => ElementType::End,
        }
    }

    /// Deserializes the payload fields for a known type tag.
    ///
    /// Works with any self-describing deserializer; unknown fields (including
    /// the `type` tag itself) are ignored.
    pub fn deserialize_as<'de, D>(ty: ElementType, deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match ty {
            ElementType::Section => ElementKind::Section(Section::deserialize(deserializer)?),
            ElementType::Message => ElementKind::Message(Message::deserialize(deserializer)?),
            ElementType::Quiz => ElementKind::Quiz(Quiz::deserialize(deserializer)?),
            ElementType::Question => ElementKind::Question(Question::deserialize(deserializer)?),
            ElementType::MultiChoice => {
                ElementKind::MultiChoice(MultiChoice::deserialize(deserializer)?)
            }
            ElementType::Input => ElementKind::Input(Input::deserialize(deserializer)?),
            ElementType::Audio => ElementKind::Audio(Audio::deserialize(deserializer)?),
            ElementType::Dialog => ElementKind::Dialog(Dialog::deserialize(deserializer)?),
            ElementType::Revision => ElementKind::Revision(Revision::deserialize(deserializer)?),
            ElementType::Jump => ElementKind::Jump(Jump::deserialize(deserializer)?),
            ElementType::Test => ElementKind::Test(Test::deserialize(deserializer)?),
            ElementType::End => ElementKind::End(End::deserialize(deserializer)?),
        })
    }
}

/// A single node of the course content graph.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Element {
    pub id: ElementId,
    #[serde(flatten)]
    pub kind: ElementKind,
}

/// Whether a reference names an exact element or an id prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceKind {
    Goto,
    Prefix,
}

/// An outgoing control-flow reference held by an element field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    /// Field path within the element, e.g. `options[2].goto`.
    pub field: String,
    pub target: String,
    pub kind: ReferenceKind,
}

impl Element {
    pub fn new(id: impl Into<ElementId>, kind: ElementKind) -> Self {
        Element {
            id: id.into(),
            kind,
        }
    }

    pub fn element_type(&self) -> ElementType {
        self.kind.element_type()
    }

    /// Every outgoing reference, in field order.
    pub fn references(&self) -> Vec<Reference> {
        fn gotos(options: &[JumpOption]) -> Vec<Reference> {
            options
                .iter()
                .enumerate()
                .filter_map(|(i, option)| {
                    option.goto.as_ref().map(|target| Reference {
                        field: format!("options[{i}].goto"),
                        target: target.0.clone(),
                        kind: ReferenceKind::Goto,
                    })
                })
                .collect()
        }

        fn prefix(prefix: &str) -> Vec<Reference> {
            if prefix.is_empty() {
                return Vec::new();
            }
            vec![Reference {
                field: "prefix".to_string(),
                target: prefix.to_string(),
                kind: ReferenceKind::Prefix,
            }]
        }

        match &self.kind {
            ElementKind::Message(m) => gotos(&m.options),
            ElementKind::Jump(j) => gotos(&j.options),
            ElementKind::Revision(r) => prefix(&r.prefix),
            ElementKind::Test(t) => prefix(&t.prefix),
            _ => Vec::new(),
        }
    }

    /// True if this element ends the course.
    pub fn is_terminal(&self) -> bool {
        matches!(self.kind, ElementKind::End(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn element_type_round_trips_through_str() {
        for ty in ElementType::ALL {
            assert_eq!(ty.as_str().parse::<ElementType>().unwrap(), ty);
        }
        assert!("delay".parse::<ElementType>().is_err());
    }

    #[test]
    fn serialization_omits_empty_fields() {
        let element = Element::new(
            "m1",
            ElementKind::Message(Message {
                text: "Hello".into(),
                ..Default::default()
            }),
        );
        let value = serde_json::to_value(&element.kind).unwrap();
        assert_eq!(value, json!({"type": "message", "text": "Hello"}));
    }

    #[test]
    fn answer_flags_serialize_only_when_true() {
        let quiz = ElementKind::Quiz(Quiz {
            text: "Pick".into(),
            answers: vec![
                Answer {
                    text: "a".into(),
                    correct: true,
                    feedback: String::new(),
                },
                Answer {
                    text: "b".into(),
                    ..Default::default()
                },
            ],
            ..Default::default()
        });
        let value = serde_json::to_value(&quiz).unwrap();
        assert_eq!(
            value,
            json!({"type": "quiz", "text": "Pick", "answers": [{"text": "a", "correct": true}, {"text": "b"}]})
        );
    }

    #[test]
    fn deserialize_as_ignores_type_tag() {
        let value = json!({"type": "end", "text": "Bye"});
        let kind = ElementKind::deserialize_as(ElementType::End, value).unwrap();
        assert_eq!(
            kind,
            ElementKind::End(End {
                text: "Bye".into(),
                ..Default::default()
            })
        );
    }

    #[test]
    fn score_table_accepts_string_and_integer_keys() {
        let from_json: ScoreTable =
            serde_json::from_value(json!({"20": "great", "65": "ok"})).unwrap();
        let from_yaml: ScoreTable = serde_yaml_ng::from_str("20: great\n65: ok\n").unwrap();
        assert_eq!(from_json, from_yaml);
        assert_eq!(from_json.0.get(&65).map(String::as_str), Some("ok"));
        assert!(serde_json::from_value::<ScoreTable>(json!({"abc": "x"})).is_err());
    }

    #[test]
    fn references_in_field_order() {
        let element = Element::new(
            "j",
            ElementKind::Jump(Jump {
                options: vec![
                    JumpOption {
                        text: "Go".into(),
                        goto: Some(ElementId::new("a")),
                        ..Default::default()
                    },
                    JumpOption {
                        text: "Stay".into(),
                        ..Default::default()
                    },
                    JumpOption {
                        text: "Back".into(),
                        goto: Some(ElementId::new("b")),
                        ..Default::default()
                    },
                ],
                ..Default::default()
            }),
        );
        let refs = element.references();
        assert_eq!(refs.len(), 2);
        assert_eq!(refs[0].field, "options[0].goto");
        assert_eq!(refs[1].target, "b");
        assert_eq!(refs[1].field, "options[2].goto");
    }

    #[test]
    fn flattened_element_serializes_id_and_type() {
        let element = Element::new("s", ElementKind::Section(Section { title: "Intro".into() }));
        assert_eq!(
            serde_json::to_value(&element).unwrap(),
            json!({"id": "s", "type": "section", "title": "Intro"})
        );
    }
}

//! Editor blocks: the visual editor's mirror of canonical elements.
//!
//! A [`Block`] carries the same semantic fields as its element under
//! editor-friendly names (`question` for a quiz's `text`, `systemPrompt` for a
//! dialog's `prompt`, camelCase throughout). Blocks are never persisted; the
//! editor round-trips them through [`decode_blocks`] and [`encode_blocks`].
//!
//! Historical flag spellings (`"yes"`, `"YES"`, `"1"`, `true`) are accepted
//! on every boolean block field and always written back as plain booleans.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use super::{Decoded, PayloadError, SkippedElement};
use crate::element::{
    Answer, Audio, Dialog, Element, ElementKind, ElementType, End, Input, InputType, Jump,
    JumpOption, Message, MultiChoice, ParseMode, Question, QuestionAnswer, Quiz, Revision,
    ScoreTable, Section, Test,
};
use crate::id::ElementId;
use crate::legacy::LegacyBool;

/// Block fields the editor may send that have no canonical counterpart.
///
/// They are dropped on decode. `dialogTitle` is regenerated from the dialog
/// text on encode. Section blocks additionally lose `parseMode` and
/// `linkPreview`, since sections carry no text formatting.
pub const EDITOR_ONLY_FIELDS: &[&str] = &[
    "dialogTitle",
    "internalName",
    "description",
    "tags",
    "placeholder",
    "conversation",
];

const DIALOG_TITLE_CHARS: usize = 50;

/// Editor parse mode. `Text` is the editor's spelling of "no parse mode".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockParseMode {
    Text,
    Markdown,
    Html,
    HtmlModel,
}

impl BlockParseMode {
    pub fn as_str(self) -> &'static str {
        match self {
            BlockParseMode::Text => "TEXT",
            BlockParseMode::Markdown => "MARKDOWN",
            BlockParseMode::Html => "HTML",
            BlockParseMode::HtmlModel => "HTML!",
        }
    }

    fn to_canonical(self) -> Option<ParseMode> {
        match self {
            BlockParseMode::Text => None,
            BlockParseMode::Markdown => Some(ParseMode::Markdown),
            BlockParseMode::Html => Some(ParseMode::Html),
            BlockParseMode::HtmlModel => Some(ParseMode::HtmlModel),
        }
    }

    fn from_canonical(mode: Option<ParseMode>) -> Self {
        match mode {
            None => BlockParseMode::Text,
            Some(ParseMode::Markdown) => BlockParseMode::Markdown,
            Some(ParseMode::Html) => BlockParseMode::Html,
            Some(ParseMode::HtmlModel) => BlockParseMode::HtmlModel,
        }
    }
}

impl FromStr for BlockParseMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "" | "TEXT" => Ok(BlockParseMode::Text),
            "MARKDOWN" => Ok(BlockParseMode::Markdown),
            "HTML" => Ok(BlockParseMode::Html),
            "HTML!" => Ok(BlockParseMode::HtmlModel),
            other => Err(format!("unknown parse mode '{other}'")),
        }
    }
}

impl fmt::Display for BlockParseMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for BlockParseMode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for BlockParseMode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// Block shapes
// ---------------------------------------------------------------------------

/// One editor block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    pub id: String,
    #[serde(flatten)]
    pub body: BlockBody,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parse_mode: Option<BlockParseMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link_preview: Option<LegacyBool>,
}

/// Type-specific block fields, tagged by a PascalCase `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum BlockBody {
    Section(SectionBlock),
    Message(MessageBlock),
    Quiz(QuizBlock),
    Question(QuestionBlock),
    MultiChoice(MultiChoiceBlock),
    Input(InputBlock),
    Audio(AudioBlock),
    Dialog(DialogBlock),
    Revision(RevisionBlock),
    Jump(JumpBlock),
    Test(TestBlock),
    End(EndBlock),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BlockAnswer {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correct: Option<LegacyBool>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub feedback: String,
}

/// Inline button. The editor keeps `wait_text` in snake_case.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlockOption {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub goto: Option<String>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub wait: String,
    #[serde(alias = "waitText", skip_serializing_if = "String::is_empty")]
    pub wait_text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SectionBlock {
    pub title: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MessageBlock {
    pub text: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub media: Vec<String>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub button: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<BlockOption>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QuizBlock {
    pub question: String,
    pub answers: Vec<BlockAnswer>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub media: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QuestionBlock {
    pub question: String,
    pub answers: Vec<BlockAnswer>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub media: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MultiChoiceBlock {
    pub question: String,
    pub answers: Vec<BlockAnswer>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub feedback_correct: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub feedback_partial: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub feedback_incorrect: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InputBlock {
    pub prompt: String,
    pub normalization: InputType,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub correct_answer: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub feedback_correct: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub feedback_incorrect: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AudioBlock {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub text: String,
    pub media: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DialogBlock {
    pub text: String,
    /// Derived from `text`; ignored on decode.
    #[serde(skip_serializing_if = "String::is_empty", skip_deserializing)]
    pub dialog_title: String,
    pub system_prompt: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub reasoning: String,
    /// The editor's name for the message cap.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub transcription_language: String,
    pub voice_response: LegacyBool,
    pub auto_start: LegacyBool,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub tts_voice: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub tts_model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tts_speed: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RevisionBlock {
    pub text: String,
    pub prefix: String,
    pub no_mistakes: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub button: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct JumpBlock {
    pub text: String,
    pub options: Vec<BlockOption>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub button: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TestBlock {
    pub text: String,
    pub prefix: String,
    #[serde(skip_serializing_if = "ScoreTable::is_empty")]
    pub score: ScoreTable,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub button: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EndBlock {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub text: String,
}

/// The editor's PascalCase type name for an element type.
pub fn block_type_name(ty: ElementType) -> &'static str {
    match ty {
        ElementType::Section => "Section",
        ElementType::Message => "Message",
        ElementType::Quiz => "Quiz",
        ElementType::Question => "Question",
        ElementType::MultiChoice => "MultiChoice",
        ElementType::Input => "Input",
        ElementType::Audio => "Audio",
        ElementType::Dialog => "Dialog",
        ElementType::Revision => "Revision",
        ElementType::Jump => "Jump",
        ElementType::Test => "Test",
        ElementType::End => "End",
    }
}

// ---------------------------------------------------------------------------
// Encode
// ---------------------------------------------------------------------------

/// Encodes canonical elements as editor blocks, in order.
pub fn encode_blocks(elements: &[Element]) -> Vec<Block> {
    elements.iter().map(encode_block).collect()
}

fn encode_options(options: &[JumpOption]) -> Vec<BlockOption> {
    options
        .iter()
        .map(|o| BlockOption {
            text: o.text.clone(),
            goto: o.goto.as_ref().map(|g| g.0.clone()),
            wait: o.wait.clone(),
            wait_text: o.wait_text.clone(),
        })
        .collect()
}

fn encode_answers(answers: &[Answer]) -> Vec<BlockAnswer> {
    answers
        .iter()
        .map(|a| BlockAnswer {
            text: a.text.clone(),
            correct: Some(LegacyBool(a.correct)),
            feedback: a.feedback.clone(),
        })
        .collect()
}

fn dialog_title(text: &str) -> String {
    text.chars().take(DIALOG_TITLE_CHARS).collect()
}

/// Encodes a single element.
pub fn encode_block(element: &Element) -> Block {
    let (body, parse_mode, link_preview) = match &element.kind {
        ElementKind::Section(s) => (
            BlockBody::Section(SectionBlock {
                title: s.title.clone(),
            }),
            None,
            None,
        ),
        ElementKind::Message(m) => (
            BlockBody::Message(MessageBlock {
                text: m.text.clone(),
                media: m.media.clone(),
                button: m.button.clone(),
                options: encode_options(&m.options),
            }),
            Some(m.parse_mode),
            m.link_preview,
        ),
        ElementKind::Quiz(q) => (
            BlockBody::Quiz(QuizBlock {
                question: q.text.clone(),
                answers: encode_answers(&q.answers),
                media: q.media.clone(),
            }),
            Some(q.parse_mode),
            q.link_preview,
        ),
        ElementKind::Question(q) => (
            BlockBody::Question(QuestionBlock {
                question: q.text.clone(),
                answers: q
                    .answers
                    .iter()
                    .map(|a| BlockAnswer {
                        text: a.text.clone(),
                        correct: None,
                        feedback: a.feedback.clone(),
                    })
                    .collect(),
                media: q.media.clone(),
            }),
            Some(q.parse_mode),
            q.link_preview,
        ),
        ElementKind::MultiChoice(m) => (
            BlockBody::MultiChoice(MultiChoiceBlock {
                question: m.text.clone(),
                answers: encode_answers(&m.answers),
                feedback_correct: m.feedback_correct.clone(),
                feedback_partial: m.feedback_partial.clone(),
                feedback_incorrect: m.feedback_incorrect.clone(),
            }),
            Some(m.parse_mode),
            m.link_preview,
        ),
        ElementKind::Input(i) => (
            BlockBody::Input(InputBlock {
                prompt: i.text.clone(),
                normalization: i.input_type,
                correct_answer: i.correct_answer.clone(),
                feedback_correct: i.feedback_correct.clone(),
                feedback_incorrect: i.feedback_incorrect.clone(),
            }),
            Some(i.parse_mode),
            i.link_preview,
        ),
        ElementKind::Audio(a) => (
            BlockBody::Audio(AudioBlock {
                text: a.text.clone(),
                media: a.media.clone(),
            }),
            Some(a.parse_mode),
            a.link_preview,
        ),
        ElementKind::Dialog(d) => (
            BlockBody::Dialog(DialogBlock {
                text: d.text.clone(),
                dialog_title: dialog_title(&d.text),
                system_prompt: d.prompt.clone(),
                model: d.model.clone(),
                temperature: d.temperature,
                reasoning: d.reasoning.clone(),
                max_tokens: d.max_messages,
                transcription_language: d.transcription_language.clone(),
                voice_response: LegacyBool(d.voice_response),
                auto_start: LegacyBool(d.auto_start),
                tts_voice: d.tts_voice.clone(),
                tts_model: d.tts_model.clone(),
                tts_speed: d.tts_speed,
            }),
            Some(d.parse_mode),
            d.link_preview,
        ),
        ElementKind::Revision(r) => (
            BlockBody::Revision(RevisionBlock {
                text: r.text.clone(),
                prefix: r.prefix.clone(),
                no_mistakes: r.no_mistakes.clone(),
                button: r.button.clone(),
            }),
            Some(r.parse_mode),
            r.link_preview,
        ),
        ElementKind::Jump(j) => (
            BlockBody::Jump(JumpBlock {
                text: j.text.clone(),
                options: encode_options(&j.options),
                button: j.button.clone(),
            }),
            Some(j.parse_mode),
            j.link_preview,
        ),
        ElementKind::Test(t) => (
            BlockBody::Test(TestBlock {
                text: t.text.clone(),
                prefix: t.prefix.clone(),
                score: t.score.clone(),
                button: t.button.clone(),
            }),
            Some(t.parse_mode),
            t.link_preview,
        ),
        ElementKind::End(e) => (
            BlockBody::End(EndBlock {
                text: e.text.clone(),
            }),
            Some(e.parse_mode),
            e.link_preview,
        ),
    };

    Block {
        id: element.id.0.clone(),
        body,
        parse_mode: parse_mode.map(BlockParseMode::from_canonical),
        link_preview: link_preview.map(LegacyBool),
    }
}

// ---------------------------------------------------------------------------
// Decode
// ---------------------------------------------------------------------------

/// Decodes typed blocks. Typed blocks always map onto a canonical element.
pub fn decode_blocks(blocks: Vec<Block>) -> Decoded {
    Decoded {
        elements: blocks.into_iter().map(decode_block).collect(),
        skipped: Vec::new(),
    }
}

/// Decodes raw editor JSON, one block at a time.
///
/// A block with an unknown `type` or a malformed field is skipped and
/// recorded; the remaining blocks still decode.
pub fn decode_block_values(values: Vec<Value>) -> Decoded {
    let mut decoded = Decoded::default();

    for (position, value) in values.into_iter().enumerate() {
        let id = value
            .get("id")
            .and_then(Value::as_str)
            .map(ElementId::from);

        if let Err(e) = check_block_type(&value) {
            decoded.skipped.push(SkippedElement::new(position, id, &e));
            continue;
        }

        match serde_json::from_value::<Block>(value) {
            Ok(block) => decoded.elements.push(decode_block(block)),
            Err(e) => decoded
                .skipped
                .push(SkippedElement::malformed(position, id, e.to_string())),
        }
    }

    decoded
}

fn check_block_type(value: &Value) -> Result<(), PayloadError> {
    if !value.is_object() {
        return Err(PayloadError::NotAMapping);
    }
    match value.get("type") {
        None | Some(Value::Null) => Err(PayloadError::MissingType),
        Some(Value::String(name)) => {
            if ElementType::ALL
                .into_iter()
                .any(|ty| block_type_name(ty) == name)
            {
                Ok(())
            } else {
                Err(PayloadError::UnknownType(name.clone()))
            }
        }
        Some(other) => Err(PayloadError::UnknownType(other.to_string())),
    }
}

fn decode_options(options: Vec<BlockOption>) -> Vec<JumpOption> {
    options
        .into_iter()
        .map(|o| JumpOption {
            text: o.text,
            goto: o.goto.filter(|g| !g.is_empty()).map(ElementId::from),
            wait: o.wait,
            wait_text: o.wait_text,
        })
        .collect()
}

fn decode_answers(answers: Vec<BlockAnswer>) -> Vec<Answer> {
    answers
        .into_iter()
        .map(|a| Answer {
            text: a.text,
            correct: a.correct.map(bool::from).unwrap_or(false),
            feedback: a.feedback,
        })
        .collect()
}

/// Decodes a single typed block.
pub fn decode_block(block: Block) -> Element {
    let parse_mode = block.parse_mode.and_then(BlockParseMode::to_canonical);
    let link_preview = block.link_preview.map(bool::from);

    let kind = match block.body {
        BlockBody::Section(s) => ElementKind::Section(Section { title: s.title }),
        BlockBody::Message(m) => ElementKind::Message(Message {
            text: m.text,
            parse_mode,
            link_preview,
            media: m.media,
            button: m.button,
            options: decode_options(m.options),
        }),
        BlockBody::Quiz(q) => ElementKind::Quiz(Quiz {
            text: q.question,
            parse_mode,
            link_preview,
            answers: decode_answers(q.answers),
            media: q.media,
        }),
        BlockBody::Question(q) => ElementKind::Question(Question {
            text: q.question,
            parse_mode,
            link_preview,
            answers: q
                .answers
                .into_iter()
                .map(|a| QuestionAnswer {
                    text: a.text,
                    feedback: a.feedback,
                })
                .collect(),
            media: q.media,
        }),
        BlockBody::MultiChoice(m) => ElementKind::MultiChoice(MultiChoice {
            text: m.question,
            parse_mode,
            link_preview,
            answers: decode_answers(m.answers),
            feedback_correct: m.feedback_correct,
            feedback_partial: m.feedback_partial,
            feedback_incorrect: m.feedback_incorrect,
        }),
        BlockBody::Input(i) => ElementKind::Input(Input {
            text: i.prompt,
            parse_mode,
            link_preview,
            correct_answer: i.correct_answer,
            feedback_correct: i.feedback_correct,
            feedback_incorrect: i.feedback_incorrect,
            input_type: i.normalization,
        }),
        BlockBody::Audio(a) => ElementKind::Audio(Audio {
            text: a.text,
            parse_mode,
            link_preview,
            media: a.media,
        }),
        BlockBody::Dialog(d) => ElementKind::Dialog(Dialog {
            text: d.text,
            prompt: d.system_prompt,
            parse_mode,
            link_preview,
            model: d.model,
            temperature: d.temperature,
            reasoning: d.reasoning,
            max_messages: d.max_tokens,
            auto_start: d.auto_start.get(),
            voice_response: d.voice_response.get(),
            transcription_language: d.transcription_language,
            tts_voice: d.tts_voice,
            tts_model: d.tts_model,
            tts_speed: d.tts_speed,
        }),
        BlockBody::Revision(r) => ElementKind::Revision(Revision {
            text: r.text,
            prefix: r.prefix,
            no_mistakes: r.no_mistakes,
            button: r.button,
            parse_mode,
            link_preview,
        }),
        BlockBody::Jump(j) => ElementKind::Jump(Jump {
            text: j.text,
            options: decode_options(j.options),
            button: j.button,
            parse_mode,
            link_preview,
        }),
        BlockBody::Test(t) => ElementKind::Test(Test {
            text: t.text,
            prefix: t.prefix,
            score: t.score,
            button: t.button,
            parse_mode,
            link_preview,
        }),
        BlockBody::End(e) => ElementKind::End(End {
            text: e.text,
            parse_mode,
            link_preview,
        }),
    };

    Element {
        id: ElementId::new(block.id),
        kind,
    }
}

//! Per-type field rules.
//!
//! Each rule appends problems in field order, so reports stay deterministic.

use coursegraph_core::element::{Answer, Element, ElementKind, JumpOption};
use coursegraph_core::interval::parse_interval;

use super::diagnostics::Problem;

/// Accepted range for dialog sampling temperature.
pub const TEMPERATURE_RANGE: std::ops::RangeInclusive<f64> = 0.0..=2.0;

struct Rules<'a> {
    element: &'a Element,
    out: &'a mut Vec<Problem>,
}

impl Rules<'_> {
    fn missing(&mut self, field: impl Into<String>) {
        self.out.push(Problem::MissingField {
            element: self.element.id.clone(),
            field: field.into(),
        });
    }

    fn invalid(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.out.push(Problem::InvalidValue {
            element: self.element.id.clone(),
            field: field.into(),
            message: message.into(),
        });
    }

    fn require_text(&mut self, field: &str, value: &str) {
        if value.trim().is_empty() {
            self.missing(field);
        }
    }

    fn require_items<T>(&mut self, field: &str, items: &[T]) {
        if items.is_empty() {
            self.missing(field);
        }
    }

    fn answers(&mut self, answers: &[Answer]) {
        self.require_items("answers", answers);
        for (i, answer) in answers.iter().enumerate() {
            self.require_text(&format!("answers[{i}].text"), &answer.text);
        }
    }

    fn options(&mut self, options: &[JumpOption]) {
        for (i, option) in options.iter().enumerate() {
            self.require_text(&format!("options[{i}].text"), &option.text);
            if !option.wait.is_empty() {
                if let Err(e) = parse_interval(&option.wait) {
                    self.invalid(format!("options[{i}].wait"), e.to_string());
                }
            }
        }
    }
}

/// Checks the type-specific required fields and value constraints of one
/// element. References are checked separately.
pub fn check_fields(element: &Element, out: &mut Vec<Problem>) {
    let mut rules = Rules { element, out };

    if element.id.as_str().trim().is_empty() {
        rules.missing("id");
    }

    match &element.kind {
        ElementKind::Section(s) => rules.require_text("title", &s.title),
        ElementKind::Message(m) => {
            rules.require_text("text", &m.text);
            rules.options(&m.options);
        }
        ElementKind::Quiz(q) => {
            rules.require_text("text", &q.text);
            rules.answers(&q.answers);
            let correct = q.answers.iter().filter(|a| a.correct).count();
            if !q.answers.is_empty() && correct != 1 {
                rules.invalid(
                    "answers",
                    format!("a quiz needs exactly one correct answer, found {correct}"),
                );
            }
        }
        ElementKind::Question(q) => {
            rules.require_text("text", &q.text);
            rules.require_items("answers", &q.answers);
            for (i, answer) in q.answers.iter().enumerate() {
                rules.require_text(&format!("answers[{i}].text"), &answer.text);
            }
        }
        ElementKind::MultiChoice(m) => {
            rules.require_text("text", &m.text);
            rules.answers(&m.answers);
            if !m.answers.is_empty() && !m.answers.iter().any(|a| a.correct) {
                rules.invalid("answers", "a multi-choice needs at least one correct answer");
            }
            rules.require_text("feedback_correct", &m.feedback_correct);
            rules.require_text("feedback_partial", &m.feedback_partial);
            rules.require_text("feedback_incorrect", &m.feedback_incorrect);
        }
        ElementKind::Input(i) => rules.require_text("text", &i.text),
        ElementKind::Audio(a) => rules.require_items("media", &a.media),
        ElementKind::Dialog(d) => {
            rules.require_text("text", &d.text);
            rules.require_text("prompt", &d.prompt);
            if let Some(t) = d.temperature {
                if !TEMPERATURE_RANGE.contains(&t) {
                    rules.invalid("temperature", format!("{t} is outside 0..=2"));
                }
            }
            if let Some(speed) = d.tts_speed {
                if speed <= 0.0 || !speed.is_finite() {
                    rules.invalid("tts_speed", format!("{speed} must be positive"));
                }
            }
        }
        ElementKind::Revision(r) => {
            rules.require_text("text", &r.text);
            rules.require_text("prefix", &r.prefix);
            rules.require_text("no_mistakes", &r.no_mistakes);
        }
        ElementKind::Jump(j) => {
            rules.require_items("options", &j.options);
            rules.options(&j.options);
        }
        ElementKind::Test(t) => {
            if t.score.is_empty() {
                rules.missing("score");
            }
        }
        ElementKind::End(_) => {}
    }
}

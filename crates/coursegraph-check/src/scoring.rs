//! Grading rules for answerable elements and the session tally tests read.
//!
//! Every graded attempt scores between 0 and 1 out of a maximum of 1. A
//! [`SessionHistory`] records attempts in the order the learner made them;
//! tests and revisions derive everything they need from it.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use coursegraph_core::element::{Input, InputType, MultiChoice, Question, Quiz, ScoreTable, Test};
use coursegraph_core::id::ElementId;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScoringError {
    #[error("answer index {index} out of range for {len} answers")]
    AnswerOutOfRange { index: usize, len: usize },
}

// ---------------------------------------------------------------------------
// Attempts and history
// ---------------------------------------------------------------------------

/// One graded answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attempt {
    pub element: ElementId,
    pub score: f64,
    pub max_score: f64,
}

impl Attempt {
    pub fn scored(element: impl Into<ElementId>, score: f64, max_score: f64) -> Self {
        Attempt {
            element: element.into(),
            score,
            max_score,
        }
    }

    pub fn correct(element: impl Into<ElementId>) -> Self {
        Attempt::scored(element, 1.0, 1.0)
    }

    pub fn incorrect(element: impl Into<ElementId>) -> Self {
        Attempt::scored(element, 0.0, 1.0)
    }

    /// Anything short of full marks is a mistake.
    pub fn is_mistake(&self) -> bool {
        self.score < self.max_score
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "entry", rename_all = "snake_case")]
pub enum HistoryEntry {
    Answered(Attempt),
    /// A test element reported its result; later tallies start after it.
    TestReported { element: ElementId },
}

/// Ordered record of a learner's graded activity in one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionHistory {
    pub entries: Vec<HistoryEntry>,
}

impl SessionHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, attempt: Attempt) {
        self.entries.push(HistoryEntry::Answered(attempt));
    }

    pub fn record_test(&mut self, element: impl Into<ElementId>) {
        self.entries.push(HistoryEntry::TestReported {
            element: element.into(),
        });
    }

    pub fn attempts(&self) -> impl Iterator<Item = &Attempt> {
        self.entries.iter().filter_map(|e| match e {
            HistoryEntry::Answered(a) => Some(a),
            HistoryEntry::TestReported { .. } => None,
        })
    }

    /// Attempts made since the most recent test report, or since the start.
    pub fn since_last_test(&self) -> &[HistoryEntry] {
        let start = self
            .entries
            .iter()
            .rposition(|e| matches!(e, HistoryEntry::TestReported { .. }))
            .map_or(0, |i| i + 1);
        &self.entries[start..]
    }
}

impl FromIterator<Attempt> for SessionHistory {
    fn from_iter<I: IntoIterator<Item = Attempt>>(iter: I) -> Self {
        SessionHistory {
            entries: iter.into_iter().map(HistoryEntry::Answered).collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Single-answer grading
// ---------------------------------------------------------------------------

/// Result of answering a quiz.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuizOutcome {
    pub correct: bool,
    /// Feedback of the chosen answer, if it has any.
    pub feedback: Option<String>,
}

impl QuizOutcome {
    pub fn attempt(&self, element: &ElementId) -> Attempt {
        if self.correct {
            Attempt::correct(element.clone())
        } else {
            Attempt::incorrect(element.clone())
        }
    }
}

fn non_empty(s: &str) -> Option<String> {
    (!s.is_empty()).then(|| s.to_string())
}

pub fn grade_quiz(quiz: &Quiz, selected: usize) -> Result<QuizOutcome, ScoringError> {
    let answer = quiz
        .answers
        .get(selected)
        .ok_or(ScoringError::AnswerOutOfRange {
            index: selected,
            len: quiz.answers.len(),
        })?;
    Ok(QuizOutcome {
        correct: answer.correct,
        feedback: non_empty(&answer.feedback),
    })
}

/// Questions are never graded; the chosen answer only selects feedback.
pub fn grade_question(question: &Question, selected: usize) -> Result<Option<String>, ScoringError> {
    question
        .answers
        .get(selected)
        .map(|a| non_empty(&a.feedback))
        .ok_or(ScoringError::AnswerOutOfRange {
            index: selected,
            len: question.answers.len(),
        })
}

/// Result of a free-text answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InputOutcome {
    /// `None` when the element has no expected answer.
    pub correct: Option<bool>,
    pub feedback: Option<String>,
}

impl InputOutcome {
    pub fn attempt(&self, element: &ElementId) -> Option<Attempt> {
        self.correct.map(|correct| {
            if correct {
                Attempt::correct(element.clone())
            } else {
                Attempt::incorrect(element.clone())
            }
        })
    }
}

fn normalize_input(input_type: InputType, text: &str) -> String {
    match input_type {
        InputType::Text => text.trim().to_lowercase(),
        InputType::Sequence => text.chars().filter(char::is_ascii_digit).collect(),
    }
}

pub fn grade_input(input: &Input, answer: &str) -> InputOutcome {
    if input.correct_answer.is_empty() {
        return InputOutcome {
            correct: None,
            feedback: None,
        };
    }
    let correct = normalize_input(input.input_type, answer)
        == normalize_input(input.input_type, &input.correct_answer);
    let feedback = if correct {
        &input.feedback_correct
    } else {
        &input.feedback_incorrect
    };
    InputOutcome {
        correct: Some(correct),
        feedback: non_empty(feedback),
    }
}

// ---------------------------------------------------------------------------
// Multi-choice
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Correct,
    Partial,
    Incorrect,
}

/// Per-answer line shown for each selected answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnswerFeedback {
    pub index: usize,
    pub text: String,
    pub correct: bool,
    pub feedback: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MultiChoiceOutcome {
    /// In `0.0..=1.0`.
    pub score: f64,
    pub verdict: Verdict,
    /// The element-level feedback matching the verdict.
    pub feedback: String,
    /// One entry per selected answer, in answer order.
    pub answers: Vec<AnswerFeedback>,
}

impl MultiChoiceOutcome {
    pub fn attempt(&self, element: &ElementId) -> Attempt {
        Attempt::scored(element.clone(), self.score, 1.0)
    }
}

/// Grades a multi-choice selection.
///
/// `score = max(0, selected_correct - selected_incorrect) / total_correct`.
/// Selecting nothing scores 0 and selecting exactly the correct set scores 1.
/// Duplicate indices and selection order do not matter.
pub fn grade_multi_choice(
    mc: &MultiChoice,
    selected: &[usize],
) -> Result<MultiChoiceOutcome, ScoringError> {
    let len = mc.answers.len();
    let selected: BTreeSet<usize> = selected.iter().copied().collect();
    if let Some(&index) = selected.iter().find(|&&i| i >= len) {
        return Err(ScoringError::AnswerOutOfRange { index, len });
    }

    let total_correct = mc.answers.iter().filter(|a| a.correct).count();
    let selected_correct = selected.iter().filter(|&&i| mc.answers[i].correct).count();
    let selected_incorrect = selected.len() - selected_correct;

    let score = if total_correct == 0 {
        0.0
    } else {
        selected_correct.saturating_sub(selected_incorrect) as f64 / total_correct as f64
    };

    let (verdict, feedback) = if score >= 1.0 {
        (Verdict::Correct, &mc.feedback_correct)
    } else if score > 0.0 {
        (Verdict::Partial, &mc.feedback_partial)
    } else {
        (Verdict::Incorrect, &mc.feedback_incorrect)
    };

    let answers = selected
        .iter()
        .map(|&i| {
            let answer = &mc.answers[i];
            AnswerFeedback {
                index: i,
                text: answer.text.clone(),
                correct: answer.correct,
                feedback: non_empty(&answer.feedback),
            }
        })
        .collect();

    Ok(MultiChoiceOutcome {
        score,
        verdict,
        feedback: feedback.clone(),
        answers,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

/// Accumulated score since the last test.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct MistakeTally {
    pub score: f64,
    pub max_score: f64,
    pub mistakes: usize,
}

impl MistakeTally {
    /// Sums attempts after the last test report whose element id starts
    /// with `prefix` (an empty prefix matches everything).
    pub fn since_last_test(history: &SessionHistory, prefix: &str) -> Self {
        history
            .since_last_test()
            .iter()
            .filter_map(|e| match e {
                HistoryEntry::Answered(a) if a.element.has_prefix(prefix) => Some(a),
                _ => None,
            })
            .fold(MistakeTally::default(), |mut tally, a| {
                tally.score += a.score;
                tally.max_score += a.max_score;
                if a.is_mistake() {
                    tally.mistakes += 1;
                }
                tally
            })
    }

    /// Percentage of the maximum score that was lost; 0 when nothing was
    /// graded.
    pub fn mistake_percent(&self) -> f64 {
        if self.max_score <= 0.0 {
            0.0
        } else {
            (self.max_score - self.score) * 100.0 / self.max_score
        }
    }
}

/// How a mistake percentage selects a message from a score table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdRule {
    /// Smallest threshold at or above the observed percentage.
    #[default]
    SmallestAtLeast,
    /// Largest threshold at or below the observed percentage.
    LargestAtMost,
}

impl ThresholdRule {
    pub fn select(self, table: &ScoreTable, percent: f64) -> Option<u32> {
        match self {
            ThresholdRule::SmallestAtLeast => table
                .iter()
                .map(|(k, _)| k)
                .find(|&k| percent <= f64::from(k)),
            ThresholdRule::LargestAtMost => table
                .iter()
                .map(|(k, _)| k)
                .filter(|&k| f64::from(k) <= percent)
                .last(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TestOutcome {
    pub score: f64,
    pub max_score: f64,
    pub mistake_percent: f64,
    /// Test text with `{score}` and `{maxscore}` substituted.
    pub text: String,
    /// Threshold that matched, if any.
    pub threshold: Option<u32>,
    pub message: Option<String>,
}

impl TestOutcome {
    /// Text followed by the graded message on its own line.
    pub fn render(&self) -> String {
        match &self.message {
            Some(message) => format!("{}\n{}", self.text, message),
            None => self.text.clone(),
        }
    }
}

/// Whole numbers print without a fractional part.
fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

pub fn grade_test(test: &Test, tally: &MistakeTally, rule: ThresholdRule) -> TestOutcome {
    let percent = tally.mistake_percent();
    let threshold = rule.select(&test.score, percent);
    let text = test
        .text
        .replace("{score}", &format_number(tally.score))
        .replace("{maxscore}", &format_number(tally.max_score));

    TestOutcome {
        score: tally.score,
        max_score: tally.max_score,
        mistake_percent: percent,
        text,
        threshold,
        message: threshold.and_then(|k| test.score.0.get(&k).cloned()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coursegraph_core::element::Answer;
    use proptest::prelude::*;

    fn answer(text: &str, correct: bool) -> Answer {
        Answer {
            text: text.into(),
            correct,
            feedback: String::new(),
        }
    }

    fn multi() -> MultiChoice {
        MultiChoice {
            text: "Pick the primes".into(),
            answers: vec![answer("2", true), answer("4", false), answer("5", true)],
            feedback_correct: "All right".into(),
            feedback_partial: "Almost".into(),
            feedback_incorrect: "No".into(),
            ..Default::default()
        }
    }

    #[test]
    fn multi_choice_exact_set_scores_one() {
        let outcome = grade_multi_choice(&multi(), &[0, 2]).unwrap();
        assert_eq!(outcome.score, 1.0);
        assert_eq!(outcome.verdict, Verdict::Correct);
        assert_eq!(outcome.feedback, "All right");
    }

    #[test]
    fn multi_choice_partial_and_incorrect() {
        let partial = grade_multi_choice(&multi(), &[0]).unwrap();
        assert!(partial.score > 0.0 && partial.score < 1.0);
        assert_eq!(partial.feedback, "Almost");

        let wrong = grade_multi_choice(&multi(), &[1]).unwrap();
        assert_eq!(wrong.score, 0.0);
        assert_eq!(wrong.feedback, "No");

        let none = grade_multi_choice(&multi(), &[]).unwrap();
        assert_eq!(none.score, 0.0);
        assert_eq!(none.verdict, Verdict::Incorrect);

        let everything = grade_multi_choice(&multi(), &[0, 1, 2]).unwrap();
        assert_eq!(everything.score, 0.5);
    }

    #[test]
    fn multi_choice_ignores_order_and_duplicates() {
        let a = grade_multi_choice(&multi(), &[2, 0]).unwrap();
        let b = grade_multi_choice(&multi(), &[0, 2, 2]).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.answers.iter().map(|f| f.index).collect::<Vec<_>>(), vec![0, 2]);
        assert!(grade_multi_choice(&multi(), &[3]).is_err());
    }

    fn multi_from(flags: &[bool]) -> MultiChoice {
        MultiChoice {
            answers: flags
                .iter()
                .enumerate()
                .map(|(i, &correct)| answer(&i.to_string(), correct))
                .collect(),
            ..multi()
        }
    }

    /// Answer flags with at least one correct answer, a selection, and the
    /// same selection shuffled.
    fn flags_and_selection() -> impl Strategy<Value = (Vec<bool>, Vec<usize>, Vec<usize>)> {
        prop::collection::vec(any::<bool>(), 1..8)
            .prop_filter("needs a correct answer", |flags| flags.iter().any(|c| *c))
            .prop_flat_map(|flags| {
                let len = flags.len();
                (Just(flags), prop::collection::vec(0..len, 0..=len))
            })
            .prop_flat_map(|(flags, selection)| {
                let shuffled = Just(selection.clone()).prop_shuffle();
                (Just(flags), Just(selection), shuffled)
            })
    }

    proptest! {
        #[test]
        fn multi_choice_score_is_bounded_and_order_free(
            (flags, selection, shuffled) in flags_and_selection()
        ) {
            let mc = multi_from(&flags);
            let graded = grade_multi_choice(&mc, &selection).unwrap();
            prop_assert_eq!(&graded, &grade_multi_choice(&mc, &shuffled).unwrap());
            prop_assert!((0.0..=1.0).contains(&graded.score));

            let exact: Vec<usize> = flags
                .iter()
                .enumerate()
                .filter(|(_, c)| **c)
                .map(|(i, _)| i)
                .collect();
            prop_assert_eq!(grade_multi_choice(&mc, &exact).unwrap().score, 1.0);
            prop_assert_eq!(grade_multi_choice(&mc, &[]).unwrap().score, 0.0);
        }
    }

    #[test]
    fn quiz_uses_answer_feedback() {
        let quiz = Quiz {
            answers: vec![
                Answer {
                    text: "Paris".into(),
                    correct: true,
                    feedback: "Yes!".into(),
                },
                answer("Rome", false),
            ],
            ..Default::default()
        };
        let right = grade_quiz(&quiz, 0).unwrap();
        assert!(right.correct);
        assert_eq!(right.feedback.as_deref(), Some("Yes!"));
        let wrong = grade_quiz(&quiz, 1).unwrap();
        assert!(!wrong.correct);
        assert_eq!(wrong.feedback, None);
        assert_eq!(
            grade_quiz(&quiz, 5),
            Err(ScoringError::AnswerOutOfRange { index: 5, len: 2 })
        );
    }

    #[test]
    fn input_comparison_modes() {
        let text = Input {
            correct_answer: "Paris".into(),
            feedback_correct: "Right".into(),
            ..Default::default()
        };
        let outcome = grade_input(&text, "  paris ");
        assert_eq!(outcome.correct, Some(true));
        assert_eq!(outcome.feedback.as_deref(), Some("Right"));
        assert_eq!(grade_input(&text, "London").correct, Some(false));

        let sequence = Input {
            correct_answer: "1,2,3".into(),
            input_type: InputType::Sequence,
            ..Default::default()
        };
        assert_eq!(grade_input(&sequence, "1 2 3").correct, Some(true));
        assert_eq!(grade_input(&sequence, "1, 3, 2").correct, Some(false));

        let ungraded = grade_input(&Input::default(), "anything");
        assert_eq!(ungraded.correct, None);
        assert!(ungraded.attempt(&ElementId::new("i")).is_none());
    }

    fn test_element() -> Test {
        Test {
            text: "You scored {score} of {maxscore}".into(),
            score: ScoreTable(
                [(20, "Excellent"), (65, "Good"), (100, "Try again")]
                    .into_iter()
                    .map(|(k, v)| (k, v.to_string()))
                    .collect(),
            ),
            ..Default::default()
        }
    }

    #[test]
    fn tally_resets_after_test_and_honors_prefix() {
        let mut history = SessionHistory::new();
        history.record(Attempt::incorrect("a1"));
        history.record_test("t1");
        history.record(Attempt::correct("g1_a"));
        history.record(Attempt::incorrect("g1_b"));
        history.record(Attempt::scored("g2_c", 0.5, 1.0));

        let all = MistakeTally::since_last_test(&history, "");
        assert_eq!(all.score, 1.5);
        assert_eq!(all.max_score, 3.0);
        assert_eq!(all.mistakes, 2);

        let g1 = MistakeTally::since_last_test(&history, "g1_");
        assert_eq!(g1.mistake_percent(), 50.0);
    }

    #[test]
    fn test_threshold_rules() {
        let test = test_element();
        let tally = MistakeTally {
            score: 3.0,
            max_score: 4.0,
            mistakes: 1,
        };
        let outcome = grade_test(&test, &tally, ThresholdRule::SmallestAtLeast);
        assert_eq!(outcome.mistake_percent, 25.0);
        assert_eq!(outcome.threshold, Some(65));
        assert_eq!(outcome.text, "You scored 3 of 4");
        assert_eq!(outcome.render(), "You scored 3 of 4\nGood");

        let outcome = grade_test(&test, &tally, ThresholdRule::LargestAtMost);
        assert_eq!(outcome.threshold, Some(20));

        // Exactly on a threshold selects it under both rules.
        let on = MistakeTally {
            score: 4.0,
            max_score: 5.0,
            mistakes: 1,
        };
        assert_eq!(
            grade_test(&test, &on, ThresholdRule::SmallestAtLeast).threshold,
            Some(20)
        );
        assert_eq!(
            grade_test(&test, &on, ThresholdRule::LargestAtMost).threshold,
            Some(20)
        );
    }

    #[test]
    fn test_with_nothing_graded() {
        let outcome = grade_test(
            &test_element(),
            &MistakeTally::default(),
            ThresholdRule::default(),
        );
        assert_eq!(outcome.mistake_percent, 0.0);
        assert_eq!(outcome.threshold, Some(20));
        assert_eq!(outcome.text, "You scored 0 of 0");
    }
}

//! Static checks and runtime semantics for course content.
//!
//! - [`validate`]: schema and reference validation of an element list.
//! - [`flow`]: the control-flow graph, reachability, and dangling targets.
//! - [`scoring`]: grading rules for quiz, question, input, multi-choice, and
//!   test elements.
//! - [`revision`]: revision chains assembled from a session's mistakes.

pub mod flow;
pub mod revision;
pub mod scoring;
pub mod validate;

pub use flow::{check_flow, FlowEdge, FlowFinding, FlowGraph, FlowReport, Severity};
pub use revision::{plan_revision, revision_chain, RevisionChain, RevisionPlan};
pub use scoring::{
    grade_input, grade_multi_choice, grade_question, grade_quiz, grade_test, Attempt,
    HistoryEntry, MistakeTally, SessionHistory, ThresholdRule,
};
pub use validate::{
    validate, validate_course, validate_decoded, CheckMode, Problem, ReferenceRole,
    ValidationReport,
};

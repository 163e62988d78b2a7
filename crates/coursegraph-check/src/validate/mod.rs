//! Static validation of a course's element list.
//!
//! Provides three entry points:
//! - [`validate`]: checks a canonical element list.
//! - [`validate_decoded`]: also reports elements a surface decoder skipped,
//!   at their source position.
//! - [`validate_course`]: additionally resolves the course entry point.
//!
//! All are pure: the same input always yields the same problems, in element
//! order, then field order within an element. Problems are reported, never
//! acted on; [`ValidationReport::blocks`] applies a [`CheckMode`] policy.

pub mod diagnostics;
pub mod rules;

pub use diagnostics::{CheckMode, Problem, ReferenceRole};

use std::collections::{HashMap, HashSet};

use coursegraph_core::codec::Decoded;
use coursegraph_core::element::{Element, ReferenceKind};
use coursegraph_core::error::ErrorKind;
use coursegraph_core::id::ElementId;
use serde::Serialize;

/// Ordered list of problems found in a course.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ValidationReport {
    pub problems: Vec<Problem>,
}

impl ValidationReport {
    pub fn is_clean(&self) -> bool {
        self.problems.is_empty()
    }

    /// Problems that stop a save under `mode`.
    pub fn blocking(&self, mode: CheckMode) -> impl Iterator<Item = &Problem> {
        self.problems.iter().filter(move |p| p.blocks(mode))
    }

    pub fn blocks(&self, mode: CheckMode) -> bool {
        self.blocking(mode).next().is_some()
    }

    pub fn count(&self, kind: ErrorKind) -> usize {
        self.problems.iter().filter(|p| p.kind() == kind).count()
    }
}

/// Validates a canonical element list.
pub fn validate(elements: &[Element]) -> ValidationReport {
    let decoded = Decoded {
        elements: elements.to_vec(),
        skipped: Vec::new(),
    };
    validate_course(&decoded, None)
}

/// Validates decoder output, including skipped elements.
pub fn validate_decoded(decoded: &Decoded) -> ValidationReport {
    validate_course(decoded, None)
}

/// Validates decoder output and the course entry point.
pub fn validate_course(decoded: &Decoded, entry: Option<&ElementId>) -> ValidationReport {
    let mut problems = Vec::new();
    let ids = known_ids(decoded);

    // Every id present in the source, decoded or not, counts as a target.
    let mut known: HashMap<&str, usize> = HashMap::new();
    let mut elements = decoded.elements.iter();
    let mut skipped = decoded.skipped.iter().peekable();

    for position in 0..decoded.input_len() {
        if let Some(skip) = skipped.next_if(|s| s.position == position) {
            let problem = match skip.kind {
                ErrorKind::SchemaViolation => Problem::UnknownType {
                    element: skip.element.clone(),
                    position,
                    message: skip.message.clone(),
                },
                _ => Problem::Malformed {
                    element: skip.element.clone(),
                    position,
                    message: skip.message.clone(),
                },
            };
            problems.push(problem);
            if let Some(id) = &skip.element {
                known.entry(id.as_str()).or_insert(position);
            }
            continue;
        }

        let Some(element) = elements.next() else {
            break;
        };

        if let Some(first) = known.get(element.id.as_str()) {
            problems.push(Problem::DuplicateId {
                element: element.id.clone(),
                first_position: *first,
            });
        } else {
            known.insert(element.id.as_str(), position);
        }
        rules::check_fields(element, &mut problems);
        check_references(element, &ids, &mut problems);
    }

    if let Some(entry) = entry {
        if !ids.contains(entry.as_str()) {
            problems.push(Problem::UnresolvedReference {
                element: entry.clone(),
                field: "element".to_string(),
                target: entry.0.clone(),
                reference: ReferenceRole::Entry,
            });
        }
    }

    ValidationReport { problems }
}

fn known_ids(decoded: &Decoded) -> HashSet<&str> {
    decoded
        .elements
        .iter()
        .map(|e| e.id.as_str())
        .chain(
            decoded
                .skipped
                .iter()
                .filter_map(|s| s.element.as_ref().map(ElementId::as_str)),
        )
        .collect()
}

fn check_references(element: &Element, ids: &HashSet<&str>, out: &mut Vec<Problem>) {
    for reference in element.references() {
        let (resolved, role) = match reference.kind {
            ReferenceKind::Goto => (ids.contains(reference.target.as_str()), ReferenceRole::Goto),
            // A prefix must match some element other than its owner.
            ReferenceKind::Prefix => (
                ids.iter()
                    .any(|id| *id != element.id.as_str() && id.starts_with(&reference.target)),
                ReferenceRole::Prefix,
            ),
        };
        if !resolved {
            out.push(Problem::UnresolvedReference {
                element: element.id.clone(),
                field: reference.field,
                target: reference.target,
                reference: role,
            });
        }
    }
}

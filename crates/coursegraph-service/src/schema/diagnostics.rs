//! Diagnostic types for error and warning reporting.
//!
//! Validation problems and flow findings are flattened into one shape with a
//! machine-readable code, so editor clients can render both without knowing
//! the checker's internal enums. Diagnostics describe the problem only.

use coursegraph_check::{FlowFinding, Problem, Severity};
use coursegraph_core::error::ErrorKind;
use coursegraph_core::id::ElementId;
use serde::Serialize;

/// A structured diagnostic: blocking in errors, informational in warnings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    /// Machine-readable code (e.g., "UNRESOLVED_REFERENCE", "UNREACHABLE").
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<ErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub element: Option<ElementId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl From<&Problem> for Diagnostic {
    fn from(problem: &Problem) -> Self {
        let (code, field) = match problem {
            Problem::DuplicateId { .. } => ("DUPLICATE_ID", None),
            Problem::UnknownType { .. } => ("UNKNOWN_TYPE", None),
            Problem::Malformed { .. } => ("MALFORMED", None),
            Problem::MissingField { field, .. } => ("MISSING_FIELD", Some(field.clone())),
            Problem::InvalidValue { field, .. } => ("INVALID_VALUE", Some(field.clone())),
            Problem::UnresolvedReference { field, .. } => {
                ("UNRESOLVED_REFERENCE", Some(field.clone()))
            }
        };
        Diagnostic {
            code: code.to_string(),
            message: problem.to_string(),
            kind: Some(problem.kind()),
            element: problem.element().cloned(),
            field,
        }
    }
}

impl From<&FlowFinding> for Diagnostic {
    fn from(finding: &FlowFinding) -> Self {
        let (code, message, element, field, kind) = match finding {
            FlowFinding::DanglingEntry { target } => (
                "DANGLING_ENTRY",
                format!("course entry point '{target}' does not exist"),
                None,
                None,
                Some(ErrorKind::UnresolvedReference),
            ),
            FlowFinding::DanglingGoto {
                element,
                field,
                target,
            } => (
                "DANGLING_GOTO",
                format!("'{element}' jumps to unknown element '{target}'"),
                Some(element.clone()),
                Some(field.clone()),
                Some(ErrorKind::UnresolvedReference),
            ),
            FlowFinding::EmptyPrefix { element, prefix } => (
                "EMPTY_PREFIX",
                format!("prefix '{prefix}' of '{element}' matches no elements"),
                Some(element.clone()),
                Some("prefix".to_string()),
                None,
            ),
            FlowFinding::Unreachable { element } => (
                "UNREACHABLE",
                format!("'{element}' cannot be reached from the entry point"),
                Some(element.clone()),
                None,
                None,
            ),
        };
        Diagnostic {
            code: code.to_string(),
            message,
            kind,
            element,
            field,
        }
    }
}

/// Splits problems and findings into blocking errors and warnings.
pub(crate) fn partition<'a>(
    problems: impl IntoIterator<Item = (&'a Problem, bool)>,
    findings: &[FlowFinding],
) -> (Vec<Diagnostic>, Vec<Diagnostic>) {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();
    for (problem, blocking) in problems {
        if blocking {
            errors.push(Diagnostic::from(problem));
        } else {
            warnings.push(Diagnostic::from(problem));
        }
    }
    for finding in findings {
        // Error-level findings repeat validator problems; only the
        // informational ones add anything.
        if finding.severity() == Severity::Info {
            warnings.push(Diagnostic::from(finding));
        }
    }
    (errors, warnings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use coursegraph_check::ReferenceRole;

    #[test]
    fn problem_diagnostic_carries_field_and_kind() {
        let problem = Problem::UnresolvedReference {
            element: ElementId::new("m1"),
            field: "options[0].goto".into(),
            target: "nowhere".into(),
            reference: ReferenceRole::Goto,
        };
        let diag = Diagnostic::from(&problem);
        assert_eq!(diag.code, "UNRESOLVED_REFERENCE");
        assert_eq!(diag.field.as_deref(), Some("options[0].goto"));
        assert_eq!(diag.kind, Some(ErrorKind::UnresolvedReference));
        assert_eq!(diag.element, Some(ElementId::new("m1")));
    }

    #[test]
    fn only_info_findings_become_warnings() {
        let findings = vec![
            FlowFinding::DanglingEntry {
                target: ElementId::new("x"),
            },
            FlowFinding::Unreachable {
                element: ElementId::new("orphan"),
            },
        ];
        let (errors, warnings) = partition(std::iter::empty(), &findings);
        assert!(errors.is_empty());
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].code, "UNREACHABLE");
    }
}

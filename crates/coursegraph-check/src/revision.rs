//! Revision chains: replaying previously-missed elements.

use std::collections::HashSet;

use serde::Serialize;

use coursegraph_core::element::Revision;
use coursegraph_core::id::ElementId;

use crate::scoring::SessionHistory;

/// Missed elements under a prefix, in the order they were first missed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RevisionChain {
    pub elements: Vec<ElementId>,
    pub has_mistakes: bool,
    pub mistakes_count: usize,
}

/// Collects every element whose id starts with `prefix` and that was
/// answered with a mistake at least once. Each element appears once.
pub fn revision_chain(history: &SessionHistory, prefix: &str) -> RevisionChain {
    let mut seen = HashSet::new();
    let elements: Vec<ElementId> = history
        .attempts()
        .filter(|a| a.is_mistake() && a.element.has_prefix(prefix))
        .filter(|a| seen.insert(a.element.clone()))
        .map(|a| a.element.clone())
        .collect();

    RevisionChain {
        has_mistakes: !elements.is_empty(),
        mistakes_count: elements.len(),
        elements,
    }
}

/// What a revision element does when the learner reaches it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "plan", rename_all = "snake_case")]
pub enum RevisionPlan {
    /// Nothing to revise; show the `no_mistakes` text and move on.
    NoMistakes { text: String },
    /// Show the revision text, then replay the chain.
    Replay { text: String, chain: RevisionChain },
}

pub fn plan_revision(revision: &Revision, history: &SessionHistory) -> RevisionPlan {
    let chain = revision_chain(history, &revision.prefix);
    if chain.has_mistakes {
        RevisionPlan::Replay {
            text: revision.text.clone(),
            chain,
        }
    } else {
        RevisionPlan::NoMistakes {
            text: revision.no_mistakes.clone(),
        }
    }
}

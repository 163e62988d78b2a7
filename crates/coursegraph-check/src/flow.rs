//! Control-flow graph of a course and the checks run over it.
//!
//! # Architecture
//!
//! [`FlowGraph`] holds one node per element and three kinds of edge:
//!
//! - [`FlowEdge::Next`]: linear fall-through to the following element. There
//!   is none after an `end`, nor after an element whose every option carries
//!   a `goto` (the learner must pick a branch).
//! - [`FlowEdge::Goto`]: a message or jump option.
//! - [`FlowEdge::Revision`]: a revision element to each element its prefix
//!   matches, since those elements may be replayed from there.
//!
//! Cycles are expected (retry loops) and never reported. Only references
//! that resolve to nothing are defects; unreachable elements and unmatched
//! prefixes are informational.

use std::collections::HashMap;

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::{Bfs, EdgeRef};
use petgraph::Direction;
use serde::Serialize;

use coursegraph_core::element::{Element, ElementKind, JumpOption};
use coursegraph_core::id::ElementId;

/// Edge kinds of the course flow graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "edge", rename_all = "snake_case")]
pub enum FlowEdge {
    Next,
    Goto { field: String },
    Revision,
}

/// How serious a finding is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Error,
}

/// A single flow-check finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "finding", rename_all = "snake_case")]
pub enum FlowFinding {
    /// The entry point names no element.
    DanglingEntry { target: ElementId },
    /// An option jumps to an element that does not exist.
    DanglingGoto {
        element: ElementId,
        field: String,
        target: String,
    },
    /// A revision or test prefix that matches no other element.
    EmptyPrefix { element: ElementId, prefix: String },
    /// No path leads here from the entry point.
    Unreachable { element: ElementId },
}

impl FlowFinding {
    pub fn severity(&self) -> Severity {
        match self {
            FlowFinding::DanglingEntry { .. } | FlowFinding::DanglingGoto { .. } => {
                Severity::Error
            }
            FlowFinding::EmptyPrefix { .. } | FlowFinding::Unreachable { .. } => Severity::Info,
        }
    }
}

/// Findings of a flow check, in element order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FlowReport {
    pub findings: Vec<FlowFinding>,
}

impl FlowReport {
    /// True if any finding blocks a save.
    pub fn has_errors(&self) -> bool {
        self.findings
            .iter()
            .any(|f| f.severity() == Severity::Error)
    }

    pub fn unreachable(&self) -> impl Iterator<Item = &ElementId> {
        self.findings.iter().filter_map(|f| match f {
            FlowFinding::Unreachable { element } => Some(element),
            _ => None,
        })
    }
}

/// Directed graph over a course's elements.
pub struct FlowGraph {
    graph: DiGraph<ElementId, FlowEdge>,
    index: HashMap<ElementId, NodeIndex>,
    /// Node of each input element, by position.
    order: Vec<NodeIndex>,
    dangling: Vec<FlowFinding>,
    empty_prefixes: Vec<FlowFinding>,
}

/// All options carry a target, so the learner cannot fall through.
fn fully_branched(options: &[JumpOption]) -> bool {
    !options.is_empty() && options.iter().all(|o| o.goto.is_some())
}

fn falls_through(element: &Element) -> bool {
    match &element.kind {
        ElementKind::End(_) => false,
        ElementKind::Jump(j) => !fully_branched(&j.options),
        ElementKind::Message(m) => !fully_branched(&m.options),
        _ => true,
    }
}

impl FlowGraph {
    /// Builds the graph. Duplicate ids share the first occurrence's node.
    pub fn build(elements: &[Element]) -> Self {
        let mut graph = DiGraph::new();
        let mut index = HashMap::new();
        let mut order = Vec::with_capacity(elements.len());

        for element in elements {
            let node = *index
                .entry(element.id.clone())
                .or_insert_with(|| graph.add_node(element.id.clone()));
            order.push(node);
        }

        let mut dangling = Vec::new();
        let mut empty_prefixes = Vec::new();

        for (pos, element) in elements.iter().enumerate() {
            let from = order[pos];

            if falls_through(element) {
                if let Some(&next) = order.get(pos + 1) {
                    graph.add_edge(from, next, FlowEdge::Next);
                }
            }

            let options: &[JumpOption] = match &element.kind {
                ElementKind::Message(m) => m.options.as_slice(),
                ElementKind::Jump(j) => j.options.as_slice(),
                _ => &[],
            };
            for (i, option) in options.iter().enumerate() {
                let Some(target) = &option.goto else {
                    continue;
                };
                let field = format!("options[{i}].goto");
                match index.get(target) {
                    Some(&to) => {
                        graph.add_edge(from, to, FlowEdge::Goto { field });
                    }
                    None => dangling.push(FlowFinding::DanglingGoto {
                        element: element.id.clone(),
                        field,
                        target: target.0.clone(),
                    }),
                }
            }

            let (prefix, replays) = match &element.kind {
                ElementKind::Revision(r) => (r.prefix.as_str(), true),
                ElementKind::Test(t) => (t.prefix.as_str(), false),
                _ => continue,
            };
            if prefix.is_empty() {
                continue;
            }
            let mut matched = false;
            for other in elements {
                if other.id == element.id || !other.id.has_prefix(prefix) {
                    continue;
                }
                matched = true;
                if replays {
                    graph.add_edge(from, index[&other.id], FlowEdge::Revision);
                }
            }
            if !matched {
                empty_prefixes.push(FlowFinding::EmptyPrefix {
                    element: element.id.clone(),
                    prefix: prefix.to_string(),
                });
            }
        }

        FlowGraph {
            graph,
            index,
            order,
            dangling,
            empty_prefixes,
        }
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Outgoing edges of an element, in insertion order.
    pub fn successors(&self, id: &ElementId) -> Vec<(ElementId, FlowEdge)> {
        let Some(&node) = self.index.get(id) else {
            return Vec::new();
        };
        let mut out: Vec<_> = self
            .graph
            .edges_directed(node, Direction::Outgoing)
            .map(|e| (self.graph[e.target()].clone(), e.weight().clone()))
            .collect();
        // petgraph yields the most recently added edge first.
        out.reverse();
        out
    }

    /// Elements with at least one incoming edge from another element.
    pub fn has_incoming(&self, id: &ElementId) -> bool {
        self.index.get(id).is_some_and(|&node| {
            self.graph
                .edges_directed(node, Direction::Incoming)
                .any(|e| e.source() != node)
        })
    }

    /// Elements reachable from `start`, including `start` itself.
    pub fn reachable_from(&self, start: &ElementId) -> Vec<ElementId> {
        let Some(&node) = self.index.get(start) else {
            return Vec::new();
        };
        let mut bfs = Bfs::new(&self.graph, node);
        let mut out = Vec::new();
        while let Some(n) = bfs.next(&self.graph) {
            out.push(self.graph[n].clone());
        }
        out
    }
}

/// Runs every flow check.
///
/// Reachability starts from `entry` when given and resolvable, otherwise from
/// the first element.
pub fn check_flow(elements: &[Element], entry: Option<&ElementId>) -> FlowReport {
    let flow = FlowGraph::build(elements);
    let mut findings = Vec::new();

    let start = match entry {
        Some(id) if flow.index.contains_key(id) => Some(flow.index[id]),
        Some(id) => {
            findings.push(FlowFinding::DanglingEntry { target: id.clone() });
            flow.order.first().copied()
        }
        None => flow.order.first().copied(),
    };

    let mut reached = vec![false; flow.graph.node_count()];
    if let Some(start) = start {
        let mut bfs = Bfs::new(&flow.graph, start);
        while let Some(n) = bfs.next(&flow.graph) {
            reached[n.index()] = true;
        }
    }

    let mut dangling = flow.dangling.iter().peekable();
    let mut empty = flow.empty_prefixes.iter().peekable();
    let mut reported = vec![false; flow.graph.node_count()];

    for (pos, element) in elements.iter().enumerate() {
        while let Some(f) = dangling.next_if(|f| finding_element(f) == Some(&element.id)) {
            findings.push(f.clone());
        }
        if let Some(f) = empty.next_if(|f| finding_element(f) == Some(&element.id)) {
            findings.push(f.clone());
        }
        let node = flow.order[pos];
        if !reached[node.index()] && !reported[node.index()] {
            reported[node.index()] = true;
            findings.push(FlowFinding::Unreachable {
                element: element.id.clone(),
            });
        }
    }

    FlowReport { findings }
}

fn finding_element(finding: &FlowFinding) -> Option<&ElementId> {
    match finding {
        FlowFinding::DanglingGoto { element, .. }
        | FlowFinding::EmptyPrefix { element, .. }
        | FlowFinding::Unreachable { element } => Some(element),
        FlowFinding::DanglingEntry { .. } => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coursegraph_core::element::{End, Jump, Message, Quiz, Revision};

    fn message(id: &str) -> Element {
        Element::new(
            id,
            ElementKind::Message(Message {
                text: id.to_string(),
                ..Default::default()
            }),
        )
    }

    fn option(text: &str, goto: Option<&str>) -> JumpOption {
        JumpOption {
            text: text.into(),
            goto: goto.map(ElementId::new),
            ..Default::default()
        }
    }

    fn jump(id: &str, options: Vec<JumpOption>) -> Element {
        Element::new(
            id,
            ElementKind::Jump(Jump {
                options,
                ..Default::default()
            }),
        )
    }

    fn end(id: &str) -> Element {
        Element::new(id, ElementKind::End(End::default()))
    }

    #[test]
    fn linear_course_is_fully_reachable() {
        let course = vec![message("a"), message("b"), end("c")];
        let report = check_flow(&course, None);
        assert!(report.findings.is_empty(), "{:?}", report.findings);
    }

    #[test]
    fn nothing_falls_through_an_end() {
        let course = vec![message("a"), end("b"), message("orphan")];
        let report = check_flow(&course, None);
        assert_eq!(
            report.findings,
            vec![FlowFinding::Unreachable {
                element: ElementId::new("orphan")
            }]
        );
        assert!(!report.has_errors());
    }

    #[test]
    fn fully_branched_jump_has_no_fallthrough() {
        let course = vec![
            jump("j", vec![option("left", Some("l")), option("right", Some("r"))]),
            message("skipped"),
            message("l"),
            end("r"),
        ];
        let flow = FlowGraph::build(&course);
        let next: Vec<_> = flow
            .successors(&ElementId::new("j"))
            .into_iter()
            .map(|(id, _)| id.0)
            .collect();
        assert_eq!(next, vec!["l", "r"]);

        let report = check_flow(&course, None);
        assert_eq!(
            report.unreachable().cloned().collect::<Vec<_>>(),
            vec![ElementId::new("skipped")]
        );
    }

    #[test]
    fn cycle_cut_off_from_the_entry_is_unreachable() {
        let course = vec![
            message("a"),
            end("b"),
            jump("x", vec![option("on", Some("y"))]),
            jump("y", vec![option("back", Some("x"))]),
        ];
        let report = check_flow(&course, None);
        assert_eq!(
            report.unreachable().cloned().collect::<Vec<_>>(),
            vec![ElementId::new("x"), ElementId::new("y")]
        );
        assert!(!report.has_errors());
    }

    #[test]
    fn option_without_goto_continues() {
        let course = vec![
            jump("j", vec![option("go", Some("c")), option("stay", None)]),
            message("b"),
            end("c"),
        ];
        assert!(check_flow(&course, None).findings.is_empty());
    }

    #[test]
    fn dangling_goto_is_an_error() {
        let mut m = message("m");
        if let ElementKind::Message(msg) = &mut m.kind {
            msg.options = vec![option("go", Some("missing_id"))];
        }
        let report = check_flow(&[m, end("e")], None);
        assert!(report.has_errors());
        assert_eq!(
            report.findings[0],
            FlowFinding::DanglingGoto {
                element: ElementId::new("m"),
                field: "options[0].goto".into(),
                target: "missing_id".into(),
            }
        );
    }

    #[test]
    fn cycles_are_not_defects() {
        let course = vec![
            message("a"),
            jump("retry", vec![option("again", Some("a")), option("done", Some("z"))]),
            end("z"),
        ];
        assert!(check_flow(&course, None).findings.is_empty());
    }

    #[test]
    fn revision_reaches_prefixed_elements_and_reports_empty_prefix() {
        let quiz = |id: &str| Element::new(id, ElementKind::Quiz(Quiz::default()));
        let revision = |id: &str, prefix: &str| {
            Element::new(
                id,
                ElementKind::Revision(Revision {
                    prefix: prefix.into(),
                    ..Default::default()
                }),
            )
        };
        let course = vec![
            revision("rev", "g1_"),
            end("stop"),
            quiz("g1_a"),
            revision("rev2", "zz_"),
        ];
        // g1_a is only reachable through the revision edge.
        let report = check_flow(&course, None);
        assert_eq!(
            report.findings,
            vec![FlowFinding::EmptyPrefix {
                element: ElementId::new("rev2"),
                prefix: "zz_".into()
            }]
        );
    }

    #[test]
    fn entry_point_drives_reachability() {
        let course = vec![message("a"), message("b"), end("c")];
        let report = check_flow(&course, Some(&ElementId::new("b")));
        assert_eq!(
            report.unreachable().cloned().collect::<Vec<_>>(),
            vec![ElementId::new("a")]
        );

        let report = check_flow(&course, Some(&ElementId::new("nope")));
        assert!(report.has_errors());
        assert_eq!(
            report.findings[0],
            FlowFinding::DanglingEntry {
                target: ElementId::new("nope")
            }
        );
    }
}

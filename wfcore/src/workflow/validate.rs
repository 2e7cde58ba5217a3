use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::collections::{
    HashMap,
    HashSet,
    VecDeque,
};
use thiserror::Error;

use crate::{
    condition,
    workflow::WorkflowGraph,
};

#[derive(Clone, Debug, Error, PartialEq, Deserialize, Serialize)]
#[serde(tag = "issue", rename_all = "snake_case")]
pub enum GraphIssue {
    #[error("workflow has no states")]
    NoStates,
    #[error("workflow has no initial state")]
    NoInitialState,
    #[error("workflow has more than one initial state")]
    MultipleInitialStates,
    #[error("workflow has no final state")]
    NoFinalState,
    #[error("state key {state_key:?} is used more than once")]
    DuplicateStateKey { state_key: String },
    #[error("state {state_id} has an empty state key")]
    EmptyStateKey { state_id: i64 },
    #[error("state {state_id} has an empty label")]
    EmptyLabel { state_id: i64 },
    #[error("state {state_id} has a non-positive SLA")]
    NonPositiveSla { state_id: i64 },
    #[error("action {action_key:?} is defined more than once on state {state_id}")]
    DuplicateActionKey { state_id: i64, action_key: String },
    #[error("transition {transition_id} references a state outside the workflow")]
    DanglingTransition { transition_id: i64 },
    #[error("action {action_id} references a state outside the workflow")]
    DanglingAction { action_id: i64 },
    #[error("transition {transition_id} has an invalid condition: {reason}")]
    InvalidCondition { transition_id: i64, reason: String },
    #[error("state {state_id} is not connected to any other state")]
    Isolated { state_id: i64 },
    #[error("state {state_id} cannot be reached from the initial state")]
    Unreachable { state_id: i64 },
    #[error("workflow contains a cycle")]
    Cycle,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct GraphReport {
    pub errors: Vec<GraphIssue>,
    pub warnings: Vec<GraphIssue>,
}

impl GraphReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Every directed move in the graph, both auto-advance transitions and
/// state actions, restricted to states that exist.
fn adjacency(graph: &WorkflowGraph) -> HashMap<i64, Vec<i64>> {
    let known = graph.states.iter()
        .map(|state| state.id)
        .collect::<HashSet<_>>();
    let transitions = graph.transitions.iter()
        .filter_map(|t| Some((t.from_state_id?, t.to_state_id)));
    let actions = graph.states.iter()
        .flat_map(|state| state.actions.iter().flat_map(|actions| actions.iter()))
        .filter_map(|a| Some((a.state_id, a.next_state_id?)));
    transitions.chain(actions)
        .filter(|(from, to)| known.contains(from) && known.contains(to))
        .into_group_map()
}

fn reachable(start: i64, edges: &HashMap<i64, Vec<i64>>) -> HashSet<i64> {
    let mut seen = HashSet::new();
    let mut queue = VecDeque::from([start]);
    while let Some(id) = queue.pop_front() {
        if !seen.insert(id) {
            continue;
        }
        queue.extend(edges.get(&id).into_iter().flatten().copied());
    }
    seen
}

fn has_cycle(nodes: impl Iterator<Item = i64>, edges: &HashMap<i64, Vec<i64>>) -> bool {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark { Visiting, Done }

    let mut marks = HashMap::<i64, Mark>::new();
    for root in nodes {
        if marks.contains_key(&root) {
            continue;
        }
        // iterative depth first search; the stack holds a node and the
        // index of the next outgoing edge to follow.
        let mut stack = vec![(root, 0usize)];
        marks.insert(root, Mark::Visiting);
        while let Some((node, idx)) = stack.pop() {
            let next = edges.get(&node).and_then(|targets| targets.get(idx)).copied();
            match next {
                Some(target) => {
                    stack.push((node, idx + 1));
                    match marks.get(&target) {
                        Some(Mark::Visiting) => return true,
                        Some(Mark::Done) => (),
                        None => {
                            marks.insert(target, Mark::Visiting);
                            stack.push((target, 0));
                        }
                    }
                }
                None => {
                    marks.insert(node, Mark::Done);
                }
            }
        }
    }
    false
}

pub fn validate_graph(graph: &WorkflowGraph) -> GraphReport {
    let mut report = GraphReport::default();
    let errors = &mut report.errors;
    let warnings = &mut report.warnings;

    if graph.states.is_empty() {
        errors.push(GraphIssue::NoStates);
    }

    let initial = graph.states.iter()
        .filter(|state| state.is_initial)
        .collect::<Vec<_>>();
    match initial.len() {
        0 => errors.push(GraphIssue::NoInitialState),
        1 => (),
        _ => warnings.push(GraphIssue::MultipleInitialStates),
    }
    if !graph.states.is_empty() && graph.final_states().is_empty() {
        warnings.push(GraphIssue::NoFinalState);
    }

    errors.extend(graph.states.iter()
        .map(|state| state.state_key.as_str())
        .filter(|key| !key.is_empty())
        .duplicates()
        .map(|key| GraphIssue::DuplicateStateKey { state_key: key.to_string() })
    );

    for state in graph.states.iter() {
        if state.state_key.trim().is_empty() {
            errors.push(GraphIssue::EmptyStateKey { state_id: state.id });
        }
        if state.label.trim().is_empty() {
            errors.push(GraphIssue::EmptyLabel { state_id: state.id });
        }
        if state.sla_hours.is_some_and(|hours| hours <= 0) {
            warnings.push(GraphIssue::NonPositiveSla { state_id: state.id });
        }
        let actions = state.actions.iter().flat_map(|actions| actions.iter());
        errors.extend(actions.clone()
            .map(|action| action.action_key.as_str())
            .duplicates()
            .map(|key| GraphIssue::DuplicateActionKey {
                state_id: state.id,
                action_key: key.to_string(),
            })
        );
        errors.extend(actions
            .filter(|action| action.next_state_id
                .is_some_and(|id| !graph.contains_state(id)))
            .map(|action| GraphIssue::DanglingAction { action_id: action.id })
        );
    }

    for transition in graph.transitions.iter() {
        let source_ok = transition.from_state_id
            .map_or(true, |id| graph.contains_state(id));
        if !source_ok || !graph.contains_state(transition.to_state_id) {
            errors.push(GraphIssue::DanglingTransition { transition_id: transition.id });
        }
        if transition.has_condition() {
            if let Some(Err(e)) = transition.condition_expr.as_ref().map(condition::validate) {
                errors.push(GraphIssue::InvalidCondition {
                    transition_id: transition.id,
                    reason: e.to_string(),
                });
            }
        }
    }

    let edges = adjacency(graph);
    if graph.states.len() > 1 {
        let connected = edges.iter()
            .flat_map(|(from, targets)| std::iter::once(*from).chain(targets.iter().copied()))
            .collect::<HashSet<_>>();
        warnings.extend(graph.states.iter()
            .filter(|state| !connected.contains(&state.id))
            .map(|state| GraphIssue::Isolated { state_id: state.id })
        );
    }
    if let Some(start) = initial.first() {
        let reached = reachable(start.id, &edges);
        warnings.extend(graph.states.iter()
            .filter(|state| !reached.contains(&state.id))
            .map(|state| GraphIssue::Unreachable { state_id: state.id })
        );
    }
    if has_cycle(graph.states.iter().map(|state| state.id), &edges) {
        warnings.push(GraphIssue::Cycle);
    }

    report
}

#[cfg(test)]
mod test {
    use serde_json::json;
    use crate::workflow::{
        impls::testing::{
            action,
            graph,
            state,
            transition,
        },
        WorkflowStates,
        WorkflowTransitions,
    };
    use super::*;

    #[test]
    fn sample_is_valid() {
        let report = validate_graph(&graph());
        assert!(report.is_valid(), "{report:?}");
        assert!(report.warnings.is_empty(), "{report:?}");
    }

    #[test]
    fn empty_graph() {
        let mut graph = graph();
        graph.states = WorkflowStates::default();
        graph.transitions = WorkflowTransitions::default();
        let report = validate_graph(&graph);
        assert_eq!(report.errors, [GraphIssue::NoStates, GraphIssue::NoInitialState]);
        assert!(!report.is_valid());
    }

    #[test]
    fn structural_errors() {
        let mut graph = graph();
        graph.states.push(state(5, "pending", false, false, vec![
            action(4, 5, "approve", Some(42), None),
            action(5, 5, "approve", Some(4), None),
        ]));
        graph.transitions.push(transition(4, 1, 99, None, true));
        graph.transitions.push(transition(5, 1, 2, Some(json!({"xor": []})), true));
        let report = validate_graph(&graph);
        assert!(!report.is_valid());
        assert!(report.errors.contains(&GraphIssue::DuplicateStateKey {
            state_key: "pending".into(),
        }));
        assert!(report.errors.contains(&GraphIssue::DuplicateActionKey {
            state_id: 5,
            action_key: "approve".into(),
        }));
        assert!(report.errors.contains(&GraphIssue::DanglingAction { action_id: 4 }));
        assert!(report.errors.contains(&GraphIssue::DanglingTransition { transition_id: 4 }));
        assert!(report.errors.iter().any(|issue| matches!(
            issue,
            GraphIssue::InvalidCondition { transition_id: 5, .. }
        )));
        assert!(report.warnings.contains(&GraphIssue::Unreachable { state_id: 5 }));
    }

    #[test]
    fn warnings() {
        let mut graph = graph();
        graph.states[3].is_final = false;
        graph.states[2].is_initial = true;
        graph.states.push(state(5, "orphan", false, false, vec![]));
        // reject from pending goes back to start
        if let Some(actions) = graph.states[1].actions.as_mut() {
            actions[1].next_state_id = Some(1);
        }
        let report = validate_graph(&graph);
        assert!(report.is_valid(), "{report:?}");
        assert!(report.warnings.contains(&GraphIssue::MultipleInitialStates));
        assert!(report.warnings.contains(&GraphIssue::NoFinalState));
        assert!(report.warnings.contains(&GraphIssue::Isolated { state_id: 5 }));
        assert!(report.warnings.contains(&GraphIssue::Unreachable { state_id: 5 }));
        assert!(report.warnings.contains(&GraphIssue::Cycle));
    }
}

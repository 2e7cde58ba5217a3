//! Diagram view of a workflow, derived from its states and transitions.
//!
//! This is what read paths expose as `graph_json`.  It is never
//! consulted for the legality of a move.
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use crate::workflow::{
    WorkflowGraph,
    WorkflowState,
    WorkflowTransition,
};

#[derive(Clone, Copy, Debug, PartialEq, Deserialize, Serialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Start,
    End,
    State,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeData {
    pub state_key: String,
    pub label: String,
    pub is_initial: bool,
    pub is_final: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sla_hours: Option<i64>,
    pub description: String,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Node {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    pub position: Position,
    pub data: NodeData,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeData {
    pub action_key: String,
    pub action_label: Option<String>,
    pub requires_comment: bool,
    pub auto_advance: bool,
    pub condition_expr: Option<Value>,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Edge {
    pub id: String,
    pub source: Option<String>,
    pub target: String,
    pub data: EdgeData,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct Presentation {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

fn default_position(index: usize) -> Position {
    Position {
        x: 250.0,
        y: 100.0 + 150.0 * index as f64,
    }
}

/// Node positions from a previously stored `graph_json`, keyed by node
/// id.  Ids may have been stored as either strings or numbers.
fn stored_positions(stored: Option<&Value>) -> HashMap<String, Position> {
    stored
        .and_then(|value| value.get("nodes"))
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|node| {
            let id = match node.get("id")? {
                Value::String(s) => s.clone(),
                Value::Number(n) => n.to_string(),
                _ => return None,
            };
            let position = serde_json::from_value(node.get("position")?.clone()).ok()?;
            Some((id, position))
        })
        .collect()
}

fn node(index: usize, state: &WorkflowState) -> Node {
    Node {
        id: state.id.to_string(),
        kind: if state.is_initial {
            NodeKind::Start
        } else if state.is_final {
            NodeKind::End
        } else {
            NodeKind::State
        },
        position: default_position(index),
        data: NodeData {
            state_key: state.state_key.clone(),
            label: state.label.clone(),
            is_initial: state.is_initial,
            is_final: state.is_final,
            sla_hours: state.sla_hours,
            description: state.notification_template.clone().unwrap_or_default(),
        },
    }
}

fn edge(transition: &WorkflowTransition) -> Edge {
    Edge {
        id: transition.id.to_string(),
        source: transition.from_state_id.map(|id| id.to_string()),
        target: transition.to_state_id.to_string(),
        data: EdgeData {
            action_key: transition.action_key.clone(),
            action_label: transition.action_label.clone(),
            requires_comment: transition.requires_comment,
            auto_advance: transition.auto_advance,
            condition_expr: transition.condition_expr.clone(),
        },
    }
}

pub fn presentation(graph: &WorkflowGraph) -> Presentation {
    let positions = stored_positions(graph.definition.graph_json.as_ref());
    let nodes = graph.states.iter()
        .enumerate()
        .map(|(index, state)| {
            let mut node = node(index, state);
            if let Some(position) = positions.get(&node.id) {
                node.position = *position;
            }
            node
        })
        .collect();
    let edges = graph.transitions.iter()
        .map(edge)
        .collect();
    Presentation { nodes, edges }
}

impl WorkflowGraph {
    /// The definition with `graph_json` replaced by the derived
    /// presentation.
    pub fn presented_definition(&self) -> crate::workflow::WorkflowDefinition {
        let mut definition = self.definition.clone();
        definition.graph_json = serde_json::to_value(presentation(self)).ok();
        definition
    }
}

#[cfg(test)]
mod test {
    use serde_json::json;
    use crate::workflow::impls::testing::graph;
    use super::*;

    #[test]
    fn default_layout() {
        let graph = graph();
        let view = presentation(&graph);
        assert_eq!(view.nodes.len(), 4);
        assert_eq!(view.edges.len(), 3);
        assert_eq!(view.nodes[0].kind, NodeKind::Start);
        assert_eq!(view.nodes[1].kind, NodeKind::State);
        assert_eq!(view.nodes[3].kind, NodeKind::End);
        assert_eq!(view.nodes[2].position, Position { x: 250.0, y: 400.0 });
        assert_eq!(view.edges[0].source.as_deref(), Some("1"));
        assert_eq!(view.edges[0].target, "3");
        assert!(view.edges[0].data.auto_advance);
    }

    #[test]
    fn preserves_stored_positions() {
        let mut graph = graph();
        graph.definition.graph_json = Some(json!({
            "nodes": [
                {"id": "2", "position": {"x": 10, "y": 20}},
                {"id": 4, "position": {"x": 30.5, "y": 40}},
                {"id": "9", "position": {"x": 0, "y": 0}},
                {"id": "1"},
            ],
        }));
        let view = presentation(&graph);
        assert_eq!(view.nodes[0].position, Position { x: 250.0, y: 100.0 });
        assert_eq!(view.nodes[1].position, Position { x: 10.0, y: 20.0 });
        assert_eq!(view.nodes[3].position, Position { x: 30.5, y: 40.0 });
    }

    #[test]
    fn serialized_shape() -> anyhow::Result<()> {
        let value = serde_json::to_value(presentation(&graph()))?;
        assert_eq!(value["nodes"][0]["type"], "start");
        assert_eq!(value["nodes"][0]["data"]["stateKey"], "start");
        assert_eq!(value["edges"][1]["data"]["autoAdvance"], true);
        let definition = graph().presented_definition();
        assert_eq!(definition.graph_json, Some(value));
        Ok(())
    }
}

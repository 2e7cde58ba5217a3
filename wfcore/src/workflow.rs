use serde::{Deserialize, Serialize};
use serde_json::Value;
#[cfg(feature = "sqlx")]
use sqlx::{
    sqlite::SqliteRow,
    FromRow,
    Row,
};

use crate::ac::Role;
#[cfg(feature = "sqlx")]
use crate::row;

/// Free-form evaluation context carried by an approval instance.
pub type Metadata = serde_json::Map<String, Value>;

/// Longest SLA a state may be authored with, ten years in hours.
pub const MAX_SLA_HOURS: i64 = 10 * 366 * 24;

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct WorkflowDefinition {
    #[serde(default)]
    pub id: i64,
    pub tenant_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub version: i64,
    /// Stored presentation graph; on read paths this is replaced by the
    /// one derived from the states and transitions.
    pub graph_json: Option<Value>,
    pub is_active: bool,
    pub created_by: i64,
    pub created_ts: i64,
    pub updated_ts: i64,
}

#[cfg(feature = "sqlx")]
impl<'c> FromRow<'c, SqliteRow> for WorkflowDefinition {
    fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(WorkflowDefinition {
            id: row.try_get("id")?,
            tenant_id: row.try_get("tenant_id")?,
            name: row.try_get("name")?,
            description: row.try_get("description")?,
            version: row.try_get("version")?,
            graph_json: row::json(row, "graph_json")?,
            is_active: row.try_get("is_active")?,
            created_by: row.try_get("created_by")?,
            created_ts: row.try_get("created_ts")?,
            updated_ts: row.try_get("updated_ts")?,
        })
    }
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct WorkflowDefinitions(Vec<WorkflowDefinition>);

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct WorkflowState {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub workflow_id: i64,
    pub state_key: String,
    pub label: String,
    pub is_initial: bool,
    pub is_final: bool,
    pub sla_hours: Option<i64>,
    pub notification_template: Option<String>,
    pub actions: Option<StateActions>,
}

#[cfg(feature = "sqlx")]
impl<'c> FromRow<'c, SqliteRow> for WorkflowState {
    fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(WorkflowState {
            id: row.try_get("id")?,
            workflow_id: row.try_get("workflow_id")?,
            state_key: row.try_get("state_key")?,
            label: row.try_get("label")?,
            is_initial: row.try_get("is_initial")?,
            is_final: row.try_get("is_final")?,
            sla_hours: row.try_get("sla_hours")?,
            notification_template: row.try_get("notification_template")?,
            actions: None,
        })
    }
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct WorkflowStates(Vec<WorkflowState>);

/// An edge scanned by auto-advance.  User initiated moves go through
/// [`StateAction`] instead.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct WorkflowTransition {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub workflow_id: i64,
    pub from_state_id: Option<i64>,
    pub to_state_id: i64,
    pub action_key: String,
    pub action_label: Option<String>,
    pub condition_expr: Option<Value>,
    pub requires_comment: bool,
    pub auto_advance: bool,
}

#[cfg(feature = "sqlx")]
impl<'c> FromRow<'c, SqliteRow> for WorkflowTransition {
    fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(WorkflowTransition {
            id: row.try_get("id")?,
            workflow_id: row.try_get("workflow_id")?,
            from_state_id: row.try_get("from_state_id")?,
            to_state_id: row.try_get("to_state_id")?,
            action_key: row.try_get("action_key")?,
            action_label: row.try_get("action_label")?,
            condition_expr: row::json(row, "condition_expr")?,
            requires_comment: row.try_get("requires_comment")?,
            auto_advance: row.try_get("auto_advance")?,
        })
    }
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct WorkflowTransitions(Vec<WorkflowTransition>);

/// A legal, user-invocable move out of a state.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct StateAction {
    #[serde(default)]
    pub id: i64,
    pub state_id: i64,
    pub action_key: String,
    pub action_label: String,
    /// `None` for a terminal action that records the step outcome
    /// without moving the instance.
    pub next_state_id: Option<i64>,
    pub requires_role: Option<Role>,
    pub display_order: i64,
    pub is_default: bool,
}

#[cfg(feature = "sqlx")]
impl<'c> FromRow<'c, SqliteRow> for StateAction {
    fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(StateAction {
            id: row.try_get("id")?,
            state_id: row.try_get("state_id")?,
            action_key: row.try_get("action_key")?,
            action_label: row.try_get("action_label")?,
            next_state_id: row.try_get("next_state_id")?,
            requires_role: row::parsed(row, "requires_role")?,
            display_order: row.try_get("display_order")?,
            is_default: row.try_get("is_default")?,
        })
    }
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct StateActions(Vec<StateAction>);

/// A fully loaded workflow: the definition together with every state
/// (each carrying its actions) and every transition.
///
/// States and transitions are referenced by their ids; the graph never
/// holds references between its members.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct WorkflowGraph {
    pub definition: WorkflowDefinition,
    pub states: WorkflowStates,
    pub transitions: WorkflowTransitions,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct NewWorkflowDefinition {
    pub name: String,
    pub description: Option<String>,
    pub version: Option<i64>,
    pub graph_json: Option<Value>,
    pub is_active: Option<bool>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct WorkflowDefinitionPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub version: Option<i64>,
    pub graph_json: Option<Value>,
    pub is_active: Option<bool>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct NewState {
    pub state_key: String,
    pub label: String,
    #[serde(default)]
    pub is_initial: bool,
    #[serde(default)]
    pub is_final: bool,
    pub sla_hours: Option<i64>,
    pub notification_template: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct NewTransition {
    pub from_state_id: Option<i64>,
    pub to_state_id: i64,
    pub action_key: String,
    pub action_label: Option<String>,
    pub condition_expr: Option<Value>,
    #[serde(default)]
    pub requires_comment: bool,
    #[serde(default)]
    pub auto_advance: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct NewStateAction {
    pub state_id: i64,
    pub action_key: String,
    pub action_label: String,
    pub next_state_id: Option<i64>,
    pub requires_role: Option<Role>,
    #[serde(default)]
    pub display_order: i64,
    #[serde(default)]
    pub is_default: bool,
}

mod impls;
pub mod graph;
pub mod traits;
pub mod validate;

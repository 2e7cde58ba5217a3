use enumset::EnumSetType;
use serde::{Deserialize, Serialize};
#[cfg(feature = "sqlx")]
use sqlx::{
    sqlite::SqliteRow,
    FromRow,
    Row,
};

use crate::workflow::Metadata;
#[cfg(feature = "sqlx")]
use crate::row;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InstanceStatus {
    #[default]
    Active,
    Completed,
    Cancelled,
}

#[derive(Debug, Default, EnumSetType, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
    Delegated,
    Timeout,
}

/// One run of a document through a workflow.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct ApprovalInstance {
    #[serde(default)]
    pub id: i64,
    pub tenant_id: i64,
    pub document_id: i64,
    pub workflow_id: i64,
    pub current_state_id: Option<i64>,
    pub status: InstanceStatus,
    pub started_by: i64,
    pub started_ts: i64,
    pub completed_ts: Option<i64>,
    /// Due time of the pending step, if any.
    pub due_ts: Option<i64>,
    pub metadata: Metadata,
    pub created_ts: i64,
    pub updated_ts: i64,
    pub steps: Option<ApprovalSteps>,
}

#[cfg(feature = "sqlx")]
impl<'c> FromRow<'c, SqliteRow> for ApprovalInstance {
    fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(ApprovalInstance {
            id: row.try_get("id")?,
            tenant_id: row.try_get("tenant_id")?,
            document_id: row.try_get("document_id")?,
            workflow_id: row.try_get("workflow_id")?,
            current_state_id: row.try_get("current_state_id")?,
            status: row::required(row, "status")?,
            started_by: row.try_get("started_by")?,
            started_ts: row.try_get("started_ts")?,
            completed_ts: row.try_get("completed_ts")?,
            due_ts: row.try_get("due_ts")?,
            metadata: row::json(row, "metadata")?.unwrap_or_default(),
            created_ts: row.try_get("created_ts")?,
            updated_ts: row.try_get("updated_ts")?,
            steps: None,
        })
    }
}

/// One visit to a state within an instance.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct ApprovalStep {
    #[serde(default)]
    pub id: i64,
    pub instance_id: i64,
    pub state_id: i64,
    pub assigned_to: i64,
    /// When set, the only identity allowed to complete the step.
    pub delegated_to: Option<i64>,
    pub status: StepStatus,
    pub action_taken: Option<String>,
    pub comment: Option<String>,
    pub assigned_ts: i64,
    pub due_ts: Option<i64>,
    pub completed_ts: Option<i64>,
}

#[cfg(feature = "sqlx")]
impl<'c> FromRow<'c, SqliteRow> for ApprovalStep {
    fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(ApprovalStep {
            id: row.try_get("id")?,
            instance_id: row.try_get("instance_id")?,
            state_id: row.try_get("state_id")?,
            assigned_to: row.try_get("assigned_to")?,
            delegated_to: row.try_get("delegated_to")?,
            status: row::required(row, "status")?,
            action_taken: row.try_get("action_taken")?,
            comment: row.try_get("comment")?,
            assigned_ts: row.try_get("assigned_ts")?,
            due_ts: row.try_get("due_ts")?,
            completed_ts: row.try_get("completed_ts")?,
        })
    }
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct ApprovalSteps(Vec<ApprovalStep>);

/// A pending step past its due time, with enough of its instance to
/// address it.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct OverdueStep {
    pub tenant_id: i64,
    pub document_id: i64,
    pub step: ApprovalStep,
}

#[cfg(feature = "sqlx")]
impl<'c> FromRow<'c, SqliteRow> for OverdueStep {
    fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(OverdueStep {
            tenant_id: row.try_get("tenant_id")?,
            document_id: row.try_get("document_id")?,
            step: ApprovalStep::from_row(row)?,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct NewApprovalInstance {
    pub tenant_id: i64,
    pub document_id: i64,
    pub workflow_id: i64,
    pub current_state_id: i64,
    pub status: InstanceStatus,
    pub started_by: i64,
    pub started_ts: i64,
    pub completed_ts: Option<i64>,
    pub due_ts: Option<i64>,
    pub metadata: Metadata,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct NewApprovalStep {
    pub state_id: i64,
    pub assigned_to: i64,
    pub assigned_ts: i64,
    pub due_ts: Option<i64>,
}

/// Closes a pending step.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct StepCompletion {
    pub step_id: i64,
    pub status: StepStatus,
    pub action_taken: String,
    pub comment: Option<String>,
    pub delegated_to: Option<i64>,
    pub completed_ts: i64,
}

/// Moves an active instance to another state.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct InstanceAdvance {
    /// The state the instance must still be in for the move to apply.
    pub expected_state_id: Option<i64>,
    pub next_state_id: i64,
    pub status: InstanceStatus,
    pub completed_ts: Option<i64>,
    pub due_ts: Option<i64>,
    /// The full context after merging.
    pub metadata: Metadata,
}

/// Everything one executed action writes, applied atomically.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct TransitionCommit {
    pub instance_id: i64,
    pub completion: Option<StepCompletion>,
    pub advance: Option<InstanceAdvance>,
    pub next_step: Option<NewApprovalStep>,
}

mod impls;
pub mod traits;
pub use impls::merge_metadata;

use async_trait::async_trait;
use itertools::Itertools;

use crate::{
    approval::{
        ApprovalInstance,
        traits::{
            ApprovalInstanceBackend,
            ApprovalStepBackend,
        },
    },
    audit::AuditBackend,
    document::DocumentBackend,
    error::BackendError,
    workflow::{
        WorkflowGraph,
        traits::{
            StateActionBackend,
            WorkflowDefinitionBackend,
            WorkflowStateBackend,
            WorkflowTransitionBackend,
        },
    },
};

mod connector;
pub use connector::{
    ConnectorOption,
    PlatformConnector,
};

pub trait PlatformUrl {
    fn url(&self) -> &str;
}

/// WFPlatform - Workflow Platform
///
/// Everything the workflow service needs from storage: the workflow
/// graphs, the approval runtime records, the document lookup and the
/// audit trail.
///
/// This trait is applicable to everything that correctly implements the
/// relevant backends that compose this trait.
#[async_trait]
pub trait WFPlatform: WorkflowDefinitionBackend
    + WorkflowStateBackend
    + WorkflowTransitionBackend
    + StateActionBackend
    + ApprovalInstanceBackend
    + ApprovalStepBackend
    + DocumentBackend
    + AuditBackend
    + PlatformUrl

    + Send
    + Sync
{
    fn as_dyn(&self) -> &dyn WFPlatform;

    /// The definition with all of its states, their actions, and its
    /// transitions loaded.
    async fn get_workflow_graph(
        &self,
        tenant_id: i64,
        id: i64,
    ) -> Result<Option<WorkflowGraph>, BackendError> {
        let Some(definition) = self.get_workflow_definition(tenant_id, id).await? else {
            return Ok(None);
        };
        let mut states = self.list_workflow_states(id).await?;
        let mut actions = Vec::from(self.list_state_actions_for_workflow(id).await?)
            .into_iter()
            .into_group_map_by(|action| action.state_id);
        for state in states.iter_mut() {
            state.actions = Some(actions.remove(&state.id)
                .unwrap_or_default()
                .into());
        }
        let transitions = self.list_workflow_transitions(id).await?;
        Ok(Some(WorkflowGraph {
            definition,
            states,
            transitions,
        }))
    }

    /// The latest instance for the document with its steps loaded.
    async fn get_instance_with_steps(
        &self,
        tenant_id: i64,
        document_id: i64,
    ) -> Result<Option<ApprovalInstance>, BackendError> {
        let Some(mut instance) = self.get_latest_instance_for_document(
            tenant_id,
            document_id,
        ).await? else {
            return Ok(None);
        };
        instance.steps = Some(self.list_steps_for_instance(instance.id).await?);
        Ok(Some(instance))
    }
}

/// Opt-in marker for the blanket [`WFPlatform`] implementation.
pub trait DefaultWFPlatform {}

impl<P: WorkflowDefinitionBackend
    + WorkflowStateBackend
    + WorkflowTransitionBackend
    + StateActionBackend
    + ApprovalInstanceBackend
    + ApprovalStepBackend
    + DocumentBackend
    + AuditBackend
    + PlatformUrl

    + DefaultWFPlatform

    + Send
    + Sync
> WFPlatform for P {
    fn as_dyn(&self) -> &dyn WFPlatform {
        self
    }
}

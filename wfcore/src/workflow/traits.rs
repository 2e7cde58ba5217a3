use async_trait::async_trait;
use crate::{
    error::BackendError,
    workflow::{
        NewState,
        NewStateAction,
        NewTransition,
        NewWorkflowDefinition,
        StateActions,
        WorkflowDefinition,
        WorkflowDefinitionPatch,
        WorkflowDefinitions,
        WorkflowStates,
        WorkflowTransitions,
    },
};

#[async_trait]
pub trait WorkflowDefinitionBackend {
    /// Persist a new definition, returning its id.  A missing version
    /// defaults to 1 and a missing active flag to true.
    async fn add_workflow_definition(
        &self,
        tenant_id: i64,
        created_by: i64,
        item: &NewWorkflowDefinition,
    ) -> Result<i64, BackendError>;
    async fn get_workflow_definition(
        &self,
        tenant_id: i64,
        id: i64,
    ) -> Result<Option<WorkflowDefinition>, BackendError>;
    /// Ordered by name, then by version descending.
    async fn list_workflow_definitions(
        &self,
        tenant_id: i64,
    ) -> Result<WorkflowDefinitions, BackendError>;
    async fn update_workflow_definition(
        &self,
        tenant_id: i64,
        id: i64,
        patch: &WorkflowDefinitionPatch,
    ) -> Result<bool, BackendError>;
    /// Removes the definition together with everything it owns, but only
    /// while no active instance references it.  Returns false if nothing
    /// was removed.
    async fn delete_workflow_definition(
        &self,
        tenant_id: i64,
        id: i64,
    ) -> Result<bool, BackendError>;
}

#[async_trait]
pub trait WorkflowStateBackend {
    async fn add_workflow_state(
        &self,
        workflow_id: i64,
        item: &NewState,
    ) -> Result<i64, BackendError>;
    /// States without their actions, in declaration order.
    async fn list_workflow_states(
        &self,
        workflow_id: i64,
    ) -> Result<WorkflowStates, BackendError>;
}

#[async_trait]
pub trait WorkflowTransitionBackend {
    async fn add_workflow_transition(
        &self,
        workflow_id: i64,
        item: &NewTransition,
    ) -> Result<i64, BackendError>;
    /// In declaration order.
    async fn list_workflow_transitions(
        &self,
        workflow_id: i64,
    ) -> Result<WorkflowTransitions, BackendError>;
}

#[async_trait]
pub trait StateActionBackend {
    async fn add_state_action(
        &self,
        item: &NewStateAction,
    ) -> Result<i64, BackendError>;
    /// Every action of every state in the workflow, ordered by state
    /// then display order.
    async fn list_state_actions_for_workflow(
        &self,
        workflow_id: i64,
    ) -> Result<StateActions, BackendError>;
}

use wfcore::{
    ac::Role,
    audit::{
        AuditEntry,
        AuditOperation,
    },
    condition,
    error::BackendError,
    platform::WFPlatform,
    workflow::{
        NewState,
        NewStateAction,
        NewTransition,
        NewWorkflowDefinition,
        MAX_SLA_HOURS,
        StateAction,
        WorkflowDefinition,
        WorkflowDefinitionPatch,
        WorkflowDefinitions,
        WorkflowGraph,
        WorkflowState,
        WorkflowTransition,
        traits::{
            StateActionBackend,
            WorkflowDefinitionBackend,
            WorkflowStateBackend,
            WorkflowTransitionBackend,
        },
        validate::{
            GraphReport,
            validate_graph,
        },
    },
};

use crate::{
    error::{
        CtrlError,
        PlatformError,
    },
    platform::Platform,
};

const TABLE: &str = "workflow_definition";

impl Platform {
    /// Create a definition seeded with a runnable start, pending and
    /// approved skeleton, returning the loaded graph.
    pub async fn create_workflow_definition(
        &self,
        tenant_id: i64,
        author_id: i64,
        item: &NewWorkflowDefinition,
    ) -> Result<WorkflowGraph, PlatformError> {
        let platform = self.wf_platform.as_ref();
        let workflow_id = platform.add_workflow_definition(tenant_id, author_id, item).await?;

        let start_id = platform.add_workflow_state(workflow_id, &NewState {
            state_key: "start".into(),
            label: "Start".into(),
            is_initial: true,
            .. Default::default()
        }).await?;
        let pending_id = platform.add_workflow_state(workflow_id, &NewState {
            state_key: "pending".into(),
            label: "Pending Approval".into(),
            sla_hours: Some(48),
            .. Default::default()
        }).await?;
        let approved_id = platform.add_workflow_state(workflow_id, &NewState {
            state_key: "approved".into(),
            label: "Approved".into(),
            is_final: true,
            .. Default::default()
        }).await?;

        platform.add_workflow_transition(workflow_id, &NewTransition {
            from_state_id: Some(start_id),
            to_state_id: pending_id,
            action_key: "start_approval".into(),
            action_label: Some("Start Approval".into()),
            auto_advance: true,
            .. Default::default()
        }).await?;
        platform.add_workflow_transition(workflow_id, &NewTransition {
            from_state_id: Some(pending_id),
            to_state_id: approved_id,
            action_key: "approve".into(),
            action_label: Some("Approve".into()),
            .. Default::default()
        }).await?;

        platform.add_state_action(&NewStateAction {
            state_id: pending_id,
            action_key: "approve".into(),
            action_label: "Approve".into(),
            next_state_id: Some(approved_id),
            requires_role: Some(Role::Editor),
            display_order: 1,
            is_default: true,
        }).await?;

        let mut graph = self.get_workflow_graph(tenant_id, workflow_id).await?;
        log::info!("created workflow {workflow_id} {:?} for tenant {tenant_id}", graph.definition.name);
        self.audit(
            AuditEntry::new(tenant_id, Some(author_id), TABLE, workflow_id, AuditOperation::Insert)
                .new_values(&graph.definition)
        ).await;
        graph.definition = graph.presented_definition();
        Ok(graph)
    }

    /// The loaded graph with its definition as stored.
    pub async fn get_workflow_graph(
        &self,
        tenant_id: i64,
        id: i64,
    ) -> Result<WorkflowGraph, PlatformError> {
        Ok(self.wf_platform.get_workflow_graph(tenant_id, id)
            .await?
            .ok_or(CtrlError::WorkflowNotFound(id))?)
    }

    /// The definition with its presentation graph derived from its
    /// states and transitions.
    pub async fn get_workflow_definition(
        &self,
        tenant_id: i64,
        id: i64,
    ) -> Result<WorkflowDefinition, PlatformError> {
        Ok(self.get_workflow_graph(tenant_id, id)
            .await?
            .presented_definition())
    }

    pub async fn list_workflow_definitions(
        &self,
        tenant_id: i64,
    ) -> Result<WorkflowDefinitions, PlatformError> {
        let definitions = self.wf_platform.list_workflow_definitions(tenant_id).await?;
        let mut result = Vec::with_capacity(definitions.len());
        for definition in Vec::from(definitions).into_iter() {
            // a definition removed since it was listed is simply skipped
            if let Some(graph) = self.wf_platform.get_workflow_graph(tenant_id, definition.id).await? {
                result.push(graph.presented_definition());
            }
        }
        Ok(result.into())
    }

    pub async fn update_workflow_definition(
        &self,
        tenant_id: i64,
        user_id: i64,
        id: i64,
        patch: &WorkflowDefinitionPatch,
    ) -> Result<WorkflowDefinition, PlatformError> {
        let before = self.wf_platform.get_workflow_definition(tenant_id, id)
            .await?
            .ok_or(CtrlError::WorkflowNotFound(id))?;
        if !self.wf_platform.update_workflow_definition(tenant_id, id, patch).await? {
            Err(CtrlError::WorkflowNotFound(id))?
        }
        let graph = self.get_workflow_graph(tenant_id, id).await?;
        log::info!("updated workflow {id} for tenant {tenant_id}");
        self.audit(
            AuditEntry::new(tenant_id, Some(user_id), TABLE, id, AuditOperation::Update)
                .old_values(&before)
                .new_values(&graph.definition)
        ).await;
        Ok(graph.presented_definition())
    }

    /// Remove the definition and everything it owns.  Refused while an
    /// active approval still runs on it.
    pub async fn delete_workflow_definition(
        &self,
        tenant_id: i64,
        user_id: i64,
        id: i64,
    ) -> Result<(), PlatformError> {
        let before = self.wf_platform.get_workflow_definition(tenant_id, id)
            .await?
            .ok_or(CtrlError::WorkflowNotFound(id))?;
        if !self.wf_platform.delete_workflow_definition(tenant_id, id).await? {
            // distinguish a concurrent removal from a refusal
            return match self.wf_platform.get_workflow_definition(tenant_id, id).await? {
                Some(_) => Err(CtrlError::WorkflowInUse(id).into()),
                None => Err(CtrlError::WorkflowNotFound(id).into()),
            };
        }
        log::info!("deleted workflow {id} for tenant {tenant_id}");
        self.audit(
            AuditEntry::new(tenant_id, Some(user_id), TABLE, id, AuditOperation::Delete)
                .old_values(&before)
        ).await;
        Ok(())
    }

    pub async fn validate_workflow(
        &self,
        tenant_id: i64,
        id: i64,
    ) -> Result<GraphReport, PlatformError> {
        Ok(validate_graph(&self.get_workflow_graph(tenant_id, id).await?))
    }

    pub async fn add_state(
        &self,
        tenant_id: i64,
        workflow_id: i64,
        item: &NewState,
    ) -> Result<WorkflowState, PlatformError> {
        let graph = self.get_workflow_graph(tenant_id, workflow_id).await?;
        if graph.state_by_key(&item.state_key).is_some() {
            Err(CtrlError::DuplicateStateKey(item.state_key.clone()))?
        }
        if item.is_initial && graph.initial_state().is_some() {
            Err(CtrlError::InitialStateExists(workflow_id))?
        }
        if let Some(hours) = item.sla_hours {
            if !(1..=MAX_SLA_HOURS).contains(&hours) {
                Err(CtrlError::InvalidSla(hours))?
            }
        }
        let id = self.wf_platform.add_workflow_state(workflow_id, item)
            .await
            .map_err(|e| match e {
                BackendError::Contention(_) => PlatformError::from(
                    CtrlError::DuplicateStateKey(item.state_key.clone())
                ),
                e => PlatformError::from(e),
            })?;
        let graph = self.get_workflow_graph(tenant_id, workflow_id).await?;
        Ok(graph.state(id)
            .cloned()
            .ok_or(CtrlError::StateNotFound(id))?)
    }

    pub async fn add_transition(
        &self,
        tenant_id: i64,
        workflow_id: i64,
        item: &NewTransition,
    ) -> Result<WorkflowTransition, PlatformError> {
        let graph = self.get_workflow_graph(tenant_id, workflow_id).await?;
        for state_id in item.from_state_id.into_iter().chain([item.to_state_id]) {
            if !graph.contains_state(state_id) {
                Err(CtrlError::ForeignState(state_id))?
            }
        }
        if let Some(expr) = &item.condition_expr {
            if !expr.is_null() {
                condition::validate(expr).map_err(CtrlError::from)?;
            }
        }
        let id = self.wf_platform.add_workflow_transition(workflow_id, item).await?;
        Ok(self.wf_platform.list_workflow_transitions(workflow_id)
            .await?
            .iter()
            .find(|t| t.id == id)
            .cloned()
            .ok_or_else(|| BackendError::AppInvariantViolation(format!(
                "transition {id} missing after write"
            )))?)
    }

    pub async fn add_state_action(
        &self,
        tenant_id: i64,
        workflow_id: i64,
        item: &NewStateAction,
    ) -> Result<StateAction, PlatformError> {
        let graph = self.get_workflow_graph(tenant_id, workflow_id).await?;
        for state_id in [item.state_id].into_iter().chain(item.next_state_id) {
            if !graph.contains_state(state_id) {
                Err(CtrlError::ForeignState(state_id))?
            }
        }
        if graph.action(item.state_id, &item.action_key).is_some() {
            Err(CtrlError::DuplicateActionKey(item.action_key.clone()))?
        }
        let id = self.wf_platform.add_state_action(item)
            .await
            .map_err(|e| match e {
                BackendError::Contention(_) => PlatformError::from(
                    CtrlError::DuplicateActionKey(item.action_key.clone())
                ),
                e => PlatformError::from(e),
            })?;
        let graph = self.get_workflow_graph(tenant_id, workflow_id).await?;
        Ok(graph.states.iter()
            .flat_map(|state| state.actions.iter().flat_map(|actions| actions.iter()))
            .find(|action| action.id == id)
            .cloned()
            .ok_or_else(|| BackendError::AppInvariantViolation(format!(
                "state action {id} missing after write"
            )))?)
    }
}

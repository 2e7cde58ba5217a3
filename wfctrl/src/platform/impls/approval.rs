use serde_json::json;
use wfcore::{
    ac::Actor,
    approval::{
        ApprovalInstance,
        ApprovalStep,
        ApprovalSteps,
        InstanceAdvance,
        InstanceStatus,
        NewApprovalInstance,
        NewApprovalStep,
        StepCompletion,
        StepStatus,
        TransitionCommit,
        merge_metadata,
        traits::{
            ApprovalInstanceBackend,
            ApprovalStepBackend,
        },
    },
    audit::{
        AuditEntry,
        AuditOperation,
    },
    document::DocumentBackend,
    error::BackendError,
    platform::WFPlatform,
    workflow::{
        Metadata,
        WorkflowState,
    },
};

use crate::{
    error::{
        CtrlError,
        PlatformError,
    },
    platform::{
        Platform,
        TransitionRequest,
    },
};

const INSTANCE_TABLE: &str = "approval_instance";
const STEP_TABLE: &str = "approval_step";

/// The step opened for an instance entering `state`.  Steps are
/// assigned to whoever started the approval.
fn step_for(state: &WorkflowState, assigned_to: i64, now: i64) -> Option<NewApprovalStep> {
    (!state.is_final).then(|| NewApprovalStep {
        state_id: state.id,
        assigned_to,
        assigned_ts: now,
        due_ts: state.due_ts(now),
    })
}

fn instance_status(state: &WorkflowState) -> InstanceStatus {
    if state.is_final {
        InstanceStatus::Completed
    } else {
        InstanceStatus::Active
    }
}

impl Platform {
    /// Start an approval of the document through the workflow.
    ///
    /// The instance begins at the initial state, and moves on through
    /// the first satisfied auto-advance transition out of it, if any.
    pub async fn start_approval(
        &self,
        tenant_id: i64,
        actor: Actor,
        document_id: i64,
        workflow_id: i64,
        metadata: Option<Metadata>,
    ) -> Result<ApprovalInstance, PlatformError> {
        let _guard = self.locks.lock(tenant_id, document_id).await;
        let platform = self.wf_platform.as_ref();

        platform.get_document(tenant_id, document_id)
            .await?
            .ok_or(CtrlError::DocumentNotFound(document_id))?;
        let graph = platform.get_workflow_graph(tenant_id, workflow_id)
            .await?
            .ok_or(CtrlError::WorkflowNotFound(workflow_id))?;
        let initial = graph.initial_state()
            .ok_or(CtrlError::NoInitialState(workflow_id))?;
        if platform.get_active_instance_for_document(tenant_id, document_id).await?.is_some() {
            Err(CtrlError::AlreadyActive(document_id))?
        }

        let metadata = metadata.unwrap_or_default();
        let state = match graph.auto_advance_from(initial.id, &metadata) {
            Some(transition) => {
                log::debug!(
                    "workflow {workflow_id} auto-advancing from {:?} through transition {}",
                    initial.state_key,
                    transition.id,
                );
                graph.state(transition.to_state_id)
                    .ok_or(CtrlError::StateNotFound(transition.to_state_id))?
            }
            None => initial,
        };

        let now = Self::now();
        let first_step = step_for(state, actor.user_id, now);
        let item = NewApprovalInstance {
            tenant_id,
            document_id,
            workflow_id,
            current_state_id: state.id,
            status: instance_status(state),
            started_by: actor.user_id,
            started_ts: now,
            completed_ts: state.is_final.then_some(now),
            due_ts: first_step.as_ref().and_then(|step| step.due_ts),
            metadata,
        };
        let id = platform.start_approval_instance(&item, first_step.as_ref())
            .await
            .map_err(|e| match e {
                BackendError::Contention(_) => PlatformError::from(
                    CtrlError::AlreadyActive(document_id)
                ),
                e => PlatformError::from(e),
            })?;
        log::info!(
            "started approval {id} of document {document_id} at state {:?}",
            state.state_key,
        );

        let instance = self.reload_instance(tenant_id, id).await?;
        self.audit(
            AuditEntry::new(tenant_id, Some(actor.user_id), INSTANCE_TABLE, id, AuditOperation::Insert)
                .new_values(json!({
                    "document_id": document_id,
                    "workflow_id": workflow_id,
                    "current_state_id": instance.current_state_id,
                    "status": instance.status,
                }))
        ).await;
        Ok(instance)
    }

    /// Execute an action of the current state against the document's
    /// active approval.
    pub async fn execute_transition(
        &self,
        tenant_id: i64,
        actor: Actor,
        document_id: i64,
        request: &TransitionRequest,
    ) -> Result<ApprovalInstance, PlatformError> {
        let _guard = self.locks.lock(tenant_id, document_id).await;
        let platform = self.wf_platform.as_ref();

        let instance = platform.get_active_instance_for_document(tenant_id, document_id)
            .await?
            .ok_or(CtrlError::NoActiveInstance(document_id))?;
        let graph = platform.get_workflow_graph(tenant_id, instance.workflow_id)
            .await?
            .ok_or(CtrlError::WorkflowNotFound(instance.workflow_id))?;
        let action = instance.current_state_id
            .and_then(|state_id| graph.action(state_id, &request.action_key))
            .ok_or_else(|| CtrlError::IllegalAction(request.action_key.clone()))?;
        if !action.can_be_executed_by(actor.role) {
            Err(CtrlError::InsufficientRole {
                required: action.requires_role.unwrap_or_default(),
                actual: actor.role,
            })?
        }
        let outcome = StepStatus::from_action_key(&request.action_key)?;

        let pending = platform.get_pending_step(instance.id).await?;
        if let Some(step) = &pending {
            if !step.can_be_completed_by(actor.user_id) {
                Err(CtrlError::NotAssignee(actor.user_id))?
            }
        }

        let now = Self::now();
        let completion = pending.as_ref().map(|step| StepCompletion {
            step_id: step.id,
            status: outcome,
            action_taken: request.action_key.clone(),
            comment: request.comment.clone(),
            delegated_to: request.delegated_to.filter(|_| outcome == StepStatus::Delegated),
            completed_ts: now,
        });

        let (advance, next_step) = match action.next_state_id {
            Some(next_state_id) => {
                let next = graph.state(next_state_id)
                    .ok_or(CtrlError::StateNotFound(next_state_id))?;
                let next_step = step_for(next, instance.started_by, now);
                let advance = InstanceAdvance {
                    expected_state_id: instance.current_state_id,
                    next_state_id,
                    status: instance_status(next),
                    completed_ts: next.is_final.then_some(now),
                    due_ts: next_step.as_ref().and_then(|step| step.due_ts),
                    metadata: merge_metadata(&instance.metadata, request.metadata.as_ref()),
                };
                (Some(advance), next_step)
            }
            None => (None, None),
        };

        if completion.is_some() || advance.is_some() {
            platform.commit_transition(&TransitionCommit {
                instance_id: instance.id,
                completion: completion.clone(),
                advance: advance.clone(),
                next_step,
            }).await?;
        }
        log::info!(
            "executed {:?} on approval {} of document {document_id}",
            request.action_key,
            instance.id,
        );

        if let Some(completion) = &completion {
            self.audit(
                AuditEntry::new(tenant_id, Some(actor.user_id), STEP_TABLE, completion.step_id, AuditOperation::Update)
                    .old_values(json!({"status": StepStatus::Pending}))
                    .new_values(completion)
            ).await;
        }
        if let Some(advance) = &advance {
            self.audit(
                AuditEntry::new(tenant_id, Some(actor.user_id), INSTANCE_TABLE, instance.id, AuditOperation::Update)
                    .old_values(json!({
                        "current_state_id": instance.current_state_id,
                        "status": instance.status,
                    }))
                    .new_values(json!({
                        "current_state_id": advance.next_state_id,
                        "status": advance.status,
                    }))
            ).await;
        }

        self.reload_instance(tenant_id, instance.id).await
    }

    /// Hand the pending step of the document's active approval over to
    /// another user, who becomes its only effective assignee.
    pub async fn delegate_step(
        &self,
        tenant_id: i64,
        user_id: i64,
        document_id: i64,
        delegate_to: i64,
    ) -> Result<ApprovalStep, PlatformError> {
        let _guard = self.locks.lock(tenant_id, document_id).await;
        let platform = self.wf_platform.as_ref();

        let instance = platform.get_active_instance_for_document(tenant_id, document_id)
            .await?
            .ok_or(CtrlError::NoActiveInstance(document_id))?;
        let step = platform.get_pending_step(instance.id)
            .await?
            .ok_or(CtrlError::NoPendingStep(document_id))?;
        if !step.can_be_completed_by(user_id) {
            Err(CtrlError::NotAssignee(user_id))?
        }
        if delegate_to == user_id {
            Err(CtrlError::SelfDelegation)?
        }
        if !platform.delegate_pending_step(step.id, user_id, delegate_to).await? {
            Err(BackendError::Contention(format!(
                "step {} changed while being delegated", step.id
            )))?
        }
        log::info!("step {} of document {document_id} delegated to user {delegate_to}", step.id);

        self.audit(
            AuditEntry::new(tenant_id, Some(user_id), STEP_TABLE, step.id, AuditOperation::Update)
                .old_values(json!({"delegated_to": step.delegated_to}))
                .new_values(json!({"delegated_to": delegate_to}))
        ).await;
        Ok(platform.get_pending_step(instance.id)
            .await?
            .ok_or(CtrlError::NoPendingStep(document_id))?)
    }

    /// The latest approval of the document, with its steps.
    pub async fn get_approval_instance(
        &self,
        tenant_id: i64,
        document_id: i64,
    ) -> Result<Option<ApprovalInstance>, PlatformError> {
        Ok(self.wf_platform.get_instance_with_steps(tenant_id, document_id).await?)
    }

    /// The steps of the document's latest approval, oldest first.
    pub async fn get_approval_history(
        &self,
        tenant_id: i64,
        document_id: i64,
    ) -> Result<ApprovalSteps, PlatformError> {
        Ok(self.get_approval_instance(tenant_id, document_id)
            .await?
            .and_then(|instance| instance.steps)
            .unwrap_or_default())
    }

    /// Pending steps the user is assigned or delegated.
    pub async fn get_pending_approvals(
        &self,
        tenant_id: i64,
        user_id: i64,
    ) -> Result<ApprovalSteps, PlatformError> {
        Ok(self.wf_platform.list_pending_steps_for_user(tenant_id, user_id).await?)
    }
}

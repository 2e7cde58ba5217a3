use async_trait::async_trait;
use crate::{
    approval::{
        ApprovalInstance,
        ApprovalSteps,
        NewApprovalInstance,
        NewApprovalStep,
        OverdueStep,
        ApprovalStep,
        TransitionCommit,
    },
    error::BackendError,
};

#[async_trait]
pub trait ApprovalInstanceBackend {
    /// Create the instance and, if given, its first step in a single
    /// transaction, returning the instance id.  Fails with
    /// `BackendError::Contention` should the document already have an
    /// active instance.
    async fn start_approval_instance(
        &self,
        item: &NewApprovalInstance,
        first_step: Option<&NewApprovalStep>,
    ) -> Result<i64, BackendError>;
    async fn get_approval_instance(
        &self,
        tenant_id: i64,
        id: i64,
    ) -> Result<Option<ApprovalInstance>, BackendError>;
    async fn get_active_instance_for_document(
        &self,
        tenant_id: i64,
        document_id: i64,
    ) -> Result<Option<ApprovalInstance>, BackendError>;
    /// The most recently started instance for the document regardless
    /// of its status.
    async fn get_latest_instance_for_document(
        &self,
        tenant_id: i64,
        document_id: i64,
    ) -> Result<Option<ApprovalInstance>, BackendError>;
    async fn count_active_instances_for_workflow(
        &self,
        tenant_id: i64,
        workflow_id: i64,
    ) -> Result<i64, BackendError>;
    /// Apply every write of an executed action in one transaction.  The
    /// step is only closed while still pending and the instance only
    /// moved while still active at the expected state; otherwise nothing
    /// is written and `BackendError::Contention` is returned.
    async fn commit_transition(
        &self,
        commit: &TransitionCommit,
    ) -> Result<(), BackendError>;
}

#[async_trait]
pub trait ApprovalStepBackend {
    /// Oldest first.
    async fn list_steps_for_instance(
        &self,
        instance_id: i64,
    ) -> Result<ApprovalSteps, BackendError>;
    async fn get_pending_step(
        &self,
        instance_id: i64,
    ) -> Result<Option<ApprovalStep>, BackendError>;
    /// Pending steps within the tenant that are assigned or delegated to
    /// the user.
    async fn list_pending_steps_for_user(
        &self,
        tenant_id: i64,
        user_id: i64,
    ) -> Result<ApprovalSteps, BackendError>;
    /// Hand a pending step over to `delegate_to`, provided `assignee` is
    /// still its effective assignee.
    async fn delegate_pending_step(
        &self,
        step_id: i64,
        assignee: i64,
        delegate_to: i64,
    ) -> Result<bool, BackendError>;
    async fn list_overdue_steps(
        &self,
        now: i64,
    ) -> Result<Vec<OverdueStep>, BackendError>;
    /// Mark a still pending step as timed out, clearing the due time of
    /// its instance along with it.
    async fn timeout_step(
        &self,
        step_id: i64,
        now: i64,
    ) -> Result<bool, BackendError>;
}

use async_trait::async_trait;
use mockall::mock;
use wfcore::{
    approval::{
        ApprovalInstance,
        ApprovalStep,
        ApprovalSteps,
        NewApprovalInstance,
        NewApprovalStep,
        OverdueStep,
        TransitionCommit,
        traits::{
            ApprovalInstanceBackend,
            ApprovalStepBackend,
        },
    },
    audit::{
        AuditBackend,
        AuditEntry,
        AuditLog,
    },
    document::{
        Document,
        DocumentBackend,
    },
    error::BackendError,
    platform::{
        DefaultWFPlatform,
        PlatformUrl,
    },
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
        traits::{
            StateActionBackend,
            WorkflowDefinitionBackend,
            WorkflowStateBackend,
            WorkflowTransitionBackend,
        },
    },
};

mock! {
    pub Platform {
        // The first step is taken by value here as the mock cannot
        // express a reference nested inside of an Option.
        pub async fn instance_start(
            &self,
            item: &NewApprovalInstance,
            first_step: Option<NewApprovalStep>,
        ) -> Result<i64, BackendError>;
        pub async fn instance_get(
            &self,
            tenant_id: i64,
            id: i64,
        ) -> Result<Option<ApprovalInstance>, BackendError>;
        pub async fn instance_get_active_for_document(
            &self,
            tenant_id: i64,
            document_id: i64,
        ) -> Result<Option<ApprovalInstance>, BackendError>;
        pub async fn instance_get_latest_for_document(
            &self,
            tenant_id: i64,
            document_id: i64,
        ) -> Result<Option<ApprovalInstance>, BackendError>;
        pub async fn instance_count_active_for_workflow(
            &self,
            tenant_id: i64,
            workflow_id: i64,
        ) -> Result<i64, BackendError>;
        pub async fn instance_commit_transition(
            &self,
            commit: &TransitionCommit,
        ) -> Result<(), BackendError>;
    }

    #[async_trait]
    impl WorkflowDefinitionBackend for Platform {
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
        async fn delete_workflow_definition(
            &self,
            tenant_id: i64,
            id: i64,
        ) -> Result<bool, BackendError>;
    }

    #[async_trait]
    impl WorkflowStateBackend for Platform {
        async fn add_workflow_state(
            &self,
            workflow_id: i64,
            item: &NewState,
        ) -> Result<i64, BackendError>;
        async fn list_workflow_states(
            &self,
            workflow_id: i64,
        ) -> Result<WorkflowStates, BackendError>;
    }

    #[async_trait]
    impl WorkflowTransitionBackend for Platform {
        async fn add_workflow_transition(
            &self,
            workflow_id: i64,
            item: &NewTransition,
        ) -> Result<i64, BackendError>;
        async fn list_workflow_transitions(
            &self,
            workflow_id: i64,
        ) -> Result<WorkflowTransitions, BackendError>;
    }

    #[async_trait]
    impl StateActionBackend for Platform {
        async fn add_state_action(
            &self,
            item: &NewStateAction,
        ) -> Result<i64, BackendError>;
        async fn list_state_actions_for_workflow(
            &self,
            workflow_id: i64,
        ) -> Result<StateActions, BackendError>;
    }

    #[async_trait]
    impl ApprovalStepBackend for Platform {
        async fn list_steps_for_instance(
            &self,
            instance_id: i64,
        ) -> Result<ApprovalSteps, BackendError>;
        async fn get_pending_step(
            &self,
            instance_id: i64,
        ) -> Result<Option<ApprovalStep>, BackendError>;
        async fn list_pending_steps_for_user(
            &self,
            tenant_id: i64,
            user_id: i64,
        ) -> Result<ApprovalSteps, BackendError>;
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
        async fn timeout_step(
            &self,
            step_id: i64,
            now: i64,
        ) -> Result<bool, BackendError>;
    }

    #[async_trait]
    impl DocumentBackend for Platform {
        async fn add_document(
            &self,
            tenant_id: i64,
            file_name: &str,
        ) -> Result<i64, BackendError>;
        async fn get_document(
            &self,
            tenant_id: i64,
            id: i64,
        ) -> Result<Option<Document>, BackendError>;
    }

    #[async_trait]
    impl AuditBackend for Platform {
        async fn record_audit(
            &self,
            entry: &AuditEntry,
        ) -> Result<i64, BackendError>;
        async fn list_audit_entries(
            &self,
            tenant_id: i64,
            table_name: &str,
            record_id: i64,
        ) -> Result<AuditLog, BackendError>;
    }
}

#[async_trait]
impl ApprovalInstanceBackend for MockPlatform {
    async fn start_approval_instance(
        &self,
        item: &NewApprovalInstance,
        first_step: Option<&NewApprovalStep>,
    ) -> Result<i64, BackendError> {
        self.instance_start(item, first_step.cloned()).await
    }
    async fn get_approval_instance(
        &self,
        tenant_id: i64,
        id: i64,
    ) -> Result<Option<ApprovalInstance>, BackendError> {
        self.instance_get(tenant_id, id).await
    }
    async fn get_active_instance_for_document(
        &self,
        tenant_id: i64,
        document_id: i64,
    ) -> Result<Option<ApprovalInstance>, BackendError> {
        self.instance_get_active_for_document(tenant_id, document_id).await
    }
    async fn get_latest_instance_for_document(
        &self,
        tenant_id: i64,
        document_id: i64,
    ) -> Result<Option<ApprovalInstance>, BackendError> {
        self.instance_get_latest_for_document(tenant_id, document_id).await
    }
    async fn count_active_instances_for_workflow(
        &self,
        tenant_id: i64,
        workflow_id: i64,
    ) -> Result<i64, BackendError> {
        self.instance_count_active_for_workflow(tenant_id, workflow_id).await
    }
    async fn commit_transition(
        &self,
        commit: &TransitionCommit,
    ) -> Result<(), BackendError> {
        self.instance_commit_transition(commit).await
    }
}

impl PlatformUrl for MockPlatform {
    fn url(&self) -> &str {
        "mock::platform"
    }
}

impl DefaultWFPlatform for MockPlatform {}

mock! {
    pub AuditSink {}

    #[async_trait]
    impl AuditBackend for AuditSink {
        async fn record_audit(
            &self,
            entry: &AuditEntry,
        ) -> Result<i64, BackendError>;
        async fn list_audit_entries(
            &self,
            tenant_id: i64,
            table_name: &str,
            record_id: i64,
        ) -> Result<AuditLog, BackendError>;
    }
}

use async_trait::async_trait;
use sqlx::{Sqlite, Transaction};
use wfcore::{
    approval::{
        ApprovalInstance,
        NewApprovalInstance,
        NewApprovalStep,
        TransitionCommit,
        traits::ApprovalInstanceBackend,
    },
    error::BackendError,
};

use crate::{
    SqliteBackend,
    chrono::Utc,
    impls::unique_as_contention,
};

const INSTANCE_COLUMNS: &str = "
    id,
    tenant_id,
    document_id,
    workflow_id,
    current_state_id,
    status,
    started_by,
    started_ts,
    completed_ts,
    due_ts,
    metadata,
    created_ts,
    updated_ts
";

async fn insert_step(
    tx: &mut Transaction<'_, Sqlite>,
    instance_id: i64,
    step: &NewApprovalStep,
) -> Result<i64, BackendError> {
    Ok(sqlx::query(
        "
INSERT INTO approval_step (
    instance_id,
    state_id,
    assigned_to,
    status,
    assigned_ts,
    due_ts
)
VALUES ( ?1, ?2, ?3, 'pending', ?4, ?5 )\
        ",
    )
        .bind(instance_id)
        .bind(step.state_id)
        .bind(step.assigned_to)
        .bind(step.assigned_ts)
        .bind(step.due_ts)
        .execute(&mut **tx)
        .await
        .map_err(|e| unique_as_contention(e, "instance already has a pending step"))?
        .last_insert_rowid()
    )
}

async fn start_approval_instance_sqlite(
    sqlite: &SqliteBackend,
    item: &NewApprovalInstance,
    first_step: Option<&NewApprovalStep>,
) -> Result<i64, BackendError> {
    let ts = Utc::now().timestamp();
    let metadata = serde_json::to_string(&item.metadata)
        .map_err(|e| BackendError::AppInvariantViolation(e.to_string()))?;
    let mut tx = sqlite.pool.begin().await?;
    let id = sqlx::query(
        "
INSERT INTO approval_instance (
    tenant_id,
    document_id,
    workflow_id,
    current_state_id,
    status,
    started_by,
    started_ts,
    completed_ts,
    due_ts,
    metadata,
    created_ts,
    updated_ts
)
VALUES ( ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?11 )\
        ",
    )
        .bind(item.tenant_id)
        .bind(item.document_id)
        .bind(item.workflow_id)
        .bind(item.current_state_id)
        .bind(item.status.to_string())
        .bind(item.started_by)
        .bind(item.started_ts)
        .bind(item.completed_ts)
        .bind(item.due_ts)
        .bind(metadata)
        .bind(ts)
        .execute(&mut *tx)
        .await
        .map_err(|e| unique_as_contention(e, "document already has an active approval"))?
        .last_insert_rowid();
    if let Some(step) = first_step {
        insert_step(&mut tx, id, step).await?;
    }
    tx.commit().await?;
    Ok(id)
}

async fn get_approval_instance_sqlite(
    sqlite: &SqliteBackend,
    tenant_id: i64,
    id: i64,
) -> Result<Option<ApprovalInstance>, BackendError> {
    Ok(sqlx::query_as::<_, ApprovalInstance>(&format!(
        "
SELECT{INSTANCE_COLUMNS}FROM
    approval_instance
WHERE
    id = ?1 AND
    tenant_id = ?2
        ",
    ))
        .bind(id)
        .bind(tenant_id)
        .fetch_optional(&*sqlite.pool)
        .await?
    )
}

async fn get_active_instance_for_document_sqlite(
    sqlite: &SqliteBackend,
    tenant_id: i64,
    document_id: i64,
) -> Result<Option<ApprovalInstance>, BackendError> {
    Ok(sqlx::query_as::<_, ApprovalInstance>(&format!(
        "
SELECT{INSTANCE_COLUMNS}FROM
    approval_instance
WHERE
    document_id = ?1 AND
    tenant_id = ?2 AND
    status = 'active'
        ",
    ))
        .bind(document_id)
        .bind(tenant_id)
        .fetch_optional(&*sqlite.pool)
        .await?
    )
}

async fn get_latest_instance_for_document_sqlite(
    sqlite: &SqliteBackend,
    tenant_id: i64,
    document_id: i64,
) -> Result<Option<ApprovalInstance>, BackendError> {
    Ok(sqlx::query_as::<_, ApprovalInstance>(&format!(
        "
SELECT{INSTANCE_COLUMNS}FROM
    approval_instance
WHERE
    document_id = ?1 AND
    tenant_id = ?2
ORDER BY
    started_ts DESC,
    id DESC
LIMIT 1
        ",
    ))
        .bind(document_id)
        .bind(tenant_id)
        .fetch_optional(&*sqlite.pool)
        .await?
    )
}

async fn count_active_instances_for_workflow_sqlite(
    sqlite: &SqliteBackend,
    tenant_id: i64,
    workflow_id: i64,
) -> Result<i64, BackendError> {
    Ok(sqlx::query_scalar::<_, i64>(
        "
SELECT
    COUNT(*)
FROM
    approval_instance
WHERE
    workflow_id = ?1 AND
    tenant_id = ?2 AND
    status = 'active'
        ",
    )
        .bind(workflow_id)
        .bind(tenant_id)
        .fetch_one(&*sqlite.pool)
        .await?
    )
}

async fn commit_transition_sqlite(
    sqlite: &SqliteBackend,
    commit: &TransitionCommit,
) -> Result<(), BackendError> {
    let ts = Utc::now().timestamp();
    // dropping the transaction on any early return rolls it back.
    let mut tx = sqlite.pool.begin().await?;

    if let Some(completion) = &commit.completion {
        let rows_affected = sqlx::query(
            "
UPDATE
    approval_step
SET
    status = ?3,
    action_taken = ?4,
    comment = ?5,
    delegated_to = COALESCE(?6, delegated_to),
    completed_ts = ?7
WHERE
    id = ?1 AND
    instance_id = ?2 AND
    status = 'pending'
            ",
        )
            .bind(completion.step_id)
            .bind(commit.instance_id)
            .bind(completion.status.to_string())
            .bind(&completion.action_taken)
            .bind(&completion.comment)
            .bind(completion.delegated_to)
            .bind(completion.completed_ts)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        if rows_affected == 0 {
            return Err(BackendError::Contention(format!(
                "approval step {} is no longer pending",
                completion.step_id,
            )));
        }
    }

    match &commit.advance {
        Some(advance) => {
            let metadata = serde_json::to_string(&advance.metadata)
                .map_err(|e| BackendError::AppInvariantViolation(e.to_string()))?;
            let rows_affected = sqlx::query(
                "
UPDATE
    approval_instance
SET
    current_state_id = ?3,
    status = ?4,
    completed_ts = ?5,
    due_ts = ?6,
    metadata = ?7,
    updated_ts = ?8
WHERE
    id = ?1 AND
    status = 'active' AND
    current_state_id IS ?2
                ",
            )
                .bind(commit.instance_id)
                .bind(advance.expected_state_id)
                .bind(advance.next_state_id)
                .bind(advance.status.to_string())
                .bind(advance.completed_ts)
                .bind(advance.due_ts)
                .bind(metadata)
                .bind(ts)
                .execute(&mut *tx)
                .await?
                .rows_affected();
            if rows_affected == 0 {
                return Err(BackendError::Contention(format!(
                    "approval instance {} has moved",
                    commit.instance_id,
                )));
            }
        }
        None => if commit.completion.is_some() {
            // the closed step is not replaced so nothing is due
            sqlx::query(
                "
UPDATE
    approval_instance
SET
    due_ts = NULL,
    updated_ts = ?2
WHERE
    id = ?1 AND
    status = 'active'
                ",
            )
                .bind(commit.instance_id)
                .bind(ts)
                .execute(&mut *tx)
                .await?;
        }
    }

    if let Some(step) = &commit.next_step {
        insert_step(&mut tx, commit.instance_id, step).await?;
    }

    tx.commit().await?;
    Ok(())
}

#[async_trait]
impl ApprovalInstanceBackend for SqliteBackend {
    async fn start_approval_instance(
        &self,
        item: &NewApprovalInstance,
        first_step: Option<&NewApprovalStep>,
    ) -> Result<i64, BackendError> {
        start_approval_instance_sqlite(self, item, first_step).await
    }

    async fn get_approval_instance(
        &self,
        tenant_id: i64,
        id: i64,
    ) -> Result<Option<ApprovalInstance>, BackendError> {
        get_approval_instance_sqlite(self, tenant_id, id).await
    }

    async fn get_active_instance_for_document(
        &self,
        tenant_id: i64,
        document_id: i64,
    ) -> Result<Option<ApprovalInstance>, BackendError> {
        get_active_instance_for_document_sqlite(self, tenant_id, document_id).await
    }

    async fn get_latest_instance_for_document(
        &self,
        tenant_id: i64,
        document_id: i64,
    ) -> Result<Option<ApprovalInstance>, BackendError> {
        get_latest_instance_for_document_sqlite(self, tenant_id, document_id).await
    }

    async fn count_active_instances_for_workflow(
        &self,
        tenant_id: i64,
        workflow_id: i64,
    ) -> Result<i64, BackendError> {
        count_active_instances_for_workflow_sqlite(self, tenant_id, workflow_id).await
    }

    async fn commit_transition(
        &self,
        commit: &TransitionCommit,
    ) -> Result<(), BackendError> {
        commit_transition_sqlite(self, commit).await
    }
}


#[cfg(test)]
mod tests {
    use serde_json::json;
    use wfcore::{
        approval::{
            InstanceAdvance,
            InstanceStatus,
            StepCompletion,
            StepStatus,
            TransitionCommit,
            traits::{
                ApprovalInstanceBackend,
                ApprovalStepBackend,
            },
        },
        error::BackendError,
        workflow::traits::WorkflowDefinitionBackend,
    };
    use crate::impls::testing::{
        backend,
        seed,
    };
    use super::testing::{
        new_instance,
        new_step,
    };

    #[async_std::test]
    async fn test_start() -> anyhow::Result<()> {
        let backend = backend().await?;
        let ids = seed(&backend).await?;
        let id = backend.start_approval_instance(
            &new_instance(&ids),
            Some(&new_step(&ids)),
        ).await?;
        let instance = backend.get_approval_instance(1, id)
            .await?
            .expect("instance");
        assert_eq!(instance.status, InstanceStatus::Active);
        assert_eq!(instance.current_state_id, Some(ids.pending_id));
        assert_eq!(instance.metadata.get("amount"), Some(&json!(1500)));
        assert_eq!(instance.created_ts, 1234567890);
        assert!(backend.get_approval_instance(2, id).await?.is_none());

        let active = backend.get_active_instance_for_document(1, ids.document_id)
            .await?
            .expect("active instance");
        assert_eq!(active.id, id);
        let pending = backend.get_pending_step(id).await?.expect("pending step");
        assert_eq!(pending.status, StepStatus::Pending);
        assert_eq!(pending.assigned_to, 100);
        assert_eq!(backend.count_active_instances_for_workflow(1, ids.workflow_id).await?, 1);

        // the storage rejects a second active instance for the document
        let err = backend.start_approval_instance(&new_instance(&ids), None).await;
        assert!(matches!(err, Err(BackendError::Contention(_))));
        assert_eq!(backend.count_active_instances_for_workflow(1, ids.workflow_id).await?, 1);

        // and refuses to delete the workflow underneath it
        assert!(!backend.delete_workflow_definition(1, ids.workflow_id).await?);
        Ok(())
    }

    #[async_std::test]
    async fn test_commit() -> anyhow::Result<()> {
        let backend = backend().await?;
        let ids = seed(&backend).await?;
        let id = backend.start_approval_instance(
            &new_instance(&ids),
            Some(&new_step(&ids)),
        ).await?;
        let step = backend.get_pending_step(id).await?.expect("pending step");
        let commit = TransitionCommit {
            instance_id: id,
            completion: Some(StepCompletion {
                step_id: step.id,
                status: StepStatus::Approved,
                action_taken: "approve".into(),
                comment: Some("fine".into()),
                delegated_to: None,
                completed_ts: 2000,
            }),
            advance: Some(InstanceAdvance {
                expected_state_id: Some(ids.pending_id),
                next_state_id: ids.approved_id,
                status: InstanceStatus::Completed,
                completed_ts: Some(2000),
                due_ts: None,
                metadata: json!({"amount": 1500, "note": "ok"})
                    .as_object()
                    .cloned()
                    .unwrap_or_default(),
            }),
            next_step: None,
        };
        backend.commit_transition(&commit).await?;

        let instance = backend.get_approval_instance(1, id).await?.expect("instance");
        assert_eq!(instance.status, InstanceStatus::Completed);
        assert_eq!(instance.current_state_id, Some(ids.approved_id));
        assert_eq!(instance.completed_ts, Some(2000));
        assert_eq!(instance.due_ts, None);
        assert_eq!(instance.metadata.get("note"), Some(&json!("ok")));
        assert!(backend.get_active_instance_for_document(1, ids.document_id).await?.is_none());
        assert_eq!(
            backend.get_latest_instance_for_document(1, ids.document_id)
                .await?
                .map(|i| i.id),
            Some(id),
        );

        let steps = backend.list_steps_for_instance(id).await?;
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].status, StepStatus::Approved);
        assert_eq!(steps[0].comment.as_deref(), Some("fine"));
        assert_eq!(steps[0].completed_ts, Some(2000));

        // replaying the same commit loses: the step is no longer pending
        let err = backend.commit_transition(&commit).await;
        assert!(matches!(err, Err(BackendError::Contention(_))));
        Ok(())
    }

    #[async_std::test]
    async fn test_commit_rolls_back() -> anyhow::Result<()> {
        let backend = backend().await?;
        let ids = seed(&backend).await?;
        let id = backend.start_approval_instance(
            &new_instance(&ids),
            Some(&new_step(&ids)),
        ).await?;
        let step = backend.get_pending_step(id).await?.expect("pending step");
        // the instance is not at the expected state, so the step
        // completion written before the check must not survive.
        let err = backend.commit_transition(&TransitionCommit {
            instance_id: id,
            completion: Some(StepCompletion {
                step_id: step.id,
                status: StepStatus::Approved,
                action_taken: "approve".into(),
                comment: None,
                delegated_to: None,
                completed_ts: 2000,
            }),
            advance: Some(InstanceAdvance {
                expected_state_id: Some(ids.start_id),
                next_state_id: ids.approved_id,
                status: InstanceStatus::Completed,
                completed_ts: Some(2000),
                due_ts: None,
                metadata: Default::default(),
            }),
            next_step: None,
        }).await;
        assert!(matches!(err, Err(BackendError::Contention(_))));
        let pending = backend.get_pending_step(id).await?.expect("still pending");
        assert_eq!(pending.id, step.id);
        let instance = backend.get_approval_instance(1, id).await?.expect("instance");
        assert_eq!(instance.current_state_id, Some(ids.pending_id));
        assert_eq!(instance.status, InstanceStatus::Active);
        Ok(())
    }

    #[async_std::test]
    async fn test_terminal_action_clears_due() -> anyhow::Result<()> {
        let backend = backend().await?;
        let ids = seed(&backend).await?;
        let id = backend.start_approval_instance(
            &new_instance(&ids),
            Some(&new_step(&ids)),
        ).await?;
        let step = backend.get_pending_step(id).await?.expect("pending step");
        backend.commit_transition(&TransitionCommit {
            instance_id: id,
            completion: Some(StepCompletion {
                step_id: step.id,
                status: StepStatus::Rejected,
                action_taken: "reject".into(),
                comment: None,
                delegated_to: None,
                completed_ts: 2000,
            }),
            advance: None,
            next_step: None,
        }).await?;
        let instance = backend.get_approval_instance(1, id).await?.expect("instance");
        assert_eq!(instance.current_state_id, Some(ids.pending_id));
        assert_eq!(instance.status, InstanceStatus::Active);
        assert_eq!(instance.due_ts, None);
        assert!(backend.get_pending_step(id).await?.is_none());
        Ok(())
    }
}

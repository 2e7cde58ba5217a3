use async_trait::async_trait;
use wfcore::{
    approval::{
        ApprovalStep,
        ApprovalSteps,
        OverdueStep,
        traits::ApprovalStepBackend,
    },
    error::BackendError,
};

use crate::SqliteBackend;

const STEP_COLUMNS: &str = "
    approval_step.id AS id,
    approval_step.instance_id AS instance_id,
    approval_step.state_id AS state_id,
    approval_step.assigned_to AS assigned_to,
    approval_step.delegated_to AS delegated_to,
    approval_step.status AS status,
    approval_step.action_taken AS action_taken,
    approval_step.comment AS comment,
    approval_step.assigned_ts AS assigned_ts,
    approval_step.due_ts AS due_ts,
    approval_step.completed_ts AS completed_ts
";

async fn list_steps_for_instance_sqlite(
    sqlite: &SqliteBackend,
    instance_id: i64,
) -> Result<ApprovalSteps, BackendError> {
    Ok(sqlx::query_as::<_, ApprovalStep>(&format!(
        "
SELECT{STEP_COLUMNS}FROM
    approval_step
WHERE
    instance_id = ?1
ORDER BY
    assigned_ts,
    id
        ",
    ))
        .bind(instance_id)
        .fetch_all(&*sqlite.pool)
        .await?
        .into()
    )
}

async fn get_pending_step_sqlite(
    sqlite: &SqliteBackend,
    instance_id: i64,
) -> Result<Option<ApprovalStep>, BackendError> {
    Ok(sqlx::query_as::<_, ApprovalStep>(&format!(
        "
SELECT{STEP_COLUMNS}FROM
    approval_step
WHERE
    instance_id = ?1 AND
    status = 'pending'
        ",
    ))
        .bind(instance_id)
        .fetch_optional(&*sqlite.pool)
        .await?
    )
}

async fn list_pending_steps_for_user_sqlite(
    sqlite: &SqliteBackend,
    tenant_id: i64,
    user_id: i64,
) -> Result<ApprovalSteps, BackendError> {
    Ok(sqlx::query_as::<_, ApprovalStep>(&format!(
        "
SELECT{STEP_COLUMNS}FROM
    approval_step
JOIN
    approval_instance ON approval_step.instance_id = approval_instance.id
WHERE
    approval_instance.tenant_id = ?1 AND
    approval_step.status = 'pending' AND
    (approval_step.assigned_to = ?2 OR approval_step.delegated_to = ?2)
ORDER BY
    approval_step.due_ts IS NULL,
    approval_step.due_ts,
    approval_step.id
        ",
    ))
        .bind(tenant_id)
        .bind(user_id)
        .fetch_all(&*sqlite.pool)
        .await?
        .into()
    )
}

async fn delegate_pending_step_sqlite(
    sqlite: &SqliteBackend,
    step_id: i64,
    assignee: i64,
    delegate_to: i64,
) -> Result<bool, BackendError> {
    let rows_affected = sqlx::query(
        "
UPDATE
    approval_step
SET
    delegated_to = ?3
WHERE
    id = ?1 AND
    status = 'pending' AND
    COALESCE(delegated_to, assigned_to) = ?2
        ",
    )
        .bind(step_id)
        .bind(assignee)
        .bind(delegate_to)
        .execute(&*sqlite.pool)
        .await?
        .rows_affected();
    Ok(rows_affected > 0)
}

async fn list_overdue_steps_sqlite(
    sqlite: &SqliteBackend,
    now: i64,
) -> Result<Vec<OverdueStep>, BackendError> {
    Ok(sqlx::query_as::<_, OverdueStep>(&format!(
        "
SELECT
    approval_instance.tenant_id AS tenant_id,
    approval_instance.document_id AS document_id,{STEP_COLUMNS}FROM
    approval_step
JOIN
    approval_instance ON approval_step.instance_id = approval_instance.id
WHERE
    approval_step.status = 'pending' AND
    approval_step.due_ts < ?1
ORDER BY
    approval_step.due_ts,
    approval_step.id
        ",
    ))
        .bind(now)
        .fetch_all(&*sqlite.pool)
        .await?
    )
}

async fn timeout_step_sqlite(
    sqlite: &SqliteBackend,
    step_id: i64,
    now: i64,
) -> Result<bool, BackendError> {
    let mut tx = sqlite.pool.begin().await?;
    let rows_affected = sqlx::query(
        "
UPDATE
    approval_step
SET
    status = 'timeout',
    completed_ts = ?2
WHERE
    id = ?1 AND
    status = 'pending'
        ",
    )
        .bind(step_id)
        .bind(now)
        .execute(&mut *tx)
        .await?
        .rows_affected();
    if rows_affected == 0 {
        return Ok(false);
    }
    // the instance is left without a pending step, so nothing is due
    sqlx::query(
        "
UPDATE
    approval_instance
SET
    due_ts = NULL,
    updated_ts = ?2
WHERE
    id = (SELECT instance_id FROM approval_step WHERE id = ?1) AND
    status = 'active'
        ",
    )
        .bind(step_id)
        .bind(now)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;
    Ok(true)
}

#[async_trait]
impl ApprovalStepBackend for SqliteBackend {
    async fn list_steps_for_instance(
        &self,
        instance_id: i64,
    ) -> Result<ApprovalSteps, BackendError> {
        list_steps_for_instance_sqlite(self, instance_id).await
    }

    async fn get_pending_step(
        &self,
        instance_id: i64,
    ) -> Result<Option<ApprovalStep>, BackendError> {
        get_pending_step_sqlite(self, instance_id).await
    }

    async fn list_pending_steps_for_user(
        &self,
        tenant_id: i64,
        user_id: i64,
    ) -> Result<ApprovalSteps, BackendError> {
        list_pending_steps_for_user_sqlite(self, tenant_id, user_id).await
    }

    async fn delegate_pending_step(
        &self,
        step_id: i64,
        assignee: i64,
        delegate_to: i64,
    ) -> Result<bool, BackendError> {
        delegate_pending_step_sqlite(self, step_id, assignee, delegate_to).await
    }

    async fn list_overdue_steps(
        &self,
        now: i64,
    ) -> Result<Vec<OverdueStep>, BackendError> {
        list_overdue_steps_sqlite(self, now).await
    }

    async fn timeout_step(
        &self,
        step_id: i64,
        now: i64,
    ) -> Result<bool, BackendError> {
        timeout_step_sqlite(self, step_id, now).await
    }
}

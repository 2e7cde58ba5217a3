use async_trait::async_trait;
use wfcore::{
    error::BackendError,
    workflow::{
        NewState,
        WorkflowState,
        WorkflowStates,
        traits::WorkflowStateBackend,
    },
};

use crate::{
    SqliteBackend,
    impls::unique_as_contention,
};

async fn add_workflow_state_sqlite(
    sqlite: &SqliteBackend,
    workflow_id: i64,
    item: &NewState,
) -> Result<i64, BackendError> {
    let id = sqlx::query(
        "
INSERT INTO workflow_state (
    workflow_id,
    state_key,
    label,
    is_initial,
    is_final,
    sla_hours,
    notification_template
)
VALUES ( ?1, ?2, ?3, ?4, ?5, ?6, ?7 )\
        ",
    )
        .bind(workflow_id)
        .bind(&item.state_key)
        .bind(&item.label)
        .bind(item.is_initial)
        .bind(item.is_final)
        .bind(item.sla_hours)
        .bind(&item.notification_template)
        .execute(&*sqlite.pool)
        .await
        .map_err(|e| unique_as_contention(e, "state key already exists in workflow"))?
        .last_insert_rowid();
    Ok(id)
}

async fn list_workflow_states_sqlite(
    sqlite: &SqliteBackend,
    workflow_id: i64,
) -> Result<WorkflowStates, BackendError> {
    Ok(sqlx::query_as::<_, WorkflowState>(
        "
SELECT
    id,
    workflow_id,
    state_key,
    label,
    is_initial,
    is_final,
    sla_hours,
    notification_template
FROM
    workflow_state
WHERE
    workflow_id = ?1
ORDER BY
    id
        ",
    )
        .bind(workflow_id)
        .fetch_all(&*sqlite.pool)
        .await?
        .into()
    )
}

#[async_trait]
impl WorkflowStateBackend for SqliteBackend {
    async fn add_workflow_state(
        &self,
        workflow_id: i64,
        item: &NewState,
    ) -> Result<i64, BackendError> {
        add_workflow_state_sqlite(self, workflow_id, item).await
    }

    async fn list_workflow_states(
        &self,
        workflow_id: i64,
    ) -> Result<WorkflowStates, BackendError> {
        list_workflow_states_sqlite(self, workflow_id).await
    }
}

#[cfg(test)]
mod tests {
    use wfcore::{
        error::BackendError,
        workflow::{
            NewState,
            traits::WorkflowStateBackend,
        },
    };
    use crate::impls::testing::{
        backend,
        seed,
    };

    #[async_std::test]
    async fn test_basic() -> anyhow::Result<()> {
        let backend = backend().await?;
        let ids = seed(&backend).await?;
        let states = backend.list_workflow_states(ids.workflow_id).await?;
        assert_eq!(
            states.iter().map(|s| s.state_key.as_str()).collect::<Vec<_>>(),
            ["start", "pending", "approved"],
        );
        assert_eq!(states[1].sla_hours, Some(48));
        assert!(states[0].is_initial);
        assert!(states[2].is_final);
        assert!(states.iter().all(|s| s.actions.is_none()));

        let err = backend.add_workflow_state(ids.workflow_id, &NewState {
            state_key: "pending".into(),
            label: "Again".into(),
            .. Default::default()
        }).await;
        assert!(matches!(err, Err(BackendError::Contention(_))));
        Ok(())
    }
}

use async_trait::async_trait;
use serde_json::Value;
use wfcore::{
    error::BackendError,
    workflow::{
        NewTransition,
        WorkflowTransition,
        WorkflowTransitions,
        traits::WorkflowTransitionBackend,
    },
};

use crate::SqliteBackend;

async fn add_workflow_transition_sqlite(
    sqlite: &SqliteBackend,
    workflow_id: i64,
    item: &NewTransition,
) -> Result<i64, BackendError> {
    let id = sqlx::query(
        "
INSERT INTO workflow_transition (
    workflow_id,
    from_state_id,
    to_state_id,
    action_key,
    action_label,
    condition_expr,
    requires_comment,
    auto_advance
)
VALUES ( ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8 )\
        ",
    )
        .bind(workflow_id)
        .bind(item.from_state_id)
        .bind(item.to_state_id)
        .bind(&item.action_key)
        .bind(&item.action_label)
        .bind(item.condition_expr.as_ref().map(Value::to_string))
        .bind(item.requires_comment)
        .bind(item.auto_advance)
        .execute(&*sqlite.pool)
        .await?
        .last_insert_rowid();
    Ok(id)
}

async fn list_workflow_transitions_sqlite(
    sqlite: &SqliteBackend,
    workflow_id: i64,
) -> Result<WorkflowTransitions, BackendError> {
    Ok(sqlx::query_as::<_, WorkflowTransition>(
        "
SELECT
    id,
    workflow_id,
    from_state_id,
    to_state_id,
    action_key,
    action_label,
    condition_expr,
    requires_comment,
    auto_advance
FROM
    workflow_transition
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
impl WorkflowTransitionBackend for SqliteBackend {
    async fn add_workflow_transition(
        &self,
        workflow_id: i64,
        item: &NewTransition,
    ) -> Result<i64, BackendError> {
        add_workflow_transition_sqlite(self, workflow_id, item).await
    }

    async fn list_workflow_transitions(
        &self,
        workflow_id: i64,
    ) -> Result<WorkflowTransitions, BackendError> {
        list_workflow_transitions_sqlite(self, workflow_id).await
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wfcore::workflow::{
        NewTransition,
        traits::WorkflowTransitionBackend,
    };
    use crate::impls::testing::{
        backend,
        seed,
    };

    #[async_std::test]
    async fn test_basic() -> anyhow::Result<()> {
        let backend = backend().await?;
        let ids = seed(&backend).await?;
        let condition = json!({">": [{"var": "amount"}, 1000]});
        let id = backend.add_workflow_transition(ids.workflow_id, &NewTransition {
            from_state_id: Some(ids.pending_id),
            to_state_id: ids.approved_id,
            action_key: "fast_track".into(),
            action_label: Some("Fast track".into()),
            condition_expr: Some(condition.clone()),
            requires_comment: true,
            auto_advance: true,
        }).await?;
        let transitions = backend.list_workflow_transitions(ids.workflow_id).await?;
        assert_eq!(transitions.len(), 2);
        assert_eq!(transitions[0].action_key, "start_approval");
        assert_eq!(transitions[0].condition_expr, None);
        assert_eq!(transitions[1].id, id);
        assert_eq!(transitions[1].condition_expr, Some(condition));
        assert!(transitions[1].requires_comment);
        Ok(())
    }
}

use async_trait::async_trait;
use wfcore::{
    error::BackendError,
    workflow::{
        NewStateAction,
        StateAction,
        StateActions,
        traits::StateActionBackend,
    },
};

use crate::{
    SqliteBackend,
    impls::unique_as_contention,
};

async fn add_state_action_sqlite(
    sqlite: &SqliteBackend,
    item: &NewStateAction,
) -> Result<i64, BackendError> {
    let id = sqlx::query(
        "
INSERT INTO state_action (
    state_id,
    action_key,
    action_label,
    next_state_id,
    requires_role,
    display_order,
    is_default
)
VALUES ( ?1, ?2, ?3, ?4, ?5, ?6, ?7 )\
        ",
    )
        .bind(item.state_id)
        .bind(&item.action_key)
        .bind(&item.action_label)
        .bind(item.next_state_id)
        .bind(item.requires_role.map(|role| role.to_string()))
        .bind(item.display_order)
        .bind(item.is_default)
        .execute(&*sqlite.pool)
        .await
        .map_err(|e| unique_as_contention(e, "action key already exists on state"))?
        .last_insert_rowid();
    Ok(id)
}

async fn list_state_actions_for_workflow_sqlite(
    sqlite: &SqliteBackend,
    workflow_id: i64,
) -> Result<StateActions, BackendError> {
    Ok(sqlx::query_as::<_, StateAction>(
        "
SELECT
    state_action.id AS id,
    state_action.state_id AS state_id,
    state_action.action_key AS action_key,
    state_action.action_label AS action_label,
    state_action.next_state_id AS next_state_id,
    state_action.requires_role AS requires_role,
    state_action.display_order AS display_order,
    state_action.is_default AS is_default
FROM
    state_action
JOIN
    workflow_state ON state_action.state_id = workflow_state.id
WHERE
    workflow_state.workflow_id = ?1
ORDER BY
    state_action.state_id,
    state_action.display_order,
    state_action.id
        ",
    )
        .bind(workflow_id)
        .fetch_all(&*sqlite.pool)
        .await?
        .into()
    )
}

#[async_trait]
impl StateActionBackend for SqliteBackend {
    async fn add_state_action(
        &self,
        item: &NewStateAction,
    ) -> Result<i64, BackendError> {
        add_state_action_sqlite(self, item).await
    }

    async fn list_state_actions_for_workflow(
        &self,
        workflow_id: i64,
    ) -> Result<StateActions, BackendError> {
        list_state_actions_for_workflow_sqlite(self, workflow_id).await
    }
}

#[cfg(test)]
mod tests {
    use wfcore::{
        ac::Role,
        error::BackendError,
        workflow::{
            NewStateAction,
            traits::StateActionBackend,
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
        backend.add_state_action(&NewStateAction {
            state_id: ids.pending_id,
            action_key: "reject".into(),
            action_label: "Reject".into(),
            next_state_id: None,
            requires_role: None,
            display_order: 0,
            is_default: false,
        }).await?;
        let actions = backend.list_state_actions_for_workflow(ids.workflow_id).await?;
        assert_eq!(
            actions.iter().map(|a| a.action_key.as_str()).collect::<Vec<_>>(),
            ["reject", "approve"],
        );
        assert_eq!(actions[0].requires_role, None);
        assert_eq!(actions[1].requires_role, Some(Role::Editor));

        let err = backend.add_state_action(&NewStateAction {
            state_id: ids.pending_id,
            action_key: "approve".into(),
            action_label: "Approve again".into(),
            .. Default::default()
        }).await;
        assert!(matches!(err, Err(BackendError::Contention(_))));
        Ok(())
    }
}

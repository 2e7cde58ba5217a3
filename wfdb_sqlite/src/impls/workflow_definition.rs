use async_trait::async_trait;
use serde_json::Value;
use wfcore::{
    error::BackendError,
    workflow::{
        NewWorkflowDefinition,
        WorkflowDefinition,
        WorkflowDefinitionPatch,
        WorkflowDefinitions,
        traits::WorkflowDefinitionBackend,
    },
};

use crate::{
    SqliteBackend,
    chrono::Utc,
    impls::unique_as_contention,
};

async fn add_workflow_definition_sqlite(
    sqlite: &SqliteBackend,
    tenant_id: i64,
    created_by: i64,
    item: &NewWorkflowDefinition,
) -> Result<i64, BackendError> {
    let ts = Utc::now().timestamp();
    let id = sqlx::query(
        "
INSERT INTO workflow_definition (
    tenant_id,
    name,
    description,
    version,
    graph_json,
    is_active,
    created_by,
    created_ts,
    updated_ts
)
VALUES ( ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8 )\
        ",
    )
        .bind(tenant_id)
        .bind(&item.name)
        .bind(&item.description)
        .bind(item.version.unwrap_or(1))
        .bind(item.graph_json.as_ref().map(Value::to_string))
        .bind(item.is_active.unwrap_or(true))
        .bind(created_by)
        .bind(ts)
        .execute(&*sqlite.pool)
        .await
        .map_err(|e| unique_as_contention(e, "workflow name and version already exist"))?
        .last_insert_rowid();
    Ok(id)
}

async fn get_workflow_definition_sqlite(
    sqlite: &SqliteBackend,
    tenant_id: i64,
    id: i64,
) -> Result<Option<WorkflowDefinition>, BackendError> {
    Ok(sqlx::query_as::<_, WorkflowDefinition>(
        "
SELECT
    id,
    tenant_id,
    name,
    description,
    version,
    graph_json,
    is_active,
    created_by,
    created_ts,
    updated_ts
FROM
    workflow_definition
WHERE
    id = ?1 AND
    tenant_id = ?2
        ",
    )
        .bind(id)
        .bind(tenant_id)
        .fetch_optional(&*sqlite.pool)
        .await?
    )
}

async fn list_workflow_definitions_sqlite(
    sqlite: &SqliteBackend,
    tenant_id: i64,
) -> Result<WorkflowDefinitions, BackendError> {
    Ok(sqlx::query_as::<_, WorkflowDefinition>(
        "
SELECT
    id,
    tenant_id,
    name,
    description,
    version,
    graph_json,
    is_active,
    created_by,
    created_ts,
    updated_ts
FROM
    workflow_definition
WHERE
    tenant_id = ?1
ORDER BY
    name ASC,
    version DESC
        ",
    )
        .bind(tenant_id)
        .fetch_all(&*sqlite.pool)
        .await?
        .into()
    )
}

async fn update_workflow_definition_sqlite(
    sqlite: &SqliteBackend,
    tenant_id: i64,
    id: i64,
    patch: &WorkflowDefinitionPatch,
) -> Result<bool, BackendError> {
    let updated_ts = Utc::now().timestamp();
    let rows_affected = sqlx::query(
        "
UPDATE
    workflow_definition
SET
    name = COALESCE(?3, name),
    description = COALESCE(?4, description),
    version = COALESCE(?5, version),
    graph_json = COALESCE(?6, graph_json),
    is_active = COALESCE(?7, is_active),
    updated_ts = ?8
WHERE
    id = ?1 AND
    tenant_id = ?2
        ",
    )
        .bind(id)
        .bind(tenant_id)
        .bind(&patch.name)
        .bind(&patch.description)
        .bind(patch.version)
        .bind(patch.graph_json.as_ref().map(Value::to_string))
        .bind(patch.is_active)
        .bind(updated_ts)
        .execute(&*sqlite.pool)
        .await
        .map_err(|e| unique_as_contention(e, "workflow name and version already exist"))?
        .rows_affected();
    Ok(rows_affected > 0)
}

async fn delete_workflow_definition_sqlite(
    sqlite: &SqliteBackend,
    tenant_id: i64,
    id: i64,
) -> Result<bool, BackendError> {
    // the active instance check is part of the statement so a concurrent
    // start cannot slip in between check and delete.
    let rows_affected = sqlx::query(
        "
DELETE FROM
    workflow_definition
WHERE
    id = ?1 AND
    tenant_id = ?2 AND
    NOT EXISTS (
        SELECT
            1
        FROM
            approval_instance
        WHERE
            workflow_id = ?1 AND
            status = 'active'
    )
        ",
    )
        .bind(id)
        .bind(tenant_id)
        .execute(&*sqlite.pool)
        .await?
        .rows_affected();
    Ok(rows_affected > 0)
}

#[async_trait]
impl WorkflowDefinitionBackend for SqliteBackend {
    async fn add_workflow_definition(
        &self,
        tenant_id: i64,
        created_by: i64,
        item: &NewWorkflowDefinition,
    ) -> Result<i64, BackendError> {
        add_workflow_definition_sqlite(self, tenant_id, created_by, item).await
    }

    async fn get_workflow_definition(
        &self,
        tenant_id: i64,
        id: i64,
    ) -> Result<Option<WorkflowDefinition>, BackendError> {
        get_workflow_definition_sqlite(self, tenant_id, id).await
    }

    async fn list_workflow_definitions(
        &self,
        tenant_id: i64,
    ) -> Result<WorkflowDefinitions, BackendError> {
        list_workflow_definitions_sqlite(self, tenant_id).await
    }

    async fn update_workflow_definition(
        &self,
        tenant_id: i64,
        id: i64,
        patch: &WorkflowDefinitionPatch,
    ) -> Result<bool, BackendError> {
        update_workflow_definition_sqlite(self, tenant_id, id, patch).await
    }

    async fn delete_workflow_definition(
        &self,
        tenant_id: i64,
        id: i64,
    ) -> Result<bool, BackendError> {
        delete_workflow_definition_sqlite(self, tenant_id, id).await
    }
}

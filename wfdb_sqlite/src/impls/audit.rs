use async_trait::async_trait;
use serde_json::Value;
use wfcore::{
    audit::{
        AuditBackend,
        AuditEntry,
        AuditLog,
    },
    error::BackendError,
};

use crate::{
    SqliteBackend,
    chrono::Utc,
};

async fn record_audit_sqlite(
    sqlite: &SqliteBackend,
    entry: &AuditEntry,
) -> Result<i64, BackendError> {
    let created_ts = Utc::now().timestamp();
    let id = sqlx::query(
        "
INSERT INTO audit_log (
    tenant_id,
    user_id,
    table_name,
    record_id,
    operation,
    old_values,
    new_values,
    created_ts
)
VALUES ( ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8 )\
        ",
    )
        .bind(entry.tenant_id)
        .bind(entry.user_id)
        .bind(&entry.table_name)
        .bind(entry.record_id)
        .bind(entry.operation.to_string())
        .bind(entry.old_values.as_ref().map(Value::to_string))
        .bind(entry.new_values.as_ref().map(Value::to_string))
        .bind(created_ts)
        .execute(&*sqlite.pool)
        .await?
        .last_insert_rowid();
    Ok(id)
}

async fn list_audit_entries_sqlite(
    sqlite: &SqliteBackend,
    tenant_id: i64,
    table_name: &str,
    record_id: i64,
) -> Result<AuditLog, BackendError> {
    Ok(sqlx::query_as::<_, AuditEntry>(
        "
SELECT
    id,
    tenant_id,
    user_id,
    table_name,
    record_id,
    operation,
    old_values,
    new_values,
    created_ts
FROM
    audit_log
WHERE
    tenant_id = ?1 AND
    table_name = ?2 AND
    record_id = ?3
ORDER BY
    id
        ",
    )
        .bind(tenant_id)
        .bind(table_name)
        .bind(record_id)
        .fetch_all(&*sqlite.pool)
        .await?
        .into()
    )
}

#[async_trait]
impl AuditBackend for SqliteBackend {
    async fn record_audit(
        &self,
        entry: &AuditEntry,
    ) -> Result<i64, BackendError> {
        record_audit_sqlite(self, entry).await
    }

    async fn list_audit_entries(
        &self,
        tenant_id: i64,
        table_name: &str,
        record_id: i64,
    ) -> Result<AuditLog, BackendError> {
        list_audit_entries_sqlite(self, tenant_id, table_name, record_id).await
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wfcore::audit::{
        AuditBackend,
        AuditEntry,
        AuditOperation,
    };
    use crate::impls::testing::backend;

    #[async_std::test]
    async fn test_basic() -> anyhow::Result<()> {
        let backend = backend().await?;
        backend.record_audit(
            &AuditEntry::new(1, Some(100), "approval_instance", 7, AuditOperation::Insert)
                .new_values(json!({"status": "active"}))
        ).await?;
        backend.record_audit(
            &AuditEntry::new(1, None, "approval_instance", 7, AuditOperation::Update)
                .old_values(json!({"status": "active"}))
                .new_values(json!({"status": "completed"}))
        ).await?;
        backend.record_audit(
            &AuditEntry::new(2, Some(100), "approval_instance", 7, AuditOperation::Insert)
        ).await?;

        let log = backend.list_audit_entries(1, "approval_instance", 7).await?;
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].operation, AuditOperation::Insert);
        assert_eq!(log[0].user_id, Some(100));
        assert_eq!(log[0].old_values, None);
        assert_eq!(log[0].created_ts, 1234567890);
        assert_eq!(log[1].user_id, None);
        assert_eq!(log[1].old_values, Some(json!({"status": "active"})));
        assert_eq!(log[1].new_values, Some(json!({"status": "completed"})));

        assert!(backend.list_audit_entries(1, "workflow_definition", 7).await?.is_empty());
        Ok(())
    }
}

use async_trait::async_trait;
use wfcore::{
    document::{
        Document,
        DocumentBackend,
    },
    error::BackendError,
};

use crate::{
    SqliteBackend,
    chrono::Utc,
};

async fn add_document_sqlite(
    sqlite: &SqliteBackend,
    tenant_id: i64,
    file_name: &str,
) -> Result<i64, BackendError> {
    let created_ts = Utc::now().timestamp();
    let id = sqlx::query(
        "
INSERT INTO document (
    tenant_id,
    file_name,
    created_ts
)
VALUES ( ?1, ?2, ?3 )\
        ",
    )
        .bind(tenant_id)
        .bind(file_name)
        .bind(created_ts)
        .execute(&*sqlite.pool)
        .await?
        .last_insert_rowid();
    Ok(id)
}

async fn get_document_sqlite(
    sqlite: &SqliteBackend,
    tenant_id: i64,
    id: i64,
) -> Result<Option<Document>, BackendError> {
    Ok(sqlx::query_as::<_, Document>(
        "
SELECT
    id,
    tenant_id,
    file_name,
    created_ts
FROM
    document
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

#[async_trait]
impl DocumentBackend for SqliteBackend {
    async fn add_document(
        &self,
        tenant_id: i64,
        file_name: &str,
    ) -> Result<i64, BackendError> {
        add_document_sqlite(self, tenant_id, file_name).await
    }

    async fn get_document(
        &self,
        tenant_id: i64,
        id: i64,
    ) -> Result<Option<Document>, BackendError> {
        get_document_sqlite(self, tenant_id, id).await
    }
}

#[cfg(test)]
mod tests {
    use wfcore::document::{
        Document,
        DocumentBackend,
    };
    use crate::impls::testing::backend;

    #[async_std::test]
    async fn test_basic() -> anyhow::Result<()> {
        let backend = backend().await?;
        let id = backend.add_document(1, "invoice.pdf").await?;
        assert_eq!(backend.get_document(1, id).await?, Some(Document {
            id,
            tenant_id: 1,
            file_name: "invoice.pdf".into(),
            created_ts: 1234567890,
        }));
        assert_eq!(backend.get_document(2, id).await?, None);
        assert_eq!(backend.get_document(1, id + 1).await?, None);
        Ok(())
    }
}

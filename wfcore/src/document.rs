use async_trait::async_trait;
use serde::{Deserialize, Serialize};
#[cfg(feature = "sqlx")]
use sqlx::{
    sqlite::SqliteRow,
    FromRow,
    Row,
};

use crate::error::BackendError;

/// The part of a tenant's document an approval needs to know about.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Document {
    pub id: i64,
    pub tenant_id: i64,
    pub file_name: String,
    pub created_ts: i64,
}

#[cfg(feature = "sqlx")]
impl<'c> FromRow<'c, SqliteRow> for Document {
    fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Document {
            id: row.get(0),
            tenant_id: row.get(1),
            file_name: row.get(2),
            created_ts: row.get(3),
        })
    }
}

#[async_trait]
pub trait DocumentBackend {
    async fn add_document(
        &self,
        tenant_id: i64,
        file_name: &str,
    ) -> Result<i64, BackendError>;
    /// `None` for a document that does not exist or belongs to another
    /// tenant.
    async fn get_document(
        &self,
        tenant_id: i64,
        id: i64,
    ) -> Result<Option<Document>, BackendError>;
}

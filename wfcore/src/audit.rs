use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
#[cfg(feature = "sqlx")]
use sqlx::{
    sqlite::SqliteRow,
    FromRow,
    Row,
};
use std::ops::Deref;

use crate::error::BackendError;
#[cfg(feature = "sqlx")]
use crate::row;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditOperation {
    Insert,
    Update,
    Delete,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct AuditEntry {
    #[serde(default)]
    pub id: i64,
    pub tenant_id: i64,
    pub user_id: Option<i64>,
    pub table_name: String,
    pub record_id: i64,
    pub operation: AuditOperation,
    pub old_values: Option<Value>,
    pub new_values: Option<Value>,
    #[serde(default)]
    pub created_ts: i64,
}

#[cfg(feature = "sqlx")]
impl<'c> FromRow<'c, SqliteRow> for AuditEntry {
    fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(AuditEntry {
            id: row.try_get("id")?,
            tenant_id: row.try_get("tenant_id")?,
            user_id: row.try_get("user_id")?,
            table_name: row.try_get("table_name")?,
            record_id: row.try_get("record_id")?,
            operation: row::required(row, "operation")?,
            old_values: row::json(row, "old_values")?,
            new_values: row::json(row, "new_values")?,
            created_ts: row.try_get("created_ts")?,
        })
    }
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct AuditLog(Vec<AuditEntry>);

impl AuditEntry {
    pub fn new(
        tenant_id: i64,
        user_id: Option<i64>,
        table_name: &str,
        record_id: i64,
        operation: AuditOperation,
    ) -> Self {
        Self {
            id: 0,
            tenant_id,
            user_id,
            table_name: table_name.to_string(),
            record_id,
            operation,
            old_values: None,
            new_values: None,
            created_ts: 0,
        }
    }

    pub fn old_values(mut self, value: impl Serialize) -> Self {
        self.old_values = serde_json::to_value(value).ok();
        self
    }

    pub fn new_values(mut self, value: impl Serialize) -> Self {
        self.new_values = serde_json::to_value(value).ok();
        self
    }
}

impl std::fmt::Display for AuditOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.write_str(match self {
            AuditOperation::Insert => "insert",
            AuditOperation::Update => "update",
            AuditOperation::Delete => "delete",
        })
    }
}

impl std::str::FromStr for AuditOperation {
    type Err = crate::error::ValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_ref() {
            "insert" => Ok(AuditOperation::Insert),
            "update" => Ok(AuditOperation::Update),
            "delete" => Ok(AuditOperation::Delete),
            s => Err(crate::error::ValueError::Unsupported(s.to_string())),
        }
    }
}

impl From<Vec<AuditEntry>> for AuditLog {
    fn from(entries: Vec<AuditEntry>) -> Self {
        Self(entries)
    }
}

impl Deref for AuditLog {
    type Target = Vec<AuditEntry>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Sink for the audit trail.  Writes are best effort from the point of
/// view of the callers.
#[async_trait]
pub trait AuditBackend {
    async fn record_audit(
        &self,
        entry: &AuditEntry,
    ) -> Result<i64, BackendError>;
    /// Entries for a single record, oldest first.
    async fn list_audit_entries(
        &self,
        tenant_id: i64,
        table_name: &str,
        record_id: i64,
    ) -> Result<AuditLog, BackendError>;
}

#[cfg(test)]
mod test {
    use serde_json::json;
    use super::*;

    #[test]
    fn builder() {
        let entry = AuditEntry::new(1, Some(2), "approval_instance", 3, AuditOperation::Update)
            .old_values(json!({"current_state_id": 1}))
            .new_values(json!({"current_state_id": 2}));
        assert_eq!(entry.new_values, Some(json!({"current_state_id": 2})));
        assert_eq!(entry.operation.to_string(), "update");
        assert_eq!("DELETE".parse::<AuditOperation>().ok(), Some(AuditOperation::Delete));
    }
}

//! Column decoding shared by the `FromRow` implementations.
use serde_json::Value;
use sqlx::{
    sqlite::SqliteRow,
    Row,
};
use std::str::FromStr;

/// Decode a nullable TEXT column holding JSON.
pub(crate) fn json<T>(row: &SqliteRow, column: &str) -> Result<Option<T>, sqlx::Error>
where
    T: serde::de::DeserializeOwned,
{
    row.try_get::<Option<String>, _>(column)?
        .map(|text| serde_json::from_str(&text))
        .transpose()
        .map_err(|e| sqlx::Error::ColumnDecode {
            index: column.to_string(),
            source: Box::new(e),
        })
}

/// Decode a nullable TEXT column through `FromStr`.
pub(crate) fn parsed<T>(row: &SqliteRow, column: &str) -> Result<Option<T>, sqlx::Error>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    row.try_get::<Option<String>, _>(column)?
        .map(|text| text.parse::<T>())
        .transpose()
        .map_err(|e| sqlx::Error::ColumnDecode {
            index: column.to_string(),
            source: Box::new(e),
        })
}

/// As [`parsed`], for a NOT NULL column.
pub(crate) fn required<T>(row: &SqliteRow, column: &str) -> Result<T, sqlx::Error>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    parsed(row, column)?
        .ok_or_else(|| sqlx::Error::ColumnNotFound(column.to_string()))
}

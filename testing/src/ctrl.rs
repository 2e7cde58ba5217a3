use wfcore::{
    document::DocumentBackend,
    platform::PlatformConnector,
};
use wfctrl::platform::Platform;
use wfdb_sqlite::SqliteBackend;

/// A platform over a migrated in-memory database holding documents 1
/// and 2 for tenant 1, and document 3 for tenant 2.
pub async fn create_sqlite_platform() -> anyhow::Result<Platform> {
    let backend = SqliteBackend::wf("sqlite::memory:".into())
        .await
        .map_err(anyhow::Error::from_boxed)?;
    backend.add_document(1, "invoice-0001.pdf").await?;
    backend.add_document(1, "invoice-0002.pdf").await?;
    backend.add_document(2, "receipt-0001.pdf").await?;
    Ok(Platform::new(backend))
}

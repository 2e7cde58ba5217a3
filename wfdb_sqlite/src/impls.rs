use async_trait::async_trait;
use sqlx::{migrate::MigrateDatabase, Sqlite, SqlitePool};
use std::sync::Arc;
use wfcore::{
    error::BackendError,
    platform::{
        ConnectorOption,
        PlatformConnector,
        PlatformUrl,
    },
};

use crate::SqliteBackend;

impl PlatformUrl for SqliteBackend {
    fn url(&self) -> &str {
        self.url.as_ref()
    }
}

impl SqliteBackend {
    pub async fn connect(opts: ConnectorOption) -> Result<SqliteBackend, sqlx::Error> {
        if opts.auto_create_db && !Sqlite::database_exists(&opts.url).await.unwrap_or(false) {
            log::warn!("sqlite database {} does not exist; creating...", &opts.url);
            Sqlite::create_database(&opts.url).await?
        }

        let pool = SqlitePool::connect(&opts.url).await?;
        Ok(SqliteBackend {
            pool: Arc::new(pool),
            url: opts.url,
        })
    }

    pub async fn migrate_wf(self) -> Result<Self, sqlx::Error> {
        sqlx::migrate!("migrations/wfdb").run(&*self.pool).await?;
        Ok(self)
    }
}

#[async_trait]
impl PlatformConnector for SqliteBackend {
    async fn wf(opts: ConnectorOption) -> Result<Self, Box<dyn std::error::Error + Send + Sync + 'static>> {
        let backend = SqliteBackend::connect(opts).await
            .map_err(Box::new)?
            .migrate_wf()
            .await
            .map_err(Box::new)?;
        Ok(backend)
    }
}

/// Unique index violations become `Contention`; everything else stays a
/// storage error.
pub(crate) fn unique_as_contention(err: sqlx::Error, what: &str) -> BackendError {
    match err {
        sqlx::Error::Database(ref db) if db.is_unique_violation() => {
            BackendError::Contention(format!("{what}: {db}"))
        }
        err => BackendError::from(err),
    }
}

mod document;

mod workflow_definition;
mod workflow_state;
mod workflow_transition;
mod state_action;

mod approval_instance;
mod approval_step;

mod audit;

mod default_impl {
    use wfcore::platform::DefaultWFPlatform;
    use crate::SqliteBackend;

    impl DefaultWFPlatform for SqliteBackend {}
}

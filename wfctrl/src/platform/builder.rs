use clap::{ArgAction, Parser};
use std::{
    error::Error,
    fmt,
};
use wfcore::platform::{
    ConnectorOption,
    PlatformConnector,
};
use wfdb_sqlite::SqliteBackend;

use super::Platform;

#[derive(Debug)]
struct UnsupportedUrl(String);

impl fmt::Display for UnsupportedUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "The connection string {:?} is unsupported.", self.0)
    }
}

impl Error for UnsupportedUrl {}

#[derive(Clone, Debug, Default, Parser)]
pub struct Builder {
    #[clap(
        long,
        value_name = "WF_AUTO_CREATE_DB",
        env = "WF_AUTO_CREATE_DB",
        action = ArgAction::Set,
        default_value_t = true,
        default_missing_value = "true",
    )]
    pub wf_auto_create_db: bool,
    #[clap(long, value_name = "WF_DB_URL", env = "WF_DB_URL")]
    pub wf_db_url: String,
}

impl Builder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn wf_auto_create_db(mut self, value: bool) -> Self {
        self.wf_auto_create_db = value;
        self
    }

    pub fn wf_db_url(mut self, value: String) -> Self {
        self.wf_db_url = value;
        self
    }

    pub async fn build(self) -> Result<Platform, Box<dyn Error + Send + Sync>> {
        match self.wf_db_url.split(':').next() {
            Some("sqlite") => Ok(Platform::new(
                SqliteBackend::wf(
                    ConnectorOption::from(&self.wf_db_url)
                        .auto_create_db(self.wf_auto_create_db)
                ).await?
            )),
            _ => Err(Box::new(UnsupportedUrl(self.wf_db_url))),
        }
    }
}

#[cfg(test)]
mod test {
    use wfcore::platform::PlatformUrl;
    use super::*;

    #[async_std::test]
    async fn build() -> anyhow::Result<()> {
        assert!(Builder::new()
            .wf_db_url("postgres://localhost/wf".into())
            .build()
            .await
            .is_err());
        let platform = Builder::new()
            .wf_db_url("sqlite::memory:".into())
            .build()
            .await
            .map_err(anyhow::Error::from_boxed)?;
        assert_eq!(platform.wf_platform.url(), "sqlite::memory:");
        Ok(())
    }
}

use chrono::Utc;
use std::sync::Arc;
use wfcore::{
    approval::{
        ApprovalInstance,
        traits::{
            ApprovalInstanceBackend,
            ApprovalStepBackend,
        },
    },
    audit::{
        AuditBackend,
        AuditEntry,
    },
    error::BackendError,
    platform::WFPlatform,
};

use crate::{
    error::PlatformError,
    platform::Platform,
};

impl Platform {
    pub fn new(wf_platform: impl WFPlatform + 'static) -> Self {
        Self::from_arc(Arc::new(wf_platform))
    }

    pub fn from_arc(wf_platform: Arc<dyn WFPlatform>) -> Self {
        Self {
            wf_platform,
            audit_sink: None,
            locks: Default::default(),
        }
    }

    /// Send the audit trail somewhere other than the platform's own
    /// audit backend.
    pub fn audit_sink(mut self, sink: Arc<dyn AuditBackend + Send + Sync>) -> Self {
        self.audit_sink = Some(sink);
        self
    }

    pub(crate) fn now() -> i64 {
        Utc::now().timestamp()
    }

    /// Record the entry, logging rather than returning any failure.
    pub(crate) async fn audit(&self, entry: AuditEntry) {
        let result = match &self.audit_sink {
            Some(sink) => sink.record_audit(&entry).await,
            None => self.wf_platform.record_audit(&entry).await,
        };
        if let Err(e) = result {
            log::warn!(
                "failed to record audit entry for {} {}: {e}",
                entry.table_name,
                entry.record_id,
            );
        }
    }

    /// An instance that was just written by this platform, with its
    /// steps loaded.
    pub(crate) async fn reload_instance(
        &self,
        tenant_id: i64,
        id: i64,
    ) -> Result<ApprovalInstance, PlatformError> {
        let mut instance = self.wf_platform
            .get_approval_instance(tenant_id, id)
            .await?
            .ok_or_else(|| BackendError::AppInvariantViolation(format!(
                "approval instance {id} missing after write"
            )))?;
        instance.steps = Some(self.wf_platform.list_steps_for_instance(id).await?);
        Ok(instance)
    }
}

mod approval;
mod sweep;
mod workflow;

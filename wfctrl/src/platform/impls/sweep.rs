use serde_json::json;
use wfcore::{
    approval::{
        OverdueStep,
        StepStatus,
        traits::ApprovalStepBackend,
    },
    audit::{
        AuditEntry,
        AuditOperation,
    },
};

use crate::{
    error::PlatformError,
    platform::Platform,
};

impl Platform {
    /// Time out every pending step whose due time passed before `now`.
    ///
    /// Only the steps are closed; the instances stay where they are, with
    /// their due time cleared.
    /// Returns the steps that were timed out by this call.
    pub async fn sweep_overdue_steps(
        &self,
        now: i64,
    ) -> Result<Vec<OverdueStep>, PlatformError> {
        let overdue = self.wf_platform.list_overdue_steps(now).await?;
        let mut swept = Vec::with_capacity(overdue.len());
        for mut item in overdue.into_iter() {
            let _guard = self.locks.lock(item.tenant_id, item.document_id).await;
            // a step completed since it was listed is left alone
            if !self.wf_platform.timeout_step(item.step.id, now).await? {
                log::debug!("step {} no longer pending; not timed out", item.step.id);
                continue;
            }
            log::info!(
                "step {} of document {} timed out (due {:?})",
                item.step.id,
                item.document_id,
                item.step.due_ts,
            );
            self.audit(
                AuditEntry::new(item.tenant_id, None, "approval_step", item.step.id, AuditOperation::Update)
                    .old_values(json!({"status": StepStatus::Pending}))
                    .new_values(json!({"status": StepStatus::Timeout, "completed_ts": now}))
            ).await;
            item.step.status = StepStatus::Timeout;
            item.step.completed_ts = Some(now);
            swept.push(item);
        }
        Ok(swept)
    }
}

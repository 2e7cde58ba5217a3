use std::sync::Arc;
use wfcore::{
    audit::AuditBackend,
    platform::WFPlatform,
};

use crate::lock::DocumentLocks;

mod builder;
mod impls;
mod types;

pub use builder::Builder;
pub use types::TransitionRequest;

/// The workflow service.
///
/// Owns the storage platform and orchestrates definition authoring and
/// the approval runtime on top of it.  State changing operations on a
/// document are serialized through a per-document lock; the storage
/// layer additionally guards every write against concurrent writers.
#[derive(Clone)]
pub struct Platform {
    pub wf_platform: Arc<dyn WFPlatform>,
    pub(crate) audit_sink: Option<Arc<dyn AuditBackend + Send + Sync>>,
    pub(crate) locks: Arc<DocumentLocks>,
}

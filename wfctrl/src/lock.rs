use parking_lot::Mutex;
use std::{
    collections::HashMap,
    sync::Arc,
};
use tokio::sync::{
    Mutex as AsyncMutex,
    OwnedMutexGuard,
};

/// Serializes the state changing operations on a single document.
///
/// A lock is created on first use and dropped from the registry once no
/// task holds or awaits it.
#[derive(Default)]
pub(crate) struct DocumentLocks {
    inner: Mutex<HashMap<(i64, i64), Arc<AsyncMutex<()>>>>,
}

impl DocumentLocks {
    pub(crate) async fn lock(
        &self,
        tenant_id: i64,
        document_id: i64,
    ) -> OwnedMutexGuard<()> {
        let mutex = {
            let mut inner = self.inner.lock();
            inner.retain(|_, mutex| Arc::strong_count(mutex) > 1);
            inner.entry((tenant_id, document_id))
                .or_default()
                .clone()
        };
        mutex.lock_owned().await
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.inner.lock().len()
    }
}

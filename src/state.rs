use std::sync::Arc;

use crate::store::Store;
use crate::store::snapshot::SnapshotSink;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<Store>,
    pub sink: Arc<dyn SnapshotSink>,
}

impl AppState {
    pub fn new(store: Arc<Store>, sink: Arc<dyn SnapshotSink>) -> Self {
        Self { store, sink }
    }

    /// Write-through after a committed mutation. The in-memory state is
    /// already visible to other requests, so a sink failure degrades
    /// durability but never unwinds the mutation.
    pub async fn persist(&self) {
        let snapshot = self.store.snapshot();
        match self.sink.save(&snapshot).await {
            Ok(()) => self.store.set_degraded(false),
            Err(err) => {
                self.store.set_degraded(true);
                tracing::warn!(error = %err, "snapshot persistence degraded");
            }
        }
    }
}

use std::sync::Arc;

use tokio::sync::RwLock;

use crate::models::RatingTable;

/// Shared handle to the ratings snapshot.
///
/// The snapshot is write-once-then-frozen: `publish` installs a fully built
/// table exactly once at startup, and every reader before that sees `None`.
/// Handlers clone the inner `Arc`, so a request keeps working against the
/// snapshot it read regardless of what happens to the lock afterwards.
#[derive(Clone, Default)]
pub struct AppState {
    ratings: Arc<RwLock<Option<Arc<RatingTable>>>>,
}

impl AppState {
    /// Creates state with no snapshot loaded yet
    pub fn new() -> Self {
        Self::default()
    }

    /// Current snapshot, or `None` while data is still loading or after a
    /// failed load
    pub async fn snapshot(&self) -> Option<Arc<RatingTable>> {
        self.ratings.read().await.clone()
    }

    /// Publishes the complete table. The table is fully built before this
    /// call, so no reader can observe a partially loaded snapshot.
    pub async fn publish(&self, table: RatingTable) {
        *self.ratings.write().await = Some(Arc::new(table));
    }
}

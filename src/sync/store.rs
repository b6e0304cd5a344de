use std::sync::Arc;
use tokio::sync::watch;

use super::reconciler::SyncHealth;
use crate::domain::CanonicalState;
use crate::error::SyncError;

/// Immutable view of the canonical state as of one reconciliation tick
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateSnapshot {
    /// Bumped on every publish
    pub revision: u64,
    pub state: CanonicalState,
    pub health: SyncHealth,
}

/// Read-only access to the reconciler's published state.
#[derive(Debug, Clone)]
pub struct StoreHandle {
    rx: watch::Receiver<Arc<StateSnapshot>>,
}

impl StoreHandle {
    pub(crate) fn new(rx: watch::Receiver<Arc<StateSnapshot>>) -> Self {
        Self { rx }
    }

    /// Latest published snapshot; hold it for the duration of a frame.
    pub fn snapshot(&self) -> Arc<StateSnapshot> {
        self.rx.borrow().clone()
    }

    /// Wait for the next publish.
    pub async fn changed(&mut self) -> Result<(), SyncError> {
        self.rx.changed().await.map_err(|_| SyncError::ChannelClosed)
    }
}

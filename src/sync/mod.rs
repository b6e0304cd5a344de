//! Live state synchronization: two asynchronous sources feeding one store.

pub mod event;
pub mod listener;
pub mod poller;
pub mod reconciler;
pub mod store;

pub use event::{Patch, PatchEvent, RefreshEvent, RefreshPayload, Resource, SyncEvent};
pub use listener::{derive_stream_url, ListenerExit, ListenerHandle};
pub use poller::{PollerSettings, RefreshTrigger, SnapshotPoller, SnapshotSource};
pub use reconciler::{
    ApplyOutcome, Banner, Reconciler, ReconcilerSettings, SyncHealth, TOTAL_FAILURE_MESSAGE,
};
pub use store::{StateSnapshot, StoreHandle};

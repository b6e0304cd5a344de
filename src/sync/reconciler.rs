//! # State Reconciler
//!
//! Single writer of the canonical state. Consumes one totally-ordered queue of
//! [`SyncEvent`]s and merges them:
//! - patches update only the fields and entities they name
//! - refreshes replace each section they carry and leave the rest alone
//! - refreshes older than the newest applied one are dropped
//!
//! Events already queued when a tick starts are applied in arrival order and
//! published together, so readers never see a half-applied tick.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::event::{Patch, PatchEvent, RefreshEvent, SyncEvent};
use super::store::{StateSnapshot, StoreHandle};
use crate::domain::CanonicalState;

pub const TOTAL_FAILURE_MESSAGE: &str = "Failed to load data. Is the backend running?";

/// User-visible connectivity warning
#[derive(Debug, Clone, PartialEq)]
pub struct Banner {
    pub message: String,
    pub since: DateTime<Utc>,
}

/// Freshness bookkeeping published next to the canonical state
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncHealth {
    /// Highest refresh sequence number applied so far
    pub applied_seq: Option<u64>,
    pub last_refresh_at: Option<DateTime<Utc>>,
    pub last_patch_at: Option<DateTime<Utc>>,
    pub had_successful_refresh: bool,
    pub banner: Option<Banner>,
    pub stale_dropped: u64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReconcilerSettings {
    pub decision_log_capacity: usize,
    pub default_battery_capacity: f64,
}

impl Default for ReconcilerSettings {
    fn default() -> Self {
        Self {
            decision_log_capacity: 50,
            default_battery_capacity: 10.0,
        }
    }
}

/// What happened to one event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    Applied,
    /// Refresh dispatched before one already applied
    Stale { seq: u64, applied: u64 },
    /// Every resource failed this cycle
    TotalFailure { banner_raised: bool },
}

pub struct Reconciler {
    state: CanonicalState,
    health: SyncHealth,
    settings: ReconcilerSettings,
    revision: u64,
    dirty: bool,
    publisher: watch::Sender<Arc<StateSnapshot>>,
}

impl Reconciler {
    pub fn new(settings: ReconcilerSettings) -> (Self, StoreHandle) {
        let (publisher, rx) = watch::channel(Arc::new(StateSnapshot::default()));
        let reconciler = Self {
            state: CanonicalState::default(),
            health: SyncHealth::default(),
            settings,
            revision: 0,
            dirty: false,
            publisher,
        };
        (reconciler, StoreHandle::new(rx))
    }

    pub fn state(&self) -> &CanonicalState {
        &self.state
    }

    pub fn health(&self) -> &SyncHealth {
        &self.health
    }

    /// Merge one event into the canonical state. Does not publish.
    pub fn apply(&mut self, event: SyncEvent) -> ApplyOutcome {
        match event {
            SyncEvent::Patch(patch) => {
                self.apply_patch(patch);
                ApplyOutcome::Applied
            }
            SyncEvent::Refresh(refresh) => self.apply_refresh(refresh),
        }
    }

    fn apply_patch(&mut self, event: PatchEvent) {
        debug!(kind = event.patch.kind(), "applying patch");
        match event.patch {
            Patch::Nodes(patches) => self
                .state
                .patch_nodes(&patches, self.settings.default_battery_capacity),
            Patch::Flows(flows) => self.state.patch_flows(&flows),
            Patch::Metrics(metrics) => self.state.patch_metrics(&metrics),
            Patch::Decisions(decisions) => self
                .state
                .append_decisions(&decisions, self.settings.decision_log_capacity),
            Patch::Hour(hour) => self.state.simulation.advance_to(hour),
        }
        self.health.last_patch_at = Some(event.received_at);
        self.dirty = true;
    }

    fn apply_refresh(&mut self, event: RefreshEvent) -> ApplyOutcome {
        if let Some(applied) = self.health.applied_seq {
            if event.seq < applied {
                debug!(seq = event.seq, applied, "dropping stale refresh");
                self.health.stale_dropped += 1;
                return ApplyOutcome::Stale {
                    seq: event.seq,
                    applied,
                };
            }
        }

        if event.payload.is_empty() {
            // cold start: the backend may simply not be up yet
            let banner_raised =
                self.health.had_successful_refresh && self.health.banner.is_none();
            if banner_raised {
                warn!(seq = event.seq, "all resources failed, raising banner");
                self.health.banner = Some(Banner {
                    message: TOTAL_FAILURE_MESSAGE.to_string(),
                    since: Utc::now(),
                });
                self.dirty = true;
            }
            return ApplyOutcome::TotalFailure { banner_raised };
        }

        let payload = event.payload;
        if let Some(status) = payload.status {
            self.state.simulation = status;
        }
        if let Some(nodes) = payload.nodes {
            let removed = self.state.replace_nodes(nodes);
            if !removed.is_empty() {
                debug!(removed = removed.len(), "nodes left the community");
            }
        }
        if let Some(flows) = payload.flows {
            self.state.replace_flows(flows);
        }
        if let Some(metrics) = payload.metrics {
            self.state.patch_metrics(&metrics);
        }
        if let Some(forecast) = payload.forecast {
            self.state.forecast = Some(forecast);
        }

        if self.health.banner.take().is_some() {
            info!(seq = event.seq, "backend reachable again, clearing banner");
        }
        self.health.applied_seq = Some(event.seq);
        self.health.last_refresh_at = Some(Utc::now());
        self.health.had_successful_refresh = true;
        self.dirty = true;
        ApplyOutcome::Applied
    }

    /// Publish the current state if anything changed since the last publish.
    pub fn publish(&mut self) -> bool {
        if !self.dirty {
            return false;
        }
        self.revision += 1;
        self.dirty = false;
        let snapshot = StateSnapshot {
            revision: self.revision,
            state: self.state.clone(),
            health: self.health.clone(),
        };
        self.publisher.send_replace(Arc::new(snapshot));
        true
    }

    /// Drain the event queue until it closes or `cancel` fires.
    pub async fn run(mut self, mut events: mpsc::Receiver<SyncEvent>, cancel: CancellationToken) {
        info!("reconciler started");
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                next = events.recv() => {
                    let Some(event) = next else { break };
                    self.apply(event);
                    while let Ok(event) = events.try_recv() {
                        self.apply(event);
                    }
                    self.publish();
                }
            }
        }
        info!(revision = self.revision, "reconciler stopped");
    }
}

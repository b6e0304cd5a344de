//! # Snapshot Poller
//!
//! Every interval, fetches the four pull resources in parallel, each under its
//! own timeout, and emits one [`RefreshEvent`] carrying whatever succeeded.
//! Cycles run as independent tasks so a slow cycle never delays the next one,
//! and every cycle is stamped with a sequence number when it is dispatched.

use async_trait::async_trait;
use chrono::Utc;
use itertools::Itertools;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::event::{RefreshEvent, RefreshPayload, Resource, SyncEvent};
use crate::domain::{Forecast, MetricsPatch, Node, SimulationStatus};
use crate::error::SyncError;

/// Source of full-resource snapshots
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    async fn fetch_status(&self) -> Result<SimulationStatus, SyncError>;
    async fn fetch_nodes(&self) -> Result<Vec<Node>, SyncError>;
    async fn fetch_metrics(&self) -> Result<MetricsPatch, SyncError>;
    async fn fetch_forecast(&self) -> Result<Forecast, SyncError>;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PollerSettings {
    pub interval: Duration,
    pub resource_timeout: Duration,
}

impl Default for PollerSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            resource_timeout: Duration::from_secs(4),
        }
    }
}

/// Requests an out-of-cycle poll
#[derive(Debug, Clone)]
pub struct RefreshTrigger(Arc<Notify>);

impl RefreshTrigger {
    pub fn refresh_now(&self) {
        self.0.notify_one();
    }
}

pub struct SnapshotPoller {
    source: Arc<dyn SnapshotSource>,
    settings: PollerSettings,
    seq: Arc<AtomicU64>,
    manual: Arc<Notify>,
}

impl SnapshotPoller {
    pub fn new(source: Arc<dyn SnapshotSource>, settings: PollerSettings) -> Self {
        Self {
            source,
            settings,
            seq: Arc::new(AtomicU64::new(0)),
            manual: Arc::new(Notify::new()),
        }
    }

    pub fn trigger(&self) -> RefreshTrigger {
        RefreshTrigger(self.manual.clone())
    }

    /// Allocate the next dispatch sequence number (starts at 1).
    pub fn next_seq(&self) -> u64 {
        self.seq.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Run one cycle inline.
    pub async fn poll_once(&self) -> RefreshEvent {
        let seq = self.next_seq();
        run_cycle(self.source.clone(), self.settings.resource_timeout, seq).await
    }

    /// Poll until `cancel` fires. In-flight cycles are aborted on cancellation and
    /// their results are never delivered.
    pub async fn run(self, events: mpsc::Sender<SyncEvent>, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.settings.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut in_flight = JoinSet::new();

        info!(interval_ms = self.settings.interval.as_millis() as u64, "poller started");
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    if !in_flight.is_empty() {
                        debug!(count = in_flight.len(), "aborting in-flight polls");
                    }
                    in_flight.abort_all();
                    break;
                }
                _ = ticker.tick() => self.dispatch(&mut in_flight, events.clone()),
                _ = self.manual.notified() => self.dispatch(&mut in_flight, events.clone()),
                Some(joined) = in_flight.join_next() => {
                    if let Err(e) = joined {
                        if !e.is_cancelled() {
                            warn!(error = %e, "poll cycle panicked");
                        }
                    }
                }
            }
        }
        // make sure aborted cycles are gone before we return
        while in_flight.join_next().await.is_some() {}
        info!("poller stopped");
    }

    fn dispatch(&self, in_flight: &mut JoinSet<()>, events: mpsc::Sender<SyncEvent>) {
        let seq = self.next_seq();
        let source = self.source.clone();
        let timeout = self.settings.resource_timeout;
        in_flight.spawn(async move {
            let event = run_cycle(source, timeout, seq).await;
            if events.send(event.into()).await.is_err() {
                debug!(seq, "reconciler gone, dropping refresh");
            }
        });
    }
}

async fn run_cycle(source: Arc<dyn SnapshotSource>, timeout: Duration, seq: u64) -> RefreshEvent {
    let dispatched_at = Utc::now();
    let (status, nodes, metrics, forecast) = tokio::join!(
        fetch(Resource::Status, timeout, source.fetch_status()),
        fetch(Resource::Nodes, timeout, source.fetch_nodes()),
        fetch(Resource::Metrics, timeout, source.fetch_metrics()),
        fetch(Resource::Forecast, timeout, source.fetch_forecast()),
    );

    let mut failed = Vec::new();
    let payload = RefreshPayload {
        status: keep(Resource::Status, status, &mut failed),
        nodes: keep(Resource::Nodes, nodes, &mut failed),
        flows: None,
        metrics: keep(Resource::Metrics, metrics, &mut failed),
        forecast: keep(Resource::Forecast, forecast, &mut failed),
    };

    if payload.is_empty() {
        warn!(seq, "every resource failed this cycle");
    } else {
        debug!(
            seq,
            ok = payload.resource_count(),
            failed = %failed.iter().join(","),
            "poll cycle done"
        );
    }

    RefreshEvent {
        seq,
        dispatched_at,
        payload,
        failed,
    }
}

async fn fetch<T>(
    resource: Resource,
    timeout: Duration,
    request: impl Future<Output = Result<T, SyncError>>,
) -> Result<T, SyncError> {
    tokio::time::timeout(timeout, request)
        .await
        .unwrap_or(Err(SyncError::Timeout { resource }))
}

fn keep<T>(resource: Resource, result: Result<T, SyncError>, failed: &mut Vec<Resource>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(%resource, error = %e, "fetch failed, keeping previous value");
            failed.push(resource);
            None
        }
    }
}

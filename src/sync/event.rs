use chrono::{DateTime, Utc};
use serde::Serialize;
use strum::{Display, EnumString};

use crate::domain::{
    AgentDecision, EnergyFlow, Forecast, MetricsPatch, Node, NodePatch, SimulationStatus,
};

/// A pull resource fetched by the poller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Resource {
    Status,
    Nodes,
    Metrics,
    Forecast,
}

/// One field of a streamed message, applied independently of the others.
#[derive(Debug, Clone, PartialEq)]
pub enum Patch {
    Nodes(Vec<NodePatch>),
    Flows(Vec<EnergyFlow>),
    Metrics(MetricsPatch),
    Decisions(Vec<AgentDecision>),
    Hour(u32),
}

impl Patch {
    pub fn kind(&self) -> &'static str {
        match self {
            Patch::Nodes(_) => "nodes",
            Patch::Flows(_) => "flows",
            Patch::Metrics(_) => "metrics",
            Patch::Decisions(_) => "decisions",
            Patch::Hour(_) => "hour",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PatchEvent {
    pub received_at: DateTime<Utc>,
    pub patch: Patch,
}

impl PatchEvent {
    pub fn now(patch: Patch) -> Self {
        Self {
            received_at: Utc::now(),
            patch,
        }
    }
}

/// Resources that succeeded in one poll cycle; `None` means "retain previous".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RefreshPayload {
    pub status: Option<SimulationStatus>,
    pub nodes: Option<Vec<Node>>,
    /// No pull endpoint serves flows today; kept so a full snapshot can carry them.
    pub flows: Option<Vec<EnergyFlow>>,
    pub metrics: Option<MetricsPatch>,
    pub forecast: Option<Forecast>,
}

impl RefreshPayload {
    /// True when every resource failed this cycle
    pub fn is_empty(&self) -> bool {
        self.status.is_none()
            && self.nodes.is_none()
            && self.flows.is_none()
            && self.metrics.is_none()
            && self.forecast.is_none()
    }

    pub fn resource_count(&self) -> usize {
        [
            self.status.is_some(),
            self.nodes.is_some(),
            self.flows.is_some(),
            self.metrics.is_some(),
            self.forecast.is_some(),
        ]
        .into_iter()
        .filter(|present| *present)
        .count()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RefreshEvent {
    /// Assigned when the cycle was dispatched, strictly increasing
    pub seq: u64,
    pub dispatched_at: DateTime<Utc>,
    pub payload: RefreshPayload,
    pub failed: Vec<Resource>,
}

/// Everything the reconciler consumes, in a single totally-ordered queue.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    Patch(PatchEvent),
    Refresh(RefreshEvent),
}

impl From<PatchEvent> for SyncEvent {
    fn from(e: PatchEvent) -> Self {
        SyncEvent::Patch(e)
    }
}

impl From<RefreshEvent> for SyncEvent {
    fn from(e: RefreshEvent) -> Self {
        SyncEvent::Refresh(e)
    }
}

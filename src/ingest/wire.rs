//! Raw backend shapes.
//!
//! Every alternate field name the backend has used is accepted here via serde
//! aliases and nowhere else. The rest of the crate only sees domain types.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use crate::domain::{
    AgentDecision, DecisionAction, EnergyFlow, FlowEndpoint, Forecast, ForecastPoint,
    MetricsPatch, NodeId, NodePatch, NodeStatus, SimulationPhase, SimulationStatus,
};

#[derive(Debug, Deserialize)]
pub(crate) struct RawNode {
    #[serde(alias = "agent_id")]
    pub id: u32,
    pub production: Option<f64>,
    pub consumption: Option<f64>,
    #[serde(alias = "battery", alias = "batteryLevel")]
    pub battery_level: Option<f64>,
    #[serde(alias = "batteryCapacity")]
    pub battery_capacity: Option<f64>,
    pub status: Option<String>,
    pub neighbors: Option<Vec<u32>>,
}

impl RawNode {
    pub fn into_patch(self) -> NodePatch {
        let status = self.status.and_then(|s| match s.parse::<NodeStatus>() {
            Ok(status) => Some(status),
            Err(_) => {
                debug!(node_id = self.id, status = %s, "ignoring unknown node status");
                None
            }
        });
        NodePatch {
            id: NodeId(self.id),
            production: self.production,
            consumption: self.consumption,
            battery_level: self.battery_level,
            battery_capacity: self.battery_capacity,
            status,
            neighbors: self
                .neighbors
                .map(|n| n.into_iter().map(NodeId).collect()),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawFlow {
    #[serde(alias = "from_agent", alias = "source")]
    pub from: FlowEndpoint,
    #[serde(alias = "to_agent", alias = "target")]
    pub to: FlowEndpoint,
    #[serde(default, alias = "amount_kwh")]
    pub amount: f64,
}

impl RawFlow {
    pub fn into_flow(self) -> Option<EnergyFlow> {
        let flow = EnergyFlow::new(self.from, self.to, self.amount);
        if flow.is_none() {
            debug!(endpoint = %self.from, "dropping self-loop flow");
        }
        flow
    }
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct RawMetrics {
    #[serde(alias = "solarUsage", alias = "solar_utilization")]
    pub solar_utilization_pct: Option<f64>,
    #[serde(alias = "selfSufficiency", alias = "self_sufficiency")]
    pub self_sufficiency_pct: Option<f64>,
    #[serde(alias = "gridDependency", alias = "grid_dependency")]
    pub grid_dependency_pct: Option<f64>,
    #[serde(alias = "energyShared", alias = "energy_shared")]
    pub energy_shared_kwh: Option<f64>,
    #[serde(alias = "costSavings", alias = "cost_savings")]
    pub cost_savings_daily: Option<f64>,
    #[serde(alias = "costSavingsMonthly")]
    pub cost_savings_monthly: Option<f64>,
    #[serde(alias = "co2Saved", alias = "co2_saved")]
    pub co2_avoided_kg: Option<f64>,
    #[serde(alias = "treesEquivalent")]
    pub trees_equivalent: Option<f64>,
    #[serde(alias = "batteryLevel", alias = "avg_battery")]
    pub avg_battery_pct: Option<f64>,
}

impl From<RawMetrics> for MetricsPatch {
    fn from(r: RawMetrics) -> Self {
        MetricsPatch {
            solar_utilization_pct: r.solar_utilization_pct,
            self_sufficiency_pct: r.self_sufficiency_pct,
            grid_dependency_pct: r.grid_dependency_pct,
            energy_shared_kwh: r.energy_shared_kwh,
            cost_savings_daily: r.cost_savings_daily,
            cost_savings_monthly: r.cost_savings_monthly,
            co2_avoided_kg: r.co2_avoided_kg,
            trees_equivalent: r.trees_equivalent,
            avg_battery_pct: r.avg_battery_pct,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawStatus {
    pub status: String,
    pub current_hour: Option<u32>,
    pub total_hours: Option<u32>,
    pub agents_active: Option<u32>,
    pub message: Option<String>,
}

impl RawStatus {
    pub fn into_status(self) -> SimulationStatus {
        let phase = self.status.parse().unwrap_or_else(|_| {
            debug!(status = %self.status, "unknown simulation status, treating as idle");
            SimulationPhase::Idle
        });
        SimulationStatus {
            phase,
            current_hour: self.current_hour.unwrap_or(0),
            total_hours: self.total_hours,
            agents_active: self.agents_active,
            message: self.message,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawForecastPoint {
    pub hour: Option<u32>,
    #[serde(alias = "predicted", alias = "production")]
    pub predicted_kwh: f64,
    #[serde(alias = "lower")]
    pub confidence_lower: Option<f64>,
    #[serde(alias = "upper")]
    pub confidence_upper: Option<f64>,
    pub timestamp: Option<String>,
}

/// The forecast resource is either a bare array or an envelope around one.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum RawForecast {
    Points(Vec<RawForecastPoint>),
    Envelope {
        forecast: Vec<RawForecastPoint>,
        model_type: Option<String>,
        forecast_horizon_hours: Option<u32>,
    },
}

impl RawForecast {
    pub fn into_forecast(self) -> Forecast {
        let (raw, model_type, horizon) = match self {
            RawForecast::Points(points) => (points, None, None),
            RawForecast::Envelope {
                forecast,
                model_type,
                forecast_horizon_hours,
            } => (forecast, model_type, forecast_horizon_hours),
        };

        let points: Vec<ForecastPoint> = raw
            .into_iter()
            .enumerate()
            .map(|(idx, r)| {
                let mut point = ForecastPoint::new(
                    r.hour.unwrap_or(idx as u32),
                    r.predicted_kwh,
                    r.confidence_lower,
                    r.confidence_upper,
                );
                point.timestamp = r.timestamp;
                point
            })
            .collect();

        Forecast {
            model_type,
            horizon_hours: horizon.unwrap_or(points.len() as u32),
            points,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawDecision {
    #[serde(alias = "agent", alias = "agentId", alias = "id")]
    pub agent_id: u32,
    #[serde(alias = "decision", alias = "type")]
    pub action: String,
    #[serde(default)]
    pub amount: f64,
    pub target: Option<u32>,
    pub timestamp: Option<serde_json::Value>,
}

impl RawDecision {
    pub fn into_decision(self) -> AgentDecision {
        AgentDecision {
            agent_id: NodeId(self.agent_id),
            action: DecisionAction::from(self.action),
            amount: if self.amount.is_finite() { self.amount } else { 0.0 },
            target: self.target.map(NodeId),
            timestamp: self.timestamp.map(|t| match t {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            }),
        }
    }
}

/// Decode each array element on its own, dropping the ones that do not fit.
///
/// Returns `None` when `value` is not an array at all.
pub(crate) fn lenient_list<T: DeserializeOwned>(
    value: serde_json::Value,
    field: &'static str,
) -> Option<Vec<T>> {
    let serde_json::Value::Array(items) = value else {
        debug!(field, "expected an array, ignoring field");
        return None;
    };

    let total = items.len();
    let parsed: Vec<T> = items
        .into_iter()
        .filter_map(|item| serde_json::from_value(item).ok())
        .collect();
    if parsed.len() != total {
        debug!(field, dropped = total - parsed.len(), "dropped malformed entries");
    }
    Some(parsed)
}

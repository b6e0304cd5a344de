//! Per-frame scene assembly.
//!
//! [`Renderer::frame`] is a pure step: given a published snapshot and the
//! seconds elapsed since the previous frame it returns the next [`Scene`].
//! The dashboard drives it from a timer; tests drive it directly.

use serde::Serialize;
use tracing::{debug, info};

use super::animator::{AnimatorSettings, FlowAnimator, FlowSegment};
use super::interaction::{Selection, SelectionController};
use super::layout::{LayoutEngine, LayoutSettings, Point2, Point3};
use crate::domain::{
    display_pct, AgentDecision, CanonicalState, CommunityMetrics, Forecast, ForecastPoint, Node,
    NodeId, NodeStatus, SimulationPhase,
};
use crate::error::SelectionError;
use crate::sync::StateSnapshot;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlacedNode {
    pub id: NodeId,
    pub position: Point3,
    pub position_2d: Point2,
    pub status: NodeStatus,
    pub production: f64,
    pub consumption: f64,
    /// Battery fill in [0, 1]
    pub battery: f64,
    pub selected: bool,
}

/// Metrics with percentages clamped for display
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MetricsView {
    pub solar_utilization_pct: f64,
    pub self_sufficiency_pct: f64,
    pub grid_dependency_pct: f64,
    pub avg_battery_pct: f64,
    pub energy_shared_kwh: f64,
    pub cost_savings_daily: f64,
    pub cost_savings_monthly: f64,
    pub co2_avoided_kg: f64,
    pub trees_equivalent: f64,
}

impl From<&CommunityMetrics> for MetricsView {
    fn from(m: &CommunityMetrics) -> Self {
        Self {
            solar_utilization_pct: display_pct(m.solar_utilization_pct),
            self_sufficiency_pct: display_pct(m.self_sufficiency_pct),
            grid_dependency_pct: display_pct(m.grid_dependency_pct),
            avg_battery_pct: display_pct(m.avg_battery_pct),
            energy_shared_kwh: m.energy_shared_kwh,
            cost_savings_daily: m.cost_savings_daily,
            cost_savings_monthly: m.cost_savings_monthly,
            co2_avoided_kg: m.co2_avoided_kg,
            trees_equivalent: m.trees_equivalent,
        }
    }
}

/// Forecast panel content
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastView {
    pub model_type: Option<String>,
    pub total_kwh: f64,
    pub peak_hour: Option<u32>,
    pub points: Vec<ForecastPoint>,
}

impl From<&Forecast> for ForecastView {
    fn from(f: &Forecast) -> Self {
        Self {
            model_type: f.model_type.clone(),
            total_kwh: f.total_predicted_kwh(),
            peak_hour: f.peak().map(|p| p.hour),
            points: f.points.clone(),
        }
    }
}

/// Everything a display needs for one frame
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Scene {
    pub frame: u64,
    /// Snapshot revision the scene was built from
    pub revision: u64,
    pub phase: SimulationPhase,
    pub hour: Option<u32>,
    pub grid_dims: usize,
    pub nodes: Vec<PlacedNode>,
    pub flows: Vec<FlowSegment>,
    pub metrics: MetricsView,
    pub forecast: Option<ForecastView>,
    pub banner: Option<String>,
    pub selection: Selection,
    /// Inspector content for the selected node
    pub selected_node: Option<Node>,
    pub recent_decisions: Vec<AgentDecision>,
}

impl Scene {
    pub fn marker_count(&self) -> usize {
        self.flows.iter().map(|f| f.markers.len()).sum()
    }
}

/// Host display seam
pub trait SceneSink: Send {
    fn present(&mut self, scene: &Scene);
}

/// Sink that logs a one-line summary every `every` frames (0 = never).
#[derive(Debug, Clone)]
pub struct LogSceneSink {
    every: u64,
    last_revision: Option<u64>,
}

impl LogSceneSink {
    pub fn new(every: u64) -> Self {
        Self {
            every,
            last_revision: None,
        }
    }
}

impl SceneSink for LogSceneSink {
    fn present(&mut self, scene: &Scene) {
        if self.last_revision != Some(scene.revision) {
            self.last_revision = Some(scene.revision);
            debug!(revision = scene.revision, nodes = scene.nodes.len(), "scene revision changed");
        }
        if self.every == 0 || scene.frame % self.every != 0 {
            return;
        }
        info!(
            frame = scene.frame,
            revision = scene.revision,
            phase = %scene.phase,
            hour = ?scene.hour,
            nodes = scene.nodes.len(),
            flows = scene.flows.len(),
            markers = scene.marker_count(),
            self_sufficiency_pct = scene.metrics.self_sufficiency_pct,
            forecast_kwh = scene.forecast.as_ref().map(|f| f.total_kwh),
            banner = ?scene.banner,
            selected = ?scene.selection.id(),
            "scene"
        );
    }
}

/// Display-side input
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    Pointer(Point2),
    Select(NodeId),
    Close,
}

/// How many decisions a scene carries
const SCENE_DECISIONS: usize = 10;

/// Owns the layout, animator and selection; all three only ever read from
/// published snapshots.
#[derive(Debug, Clone)]
pub struct Renderer {
    layout: LayoutEngine,
    animator: FlowAnimator,
    selection: SelectionController,
    revision: Option<u64>,
    frame: u64,
}

impl Renderer {
    pub fn new(layout: LayoutSettings, animator: AnimatorSettings, hit_radius: f64) -> Self {
        Self {
            layout: LayoutEngine::new(layout),
            animator: FlowAnimator::new(animator),
            selection: SelectionController::new(hit_radius),
            revision: None,
            frame: 0,
        }
    }

    pub fn layout(&self) -> &LayoutEngine {
        &self.layout
    }

    pub fn animator(&self) -> &FlowAnimator {
        &self.animator
    }

    pub fn selection(&self) -> Selection {
        self.selection.selection()
    }

    /// Resync derived structures if `snapshot` is newer than the last one seen.
    fn observe(&mut self, snapshot: &StateSnapshot) {
        if self.revision == Some(snapshot.revision) {
            return;
        }
        self.revision = Some(snapshot.revision);
        let state = &snapshot.state;
        if self.layout.sync(state.node_ids()) {
            debug!(nodes = self.layout.len(), dims = self.layout.dims(), "layout updated");
        }
        self.animator.sync(state.flows.values());
        self.selection.reconcile(state);
    }

    pub fn handle(&mut self, input: InputEvent, snapshot: &StateSnapshot) -> Result<(), SelectionError> {
        self.observe(snapshot);
        match input {
            InputEvent::Pointer(at) => {
                self.selection.pointer(&self.layout, at);
                Ok(())
            }
            InputEvent::Select(id) => self.selection.select(&snapshot.state, id),
            InputEvent::Close => {
                self.selection.close();
                Ok(())
            }
        }
    }

    /// Advance by `dt` seconds and build the scene for `snapshot`.
    pub fn frame(&mut self, snapshot: &StateSnapshot, dt: f64) -> Scene {
        self.observe(snapshot);
        self.animator.advance(dt);
        self.frame += 1;
        self.build(snapshot)
    }

    fn build(&self, snapshot: &StateSnapshot) -> Scene {
        let state = &snapshot.state;
        let selected = self.selection.selected();
        let nodes = state
            .nodes
            .values()
            .filter_map(|node| {
                Some(PlacedNode {
                    id: node.id,
                    position: self.layout.position(node.id)?,
                    position_2d: self.layout.position_2d(node.id)?,
                    status: node.status,
                    production: node.production,
                    consumption: node.consumption,
                    battery: node.battery_fraction(),
                    selected: selected == Some(node.id),
                })
            })
            .collect();

        Scene {
            frame: self.frame,
            revision: snapshot.revision,
            phase: state.simulation.phase,
            hour: state.simulation.active_hour(),
            grid_dims: self.layout.dims(),
            nodes,
            flows: self.animator.segments(&self.layout),
            metrics: MetricsView::from(&state.metrics),
            forecast: state.forecast.as_ref().map(ForecastView::from),
            banner: snapshot.health.banner.as_ref().map(|b| b.message.clone()),
            selection: self.selection.selection(),
            selected_node: selected.and_then(|id| state.node(id).cloned()),
            recent_decisions: recent_decisions(state),
        }
    }
}

fn recent_decisions(state: &CanonicalState) -> Vec<AgentDecision> {
    state
        .decisions
        .iter()
        .rev()
        .take(SCENE_DECISIONS)
        .cloned()
        .collect()
}

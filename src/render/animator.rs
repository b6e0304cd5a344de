//! # Flow Animator
//!
//! Each active flow gets a track of up to five markers travelling from the
//! source anchor to the destination anchor. Marker progress lives in `[0, 1)`
//! and only depends on elapsed time, so the animation keeps moving between
//! data updates and a test can drive it without a display clock.
//!
//! Paths are not stored. They are rebuilt from the layout every frame, so a
//! node that changes cell carries its markers along at the same progress.

use serde::Serialize;
use std::collections::BTreeMap;

use super::layout::{LayoutEngine, Point3};
use crate::domain::{EnergyFlow, FlowEndpoint, FlowKey};

pub const MAX_MARKERS: usize = 5;
/// kWh represented by one marker
pub const KWH_PER_MARKER: f64 = 2.0;

/// `min(ceil(amount / 2), 5)`, zero for inert flows
pub fn marker_count(amount: f64) -> usize {
    if amount.is_nan() || amount <= 0.0 {
        return 0;
    }
    if amount.is_infinite() {
        return MAX_MARKERS;
    }
    ((amount / KWH_PER_MARKER).ceil() as usize).min(MAX_MARKERS)
}

/// Keep progress inside `[0, 1)`.
fn wrap(p: f64) -> f64 {
    let w = p.rem_euclid(1.0);
    if w >= 1.0 || !w.is_finite() {
        0.0
    } else {
        w
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnimatorSettings {
    /// Progress per second for each kWh of flow
    pub speed_per_kwh: f64,
    /// Upper bound on progress per second; keeps large flows readable
    pub max_speed: f64,
    /// Markers float this far above the straight path
    pub marker_lift: f64,
    /// Where grid-side endpoints are drawn
    pub grid_anchor: Point3,
}

impl Default for AnimatorSettings {
    fn default() -> Self {
        Self {
            speed_per_kwh: 0.15,
            max_speed: 2.0,
            marker_lift: 0.5,
            grid_anchor: Point3::new(0.0, 8.0, 0.0),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FlowTrack {
    pub amount: f64,
    /// Progress per second
    pub speed: f64,
    pub markers: Vec<f64>,
}

impl FlowTrack {
    fn new(amount: f64, speed: f64) -> Self {
        let count = marker_count(amount);
        Self {
            amount,
            speed,
            markers: (0..count).map(|i| i as f64 / count as f64).collect(),
        }
    }

    /// Add or drop markers to match `amount`. Surviving markers keep their
    /// progress; new ones are spread after the lead marker.
    fn retarget(&mut self, amount: f64, speed: f64) {
        self.amount = amount;
        self.speed = speed;
        let count = marker_count(amount);
        if count < self.markers.len() {
            self.markers.truncate(count);
        } else if count > self.markers.len() {
            let lead = self.markers.first().copied().unwrap_or(0.0);
            for i in self.markers.len()..count {
                self.markers.push(wrap(lead + i as f64 / count as f64));
            }
        }
    }

    fn advance(&mut self, dt: f64) {
        let step = self.speed * dt;
        for p in &mut self.markers {
            *p = wrap(*p + step);
        }
    }
}

/// One flow ready to draw
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlowSegment {
    pub key: String,
    pub amount: f64,
    pub start: Point3,
    pub end: Point3,
    pub markers: Vec<Point3>,
}

#[derive(Debug, Clone, Default)]
pub struct FlowAnimator {
    settings: AnimatorSettings,
    tracks: BTreeMap<FlowKey, FlowTrack>,
}

impl FlowAnimator {
    pub fn new(settings: AnimatorSettings) -> Self {
        Self {
            settings,
            tracks: BTreeMap::new(),
        }
    }

    pub fn speed_for(&self, amount: f64) -> f64 {
        (amount.max(0.0) * self.settings.speed_per_kwh).min(self.settings.max_speed)
    }

    pub fn track(&self, key: &FlowKey) -> Option<&FlowTrack> {
        self.tracks.get(key)
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Align tracks with the current flow set. Tracks whose flow vanished or
    /// dropped to zero are discarded, which is the only way progress resets.
    pub fn sync<'a>(&mut self, flows: impl IntoIterator<Item = &'a EnergyFlow>) {
        let mut next = BTreeMap::new();
        for flow in flows.into_iter().filter(|f| f.is_active()) {
            let key = flow.key();
            let speed = self.speed_for(flow.amount);
            let track = match self.tracks.remove(&key) {
                Some(mut track) => {
                    track.retarget(flow.amount, speed);
                    track
                }
                None => FlowTrack::new(flow.amount, speed),
            };
            next.insert(key, track);
        }
        self.tracks = next;
    }

    /// Advance every marker by `dt` seconds.
    pub fn advance(&mut self, dt: f64) {
        if !(dt > 0.0) || !dt.is_finite() {
            return;
        }
        for track in self.tracks.values_mut() {
            track.advance(dt);
        }
    }

    fn anchor(&self, endpoint: &FlowEndpoint, layout: &LayoutEngine) -> Option<Point3> {
        match endpoint {
            FlowEndpoint::Grid => Some(self.settings.grid_anchor),
            FlowEndpoint::Node(id) => layout.position(*id),
        }
    }

    /// Resolve every track against the current layout. Tracks with an endpoint
    /// that has no cell yet are skipped for this frame.
    pub fn segments(&self, layout: &LayoutEngine) -> Vec<FlowSegment> {
        self.tracks
            .iter()
            .filter_map(|(key, track)| {
                let start = self.anchor(&key.from, layout)?;
                let end = self.anchor(&key.to, layout)?;
                let markers = track
                    .markers
                    .iter()
                    .map(|p| start.lerp(&end, *p).lifted(self.settings.marker_lift))
                    .collect();
                Some(FlowSegment {
                    key: key.to_string(),
                    amount: track.amount,
                    start,
                    end,
                    markers,
                })
            })
            .collect()
    }
}

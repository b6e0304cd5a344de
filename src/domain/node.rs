use serde::{Deserialize, Serialize};
use std::fmt;
use strum::{Display, EnumString};

/// Production and consumption closer than this (kW) count as balanced.
pub const BALANCE_BAND_KW: f64 = 0.05;

/// Stable integer identifier of a simulated household.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub u32);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for NodeId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

/// Energy balance of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum NodeStatus {
    Surplus,
    Deficit,
    Balanced,
}

impl NodeStatus {
    /// Derive the status from the net balance of a node.
    pub fn derive(production: f64, consumption: f64) -> Self {
        let net = production - consumption;
        if net > BALANCE_BAND_KW {
            NodeStatus::Surplus
        } else if net < -BALANCE_BAND_KW {
            NodeStatus::Deficit
        } else {
            NodeStatus::Balanced
        }
    }
}

/// Where the current status of a node came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusSource {
    /// Reported by the backend together with the production/consumption it describes
    Reported,
    /// Computed locally from production - consumption
    Derived,
}

/// A simulated household with production, consumption and battery state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    /// Current production (kW)
    pub production: f64,
    /// Current consumption (kW)
    pub consumption: f64,
    /// Stored energy (kWh), within [0, battery_capacity]
    pub battery_level: f64,
    /// Battery capacity (kWh), always > 0
    pub battery_capacity: f64,
    pub status: NodeStatus,
    pub status_source: StatusSource,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub neighbors: Vec<NodeId>,
}

impl Node {
    /// Build a node with all values normalized to the entity invariants.
    pub fn new(
        id: NodeId,
        production: f64,
        consumption: f64,
        battery_level: f64,
        battery_capacity: f64,
        reported_status: Option<NodeStatus>,
    ) -> Self {
        let mut node = Self {
            id,
            production: 0.0,
            consumption: 0.0,
            battery_level: 0.0,
            battery_capacity: 1.0,
            status: NodeStatus::Balanced,
            status_source: StatusSource::Derived,
            neighbors: Vec::new(),
        };
        node.apply(&NodePatch {
            id,
            production: Some(production),
            consumption: Some(consumption),
            battery_level: Some(battery_level),
            battery_capacity: Some(battery_capacity),
            status: reported_status,
            neighbors: None,
        });
        node
    }

    /// Battery fill ratio in [0, 1]
    pub fn battery_fraction(&self) -> f64 {
        (self.battery_level / self.battery_capacity).clamp(0.0, 1.0)
    }

    /// Apply a field-level patch. Fields absent from the patch are left untouched.
    ///
    /// A status carried by the patch is authoritative and sticks until a newer
    /// status replaces it. A node that never had a reported status keeps its
    /// status derived from production and consumption.
    pub fn apply(&mut self, patch: &NodePatch) {
        if let Some(p) = patch.production {
            self.production = non_negative(p);
        }
        if let Some(c) = patch.consumption {
            self.consumption = non_negative(c);
        }
        if let Some(cap) = patch.battery_capacity {
            if cap.is_finite() && cap > 0.0 {
                self.battery_capacity = cap;
            }
        }
        if let Some(level) = patch.battery_level {
            self.battery_level = non_negative(level);
        }
        // capacity may have shrunk below the stored level
        self.battery_level = self.battery_level.min(self.battery_capacity);

        if let Some(neighbors) = &patch.neighbors {
            self.neighbors = neighbors.clone();
        }

        match patch.status {
            Some(status) => {
                self.status = status;
                self.status_source = StatusSource::Reported;
            }
            None if self.status_source == StatusSource::Derived => {
                self.status = NodeStatus::derive(self.production, self.consumption);
            }
            None => {}
        }
    }
}

fn non_negative(v: f64) -> f64 {
    if v.is_finite() {
        v.max(0.0)
    } else {
        0.0
    }
}

/// Field-level update for a single node; `None` means "no opinion".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodePatch {
    pub id: NodeId,
    pub production: Option<f64>,
    pub consumption: Option<f64>,
    pub battery_level: Option<f64>,
    pub battery_capacity: Option<f64>,
    pub status: Option<NodeStatus>,
    pub neighbors: Option<Vec<NodeId>>,
}

impl NodePatch {
    pub fn new(id: NodeId) -> Self {
        Self {
            id,
            ..Default::default()
        }
    }

    /// Materialize a node that did not exist yet, falling back to defaults for
    /// every field the patch does not name.
    pub fn into_node(&self, default_capacity: f64) -> Node {
        let mut node = Node::new(self.id, 0.0, 0.0, 0.0, default_capacity, None);
        node.apply(self);
        node
    }
}

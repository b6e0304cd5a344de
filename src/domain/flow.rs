use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use super::NodeId;

/// One end of an energy transfer: a household or the utility grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FlowEndpoint {
    Node(NodeId),
    Grid,
}

impl FlowEndpoint {
    pub fn node(&self) -> Option<NodeId> {
        match self {
            FlowEndpoint::Node(id) => Some(*id),
            FlowEndpoint::Grid => None,
        }
    }
}

impl fmt::Display for FlowEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlowEndpoint::Node(id) => write!(f, "{}", id),
            FlowEndpoint::Grid => write!(f, "grid"),
        }
    }
}

impl Serialize for FlowEndpoint {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            FlowEndpoint::Node(id) => serializer.serialize_u32(id.0),
            FlowEndpoint::Grid => serializer.serialize_str("grid"),
        }
    }
}

impl<'de> Deserialize<'de> for FlowEndpoint {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Id(u32),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Id(id) => Ok(FlowEndpoint::Node(NodeId(id))),
            Raw::Text(s) if s.eq_ignore_ascii_case("grid") => Ok(FlowEndpoint::Grid),
            Raw::Text(s) => s
                .trim()
                .parse::<u32>()
                .map(|id| FlowEndpoint::Node(NodeId(id)))
                .map_err(|_| de::Error::custom(format!("unknown flow endpoint: {s}"))),
        }
    }
}

/// Identity of a directed transfer edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct FlowKey {
    pub from: FlowEndpoint,
    pub to: FlowEndpoint,
}

impl fmt::Display for FlowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}->{}", self.from, self.to)
    }
}

/// A directed transfer of energy between two endpoints.
///
/// `from != to` and `amount >= 0` always hold for values built through [`EnergyFlow::new`].
/// Zero-amount flows are kept in state but never animated.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EnergyFlow {
    pub from: FlowEndpoint,
    pub to: FlowEndpoint,
    /// Transferred energy (kWh)
    pub amount: f64,
}

impl EnergyFlow {
    /// Returns `None` for self-loops.
    pub fn new(from: FlowEndpoint, to: FlowEndpoint, amount: f64) -> Option<Self> {
        if from == to {
            return None;
        }
        let amount = if amount.is_finite() { amount.max(0.0) } else { 0.0 };
        Some(Self { from, to, amount })
    }

    pub fn key(&self) -> FlowKey {
        FlowKey {
            from: self.from,
            to: self.to,
        }
    }

    pub fn is_active(&self) -> bool {
        self.amount > 0.0
    }

    /// True if either end is the given node
    pub fn touches(&self, id: NodeId) -> bool {
        self.from.node() == Some(id) || self.to.node() == Some(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_deserialize() {
        let e: FlowEndpoint = serde_json::from_str("4").unwrap();
        assert_eq!(e, FlowEndpoint::Node(NodeId(4)));

        let e: FlowEndpoint = serde_json::from_str("\"GRID\"").unwrap();
        assert_eq!(e, FlowEndpoint::Grid);

        let e: FlowEndpoint = serde_json::from_str("\"12\"").unwrap();
        assert_eq!(e, FlowEndpoint::Node(NodeId(12)));

        assert!(serde_json::from_str::<FlowEndpoint>("\"market\"").is_err());
    }

    #[test]
    fn test_endpoint_serialize() {
        assert_eq!(serde_json::to_string(&FlowEndpoint::Grid).unwrap(), "\"grid\"");
        assert_eq!(
            serde_json::to_string(&FlowEndpoint::Node(NodeId(7))).unwrap(),
            "7"
        );
    }

    #[test]
    fn test_self_loop_rejected() {
        let n = FlowEndpoint::Node(NodeId(1));
        assert!(EnergyFlow::new(n, n, 3.0).is_none());
        assert!(EnergyFlow::new(FlowEndpoint::Grid, FlowEndpoint::Grid, 3.0).is_none());
    }

    #[test]
    fn test_negative_amount_clamped() {
        let f = EnergyFlow::new(FlowEndpoint::Node(NodeId(1)), FlowEndpoint::Grid, -2.0).unwrap();
        assert_eq!(f.amount, 0.0);
        assert!(!f.is_active());
        assert!(f.touches(NodeId(1)));
        assert_eq!(f.key().to_string(), "1->grid");
    }
}

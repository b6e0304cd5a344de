use serde::{Deserialize, Serialize};
use std::fmt;
use strum::EnumString;

use super::NodeId;

/// Action an agent decided on during a simulation step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, EnumString)]
#[serde(from = "String", into = "String")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum DecisionAction {
    ChargeBattery,
    ShareEnergy,
    SellToGrid,
    RequestEnergy,
    BuyFromGrid,
    Hold,
    /// Unknown actions are kept verbatim
    #[strum(default)]
    Other(String),
}

impl DecisionAction {
    pub fn as_str(&self) -> &str {
        match self {
            DecisionAction::ChargeBattery => "charge_battery",
            DecisionAction::ShareEnergy => "share_energy",
            DecisionAction::SellToGrid => "sell_to_grid",
            DecisionAction::RequestEnergy => "request_energy",
            DecisionAction::BuyFromGrid => "buy_from_grid",
            DecisionAction::Hold => "hold",
            DecisionAction::Other(s) => s,
        }
    }
}

impl fmt::Display for DecisionAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for DecisionAction {
    fn from(s: String) -> Self {
        s.parse().unwrap_or(DecisionAction::Other(s))
    }
}

impl From<DecisionAction> for String {
    fn from(a: DecisionAction) -> Self {
        a.as_str().to_string()
    }
}

/// One entry of the agent decision log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentDecision {
    pub agent_id: NodeId,
    pub action: DecisionAction,
    /// Energy involved (kWh)
    pub amount: f64,
    pub target: Option<NodeId>,
    pub timestamp: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_parse() {
        assert_eq!(
            DecisionAction::from("share_energy".to_string()),
            DecisionAction::ShareEnergy
        );
        assert_eq!(
            DecisionAction::from("SELL_TO_GRID".to_string()),
            DecisionAction::SellToGrid
        );
        assert_eq!(
            DecisionAction::from("wait_for_sun".to_string()),
            DecisionAction::Other("wait_for_sun".into())
        );
    }

    #[test]
    fn test_action_serde_is_plain_string() {
        let json = serde_json::to_string(&DecisionAction::ChargeBattery).unwrap();
        assert_eq!(json, "\"charge_battery\"");
        let back: DecisionAction = serde_json::from_str("\"hold\"").unwrap();
        assert_eq!(back, DecisionAction::Hold);
    }
}

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Lifecycle phase of the backend simulation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum SimulationPhase {
    #[default]
    Idle,
    Running,
    Completed,
    Error,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimulationStatus {
    pub phase: SimulationPhase,
    /// Only meaningful while running
    pub current_hour: u32,
    pub total_hours: Option<u32>,
    pub agents_active: Option<u32>,
    pub message: Option<String>,
}

impl SimulationStatus {
    pub fn is_running(&self) -> bool {
        self.phase == SimulationPhase::Running
    }

    /// Hour to display, `None` unless the simulation is running
    pub fn active_hour(&self) -> Option<u32> {
        self.is_running().then_some(self.current_hour)
    }

    /// A streamed hour advance implies the simulation is running.
    pub fn advance_to(&mut self, hour: u32) {
        self.current_hour = hour;
        self.phase = SimulationPhase::Running;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hour_only_meaningful_while_running() {
        let mut s = SimulationStatus {
            current_hour: 7,
            ..Default::default()
        };
        assert_eq!(s.active_hour(), None);

        s.advance_to(8);
        assert!(s.is_running());
        assert_eq!(s.active_hour(), Some(8));
    }

    #[test]
    fn test_phase_parse() {
        assert_eq!("Running".parse::<SimulationPhase>().unwrap(), SimulationPhase::Running);
        assert_eq!(SimulationPhase::Completed.to_string(), "completed");
    }
}

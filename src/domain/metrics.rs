use serde::{Deserialize, Serialize};

/// Community-wide performance metrics.
///
/// Percent fields are stored as received; use [`display_pct`] before showing them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommunityMetrics {
    pub solar_utilization_pct: f64,
    pub self_sufficiency_pct: f64,
    pub grid_dependency_pct: f64,
    pub energy_shared_kwh: f64,
    pub cost_savings_daily: f64,
    pub cost_savings_monthly: f64,
    pub co2_avoided_kg: f64,
    pub trees_equivalent: f64,
    pub avg_battery_pct: f64,
}

/// Partial metrics update; `None` keeps the prior value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricsPatch {
    pub solar_utilization_pct: Option<f64>,
    pub self_sufficiency_pct: Option<f64>,
    pub grid_dependency_pct: Option<f64>,
    pub energy_shared_kwh: Option<f64>,
    pub cost_savings_daily: Option<f64>,
    pub cost_savings_monthly: Option<f64>,
    pub co2_avoided_kg: Option<f64>,
    pub trees_equivalent: Option<f64>,
    pub avg_battery_pct: Option<f64>,
}

impl MetricsPatch {
    pub fn is_empty(&self) -> bool {
        *self == MetricsPatch::default()
    }
}

impl CommunityMetrics {
    pub fn apply(&mut self, patch: &MetricsPatch) {
        fn set(slot: &mut f64, value: Option<f64>) {
            if let Some(v) = value.filter(|v| v.is_finite()) {
                *slot = v;
            }
        }

        set(&mut self.solar_utilization_pct, patch.solar_utilization_pct);
        set(&mut self.self_sufficiency_pct, patch.self_sufficiency_pct);
        set(&mut self.grid_dependency_pct, patch.grid_dependency_pct);
        set(&mut self.energy_shared_kwh, patch.energy_shared_kwh);
        set(&mut self.cost_savings_daily, patch.cost_savings_daily);
        set(&mut self.cost_savings_monthly, patch.cost_savings_monthly);
        set(&mut self.co2_avoided_kg, patch.co2_avoided_kg);
        set(&mut self.trees_equivalent, patch.trees_equivalent);
        set(&mut self.avg_battery_pct, patch.avg_battery_pct);
    }
}

/// Clamp a percentage into [0, 100] for display.
pub fn display_pct(value: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_fields_retain_prior_value() {
        let mut m = CommunityMetrics {
            solar_utilization_pct: 40.0,
            co2_avoided_kg: 12.5,
            ..Default::default()
        };
        m.apply(&MetricsPatch {
            solar_utilization_pct: Some(55.0),
            ..Default::default()
        });
        assert_eq!(m.solar_utilization_pct, 55.0);
        assert_eq!(m.co2_avoided_kg, 12.5);
    }

    #[test]
    fn test_non_finite_values_ignored() {
        let mut m = CommunityMetrics {
            self_sufficiency_pct: 30.0,
            ..Default::default()
        };
        m.apply(&MetricsPatch {
            self_sufficiency_pct: Some(f64::NAN),
            ..Default::default()
        });
        assert_eq!(m.self_sufficiency_pct, 30.0);
    }

    #[test]
    fn test_display_pct_clamps() {
        assert_eq!(display_pct(104.2), 100.0);
        assert_eq!(display_pct(-3.0), 0.0);
        assert_eq!(display_pct(42.0), 42.0);
        assert_eq!(display_pct(f64::NAN), 0.0);
    }
}

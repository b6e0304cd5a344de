use serde::{Deserialize, Serialize};

/// Predicted production for one hour of the forecast horizon
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub hour: u32,
    pub predicted_kwh: f64,
    pub confidence_lower: Option<f64>,
    pub confidence_upper: Option<f64>,
    pub timestamp: Option<String>,
}

impl ForecastPoint {
    /// Builds a point with `lower <= predicted <= upper` whenever the bounds are present.
    pub fn new(
        hour: u32,
        predicted_kwh: f64,
        confidence_lower: Option<f64>,
        confidence_upper: Option<f64>,
    ) -> Self {
        let predicted_kwh = if predicted_kwh.is_finite() { predicted_kwh } else { 0.0 };
        let lower = confidence_lower
            .filter(|v| v.is_finite())
            .map(|v| v.min(predicted_kwh));
        let upper = confidence_upper
            .filter(|v| v.is_finite())
            .map(|v| v.max(predicted_kwh));
        Self {
            hour,
            predicted_kwh,
            confidence_lower: lower,
            confidence_upper: upper,
            timestamp: None,
        }
    }

    /// Width of the confidence band, if both bounds are known
    pub fn spread(&self) -> Option<f64> {
        Some(self.confidence_upper? - self.confidence_lower?)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Forecast {
    pub model_type: Option<String>,
    pub horizon_hours: u32,
    pub points: Vec<ForecastPoint>,
}

impl Forecast {
    pub fn total_predicted_kwh(&self) -> f64 {
        self.points.iter().map(|p| p.predicted_kwh).sum()
    }

    pub fn peak(&self) -> Option<&ForecastPoint> {
        self.points
            .iter()
            .max_by(|a, b| a.predicted_kwh.total_cmp(&b.predicted_kwh))
    }
}

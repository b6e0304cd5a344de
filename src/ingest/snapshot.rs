//! Decoders for the four pull resources.
//!
//! Unlike streamed messages these are strict: a node list with one broken entry
//! is rejected as a whole, because a refresh replaces the section wholesale and
//! a partial list would silently drop nodes.

use super::wire::{RawForecast, RawMetrics, RawNode, RawStatus};
use crate::domain::{Forecast, MetricsPatch, Node, SimulationStatus};

pub fn decode_status(body: &[u8]) -> Result<SimulationStatus, serde_json::Error> {
    let raw: RawStatus = serde_json::from_slice(body)?;
    Ok(raw.into_status())
}

pub fn decode_nodes(body: &[u8], default_capacity: f64) -> Result<Vec<Node>, serde_json::Error> {
    let raw: Vec<RawNode> = serde_json::from_slice(body)?;
    Ok(raw
        .into_iter()
        .map(|r| r.into_patch().into_node(default_capacity))
        .collect())
}

/// Single agent lookup (`GET /agents/{id}`)
pub fn decode_node(body: &[u8], default_capacity: f64) -> Result<Node, serde_json::Error> {
    let raw: RawNode = serde_json::from_slice(body)?;
    Ok(raw.into_patch().into_node(default_capacity))
}

pub fn decode_metrics(body: &[u8]) -> Result<MetricsPatch, serde_json::Error> {
    let raw: RawMetrics = serde_json::from_slice(body)?;
    Ok(raw.into())
}

pub fn decode_forecast(body: &[u8]) -> Result<Forecast, serde_json::Error> {
    let raw: RawForecast = serde_json::from_slice(body)?;
    Ok(raw.into_forecast())
}

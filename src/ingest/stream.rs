use serde_json::{Map, Value};
use tracing::debug;

use super::wire::{lenient_list, RawDecision, RawFlow, RawMetrics, RawNode};
use crate::domain::MetricsPatch;
use crate::sync::Patch;

const NODE_FIELDS: &[&str] = &["houses", "nodes", "agents"];
const FLOW_FIELDS: &[&str] = &["energy_flows", "energyFlows"];
const DECISION_FIELDS: &[&str] = &["agentMessages", "agent_decisions", "agent_messages"];

/// Parse one streamed message into independent patches.
///
/// An unparseable message is an error the caller discards. Inside a valid
/// message, a malformed field is dropped on its own; absent fields produce no
/// patch at all.
pub fn parse_stream_message(text: &str) -> Result<Vec<Patch>, serde_json::Error> {
    let value: Value = serde_json::from_str(text)?;
    let Value::Object(mut fields) = value else {
        debug!("streamed message is not an object, ignoring");
        return Ok(Vec::new());
    };

    let mut patches = Vec::new();

    if let Some(raw) = take_first(&mut fields, NODE_FIELDS) {
        if let Some(nodes) = lenient_list::<RawNode>(raw, "houses") {
            patches.push(Patch::Nodes(
                nodes.into_iter().map(RawNode::into_patch).collect(),
            ));
        }
    }

    if let Some(raw) = take_first(&mut fields, FLOW_FIELDS) {
        if let Some(flows) = lenient_list::<RawFlow>(raw, "energy_flows") {
            patches.push(Patch::Flows(
                flows.into_iter().filter_map(RawFlow::into_flow).collect(),
            ));
        }
    }

    if let Some(raw) = fields.remove("metrics") {
        match serde_json::from_value::<RawMetrics>(raw) {
            Ok(m) => {
                let patch = MetricsPatch::from(m);
                if !patch.is_empty() {
                    patches.push(Patch::Metrics(patch));
                }
            }
            Err(e) => debug!(error = %e, "ignoring malformed metrics field"),
        }
    }

    if let Some(raw) = take_first(&mut fields, DECISION_FIELDS) {
        if let Some(decisions) = lenient_list::<RawDecision>(raw, "agent_decisions") {
            patches.push(Patch::Decisions(
                decisions.into_iter().map(RawDecision::into_decision).collect(),
            ));
        }
    }

    if let Some(raw) = fields.remove("hour") {
        match raw.as_u64().and_then(|h| u32::try_from(h).ok()) {
            Some(hour) => patches.push(Patch::Hour(hour)),
            None => debug!(hour = %raw, "ignoring non-integer hour"),
        }
    }

    Ok(patches)
}

/// First present, non-null field among the given aliases
fn take_first(fields: &mut Map<String, Value>, names: &[&str]) -> Option<Value> {
    names
        .iter()
        .find_map(|name| fields.remove(*name).filter(|v| !v.is_null()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{FlowEndpoint, NodeId};

    #[test]
    fn test_garbage_is_an_error() {
        assert!(parse_stream_message("not json {").is_err());
    }

    #[test]
    fn test_non_object_yields_nothing() {
        assert!(parse_stream_message("[1,2,3]").unwrap().is_empty());
        assert!(parse_stream_message("{}").unwrap().is_empty());
    }

    #[test]
    fn test_single_field_patch() {
        let patches = parse_stream_message(r#"{"houses":[{"id":1,"production":5.0}]}"#).unwrap();
        assert_eq!(patches.len(), 1);
        let Patch::Nodes(nodes) = &patches[0] else {
            panic!("expected node patch");
        };
        assert_eq!(nodes[0].id, NodeId(1));
        assert_eq!(nodes[0].production, Some(5.0));
        assert_eq!(nodes[0].consumption, None);
    }

    #[test]
    fn test_full_message_splits_into_independent_patches() {
        let msg = r#"{
            "timestamp": 3,
            "houses": [{"id": 0, "production": 2.0, "consumption": 1.0, "battery": 4.0, "status": "surplus"}],
            "energyFlows": [{"from": 0, "to": "grid", "amount": 1.5}, {"from": 2, "to": 2, "amount": 1.0}],
            "metrics": {"solarUsage": 80.0},
            "agentMessages": [{"agent_id": 0, "action": "sell_to_grid", "amount": 1.5}],
            "hour": 3
        }"#;
        let patches = parse_stream_message(msg).unwrap();
        let kinds: Vec<_> = patches.iter().map(Patch::kind).collect();
        assert_eq!(kinds, vec!["nodes", "flows", "metrics", "decisions", "hour"]);

        let Patch::Flows(flows) = &patches[1] else {
            panic!("expected flow patch");
        };
        // self-loop dropped
        assert_eq!(flows.len(), 1);
        assert_eq!(flows[0].to, FlowEndpoint::Grid);
        assert_eq!(patches[4], Patch::Hour(3));
    }

    #[test]
    fn test_malformed_field_does_not_poison_message() {
        let msg = r#"{"houses": "oops", "metrics": {"co2Saved": 4.0}, "hour": -1}"#;
        let patches = parse_stream_message(msg).unwrap();
        assert_eq!(patches.len(), 1);
        assert_eq!(patches[0].kind(), "metrics");
    }

    #[test]
    fn test_null_field_is_no_opinion() {
        let patches = parse_stream_message(r#"{"energy_flows": null, "agent_decisions": []}"#).unwrap();
        assert_eq!(patches, vec![Patch::Decisions(vec![])]);
    }
}

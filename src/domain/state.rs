//! Canonical dashboard state.
//!
//! Owned and mutated only by the reconciler; everybody else sees it through an
//! immutable `Arc` published once per reconciliation tick.

use std::collections::{BTreeMap, VecDeque};

use super::{
    AgentDecision, CommunityMetrics, EnergyFlow, Forecast, FlowKey, MetricsPatch, Node, NodeId,
    NodePatch, SimulationStatus,
};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CanonicalState {
    pub simulation: SimulationStatus,
    /// Keyed by id, which keeps ids unique and iteration deterministic
    pub nodes: BTreeMap<NodeId, Node>,
    pub flows: BTreeMap<FlowKey, EnergyFlow>,
    pub metrics: CommunityMetrics,
    pub forecast: Option<Forecast>,
    pub decisions: VecDeque<AgentDecision>,
}

impl CanonicalState {
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn contains_node(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.keys().copied()
    }

    /// Flows with a non-zero amount
    pub fn active_flows(&self) -> impl Iterator<Item = &EnergyFlow> + '_ {
        self.flows.values().filter(|f| f.is_active())
    }

    /// Replace the node section. Returns the ids that disappeared.
    pub fn replace_nodes(&mut self, nodes: Vec<Node>) -> Vec<NodeId> {
        let mut next = BTreeMap::new();
        for node in nodes {
            if next.insert(node.id, node).is_some() {
                tracing::debug!("duplicate node id in snapshot, keeping the last entry");
            }
        }

        let removed: Vec<NodeId> = self
            .nodes
            .keys()
            .filter(|id| !next.contains_key(id))
            .copied()
            .collect();
        self.nodes = next;

        if !removed.is_empty() {
            self.flows
                .retain(|_, f| !removed.iter().any(|id| f.touches(*id)));
        }
        removed
    }

    /// Field-level node updates; nodes not named are untouched, unknown ids are created.
    pub fn patch_nodes(&mut self, patches: &[NodePatch], default_capacity: f64) {
        for patch in patches {
            match self.nodes.get_mut(&patch.id) {
                Some(node) => node.apply(patch),
                None => {
                    self.nodes.insert(patch.id, patch.into_node(default_capacity));
                }
            }
        }
    }

    pub fn replace_flows(&mut self, flows: Vec<EnergyFlow>) {
        self.flows = flows.into_iter().map(|f| (f.key(), f)).collect();
    }

    /// Upsert flows by edge; edges not named are untouched.
    pub fn patch_flows(&mut self, flows: &[EnergyFlow]) {
        for flow in flows {
            self.flows.insert(flow.key(), *flow);
        }
    }

    pub fn patch_metrics(&mut self, patch: &MetricsPatch) {
        self.metrics.apply(patch);
    }

    /// Append to the decision log, evicting the oldest entries beyond `capacity`.
    pub fn append_decisions(&mut self, decisions: &[AgentDecision], capacity: usize) {
        self.decisions.extend(decisions.iter().cloned());
        while self.decisions.len() > capacity {
            self.decisions.pop_front();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AgentDecision, DecisionAction, FlowEndpoint};

    fn node(id: u32) -> Node {
        Node::new(NodeId(id), 1.0, 1.0, 1.0, 10.0, None)
    }

    fn flow(from: u32, to: u32, amount: f64) -> EnergyFlow {
        EnergyFlow::new(
            FlowEndpoint::Node(NodeId(from)),
            FlowEndpoint::Node(NodeId(to)),
            amount,
        )
        .unwrap()
    }

    #[test]
    fn test_replace_nodes_reports_removed_and_prunes_flows() {
        let mut s = CanonicalState::default();
        s.replace_nodes(vec![node(0), node(1), node(2)]);
        s.replace_flows(vec![flow(0, 1, 2.0), flow(1, 2, 1.0)]);

        let removed = s.replace_nodes(vec![node(0), node(1)]);
        assert_eq!(removed, vec![NodeId(2)]);
        assert_eq!(s.flows.len(), 1);
        assert!(s.flows.values().all(|f| !f.touches(NodeId(2))));
    }

    #[test]
    fn test_patch_flows_upserts_by_edge() {
        let mut s = CanonicalState::default();
        s.replace_flows(vec![flow(0, 1, 2.0), flow(1, 2, 1.0)]);
        s.patch_flows(&[flow(0, 1, 0.0)]);

        assert_eq!(s.flows.len(), 2);
        assert_eq!(s.active_flows().count(), 1);
    }

    #[test]
    fn test_decision_log_is_bounded() {
        let mut s = CanonicalState::default();
        let decisions: Vec<AgentDecision> = (0..5)
            .map(|i| AgentDecision {
                agent_id: NodeId(i),
                action: DecisionAction::Hold,
                amount: 0.0,
                target: None,
                timestamp: None,
            })
            .collect();
        s.append_decisions(&decisions, 3);
        assert_eq!(s.decisions.len(), 3);
        assert_eq!(s.decisions.front().map(|d| d.agent_id), Some(NodeId(2)));
    }
}

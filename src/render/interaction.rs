use ordered_float::OrderedFloat;
use serde::Serialize;
use tracing::debug;

use super::layout::{LayoutEngine, Point2};
use crate::domain::{CanonicalState, NodeId};
use crate::error::SelectionError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "state", content = "id", rename_all = "lowercase")]
pub enum Selection {
    #[default]
    Unselected,
    Selected(NodeId),
}

impl Selection {
    pub fn id(&self) -> Option<NodeId> {
        match self {
            Selection::Selected(id) => Some(*id),
            Selection::Unselected => None,
        }
    }
}

/// Single-selection state driven by pointer input and explicit calls
#[derive(Debug, Clone)]
pub struct SelectionController {
    selection: Selection,
    hit_radius: f64,
}

impl SelectionController {
    pub fn new(hit_radius: f64) -> Self {
        Self {
            selection: Selection::Unselected,
            hit_radius,
        }
    }

    pub fn selection(&self) -> Selection {
        self.selection
    }

    pub fn selected(&self) -> Option<NodeId> {
        self.selection.id()
    }

    /// Nearest node within the hit radius of `at`, in layout 2-D coordinates.
    pub fn hit_test(&self, layout: &LayoutEngine, at: Point2) -> Option<NodeId> {
        layout
            .positions_2d()
            .map(|(id, p)| (id, p.distance(&at)))
            .filter(|(_, d)| *d <= self.hit_radius)
            .min_by_key(|(id, d)| (OrderedFloat(*d), *id))
            .map(|(id, _)| id)
    }

    /// A miss leaves the current selection alone.
    pub fn pointer(&mut self, layout: &LayoutEngine, at: Point2) -> Option<NodeId> {
        let hit = self.hit_test(layout, at)?;
        self.selection = Selection::Selected(hit);
        debug!(node = %hit, "node selected by pointer");
        Some(hit)
    }

    pub fn select(&mut self, state: &CanonicalState, id: NodeId) -> Result<(), SelectionError> {
        if !state.contains_node(id) {
            return Err(SelectionError::UnknownNode(id));
        }
        self.selection = Selection::Selected(id);
        debug!(node = %id, "node selected");
        Ok(())
    }

    pub fn close(&mut self) {
        self.selection = Selection::Unselected;
    }

    /// Drop the selection if its node left the state. Returns true if it did.
    pub fn reconcile(&mut self, state: &CanonicalState) -> bool {
        match self.selection {
            Selection::Selected(id) if !state.contains_node(id) => {
                debug!(node = %id, "selected node disappeared");
                self.selection = Selection::Unselected;
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Node;
    use crate::render::layout::LayoutSettings;

    fn state(ids: &[u32]) -> CanonicalState {
        let mut s = CanonicalState::default();
        s.replace_nodes(
            ids.iter()
                .map(|&i| Node::new(NodeId(i), 1.0, 1.0, 1.0, 10.0, None))
                .collect(),
        );
        s
    }

    fn layout_for(state: &CanonicalState) -> LayoutEngine {
        let mut layout = LayoutEngine::new(LayoutSettings {
            spacing: 4.0,
            elevation: 0.0,
            padding: 0.0,
        });
        layout.sync(state.node_ids());
        layout
    }

    #[test]
    fn test_pointer_picks_nearest_within_radius() {
        let s = state(&[0, 1, 2, 3]);
        let layout = layout_for(&s);
        let mut ctl = SelectionController::new(1.5);

        // node 1 sits at (4, 0)
        assert_eq!(ctl.pointer(&layout, Point2::new(3.2, 0.5)), Some(NodeId(1)));
        assert_eq!(ctl.selection(), Selection::Selected(NodeId(1)));

        // a miss keeps the selection
        assert_eq!(ctl.pointer(&layout, Point2::new(2.0, 2.0)), None);
        assert_eq!(ctl.selected(), Some(NodeId(1)));

        // switching goes straight to the new node
        assert_eq!(ctl.pointer(&layout, Point2::new(0.1, 4.0)), Some(NodeId(2)));
        assert_eq!(ctl.selected(), Some(NodeId(2)));
    }

    #[test]
    fn test_select_by_id_is_exact() {
        let s = state(&[0, 1]);
        let mut ctl = SelectionController::new(1.0);
        assert_eq!(ctl.select(&s, NodeId(5)), Err(SelectionError::UnknownNode(NodeId(5))));
        assert_eq!(ctl.selection(), Selection::Unselected);

        ctl.select(&s, NodeId(1)).unwrap();
        assert_eq!(ctl.selected(), Some(NodeId(1)));
        ctl.close();
        assert_eq!(ctl.selection(), Selection::Unselected);
    }

    #[test]
    fn test_selection_cleared_when_node_removed() {
        let mut ctl = SelectionController::new(1.0);
        ctl.select(&state(&[0, 1, 2]), NodeId(2)).unwrap();

        assert!(!ctl.reconcile(&state(&[0, 1, 2, 3])));
        assert_eq!(ctl.selected(), Some(NodeId(2)));

        assert!(ctl.reconcile(&state(&[0, 1])));
        assert_eq!(ctl.selection(), Selection::Unselected);
    }

    #[test]
    fn test_equidistant_hit_prefers_lower_id() {
        let s = state(&[0, 1]);
        let layout = layout_for(&s);
        let ctl = SelectionController::new(3.0);
        assert_eq!(ctl.hit_test(&layout, Point2::new(2.0, 0.0)), Some(NodeId(0)));
    }
}

//! # Spatial Layout
//!
//! Places nodes on a square grid of `⌈√N⌉` cells per side. A node keeps its
//! cell for as long as it stays in the node set, so reordering the node list
//! never moves anything on screen.
//!
//! Cells are handed out in row-major order, lowest free cell first, with new
//! ids allocated in ascending id order. When the node count shrinks far enough
//! that the grid loses a row and column, only nodes stranded outside the new
//! bounds are moved.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

use crate::domain::NodeId;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Point2 {
    pub x: f64,
    pub y: f64,
}

impl Point2 {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Point2) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Point3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Point3 {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Linear interpolation; `t` = 0 is `self`, `t` = 1 is `other`.
    pub fn lerp(&self, other: &Point3, t: f64) -> Point3 {
        Point3 {
            x: self.x + (other.x - self.x) * t,
            y: self.y + (other.y - self.y) * t,
            z: self.z + (other.z - self.z) * t,
        }
    }

    pub fn lifted(&self, dy: f64) -> Point3 {
        Point3 {
            y: self.y + dy,
            ..*self
        }
    }
}

/// Grid cell as (row, col)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Cell {
    pub row: usize,
    pub col: usize,
}

impl Cell {
    fn from_index(index: usize, dims: usize) -> Self {
        Self {
            row: index / dims,
            col: index % dims,
        }
    }

    fn fits(&self, dims: usize) -> bool {
        self.row < dims && self.col < dims
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutSettings {
    /// Distance between neighbouring cell centres
    pub spacing: f64,
    /// Height of node anchors in the 3-D scene
    pub elevation: f64,
    /// Offset of the first cell from the 2-D origin
    pub padding: f64,
}

impl Default for LayoutSettings {
    fn default() -> Self {
        Self {
            spacing: 3.0,
            elevation: 1.5,
            padding: 1.5,
        }
    }
}

/// Side length of the smallest square grid holding `n` cells.
pub fn grid_dims(n: usize) -> usize {
    let mut d = (n as f64).sqrt() as usize;
    while d * d < n {
        d += 1;
    }
    while d > 0 && (d - 1) * (d - 1) >= n {
        d -= 1;
    }
    d
}

#[derive(Debug, Clone, Default)]
pub struct LayoutEngine {
    settings: LayoutSettings,
    cells: BTreeMap<NodeId, Cell>,
    dims: usize,
}

impl LayoutEngine {
    pub fn new(settings: LayoutSettings) -> Self {
        Self {
            settings,
            cells: BTreeMap::new(),
            dims: 0,
        }
    }

    pub fn dims(&self) -> usize {
        self.dims
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn cell(&self, id: NodeId) -> Option<Cell> {
        self.cells.get(&id).copied()
    }

    /// Bring the cell map in line with `ids`. Returns true if any node was
    /// added, removed or moved.
    pub fn sync(&mut self, ids: impl IntoIterator<Item = NodeId>) -> bool {
        let wanted: BTreeSet<NodeId> = ids.into_iter().collect();
        let before = self.cells.len();
        self.cells.retain(|id, _| wanted.contains(id));
        let mut changed = self.cells.len() != before;

        let dims = grid_dims(wanted.len());
        if dims != self.dims {
            self.dims = dims;
            changed = true;
        }

        let stranded: Vec<NodeId> = self
            .cells
            .iter()
            .filter(|(_, cell)| !cell.fits(self.dims))
            .map(|(id, _)| *id)
            .collect();
        for id in &stranded {
            self.cells.remove(id);
        }

        let pending: BTreeSet<NodeId> = wanted
            .iter()
            .filter(|id| !self.cells.contains_key(id))
            .copied()
            .collect();
        if pending.is_empty() {
            return changed;
        }

        let taken: BTreeSet<Cell> = self.cells.values().copied().collect();
        let mut free = (0..self.dims * self.dims)
            .map(|i| Cell::from_index(i, self.dims))
            .filter(|c| !taken.contains(c));
        for id in pending {
            // dims² ≥ N guarantees a free cell
            if let Some(cell) = free.next() {
                self.cells.insert(id, cell);
            }
        }
        true
    }

    fn centred(&self, index: usize) -> f64 {
        let mid = (self.dims.saturating_sub(1)) as f64 / 2.0;
        (index as f64 - mid) * self.settings.spacing
    }

    /// 3-D anchor: the grid is centred on the origin in the x/z plane.
    pub fn position(&self, id: NodeId) -> Option<Point3> {
        let cell = self.cells.get(&id)?;
        Some(Point3::new(
            self.centred(cell.col),
            self.settings.elevation,
            self.centred(cell.row),
        ))
    }

    /// 2-D anchor: the grid grows right and down from `padding`.
    pub fn position_2d(&self, id: NodeId) -> Option<Point2> {
        let cell = self.cells.get(&id)?;
        Some(Point2::new(
            self.settings.padding + cell.col as f64 * self.settings.spacing,
            self.settings.padding + cell.row as f64 * self.settings.spacing,
        ))
    }

    pub fn positions_2d(&self) -> impl Iterator<Item = (NodeId, Point2)> + '_ {
        self.cells
            .keys()
            .filter_map(move |id| self.position_2d(*id).map(|p| (*id, p)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;

    fn ids(raw: &[u32]) -> Vec<NodeId> {
        raw.iter().copied().map(NodeId).collect()
    }

    #[rstest]
    #[case(0, 0)]
    #[case(1, 1)]
    #[case(2, 2)]
    #[case(4, 2)]
    #[case(5, 3)]
    #[case(9, 3)]
    #[case(10, 4)]
    #[case(50, 8)]
    fn test_grid_dims(#[case] n: usize, #[case] dims: usize) {
        assert_eq!(grid_dims(n), dims);
    }

    #[test]
    fn test_three_nodes_reordered_keep_cells() {
        let mut layout = LayoutEngine::new(LayoutSettings::default());
        layout.sync(ids(&[0, 1, 2]));
        assert_eq!(layout.dims(), 2);
        let cell = layout.cell(NodeId(2)).unwrap();
        let pos = layout.position(NodeId(2)).unwrap();

        assert!(!layout.sync(ids(&[2, 0, 1])));
        assert_eq!(layout.cell(NodeId(2)), Some(cell));
        assert_eq!(layout.position(NodeId(2)), Some(pos));
    }

    #[test]
    fn test_growth_never_moves_existing_nodes() {
        let mut layout = LayoutEngine::new(LayoutSettings::default());
        layout.sync(ids(&[0, 1, 2, 3]));
        let before: Vec<_> = (0..4).map(|i| layout.cell(NodeId(i))).collect();

        layout.sync(ids(&[0, 1, 2, 3, 4]));
        assert_eq!(layout.dims(), 3);
        let after: Vec<_> = (0..4).map(|i| layout.cell(NodeId(i))).collect();
        assert_eq!(before, after);
        assert_eq!(layout.cell(NodeId(4)), Some(Cell { row: 0, col: 2 }));
    }

    #[test]
    fn test_removed_slot_is_reused() {
        let mut layout = LayoutEngine::new(LayoutSettings::default());
        layout.sync(ids(&[0, 1, 2, 3]));
        let freed = layout.cell(NodeId(1)).unwrap();

        assert!(layout.sync(ids(&[0, 2, 3, 9])));
        assert_eq!(layout.cell(NodeId(1)), None);
        assert_eq!(layout.cell(NodeId(9)), Some(freed));
    }

    #[test]
    fn test_shrink_relocates_only_stranded_nodes() {
        let mut layout = LayoutEngine::new(LayoutSettings::default());
        layout.sync(ids(&[0, 1, 2, 3, 4]));
        assert_eq!(layout.dims(), 3);
        // 2 sits at (0,2), outside a 2x2 grid
        let keep: Vec<_> = [0, 3, 4].iter().map(|&i| layout.cell(NodeId(i))).collect();

        layout.sync(ids(&[0, 2, 3, 4]));
        assert_eq!(layout.dims(), 2);
        let kept: Vec<_> = [0, 3, 4].iter().map(|&i| layout.cell(NodeId(i))).collect();
        assert_eq!(keep, kept);
        assert_eq!(layout.cell(NodeId(2)), Some(Cell { row: 0, col: 1 }));
    }

    #[test]
    fn test_positions() {
        let settings = LayoutSettings {
            spacing: 2.0,
            elevation: 1.0,
            padding: 5.0,
        };
        let mut layout = LayoutEngine::new(settings);
        layout.sync(ids(&[0, 1, 2, 3]));

        assert_eq!(layout.position(NodeId(0)), Some(Point3::new(-1.0, 1.0, -1.0)));
        assert_eq!(layout.position(NodeId(3)), Some(Point3::new(1.0, 1.0, 1.0)));
        assert_eq!(layout.position_2d(NodeId(1)), Some(Point2::new(7.0, 5.0)));
        assert_eq!(layout.position(NodeId(42)), None);
    }

    #[test]
    fn test_empty_set() {
        let mut layout = LayoutEngine::new(LayoutSettings::default());
        layout.sync(ids(&[3]));
        assert!(layout.sync(Vec::new()));
        assert!(layout.is_empty());
        assert_eq!(layout.dims(), 0);
    }

    proptest! {
        #[test]
        fn prop_order_does_not_affect_position(
            set in proptest::collection::btree_set(0u32..200, 0..60),
            seed in any::<u64>(),
        ) {
            let ordered: Vec<NodeId> = set.iter().copied().map(NodeId).collect();
            let mut shuffled = ordered.clone();
            // deterministic rotation stands in for an arbitrary reorder
            if !shuffled.is_empty() {
                let k = (seed as usize) % shuffled.len();
                shuffled.rotate_left(k);
                shuffled.reverse();
            }

            let mut layout = LayoutEngine::new(LayoutSettings::default());
            layout.sync(ordered.clone());
            let first: Vec<_> = ordered.iter().map(|id| layout.position(*id)).collect();
            layout.sync(shuffled);
            let second: Vec<_> = ordered.iter().map(|id| layout.position(*id)).collect();
            prop_assert_eq!(first, second);
        }

        #[test]
        fn prop_cells_are_unique_and_in_bounds(
            steps in proptest::collection::vec(proptest::collection::btree_set(0u32..40, 0..30), 1..8),
        ) {
            let mut layout = LayoutEngine::new(LayoutSettings::default());
            for set in steps {
                layout.sync(set.iter().copied().map(NodeId));
                let cells: BTreeSet<Cell> = set.iter().filter_map(|id| layout.cell(NodeId(*id))).collect();
                prop_assert_eq!(cells.len(), set.len());
                prop_assert!(cells.iter().all(|c| c.fits(layout.dims())));
            }
        }
    }
}

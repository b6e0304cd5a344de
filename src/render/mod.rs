//! Spatial view of the canonical state: stable node layout, animated flow
//! markers, selection, and the per-frame scene handed to the display.

pub mod animator;
pub mod frame;
pub mod interaction;
pub mod layout;

pub use animator::{marker_count, AnimatorSettings, FlowAnimator, FlowSegment, FlowTrack};
pub use frame::{
    ForecastView, InputEvent, LogSceneSink, MetricsView, PlacedNode, Renderer, Scene, SceneSink,
};
pub use interaction::{Selection, SelectionController};
pub use layout::{grid_dims, Cell, LayoutEngine, LayoutSettings, Point2, Point3};

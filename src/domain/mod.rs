pub mod decision;
pub mod flow;
pub mod forecast;
pub mod metrics;
pub mod node;
pub mod simulation;
pub mod state;

pub use decision::*;
pub use flow::*;
pub use forecast::*;
pub use metrics::*;
pub use node::*;
pub use simulation::*;
pub use state::*;

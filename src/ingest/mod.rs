//! Translation from backend wire shapes into domain types and patches.

pub mod snapshot;
pub mod stream;
mod wire;

pub use snapshot::{decode_forecast, decode_metrics, decode_node, decode_nodes, decode_status};
pub use stream::parse_stream_message;

use thiserror::Error;

use crate::domain::NodeId;
use crate::sync::Resource;

/// Errors raised inside the sync layer.
///
/// None of these are fatal: the poller absorbs per-resource failures and the
/// listener logs and exits, leaving reconnection to its owner.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("HTTP request for {resource} failed: {source}")]
    Http {
        resource: Resource,
        #[source]
        source: reqwest::Error,
    },

    #[error("{resource} returned HTTP {status}")]
    HttpStatus {
        resource: Resource,
        status: reqwest::StatusCode,
    },

    #[error("could not decode {resource} payload: {source}")]
    Decode {
        resource: Resource,
        #[source]
        source: serde_json::Error,
    },

    #[error("{resource} timed out")]
    Timeout { resource: Resource },

    #[error("command {command} failed: {message}")]
    Command { command: &'static str, message: String },

    #[error("stream error: {0}")]
    Stream(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("invalid URL: {0}")]
    Url(String),

    #[error("event queue closed")]
    ChannelClosed,
}

/// Errors raised by the selection controller
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectionError {
    #[error("node {0} is not present in the current state")]
    UnknownNode(NodeId),
}

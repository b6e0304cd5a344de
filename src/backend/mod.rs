//! HTTP access to the simulation backend.

pub mod client;

pub use client::{BackendClient, CommandAck};

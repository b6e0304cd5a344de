pub mod backend;
pub mod config;
pub mod dashboard;
pub mod domain;
pub mod error;
pub mod ingest;
pub mod render;
pub mod sync;
pub mod telemetry;

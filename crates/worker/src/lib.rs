//! Process wiring for the `lipsync-worker` binary.

pub mod config;
pub mod telemetry;

pub use config::{LogFormat, WorkerConfig};
pub use telemetry::{init_tracing, log_events};

//! Domain types shared by every lipsync crate.
//!
//! Holds the job record and its state machine, the submission payload and
//! its validation rules, the error taxonomy, the notification message
//! constants and small environment-config helpers. This crate has no
//! internal dependencies.

pub mod config;
pub mod error;
pub mod job;
pub mod job_events;
pub mod payload;
pub mod types;

//! Shared plumbing: errors, configuration, logging and report timestamps.

pub mod config;
pub mod error;
pub mod logging;
pub mod time;

//! Shared utility functions.
//!
//! - `group_path`: canonical group paths and spider names
//! - `format`: human-readable durations and timestamps

mod format;
pub mod group_path;

pub use format::{format_relative, format_seconds};

//! Chartcask core - shared types for the chartcask workspace.
//!
//! This crate carries the error taxonomy and the chart model used by the
//! registry crate. It performs no I/O of its own.

pub mod chart;
pub mod error;

pub use chart::{Chart, Metadata};
pub use error::{CaskError, Result};

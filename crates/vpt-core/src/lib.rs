//! Core data model, error taxonomy, configuration, and telemetry shared by
//! every crate in the execution core.

pub mod config;
pub mod error;
pub mod model;
pub mod telemetry;

pub use error::{Error, Result};

//! Harness layer: the campaign executor and the script execution
//! scaffolding that every standalone test script runs inside.

pub mod campaign;
pub mod report;
pub mod script;

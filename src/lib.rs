//! prscan: measure the static-analysis issues pull requests introduce
//! (library crate).
//!
//! Re-exports public modules for integration tests and external use.

pub mod config;
pub mod constants;
pub mod delta;
pub mod env;
pub mod execution;
pub mod github;
pub mod lineage;
pub mod logging;
pub mod models;
pub mod orchestrator;
pub mod pipeline;
pub mod snapshot;
pub mod sonar;
pub mod state;

//! Configuration loading and layering.
//!
//! Handles `.prscan.toml` loading, environment variable resolution and
//! layering over the global config with proper priority ordering.

pub mod loader;

pub use loader::{BuildConfig, Config, ConfigError, GitHubConfig, PipelineConfig, SonarConfig};

//! App-wide constants.
//!
//! Centralises the tool name, config paths, environment variable names,
//! data-directory layout and remote endpoints so a rename only requires
//! changing this file.

/// Display name of the tool (lowercase).
pub const APP_NAME: &str = "prscan";

/// Crate version baked in at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// User agent sent with every HTTP request.
pub const USER_AGENT: &str = concat!("prscan/", env!("CARGO_PKG_VERSION"));

/// Local config filename (e.g. `.prscan.toml` in the working directory).
pub const CONFIG_FILENAME: &str = ".prscan.toml";

/// Directory name under `~/.config/` for global config.
pub const CONFIG_DIR: &str = "prscan";

/// Default GitHub REST/GraphQL API root.
pub const GITHUB_API_URL: &str = "https://api.github.com";

/// Default GitHub web root (source archives are served from here).
pub const GITHUB_WEB_URL: &str = "https://github.com";

/// Default analysis server.
pub const SONAR_HOST: &str = "http://localhost:9000";

// ── Environment variable names ──────────────────────────────────────

pub const ENV_GITHUB_TOKEN: &str = "GITHUB_TOKEN";
pub const ENV_SONAR_TOKEN: &str = "SONAR_TOKEN";
pub const ENV_SONAR_HOST: &str = "SONAR_HOST";
pub const ENV_DATA_DIR: &str = "PRSCAN_DATA_DIR";
pub const ENV_WORK_DIR: &str = "PRSCAN_WORK_DIR";

// ── Data directory layout ───────────────────────────────────────────

/// Mined pull requests, one file per repository.
pub const RAW_DIR: &str = "raw";
/// Lineage-resolved pull requests, one file per repository.
pub const PULLS_DIR: &str = "pulls";
/// Per-PR analysis artifacts.
pub const OUTPUT_DIR: &str = "output";
/// Exclusion ledgers and monitoring files.
pub const STATE_DIR: &str = "state";
/// Classified issue records, one file per repository.
pub const CLASSIFIED_DIR: &str = "classified";
/// Pull-request characterization and flattened timings.
pub const REPORTS_DIR: &str = "reports";
/// Execution log.
pub const LOGS_DIR: &str = "logs";

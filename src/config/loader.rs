//! Config struct and loading logic.
//!
//! Priority (highest to lowest):
//! 1. Environment variables
//! 2. `--config <path>`, or `.prscan.toml` in the working directory
//! 3. `~/.config/prscan/config.toml` (global defaults)
//! 4. Built-in defaults

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::constants::{
    CONFIG_DIR, CONFIG_FILENAME, ENV_DATA_DIR, ENV_GITHUB_TOKEN, ENV_SONAR_HOST, ENV_SONAR_TOKEN,
    ENV_WORK_DIR, GITHUB_API_URL, GITHUB_WEB_URL, SONAR_HOST,
};
use crate::env::Env;

/// Errors during config loading.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    ParseFile {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("no build command configured for repository '{0}' (add it under [build.commands])")]
    MissingBuildCommand(String),

    #[error("no GitHub owner configured (set github.owner)")]
    MissingOwner,
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub github: GitHubConfig,
    pub sonar: SonarConfig,
    pub pipeline: PipelineConfig,
    pub build: BuildConfig,
}

/// GitHub API access.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GitHubConfig {
    /// Owner (user or organization) of every configured repository.
    pub owner: Option<String>,
    pub token: Option<String>,
    pub api_url: String,
    /// Web root serving source archives.
    pub web_url: String,
    /// Pause between GraphQL pages, to stay under the rate limit.
    pub page_delay_secs: u64,
    /// Pause between REST file-listing pages.
    pub files_page_delay_ms: u64,
}

impl std::fmt::Debug for GitHubConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubConfig")
            .field("owner", &self.owner)
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field("api_url", &self.api_url)
            .field("web_url", &self.web_url)
            .field("page_delay_secs", &self.page_delay_secs)
            .field("files_page_delay_ms", &self.files_page_delay_ms)
            .finish()
    }
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            owner: None,
            token: None,
            api_url: GITHUB_API_URL.to_string(),
            web_url: GITHUB_WEB_URL.to_string(),
            page_delay_secs: 120,
            files_page_delay_ms: 1000,
        }
    }
}

impl GitHubConfig {
    pub fn owner(&self) -> Result<&str, ConfigError> {
        self.owner.as_deref().ok_or(ConfigError::MissingOwner)
    }
}

/// Analysis server and scanner settings.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SonarConfig {
    pub host: String,
    pub token: Option<String>,
    pub language: String,
    /// Scanner executable, optionally followed by extra arguments.
    pub scanner_command: String,
    /// Glob of compiled classes handed to the scanner.
    pub binaries: String,
    pub exclusions: Vec<String>,
    pub poll_interval_ms: u64,
    /// Give up waiting for ingestion after this long. Unset waits forever.
    pub poll_timeout_secs: Option<u64>,
}

impl std::fmt::Debug for SonarConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SonarConfig")
            .field("host", &self.host)
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field("language", &self.language)
            .field("scanner_command", &self.scanner_command)
            .field("binaries", &self.binaries)
            .field("exclusions", &self.exclusions)
            .field("poll_interval_ms", &self.poll_interval_ms)
            .field("poll_timeout_secs", &self.poll_timeout_secs)
            .finish()
    }
}

impl Default for SonarConfig {
    fn default() -> Self {
        Self {
            host: SONAR_HOST.to_string(),
            token: None,
            language: "java".to_string(),
            scanner_command: "sonar-scanner".to_string(),
            binaries: "**/target/classes".to_string(),
            exclusions: default_exclusions(),
            poll_interval_ms: 1000,
            poll_timeout_secs: None,
        }
    }
}

impl SonarConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn poll_timeout(&self) -> Option<Duration> {
        self.poll_timeout_secs.map(Duration::from_secs)
    }
}

fn default_exclusions() -> Vec<String> {
    [
        "**/*.py", "**/*.css", "**/*.js", "**/*.ts", "**/*.jsx", "**/*.tsx", "**/*.xml",
        "**/*.yaml", "**/*.html",
    ]
    .into_iter()
    .map(str::to_string)
    .collect()
}

/// Batch pipeline settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub repos: Vec<String>,
    pub data_dir: PathBuf,
    /// Parent directory for per-commit working copies.
    pub work_dir: PathBuf,
    /// Keep only PRs merged at or before this instant (RFC 3339 string).
    pub merged_before: Option<DateTime<Utc>>,
    /// Only files with this suffix count as changed source files.
    pub source_extension: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            repos: Vec::new(),
            data_dir: PathBuf::from("./data"),
            work_dir: PathBuf::from("./work"),
            merged_before: None,
            source_extension: ".java".to_string(),
        }
    }
}

/// Per-repository build commands.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    pub commands: BTreeMap<String, String>,
    /// Kill a build running longer than this. Unset lets it run.
    pub timeout_secs: Option<u64>,
}

impl BuildConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

impl Config {
    /// Load configuration with proper layering.
    ///
    /// `explicit` replaces the lookup of `.prscan.toml` in `cwd` and must
    /// exist.
    pub fn load(explicit: Option<&Path>, cwd: Option<&Path>, env: &Env) -> Result<Self, ConfigError> {
        let mut config = Config::default();

        // Layer 3: global config
        if let Some(global_path) = Self::global_config_path() {
            if global_path.exists() {
                let global = Self::load_file(&global_path)?;
                config.merge(global);
            }
        }

        // Layer 2: explicit or working-directory config
        match explicit {
            Some(path) => config.merge(Self::load_file(path)?),
            None => {
                if let Some(dir) = cwd {
                    let local_path = dir.join(CONFIG_FILENAME);
                    if local_path.exists() {
                        config.merge(Self::load_file(&local_path)?);
                    }
                }
            }
        }

        // Layer 1: environment variables
        config.apply_env_vars(env);

        Ok(config)
    }

    /// Load a config from a specific file.
    fn load_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
            path: path.to_path_buf(),
            source: e,
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::ParseFile {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Get the global config file path.
    fn global_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(CONFIG_DIR).join("config.toml"))
    }

    /// Build command for `repo`.
    pub fn build_command(&self, repo: &str) -> Result<&str, ConfigError> {
        self.build
            .commands
            .get(repo)
            .map(String::as_str)
            .ok_or_else(|| ConfigError::MissingBuildCommand(repo.to_string()))
    }

    /// Repositories a command applies to: the requested ones, or every
    /// configured repository when none are requested.
    pub fn select_repos(&self, requested: &[String]) -> Vec<String> {
        if requested.is_empty() {
            self.pipeline.repos.clone()
        } else {
            requested.to_vec()
        }
    }

    /// Merge another config into this one (other takes precedence for
    /// non-default values).
    fn merge(&mut self, other: Config) {
        // GitHub settings
        let default_github = GitHubConfig::default();
        if other.github.owner.is_some() {
            self.github.owner = other.github.owner;
        }
        if other.github.token.is_some() {
            self.github.token = other.github.token;
        }
        if other.github.api_url != default_github.api_url {
            self.github.api_url = other.github.api_url;
        }
        if other.github.web_url != default_github.web_url {
            self.github.web_url = other.github.web_url;
        }
        if other.github.page_delay_secs != default_github.page_delay_secs {
            self.github.page_delay_secs = other.github.page_delay_secs;
        }
        if other.github.files_page_delay_ms != default_github.files_page_delay_ms {
            self.github.files_page_delay_ms = other.github.files_page_delay_ms;
        }

        // Sonar settings
        let default_sonar = SonarConfig::default();
        if other.sonar.host != default_sonar.host {
            self.sonar.host = other.sonar.host;
        }
        if other.sonar.token.is_some() {
            self.sonar.token = other.sonar.token;
        }
        if other.sonar.language != default_sonar.language {
            self.sonar.language = other.sonar.language;
        }
        if other.sonar.scanner_command != default_sonar.scanner_command {
            self.sonar.scanner_command = other.sonar.scanner_command;
        }
        if other.sonar.binaries != default_sonar.binaries {
            self.sonar.binaries = other.sonar.binaries;
        }
        if other.sonar.exclusions != default_sonar.exclusions {
            self.sonar.exclusions = other.sonar.exclusions;
        }
        if other.sonar.poll_interval_ms != default_sonar.poll_interval_ms {
            self.sonar.poll_interval_ms = other.sonar.poll_interval_ms;
        }
        if other.sonar.poll_timeout_secs.is_some() {
            self.sonar.poll_timeout_secs = other.sonar.poll_timeout_secs;
        }

        // Pipeline settings
        let default_pipeline = PipelineConfig::default();
        if !other.pipeline.repos.is_empty() {
            self.pipeline.repos = other.pipeline.repos;
        }
        if other.pipeline.data_dir != default_pipeline.data_dir {
            self.pipeline.data_dir = other.pipeline.data_dir;
        }
        if other.pipeline.work_dir != default_pipeline.work_dir {
            self.pipeline.work_dir = other.pipeline.work_dir;
        }
        if other.pipeline.merged_before.is_some() {
            self.pipeline.merged_before = other.pipeline.merged_before;
        }
        if other.pipeline.source_extension != default_pipeline.source_extension {
            self.pipeline.source_extension = other.pipeline.source_extension;
        }

        // Build commands are merged per repository
        self.build.commands.extend(other.build.commands);
        if other.build.timeout_secs.is_some() {
            self.build.timeout_secs = other.build.timeout_secs;
        }
    }

    /// Apply environment variable overrides.
    fn apply_env_vars(&mut self, env: &Env) {
        if let Some(val) = env.non_empty(ENV_GITHUB_TOKEN) {
            self.github.token = Some(val);
        }
        if let Some(val) = env.non_empty(ENV_SONAR_TOKEN) {
            self.sonar.token = Some(val);
        }
        if let Some(val) = env.non_empty(ENV_SONAR_HOST) {
            if val.starts_with("http://") || val.starts_with("https://") {
                self.sonar.host = val;
            } else {
                warn!("ignoring invalid {ENV_SONAR_HOST} value: {val}");
            }
        }
        if let Some(val) = env.non_empty(ENV_DATA_DIR) {
            self.pipeline.data_dir = PathBuf::from(val);
        }
        if let Some(val) = env.non_empty(ENV_WORK_DIR) {
            self.pipeline.work_dir = PathBuf::from(val);
        }
    }
}

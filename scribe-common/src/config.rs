//! Configuration loading and credential resolution
//!
//! Config file location follows this priority order:
//! 1. Command-line argument (highest priority)
//! 2. `SCRIBE_CONFIG` environment variable
//! 3. `<config dir>/scribe/config.toml`
//! 4. Compiled defaults (fallback)
//!
//! A missing file at the default location is not fatal: a warning is logged and the
//! compiled defaults are used. A file that was named explicitly (CLI or environment)
//! must exist, and any file that exists must parse.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "SCRIBE_CONFIG";

/// Default listen address for the HTTP service
pub const DEFAULT_LISTEN: &str = "127.0.0.1:5730";

/// Credential variable consulted for the generation backend when the profile names none
pub const GENERATION_KEY_ENV: &str = "SILICONFLOW_API_KEY";

/// Credential variable consulted for the rewrite backend when the profile names none
pub const REWRITE_KEY_ENV: &str = "DEEPSEEK_API_KEY";

/// Top-level TOML configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    /// Socket address the HTTP service binds to
    pub listen: String,
    /// Logging configuration
    pub logging: LoggingConfig,
    /// Backend used for topic generation and matrix generation
    pub generation: BackendProfile,
    /// Backend used for block rewrites (falls back to `generation` when absent)
    pub rewrite: Option<BackendProfile>,
    /// Media lookup backend
    pub media: MediaConfig,
    /// Fan-out and reassembly settings
    pub pipeline: PipelineSettings,
    /// Operator-supplied directive table (bundled table when absent)
    pub directives_path: Option<PathBuf>,
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            listen: DEFAULT_LISTEN.to_string(),
            logging: LoggingConfig::default(),
            generation: BackendProfile::default(),
            rewrite: None,
            media: MediaConfig::default(),
            pipeline: PipelineSettings::default(),
            directives_path: None,
        }
    }
}

impl TomlConfig {
    /// Reject values the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.pipeline.max_concurrency == 0 {
            return Err(Error::Config(
                "pipeline.max_concurrency must be at least 1".to_string(),
            ));
        }
        if self.pipeline.unit_timeout_secs == 0 {
            return Err(Error::Config(
                "pipeline.unit_timeout_secs must be at least 1".to_string(),
            ));
        }
        if self.media.timeout_secs == 0 {
            return Err(Error::Config("media.timeout_secs must be at least 1".to_string()));
        }
        self.generation.validate("generation")?;
        if let Some(rewrite) = &self.rewrite {
            rewrite.validate("rewrite")?;
        }
        for (section, profile) in self.backend_profiles() {
            if self.pipeline.unit_timeout_secs < profile.timeout_secs {
                warn!(
                    "pipeline.unit_timeout_secs ({}) is shorter than {}.timeout_secs ({}); \
                     slow replies will fail as unit timeouts",
                    self.pipeline.unit_timeout_secs, section, profile.timeout_secs
                );
            }
        }
        Ok(())
    }

    /// Configured backend profiles with their section names
    pub fn backend_profiles(&self) -> impl Iterator<Item = (&'static str, &BackendProfile)> {
        std::iter::once(("generation", &self.generation))
            .chain(self.rewrite.as_ref().map(|profile| ("rewrite", profile)))
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default level filter (`RUST_LOG` takes precedence)
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Connection settings for one OpenAI-compatible chat completions backend
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendProfile {
    /// Base URL; `/chat/completions` is appended
    pub base_url: String,
    /// Model identifier sent with every request
    pub model: String,
    /// Environment variable holding the API key
    pub api_key_env: Option<String>,
    /// API key stored in the config file (environment takes precedence)
    pub api_key: Option<String>,
    /// Transport-level timeout for one request
    pub timeout_secs: u64,
    /// Optional client-side request quota
    pub requests_per_second: Option<u32>,
}

impl Default for BackendProfile {
    fn default() -> Self {
        Self {
            base_url: "https://api.siliconflow.cn/v1".to_string(),
            model: "Qwen/Qwen2.5-7B-Instruct".to_string(),
            api_key_env: None,
            api_key: None,
            timeout_secs: 120,
            requests_per_second: None,
        }
    }
}

impl BackendProfile {
    fn validate(&self, section: &str) -> Result<()> {
        if self.base_url.trim().is_empty() {
            return Err(Error::Config(format!("{}.base_url must not be empty", section)));
        }
        if self.model.trim().is_empty() {
            return Err(Error::Config(format!("{}.model must not be empty", section)));
        }
        if self.requests_per_second == Some(0) {
            return Err(Error::Config(format!(
                "{}.requests_per_second must be at least 1",
                section
            )));
        }
        Ok(())
    }
}

/// Media lookup backend settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaConfig {
    /// When false, every placeholder resolves to nothing and is removed
    pub enabled: bool,
    /// Image search endpoint
    pub endpoint: String,
    /// Per-lookup timeout
    pub timeout_secs: u64,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: "https://image.baidu.com/search/acjson".to_string(),
            timeout_secs: 5,
        }
    }
}

/// What a rewrite does with a block whose generation call failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Keep the original block content
    #[default]
    Retain,
    /// Replace the block with a visible failure annotation carrying the original text
    Annotate,
}

/// Fan-out and reassembly settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    /// Maximum in-flight backend requests per batch
    pub max_concurrency: usize,
    /// Timeout applied to each generation unit independently; should be at least
    /// the backend `timeout_secs`, which otherwise never fires
    pub unit_timeout_secs: u64,
    /// Text ops at or below this trimmed length stay opaque in Delta documents
    pub min_block_chars: usize,
    /// Default failure policy for rewrites
    pub failure_policy: FailurePolicy,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            max_concurrency: 8,
            unit_timeout_secs: 180,
            min_block_chars: 5,
            failure_policy: FailurePolicy::Retain,
        }
    }
}

/// Config file resolution
pub struct ConfigResolver {
    cli_path: Option<PathBuf>,
}

impl ConfigResolver {
    /// Create resolver with an optional path given on the command line
    pub fn new(cli_path: Option<PathBuf>) -> Self {
        Self { cli_path }
    }

    /// Locate the config file, reporting whether it was named explicitly
    fn locate(&self) -> Option<(PathBuf, bool)> {
        if let Some(path) = &self.cli_path {
            return Some((path.clone(), true));
        }

        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            if !path.trim().is_empty() {
                return Some((PathBuf::from(path), true));
            }
        }

        default_config_path().map(|path| (path, false))
    }

    /// Load and validate configuration
    pub fn load(&self) -> Result<TomlConfig> {
        let config = match self.locate() {
            Some((path, _)) if path.exists() => {
                info!("Loading configuration from {}", path.display());
                load_toml_config(&path)?
            }
            Some((path, true)) => {
                return Err(Error::Config(format!(
                    "Config file not found: {}",
                    path.display()
                )));
            }
            Some((path, false)) => {
                warn!(
                    "No config file at {} - using compiled defaults",
                    path.display()
                );
                TomlConfig::default()
            }
            None => {
                warn!("Could not determine config directory - using compiled defaults");
                TomlConfig::default()
            }
        };

        config.validate()?;
        Ok(config)
    }
}

/// Default config file location for the platform
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("scribe").join("config.toml"))
}

/// Read and parse a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))
}

/// Validate API key (non-empty, non-whitespace)
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}

/// Resolve the API key for a backend profile
///
/// **Priority:** environment variable (`api_key_env`, else `default_env`) → TOML `api_key`
///
/// Absence is a configuration error: callers resolve every credential at startup so a
/// missing key never surfaces per request.
pub fn resolve_api_key(profile: &BackendProfile, default_env: &str) -> Result<String> {
    let env_name = profile.api_key_env.as_deref().unwrap_or(default_env);

    let env_key = std::env::var(env_name).ok().filter(|k| is_valid_key(k));
    let toml_key = profile.api_key.as_ref().filter(|k| is_valid_key(k));

    if env_key.is_some() && toml_key.is_some() {
        warn!(
            "API key for {} found in both {} and TOML config. Using environment.",
            profile.base_url, env_name
        );
    }

    if let Some(key) = env_key {
        info!("API key for {} loaded from {}", profile.base_url, env_name);
        return Ok(key.trim().to_string());
    }

    if let Some(key) = toml_key {
        info!("API key for {} loaded from TOML config", profile.base_url);
        return Ok(key.trim().to_string());
    }

    Err(Error::Config(format!(
        "API key for {} not configured. Set {} or add api_key to the config file",
        profile.base_url, env_name
    )))
}

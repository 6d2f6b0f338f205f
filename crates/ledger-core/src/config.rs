//! Engine configuration
//!
//! Config is loaded with a two-layer resolution:
//! 1. An override file (`LEDGER_CONFIG`, else ~/.local/share/ledger/config/ledger.toml)
//! 2. Fall back to embedded defaults (compiled into binary)
//!
//! Environment variables are applied on top of whichever file was used.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{Error, Result};

/// Embedded default config (compiled into binary)
const DEFAULT_CONFIG: &str = include_str!("../../../config/ledger.toml");

/// Result cache settings
#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub capacity: usize,
    pub ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: 100,
            ttl: Duration::from_secs(3600),
        }
    }
}

/// Retry and backoff settings for provider calls
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(4),
            max_delay: Duration::from_secs(10),
            multiplier: 2.0,
        }
    }
}

/// Hosted Gemini settings
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    /// Absent means the provider is not configured
    pub api_key: Option<String>,
    pub model: String,
    pub timeout: Duration,
    pub api_base: String,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: "gemini-pro".to_string(),
            timeout: Duration::from_secs(60),
            api_base: "https://generativelanguage.googleapis.com/v1beta".to_string(),
        }
    }
}

/// Local Ollama server settings
#[derive(Debug, Clone)]
pub struct OllamaConfig {
    pub host: String,
    pub model: String,
    pub timeout: Duration,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            host: "http://localhost:11434".to_string(),
            model: "llama3".to_string(),
            timeout: Duration::from_secs(60),
        }
    }
}

/// Periodic scheduler settings
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub tick_interval: Duration,
    pub cache_sweep_interval: Duration,
    pub task_timeout: Duration,
    pub report_window_days: i64,
    pub sync_window_days: i64,
    pub transaction_limit: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(60),
            cache_sweep_interval: Duration::from_secs(3600),
            task_timeout: Duration::from_secs(600),
            report_window_days: 30,
            sync_window_days: 7,
            transaction_limit: 1000,
        }
    }
}

/// Full engine configuration
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    pub cache: CacheConfig,
    pub retry: RetryConfig,
    pub gemini: GeminiConfig,
    pub ollama: OllamaConfig,
    pub scheduler: SchedulerConfig,
}

impl EngineConfig {
    /// Load configuration from the override file (if any) and the environment
    pub fn load() -> Result<Self> {
        let path = std::env::var("LEDGER_CONFIG")
            .ok()
            .map(PathBuf::from)
            .or_else(default_config_path);
        let mut config = load_config(path.as_deref())?;
        config.apply_env();
        Ok(config)
    }

    /// Load from an explicit path, ignoring the environment
    pub fn from_path(path: &Path) -> Result<Self> {
        load_config(Some(path))
    }

    /// Parse a TOML document on top of the defaults
    pub fn from_toml(content: &str) -> Result<Self> {
        parse_config(content)
    }

    /// Apply environment variable overrides
    pub fn apply_env(&mut self) {
        if let Ok(key) = std::env::var("GOOGLE_GEMINI_API_KEY") {
            if !key.trim().is_empty() {
                self.gemini.api_key = Some(key);
            }
        }
        if let Ok(model) = std::env::var("GEMINI_MODEL") {
            self.gemini.model = model;
        }
        if let Ok(host) = std::env::var("OLLAMA_HOST") {
            self.ollama.host = host;
        }
        if let Ok(model) = std::env::var("OLLAMA_MODEL") {
            self.ollama.model = model;
        }
    }
}

/// Default config override path
pub fn default_config_path() -> Option<PathBuf> {
    dirs::data_local_dir().map(|d| d.join("ledger").join("config").join("ledger.toml"))
}

/// Load configuration (override first, then default)
fn load_config(override_path: Option<&Path>) -> Result<EngineConfig> {
    let content = match override_path {
        Some(path) if path.exists() => fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read {}: {}", path.display(), e)))?,
        _ => DEFAULT_CONFIG.to_string(),
    };

    parse_config(&content)
}

/// Raw config structure for TOML parsing
#[derive(Debug, Deserialize)]
struct RawConfig {
    cache: Option<RawCache>,
    retry: Option<RawRetry>,
    providers: Option<RawProviders>,
    scheduler: Option<RawScheduler>,
}

#[derive(Debug, Deserialize)]
struct RawCache {
    capacity: Option<usize>,
    ttl_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct RawRetry {
    max_attempts: Option<u32>,
    initial_delay_secs: Option<u64>,
    max_delay_secs: Option<u64>,
    multiplier: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct RawProviders {
    gemini: Option<RawGemini>,
    ollama: Option<RawOllama>,
}

#[derive(Debug, Deserialize)]
struct RawGemini {
    model: Option<String>,
    timeout_secs: Option<u64>,
    api_base: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawOllama {
    host: Option<String>,
    model: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct RawScheduler {
    tick_interval_secs: Option<u64>,
    cache_sweep_interval_secs: Option<u64>,
    task_timeout_secs: Option<u64>,
    report_window_days: Option<i64>,
    sync_window_days: Option<i64>,
    transaction_limit: Option<usize>,
}

/// Parse config from TOML content
fn parse_config(content: &str) -> Result<EngineConfig> {
    let raw: RawConfig = toml::from_str(content)
        .map_err(|e| Error::Config(format!("Invalid config TOML: {}", e)))?;

    let mut config = EngineConfig::default();

    if let Some(cache) = raw.cache {
        if let Some(capacity) = cache.capacity {
            if capacity == 0 {
                return Err(Error::Config("cache.capacity must be at least 1".into()));
            }
            config.cache.capacity = capacity;
        }
        if let Some(ttl) = cache.ttl_secs {
            config.cache.ttl = Duration::from_secs(ttl);
        }
    }

    if let Some(retry) = raw.retry {
        if let Some(attempts) = retry.max_attempts {
            config.retry.max_attempts = attempts.max(1);
        }
        if let Some(initial) = retry.initial_delay_secs {
            config.retry.initial_delay = Duration::from_secs(initial);
        }
        if let Some(max) = retry.max_delay_secs {
            config.retry.max_delay = Duration::from_secs(max);
        }
        if let Some(multiplier) = retry.multiplier {
            config.retry.multiplier = multiplier;
        }
    }

    if let Some(providers) = raw.providers {
        if let Some(gemini) = providers.gemini {
            if let Some(model) = gemini.model {
                config.gemini.model = model;
            }
            if let Some(timeout) = gemini.timeout_secs {
                config.gemini.timeout = Duration::from_secs(timeout);
            }
            if let Some(api_base) = gemini.api_base {
                config.gemini.api_base = api_base;
            }
        }
        if let Some(ollama) = providers.ollama {
            if let Some(host) = ollama.host {
                config.ollama.host = host;
            }
            if let Some(model) = ollama.model {
                config.ollama.model = model;
            }
            if let Some(timeout) = ollama.timeout_secs {
                config.ollama.timeout = Duration::from_secs(timeout);
            }
        }
    }

    if let Some(scheduler) = raw.scheduler {
        if let Some(secs) = scheduler.tick_interval_secs {
            config.scheduler.tick_interval = Duration::from_secs(secs.max(1));
        }
        if let Some(secs) = scheduler.cache_sweep_interval_secs {
            config.scheduler.cache_sweep_interval = Duration::from_secs(secs.max(1));
        }
        if let Some(secs) = scheduler.task_timeout_secs {
            config.scheduler.task_timeout = Duration::from_secs(secs);
        }
        if let Some(days) = scheduler.report_window_days {
            config.scheduler.report_window_days = days;
        }
        if let Some(days) = scheduler.sync_window_days {
            config.scheduler.sync_window_days = days;
        }
        if let Some(limit) = scheduler.transaction_limit {
            config.scheduler.transaction_limit = limit;
        }
    }

    Ok(config)
}

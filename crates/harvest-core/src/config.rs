use anyhow::{ensure, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Retry policy parameters (`[retry]` in config.toml).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum number of attempts per item (including the first).
    pub max_attempts: u32,
    /// Base delay in seconds for exponential backoff (e.g. 0.25 = 250ms).
    pub base_delay_secs: f64,
    /// Maximum backoff delay in seconds.
    pub max_delay_secs: f64,
    /// Delay growth factor per attempt; must be > 1.
    pub backoff_multiplier: f64,
    /// Randomly scale each delay into [0.5, 1.0] of itself.
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_secs: 1.0,
            max_delay_secs: 30.0,
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

/// Circuit breaker parameters (`[circuit]`), shared by every key.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitConfig {
    /// Consecutive failures that open a key's circuit.
    pub failure_threshold: u32,
    /// Seconds after the last failure before an open circuit closes again.
    pub reset_timeout_secs: f64,
}

impl Default for CircuitConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            reset_timeout_secs: 60.0,
        }
    }
}

/// Order in which stored pages that still need work are handed to a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RetryOrder {
    /// Pages never attempted come first, then oldest failures.
    #[default]
    NeverAttemptedFirst,
    /// Oldest failures come first, never-attempted pages last.
    NeverAttemptedLast,
}

/// Batch coordinator parameters (`[batch]`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Items processed concurrently per window.
    pub concurrency: usize,
    /// Pause between windows, in seconds.
    pub inter_batch_pause_secs: f64,
    pub retry_order: RetryOrder,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            concurrency: 3,
            inter_batch_pause_secs: 1.0,
            retry_order: RetryOrder::default(),
        }
    }
}

/// Page fetch parameters (`[fetch]`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub connect_timeout_secs: u64,
    /// Whole-request deadline; the fetch surfaces a timeout error past it.
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 15,
            timeout_secs: 30,
            user_agent: concat!("harvest/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Extraction service parameters (`[extractor]`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    /// HTTP endpoint that accepts page content and returns extracted fields as JSON.
    /// Required for `harvest run`.
    pub endpoint: Option<String>,
    /// Name of the environment variable holding a bearer token, if the service needs one.
    pub api_key_env: Option<String>,
    /// Field names requested from the service.
    pub fields: Vec<String>,
    /// Page content beyond this many bytes is truncated before sending.
    pub max_content_bytes: usize,
    pub timeout_secs: u64,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_key_env: None,
            fields: vec!["title".to_string(), "summary".to_string()],
            max_content_bytes: 200_000,
            timeout_secs: 60,
        }
    }
}

/// Global configuration loaded from `~/.config/harvest/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HarvestConfig {
    pub retry: RetryConfig,
    pub circuit: CircuitConfig,
    pub batch: BatchConfig,
    pub fetch: FetchConfig,
    pub extractor: ExtractorConfig,
}

impl HarvestConfig {
    /// Reject values the engine cannot honour.
    pub fn validate(&self) -> Result<()> {
        ensure!(self.retry.max_attempts >= 1, "retry.max_attempts must be at least 1");
        ensure!(
            self.retry.backoff_multiplier.is_finite() && self.retry.backoff_multiplier > 1.0,
            "retry.backoff_multiplier must be a finite number greater than 1 (got {})",
            self.retry.backoff_multiplier
        );
        check_seconds("retry.base_delay_secs", self.retry.base_delay_secs)?;
        check_seconds("retry.max_delay_secs", self.retry.max_delay_secs)?;
        ensure!(
            self.retry.max_delay_secs >= self.retry.base_delay_secs,
            "retry.max_delay_secs must be >= retry.base_delay_secs"
        );
        ensure!(self.circuit.failure_threshold >= 1, "circuit.failure_threshold must be at least 1");
        check_seconds("circuit.reset_timeout_secs", self.circuit.reset_timeout_secs)?;
        ensure!(self.batch.concurrency >= 1, "batch.concurrency must be at least 1");
        check_seconds("batch.inter_batch_pause_secs", self.batch.inter_batch_pause_secs)?;
        Ok(())
    }
}

/// A seconds value must convert to a `Duration`: finite, non-negative, in range.
fn check_seconds(name: &str, secs: f64) -> Result<()> {
    ensure!(
        Duration::try_from_secs_f64(secs).is_ok(),
        "{name} must be a finite, non-negative number of seconds (got {secs})"
    );
    Ok(())
}

/// Per-user state directory (`~/.local/state/harvest`) holding the log and page database.
pub fn state_dir() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("harvest")?;
    Ok(xdg_dirs.get_state_home())
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("harvest")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<HarvestConfig> {
    load_or_init_at(&config_path()?)
}

/// Like [`load_or_init`] for an explicit path.
pub fn load_or_init_at(path: &Path) -> Result<HarvestConfig> {
    if !path.exists() {
        let default_cfg = HarvestConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(path)?;
    let cfg: HarvestConfig = toml::from_str(&data)?;
    cfg.validate()?;
    Ok(cfg)
}

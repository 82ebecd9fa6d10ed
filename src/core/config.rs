use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::redact::Redacted;

/// Default location of the base configuration file.
pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Hard ceiling on how many videos one chunk of a batch run may hold.
pub const MAX_BATCH_SIZE_CAP: usize = 200;

/// Top-level application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub storage: StorageConfig,
    pub catalog: CatalogConfig,
    pub reduction: ReductionConfig,
    pub safety: SafetyConfig,
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub endpoint: String,
    pub bucket: String,
    pub access_key_id: String,
    pub secret_access_key: Redacted<String>,
    pub region: String,
    pub path_style: bool,
    pub request_timeout_secs: u64,
    pub max_retries: u32,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            bucket: "videos".to_string(),
            access_key_id: String::new(),
            secret_access_key: Redacted::default(),
            region: "us-east-1".to_string(),
            path_style: true,
            request_timeout_secs: 30,
            max_retries: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// JSON file holding the video catalog.
    pub path: PathBuf,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data/videos.json"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReductionConfig {
    pub default_batch_size: usize,
    pub max_batch_size: usize,
    pub older_than_months: u32,
    /// Pause between chunks of a batch run.
    pub batch_pause_ms: u64,
    /// Object store operations per second; 0 disables per-operation pacing.
    pub max_ops_per_second: u32,
    /// Fraction of a video's recorded size assumed freed by a reduction.
    pub savings_ratio: f64,
    /// Upload the rewritten master playlist before deleting anything.
    pub stage_master_first: bool,
    /// Storage price used for the savings estimate, per GB per day.
    pub daily_cost_per_gb: f64,
}

impl Default for ReductionConfig {
    fn default() -> Self {
        Self {
            default_batch_size: 25,
            max_batch_size: MAX_BATCH_SIZE_CAP,
            older_than_months: 6,
            batch_pause_ms: 1000,
            max_ops_per_second: 0,
            savings_ratio: 0.8,
            stage_master_first: false,
            daily_cost_per_gb: 0.000_227_54,
        }
    }
}

impl ReductionConfig {
    /// Clamp a requested batch size to the configured maximum (never above 200).
    pub fn effective_batch_size(&self, requested: usize) -> usize {
        requested
            .min(self.max_batch_size)
            .min(MAX_BATCH_SIZE_CAP)
            .max(1)
    }

    pub fn batch_pause(&self) -> Duration {
        Duration::from_millis(self.batch_pause_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SafetyConfig {
    /// Force every run into dry-run mode.
    pub dry_run_mode: bool,
    /// Mutating commands need `--no-confirm` to actually mutate.
    pub require_confirmation: bool,
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            dry_run_mode: false,
            require_confirmation: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    pub log_level: String,
    pub log_format: String,
    pub metrics_enabled: bool,
    /// Where to write a Prometheus text snapshot when the run ends.
    pub metrics_textfile: Option<PathBuf>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "text".to_string(),
            metrics_enabled: false,
            metrics_textfile: None,
        }
    }
}

impl AppConfig {
    /// Load configuration with layered overrides:
    /// 1. `path` (defaults to config/default.toml; built-in defaults if absent)
    /// 2. config/{env}.toml (based on VIDEOSLIM_ENV)
    /// 3. Environment variables (VIDEOSLIM_* prefix)
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let base_path = path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_PATH));

        let mut config = match std::fs::read_to_string(base_path) {
            Ok(content) => Self::parse(&content)
                .map_err(|e| anyhow::anyhow!("failed to parse {}: {}", base_path.display(), e))?,
            Err(e) if path.is_some() => {
                return Err(anyhow::anyhow!(
                    "failed to read {}: {}",
                    base_path.display(),
                    e
                ));
            }
            Err(_) => AppConfig::default(),
        };

        // Layer 2: environment-specific overrides
        if let Ok(env_name) = std::env::var("VIDEOSLIM_ENV") {
            let env_path = format!("config/{}.toml", env_name);
            if let Ok(env_content) = std::fs::read_to_string(&env_path) {
                config = Self::parse(&env_content)
                    .map_err(|e| anyhow::anyhow!("failed to parse {}: {}", env_path, e))?;
            }
        }

        // Layer 3: environment variable overrides (selected keys)
        config.apply_env_overrides(|key| std::env::var(key).ok())?;

        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    fn apply_env_overrides(&mut self, var: impl Fn(&str) -> Option<String>) -> anyhow::Result<()> {
        if let Some(v) = var("VIDEOSLIM_STORAGE_ENDPOINT") {
            self.storage.endpoint = v;
        }
        if let Some(v) = var("VIDEOSLIM_STORAGE_BUCKET") {
            self.storage.bucket = v;
        }
        if let Some(v) = var("VIDEOSLIM_STORAGE_ACCESS_KEY_ID") {
            self.storage.access_key_id = v;
        }
        if let Some(v) = var("VIDEOSLIM_STORAGE_SECRET_ACCESS_KEY") {
            self.storage.secret_access_key = Redacted::new(v);
        }
        if let Some(v) = var("VIDEOSLIM_STORAGE_REGION") {
            self.storage.region = v;
        }
        if let Some(v) = var("VIDEOSLIM_CATALOG_PATH") {
            self.catalog.path = PathBuf::from(v);
        }
        if let Some(v) = var("VIDEOSLIM_REDUCTION_MAX_OPS_PER_SECOND") {
            self.reduction.max_ops_per_second = v.trim().parse().map_err(|e| {
                anyhow::anyhow!("invalid VIDEOSLIM_REDUCTION_MAX_OPS_PER_SECOND={:?}: {}", v, e)
            })?;
        }
        if let Some(v) = var("VIDEOSLIM_SAFETY_DRY_RUN_MODE") {
            self.safety.dry_run_mode = parse_flag(&v).ok_or_else(|| {
                anyhow::anyhow!(
                    "invalid VIDEOSLIM_SAFETY_DRY_RUN_MODE={:?}: expected true/false, 1/0, yes/no or on/off",
                    v
                )
            })?;
        }
        if let Some(v) = var("VIDEOSLIM_OBSERVABILITY_LOG_LEVEL") {
            self.observability.log_level = v;
        }
        Ok(())
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

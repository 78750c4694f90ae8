/// Service configuration.
///
/// Parsed from a TOML file with defaults for every field, then overridden
/// from the environment for deploy-time secrets (the webhook URL). All
/// numeric fields feed the pipeline and model contracts directly, so they
/// are validated once here instead of at every call site.

use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::path::Path;

use crate::sources::BoundingBox;

/// Environment variable overriding `webhook_url`, loaded via `.env` or the
/// process environment.
const WEBHOOK_ENV_VAR: &str = "WAVECAST_WEBHOOK_URL";

// ---------------------------------------------------------------------------
// Configuration types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Region of interest: min_lon, min_lat, max_lon, max_lat.
    pub region_bbox: [f64; 4],
    /// NDBC station ids to forecast.
    pub stations: Vec<String>,
    pub patch_size: usize,
    pub time_steps: usize,
    pub horizon: usize,
    /// SWH alert threshold in meters.
    pub swh_threshold_m: f32,
    /// Alert delivery endpoint; absent disables delivery.
    pub webhook_url: Option<String>,
    /// Optional log file for daemon runs.
    pub log_file: Option<String>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            // US West Coast by default, matching the most-watched buoys.
            region_bbox: [-130.0, 20.0, -110.0, 40.0],
            stations: Vec::new(),
            patch_size: 9,
            time_steps: 12,
            horizon: 6,
            swh_threshold_m: 4.0,
            webhook_url: None,
            log_file: None,
        }
    }
}

impl ServiceConfig {
    pub fn region(&self) -> BoundingBox {
        BoundingBox::new(
            self.region_bbox[0],
            self.region_bbox[1],
            self.region_bbox[2],
            self.region_bbox[3],
        )
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.patch_size == 0 {
            return Err(ConfigError::Invalid("patch_size must be positive"));
        }
        if self.time_steps == 0 {
            return Err(ConfigError::Invalid("time_steps must be positive"));
        }
        if self.horizon == 0 {
            return Err(ConfigError::Invalid("horizon must be positive"));
        }
        if !self.swh_threshold_m.is_finite() || self.swh_threshold_m <= 0.0 {
            return Err(ConfigError::Invalid("swh_threshold_m must be positive"));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Reads a TOML config file, applies environment overrides, and validates.
///
/// Missing keys take their defaults; an unreadable or malformed file is an
/// error so deployments fail fast rather than running on silent defaults.
pub fn load_config(path: &Path) -> Result<ServiceConfig, ConfigError> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::Io(format!("{}: {}", path.display(), e)))?;
    let mut config: ServiceConfig =
        toml::from_str(&raw).map_err(|e| ConfigError::Parse(e.to_string()))?;
    apply_env_overrides(&mut config);
    config.validate()?;
    Ok(config)
}

/// Defaults plus environment overrides, for runs without a config file.
pub fn default_config() -> Result<ServiceConfig, ConfigError> {
    let mut config = ServiceConfig::default();
    apply_env_overrides(&mut config);
    config.validate()?;
    Ok(config)
}

fn apply_env_overrides(config: &mut ServiceConfig) {
    dotenv::dotenv().ok();
    if let Ok(url) = env::var(WEBHOOK_ENV_VAR) {
        if !url.is_empty() {
            config.webhook_url = Some(url);
        }
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    Io(String),
    Parse(String),
    Invalid(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(msg) => write!(f, "config I/O error: {}", msg),
            ConfigError::Parse(msg) => write!(f, "config parse error: {}", msg),
            ConfigError::Invalid(msg) => write!(f, "invalid config: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

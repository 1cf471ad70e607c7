//! Configuration loading and validation for the uptime server

use crate::types::ServerConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use validator::{Validate, ValidationError};

/// Configuration error types
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file not found in search paths")]
    FileNotFound,

    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    ParseError(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(#[from] validator::ValidationErrors),

    #[error("UI assets missing: {0} has no index.html")]
    MissingAssets(PathBuf),
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerSettings,

    #[serde(default)]
    pub scheduler: SchedulerSettings,

    #[serde(default)]
    pub timezone: TimezoneSettings,

    #[serde(default)]
    pub realtime: RealtimeSettings,

    #[serde(default)]
    pub metrics: MetricsSettings,

    #[serde(default)]
    pub logging: LoggingSettings,
}

impl Validate for Config {
    fn validate(&self) -> Result<(), validator::ValidationErrors> {
        self.scheduler.validate()?;
        self.timezone.validate()?;
        self.realtime.validate()?;
        self.metrics.validate()?;
        Ok(())
    }
}

/// Server-level settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub data_dir: PathBuf,

    pub development: bool,

    /// Bundled UI directory checked at startup
    pub ui_dist_dir: Option<PathBuf>,
}

/// Maintenance scheduler settings
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct SchedulerSettings {
    #[serde(with = "humantime_serde")]
    #[validate(custom = "validate_scheduler_interval")]
    pub interval: Duration,

    #[validate(range(min = 1, max = 1000))]
    pub max_rounds: usize,
}

/// Timezone resolution settings
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct TimezoneSettings {
    #[validate(length(min = 1))]
    pub env_var: String,

    #[validate(custom = "validate_timezone_name")]
    pub fallback: String,
}

/// Real-time channel settings
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct RealtimeSettings {
    #[validate(range(min = 1, max = 10000))]
    pub connection_buffer: usize,
}

/// Metrics endpoint settings
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct MetricsSettings {
    pub enabled: bool,

    #[validate(custom = "validate_listen_addr")]
    pub listen_addr: String,
}

/// Logging settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingSettings {
    pub level: Option<String>,
    pub format: Option<String>,
}

// Default implementations

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            development: false,
            ui_dist_dir: None,
        }
    }
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            max_rounds: 64,
        }
    }
}

impl Default for TimezoneSettings {
    fn default() -> Self {
        Self {
            env_var: "TZ".to_string(),
            fallback: "UTC".to_string(),
        }
    }
}

impl Default for RealtimeSettings {
    fn default() -> Self {
        Self {
            connection_buffer: 64,
        }
    }
}

impl Default for MetricsSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            listen_addr: "127.0.0.1:9102".to_string(),
        }
    }
}

// Custom validators

fn validate_scheduler_interval(interval: &Duration) -> Result<(), ValidationError> {
    let secs = interval.as_secs();
    if secs < 1 || secs > 3600 {
        return Err(ValidationError::new("scheduler_interval_out_of_range"));
    }
    Ok(())
}

fn validate_timezone_name(name: &str) -> Result<(), ValidationError> {
    name.parse::<chrono_tz::Tz>()
        .map(|_| ())
        .map_err(|_| ValidationError::new("timezone_unknown"))
}

fn validate_listen_addr(addr: &str) -> Result<(), ValidationError> {
    addr.parse::<std::net::SocketAddr>()
        .map(|_| ())
        .map_err(|_| ValidationError::new("listen_addr_invalid"))
}

// Configuration loading implementation

impl Config {
    /// Load configuration from default search paths
    pub fn load() -> Result<Self, ConfigError> {
        match Self::find_config_file() {
            Some(path) => {
                tracing::info!("Loading configuration from: {}", path.display());
                Self::load_from_file(&path)
            }
            None => {
                tracing::info!("No configuration file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        let config: Config = serde_yaml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Find configuration file in standard locations
    fn find_config_file() -> Option<PathBuf> {
        let mut paths = vec![PathBuf::from("/etc/uptime/uptime-server.yaml")];

        if let Some(home_path) = Self::home_config_path() {
            paths.push(home_path);
        }

        paths.push(PathBuf::from("./uptime-server.yaml"));

        paths.into_iter().find(|p: &PathBuf| p.exists() && p.is_file())
    }

    /// Get home directory config path
    fn home_config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".config/uptime/uptime-server.yaml"))
    }

    /// Check that the bundled UI is present when one is configured
    pub fn verify_assets(&self) -> Result<(), ConfigError> {
        match &self.server.ui_dist_dir {
            Some(dir) if !dir.join("index.html").is_file() => {
                Err(ConfigError::MissingAssets(dir.clone()))
            }
            _ => Ok(()),
        }
    }

    /// Convert to ServerConfig
    pub fn to_server_config(&self) -> ServerConfig {
        ServerConfig {
            data_dir: self.server.data_dir.clone(),
            scheduler_interval: self.scheduler.interval,
            scheduler_max_rounds: self.scheduler.max_rounds,
            timezone_env_var: self.timezone.env_var.clone(),
            timezone_fallback: self.timezone.fallback.clone(),
            connection_buffer: self.realtime.connection_buffer,
            metrics_enabled: self.metrics.enabled,
            metrics_listen_addr: self.metrics.listen_addr.clone(),
        }
    }
}

/*!
 * Configuration management for the MALOS client.
 *
 * Configuration is layered from built-in defaults, an optional TOML file and
 * `MALOS__`-style environment variables, then validated before use.
 */
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use config::{Config as ConfigLib, Environment, File};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::types::{DriverAddress, DriverDescriptor};

/// Client configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General configuration
    #[serde(default)]
    pub general: GeneralConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Device connection configuration
    #[serde(default)]
    pub device: DeviceConfig,

    /// Timing of keep-alives and gateway negotiation
    #[serde(default)]
    pub timing: TimingConfig,

    /// Declared drivers
    #[serde(default)]
    pub drivers: Vec<DriverEntry>,
}

/// General configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Application name
    #[serde(default = "default_app_name")]
    pub app_name: String,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level or filter directive (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether to include the log target in each line
    #[serde(default = "default_true")]
    pub with_target: bool,
}

/// Which transport carries driver channels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// ZeroMQ sockets to the MALOS daemon
    Zmq,
    /// In-process endpoints, for dry runs and tests
    Memory,
}

/// Device connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Host running the MALOS daemon
    #[serde(default = "default_host")]
    pub host: String,

    /// Transport used to reach the daemon
    #[serde(default = "default_transport")]
    pub transport: TransportKind,
}

/// Timing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingConfig {
    /// Interval between keep-alive pings in milliseconds
    #[serde(default = "default_keep_alive_interval_ms")]
    pub keep_alive_interval_ms: u64,

    /// Delay between a gateway reset and the follow-up activity check
    #[serde(default = "default_gateway_recheck_delay_ms")]
    pub gateway_recheck_delay_ms: u64,

    /// Resets sent before the gateway is declared unresponsive
    #[serde(default = "default_gateway_max_reset_attempts")]
    pub gateway_max_reset_attempts: u32,

    /// Length of the window opened by a permit-join request, in seconds
    #[serde(default = "default_permit_join_secs")]
    pub permit_join_secs: u32,
}

/// A driver declared in the configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverEntry {
    /// Driver name (humidity, uv, everloop, zigbee)
    pub name: String,

    /// Base port of the driver
    pub port: u16,

    /// Host override for this driver
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            app_name: default_app_name(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            with_target: true,
        }
    }
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            transport: default_transport(),
        }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            keep_alive_interval_ms: default_keep_alive_interval_ms(),
            gateway_recheck_delay_ms: default_gateway_recheck_delay_ms(),
            gateway_max_reset_attempts: default_gateway_max_reset_attempts(),
            permit_join_secs: default_permit_join_secs(),
        }
    }
}

impl TimingConfig {
    /// Interval between keep-alive pings
    pub fn keep_alive_interval(&self) -> Duration {
        Duration::from_millis(self.keep_alive_interval_ms)
    }

    /// Delay before re-checking a gateway that was reset
    pub fn gateway_recheck_delay(&self) -> Duration {
        Duration::from_millis(self.gateway_recheck_delay_ms)
    }
}

impl Config {
    /// Driver descriptors in declaration order
    pub fn descriptors(&self) -> Vec<DriverDescriptor> {
        self.drivers
            .iter()
            .map(|entry| {
                let host = entry.host.as_deref().unwrap_or(&self.device.host);
                DriverDescriptor::new(entry.name.clone(), DriverAddress::new(host, entry.port))
            })
            .collect()
    }

    /// Check invariants the loader cannot express through serde
    ///
    /// Driver names are not checked here: an unknown name only disables that
    /// driver when the client starts.
    pub fn validate(&self) -> Result<()> {
        if self.timing.keep_alive_interval_ms == 0 {
            return Err(Error::config("keep_alive_interval_ms must be greater than zero"));
        }
        if self.timing.gateway_recheck_delay_ms == 0 {
            return Err(Error::config("gateway_recheck_delay_ms must be greater than zero"));
        }
        if self.timing.gateway_max_reset_attempts == 0 {
            return Err(Error::config("gateway_max_reset_attempts must be at least 1"));
        }

        let descriptors = self.descriptors();
        for (i, a) in descriptors.iter().enumerate() {
            for b in &descriptors[i + 1..] {
                if a.address.overlaps(&b.address) {
                    return Err(Error::config(format!(
                        "Drivers {} and {} use overlapping port blocks",
                        a, b
                    )));
                }
            }
        }

        Ok(())
    }
}

fn default_app_name() -> String {
    "malos-client".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_transport() -> TransportKind {
    TransportKind::Zmq
}

fn default_keep_alive_interval_ms() -> u64 {
    5_000
}

fn default_gateway_recheck_delay_ms() -> u64 {
    3_000
}

fn default_gateway_max_reset_attempts() -> u32 {
    5
}

fn default_permit_join_secs() -> u32 {
    60
}

/// A builder for creating a configuration
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    config_file: Option<String>,
    environment_prefix: Option<String>,
    override_with: Option<Config>,
}

impl ConfigBuilder {
    /// Create a new ConfigBuilder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the config file path
    pub fn with_config_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_file = Some(path.as_ref().to_string_lossy().to_string());
        self
    }

    /// Set the environment variable prefix for configuration
    pub fn with_environment_prefix<S: AsRef<str>>(mut self, prefix: S) -> Self {
        self.environment_prefix = Some(prefix.as_ref().to_string());
        self
    }

    /// Override with an existing config
    pub fn override_with(mut self, config: Config) -> Self {
        self.override_with = Some(config);
        self
    }

    /// Build and validate the configuration
    pub fn build(self) -> Result<Config> {
        if let Some(config) = self.override_with {
            config.validate()?;
            return Ok(config);
        }

        let default_config = Config::default();
        let mut builder = ConfigLib::builder().add_source(
            ConfigLib::try_from(&default_config)
                .map_err(|e| Error::config(format!("Failed to create default config: {}", e)))?,
        );

        if let Some(config_file) = self.config_file {
            let path = Path::new(&config_file);
            if path.exists() {
                debug!("Loading configuration from {}", config_file);
                builder = builder.add_source(File::with_name(&config_file));
            } else {
                return Err(Error::config(format!(
                    "Configuration file {} does not exist",
                    config_file
                )));
            }
        }

        if let Some(prefix) = self.environment_prefix {
            debug!("Loading configuration from environment variables with prefix {}", prefix);
            builder = builder.add_source(
                Environment::with_prefix(&prefix)
                    .separator("__")
                    .try_parsing(true),
            );
        }

        let config: Config = builder
            .build()
            .map_err(|e| Error::config(format!("Failed to build configuration: {}", e)))?
            .try_deserialize()
            .map_err(|e| Error::config(format!("Failed to deserialize configuration: {}", e)))?;

        config.validate()?;
        info!(drivers = config.drivers.len(), "Configuration loaded");
        Ok(config)
    }
}

/// A thread-safe reference to a configuration
#[derive(Debug, Clone)]
pub struct SharedConfig(Arc<Config>);

impl SharedConfig {
    /// Create a new SharedConfig
    pub fn new(config: Config) -> Self {
        Self(Arc::new(config))
    }

    /// Get a reference to the config
    pub fn get(&self) -> &Config {
        &self.0
    }
}

impl From<Config> for SharedConfig {
    fn from(config: Config) -> Self {
        Self::new(config)
    }
}

impl AsRef<Config> for SharedConfig {
    fn as_ref(&self) -> &Config {
        self.get()
    }
}

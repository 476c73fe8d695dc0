//! Configuration loading from TOML files
//!
//! Config file is selected via:
//! 1. --config <path> command line argument (parsed by clap in main)
//! 2. CONFIG_FILE environment variable
//! 3. Default: config/dev.toml

use crate::domain::region::{ConfigurationState, DEFAULT_CUSTOM_URL_LABEL};
use crate::infra::registry::TrackerRole;
use anyhow::Context;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::Path;
use tracing::warn;

/// How a tracker's hits leave the process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    Mqtt,
    Http,
    File,
    Log,
}

impl TransportKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransportKind::Mqtt => "mqtt",
            TransportKind::Http => "http",
            TransportKind::File => "file",
            TransportKind::Log => "log",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnalyticsConfig {
    /// User opt-in preference; false opts out of all sends
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Dry run (no delivery). Falls back to the build's debug flag when absent
    #[serde(default)]
    pub dry_run: Option<bool>,
    #[serde(default = "default_custom_url_label")]
    pub custom_url_label: String,
    /// Per-tracker bounded queue size
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
    /// Interval for logging counters (0 to disable)
    #[serde(default = "default_metrics_interval")]
    pub metrics_interval_secs: u64,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dry_run: None,
            custom_url_label: default_custom_url_label(),
            channel_capacity: default_channel_capacity(),
            metrics_interval_secs: default_metrics_interval(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_custom_url_label() -> String {
    DEFAULT_CUSTOM_URL_LABEL.to_string()
}

fn default_channel_capacity() -> usize {
    256
}

fn default_metrics_interval() -> u64 {
    60
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct RegionConfig {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub experimental: bool,
    #[serde(default)]
    pub custom_api_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct PreferencesConfig {
    #[serde(default)]
    pub experimental_regions: bool,
    #[serde(default)]
    pub auto_select_region: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MqttConfig {
    #[serde(default = "default_mqtt_host")]
    pub host: String,
    #[serde(default = "default_mqtt_port")]
    pub port: u16,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            host: default_mqtt_host(),
            port: default_mqtt_port(),
            username: None,
            password: None,
        }
    }
}

fn default_mqtt_host() -> String {
    "localhost".to_string()
}

fn default_mqtt_port() -> u16 {
    1883
}

/// Backing configuration of one tracker role
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TrackerProfile {
    pub tracking_id: String,
    #[serde(default = "default_transport")]
    pub transport: TransportKind,
    /// MQTT topic (mqtt transport)
    #[serde(default)]
    pub topic: Option<String>,
    /// Collector endpoint (http transport)
    #[serde(default)]
    pub url: Option<String>,
    /// JSONL output path (file transport)
    #[serde(default)]
    pub file: Option<String>,
    /// Request timeout (http transport)
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_transport() -> TransportKind {
    TransportKind::Log
}

fn default_timeout_ms() -> u64 {
    2000
}

impl TrackerProfile {
    pub fn new(tracking_id: &str, transport: TransportKind) -> Self {
        Self {
            tracking_id: tracking_id.to_string(),
            transport,
            topic: None,
            url: None,
            file: None,
            timeout_ms: default_timeout_ms(),
        }
    }

    /// Check that the transport has the settings it needs
    pub fn validate(&self, role: TrackerRole) -> anyhow::Result<()> {
        let missing = match self.transport {
            TransportKind::Mqtt if self.topic.is_none() => Some("topic"),
            TransportKind::Http if self.url.is_none() => Some("url"),
            TransportKind::File if self.file.is_none() => Some("file"),
            _ => None,
        };
        if let Some(key) = missing {
            anyhow::bail!(
                "trackers.{}: transport '{}' requires '{}'",
                role.as_str(),
                self.transport.as_str(),
                key
            );
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrackersConfig {
    #[serde(default = "default_app_profile")]
    pub app: TrackerProfile,
    #[serde(default = "default_global_profile")]
    pub global: TrackerProfile,
}

impl Default for TrackersConfig {
    fn default() -> Self {
        Self { app: default_app_profile(), global: default_global_profile() }
    }
}

fn default_app_profile() -> TrackerProfile {
    TrackerProfile::new("app", TransportKind::Log)
}

fn default_global_profile() -> TrackerProfile {
    TrackerProfile::new("global", TransportKind::Log)
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct TomlConfig {
    #[serde(default)]
    pub analytics: AnalyticsConfig,
    #[serde(default)]
    pub region: RegionConfig,
    #[serde(default)]
    pub preferences: PreferencesConfig,
    #[serde(default)]
    pub mqtt: MqttConfig,
    #[serde(default)]
    pub trackers: TrackersConfig,
}

/// Main configuration struct used throughout the application
#[derive(Debug, Clone)]
pub struct Config {
    analytics_enabled: bool,
    dry_run: bool,
    custom_url_label: String,
    channel_capacity: usize,
    metrics_interval_secs: u64,
    region_name: Option<String>,
    region_experimental: bool,
    custom_api_url: Option<String>,
    experimental_regions: bool,
    auto_select_region: bool,
    mqtt_host: String,
    mqtt_port: u16,
    mqtt_username: Option<String>,
    mqtt_password: Option<String>,
    app_tracker: TrackerProfile,
    global_tracker: TrackerProfile,
    config_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Self::from_toml(TomlConfig::default(), "default")
    }
}

impl Config {
    /// Determine config file path from the command line or environment
    pub fn resolve_config_path(cli: Option<&str>) -> String {
        if let Some(path) = cli {
            return path.to_string();
        }

        if let Ok(path) = env::var("CONFIG_FILE") {
            return path;
        }

        "config/dev.toml".to_string()
    }

    /// Parse and validate configuration from a TOML string
    pub fn from_toml_str(content: &str, source: &str) -> anyhow::Result<Self> {
        let toml_config: TomlConfig = toml::from_str(content)
            .with_context(|| format!("Failed to parse config file {}", source))?;

        if toml_config.region.name.is_some() && toml_config.region.custom_api_url.is_some() {
            anyhow::bail!(
                "{}: region.name and region.custom_api_url are mutually exclusive",
                source
            );
        }
        toml_config.trackers.app.validate(TrackerRole::App)?;
        toml_config.trackers.global.validate(TrackerRole::Global)?;
        if toml_config.analytics.channel_capacity == 0 {
            anyhow::bail!("{}: analytics.channel_capacity must be > 0", source);
        }

        Ok(Self::from_toml(toml_config, source))
    }

    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_toml_str(&content, &path.display().to_string())
    }

    /// Load configuration - tries TOML file first, falls back to defaults
    pub fn load_from_path(path: &str) -> Self {
        match Self::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(error = %format!("{:#}", e), "config_load_failed_using_defaults");
                Self::default()
            }
        }
    }

    fn from_toml(toml_config: TomlConfig, source: &str) -> Self {
        Self {
            analytics_enabled: toml_config.analytics.enabled,
            dry_run: toml_config.analytics.dry_run.unwrap_or(cfg!(debug_assertions)),
            custom_url_label: toml_config.analytics.custom_url_label,
            channel_capacity: toml_config.analytics.channel_capacity,
            metrics_interval_secs: toml_config.analytics.metrics_interval_secs,
            region_name: toml_config.region.name,
            region_experimental: toml_config.region.experimental,
            custom_api_url: toml_config.region.custom_api_url,
            experimental_regions: toml_config.preferences.experimental_regions,
            auto_select_region: toml_config.preferences.auto_select_region,
            mqtt_host: toml_config.mqtt.host,
            mqtt_port: toml_config.mqtt.port,
            mqtt_username: toml_config.mqtt.username,
            mqtt_password: toml_config.mqtt.password,
            app_tracker: toml_config.trackers.app,
            global_tracker: toml_config.trackers.global,
            config_file: source.to_string(),
        }
    }

    /// Region state derived from the `[region]` section
    pub fn configuration_state(&self) -> ConfigurationState {
        ConfigurationState::from_parts(self.region_name.as_deref(), self.custom_api_url.as_deref())
    }

    /// Backing profile for a tracker role
    pub fn tracker_profile(&self, role: TrackerRole) -> &TrackerProfile {
        match role {
            TrackerRole::App => &self.app_tracker,
            TrackerRole::Global => &self.global_tracker,
        }
    }

    // Getters for all config fields
    pub fn analytics_enabled(&self) -> bool {
        self.analytics_enabled
    }

    pub fn dry_run(&self) -> bool {
        self.dry_run
    }

    pub fn custom_url_label(&self) -> &str {
        &self.custom_url_label
    }

    pub fn channel_capacity(&self) -> usize {
        self.channel_capacity
    }

    pub fn metrics_interval_secs(&self) -> u64 {
        self.metrics_interval_secs
    }

    pub fn region_name(&self) -> Option<&str> {
        self.region_name.as_deref()
    }

    pub fn region_experimental(&self) -> bool {
        self.region_experimental
    }

    pub fn custom_api_url(&self) -> Option<&str> {
        self.custom_api_url.as_deref()
    }

    pub fn experimental_regions(&self) -> bool {
        self.experimental_regions
    }

    pub fn auto_select_region(&self) -> bool {
        self.auto_select_region
    }

    pub fn mqtt_host(&self) -> &str {
        &self.mqtt_host
    }

    pub fn mqtt_port(&self) -> u16 {
        self.mqtt_port
    }

    pub fn mqtt_username(&self) -> Option<&str> {
        self.mqtt_username.as_deref()
    }

    pub fn mqtt_password(&self) -> Option<&str> {
        self.mqtt_password.as_deref()
    }

    pub fn config_file(&self) -> &str {
        &self.config_file
    }

    /// Builder method to replace a tracker profile
    pub fn with_tracker_profile(mut self, role: TrackerRole, profile: TrackerProfile) -> Self {
        match role {
            TrackerRole::App => self.app_tracker = profile,
            TrackerRole::Global => self.global_tracker = profile,
        }
        self
    }
}

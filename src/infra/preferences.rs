//! Preference store - the configuration provider the dispatcher reads
//!
//! Holds the region selection, custom API URL and analytics switches. Writes
//! keep the region and the custom URL mutually exclusive.

use crate::domain::region::ConfigurationState;
use crate::infra::config::Config;
use parking_lot::RwLock;

/// Read-only view of the settings analytics depends on
pub trait ConfigurationProvider: Send + Sync {
    /// Current region / custom endpoint selection
    fn configuration_state(&self) -> ConfigurationState;

    /// User opt-in preference (defaults to opted in)
    fn analytics_enabled(&self) -> bool {
        true
    }

    /// Build-time debug flag or explicit dry-run override
    fn debug_mode(&self) -> bool {
        false
    }

    /// Experimental flag of the selected region, `None` without a region
    fn region_experimental(&self) -> Option<bool> {
        None
    }

    fn experimental_regions_enabled(&self) -> bool {
        false
    }

    fn auto_select_region(&self) -> bool {
        false
    }
}

#[derive(Debug, Clone, Default)]
struct PreferenceValues {
    region_name: Option<String>,
    region_experimental: bool,
    custom_api_url: Option<String>,
    analytics_enabled: bool,
    debug_mode: bool,
    experimental_regions: bool,
    auto_select_region: bool,
}

/// In-memory, thread-safe preference store
#[derive(Debug)]
pub struct PreferenceStore {
    values: RwLock<PreferenceValues>,
}

impl Default for PreferenceStore {
    fn default() -> Self {
        Self::new()
    }
}

impl PreferenceStore {
    pub fn new() -> Self {
        Self {
            values: RwLock::new(PreferenceValues { analytics_enabled: true, ..Default::default() }),
        }
    }

    /// Seed from the loaded config file
    pub fn from_config(config: &Config) -> Self {
        Self {
            values: RwLock::new(PreferenceValues {
                region_name: config.region_name().map(str::to_string),
                region_experimental: config.region_experimental(),
                custom_api_url: config.custom_api_url().map(str::to_string),
                analytics_enabled: config.analytics_enabled(),
                debug_mode: config.dry_run(),
                experimental_regions: config.experimental_regions(),
                auto_select_region: config.auto_select_region(),
            }),
        }
    }

    /// Select a named region; clears any custom API URL
    pub fn select_region(&self, name: &str, experimental: bool) {
        let mut values = self.values.write();
        values.region_name = Some(name.to_string());
        values.region_experimental = experimental;
        values.custom_api_url = None;
    }

    /// Point at a custom API server; clears the region
    pub fn set_custom_api_url(&self, url: &str) {
        let mut values = self.values.write();
        values.custom_api_url = Some(url.to_string());
        values.region_name = None;
        values.region_experimental = false;
    }

    /// Forget both region and custom URL
    pub fn clear_region(&self) {
        let mut values = self.values.write();
        values.region_name = None;
        values.region_experimental = false;
        values.custom_api_url = None;
    }

    pub fn set_analytics_enabled(&self, enabled: bool) {
        self.values.write().analytics_enabled = enabled;
    }

    pub fn set_debug_mode(&self, debug_mode: bool) {
        self.values.write().debug_mode = debug_mode;
    }

    pub fn set_experimental_regions(&self, enabled: bool) {
        self.values.write().experimental_regions = enabled;
    }

    pub fn set_auto_select_region(&self, enabled: bool) {
        self.values.write().auto_select_region = enabled;
    }
}

impl ConfigurationProvider for PreferenceStore {
    fn configuration_state(&self) -> ConfigurationState {
        let values = self.values.read();
        ConfigurationState::from_parts(
            values.region_name.as_deref(),
            values.custom_api_url.as_deref(),
        )
    }

    fn analytics_enabled(&self) -> bool {
        self.values.read().analytics_enabled
    }

    fn debug_mode(&self) -> bool {
        self.values.read().debug_mode
    }

    fn region_experimental(&self) -> Option<bool> {
        let values = self.values.read();
        values.region_name.as_ref().map(|_| values.region_experimental)
    }

    fn experimental_regions_enabled(&self) -> bool {
        self.values.read().experimental_regions
    }

    fn auto_select_region(&self) -> bool {
        self.values.read().auto_select_region
    }
}

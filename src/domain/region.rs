//! Region dimension attached to every analytics event
//!
//! The region tag identifies which deployment the installation talks to.
//! Custom endpoints are user-typed URLs and may identify a private server,
//! so they only ever leave the device as a SHA-1 digest.

use sha1::{Digest, Sha1};
use std::sync::Arc;
use tracing::debug;

/// Label used for custom endpoints and for installs with no region yet
pub const DEFAULT_CUSTOM_URL_LABEL: &str = "Custom URL";

/// Which server the installation is configured against
///
/// Exactly one holds at a time: selecting a region clears the custom URL and
/// entering a custom URL clears the region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationState {
    NamedRegion { name: String },
    CustomEndpoint { url: String },
    Unset,
}

impl ConfigurationState {
    /// Build from the two optional preference values
    ///
    /// A region wins over a custom URL, matching how the preference store
    /// clears one when the other is written.
    pub fn from_parts(region_name: Option<&str>, custom_url: Option<&str>) -> Self {
        match (region_name, custom_url) {
            (Some(name), _) => ConfigurationState::NamedRegion { name: name.to_string() },
            (None, Some(url)) => ConfigurationState::CustomEndpoint { url: url.to_string() },
            (None, None) => ConfigurationState::Unset,
        }
    }
}

/// One-way digest applied to custom endpoint URLs
pub trait EndpointHasher: Send + Sync {
    /// Lowercase hex digest of the URL's UTF-8 bytes
    fn digest_hex(&self, endpoint: &str) -> anyhow::Result<String>;
}

/// SHA-1, rendered two lowercase hex chars per byte, high nibble first
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha1Hasher;

impl EndpointHasher for Sha1Hasher {
    fn digest_hex(&self, endpoint: &str) -> anyhow::Result<String> {
        Ok(hex::encode(Sha1::digest(endpoint.as_bytes())))
    }
}

/// Derives the region tag from the current configuration state
#[derive(Clone)]
pub struct RegionTagResolver {
    custom_url_label: String,
    hasher: Arc<dyn EndpointHasher>,
}

impl Default for RegionTagResolver {
    fn default() -> Self {
        Self::new(DEFAULT_CUSTOM_URL_LABEL)
    }
}

impl std::fmt::Debug for RegionTagResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegionTagResolver")
            .field("custom_url_label", &self.custom_url_label)
            .finish_non_exhaustive()
    }
}

impl RegionTagResolver {
    pub fn new(custom_url_label: impl Into<String>) -> Self {
        Self::with_hasher(custom_url_label, Arc::new(Sha1Hasher))
    }

    pub fn with_hasher(
        custom_url_label: impl Into<String>,
        hasher: Arc<dyn EndpointHasher>,
    ) -> Self {
        Self { custom_url_label: custom_url_label.into(), hasher }
    }

    /// Resolve the tag for `state`
    ///
    /// Never fails: if hashing errors the bare label is returned. The raw
    /// custom URL is never part of the result.
    pub fn resolve(&self, state: &ConfigurationState) -> String {
        match state {
            ConfigurationState::NamedRegion { name } => name.clone(),
            ConfigurationState::CustomEndpoint { url } => match self.hasher.digest_hex(url) {
                Ok(digest) => format!("{}: {}", self.custom_url_label, digest),
                Err(e) => {
                    debug!(error = %e, "region_tag_hash_failed");
                    self.custom_url_label.clone()
                }
            },
            ConfigurationState::Unset => self.custom_url_label.clone(),
        }
    }
}

/// Resolve with the default label and SHA-1
pub fn resolve_tag(state: &ConfigurationState) -> String {
    RegionTagResolver::default().resolve(state)
}

//! Infrastructure - configuration, switches, tracker registry and metrics
//!
//! This module contains infrastructure concerns:
//! - `config` - Application configuration (TOML loading, defaults)
//! - `preferences` - Configuration provider backed by an in-memory store
//! - `gate` - Opt-out and dry-run switches
//! - `registry` - Lazily created tracker handles, one per role
//! - `metrics` - Lock-free counters

pub mod config;
pub mod gate;
pub mod metrics;
pub mod preferences;
pub mod registry;

// Re-export commonly used types
pub use config::{Config, TrackerProfile, TransportKind};
pub use gate::AnalyticsGate;
pub use metrics::{Metrics, MetricsSummary, StopSkipReason};
pub use preferences::{ConfigurationProvider, PreferenceStore};
pub use registry::{TrackerRegistry, TrackerRole, TransportFactory};

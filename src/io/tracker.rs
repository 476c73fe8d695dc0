//! Tracker handle - one per role, owned by the registry

use crate::domain::event::{Hit, HitPayload};
use crate::infra::config::TrackerProfile;
use crate::infra::gate::AnalyticsGate;
use crate::infra::metrics::Metrics;
use crate::infra::registry::TrackerRole;
use crate::io::transport::Transport;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::debug;

/// Sink handle for one tracker role
///
/// Remembers the active screen name and attaches it to every hit, and
/// checks the gate before anything reaches the transport.
pub struct Tracker {
    role: TrackerRole,
    tracking_id: String,
    screen_name: Mutex<Option<String>>,
    gate: Arc<AnalyticsGate>,
    transport: Arc<dyn Transport>,
    metrics: Arc<Metrics>,
}

impl Tracker {
    pub fn new(
        role: TrackerRole,
        profile: &TrackerProfile,
        gate: Arc<AnalyticsGate>,
        transport: Arc<dyn Transport>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            role,
            tracking_id: profile.tracking_id.clone(),
            screen_name: Mutex::new(None),
            gate,
            transport,
            metrics,
        }
    }

    pub fn role(&self) -> TrackerRole {
        self.role
    }

    pub fn tracking_id(&self) -> &str {
        &self.tracking_id
    }

    pub fn transport_name(&self) -> &'static str {
        self.transport.name()
    }

    pub fn screen_name(&self) -> Option<String> {
        self.screen_name.lock().clone()
    }

    pub fn set_screen_name(&self, name: &str) {
        *self.screen_name.lock() = Some(name.to_string());
    }

    /// Send a hit (fire-and-forget)
    pub fn send(&self, hit: Hit) {
        if self.gate.is_opted_out() {
            self.metrics.record_suppressed();
            debug!(role = %self.role.as_str(), kind = %hit.kind(), "hit_suppressed_opt_out");
            return;
        }

        let payload = HitPayload::new(&self.tracking_id, self.screen_name(), hit);

        if self.gate.is_dry_run() {
            self.metrics.record_dry_run();
            debug!(role = %self.role.as_str(), hit = %payload.to_json(), "hit_dry_run");
            return;
        }

        self.transport.deliver(payload);
    }
}

impl std::fmt::Debug for Tracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tracker")
            .field("role", &self.role)
            .field("tracking_id", &self.tracking_id)
            .field("transport", &self.transport.name())
            .finish()
    }
}

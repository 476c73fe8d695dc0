//! Transport seam between trackers and the outside world

use crate::domain::event::HitPayload;
use crate::infra::metrics::Metrics;
use std::sync::Arc;
use tracing::info;

/// Accepts hits for delivery
///
/// `deliver` must not block: implementations queue the hit or drop it.
/// Delivery failures stay inside the transport.
pub trait Transport: Send + Sync {
    fn name(&self) -> &'static str;

    fn deliver(&self, payload: HitPayload);
}

/// Writes every hit to the log; used for local development
pub struct LogTransport {
    metrics: Arc<Metrics>,
}

impl LogTransport {
    pub fn new(metrics: Arc<Metrics>) -> Self {
        Self { metrics }
    }
}

impl Transport for LogTransport {
    fn name(&self) -> &'static str {
        "log"
    }

    fn deliver(&self, payload: HitPayload) {
        info!(tid = %payload.tid, hit = %payload.to_json(), "hit_logged");
        self.metrics.record_delivered();
    }
}

/// Stand-in used when a tracker's real transport could not be built
pub struct DiscardTransport {
    metrics: Arc<Metrics>,
}

impl DiscardTransport {
    pub fn new(metrics: Arc<Metrics>) -> Self {
        Self { metrics }
    }
}

impl Transport for DiscardTransport {
    fn name(&self) -> &'static str {
        "discard"
    }

    fn deliver(&self, _payload: HitPayload) {
        self.metrics.record_transport_failure();
    }
}

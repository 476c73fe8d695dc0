//! Tracker registry - lazily created, cached tracker handles
//!
//! One tracker per role, built on first request from the role's profile and
//! kept for the life of the registry. The lookup-or-create sequence runs
//! under a single mutex so concurrent first use still builds exactly one
//! tracker per role.

use crate::infra::config::{Config, TrackerProfile, TransportKind};
use crate::infra::gate::AnalyticsGate;
use crate::infra::metrics::Metrics;
use crate::io::tracker::Tracker;
use crate::io::transport::{DiscardTransport, Transport};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::sync::Arc;
use tracing::{error, info};

/// Logical tracker roles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackerRole {
    /// Tracker used only by this app
    App,
    /// Tracker shared by every app of the agency (roll-up reporting)
    Global,
}

impl TrackerRole {
    pub const ALL: [TrackerRole; 2] = [TrackerRole::App, TrackerRole::Global];

    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            TrackerRole::App => "app",
            TrackerRole::Global => "global",
        }
    }
}

/// Builds the transport behind a newly created tracker
pub trait TransportFactory: Send + Sync {
    fn create(&self, role: TrackerRole, profile: &TrackerProfile)
        -> anyhow::Result<Arc<dyn Transport>>;
}

/// Owns the per-role tracker cache
pub struct TrackerRegistry {
    profiles: FxHashMap<TrackerRole, TrackerProfile>,
    factory: Arc<dyn TransportFactory>,
    gate: Arc<AnalyticsGate>,
    metrics: Arc<Metrics>,
    trackers: Mutex<FxHashMap<TrackerRole, Arc<Tracker>>>,
}

impl TrackerRegistry {
    pub fn new(
        profiles: impl IntoIterator<Item = (TrackerRole, TrackerProfile)>,
        factory: Arc<dyn TransportFactory>,
        gate: Arc<AnalyticsGate>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            profiles: profiles.into_iter().collect(),
            factory,
            gate,
            metrics,
            trackers: Mutex::new(FxHashMap::default()),
        }
    }

    /// Registry with both role profiles taken from config
    pub fn from_config(
        config: &Config,
        factory: Arc<dyn TransportFactory>,
        gate: Arc<AnalyticsGate>,
        metrics: Arc<Metrics>,
    ) -> Self {
        let profiles = TrackerRole::ALL.map(|role| (role, config.tracker_profile(role).clone()));
        Self::new(profiles, factory, gate, metrics)
    }

    /// Get the tracker for `role`, creating it on first use
    ///
    /// Repeat calls return the same `Arc`. A transport that fails to build is
    /// replaced by one that discards hits, so this never fails.
    pub fn get_handle(&self, role: TrackerRole) -> Arc<Tracker> {
        let mut trackers = self.trackers.lock();
        if let Some(tracker) = trackers.get(&role) {
            return Arc::clone(tracker);
        }

        let profile = self
            .profiles
            .get(&role)
            .cloned()
            .unwrap_or_else(|| TrackerProfile::new(role.as_str(), TransportKind::Log));

        let transport = match self.factory.create(role, &profile) {
            Ok(transport) => transport,
            Err(e) => {
                error!(
                    role = %role.as_str(),
                    transport = %profile.transport.as_str(),
                    error = %format!("{:#}", e),
                    "tracker_transport_failed"
                );
                Arc::new(DiscardTransport::new(self.metrics.clone())) as Arc<dyn Transport>
            }
        };

        let tracker = Arc::new(Tracker::new(
            role,
            &profile,
            self.gate.clone(),
            transport,
            self.metrics.clone(),
        ));
        info!(
            role = %role.as_str(),
            tracking_id = %tracker.tracking_id(),
            transport = %tracker.transport_name(),
            "tracker_created"
        );
        trackers.insert(role, Arc::clone(&tracker));
        tracker
    }

    /// Number of trackers created so far
    pub fn cached_count(&self) -> usize {
        self.trackers.lock().len()
    }

    pub fn gate(&self) -> &Arc<AnalyticsGate> {
        &self.gate
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::event::HitPayload;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct NullTransport;

    impl Transport for NullTransport {
        fn name(&self) -> &'static str {
            "null"
        }

        fn deliver(&self, _payload: HitPayload) {}
    }

    #[derive(Default)]
    struct CountingFactory {
        created: AtomicUsize,
    }

    impl TransportFactory for CountingFactory {
        fn create(
            &self,
            _role: TrackerRole,
            _profile: &TrackerProfile,
        ) -> anyhow::Result<Arc<dyn Transport>> {
            self.created.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(NullTransport))
        }
    }

    struct FailingFactory;

    impl TransportFactory for FailingFactory {
        fn create(
            &self,
            _role: TrackerRole,
            _profile: &TrackerProfile,
        ) -> anyhow::Result<Arc<dyn Transport>> {
            anyhow::bail!("broker unreachable")
        }
    }

    fn registry(factory: Arc<dyn TransportFactory>) -> TrackerRegistry {
        TrackerRegistry::from_config(
            &Config::default(),
            factory,
            Arc::new(AnalyticsGate::new()),
            Arc::new(Metrics::new()),
        )
    }

    #[test]
    fn test_get_handle_is_cached() {
        let factory = Arc::new(CountingFactory::default());
        let registry = registry(factory.clone());

        let first = registry.get_handle(TrackerRole::App);
        let second = registry.get_handle(TrackerRole::App);

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(factory.created.load(Ordering::SeqCst), 1);
        assert_eq!(registry.cached_count(), 1);
    }

    #[test]
    fn test_roles_get_distinct_trackers() {
        let registry = registry(Arc::new(CountingFactory::default()));

        let app = registry.get_handle(TrackerRole::App);
        let global = registry.get_handle(TrackerRole::Global);

        assert!(!Arc::ptr_eq(&app, &global));
        assert_eq!(app.tracking_id(), "app");
        assert_eq!(global.tracking_id(), "global");
        assert_eq!(global.role(), TrackerRole::Global);
    }

    #[test]
    fn test_concurrent_first_use_creates_once() {
        let factory = Arc::new(CountingFactory::default());
        let registry = Arc::new(registry(factory.clone()));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = registry.clone();
                std::thread::spawn(move || registry.get_handle(TrackerRole::Global))
            })
            .collect();
        let trackers: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(factory.created.load(Ordering::SeqCst), 1);
        assert!(trackers.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
    }

    #[test]
    fn test_failed_transport_falls_back_to_discard() {
        let registry = registry(Arc::new(FailingFactory));
        let tracker = registry.get_handle(TrackerRole::App);
        assert_eq!(tracker.transport_name(), "discard");
        assert!(Arc::ptr_eq(&tracker, &registry.get_handle(TrackerRole::App)));
    }

    #[test]
    fn test_missing_profile_uses_role_default() {
        let registry = TrackerRegistry::new(
            Vec::<(TrackerRole, TrackerProfile)>::new(),
            Arc::new(CountingFactory::default()),
            Arc::new(AnalyticsGate::new()),
            Arc::new(Metrics::new()),
        );
        assert_eq!(registry.get_handle(TrackerRole::Global).tracking_id(), "global");
    }
}

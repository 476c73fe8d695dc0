//! Event dispatcher - builds hits and fans them out to every tracker
//!
//! The region tag is resolved once per dispatch so every tracker sees the
//! same value for one logical event. Sends are fire-and-forget; no ordering
//! holds between trackers or between concurrent dispatches.

use crate::domain::category::EventCategory;
use crate::domain::distance::DistanceBucket;
use crate::domain::event::{EventRecord, Hit};
use crate::domain::geo::{GeoPoint, LocationFix};
use crate::domain::region::RegionTagResolver;
use crate::infra::metrics::{Metrics, StopSkipReason};
use crate::infra::preferences::ConfigurationProvider;
use crate::infra::registry::{TrackerRegistry, TrackerRole};
use crate::io::tracker::Tracker;
use smallvec::SmallVec;
use std::sync::Arc;
use tracing::{debug, warn};

/// Fixes with an accuracy radius at or above this are not reported (meters)
pub const LOCATION_ACCURACY_THRESHOLD_M: f64 = 100.0;

/// Fans analytics hits out to the registered tracker roles
pub struct EventDispatcher {
    registry: Arc<TrackerRegistry>,
    provider: Arc<dyn ConfigurationProvider>,
    resolver: RegionTagResolver,
    roles: SmallVec<[TrackerRole; 2]>,
    metrics: Arc<Metrics>,
}

impl EventDispatcher {
    /// Dispatcher sending to every role
    pub fn new(
        registry: Arc<TrackerRegistry>,
        provider: Arc<dyn ConfigurationProvider>,
        resolver: RegionTagResolver,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            registry,
            provider,
            resolver,
            roles: TrackerRole::ALL.into_iter().collect(),
            metrics,
        }
    }

    /// Restrict fan-out to `roles`, in the given order
    pub fn with_roles(mut self, roles: impl IntoIterator<Item = TrackerRole>) -> Self {
        self.roles = roles.into_iter().collect();
        self
    }

    /// Settings source the region tag is resolved from
    pub fn provider(&self) -> &dyn ConfigurationProvider {
        self.provider.as_ref()
    }

    /// Region tag for the current configuration state
    pub fn region_tag(&self) -> String {
        self.resolver.resolve(&self.provider.configuration_state())
    }

    fn trackers(&self) -> SmallVec<[Arc<Tracker>; 2]> {
        self.roles.iter().map(|&role| self.registry.get_handle(role)).collect()
    }

    /// Send a structured event to every tracker
    pub fn dispatch(&self, category: EventCategory, action: &str, label: &str, value: Option<i64>) {
        let record = EventRecord::new(category, action, label, value, self.region_tag());
        let trackers = self.trackers();

        debug!(
            category = %category,
            action = %action,
            label = %label,
            region = %record.region,
            trackers = %trackers.len(),
            "hit_dispatched"
        );

        for tracker in &trackers {
            tracker.send(Hit::Event(record.clone()));
        }
    }

    /// Report how far the user was from a stop they tapped
    ///
    /// Skipped without a location fix or when the fix is not accurate to
    /// better than `LOCATION_ACCURACY_THRESHOLD_M`.
    pub fn dispatch_stop_proximity(
        &self,
        stop_id: &str,
        user_location: Option<&LocationFix>,
        stop_location: &GeoPoint,
    ) {
        let Some(fix) = user_location else {
            self.metrics.record_stop_skipped(StopSkipReason::NoLocation);
            debug!(stop_id = %stop_id, "stop_proximity_no_location");
            return;
        };

        if !fix.accuracy_m.is_finite() || fix.accuracy_m < 0.0 {
            self.metrics.record_stop_skipped(StopSkipReason::InvalidInput);
            warn!(
                stop_id = %stop_id,
                accuracy_m = %fix.accuracy_m,
                "stop_proximity_invalid_accuracy"
            );
            return;
        }

        if fix.accuracy_m >= LOCATION_ACCURACY_THRESHOLD_M {
            self.metrics.record_stop_skipped(StopSkipReason::LowAccuracy);
            debug!(stop_id = %stop_id, accuracy_m = %fix.accuracy_m, "stop_proximity_low_accuracy");
            return;
        }

        if !fix.point.is_valid() || !stop_location.is_valid() {
            self.metrics.record_stop_skipped(StopSkipReason::InvalidInput);
            warn!(stop_id = %stop_id, "stop_proximity_invalid_coordinates");
            return;
        }

        let distance_m = fix.point.distance_to(stop_location);
        if !distance_m.is_finite() || distance_m < 0.0 {
            self.metrics.record_stop_skipped(StopSkipReason::InvalidInput);
            warn!(stop_id = %stop_id, distance_m = %distance_m, "stop_proximity_invalid_distance");
            return;
        }

        let bucket = DistanceBucket::classify(distance_m);
        self.metrics.record_distance_bucket(bucket);

        self.dispatch(
            EventCategory::StopAction,
            &format!("Stop Id: {}", stop_id),
            bucket.label(),
            Some(1),
        );
    }

    /// Mark `screen_name` active on every tracker and send a screen view
    pub fn dispatch_screen_view(&self, screen_name: &str) {
        for tracker in &self.trackers() {
            tracker.set_screen_name(screen_name);
            tracker.send(Hit::ScreenView { screen_name: screen_name.to_string() });
        }
        debug!(screen = %screen_name, "screen_view_dispatched");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::event::HitPayload;
    use crate::domain::region::{ConfigurationState, EndpointHasher};
    use crate::infra::config::Config;
    use crate::infra::config::TrackerProfile;
    use crate::infra::gate::AnalyticsGate;
    use crate::infra::preferences::PreferenceStore;
    use crate::infra::registry::TransportFactory;
    use crate::io::transport::Transport;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Transport that records hits per tracking id
    #[derive(Default)]
    struct Recorder {
        hits: Mutex<Vec<HitPayload>>,
    }

    impl Transport for Recorder {
        fn name(&self) -> &'static str {
            "recorder"
        }

        fn deliver(&self, payload: HitPayload) {
            self.hits.lock().push(payload);
        }
    }

    struct RecorderFactory(Arc<Recorder>);

    impl TransportFactory for RecorderFactory {
        fn create(
            &self,
            _role: TrackerRole,
            _profile: &TrackerProfile,
        ) -> anyhow::Result<Arc<dyn Transport>> {
            Ok(self.0.clone())
        }
    }

    /// Hasher that counts how often it runs
    #[derive(Default)]
    struct CountingHasher {
        calls: AtomicUsize,
    }

    impl EndpointHasher for CountingHasher {
        fn digest_hex(&self, _endpoint: &str) -> anyhow::Result<String> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(format!("digest{n}"))
        }
    }

    struct Harness {
        dispatcher: EventDispatcher,
        recorder: Arc<Recorder>,
        store: Arc<PreferenceStore>,
        metrics: Arc<Metrics>,
    }

    fn harness_with(opted_in: bool, dry_run: bool, resolver: RegionTagResolver) -> Harness {
        let recorder = Arc::new(Recorder::default());
        let store = Arc::new(PreferenceStore::new());
        let metrics = Arc::new(Metrics::new());
        let gate = Arc::new(AnalyticsGate::new());
        gate.configure(opted_in, dry_run);
        let registry = Arc::new(TrackerRegistry::from_config(
            &Config::default(),
            Arc::new(RecorderFactory(recorder.clone())),
            gate,
            metrics.clone(),
        ));
        let dispatcher = EventDispatcher::new(registry, store.clone(), resolver, metrics.clone());
        Harness { dispatcher, recorder, store, metrics }
    }

    fn harness() -> Harness {
        harness_with(true, false, RegionTagResolver::default())
    }

    fn fix_at_distance(stop: &GeoPoint, meters: f64, accuracy_m: f64) -> LocationFix {
        // Due north along the meridian
        let dlat = (meters / 6_371_008.8).to_degrees();
        LocationFix::new(stop.lat + dlat, stop.lon, accuracy_m)
    }

    fn events(recorder: &Recorder) -> Vec<(String, EventRecord)> {
        recorder
            .hits
            .lock()
            .iter()
            .filter_map(|p| match &p.hit {
                Hit::Event(record) => Some((p.tid.clone(), record.clone())),
                Hit::ScreenView { .. } => None,
            })
            .collect()
    }

    #[test]
    fn test_dispatch_fans_out_to_both_trackers() {
        let h = harness();
        h.store.select_region("Puget Sound", false);

        h.dispatcher.dispatch(EventCategory::UiAction, "Tapped star", "Favorite stop", None);

        let sent = events(&h.recorder);
        assert_eq!(sent.len(), 2);
        let tids: Vec<_> = sent.iter().map(|(tid, _)| tid.as_str()).collect();
        assert!(tids.contains(&"app"));
        assert!(tids.contains(&"global"));
        assert_eq!(sent[0].1, sent[1].1);
        assert_eq!(sent[0].1.region, "Puget Sound");
        assert_eq!(sent[0].1.category, EventCategory::UiAction);
        assert_eq!(sent[0].1.value, None);
    }

    #[test]
    fn test_region_resolved_once_per_dispatch() {
        let hasher = Arc::new(CountingHasher::default());
        let resolver = RegionTagResolver::with_hasher("Custom URL", hasher.clone());
        let h = harness_with(true, false, resolver);
        h.store.set_custom_api_url("http://example.com/api");

        h.dispatcher.dispatch(EventCategory::Submit, "Sent", "Arrival problem", None);

        assert_eq!(hasher.calls.load(Ordering::SeqCst), 1);
        let sent = events(&h.recorder);
        assert!(sent.iter().all(|(_, r)| r.region == "Custom URL: digest0"));
    }

    #[test]
    fn test_custom_url_never_leaves_raw() {
        let h = harness();
        h.store.set_custom_api_url("http://private.example.org/api");

        h.dispatcher.dispatch(EventCategory::AppSettings, "Configured", "x", None);

        for payload in h.recorder.hits.lock().iter() {
            assert!(!payload.to_json().contains("private.example.org"));
        }
    }

    #[test]
    fn test_stop_proximity_without_location_is_noop() {
        let h = harness();
        let stop = GeoPoint::new(47.6097, -122.3331);

        h.dispatcher.dispatch_stop_proximity("1_75403", None, &stop);

        assert!(h.recorder.hits.lock().is_empty());
        assert_eq!(h.metrics.report().stop_taps_no_location, 1);
    }

    #[test]
    fn test_stop_proximity_low_accuracy_is_noop() {
        let h = harness();
        let stop = GeoPoint::new(47.6097, -122.3331);

        let wide = fix_at_distance(&stop, 30.0, 150.0);
        let borderline = fix_at_distance(&stop, 30.0, 100.0);
        h.dispatcher.dispatch_stop_proximity("1_75403", Some(&wide), &stop);
        h.dispatcher.dispatch_stop_proximity("1_75403", Some(&borderline), &stop);

        assert!(h.recorder.hits.lock().is_empty());
        assert_eq!(h.metrics.report().stop_taps_low_accuracy, 2);
    }

    #[test]
    fn test_stop_proximity_reports_bucket() {
        let h = harness();
        h.store.select_region("Tampa", false);
        let stop = GeoPoint::new(27.9506, -82.4572);

        let fix = fix_at_distance(&stop, 1700.0, 50.0);
        h.dispatcher.dispatch_stop_proximity("Hillsborough_4556", Some(&fix), &stop);

        let sent = events(&h.recorder);
        assert_eq!(sent.len(), 2);
        for (_, record) in &sent {
            assert_eq!(record.category, EventCategory::StopAction);
            assert_eq!(record.action, "Stop Id: Hillsborough_4556");
            assert_eq!(record.label, "User Distance: 01600-03200m");
            assert_eq!(record.value, Some(1));
            assert_eq!(record.region, "Tampa");
        }
        assert_eq!(h.metrics.report().distance_buckets[DistanceBucket::Under3200m.index()], 1);
    }

    #[test]
    fn test_stop_proximity_invalid_input_is_noop() {
        let h = harness();
        let stop = GeoPoint::new(47.6097, -122.3331);
        let bad_accuracy = LocationFix::new(47.61, -122.33, f64::NAN);
        let bad_point = LocationFix::new(120.0, -122.33, 10.0);

        h.dispatcher.dispatch_stop_proximity("1_1", Some(&bad_accuracy), &stop);
        h.dispatcher.dispatch_stop_proximity("1_1", Some(&bad_point), &stop);

        assert!(h.recorder.hits.lock().is_empty());
        assert_eq!(h.metrics.report().stop_taps_invalid, 2);
    }

    #[test]
    fn test_screen_view_sets_screen_on_trackers() {
        let h = harness();

        h.dispatcher.dispatch_screen_view("ArrivalsListActivity");
        h.dispatcher.dispatch(EventCategory::UiAction, "Refreshed", "Arrivals", None);

        let hits = h.recorder.hits.lock();
        assert_eq!(hits.len(), 4);
        let views: Vec<_> = hits
            .iter()
            .filter(|p| matches!(p.hit, Hit::ScreenView { .. }))
            .collect();
        assert_eq!(views.len(), 2);
        assert!(hits.iter().all(|p| p.screen.as_deref() == Some("ArrivalsListActivity")));
    }

    #[test]
    fn test_opt_out_sends_nothing() {
        let h = harness_with(false, false, RegionTagResolver::default());
        let stop = GeoPoint::new(47.6097, -122.3331);

        h.dispatcher.dispatch(EventCategory::UiAction, "Tapped", "Map", None);
        h.dispatcher.dispatch_screen_view("HomeActivity");
        let fix = fix_at_distance(&stop, 10.0, 5.0);
        h.dispatcher.dispatch_stop_proximity("1_1", Some(&fix), &stop);

        assert!(h.recorder.hits.lock().is_empty());
        assert_eq!(h.metrics.report().hits_suppressed, 6);
    }

    #[test]
    fn test_single_role_dispatcher() {
        let h = harness();
        let dispatcher = h.dispatcher.with_roles([TrackerRole::Global]);

        dispatcher.dispatch(EventCategory::Accessibility, "Talkback", "On", None);

        let sent = events(&h.recorder);
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "global");
    }

    #[test]
    fn test_unset_region_tag() {
        let h = harness();
        assert_eq!(h.dispatcher.region_tag(), "Custom URL");
        h.store.select_region("Atlanta", false);
        assert_eq!(h.dispatcher.region_tag(), "Atlanta");
        h.store.clear_region();
        assert_eq!(h.store.configuration_state(), ConfigurationState::Unset);
        assert_eq!(h.dispatcher.region_tag(), "Custom URL");
    }
}

//! Lock-free analytics counters and periodic reporting
//!
//! Uses atomics so the dispatch path never takes a lock for bookkeeping.
//!
//! NOTE: All atomics use Relaxed ordering: these are statistical
//! counters only. Do NOT use these atomics for coordination or logic decisions.

use crate::domain::distance::DistanceBucket;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::info;

const NUM_DISTANCE_BUCKETS: usize = DistanceBucket::ALL.len();

/// Why a stop tap produced no hit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopSkipReason {
    NoLocation,
    LowAccuracy,
    InvalidInput,
}

/// Lock-free metrics collector
pub struct Metrics {
    started_at: Instant,
    /// Hits handed to a transport (monotonic)
    hits_enqueued: AtomicU64,
    /// Hits dropped because a transport queue was full (monotonic)
    hits_dropped: AtomicU64,
    /// Hits suppressed by user opt-out (monotonic)
    hits_suppressed: AtomicU64,
    /// Hits built but not delivered in dry-run mode (monotonic)
    hits_dry_run: AtomicU64,
    /// Hits delivered by a transport (monotonic)
    hits_delivered: AtomicU64,
    /// Transport send failures (monotonic)
    transport_failures: AtomicU64,
    stop_taps_no_location: AtomicU64,
    stop_taps_low_accuracy: AtomicU64,
    stop_taps_invalid: AtomicU64,
    /// Classified stop taps per distance bucket (monotonic)
    distance_buckets: [AtomicU64; NUM_DISTANCE_BUCKETS],
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            hits_enqueued: AtomicU64::new(0),
            hits_dropped: AtomicU64::new(0),
            hits_suppressed: AtomicU64::new(0),
            hits_dry_run: AtomicU64::new(0),
            hits_delivered: AtomicU64::new(0),
            transport_failures: AtomicU64::new(0),
            stop_taps_no_location: AtomicU64::new(0),
            stop_taps_low_accuracy: AtomicU64::new(0),
            stop_taps_invalid: AtomicU64::new(0),
            distance_buckets: std::array::from_fn(|_| AtomicU64::new(0)),
        }
    }

    #[inline]
    pub fn record_enqueued(&self) {
        self.hits_enqueued.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_dropped(&self) {
        self.hits_dropped.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_suppressed(&self) {
        self.hits_suppressed.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_dry_run(&self) {
        self.hits_dry_run.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_delivered(&self) {
        self.hits_delivered.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_transport_failure(&self) {
        self.transport_failures.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_stop_skipped(&self, reason: StopSkipReason) {
        let counter = match reason {
            StopSkipReason::NoLocation => &self.stop_taps_no_location,
            StopSkipReason::LowAccuracy => &self.stop_taps_low_accuracy,
            StopSkipReason::InvalidInput => &self.stop_taps_invalid,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_distance_bucket(&self, bucket: DistanceBucket) {
        self.distance_buckets[bucket.index()].fetch_add(1, Ordering::Relaxed);
    }

    /// Snapshot all counters
    pub fn report(&self) -> MetricsSummary {
        let mut distance_buckets = [0u64; NUM_DISTANCE_BUCKETS];
        for (i, bucket) in self.distance_buckets.iter().enumerate() {
            distance_buckets[i] = bucket.load(Ordering::Relaxed);
        }

        MetricsSummary {
            uptime_secs: self.started_at.elapsed().as_secs(),
            hits_enqueued: self.hits_enqueued.load(Ordering::Relaxed),
            hits_dropped: self.hits_dropped.load(Ordering::Relaxed),
            hits_suppressed: self.hits_suppressed.load(Ordering::Relaxed),
            hits_dry_run: self.hits_dry_run.load(Ordering::Relaxed),
            hits_delivered: self.hits_delivered.load(Ordering::Relaxed),
            transport_failures: self.transport_failures.load(Ordering::Relaxed),
            stop_taps_no_location: self.stop_taps_no_location.load(Ordering::Relaxed),
            stop_taps_low_accuracy: self.stop_taps_low_accuracy.load(Ordering::Relaxed),
            stop_taps_invalid: self.stop_taps_invalid.load(Ordering::Relaxed),
            distance_buckets,
        }
    }
}

/// Point-in-time copy of the counters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricsSummary {
    pub uptime_secs: u64,
    pub hits_enqueued: u64,
    pub hits_dropped: u64,
    pub hits_suppressed: u64,
    pub hits_dry_run: u64,
    pub hits_delivered: u64,
    pub transport_failures: u64,
    pub stop_taps_no_location: u64,
    pub stop_taps_low_accuracy: u64,
    pub stop_taps_invalid: u64,
    pub distance_buckets: [u64; NUM_DISTANCE_BUCKETS],
}

impl MetricsSummary {
    pub fn log(&self) {
        info!(
            uptime_secs = %self.uptime_secs,
            hits_enqueued = %self.hits_enqueued,
            hits_delivered = %self.hits_delivered,
            hits_dropped = %self.hits_dropped,
            hits_suppressed = %self.hits_suppressed,
            hits_dry_run = %self.hits_dry_run,
            transport_failures = %self.transport_failures,
            stop_no_location = %self.stop_taps_no_location,
            stop_low_accuracy = %self.stop_taps_low_accuracy,
            stop_invalid = %self.stop_taps_invalid,
            distance_buckets = ?self.distance_buckets,
            "metrics"
        );
    }
}

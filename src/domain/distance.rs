//! Distance buckets for stop-proximity reporting
//!
//! Continuous user-to-stop distances are coarsened into eight fixed ranges
//! before they leave the device. Labels zero-pad the bounds to 5 digits so
//! dashboards sort them lexically in range order.

use serde::Serialize;

/// Upper bounds (meters, exclusive) of every bucket except the last
const UPPER_BOUNDS_M: [u32; 7] = [50, 100, 200, 400, 800, 1600, 3200];

/// Distance range between the user and a tapped stop
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum DistanceBucket {
    Under50m,
    Under100m,
    Under200m,
    Under400m,
    Under800m,
    Under1600m,
    Under3200m,
    Beyond3200m,
}

impl DistanceBucket {
    /// All buckets in ascending range order
    pub const ALL: [DistanceBucket; 8] = [
        DistanceBucket::Under50m,
        DistanceBucket::Under100m,
        DistanceBucket::Under200m,
        DistanceBucket::Under400m,
        DistanceBucket::Under800m,
        DistanceBucket::Under1600m,
        DistanceBucket::Under3200m,
        DistanceBucket::Beyond3200m,
    ];

    /// Classify a non-negative distance in meters
    ///
    /// Ranges are lower-inclusive, upper-exclusive. Negative or NaN input is a
    /// caller bug; release builds map it to the first bucket.
    #[inline]
    pub fn classify(distance_m: f64) -> DistanceBucket {
        debug_assert!(
            distance_m >= 0.0,
            "distance must be non-negative, got {distance_m}"
        );
        let idx = UPPER_BOUNDS_M.partition_point(|&bound| f64::from(bound) <= distance_m);
        Self::ALL[idx]
    }

    /// Position in ascending order (0-based)
    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Inclusive lower bound in meters
    pub fn lower_bound_m(self) -> u32 {
        match self.index() {
            0 => 0,
            i => UPPER_BOUNDS_M[i - 1],
        }
    }

    /// Exclusive upper bound in meters, `None` for the open-ended bucket
    pub fn upper_bound_m(self) -> Option<u32> {
        UPPER_BOUNDS_M.get(self.index()).copied()
    }

    /// Whether `distance_m` falls inside this bucket's range
    pub fn contains(self, distance_m: f64) -> bool {
        let above_lower = distance_m >= f64::from(self.lower_bound_m());
        match self.upper_bound_m() {
            Some(upper) => above_lower && distance_m < f64::from(upper),
            None => above_lower,
        }
    }

    /// Canonical dashboard label
    pub fn label(self) -> &'static str {
        match self {
            DistanceBucket::Under50m => "User Distance: 00000-00050m",
            DistanceBucket::Under100m => "User Distance: 00050-00100m",
            DistanceBucket::Under200m => "User Distance: 00100-00200m",
            DistanceBucket::Under400m => "User Distance: 00200-00400m",
            DistanceBucket::Under800m => "User Distance: 00400-00800m",
            DistanceBucket::Under1600m => "User Distance: 00800-01600m",
            DistanceBucket::Under3200m => "User Distance: 01600-03200m",
            DistanceBucket::Beyond3200m => "User Distance: 03200-INFINITY",
        }
    }
}

impl std::fmt::Display for DistanceBucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

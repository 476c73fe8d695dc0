//! Domain models - analytics event classification types
//!
//! This module contains the value types the dispatcher works with:
//! - `DistanceBucket` - fixed distance ranges for stop-proximity reporting
//! - `EventCategory` - segmentation category of structured events
//! - `ConfigurationState` / `RegionTagResolver` - the region dimension
//! - `EventRecord` / `Hit` / `HitPayload` - what trackers send
//! - `GeoPoint` / `LocationFix` - positions used for distance measurement

pub mod category;
pub mod distance;
pub mod event;
pub mod geo;
pub mod region;

// Re-export commonly used types at module level
pub use category::EventCategory;
pub use distance::DistanceBucket;
pub use event::{EventRecord, Hit, HitPayload};
pub use geo::{GeoPoint, LocationFix};
pub use region::{resolve_tag, ConfigurationState, EndpointHasher, RegionTagResolver, Sha1Hasher};

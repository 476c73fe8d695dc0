//! Services - dispatch logic and process wiring
//!
//! - `dispatcher` - Builds hits and fans them out to every tracker
//! - `startup_report` - Reports configured region and settings at startup
//! - `context` - Owns gate, registry and dispatcher; handles shutdown

pub mod context;
pub mod dispatcher;
pub mod startup_report;

// Re-export commonly used types
pub use context::AnalyticsContext;
pub use dispatcher::{EventDispatcher, LOCATION_ACCURACY_THRESHOLD_M};
pub use startup_report::report_startup;

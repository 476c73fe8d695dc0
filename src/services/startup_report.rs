//! Startup settings report
//!
//! Sent once after the gate is configured so the collector sees which region
//! and general settings each install runs with.

use crate::domain::category::EventCategory;
use crate::services::dispatcher::EventDispatcher;
use tracing::info;

pub const ACTION_CONFIGURED_REGION: &str = "Configured region";
pub const ACTION_EDITED_GENERAL_SETTINGS: &str = "Edited general settings";

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "YES"
    } else {
        "NO"
    }
}

/// Labels of the startup report, in send order
///
/// The tag and the flags are read from the dispatcher's own provider so one
/// report never mixes two settings sources.
pub fn startup_labels(dispatcher: &EventDispatcher) -> Vec<(&'static str, String)> {
    let provider = dispatcher.provider();
    let mut labels =
        vec![(ACTION_CONFIGURED_REGION, format!("Region: {}", dispatcher.region_tag()))];

    // Same "Region: " prefix as the tag; the value is the experimental flag
    if let Some(experimental) = provider.region_experimental() {
        labels.push((ACTION_CONFIGURED_REGION, format!("Region: {}", yes_no(experimental))));
    }

    labels.push((
        ACTION_EDITED_GENERAL_SETTINGS,
        format!("Experimental regions: {}", yes_no(provider.experimental_regions_enabled())),
    ));
    labels.push((
        ACTION_EDITED_GENERAL_SETTINGS,
        format!("Auto-select region: {}", yes_no(provider.auto_select_region())),
    ));

    labels
}

/// Dispatch the startup report as app-settings events
pub fn report_startup(dispatcher: &EventDispatcher) {
    let labels = startup_labels(dispatcher);
    for (action, label) in &labels {
        dispatcher.dispatch(EventCategory::AppSettings, action, label, None);
    }
    info!(events = %labels.len(), "startup_report_sent");
}

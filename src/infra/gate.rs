//! Process-wide analytics switches
//!
//! The gate is configured once at startup, before any tracker exists, from
//! the user's opt-in preference and the build's debug flag. Trackers consult
//! it on every send.

use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{info, warn};

/// Opt-out and dry-run switches shared by every tracker
#[derive(Debug, Default)]
pub struct AnalyticsGate {
    configured: AtomicBool,
    opted_out: AtomicBool,
    dry_run: AtomicBool,
}

impl AnalyticsGate {
    /// Unconfigured gate: opted in, delivering
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply the startup switches
    ///
    /// Only the first call takes effect; later calls are ignored so an
    /// opt-out holds for the rest of the process. Returns whether this call
    /// was applied.
    pub fn configure(&self, opted_in: bool, debug_mode: bool) -> bool {
        if self
            .configured
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            warn!(
                opted_in = %opted_in,
                debug_mode = %debug_mode,
                "analytics_gate_already_configured"
            );
            return false;
        }

        self.opted_out.store(!opted_in, Ordering::Release);
        self.dry_run.store(debug_mode, Ordering::Release);
        info!(opted_out = %!opted_in, dry_run = %debug_mode, "analytics_gate_configured");
        true
    }

    pub fn is_configured(&self) -> bool {
        self.configured.load(Ordering::Acquire)
    }

    /// Sends are suppressed for the rest of the process
    #[inline]
    pub fn is_opted_out(&self) -> bool {
        self.opted_out.load(Ordering::Acquire)
    }

    /// Sends are built but routed to the no-op path
    #[inline]
    pub fn is_dry_run(&self) -> bool {
        self.dry_run.load(Ordering::Acquire)
    }
}

//! Analytics context - owns the gate, registry and dispatcher for one process
//!
//! Construction order matters: the gate is configured from the provider
//! before the registry exists, so no tracker can send before the opt-out
//! and dry-run switches are set.

use crate::domain::region::RegionTagResolver;
use crate::infra::config::Config;
use crate::infra::gate::AnalyticsGate;
use crate::infra::metrics::Metrics;
use crate::infra::preferences::ConfigurationProvider;
use crate::infra::registry::TrackerRegistry;
use crate::io::transport_factory::SinkFactory;
use crate::services::dispatcher::EventDispatcher;
use crate::services::startup_report::report_startup;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tracing::{info, warn};

pub struct AnalyticsContext {
    gate: Arc<AnalyticsGate>,
    metrics: Arc<Metrics>,
    registry: Arc<TrackerRegistry>,
    dispatcher: EventDispatcher,
    factory: Arc<SinkFactory>,
    shutdown_tx: watch::Sender<bool>,
}

impl AnalyticsContext {
    /// Build the context; sink actors are spawned on `runtime` as trackers
    /// are first used.
    pub fn new(config: &Config, provider: Arc<dyn ConfigurationProvider>, runtime: Handle) -> Self {
        let gate = Arc::new(AnalyticsGate::new());
        gate.configure(provider.analytics_enabled(), provider.debug_mode());

        let metrics = Arc::new(Metrics::new());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let factory = Arc::new(SinkFactory::new(config, runtime, shutdown_rx, metrics.clone()));

        let registry = Arc::new(TrackerRegistry::from_config(
            config,
            factory.clone(),
            gate.clone(),
            metrics.clone(),
        ));
        let dispatcher = EventDispatcher::new(
            registry.clone(),
            provider,
            RegionTagResolver::new(config.custom_url_label()),
            metrics.clone(),
        );

        info!(
            opted_out = %gate.is_opted_out(),
            dry_run = %gate.is_dry_run(),
            config_file = %config.config_file(),
            "analytics_context_ready"
        );

        Self { gate, metrics, registry, dispatcher, factory, shutdown_tx }
    }

    pub fn dispatcher(&self) -> &EventDispatcher {
        &self.dispatcher
    }

    pub fn registry(&self) -> &Arc<TrackerRegistry> {
        &self.registry
    }

    pub fn gate(&self) -> &Arc<AnalyticsGate> {
        &self.gate
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    /// Send the startup settings report
    pub fn report_startup(&self) {
        report_startup(&self.dispatcher);
    }

    /// Signal every sink actor to drain and wait for them to finish
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);

        let tasks = self.factory.take_tasks();
        let count = tasks.len();
        for task in tasks {
            if let Err(e) = task.await {
                warn!(error = %e, "sink_task_join_failed");
            }
        }

        info!(sinks = %count, "analytics_context_shutdown");
    }
}

//! Builds tracker transports and spawns their sink actors

use crate::infra::config::{Config, TrackerProfile, TransportKind};
use crate::infra::metrics::Metrics;
use crate::infra::registry::{TrackerRole, TransportFactory};
use crate::io::file_sink::FileSink;
use crate::io::hit_channel::create_hit_channel;
use crate::io::http_sink::HttpSink;
use crate::io::mqtt_sink::{MqttSettings, MqttSink};
use crate::io::transport::{LogTransport, Transport};
use anyhow::Context;
use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Transport factory backed by a Tokio runtime
///
/// Channel-backed sinks run as tasks on `runtime`; their handles are kept so
/// shutdown can wait for queues to drain.
pub struct SinkFactory {
    runtime: Handle,
    mqtt: MqttSettings,
    channel_capacity: usize,
    shutdown_rx: watch::Receiver<bool>,
    metrics: Arc<Metrics>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl SinkFactory {
    pub fn new(
        config: &Config,
        runtime: Handle,
        shutdown_rx: watch::Receiver<bool>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            runtime,
            mqtt: MqttSettings::from_config(config),
            channel_capacity: config.channel_capacity(),
            shutdown_rx,
            metrics,
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Take the handles of every sink task spawned so far
    pub fn take_tasks(&self) -> Vec<JoinHandle<()>> {
        std::mem::take(&mut *self.tasks.lock())
    }

    fn spawn<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = self.runtime.spawn(task);
        self.tasks.lock().push(handle);
    }
}

impl TransportFactory for SinkFactory {
    fn create(
        &self,
        role: TrackerRole,
        profile: &TrackerProfile,
    ) -> anyhow::Result<Arc<dyn Transport>> {
        // MqttSink spawns its event loop with tokio::spawn
        let _guard = self.runtime.enter();

        match profile.transport {
            TransportKind::Log => Ok(Arc::new(LogTransport::new(self.metrics.clone()))),
            TransportKind::Mqtt => {
                let topic = profile.topic.clone().context("mqtt transport requires a topic")?;
                let (sender, rx) =
                    create_hit_channel(self.channel_capacity, "mqtt", self.metrics.clone());
                let sink = MqttSink::new(&self.mqtt, role, topic, rx, self.metrics.clone());
                self.spawn(sink.run(self.shutdown_rx.clone()));
                Ok(Arc::new(sender))
            }
            TransportKind::Http => {
                let url = profile.url.as_deref().context("http transport requires a url")?;
                let (sender, rx) =
                    create_hit_channel(self.channel_capacity, "http", self.metrics.clone());
                let sink = HttpSink::new(url, profile.timeout_ms, rx, self.metrics.clone())?;
                self.spawn(sink.run(self.shutdown_rx.clone()));
                Ok(Arc::new(sender))
            }
            TransportKind::File => {
                let file = profile.file.as_deref().context("file transport requires a file")?;
                let (sender, rx) =
                    create_hit_channel(self.channel_capacity, "file", self.metrics.clone());
                let sink = FileSink::new(file, rx, self.metrics.clone());
                self.spawn(sink.run(self.shutdown_rx.clone()));
                Ok(Arc::new(sender))
            }
        }
    }
}

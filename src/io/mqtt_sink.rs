//! MQTT sink for analytics hits
//!
//! Publishes each hit as JSON to the tracker's topic at QoS 0. Delivery is
//! best effort; failures are logged and counted, never retried.
//!
//! A hit counts as delivered once the event loop has written it to the
//! connection, not when it enters the client's request queue.

use crate::domain::event::HitPayload;
use crate::infra::config::Config;
use crate::infra::metrics::Metrics;
use crate::infra::registry::TrackerRole;
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Outgoing, Packet, QoS};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Upper bound on flushing queued hits at shutdown
const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Broker connection settings shared by MQTT-backed trackers
#[derive(Debug, Clone)]
pub struct MqttSettings {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl MqttSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            host: config.mqtt_host().to_string(),
            port: config.mqtt_port(),
            username: config.mqtt_username().map(str::to_string),
            password: config.mqtt_password().map(str::to_string),
        }
    }
}

/// MQTT publisher actor
///
/// Receives hits from the tracker's channel and publishes them. The
/// connection event loop runs as its own task and is awaited on shutdown.
pub struct MqttSink {
    client: AsyncClient,
    rx: mpsc::Receiver<HitPayload>,
    topic: String,
    role: TrackerRole,
    /// Publishes queued in the client but not yet written
    in_flight: Arc<AtomicUsize>,
    event_loop: JoinHandle<()>,
    drain_timeout: Duration,
    metrics: Arc<Metrics>,
}

impl MqttSink {
    /// Create a new MQTT sink
    ///
    /// Must be called inside a Tokio runtime; the connection event loop is
    /// spawned immediately.
    pub fn new(
        settings: &MqttSettings,
        role: TrackerRole,
        topic: String,
        rx: mpsc::Receiver<HitPayload>,
        metrics: Arc<Metrics>,
    ) -> Self {
        let client_id = format!("transit-analytics-{}-{}", role.as_str(), std::process::id());
        let mut mqttoptions = MqttOptions::new(client_id, settings.host.as_str(), settings.port);
        mqttoptions.set_keep_alive(Duration::from_secs(30));
        mqttoptions.set_clean_session(true);

        if let (Some(username), Some(password)) = (&settings.username, &settings.password) {
            mqttoptions.set_credentials(username, password);
        }

        let (client, eventloop) = AsyncClient::new(mqttoptions, 100);
        let in_flight = Arc::new(AtomicUsize::new(0));
        let event_loop =
            tokio::spawn(drive_event_loop(eventloop, role, in_flight.clone(), metrics.clone()));

        Self {
            client,
            rx,
            topic,
            role,
            in_flight,
            event_loop,
            drain_timeout: DEFAULT_DRAIN_TIMEOUT,
            metrics,
        }
    }

    /// Builder method to bound the shutdown flush
    pub fn with_drain_timeout(mut self, timeout: Duration) -> Self {
        self.drain_timeout = timeout;
        self
    }

    /// Run the publisher loop until shutdown, then flush what is queued
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!(topic = %self.topic, "mqtt_sink_started");

        loop {
            tokio::select! {
                res = shutdown.changed() => {
                    if res.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                Some(payload) = self.rx.recv() => {
                    self.publish(payload).await;
                }
            }
        }

        while let Ok(payload) = self.rx.try_recv() {
            self.publish(payload).await;
        }
        self.flush_and_disconnect().await;
    }

    async fn publish(&self, payload: HitPayload) {
        let json = payload.to_json();
        // Counted before the request so the event loop never sees it early
        self.in_flight.fetch_add(1, Ordering::AcqRel);
        if let Err(e) =
            self.client.publish(&self.topic, QoS::AtMostOnce, false, json.into_bytes()).await
        {
            self.in_flight.fetch_sub(1, Ordering::AcqRel);
            self.metrics.record_transport_failure();
            debug!(topic = %self.topic, error = %e, "mqtt_sink_publish_failed");
        }
    }

    /// Queue a disconnect behind the pending publishes and wait for the
    /// event loop to write them all
    async fn flush_and_disconnect(self) {
        let MqttSink {
            client, topic, role, in_flight, mut event_loop, drain_timeout, metrics, ..
        } = self;

        if let Err(e) = client.disconnect().await {
            debug!(topic = %topic, error = %e, "mqtt_sink_disconnect_failed");
        }

        if tokio::time::timeout(drain_timeout, &mut event_loop).await.is_err() {
            event_loop.abort();
        }

        let lost = in_flight.swap(0, Ordering::AcqRel);
        for _ in 0..lost {
            metrics.record_transport_failure();
        }
        if lost > 0 {
            warn!(
                role = %role.as_str(),
                topic = %topic,
                lost = %lost,
                "mqtt_sink_drain_incomplete"
            );
        }
        info!(topic = %topic, "mqtt_sink_shutdown");
    }
}

async fn drive_event_loop(
    mut eventloop: EventLoop,
    role: TrackerRole,
    in_flight: Arc<AtomicUsize>,
    metrics: Arc<Metrics>,
) {
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                info!(role = %role.as_str(), "mqtt_sink_connected");
            }
            Ok(Event::Outgoing(Outgoing::Publish(_))) => {
                let _ = in_flight
                    .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
                metrics.record_delivered();
            }
            Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                debug!(role = %role.as_str(), "mqtt_sink_disconnected");
                return;
            }
            Ok(_) => {}
            Err(e) => {
                warn!(role = %role.as_str(), error = %e, "mqtt_sink_error");
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::category::EventCategory;
    use crate::domain::event::{EventRecord, Hit};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    const CONNECT: u8 = 1;
    const PUBLISH: u8 = 3;
    const DISCONNECT: u8 = 14;

    /// Split one packet off the front: (packet type, total length)
    fn next_packet(buf: &[u8]) -> Option<(u8, usize)> {
        let mut remaining = 0usize;
        for (i, &byte) in buf.iter().enumerate().skip(1).take(4) {
            remaining |= usize::from(byte & 0x7f) << (7 * (i - 1));
            if byte & 0x80 == 0 {
                let total = i + 1 + remaining;
                return (buf.len() >= total).then_some((buf[0] >> 4, total));
            }
        }
        None
    }

    /// Minimal broker: accepts one client, acks CONNECT and counts PUBLISH
    /// packets until DISCONNECT or EOF
    async fn loopback_broker(listener: TcpListener) -> usize {
        let (mut stream, _) = listener.accept().await.unwrap();
        let mut buf = Vec::new();
        let mut publishes = 0;

        loop {
            while let Some((kind, len)) = next_packet(&buf) {
                buf.drain(..len);
                match kind {
                    CONNECT => stream.write_all(&[0x20, 0x02, 0x00, 0x00]).await.unwrap(),
                    PUBLISH => publishes += 1,
                    DISCONNECT => return publishes,
                    _ => {}
                }
            }

            let mut chunk = [0u8; 1024];
            let n = stream.read(&mut chunk).await.unwrap();
            if n == 0 {
                return publishes;
            }
            buf.extend_from_slice(&chunk[..n]);
        }
    }

    fn settings(port: u16) -> MqttSettings {
        MqttSettings { host: "127.0.0.1".to_string(), port, username: None, password: None }
    }

    fn payload(i: usize) -> HitPayload {
        let record =
            EventRecord::new(EventCategory::UiAction, "Tapped", format!("item-{i}"), None, "Tampa");
        HitPayload::new("app", None, Hit::Event(record))
    }

    #[tokio::test]
    async fn test_shutdown_flushes_queued_hits() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let broker = tokio::spawn(loopback_broker(listener));

        let metrics = Arc::new(Metrics::new());
        let (tx, rx) = mpsc::channel(8);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let sink = MqttSink::new(
            &settings(port),
            TrackerRole::App,
            "analytics/app".to_string(),
            rx,
            metrics.clone(),
        );

        for i in 0..3 {
            tx.try_send(payload(i)).unwrap();
        }
        shutdown_tx.send(true).unwrap();
        sink.run(shutdown_rx).await;

        assert_eq!(broker.await.unwrap(), 3);
        let summary = metrics.report();
        assert_eq!(summary.hits_delivered, 3);
        assert_eq!(summary.transport_failures, 0);
    }

    #[tokio::test]
    async fn test_unreachable_broker_counts_failures() {
        // Reserve a port, then close it so connects are refused
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let metrics = Arc::new(Metrics::new());
        let (tx, rx) = mpsc::channel(8);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let sink = MqttSink::new(
            &settings(port),
            TrackerRole::Global,
            "analytics/global".to_string(),
            rx,
            metrics.clone(),
        )
        .with_drain_timeout(Duration::from_millis(200));

        tx.try_send(payload(0)).unwrap();
        tx.try_send(payload(1)).unwrap();
        shutdown_tx.send(true).unwrap();
        sink.run(shutdown_rx).await;

        let summary = metrics.report();
        assert_eq!(summary.hits_delivered, 0);
        assert_eq!(summary.transport_failures, 2);
    }
}

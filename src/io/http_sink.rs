//! HTTP collector sink
//!
//! POSTs each hit as a JSON body to the tracker's collector URL. One client
//! per tracker, reused for connection pooling.

use crate::domain::event::HitPayload;
use crate::infra::metrics::Metrics;
use anyhow::Context;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info};

/// HTTP publisher actor
pub struct HttpSink {
    client: reqwest::Client,
    url: String,
    rx: mpsc::Receiver<HitPayload>,
    metrics: Arc<Metrics>,
}

impl HttpSink {
    pub fn new(
        url: &str,
        timeout_ms: u64,
        rx: mpsc::Receiver<HitPayload>,
        metrics: Arc<Metrics>,
    ) -> anyhow::Result<Self> {
        reqwest::Url::parse(url).with_context(|| format!("invalid collector url '{}'", url))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self { client, url: url.to_string(), rx, metrics })
    }

    /// Run until shutdown, then drain what is queued
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!(url = %self.url, "http_sink_started");

        loop {
            tokio::select! {
                res = shutdown.changed() => {
                    if res.is_err() || *shutdown.borrow() {
                        info!(url = %self.url, "http_sink_shutdown");
                        while let Ok(payload) = self.rx.try_recv() {
                            self.post(payload).await;
                        }
                        return;
                    }
                }
                Some(payload) = self.rx.recv() => {
                    self.post(payload).await;
                }
            }
        }
    }

    async fn post(&self, payload: HitPayload) {
        match self.client.post(&self.url).json(&payload).send().await {
            Ok(resp) if resp.status().is_success() => self.metrics.record_delivered(),
            Ok(resp) => {
                self.metrics.record_transport_failure();
                debug!(url = %self.url, status = %resp.status(), "http_sink_rejected");
            }
            Err(e) => {
                self.metrics.record_transport_failure();
                debug!(url = %self.url, error = %e, "http_sink_post_failed");
            }
        }
    }
}

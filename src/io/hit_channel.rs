//! Typed channel between trackers and sink actors
//!
//! Provides a non-blocking way to hand hits to an async sink.
//! Uses bounded mpsc channels to prevent unbounded memory growth.

use crate::domain::event::HitPayload;
use crate::infra::metrics::Metrics;
use crate::io::transport::Transport;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::debug;

/// Sender half, used as a tracker's transport
///
/// Non-blocking - if the channel is full, hits are dropped.
#[derive(Clone)]
pub struct HitSender {
    tx: mpsc::Sender<HitPayload>,
    sink: &'static str,
    metrics: Arc<Metrics>,
}

impl HitSender {
    pub fn new(tx: mpsc::Sender<HitPayload>, sink: &'static str, metrics: Arc<Metrics>) -> Self {
        Self { tx, sink, metrics }
    }
}

impl Transport for HitSender {
    fn name(&self) -> &'static str {
        self.sink
    }

    fn deliver(&self, payload: HitPayload) {
        match self.tx.try_send(payload) {
            Ok(()) => self.metrics.record_enqueued(),
            Err(TrySendError::Full(payload)) => {
                self.metrics.record_dropped();
                debug!(sink = %self.sink, tid = %payload.tid, "hit_dropped_queue_full");
            }
            Err(TrySendError::Closed(payload)) => {
                self.metrics.record_dropped();
                debug!(sink = %self.sink, tid = %payload.tid, "hit_dropped_sink_closed");
            }
        }
    }
}

/// Create a new hit channel pair
///
/// Returns (sender, receiver); the receiver goes to the sink actor.
pub fn create_hit_channel(
    buffer_size: usize,
    sink: &'static str,
    metrics: Arc<Metrics>,
) -> (HitSender, mpsc::Receiver<HitPayload>) {
    let (tx, rx) = mpsc::channel(buffer_size);
    (HitSender::new(tx, sink, metrics), rx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::event::Hit;

    fn payload(screen: &str) -> HitPayload {
        HitPayload::new("app", None, Hit::ScreenView { screen_name: screen.to_string() })
    }

    #[test]
    fn test_deliver_enqueues() {
        let metrics = Arc::new(Metrics::new());
        let (sender, mut rx) = create_hit_channel(4, "test", metrics.clone());

        sender.deliver(payload("HomeActivity"));

        let received = rx.try_recv().unwrap();
        assert_eq!(received.hit, Hit::ScreenView { screen_name: "HomeActivity".to_string() });
        assert_eq!(metrics.report().hits_enqueued, 1);
    }

    #[test]
    fn test_full_channel_drops() {
        let metrics = Arc::new(Metrics::new());
        let (sender, _rx) = create_hit_channel(1, "test", metrics.clone());

        sender.deliver(payload("A"));
        sender.deliver(payload("B"));

        let summary = metrics.report();
        assert_eq!(summary.hits_enqueued, 1);
        assert_eq!(summary.hits_dropped, 1);
    }

    #[test]
    fn test_closed_channel_drops() {
        let metrics = Arc::new(Metrics::new());
        let (sender, rx) = create_hit_channel(4, "test", metrics.clone());
        drop(rx);

        sender.deliver(payload("A"));

        assert_eq!(metrics.report().hits_dropped, 1);
    }
}

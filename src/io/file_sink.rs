//! File sink - appends hits to a JSONL file
//!
//! One JSON object per line. Useful for audits and as a collector stand-in
//! on development machines.

use crate::domain::event::HitPayload;
use crate::infra::metrics::Metrics;
use std::path::Path;
use std::sync::Arc;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info};

/// JSONL writer actor
pub struct FileSink {
    file_path: String,
    rx: mpsc::Receiver<HitPayload>,
    metrics: Arc<Metrics>,
}

impl FileSink {
    pub fn new(file_path: &str, rx: mpsc::Receiver<HitPayload>, metrics: Arc<Metrics>) -> Self {
        info!(file_path = %file_path, "file_sink_initialized");
        Self { file_path: file_path.to_string(), rx, metrics }
    }

    /// Run until shutdown, then drain what is queued
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        loop {
            tokio::select! {
                res = shutdown.changed() => {
                    if res.is_err() || *shutdown.borrow() {
                        info!(file_path = %self.file_path, "file_sink_shutdown");
                        while let Ok(payload) = self.rx.try_recv() {
                            self.write_hit(&payload).await;
                        }
                        return;
                    }
                }
                Some(payload) = self.rx.recv() => {
                    self.write_hit(&payload).await;
                }
            }
        }
    }

    /// Write a hit to the file
    /// Returns true if successful, false otherwise
    pub async fn write_hit(&self, payload: &HitPayload) -> bool {
        match self.append_line(&payload.to_json()).await {
            Ok(()) => {
                self.metrics.record_delivered();
                true
            }
            Err(e) => {
                self.metrics.record_transport_failure();
                error!(file = %self.file_path, error = %e, "file_sink_write_failed");
                false
            }
        }
    }

    /// Append a line to the file
    async fn append_line(&self, line: &str) -> std::io::Result<()> {
        let path = Path::new(&self.file_path);

        // Create parent directories if they don't exist
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        let mut file = OpenOptions::new().create(true).append(true).open(path).await?;

        file.write_all(format!("{}\n", line).as_bytes()).await?;
        // Complete the write before the handle is dropped
        file.flush().await?;
        debug!(file = %self.file_path, bytes = %line.len(), "file_sink_written");

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::category::EventCategory;
    use crate::domain::event::{EventRecord, Hit};
    use std::fs;
    use tempfile::tempdir;

    fn event_payload(label: &str) -> HitPayload {
        HitPayload::new(
            "app",
            None,
            Hit::Event(EventRecord::new(
                EventCategory::Submit,
                "Sent report",
                label,
                None,
                "Tampa",
            )),
        )
    }

    #[tokio::test]
    async fn test_write_hit_creates_parent_directories() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("nested").join("hits.jsonl");
        let (_tx, rx) = mpsc::channel(1);
        let metrics = Arc::new(Metrics::new());
        let sink = FileSink::new(nested.to_str().unwrap(), rx, metrics.clone());

        assert!(sink.write_hit(&event_payload("Stop problem")).await);

        let content = fs::read_to_string(&nested).unwrap();
        assert!(content.ends_with('\n'));
        let parsed: serde_json::Value = serde_json::from_str(content.trim()).unwrap();
        assert_eq!(parsed["label"], "Stop problem");
        assert_eq!(parsed["category"], "submit");
        assert_eq!(metrics.report().hits_delivered, 1);
    }

    #[tokio::test]
    async fn test_append_mode() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("hits.jsonl");
        fs::write(&file_path, "{\"existing\":\"data\"}\n").unwrap();

        let (_tx, rx) = mpsc::channel(1);
        let sink = FileSink::new(file_path.to_str().unwrap(), rx, Arc::new(Metrics::new()));
        sink.write_hit(&event_payload("Trip problem")).await;

        let content = fs::read_to_string(&file_path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("existing"));
        assert!(lines[1].contains("Trip problem"));
    }

    #[tokio::test]
    async fn test_run_drains_on_shutdown() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("hits.jsonl");
        let (tx, rx) = mpsc::channel(8);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let sink = FileSink::new(file_path.to_str().unwrap(), rx, Arc::new(Metrics::new()));

        for i in 0..3 {
            tx.try_send(event_payload(&format!("label-{i}"))).unwrap();
        }
        shutdown_tx.send(true).unwrap();
        sink.run(shutdown_rx).await;

        let content = fs::read_to_string(&file_path).unwrap();
        assert_eq!(content.lines().count(), 3);
    }
}

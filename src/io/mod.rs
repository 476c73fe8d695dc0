//! IO modules - tracker handles and sink transports
//!
//! This module contains everything that moves hits out of the process:
//! - `tracker` - Per-role tracker handle (screen name, gate checks)
//! - `transport` - Transport trait plus log and discard transports
//! - `hit_channel` - Bounded, non-blocking channel feeding sink actors
//! - `mqtt_sink` - MQTT publisher for hits
//! - `http_sink` - HTTP collector client
//! - `file_sink` - JSONL file writer
//! - `transport_factory` - Builds transports and spawns sink actors

pub mod file_sink;
pub mod hit_channel;
pub mod http_sink;
pub mod mqtt_sink;
pub mod tracker;
pub mod transport;
pub mod transport_factory;

// Re-export commonly used types
pub use hit_channel::{create_hit_channel, HitSender};
pub use mqtt_sink::MqttSettings;
pub use tracker::Tracker;
pub use transport::{DiscardTransport, LogTransport, Transport};
pub use transport_factory::SinkFactory;

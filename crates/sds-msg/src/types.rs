//! ---
//! sds_section: "02-messaging-ipc-data-model"
//! sds_subsection: "module"
//! sds_type: "source"
//! sds_scope: "code"
//! sds_description: "Reading envelopes and publish transports."
//! sds_version: "v0.1.0"
//! sds_owner: "tbd"
//! ---
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use sds_common::time::iso_timestamp;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Source tag identifying generated (not replayed or live) data.
pub const SYNTHETIC_SOURCE: &str = "synthetic_generator";

/// Sensor identity to formatted value, in catalog order.
pub type ReadingValues = IndexMap<String, String>;

/// Message body published once per tick.
///
/// Serializes as `{"timestamp": ..., "source": ..., "readings": {...}}`, which is
/// what downstream consumers decode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorReadingMessage {
    /// ISO-8601 UTC capture time.
    pub timestamp: String,
    /// Producer tag, [`SYNTHETIC_SOURCE`] for generated data.
    pub source: String,
    /// Formatted value per sensor identity.
    pub readings: ReadingValues,
}

impl SensorReadingMessage {
    /// Build a message tagged as synthetic data.
    pub fn synthetic(captured_at: DateTime<Utc>, readings: ReadingValues) -> Self {
        Self {
            timestamp: iso_timestamp(captured_at),
            source: SYNTHETIC_SOURCE.to_owned(),
            readings,
        }
    }

    /// Number of sensor values carried.
    pub fn len(&self) -> usize {
        self.readings.len()
    }

    /// Whether the message carries no readings.
    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }
}

/// Delivery flag forwarded to the broker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryMode {
    /// Broker may drop the message on restart.
    Transient,
    /// Broker must persist the message before acknowledging.
    #[default]
    Persistent,
}

impl DeliveryMode {
    /// Whether the message must survive a broker restart.
    pub fn is_persistent(&self) -> bool {
        matches!(self, DeliveryMode::Persistent)
    }
}

/// Line-delimited frame written by the TCP transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransportFrame {
    /// Unique identifier for broker-side deduplication.
    pub id: Uuid,
    /// Destination queue or topic.
    pub queue: String,
    /// Durable delivery requested.
    pub persistent: bool,
    /// Message body.
    pub body: SensorReadingMessage,
}

impl TransportFrame {
    /// Wrap a message for `queue`.
    pub fn new(queue: &str, body: SensorReadingMessage, delivery: DeliveryMode) -> Self {
        Self {
            id: Uuid::new_v4(),
            queue: queue.to_owned(),
            persistent: delivery.is_persistent(),
            body,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn sample() -> SensorReadingMessage {
        let mut readings = ReadingValues::new();
        readings.insert("VALVE1:STATE".into(), "1".into());
        readings.insert("PUMP1:TEMP".into(), "48.21".into());
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 8, 30, 0).unwrap();
        SensorReadingMessage::synthetic(at, readings)
    }

    #[test]
    fn message_body_matches_consumer_contract() {
        let value = serde_json::to_value(sample()).unwrap();
        assert_eq!(
            value,
            json!({
                "timestamp": "2024-03-01T08:30:00.000000Z",
                "source": "synthetic_generator",
                "readings": {"PUMP1:TEMP": "48.21", "VALVE1:STATE": "1"}
            })
        );
    }

    #[test]
    fn readings_keep_insertion_order() {
        let encoded = serde_json::to_string(&sample()).unwrap();
        let valve = encoded.find("VALVE1:STATE").unwrap();
        let pump = encoded.find("PUMP1:TEMP").unwrap();
        assert!(valve < pump);
    }

    #[test]
    fn frame_carries_persistence_flag() {
        let frame = TransportFrame::new("sensor_readings", sample(), DeliveryMode::Persistent);
        assert!(frame.persistent);
        assert_eq!(frame.queue, "sensor_readings");
        let transient = TransportFrame::new("q", sample(), DeliveryMode::Transient);
        assert!(!transient.persistent);
    }
}

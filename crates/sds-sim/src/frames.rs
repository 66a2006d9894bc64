//! ---
//! sds_section: "11-simulation"
//! sds_subsection: "module"
//! sds_type: "source"
//! sds_scope: "code"
//! sds_description: "Synthetic telemetry engine."
//! sds_version: "v0.1.0"
//! sds_owner: "tbd"
//! ---
use chrono::{DateTime, Utc};
use sds_msg::{ReadingValues, SensorReadingMessage};
use serde::Serialize;

/// One tick's snapshot: every sensor's formatted value, in catalog order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reading {
    pub captured_at: DateTime<Utc>,
    pub values: ReadingValues,
}

impl Reading {
    pub fn new(captured_at: DateTime<Utc>, values: ReadingValues) -> Self {
        Self {
            captured_at,
            values,
        }
    }

    pub fn get(&self, identity: &str) -> Option<&str> {
        self.values.get(identity).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Wrap into the wire envelope tagged as synthetic data.
    pub fn into_message(self) -> SensorReadingMessage {
        SensorReadingMessage::synthetic(self.captured_at, self.values)
    }
}

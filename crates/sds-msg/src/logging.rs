//! ---
//! sds_section: "02-messaging-ipc-data-model"
//! sds_subsection: "module"
//! sds_type: "source"
//! sds_scope: "code"
//! sds_description: "Reading envelopes and publish transports."
//! sds_version: "v0.1.0"
//! sds_owner: "tbd"
//! ---
use tracing::{debug, warn};

use crate::types::SensorReadingMessage;

/// Outcome of a publish attempt, used for consistent logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageDirection {
    /// Message handed to the transport.
    Outbound,
    /// Transport rejected the message.
    Failed,
}

/// Emit a structured log entry for publish activity.
pub fn log_message(
    direction: MessageDirection,
    transport: &'static str,
    queue: &str,
    message: &SensorReadingMessage,
) {
    match direction {
        MessageDirection::Outbound => debug!(
            transport,
            queue,
            timestamp = %message.timestamp,
            sensors = message.len(),
            "reading published"
        ),
        MessageDirection::Failed => warn!(
            transport,
            queue,
            timestamp = %message.timestamp,
            sensors = message.len(),
            "reading publish failed"
        ),
    }
}

//! ---
//! sds_section: "02-messaging-ipc-data-model"
//! sds_subsection: "module"
//! sds_type: "source"
//! sds_scope: "code"
//! sds_description: "Reading envelopes and publish transports."
//! sds_version: "v0.1.0"
//! sds_owner: "tbd"
//! ---
//! Outbound message model and transports for synthetic sensor readings.
#![warn(missing_docs)]

pub mod logging;
pub mod transport;
pub mod types;

/// Shared result type for transport operations.
pub type Result<T> = std::result::Result<T, TransportError>;

/// Failures raised while connecting to or publishing through a transport.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// A backend was selected without a setting it cannot run without.
    #[error("{kind} transport requires `{field}` to be configured")]
    MissingSetting {
        /// Transport name.
        kind: &'static str,
        /// Missing configuration key.
        field: &'static str,
    },
    /// Connection attempts were exhausted.
    #[error("unable to reach {address} after {attempts} attempt(s): {source}")]
    Unreachable {
        /// Address that was dialled.
        address: String,
        /// Number of attempts made.
        attempts: u32,
        /// Error from the final attempt.
        #[source]
        source: std::io::Error,
    },
    /// Publish was attempted after `close`.
    #[error("{0} transport is closed")]
    Closed(&'static str),
    /// Wrapper for IO errors encountered while writing.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Wrapper for JSON serialization problems.
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

pub use logging::{log_message, MessageDirection};
pub use transport::{
    connect, FileTransport, InMemoryTransport, StdoutTransport, TcpTransport, Transport,
};
pub use types::{DeliveryMode, ReadingValues, SensorReadingMessage, TransportFrame, SYNTHETIC_SOURCE};

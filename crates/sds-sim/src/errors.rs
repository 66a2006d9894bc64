//! ---
//! sds_section: "11-simulation"
//! sds_subsection: "module"
//! sds_type: "source"
//! sds_scope: "code"
//! sds_description: "Synthetic telemetry engine."
//! sds_version: "v0.1.0"
//! sds_owner: "tbd"
//! ---
use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, SimError>;

#[derive(Debug, Error)]
pub enum SimError {
    #[error("unable to read limits file {path}: {source}")]
    LimitsUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed limits at line {line}: {reason}")]
    MalformedLimits { line: u64, reason: String },
    #[error("unknown sensor {0}")]
    UnknownSensor(String),
    #[error("unknown machine {0}")]
    UnknownMachine(String),
    #[error("fault episode already active on machine {0}")]
    FaultActive(String),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("transport error: {0}")]
    Transport(#[from] sds_msg::TransportError),
}

//! ---
//! sds_section: "11-simulation"
//! sds_subsection: "module"
//! sds_type: "source"
//! sds_scope: "code"
//! sds_description: "Synthetic telemetry engine."
//! sds_version: "v0.1.0"
//! sds_owner: "tbd"
//! ---
use sds_msg::{DeliveryMode, Transport};
use tracing::info;

use crate::errors::Result;
use crate::frames::Reading;

/// Hands each tick's reading to the transport as a persistent message.
///
/// Publish failures are returned to the caller as-is; there is no retry or buffering here.
pub struct ReadingEmitter {
    transport: Box<dyn Transport>,
    queue: String,
    delivery: DeliveryMode,
    published: u64,
}

impl ReadingEmitter {
    pub fn new(transport: Box<dyn Transport>, queue: impl Into<String>) -> Self {
        Self {
            transport,
            queue: queue.into(),
            delivery: DeliveryMode::Persistent,
            published: 0,
        }
    }

    pub fn with_delivery(mut self, delivery: DeliveryMode) -> Self {
        self.delivery = delivery;
        self
    }

    pub async fn emit(&mut self, reading: Reading) -> Result<()> {
        let message = reading.into_message();
        self.transport
            .publish(&self.queue, &message, self.delivery)
            .await?;
        self.published += 1;
        Ok(())
    }

    pub async fn close(&mut self) -> Result<()> {
        self.transport.close().await?;
        info!(
            transport = self.transport.name(),
            queue = %self.queue,
            published = self.published,
            "transport closed"
        );
        Ok(())
    }

    pub fn queue(&self) -> &str {
        &self.queue
    }

    pub fn transport_name(&self) -> &'static str {
        self.transport.name()
    }

    /// Messages accepted by the transport so far.
    pub fn published(&self) -> u64 {
        self.published
    }
}

impl std::fmt::Debug for ReadingEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadingEmitter")
            .field("transport", &self.transport.name())
            .field("queue", &self.queue)
            .field("delivery", &self.delivery)
            .field("published", &self.published)
            .finish()
    }
}

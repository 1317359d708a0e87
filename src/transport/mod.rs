//! Publish/subscribe transports that deliver channel messages.
//!
//! A transport is handed one [`ArrivalHandle`] per channel at subscription time and
//! calls [`ArrivalHandle::record`] for every message it delivers on that channel.
//! Payloads are never inspected.
//!
//! ## Implementations
//!
//! - [`memory::MemoryTransport`]: in-process bus, used for tests and dry runs
//! - [`mqtt::MqttTransport`]: MQTT broker client (feature `mqtt`)

pub mod memory;
#[cfg(feature = "mqtt")]
pub mod mqtt;

use async_trait::async_trait;

use crate::error::TransportResult;
use crate::registry::Channel;
use crate::tracker::ArrivalHandle;

#[async_trait]
pub trait Transport: Send {
    /// Start delivering arrivals for `channel` into `handle`.
    ///
    /// A failure here is fatal for the run.
    async fn subscribe(&mut self, channel: &Channel, handle: ArrivalHandle)
    -> TransportResult<()>;

    /// Release every subscription. No arrivals are delivered afterwards.
    async fn shutdown(&mut self);
}

pub use memory::{MemoryBus, MemoryTransport};
#[cfg(feature = "mqtt")]
pub use mqtt::MqttTransport;

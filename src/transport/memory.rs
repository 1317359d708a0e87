//! In-process transport
//!
//! Publishers and the monitor share a [`MemoryBus`]. Publishing on a channel invokes
//! every handle subscribed to it, from whatever task or thread calls `publish`.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::{debug, trace};

use super::Transport;
use crate::error::{TransportError, TransportResult};
use crate::registry::Channel;
use crate::tracker::ArrivalHandle;

#[derive(Debug, Default)]
struct BusState {
    subscribers: HashMap<String, Vec<ArrivalHandle>>,
    failing: HashSet<String>,
    delivered: u64,
}

/// Shared in-memory message bus.
#[derive(Debug, Clone, Default)]
pub struct MemoryBus {
    state: Arc<Mutex<BusState>>,
}

impl MemoryBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Transport view of this bus for a monitor.
    pub fn transport(&self) -> MemoryTransport {
        MemoryTransport { bus: self.clone() }
    }

    /// Deliver one message on `channel`.
    ///
    /// Returns how many subscribers received it.
    pub fn publish(&self, channel: &str) -> usize {
        let handles = {
            let mut state = self.state.lock();
            let handles = state.subscribers.get(channel).cloned().unwrap_or_default();
            state.delivered += handles.len() as u64;
            handles
        };

        for handle in &handles {
            handle.record();
        }

        trace!("published on {channel} to {} subscribers", handles.len());
        handles.len()
    }

    /// Make every future subscription to `channel` fail.
    pub fn fail_subscriptions_to(&self, channel: impl ToString) {
        self.state.lock().failing.insert(channel.to_string());
    }

    pub fn subscriber_count(&self) -> usize {
        self.state.lock().subscribers.values().map(Vec::len).sum()
    }

    /// Total number of deliveries made so far.
    pub fn delivered(&self) -> u64 {
        self.state.lock().delivered
    }
}

/// [`Transport`] backed by a [`MemoryBus`].
#[derive(Debug, Clone)]
pub struct MemoryTransport {
    bus: MemoryBus,
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn subscribe(
        &mut self,
        channel: &Channel,
        handle: ArrivalHandle,
    ) -> TransportResult<()> {
        let mut state = self.bus.state.lock();

        if state.failing.contains(&channel.id) {
            return Err(TransportError::Subscribe {
                channel: channel.id.clone(),
                reason: "subscription rejected by bus".into(),
            });
        }

        state
            .subscribers
            .entry(channel.id.clone())
            .or_default()
            .push(handle);

        debug!("subscribed to {} ({})", channel.id, channel.kind);
        Ok(())
    }

    async fn shutdown(&mut self) {
        self.bus.state.lock().subscribers.clear();
        debug!("memory transport released all subscriptions");
    }
}

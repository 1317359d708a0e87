//! Arrival tracking for monitored channels.
//!
//! Every channel gets one atomic `received` flag. Flags only ever go from `false` to
//! `true`, so writers never need to coordinate with each other and the scheduler can
//! take snapshots while deliveries are still coming in.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{trace, warn};

use crate::registry::ChannelRegistry;

#[derive(Debug)]
struct TrackerInner {
    ids: Vec<String>,
    index: HashMap<String, usize>,
    flags: Vec<AtomicBool>,
}

/// Concurrency-safe store of per-channel arrival flags.
///
/// Cloning is cheap and every clone refers to the same flags.
#[derive(Debug, Clone)]
pub struct ArrivalTracker {
    inner: Arc<TrackerInner>,
}

impl ArrivalTracker {
    /// Create a tracker with one unset flag per registry entry.
    pub fn new(registry: &ChannelRegistry) -> Self {
        let ids: Vec<String> = registry.iter().map(|channel| channel.id.clone()).collect();
        let index = ids
            .iter()
            .enumerate()
            .map(|(position, id)| (id.clone(), position))
            .collect();
        let flags = ids.iter().map(|_| AtomicBool::new(false)).collect();

        Self {
            inner: Arc::new(TrackerInner { ids, index, flags }),
        }
    }

    /// Mark `channel` as received.
    ///
    /// Returns `true` only for the first arrival on a known channel. Repeated arrivals
    /// and unknown channels are no-ops.
    pub fn record(&self, channel: &str) -> bool {
        match self.inner.index.get(channel) {
            Some(&position) => self.record_at(position),
            None => {
                warn!("ignoring arrival on unregistered channel {channel}");
                false
            }
        }
    }

    /// Write handle bound to a single channel.
    pub fn handle(&self, channel: &str) -> Option<ArrivalHandle> {
        self.inner
            .index
            .get(channel)
            .map(|&position| ArrivalHandle {
                tracker: self.clone(),
                position,
            })
    }

    pub fn is_received(&self, channel: &str) -> Option<bool> {
        self.inner
            .index
            .get(channel)
            .map(|&position| self.inner.flags[position].load(Ordering::Acquire))
    }

    /// Copy all flags as they are right now.
    pub fn snapshot(&self) -> Snapshot {
        let entries = self
            .inner
            .ids
            .iter()
            .zip(&self.inner.flags)
            .map(|(id, flag)| (id.clone(), flag.load(Ordering::Acquire)))
            .collect();

        Snapshot { entries }
    }

    fn record_at(&self, position: usize) -> bool {
        let first = !self.inner.flags[position].swap(true, Ordering::AcqRel);
        if first {
            trace!("first arrival on {}", self.inner.ids[position]);
        }
        first
    }
}

/// Cloneable write handle for one channel, handed to transport delivery contexts.
#[derive(Debug, Clone)]
pub struct ArrivalHandle {
    tracker: ArrivalTracker,
    position: usize,
}

impl ArrivalHandle {
    /// Record one arrival. See [`ArrivalTracker::record`].
    pub fn record(&self) -> bool {
        self.tracker.record_at(self.position)
    }

    pub fn channel(&self) -> &str {
        &self.tracker.inner.ids[self.position]
    }
}

/// Immutable copy of all arrival flags, in registry order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    entries: Vec<(String, bool)>,
}

impl Snapshot {
    /// Build a snapshot from explicit `(channel, received)` pairs.
    pub fn from_entries<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (S, bool)>,
        S: ToString,
    {
        Self {
            entries: entries
                .into_iter()
                .map(|(id, received)| (id.to_string(), received))
                .collect(),
        }
    }

    pub fn get(&self, channel: &str) -> Option<bool> {
        self.entries
            .iter()
            .find(|(id, _)| id == channel)
            .map(|(_, received)| *received)
    }

    pub fn all_received(&self) -> bool {
        self.entries.iter().all(|(_, received)| *received)
    }

    pub fn received_count(&self) -> usize {
        self.entries.iter().filter(|(_, received)| *received).count()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, bool)> {
        self.entries
            .iter()
            .map(|(id, received)| (id.as_str(), *received))
    }
}

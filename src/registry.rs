//! The fixed set of channels a run watches.

use std::collections::HashSet;
use std::fmt;

use anyhow::bail;
use serde::{Deserialize, Serialize};

/// Kind of data a channel carries.
///
/// Both kinds are monitored the same way, but transports may subscribe to them with
/// different delivery guarantees (power status feeds are subscribed reliably, distance
/// sensors best-effort).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    Range,
    Battery,
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelKind::Range => write!(f, "range"),
            ChannelKind::Battery => write!(f, "battery"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Channel {
    pub id: String,
    pub kind: ChannelKind,
}

impl Channel {
    pub fn new(id: impl ToString, kind: ChannelKind) -> Self {
        Self {
            id: id.to_string(),
            kind,
        }
    }

    pub fn range(id: impl ToString) -> Self {
        Self::new(id, ChannelKind::Range)
    }

    pub fn battery(id: impl ToString) -> Self {
        Self::new(id, ChannelKind::Battery)
    }
}

/// Ordered, immutable list of monitored channels.
///
/// Registry order is the order of every report produced from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelRegistry {
    channels: Vec<Channel>,
}

impl ChannelRegistry {
    pub fn new(channels: Vec<Channel>) -> anyhow::Result<Self> {
        if channels.is_empty() {
            bail!("channel registry must not be empty");
        }

        let mut seen = HashSet::new();
        for channel in &channels {
            if channel.id.trim().is_empty() {
                bail!("channel id must not be empty");
            }
            if !seen.insert(channel.id.as_str()) {
                bail!("duplicate channel id '{}'", channel.id);
            }
        }

        Ok(Self { channels })
    }

    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    pub fn iter(&self) -> impl Iterator<Item = &Channel> {
        self.channels.iter()
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    pub fn position(&self, id: &str) -> Option<usize> {
        self.channels.iter().position(|channel| channel.id == id)
    }
}

impl<'a> IntoIterator for &'a ChannelRegistry {
    type Item = &'a Channel;
    type IntoIter = std::slice::Iter<'a, Channel>;

    fn into_iter(self) -> Self::IntoIter {
        self.channels.iter()
    }
}

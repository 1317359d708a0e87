//! Classification of a snapshot into per-channel verdicts and one overall verdict.

use std::fmt;

use serde::Serialize;

use crate::registry::{ChannelKind, ChannelRegistry};
use crate::tracker::Snapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelStatus {
    Live,
    Dead,
}

impl ChannelStatus {
    /// Numeric status as the sink expects it.
    pub fn check_status(&self) -> &'static str {
        match self {
            ChannelStatus::Live => "1",
            ChannelStatus::Dead => "0",
        }
    }
}

impl fmt::Display for ChannelStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelStatus::Live => write!(f, "live"),
            ChannelStatus::Dead => write!(f, "dead"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChannelVerdict {
    pub channel: String,
    pub kind: ChannelKind,
    pub status: ChannelStatus,
    /// Reserved for a measured value; always `None` for liveness checks.
    pub value: Option<f64>,
    pub remark: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthReport {
    pub verdicts: Vec<ChannelVerdict>,
    pub any_dead: bool,
    /// One `Topic not publishing: <id>` line per dead channel, in registry order.
    pub error_message: String,
}

impl HealthReport {
    /// Classify every registry channel against `snapshot`.
    ///
    /// Channels missing from the snapshot count as dead.
    pub fn build(registry: &ChannelRegistry, snapshot: &Snapshot) -> Self {
        let mut errors = Vec::new();

        let verdicts: Vec<ChannelVerdict> = registry
            .iter()
            .map(|channel| {
                let received = snapshot.get(&channel.id).unwrap_or(false);
                let (status, remark) = if received {
                    (
                        ChannelStatus::Live,
                        format!("Topic is publishing data: {}", channel.id),
                    )
                } else {
                    errors.push(format!("Topic not publishing: {}", channel.id));
                    (
                        ChannelStatus::Dead,
                        format!("Topic not publishing data: {}", channel.id),
                    )
                };

                ChannelVerdict {
                    channel: channel.id.clone(),
                    kind: channel.kind,
                    status,
                    value: None,
                    remark,
                }
            })
            .collect();

        Self {
            any_dead: !errors.is_empty(),
            error_message: errors.join("\n"),
            verdicts,
        }
    }

    pub fn dead_channels(&self) -> impl Iterator<Item = &ChannelVerdict> {
        self.verdicts
            .iter()
            .filter(|verdict| verdict.status == ChannelStatus::Dead)
    }

    pub fn live_count(&self) -> usize {
        self.verdicts
            .iter()
            .filter(|verdict| verdict.status == ChannelStatus::Live)
            .count()
    }
}

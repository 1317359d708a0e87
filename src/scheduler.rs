//! Bounded polling loop deciding when a run stops waiting for arrivals.
//!
//! ```text
//! Running ── all received ──▶ EarlyExit ─┐
//!    │                                   │
//!    ├──── deadline elapsed ─▶ TimedOut ─┼──▶ Finalizing ──▶ Done
//!    │                                   │
//!    └──── cancellation ────▶ Cancelled ─┘
//! ```
//!
//! The scheduler only decides *why* the loop ended. Finalizing is owned by the monitor,
//! which runs it on every one of the three exits.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use tokio::time::{Instant, sleep};
use tracing::{debug, instrument, trace};

use crate::tracker::ArrivalTracker;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    /// Every channel was received before the deadline.
    EarlyExit,
    /// The deadline elapsed with at least one channel still silent.
    TimedOut,
    /// An external interrupt ended the wait.
    Cancelled,
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitReason::EarlyExit => write!(f, "all channels received"),
            ExitReason::TimedOut => write!(f, "deadline elapsed"),
            ExitReason::Cancelled => write!(f, "cancelled"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeadlineScheduler {
    tick: Duration,
    deadline: Duration,
}

impl DeadlineScheduler {
    /// `tick` is clamped to at least one millisecond.
    pub fn new(tick: Duration, deadline: Duration) -> Self {
        Self {
            tick: tick.max(Duration::from_millis(1)),
            deadline,
        }
    }

    pub fn tick(&self) -> Duration {
        self.tick
    }

    pub fn deadline(&self) -> Duration {
        self.deadline
    }

    /// Poll `tracker` until every channel is received, the deadline elapses or `cancel`
    /// resolves, whichever comes first.
    #[instrument(skip_all, fields(tick = ?self.tick, deadline = ?self.deadline))]
    pub async fn wait<F>(&self, tracker: &ArrivalTracker, cancel: F) -> ExitReason
    where
        F: Future<Output = ()>,
    {
        let deadline = Instant::now() + self.deadline;
        tokio::pin!(cancel);

        let reason = loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let slice = self.tick.min(remaining);

            tokio::select! {
                biased;

                _ = &mut cancel => break ExitReason::Cancelled,

                _ = sleep(slice) => {}
            }

            let snapshot = tracker.snapshot();
            trace!(
                "{}/{} channels received",
                snapshot.received_count(),
                snapshot.len()
            );

            if snapshot.all_received() {
                break ExitReason::EarlyExit;
            }

            if Instant::now() >= deadline {
                break ExitReason::TimedOut;
            }
        };

        debug!("stopped waiting: {reason}");
        reason
    }
}

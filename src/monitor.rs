//! One monitoring run from subscription to report.
//!
//! ## Flow
//!
//! ```text
//! subscribe all ──▶ DeadlineScheduler::wait ──▶ snapshot ──▶ transport shutdown
//!   (fatal on error)   (EarlyExit | TimedOut |     │
//!                        Cancelled)               ▼
//!                                          HealthReport::build ──▶ Reporter::dispatch
//! ```
//!
//! Finalizing consumes the [`Session`], so it happens exactly once whichever way the
//! wait ended.

use std::future::Future;

use tracing::{debug, info, instrument, warn};

use crate::config::Config;
use crate::error::TransportResult;
use crate::registry::ChannelRegistry;
use crate::report::HealthReport;
use crate::reporter::{DispatchSummary, Reporter};
use crate::scheduler::{DeadlineScheduler, ExitReason};
use crate::sink::Sink;
use crate::tracker::ArrivalTracker;
use crate::transport::Transport;

/// Result of a completed run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunOutcome {
    pub exit: ExitReason,
    pub report: HealthReport,
    pub dispatch: DispatchSummary,
}

impl RunOutcome {
    /// Whether every channel was live. Reporting failures do not affect this.
    pub fn is_healthy(&self) -> bool {
        !self.report.any_dead
    }
}

pub struct TopicMonitor<T, S> {
    registry: ChannelRegistry,
    scheduler: DeadlineScheduler,
    transport: T,
    reporter: Reporter<S>,
}

/// Live subscriptions of a run, owned until finalization.
struct Session<'a, T> {
    registry: &'a ChannelRegistry,
    tracker: ArrivalTracker,
    transport: T,
}

impl<T, S> TopicMonitor<T, S>
where
    T: Transport,
    S: Sink,
{
    pub fn new(
        registry: ChannelRegistry,
        scheduler: DeadlineScheduler,
        transport: T,
        reporter: Reporter<S>,
    ) -> Self {
        Self {
            registry,
            scheduler,
            transport,
            reporter,
        }
    }

    pub fn from_config(config: &Config, transport: T, sink: S) -> anyhow::Result<Self> {
        Ok(Self::new(
            config.registry()?,
            DeadlineScheduler::new(config.timing.tick(), config.timing.deadline()),
            transport,
            Reporter::from_config(config, sink),
        ))
    }

    pub fn registry(&self) -> &ChannelRegistry {
        &self.registry
    }

    /// Watch every channel until all are received, the deadline elapses or `cancel`
    /// resolves, then report.
    ///
    /// Only subscription failures are returned as errors. Those happen before waiting
    /// starts and produce no report.
    #[instrument(skip_all, fields(channels = self.registry.len()))]
    pub async fn run<F>(self, cancel: F) -> TransportResult<RunOutcome>
    where
        F: Future<Output = ()>,
    {
        let Self {
            registry,
            scheduler,
            transport,
            reporter,
        } = self;

        let session = Session::open(&registry, transport).await?;
        let exit = scheduler.wait(&session.tracker, cancel).await;
        let report = session.finalize(exit).await;

        let dispatch = reporter.dispatch(&report).await;
        info!(
            "run finished ({exit}): {} of {} channels live",
            report.live_count(),
            report.verdicts.len()
        );

        Ok(RunOutcome {
            exit,
            report,
            dispatch,
        })
    }
}

impl<'a, T: Transport> Session<'a, T> {
    async fn open(registry: &'a ChannelRegistry, mut transport: T) -> TransportResult<Self> {
        let tracker = ArrivalTracker::new(registry);

        for channel in registry {
            let Some(handle) = tracker.handle(&channel.id) else {
                continue;
            };

            if let Err(e) = transport.subscribe(channel, handle).await {
                warn!("aborting run: {e}");
                transport.shutdown().await;
                return Err(e);
            }
        }

        debug!("subscribed to {} channels", registry.len());

        Ok(Self {
            registry,
            tracker,
            transport,
        })
    }

    /// Freeze the arrivals, release the transport and classify.
    async fn finalize(mut self, exit: ExitReason) -> HealthReport {
        let snapshot = self.tracker.snapshot();
        self.transport.shutdown().await;

        debug!(
            "finalizing after {exit} with {}/{} channels received",
            snapshot.received_count(),
            snapshot.len()
        );

        HealthReport::build(self.registry, &snapshot)
    }
}

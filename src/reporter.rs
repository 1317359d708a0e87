//! Best-effort dispatch of a [`HealthReport`] to a [`Sink`].
//!
//! Every record is sent independently: a failing call is logged and counted, and the
//! remaining records are still sent. Nothing is retried and no error leaves the
//! reporter.

use chrono::{DateTime, Local};
use tracing::{debug, error, instrument};

use crate::config::{Config, Location, RecordConfig};
use crate::report::{ChannelVerdict, HealthReport};
use crate::sink::{ActivityRecord, ErrorRecord, HealthCheckRecord, Sink};

/// Which summary a run ended with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummaryKind {
    Activity,
    Error,
}

/// What a dispatch managed to deliver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchSummary {
    pub health_checks_sent: usize,
    pub health_checks_failed: usize,
    pub summary: SummaryKind,
    pub summary_delivered: bool,
}

/// Identity stamped onto every record.
#[derive(Debug, Clone, PartialEq)]
pub struct ReporterIdentity {
    pub rover_id: String,
    pub device_id: String,
    pub location: Location,
}

pub struct Reporter<S> {
    sink: S,
    identity: ReporterIdentity,
    records: RecordConfig,
}

impl<S: Sink> Reporter<S> {
    pub fn new(sink: S, identity: ReporterIdentity, records: RecordConfig) -> Self {
        Self {
            sink,
            identity,
            records,
        }
    }

    pub fn from_config(config: &Config, sink: S) -> Self {
        Self::new(
            sink,
            ReporterIdentity {
                rover_id: config.rover_id.clone(),
                device_id: config.device_id.clone(),
                location: config.location.clone(),
            },
            config.records.clone(),
        )
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Send one health check per verdict, then exactly one summary record.
    #[instrument(skip_all, fields(rover = %self.identity.rover_id))]
    pub async fn dispatch(&self, report: &HealthReport) -> DispatchSummary {
        let timestamp = format_timestamp(Local::now());

        let mut health_checks_sent = 0;
        let mut health_checks_failed = 0;

        for verdict in &report.verdicts {
            let record = self.health_check_record(verdict, &timestamp);
            match self.sink.health_check(&record).await {
                Ok(()) => {
                    debug!("health check sent for {}", verdict.channel);
                    health_checks_sent += 1;
                }
                Err(e) => {
                    error!("failed to send health check for {}: {e:#}", verdict.channel);
                    health_checks_failed += 1;
                }
            }
        }

        let (summary, result) = if report.any_dead {
            let record = self.error_record(&report.error_message, &timestamp);
            (SummaryKind::Error, self.sink.error(&record).await)
        } else {
            let record = self.activity_record(&timestamp);
            (SummaryKind::Activity, self.sink.activity(&record).await)
        };

        let summary_delivered = match result {
            Ok(()) => {
                debug!("{summary:?} summary sent");
                true
            }
            Err(e) => {
                error!("failed to send {summary:?} summary: {e:#}");
                false
            }
        };

        DispatchSummary {
            health_checks_sent,
            health_checks_failed,
            summary,
            summary_delivered,
        }
    }

    fn health_check_record(&self, verdict: &ChannelVerdict, timestamp: &str) -> HealthCheckRecord {
        let [location_x, location_y, location_z] = self.identity.location.as_strings();

        HealthCheckRecord {
            rover_id: self.identity.rover_id.clone(),
            rpi_id: self.identity.device_id.clone(),
            device_id: verdict.channel.clone(),
            check_status: verdict.status.check_status().to_string(),
            check_value: verdict.value.map(|v| v.to_string()).unwrap_or_default(),
            date_time: timestamp.to_string(),
            location_x,
            location_y,
            location_z,
            remarks: verdict.remark.clone(),
        }
    }

    fn activity_record(&self, timestamp: &str) -> ActivityRecord {
        let [location_x, location_y, location_z] = self.identity.location.as_strings();

        ActivityRecord {
            activity_id: self.records.activity_id.clone(),
            rover_id: self.identity.rover_id.clone(),
            activity_type: self.records.activity_type.clone(),
            description: self.records.activity_description.clone(),
            location_x,
            location_y,
            location_z,
            created_at: timestamp.to_string(),
        }
    }

    fn error_record(&self, message: &str, timestamp: &str) -> ErrorRecord {
        let [location_x, location_y, location_z] = self.identity.location.as_strings();

        ErrorRecord {
            activity_id: self.records.error_activity_id.clone(),
            activity_type: self.records.error_activity_type.clone(),
            error_code: self.records.error_code.clone(),
            rover_id: self.identity.rover_id.clone(),
            error_message: message.to_string(),
            location_x,
            location_y,
            location_z,
            created_at: timestamp.to_string(),
        }
    }
}

/// Local time without offset, microsecond precision.
pub fn format_timestamp(time: DateTime<Local>) -> String {
    time.naive_local()
        .format("%Y-%m-%dT%H:%M:%S%.6f")
        .to_string()
}

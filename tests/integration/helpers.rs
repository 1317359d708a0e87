//! Test helpers and utilities for integration tests

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use topic_monitor::{
    TopicMonitor,
    config::{Location, RecordConfig},
    error::TransportResult,
    registry::{Channel, ChannelRegistry},
    reporter::{Reporter, ReporterIdentity},
    scheduler::DeadlineScheduler,
    sink::{ActivityRecord, ErrorRecord, HealthCheckRecord, Sink},
    tracker::ArrivalHandle,
    transport::{MemoryBus, MemoryTransport, Transport},
};

/// Sink that remembers every record it receives
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub health_checks: Mutex<Vec<HealthCheckRecord>>,
    pub activities: Mutex<Vec<ActivityRecord>>,
    pub errors: Mutex<Vec<ErrorRecord>>,
}

impl RecordingSink {
    pub fn statuses(&self) -> Vec<(String, String)> {
        self.health_checks
            .lock()
            .iter()
            .map(|r| (r.device_id.clone(), r.check_status.clone()))
            .collect()
    }
}

#[async_trait]
impl Sink for RecordingSink {
    async fn health_check(&self, record: &HealthCheckRecord) -> anyhow::Result<()> {
        self.health_checks.lock().push(record.clone());
        Ok(())
    }

    async fn activity(&self, record: &ActivityRecord) -> anyhow::Result<()> {
        self.activities.lock().push(record.clone());
        Ok(())
    }

    async fn error(&self, record: &ErrorRecord) -> anyhow::Result<()> {
        self.errors.lock().push(record.clone());
        Ok(())
    }
}

/// Sink whose every call fails like an unreachable server
#[derive(Debug, Default)]
pub struct FailingSink {
    pub calls: AtomicUsize,
}

#[async_trait]
impl Sink for FailingSink {
    async fn health_check(&self, _record: &HealthCheckRecord) -> anyhow::Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        anyhow::bail!("connection refused")
    }

    async fn activity(&self, _record: &ActivityRecord) -> anyhow::Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        anyhow::bail!("connection refused")
    }

    async fn error(&self, _record: &ErrorRecord) -> anyhow::Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        anyhow::bail!("connection refused")
    }
}

/// Transport that delivers one arrival while it is being shut down, after the monitor
/// has already frozen its arrivals
#[derive(Debug)]
pub struct LateArrivalTransport {
    late_channel: String,
    handles: HashMap<String, ArrivalHandle>,
    pub delivered_late: Arc<AtomicBool>,
}

impl LateArrivalTransport {
    pub fn new(late_channel: &str) -> Self {
        Self {
            late_channel: late_channel.to_string(),
            handles: HashMap::new(),
            delivered_late: Arc::new(AtomicBool::new(false)),
        }
    }
}

#[async_trait]
impl Transport for LateArrivalTransport {
    async fn subscribe(&mut self, channel: &Channel, handle: ArrivalHandle) -> TransportResult<()> {
        self.handles.insert(channel.id.clone(), handle);
        Ok(())
    }

    async fn shutdown(&mut self) {
        if let Some(handle) = self.handles.get(&self.late_channel) {
            handle.record();
            self.delivered_late.store(true, Ordering::SeqCst);
        }
        self.handles.clear();
    }
}

/// Registry of three range sensors plus one battery feed
pub fn create_test_registry() -> ChannelRegistry {
    ChannelRegistry::new(vec![
        Channel::range("A"),
        Channel::range("B"),
        Channel::range("C"),
        Channel::battery("battery"),
    ])
    .unwrap()
}

pub fn create_test_identity() -> ReporterIdentity {
    ReporterIdentity {
        rover_id: "R_001".to_string(),
        device_id: "Rpi_001".to_string(),
        location: Location::default(),
    }
}

/// Monitor over `bus` with a 100 ms tick and a 5 s deadline
pub fn create_test_monitor<S: Sink>(bus: &MemoryBus, sink: S) -> TopicMonitor<MemoryTransport, S> {
    create_test_monitor_with_deadline(bus, sink, Duration::from_secs(5))
}

pub fn create_test_monitor_with_deadline<S: Sink>(
    bus: &MemoryBus,
    sink: S,
    deadline: Duration,
) -> TopicMonitor<MemoryTransport, S> {
    create_test_monitor_over(bus.transport(), sink, deadline)
}

pub fn create_test_monitor_over<T: Transport, S: Sink>(
    transport: T,
    sink: S,
    deadline: Duration,
) -> TopicMonitor<T, S> {
    TopicMonitor::new(
        create_test_registry(),
        DeadlineScheduler::new(Duration::from_millis(100), deadline),
        transport,
        Reporter::new(sink, create_test_identity(), RecordConfig::default()),
    )
}

/// Publish on every channel in `channels` after `delay`
pub fn publish_after(bus: &MemoryBus, delay: Duration, channels: &[&str]) {
    let bus = bus.clone();
    let channels: Vec<String> = channels.iter().map(|c| c.to_string()).collect();

    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        for channel in channels {
            bus.publish(&channel);
        }
    });
}

pub fn owned(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
    pairs
        .iter()
        .map(|(a, b)| (a.to_string(), b.to_string()))
        .collect()
}

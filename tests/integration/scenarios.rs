//! End-to-end runs over the in-memory transport
//!
//! Registry for every test: [A, B, C, battery].

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use pretty_assertions::assert_eq;
use tokio::time::Instant;
use topic_monitor::{scheduler::ExitReason, transport::MemoryBus};

use crate::helpers::*;

#[tokio::test(start_paused = true)]
async fn test_all_channels_publishing() {
    let bus = MemoryBus::new();
    let sink = Arc::new(RecordingSink::default());

    publish_after(&bus, Duration::from_millis(50), &["A", "B"]);
    publish_after(&bus, Duration::from_millis(300), &["C", "battery"]);

    let start = Instant::now();
    let outcome = create_test_monitor(&bus, sink.clone())
        .run(std::future::pending())
        .await
        .unwrap();

    assert_eq!(outcome.exit, ExitReason::EarlyExit);
    assert!(start.elapsed() < Duration::from_secs(1));
    assert!(outcome.is_healthy());

    assert_eq!(sink.activities.lock().len(), 1);
    assert!(sink.errors.lock().is_empty());
    assert_eq!(
        sink.statuses(),
        owned(&[("A", "1"), ("B", "1"), ("C", "1"), ("battery", "1")])
    );

    let activities = sink.activities.lock();
    let activity = &activities[0];
    assert_eq!(activity.activity_type, "Topic Health Check");
    assert_eq!(activity.rover_id, "R_001");
}

#[tokio::test(start_paused = true)]
async fn test_silent_channels_time_out() {
    let bus = MemoryBus::new();
    let sink = Arc::new(RecordingSink::default());

    publish_after(&bus, Duration::from_millis(200), &["A", "battery"]);

    let start = Instant::now();
    let outcome = create_test_monitor(&bus, sink.clone())
        .run(std::future::pending())
        .await
        .unwrap();

    assert_eq!(outcome.exit, ExitReason::TimedOut);
    assert!(start.elapsed() >= Duration::from_secs(5));
    assert!(!outcome.is_healthy());

    let errors = sink.errors.lock();
    assert_eq!(errors.len(), 1);
    assert_eq!(
        errors[0].error_message,
        "Topic not publishing: B\nTopic not publishing: C"
    );
    assert!(sink.activities.lock().is_empty());
    assert_eq!(
        sink.statuses(),
        owned(&[("A", "1"), ("B", "0"), ("C", "0"), ("battery", "1")])
    );
}

#[tokio::test(start_paused = true)]
async fn test_cancellation_still_reports() {
    let bus = MemoryBus::new();
    let sink = Arc::new(RecordingSink::default());

    let outcome = create_test_monitor(&bus, sink.clone())
        .run(tokio::time::sleep(Duration::from_millis(750)))
        .await
        .unwrap();

    assert_eq!(outcome.exit, ExitReason::Cancelled);
    assert!(outcome.report.any_dead);
    assert_eq!(outcome.report.dead_channels().count(), 4);

    let errors = sink.errors.lock();
    assert_eq!(errors.len(), 1);
    assert_eq!(
        errors[0].error_message,
        "Topic not publishing: A\n\
         Topic not publishing: B\n\
         Topic not publishing: C\n\
         Topic not publishing: battery"
    );
    assert_eq!(sink.health_checks.lock().len(), 4);
    assert!(sink.activities.lock().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_cancellation_keeps_arrivals_so_far() {
    let bus = MemoryBus::new();
    let sink = Arc::new(RecordingSink::default());

    publish_after(&bus, Duration::from_millis(100), &["battery"]);

    let outcome = create_test_monitor(&bus, sink.clone())
        .run(tokio::time::sleep(Duration::from_millis(500)))
        .await
        .unwrap();

    assert_eq!(outcome.exit, ExitReason::Cancelled);
    assert_eq!(
        sink.statuses(),
        owned(&[("A", "0"), ("B", "0"), ("C", "0"), ("battery", "1")])
    );
}

#[tokio::test(start_paused = true)]
async fn test_repeated_arrivals_change_nothing() {
    let single_bus = MemoryBus::new();
    publish_after(&single_bus, Duration::from_millis(100), &["A", "C"]);
    let single = create_test_monitor(&single_bus, RecordingSink::default())
        .run(std::future::pending())
        .await
        .unwrap();

    let repeated_bus = MemoryBus::new();
    publish_after(
        &repeated_bus,
        Duration::from_millis(100),
        &["A", "A", "C", "A", "C", "C"],
    );
    publish_after(&repeated_bus, Duration::from_millis(900), &["A", "C"]);
    let repeated = create_test_monitor(&repeated_bus, RecordingSink::default())
        .run(std::future::pending())
        .await
        .unwrap();

    assert_eq!(single.report, repeated.report);
    assert_eq!(repeated_bus.delivered(), 8);
}

#[tokio::test(start_paused = true)]
async fn test_arrivals_after_finalization_are_ignored() {
    let bus = MemoryBus::new();
    let sink = Arc::new(RecordingSink::default());

    let outcome = create_test_monitor_with_deadline(&bus, sink.clone(), Duration::from_secs(1))
        .run(std::future::pending())
        .await
        .unwrap();

    // the monitor has released its subscriptions by now
    assert_eq!(bus.publish("A"), 0);
    assert_eq!(outcome.report.dead_channels().count(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_arrival_during_transport_shutdown_is_not_counted() {
    let transport = LateArrivalTransport::new("B");
    let delivered_late = transport.delivered_late.clone();
    let sink = Arc::new(RecordingSink::default());

    let outcome = create_test_monitor_over(transport, sink.clone(), Duration::from_secs(1))
        .run(std::future::pending())
        .await
        .unwrap();

    assert!(delivered_late.load(Ordering::SeqCst));
    assert_eq!(outcome.exit, ExitReason::TimedOut);
    assert_eq!(outcome.report.dead_channels().count(), 4);
    assert_eq!(
        sink.statuses(),
        owned(&[("A", "0"), ("B", "0"), ("C", "0"), ("battery", "0")])
    );
}

#[tokio::test(start_paused = true)]
async fn test_every_channel_reported_once_in_order() {
    let bus = MemoryBus::new();
    publish_after(&bus, Duration::from_millis(10), &["battery", "C"]);

    let outcome = create_test_monitor(&bus, RecordingSink::default())
        .run(std::future::pending())
        .await
        .unwrap();

    let channels: Vec<_> = outcome
        .report
        .verdicts
        .iter()
        .map(|v| v.channel.as_str())
        .collect();
    assert_eq!(channels, vec!["A", "B", "C", "battery"]);
}

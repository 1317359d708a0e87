//! Failure tests
//!
//! These tests verify that failures are handled the way they should be:
//! - Sink failures never escape a run
//! - Subscription failures abort a run before it starts

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use assert_matches::assert_matches;
use topic_monitor::{
    console,
    error::TransportError,
    reporter::SummaryKind,
    scheduler::ExitReason,
    transport::MemoryBus,
};

use crate::helpers::*;

#[tokio::test(start_paused = true)]
async fn test_failing_sink_does_not_fail_the_run() {
    let bus = MemoryBus::new();
    let sink = Arc::new(FailingSink::default());

    publish_after(&bus, Duration::from_millis(100), &["A", "B", "C"]);

    let outcome = create_test_monitor(&bus, sink.clone())
        .run(std::future::pending())
        .await
        .unwrap();

    assert_eq!(outcome.exit, ExitReason::TimedOut);
    assert_eq!(outcome.dispatch.health_checks_failed, 4);
    assert_eq!(outcome.dispatch.health_checks_sent, 0);
    assert_eq!(outcome.dispatch.summary, SummaryKind::Error);
    assert!(!outcome.dispatch.summary_delivered);

    // every record was still attempted exactly once
    assert_eq!(sink.calls.load(Ordering::SeqCst), 5);

    let rendered = console::render(&outcome.report, outcome.exit);
    assert!(rendered.contains("[      OK       ] A"));
    assert!(rendered.contains("[NOT PUBLISHING ] battery"));
}

#[tokio::test(start_paused = true)]
async fn test_failing_sink_with_healthy_channels() {
    let bus = MemoryBus::new();

    publish_after(&bus, Duration::from_millis(100), &["A", "B", "C", "battery"]);

    let outcome = create_test_monitor(&bus, FailingSink::default())
        .run(std::future::pending())
        .await
        .unwrap();

    assert!(outcome.is_healthy());
    assert_eq!(outcome.dispatch.summary, SummaryKind::Activity);
}

#[tokio::test(start_paused = true)]
async fn test_subscription_failure_is_fatal() {
    let bus = MemoryBus::new();
    bus.fail_subscriptions_to("C");
    let sink = Arc::new(RecordingSink::default());

    let result = create_test_monitor(&bus, sink.clone())
        .run(std::future::pending())
        .await;

    assert_matches!(result, Err(TransportError::Subscribe { channel, .. }) if channel == "C");

    // nothing is reported for a run that never started
    assert!(sink.health_checks.lock().is_empty());
    assert!(sink.errors.lock().is_empty());
    assert_eq!(bus.subscriber_count(), 0);
}

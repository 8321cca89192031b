// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Refresh Task Integration Tests
//!
//! Watchdog refresh cadence, rescheduling, failure trips and shutdown.
//! All tests run on paused time.

use std::sync::Arc;
use std::time::Duration;

use brbc_modbus::registers::{PROCESS_DATA, WATCHDOG_RESET};
use brbc_modbus::{BcError, ExceptionKind, LinkState};
use brbc_tests::prelude::*;
use tokio::time::sleep;

/// Threshold of 200ms gives a 100ms refresh period.
async fn harness_with_threshold(threshold_ms: u16) -> Harness {
    init_test_logging();
    let harness = Harness::new(RackFixtures::small());
    harness.sim.set_watchdog_threshold(threshold_ms);
    harness.connect().await.unwrap();
    harness
}

// =============================================================================
// Cadence
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_refresh_resets_watchdog_every_period() {
    let harness = harness_with_threshold(200).await;
    assert_eq!(harness.client.refresh_period(), Duration::from_millis(100));
    assert!(harness.client.last_refresh().is_none());

    let before = harness.sim.watchdog_resets();
    sleep(Duration::from_millis(1050)).await;
    let ticks = harness.sim.watchdog_resets() - before;

    assert!((9..=11).contains(&ticks), "ticks = {ticks}");
    assert!(harness.client.last_refresh().is_some());
    assert!(harness.client.stats().refresh_ticks() >= 9);
    assert_eq!(harness.client.stats().refresh_failures(), 0);

    harness.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_first_tick_after_one_period() {
    let harness = harness_with_threshold(1000).await;

    sleep(Duration::from_millis(450)).await;
    assert_eq!(harness.sim.watchdog_resets(), 0);

    sleep(Duration::from_millis(100)).await;
    assert_eq!(harness.sim.watchdog_resets(), 1);

    harness.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_reset_reschedules_from_new_threshold() {
    let harness = harness_with_threshold(200).await;

    harness.sim.set_watchdog_threshold(1000);
    let period = harness.client.watchdog_reset().await.unwrap();
    assert_eq!(period, Duration::from_millis(500));

    let before = harness.sim.watchdog_resets();
    sleep(Duration::from_millis(1050)).await;
    let ticks = harness.sim.watchdog_resets() - before;
    assert!((1..=3).contains(&ticks), "ticks = {ticks}");

    harness.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_refresh_interval_override() {
    let harness = harness_with_threshold(200).await;

    harness
        .client
        .set_refresh_interval(Duration::from_millis(300))
        .await
        .unwrap();

    let before = harness.sim.watchdog_resets();
    sleep(Duration::from_millis(950)).await;
    let ticks = harness.sim.watchdog_resets() - before;
    assert!((2..=4).contains(&ticks), "ticks = {ticks}");

    harness.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_refresh_interleaves_with_calls() {
    let harness = harness_with_threshold(200).await;
    harness.sim.set_latency(Duration::from_millis(10));

    for _ in 0..30 {
        harness.client.read_digital_inputs(2, 4, 0).await.unwrap();
        sleep(Duration::from_millis(20)).await;
    }
    assert!(harness.sim.watchdog_resets() >= 5);
    assert!(harness.client.is_connected());

    harness.sim.set_latency(Duration::ZERO);
    harness.shutdown().await;
}

// =============================================================================
// Failures
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_single_failed_tick_is_tolerated() {
    let harness = harness_with_threshold(200).await;
    harness.sim.inject_exception_once(PROCESS_DATA, 6);

    sleep(Duration::from_millis(550)).await;
    assert_eq!(harness.client.state(), LinkState::Connected);
    assert_eq!(harness.client.stats().refresh_failures(), 1);
    assert!(harness.client.read_digital_inputs(1, 2, 0).await.is_ok());

    harness.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_non_consecutive_failures_do_not_trip() {
    let harness = harness_with_threshold(200).await;

    // Inject between ticks: two failures, then recovery.
    sleep(Duration::from_millis(50)).await;
    for _ in 0..4 {
        harness.sim.inject_exception_once(WATCHDOG_RESET, 4);
        harness.sim.inject_exception_once(PROCESS_DATA, 6);
        sleep(Duration::from_millis(400)).await;
    }
    assert_eq!(harness.client.stats().refresh_failures(), 8);

    assert_eq!(harness.client.state(), LinkState::Connected);
    assert_eq!(harness.client.stats().watchdog_trips(), 0);

    harness.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_consecutive_failures_trip_the_watchdog() {
    let harness = harness_with_threshold(200).await;
    harness.sim.set_link_down(true);

    sleep(Duration::from_millis(350)).await;
    assert_eq!(harness.client.state(), LinkState::Disconnected);
    assert_eq!(harness.client.stats().watchdog_trips(), 1);
    assert_eq!(harness.sim.open_connections(), 0);

    // Reported once, then plain "not connected".
    let err = harness.client.read_digital_inputs(1, 2, 0).await.unwrap_err();
    assert!(matches!(err, BcError::Watchdog { failures: 3, .. }));
    assert_eq!(err.code(), 1);

    let err = harness.client.read_digital_inputs(1, 2, 0).await.unwrap_err();
    assert_eq!(err.kind(), ExceptionKind::Connection);

    harness.sim.set_link_down(false);
    harness.connect().await.unwrap();
    assert!(harness.client.is_connected());

    harness.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_trip_after_configured_failures() {
    init_test_logging();
    let config = brbc_modbus::BusControllerConfig {
        max_tick_failures: 5,
        ..ConfigFixtures::fast()
    };
    let harness = Harness::with_config(RackFixtures::small(), config);
    harness.sim.set_watchdog_threshold(200);
    harness.connect().await.unwrap();

    harness.sim.inject_exception(WATCHDOG_RESET, 4);

    sleep(Duration::from_millis(450)).await;
    assert!(harness.client.is_connected());

    sleep(Duration::from_millis(100)).await;
    assert!(!harness.client.is_connected());

    let err = harness.client.module_status(1).await.unwrap_err();
    assert!(matches!(err, BcError::Watchdog { failures: 5, .. }));

    harness.sim.clear_exceptions();
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_clears_pending_trip() {
    let harness = harness_with_threshold(200).await;
    harness.sim.set_link_down(true);
    sleep(Duration::from_millis(350)).await;
    assert_eq!(harness.client.stats().watchdog_trips(), 1);

    harness.client.disconnect().await;
    let err = harness.client.read_digital_inputs(1, 2, 0).await.unwrap_err();
    assert_eq!(err.kind(), ExceptionKind::Connection);
}

#[tokio::test(start_paused = true)]
async fn test_link_fault_from_call_stops_refresh() {
    let harness = harness_with_threshold(200).await;
    harness.sim.set_link_down(true);

    let err = harness.client.read_digital_inputs(1, 2, 0).await.unwrap_err();
    assert!(err.is_link_fault());
    assert_eq!(harness.client.state(), LinkState::Faulted);

    // The next tick closes the transport instead of counting failures.
    sleep(Duration::from_millis(150)).await;
    assert_eq!(harness.client.state(), LinkState::Disconnected);
    assert_eq!(harness.sim.open_connections(), 0);
    assert_eq!(harness.client.stats().watchdog_trips(), 0);

    harness.sim.set_link_down(false);
}

// =============================================================================
// Shutdown
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_disconnect_stops_refresh() {
    let harness = harness_with_threshold(200).await;
    sleep(Duration::from_millis(250)).await;

    harness.client.disconnect().await;
    let resets = harness.sim.watchdog_resets();

    sleep(Duration::from_secs(2)).await;
    assert_eq!(harness.sim.watchdog_resets(), resets);
    assert_eq!(harness.client.state(), LinkState::Disconnected);
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_waits_for_tick_in_flight() {
    let harness = harness_with_threshold(200).await;
    harness.sim.set_latency(Duration::from_millis(50));

    let sim = harness.sim.clone();
    assert!(wait_until(Duration::from_secs(1), || sim.in_flight() > 0).await);

    harness.client.disconnect().await;
    assert_eq!(harness.sim.in_flight(), 0);
    assert_eq!(harness.sim.open_connections(), 0);
    assert_eq!(harness.client.state(), LinkState::Disconnected);

    let ops = harness.sim.total_ops();
    sleep(Duration::from_secs(1)).await;
    assert_eq!(harness.sim.total_ops(), ops);
}

#[tokio::test(start_paused = true)]
async fn test_dropping_the_client_stops_refresh() {
    let harness = harness_with_threshold(200).await;
    let sim = harness.sim.clone();
    drop(harness);

    sleep(Duration::from_millis(50)).await;
    let resets = sim.watchdog_resets();
    sleep(Duration::from_secs(1)).await;
    assert_eq!(sim.watchdog_resets(), resets);
}

#[tokio::test(start_paused = true)]
async fn test_shared_client_across_tasks() {
    let harness = harness_with_threshold(200).await;
    let client = Arc::clone(&harness.client);

    let reader = tokio::spawn(async move {
        for _ in 0..10 {
            client.read_digital_inputs(2, 4, 0).await?;
            sleep(Duration::from_millis(70)).await;
        }
        Ok::<_, BcError>(())
    });

    reader.await.unwrap().unwrap();
    assert!(harness.sim.watchdog_resets() >= 5);

    harness.shutdown().await;
}

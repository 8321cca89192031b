// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Process Data Integration Tests
//!
//! Digital and analog reads and writes through the module directory.
//!
//! ## Test Categories
//!
//! - `test_digital_*`: discrete inputs and coils
//! - `test_analog_*`: input and holding registers
//! - `test_window_*`: channel window validation
//! - `test_answer_*`: malformed or failed controller answers

use std::sync::Arc;

use brbc_modbus::ExceptionKind;
use brbc_tests::prelude::*;

// =============================================================================
// Digital
// =============================================================================

#[tokio::test]
async fn test_digital_inputs_use_module_index() {
    init_test_logging();
    let harness = Harness::new(RackFixtures::small()).connected().await;

    // Module 2 starts at bit 2.
    harness.sim.set_digital_input(3, true);
    harness.sim.set_digital_input(5, true);

    let bits = harness.client.read_digital_inputs(2, 4, 0).await.unwrap();
    assert_eq!(bits, vec![false, true, false, true]);

    let bits = harness.client.read_digital_inputs(2, 2, 1).await.unwrap();
    assert_eq!(bits, vec![true, false]);

    let bits = harness.client.read_digital_inputs(1, 2, 0).await.unwrap();
    assert_eq!(bits, vec![false, false]);

    harness.shutdown().await;
}

#[tokio::test]
async fn test_digital_outputs_round_trip() {
    let harness = Harness::new(RackFixtures::small()).connected().await;

    harness
        .client
        .write_digital_outputs(3, &[true, false, true], 1)
        .await
        .unwrap();
    assert_eq!(harness.sim.digital_outputs(), vec![false, true, false, true]);

    let bits = harness.client.read_digital_outputs(3, 4, 0).await.unwrap();
    assert_eq!(bits, vec![false, true, false, true]);

    harness.shutdown().await;
}

#[tokio::test]
async fn test_digital_outputs_in_mixed_rack() {
    let harness = Harness::new(RackFixtures::mixed()).connected().await;

    let mut pattern = vec![false; 12];
    pattern[0] = true;
    pattern[11] = true;
    harness.client.write_digital_outputs(2, &pattern, 0).await.unwrap();

    assert_eq!(harness.sim.digital_outputs(), pattern);
    assert_eq!(harness.client.read_digital_outputs(2, 12, 0).await.unwrap(), pattern);

    harness.shutdown().await;
}

#[tokio::test]
async fn test_digital_no_data_kinds() {
    let harness = Harness::new(RackFixtures::small()).connected().await;
    let before = harness.sim.ops();

    let err = harness.client.read_digital_inputs(3, 1, 0).await.unwrap_err();
    assert_eq!(err.kind(), ExceptionKind::NoDigInData);
    assert_eq!(err.code(), 11);

    let err = harness.client.read_digital_outputs(1, 1, 0).await.unwrap_err();
    assert_eq!(err.kind(), ExceptionKind::NoDigOutData);
    assert_eq!(err.code(), 12);

    let err = harness
        .client
        .write_digital_outputs(2, &[true], 0)
        .await
        .unwrap_err();
    assert_eq!(err.code(), 12);

    let after = harness.sim.ops();
    assert_eq!(after.read_discrete_inputs, before.read_discrete_inputs);
    assert_eq!(after.read_coils, before.read_coils);
    assert_eq!(after.write_multiple_coils, before.write_multiple_coils);

    harness.shutdown().await;
}

// =============================================================================
// Analog
// =============================================================================

#[tokio::test]
async fn test_analog_inputs_signed_and_unsigned() {
    let harness = Harness::new(RackFixtures::mixed()).connected().await;

    // X20AI4622 at word 0, X20AT4222 at word 4.
    harness.sim.set_analog_input(1, 0xFFFF);
    harness.sim.set_analog_input(2, 0x7FFF);
    harness.sim.set_analog_input(5, 0xFFFF);

    let signed = harness.client.read_analog_inputs(3, 3, 0).await.unwrap();
    assert_eq!(signed, vec![0, -1, 32767]);

    let unsigned = harness.client.read_analog_inputs(5, 2, 0).await.unwrap();
    assert_eq!(unsigned, vec![0, 65535]);

    harness.shutdown().await;
}

#[tokio::test]
async fn test_analog_outputs_round_trip() {
    let harness = Harness::new(RackFixtures::mixed()).connected().await;

    harness
        .client
        .write_analog_outputs(4, &[1200, -300], 1)
        .await
        .unwrap();
    assert_eq!(harness.sim.analog_outputs(), vec![0, 1200, (-300i16) as u16, 0]);

    let values = harness.client.read_analog_outputs(4, 4, 0).await.unwrap();
    assert_eq!(values, vec![0, 1200, -300, 0]);

    harness.shutdown().await;
}

#[tokio::test]
async fn test_analog_value_out_of_range() {
    let harness = Harness::new(RackFixtures::mixed()).connected().await;
    let before = harness.sim.ops().write_multiple_registers;

    for value in [40_000, -40_000] {
        let err = harness
            .client
            .write_analog_outputs(4, &[0, value], 0)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ExceptionKind::DataRange);
    }

    assert_eq!(harness.sim.ops().write_multiple_registers, before);
    assert_eq!(harness.sim.analog_outputs(), vec![0; 4]);

    harness.shutdown().await;
}

#[tokio::test]
async fn test_analog_no_data_kinds() {
    let harness = Harness::new(RackFixtures::mixed()).connected().await;

    let err = harness.client.read_analog_inputs(1, 1, 0).await.unwrap_err();
    assert_eq!(err.code(), 13);

    let err = harness.client.write_analog_outputs(3, &[1], 0).await.unwrap_err();
    assert_eq!(err.code(), 14);

    let err = harness.client.read_analog_outputs(6, 1, 0).await.unwrap_err();
    assert_eq!(err.kind(), ExceptionKind::NoAnaOutData);

    harness.shutdown().await;
}

// =============================================================================
// Window validation
// =============================================================================

#[tokio::test]
async fn test_window_beyond_declared_size() {
    let harness = Harness::new(RackFixtures::small()).connected().await;
    let before = harness.sim.ops();

    let err = harness.client.read_digital_inputs(1, 3, 0).await.unwrap_err();
    assert_eq!(err.kind(), ExceptionKind::DataRange);
    assert_eq!(err.code(), 20);

    let err = harness.client.read_digital_inputs(2, 2, 3).await.unwrap_err();
    assert_eq!(err.code(), 20);

    let err = harness
        .client
        .write_digital_outputs(3, &[true; 5], 0)
        .await
        .unwrap_err();
    assert_eq!(err.code(), 20);
    assert_eq!(harness.sim.digital_outputs(), vec![false; 4]);

    let after = harness.sim.ops();
    assert_eq!(after.read_discrete_inputs, before.read_discrete_inputs);
    assert_eq!(after.write_multiple_coils, before.write_multiple_coils);

    harness.shutdown().await;
}

#[tokio::test]
async fn test_window_zero_size() {
    let harness = Harness::new(RackFixtures::small()).connected().await;

    let err = harness.client.read_digital_inputs(2, 0, 0).await.unwrap_err();
    assert_eq!(err.kind(), ExceptionKind::DataSize);
    assert_eq!(err.code(), 16);

    let err = harness.client.write_digital_outputs(3, &[], 0).await.unwrap_err();
    assert_eq!(err.code(), 16);

    harness.shutdown().await;
}

#[tokio::test]
async fn test_window_at_end_of_module() {
    let harness = Harness::new(RackFixtures::small()).connected().await;
    harness.sim.set_digital_input(5, true);

    let bits = harness.client.read_digital_inputs(2, 1, 3).await.unwrap();
    assert_eq!(bits, vec![true]);

    harness.shutdown().await;
}

// =============================================================================
// Controller answers
// =============================================================================

#[tokio::test]
async fn test_answer_exception_codes() {
    let harness = Harness::new(RackFixtures::small()).connected().await;

    let cases = [
        (4, ExceptionKind::Device),
        (6, ExceptionKind::Busy),
        (2, ExceptionKind::Unhandled),
    ];
    for (code, kind) in cases {
        harness.sim.inject_exception_once(2, code);
        let err = harness.client.read_digital_inputs(2, 1, 0).await.unwrap_err();
        assert_eq!(err.kind(), kind, "exception code {code}");
        assert!(harness.client.is_connected());
    }

    harness.shutdown().await;
}

#[tokio::test]
async fn test_answer_illegal_value_on_write() {
    let harness = Harness::new(RackFixtures::small()).connected().await;
    harness.sim.inject_exception_once(0, 3);

    let err = harness
        .client
        .write_digital_outputs(3, &[true], 0)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ExceptionKind::WrongRegData);
    assert_eq!(err.code(), 15);

    harness.shutdown().await;
}

#[tokio::test]
async fn test_answer_wrong_write_ack() {
    let harness = Harness::new(RackFixtures::mixed()).connected().await;
    harness.sim.set_bad_acks(true);

    let err = harness.client.write_analog_outputs(4, &[1, 2], 0).await.unwrap_err();
    assert_eq!(err.kind(), ExceptionKind::WrongRegData);

    harness.sim.set_bad_acks(false);
    harness.shutdown().await;
}

#[tokio::test]
async fn test_answer_short_and_empty() {
    let harness = Harness::new(RackFixtures::small()).connected().await;

    harness.sim.set_short_reads(true);
    let err = harness.client.read_digital_inputs(2, 4, 0).await.unwrap_err();
    assert_eq!(err.kind(), ExceptionKind::DataSize);
    harness.sim.set_short_reads(false);

    harness.sim.set_empty_reads(true);
    let err = harness.client.read_digital_inputs(2, 4, 0).await.unwrap_err();
    assert_eq!(err.kind(), ExceptionKind::DataEmptyAnswer);
    assert_eq!(err.code(), 17);
    harness.sim.set_empty_reads(false);

    assert!(harness.client.read_digital_inputs(2, 4, 0).await.is_ok());

    harness.shutdown().await;
}

// =============================================================================
// Concurrency
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_callers_share_the_link() {
    let harness = Harness::new(RackFixtures::mixed()).connected().await;
    harness.sim.set_digital_input(7, true);

    let mut tasks = Vec::new();
    for i in 0..16u16 {
        let client = Arc::clone(&harness.client);
        tasks.push(tokio::spawn(async move {
            if i % 2 == 0 {
                client.read_digital_inputs(1, 12, 0).await.map(|bits| bits[7])
            } else {
                client
                    .write_analog_outputs(4, &[i32::from(i)], 0)
                    .await
                    .map(|()| true)
            }
        }));
    }

    for task in tasks {
        assert!(task.await.unwrap().unwrap());
    }
    assert!(harness.client.is_connected());

    harness.shutdown().await;
}

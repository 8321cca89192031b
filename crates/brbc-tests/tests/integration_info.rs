// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Controller Info Integration Tests
//!
//! Typed controller registers, field writes and command sequences.

use std::net::Ipv4Addr;
use std::time::Duration;

use brbc_modbus::registers::{
    info_field, CMD_OFF, CMD_ON, CTRL_CLOSE, CTRL_ERASE, CTRL_LOAD, CTRL_REBOOT, CTRL_RESET_CFG,
    CTRL_RESET_CFG_CHANGED, CTRL_RESET_CFG_CONFIRM, CTRL_SAVE, WATCHDOG_THRESHOLD,
};
use brbc_modbus::{ControllerCommand, ExceptionKind, InfoGroup, InfoValue};
use brbc_tests::prelude::*;

const CTRL_REGISTERS: [u16; 8] = [
    CTRL_SAVE,
    CTRL_LOAD,
    CTRL_ERASE,
    CTRL_REBOOT,
    CTRL_CLOSE,
    CTRL_RESET_CFG,
    CTRL_RESET_CFG_CONFIRM,
    CTRL_RESET_CFG_CHANGED,
];

fn command_writes(sim: &SimulatedController) -> Vec<(u16, u16)> {
    sim.register_writes()
        .into_iter()
        .filter(|(address, _)| CTRL_REGISTERS.contains(address))
        .collect()
}

// =============================================================================
// Reads
// =============================================================================

#[tokio::test]
async fn test_read_typed_fields() {
    init_test_logging();
    let harness = Harness::new(RackFixtures::small()).connected().await;
    let sim = &harness.sim;

    sim.set_registers(0x1013, &[192, 168, 100, 1]);
    sim.set_registers(0x1000, &[0x0060, 0x6512, 0x3456]);
    sim.set_registers(0x1080, &[12, 345, 6]);
    sim.set_registers(0x10C1, &[1, 2]);
    sim.set_register(0x1184, CMD_ON);

    let info = harness.client.info();
    assert_eq!(info.com_ip().await.unwrap(), Ipv4Addr::new(192, 168, 100, 1));
    assert_eq!(info.com_mac().await.unwrap(), [0x00, 0x60, 0x65, 0x12, 0x34, 0x56]);
    assert_eq!(info.productdata_serial().await.unwrap(), "012345006");
    assert_eq!(
        info.get("modbus_global_tel_cnt").await.unwrap(),
        InfoValue::DWord(65538)
    );
    assert_eq!(info.get("misc_cfg_changed").await.unwrap(), InfoValue::Flag(true));
    assert_eq!(info.get("com_mac").await.unwrap().to_string(), "00-60-65-12-34-56");

    harness.shutdown().await;
}

#[tokio::test]
async fn test_reads_are_live() {
    let harness = Harness::new(RackFixtures::small()).connected().await;

    harness.sim.set_register(0x1041, 10);
    assert_eq!(
        harness.client.info().get("watchdog_elapsed").await.unwrap(),
        InfoValue::Word(10)
    );

    harness.sim.set_register(0x1041, 20);
    assert_eq!(
        harness.client.info().get("watchdog_elapsed").await.unwrap(),
        InfoValue::Word(20)
    );

    harness.shutdown().await;
}

#[tokio::test]
async fn test_read_all_of_group() {
    let harness = Harness::new(RackFixtures::small()).connected().await;

    let entries = harness
        .client
        .info()
        .read_all(Some(InfoGroup::Watchdog))
        .await
        .unwrap();
    let names: Vec<&str> = entries.iter().map(|e| e.field.name).collect();
    assert_eq!(
        names,
        vec!["watchdog_threshold", "watchdog_elapsed", "watchdog_status", "watchdog_mode"]
    );
    assert!(entries.iter().all(|e| e.value.is_ok()));

    harness.shutdown().await;
}

#[tokio::test]
async fn test_read_all_reports_field_failures() {
    let harness = Harness::new(RackFixtures::small()).connected().await;
    harness.sim.inject_exception(0x1041, 2);

    let entries = harness
        .client
        .info()
        .read_all(Some(InfoGroup::Watchdog))
        .await
        .unwrap();
    let failed: Vec<&str> = entries
        .iter()
        .filter(|e| e.value.is_err())
        .map(|e| e.field.name)
        .collect();
    assert_eq!(failed, vec!["watchdog_elapsed"]);

    harness.sim.clear_exceptions();
    harness.shutdown().await;
}

#[tokio::test]
async fn test_read_all_fields() {
    let harness = Harness::new(RackFixtures::small()).connected().await;

    let entries = harness.client.info().read_all(None).await.unwrap();
    assert_eq!(entries.len(), brbc_modbus::registers::INFO_FIELDS.len());
    assert!(entries.iter().all(|e| e.value.is_ok()));

    harness.shutdown().await;
}

#[tokio::test]
async fn test_read_all_aborts_on_link_fault() {
    let harness = Harness::new(RackFixtures::small()).connected().await;
    harness.sim.set_link_down(true);

    let err = harness.client.info().read_all(None).await.unwrap_err();
    assert!(err.is_link_fault());

    harness.sim.set_link_down(false);
    harness.shutdown().await;
}

#[tokio::test]
async fn test_unknown_field() {
    let harness = Harness::new(RackFixtures::small()).connected().await;

    let err = harness.client.info().get("com_speed").await.unwrap_err();
    assert_eq!(err.kind(), ExceptionKind::Unhandled);

    harness.shutdown().await;
}

// =============================================================================
// Writes
// =============================================================================

#[tokio::test]
async fn test_write_word_field() {
    let harness = Harness::new(RackFixtures::small()).connected().await;

    harness
        .client
        .info()
        .set("misc_init_delay", InfoValue::Word(250))
        .await
        .unwrap();
    assert_eq!(harness.sim.register(0x1181), Some(250));

    harness.shutdown().await;
}

#[tokio::test]
async fn test_write_multi_register_field() {
    let harness = Harness::new(RackFixtures::small()).connected().await;
    let field = info_field("com_ip_flash").unwrap();

    let value = InfoValue::parse(field.kind, "10.0.0.42").unwrap();
    harness.client.info().set("com_ip_flash", value).await.unwrap();

    let words: Vec<Option<u16>> = (0..4).map(|i| harness.sim.register(field.address + i)).collect();
    assert_eq!(words, vec![Some(10), Some(0), Some(0), Some(42)]);
    assert!(harness.sim.ops().write_multiple_registers >= 1);

    harness.shutdown().await;
}

#[tokio::test]
async fn test_write_flag_field() {
    let harness = Harness::new(RackFixtures::small()).connected().await;

    harness
        .client
        .info()
        .set("misc_cfg_changed", InfoValue::Flag(false))
        .await
        .unwrap();
    assert_eq!(harness.sim.register(0x1184), Some(CMD_OFF));

    harness.shutdown().await;
}

#[tokio::test]
async fn test_write_read_only_field_is_rejected() {
    let harness = Harness::new(RackFixtures::small()).connected().await;

    let err = harness
        .client
        .info()
        .set("com_ip", InfoValue::Ipv4(Ipv4Addr::new(10, 0, 0, 1)))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ExceptionKind::Unhandled);
    assert!(!harness.sim.written_addresses().contains(&0x1013));

    harness.shutdown().await;
}

#[tokio::test]
async fn test_write_value_of_wrong_kind() {
    let harness = Harness::new(RackFixtures::small()).connected().await;

    let err = harness
        .client
        .info()
        .set("com_port", InfoValue::Flag(true))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ExceptionKind::Unhandled);

    harness.shutdown().await;
}

// =============================================================================
// Watchdog
// =============================================================================

#[tokio::test]
async fn test_watchdog_threshold_and_reset() {
    let harness = Harness::new(RackFixtures::small()).connected().await;
    let info = harness.client.info();

    info.set_watchdog_threshold(400).await.unwrap();
    assert_eq!(harness.sim.register(WATCHDOG_THRESHOLD), Some(400));
    assert_eq!(info.watchdog_threshold().await.unwrap(), 400);

    // The period only changes on reset.
    assert_eq!(harness.client.refresh_period(), Duration::from_millis(100));

    let resets = harness.sim.watchdog_resets();
    let period = info.watchdog_reset().await.unwrap();
    assert_eq!(period, Duration::from_millis(200));
    assert_eq!(harness.client.refresh_period(), period);
    assert!(harness.sim.watchdog_resets() > resets);

    harness.shutdown().await;
}

#[tokio::test]
async fn test_modbus_refresh_override() {
    let harness = Harness::new(RackFixtures::small()).connected().await;
    let info = harness.client.info();

    let err = info.set_modbus_refresh(Duration::from_millis(5)).await.unwrap_err();
    assert_eq!(err.kind(), ExceptionKind::Unhandled);
    assert_eq!(info.modbus_refresh(), Duration::from_millis(100));

    info.set_modbus_refresh(Duration::from_millis(250)).await.unwrap();
    assert_eq!(info.modbus_refresh(), Duration::from_millis(250));

    harness.shutdown().await;
}

// =============================================================================
// Commands
// =============================================================================

#[tokio::test]
async fn test_single_write_commands() {
    let harness = Harness::new(RackFixtures::small()).connected().await;
    let info = harness.client.info();

    info.ctrl_save().await.unwrap();
    info.ctrl_load().await.unwrap();
    info.execute(ControllerCommand::Close).await.unwrap();

    assert_eq!(
        command_writes(&harness.sim),
        vec![(CTRL_SAVE, CMD_ON), (CTRL_LOAD, CMD_ON), (CTRL_CLOSE, CMD_ON)]
    );

    harness.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_reset_cfg_sequence() {
    let harness = Harness::new(RackFixtures::small()).connected().await;

    let started = tokio::time::Instant::now();
    harness.client.info().ctrl_reset_cfg().await.unwrap();
    assert!(started.elapsed() >= Duration::from_millis(2090));

    assert_eq!(
        command_writes(&harness.sim),
        vec![
            (CTRL_RESET_CFG, CMD_OFF),
            (CTRL_RESET_CFG_CONFIRM, CMD_ON),
            (CTRL_RESET_CFG_CHANGED, CMD_OFF),
            (CTRL_SAVE, CMD_ON),
            (CTRL_REBOOT, CMD_ON),
        ]
    );

    harness.shutdown().await;
}

#[tokio::test]
async fn test_command_failure_stops_sequence() {
    let harness = Harness::new(RackFixtures::small()).connected().await;
    harness.sim.inject_exception(CTRL_RESET_CFG_CONFIRM, 4);

    let err = harness
        .client
        .info()
        .execute(ControllerCommand::ResetCfg)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ExceptionKind::Device);
    assert_eq!(command_writes(&harness.sim), vec![(CTRL_RESET_CFG, CMD_OFF)]);

    harness.sim.clear_exceptions();
    harness.shutdown().await;
}

#[test]
fn test_command_names_parse() {
    for command in ControllerCommand::ALL {
        assert_eq!(command.name().parse::<ControllerCommand>().unwrap(), command);
    }
    assert_eq!(
        "RESET_CFG".parse::<ControllerCommand>().unwrap(),
        ControllerCommand::ResetCfg
    );
}

// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Module Directory Integration Tests
//!
//! Enumeration of the simulated bus, catalog lookup and topology changes.

use std::sync::Arc;
use std::time::Duration;

use brbc_modbus::registers::{module_base, INDEX_ABSENT};
use brbc_modbus::{
    BusController, ChannelIndices, ChannelKind, ChannelLayout, ExceptionKind, ModuleRegister,
    ModuleStatus, StaticCatalog,
};
use brbc_tests::prelude::*;

// =============================================================================
// Enumeration
// =============================================================================

#[tokio::test]
async fn test_enumeration_names_and_indices() {
    init_test_logging();
    let harness = Harness::new(RackFixtures::small()).connected().await;
    let directory = harness.client.modules();

    let names: Vec<&str> = directory.iter().map(|m| m.name.as_str()).collect();
    assert_eq!(names, vec!["X20DI2371", "X20DI4371", "X20DO4322"]);

    let di: Vec<u16> = directory.iter().map(|m| m.digital_in_index()).collect();
    assert_eq!(di, vec![0, 2, 6]);
    assert_eq!(directory.get(3).unwrap().digital_out_index(), 0);

    for module in directory.iter() {
        assert_eq!(module.status, ModuleStatus::Ok);
        assert!(module.condition.is_none());
        assert!(module.config.is_some());
    }

    assert_eq!(directory.total_size(ChannelKind::DigitalIn), 6);
    assert_eq!(directory.total_size(ChannelKind::DigitalOut), 4);
    assert!(directory.enumerated_at().is_some());

    harness.shutdown().await;
}

#[tokio::test]
async fn test_enumeration_reports_controller_counts() {
    let harness = Harness::new(RackFixtures::mixed()).connected().await;
    let image = *harness.client.modules().process_image();

    assert_eq!(image.modules, 6);
    assert_eq!(image.digital_inp_cnt, 1);
    assert_eq!(image.digital_inp_size, 12);
    assert_eq!(image.digital_out_size, 12);
    assert_eq!(image.analog_inp_cnt, 2);
    assert_eq!(image.analog_inp_size, 8);
    assert_eq!(image.analog_out_size, 4);

    assert_eq!(harness.client.info().process_data().await.unwrap(), image);

    harness.shutdown().await;
}

#[tokio::test]
async fn test_enumeration_indices_match_controller() {
    let harness = Harness::new(RackFixtures::mixed()).connected().await;

    for module in harness.client.modules().iter() {
        let reported = module.reported_indices.unwrap();
        for kind in ChannelKind::ALL {
            if module.has(kind) {
                assert_eq!(reported.get(kind), module.indices.get(kind), "{} {kind}", module.name);
            } else {
                assert_eq!(reported.get(kind), INDEX_ABSENT);
            }
        }
    }

    let at = harness.client.module(5).unwrap();
    assert_eq!(at.analog_in_index(), 4);
    assert_eq!(
        at.indices,
        ChannelIndices {
            digital_in: 12,
            digital_out: 12,
            analog_in: 4,
            analog_out: 4,
        }
    );

    harness.shutdown().await;
}

#[tokio::test]
async fn test_enumeration_serial_and_config() {
    let harness = Harness::new(vec![
        RackFixtures::module(ID_DI2371).with_serial(123, 45),
        RackFixtures::module(ID_DO4322),
    ])
    .connected()
    .await;

    let module = harness.client.module(1).unwrap();
    assert_eq!(module.serial.as_deref(), Some(format!("{ID_DI2371}123045").as_str()));
    assert_eq!(module.config.unwrap().hw, ID_DI2371);

    assert_eq!(
        harness.client.module_serial(1).await.unwrap(),
        module.serial.unwrap()
    );

    harness.shutdown().await;
}

#[tokio::test]
async fn test_enumeration_is_idempotent() {
    let harness = Harness::new(RackFixtures::mixed()).connected().await;
    let first = harness.client.modules();

    let second = harness.client.master_md_info().await.unwrap();
    assert!(first.same_topology(&second));
    assert_eq!(first.indices(), second.indices());
    assert!(!Arc::ptr_eq(&first, &harness.client.modules()));

    harness.shutdown().await;
}

#[tokio::test]
async fn test_enumeration_empty_bus() {
    let harness = Harness::new(Vec::new()).connected().await;

    assert!(harness.client.modules().is_empty());
    let err = harness.client.read_digital_inputs(1, 1, 0).await.unwrap_err();
    assert_eq!(err.kind(), ExceptionKind::NoModule);

    harness.shutdown().await;
}

// =============================================================================
// Catalog lookup
// =============================================================================

#[tokio::test]
async fn test_unknown_id_has_no_channels() {
    let harness = Harness::new(vec![
        RackFixtures::module(ID_DI2371),
        SimModule::new(ID_UNKNOWN, ChannelLayout::new(8, 0, 0, 0)),
        RackFixtures::module(ID_DI4371),
    ])
    .connected()
    .await;

    let unknown = harness.client.module(2).unwrap();
    assert_eq!(unknown.name, format!("unknown ({ID_UNKNOWN})"));
    assert_eq!(unknown.layout, ChannelLayout::EMPTY);

    // Following modules are indexed as if the unknown one had no channels.
    assert_eq!(harness.client.module(3).unwrap().digital_in_index(), 2);

    let err = harness.client.read_digital_inputs(2, 1, 0).await.unwrap_err();
    assert_eq!(err.kind(), ExceptionKind::NoDigInData);
    assert_eq!(err.code(), 11);

    harness.shutdown().await;
}

#[tokio::test]
async fn test_empty_catalog_reports_every_module_unknown() {
    let sim = SimulatedController::with_modules(RackFixtures::small());
    let client = BusController::new(sim.transport(), ConfigFixtures::fast()).unwrap();

    client.connect(SIM_HOST, SIM_PORT).await.unwrap();
    assert!(client.modules().iter().all(|m| m.name.starts_with("unknown (")));
    assert_eq!(client.modules().total_size(ChannelKind::DigitalIn), 0);

    client.disconnect().await;
}

#[tokio::test]
async fn test_catalog_from_hwlist() {
    let catalog = StaticCatalog::from_hwlist_str(&CatalogFixtures::hwlist()).unwrap();
    let harness = Harness::build(
        SimulatedController::with_modules(RackFixtures::small()),
        ConfigFixtures::fast(),
        Arc::new(catalog),
    )
    .connected()
    .await;

    assert_eq!(harness.client.module(3).unwrap().name, "X20DO4322");
    assert_eq!(harness.client.module(3).unwrap().layout.digital_out, 4);

    harness.shutdown().await;
}

// =============================================================================
// Faulted modules
// =============================================================================

#[tokio::test]
async fn test_module_in_error_state() {
    let harness = Harness::new(vec![
        RackFixtures::module(ID_DI2371).with_status(3),
        RackFixtures::module(ID_DI4371),
    ])
    .connected()
    .await;

    let module = harness.client.module(1).unwrap();
    assert_eq!(module.status, ModuleStatus::Error);
    assert_eq!(module.condition, Some(ExceptionKind::Device));
    assert_eq!(harness.client.module_status(1).await.unwrap(), ModuleStatus::Error);
    assert!(harness.client.module(2).unwrap().condition.is_none());

    harness.shutdown().await;
}

#[tokio::test]
async fn test_unreadable_module_block_does_not_abort_enumeration() {
    let harness = Harness::new(RackFixtures::small());
    harness.sim.inject_exception(module_base(2).unwrap(), 2);

    harness.connect().await.unwrap();
    let directory = harness.client.modules();
    assert_eq!(directory.len(), 3);

    let broken = directory.get(2).unwrap();
    assert_eq!(broken.condition, Some(ExceptionKind::NoModule));
    assert_eq!(broken.layout, ChannelLayout::EMPTY);
    assert!(broken.serial.is_none());

    // Module 3 is indexed past an empty module 2.
    assert_eq!(directory.get(3).unwrap().name, "X20DO4322");
    assert_eq!(directory.get(3).unwrap().digital_in_index(), 2);

    harness.shutdown().await;
}

#[tokio::test]
async fn test_unreadable_config_block_marks_module() {
    let harness = Harness::new(RackFixtures::small());
    harness
        .sim
        .inject_exception(module_base(1).unwrap() + ModuleRegister::CfgHw.offset(), 4);

    harness.connect().await.unwrap();
    let module = harness.client.module(1).unwrap();
    assert_eq!(module.name, "X20DI2371");
    assert!(module.config.is_none());
    assert_eq!(module.condition, Some(ExceptionKind::Device));

    // The declared layout still comes from the catalog.
    assert!(harness.client.read_digital_inputs(1, 2, 0).await.is_ok());

    harness.shutdown().await;
}

#[tokio::test]
async fn test_module_number_out_of_range() {
    let harness = Harness::new(RackFixtures::small()).connected().await;

    for module_nr in [0, 4, 250] {
        let err = harness.client.module(module_nr).unwrap_err();
        assert_eq!(err.code(), 10);
        let err = harness.client.read_digital_inputs(module_nr, 1, 0).await.unwrap_err();
        assert_eq!(err.code(), 10);
    }

    harness.shutdown().await;
}

// =============================================================================
// Module registers
// =============================================================================

#[tokio::test]
async fn test_module_register_read_and_write() {
    let harness = Harness::new(RackFixtures::small()).connected().await;

    let id = harness.client.module_register(2, ModuleRegister::Id).await.unwrap();
    assert_eq!(id, vec![ID_DI4371]);

    harness
        .client
        .set_module_register(2, ModuleRegister::CfgSize, 8)
        .await
        .unwrap();
    let base = module_base(2).unwrap();
    assert_eq!(harness.sim.register(base + ModuleRegister::CfgSize.offset()), Some(8));

    let err = harness
        .client
        .set_module_register(2, ModuleRegister::Id, 1)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ExceptionKind::Unhandled);
    assert_eq!(harness.sim.register(base + 1), Some(ID_DI4371));

    harness.shutdown().await;
}

// =============================================================================
// Topology changes
// =============================================================================

#[tokio::test]
async fn test_refresh_picks_up_added_module() {
    let harness = Harness::new(RackFixtures::small()).connected().await;

    let mut modules = RackFixtures::small();
    modules.push(RackFixtures::module(ID_AI4622));
    harness.sim.set_modules(modules);

    let client = Arc::clone(&harness.client);
    assert!(wait_until(Duration::from_secs(2), || client.modules().len() == 4).await);
    assert_eq!(harness.client.module(4).unwrap().name, "X20AI4622");

    harness.shutdown().await;
}

#[tokio::test]
async fn test_refresh_picks_up_removed_module() {
    let harness = Harness::new(RackFixtures::small()).connected().await;

    harness.sim.set_modules(vec![RackFixtures::module(ID_DI2371)]);

    let client = Arc::clone(&harness.client);
    assert!(wait_until(Duration::from_secs(2), || client.modules().len() == 1).await);
    let err = harness.client.read_digital_inputs(2, 1, 0).await.unwrap_err();
    assert_eq!(err.kind(), ExceptionKind::NoModule);

    harness.shutdown().await;
}

#[tokio::test]
async fn test_same_count_swap_needs_explicit_enumeration() {
    let harness = Harness::new(RackFixtures::small()).connected().await;

    harness.sim.set_modules(vec![
        RackFixtures::module(ID_DI2371),
        RackFixtures::module(ID_DI4371),
        RackFixtures::module(ID_AI4622),
    ]);
    tokio::time::sleep(Duration::from_millis(250)).await;
    assert_eq!(harness.client.module(3).unwrap().name, "X20DO4322");

    harness.client.master_md_info().await.unwrap();
    assert_eq!(harness.client.module(3).unwrap().name, "X20AI4622");

    harness.shutdown().await;
}

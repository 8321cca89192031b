// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Test Fixtures
//!
//! Pre-built catalogs, racks and client configurations so tests agree on
//! hardware ids and timings.

use std::sync::Arc;
use std::time::Duration;

use brbc_modbus::{AnalogFormat, BusControllerConfig, ChannelLayout, StaticCatalog};

use super::simulator::{SimModule, SimulatedController};

// =============================================================================
// Hardware ids
// =============================================================================

/// 2 digital inputs.
pub const ID_DI2371: u16 = 0xA001;
/// 4 digital inputs.
pub const ID_DI4371: u16 = 0xA002;
/// 12 digital inputs.
pub const ID_DI9371: u16 = 41744;
/// 4 digital outputs.
pub const ID_DO4322: u16 = 0xA003;
/// 12 digital outputs.
pub const ID_DO9322: u16 = 41745;
/// 4 signed analog inputs.
pub const ID_AI4622: u16 = 41755;
/// 4 signed analog outputs.
pub const ID_AO4622: u16 = 41756;
/// 4 unsigned analog inputs.
pub const ID_AT4222: u16 = 41757;
/// Supply module, no process data.
pub const ID_PS9400: u16 = 0xA0F0;
/// Not in any catalog.
pub const ID_UNKNOWN: u16 = 0x7777;

// =============================================================================
// Catalog Fixtures
// =============================================================================

/// Hardware catalogs.
pub struct CatalogFixtures;

impl CatalogFixtures {
    /// Every module used by the rack fixtures.
    pub fn standard() -> StaticCatalog {
        StaticCatalog::new()
            .with(ID_DI2371, "X20DI2371", ChannelLayout::new(2, 0, 0, 0))
            .with(ID_DI4371, "X20DI4371", ChannelLayout::new(4, 0, 0, 0))
            .with(ID_DI9371, "X20DI9371", ChannelLayout::new(12, 0, 0, 0))
            .with(ID_DO4322, "X20DO4322", ChannelLayout::new(0, 4, 0, 0))
            .with(ID_DO9322, "X20DO9322", ChannelLayout::new(0, 12, 0, 0))
            .with(ID_AI4622, "X20AI4622", ChannelLayout::new(0, 0, 4, 0))
            .with(ID_AO4622, "X20AO4622", ChannelLayout::new(0, 0, 0, 4))
            .with(
                ID_AT4222,
                "X20AT4222",
                ChannelLayout::new(0, 0, 4, 0).with_analog_format(AnalogFormat::Unsigned16),
            )
            .with(ID_PS9400, "X20PS9400", ChannelLayout::EMPTY)
    }

    /// [`CatalogFixtures::standard`] behind an `Arc`.
    pub fn shared() -> Arc<StaticCatalog> {
        Arc::new(Self::standard())
    }

    /// The standard catalog in hwlist form.
    pub fn hwlist() -> String {
        [
            "# name,id,di,do,ai,ao[,format]",
            &format!("X20DI2371,{ID_DI2371},2,0,0,0"),
            &format!("X20DI4371,{ID_DI4371},4,0,0,0"),
            &format!("X20DO4322,{ID_DO4322},0,4,0,0"),
            &format!("X20AT4222,{ID_AT4222},0,0,4,0,unsigned"),
        ]
        .join("\n")
    }
}

// =============================================================================
// Rack Fixtures
// =============================================================================

/// Module lineups for the simulated controller.
pub struct RackFixtures;

impl RackFixtures {
    /// Two input modules of 2 and 4 channels followed by an output module
    /// without inputs.
    ///
    /// Digital input indices are 0, 2 and 6.
    pub fn small() -> Vec<SimModule> {
        vec![
            Self::module(ID_DI2371),
            Self::module(ID_DI4371),
            Self::module(ID_DO4322),
        ]
    }

    /// One module of every kind.
    pub fn mixed() -> Vec<SimModule> {
        vec![
            Self::module(ID_DI9371),
            Self::module(ID_DO9322),
            Self::module(ID_AI4622),
            Self::module(ID_AO4622),
            Self::module(ID_AT4222),
            Self::module(ID_PS9400),
        ]
    }

    /// A simulator module whose device layout matches the standard catalog.
    pub fn module(id: u16) -> SimModule {
        let layout = CatalogFixtures::standard()
            .entries()
            .find(|entry| entry.id == id)
            .map(|entry| entry.layout)
            .unwrap_or(ChannelLayout::EMPTY);
        SimModule::new(id, layout)
    }

    /// A simulated controller with `modules` plugged in.
    pub fn controller(modules: Vec<SimModule>) -> SimulatedController {
        SimulatedController::with_modules(modules)
    }
}

// =============================================================================
// Config Fixtures
// =============================================================================

/// Client configurations.
pub struct ConfigFixtures;

impl ConfigFixtures {
    /// Short timeouts and no retries or ready delay worth waiting for.
    pub fn fast() -> BusControllerConfig {
        BusControllerConfig::builder()
            .connect_timeout(Duration::from_millis(500))
            .operation_timeout(Duration::from_millis(200))
            .connect_retries(0)
            .retry_delay(Duration::from_millis(10))
            .refresh_interval(Duration::from_millis(100))
            .ready_delay(Duration::from_millis(20))
            .build()
            .unwrap_or_default()
    }

    /// [`ConfigFixtures::fast`] with connect retries.
    pub fn with_retries(retries: u32) -> BusControllerConfig {
        BusControllerConfig {
            connect_retries: retries,
            ..Self::fast()
        }
    }
}

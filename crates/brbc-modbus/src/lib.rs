// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # brbc-modbus
//!
//! Modbus TCP master for the B&R X20BC0087 bus controller.
//!
//! This crate provides:
//!
//! - **Register map**: controller and module block addresses, process-image
//!   index arithmetic and the named controller info fields
//! - **Module directory**: enumeration of attached I/O modules with their
//!   declared channel layout from a hardware catalog
//! - **Digital/analog I/O**: validated reads and writes per module
//! - **Controller info**: typed access to controller registers and commands
//! - **Refresh task**: periodic watchdog reset paced by the controller's
//!   watchdog threshold
//! - **Exception taxonomy**: every failure carries a stable numeric code
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      BusController                              │
//! │      ModuleDirectory  ·  ControllerInfo  ·  RefreshHandle       │
//! └─────────────────────────────────────────────────────────────────┘
//!                              │  one transaction lock
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                   ModbusTransport                               │
//! │               (Abstract transport layer)                        │
//! └─────────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────┐
//! │  ModbusTcpTransport │
//! │   (tokio-modbus)    │
//! └─────────────────────┘
//! ```
//!
//! ## Features
//!
//! - `tcp` (default): Modbus TCP transport via `tokio-modbus`
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use brbc_modbus::{BusController, BusControllerConfig, StaticCatalog};
//!
//! let catalog = StaticCatalog::from_file("hwlist.txt")?;
//! let controller = BusController::tcp_with_catalog(
//!     BusControllerConfig::default(),
//!     Arc::new(catalog),
//! )?;
//!
//! controller.connect("10.0.0.5", 502).await?;
//!
//! for module in controller.modules().iter() {
//!     println!("{} {} di={}", module.module_nr, module.name, module.layout.digital_in);
//! }
//!
//! let inputs = controller.read_digital_inputs(2, 3, 0).await?;
//! controller.write_digital_outputs(3, &[true, false], 0).await?;
//!
//! let threshold = controller.info().watchdog_threshold().await?;
//! controller.disconnect().await;
//! ```
//!
//! ### Error Handling
//!
//! ```rust,ignore
//! use brbc_modbus::{BcResult, ExceptionKind};
//!
//! fn handle_error(result: BcResult<()>) {
//!     if let Err(error) = result {
//!         if error.kind() == ExceptionKind::Watchdog {
//!             println!("Link lost, reconnect required");
//!         }
//!         for hint in error.recovery_hints() {
//!             println!("Hint: {}", hint);
//!         }
//!     }
//! }
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_code)]

// =============================================================================
// Modules
// =============================================================================

pub mod catalog;
pub mod client;
pub mod error;
pub mod info;
pub mod modules;
pub mod registers;
pub mod types;

// =============================================================================
// Re-exports - Error Module
// =============================================================================

pub use error::{
    // Main error type
    BcError,
    BcResult,
    // Taxonomy
    ExceptionKind,
    // Error categories
    ConnectionError,
    TimeoutError,
    TransportError,
    TransportResult,
    // Error metadata
    ErrorSeverity,
    Operation,
};

// =============================================================================
// Re-exports - Types Module
// =============================================================================

pub use types::{
    AnalogFormat,
    BusControllerConfig,
    BusControllerConfigBuilder,
    ChannelKind,
    ChannelLayout,
    DebugLevel,
    Endpoint,
    LinkState,
    MIN_REFRESH_PERIOD,
};

// =============================================================================
// Re-exports - Directory, Catalog and Info
// =============================================================================

pub use catalog::{HardwareCatalog, HardwareEntry, StaticCatalog};
pub use info::{CommandStep, ControllerCommand, ControllerInfo, InfoEntry, InfoValue};
pub use modules::{Module, ModuleConfig, ModuleDirectory, ModuleStatus, ProcessImage};
pub use registers::{ChannelIndices, InfoField, InfoGroup, InfoKind, ModuleRegister};

// =============================================================================
// Re-exports - Client Module
// =============================================================================

pub use client::{
    // Client
    BusController,
    ClientStats,
    StatsSnapshot,
    // Transport
    ModbusTransport,
    TransportState,
    WriteAck,
};

#[cfg(feature = "tcp")]
pub use client::ModbusTcpTransport;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name.
pub const NAME: &str = env!("CARGO_PKG_NAME");

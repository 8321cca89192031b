// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # brbc Integration Tests
//!
//! A simulated X20BC0087 and the integration suites that drive
//! `brbc-modbus` and `brbc-bin` against it.
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p brbc-tests
//! cargo test -p brbc-tests --test integration_refresh
//! cargo test -p brbc-tests -- --nocapture
//! ```
//!
//! ## Suites
//!
//! - `integration_connection.rs`: connect, retry, disconnect, link faults
//! - `integration_enumeration.rs`: directory, catalog lookup, hot plug
//! - `integration_io.rs`: digital and analog process data, window checks
//! - `integration_info.rs`: controller fields and commands
//! - `integration_refresh.rs`: watchdog refresh cadence and trips
//! - `integration_config.rs`: CLI configuration loading
//! - `integration_tcp.rs`: the tokio-modbus transport against a local socket
//!
//! ## Writing New Tests
//!
//! ```rust,ignore
//! use brbc_tests::prelude::*;
//!
//! #[tokio::test]
//! async fn test_something() {
//!     let harness = Harness::new(RackFixtures::small()).connected().await;
//!     harness.sim.set_digital_input(3, true);
//!     let bits = harness.client.read_digital_inputs(2, 4, 0).await.unwrap();
//!     assert!(bits[1]);
//!     harness.shutdown().await;
//! }
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod common;

/// Re-export commonly used items for convenience.
pub mod prelude {
    pub use crate::common::fixtures::*;
    pub use crate::common::harness::*;
    pub use crate::common::simulator::*;
    pub use crate::common::init_test_logging;
}

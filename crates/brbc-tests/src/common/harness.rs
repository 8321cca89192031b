// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Test Harness
//!
//! Pairs a [`SimulatedController`] with a [`BusController`] driving it.
//!
//! ```rust,ignore
//! let harness = Harness::new(RackFixtures::small()).connected().await;
//! let bits = harness.client.read_digital_inputs(2, 4, 0).await?;
//! harness.shutdown().await;
//! ```

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use brbc_modbus::{BcResult, BusController, BusControllerConfig, HardwareCatalog};

use super::fixtures::{CatalogFixtures, ConfigFixtures};
use super::simulator::{SimModule, SimTransport, SimulatedController};

/// Host the harness connects to.
pub const SIM_HOST: &str = "192.168.100.1";

/// Port the harness connects to.
pub const SIM_PORT: u16 = 502;

/// Client type used throughout the integration tests.
pub type SimClient = BusController<SimTransport>;

// =============================================================================
// Harness
// =============================================================================

/// A simulated controller and a client wired to it.
pub struct Harness {
    /// Device side.
    pub sim: SimulatedController,
    /// Client side.
    pub client: Arc<SimClient>,
}

impl Harness {
    /// Standard catalog and fast config.
    pub fn new(modules: Vec<SimModule>) -> Self {
        Self::with_config(modules, ConfigFixtures::fast())
    }

    /// Standard catalog and the given config.
    pub fn with_config(modules: Vec<SimModule>, config: BusControllerConfig) -> Self {
        Self::build(SimulatedController::with_modules(modules), config, CatalogFixtures::shared())
    }

    /// Wraps an existing simulator.
    pub fn build(
        sim: SimulatedController,
        config: BusControllerConfig,
        catalog: Arc<dyn HardwareCatalog>,
    ) -> Self {
        let client = BusController::with_catalog(sim.transport(), config, catalog)
            .expect("fixture config is valid");
        Self {
            sim,
            client: Arc::new(client),
        }
    }

    /// Connects to the simulator, panicking on failure.
    pub async fn connected(self) -> Self {
        self.connect().await.expect("connect to simulator");
        self
    }

    /// Connects to the simulator.
    pub async fn connect(&self) -> BcResult<()> {
        self.client.connect(SIM_HOST, SIM_PORT).await
    }

    /// Disconnects the client.
    pub async fn shutdown(&self) {
        self.client.disconnect().await;
    }

    /// Runs `test_fn` against a connected harness and always disconnects.
    pub async fn run<F, Fut>(modules: Vec<SimModule>, test_fn: F)
    where
        F: FnOnce(Arc<SimClient>, SimulatedController) -> Fut,
        Fut: Future<Output = ()>,
    {
        let harness = Self::new(modules).connected().await;
        test_fn(Arc::clone(&harness.client), harness.sim.clone()).await;
        harness.shutdown().await;
    }
}

// =============================================================================
// Async helpers
// =============================================================================

/// Polls `condition` every 5ms until it holds or `timeout` passes.
///
/// Works with paused time as each poll advances the clock.
pub async fn wait_until<F>(timeout: Duration, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

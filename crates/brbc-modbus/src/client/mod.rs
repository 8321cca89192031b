// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Bus controller client.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      BusController                              │
//! │   connect / disconnect, module I/O, info model, watchdog        │
//! └─────────────────────────────────────────────────────────────────┘
//!               │                                  │
//!               ▼                                  ▼
//! ┌──────────────────────────────┐   ┌──────────────────────────────┐
//! │  Session (transaction lock)  │◀──│  RefreshHandle (tokio task)  │
//! │  timeout, classify, stats    │   │  module count, watchdog reset│
//! └──────────────────────────────┘   └──────────────────────────────┘
//!               │
//!               ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                   ModbusTransport                               │
//! │               (ModbusTcpTransport, simulators)                  │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every register transaction, including those of the refresh task, holds
//! the single transaction lock, so application calls never interleave with
//! a refresh tick.
//!
//! # Examples
//!
//! ```rust,ignore
//! use brbc_modbus::{BusController, BusControllerConfig};
//!
//! let controller = BusController::tcp(BusControllerConfig::default())?;
//! controller.connect("10.0.0.5", 502).await?;
//!
//! let bits = controller.read_digital_inputs(2, 3, 0).await?;
//! controller.write_analog_outputs(4, &[1200, -300], 0).await?;
//!
//! controller.disconnect().await;
//! ```

mod refresh;
mod retry;
pub(crate) mod session;
#[cfg(feature = "tcp")]
mod tcp;
mod transport;

use retry::RetryConfig;
#[cfg(feature = "tcp")]
pub use tcp::ModbusTcpTransport;
pub use transport::{ModbusTransport, TransportState, WriteAck};

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex as SyncMutex, RwLock};
use serde::Serialize;
use tokio::sync::Mutex;

use crate::catalog::{HardwareCatalog, StaticCatalog};
use crate::error::{BcError, BcResult, ConnectionError};
use crate::info::ControllerInfo;
use crate::modules::{self, Module, ModuleDirectory, ModuleStatus};
use crate::registers::{
    format_serial, ModuleRegister, CMD_OFF, CMD_ON, MISC_CHECK_IO, WATCHDOG_RESET,
    WATCHDOG_THRESHOLD,
};
use crate::types::{
    BusControllerConfig, ChannelKind, DebugLevel, Endpoint, LinkState, MIN_REFRESH_PERIOD,
};
use refresh::RefreshHandle;
use session::Session;

// =============================================================================
// Shared
// =============================================================================

/// State shared by the client handle and its refresh task.
pub(crate) struct Shared<T: ModbusTransport> {
    /// Transaction lock.
    pub(crate) transport: Mutex<T>,
    pub(crate) config: BusControllerConfig,
    pub(crate) catalog: Arc<dyn HardwareCatalog>,
    pub(crate) stats: ClientStats,
    state: RwLock<LinkState>,
    endpoint: RwLock<Option<Endpoint>>,
    directory: RwLock<Arc<ModuleDirectory>>,
    pending_fault: SyncMutex<Option<BcError>>,
    refresh_period: RwLock<Duration>,
    last_refresh: RwLock<Option<DateTime<Utc>>>,
}

impl<T: ModbusTransport> Shared<T> {
    pub(crate) fn state(&self) -> LinkState {
        *self.state.read()
    }

    pub(crate) fn set_state(&self, next: LinkState) {
        let previous = std::mem::replace(&mut *self.state.write(), next);
        if previous != next && self.config.debug.summary() {
            tracing::info!(from = %previous, to = %next, "Link state changed");
        }
    }

    pub(crate) fn endpoint(&self) -> Option<Endpoint> {
        self.endpoint.read().clone()
    }

    pub(crate) fn directory(&self) -> Arc<ModuleDirectory> {
        Arc::clone(&self.directory.read())
    }

    pub(crate) fn replace_directory(&self, directory: ModuleDirectory) -> Arc<ModuleDirectory> {
        let directory = Arc::new(directory);
        *self.directory.write() = Arc::clone(&directory);
        directory
    }

    pub(crate) fn park_fault(&self, fault: BcError) {
        *self.pending_fault.lock() = Some(fault);
    }

    fn take_fault(&self) -> Option<BcError> {
        self.pending_fault.lock().take()
    }

    pub(crate) fn set_refresh_period(&self, period: Duration) {
        *self.refresh_period.write() = period;
    }

    pub(crate) fn mark_refreshed(&self) {
        *self.last_refresh.write() = Some(Utc::now());
    }
}

// =============================================================================
// BusController
// =============================================================================

/// Client of one X20BC0087 bus controller.
///
/// Owns the connection, the module directory snapshot and the background
/// refresh task that keeps the controller watchdog from expiring.
///
/// # Thread Safety
///
/// `BusController` is `Send + Sync`; share it with `Arc`. Concurrent calls
/// queue on the transaction lock in FIFO order.
pub struct BusController<T: ModbusTransport + 'static> {
    shared: Arc<Shared<T>>,
    /// Also serializes connect and disconnect. Taken before the transaction lock.
    refresh: Mutex<Option<RefreshHandle>>,
}

impl<T: ModbusTransport + 'static> BusController<T> {
    /// Creates a client with an empty hardware catalog.
    pub fn new(transport: T, config: BusControllerConfig) -> BcResult<Self> {
        Self::with_catalog(transport, config, Arc::new(StaticCatalog::new()))
    }

    /// Creates a client that maps module ids through `catalog`.
    pub fn with_catalog(
        transport: T,
        config: BusControllerConfig,
        catalog: Arc<dyn HardwareCatalog>,
    ) -> BcResult<Self> {
        config.validate()?;
        let period = config.refresh_interval;

        Ok(Self {
            shared: Arc::new(Shared {
                transport: Mutex::new(transport),
                config,
                catalog,
                stats: ClientStats::new(),
                state: RwLock::new(LinkState::Disconnected),
                endpoint: RwLock::new(None),
                directory: RwLock::new(Arc::new(ModuleDirectory::empty())),
                pending_fault: SyncMutex::new(None),
                refresh_period: RwLock::new(period),
                last_refresh: RwLock::new(None),
            }),
            refresh: Mutex::new(None),
        })
    }

    // =========================================================================
    // Connection Management
    // =========================================================================

    /// Connects to the controller, enumerates its modules and starts the
    /// refresh task.
    ///
    /// Connecting while connected first disconnects. Any failure leaves the
    /// client disconnected with the transport closed.
    pub async fn connect(&self, host: &str, port: u16) -> BcResult<()> {
        let endpoint = Endpoint::parse(host, port)?;
        let debug = self.shared.config.debug;

        let mut refresh = self.refresh.lock().await;
        if let Some(handle) = refresh.take() {
            handle.stop().await;
        }
        self.shared.take_fault();
        self.shared.set_state(LinkState::Connecting);
        *self.shared.endpoint.write() = Some(endpoint.clone());

        let guard = self.shared.transport.lock().await;
        let mut session = Session::new(guard, &self.shared, false);

        match self.establish(&mut session, &endpoint).await {
            Ok(period) => {
                drop(session);
                self.shared.set_state(LinkState::Connected);
                *refresh = Some(RefreshHandle::spawn(Arc::clone(&self.shared), period));

                if debug.summary() {
                    tracing::info!(
                        endpoint = %endpoint,
                        modules = self.shared.directory().len(),
                        refresh_ms = period.as_millis() as u64,
                        "Connected to bus controller"
                    );
                }
                Ok(())
            }
            Err(e) => {
                session.close().await;
                drop(session);
                self.shared.set_state(LinkState::Disconnected);
                if debug.summary() {
                    tracing::warn!(endpoint = %endpoint, code = e.code(), error = %e, "Connect failed");
                }
                Err(e)
            }
        }
    }

    async fn establish(&self, session: &mut Session<'_, T>, endpoint: &Endpoint) -> BcResult<Duration> {
        let config = &self.shared.config;

        session.open(endpoint, &RetryConfig::for_connect(config)).await?;
        self.shared.stats.record_connection();

        if config.disable_boundary_check {
            if let Err(e) = session.write_word(MISC_CHECK_IO, CMD_OFF).await {
                if e.is_link_fault() {
                    return Err(e);
                }
                if config.debug.summary() {
                    tracing::warn!(
                        error = %e,
                        delay_ms = config.ready_delay.as_millis() as u64,
                        "Controller not ready, retrying boundary check write"
                    );
                }
                tokio::time::sleep(config.ready_delay).await;
                session.write_word(MISC_CHECK_IO, CMD_OFF).await?;
            }
        }

        let directory = modules::enumerate(session, self.shared.catalog.as_ref()).await?;
        let threshold = session.read_word(WATCHDOG_THRESHOLD).await?;
        let period = config.refresh_period_for(threshold);

        self.shared.replace_directory(directory);
        self.shared.set_refresh_period(period);
        Ok(period)
    }

    /// Stops the refresh task and closes the connection.
    ///
    /// Returns once no transaction is in flight. Safe to call when already
    /// disconnected. Clears a pending watchdog fault.
    pub async fn disconnect(&self) {
        let mut refresh = self.refresh.lock().await;
        if let Some(handle) = refresh.take() {
            handle.stop().await;
        }

        let mut transport = self.shared.transport.lock().await;
        if transport.is_connected() {
            if let Err(e) = transport.disconnect().await {
                tracing::debug!(error = %e, "Transport close failed");
            }
        }
        drop(transport);

        let previous = self.shared.state();
        self.shared.take_fault();
        self.shared.set_state(LinkState::Disconnected);

        if previous != LinkState::Disconnected && self.shared.config.debug.summary() {
            tracing::info!(from = %previous, "Disconnected from bus controller");
        }
    }

    /// Returns `true` while connected.
    pub fn is_connected(&self) -> bool {
        self.shared.state().is_connected()
    }

    /// Current link state.
    pub fn state(&self) -> LinkState {
        self.shared.state()
    }

    /// Endpoint of the last connect attempt.
    pub fn endpoint(&self) -> Option<Endpoint> {
        self.shared.endpoint()
    }

    /// Library log verbosity.
    pub fn debug_level(&self) -> DebugLevel {
        self.shared.config.debug
    }

    /// Client configuration.
    pub fn config(&self) -> &BusControllerConfig {
        &self.shared.config
    }

    /// Fails fast unless connected. A parked watchdog fault is returned once.
    fn ensure_connected(&self) -> BcResult<()> {
        if let Some(fault) = self.shared.take_fault() {
            return Err(fault);
        }
        match self.shared.state() {
            LinkState::Connected => Ok(()),
            LinkState::Faulted => Err(ConnectionError::Faulted.into()),
            LinkState::Disconnected | LinkState::Connecting => Err(BcError::not_connected()),
        }
    }

    /// Acquires the transaction lock for an explicit call.
    pub(crate) async fn session(&self) -> BcResult<Session<'_, T>> {
        self.ensure_connected()?;
        let guard = self.shared.transport.lock().await;
        // The refresh task may have tripped while we waited.
        self.ensure_connected()?;
        Ok(Session::new(guard, &self.shared, true))
    }

    // =========================================================================
    // Module Directory
    // =========================================================================

    /// Current module directory snapshot.
    pub fn modules(&self) -> Arc<ModuleDirectory> {
        self.shared.directory()
    }

    /// Snapshot of one module from the directory.
    pub fn module(&self, module_nr: u16) -> BcResult<Module> {
        self.shared.directory().require(module_nr).cloned()
    }

    /// Re-reads the process data counts and every module block, then swaps
    /// in the new directory.
    pub async fn master_md_info(&self) -> BcResult<Arc<ModuleDirectory>> {
        let mut session = self.session().await?;
        let directory = modules::enumerate(&mut session, self.shared.catalog.as_ref()).await?;
        Ok(self.shared.replace_directory(directory))
    }

    /// Reads a module block register live.
    pub async fn module_register(&self, module_nr: u16, register: ModuleRegister) -> BcResult<Vec<u16>> {
        let mut session = self.session().await?;
        let address = self.module_address(module_nr, register)?;
        session.read_words(address, register.words()).await
    }

    /// Writes one of the writable configuration registers of a module.
    pub async fn set_module_register(
        &self,
        module_nr: u16,
        register: ModuleRegister,
        value: u16,
    ) -> BcResult<()> {
        if !register.is_writable() {
            return Err(BcError::unhandled(
                "set_module_register",
                format!("module register '{register}' is read-only"),
            ));
        }
        let mut session = self.session().await?;
        let address = self.module_address(module_nr, register)?;
        session.write_word(address, value).await
    }

    /// Reads the status register of a module.
    pub async fn module_status(&self, module_nr: u16) -> BcResult<ModuleStatus> {
        let words = self.module_register(module_nr, ModuleRegister::Status).await?;
        Ok(ModuleStatus::from_raw(words[0]))
    }

    /// Reads the serial number of a module.
    pub async fn module_serial(&self, module_nr: u16) -> BcResult<String> {
        let words = self.module_register(module_nr, ModuleRegister::Serial).await?;
        Ok(format_serial(&words))
    }

    fn module_address(&self, module_nr: u16, register: ModuleRegister) -> BcResult<u16> {
        let directory = self.shared.directory();
        directory.require(module_nr)?;
        register
            .address(module_nr)
            .ok_or_else(|| BcError::no_module(module_nr, directory.len()))
    }

    // =========================================================================
    // Digital I/O
    // =========================================================================

    /// Reads `size` digital inputs of a module starting at channel `offset`.
    pub async fn read_digital_inputs(&self, module_nr: u16, size: usize, offset: u16) -> BcResult<Vec<bool>> {
        let mut session = self.session().await?;
        let (address, count) = self.locate(module_nr, ChannelKind::DigitalIn, offset, size)?;
        session.read_discrete_inputs(address, count).await
    }

    /// Reads back `size` digital outputs of a module.
    pub async fn read_digital_outputs(&self, module_nr: u16, size: usize, offset: u16) -> BcResult<Vec<bool>> {
        let mut session = self.session().await?;
        let (address, count) = self.locate(module_nr, ChannelKind::DigitalOut, offset, size)?;
        session.read_coils(address, count).await
    }

    /// Writes digital outputs of a module starting at channel `offset`.
    pub async fn write_digital_outputs(&self, module_nr: u16, values: &[bool], offset: u16) -> BcResult<()> {
        let mut session = self.session().await?;
        let (address, _) = self.locate(module_nr, ChannelKind::DigitalOut, offset, values.len())?;
        session.write_coils(address, values).await
    }

    // =========================================================================
    // Analog I/O
    // =========================================================================

    /// Reads `size` analog inputs of a module, decoded per its register width.
    pub async fn read_analog_inputs(&self, module_nr: u16, size: usize, offset: u16) -> BcResult<Vec<i32>> {
        let mut session = self.session().await?;
        let (address, count) = self.locate(module_nr, ChannelKind::AnalogIn, offset, size)?;
        let format = self.shared.directory().require(module_nr)?.layout.analog_format;
        let words = session.read_words(address, count).await?;
        Ok(words.into_iter().map(|w| format.decode(w)).collect())
    }

    /// Reads back `size` analog outputs of a module.
    pub async fn read_analog_outputs(&self, module_nr: u16, size: usize, offset: u16) -> BcResult<Vec<i32>> {
        let mut session = self.session().await?;
        let (address, count) = self.locate(module_nr, ChannelKind::AnalogOut, offset, size)?;
        let format = self.shared.directory().require(module_nr)?.layout.analog_format;
        let words = session.read_holding(address, count).await?;
        Ok(words.into_iter().map(|w| format.decode(w)).collect())
    }

    /// Writes analog outputs of a module starting at channel `offset`.
    ///
    /// Every value must fit the module's register width.
    pub async fn write_analog_outputs(&self, module_nr: u16, values: &[i32], offset: u16) -> BcResult<()> {
        let mut session = self.session().await?;
        let (address, _) = self.locate(module_nr, ChannelKind::AnalogOut, offset, values.len())?;
        let format = self.shared.directory().require(module_nr)?.layout.analog_format;

        let words = values
            .iter()
            .map(|&value| {
                format.encode(value).ok_or_else(|| {
                    let (min, max) = format.range();
                    BcError::data_range(
                        module_nr,
                        ChannelKind::AnalogOut,
                        format!("value {value} outside {format} range {min}..={max}"),
                    )
                })
            })
            .collect::<BcResult<Vec<u16>>>()?;

        session.write_words(address, &words).await
    }

    /// Validates a channel window against the directory.
    fn locate(&self, module_nr: u16, kind: ChannelKind, offset: u16, size: usize) -> BcResult<(u16, u16)> {
        let directory = self.shared.directory();
        let module = directory.require(module_nr)?;
        let address = module.locate(kind, offset, size)?;
        // Bounded by the module's declared u16 size.
        let count = u16::try_from(size).map_err(|_| {
            BcError::data_range(module_nr, kind, format!("size {size} exceeds the register range"))
        })?;
        Ok((address, count))
    }

    // =========================================================================
    // Controller Info and Watchdog
    // =========================================================================

    /// Typed view over the controller registers.
    pub fn info(&self) -> ControllerInfo<'_, T> {
        ControllerInfo::new(self)
    }

    /// Resets the controller watchdog and re-derives the refresh period from
    /// the current `watchdog_threshold`.
    ///
    /// Returns the period now in effect.
    pub async fn watchdog_reset(&self) -> BcResult<Duration> {
        let period = {
            let mut session = self.session().await?;
            session.write_word(WATCHDOG_RESET, CMD_ON).await?;
            let threshold = session.read_word(WATCHDOG_THRESHOLD).await?;
            self.shared.config.refresh_period_for(threshold)
        };
        self.apply_refresh_period(period).await;

        if self.shared.config.debug.summary() {
            tracing::info!(refresh_ms = period.as_millis() as u64, "Watchdog reset");
        }
        Ok(period)
    }

    /// Refresh period currently in effect.
    pub fn refresh_period(&self) -> Duration {
        *self.shared.refresh_period.read()
    }

    /// Time of the last successful refresh tick.
    pub fn last_refresh(&self) -> Option<DateTime<Utc>> {
        *self.shared.last_refresh.read()
    }

    /// Overrides the refresh period until the next connect or watchdog reset.
    pub async fn set_refresh_interval(&self, period: Duration) -> BcResult<()> {
        if period < MIN_REFRESH_PERIOD {
            return Err(BcError::configuration(
                "modbus_refresh",
                format!("must be at least {}ms", MIN_REFRESH_PERIOD.as_millis()),
            ));
        }
        self.apply_refresh_period(period).await;
        Ok(())
    }

    async fn apply_refresh_period(&self, period: Duration) {
        self.shared.set_refresh_period(period);
        if let Some(handle) = self.refresh.lock().await.as_ref() {
            handle.reschedule(period);
        }
    }

    /// Client statistics.
    pub fn stats(&self) -> &ClientStats {
        &self.shared.stats
    }
}

#[cfg(feature = "tcp")]
impl BusController<ModbusTcpTransport> {
    /// Creates a client over Modbus TCP.
    pub fn tcp(config: BusControllerConfig) -> BcResult<Self> {
        let transport = ModbusTcpTransport::new(config.unit_id);
        Self::new(transport, config)
    }

    /// Creates a client over Modbus TCP with a hardware catalog.
    pub fn tcp_with_catalog(
        config: BusControllerConfig,
        catalog: Arc<dyn HardwareCatalog>,
    ) -> BcResult<Self> {
        let transport = ModbusTcpTransport::new(config.unit_id);
        Self::with_catalog(transport, config, catalog)
    }
}

impl<T: ModbusTransport + 'static> std::fmt::Debug for BusController<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BusController")
            .field("state", &self.shared.state())
            .field("endpoint", &*self.shared.endpoint.read())
            .field("modules", &self.shared.directory().len())
            .finish()
    }
}

// =============================================================================
// ClientStats
// =============================================================================

/// Transaction and refresh counters.
#[derive(Debug)]
pub struct ClientStats {
    /// Total number of transactions.
    total_requests: AtomicU64,
    /// Number of successful transactions.
    successful_requests: AtomicU64,
    /// Number of failed transactions.
    failed_requests: AtomicU64,
    /// Number of connect retries.
    retries: AtomicU64,
    /// Total response time in microseconds.
    total_response_time_us: AtomicU64,
    /// Number of connections established.
    connections: AtomicU64,
    /// Successful refresh ticks.
    refresh_ticks: AtomicU64,
    /// Failed refresh ticks.
    refresh_failures: AtomicU64,
    /// Watchdog trips.
    watchdog_trips: AtomicU64,
}

impl ClientStats {
    /// Creates new statistics.
    pub fn new() -> Self {
        Self {
            total_requests: AtomicU64::new(0),
            successful_requests: AtomicU64::new(0),
            failed_requests: AtomicU64::new(0),
            retries: AtomicU64::new(0),
            total_response_time_us: AtomicU64::new(0),
            connections: AtomicU64::new(0),
            refresh_ticks: AtomicU64::new(0),
            refresh_failures: AtomicU64::new(0),
            watchdog_trips: AtomicU64::new(0),
        }
    }

    /// Records a successful transaction.
    pub fn record_success(&self, duration: Duration) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        self.successful_requests.fetch_add(1, Ordering::Relaxed);
        self.total_response_time_us
            .fetch_add(duration.as_micros() as u64, Ordering::Relaxed);
    }

    /// Records a failed transaction.
    pub fn record_error(&self) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        self.failed_requests.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a connect retry.
    pub fn record_retry(&self) {
        self.retries.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a connection.
    pub fn record_connection(&self) {
        self.connections.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a refresh tick.
    pub fn record_refresh(&self, success: bool) {
        if success {
            self.refresh_ticks.fetch_add(1, Ordering::Relaxed);
        } else {
            self.refresh_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Records a watchdog trip.
    pub fn record_watchdog_trip(&self) {
        self.watchdog_trips.fetch_add(1, Ordering::Relaxed);
    }

    /// Resets all statistics.
    pub fn reset(&self) {
        for counter in [
            &self.total_requests,
            &self.successful_requests,
            &self.failed_requests,
            &self.retries,
            &self.total_response_time_us,
            &self.connections,
            &self.refresh_ticks,
            &self.refresh_failures,
            &self.watchdog_trips,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }

    /// Returns the total number of transactions.
    pub fn total_requests(&self) -> u64 {
        self.total_requests.load(Ordering::Relaxed)
    }

    /// Returns the number of successful transactions.
    pub fn successful_requests(&self) -> u64 {
        self.successful_requests.load(Ordering::Relaxed)
    }

    /// Returns the number of failed transactions.
    pub fn failed_requests(&self) -> u64 {
        self.failed_requests.load(Ordering::Relaxed)
    }

    /// Returns the number of connect retries.
    pub fn retries(&self) -> u64 {
        self.retries.load(Ordering::Relaxed)
    }

    /// Returns the success rate (0.0 - 1.0).
    pub fn success_rate(&self) -> f64 {
        let total = self.total_requests();
        if total == 0 {
            return 1.0;
        }
        self.successful_requests() as f64 / total as f64
    }

    /// Returns the average response time.
    pub fn average_response_time(&self) -> Duration {
        let success = self.successful_requests();
        if success == 0 {
            return Duration::ZERO;
        }
        let total_us = self.total_response_time_us.load(Ordering::Relaxed);
        Duration::from_micros(total_us / success)
    }

    /// Returns the number of connections established.
    pub fn connections(&self) -> u64 {
        self.connections.load(Ordering::Relaxed)
    }

    /// Returns the number of successful refresh ticks.
    pub fn refresh_ticks(&self) -> u64 {
        self.refresh_ticks.load(Ordering::Relaxed)
    }

    /// Returns the number of failed refresh ticks.
    pub fn refresh_failures(&self) -> u64 {
        self.refresh_failures.load(Ordering::Relaxed)
    }

    /// Returns the number of watchdog trips.
    pub fn watchdog_trips(&self) -> u64 {
        self.watchdog_trips.load(Ordering::Relaxed)
    }

    /// Point-in-time copy for reporting.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            total_requests: self.total_requests(),
            successful_requests: self.successful_requests(),
            failed_requests: self.failed_requests(),
            retries: self.retries(),
            average_response_us: self.average_response_time().as_micros() as u64,
            connections: self.connections(),
            refresh_ticks: self.refresh_ticks(),
            refresh_failures: self.refresh_failures(),
            watchdog_trips: self.watchdog_trips(),
        }
    }
}

impl Default for ClientStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Serializable copy of [`ClientStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[allow(missing_docs)]
pub struct StatsSnapshot {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub retries: u64,
    pub average_response_us: u64,
    pub connections: u64,
    pub refresh_ticks: u64,
    pub refresh_failures: u64,
    pub watchdog_trips: u64,
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_stats() {
        let stats = ClientStats::new();

        stats.record_success(Duration::from_millis(10));
        stats.record_success(Duration::from_millis(20));
        stats.record_error();
        stats.record_refresh(true);
        stats.record_refresh(false);

        assert_eq!(stats.total_requests(), 3);
        assert_eq!(stats.successful_requests(), 2);
        assert_eq!(stats.failed_requests(), 1);
        assert!((stats.success_rate() - 0.6667).abs() < 0.01);
        assert_eq!(stats.average_response_time(), Duration::from_millis(15));
        assert_eq!(stats.snapshot().refresh_ticks, 1);
        assert_eq!(stats.snapshot().refresh_failures, 1);

        stats.reset();
        assert_eq!(stats.total_requests(), 0);
        assert_eq!(stats.success_rate(), 1.0);
    }
}

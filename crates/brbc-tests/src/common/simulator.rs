// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Simulated Bus Controller
//!
//! An in-memory X20BC0087 behind the [`ModbusTransport`] trait.
//!
//! [`SimulatedController`] owns the device state and hands out
//! [`SimTransport`] instances that talk to it, so a test can keep poking
//! the device (plug modules, inject faults, read counters) while a
//! `BusController` owns the transport.
//!
//! ## Address model
//!
//! - below `0x1000`: process image. FC4 reads analog inputs, FC3/FC16 access
//!   analog outputs, FC2 reads digital inputs, FC1/FC15 access digital outputs
//! - `0x1000` and above: controller registers and module blocks, shared by
//!   FC3, FC4, FC6 and FC16
//!
//! Unmapped addresses answer with exception 2 (illegal data address).

use std::collections::{HashMap, HashSet};
use std::io;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use brbc_modbus::registers::{
    module_base, CMD_ON, CTRL_CLOSE, CTRL_ERASE, CTRL_LOAD, CTRL_REBOOT, CTRL_RESET_CFG,
    CTRL_RESET_CFG_CHANGED, CTRL_RESET_CFG_CONFIRM, CTRL_SAVE, INDEX_ABSENT, INFO_FIELDS,
    MISC_CHECK_IO, MODULE_BASE, MODULE_STRIDE, PROCESS_DATA, WATCHDOG_RESET, WATCHDOG_THRESHOLD,
};
use brbc_modbus::{
    ChannelLayout, ModbusTransport, TransportError, TransportResult, TransportState, WriteAck,
};

/// First register of the controller register space.
pub const REGISTER_SPACE: u16 = 0x1000;

const FC_READ_COILS: u8 = 0x01;
const FC_READ_DISCRETE: u8 = 0x02;
const FC_READ_HOLDING: u8 = 0x03;
const FC_READ_INPUT: u8 = 0x04;
const FC_WRITE_SINGLE: u8 = 0x06;
const FC_WRITE_COILS: u8 = 0x0F;
const FC_WRITE_MULTIPLE: u8 = 0x10;

const ILLEGAL_ADDRESS: u8 = 0x02;

// =============================================================================
// SimModule
// =============================================================================

/// One module plugged into the simulated controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimModule {
    /// Hardware id.
    pub id: u16,
    /// Raw status register (1 = ok, 3 = error).
    pub status: u16,
    /// Serial number words following the id.
    pub serial: [u16; 2],
    /// Channel sizes the device actually has.
    pub layout: ChannelLayout,
    /// Configuration block (hw, model, index, size, firmware, variant).
    pub config: [u16; 6],
}

impl SimModule {
    /// A healthy module.
    pub fn new(id: u16, layout: ChannelLayout) -> Self {
        Self {
            id,
            status: 1,
            serial: [id % 1000, 42],
            layout,
            config: [id, 1, 0, 0, 0x0102, 0],
        }
    }

    /// Sets the raw status register.
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    /// Sets the serial words after the id.
    pub fn with_serial(mut self, high: u16, low: u16) -> Self {
        self.serial = [high, low];
        self
    }
}

// =============================================================================
// SimState
// =============================================================================

/// Per-function-code transaction counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OpCounts {
    /// FC1.
    pub read_coils: u64,
    /// FC2.
    pub read_discrete_inputs: u64,
    /// FC3.
    pub read_holding_registers: u64,
    /// FC4.
    pub read_input_registers: u64,
    /// FC6.
    pub write_single_register: u64,
    /// FC16.
    pub write_multiple_registers: u64,
    /// FC15.
    pub write_multiple_coils: u64,
}

impl OpCounts {
    /// All transactions.
    pub fn total(&self) -> u64 {
        self.read_coils
            + self.read_discrete_inputs
            + self.read_holding_registers
            + self.read_input_registers
            + self.write_single_register
            + self.write_multiple_registers
            + self.write_multiple_coils
    }
}

#[derive(Debug, Default)]
struct SimState {
    registers: HashMap<u16, u16>,
    analog_in: Vec<u16>,
    analog_out: Vec<u16>,
    digital_in: Vec<bool>,
    digital_out: Vec<bool>,
    modules: Vec<SimModule>,

    // Fault injection
    latency: Duration,
    refuse_connects: u32,
    link_down: bool,
    exceptions: HashMap<u16, u8>,
    exceptions_once: HashMap<u16, u8>,
    short_reads: bool,
    empty_reads: bool,
    bad_acks: bool,

    // Observation
    ops: OpCounts,
    connects: u64,
    connect_attempts: u64,
    disconnects: u64,
    open_connections: u32,
    watchdog_resets: u64,
    in_flight: u32,
    register_writes: Vec<(u16, u16)>,
    last_endpoint: Option<(String, u16)>,
}

impl SimState {
    fn rebuild(&mut self) {
        let sum = |f: fn(&ChannelLayout) -> u16| -> u16 {
            self.modules.iter().map(|m| f(&m.layout)).sum()
        };
        let count = |f: fn(&ChannelLayout) -> u16| -> u16 {
            self.modules.iter().filter(|m| f(&m.layout) > 0).count() as u16
        };

        let di = sum(|l| l.digital_in);
        let dout = sum(|l| l.digital_out);
        let ai = sum(|l| l.analog_in);
        let ao = sum(|l| l.analog_out);

        let process = [
            self.modules.len() as u16,
            count(|l| l.analog_in),
            ai,
            count(|l| l.analog_out),
            ao,
            count(|l| l.digital_in),
            di,
            count(|l| l.digital_out),
            dout,
        ];

        self.analog_in.resize(usize::from(ai), 0);
        self.analog_out.resize(usize::from(ao), 0);
        self.digital_in.resize(usize::from(di), false);
        self.digital_out.resize(usize::from(dout), false);

        for (i, word) in process.into_iter().enumerate() {
            self.registers.insert(PROCESS_DATA + i as u16, word);
        }

        // Drop stale module blocks, then lay out the current ones.
        self.registers.retain(|address, _| *address < MODULE_BASE);

        let mut next = [0u16; 4];
        for (position, module) in self.modules.iter().enumerate() {
            let Some(base) = module_base(position as u16 + 1) else {
                break;
            };
            let l = module.layout;
            let index = |size: u16, next: u16| if size == 0 { INDEX_ABSENT } else { next };
            let block = [
                module.status,
                module.id,
                module.serial[0],
                module.serial[1],
                index(l.analog_in, next[2]),
                index(l.analog_out, next[3]),
                index(l.digital_in, next[0]),
                index(l.digital_out, next[1]),
            ];
            for (offset, word) in block.into_iter().chain(module.config).enumerate() {
                self.registers.insert(base + offset as u16, word);
            }
            for offset in (block.len() + module.config.len()) as u16..MODULE_STRIDE {
                self.registers.insert(base + offset, 0);
            }
            next[0] += l.digital_in;
            next[1] += l.digital_out;
            next[2] += l.analog_in;
            next[3] += l.analog_out;
        }
    }

    fn check(&mut self, function: u8, address: u16, count: u16) -> TransportResult<()> {
        if self.link_down {
            return Err(TransportError::Io(io::Error::from(io::ErrorKind::ConnectionReset)));
        }
        let end = u32::from(address) + u32::from(count.max(1));
        for a in u32::from(address)..end.min(0x1_0000) {
            let a = a as u16;
            if let Some(code) = self.exceptions_once.remove(&a) {
                return Err(TransportError::Exception { function, code });
            }
            if let Some(&code) = self.exceptions.get(&a) {
                return Err(TransportError::Exception { function, code });
            }
        }
        Ok(())
    }

    fn shape<V>(&self, mut values: Vec<V>) -> Vec<V> {
        if self.empty_reads {
            values.clear();
        } else if self.short_reads {
            values.pop();
        }
        values
    }

    fn ack(&self, address: u16, quantity: u16) -> WriteAck {
        if self.bad_acks {
            WriteAck::new(address, quantity.saturating_sub(1))
        } else {
            WriteAck::new(address, quantity)
        }
    }

    fn register_word(&self, process: &[u16], address: u16) -> Option<u16> {
        if address < REGISTER_SPACE {
            process.get(usize::from(address)).copied()
        } else {
            self.registers.get(&address).copied()
        }
    }

    fn read_words(&self, process: &[u16], address: u16, count: u16) -> Option<Vec<u16>> {
        (0..count)
            .map(|i| address.checked_add(i).and_then(|a| self.register_word(process, a)))
            .collect()
    }

    fn store(&mut self, address: u16, value: u16) -> bool {
        if !self.registers.contains_key(&address) {
            return false;
        }
        self.registers.insert(address, value);
        self.register_writes.push((address, value));
        if address == WATCHDOG_RESET && value == CMD_ON {
            self.watchdog_resets += 1;
        }
        true
    }
}

fn bits(values: &[bool], address: u16, count: u16) -> Option<Vec<bool>> {
    let start = usize::from(address);
    values.get(start..start + usize::from(count)).map(<[bool]>::to_vec)
}

fn illegal(function: u8) -> TransportError {
    TransportError::Exception {
        function,
        code: ILLEGAL_ADDRESS,
    }
}

// =============================================================================
// SimulatedController
// =============================================================================

/// Handle to a simulated bus controller.
#[derive(Debug, Clone)]
pub struct SimulatedController {
    state: Arc<Mutex<SimState>>,
}

impl SimulatedController {
    /// A controller with no modules and every info register present.
    pub fn new() -> Self {
        let mut state = SimState::default();

        for field in INFO_FIELDS {
            for i in 0..field.words() {
                state.registers.insert(field.address + i, 0);
            }
        }
        for address in [
            WATCHDOG_THRESHOLD,
            WATCHDOG_RESET,
            MISC_CHECK_IO,
            CTRL_SAVE,
            CTRL_LOAD,
            CTRL_ERASE,
            CTRL_REBOOT,
            CTRL_CLOSE,
            CTRL_RESET_CFG,
            CTRL_RESET_CFG_CONFIRM,
            CTRL_RESET_CFG_CHANGED,
        ] {
            state.registers.insert(address, 0);
        }
        state.rebuild();

        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    /// A controller with the given modules plugged in.
    pub fn with_modules(modules: Vec<SimModule>) -> Self {
        let sim = Self::new();
        sim.set_modules(modules);
        sim
    }

    /// Creates a transport connected to this controller.
    pub fn transport(&self) -> SimTransport {
        SimTransport {
            state: Arc::clone(&self.state),
            connected: false,
        }
    }

    // =========================================================================
    // Device setup
    // =========================================================================

    /// Replaces the plugged modules; the process image is resized.
    pub fn set_modules(&self, modules: Vec<SimModule>) {
        let mut state = self.state.lock();
        state.modules = modules;
        state.rebuild();
    }

    /// Sets a controller register.
    pub fn set_register(&self, address: u16, value: u16) {
        self.state.lock().registers.insert(address, value);
    }

    /// Sets consecutive controller registers.
    pub fn set_registers(&self, address: u16, values: &[u16]) {
        let mut state = self.state.lock();
        for (i, value) in values.iter().enumerate() {
            state.registers.insert(address + i as u16, *value);
        }
    }

    /// Reads a controller register.
    pub fn register(&self, address: u16) -> Option<u16> {
        self.state.lock().registers.get(&address).copied()
    }

    /// Sets `watchdog_threshold` in milliseconds.
    pub fn set_watchdog_threshold(&self, threshold_ms: u16) {
        self.set_register(WATCHDOG_THRESHOLD, threshold_ms);
    }

    /// Sets a digital input bit by global index.
    pub fn set_digital_input(&self, index: usize, value: bool) {
        if let Some(bit) = self.state.lock().digital_in.get_mut(index) {
            *bit = value;
        }
    }

    /// Sets an analog input word by global index.
    pub fn set_analog_input(&self, index: usize, value: u16) {
        if let Some(word) = self.state.lock().analog_in.get_mut(index) {
            *word = value;
        }
    }

    /// Digital output bits.
    pub fn digital_outputs(&self) -> Vec<bool> {
        self.state.lock().digital_out.clone()
    }

    /// Analog output words.
    pub fn analog_outputs(&self) -> Vec<u16> {
        self.state.lock().analog_out.clone()
    }

    // =========================================================================
    // Fault injection
    // =========================================================================

    /// Delay applied to every call.
    pub fn set_latency(&self, latency: Duration) {
        self.state.lock().latency = latency;
    }

    /// Refuses the next `count` connect attempts.
    pub fn refuse_connects(&self, count: u32) {
        self.state.lock().refuse_connects = count;
    }

    /// Makes every transaction fail with a connection reset.
    pub fn set_link_down(&self, down: bool) {
        self.state.lock().link_down = down;
    }

    /// Answers every transaction touching `address` with exception `code`.
    pub fn inject_exception(&self, address: u16, code: u8) {
        self.state.lock().exceptions.insert(address, code);
    }

    /// Answers the next transaction touching `address` with exception `code`.
    pub fn inject_exception_once(&self, address: u16, code: u8) {
        self.state.lock().exceptions_once.insert(address, code);
    }

    /// Removes all injected exceptions.
    pub fn clear_exceptions(&self) {
        let mut state = self.state.lock();
        state.exceptions.clear();
        state.exceptions_once.clear();
    }

    /// Returns one value fewer than requested.
    pub fn set_short_reads(&self, enabled: bool) {
        self.state.lock().short_reads = enabled;
    }

    /// Returns no values at all.
    pub fn set_empty_reads(&self, enabled: bool) {
        self.state.lock().empty_reads = enabled;
    }

    /// Acknowledges writes with a wrong quantity.
    pub fn set_bad_acks(&self, enabled: bool) {
        self.state.lock().bad_acks = enabled;
    }

    // =========================================================================
    // Observation
    // =========================================================================

    /// Transaction counters.
    pub fn ops(&self) -> OpCounts {
        self.state.lock().ops
    }

    /// Total transactions.
    pub fn total_ops(&self) -> u64 {
        self.state.lock().ops.total()
    }

    /// Successful connects.
    pub fn connects(&self) -> u64 {
        self.state.lock().connects
    }

    /// Connect attempts including refused ones.
    pub fn connect_attempts(&self) -> u64 {
        self.state.lock().connect_attempts
    }

    /// Disconnects of an open transport.
    pub fn disconnects(&self) -> u64 {
        self.state.lock().disconnects
    }

    /// Transports currently connected.
    pub fn open_connections(&self) -> u32 {
        self.state.lock().open_connections
    }

    /// `0xC1` writes to `watchdog_reset`.
    pub fn watchdog_resets(&self) -> u64 {
        self.state.lock().watchdog_resets
    }

    /// Transactions currently inside their latency window.
    pub fn in_flight(&self) -> u32 {
        self.state.lock().in_flight
    }

    /// Every single and multiple register write to the register space, in order.
    pub fn register_writes(&self) -> Vec<(u16, u16)> {
        self.state.lock().register_writes.clone()
    }

    /// Host and port of the last connect.
    pub fn last_endpoint(&self) -> Option<(String, u16)> {
        self.state.lock().last_endpoint.clone()
    }

    /// Addresses written at least once.
    pub fn written_addresses(&self) -> HashSet<u16> {
        self.state.lock().register_writes.iter().map(|(a, _)| *a).collect()
    }
}

impl Default for SimulatedController {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// SimTransport
// =============================================================================

/// Transport side of a [`SimulatedController`].
#[derive(Debug)]
pub struct SimTransport {
    state: Arc<Mutex<SimState>>,
    connected: bool,
}

impl SimTransport {
    /// Waits out the configured latency.
    async fn delay(&self) {
        let latency = self.state.lock().latency;
        if !latency.is_zero() {
            self.state.lock().in_flight += 1;
            let _guard = InFlight(Arc::clone(&self.state));
            tokio::time::sleep(latency).await;
        }
    }

    async fn begin(&self) -> TransportResult<()> {
        if !self.connected {
            return Err(TransportError::NotConnected);
        }
        self.delay().await;
        Ok(())
    }
}

/// Decrements the in-flight counter, also when the call is cancelled.
struct InFlight(Arc<Mutex<SimState>>);

impl Drop for InFlight {
    fn drop(&mut self) {
        let mut state = self.0.lock();
        state.in_flight = state.in_flight.saturating_sub(1);
    }
}

#[async_trait]
impl ModbusTransport for SimTransport {
    async fn connect(&mut self, host: &str, port: u16) -> TransportResult<()> {
        self.delay().await;
        let mut state = self.state.lock();
        state.connect_attempts += 1;
        if state.refuse_connects > 0 {
            state.refuse_connects -= 1;
            return Err(TransportError::Refused {
                host: host.to_string(),
                port,
            });
        }
        state.connects += 1;
        state.open_connections += 1;
        state.last_endpoint = Some((host.to_string(), port));
        self.connected = true;
        Ok(())
    }

    async fn disconnect(&mut self) -> TransportResult<()> {
        if self.connected {
            let mut state = self.state.lock();
            state.disconnects += 1;
            state.open_connections = state.open_connections.saturating_sub(1);
        }
        self.connected = false;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn state(&self) -> TransportState {
        if self.connected {
            TransportState::Connected
        } else {
            TransportState::Disconnected
        }
    }

    async fn read_coils(&mut self, address: u16, count: u16) -> TransportResult<Vec<bool>> {
        self.begin().await?;
        let mut state = self.state.lock();
        state.ops.read_coils += 1;
        state.check(FC_READ_COILS, address, count)?;
        let values = bits(&state.digital_out, address, count).ok_or(illegal(FC_READ_COILS))?;
        Ok(state.shape(values))
    }

    async fn read_discrete_inputs(&mut self, address: u16, count: u16) -> TransportResult<Vec<bool>> {
        self.begin().await?;
        let mut state = self.state.lock();
        state.ops.read_discrete_inputs += 1;
        state.check(FC_READ_DISCRETE, address, count)?;
        let values = bits(&state.digital_in, address, count).ok_or(illegal(FC_READ_DISCRETE))?;
        Ok(state.shape(values))
    }

    async fn read_holding_registers(&mut self, address: u16, count: u16) -> TransportResult<Vec<u16>> {
        self.begin().await?;
        let mut state = self.state.lock();
        state.ops.read_holding_registers += 1;
        state.check(FC_READ_HOLDING, address, count)?;
        let values = state
            .read_words(&state.analog_out, address, count)
            .ok_or(illegal(FC_READ_HOLDING))?;
        Ok(state.shape(values))
    }

    async fn read_input_registers(&mut self, address: u16, count: u16) -> TransportResult<Vec<u16>> {
        self.begin().await?;
        let mut state = self.state.lock();
        state.ops.read_input_registers += 1;
        state.check(FC_READ_INPUT, address, count)?;
        let values = state
            .read_words(&state.analog_in, address, count)
            .ok_or(illegal(FC_READ_INPUT))?;
        Ok(state.shape(values))
    }

    async fn write_single_register(&mut self, address: u16, value: u16) -> TransportResult<WriteAck> {
        self.begin().await?;
        let mut state = self.state.lock();
        state.ops.write_single_register += 1;
        state.check(FC_WRITE_SINGLE, address, 1)?;
        if !state.store(address, value) {
            return Err(illegal(FC_WRITE_SINGLE));
        }
        Ok(state.ack(address, 1))
    }

    async fn write_multiple_registers(&mut self, address: u16, values: &[u16]) -> TransportResult<WriteAck> {
        self.begin().await?;
        let mut state = self.state.lock();
        state.ops.write_multiple_registers += 1;
        let quantity = values.len() as u16;
        state.check(FC_WRITE_MULTIPLE, address, quantity)?;

        if address < REGISTER_SPACE {
            let start = usize::from(address);
            let slot = state
                .analog_out
                .get_mut(start..start + values.len())
                .ok_or(illegal(FC_WRITE_MULTIPLE))?;
            slot.copy_from_slice(values);
        } else {
            let known = (0..quantity)
                .all(|i| address.checked_add(i).is_some_and(|a| state.registers.contains_key(&a)));
            if !known {
                return Err(illegal(FC_WRITE_MULTIPLE));
            }
            for (i, value) in values.iter().enumerate() {
                state.store(address + i as u16, *value);
            }
        }
        Ok(state.ack(address, quantity))
    }

    async fn write_multiple_coils(&mut self, address: u16, values: &[bool]) -> TransportResult<WriteAck> {
        self.begin().await?;
        let mut state = self.state.lock();
        state.ops.write_multiple_coils += 1;
        let quantity = values.len() as u16;
        state.check(FC_WRITE_COILS, address, quantity)?;

        let start = usize::from(address);
        let slot = state
            .digital_out
            .get_mut(start..start + values.len())
            .ok_or(illegal(FC_WRITE_COILS))?;
        slot.copy_from_slice(values);
        Ok(state.ack(address, quantity))
    }

    fn display_name(&self) -> String {
        "simulated X20BC0087".to_string()
    }
}

// =============================================================================
// Tests
// =============================================================================

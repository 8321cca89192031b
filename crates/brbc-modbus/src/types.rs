// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Bus controller configuration and shared value types.
//!
//! - **ChannelKind**: the four process-image channel types of an I/O module
//! - **ChannelLayout**: declared channel sizes of one module
//! - **AnalogFormat**: register width interpretation for analog channels
//! - **Endpoint**: validated `host:port` of a bus controller
//! - **BusControllerConfig**: connection, timing and refresh settings with builder
//!
//! # Examples
//!
//! ```
//! use std::time::Duration;
//! use brbc_modbus::types::{BusControllerConfig, DebugLevel};
//!
//! let config = BusControllerConfig::builder()
//!     .operation_timeout(Duration::from_secs(2))
//!     .refresh_interval(Duration::from_millis(500))
//!     .debug(DebugLevel::Summary)
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(config.port, 502);
//! ```

use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{BcError, BcResult};

// =============================================================================
// ChannelKind
// =============================================================================

/// Process-image channel type.
///
/// Digital channels are addressed in bits, analog channels in 16-bit words.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    /// Digital inputs (discrete inputs, FC2).
    DigitalIn,
    /// Digital outputs (coils, FC15/FC1).
    DigitalOut,
    /// Analog inputs (input registers, FC4).
    AnalogIn,
    /// Analog outputs (holding registers, FC16/FC3).
    AnalogOut,
}

impl ChannelKind {
    /// All channel kinds in process-image order.
    pub const ALL: [ChannelKind; 4] = [
        Self::DigitalIn,
        Self::DigitalOut,
        Self::AnalogIn,
        Self::AnalogOut,
    ];

    /// Returns `true` for bit-addressed channels.
    #[inline]
    pub const fn is_digital(&self) -> bool {
        matches!(self, Self::DigitalIn | Self::DigitalOut)
    }

    /// Returns `true` for input channels.
    #[inline]
    pub const fn is_input(&self) -> bool {
        matches!(self, Self::DigitalIn | Self::AnalogIn)
    }

    /// Returns the short name used in logs and CLI output.
    pub const fn short_name(&self) -> &'static str {
        match self {
            Self::DigitalIn => "di",
            Self::DigitalOut => "do",
            Self::AnalogIn => "ai",
            Self::AnalogOut => "ao",
        }
    }

    /// Returns the unit the channel is counted in.
    pub const fn unit(&self) -> &'static str {
        if self.is_digital() {
            "bits"
        } else {
            "words"
        }
    }
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::DigitalIn => "digital input",
            Self::DigitalOut => "digital output",
            Self::AnalogIn => "analog input",
            Self::AnalogOut => "analog output",
        };
        f.write_str(name)
    }
}

// =============================================================================
// AnalogFormat
// =============================================================================

/// How a module's analog registers are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalogFormat {
    /// Two's complement 16-bit (-32768..=32767).
    #[default]
    Signed16,
    /// Unsigned 16-bit (0..=65535).
    Unsigned16,
}

impl AnalogFormat {
    /// Decodes a raw register into a channel value.
    #[inline]
    pub const fn decode(&self, raw: u16) -> i32 {
        match self {
            Self::Signed16 => raw as i16 as i32,
            Self::Unsigned16 => raw as i32,
        }
    }

    /// Encodes a channel value, returning `None` if it does not fit the width.
    pub fn encode(&self, value: i32) -> Option<u16> {
        match self {
            Self::Signed16 => i16::try_from(value).ok().map(|v| v as u16),
            Self::Unsigned16 => u16::try_from(value).ok(),
        }
    }

    /// Returns the inclusive value range.
    pub const fn range(&self) -> (i32, i32) {
        match self {
            Self::Signed16 => (i16::MIN as i32, i16::MAX as i32),
            Self::Unsigned16 => (0, u16::MAX as i32),
        }
    }
}

impl fmt::Display for AnalogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Signed16 => f.write_str("signed"),
            Self::Unsigned16 => f.write_str("unsigned"),
        }
    }
}

impl FromStr for AnalogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "signed" | "s16" | "int16" | "i16" => Ok(Self::Signed16),
            "unsigned" | "u16" | "uint16" => Ok(Self::Unsigned16),
            other => Err(format!("unknown analog format '{other}', expected signed or unsigned")),
        }
    }
}

// =============================================================================
// ChannelLayout
// =============================================================================

/// Declared channel sizes of one module.
///
/// Digital sizes are channel (bit) counts, analog sizes are word counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ChannelLayout {
    /// Digital input channels.
    pub digital_in: u16,
    /// Digital output channels.
    pub digital_out: u16,
    /// Analog input words.
    pub analog_in: u16,
    /// Analog output words.
    pub analog_out: u16,
    /// Analog register interpretation.
    #[serde(default)]
    pub analog_format: AnalogFormat,
}

impl ChannelLayout {
    /// A module without process data.
    pub const EMPTY: ChannelLayout = ChannelLayout {
        digital_in: 0,
        digital_out: 0,
        analog_in: 0,
        analog_out: 0,
        analog_format: AnalogFormat::Signed16,
    };

    /// Creates a layout with signed analog channels.
    pub const fn new(digital_in: u16, digital_out: u16, analog_in: u16, analog_out: u16) -> Self {
        Self {
            digital_in,
            digital_out,
            analog_in,
            analog_out,
            analog_format: AnalogFormat::Signed16,
        }
    }

    /// Sets the analog format.
    pub const fn with_analog_format(mut self, format: AnalogFormat) -> Self {
        self.analog_format = format;
        self
    }

    /// Returns the declared size for a channel kind.
    #[inline]
    pub const fn size(&self, kind: ChannelKind) -> u16 {
        match kind {
            ChannelKind::DigitalIn => self.digital_in,
            ChannelKind::DigitalOut => self.digital_out,
            ChannelKind::AnalogIn => self.analog_in,
            ChannelKind::AnalogOut => self.analog_out,
        }
    }

    /// Returns `true` if the module has no process data at all.
    pub const fn is_empty(&self) -> bool {
        self.digital_in == 0 && self.digital_out == 0 && self.analog_in == 0 && self.analog_out == 0
    }
}

// =============================================================================
// DebugLevel
// =============================================================================

/// Library log verbosity.
///
/// `0` silent, `1` connect/refresh/error summaries, `2` one event per
/// register transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum DebugLevel {
    /// No informational events.
    #[default]
    Silent,
    /// Connect, refresh and error summaries.
    Summary,
    /// Summaries plus every register transaction.
    Transactions,
}

impl DebugLevel {
    /// Returns `true` if summary events are emitted.
    #[inline]
    pub const fn summary(&self) -> bool {
        !matches!(self, Self::Silent)
    }

    /// Returns `true` if per-transaction events are emitted.
    #[inline]
    pub const fn transactions(&self) -> bool {
        matches!(self, Self::Transactions)
    }

    /// Returns the numeric level.
    pub const fn as_u8(&self) -> u8 {
        match self {
            Self::Silent => 0,
            Self::Summary => 1,
            Self::Transactions => 2,
        }
    }
}

impl TryFrom<u8> for DebugLevel {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Silent),
            1 => Ok(Self::Summary),
            2 => Ok(Self::Transactions),
            other => Err(format!("debug level must be 0, 1 or 2 (got {other})")),
        }
    }
}

impl From<DebugLevel> for u8 {
    fn from(level: DebugLevel) -> Self {
        level.as_u8()
    }
}

impl fmt::Display for DebugLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_u8())
    }
}

// =============================================================================
// LinkState
// =============================================================================

/// Connection state of a bus controller client.
///
/// ```text
/// Disconnected -> Connecting -> Connected -> Disconnected
///                               Connected -> Faulted -> Disconnected
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkState {
    /// No transport, no refresh task.
    #[default]
    Disconnected,
    /// Connect in progress.
    Connecting,
    /// Ready for register I/O.
    Connected,
    /// A transport fault was observed; waiting to be torn down.
    Faulted,
}

impl LinkState {
    /// Returns `true` only in [`LinkState::Connected`].
    #[inline]
    pub const fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }

    /// Returns the state name.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Faulted => "faulted",
        }
    }
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Endpoint
// =============================================================================

/// Validated bus controller address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Endpoint {
    /// IPv4/IPv6 literal or host name.
    pub host: String,
    /// TCP port (never 0).
    pub port: u16,
}

impl Endpoint {
    /// Validates `host` and `port`.
    ///
    /// Accepts IP literals and RFC 1123 host names. A dotted string made only
    /// of digits must be a valid dotted-quad.
    pub fn parse(host: &str, port: u16) -> BcResult<Self> {
        let trimmed = host.trim();
        let reject = |reason: &str| {
            Err(BcError::wrong_ethernet_format(format!("{host}:{port}"), reason))
        };

        if trimmed.is_empty() {
            return reject("host is empty");
        }
        if port == 0 {
            return reject("port 0 is not a valid Modbus TCP port");
        }

        if trimmed.parse::<IpAddr>().is_ok() {
            return Ok(Self {
                host: trimmed.to_string(),
                port,
            });
        }

        if trimmed.chars().all(|c| c.is_ascii_digit() || c == '.') {
            return reject("not a valid dotted-quad IPv4 address");
        }

        if trimmed.len() > 253 {
            return reject("host name longer than 253 characters");
        }
        for label in trimmed.trim_end_matches('.').split('.') {
            let valid = !label.is_empty()
                && label.len() <= 63
                && !label.starts_with('-')
                && !label.ends_with('-')
                && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-');
            if !valid {
                return reject("not a valid IP address or host name");
            }
        }

        Ok(Self {
            host: trimmed.to_string(),
            port,
        })
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

// =============================================================================
// BusControllerConfig
// =============================================================================

/// Connection, timing and refresh settings for a bus controller client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusControllerConfig {
    /// Default Modbus TCP port used when none is given.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Modbus unit id of the controller.
    #[serde(default = "default_unit_id")]
    pub unit_id: u8,

    /// Timeout of a single TCP connect attempt.
    #[serde(default = "default_connect_timeout")]
    #[serde(with = "humantime_serde")]
    pub connect_timeout: Duration,

    /// Timeout of every register transaction.
    #[serde(default = "default_operation_timeout")]
    #[serde(with = "humantime_serde")]
    pub operation_timeout: Duration,

    /// Additional connect attempts after the first one fails.
    #[serde(default = "default_connect_retries")]
    pub connect_retries: u32,

    /// Base delay between connect attempts.
    #[serde(default = "default_retry_delay")]
    #[serde(with = "humantime_serde")]
    pub retry_delay: Duration,

    /// Refresh period used when the watchdog threshold is 0.
    #[serde(default = "default_refresh_interval")]
    #[serde(with = "humantime_serde")]
    pub refresh_interval: Duration,

    /// Consecutive refresh failures that trip the watchdog.
    #[serde(default = "default_max_tick_failures")]
    pub max_tick_failures: u32,

    /// Library log verbosity (0, 1 or 2).
    #[serde(default)]
    pub debug: DebugLevel,

    /// Write `misc_check_io <- 0xC0` during connect.
    #[serde(default = "default_true")]
    pub disable_boundary_check: bool,

    /// Wait before retrying the boundary check write on a controller that is
    /// still booting.
    #[serde(default = "default_ready_delay")]
    #[serde(with = "humantime_serde")]
    pub ready_delay: Duration,
}

/// Shortest refresh period the client will schedule.
pub const MIN_REFRESH_PERIOD: Duration = Duration::from_millis(10);

fn default_port() -> u16 {
    502
}

fn default_unit_id() -> u8 {
    1
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_operation_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_connect_retries() -> u32 {
    3
}

fn default_retry_delay() -> Duration {
    Duration::from_millis(500)
}

fn default_refresh_interval() -> Duration {
    Duration::from_millis(1000)
}

fn default_max_tick_failures() -> u32 {
    3
}

fn default_true() -> bool {
    true
}

fn default_ready_delay() -> Duration {
    Duration::from_secs(5)
}

impl Default for BusControllerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            unit_id: default_unit_id(),
            connect_timeout: default_connect_timeout(),
            operation_timeout: default_operation_timeout(),
            connect_retries: default_connect_retries(),
            retry_delay: default_retry_delay(),
            refresh_interval: default_refresh_interval(),
            max_tick_failures: default_max_tick_failures(),
            debug: DebugLevel::default(),
            disable_boundary_check: default_true(),
            ready_delay: default_ready_delay(),
        }
    }
}

impl BusControllerConfig {
    /// Creates a new builder.
    pub fn builder() -> BusControllerConfigBuilder {
        BusControllerConfigBuilder::default()
    }

    /// Validates the configuration.
    pub fn validate(&self) -> BcResult<()> {
        if self.port == 0 {
            return Err(BcError::configuration("port", "must be between 1 and 65535"));
        }
        if self.unit_id == 0 || self.unit_id > 247 {
            return Err(BcError::configuration(
                "unit_id",
                format!("{} is outside the valid range 1-247", self.unit_id),
            ));
        }
        if self.connect_timeout.is_zero() {
            return Err(BcError::configuration("connect_timeout", "must be greater than zero"));
        }
        if self.operation_timeout.is_zero() {
            return Err(BcError::configuration("operation_timeout", "must be greater than zero"));
        }
        if self.refresh_interval < MIN_REFRESH_PERIOD {
            return Err(BcError::configuration(
                "refresh_interval",
                format!("must be at least {}ms", MIN_REFRESH_PERIOD.as_millis()),
            ));
        }
        if self.max_tick_failures == 0 {
            return Err(BcError::configuration("max_tick_failures", "must be at least 1"));
        }
        Ok(())
    }

    /// Refresh period for a watchdog threshold in milliseconds.
    ///
    /// Half the threshold, clamped to [`MIN_REFRESH_PERIOD`]. A threshold of
    /// 0 falls back to [`BusControllerConfig::refresh_interval`].
    pub fn refresh_period_for(&self, threshold_ms: u16) -> Duration {
        if threshold_ms == 0 {
            return self.refresh_interval;
        }
        Duration::from_millis(u64::from(threshold_ms) / 2).max(MIN_REFRESH_PERIOD)
    }
}

// =============================================================================
// BusControllerConfigBuilder
// =============================================================================

/// Builder for [`BusControllerConfig`].
#[derive(Debug, Default)]
pub struct BusControllerConfigBuilder {
    port: Option<u16>,
    unit_id: Option<u8>,
    connect_timeout: Option<Duration>,
    operation_timeout: Option<Duration>,
    connect_retries: Option<u32>,
    retry_delay: Option<Duration>,
    refresh_interval: Option<Duration>,
    max_tick_failures: Option<u32>,
    debug: Option<DebugLevel>,
    disable_boundary_check: Option<bool>,
    ready_delay: Option<Duration>,
}

impl BusControllerConfigBuilder {
    /// Sets the default port.
    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Sets the unit id.
    pub fn unit_id(mut self, unit_id: u8) -> Self {
        self.unit_id = Some(unit_id);
        self
    }

    /// Sets the connect timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Sets the per-transaction timeout.
    pub fn operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = Some(timeout);
        self
    }

    /// Sets the number of connect retries.
    pub fn connect_retries(mut self, retries: u32) -> Self {
        self.connect_retries = Some(retries);
        self
    }

    /// Sets the base delay between connect attempts.
    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = Some(delay);
        self
    }

    /// Sets the fallback refresh interval.
    pub fn refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = Some(interval);
        self
    }

    /// Sets the number of failed refresh ticks that trip the watchdog.
    pub fn max_tick_failures(mut self, failures: u32) -> Self {
        self.max_tick_failures = Some(failures);
        self
    }

    /// Sets the debug level.
    pub fn debug(mut self, level: DebugLevel) -> Self {
        self.debug = Some(level);
        self
    }

    /// Enables or disables the boundary check write during connect.
    pub fn disable_boundary_check(mut self, enabled: bool) -> Self {
        self.disable_boundary_check = Some(enabled);
        self
    }

    /// Sets the controller ready delay.
    pub fn ready_delay(mut self, delay: Duration) -> Self {
        self.ready_delay = Some(delay);
        self
    }

    /// Builds and validates the configuration.
    pub fn build(self) -> BcResult<BusControllerConfig> {
        let defaults = BusControllerConfig::default();
        let config = BusControllerConfig {
            port: self.port.unwrap_or(defaults.port),
            unit_id: self.unit_id.unwrap_or(defaults.unit_id),
            connect_timeout: self.connect_timeout.unwrap_or(defaults.connect_timeout),
            operation_timeout: self.operation_timeout.unwrap_or(defaults.operation_timeout),
            connect_retries: self.connect_retries.unwrap_or(defaults.connect_retries),
            retry_delay: self.retry_delay.unwrap_or(defaults.retry_delay),
            refresh_interval: self.refresh_interval.unwrap_or(defaults.refresh_interval),
            max_tick_failures: self.max_tick_failures.unwrap_or(defaults.max_tick_failures),
            debug: self.debug.unwrap_or(defaults.debug),
            disable_boundary_check: self
                .disable_boundary_check
                .unwrap_or(defaults.disable_boundary_check),
            ready_delay: self.ready_delay.unwrap_or(defaults.ready_delay),
        };
        config.validate()?;
        Ok(config)
    }
}

// =============================================================================
// Tests
// =============================================================================

// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Bus controller error types.
//!
//! Every failure surfaced to a caller is a [`BcError`]. Each variant belongs
//! to exactly one [`ExceptionKind`], whose numeric code is stable and shared
//! with other clients of the same controller family.
//!
//! Raw transport failures are reported as [`TransportError`] and turned into
//! a [`BcError`] by [`TransportError::classify`] at the single point where
//! register transactions are executed.
//!
//! # Error Kinds
//!
//! ```text
//! Code  Kind
//!  1    Watchdog             refresh cycle failed repeatedly
//!  2    Timeout              a transaction exceeded its timeout
//!  3    Connection           not connected, or connect failed
//!  4    Device               module or controller reported a fault
//!  6    Busy                 controller reports a transient busy state
//! 10    NoModule             module_nr does not exist
//! 11-14 NoDigIn/NoDigOut/NoAnaIn/NoAnaOutData
//! 15    WrongRegData         write not acknowledged
//! 16    DataSize             size does not match what is available
//! 17    DataEmptyAnswer      transport returned no payload
//! 20    DataRange            offset + size beyond declared bounds
//! 30    WrongEthernetFormat  malformed ip/port
//! 40    Unhandled            any other fault
//! ```
//!
//! # Examples
//!
//! ```
//! use brbc_modbus::error::{BcError, ExceptionKind};
//!
//! let error = BcError::no_module(7, 3);
//! assert_eq!(error.kind(), ExceptionKind::NoModule);
//! assert_eq!(error.code(), 10);
//!
//! for hint in error.recovery_hints() {
//!     println!("Hint: {}", hint);
//! }
//! ```

use std::fmt;
use std::io;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tracing::Level;

use crate::types::ChannelKind;

/// Result type for bus controller operations.
pub type BcResult<T> = Result<T, BcError>;

/// Result type for raw transport calls.
pub type TransportResult<T> = Result<T, TransportError>;

// =============================================================================
// ExceptionKind
// =============================================================================

/// Stable error taxonomy with numeric codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum ExceptionKind {
    /// Refresh/watchdog cycle failed repeatedly.
    Watchdog,
    /// A transaction exceeded its timeout.
    Timeout,
    /// Not connected, or connect failed.
    Connection,
    /// Module or controller reported a fault.
    Device,
    /// Controller reports a transient busy state.
    Busy,
    /// Referenced module does not exist.
    NoModule,
    /// Module has no digital inputs.
    NoDigInData,
    /// Module has no digital outputs.
    NoDigOutData,
    /// Module has no analog inputs.
    NoAnaInData,
    /// Module has no analog outputs.
    NoAnaOutData,
    /// Write not acknowledged.
    WrongRegData,
    /// Requested size does not match the available size.
    DataSize,
    /// Transport returned no payload.
    DataEmptyAnswer,
    /// Offset and size exceed the declared bounds.
    DataRange,
    /// Malformed ip/port.
    WrongEthernetFormat,
    /// Any other fault.
    Unhandled,
}

impl ExceptionKind {
    /// All kinds in code order.
    pub const ALL: [ExceptionKind; 16] = [
        Self::Watchdog,
        Self::Timeout,
        Self::Connection,
        Self::Device,
        Self::Busy,
        Self::NoModule,
        Self::NoDigInData,
        Self::NoDigOutData,
        Self::NoAnaInData,
        Self::NoAnaOutData,
        Self::WrongRegData,
        Self::DataSize,
        Self::DataEmptyAnswer,
        Self::DataRange,
        Self::WrongEthernetFormat,
        Self::Unhandled,
    ];

    /// Returns the numeric code.
    pub const fn code(self) -> u8 {
        match self {
            Self::Watchdog => 1,
            Self::Timeout => 2,
            Self::Connection => 3,
            Self::Device => 4,
            Self::Busy => 6,
            Self::NoModule => 10,
            Self::NoDigInData => 11,
            Self::NoDigOutData => 12,
            Self::NoAnaInData => 13,
            Self::NoAnaOutData => 14,
            Self::WrongRegData => 15,
            Self::DataSize => 16,
            Self::DataEmptyAnswer => 17,
            Self::DataRange => 20,
            Self::WrongEthernetFormat => 30,
            Self::Unhandled => 40,
        }
    }

    /// Looks up a kind by numeric code.
    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.code() == code)
    }

    /// The "no data" kind for a channel type.
    pub const fn no_data(kind: ChannelKind) -> Self {
        match kind {
            ChannelKind::DigitalIn => Self::NoDigInData,
            ChannelKind::DigitalOut => Self::NoDigOutData,
            ChannelKind::AnalogIn => Self::NoAnaInData,
            ChannelKind::AnalogOut => Self::NoAnaOutData,
        }
    }

    /// Returns the kind name.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Watchdog => "Watchdog",
            Self::Timeout => "Timeout",
            Self::Connection => "Connection",
            Self::Device => "Device",
            Self::Busy => "Busy",
            Self::NoModule => "NoModule",
            Self::NoDigInData => "NoDigInData",
            Self::NoDigOutData => "NoDigOutData",
            Self::NoAnaInData => "NoAnaInData",
            Self::NoAnaOutData => "NoAnaOutData",
            Self::WrongRegData => "WrongRegData",
            Self::DataSize => "DataSize",
            Self::DataEmptyAnswer => "DataEmptyAnswer",
            Self::DataRange => "DataRange",
            Self::WrongEthernetFormat => "WrongEthernetFormat",
            Self::Unhandled => "Unhandled",
        }
    }

    /// Returns the log/metrics category.
    pub const fn category(self) -> &'static str {
        match self {
            Self::Watchdog => "watchdog",
            Self::Timeout => "timeout",
            Self::Connection | Self::WrongEthernetFormat => "connection",
            Self::Device | Self::Busy => "device",
            Self::NoModule
            | Self::NoDigInData
            | Self::NoDigOutData
            | Self::NoAnaInData
            | Self::NoAnaOutData
            | Self::DataRange
            | Self::DataSize => "addressing",
            Self::WrongRegData | Self::DataEmptyAnswer => "protocol",
            Self::Unhandled => "unhandled",
        }
    }
}

impl fmt::Display for ExceptionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name(), self.code())
    }
}

// =============================================================================
// BcError - Main Error Type
// =============================================================================

/// The error type of every bus controller operation.
#[derive(Debug, Error)]
pub enum BcError {
    /// The refresh task failed too many consecutive ticks.
    #[error("Watchdog refresh failed {failures} consecutive times, connection closed: {last_error}")]
    Watchdog {
        /// Consecutive failed ticks.
        failures: u32,
        /// Message of the last failure.
        last_error: String,
    },

    /// A transaction timed out.
    #[error("{0}")]
    Timeout(#[from] TimeoutError),

    /// Link is down or could not be established.
    #[error("{0}")]
    Connection(#[from] ConnectionError),

    /// Module or controller reported a fault.
    #[error("Device fault at {address:#06x}: {message}")]
    Device {
        /// Register address involved.
        address: u16,
        /// Description.
        message: String,
    },

    /// Controller is busy.
    #[error("Bus controller busy (exception {exception_code:#04x}) at {address:#06x}")]
    Busy {
        /// Register address involved.
        address: u16,
        /// Raw Modbus exception code.
        exception_code: u8,
    },

    /// No module at that position.
    #[error("Module {module_nr} does not exist ({available} modules on the bus)")]
    NoModule {
        /// Requested module number.
        module_nr: u16,
        /// Modules in the current directory.
        available: usize,
    },

    /// Module has no channels of the requested kind.
    #[error("Module {module_nr} has no {kind} data")]
    NoData {
        /// Requested module number.
        module_nr: u16,
        /// Channel type requested.
        kind: ChannelKind,
    },

    /// Write not acknowledged as requested.
    #[error("Register write at {address:#06x} not acknowledged: {message}")]
    WrongRegData {
        /// Register address written.
        address: u16,
        /// Description.
        message: String,
    },

    /// Size mismatch.
    #[error("Data size mismatch in {context}: requested {requested}, available {available}")]
    DataSize {
        /// What was being sized.
        context: String,
        /// Requested item count.
        requested: usize,
        /// Available item count.
        available: usize,
    },

    /// Empty payload.
    #[error("Empty answer for {operation} at {address:#06x}")]
    DataEmptyAnswer {
        /// Operation name.
        operation: &'static str,
        /// Start address.
        address: u16,
    },

    /// Access outside the declared channel range.
    #[error("Data range exceeded on module {module_nr} {kind}: {message}")]
    DataRange {
        /// Module number.
        module_nr: u16,
        /// Channel type.
        kind: ChannelKind,
        /// Description.
        message: String,
    },

    /// Malformed controller address.
    #[error("Malformed Ethernet address '{input}': {reason}")]
    WrongEthernetFormat {
        /// Address as given.
        input: String,
        /// Why it was rejected.
        reason: String,
    },

    /// Invalid configuration value.
    #[error("Invalid configuration '{field}': {reason}")]
    Configuration {
        /// Offending field.
        field: String,
        /// Why it is invalid.
        reason: String,
    },

    /// Any other fault.
    #[error("Unhandled fault in {operation}: {message}")]
    Unhandled {
        /// Operation name.
        operation: String,
        /// Description.
        message: String,
        /// Raw Modbus exception code, if the fault was an exception response.
        exception_code: Option<u8>,
    },
}

impl BcError {
    // =========================================================================
    // Factory Methods
    // =========================================================================

    /// Creates a "not connected" error.
    #[inline]
    pub fn not_connected() -> Self {
        Self::Connection(ConnectionError::NotConnected)
    }

    /// Creates a module-not-found error.
    pub fn no_module(module_nr: u16, available: usize) -> Self {
        Self::NoModule {
            module_nr,
            available,
        }
    }

    /// Creates a no-data error.
    pub fn no_data(module_nr: u16, kind: ChannelKind) -> Self {
        Self::NoData { module_nr, kind }
    }

    /// Creates a data range error.
    pub fn data_range(module_nr: u16, kind: ChannelKind, message: impl Into<String>) -> Self {
        Self::DataRange {
            module_nr,
            kind,
            message: message.into(),
        }
    }

    /// Creates a data size error.
    pub fn data_size(context: impl Into<String>, requested: usize, available: usize) -> Self {
        Self::DataSize {
            context: context.into(),
            requested,
            available,
        }
    }

    /// Creates a malformed address error.
    pub fn wrong_ethernet_format(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::WrongEthernetFormat {
            input: input.into(),
            reason: reason.into(),
        }
    }

    /// Creates a configuration error.
    pub fn configuration(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Configuration {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Creates an unhandled error without an exception code.
    pub fn unhandled(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Unhandled {
            operation: operation.into(),
            message: message.into(),
            exception_code: None,
        }
    }

    // =========================================================================
    // Error Properties
    // =========================================================================

    /// Returns the taxonomy kind.
    pub fn kind(&self) -> ExceptionKind {
        match self {
            Self::Watchdog { .. } => ExceptionKind::Watchdog,
            Self::Timeout(_) => ExceptionKind::Timeout,
            Self::Connection(_) => ExceptionKind::Connection,
            Self::Device { .. } => ExceptionKind::Device,
            Self::Busy { .. } => ExceptionKind::Busy,
            Self::NoModule { .. } => ExceptionKind::NoModule,
            Self::NoData { kind, .. } => ExceptionKind::no_data(*kind),
            Self::WrongRegData { .. } => ExceptionKind::WrongRegData,
            Self::DataSize { .. } => ExceptionKind::DataSize,
            Self::DataEmptyAnswer { .. } => ExceptionKind::DataEmptyAnswer,
            Self::DataRange { .. } => ExceptionKind::DataRange,
            Self::WrongEthernetFormat { .. } => ExceptionKind::WrongEthernetFormat,
            Self::Configuration { .. } | Self::Unhandled { .. } => ExceptionKind::Unhandled,
        }
    }

    /// Returns the numeric code of the kind.
    #[inline]
    pub fn code(&self) -> u8 {
        self.kind().code()
    }

    /// Returns the log/metrics category.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Configuration { .. } => "configuration",
            _ => self.kind().category(),
        }
    }

    /// Returns `true` if the link should be treated as lost.
    #[inline]
    pub fn is_link_fault(&self) -> bool {
        matches!(self, Self::Connection(_))
    }

    /// Returns `true` if repeating the call may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout(_) | Self::Busy { .. } => true,
            Self::Connection(e) => e.is_retryable(),
            Self::Device { .. } | Self::DataEmptyAnswer { .. } => true,
            _ => false,
        }
    }

    /// Returns the suggested retry delay, `None` if not retryable.
    pub fn suggested_retry_delay(&self) -> Option<Duration> {
        if !self.is_retryable() {
            return None;
        }
        match self {
            Self::Timeout(e) => Some(e.suggested_retry_delay()),
            Self::Connection(e) => Some(e.suggested_retry_delay()),
            Self::Busy { .. } => Some(Duration::from_millis(500)),
            _ => Some(Duration::from_millis(200)),
        }
    }

    /// Returns the severity.
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Watchdog { .. } => ErrorSeverity::Critical,
            Self::Connection(e) => e.severity(),
            Self::Configuration { .. } => ErrorSeverity::Critical,
            Self::Timeout(_) | Self::Busy { .. } | Self::DataEmptyAnswer { .. } => {
                ErrorSeverity::Warning
            }
            Self::NoModule { .. }
            | Self::NoData { .. }
            | Self::DataRange { .. }
            | Self::DataSize { .. }
            | Self::WrongEthernetFormat { .. } => ErrorSeverity::Warning,
            Self::Device { .. } | Self::WrongRegData { .. } | Self::Unhandled { .. } => {
                ErrorSeverity::Error
            }
        }
    }

    /// Returns recovery hints.
    pub fn recovery_hints(&self) -> Vec<&'static str> {
        match self {
            Self::Watchdog { .. } => vec![
                "Reconnect to the bus controller",
                "Increase watchdog_threshold if the network is slow",
                "Check the controller for a power cycle or reboot",
            ],
            Self::Timeout(e) => e.recovery_hints(),
            Self::Connection(e) => e.recovery_hints(),
            Self::Device { .. } => vec![
                "Check the module status LEDs",
                "Read the module status register for details",
                "Re-enumerate the modules after replacing hardware",
            ],
            Self::Busy { .. } => vec!["Retry the request after a short delay"],
            Self::NoModule { .. } => vec![
                "Check the module number (1-based position on the bus)",
                "Re-enumerate the modules if the bus topology changed",
            ],
            Self::NoData { .. } => vec![
                "Check that the module provides this channel type",
                "Verify the module id in the hardware catalog",
            ],
            Self::WrongRegData { .. } => vec![
                "Verify the register is writable",
                "Check that the value is accepted by the controller",
            ],
            Self::DataSize { .. } | Self::DataRange { .. } => vec![
                "Check offset and size against the module's declared channel count",
            ],
            Self::DataEmptyAnswer { .. } => vec!["Retry the request", "Check the controller firmware"],
            Self::WrongEthernetFormat { .. } => vec![
                "Use a dotted-quad IPv4 address or a valid host name",
                "Use a port between 1 and 65535",
            ],
            Self::Configuration { .. } => vec!["Fix the configuration value and restart"],
            Self::Unhandled { .. } => vec!["Enable debug level 2 to trace register transactions"],
        }
    }

    /// Returns the tracing level for this error.
    pub fn tracing_level(&self) -> Level {
        self.severity().to_tracing_level()
    }

    /// Logs this error with appropriate level and context.
    pub fn log(&self, context: &str) {
        let level = self.tracing_level();
        let kind = self.kind();

        match level {
            Level::ERROR => tracing::error!(
                code = kind.code(),
                kind = kind.name(),
                category = self.category(),
                context = context,
                retryable = self.is_retryable(),
                "{self}"
            ),
            Level::WARN => tracing::warn!(
                code = kind.code(),
                kind = kind.name(),
                category = self.category(),
                context = context,
                retryable = self.is_retryable(),
                "{self}"
            ),
            _ => tracing::debug!(
                code = kind.code(),
                kind = kind.name(),
                category = self.category(),
                context = context,
                retryable = self.is_retryable(),
                "{self}"
            ),
        }
    }
}

// =============================================================================
// ConnectionError
// =============================================================================

/// Link-level failures.
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// TCP connection refused.
    #[error("Connection refused by {host}:{port}")]
    Refused {
        /// Target host.
        host: String,
        /// Target port.
        port: u16,
        /// Underlying error.
        #[source]
        source: Option<io::Error>,
    },

    /// TCP connect did not complete in time.
    #[error("Connection to {host}:{port} timed out after {duration:?}")]
    TimedOut {
        /// Target host.
        host: String,
        /// Target port.
        port: u16,
        /// Connect timeout.
        duration: Duration,
    },

    /// Host name did not resolve.
    #[error("Failed to resolve host '{hostname}'")]
    DnsResolutionFailed {
        /// Host name.
        hostname: String,
    },

    /// Peer closed the connection.
    #[error("Connection closed{}", .reason.as_ref().map(|r| format!(": {r}")).unwrap_or_default())]
    Closed {
        /// Close reason, if known.
        reason: Option<String>,
    },

    /// No connection established.
    #[error("Not connected to the bus controller")]
    NotConnected,

    /// An earlier transport fault left the link unusable.
    #[error("Connection faulted, reconnect required")]
    Faulted,

    /// Other I/O error.
    #[error("I/O error: {message}")]
    Io {
        /// Error message.
        message: String,
        /// Underlying error.
        #[source]
        source: io::Error,
    },
}

impl ConnectionError {
    /// Creates a refused error.
    pub fn refused(host: impl Into<String>, port: u16) -> Self {
        Self::Refused {
            host: host.into(),
            port,
            source: None,
        }
    }

    /// Creates a refused error with its source.
    pub fn refused_with(host: impl Into<String>, port: u16, source: io::Error) -> Self {
        Self::Refused {
            host: host.into(),
            port,
            source: Some(source),
        }
    }

    /// Creates a connect timeout error.
    pub fn timed_out(host: impl Into<String>, port: u16, duration: Duration) -> Self {
        Self::TimedOut {
            host: host.into(),
            port,
            duration,
        }
    }

    /// Creates a DNS failure.
    pub fn dns_failed(hostname: impl Into<String>) -> Self {
        Self::DnsResolutionFailed {
            hostname: hostname.into(),
        }
    }

    /// Creates a closed error.
    pub fn closed(reason: Option<String>) -> Self {
        Self::Closed { reason }
    }

    /// Creates an I/O error.
    pub fn io(message: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            message: message.into(),
            source,
        }
    }

    /// Returns `true` if reconnecting may succeed.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::DnsResolutionFailed { .. })
    }

    /// Returns the suggested delay before reconnecting.
    pub fn suggested_retry_delay(&self) -> Duration {
        match self {
            Self::Refused { .. } => Duration::from_secs(5),
            Self::TimedOut { .. } => Duration::from_secs(2),
            Self::Closed { .. } | Self::Faulted => Duration::from_secs(1),
            _ => Duration::from_millis(500),
        }
    }

    /// Returns the severity.
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::NotConnected => ErrorSeverity::Warning,
            Self::DnsResolutionFailed { .. } => ErrorSeverity::Critical,
            _ => ErrorSeverity::Error,
        }
    }

    /// Returns recovery hints.
    pub fn recovery_hints(&self) -> Vec<&'static str> {
        match self {
            Self::Refused { .. } => vec![
                "Verify the bus controller is powered on",
                "Check the IP address and port",
                "Check that the Modbus client limit is not reached",
            ],
            Self::TimedOut { .. } => vec![
                "Check network connectivity",
                "Increase connect_timeout",
            ],
            Self::DnsResolutionFailed { .. } => vec!["Check the host name", "Use an IP address"],
            Self::Closed { .. } | Self::Faulted | Self::Io { .. } => vec![
                "Call connect again",
                "Check the network cable and switch",
            ],
            Self::NotConnected => vec!["Call connect before register operations"],
        }
    }
}

// =============================================================================
// TimeoutError
// =============================================================================

/// Timeout errors.
#[derive(Debug, Error)]
pub enum TimeoutError {
    /// Read transaction timeout.
    #[error("Read of {operation} at {address:#06x} timed out after {duration:?}")]
    Read {
        /// Operation name.
        operation: &'static str,
        /// Start address.
        address: u16,
        /// Timeout duration.
        duration: Duration,
    },

    /// Write transaction timeout.
    #[error("Write of {operation} at {address:#06x} timed out after {duration:?}")]
    Write {
        /// Operation name.
        operation: &'static str,
        /// Start address.
        address: u16,
        /// Timeout duration.
        duration: Duration,
    },
}

impl TimeoutError {
    /// Creates a timeout for an operation.
    pub fn for_operation(operation: &Operation, duration: Duration) -> Self {
        if operation.write {
            Self::Write {
                operation: operation.name,
                address: operation.address,
                duration,
            }
        } else {
            Self::Read {
                operation: operation.name,
                address: operation.address,
                duration,
            }
        }
    }

    /// Returns the timeout duration.
    pub fn duration(&self) -> Duration {
        match self {
            Self::Read { duration, .. } | Self::Write { duration, .. } => *duration,
        }
    }

    /// Returns the suggested retry delay.
    pub fn suggested_retry_delay(&self) -> Duration {
        self.duration().mul_f32(0.5).max(Duration::from_millis(100))
    }

    /// Returns recovery hints.
    pub fn recovery_hints(&self) -> Vec<&'static str> {
        vec![
            "Check network connectivity",
            "Increase operation_timeout",
            "Verify the bus controller is responding",
        ]
    }
}

// =============================================================================
// TransportError
// =============================================================================

/// Raw failures reported by a [`ModbusTransport`](crate::client::ModbusTransport).
#[derive(Debug, Error)]
pub enum TransportError {
    /// I/O failure on the socket.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Modbus exception response.
    #[error("Modbus exception {code:#04x} for function {function:#04x}")]
    Exception {
        /// Function code of the request.
        function: u8,
        /// Exception code returned.
        code: u8,
    },

    /// The transport's own timeout elapsed.
    #[error("Transport timed out after {0:?}")]
    Timeout(Duration),

    /// No connection.
    #[error("Transport not connected")]
    NotConnected,

    /// Peer closed the connection.
    #[error("Connection closed")]
    Closed,

    /// Connect refused.
    #[error("Connection refused by {host}:{port}")]
    Refused {
        /// Target host.
        host: String,
        /// Target port.
        port: u16,
    },

    /// Host name did not resolve.
    #[error("Failed to resolve host '{0}'")]
    Resolve(String),

    /// Malformed or unexpected frame.
    #[error("Protocol error: {0}")]
    Protocol(String),
}

impl TransportError {
    /// Returns the standard name of a Modbus exception code.
    pub fn exception_name(code: u8) -> &'static str {
        match code {
            0x01 => "Illegal Function",
            0x02 => "Illegal Data Address",
            0x03 => "Illegal Data Value",
            0x04 => "Server Device Failure",
            0x05 => "Acknowledge",
            0x06 => "Server Device Busy",
            0x08 => "Memory Parity Error",
            0x0A => "Gateway Path Unavailable",
            0x0B => "Gateway Target Device Failed to Respond",
            _ => "Unknown Exception",
        }
    }

    /// Classifies a raw failure of `operation` into the error taxonomy.
    pub fn classify(self, operation: &Operation) -> BcError {
        match self {
            Self::Timeout(duration) => TimeoutError::for_operation(operation, duration).into(),
            Self::NotConnected => BcError::not_connected(),
            Self::Closed => ConnectionError::closed(None).into(),
            Self::Refused { host, port } => ConnectionError::refused(host, port).into(),
            Self::Resolve(hostname) => ConnectionError::dns_failed(hostname).into(),
            Self::Io(error) => match error.kind() {
                io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => {
                    TimeoutError::for_operation(operation, Duration::ZERO).into()
                }
                io::ErrorKind::ConnectionRefused => ConnectionError::Refused {
                    host: String::new(),
                    port: 0,
                    source: Some(error),
                }
                .into(),
                io::ErrorKind::ConnectionReset
                | io::ErrorKind::ConnectionAborted
                | io::ErrorKind::BrokenPipe
                | io::ErrorKind::NotConnected
                | io::ErrorKind::UnexpectedEof => {
                    ConnectionError::closed(Some(error.to_string())).into()
                }
                _ => BcError::unhandled(operation.name, error.to_string()),
            },
            Self::Exception { function, code } => match code {
                0x04 => BcError::Device {
                    address: operation.address,
                    message: format!(
                        "{} (function {function:#04x})",
                        Self::exception_name(code)
                    ),
                },
                0x05 | 0x06 => BcError::Busy {
                    address: operation.address,
                    exception_code: code,
                },
                0x03 if operation.write => BcError::WrongRegData {
                    address: operation.address,
                    message: Self::exception_name(code).to_string(),
                },
                _ => BcError::Unhandled {
                    operation: operation.name.to_string(),
                    message: format!(
                        "{} at {:#06x} (function {function:#04x})",
                        Self::exception_name(code),
                        operation.address
                    ),
                    exception_code: Some(code),
                },
            },
            // A frame that does not match the request leaves the stream out of step.
            Self::Protocol(message) => ConnectionError::closed(Some(format!(
                "{} at {:#06x}: {message}",
                operation.name, operation.address
            )))
            .into(),
        }
    }
}

// =============================================================================
// Operation
// =============================================================================

/// Describes one register transaction for classification and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Operation {
    /// Operation name.
    pub name: &'static str,
    /// Start address.
    pub address: u16,
    /// Registers or bits involved.
    pub quantity: u16,
    /// `true` for writes.
    pub write: bool,
}

impl Operation {
    /// A read of `quantity` items at `address`.
    pub const fn read(name: &'static str, address: u16, quantity: u16) -> Self {
        Self {
            name,
            address,
            quantity,
            write: false,
        }
    }

    /// A write of `quantity` items at `address`.
    pub const fn write(name: &'static str, address: u16, quantity: u16) -> Self {
        Self {
            name,
            address,
            quantity,
            write: true,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{:#06x}; {}]", self.name, self.address, self.quantity)
    }
}

// =============================================================================
// ErrorSeverity
// =============================================================================

/// Error severity levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ErrorSeverity {
    /// Informational - no action required.
    Info,
    /// Warning - action may be required.
    Warning,
    /// Error - action required, but recoverable.
    Error,
    /// Critical - immediate action required.
    Critical,
}

impl ErrorSeverity {
    /// Converts to tracing level.
    pub fn to_tracing_level(self) -> Level {
        match self {
            Self::Info => Level::INFO,
            Self::Warning => Level::WARN,
            Self::Error | Self::Critical => Level::ERROR,
        }
    }

    /// Returns the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const READ: Operation = Operation::read("read_input_registers", 0x1100, 1);
    const WRITE: Operation = Operation::write("write_single_register", 0x1044, 1);

    #[test]
    fn test_exception_codes_are_stable() {
        let codes: Vec<u8> = ExceptionKind::ALL.iter().map(|k| k.code()).collect();
        assert_eq!(codes, vec![1, 2, 3, 4, 6, 10, 11, 12, 13, 14, 15, 16, 17, 20, 30, 40]);
        assert_eq!(ExceptionKind::from_code(20), Some(ExceptionKind::DataRange));
        assert_eq!(ExceptionKind::from_code(5), None);
    }

    #[test]
    fn test_no_data_kind_per_channel() {
        assert_eq!(BcError::no_data(3, ChannelKind::DigitalIn).code(), 11);
        assert_eq!(BcError::no_data(3, ChannelKind::DigitalOut).code(), 12);
        assert_eq!(BcError::no_data(3, ChannelKind::AnalogIn).code(), 13);
        assert_eq!(BcError::no_data(3, ChannelKind::AnalogOut).code(), 14);
    }

    #[test]
    fn test_classify_exception_responses() {
        let device = TransportError::Exception { function: 0x04, code: 0x04 }.classify(&READ);
        assert_eq!(device.kind(), ExceptionKind::Device);

        let busy = TransportError::Exception { function: 0x04, code: 0x06 }.classify(&READ);
        assert_eq!(busy.kind(), ExceptionKind::Busy);
        assert!(busy.is_retryable());

        let rejected = TransportError::Exception { function: 0x06, code: 0x03 }.classify(&WRITE);
        assert_eq!(rejected.kind(), ExceptionKind::WrongRegData);

        let illegal = TransportError::Exception { function: 0x04, code: 0x02 }.classify(&READ);
        assert_eq!(illegal.kind(), ExceptionKind::Unhandled);
        assert!(matches!(illegal, BcError::Unhandled { exception_code: Some(0x02), .. }));
    }

    #[test]
    fn test_classify_link_faults() {
        let closed = TransportError::Io(io::Error::from(io::ErrorKind::ConnectionReset)).classify(&READ);
        assert_eq!(closed.kind(), ExceptionKind::Connection);
        assert!(closed.is_link_fault());

        assert!(TransportError::NotConnected.classify(&READ).is_link_fault());
        assert!(TransportError::Closed.classify(&WRITE).is_link_fault());

        let timeout = TransportError::Timeout(Duration::from_secs(1)).classify(&WRITE);
        assert_eq!(timeout.kind(), ExceptionKind::Timeout);
        assert!(matches!(timeout, BcError::Timeout(TimeoutError::Write { .. })));

        let desync = TransportError::Protocol("transaction id mismatch".into()).classify(&READ);
        assert_eq!(desync.kind(), ExceptionKind::Connection);
        assert!(desync.is_link_fault());
    }

    #[test]
    fn test_error_display() {
        let error = BcError::no_module(5, 3);
        assert_eq!(error.to_string(), "Module 5 does not exist (3 modules on the bus)");

        let error = BcError::no_data(3, ChannelKind::DigitalIn);
        assert_eq!(error.to_string(), "Module 3 has no digital input data");

        assert_eq!(ExceptionKind::DataRange.to_string(), "DataRange (20)");
        assert_eq!(ConnectionError::closed(None).to_string(), "Connection closed");
        assert_eq!(
            ConnectionError::closed(Some("reset".into())).to_string(),
            "Connection closed: reset"
        );
    }

    #[test]
    fn test_severity_and_hints() {
        let watchdog = BcError::Watchdog {
            failures: 3,
            last_error: "timeout".into(),
        };
        assert_eq!(watchdog.severity(), ErrorSeverity::Critical);
        assert!(!watchdog.recovery_hints().is_empty());
        assert_eq!(BcError::not_connected().severity(), ErrorSeverity::Warning);
        assert_eq!(BcError::configuration("port", "zero").code(), 40);
        assert_eq!(BcError::configuration("port", "zero").category(), "configuration");
    }

    #[test]
    fn test_retry_delay() {
        let timeout = BcError::from(TimeoutError::for_operation(&READ, Duration::from_secs(2)));
        assert_eq!(timeout.suggested_retry_delay(), Some(Duration::from_secs(1)));
        assert_eq!(BcError::no_module(1, 0).suggested_retry_delay(), None);
    }
}

// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Transport seam between the bus controller client and the wire.
//!
//! [`ModbusTransport`] is the narrow set of Modbus primitives the client
//! needs. The client owns its transport exclusively and serializes every
//! call, so methods take `&mut self`.

use async_trait::async_trait;
use std::fmt;

use crate::error::TransportResult;

// =============================================================================
// TransportState
// =============================================================================

/// Connection state of a transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TransportState {
    /// Transport is disconnected.
    #[default]
    Disconnected,
    /// Transport is connecting.
    Connecting,
    /// Transport is connected and ready.
    Connected,
    /// Transport encountered an error.
    Error,
}

impl TransportState {
    /// Returns `true` if the transport is connected.
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }
}

impl fmt::Display for TransportState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Error => "error",
        };
        write!(f, "{}", s)
    }
}

// =============================================================================
// WriteAck
// =============================================================================

/// Echo of a write request as confirmed by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WriteAck {
    /// Start address confirmed.
    pub address: u16,
    /// Registers or coils confirmed.
    pub quantity: u16,
}

impl WriteAck {
    /// Creates an acknowledgement.
    pub const fn new(address: u16, quantity: u16) -> Self {
        Self { address, quantity }
    }
}

// =============================================================================
// ModbusTransport Trait
// =============================================================================

/// Modbus primitives consumed by the bus controller client.
///
/// The client keeps its transport behind an async mutex; implementations
/// need only be `Send`.
///
/// Implementations report raw failures as
/// [`TransportError`](crate::error::TransportError); the client applies its
/// own timeout around every call and classifies the result.
///
/// # Implementors
///
/// - [`ModbusTcpTransport`](super::tcp::ModbusTcpTransport): Modbus TCP via tokio-modbus
#[async_trait]
pub trait ModbusTransport: Send {
    // =========================================================================
    // Connection Management
    // =========================================================================

    /// Opens a connection to `host:port`.
    async fn connect(&mut self, host: &str, port: u16) -> TransportResult<()>;

    /// Closes the connection. Closing a closed transport is not an error.
    async fn disconnect(&mut self) -> TransportResult<()>;

    /// Returns `true` if a connection is open.
    fn is_connected(&self) -> bool;

    /// Returns the transport state.
    fn state(&self) -> TransportState;

    // =========================================================================
    // Read Operations
    // =========================================================================

    /// Reads coils (FC1).
    async fn read_coils(&mut self, address: u16, count: u16) -> TransportResult<Vec<bool>>;

    /// Reads discrete inputs (FC2).
    async fn read_discrete_inputs(&mut self, address: u16, count: u16) -> TransportResult<Vec<bool>>;

    /// Reads holding registers (FC3).
    async fn read_holding_registers(&mut self, address: u16, count: u16) -> TransportResult<Vec<u16>>;

    /// Reads input registers (FC4).
    async fn read_input_registers(&mut self, address: u16, count: u16) -> TransportResult<Vec<u16>>;

    // =========================================================================
    // Write Operations
    // =========================================================================

    /// Writes a single register (FC6).
    async fn write_single_register(&mut self, address: u16, value: u16) -> TransportResult<WriteAck>;

    /// Writes multiple registers (FC16).
    async fn write_multiple_registers(&mut self, address: u16, values: &[u16]) -> TransportResult<WriteAck>;

    /// Writes multiple coils (FC15).
    async fn write_multiple_coils(&mut self, address: u16, values: &[bool]) -> TransportResult<WriteAck>;

    // =========================================================================
    // Metadata
    // =========================================================================

    /// Returns a display name for logs.
    fn display_name(&self) -> String;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_state() {
        assert!(TransportState::Connected.is_connected());
        assert!(!TransportState::Disconnected.is_connected());
        assert!(!TransportState::Error.is_connected());
        assert_eq!(TransportState::default(), TransportState::Disconnected);
    }

    #[test]
    fn test_transport_state_display() {
        assert_eq!(TransportState::Connected.to_string(), "connected");
        assert_eq!(TransportState::Error.to_string(), "error");
    }
}

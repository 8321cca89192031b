// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Modbus TCP transport implementation.
//!
//! Uses the `tokio-modbus` TCP client context. Timeouts are applied by the
//! bus controller client around every call, so this transport only maps
//! tokio-modbus results into [`TransportError`]s.
//!
//! Writes go through [`Client::call`] so the write acknowledgement carries the
//! address and quantity the controller echoed, not the ones requested. A
//! framing error means the stream is out of step; the context is dropped and
//! the next call fails with `NotConnected` until the link is reopened.

use std::borrow::Cow;
use std::io;
use std::net::SocketAddr;
use std::time::Instant;

use async_trait::async_trait;
use tokio::net::TcpStream;
use tokio_modbus::client::{Client, Context as ModbusContext, Reader};
use tokio_modbus::prelude::*;
use tokio_modbus::{Error as TokioModbusError, ExceptionCode, Request, Response};

use crate::error::{TransportError, TransportResult};

use super::transport::{ModbusTransport, TransportState, WriteAck};

// =============================================================================
// ModbusTcpTransport
// =============================================================================

/// Modbus TCP transport using tokio-modbus.
///
/// # Example
///
/// ```rust,ignore
/// use brbc_modbus::client::{ModbusTcpTransport, ModbusTransport};
///
/// let mut transport = ModbusTcpTransport::new(1);
/// transport.connect("192.168.100.1", 502).await?;
///
/// let count = transport.read_input_registers(0x1100, 1).await?;
/// ```
pub struct ModbusTcpTransport {
    unit_id: u8,
    tcp_nodelay: bool,
    context: Option<ModbusContext>,
    peer: Option<SocketAddr>,
    state: TransportState,
    last_success: Option<Instant>,
    last_error: Option<String>,
}

impl ModbusTcpTransport {
    /// Creates a disconnected transport addressing `unit_id`.
    pub fn new(unit_id: u8) -> Self {
        Self {
            unit_id,
            tcp_nodelay: true,
            context: None,
            peer: None,
            state: TransportState::Disconnected,
            last_success: None,
            last_error: None,
        }
    }

    /// Enables or disables `TCP_NODELAY` on new connections.
    pub fn with_nodelay(mut self, enabled: bool) -> Self {
        self.tcp_nodelay = enabled;
        self
    }

    /// Returns the unit id.
    pub fn unit_id(&self) -> u8 {
        self.unit_id
    }

    /// Returns the connected peer address.
    pub fn peer(&self) -> Option<SocketAddr> {
        self.peer
    }

    /// Returns the time of the last successful request.
    pub fn last_success(&self) -> Option<Instant> {
        self.last_success
    }

    /// Returns the last error message.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Resolves `host:port`, trying an IP literal before DNS.
    async fn resolve_address(host: &str, port: u16) -> TransportResult<SocketAddr> {
        if let Ok(ip) = host.parse::<std::net::IpAddr>() {
            return Ok(SocketAddr::new(ip, port));
        }

        let mut addrs = tokio::net::lookup_host((host, port))
            .await
            .map_err(|_| TransportError::Resolve(host.to_string()))?;

        addrs
            .next()
            .ok_or_else(|| TransportError::Resolve(host.to_string()))
    }

    fn context_mut(&mut self) -> TransportResult<&mut ModbusContext> {
        self.context.as_mut().ok_or(TransportError::NotConnected)
    }

    /// Maps a tokio-modbus result and tracks link health.
    fn finish<R>(
        &mut self,
        function: u8,
        result: Result<Result<R, ExceptionCode>, TokioModbusError>,
    ) -> TransportResult<R> {
        match result {
            Ok(Ok(value)) => {
                self.last_success = Some(Instant::now());
                self.last_error = None;
                Ok(value)
            }
            Ok(Err(exception)) => {
                let code = Self::exception_code_to_u8(&exception);
                self.last_error = Some(format!("exception {code:#04x}"));
                Err(TransportError::Exception { function, code })
            }
            Err(TokioModbusError::Transport(error)) => {
                self.last_error = Some(error.to_string());
                if Self::is_link_lost(&error) {
                    self.drop_link();
                }
                Err(TransportError::Io(error))
            }
            Err(TokioModbusError::Protocol(error)) => {
                let message = format!("{error:?}");
                self.last_error = Some(message.clone());
                self.drop_link();
                Err(TransportError::Protocol(message))
            }
        }
    }

    /// Maps the answer of a write request to its acknowledgement.
    fn acknowledge(
        &mut self,
        function: u8,
        result: Result<Result<Response, ExceptionCode>, TokioModbusError>,
    ) -> TransportResult<WriteAck> {
        let response = self.finish(function, result)?;
        let ack = Self::ack_from_response(function, response);
        if let Err(TransportError::Protocol(message)) = &ack {
            self.last_error = Some(message.clone());
            self.drop_link();
        }
        ack
    }

    fn ack_from_response(function: u8, response: Response) -> TransportResult<WriteAck> {
        match response {
            Response::WriteSingleRegister(address, _) => Ok(WriteAck::new(address, 1)),
            Response::WriteMultipleRegisters(address, quantity)
            | Response::WriteMultipleCoils(address, quantity) => Ok(WriteAck::new(address, quantity)),
            other => Err(TransportError::Protocol(format!(
                "function {function:#04x} answered with {other:?}"
            ))),
        }
    }

    fn drop_link(&mut self) {
        self.context = None;
        self.state = TransportState::Error;
    }

    fn is_link_lost(error: &io::Error) -> bool {
        matches!(
            error.kind(),
            io::ErrorKind::ConnectionReset
                | io::ErrorKind::ConnectionAborted
                | io::ErrorKind::BrokenPipe
                | io::ErrorKind::NotConnected
                | io::ErrorKind::UnexpectedEof
        )
    }

    /// Converts ExceptionCode to u8.
    fn exception_code_to_u8(code: &ExceptionCode) -> u8 {
        match code {
            ExceptionCode::IllegalFunction => 0x01,
            ExceptionCode::IllegalDataAddress => 0x02,
            ExceptionCode::IllegalDataValue => 0x03,
            ExceptionCode::ServerDeviceFailure => 0x04,
            ExceptionCode::Acknowledge => 0x05,
            ExceptionCode::ServerDeviceBusy => 0x06,
            ExceptionCode::MemoryParityError => 0x08,
            ExceptionCode::GatewayPathUnavailable => 0x0A,
            ExceptionCode::GatewayTargetDevice => 0x0B,
            _ => 0xFF,
        }
    }
}

impl std::fmt::Debug for ModbusTcpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModbusTcpTransport")
            .field("unit_id", &self.unit_id)
            .field("peer", &self.peer)
            .field("state", &self.state)
            .finish()
    }
}

#[async_trait]
impl ModbusTransport for ModbusTcpTransport {
    async fn connect(&mut self, host: &str, port: u16) -> TransportResult<()> {
        if self.context.is_some() {
            self.disconnect().await?;
        }

        self.state = TransportState::Connecting;

        let socket_addr = match Self::resolve_address(host, port).await {
            Ok(addr) => addr,
            Err(e) => {
                self.state = TransportState::Error;
                return Err(e);
            }
        };

        let stream = match TcpStream::connect(socket_addr).await {
            Ok(stream) => stream,
            Err(e) => {
                self.state = TransportState::Error;
                self.last_error = Some(e.to_string());
                return Err(match e.kind() {
                    io::ErrorKind::ConnectionRefused => TransportError::Refused {
                        host: host.to_string(),
                        port,
                    },
                    _ => TransportError::Io(e),
                });
            }
        };

        if let Err(e) = stream.set_nodelay(self.tcp_nodelay) {
            tracing::debug!(error = %e, "Failed to set TCP_NODELAY");
        }

        self.context = Some(tcp::attach_slave(stream, Slave(self.unit_id)));
        self.peer = Some(socket_addr);
        self.state = TransportState::Connected;
        self.last_success = Some(Instant::now());

        tracing::debug!(
            peer = %socket_addr,
            unit_id = self.unit_id,
            "Modbus TCP connection opened"
        );

        Ok(())
    }

    async fn disconnect(&mut self) -> TransportResult<()> {
        if let Some(mut ctx) = self.context.take() {
            if let Err(e) = ctx.disconnect().await {
                tracing::debug!(error = %e, "Error closing Modbus TCP connection");
            }
        }

        self.state = TransportState::Disconnected;
        self.peer = None;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.context.is_some()
    }

    fn state(&self) -> TransportState {
        self.state
    }

    async fn read_coils(&mut self, address: u16, count: u16) -> TransportResult<Vec<bool>> {
        let result = self.context_mut()?.read_coils(address, count).await;
        self.finish(0x01, result)
    }

    async fn read_discrete_inputs(&mut self, address: u16, count: u16) -> TransportResult<Vec<bool>> {
        let result = self.context_mut()?.read_discrete_inputs(address, count).await;
        self.finish(0x02, result)
    }

    async fn read_holding_registers(&mut self, address: u16, count: u16) -> TransportResult<Vec<u16>> {
        let result = self.context_mut()?.read_holding_registers(address, count).await;
        self.finish(0x03, result)
    }

    async fn read_input_registers(&mut self, address: u16, count: u16) -> TransportResult<Vec<u16>> {
        let result = self.context_mut()?.read_input_registers(address, count).await;
        self.finish(0x04, result)
    }

    async fn write_single_register(&mut self, address: u16, value: u16) -> TransportResult<WriteAck> {
        let request = Request::WriteSingleRegister(address, value);
        let result = self.context_mut()?.call(request).await;
        self.acknowledge(0x06, result)
    }

    async fn write_multiple_registers(&mut self, address: u16, values: &[u16]) -> TransportResult<WriteAck> {
        let request = Request::WriteMultipleRegisters(address, Cow::Borrowed(values));
        let result = self.context_mut()?.call(request).await;
        self.acknowledge(0x10, result)
    }

    async fn write_multiple_coils(&mut self, address: u16, values: &[bool]) -> TransportResult<WriteAck> {
        let request = Request::WriteMultipleCoils(address, Cow::Borrowed(values));
        let result = self.context_mut()?.call(request).await;
        self.acknowledge(0x0F, result)
    }

    fn display_name(&self) -> String {
        match self.peer {
            Some(peer) => format!("Modbus TCP {} (unit {})", peer, self.unit_id),
            None => format!("Modbus TCP (unit {})", self.unit_id),
        }
    }
}

// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Exclusive access to the transport for a sequence of transactions.
//!
//! A `Session` holds the transaction lock. Every register transaction of the
//! crate ends in `Shared::execute`, which applies the operation timeout and
//! classifies failures. It also records statistics and the per-transaction
//! trace.
//!
//! A transaction abandoned on timeout may still be answered later, so the
//! session reopens the link before the next transaction can read that answer.

use std::future::Future;
use std::io;
use std::time::Instant;

use tokio::sync::MutexGuard;

use super::retry::RetryConfig;
use super::transport::{ModbusTransport, WriteAck};
use super::Shared;
use crate::error::{
    BcError, BcResult, ConnectionError, Operation, TimeoutError, TransportError, TransportResult,
};
use crate::types::{DebugLevel, Endpoint, LinkState};

/// Transport lock plus the shared client state.
pub(crate) struct Session<'a, T: ModbusTransport> {
    transport: MutexGuard<'a, T>,
    shared: &'a Shared<T>,
    /// Mark the link faulted on a connection failure.
    escalate: bool,
}

impl<'a, T: ModbusTransport> Session<'a, T> {
    pub(crate) fn new(transport: MutexGuard<'a, T>, shared: &'a Shared<T>, escalate: bool) -> Self {
        Self {
            transport,
            shared,
            escalate,
        }
    }

    pub(crate) fn debug(&self) -> DebugLevel {
        self.shared.config.debug
    }

    /// Closes the underlying transport, ignoring close errors.
    pub(crate) async fn close(&mut self) {
        if let Err(e) = self.transport.disconnect().await {
            tracing::debug!(error = %e, "Transport close failed");
        }
    }

    // =========================================================================
    // Connect
    // =========================================================================

    /// Opens the transport, retrying per `retry`.
    pub(crate) async fn open(&mut self, endpoint: &Endpoint, retry: &RetryConfig) -> BcResult<()> {
        let shared = self.shared;
        let timeout = shared.config.connect_timeout;

        if self.transport.is_connected() {
            self.close().await;
        }

        let mut attempt = 0;
        loop {
            let started = Instant::now();
            let connect = self.transport.connect(&endpoint.host, endpoint.port);
            let error = match tokio::time::timeout(timeout, connect).await {
                Ok(Ok(())) => {
                    if shared.config.debug.transactions() {
                        tracing::debug!(
                            endpoint = %endpoint,
                            attempt,
                            elapsed_us = started.elapsed().as_micros() as u64,
                            "Transport connected"
                        );
                    }
                    return Ok(());
                }
                Ok(Err(raw)) => connect_failure(raw, endpoint),
                Err(_) => ConnectionError::timed_out(&endpoint.host, endpoint.port, timeout).into(),
            };

            if !retry.should_retry(&error, attempt) {
                return Err(error);
            }
            let delay = retry.backoff.delay(attempt);
            shared.stats.record_retry();
            if shared.config.debug.summary() {
                tracing::warn!(
                    endpoint = %endpoint,
                    attempt = attempt + 1,
                    max_retries = retry.max_retries,
                    delay_ms = delay.as_millis() as u64,
                    error = %error,
                    "Connect failed, retrying"
                );
            }
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    /// Reopens the link after a timed-out transaction.
    ///
    /// The error is returned unchanged. If the link cannot be reopened the
    /// transport stays closed and, for explicit calls, the link is faulted.
    async fn settle<R>(&mut self, result: BcResult<R>) -> BcResult<R> {
        if let Err(BcError::Timeout(_)) = &result {
            self.reopen().await;
        }
        result
    }

    async fn reopen(&mut self) {
        let shared = self.shared;
        self.close().await;

        let Some(endpoint) = shared.endpoint() else {
            return;
        };
        let timeout = shared.config.connect_timeout;
        let connect = self.transport.connect(&endpoint.host, endpoint.port);
        let failure = match tokio::time::timeout(timeout, connect).await {
            Ok(Ok(())) => {
                shared.stats.record_connection();
                if shared.config.debug.summary() {
                    tracing::info!(endpoint = %endpoint, "Link reopened after transaction timeout");
                }
                return;
            }
            Ok(Err(raw)) => connect_failure(raw, &endpoint),
            Err(_) => ConnectionError::timed_out(&endpoint.host, endpoint.port, timeout).into(),
        };

        if self.escalate && shared.state() == LinkState::Connected {
            shared.set_state(LinkState::Faulted);
        }
        if shared.config.debug.summary() {
            tracing::warn!(endpoint = %endpoint, error = %failure, "Cannot reopen link after transaction timeout");
        }
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Reads `count` input registers (FC4).
    pub(crate) async fn read_words(&mut self, address: u16, count: u16) -> BcResult<Vec<u16>> {
        let op = Operation::read("read_input_registers", address, count);
        let shared = self.shared;
        let escalate = self.escalate;
        let fut = self.transport.read_input_registers(address, count);
        let result = shared.execute(op, escalate, fut).await;
        let words = self.settle(result).await?;
        check_payload(&op, words)
    }

    /// Reads one input register (FC4).
    pub(crate) async fn read_word(&mut self, address: u16) -> BcResult<u16> {
        let words = self.read_words(address, 1).await?;
        Ok(words[0])
    }

    /// Reads `count` holding registers (FC3).
    pub(crate) async fn read_holding(&mut self, address: u16, count: u16) -> BcResult<Vec<u16>> {
        let op = Operation::read("read_holding_registers", address, count);
        let shared = self.shared;
        let escalate = self.escalate;
        let fut = self.transport.read_holding_registers(address, count);
        let result = shared.execute(op, escalate, fut).await;
        let words = self.settle(result).await?;
        check_payload(&op, words)
    }

    /// Reads `count` discrete inputs (FC2).
    pub(crate) async fn read_discrete_inputs(&mut self, address: u16, count: u16) -> BcResult<Vec<bool>> {
        let op = Operation::read("read_discrete_inputs", address, count);
        let shared = self.shared;
        let escalate = self.escalate;
        let fut = self.transport.read_discrete_inputs(address, count);
        let result = shared.execute(op, escalate, fut).await;
        let bits = self.settle(result).await?;
        check_payload(&op, bits)
    }

    /// Reads `count` coils (FC1).
    pub(crate) async fn read_coils(&mut self, address: u16, count: u16) -> BcResult<Vec<bool>> {
        let op = Operation::read("read_coils", address, count);
        let shared = self.shared;
        let escalate = self.escalate;
        let fut = self.transport.read_coils(address, count);
        let result = shared.execute(op, escalate, fut).await;
        let bits = self.settle(result).await?;
        check_payload(&op, bits)
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Writes one register (FC6).
    pub(crate) async fn write_word(&mut self, address: u16, value: u16) -> BcResult<()> {
        let op = Operation::write("write_single_register", address, 1);
        let shared = self.shared;
        let escalate = self.escalate;
        let fut = self.transport.write_single_register(address, value);
        let result = shared.execute(op, escalate, fut).await;
        let ack = self.settle(result).await?;
        check_ack(&op, ack)
    }

    /// Writes consecutive registers (FC16).
    pub(crate) async fn write_words(&mut self, address: u16, values: &[u16]) -> BcResult<()> {
        let op = Operation::write("write_multiple_registers", address, quantity(values.len())?);
        let shared = self.shared;
        let escalate = self.escalate;
        let fut = self.transport.write_multiple_registers(address, values);
        let result = shared.execute(op, escalate, fut).await;
        let ack = self.settle(result).await?;
        check_ack(&op, ack)
    }

    /// Writes consecutive coils (FC15).
    pub(crate) async fn write_coils(&mut self, address: u16, values: &[bool]) -> BcResult<()> {
        let op = Operation::write("write_multiple_coils", address, quantity(values.len())?);
        let shared = self.shared;
        let escalate = self.escalate;
        let fut = self.transport.write_multiple_coils(address, values);
        let result = shared.execute(op, escalate, fut).await;
        let ack = self.settle(result).await?;
        check_ack(&op, ack)
    }
}

impl<T: ModbusTransport> Shared<T> {
    /// Runs one transport call under the operation timeout.
    pub(crate) async fn execute<R, F>(&self, op: Operation, escalate: bool, fut: F) -> BcResult<R>
    where
        F: Future<Output = TransportResult<R>>,
    {
        let started = Instant::now();
        let timeout = self.config.operation_timeout;

        let result = match tokio::time::timeout(timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(raw)) => Err(raw.classify(&op)),
            Err(_) => Err(TimeoutError::for_operation(&op, timeout).into()),
        };
        let elapsed = started.elapsed();

        match &result {
            Ok(_) => self.stats.record_success(elapsed),
            Err(e) => {
                self.stats.record_error();
                if escalate && e.is_link_fault() && self.state() == LinkState::Connected {
                    self.set_state(LinkState::Faulted);
                }
            }
        }

        if self.config.debug.transactions() {
            match &result {
                Ok(_) => tracing::debug!(
                    operation = op.name,
                    address = format_args!("{:#06x}", op.address),
                    quantity = op.quantity,
                    elapsed_us = elapsed.as_micros() as u64,
                    "Modbus transaction"
                ),
                Err(e) => tracing::debug!(
                    operation = op.name,
                    address = format_args!("{:#06x}", op.address),
                    quantity = op.quantity,
                    elapsed_us = elapsed.as_micros() as u64,
                    code = e.code(),
                    error = %e,
                    "Modbus transaction failed"
                ),
            }
        }

        result
    }
}

/// Maps a raw connect failure to a connection error.
fn connect_failure(raw: TransportError, endpoint: &Endpoint) -> BcError {
    let error = match raw {
        TransportError::Refused { host, port } => ConnectionError::refused(host, port),
        TransportError::Resolve(hostname) => ConnectionError::dns_failed(hostname),
        TransportError::Timeout(duration) => {
            ConnectionError::timed_out(&endpoint.host, endpoint.port, duration)
        }
        TransportError::Io(e) if e.kind() == io::ErrorKind::ConnectionRefused => {
            ConnectionError::refused_with(&endpoint.host, endpoint.port, e)
        }
        TransportError::Io(e) => ConnectionError::io(format!("connect to {endpoint} failed"), e),
        other => ConnectionError::closed(Some(other.to_string())),
    };
    error.into()
}

fn quantity(len: usize) -> BcResult<u16> {
    u16::try_from(len).map_err(|_| BcError::data_size("write payload", len, usize::from(u16::MAX)))
}

fn check_payload<V>(op: &Operation, mut values: Vec<V>) -> BcResult<Vec<V>> {
    let requested = usize::from(op.quantity);
    if values.is_empty() && requested > 0 {
        return Err(BcError::DataEmptyAnswer {
            operation: op.name,
            address: op.address,
        });
    }
    if values.len() < requested {
        return Err(BcError::data_size(op.to_string(), requested, values.len()));
    }
    // Coil reads are padded to whole bytes.
    values.truncate(requested);
    Ok(values)
}

fn check_ack(op: &Operation, ack: WriteAck) -> BcResult<()> {
    if ack.address != op.address || ack.quantity != op.quantity {
        return Err(BcError::WrongRegData {
            address: op.address,
            message: format!(
                "write of {} at {:#06x} acknowledged as {} at {:#06x}",
                op.quantity, op.address, ack.quantity, ack.address
            ),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ExceptionKind;

    #[test]
    fn test_check_payload() {
        let op = Operation::read("read_input_registers", 0x1100, 3);
        assert_eq!(check_payload(&op, vec![1u16, 2, 3]).unwrap(), vec![1, 2, 3]);
        assert_eq!(
            check_payload(&op, Vec::<u16>::new()).unwrap_err().kind(),
            ExceptionKind::DataEmptyAnswer
        );
        assert_eq!(check_payload(&op, vec![1u16]).unwrap_err().kind(), ExceptionKind::DataSize);

        let coils = Operation::read("read_coils", 0, 3);
        assert_eq!(check_payload(&coils, vec![true; 8]).unwrap().len(), 3);
    }

    #[test]
    fn test_connect_failure_is_connection_error() {
        let endpoint = Endpoint::parse("10.0.0.5", 502).unwrap();

        let refused = connect_failure(
            TransportError::Io(io::Error::from(io::ErrorKind::ConnectionRefused)),
            &endpoint,
        );
        assert!(matches!(refused, BcError::Connection(ConnectionError::Refused { .. })));

        let dns = connect_failure(TransportError::Resolve("plc.invalid".into()), &endpoint);
        assert!(!dns.is_retryable());

        let other = connect_failure(TransportError::Protocol("bad frame".into()), &endpoint);
        assert!(other.is_link_fault());
    }

    #[test]
    fn test_check_ack() {
        let op = Operation::write("write_multiple_registers", 10, 2);
        assert!(check_ack(&op, WriteAck::new(10, 2)).is_ok());
        assert_eq!(check_ack(&op, WriteAck::new(10, 1)).unwrap_err().kind(), ExceptionKind::WrongRegData);
        assert_eq!(check_ack(&op, WriteAck::new(11, 2)).unwrap_err().kind(), ExceptionKind::WrongRegData);
    }
}

// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Modbus TCP Transport Integration Tests
//!
//! Drives [`ModbusTcpTransport`] against a minimal Modbus TCP server on a
//! local socket. Unlike the simulator, the server can answer after the
//! client has given up, and it can echo writes with a different address.
//!
//! Register `a` below `0x1100` reads as the value `a`; everything from
//! `0x1100` up reads as zero, so the bus is empty.

use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use brbc_modbus::{BusController, ExceptionKind, InfoValue, LinkState, ModbusTcpTransport};
use brbc_tests::prelude::*;
use parking_lot::Mutex;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

// =============================================================================
// Wire server
// =============================================================================

#[derive(Default)]
struct ServerState {
    /// One-shot answer delays per start address.
    delays: HashMap<u16, Duration>,
    /// One-shot wrong echoes per written address.
    bad_echoes: HashSet<u16>,
    accepted: usize,
}

#[derive(Clone)]
struct WireServer {
    addr: SocketAddr,
    state: Arc<Mutex<ServerState>>,
}

impl WireServer {
    async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let state = Arc::new(Mutex::new(ServerState::default()));

        let shared = Arc::clone(&state);
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                shared.lock().accepted += 1;
                tokio::spawn(serve(stream, Arc::clone(&shared)));
            }
        });

        Self { addr, state }
    }

    fn delay_once(&self, address: u16, delay: Duration) {
        self.state.lock().delays.insert(address, delay);
    }

    fn bad_echo_once(&self, address: u16) {
        self.state.lock().bad_echoes.insert(address);
    }

    fn accepted(&self) -> usize {
        self.state.lock().accepted
    }
}

fn word_at(address: u16) -> u16 {
    if address >= 0x1100 {
        0
    } else {
        address
    }
}

fn be(pdu: &[u8], at: usize) -> u16 {
    u16::from_be_bytes([pdu[at], pdu[at + 1]])
}

async fn serve(mut stream: TcpStream, state: Arc<Mutex<ServerState>>) {
    let mut header = [0u8; 7];
    loop {
        if stream.read_exact(&mut header).await.is_err() {
            return;
        }
        let length = usize::from(u16::from_be_bytes([header[4], header[5]]));
        let mut pdu = vec![0u8; length.saturating_sub(1)];
        if stream.read_exact(&mut pdu).await.is_err() {
            return;
        }

        let function = pdu[0];
        let address = be(&pdu, 1);
        let delay = state.lock().delays.remove(&address);

        let reply = match function {
            0x03 | 0x04 => {
                let count = be(&pdu, 3);
                let mut reply = vec![function, (count * 2) as u8];
                for i in 0..count {
                    reply.extend_from_slice(&word_at(address + i).to_be_bytes());
                }
                reply
            }
            0x06 => {
                let echoed = if state.lock().bad_echoes.remove(&address) {
                    address + 1
                } else {
                    address
                };
                let mut reply = vec![function];
                reply.extend_from_slice(&echoed.to_be_bytes());
                reply.extend_from_slice(&pdu[3..5]);
                reply
            }
            0x0F | 0x10 => pdu[..5].to_vec(),
            _ => vec![function | 0x80, 0x01],
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut frame = Vec::with_capacity(7 + reply.len());
        frame.extend_from_slice(&header[..4]);
        frame.extend_from_slice(&((reply.len() + 1) as u16).to_be_bytes());
        frame.push(header[6]);
        frame.extend_from_slice(&reply);
        if stream.write_all(&frame).await.is_err() {
            return;
        }
    }
}

async fn connected_client(server: &WireServer) -> BusController<ModbusTcpTransport> {
    init_test_logging();
    let client = BusController::new(ModbusTcpTransport::new(1), ConfigFixtures::fast()).unwrap();
    client
        .connect(&server.addr.ip().to_string(), server.addr.port())
        .await
        .unwrap();
    client
}

// =============================================================================
// Tests
// =============================================================================

#[tokio::test]
async fn test_tcp_connect_against_empty_bus() {
    let server = WireServer::start().await;
    let client = connected_client(&server).await;

    assert!(client.modules().is_empty());
    // The threshold register reads as 0x1040 = 4160ms.
    assert_eq!(client.refresh_period(), Duration::from_millis(2080));
    assert_eq!(server.accepted(), 1);

    client.disconnect().await;
}

#[tokio::test]
async fn test_tcp_late_answer_is_not_read_by_next_call() {
    let server = WireServer::start().await;
    let client = connected_client(&server).await;
    let info = client.info();

    // Answered after the 200ms operation timeout.
    server.delay_once(0x1041, Duration::from_millis(400));
    let err = info.get("watchdog_elapsed").await.unwrap_err();
    assert_eq!(err.kind(), ExceptionKind::Timeout);

    // Each following call gets its own answer.
    assert_eq!(info.get("watchdog_threshold").await.unwrap(), InfoValue::Word(0x1040));
    assert_eq!(info.get("watchdog_elapsed").await.unwrap(), InfoValue::Word(0x1041));
    assert_eq!(info.get("watchdog_status").await.unwrap(), InfoValue::Word(0x1042));

    assert_eq!(client.state(), LinkState::Connected);
    assert_eq!(server.accepted(), 2);

    client.disconnect().await;
}

#[tokio::test]
async fn test_tcp_write_echo_mismatch() {
    let server = WireServer::start().await;
    let client = connected_client(&server).await;
    let info = client.info();

    server.bad_echo_once(0x1181);
    let err = info
        .set("misc_init_delay", InfoValue::Word(250))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ExceptionKind::WrongRegData);
    assert_eq!(err.code(), 15);

    // The echo was a well-formed frame; the link stays usable.
    assert!(client.is_connected());
    info.set("misc_init_delay", InfoValue::Word(250)).await.unwrap();
    assert_eq!(server.accepted(), 1);

    client.disconnect().await;
}

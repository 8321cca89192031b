// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Background refresh task.
//!
//! Each tick re-reads the module count, re-enumerates if it changed and
//! resets the controller watchdog. Tick failures are counted; reaching
//! `max_tick_failures` consecutive failures closes the link and parks a
//! [`BcError::Watchdog`] for the next explicit call.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};

use super::session::Session;
use super::transport::ModbusTransport;
use super::Shared;
use crate::error::{BcError, BcResult};
use crate::modules;
use crate::registers::{CMD_ON, PROCESS_DATA, WATCHDOG_RESET};
use crate::types::LinkState;

// =============================================================================
// RefreshHandle
// =============================================================================

/// Owner side of a running refresh task.
pub(crate) struct RefreshHandle {
    shutdown: Arc<Notify>,
    period_tx: watch::Sender<Duration>,
    task: Option<JoinHandle<()>>,
}

impl RefreshHandle {
    /// Spawns the refresh task. The first tick fires one `period` from now.
    pub(crate) fn spawn<T: ModbusTransport + 'static>(shared: Arc<Shared<T>>, period: Duration) -> Self {
        let shutdown = Arc::new(Notify::new());
        let (period_tx, period_rx) = watch::channel(period);
        let task = tokio::spawn(run(shared, Arc::clone(&shutdown), period_rx));

        Self {
            shutdown,
            period_tx,
            task: Some(task),
        }
    }

    /// Changes the tick period. The next tick fires one new period from now.
    pub(crate) fn reschedule(&self, period: Duration) {
        self.period_tx.send_replace(period);
    }

    /// Stops the task and waits for it to exit.
    ///
    /// A tick in progress finishes (or times out) first.
    pub(crate) async fn stop(mut self) {
        self.shutdown.notify_one();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                if e.is_panic() {
                    tracing::error!(error = %e, "Refresh task panicked");
                }
            }
        }
    }
}

impl Drop for RefreshHandle {
    fn drop(&mut self) {
        // Lets a detached task exit at its next wakeup.
        if self.task.is_some() {
            self.shutdown.notify_one();
        }
    }
}

// =============================================================================
// Task
// =============================================================================

enum Tick {
    Done,
    /// Link left the connected state outside the task.
    Stop,
}

fn ticker(period: Duration) -> Interval {
    let mut interval = interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

async fn run<T: ModbusTransport + 'static>(
    shared: Arc<Shared<T>>,
    shutdown: Arc<Notify>,
    mut period_rx: watch::Receiver<Duration>,
) {
    let debug = shared.config.debug;
    let max_failures = shared.config.max_tick_failures;
    let mut interval = ticker(*period_rx.borrow_and_update());
    let mut failures = 0u32;

    loop {
        tokio::select! {
            biased;

            _ = shutdown.notified() => break,

            changed = period_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let period = *period_rx.borrow_and_update();
                interval = ticker(period);
                if debug.summary() {
                    tracing::info!(refresh_ms = period.as_millis() as u64, "Refresh rescheduled");
                }
            }

            _ = interval.tick() => match tick(&shared).await {
                Ok(Tick::Done) => {
                    failures = 0;
                    shared.stats.record_refresh(true);
                    shared.mark_refreshed();
                }
                Ok(Tick::Stop) => break,
                Err(e) => {
                    failures += 1;
                    shared.stats.record_refresh(false);
                    if debug.summary() {
                        tracing::warn!(
                            failures,
                            max_failures,
                            code = e.code(),
                            error = %e,
                            "Refresh tick failed"
                        );
                    }
                    if failures >= max_failures {
                        trip(&shared, failures, &e).await;
                        break;
                    }
                }
            },
        }
    }

    if debug.transactions() {
        tracing::debug!("Refresh task stopped");
    }
}

async fn tick<T: ModbusTransport>(shared: &Shared<T>) -> BcResult<Tick> {
    let guard = shared.transport.lock().await;
    let mut session = Session::new(guard, shared, false);

    match shared.state() {
        LinkState::Connected => {}
        LinkState::Faulted => {
            session.close().await;
            shared.set_state(LinkState::Disconnected);
            return Ok(Tick::Stop);
        }
        LinkState::Disconnected | LinkState::Connecting => return Ok(Tick::Stop),
    }

    let count = session.read_word(PROCESS_DATA).await?;
    let known = shared.directory().len();
    if usize::from(count) != known {
        if shared.config.debug.summary() {
            tracing::info!(previous = known, current = count, "Module count changed, re-enumerating");
        }
        let directory = modules::enumerate(&mut session, shared.catalog.as_ref()).await?;
        shared.replace_directory(directory);
    }

    session.write_word(WATCHDOG_RESET, CMD_ON).await?;
    Ok(Tick::Done)
}

/// Closes the link after too many failed ticks.
async fn trip<T: ModbusTransport>(shared: &Shared<T>, failures: u32, last: &BcError) {
    let guard = shared.transport.lock().await;
    let mut session = Session::new(guard, shared, false);

    shared.set_state(LinkState::Faulted);
    session.close().await;

    let fault = BcError::Watchdog {
        failures,
        last_error: last.to_string(),
    };
    fault.log("refresh");
    shared.stats.record_watchdog_trip();
    shared.park_fault(fault);
    shared.set_state(LinkState::Disconnected);
}

// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `monitor` command.

use anyhow::Context;
use brbc_modbus::LinkState;
use serde_json::json;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use super::{json_output, print_json, Controller};
use crate::cli::{Cli, MonitorArgs};
use crate::error::BinResult;

/// Keeps the link up with the refresh task running and prints status lines
/// until Ctrl+C, `--count` lines or a link loss.
pub async fn monitor(cli: &Cli, controller: &Controller, args: MonitorArgs) -> BinResult<()> {
    let mut ticker = interval_at(Instant::now() + args.interval, args.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let mut printed = 0u64;
    loop {
        tokio::select! {
            signal = &mut ctrl_c => {
                signal.context("failed to listen for Ctrl+C")?;
                tracing::info!("Interrupted, disconnecting");
                return Ok(());
            }
            _ = ticker.tick() => {
                print_status(cli, controller)?;
                printed += 1;

                if controller.state() != LinkState::Connected {
                    // Surfaces the parked watchdog fault, if any.
                    controller.info().watchdog_threshold().await?;
                    return Ok(());
                }
                if args.count.is_some_and(|count| printed >= count) {
                    return Ok(());
                }
            }
        }
    }
}

fn print_status(cli: &Cli, controller: &Controller) -> BinResult<()> {
    let stats = controller.stats().snapshot();
    let last_refresh = controller.last_refresh().map(|t| t.to_rfc3339());

    if json_output(cli) {
        return print_json(&json!({
            "state": controller.state(),
            "modules": controller.modules().len(),
            "refresh_ms": controller.refresh_period().as_millis() as u64,
            "last_refresh": last_refresh,
            "stats": stats,
        }));
    }

    println!(
        "{} modules={} refresh={} last={} ticks={} tick_failures={} requests={} failed={}",
        controller.state(),
        controller.modules().len(),
        humantime::format_duration(controller.refresh_period()),
        last_refresh.as_deref().unwrap_or("-"),
        stats.refresh_ticks,
        stats.refresh_failures,
        stats.total_requests,
        stats.failed_requests,
    );
    Ok(())
}

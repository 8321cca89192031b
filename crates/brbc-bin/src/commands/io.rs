// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the channel read and write commands.

use serde_json::json;

use super::{json_output, print_json, Controller};
use crate::cli::{Cli, ReadArgs, WriteAnalogArgs, WriteDigitalArgs};
use crate::error::BinResult;

/// Channel kind selected by the read command name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    /// `read-di`
    DigitalIn,
    /// `read-do`
    DigitalOut,
    /// `read-ai`
    AnalogIn,
    /// `read-ao`
    AnalogOut,
}

impl Channel {
    fn label(&self) -> &'static str {
        match self {
            Self::DigitalIn => "di",
            Self::DigitalOut => "do",
            Self::AnalogIn => "ai",
            Self::AnalogOut => "ao",
        }
    }
}

/// Reads `size` channels of one module.
pub async fn read_channels(
    cli: &Cli,
    controller: &Controller,
    channel: Channel,
    args: ReadArgs,
) -> BinResult<()> {
    let ReadArgs {
        module,
        size,
        offset,
    } = args;

    let values: Vec<i64> = match channel {
        Channel::DigitalIn => bits(controller.read_digital_inputs(module, size, offset).await?),
        Channel::DigitalOut => bits(controller.read_digital_outputs(module, size, offset).await?),
        Channel::AnalogIn => words(controller.read_analog_inputs(module, size, offset).await?),
        Channel::AnalogOut => words(controller.read_analog_outputs(module, size, offset).await?),
    };

    if json_output(cli) {
        return print_json(&json!({
            "module": module,
            "channel": channel.label(),
            "offset": offset,
            "values": values,
        }));
    }

    for (i, value) in values.iter().enumerate() {
        println!("{}[{}] = {}", channel.label(), usize::from(offset) + i, value);
    }
    Ok(())
}

/// Writes digital outputs.
pub async fn write_digital(cli: &Cli, controller: &Controller, args: WriteDigitalArgs) -> BinResult<()> {
    controller
        .write_digital_outputs(args.module, &args.values, args.offset)
        .await?;
    report_write(cli, args.module, "do", args.offset, args.values.len())
}

/// Writes analog outputs.
pub async fn write_analog(cli: &Cli, controller: &Controller, args: WriteAnalogArgs) -> BinResult<()> {
    controller
        .write_analog_outputs(args.module, &args.values, args.offset)
        .await?;
    report_write(cli, args.module, "ao", args.offset, args.values.len())
}

fn report_write(cli: &Cli, module: u16, label: &str, offset: u16, count: usize) -> BinResult<()> {
    if json_output(cli) {
        return print_json(&json!({
            "module": module,
            "channel": label,
            "offset": offset,
            "written": count,
        }));
    }
    if !cli.quiet {
        println!("wrote {count} {label} channel(s) of module {module} from offset {offset}");
    }
    Ok(())
}

fn bits(values: Vec<bool>) -> Vec<i64> {
    values.into_iter().map(i64::from).collect()
}

fn words(values: Vec<i32>) -> Vec<i64> {
    values.into_iter().map(i64::from).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_conversion() {
        assert_eq!(bits(vec![true, false]), vec![1, 0]);
        assert_eq!(words(vec![-5, 65535]), vec![-5, 65535]);
        assert_eq!(Channel::AnalogOut.label(), "ao");
    }
}

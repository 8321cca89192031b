// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `modules` command.

use brbc_modbus::{Module, ModuleDirectory};

use super::{json_output, print_json, Controller};
use crate::cli::{Cli, ModulesArgs};
use crate::error::BinResult;

/// Lists the modules found during connect.
pub async fn modules(cli: &Cli, controller: &Controller, args: ModulesArgs) -> BinResult<()> {
    let directory = controller.modules();

    if json_output(cli) {
        return print_json(directory.as_ref());
    }

    print_table(&directory, args.detail);
    Ok(())
}

fn print_table(directory: &ModuleDirectory, detail: bool) {
    let image = directory.process_image();
    println!(
        "{} module(s), di {} bit(s), do {} bit(s), ai {} word(s), ao {} word(s)",
        directory.len(),
        image.digital_inp_size,
        image.digital_out_size,
        image.analog_inp_size,
        image.analog_out_size
    );
    if directory.is_empty() {
        return;
    }

    println!();
    println!(
        "{:>3}  {:<20} {:>6}  {:<11} {:<13} {:>9} {:>9} {:>9} {:>9}",
        "NR", "NAME", "ID", "STATUS", "SERIAL", "DI", "DO", "AI", "AO"
    );
    for module in directory.iter() {
        println!(
            "{:>3}  {:<20} {:>6}  {:<11} {:<13} {:>9} {:>9} {:>9} {:>9}",
            module.module_nr,
            module.name,
            module.id,
            module.status.to_string(),
            module.serial.as_deref().unwrap_or("-"),
            channel(module.layout.digital_in, module.digital_in_index()),
            channel(module.layout.digital_out, module.digital_out_index()),
            channel(module.layout.analog_in, module.analog_in_index()),
            channel(module.layout.analog_out, module.analog_out_index()),
        );
        if detail {
            print_detail(module);
        }
    }
}

/// `size@index`, or `-` for an absent channel kind.
fn channel(size: u16, index: u16) -> String {
    if size == 0 {
        "-".to_string()
    } else {
        format!("{size}@{index}")
    }
}

fn print_detail(module: &Module) {
    if let Some(condition) = module.condition {
        println!("     condition: {} ({})", condition.name(), condition.code());
    }
    if let Some(config) = &module.config {
        println!(
            "     hw {} model {} firmware {} variant {} index {} size {}",
            config.hw, config.function_model, config.firmware, config.variant, config.index, config.size
        );
    }
    if let Some(reported) = &module.reported_indices {
        if *reported != module.indices {
            println!("     controller reports indices {reported:?}");
        }
    }
    println!("     analog format: {}", module.layout.analog_format);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_cell() {
        assert_eq!(channel(0, 5), "-");
        assert_eq!(channel(4, 2), "4@2");
    }
}

// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `version` command.

use serde_json::json;

use super::{json_output, print_json};
use crate::cli::Cli;
use crate::error::BinResult;

/// Executes the `version` command to display version information.
pub fn version(cli: &Cli) -> BinResult<()> {
    if json_output(cli) {
        return print_json(&json!({
            "brbc": env!("CARGO_PKG_VERSION"),
            "brbc-modbus": brbc_modbus::VERSION,
            "target": std::env::consts::ARCH,
            "os": std::env::consts::OS,
        }));
    }

    println!("brbc - Modbus TCP client for B&R X20BC0087 bus controllers");
    println!();
    println!("Version Information:");
    println!("  brbc:        {}", env!("CARGO_PKG_VERSION"));
    println!("  brbc-modbus: {}", brbc_modbus::VERSION);
    println!();
    println!("Build Information:");
    println!("  Target:      {}", std::env::consts::ARCH);
    println!("  OS:          {}", std::env::consts::OS);
    println!("  Transport:   Modbus TCP (tokio-modbus)");
    println!();
    println!("License: PolyForm Noncommercial License 1.0.0");
    println!("Copyright (c) 2025 Sylvex. All rights reserved.");

    Ok(())
}

// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `validate` command.

use brbc_modbus::HardwareCatalog;

use super::{json_output, print_json};
use crate::cli::{Cli, ValidateArgs};
use crate::config::ConfigLoader;
use crate::error::{BinError, BinResult};

/// Executes the `validate` command to validate configuration.
pub fn validate(cli: &Cli, args: ValidateArgs) -> BinResult<()> {
    let config_path = cli
        .config
        .as_ref()
        .ok_or_else(|| BinError::usage("no configuration file given (use --config or BRBC_CONFIG)"))?;

    let config = ConfigLoader::new()
        .load(config_path)
        .map_err(|e| e.with_context("Configuration validation failed"))?;

    let mut warnings = config.warnings();
    let catalog_size = match config.build_catalog() {
        Ok(catalog) => catalog.len(),
        Err(e) => {
            warnings.push(format!("hardware catalog cannot be loaded: {e}"));
            0
        }
    };

    if json_output(cli) {
        print_json(&serde_json::json!({
            "valid": true,
            "config_path": config_path.display().to_string(),
            "summary": {
                "host": config.controller.host,
                "port": config.port(),
                "unit_id": config.client.unit_id,
                "catalog_entries": catalog_size,
                "debug": config.client.debug.as_u8(),
            },
            "warnings": warnings,
            "config": if args.show_config { Some(&config) } else { None },
        }))?;
    } else {
        println!("✓ Configuration is valid: {}", config_path.display());
        println!();
        println!("Summary:");
        println!("  Controller:      {}:{}", config.controller.host.as_deref().unwrap_or("(none)"), config.port());
        println!("  Unit id:         {}", config.client.unit_id);
        println!("  Catalog entries: {}", catalog_size);
        println!("  Op timeout:      {}", humantime::format_duration(config.client.operation_timeout));
        println!("  Debug level:     {}", config.client.debug);

        if !warnings.is_empty() {
            println!();
            println!("Warnings:");
            for warning in &warnings {
                println!("  ⚠ {}", warning);
            }
        }

        if args.show_config {
            println!();
            println!("Parsed configuration:");
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
    }

    if args.strict && !warnings.is_empty() {
        return Err(BinError::Configuration(format!(
            "Strict mode: {} warning(s) found",
            warnings.len()
        )));
    }

    Ok(())
}

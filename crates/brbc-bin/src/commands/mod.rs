// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! CLI command implementations.
//!
//! Every online command loads the configuration, connects, runs and
//! disconnects again whether or not the command itself failed.

mod control;
mod info;
mod io;
mod modules;
mod monitor;
mod validate;
mod version;

pub use control::{ctrl, watchdog_reset};
pub use info::info;
pub use io::{read_channels, write_analog, write_digital, Channel};
pub use modules::modules;
pub use monitor::monitor;
pub use validate::validate;
pub use version::version;

use std::sync::Arc;

use brbc_modbus::{BusController, DebugLevel, ModbusTcpTransport};
use serde::Serialize;

use crate::cli::{Cli, Commands, OutputFormat};
use crate::config::{AppConfig, ConfigLoader};
use crate::error::{BinError, BinResult};

/// Client type used by all online commands.
pub type Controller = BusController<ModbusTcpTransport>;

/// Executes the appropriate command based on CLI arguments.
pub async fn execute(cli: Cli) -> BinResult<()> {
    match cli.command.clone() {
        Commands::Validate(args) => validate::validate(&cli, args),
        Commands::Version => version::version(&cli),
        Commands::Info(args) if args.list => info::list_fields(&cli),
        command => {
            if let Commands::Ctrl(args) = &command {
                control::confirm(args)?;
            }
            let config = load_config(&cli)?;
            let controller = connect(&cli, &config).await?;
            let result = run_online(&cli, &controller, command).await;
            controller.disconnect().await;
            result
        }
    }
}

async fn run_online(cli: &Cli, controller: &Controller, command: Commands) -> BinResult<()> {
    match command {
        Commands::Modules(args) => modules::modules(cli, controller, args).await,
        Commands::Info(args) => info::info(cli, controller, args).await,
        Commands::ReadDi(args) => io::read_channels(cli, controller, Channel::DigitalIn, args).await,
        Commands::ReadDo(args) => io::read_channels(cli, controller, Channel::DigitalOut, args).await,
        Commands::ReadAi(args) => io::read_channels(cli, controller, Channel::AnalogIn, args).await,
        Commands::ReadAo(args) => io::read_channels(cli, controller, Channel::AnalogOut, args).await,
        Commands::WriteDo(args) => io::write_digital(cli, controller, args).await,
        Commands::WriteAo(args) => io::write_analog(cli, controller, args).await,
        Commands::WatchdogReset => control::watchdog_reset(cli, controller).await,
        Commands::Ctrl(args) => control::ctrl(cli, controller, args).await,
        Commands::Monitor(args) => monitor::monitor(cli, controller, args).await,
        Commands::Validate(_) | Commands::Version => Ok(()),
    }
}

// =============================================================================
// Shared Helpers
// =============================================================================

/// Loads the configuration file, or defaults plus environment overrides
/// when no file is given.
pub fn load_config(cli: &Cli) -> BinResult<AppConfig> {
    let loader = ConfigLoader::new();
    let mut config = match &cli.config {
        Some(path) => loader.load(path)?,
        None => loader.load_defaults()?,
    };

    if let Some(level) = cli.debug {
        config.client.debug = DebugLevel::try_from(level).map_err(BinError::usage)?;
    }
    Ok(config)
}

/// Builds the client and connects to the configured controller.
pub async fn connect(cli: &Cli, config: &AppConfig) -> BinResult<Controller> {
    let endpoint = config.endpoint(cli.host.as_deref(), cli.port)?;
    let catalog = config.build_catalog()?;

    let controller = BusController::tcp_with_catalog(config.client.clone(), Arc::new(catalog))?;
    controller
        .connect(&endpoint.host, endpoint.port)
        .await
        .map_err(|e| BinError::from(e).with_context(format!("connect to {endpoint}")))?;

    tracing::debug!(
        endpoint = %endpoint,
        modules = controller.modules().len(),
        refresh_ms = controller.refresh_period().as_millis() as u64,
        "Connected"
    );
    Ok(controller)
}

/// Prints a value as pretty JSON.
pub(crate) fn print_json<T: Serialize + ?Sized>(value: &T) -> BinResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Returns `true` when results go out as JSON.
pub(crate) fn json_output(cli: &Cli) -> bool {
    cli.output == OutputFormat::Json
}

// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! CLI argument parsing and command definitions.
//!
//! The `brbc` tool talks to one bus controller per invocation:
//!
//! - `modules`: enumerate and list attached modules
//! - `info`: dump controller info fields
//! - `read-di`, `read-do`, `read-ai`, `read-ao`: read module channels
//! - `write-do`, `write-ao`: write module outputs
//! - `watchdog-reset`, `ctrl`: controller commands
//! - `monitor`: stay connected with the refresh task running
//! - `validate`, `version`: offline commands

use std::path::PathBuf;
use std::time::Duration;

use brbc_modbus::{ControllerCommand, InfoGroup};
use clap::{Args, Parser, Subcommand};

// =============================================================================
// Main CLI Structure
// =============================================================================

/// brbc - Modbus TCP client for B&R X20BC0087 bus controllers
#[derive(Parser, Debug)]
#[command(
    name = "brbc",
    author = "Sylvex <contact@sylvex.io>",
    version = brbc_modbus::VERSION,
    about = "Modbus TCP client for B&R X20BC0087 bus controllers",
    long_about = None,
    propagate_version = true
)]
pub struct Cli {
    /// Configuration file path (yaml, toml or json)
    #[arg(short, long, env = "BRBC_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(
        short,
        long,
        default_value = "info",
        env = "BRBC_LOG_LEVEL",
        global = true
    )]
    pub log_level: String,

    /// Log format (text, json, compact)
    #[arg(long, default_value = "text", env = "BRBC_LOG_FORMAT", global = true)]
    pub log_format: LogFormat,

    /// Controller host name or IPv4 address
    #[arg(short = 'H', long, global = true)]
    pub host: Option<String>,

    /// Controller Modbus TCP port
    #[arg(short, long, global = true)]
    pub port: Option<u16>,

    /// Library debug level (0 silent, 1 summaries, 2 every transaction)
    #[arg(
        short,
        long,
        global = true,
        value_parser = clap::value_parser!(u8).range(0..=2)
    )]
    pub debug: Option<u8>,

    /// Output format for command results
    #[arg(short, long, default_value = "text", global = true)]
    pub output: OutputFormat,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Enable verbose output
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

// =============================================================================
// Subcommands
// =============================================================================

/// Available subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Enumerate and list the attached I/O modules
    Modules(ModulesArgs),

    /// Read controller info fields (all fields when no name is given)
    Info(InfoArgs),

    /// Read digital input channels of a module
    ReadDi(ReadArgs),

    /// Read digital output channels of a module
    ReadDo(ReadArgs),

    /// Read analog input channels of a module
    ReadAi(ReadArgs),

    /// Read analog output channels of a module
    ReadAo(ReadArgs),

    /// Write digital output channels of a module
    WriteDo(WriteDigitalArgs),

    /// Write analog output channels of a module
    WriteAo(WriteAnalogArgs),

    /// Reset the controller watchdog once
    WatchdogReset,

    /// Execute a controller command
    Ctrl(CtrlArgs),

    /// Stay connected and print status until Ctrl+C
    Monitor(MonitorArgs),

    /// Validate the configuration file
    Validate(ValidateArgs),

    /// Show version information
    Version,
}

/// Arguments for the `modules` command.
#[derive(Args, Debug, Clone, Default)]
pub struct ModulesArgs {
    /// Show each module's configuration block and condition
    #[arg(long)]
    pub detail: bool,
}

/// Arguments for the `info` command.
#[derive(Args, Debug, Clone, Default)]
pub struct InfoArgs {
    /// Field names, e.g. watchdog_threshold com_ip
    pub names: Vec<String>,

    /// Restrict the dump to one field group
    #[arg(short, long, conflicts_with = "names")]
    pub group: Option<GroupArg>,

    /// List field names instead of reading them
    #[arg(long)]
    pub list: bool,

    /// Write a writable field before reading (repeatable)
    #[arg(long = "set", value_name = "NAME=VALUE")]
    pub set: Vec<String>,
}

/// Arguments for the channel read commands.
#[derive(Args, Debug, Clone)]
pub struct ReadArgs {
    /// Module number (1-based)
    pub module: u16,

    /// Number of channels to read
    pub size: usize,

    /// First channel relative to the module
    #[arg(long, default_value_t = 0)]
    pub offset: u16,
}

/// Arguments for `write-do`.
#[derive(Args, Debug, Clone)]
pub struct WriteDigitalArgs {
    /// Module number (1-based)
    pub module: u16,

    /// Channel values (0/1, true/false, on/off)
    #[arg(required = true, num_args = 1.., value_parser = parse_bit)]
    pub values: Vec<bool>,

    /// First channel relative to the module
    #[arg(long, default_value_t = 0)]
    pub offset: u16,
}

/// Arguments for `write-ao`.
#[derive(Args, Debug, Clone)]
pub struct WriteAnalogArgs {
    /// Module number (1-based)
    pub module: u16,

    /// Channel values
    #[arg(required = true, num_args = 1.., allow_negative_numbers = true)]
    pub values: Vec<i32>,

    /// First channel relative to the module
    #[arg(long, default_value_t = 0)]
    pub offset: u16,
}

/// Arguments for `ctrl`.
#[derive(Args, Debug, Clone)]
pub struct CtrlArgs {
    /// Command to execute
    pub action: CtrlAction,

    /// Confirm commands that erase the configuration or reboot the controller
    #[arg(short, long)]
    pub yes: bool,
}

/// Arguments for `monitor`.
#[derive(Args, Debug, Clone)]
pub struct MonitorArgs {
    /// Status print interval (e.g. 5s, 500ms)
    #[arg(short, long, default_value = "5s", value_parser = humantime::parse_duration)]
    pub interval: Duration,

    /// Stop after this many status lines
    #[arg(long)]
    pub count: Option<u64>,
}

/// Arguments for `validate`.
#[derive(Args, Debug, Clone, Default)]
pub struct ValidateArgs {
    /// Show the resolved configuration
    #[arg(short, long)]
    pub show_config: bool,

    /// Treat warnings as errors
    #[arg(long)]
    pub strict: bool,
}

// =============================================================================
// Value Enums
// =============================================================================

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    /// Human-readable text format
    #[default]
    Text,
    /// JSON structured format
    Json,
    /// Compact single-line format
    Compact,
}

/// Output format for command results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text
    #[default]
    Text,
    /// JSON
    Json,
}

/// Controller command selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum CtrlAction {
    /// Save the configuration to flash
    Save,
    /// Load the configuration from flash
    Load,
    /// Erase the configuration in flash
    Erase,
    /// Reboot the controller
    Reboot,
    /// Close all Modbus connections of the controller
    Close,
    /// Reset to factory defaults, save and reboot
    ResetCfg,
}

impl CtrlAction {
    /// Returns `true` if the command loses configuration or drops the link.
    pub fn is_destructive(&self) -> bool {
        matches!(self, Self::Erase | Self::Reboot | Self::ResetCfg)
    }
}

impl From<CtrlAction> for ControllerCommand {
    fn from(action: CtrlAction) -> Self {
        match action {
            CtrlAction::Save => ControllerCommand::Save,
            CtrlAction::Load => ControllerCommand::Load,
            CtrlAction::Erase => ControllerCommand::Erase,
            CtrlAction::Reboot => ControllerCommand::Reboot,
            CtrlAction::Close => ControllerCommand::Close,
            CtrlAction::ResetCfg => ControllerCommand::ResetCfg,
        }
    }
}

/// Info field group selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum GroupArg {
    /// Ethernet and X2X settings
    Communication,
    /// Watchdog
    Watchdog,
    /// Product identification
    Productdata,
    /// Modbus server statistics
    Modbus,
    /// Process data counts
    Process,
    /// Miscellaneous settings and status
    Misc,
    /// X2X bus statistics
    X2x,
    /// Network statistics
    Network,
}

impl From<GroupArg> for InfoGroup {
    fn from(group: GroupArg) -> Self {
        match group {
            GroupArg::Communication => InfoGroup::Communication,
            GroupArg::Watchdog => InfoGroup::Watchdog,
            GroupArg::Productdata => InfoGroup::ProductData,
            GroupArg::Modbus => InfoGroup::Modbus,
            GroupArg::Process => InfoGroup::Process,
            GroupArg::Misc => InfoGroup::Misc,
            GroupArg::X2x => InfoGroup::X2x,
            GroupArg::Network => InfoGroup::Network,
        }
    }
}

fn parse_bit(text: &str) -> Result<bool, String> {
    match text.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "on" => Ok(true),
        "0" | "false" | "off" => Ok(false),
        other => Err(format!("'{other}' is not a channel value (use 0/1, true/false, on/off)")),
    }
}

// =============================================================================
// CLI Helper Methods
// =============================================================================

impl Cli {
    /// Parse CLI arguments from the command line.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Get the effective log level based on flags.
    ///
    /// Debug level 2 raises the library target to `debug` so per-transaction
    /// events are visible without changing the global level.
    pub fn effective_log_level(&self) -> String {
        let base = if self.quiet {
            "warn"
        } else if self.verbose {
            "debug"
        } else {
            self.log_level.as_str()
        };

        if self.debug == Some(2) && !self.quiet && !self.verbose {
            format!("{base},brbc_modbus=debug")
        } else {
            base.to_string()
        }
    }

    /// Returns `true` if the command needs a controller connection.
    pub fn needs_connection(&self) -> bool {
        !matches!(
            self.command,
            Commands::Validate(_) | Commands::Version | Commands::Info(InfoArgs { list: true, .. })
        )
    }
}

// =============================================================================
// Tests
// =============================================================================

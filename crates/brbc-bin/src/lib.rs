// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # brbc-bin
//!
//! Library half of the `brbc` command-line tool: argument parsing,
//! configuration loading, logging setup and the command implementations.
//! The binary in `main.rs` only wires these together.

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod logging;

pub use cli::Cli;
pub use config::{AppConfig, ConfigFormat, ConfigLoader};
pub use error::{BinError, BinResult};

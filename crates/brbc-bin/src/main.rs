// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! brbc - Modbus TCP client for B&R X20BC0087 bus controllers
//!
//! Main binary entry point.

use brbc_bin::error::report_error_and_exit;
use brbc_bin::logging::init_logging;
use brbc_bin::{commands, Cli};

#[tokio::main]
async fn main() {
    let cli = Cli::parse_args();
    init_logging(&cli.effective_log_level(), cli.log_format);

    if let Err(error) = commands::execute(cli).await {
        report_error_and_exit(error);
    }
}

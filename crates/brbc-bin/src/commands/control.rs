// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `watchdog-reset` and `ctrl` commands.

use brbc_modbus::ControllerCommand;
use serde_json::json;

use super::{json_output, print_json, Controller};
use crate::cli::{Cli, CtrlArgs};
use crate::error::{BinError, BinResult};

/// Resets the watchdog and prints the resulting refresh period.
pub async fn watchdog_reset(cli: &Cli, controller: &Controller) -> BinResult<()> {
    let period = controller.watchdog_reset().await?;

    if json_output(cli) {
        return print_json(&json!({ "refresh_ms": period.as_millis() as u64 }));
    }
    println!("watchdog reset, refresh period {}", humantime::format_duration(period));
    Ok(())
}

/// Rejects destructive commands without `--yes`.
pub fn confirm(args: &CtrlArgs) -> BinResult<()> {
    if args.action.is_destructive() && !args.yes {
        return Err(BinError::usage(format!(
            "'{}' changes the controller state irreversibly; pass --yes to confirm",
            ControllerCommand::from(args.action)
        )));
    }
    Ok(())
}

/// Executes a controller command.
pub async fn ctrl(cli: &Cli, controller: &Controller, args: CtrlArgs) -> BinResult<()> {
    confirm(&args)?;
    let command = ControllerCommand::from(args.action);

    controller.info().execute(command).await?;

    if json_output(cli) {
        return print_json(&json!({ "command": command.name(), "done": true }));
    }
    if !cli.quiet {
        println!("{command} done");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::CtrlAction;

    #[test]
    fn test_confirm() {
        let erase = CtrlArgs {
            action: CtrlAction::Erase,
            yes: false,
        };
        assert_eq!(confirm(&erase).unwrap_err().exit_code(), 64);
        assert!(confirm(&CtrlArgs { yes: true, ..erase }).is_ok());
        assert!(confirm(&CtrlArgs {
            action: CtrlAction::Save,
            yes: false,
        })
        .is_ok());
    }
}

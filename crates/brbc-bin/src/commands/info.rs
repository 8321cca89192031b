// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `info` command.

use brbc_modbus::registers::{info_field, INFO_FIELDS};
use brbc_modbus::{
    BcError, ControllerInfo, InfoEntry, InfoField, InfoGroup, InfoValue, ModbusTcpTransport,
};
use serde_json::{json, Map, Value};

use super::{json_output, print_json, Controller};
use crate::cli::{Cli, InfoArgs};
use crate::error::{BinError, BinResult};

/// Reads (and optionally writes) controller info fields.
pub async fn info(cli: &Cli, controller: &Controller, args: InfoArgs) -> BinResult<()> {
    let info = controller.info();

    for assignment in &args.set {
        let (name, text) = parse_assignment(assignment)?;
        let field = info_field(name)
            .ok_or_else(|| BinError::usage(format!("unknown controller field '{name}'")))?;
        let value = InfoValue::parse(field.kind, text)?;
        info.set(name, value).await?;
        tracing::info!(field = name, value = text, "Controller field written");
    }

    let entries = if args.names.is_empty() {
        info.read_all(args.group.map(InfoGroup::from)).await?
    } else {
        read_named(&info, &args.names).await?
    };

    if json_output(cli) {
        return print_json(&to_json(&entries));
    }

    for entry in &entries {
        match &entry.value {
            Ok(value) => println!(
                "{:<32} {}{}",
                entry.field.name,
                value,
                entry.field.unit.map(|u| format!(" {u}")).unwrap_or_default()
            ),
            Err(e) => println!("{:<32} <error {}: {}>", entry.field.name, e.code(), e),
        }
    }
    Ok(())
}

/// Prints the field table without connecting.
pub fn list_fields(cli: &Cli) -> BinResult<()> {
    let fields = INFO_FIELDS;

    if json_output(cli) {
        let list: Vec<Value> = fields.iter().map(describe).collect();
        return print_json(&list);
    }

    println!("{:<32} {:>7}  {:<5} {:<14} {}", "NAME", "ADDRESS", "RW", "GROUP", "UNIT");
    for field in fields {
        println!(
            "{:<32} {:>#7x}  {:<5} {:<14} {}",
            field.name,
            field.address,
            if field.is_writable() { "rw" } else { "r" },
            field.group.name(),
            field.unit.unwrap_or("")
        );
    }
    Ok(())
}

/// Named reads fail on the first error, like a direct library call.
async fn read_named(
    info: &ControllerInfo<'_, ModbusTcpTransport>,
    names: &[String],
) -> BinResult<Vec<InfoEntry>> {
    let mut entries = Vec::with_capacity(names.len());
    for name in names {
        let field = info_field(name)
            .ok_or_else(|| BinError::usage(format!("unknown controller field '{name}'")))?;
        let value = info.get(name).await?;
        entries.push(InfoEntry {
            field,
            value: Ok(value),
        });
    }
    Ok(entries)
}

fn parse_assignment(text: &str) -> BinResult<(&str, &str)> {
    text.split_once('=')
        .map(|(name, value)| (name.trim(), value.trim()))
        .filter(|(name, value)| !name.is_empty() && !value.is_empty())
        .ok_or_else(|| BinError::usage(format!("expected NAME=VALUE, got '{text}'")))
}

fn describe(field: &InfoField) -> Value {
    json!({
        "name": field.name,
        "address": field.address,
        "words": field.words(),
        "writable": field.is_writable(),
        "group": field.group.name(),
        "unit": field.unit,
    })
}

fn to_json(entries: &[InfoEntry]) -> Value {
    let mut map = Map::new();
    for entry in entries {
        let value = match &entry.value {
            Ok(value) => serde_json::to_value(value).unwrap_or(Value::Null),
            Err(e) => error_json(e),
        };
        map.insert(entry.field.name.to_string(), value);
    }
    Value::Object(map)
}

fn error_json(error: &BcError) -> Value {
    json!({
        "error": {
            "code": error.code(),
            "kind": error.kind().name(),
            "message": error.to_string(),
        }
    })
}

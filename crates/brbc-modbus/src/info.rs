// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Controller info model.
//!
//! A typed view over the controller's own registers, driven by the
//! [`INFO_FIELDS`] table. Every access is a live transaction; nothing is
//! cached between calls.
//!
//! ```rust,ignore
//! let info = controller.info();
//! let ip = info.get("com_ip").await?;
//! info.set("watchdog_threshold", InfoValue::Word(500)).await?;
//! info.ctrl_save().await?;
//! ```

use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;
use std::time::Duration;

use serde::{Serialize, Serializer};

use crate::client::session::Session;
use crate::client::{BusController, ModbusTransport};
use crate::error::{BcError, BcResult};
use crate::modules::ProcessImage;
use crate::registers::{
    format_serial, info_field, InfoField, InfoGroup, InfoKind, CMD_OFF, CMD_ON, CTRL_CLOSE,
    CTRL_ERASE, CTRL_LOAD, CTRL_REBOOT, CTRL_RESET_CFG, CTRL_RESET_CFG_CHANGED,
    CTRL_RESET_CFG_CONFIRM, CTRL_SAVE, INFO_FIELDS, PROCESS_DATA, PROCESS_DATA_WORDS,
    WATCHDOG_THRESHOLD,
};

// =============================================================================
// InfoValue
// =============================================================================

/// Decoded value of an info field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InfoValue {
    /// One register.
    Word(u16),
    /// Two registers, high word first.
    DWord(u32),
    /// `0xC1` / `0xC0` flag.
    Flag(bool),
    /// IPv4 address.
    Ipv4(Ipv4Addr),
    /// MAC address.
    Mac([u8; 6]),
    /// Serial number.
    Serial(String),
}

impl InfoValue {
    /// Decodes the registers of a field of `kind`.
    pub fn decode(kind: InfoKind, words: &[u16]) -> BcResult<Self> {
        let expected = usize::from(kind.words());
        if words.len() < expected {
            return Err(BcError::data_size("info field", expected, words.len()));
        }

        Ok(match kind {
            InfoKind::Word => Self::Word(words[0]),
            InfoKind::DWord => Self::DWord((u32::from(words[0]) << 16) | u32::from(words[1])),
            InfoKind::Flag => Self::Flag(words[0] == CMD_ON),
            InfoKind::Ipv4 => Self::Ipv4(Ipv4Addr::new(
                words[0] as u8,
                words[1] as u8,
                words[2] as u8,
                words[3] as u8,
            )),
            InfoKind::Mac => {
                let mut mac = [0u8; 6];
                for (pair, word) in mac.chunks_exact_mut(2).zip(words) {
                    pair.copy_from_slice(&word.to_be_bytes());
                }
                Self::Mac(mac)
            }
            InfoKind::Serial => Self::Serial(format_serial(&words[..3])),
        })
    }

    /// Encodes the value for a write to a field of `kind`.
    pub fn encode(&self, kind: InfoKind) -> BcResult<Vec<u16>> {
        match (kind, self) {
            (InfoKind::Word, Self::Word(v)) => Ok(vec![*v]),
            (InfoKind::DWord, Self::DWord(v)) => Ok(vec![(*v >> 16) as u16, *v as u16]),
            (InfoKind::DWord, Self::Word(v)) => Ok(vec![0, *v]),
            (InfoKind::Flag, Self::Flag(v)) => Ok(vec![if *v { CMD_ON } else { CMD_OFF }]),
            (InfoKind::Ipv4, Self::Ipv4(ip)) => Ok(ip.octets().iter().map(|&o| u16::from(o)).collect()),
            (InfoKind::Mac, Self::Mac(mac)) => Ok(mac
                .chunks_exact(2)
                .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
                .collect()),
            (kind, value) => Err(BcError::unhandled(
                "encode info value",
                format!("{} value cannot be written to a {kind:?} field", value.kind_name()),
            )),
        }
    }

    /// Parses a textual value for a field of `kind`.
    pub fn parse(kind: InfoKind, text: &str) -> BcResult<Self> {
        let text = text.trim();
        let invalid = |reason: String| BcError::unhandled("parse info value", reason);

        match kind {
            InfoKind::Word => parse_int(text).map(Self::Word).map_err(invalid),
            InfoKind::DWord => parse_int(text).map(Self::DWord).map_err(invalid),
            InfoKind::Flag => match text.to_ascii_lowercase().as_str() {
                "1" | "true" | "on" | "yes" => Ok(Self::Flag(true)),
                "0" | "false" | "off" | "no" => Ok(Self::Flag(false)),
                _ => Err(invalid(format!("'{text}' is not a flag value"))),
            },
            InfoKind::Ipv4 => Ipv4Addr::from_str(text)
                .map(Self::Ipv4)
                .map_err(|e| invalid(format!("'{text}': {e}"))),
            InfoKind::Mac => {
                let bytes = text
                    .split(['-', ':'])
                    .map(|b| u8::from_str_radix(b, 16))
                    .collect::<Result<Vec<u8>, _>>()
                    .map_err(|e| invalid(format!("'{text}': {e}")))?;
                <[u8; 6]>::try_from(bytes)
                    .map(Self::Mac)
                    .map_err(|_| invalid(format!("'{text}' is not a 6-byte MAC address")))
            }
            InfoKind::Serial => Ok(Self::Serial(text.to_string())),
        }
    }

    fn kind_name(&self) -> &'static str {
        match self {
            Self::Word(_) => "word",
            Self::DWord(_) => "dword",
            Self::Flag(_) => "flag",
            Self::Ipv4(_) => "ipv4",
            Self::Mac(_) => "mac",
            Self::Serial(_) => "serial",
        }
    }

    /// Numeric value of word and dword fields.
    pub fn as_u32(&self) -> Option<u32> {
        match self {
            Self::Word(v) => Some(u32::from(*v)),
            Self::DWord(v) => Some(*v),
            _ => None,
        }
    }
}

fn parse_int<N>(text: &str) -> Result<N, String>
where
    N: TryFrom<u32>,
{
    let parsed = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => text.parse::<u32>(),
    }
    .map_err(|e| format!("'{text}': {e}"))?;
    N::try_from(parsed).map_err(|_| format!("'{text}' is out of range"))
}

impl fmt::Display for InfoValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Word(v) => write!(f, "{v}"),
            Self::DWord(v) => write!(f, "{v}"),
            Self::Flag(v) => write!(f, "{v}"),
            Self::Ipv4(ip) => write!(f, "{ip}"),
            Self::Mac(mac) => {
                let parts: Vec<String> = mac.iter().map(|b| format!("{b:02X}")).collect();
                f.write_str(&parts.join("-"))
            }
            Self::Serial(s) => f.write_str(s),
        }
    }
}

impl Serialize for InfoValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Word(v) => serializer.serialize_u16(*v),
            Self::DWord(v) => serializer.serialize_u32(*v),
            Self::Flag(v) => serializer.serialize_bool(*v),
            other => serializer.collect_str(other),
        }
    }
}

// =============================================================================
// ControllerCommand
// =============================================================================

/// One register write of a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandStep {
    /// Target register.
    pub register: u16,
    /// Value written.
    pub value: u16,
    /// Pause after the write.
    pub delay: Duration,
}

const fn step(register: u16, value: u16, delay_ms: u64) -> CommandStep {
    CommandStep {
        register,
        value,
        delay: Duration::from_millis(delay_ms),
    }
}

/// Controller command registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControllerCommand {
    /// Save the configuration to flash.
    Save,
    /// Load the configuration from flash.
    Load,
    /// Erase the configuration in flash.
    Erase,
    /// Reboot the controller.
    Reboot,
    /// Close all Modbus connections of the controller.
    Close,
    /// Reset the configuration to factory defaults, save and reboot.
    ResetCfg,
}

impl ControllerCommand {
    /// All commands.
    pub const ALL: [ControllerCommand; 6] = [
        Self::Save,
        Self::Load,
        Self::Erase,
        Self::Reboot,
        Self::Close,
        Self::ResetCfg,
    ];

    /// Command name.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Save => "save",
            Self::Load => "load",
            Self::Erase => "erase",
            Self::Reboot => "reboot",
            Self::Close => "close",
            Self::ResetCfg => "reset-cfg",
        }
    }

    /// Register writes of the command, in order.
    pub fn steps(&self) -> Vec<CommandStep> {
        match self {
            Self::Save => vec![step(CTRL_SAVE, CMD_ON, 0)],
            Self::Load => vec![step(CTRL_LOAD, CMD_ON, 0)],
            Self::Erase => vec![step(CTRL_ERASE, CMD_ON, 0)],
            Self::Reboot => vec![step(CTRL_REBOOT, CMD_ON, 0)],
            Self::Close => vec![step(CTRL_CLOSE, CMD_ON, 0)],
            Self::ResetCfg => vec![
                step(CTRL_RESET_CFG, CMD_OFF, 20),
                step(CTRL_RESET_CFG_CONFIRM, CMD_ON, 20),
                step(CTRL_RESET_CFG_CHANGED, CMD_OFF, 50),
                step(CTRL_SAVE, CMD_ON, 2000),
                step(CTRL_REBOOT, CMD_ON, 0),
            ],
        }
    }
}

impl fmt::Display for ControllerCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ControllerCommand {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('_', "-");
        Self::ALL
            .into_iter()
            .find(|c| c.name() == normalized)
            .ok_or_else(|| format!("unknown controller command '{s}'"))
    }
}

// =============================================================================
// ControllerInfo
// =============================================================================

/// Result of reading one field in [`ControllerInfo::read_all`].
#[derive(Debug)]
pub struct InfoEntry {
    /// Field description.
    pub field: &'static InfoField,
    /// Value, or the error of this field's read.
    pub value: BcResult<InfoValue>,
}

/// Typed access to the controller registers of a [`BusController`].
pub struct ControllerInfo<'a, T: ModbusTransport + 'static> {
    controller: &'a BusController<T>,
}

impl<'a, T: ModbusTransport + 'static> ControllerInfo<'a, T> {
    pub(crate) fn new(controller: &'a BusController<T>) -> Self {
        Self { controller }
    }

    /// All known fields.
    pub fn fields() -> &'static [InfoField] {
        INFO_FIELDS
    }

    /// Reads a field by name.
    pub async fn get(&self, name: &str) -> BcResult<InfoValue> {
        let field = lookup(name)?;
        let mut session = self.controller.session().await?;
        read_field(&mut session, field).await
    }

    /// Writes a field by name. Read-only fields are rejected without a
    /// transaction.
    pub async fn set(&self, name: &str, value: InfoValue) -> BcResult<()> {
        let field = lookup(name)?;
        if !field.is_writable() {
            return Err(BcError::unhandled(
                "set info field",
                format!("'{name}' is read-only"),
            ));
        }
        let words = value.encode(field.kind)?;

        let mut session = self.controller.session().await?;
        match words.as_slice() {
            [word] => session.write_word(field.address, *word).await,
            _ => session.write_words(field.address, &words).await,
        }
    }

    /// Reads every field, optionally restricted to one group.
    ///
    /// Per-field failures are reported in the entries; a link failure aborts.
    pub async fn read_all(&self, group: Option<InfoGroup>) -> BcResult<Vec<InfoEntry>> {
        let mut entries = Vec::new();
        for field in INFO_FIELDS.iter().filter(|f| group.map_or(true, |g| f.group == g)) {
            let value = match self.get(field.name).await {
                Err(e) if e.is_link_fault() || matches!(e, BcError::Watchdog { .. }) => return Err(e),
                other => other,
            };
            entries.push(InfoEntry { field, value });
        }
        Ok(entries)
    }

    // =========================================================================
    // Typed helpers
    // =========================================================================

    /// `watchdog_threshold` in milliseconds.
    pub async fn watchdog_threshold(&self) -> BcResult<u16> {
        let mut session = self.controller.session().await?;
        session.read_word(WATCHDOG_THRESHOLD).await
    }

    /// Sets `watchdog_threshold`. Call [`ControllerInfo::watchdog_reset`]
    /// afterwards to apply it to the refresh period.
    pub async fn set_watchdog_threshold(&self, threshold_ms: u16) -> BcResult<()> {
        let mut session = self.controller.session().await?;
        session.write_word(WATCHDOG_THRESHOLD, threshold_ms).await
    }

    /// Resets the watchdog and reschedules the refresh task.
    pub async fn watchdog_reset(&self) -> BcResult<Duration> {
        self.controller.watchdog_reset().await
    }

    /// Process data counts.
    pub async fn process_data(&self) -> BcResult<ProcessImage> {
        let mut session = self.controller.session().await?;
        let words = session.read_words(PROCESS_DATA, PROCESS_DATA_WORDS).await?;
        ProcessImage::from_words(&words)
    }

    /// Current IP address (`com_ip`).
    pub async fn com_ip(&self) -> BcResult<Ipv4Addr> {
        match self.get("com_ip").await? {
            InfoValue::Ipv4(ip) => Ok(ip),
            other => Err(unexpected("com_ip", &other)),
        }
    }

    /// MAC address (`com_mac`).
    pub async fn com_mac(&self) -> BcResult<[u8; 6]> {
        match self.get("com_mac").await? {
            InfoValue::Mac(mac) => Ok(mac),
            other => Err(unexpected("com_mac", &other)),
        }
    }

    /// Controller serial number (`productdata_serial`).
    pub async fn productdata_serial(&self) -> BcResult<String> {
        match self.get("productdata_serial").await? {
            InfoValue::Serial(serial) => Ok(serial),
            other => Err(unexpected("productdata_serial", &other)),
        }
    }

    /// Client refresh period. Not a controller register.
    pub fn modbus_refresh(&self) -> Duration {
        self.controller.refresh_period()
    }

    /// Overrides the client refresh period.
    pub async fn set_modbus_refresh(&self, period: Duration) -> BcResult<()> {
        self.controller.set_refresh_interval(period).await
    }

    // =========================================================================
    // Commands
    // =========================================================================

    /// Runs a command's register writes under one transaction lock.
    pub async fn execute(&self, command: ControllerCommand) -> BcResult<()> {
        let mut session = self.controller.session().await?;
        for step in command.steps() {
            session.write_word(step.register, step.value).await?;
            if !step.delay.is_zero() {
                tokio::time::sleep(step.delay).await;
            }
        }
        if self.controller.debug_level().summary() {
            tracing::info!(command = command.name(), "Controller command executed");
        }
        Ok(())
    }

    /// Saves the configuration to flash.
    pub async fn ctrl_save(&self) -> BcResult<()> {
        self.execute(ControllerCommand::Save).await
    }

    /// Loads the configuration from flash.
    pub async fn ctrl_load(&self) -> BcResult<()> {
        self.execute(ControllerCommand::Load).await
    }

    /// Erases the configuration in flash.
    pub async fn ctrl_erase(&self) -> BcResult<()> {
        self.execute(ControllerCommand::Erase).await
    }

    /// Reboots the controller.
    pub async fn ctrl_reboot(&self) -> BcResult<()> {
        self.execute(ControllerCommand::Reboot).await
    }

    /// Closes all Modbus connections of the controller.
    pub async fn ctrl_close(&self) -> BcResult<()> {
        self.execute(ControllerCommand::Close).await
    }

    /// Resets the configuration to defaults, saves and reboots.
    pub async fn ctrl_reset_cfg(&self) -> BcResult<()> {
        self.execute(ControllerCommand::ResetCfg).await
    }
}

fn lookup(name: &str) -> BcResult<&'static InfoField> {
    info_field(name).ok_or_else(|| {
        BcError::unhandled("info field", format!("unknown controller field '{name}'"))
    })
}

fn unexpected(name: &str, value: &InfoValue) -> BcError {
    BcError::unhandled(name.to_string(), format!("unexpected {} value", value.kind_name()))
}

async fn read_field<T: ModbusTransport>(
    session: &mut Session<'_, T>,
    field: &InfoField,
) -> BcResult<InfoValue> {
    let words = session.read_words(field.address, field.words()).await?;
    InfoValue::decode(field.kind, &words)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ExceptionKind;

    #[test]
    fn test_decode_values() {
        assert_eq!(InfoValue::decode(InfoKind::Word, &[500]).unwrap(), InfoValue::Word(500));
        assert_eq!(
            InfoValue::decode(InfoKind::DWord, &[0x0001, 0x0002]).unwrap(),
            InfoValue::DWord(0x0001_0002)
        );
        assert_eq!(InfoValue::decode(InfoKind::Flag, &[0xC1]).unwrap(), InfoValue::Flag(true));
        assert_eq!(InfoValue::decode(InfoKind::Flag, &[0xC0]).unwrap(), InfoValue::Flag(false));
        assert_eq!(
            InfoValue::decode(InfoKind::Ipv4, &[10, 0, 0, 5]).unwrap(),
            InfoValue::Ipv4(Ipv4Addr::new(10, 0, 0, 5))
        );
        assert_eq!(
            InfoValue::decode(InfoKind::Serial, &[12, 345, 6]).unwrap(),
            InfoValue::Serial("012345006".into())
        );
        assert_eq!(
            InfoValue::decode(InfoKind::Ipv4, &[10, 0]).unwrap_err().kind(),
            ExceptionKind::DataSize
        );
    }

    #[test]
    fn test_mac_display() {
        let mac = InfoValue::decode(InfoKind::Mac, &[0x0060, 0x6504, 0xA1B2]).unwrap();
        assert_eq!(mac, InfoValue::Mac([0x00, 0x60, 0x65, 0x04, 0xA1, 0xB2]));
        assert_eq!(mac.to_string(), "00-60-65-04-A1-B2");
        assert_eq!(InfoValue::parse(InfoKind::Mac, "00:60:65:04:a1:b2").unwrap(), mac);
    }

    #[test]
    fn test_encode_values() {
        assert_eq!(InfoValue::Word(7).encode(InfoKind::Word).unwrap(), vec![7]);
        assert_eq!(
            InfoValue::DWord(0x0001_0002).encode(InfoKind::DWord).unwrap(),
            vec![1, 2]
        );
        assert_eq!(InfoValue::Flag(true).encode(InfoKind::Flag).unwrap(), vec![0xC1]);
        assert_eq!(
            InfoValue::Ipv4(Ipv4Addr::new(192, 168, 1, 20)).encode(InfoKind::Ipv4).unwrap(),
            vec![192, 168, 1, 20]
        );
        assert_eq!(
            InfoValue::Flag(true).encode(InfoKind::Ipv4).unwrap_err().kind(),
            ExceptionKind::Unhandled
        );
    }

    #[test]
    fn test_parse_values() {
        assert_eq!(InfoValue::parse(InfoKind::Word, "0x1F4").unwrap(), InfoValue::Word(500));
        assert_eq!(InfoValue::parse(InfoKind::Flag, "on").unwrap(), InfoValue::Flag(true));
        assert!(InfoValue::parse(InfoKind::Word, "70000").is_err());
        assert!(InfoValue::parse(InfoKind::Ipv4, "10.0.0").is_err());
    }

    #[test]
    fn test_serialize_values() {
        assert_eq!(serde_json::to_string(&InfoValue::Word(5)).unwrap(), "5");
        assert_eq!(
            serde_json::to_string(&InfoValue::Ipv4(Ipv4Addr::new(10, 0, 0, 5))).unwrap(),
            "\"10.0.0.5\""
        );
    }

    #[test]
    fn test_reset_cfg_sequence() {
        let steps = ControllerCommand::ResetCfg.steps();
        let registers: Vec<u16> = steps.iter().map(|s| s.register).collect();
        assert_eq!(registers, vec![0x1145, 0x1146, 0x1188, 0x1140, 0x1143]);
        assert_eq!(steps[3].delay, Duration::from_secs(2));
        assert_eq!(ControllerCommand::Save.steps(), vec![step(0x1140, 0xC1, 0)]);
    }

    #[test]
    fn test_reboot_matches_reset_cfg_reboot() {
        let reboot = ControllerCommand::Reboot.steps();
        assert_eq!(reboot, vec![step(0x1143, 0xC1, 0)]);
        assert_eq!(ControllerCommand::ResetCfg.steps().last(), reboot.first());
    }

    #[test]
    fn test_command_from_str() {
        assert_eq!("reset_cfg".parse::<ControllerCommand>().unwrap(), ControllerCommand::ResetCfg);
        assert_eq!("SAVE".parse::<ControllerCommand>().unwrap(), ControllerCommand::Save);
        assert!("format".parse::<ControllerCommand>().is_err());
    }
}

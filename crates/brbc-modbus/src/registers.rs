// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Register map of the X20BC0087 bus controller.
//!
//! ```text
//! 0x0000..          process image (digital bits, analog words)
//! 0x1000..0x1017    communication
//! 0x1040..0x1044    watchdog
//! 0x1080..0x108F    product data
//! 0x10C0..0x10D4    Modbus statistics
//! 0x1100..0x1108    process data counts
//! 0x1140..0x1146    control commands
//! 0x1180..0x1188    miscellaneous
//! 0x11C0..0x11CF    X2X statistics
//! 0x1200..0x1206    network statistics
//! 0xA000..          module blocks, 16 registers per module
//! ```
//!
//! Everything here is constant data or a pure function; no I/O.

use std::fmt;

use serde::Serialize;

use crate::types::{ChannelKind, ChannelLayout};

// =============================================================================
// Controller Registers
// =============================================================================

/// Command value that triggers an action or sets a flag.
pub const CMD_ON: u16 = 0xC1;
/// Command value that clears a flag.
pub const CMD_OFF: u16 = 0xC0;

/// Watchdog threshold in milliseconds (RW).
pub const WATCHDOG_THRESHOLD: u16 = 0x1040;
/// Watchdog reset command register.
pub const WATCHDOG_RESET: u16 = 0x1044;

/// First process data count register (`process_modules`).
pub const PROCESS_DATA: u16 = 0x1100;
/// Process data count registers starting at [`PROCESS_DATA`].
pub const PROCESS_DATA_WORDS: u16 = 9;

/// I/O boundary check switch (RW).
pub const MISC_CHECK_IO: u16 = 0x1182;

/// Save configuration to flash.
pub const CTRL_SAVE: u16 = 0x1140;
/// Load configuration from flash.
pub const CTRL_LOAD: u16 = 0x1141;
/// Erase configuration in flash.
pub const CTRL_ERASE: u16 = 0x1142;
/// Reboot the controller.
pub const CTRL_REBOOT: u16 = 0x1143;
/// Close all Modbus connections.
pub const CTRL_CLOSE: u16 = 0x1144;
/// First register of the configuration reset sequence.
pub const CTRL_RESET_CFG: u16 = 0x1145;
/// Second register of the configuration reset sequence.
pub const CTRL_RESET_CFG_CONFIRM: u16 = 0x1146;
/// Configuration-changed flag cleared during reset.
pub const CTRL_RESET_CFG_CHANGED: u16 = 0x1188;

// =============================================================================
// Module Blocks
// =============================================================================

/// Address of the first module block.
pub const MODULE_BASE: u16 = 0xA000;
/// Registers per module block.
pub const MODULE_STRIDE: u16 = 16;
/// Identity registers read at the start of a module block.
pub const MODULE_IDENTITY_WORDS: u16 = 8;
/// Configuration registers following the identity registers.
pub const MODULE_CONFIG_WORDS: u16 = 6;
/// Index register value meaning "channel type absent".
pub const INDEX_ABSENT: u16 = 0xFFFF;

/// Returns the block address of a 1-based module number.
///
/// `None` for module 0 or a block beyond the address space.
pub fn module_base(module_nr: u16) -> Option<u16> {
    let position = module_nr.checked_sub(1)?;
    position
        .checked_mul(MODULE_STRIDE)
        .and_then(|offset| MODULE_BASE.checked_add(offset))
        .filter(|base| base.checked_add(MODULE_STRIDE - 1).is_some())
}

/// Per-module registers, relative to [`module_base`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ModuleRegister {
    /// Module status (0 absent, 1 ok, 2 warning, 3 error).
    Status,
    /// Hardware id.
    Id,
    /// Serial number, three words starting at the id register.
    Serial,
    /// Raw analog input index as reported by the controller.
    AnalogInIndex,
    /// Raw analog output index as reported by the controller.
    AnalogOutIndex,
    /// Raw digital input index as reported by the controller.
    DigitalInIndex,
    /// Raw digital output index as reported by the controller.
    DigitalOutIndex,
    /// Hardware configuration (RW).
    CfgHw,
    /// Function model (RW).
    CfgFunctionModel,
    /// Configuration index (RW).
    CfgIndex,
    /// Configuration size (RW).
    CfgSize,
    /// Firmware version.
    CfgFirmware,
    /// Hardware variant.
    CfgVariant,
}

impl ModuleRegister {
    /// All registers in block order.
    pub const ALL: [ModuleRegister; 13] = [
        Self::Status,
        Self::Id,
        Self::Serial,
        Self::AnalogInIndex,
        Self::AnalogOutIndex,
        Self::DigitalInIndex,
        Self::DigitalOutIndex,
        Self::CfgHw,
        Self::CfgFunctionModel,
        Self::CfgIndex,
        Self::CfgSize,
        Self::CfgFirmware,
        Self::CfgVariant,
    ];

    /// Offset inside the module block.
    pub const fn offset(&self) -> u16 {
        match self {
            Self::Status => 0x0,
            Self::Id | Self::Serial => 0x1,
            Self::AnalogInIndex => 0x4,
            Self::AnalogOutIndex => 0x5,
            Self::DigitalInIndex => 0x6,
            Self::DigitalOutIndex => 0x7,
            Self::CfgHw => 0x8,
            Self::CfgFunctionModel => 0x9,
            Self::CfgIndex => 0xA,
            Self::CfgSize => 0xB,
            Self::CfgFirmware => 0xC,
            Self::CfgVariant => 0xD,
        }
    }

    /// Number of registers.
    pub const fn words(&self) -> u16 {
        match self {
            Self::Serial => 3,
            _ => 1,
        }
    }

    /// Returns `true` for registers the master may write.
    pub const fn is_writable(&self) -> bool {
        matches!(
            self,
            Self::CfgHw | Self::CfgFunctionModel | Self::CfgIndex | Self::CfgSize
        )
    }

    /// Field name.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Status => "status",
            Self::Id => "id",
            Self::Serial => "serial",
            Self::AnalogInIndex => "analog_in_index",
            Self::AnalogOutIndex => "analog_out_index",
            Self::DigitalInIndex => "digital_in_index",
            Self::DigitalOutIndex => "digital_out_index",
            Self::CfgHw => "cfg_hw",
            Self::CfgFunctionModel => "cfg_function_model",
            Self::CfgIndex => "cfg_index",
            Self::CfgSize => "cfg_size",
            Self::CfgFirmware => "cfg_firmware",
            Self::CfgVariant => "cfg_variant",
        }
    }

    /// Looks up a register by field name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|reg| reg.name() == name)
    }

    /// Absolute address for a module.
    pub fn address(&self, module_nr: u16) -> Option<u16> {
        module_base(module_nr).map(|base| base + self.offset())
    }
}

impl fmt::Display for ModuleRegister {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Formats a serial number from its three registers.
pub fn format_serial(words: &[u16]) -> String {
    words.iter().map(|w| format!("{w:03}")).collect()
}

// =============================================================================
// Process Image Indices
// =============================================================================

/// Offsets of one module inside the four global process-image arrays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub struct ChannelIndices {
    /// Digital input bit index.
    pub digital_in: u16,
    /// Digital output bit index.
    pub digital_out: u16,
    /// Analog input word index.
    pub analog_in: u16,
    /// Analog output word index.
    pub analog_out: u16,
}

impl ChannelIndices {
    /// Index for a channel kind.
    #[inline]
    pub const fn get(&self, kind: ChannelKind) -> u16 {
        match kind {
            ChannelKind::DigitalIn => self.digital_in,
            ChannelKind::DigitalOut => self.digital_out,
            ChannelKind::AnalogIn => self.analog_in,
            ChannelKind::AnalogOut => self.analog_out,
        }
    }

    fn slot(&mut self, kind: ChannelKind) -> &mut u16 {
        match kind {
            ChannelKind::DigitalIn => &mut self.digital_in,
            ChannelKind::DigitalOut => &mut self.digital_out,
            ChannelKind::AnalogIn => &mut self.analog_in,
            ChannelKind::AnalogOut => &mut self.analog_out,
        }
    }
}

/// Computes every module's process-image indices from the declared layouts.
///
/// Module *k*'s index of each kind is the sum of that kind's sizes over
/// modules 1..k-1. Sums saturate at `u16::MAX`.
pub fn assign_indices(layouts: &[ChannelLayout]) -> Vec<ChannelIndices> {
    let mut next = ChannelIndices::default();
    layouts
        .iter()
        .map(|layout| {
            let current = next;
            for kind in ChannelKind::ALL {
                let slot = next.slot(kind);
                *slot = slot.saturating_add(layout.size(kind));
            }
            current
        })
        .collect()
}

/// Physical address of channel `offset` at process-image `index`.
#[inline]
pub fn physical_address(index: u16, offset: u16) -> Option<u16> {
    index.checked_add(offset)
}

// =============================================================================
// Controller Info Fields
// =============================================================================

/// Read/write capability of a register field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Access {
    /// Read only.
    ReadOnly,
    /// Read and write.
    ReadWrite,
}

impl Access {
    /// Returns `true` for writable fields.
    #[inline]
    pub const fn is_writable(&self) -> bool {
        matches!(self, Self::ReadWrite)
    }
}

/// How a field's registers are decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InfoKind {
    /// One 16-bit register.
    Word,
    /// Two registers, high word first.
    DWord,
    /// One register, `0xC1` set, `0xC0` clear.
    Flag,
    /// Four registers, one octet each.
    Ipv4,
    /// Three registers, two bytes each, big endian.
    Mac,
    /// Three registers, each printed as three digits.
    Serial,
}

impl InfoKind {
    /// Number of registers.
    pub const fn words(&self) -> u16 {
        match self {
            Self::Word | Self::Flag => 1,
            Self::DWord => 2,
            Self::Mac | Self::Serial => 3,
            Self::Ipv4 => 4,
        }
    }
}

/// Register block a field belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InfoGroup {
    /// Ethernet and X2X settings.
    Communication,
    /// Watchdog.
    Watchdog,
    /// Product identification.
    ProductData,
    /// Modbus server statistics.
    Modbus,
    /// Process data counts.
    Process,
    /// Miscellaneous settings and status.
    Misc,
    /// X2X bus statistics.
    X2x,
    /// Network statistics.
    Network,
}

impl InfoGroup {
    /// Group name.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Communication => "communication",
            Self::Watchdog => "watchdog",
            Self::ProductData => "productdata",
            Self::Modbus => "modbus",
            Self::Process => "process",
            Self::Misc => "misc",
            Self::X2x => "x2x",
            Self::Network => "network",
        }
    }
}

/// A named controller register field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InfoField {
    /// Public field name.
    pub name: &'static str,
    /// First register.
    pub address: u16,
    /// Decoding.
    pub kind: InfoKind,
    /// Read/write capability.
    pub access: Access,
    /// Unit, if any.
    pub unit: Option<&'static str>,
    /// Register block.
    pub group: InfoGroup,
}

impl InfoField {
    /// Number of registers.
    #[inline]
    pub const fn words(&self) -> u16 {
        self.kind.words()
    }

    /// Returns `true` if the field is writable.
    #[inline]
    pub const fn is_writable(&self) -> bool {
        self.access.is_writable()
    }
}

const fn field(
    name: &'static str,
    address: u16,
    kind: InfoKind,
    access: Access,
    unit: Option<&'static str>,
    group: InfoGroup,
) -> InfoField {
    InfoField {
        name,
        address,
        kind,
        access,
        unit,
        group,
    }
}

use Access::{ReadOnly as RO, ReadWrite as RW};
use InfoGroup as G;
use InfoKind as K;

/// All controller info fields.
pub const INFO_FIELDS: &[InfoField] = &[
    // Communication
    field("com_mac", 0x1000, K::Mac, RO, None, G::Communication),
    field("com_ip_flash", 0x1003, K::Ipv4, RW, None, G::Communication),
    field("com_subnet_mask", 0x1007, K::Ipv4, RW, None, G::Communication),
    field("com_gateway", 0x100B, K::Ipv4, RW, None, G::Communication),
    field("com_port", 0x100F, K::Word, RW, None, G::Communication),
    field("com_duration", 0x1010, K::Word, RW, Some("ms"), G::Communication),
    field("com_mtu", 0x1011, K::Word, RW, Some("bytes"), G::Communication),
    field("com_x2x", 0x1012, K::Word, RW, None, G::Communication),
    field("com_ip", 0x1013, K::Ipv4, RO, None, G::Communication),
    field("com_x2x_length", 0x1017, K::Word, RW, None, G::Communication),
    // Watchdog
    field("watchdog_threshold", 0x1040, K::Word, RW, Some("ms"), G::Watchdog),
    field("watchdog_elapsed", 0x1041, K::Word, RO, Some("ms"), G::Watchdog),
    field("watchdog_status", 0x1042, K::Word, RO, None, G::Watchdog),
    field("watchdog_mode", 0x1043, K::Word, RW, None, G::Watchdog),
    // Product data
    field("productdata_serial", 0x1080, K::Serial, RO, None, G::ProductData),
    field("productdata_code", 0x1083, K::Word, RO, None, G::ProductData),
    field("productdata_hw_major", 0x1084, K::Word, RO, None, G::ProductData),
    field("productdata_hw_minor", 0x1085, K::Word, RO, None, G::ProductData),
    field("productdata_fw_major", 0x1086, K::Word, RO, None, G::ProductData),
    field("productdata_fw_minor", 0x1087, K::Word, RO, None, G::ProductData),
    field("productdata_hw_fpga", 0x1088, K::Word, RO, None, G::ProductData),
    field("productdata_boot", 0x1089, K::Word, RO, None, G::ProductData),
    field("productdata_fw_major_def", 0x108A, K::Word, RO, None, G::ProductData),
    field("productdata_fw_minor_def", 0x108B, K::Word, RO, None, G::ProductData),
    field("productdata_fw_major_upd", 0x108C, K::Word, RO, None, G::ProductData),
    field("productdata_fw_minor_upd", 0x108D, K::Word, RO, None, G::ProductData),
    field("productdata_fw_fpga_def", 0x108E, K::Word, RO, None, G::ProductData),
    field("productdata_fw_fpga_upd", 0x108F, K::Word, RO, None, G::ProductData),
    // Modbus statistics
    field("modbus_clients", 0x10C0, K::Word, RO, None, G::Modbus),
    field("modbus_global_tel_cnt", 0x10C1, K::DWord, RO, None, G::Modbus),
    field("modbus_local_tel_cnt", 0x10C3, K::DWord, RO, None, G::Modbus),
    field("modbus_global_prot_cnt", 0x10C5, K::DWord, RO, None, G::Modbus),
    field("modbus_local_prot_cnt", 0x10C7, K::DWord, RO, None, G::Modbus),
    field("modbus_global_max_cmd", 0x10C9, K::DWord, RO, None, G::Modbus),
    field("modbus_local_max_cmd", 0x10CB, K::DWord, RO, None, G::Modbus),
    field("modbus_global_min_cmd", 0x10CD, K::DWord, RO, None, G::Modbus),
    field("modbus_local_min_cmd", 0x10CF, K::DWord, RO, None, G::Modbus),
    field("modbus_global_prot_frag_cnt", 0x10D1, K::DWord, RO, None, G::Modbus),
    field("modbus_local_prot_frag_cnt", 0x10D3, K::DWord, RO, None, G::Modbus),
    // Process data
    field("process_modules", 0x1100, K::Word, RO, None, G::Process),
    field("process_analog_inp_cnt", 0x1101, K::Word, RO, None, G::Process),
    field("process_analog_inp_size", 0x1102, K::Word, RO, Some("bytes"), G::Process),
    field("process_analog_out_cnt", 0x1103, K::Word, RO, None, G::Process),
    field("process_analog_out_size", 0x1104, K::Word, RO, Some("bytes"), G::Process),
    field("process_digital_inp_cnt", 0x1105, K::Word, RO, None, G::Process),
    field("process_digital_inp_size", 0x1106, K::Word, RO, Some("bytes"), G::Process),
    field("process_digital_out_cnt", 0x1107, K::Word, RO, None, G::Process),
    field("process_digital_out_size", 0x1108, K::Word, RO, Some("bytes"), G::Process),
    field("process_status_out_cnt", 0x1107, K::Word, RO, None, G::Process),
    field("process_status_out_size", 0x1108, K::Word, RO, Some("bytes"), G::Process),
    field("process_status_x2x_cnt", 0x1105, K::Word, RO, None, G::Process),
    field("process_status_x2x_size", 0x1106, K::Word, RO, Some("bytes"), G::Process),
    // Miscellaneous
    field("misc_node", 0x1180, K::Word, RO, None, G::Misc),
    field("misc_init_delay", 0x1181, K::Word, RW, Some("ms"), G::Misc),
    field("misc_check_io", 0x1182, K::Word, RW, None, G::Misc),
    field("misc_telnet_pw", 0x1183, K::Word, RW, None, G::Misc),
    field("misc_cfg_changed", 0x1184, K::Flag, RW, None, G::Misc),
    field("misc_status", 0x1186, K::Word, RO, None, G::Misc),
    field("misc_status_error", 0x1187, K::Word, RO, None, G::Misc),
    // X2X statistics
    field("x2x_cnt", 0x11C0, K::Word, RO, None, G::X2x),
    field("x2x_bus_off", 0x11C1, K::Word, RO, None, G::X2x),
    field("x2x_syn_err", 0x11C2, K::Word, RO, None, G::X2x),
    field("x2x_syn_bus_timing", 0x11C3, K::Word, RO, None, G::X2x),
    field("x2x_syn_frame_timing", 0x11C4, K::Word, RO, None, G::X2x),
    field("x2x_syn_frame_crc", 0x11C5, K::Word, RO, None, G::X2x),
    field("x2x_syn_frame_pending", 0x11C6, K::Word, RO, None, G::X2x),
    field("x2x_syn_buffer_underrun", 0x11C7, K::Word, RO, None, G::X2x),
    field("x2x_syn_buffer_overflow", 0x11C8, K::Word, RO, None, G::X2x),
    field("x2x_asyn_err", 0x11C9, K::Word, RO, None, G::X2x),
    field("x2x_asyn_bus_timing", 0x11CA, K::Word, RO, None, G::X2x),
    field("x2x_asyn_frame_timing", 0x11CB, K::Word, RO, None, G::X2x),
    field("x2x_asyn_frame_crc", 0x11CC, K::Word, RO, None, G::X2x),
    field("x2x_asyn_frame_pending", 0x11CD, K::Word, RO, None, G::X2x),
    field("x2x_asyn_buffer_underrun", 0x11CE, K::Word, RO, None, G::X2x),
    field("x2x_asyn_buffer_overflow", 0x11CF, K::Word, RO, None, G::X2x),
    // Network statistics
    field("ns_cnt", 0x1200, K::Word, RO, None, G::Network),
    field("ns_lost_cnt", 0x1201, K::Word, RO, None, G::Network),
    field("ns_oversize_cnt", 0x1202, K::Word, RO, None, G::Network),
    field("ns_crc_cnt", 0x1203, K::Word, RO, None, G::Network),
    field("ns_collision_cnt", 0x1206, K::Word, RO, None, G::Network),
];

/// Looks up an info field by name.
pub fn info_field(name: &str) -> Option<&'static InfoField> {
    INFO_FIELDS.iter().find(|f| f.name == name)
}

// =============================================================================
// Tests
// =============================================================================

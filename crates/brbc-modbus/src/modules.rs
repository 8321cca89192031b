// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Module directory: the enumerated bus topology.
//!
//! A [`ModuleDirectory`] is an immutable snapshot built by one enumeration
//! pass. The client swaps the whole snapshot at once, so readers never see a
//! partially rebuilt list.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::catalog::{unknown_name, HardwareCatalog};
use crate::client::session::Session;
use crate::client::ModbusTransport;
use crate::error::{BcError, BcResult, ExceptionKind};
use crate::registers::{
    assign_indices, format_serial, module_base, physical_address, ChannelIndices,
    MODULE_CONFIG_WORDS, MODULE_IDENTITY_WORDS, PROCESS_DATA, PROCESS_DATA_WORDS,
};
use crate::types::{ChannelKind, ChannelLayout};

// =============================================================================
// ModuleStatus
// =============================================================================

/// Status register value of a module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleStatus {
    /// Not configured or not present (0).
    NotPresent,
    /// Operational (1).
    Ok,
    /// Warning condition (2).
    Warning,
    /// Error condition (3).
    Error,
    /// Undocumented value.
    Other(u16),
}

impl ModuleStatus {
    /// Decodes the raw register value.
    pub const fn from_raw(raw: u16) -> Self {
        match raw {
            0 => Self::NotPresent,
            1 => Self::Ok,
            2 => Self::Warning,
            3 => Self::Error,
            other => Self::Other(other),
        }
    }

    /// Raw register value.
    pub const fn as_raw(&self) -> u16 {
        match self {
            Self::NotPresent => 0,
            Self::Ok => 1,
            Self::Warning => 2,
            Self::Error => 3,
            Self::Other(raw) => *raw,
        }
    }

    /// Returns `true` for [`ModuleStatus::Ok`].
    pub const fn is_ok(&self) -> bool {
        matches!(self, Self::Ok)
    }
}

impl fmt::Display for ModuleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotPresent => f.write_str("not present"),
            Self::Ok => f.write_str("ok"),
            Self::Warning => f.write_str("warning"),
            Self::Error => f.write_str("error"),
            Self::Other(raw) => write!(f, "status {raw}"),
        }
    }
}

// =============================================================================
// ModuleConfig
// =============================================================================

/// Controller-side configuration registers of a module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub struct ModuleConfig {
    /// `cfg_hw` (RW).
    pub hw: u16,
    /// `cfg_function_model` (RW).
    pub function_model: u16,
    /// `cfg_index` (RW).
    pub index: u16,
    /// `cfg_size` (RW).
    pub size: u16,
    /// `cfg_firmware`.
    pub firmware: u16,
    /// `cfg_variant`.
    pub variant: u16,
}

impl ModuleConfig {
    fn from_words(words: &[u16]) -> Self {
        Self {
            hw: words[0],
            function_model: words[1],
            index: words[2],
            size: words[3],
            firmware: words[4],
            variant: words[5],
        }
    }
}

// =============================================================================
// ProcessImage
// =============================================================================

/// Process data counts reported by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub struct ProcessImage {
    /// `process_modules`.
    pub modules: u16,
    /// `process_analog_inp_cnt`.
    pub analog_inp_cnt: u16,
    /// `process_analog_inp_size`.
    pub analog_inp_size: u16,
    /// `process_analog_out_cnt`.
    pub analog_out_cnt: u16,
    /// `process_analog_out_size`.
    pub analog_out_size: u16,
    /// `process_digital_inp_cnt`.
    pub digital_inp_cnt: u16,
    /// `process_digital_inp_size`.
    pub digital_inp_size: u16,
    /// `process_digital_out_cnt`.
    pub digital_out_cnt: u16,
    /// `process_digital_out_size`.
    pub digital_out_size: u16,
}

impl ProcessImage {
    /// Decodes the nine registers starting at `process_modules`.
    pub fn from_words(words: &[u16]) -> BcResult<Self> {
        if words.len() < PROCESS_DATA_WORDS as usize {
            return Err(BcError::data_size(
                "process data counts",
                PROCESS_DATA_WORDS as usize,
                words.len(),
            ));
        }
        Ok(Self {
            modules: words[0],
            analog_inp_cnt: words[1],
            analog_inp_size: words[2],
            analog_out_cnt: words[3],
            analog_out_size: words[4],
            digital_inp_cnt: words[5],
            digital_inp_size: words[6],
            digital_out_cnt: words[7],
            digital_out_size: words[8],
        })
    }
}

// =============================================================================
// Module
// =============================================================================

/// Snapshot of one enumerated module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Module {
    /// 1-based bus position.
    pub module_nr: u16,
    /// Status at enumeration time.
    pub status: ModuleStatus,
    /// Hardware id (0 if unreadable).
    pub id: u16,
    /// Catalog name or `unknown (<id>)`.
    pub name: String,
    /// Serial number, `None` if it could not be read.
    pub serial: Option<String>,
    /// Declared channel layout.
    pub layout: ChannelLayout,
    /// Process-image indices computed from the preceding modules.
    pub indices: ChannelIndices,
    /// Raw index registers as reported by the controller.
    pub reported_indices: Option<ChannelIndices>,
    /// Configuration registers, `None` if they could not be read.
    pub config: Option<ModuleConfig>,
    /// Fault recorded during enumeration.
    pub condition: Option<ExceptionKind>,
}

impl Module {
    /// Digital input bit index.
    pub fn digital_in_index(&self) -> u16 {
        self.indices.digital_in
    }

    /// Digital output bit index.
    pub fn digital_out_index(&self) -> u16 {
        self.indices.digital_out
    }

    /// Analog input word index.
    pub fn analog_in_index(&self) -> u16 {
        self.indices.analog_in
    }

    /// Analog output word index.
    pub fn analog_out_index(&self) -> u16 {
        self.indices.analog_out
    }

    /// Declared size for a channel kind.
    pub fn size(&self, kind: ChannelKind) -> u16 {
        self.layout.size(kind)
    }

    /// Returns `true` if the module has channels of `kind`.
    pub fn has(&self, kind: ChannelKind) -> bool {
        self.size(kind) > 0
    }

    /// Validates a channel window and returns its first physical address.
    ///
    /// Checks, in order: zero size, no channels of `kind`, `offset + size`
    /// beyond the declared size, end beyond the Modbus address space.
    pub fn locate(&self, kind: ChannelKind, offset: u16, size: usize) -> BcResult<u16> {
        let declared = self.size(kind);

        if size == 0 {
            return Err(BcError::data_size(
                format!("module {} {kind}", self.module_nr),
                size,
                usize::from(declared),
            ));
        }
        if declared == 0 {
            return Err(BcError::no_data(self.module_nr, kind));
        }
        if usize::from(offset) + size > usize::from(declared) {
            return Err(BcError::data_range(
                self.module_nr,
                kind,
                format!(
                    "offset {offset} + size {size} exceeds declared {declared} {}",
                    kind.unit()
                ),
            ));
        }

        physical_address(self.indices.get(kind), offset)
            .filter(|start| usize::from(*start) + size - 1 <= usize::from(u16::MAX))
            .ok_or_else(|| {
                BcError::data_range(self.module_nr, kind, "window exceeds the Modbus address space")
            })
    }
}

// =============================================================================
// ModuleDirectory
// =============================================================================

/// Immutable snapshot of the enumerated modules.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ModuleDirectory {
    modules: Vec<Module>,
    process_image: ProcessImage,
    enumerated_at: Option<DateTime<Utc>>,
}

impl ModuleDirectory {
    /// Directory of a client that never enumerated.
    pub fn empty() -> Self {
        Self::default()
    }

    pub(crate) fn new(modules: Vec<Module>, process_image: ProcessImage) -> Self {
        Self {
            modules,
            process_image,
            enumerated_at: Some(Utc::now()),
        }
    }

    /// Number of modules.
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    /// Returns `true` if there are no modules.
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Module by 1-based number.
    pub fn get(&self, module_nr: u16) -> Option<&Module> {
        let position = usize::from(module_nr).checked_sub(1)?;
        self.modules.get(position)
    }

    /// Module by number, or a [`BcError::NoModule`].
    pub fn require(&self, module_nr: u16) -> BcResult<&Module> {
        self.get(module_nr)
            .ok_or_else(|| BcError::no_module(module_nr, self.len()))
    }

    /// All modules in bus order.
    pub fn modules(&self) -> &[Module] {
        &self.modules
    }

    /// Iterates over modules in bus order.
    pub fn iter(&self) -> impl Iterator<Item = &Module> {
        self.modules.iter()
    }

    /// Controller process data counts at enumeration time.
    pub fn process_image(&self) -> &ProcessImage {
        &self.process_image
    }

    /// Time of the enumeration, `None` for the empty directory.
    pub fn enumerated_at(&self) -> Option<DateTime<Utc>> {
        self.enumerated_at
    }

    /// Computed indices of every module in bus order.
    pub fn indices(&self) -> Vec<ChannelIndices> {
        self.modules.iter().map(|m| m.indices).collect()
    }

    /// Sum of declared sizes of one kind over all modules.
    pub fn total_size(&self, kind: ChannelKind) -> u32 {
        self.modules.iter().map(|m| u32::from(m.size(kind))).sum()
    }

    /// Returns `true` if ids and layouts match `other` module for module.
    pub fn same_topology(&self, other: &ModuleDirectory) -> bool {
        self.len() == other.len()
            && self
                .modules
                .iter()
                .zip(&other.modules)
                .all(|(a, b)| a.id == b.id && a.layout == b.layout)
    }
}

// =============================================================================
// Enumeration
// =============================================================================

struct ModuleScan {
    status: ModuleStatus,
    id: u16,
    name: String,
    serial: Option<String>,
    layout: ChannelLayout,
    reported: Option<ChannelIndices>,
    config: Option<ModuleConfig>,
    condition: Option<ExceptionKind>,
}

/// Reads the process data counts and every module block.
///
/// Per-module read failures are recorded on the module; a link failure
/// aborts the whole pass.
pub(crate) async fn enumerate<T: ModbusTransport>(
    session: &mut Session<'_, T>,
    catalog: &dyn HardwareCatalog,
) -> BcResult<ModuleDirectory> {
    let debug = session.debug();
    let words = session.read_words(PROCESS_DATA, PROCESS_DATA_WORDS).await?;
    let process_image = ProcessImage::from_words(&words)?;

    if process_image.modules > 0 && module_base(process_image.modules).is_none() {
        return Err(BcError::unhandled(
            "enumerate",
            format!(
                "controller reports {} modules, beyond the module register range",
                process_image.modules
            ),
        ));
    }

    let mut scans = Vec::with_capacity(usize::from(process_image.modules));
    for module_nr in 1..=process_image.modules {
        scans.push(scan_module(session, catalog, module_nr).await?);
    }

    let layouts: Vec<ChannelLayout> = scans.iter().map(|s| s.layout).collect();
    let modules: Vec<Module> = scans
        .into_iter()
        .zip(assign_indices(&layouts))
        .enumerate()
        .map(|(position, (scan, indices))| Module {
            module_nr: position as u16 + 1,
            status: scan.status,
            id: scan.id,
            name: scan.name,
            serial: scan.serial,
            layout: scan.layout,
            indices,
            reported_indices: scan.reported,
            config: scan.config,
            condition: scan.condition,
        })
        .collect();

    if debug.summary() {
        let faulted = modules.iter().filter(|m| m.condition.is_some()).count();
        tracing::info!(
            modules = modules.len(),
            faulted,
            digital_in = modules.iter().map(|m| u32::from(m.layout.digital_in)).sum::<u32>(),
            digital_out = modules.iter().map(|m| u32::from(m.layout.digital_out)).sum::<u32>(),
            analog_in = modules.iter().map(|m| u32::from(m.layout.analog_in)).sum::<u32>(),
            analog_out = modules.iter().map(|m| u32::from(m.layout.analog_out)).sum::<u32>(),
            "Module enumeration complete"
        );
    }

    Ok(ModuleDirectory::new(modules, process_image))
}

async fn scan_module<T: ModbusTransport>(
    session: &mut Session<'_, T>,
    catalog: &dyn HardwareCatalog,
    module_nr: u16,
) -> BcResult<ModuleScan> {
    let debug = session.debug();
    // Bounds were checked against the reported module count.
    let base = module_base(module_nr).ok_or_else(|| BcError::no_module(module_nr, 0))?;

    let identity = match session.read_words(base, MODULE_IDENTITY_WORDS).await {
        Ok(words) => words,
        Err(e) if e.is_link_fault() => return Err(e),
        Err(e) => {
            if debug.summary() {
                tracing::warn!(module_nr, error = %e, "Module identity unreadable");
            }
            return Ok(ModuleScan {
                status: ModuleStatus::NotPresent,
                id: 0,
                name: unknown_name(0),
                serial: None,
                layout: ChannelLayout::EMPTY,
                reported: None,
                config: None,
                condition: Some(ExceptionKind::NoModule),
            });
        }
    };

    let status = ModuleStatus::from_raw(identity[0]);
    let id = identity[1];
    let (name, layout) = match catalog.lookup(id) {
        Some(entry) => (entry.name.clone(), entry.layout),
        None => {
            if debug.summary() && id != 0 {
                tracing::warn!(module_nr, id, "Hardware id not in catalog, no channels mapped");
            }
            (unknown_name(id), ChannelLayout::EMPTY)
        }
    };
    let reported = Some(ChannelIndices {
        analog_in: identity[4],
        analog_out: identity[5],
        digital_in: identity[6],
        digital_out: identity[7],
    });

    let mut condition = (status == ModuleStatus::Error).then_some(ExceptionKind::Device);
    let (config, serial) = match session
        .read_words(base + MODULE_IDENTITY_WORDS, MODULE_CONFIG_WORDS)
        .await
    {
        Ok(words) => (
            Some(ModuleConfig::from_words(&words)),
            Some(format_serial(&identity[1..4])),
        ),
        Err(e) if e.is_link_fault() => return Err(e),
        Err(e) => {
            if debug.summary() {
                tracing::warn!(module_nr, id, error = %e, "Module configuration unreadable");
            }
            condition = Some(ExceptionKind::Device);
            (None, None)
        }
    };

    Ok(ModuleScan {
        status,
        id,
        name,
        serial,
        layout,
        reported,
        config,
        condition,
    })
}

// =============================================================================
// Tests
// =============================================================================

// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Hardware catalog: module id to name and declared channel layout.
//!
//! The controller reports only a hardware id per module; how many channels of
//! each kind that module carries comes from a [`HardwareCatalog`].
//! [`StaticCatalog`] reads the `hwlist` text format:
//!
//! ```text
//! # name,id[,di,do,ai,ao[,signed|unsigned]]
//! X20DI9371,41744,12,0,0,0
//! X20AI4622,41755,0,0,4,0,signed
//! X20BR9300,9300
//! ```
//!
//! Entries without channel counts have an empty layout.

use std::collections::HashMap;
use std::path::Path;

use crate::error::{BcError, BcResult};
use crate::types::{AnalogFormat, ChannelLayout};

/// Catalog record for one hardware id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HardwareEntry {
    /// Hardware id as reported in the module block.
    pub id: u16,
    /// Product name.
    pub name: String,
    /// Declared channel layout.
    pub layout: ChannelLayout,
}

impl HardwareEntry {
    /// Creates an entry.
    pub fn new(id: u16, name: impl Into<String>, layout: ChannelLayout) -> Self {
        Self {
            id,
            name: name.into(),
            layout,
        }
    }
}

/// Source of per-id module knowledge.
pub trait HardwareCatalog: Send + Sync {
    /// Looks up a hardware id.
    fn lookup(&self, id: u16) -> Option<&HardwareEntry>;

    /// Number of known ids.
    fn len(&self) -> usize;

    /// Returns `true` if the catalog knows no ids.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Name used for ids missing from the catalog.
pub fn unknown_name(id: u16) -> String {
    format!("unknown ({id})")
}

/// In-memory catalog.
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    entries: HashMap<u16, HardwareEntry>,
}

impl StaticCatalog {
    /// Creates an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces an entry.
    pub fn insert(&mut self, entry: HardwareEntry) -> &mut Self {
        self.entries.insert(entry.id, entry);
        self
    }

    /// Builder-style insert.
    pub fn with(mut self, id: u16, name: impl Into<String>, layout: ChannelLayout) -> Self {
        self.insert(HardwareEntry::new(id, name, layout));
        self
    }

    /// Iterates over all entries in id order.
    pub fn entries(&self) -> impl Iterator<Item = &HardwareEntry> {
        let mut entries: Vec<_> = self.entries.values().collect();
        entries.sort_by_key(|e| e.id);
        entries.into_iter()
    }

    /// Parses the hwlist text format.
    pub fn from_hwlist_str(content: &str) -> BcResult<Self> {
        let mut catalog = Self::new();

        for (line_no, raw) in content.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let entry = parse_line(line).map_err(|reason| {
                BcError::configuration(format!("hwlist line {}", line_no + 1), reason)
            })?;
            catalog.insert(entry);
        }

        Ok(catalog)
    }

    /// Loads a hwlist file.
    pub fn from_file(path: impl AsRef<Path>) -> BcResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            BcError::configuration(path.display().to_string(), format!("cannot read hwlist: {e}"))
        })?;
        let catalog = Self::from_hwlist_str(&content)?;

        tracing::debug!(
            path = %path.display(),
            entries = catalog.len(),
            "Loaded hardware catalog"
        );

        Ok(catalog)
    }
}

fn parse_line(line: &str) -> Result<HardwareEntry, String> {
    let parts: Vec<&str> = line.split(',').map(str::trim).collect();

    let name = parts[0];
    if name.is_empty() {
        return Err("missing module name".to_string());
    }
    let id = parts
        .get(1)
        .ok_or_else(|| format!("missing hardware id for '{name}'"))?
        .parse::<u16>()
        .map_err(|e| format!("invalid hardware id for '{name}': {e}"))?;

    let layout = match parts.len() {
        2 => ChannelLayout::EMPTY,
        6 | 7 => {
            let mut sizes = [0u16; 4];
            for (slot, text) in sizes.iter_mut().zip(&parts[2..6]) {
                *slot = text
                    .parse()
                    .map_err(|e| format!("invalid channel count '{text}' for '{name}': {e}"))?;
            }
            let format = match parts.get(6) {
                Some(text) => text.parse::<AnalogFormat>()?,
                None => AnalogFormat::default(),
            };
            ChannelLayout::new(sizes[0], sizes[1], sizes[2], sizes[3]).with_analog_format(format)
        }
        n => {
            return Err(format!(
                "expected 2, 6 or 7 fields (name,id[,di,do,ai,ao[,format]]), got {n}"
            ))
        }
    };

    Ok(HardwareEntry::new(id, name, layout))
}

impl HardwareCatalog for StaticCatalog {
    fn lookup(&self, id: u16) -> Option<&HardwareEntry> {
        self.entries.get(&id)
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const HWLIST: &str = "\
# B&R X20 modules
X20DI9371,41744,12,0,0,0
X20AO4622, 41756, 0, 0, 0, 4, signed
X20AT4222,41757,0,0,4,0,unsigned

X20BR9300,9300
";

    #[test]
    fn test_parse_hwlist() {
        let catalog = StaticCatalog::from_hwlist_str(HWLIST).unwrap();
        assert_eq!(catalog.len(), 4);

        let di = catalog.lookup(41744).unwrap();
        assert_eq!(di.name, "X20DI9371");
        assert_eq!(di.layout.digital_in, 12);

        let ao = catalog.lookup(41756).unwrap();
        assert_eq!(ao.layout.analog_out, 4);
        assert_eq!(ao.layout.analog_format, AnalogFormat::Signed16);

        let at = catalog.lookup(41757).unwrap();
        assert_eq!(at.layout.analog_format, AnalogFormat::Unsigned16);

        assert!(catalog.lookup(9300).unwrap().layout.is_empty());
        assert!(catalog.lookup(1).is_none());
    }

    #[test]
    fn test_parse_errors_name_the_line() {
        let err = StaticCatalog::from_hwlist_str("X20DI9371,41744\nbroken,abc\n").unwrap_err();
        assert!(err.to_string().contains("hwlist line 2"));

        assert!(StaticCatalog::from_hwlist_str("X20DI9371,41744,1,2").is_err());
        assert!(StaticCatalog::from_hwlist_str("X20DI9371,41744,1,2,3,4,float").is_err());
        assert!(StaticCatalog::from_hwlist_str(",41744").is_err());
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(HWLIST.as_bytes()).unwrap();

        let catalog = StaticCatalog::from_file(file.path()).unwrap();
        assert_eq!(catalog.len(), 4);
        assert!(StaticCatalog::from_file("/nonexistent/hwlist.txt").is_err());
    }

    #[test]
    fn test_builder_and_unknown_name() {
        let catalog = StaticCatalog::new().with(7, "X20DO4322", ChannelLayout::new(0, 4, 0, 0));
        assert_eq!(catalog.lookup(7).unwrap().layout.digital_out, 4);
        assert_eq!(catalog.entries().count(), 1);
        assert_eq!(unknown_name(4711), "unknown (4711)");
        assert!(StaticCatalog::new().is_empty());
    }
}

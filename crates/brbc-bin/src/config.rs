// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Application configuration loading.
//!
//! The `brbc` configuration file holds the controller endpoint, the client
//! settings and the hardware catalog. YAML, TOML and JSON are accepted:
//!
//! ```yaml
//! controller:
//!   host: ${BC_HOST:10.0.0.5}
//!   port: 502
//! client:
//!   operation_timeout: 2s
//!   debug: 1
//! catalog:
//!   hwlist: hwlist.txt
//!   modules:
//!     - name: X20DO9322
//!       id: 41745
//!       digital_out: 12
//! ```
//!
//! Loading order: read file, resolve `${VAR}` / `${VAR:default}`
//! placeholders, parse, apply `BRBC_*` overrides, resolve relative paths,
//! validate.

use std::collections::HashSet;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use brbc_modbus::{
    AnalogFormat, BusControllerConfig, ChannelLayout, DebugLevel, Endpoint, HardwareEntry,
    StaticCatalog,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{BinError, BinResult};

/// Default environment variable prefix.
pub const DEFAULT_ENV_PREFIX: &str = "BRBC";

// =============================================================================
// AppConfig
// =============================================================================

/// Root of the configuration file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Controller endpoint.
    #[serde(default)]
    pub controller: ControllerSection,

    /// Client timing, retry and refresh settings.
    #[serde(default)]
    pub client: BusControllerConfig,

    /// Hardware catalog sources.
    #[serde(default)]
    pub catalog: CatalogSection,
}

/// Controller endpoint settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControllerSection {
    /// Host name or IPv4 address.
    #[serde(default)]
    pub host: Option<String>,

    /// TCP port; `client.port` when unset.
    #[serde(default)]
    pub port: Option<u16>,
}

/// Hardware catalog sources. Inline modules override hwlist entries with
/// the same id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogSection {
    /// Path to a hwlist file.
    #[serde(default)]
    pub hwlist: Option<PathBuf>,

    /// Inline catalog entries.
    #[serde(default)]
    pub modules: Vec<CatalogModule>,
}

/// One inline catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogModule {
    /// Product name.
    pub name: String,
    /// Hardware id.
    pub id: u16,
    /// Digital input channels.
    #[serde(default)]
    pub digital_in: u16,
    /// Digital output channels.
    #[serde(default)]
    pub digital_out: u16,
    /// Analog input words.
    #[serde(default)]
    pub analog_in: u16,
    /// Analog output words.
    #[serde(default)]
    pub analog_out: u16,
    /// Analog register interpretation.
    #[serde(default)]
    pub analog_format: AnalogFormat,
}

impl CatalogModule {
    fn entry(&self) -> HardwareEntry {
        let layout = ChannelLayout::new(self.digital_in, self.digital_out, self.analog_in, self.analog_out)
            .with_analog_format(self.analog_format);
        HardwareEntry::new(self.id, self.name.clone(), layout)
    }
}

impl AppConfig {
    /// Validates the configuration.
    pub fn validate(&self) -> BinResult<()> {
        self.client.validate()?;

        if let Some(host) = &self.controller.host {
            Endpoint::parse(host, self.port())?;
        }

        let mut seen = HashSet::new();
        for module in &self.catalog.modules {
            if module.name.trim().is_empty() {
                return Err(BinError::config(format!(
                    "catalog module with id {} has no name",
                    module.id
                )));
            }
            if !seen.insert(module.id) {
                return Err(BinError::config(format!(
                    "catalog lists hardware id {} more than once",
                    module.id
                )));
            }
        }

        Ok(())
    }

    /// Non-fatal findings for `validate`.
    pub fn warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.controller.host.is_none() {
            warnings.push("no controller host configured; --host is required".to_string());
        }
        if self.catalog.hwlist.is_none() && self.catalog.modules.is_empty() {
            warnings.push("hardware catalog is empty; every module will be reported as unknown".to_string());
        }
        if let Some(path) = &self.catalog.hwlist {
            if !path.exists() {
                warnings.push(format!("hwlist file {} does not exist", path.display()));
            }
        }

        warnings
    }

    /// Effective port.
    pub fn port(&self) -> u16 {
        self.controller.port.unwrap_or(self.client.port)
    }

    /// Resolves the endpoint, with command-line values taking precedence.
    pub fn endpoint(&self, host: Option<&str>, port: Option<u16>) -> BinResult<Endpoint> {
        let host = host.or(self.controller.host.as_deref()).ok_or_else(|| {
            BinError::config("no controller host configured (use --host or controller.host)")
        })?;
        Ok(Endpoint::parse(host, port.unwrap_or_else(|| self.port()))?)
    }

    /// Builds the hardware catalog from the hwlist file and inline entries.
    pub fn build_catalog(&self) -> BinResult<StaticCatalog> {
        let mut catalog = match &self.catalog.hwlist {
            Some(path) => StaticCatalog::from_file(path)?,
            None => StaticCatalog::new(),
        };
        for module in &self.catalog.modules {
            catalog.insert(module.entry());
        }
        Ok(catalog)
    }
}

// =============================================================================
// ConfigLoader
// =============================================================================

/// Configuration loader.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    /// Base path for resolving relative paths.
    base_path: Option<PathBuf>,

    /// Environment variable prefix for overrides.
    env_prefix: String,

    /// Whether to resolve placeholders and apply environment overrides.
    resolve_env_vars: bool,
}

impl ConfigLoader {
    /// Creates a loader with the `BRBC` prefix.
    pub fn new() -> Self {
        Self {
            base_path: None,
            env_prefix: DEFAULT_ENV_PREFIX.to_string(),
            resolve_env_vars: true,
        }
    }

    /// Sets the base path for relative paths.
    pub fn with_base_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.base_path = Some(path.into());
        self
    }

    /// Sets the environment variable prefix.
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// Enables or disables environment variable handling.
    pub fn with_env_vars(mut self, enabled: bool) -> Self {
        self.resolve_env_vars = enabled;
        self
    }

    /// Loads and validates a configuration file.
    pub fn load(&self, path: impl AsRef<Path>) -> BinResult<AppConfig> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading configuration");

        let base_path = self.base_path.clone().unwrap_or_else(|| {
            path.parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from("."))
        });

        let content = read_file(path)?;
        let format = ConfigFormat::from_path(path)?;
        let content = if self.resolve_env_vars {
            resolve_env_placeholders(&content)
        } else {
            content
        };

        let mut config: AppConfig = parse_str(&content, format)
            .map_err(|e| e.with_context(format!("cannot parse {}", path.display())))?;

        if self.resolve_env_vars {
            self.apply_env_overrides(&mut config)?;
        }
        resolve_relative_paths(&mut config, &base_path);

        config.validate()?;

        debug!(
            host = config.controller.host.as_deref().unwrap_or("-"),
            port = config.port(),
            catalog_modules = config.catalog.modules.len(),
            "Configuration loaded"
        );

        Ok(config)
    }

    /// Loads configuration from a string.
    pub fn load_from_str(&self, content: &str, format: ConfigFormat) -> BinResult<AppConfig> {
        let content = if self.resolve_env_vars {
            resolve_env_placeholders(content)
        } else {
            content.to_string()
        };
        let mut config: AppConfig = parse_str(&content, format)?;

        if self.resolve_env_vars {
            self.apply_env_overrides(&mut config)?;
        }
        if let Some(base) = &self.base_path {
            resolve_relative_paths(&mut config, base);
        }

        config.validate()?;
        Ok(config)
    }

    /// Defaults plus environment overrides, for runs without a file.
    pub fn load_defaults(&self) -> BinResult<AppConfig> {
        let mut config = AppConfig::default();
        if self.resolve_env_vars {
            self.apply_env_overrides(&mut config)?;
        }
        config.validate()?;
        Ok(config)
    }

    fn var(&self, name: &str) -> Option<(String, String)> {
        let key = format!("{}_{}", self.env_prefix, name);
        env::var(&key).ok().map(|value| (key, value))
    }

    /// Applies `<PREFIX>_*` environment overrides.
    fn apply_env_overrides(&self, config: &mut AppConfig) -> BinResult<()> {
        if let Some((_, value)) = self.var("HOST") {
            config.controller.host = Some(value);
        }
        if let Some((key, value)) = self.var("PORT") {
            config.controller.port = Some(parse_env(&key, &value, "expected a port number")?);
        }
        if let Some((key, value)) = self.var("UNIT_ID") {
            config.client.unit_id = parse_env(&key, &value, "expected a unit id")?;
        }
        if let Some((key, value)) = self.var("DEBUG") {
            let level: u8 = parse_env(&key, &value, "expected 0, 1 or 2")?;
            config.client.debug = DebugLevel::try_from(level)
                .map_err(|reason| BinError::config(format!("invalid {key}: {reason}")))?;
        }
        if let Some((key, value)) = self.var("OPERATION_TIMEOUT") {
            config.client.operation_timeout = parse_duration(&key, &value)?;
        }
        if let Some((key, value)) = self.var("CONNECT_TIMEOUT") {
            config.client.connect_timeout = parse_duration(&key, &value)?;
        }
        if let Some((_, value)) = self.var("HWLIST") {
            config.catalog.hwlist = Some(PathBuf::from(value));
        }
        Ok(())
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// ConfigFormat
// =============================================================================

/// Supported configuration file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// YAML format.
    Yaml,
    /// TOML format.
    Toml,
    /// JSON format.
    Json,
}

impl ConfigFormat {
    /// Determines the format from a file path.
    pub fn from_path(path: &Path) -> BinResult<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase());

        match ext.as_deref() {
            Some("yaml") | Some("yml") => Ok(ConfigFormat::Yaml),
            Some("toml") => Ok(ConfigFormat::Toml),
            Some("json") => Ok(ConfigFormat::Json),
            Some(other) => Err(BinError::config(format!("unsupported config format: {other}"))),
            None => Err(BinError::config("unsupported config format: (no extension)")),
        }
    }

    /// Returns the file extension for this format.
    pub fn extension(&self) -> &'static str {
        match self {
            ConfigFormat::Yaml => "yaml",
            ConfigFormat::Toml => "toml",
            ConfigFormat::Json => "json",
        }
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

fn read_file(path: &Path) -> BinResult<String> {
    if !path.exists() {
        return Err(BinError::config(format!(
            "configuration file not found: {}",
            path.display()
        )));
    }
    fs::read_to_string(path).map_err(|e| BinError::io(format!("{}: {}", path.display(), e)))
}

fn parse_str(content: &str, format: ConfigFormat) -> BinResult<AppConfig> {
    match format {
        ConfigFormat::Yaml => yaml_parse(content),
        ConfigFormat::Toml => toml::from_str(content).map_err(|e| BinError::config(e.to_string())),
        ConfigFormat::Json => serde_json::from_str(content).map_err(|e| BinError::config(e.to_string())),
    }
}

/// YAML goes through the `config` crate.
fn yaml_parse<T: DeserializeOwned>(content: &str) -> BinResult<T> {
    let config = config::Config::builder()
        .add_source(config::File::from_str(content, config::FileFormat::Yaml))
        .build()
        .map_err(|e| BinError::config(e.to_string()))?;

    config
        .try_deserialize()
        .map_err(|e| BinError::config(e.to_string()))
}

/// Replaces `${VAR}` and `${VAR:default}` with environment values.
///
/// Unknown variables without a default are kept verbatim.
pub fn resolve_env_placeholders(content: &str) -> String {
    let mut result = String::with_capacity(content.len());
    let mut rest = content;

    while let Some(start) = rest.find("${") {
        result.push_str(&rest[..start]);
        let after = &rest[start + 2..];

        let Some(end) = after.find('}') else {
            result.push_str(&rest[start..]);
            return result;
        };

        let body = &after[..end];
        let (name, default) = match body.split_once(':') {
            Some((name, default)) => (name, Some(default)),
            None => (body, None),
        };

        match (env::var(name), default) {
            (Ok(value), _) => result.push_str(&value),
            (Err(_), Some(default)) => result.push_str(default),
            (Err(_), None) => {
                warn!(variable = name, "Environment variable not found");
                result.push_str(&rest[start..start + 3 + end]);
            }
        }
        rest = &after[end + 1..];
    }

    result.push_str(rest);
    result
}

fn resolve_relative_paths(config: &mut AppConfig, base_path: &Path) {
    if let Some(hwlist) = &config.catalog.hwlist {
        if hwlist.is_relative() {
            config.catalog.hwlist = Some(base_path.join(hwlist));
        }
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str, expected: &str) -> BinResult<T> {
    value
        .trim()
        .parse()
        .map_err(|_| BinError::config(format!("invalid {key}='{value}': {expected}")))
}

fn parse_duration(key: &str, value: &str) -> BinResult<Duration> {
    humantime::parse_duration(value.trim())
        .map_err(|e| BinError::config(format!("invalid {key}='{value}': {e}")))
}

// =============================================================================
// Tests
// =============================================================================

//! ECE configuration.

use std::fs;
use std::path::Path;
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{EceError, Result};

/// Default timeout of each send or receive during an exchange, in milliseconds.
pub const DEFAULT_TIMEOUT_MS: u64 = 100;

/// ECE configuration.
///
/// Can be loaded from the `[ece]` table of a TOML file:
///
/// ```toml
/// [ece]
/// enabled = true
/// timeout_ms = 100
/// devices = ["mlx5_.*"]
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EceConfig {
    /// Whether to try ECE at all.
    /// Default: true
    pub enabled: bool,

    /// Timeout of each send or receive during an exchange, in milliseconds.
    /// Default: 100
    pub timeout_ms: u64,

    /// Attribute modifier of outgoing `ClassPortInfo` MADs.
    /// Default: 0
    pub attr_mod: u32,

    /// Device name patterns; ECE is only set up for devices matching *any*
    /// of them. Empty means every device.
    /// Default: empty
    pub devices: Vec<String>,
}

impl Default for EceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            attr_mod: 0,
            devices: Vec::new(),
        }
    }
}

#[derive(Deserialize)]
struct TomlFile {
    ece: Option<EceConfig>,
}

impl EceConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable ECE.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Set the exchange timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = timeout.as_millis().try_into().unwrap_or(u64::MAX);
        self
    }

    /// Set the attribute modifier of outgoing MADs.
    pub fn with_attr_mod(mut self, attr_mod: u32) -> Self {
        self.attr_mod = attr_mod;
        self
    }

    /// Add a device name pattern. Regular expressions are supported.
    pub fn with_device(mut self, pattern: impl Into<String>) -> Self {
        self.devices.push(pattern.into());
        self
    }

    /// Get the exchange timeout.
    #[inline]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Parse the `[ece]` table of a TOML document.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let file: TomlFile = toml::from_str(s)?;
        file.ece
            .ok_or_else(|| EceError::Config("ece configuration not found".to_owned()))
    }

    /// Parse a JSON object.
    pub fn from_json_str(s: &str) -> Result<Self> {
        Ok(serde_json::from_str(s)?)
    }

    /// Load from a file. Files ending with `.json` are parsed as JSON, all
    /// others as TOML.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::from_json_str(&content),
            _ => Self::from_toml_str(&content),
        }
    }

    /// Compile the device name patterns.
    pub fn device_filter(&self) -> Result<DeviceFilter> {
        let patterns = self
            .devices
            .iter()
            .map(|p| Regex::new(&format!("^(?:{})$", p)))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(DeviceFilter(patterns))
    }
}

/// Compiled device name patterns (match any).
#[derive(Debug, Clone, Default)]
pub struct DeviceFilter(Vec<Regex>);

impl DeviceFilter {
    /// Check whether a device is eligible for ECE.
    pub fn matches(&self, dev_name: &str) -> bool {
        self.0.is_empty() || self.0.iter().any(|re| re.is_match(dev_name))
    }
}

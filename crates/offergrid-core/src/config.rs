//! offergrid.toml configuration parser.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OffergridConfig {
    #[serde(default)]
    pub admission: AdmissionConfig,
    #[serde(default)]
    pub framework: FrameworkConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Admission control for services acquiring new footprint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AdmissionConfig {
    /// Maximum number of services reserving at once. Unset means no limit.
    pub reserve_limit: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameworkConfig {
    /// Uninstall every service, then the framework itself.
    #[serde(default)]
    pub uninstall: bool,
    /// Directory holding the state database. Unset keeps state in memory.
    pub state_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_filter")]
    pub filter: String,
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_filter(),
            json: false,
        }
    }
}

fn default_filter() -> String {
    "info,offergrid=debug".to_string()
}

impl OffergridConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        let config: OffergridConfig = toml::from_str(content)?;
        if config.admission.reserve_limit == Some(0) {
            anyhow::bail!("admission.reserve_limit must be at least 1");
        }
        Ok(config)
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}

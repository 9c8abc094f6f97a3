//! ---
//! moss_section: "01-core-functionality"
//! moss_subsection: "module"
//! moss_type: "source"
//! moss_scope: "code"
//! moss_description: "Instance configuration model, schema validation, and selection."
//! moss_version: "v0.0.0-prealpha"
//! moss_owner: "tbd"
//! ---
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ConfigError;

/// Primary configuration object for the MOSS runtime.
///
/// One document configures every deployed instance of the component; each
/// running process selects its own record by runtime index via [`resolve`].
///
/// [`resolve`]: MossConfig::resolve
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct MossConfig {
    pub instances: Vec<InstanceConfig>,
}

/// Metadata describing where a [`MossConfig`] was loaded from.
#[derive(Debug, Clone)]
pub struct LoadedMossConfig {
    pub config: MossConfig,
    pub source: PathBuf,
}

impl MossConfig {
    pub const ENV_CONFIG_PATH: &'static str = "MOSS_CONFIG";

    /// Load configuration from disk, respecting the `MOSS_CONFIG` override.
    pub fn load<P: AsRef<Path>>(candidates: &[P]) -> Result<Self, ConfigError> {
        Ok(Self::load_with_source(candidates)?.config)
    }

    /// Load configuration from disk together with the effective source path.
    pub fn load_with_source<P: AsRef<Path>>(
        candidates: &[P],
    ) -> Result<LoadedMossConfig, ConfigError> {
        if let Ok(env_path) = std::env::var(Self::ENV_CONFIG_PATH) {
            if !env_path.trim().is_empty() {
                let path = PathBuf::from(env_path);
                let config = Self::from_path(path.clone())?;
                return Ok(LoadedMossConfig {
                    config,
                    source: path,
                });
            }
        }

        for candidate in candidates {
            if candidate.as_ref().exists() {
                let path = candidate.as_ref().to_path_buf();
                let config = Self::from_path(path.clone())?;
                return Ok(LoadedMossConfig {
                    config,
                    source: path,
                });
            }
        }

        Err(ConfigError::Invalid(format!(
            "no configuration files found. inspected: {}",
            candidates
                .iter()
                .map(|p| p.as_ref().display().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        )))
    }

    fn from_path(path: PathBuf) -> Result<Self, ConfigError> {
        debug!(config_path = %path.display(), "loading configuration");
        let contents = fs::read_to_string(&path)?;
        contents.parse()
    }

    /// Select the instance record whose `sal_index` matches the runtime index.
    ///
    /// Records are scanned in document order and the first match wins. A
    /// missing match is a fatal configuration error.
    pub fn resolve(&self, sal_index: u32) -> Result<&InstanceConfig, ConfigError> {
        self.instances
            .iter()
            .find(|instance| instance.sal_index == sal_index)
            .ok_or(ConfigError::NotFound { sal_index })
    }

    /// Validate value constraints the schema shape alone cannot express.
    ///
    /// Duplicate `sal_index` values are rejected here; the upstream schema
    /// left selection among duplicates ambiguous, so they are treated as a
    /// configuration-author error.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = HashSet::new();
        for instance in &self.instances {
            if instance.sal_index < 1 {
                return Err(ConfigError::Invalid(
                    "sal_index must be a positive integer".to_owned(),
                ));
            }
            if !seen.insert(instance.sal_index) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate sal_index {} in instances",
                    instance.sal_index
                )));
            }
        }
        Ok(())
    }
}

impl std::str::FromStr for MossConfig {
    type Err = ConfigError;

    fn from_str(content: &str) -> Result<Self, Self::Err> {
        let config: MossConfig = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }
}

/// Configuration record for a single deployed instance of the component.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct InstanceConfig {
    /// Runtime index this record applies to.
    pub sal_index: u32,
    /// Device controller endpoint.
    pub tcpip: TcpipConfig,
    /// Storage partition used to archive data products.
    pub s3_instance: StoragePartition,
}

/// Device controller network endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct TcpipConfig {
    pub hostname: String,
    pub port: u16,
    /// Connect timeout in seconds.
    pub timeout: u64,
}

impl TcpipConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    /// `hostname:port` endpoint string for connect calls and log records.
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.hostname, self.port)
    }
}

/// Closed enumeration of archive storage partitions.
#[derive(Debug, Copy, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum StoragePartition {
    Tuc,
    Ls,
    Cp,
}

impl StoragePartition {
    /// Partition code as it appears in configuration documents and bucket names.
    pub fn as_str(&self) -> &'static str {
        match self {
            StoragePartition::Tuc => "tuc",
            StoragePartition::Ls => "ls",
            StoragePartition::Cp => "cp",
        }
    }
}

impl std::fmt::Display for StoragePartition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

use crate::error::{MergeError, Result};
use anyhow::Context;
use device_registry::EnrichmentVariant;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MergeConfig {
    /// Registry of devices (`id,device_address[,device_eui]`).
    pub registry_path: PathBuf,
    /// Directory holding `<device_address>.csv` files; the merged file is written here.
    pub data_dir: PathBuf,
    pub variant: EnrichmentVariant,
    pub output_prefix: String,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            registry_path: PathBuf::from("device_addresses.csv"),
            data_dir: PathBuf::from("./data"),
            variant: EnrichmentVariant::Address,
            output_prefix: "merged".to_string(),
        }
    }
}

impl MergeConfig {
    /// Load a YAML config file. Keys that are absent keep their defaults.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading config: {}", path.display()))?;
        let cfg: Self = serde_yaml::from_str(&raw)
            .with_context(|| format!("parsing config: {}", path.display()))?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.output_prefix.is_empty() {
            return Err(MergeError::Config("output_prefix must not be empty".into()));
        }
        if self.output_prefix.contains(['/', '\\']) {
            return Err(MergeError::Config(format!(
                "output_prefix must be a bare name, got {:?}",
                self.output_prefix
            )));
        }
        Ok(())
    }
}

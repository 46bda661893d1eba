use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

// Where the starting universe comes from
#[derive(Deserialize, Serialize, Debug, Clone, Default)]
pub struct SourceConfig {
    #[serde(default)]
    pub hash: Option<String>,
    #[serde(default)]
    pub preset: Option<String>,
}

// Configuration for timing
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct TimingConfig {
    pub total_ticks: u64,
    pub record_interval_ticks: u64,
}

// Seed for every r / R draw
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct RandomConfig {
    #[serde(default = "default_seed")]
    pub seed: u64,
}

impl Default for RandomConfig {
    fn default() -> Self {
        RandomConfig { seed: default_seed() }
    }
}

fn default_seed() -> u64 {
    0
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Json,
    Bincode,
    Messagepack,
}

// Configuration for output settings, loaded from config.toml
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct OutputConfig {
    pub base_filename: String,
    pub save_stats: bool,
    pub save_positions: bool, // CSV of final particle positions
    pub save_particles_in_snapshot: bool,
    #[serde(default)]
    pub format: OutputFormat,
    #[serde(default = "default_save_hash")]
    pub save_hash: bool, // Final configuration string
}

fn default_save_hash() -> bool {
    true
}

// Main driver configuration structure, loaded from config.toml.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct FieldConfig {
    #[serde(default)]
    pub source: SourceConfig,
    pub timing: TimingConfig,
    #[serde(default)]
    pub random: RandomConfig,
    pub output: OutputConfig,
}

impl FieldConfig {
    /// Loads the driver configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();

        let config_str = std::fs::read_to_string(path_ref)
            .with_context(|| format!("Failed to read config file '{}'", path_ref.display()))?;
        let config = Self::from_toml(&config_str)
            .with_context(|| format!("Invalid config file '{}'", path_ref.display()))?;

        Ok(config)
    }

    /// Parses and validates a configuration.
    pub fn from_toml(text: &str) -> Result<Self> {
        let config: FieldConfig = toml::from_str(text).context("Failed to parse TOML")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.source.hash.is_some() && self.source.preset.is_some() {
            anyhow::bail!("[source] may set hash or preset, not both.");
        }
        if self.timing.record_interval_ticks == 0 {
            anyhow::bail!("record_interval_ticks must be greater than 0.");
        }
        if self.output.base_filename.trim().is_empty() {
            anyhow::bail!("base_filename must not be empty.");
        }
        Ok(())
    }
}

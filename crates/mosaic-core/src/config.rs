//! Synthesis configuration

use crate::error::{CoreError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Env var overriding `max_workers`.
pub const ENV_MAX_WORKERS: &str = "MOSAIC_MAX_WORKERS";

/// Env var overriding `max_component_files`.
pub const ENV_MAX_COMPONENT_FILES: &str = "MOSAIC_MAX_COMPONENT_FILES";

/// How extracted files are placed under a component root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum LayoutMode {
    /// Seed files move to the component root with their pattern's literal prefix stripped.
    #[default]
    HoistSeeds,
    /// Every file keeps its tree-relative path.
    Preserve,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthesisConfig {
    /// Size of the extraction worker pool.
    pub max_workers: usize,
    /// Closure size above which a component is considered runaway.
    pub max_component_files: usize,
    /// Relaxation attempts per conflicting package.
    pub max_relaxation_attempts: u32,
    pub layout: LayoutMode,
    /// Write `resolution.json` next to the components during assembly.
    pub write_resolution_manifest: bool,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        // Use number of CPU cores as default worker count, but at least 2
        let max_workers = std::thread::available_parallelism()
            .map(|n| n.get().max(2))
            .unwrap_or(2);
        SynthesisConfig {
            max_workers,
            max_component_files: 10_000,
            max_relaxation_attempts: 3,
            layout: LayoutMode::default(),
            write_resolution_manifest: true,
        }
    }
}

impl SynthesisConfig {
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: SynthesisConfig = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file, then apply environment overrides.
    pub fn load(path: &Path) -> Result<Self> {
        let source = std::fs::read_to_string(path).map_err(|source| CoreError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&source)?.with_env_overrides()?;
        tracing::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Apply `MOSAIC_*` environment variables on top of this config.
    pub fn with_env_overrides(self) -> Result<Self> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary lookup (the environment in production).
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(value) = lookup(ENV_MAX_WORKERS) {
            self.max_workers = parse_count(ENV_MAX_WORKERS, &value)?;
        }
        if let Some(value) = lookup(ENV_MAX_COMPONENT_FILES) {
            self.max_component_files = parse_count(ENV_MAX_COMPONENT_FILES, &value)?;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_workers == 0 {
            return Err(CoreError::InvalidConfig("max_workers must be at least 1".into()));
        }
        if self.max_component_files == 0 {
            return Err(CoreError::InvalidConfig(
                "max_component_files must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

fn parse_count(key: &str, value: &str) -> Result<usize> {
    value
        .trim()
        .parse()
        .map_err(|_| CoreError::InvalidConfig(format!("{key} must be a positive integer, got {value:?}")))
}

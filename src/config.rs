//! Engine configuration, one section per subsystem

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::{Error, Result};
use crate::lighting::config::RadiosityConfig;
use crate::mesh::config::LightingConfig;
use crate::voxel::config::WorldConfig;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub world: WorldConfig,
    pub lighting: LightingConfig,
    pub radiosity: RadiosityConfig,
}

impl EngineConfig {
    /// Save to file (sync)
    pub fn save_sync(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load from file (sync). Missing fields take their defaults.
    pub fn load_sync(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&json)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the scheduler or probes cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.radiosity.max_samples == 0 {
            return Err(Error::Config("radiosity.max_samples must be at least 1".into()));
        }
        if self.radiosity.direction_count == 0 {
            return Err(Error::Config("radiosity.direction_count must be at least 1".into()));
        }
        if self.world.max_jobs_per_frame == 0 {
            return Err(Error::Config("world.max_jobs_per_frame must be at least 1".into()));
        }
        Ok(())
    }
}

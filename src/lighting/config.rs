//! Radiosity probe configuration

use serde::{Deserialize, Serialize};

/// Progressive radiosity settings, shared by every probe field in a world
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RadiosityConfig {
    /// Rays cast per probe per update
    pub rays_per_update: u32,
    /// Ring buffer length; the rolling average covers this many rays
    pub max_samples: u32,
    /// Size of the shared direction table
    pub direction_count: u32,
    /// Seed for the direction shuffle
    pub direction_seed: u64,
    /// Maximum ray length in world units
    pub max_distance: f32,
    /// Batches whose largest delta stays below this count towards convergence
    pub convergence_threshold: f32,
    /// Consecutive quiet batches after which a chunk stops updating
    pub convergence_limit: u32,
    /// Largest delta that marks the chunk's lighting dirty
    pub lighting_change_threshold: f32,
    /// Per-channel ceiling applied to indirect light when exposed
    pub indirect_ceiling: f32,
}

impl Default for RadiosityConfig {
    fn default() -> Self {
        Self {
            rays_per_update: 16,
            max_samples: 64,
            direction_count: 256,
            direction_seed: 0x5eed_1234,
            max_distance: 32.0,
            convergence_threshold: 0.01,
            convergence_limit: 8,
            lighting_change_threshold: 0.05,
            indirect_ceiling: 1.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RadiosityConfig::default();
        assert_eq!(config.rays_per_update, 16);
        assert_eq!(config.max_samples, 64);
        assert_eq!(config.direction_count, 256);
    }
}

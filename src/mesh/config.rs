//! Mesh lighting configuration

use serde::{Deserialize, Serialize};

/// Settings for the vertex lighting pass
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LightingConfig {
    /// Multiplier on probe light added to every vertex
    pub radiosity_intensity: f32,
    /// When false, light channels are left at zero and lighting-only jobs are skipped
    pub bake_lighting: bool,
    /// 0 = no ambient occlusion, 1 = fully occluded corners are black
    pub ambient_occlusion_strength: f32,
}

impl Default for LightingConfig {
    fn default() -> Self {
        Self {
            radiosity_intensity: 1.0,
            bake_lighting: true,
            ambient_occlusion_strength: 0.75,
        }
    }
}

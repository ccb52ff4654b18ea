//! World scheduling configuration

use serde::{Deserialize, Serialize};

use crate::mesh::buffer::detail_lod_weights;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// Worker pool size. 0 = one per core.
    pub worker_threads: usize,
    /// Mesh jobs dispatched per tick
    pub max_jobs_per_frame: usize,
    /// Probe batches dispatched per tick, after mesh jobs
    pub max_probe_batches_per_frame: usize,
    /// Camera distance where detail LOD1 starts fading in
    pub detail_fade_start: f32,
    /// Camera distance where detail LOD0 is fully faded out
    pub detail_fade_end: f32,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            worker_threads: 0,
            max_jobs_per_frame: 8,
            max_probe_batches_per_frame: 4,
            detail_fade_start: 24.0,
            detail_fade_end: 48.0,
        }
    }
}

impl WorldConfig {
    /// Blend weights for the two detail surfaces at a camera distance
    pub fn detail_weights(&self, distance: f32) -> [f32; 2] {
        detail_lod_weights(distance, self.detail_fade_start, self.detail_fade_end)
    }
}

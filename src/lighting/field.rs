//! Per-chunk 4x4x4 grid of radiosity probes

use glam::{IVec3, Vec3};

use crate::core::Color;
use crate::lighting::config::RadiosityConfig;
use crate::lighting::directions::SampleDirections;
use crate::lighting::probe::RadiosityProbe;
use crate::lighting::query::LightQuery;
use crate::mesh::snapshot::PaddedSnapshot;
use crate::voxel::chunk::ChunkCoord;

/// Probes per axis
pub const PROBE_GRID: i32 = 4;
/// Cells per probe region along each axis
pub const PROBE_REGION: i32 = 4;
pub const PROBE_COUNT: usize = (PROBE_GRID * PROBE_GRID * PROBE_GRID) as usize;

/// Index of the probe at grid position `p`
#[inline]
pub fn probe_index(p: IVec3) -> usize {
    ((p.x * PROBE_GRID + p.y) * PROBE_GRID + p.z) as usize
}

fn probe_grid_pos(index: usize) -> IVec3 {
    let i = index as i32;
    IVec3::new(i / (PROBE_GRID * PROBE_GRID), (i / PROBE_GRID) % PROBE_GRID, i % PROBE_GRID)
}

/// Bitmask of probes whose padded region contains the chunk-local cell
pub fn affected_mask(local: IVec3) -> u64 {
    let mut ranges = [(0, 0); 3];
    for axis in 0..3 {
        // padded region of probe p spans [4p - 1, 4p + 4]
        let lo = (local[axis] - 1).div_euclid(PROBE_REGION).max(0);
        let hi = (local[axis] + 1).div_euclid(PROBE_REGION).min(PROBE_GRID - 1);
        ranges[axis] = (lo, hi);
    }
    let mut mask = 0u64;
    for x in ranges[0].0..=ranges[0].1 {
        for y in ranges[1].0..=ranges[1].1 {
            for z in ranges[2].0..=ranges[2].1 {
                mask |= 1 << probe_index(IVec3::new(x, y, z));
            }
        }
    }
    mask
}

/// World-space probe position for every probe, or `None` if it must be disabled.
///
/// A probe is disabled when its region (padded by one cell) holds no solid
/// cell, or its own region holds no empty cell. Otherwise it sits at the
/// center of the empty cell nearest the region center.
pub fn compute_placements(snapshot: &PaddedSnapshot) -> Vec<Option<Vec3>> {
    let origin = snapshot.origin();
    (0..PROBE_COUNT)
        .map(|i| {
            let min = probe_grid_pos(i) * PROBE_REGION;
            let max = min + IVec3::splat(PROBE_REGION - 1);

            let mut any_solid = false;
            'scan: for x in min.x - 1..=max.x + 1 {
                for y in min.y - 1..=max.y + 1 {
                    for z in min.z - 1..=max.z + 1 {
                        if snapshot.is_solid(IVec3::new(x, y, z)) {
                            any_solid = true;
                            break 'scan;
                        }
                    }
                }
            }
            if !any_solid {
                return None;
            }

            let center = min.as_vec3() + Vec3::splat(PROBE_REGION as f32 * 0.5);
            let mut best: Option<(f32, IVec3)> = None;
            for x in min.x..=max.x {
                for y in min.y..=max.y {
                    for z in min.z..=max.z {
                        let cell = IVec3::new(x, y, z);
                        if snapshot.is_solid(cell) {
                            continue;
                        }
                        let d = (cell.as_vec3() + Vec3::splat(0.5)).distance_squared(center);
                        if best.is_none_or(|(bd, _)| d < bd) {
                            best = Some((d, cell));
                        }
                    }
                }
            }
            best.map(|(_, cell)| (origin + cell).as_vec3() + Vec3::splat(0.5))
        })
        .collect()
}

/// Probe color exposed to the mesher
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ProbeLight {
    pub position: Vec3,
    pub direct: Color,
    /// Already clamped to the indirect ceiling
    pub indirect: Color,
}

impl ProbeLight {
    pub fn color(&self) -> Color {
        self.direct + self.indirect
    }
}

/// Outcome of one field update
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FieldUpdate {
    pub max_delta: f32,
    pub probes_updated: u32,
}

#[derive(Clone, Debug)]
pub struct ProbeField {
    probes: Vec<RadiosityProbe>,
}

impl ProbeField {
    /// All probes disabled at their region centers
    pub fn new(origin: IVec3, max_samples: usize) -> Self {
        let probes = (0..PROBE_COUNT)
            .map(|i| {
                let center = origin.as_vec3()
                    + (probe_grid_pos(i) * PROBE_REGION).as_vec3()
                    + Vec3::splat(PROBE_REGION as f32 * 0.5);
                RadiosityProbe::disabled(center, max_samples)
            })
            .collect();
        Self { probes }
    }

    pub fn probes(&self) -> &[RadiosityProbe] {
        &self.probes
    }

    pub fn probe(&self, index: usize) -> Option<&RadiosityProbe> {
        self.probes.get(index)
    }

    pub fn enabled_count(&self) -> usize {
        self.probes.iter().filter(|p| p.enabled).count()
    }

    /// Apply new placements. A probe is reset when its bit is in `stale` or its
    /// position or enabled state changed. Returns the number of probes reset.
    pub fn place(&mut self, placements: &[Option<Vec3>], stale: u64) -> u32 {
        let mut reset = 0;
        for (i, (probe, placement)) in self.probes.iter_mut().zip(placements).enumerate() {
            let (position, enabled) = match placement {
                Some(p) => (*p, true),
                None => (probe.position, false),
            };
            let changed = enabled != probe.enabled || (enabled && position != probe.position);
            if changed || stale & (1 << i) != 0 {
                probe.reset(position, enabled);
                reset += 1;
            }
        }
        reset
    }

    /// Advance every enabled probe by one batch of rays
    pub fn update(&mut self, query: &dyn LightQuery, directions: &SampleDirections, config: &RadiosityConfig) -> FieldUpdate {
        let mut result = FieldUpdate::default();
        for probe in self.probes.iter_mut().filter(|p| p.enabled) {
            let delta = probe.update(query, directions, config);
            result.max_delta = result.max_delta.max(delta);
            result.probes_updated += 1;
        }
        result
    }

    /// Lighting snapshot of the enabled probes
    pub fn lights(&self, indirect_ceiling: f32) -> Vec<ProbeLight> {
        self.probes
            .iter()
            .filter(|p| p.enabled)
            .map(|p| ProbeLight {
                position: p.position,
                direct: p.average_direct(),
                indirect: p.indirect_clamped(indirect_ceiling),
            })
            .collect()
    }
}

/// Nearest probe light to `position`
pub fn nearest_probe(lights: &[ProbeLight], position: Vec3) -> Option<&ProbeLight> {
    lights.iter().min_by(|a, b| {
        a.position
            .distance_squared(position)
            .total_cmp(&b.position.distance_squared(position))
    })
}

/// A probe field checked out of its chunk for an update on the worker pool
#[derive(Debug)]
pub struct ProbeBatch {
    pub coord: ChunkCoord,
    pub instance: u64,
    pub field: Box<ProbeField>,
}

/// Field returned from the worker pool with the update outcome
#[derive(Debug)]
pub struct ProbeBatchResult {
    pub coord: ChunkCoord,
    pub instance: u64,
    pub field: Box<ProbeField>,
    pub update: FieldUpdate,
}

impl ProbeBatch {
    pub fn run(mut self, query: &dyn LightQuery, directions: &SampleDirections, config: &RadiosityConfig) -> ProbeBatchResult {
        let update = self.field.update(query, directions, config);
        ProbeBatchResult { coord: self.coord, instance: self.instance, field: self.field, update }
    }
}

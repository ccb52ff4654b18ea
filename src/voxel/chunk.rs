//! Chunk: one cubic region of cells plus all state derived from it
//!
//! The main thread owns every chunk. Derived state (surfaces, collision,
//! probes) is rebuilt by at most one in-flight job, and is only ever replaced
//! in [`Chunk::commit`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use glam::{IVec3, Vec3};

use crate::core::Color;
use crate::lighting::config::RadiosityConfig;
use crate::lighting::field::{affected_mask, ProbeBatch, ProbeBatchResult, ProbeField, ProbeLight};
use crate::math::Aabb;
use crate::mesh::buffer::ChunkSurfaces;
use crate::mesh::lighting::{material_uniforms, LightClass, LightSet, MaterialUniforms, PointLight};
use crate::mesh::processor::{JobContext, JobKind, JobResult, JobTicket, MeshJob};
use crate::mesh::snapshot::PaddedSnapshot;
use crate::voxel::cell::VoxelCell;
use crate::voxel::collision::{generate_collision_boxes, SolidMask};
use crate::voxel::face::Face;
use crate::voxel::query::WorldQuery;

/// Cells per chunk side
pub const CHUNK_SIDE: i32 = 16;
/// Cells per chunk
pub const CHUNK_VOLUME: usize = (CHUNK_SIDE * CHUNK_SIDE * CHUNK_SIDE) as usize;

/// Index of a chunk-local cell (x-major)
#[inline]
pub fn cell_index(local: IVec3) -> usize {
    ((local.x * CHUNK_SIDE + local.y) * CHUNK_SIDE + local.z) as usize
}

/// Whether a local position lies inside a chunk
#[inline]
pub fn in_chunk(local: IVec3) -> bool {
    local.cmpge(IVec3::ZERO).all() && local.cmplt(IVec3::splat(CHUNK_SIDE)).all()
}

static NEXT_INSTANCE: AtomicU64 = AtomicU64::new(1);

/// Integer coordinate identifying a chunk in the world grid
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkCoord {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl ChunkCoord {
    /// Create a new chunk coordinate
    pub fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Chunk containing a world cell
    pub fn from_voxel_pos(pos: IVec3) -> Self {
        Self {
            x: pos.x.div_euclid(CHUNK_SIDE),
            y: pos.y.div_euclid(CHUNK_SIDE),
            z: pos.z.div_euclid(CHUNK_SIDE),
        }
    }

    /// Chunk containing a world-space point
    pub fn from_world_pos(pos: Vec3) -> Self {
        Self::from_voxel_pos(pos.floor().as_ivec3())
    }

    /// World cell of this chunk's minimum corner
    pub fn world_origin(&self) -> IVec3 {
        IVec3::new(self.x, self.y, self.z) * CHUNK_SIDE
    }

    pub fn world_origin_f32(&self) -> Vec3 {
        self.world_origin().as_vec3()
    }

    /// Chunk sharing the given face
    pub fn neighbor(&self, face: Face) -> Self {
        let o = face.offset();
        Self::new(self.x + o.x, self.y + o.y, self.z + o.z)
    }

    /// World-space bounds
    pub fn bounds(&self) -> Aabb {
        let min = self.world_origin();
        Aabb::from_cells(min, min + IVec3::splat(CHUNK_SIDE))
    }
}

/// Coarse processing state
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChunkState {
    Clean,
    Dirty,
    Processing,
}

/// Per-chunk counters
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ChunkStats {
    pub jobs_started: u64,
    pub jobs_committed: u64,
    pub stale_results: u64,
    pub probe_batches: u64,
}

pub struct Chunk {
    coord: ChunkCoord,
    instance: u64,
    cells: Vec<VoxelCell>,

    geometry_dirty: bool,
    lighting_dirty: bool,
    priority_update: bool,
    in_flight: Option<JobTicket>,
    next_sequence: u64,

    surfaces: Option<Arc<ChunkSurfaces>>,
    material_uniforms: MaterialUniforms,
    collision_volumes: Vec<Aabb>,
    lights: LightSet,

    probes: Option<Box<ProbeField>>,
    probes_checked_out: bool,
    pending_placements: Option<Vec<Option<Vec3>>>,
    probe_lighting: Arc<Vec<ProbeLight>>,
    /// Probe lighting the current surfaces were baked with
    baked_probe_lighting: Arc<Vec<ProbeLight>>,
    probe_samples: usize,
    stale_probes: u64,
    convergence_counter: u32,

    /// Whether cells changed since the last save
    pub modified: bool,
    pub stats: ChunkStats,
}

impl std::fmt::Debug for Chunk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chunk")
            .field("coord", &self.coord)
            .field("instance", &self.instance)
            .field("state", &self.state())
            .field("collision_volumes", &self.collision_volumes.len())
            .finish()
    }
}

impl Chunk {
    /// Create an all-air chunk, dirty so it gets meshed
    pub fn new(coord: ChunkCoord) -> Self {
        Self::with_cells(coord, vec![VoxelCell::AIR; CHUNK_VOLUME])
    }

    /// Create a chunk from existing cells; `None` if the length is not [`CHUNK_VOLUME`]
    pub fn from_cells(coord: ChunkCoord, cells: Vec<VoxelCell>) -> Option<Self> {
        (cells.len() == CHUNK_VOLUME).then(|| Self::with_cells(coord, cells))
    }

    fn with_cells(coord: ChunkCoord, cells: Vec<VoxelCell>) -> Self {
        Self {
            coord,
            instance: NEXT_INSTANCE.fetch_add(1, Ordering::Relaxed),
            cells,
            geometry_dirty: true,
            lighting_dirty: false,
            priority_update: false,
            in_flight: None,
            next_sequence: 0,
            surfaces: None,
            material_uniforms: MaterialUniforms::default(),
            collision_volumes: Vec::new(),
            lights: LightSet::new(),
            probes: None,
            probes_checked_out: false,
            pending_placements: None,
            probe_lighting: Arc::new(Vec::new()),
            baked_probe_lighting: Arc::new(Vec::new()),
            probe_samples: RadiosityConfig::default().max_samples as usize,
            stale_probes: 0,
            convergence_counter: 0,
            modified: false,
            stats: ChunkStats::default(),
        }
    }

    /// Ring buffer length used when the probe field is first created
    pub fn set_probe_samples(&mut self, max_samples: usize) {
        self.probe_samples = max_samples.max(1);
    }

    pub fn coord(&self) -> ChunkCoord {
        self.coord
    }

    /// Unique id of this chunk object; never reused within a process
    pub fn instance(&self) -> u64 {
        self.instance
    }

    pub fn cells(&self) -> &[VoxelCell] {
        &self.cells
    }

    /// Cell at a chunk-local position; outside reads as air
    pub fn cell(&self, local: IVec3) -> VoxelCell {
        if in_chunk(local) { self.cells[cell_index(local)] } else { VoxelCell::AIR }
    }

    /// Cell at a world position, if this chunk owns it
    pub fn cell_at(&self, world_pos: IVec3) -> Option<VoxelCell> {
        let local = world_pos - self.coord.world_origin();
        in_chunk(local).then(|| self.cells[cell_index(local)])
    }

    pub fn state(&self) -> ChunkState {
        if self.in_flight.is_some() {
            ChunkState::Processing
        } else if self.geometry_dirty || self.lighting_dirty {
            ChunkState::Dirty
        } else {
            ChunkState::Clean
        }
    }

    /// Write one cell at a world position.
    ///
    /// Positions outside this chunk are ignored. Returns true if the cell changed.
    pub fn write_cell(&mut self, world_pos: IVec3, value: VoxelCell) -> bool {
        let local = world_pos - self.coord.world_origin();
        if !in_chunk(local) {
            return false;
        }
        let index = cell_index(local);
        if self.cells[index] == value {
            return false;
        }
        self.cells[index] = value;
        self.stale_probes |= affected_mask(local);
        self.modified = true;
        self.mark_geometry_dirty(false);
        true
    }

    /// Request a geometry rebuild. Priority chunks are dispatched first.
    pub fn mark_geometry_dirty(&mut self, priority: bool) {
        self.geometry_dirty = true;
        self.priority_update |= priority;
        self.convergence_counter = 0;
    }

    /// Request a light-channel rebuild
    pub fn mark_lighting_dirty(&mut self) {
        self.lighting_dirty = true;
    }

    pub fn is_geometry_dirty(&self) -> bool {
        self.geometry_dirty
    }

    pub fn is_lighting_dirty(&self) -> bool {
        self.lighting_dirty
    }

    pub fn is_priority(&self) -> bool {
        self.priority_update
    }

    pub fn in_flight(&self) -> Option<JobTicket> {
        self.in_flight
    }

    /// Dirty with no job in flight
    pub fn needs_processing(&self) -> bool {
        (self.geometry_dirty || self.lighting_dirty) && self.in_flight.is_none()
    }

    /// Snapshot the chunk and its halo and start a job.
    ///
    /// Returns `None` (with a warning) if a job is already in flight.
    pub fn begin_processing(&mut self, halo: &dyn WorldQuery, context: &JobContext) -> Option<MeshJob> {
        if self.in_flight.is_some() {
            log::warn!("Chunk {:?} already has a job in flight", self.coord);
            return None;
        }
        let snapshot = PaddedSnapshot::capture(&self.cells, self.coord.world_origin(), halo);
        self.begin_with_snapshot(snapshot, context)
    }

    /// Start a job on an already captured snapshot
    pub fn begin_with_snapshot(&mut self, snapshot: PaddedSnapshot, context: &JobContext) -> Option<MeshJob> {
        if let Some(ticket) = self.in_flight {
            log::warn!("Chunk {:?} already has job {} in flight", self.coord, ticket.sequence);
            return None;
        }

        let kind = match (&self.surfaces, self.geometry_dirty) {
            (Some(surfaces), false) => JobKind::Lighting { surfaces: surfaces.clone() },
            _ => JobKind::Geometry,
        };

        self.next_sequence += 1;
        let ticket = JobTicket { coord: self.coord, instance: self.instance, sequence: self.next_sequence };
        self.in_flight = Some(ticket);
        self.geometry_dirty = false;
        self.lighting_dirty = false;
        self.priority_update = false;
        self.stats.jobs_started += 1;
        self.baked_probe_lighting = self.probe_lighting.clone();

        Some(MeshJob::new(
            ticket,
            kind,
            snapshot,
            self.lights.clone(),
            self.probe_lighting.clone(),
            context.clone(),
        ))
    }

    /// Apply a finished job. Results whose ticket is not the one in flight are
    /// dropped; returns whether the result was applied.
    pub fn commit(&mut self, result: JobResult) -> bool {
        if self.in_flight != Some(result.ticket) {
            log::debug!(
                "Dropping stale result for chunk {:?} (ticket {:?}, in flight {:?})",
                self.coord,
                result.ticket,
                self.in_flight
            );
            self.stats.stale_results += 1;
            return false;
        }
        self.in_flight = None;

        if let Some(surfaces) = result.surfaces {
            self.surfaces = Some(Arc::new(surfaces));
            self.rebuild_collision();
            if let Some(placements) = result.placements {
                self.apply_placements(placements);
            }
        } else if let Some(baked) = result.baked {
            if let Some(surfaces) = self.surfaces.as_mut() {
                if !baked.apply(Arc::make_mut(surfaces)) {
                    self.lighting_dirty = true;
                }
            }
        }

        self.refresh_material_uniforms();
        self.stats.jobs_committed += 1;
        true
    }

    fn rebuild_collision(&mut self) {
        let mask = SolidMask::from_chunk_cells(&self.cells);
        self.collision_volumes = generate_collision_boxes(&mask, self.coord.world_origin_f32());
    }

    fn apply_placements(&mut self, placements: Vec<Option<Vec3>>) {
        if self.probes_checked_out {
            self.pending_placements = Some(placements);
            return;
        }
        let field = self
            .probes
            .get_or_insert_with(|| Box::new(ProbeField::new(self.coord.world_origin(), self.probe_samples)));
        field.place(&placements, self.stale_probes);
        self.stale_probes = 0;
    }

    fn refresh_material_uniforms(&mut self) {
        self.material_uniforms = match &self.surfaces {
            Some(surfaces) => material_uniforms(surfaces, &self.lights, self.coord.world_origin_f32()),
            None => MaterialUniforms::default(),
        };
    }

    /// Reference a light from this chunk. Hero lights update the material
    /// uniforms immediately; detail lights trigger a lighting rebuild.
    pub fn add_light(&mut self, light: PointLight, class: LightClass) -> LightClass {
        let class = self.lights.add(light, class);
        match class {
            LightClass::Hero => self.refresh_material_uniforms(),
            LightClass::Detail => self.mark_lighting_dirty(),
        }
        class
    }

    pub fn clear_lights(&mut self) {
        let had_detail = !self.lights.detail().is_empty();
        self.lights.clear();
        self.refresh_material_uniforms();
        if had_detail {
            self.mark_lighting_dirty();
        }
    }

    pub fn lights(&self) -> &LightSet {
        &self.lights
    }

    pub fn surfaces(&self) -> Option<&Arc<ChunkSurfaces>> {
        self.surfaces.as_ref()
    }

    pub fn material_uniforms(&self) -> &MaterialUniforms {
        &self.material_uniforms
    }

    /// World-space collision boxes, replaced wholesale on each geometry commit
    pub fn collision_volumes(&self) -> &[Aabb] {
        &self.collision_volumes
    }

    pub fn probes(&self) -> Option<&ProbeField> {
        self.probes.as_deref()
    }

    pub fn probe_lighting(&self) -> &Arc<Vec<ProbeLight>> {
        &self.probe_lighting
    }

    pub fn convergence_counter(&self) -> u32 {
        self.convergence_counter
    }

    /// Whether probe updates have settled for `limit` consecutive batches
    pub fn is_converged(&self, limit: u32) -> bool {
        self.convergence_counter > limit
    }

    /// Whether a probe batch could be dispatched now
    pub fn wants_probe_batch(&self, convergence_limit: u32) -> bool {
        !self.probes_checked_out
            && !self.is_converged(convergence_limit)
            && self.probes.as_ref().is_some_and(|f| f.enabled_count() > 0)
    }

    /// Check the probe field out for an update on the worker pool
    pub fn take_probe_batch(&mut self, convergence_limit: u32) -> Option<ProbeBatch> {
        if !self.wants_probe_batch(convergence_limit) {
            return None;
        }
        let field = self.probes.take()?;
        self.probes_checked_out = true;
        self.stats.probe_batches += 1;
        Some(ProbeBatch { coord: self.coord, instance: self.instance, field })
    }

    /// Return an updated probe field, applying convergence and dirty rules
    pub fn return_probe_batch(&mut self, result: ProbeBatchResult, config: &RadiosityConfig) -> bool {
        if result.instance != self.instance || !self.probes_checked_out {
            log::debug!("Dropping stale probe batch for chunk {:?}", self.coord);
            return false;
        }
        self.probes_checked_out = false;
        let mut field = result.field;

        if let Some(placements) = self.pending_placements.take() {
            // geometry changed while the batch ran; its samples are outdated
            field.place(&placements, self.stale_probes);
            self.stale_probes = 0;
            self.convergence_counter = 0;
        } else {
            if result.update.max_delta < config.convergence_threshold {
                self.convergence_counter += 1;
            } else {
                self.convergence_counter = 0;
            }
        }

        self.probe_lighting = Arc::new(field.lights(config.indirect_ceiling));
        self.probes = Some(field);
        if self.probe_drift() > config.lighting_change_threshold {
            self.mark_lighting_dirty();
        }
        true
    }

    /// Largest per-channel difference between current probe lighting and the
    /// lighting the surfaces were baked with. Missing probes count as black.
    fn probe_drift(&self) -> f32 {
        let baked = &self.baked_probe_lighting;
        let current = &self.probe_lighting;
        (0..baked.len().max(current.len()))
            .map(|i| {
                let a = baked.get(i).map_or(Color::ZERO, ProbeLight::color);
                let b = current.get(i).map_or(Color::ZERO, ProbeLight::color);
                (a - b).abs().max_element()
            })
            .fold(0.0, f32::max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;
    use crate::lighting::directions::SampleDirections;
    use crate::lighting::query::{ConstantLight, IncidentLight};
    use crate::mesh::config::LightingConfig;
    use crate::mesh::tables::MeshTables;
    use crate::voxel::block::{BlockDefinition, BlockRegistry};
    use crate::voxel::query::EmptyWorld;

    fn context() -> JobContext {
        let registry = BlockRegistry::new().with(BlockDefinition::cube(1, "stone", "stone")).unwrap();
        JobContext::new(Arc::new(registry), Arc::new(MeshTables::new()), LightingConfig::default())
    }

    fn process(chunk: &mut Chunk, context: &JobContext) -> bool {
        match chunk.begin_processing(&EmptyWorld, context) {
            Some(job) => chunk.commit(job.run()),
            None => false,
        }
    }

    #[test]
    fn test_coord_conversions() {
        assert_eq!(ChunkCoord::from_voxel_pos(IVec3::new(-1, 0, 31)), ChunkCoord::new(-1, 0, 1));
        assert_eq!(ChunkCoord::from_world_pos(Vec3::new(-0.5, 15.9, 16.0)), ChunkCoord::new(-1, 0, 1));
        assert_eq!(ChunkCoord::new(1, -2, 0).world_origin(), IVec3::new(16, -32, 0));
        assert_eq!(ChunkCoord::new(0, 0, 0).neighbor(Face::NegY), ChunkCoord::new(0, -1, 0));
    }

    #[test]
    fn test_cell_index_is_x_major() {
        assert_eq!(cell_index(IVec3::new(0, 0, 1)), 1);
        assert_eq!(cell_index(IVec3::new(0, 1, 0)), 16);
        assert_eq!(cell_index(IVec3::new(1, 0, 0)), 256);
        assert_eq!(cell_index(IVec3::splat(15)), CHUNK_VOLUME - 1);
    }

    #[test]
    fn test_write_outside_is_noop() {
        let mut chunk = Chunk::new(ChunkCoord::new(1, 0, 0));
        chunk.geometry_dirty = false;
        assert!(!chunk.write_cell(IVec3::new(3, 3, 3), VoxelCell::solid(1)));
        assert!(!chunk.is_geometry_dirty());
        assert!(chunk.write_cell(IVec3::new(19, 3, 3), VoxelCell::solid(1)));
        assert!(chunk.is_geometry_dirty());
        assert_eq!(chunk.cell(IVec3::new(3, 3, 3)), VoxelCell::solid(1));
        assert_eq!(chunk.cell_at(IVec3::new(19, 3, 3)), Some(VoxelCell::solid(1)));
        assert!(chunk.modified);
    }

    #[test]
    fn test_from_cells_checks_length() {
        assert!(Chunk::from_cells(ChunkCoord::default(), vec![VoxelCell::AIR; 10]).is_none());
        let chunk = Chunk::from_cells(ChunkCoord::default(), vec![VoxelCell::solid(1); CHUNK_VOLUME]).unwrap();
        assert!(chunk.needs_processing());
    }

    #[test]
    fn test_instances_are_unique() {
        let a = Chunk::new(ChunkCoord::default());
        let b = Chunk::new(ChunkCoord::default());
        assert_ne!(a.instance(), b.instance());
    }

    #[test]
    fn test_single_job_in_flight() {
        let context = context();
        let mut chunk = Chunk::new(ChunkCoord::default());
        let job = chunk.begin_processing(&EmptyWorld, &context).unwrap();
        assert_eq!(chunk.state(), ChunkState::Processing);
        assert!(!chunk.needs_processing());
        assert!(chunk.begin_processing(&EmptyWorld, &context).is_none());

        // a write during processing re-dirties but cannot start a second job
        chunk.write_cell(IVec3::new(1, 1, 1), VoxelCell::solid(1));
        assert!(!chunk.needs_processing());
        assert!(chunk.commit(job.run()));
        assert_eq!(chunk.state(), ChunkState::Dirty);
        assert!(process(&mut chunk, &context));
        assert_eq!(chunk.state(), ChunkState::Clean);
        assert_eq!(chunk.stats.jobs_committed, 2);
    }

    #[test]
    fn test_commit_builds_surfaces_and_collision() {
        let context = context();
        let mut chunk = Chunk::new(ChunkCoord::new(0, 1, 0));
        for x in 0..2 {
            chunk.write_cell(IVec3::new(x, 16, 0), VoxelCell::solid(1));
        }
        assert!(process(&mut chunk, &context));
        let surfaces = chunk.surfaces().unwrap();
        assert_eq!(surfaces.main.group("stone").unwrap().buffers.triangle_count(), 20);
        assert_eq!(
            chunk.collision_volumes(),
            &[Aabb::new(Vec3::new(0.0, 16.0, 0.0), Vec3::new(2.0, 17.0, 1.0))]
        );
        assert!(chunk.probes().unwrap().enabled_count() > 0);
    }

    #[test]
    fn test_stale_ticket_is_dropped() {
        let context = context();
        let mut a = Chunk::new(ChunkCoord::default());
        let mut b = Chunk::new(ChunkCoord::default());
        let job_a = a.begin_processing(&EmptyWorld, &context).unwrap();
        let _job_b = b.begin_processing(&EmptyWorld, &context).unwrap();
        // same coord and sequence, different instance
        assert!(!b.commit(job_a.run()));
        assert_eq!(b.stats.stale_results, 1);
        assert_eq!(b.state(), ChunkState::Processing);
    }

    #[test]
    fn test_lighting_only_job_keeps_geometry() {
        let context = context();
        let mut chunk = Chunk::new(ChunkCoord::default());
        chunk.write_cell(IVec3::new(4, 4, 4), VoxelCell::solid(1));
        assert!(process(&mut chunk, &context));
        let before = chunk.surfaces().unwrap().clone();

        chunk.add_light(PointLight::new(Vec3::new(4.5, 6.0, 4.5), Vec3::ONE, 1.0, 6.0), LightClass::Detail);
        assert!(chunk.is_lighting_dirty() && !chunk.is_geometry_dirty());
        let job = chunk.begin_processing(&EmptyWorld, &context).unwrap();
        assert!(!job.rebuilds_geometry());
        assert!(chunk.commit(job.run()));

        let after = chunk.surfaces().unwrap();
        let (b, a) = (&before.main.groups[0].buffers, &after.main.groups[0].buffers);
        assert_eq!(a.positions, b.positions);
        assert_ne!(a.light_a, b.light_a);
    }

    #[test]
    fn test_hero_light_updates_uniforms_without_rebuild() {
        let context = context();
        let mut chunk = Chunk::new(ChunkCoord::default());
        chunk.write_cell(IVec3::new(4, 4, 4), VoxelCell::solid(1));
        assert!(process(&mut chunk, &context));
        chunk.add_light(PointLight::new(Vec3::new(4.5, 6.0, 4.5), Vec3::ONE, 1.0, 6.0), LightClass::Hero);
        assert_eq!(chunk.state(), ChunkState::Clean);
        assert_eq!(chunk.material_uniforms().get("stone").unwrap().count, 1);
    }

    #[test]
    fn test_probe_batches_converge_and_stop() {
        let context = context();
        let config = RadiosityConfig::default();
        let directions = SampleDirections::generate(config.direction_count as usize, config.direction_seed);
        let light = ConstantLight(IncidentLight::new(Vec3::splat(0.6), Vec3::splat(0.2)));

        let mut chunk = Chunk::new(ChunkCoord::default());
        for x in 0..16 {
            for z in 0..16 {
                chunk.write_cell(IVec3::new(x, 0, z), VoxelCell::solid(1));
            }
        }
        assert!(process(&mut chunk, &context));

        let mut batches = 0;
        while let Some(batch) = chunk.take_probe_batch(config.convergence_limit) {
            assert!(chunk.take_probe_batch(config.convergence_limit).is_none());
            chunk.return_probe_batch(batch.run(&light, &directions, &config), &config);
            batches += 1;
            assert!(batches < 50);
        }
        assert!(chunk.is_converged(config.convergence_limit));
        // first batch moved the estimate enough to relight
        assert!(chunk.is_lighting_dirty());
        assert!(chunk.probe_lighting().iter().all(|p| (p.color() - Vec3::splat(0.8)).length() < 1e-4));

        // a geometry edit resets convergence
        chunk.write_cell(IVec3::new(2, 1, 2), VoxelCell::solid(1));
        assert_eq!(chunk.convergence_counter(), 0);
        assert!(chunk.wants_probe_batch(config.convergence_limit));
    }

    #[test]
    fn test_slow_drift_accumulates_into_relight() {
        let context = context();
        let config = RadiosityConfig::default();
        let directions = SampleDirections::generate(config.direction_count as usize, config.direction_seed);
        let level = AtomicU32::new(0.2f32.to_bits());
        let light = |_: Vec3, _: Vec3, _: f32| {
            IncidentLight::new(Vec3::splat(f32::from_bits(level.load(Ordering::Relaxed))), Vec3::ZERO)
        };

        let mut chunk = Chunk::new(ChunkCoord::default());
        for x in 0..16 {
            for z in 0..16 {
                chunk.write_cell(IVec3::new(x, 0, z), VoxelCell::solid(1));
            }
        }
        assert!(process(&mut chunk, &context));

        let mut relights = 0;
        for step in 0..20 {
            level.store((0.2 + 0.06 * step as f32).to_bits(), Ordering::Relaxed);
            let batch = chunk.take_probe_batch(config.convergence_limit).unwrap();
            let result = batch.run(&light, &directions, &config);
            // every batch moves the estimate by less than the relight threshold
            assert!(step == 0 || result.update.max_delta < config.lighting_change_threshold);
            chunk.return_probe_batch(result, &config);
            if chunk.is_lighting_dirty() {
                assert!(process(&mut chunk, &context));
                relights += 1;
            }
        }

        assert!(relights >= 3);
        assert!(chunk.probe_drift() <= config.lighting_change_threshold);
        let brightest = chunk.baked_probe_lighting.iter().map(|p| p.color().x).fold(0.0, f32::max);
        assert!(brightest > 0.8);
    }

    #[test]
    fn test_placements_deferred_while_batch_out() {
        let context = context();
        let config = RadiosityConfig::default();
        let directions = SampleDirections::generate(16, 1);
        let light = ConstantLight(IncidentLight::new(Vec3::ONE, Vec3::ZERO));

        let mut chunk = Chunk::new(ChunkCoord::default());
        chunk.write_cell(IVec3::new(1, 0, 1), VoxelCell::solid(1));
        assert!(process(&mut chunk, &context));
        let batch = chunk.take_probe_batch(config.convergence_limit).unwrap();

        chunk.write_cell(IVec3::new(9, 9, 9), VoxelCell::solid(1));
        assert!(process(&mut chunk, &context));
        assert!(chunk.probes().is_none());

        assert!(chunk.return_probe_batch(batch.run(&light, &directions, &config), &config));
        assert_eq!(chunk.probes().unwrap().enabled_count(), 2);
        assert_eq!(chunk.convergence_counter(), 0);
    }
}

//! World container: owns every chunk and drives the worker pool
//!
//! Each [`World::tick`] commits whatever the workers finished since the last
//! tick, then hands out new mesh jobs and probe batches. The main thread never
//! blocks on a worker.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use glam::IVec3;

use crate::config::EngineConfig;
use crate::core::{Error, Result};
use crate::lighting::directions::SampleDirections;
use crate::lighting::field::ProbeBatchResult;
use crate::lighting::query::LightQuery;
use crate::mesh::lighting::{LightClass, PointLight};
use crate::mesh::processor::{JobContext, JobResult, MeshJob};
use crate::mesh::snapshot::PaddedSnapshot;
use crate::mesh::tables::MeshTables;
use crate::streaming::wire;
use crate::voxel::block::BlockRegistry;
use crate::voxel::cell::VoxelCell;
use crate::voxel::chunk::{Chunk, ChunkCoord, ChunkState};
use crate::voxel::query::WorldQuery;

/// Read-only view over a chunk map; unloaded chunks read as air
pub struct ChunkMapView<'a>(pub &'a HashMap<ChunkCoord, Chunk>);

impl WorldQuery for ChunkMapView<'_> {
    fn read_voxel_at(&self, world_pos: IVec3) -> VoxelCell {
        self.0
            .get(&ChunkCoord::from_voxel_pos(world_pos))
            .and_then(|chunk| chunk.cell_at(world_pos))
            .unwrap_or(VoxelCell::AIR)
    }
}

/// What one tick did
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TickStats {
    pub committed: usize,
    pub stale: usize,
    pub jobs_dispatched: usize,
    pub probe_batches_returned: usize,
    pub probe_batches_dispatched: usize,
}

type Queue<T> = Arc<Mutex<Vec<T>>>;

fn drain<T>(queue: &Queue<T>) -> Vec<T> {
    std::mem::take(&mut *queue.lock().unwrap_or_else(PoisonError::into_inner))
}

pub struct World {
    chunks: HashMap<ChunkCoord, Chunk>,
    config: EngineConfig,
    context: JobContext,
    directions: Arc<SampleDirections>,
    light_query: Arc<dyn LightQuery>,
    pool: rayon::ThreadPool,
    completed: Queue<JobResult>,
    probe_completed: Queue<ProbeBatchResult>,
    /// Work spawned on the pool whose result is not yet queued
    pending: Arc<AtomicUsize>,
}

impl World {
    /// Create an empty world and start its worker pool
    pub fn new(config: EngineConfig, registry: BlockRegistry, light_query: Arc<dyn LightQuery>) -> Result<Self> {
        config.validate()?;

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.world.worker_threads)
            .thread_name(|i| format!("voxbake-worker-{}", i))
            .build()
            .map_err(|e| Error::WorkerPool(e.to_string()))?;

        let directions = SampleDirections::generate(
            config.radiosity.direction_count as usize,
            config.radiosity.direction_seed,
        );
        let context = JobContext::new(Arc::new(registry), Arc::new(MeshTables::new()), config.lighting.clone());

        log::info!(
            "World started: {} workers, {} block definitions, {} sample directions",
            pool.current_num_threads(),
            context.registry.len(),
            directions.len()
        );

        Ok(Self {
            chunks: HashMap::new(),
            config,
            context,
            directions: Arc::new(directions),
            light_query,
            pool,
            completed: Arc::new(Mutex::new(Vec::new())),
            probe_completed: Arc::new(Mutex::new(Vec::new())),
            pending: Arc::new(AtomicUsize::new(0)),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn registry(&self) -> &BlockRegistry {
        &self.context.registry
    }

    pub fn chunk(&self, coord: ChunkCoord) -> Option<&Chunk> {
        self.chunks.get(&coord)
    }

    pub fn chunk_mut(&mut self, coord: ChunkCoord) -> Option<&mut Chunk> {
        self.chunks.get_mut(&coord)
    }

    pub fn chunks(&self) -> impl Iterator<Item = &Chunk> {
        self.chunks.values()
    }

    pub fn loaded_coords(&self) -> impl Iterator<Item = &ChunkCoord> {
        self.chunks.keys()
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Jobs and probe batches still running on the pool
    pub fn pending_jobs(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }

    /// Insert a chunk, replacing any chunk at the same coordinate.
    ///
    /// Loaded neighbors are marked dirty since their halo changed.
    pub fn insert_chunk(&mut self, mut chunk: Chunk) -> Option<Chunk> {
        let coord = chunk.coord();
        chunk.set_probe_samples(self.config.radiosity.max_samples as usize);
        let previous = self.chunks.insert(coord, chunk);
        for neighbor in halo_neighbors(coord) {
            if let Some(n) = self.chunks.get_mut(&neighbor) {
                n.mark_geometry_dirty(false);
            }
        }
        previous
    }

    /// Chunk at a coordinate, creating an all-air chunk if none is loaded
    pub fn get_or_create(&mut self, coord: ChunkCoord) -> &mut Chunk {
        let samples = self.config.radiosity.max_samples as usize;
        self.chunks.entry(coord).or_insert_with(|| {
            let mut chunk = Chunk::new(coord);
            chunk.set_probe_samples(samples);
            chunk
        })
    }

    /// Evict a chunk. Results of its in-flight work are dropped on arrival.
    pub fn remove_chunk(&mut self, coord: ChunkCoord) -> Option<Chunk> {
        let removed = self.chunks.remove(&coord)?;
        self.context.scratch.evict((coord, removed.instance()));
        Some(removed)
    }

    /// Write one cell at a world position.
    ///
    /// Creates the owning chunk if needed. Chunks whose halo contains the cell
    /// are marked dirty too. Returns whether anything changed.
    pub fn write_voxel(&mut self, world_pos: IVec3, cell: VoxelCell, priority: bool) -> bool {
        let coord = ChunkCoord::from_voxel_pos(world_pos);
        let chunk = self.get_or_create(coord);
        if !chunk.write_cell(world_pos, cell) {
            return false;
        }
        if priority {
            chunk.mark_geometry_dirty(true);
        }

        let mut touched = Vec::with_capacity(8);
        for dx in -1..=1 {
            for dy in -1..=1 {
                for dz in -1..=1 {
                    let owner = ChunkCoord::from_voxel_pos(world_pos + IVec3::new(dx, dy, dz));
                    if owner != coord && !touched.contains(&owner) {
                        touched.push(owner);
                    }
                }
            }
        }
        for owner in touched {
            if let Some(neighbor) = self.chunks.get_mut(&owner) {
                neighbor.mark_geometry_dirty(priority);
            }
        }
        true
    }

    /// Decode a replicated chunk and install it, dirty
    pub fn replicate(&mut self, bytes: &[u8]) -> Result<ChunkCoord> {
        let chunk = wire::decode(bytes)?;
        let coord = chunk.coord();
        log::debug!("Replicated chunk {:?}", coord);
        self.insert_chunk(chunk);
        Ok(coord)
    }

    /// Add a light to every loaded chunk its radius reaches. Returns how many.
    pub fn add_light(&mut self, light: PointLight, class: LightClass) -> usize {
        let bounds = light.bounds();
        let mut count = 0;
        for chunk in self.chunks.values_mut() {
            if chunk.coord().bounds().intersects(&bounds) {
                chunk.add_light(light, class);
                count += 1;
            }
        }
        count
    }

    /// Coordinates of chunks modified since the last call; clears their flag
    pub fn take_modified(&mut self) -> Vec<ChunkCoord> {
        let mut coords: Vec<ChunkCoord> = self
            .chunks
            .values_mut()
            .filter(|c| c.modified)
            .map(|c| {
                c.modified = false;
                c.coord()
            })
            .collect();
        coords.sort();
        coords
    }

    /// Advance one frame: commit, return probe batches, dispatch new work
    pub fn tick(&mut self) -> TickStats {
        let mut stats = TickStats::default();

        for result in drain(&self.completed) {
            let applied = match self.chunks.get_mut(&result.ticket.coord) {
                Some(chunk) => chunk.commit(result),
                None => {
                    log::debug!("Dropping result for unloaded chunk {:?}", result.ticket.coord);
                    false
                }
            };
            if applied {
                stats.committed += 1;
            } else {
                stats.stale += 1;
            }
        }

        for result in drain(&self.probe_completed) {
            if let Some(chunk) = self.chunks.get_mut(&result.coord) {
                if chunk.return_probe_batch(result, &self.config.radiosity) {
                    stats.probe_batches_returned += 1;
                }
            }
        }

        stats.jobs_dispatched = self.dispatch_jobs();
        stats.probe_batches_dispatched = self.dispatch_probe_batches();

        if stats != TickStats::default() {
            log::debug!(
                "tick: committed {} stale {} dispatched {} probes {}/{} pending {}",
                stats.committed,
                stats.stale,
                stats.jobs_dispatched,
                stats.probe_batches_returned,
                stats.probe_batches_dispatched,
                self.pending_jobs()
            );
        }
        stats
    }

    fn dispatch_jobs(&mut self) -> usize {
        let mut ready: Vec<(bool, ChunkCoord)> = self
            .chunks
            .values()
            .filter(|c| c.needs_processing())
            .map(|c| (!c.is_priority(), c.coord()))
            .collect();
        ready.sort_unstable();
        ready.truncate(self.config.world.max_jobs_per_frame);

        let mut dispatched = 0;
        for (_, coord) in ready {
            let Some(chunk) = self.chunks.get(&coord) else { continue };
            let snapshot = PaddedSnapshot::capture(chunk.cells(), coord.world_origin(), &ChunkMapView(&self.chunks));
            let Some(chunk) = self.chunks.get_mut(&coord) else { continue };
            if let Some(job) = chunk.begin_with_snapshot(snapshot, &self.context) {
                self.spawn_job(job);
                dispatched += 1;
            }
        }
        dispatched
    }

    fn spawn_job(&self, job: MeshJob) {
        let completed = Arc::clone(&self.completed);
        let pending = Arc::clone(&self.pending);
        pending.fetch_add(1, Ordering::AcqRel);
        self.pool.spawn(move || {
            let result = job.run();
            completed.lock().unwrap_or_else(PoisonError::into_inner).push(result);
            pending.fetch_sub(1, Ordering::AcqRel);
        });
    }

    fn dispatch_probe_batches(&mut self) -> usize {
        let limit = self.config.radiosity.convergence_limit;
        // least served first so a noisy chunk cannot starve the rest
        let mut ready: Vec<(u64, ChunkCoord)> = self
            .chunks
            .values()
            .filter(|c| c.wants_probe_batch(limit))
            .map(|c| (c.stats.probe_batches, c.coord()))
            .collect();
        ready.sort_unstable();
        ready.truncate(self.config.world.max_probe_batches_per_frame);

        let mut dispatched = 0;
        for (_, coord) in ready {
            let Some(batch) = self.chunks.get_mut(&coord).and_then(|c| c.take_probe_batch(limit)) else {
                continue;
            };
            let query = Arc::clone(&self.light_query);
            let directions = Arc::clone(&self.directions);
            let config = self.config.radiosity.clone();
            let completed = Arc::clone(&self.probe_completed);
            let pending = Arc::clone(&self.pending);
            pending.fetch_add(1, Ordering::AcqRel);
            self.pool.spawn(move || {
                let result = batch.run(query.as_ref(), &directions, &config);
                completed.lock().unwrap_or_else(PoisonError::into_inner).push(result);
                pending.fetch_sub(1, Ordering::AcqRel);
            });
            dispatched += 1;
        }
        dispatched
    }

    /// Block until the pool has no running work, or the timeout passes.
    /// Returns true if idle. Finished results still need a [`World::tick`].
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while self.pending_jobs() > 0 {
            if Instant::now() >= deadline {
                return false;
            }
            std::thread::sleep(Duration::from_millis(1));
        }
        true
    }

    /// Nothing running, nothing queued, every chunk clean and converged
    pub fn is_settled(&self) -> bool {
        let limit = self.config.radiosity.convergence_limit;
        self.pending_jobs() == 0
            && self.completed.lock().unwrap_or_else(PoisonError::into_inner).is_empty()
            && self.probe_completed.lock().unwrap_or_else(PoisonError::into_inner).is_empty()
            && self
                .chunks
                .values()
                .all(|c| c.state() == ChunkState::Clean && !c.wants_probe_batch(limit))
    }
}

impl WorldQuery for World {
    fn read_voxel_at(&self, world_pos: IVec3) -> VoxelCell {
        ChunkMapView(&self.chunks).read_voxel_at(world_pos)
    }
}

/// Chunks whose 1-cell halo overlaps the given chunk
fn halo_neighbors(coord: ChunkCoord) -> impl Iterator<Item = ChunkCoord> {
    (-1..=1).flat_map(move |dx| {
        (-1..=1).flat_map(move |dy| {
            (-1..=1).filter_map(move |dz| {
                let n = ChunkCoord::new(coord.x + dx, coord.y + dy, coord.z + dz);
                (n != coord).then_some(n)
            })
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lighting::directions::SimpleRng;
    use crate::lighting::query::{ConstantLight, IncidentLight};
    use crate::voxel::block::BlockDefinition;
    use crate::voxel::chunk::CHUNK_VOLUME;
    use glam::Vec3;

    const WAIT: Duration = Duration::from_secs(10);

    fn world() -> World {
        let mut config = EngineConfig::default();
        config.world.worker_threads = 2;
        let registry = BlockRegistry::new()
            .with(BlockDefinition::cube(1, "stone", "stone"))
            .unwrap()
            .with(BlockDefinition::cube(2, "dirt", "dirt"))
            .unwrap();
        let light = ConstantLight(IncidentLight::new(Vec3::splat(0.5), Vec3::splat(0.25)));
        World::new(config, registry, Arc::new(light)).unwrap()
    }

    fn settle(world: &mut World, max_ticks: usize) -> bool {
        for _ in 0..max_ticks {
            world.tick();
            assert!(world.wait_idle(WAIT));
            if world.is_settled() {
                return true;
            }
        }
        false
    }

    fn assert_single_in_flight(world: &World) {
        for chunk in world.chunks() {
            let in_flight = chunk.in_flight().is_some() as u64;
            assert_eq!(chunk.stats.jobs_started - chunk.stats.jobs_committed, in_flight, "{:?}", chunk.coord());
        }
    }

    #[test]
    fn test_write_and_read_back() {
        let mut world = world();
        assert!(world.write_voxel(IVec3::new(-1, 3, 20), VoxelCell::solid(1), false));
        assert!(!world.write_voxel(IVec3::new(-1, 3, 20), VoxelCell::solid(1), false));
        assert_eq!(world.read_voxel_at(IVec3::new(-1, 3, 20)), VoxelCell::solid(1));
        assert_eq!(world.read_voxel_at(IVec3::new(500, 3, 20)), VoxelCell::AIR);
        assert!(world.chunk(ChunkCoord::new(-1, 0, 1)).is_some());
        assert_eq!(world.take_modified(), vec![ChunkCoord::new(-1, 0, 1)]);
        assert!(world.take_modified().is_empty());
    }

    #[test]
    fn test_border_write_dirties_neighbor() {
        let mut world = world();
        world.get_or_create(ChunkCoord::new(0, 0, 0));
        world.get_or_create(ChunkCoord::new(1, 0, 0));
        world.get_or_create(ChunkCoord::new(0, 0, 1));
        assert!(settle(&mut world, 100));

        world.write_voxel(IVec3::new(15, 4, 4), VoxelCell::solid(1), false);
        assert!(world.chunk(ChunkCoord::new(1, 0, 0)).unwrap().is_geometry_dirty());
        assert!(!world.chunk(ChunkCoord::new(0, 0, 1)).unwrap().is_geometry_dirty());

        // interior write leaves neighbors alone
        assert!(settle(&mut world, 100));
        world.write_voxel(IVec3::new(7, 4, 4), VoxelCell::solid(1), false);
        assert!(!world.chunk(ChunkCoord::new(1, 0, 0)).unwrap().is_geometry_dirty());
    }

    #[test]
    fn test_halo_faces_follow_neighbor() {
        let mut world = world();
        world.write_voxel(IVec3::new(15, 0, 0), VoxelCell::solid(1), false);
        assert!(settle(&mut world, 100));
        let faces = |w: &World| w.chunk(ChunkCoord::default()).unwrap().surfaces().unwrap().main.triangle_count() / 2;
        assert_eq!(faces(&world), 6);

        // neighbor across +X hides one face once the halo re-converges
        world.write_voxel(IVec3::new(16, 0, 0), VoxelCell::solid(1), false);
        assert!(settle(&mut world, 100));
        assert_eq!(faces(&world), 5);
    }

    #[test]
    fn test_priority_chunks_dispatch_first() {
        let mut config = EngineConfig::default();
        config.world.max_jobs_per_frame = 1;
        config.world.max_probe_batches_per_frame = 0;
        let light = ConstantLight(IncidentLight::ZERO);
        let mut world = World::new(config, BlockRegistry::new(), Arc::new(light)).unwrap();
        world.get_or_create(ChunkCoord::new(0, 0, 0));
        world.get_or_create(ChunkCoord::new(5, 0, 0));
        world.chunk_mut(ChunkCoord::new(5, 0, 0)).unwrap().mark_geometry_dirty(true);

        assert_eq!(world.tick().jobs_dispatched, 1);
        assert!(world.chunk(ChunkCoord::new(5, 0, 0)).unwrap().in_flight().is_some());
        assert!(world.chunk(ChunkCoord::new(0, 0, 0)).unwrap().in_flight().is_none());
    }

    #[test]
    fn test_removed_chunk_result_is_dropped() {
        let mut world = world();
        world.write_voxel(IVec3::new(1, 1, 1), VoxelCell::solid(1), false);
        assert_eq!(world.tick().jobs_dispatched, 1);
        world.remove_chunk(ChunkCoord::default());
        assert_eq!(world.chunk_count(), 0);

        // a fresh chunk at the same coordinate must not receive the old result
        world.get_or_create(ChunkCoord::default());
        assert!(world.wait_idle(WAIT));
        let stats = world.tick();
        assert_eq!(stats.stale, 1);
        assert_eq!(stats.committed, 0);
        assert!(world.chunk(ChunkCoord::default()).unwrap().surfaces().is_none());
        assert!(settle(&mut world, 100));
    }

    #[test]
    fn test_evicted_chunk_scratch_is_not_retained() {
        let mut world = world();
        world.write_voxel(IVec3::new(1, 1, 1), VoxelCell::solid(1), false);
        assert_eq!(world.tick().jobs_dispatched, 1);
        world.remove_chunk(ChunkCoord::default());

        assert!(world.wait_idle(WAIT));
        assert_eq!(world.tick().stale, 1);
        assert_eq!(world.chunk_count(), 0);
        assert!(world.context.scratch.is_empty());
        assert_eq!(world.context.scratch.checked_out(), 0);
    }

    #[test]
    fn test_replicate() {
        let mut world = world();
        let mut cells = vec![VoxelCell::AIR; CHUNK_VOLUME];
        cells[0] = VoxelCell::solid(2);
        let bytes = wire::encode_parts(ChunkCoord::new(2, -1, 0), &cells);
        assert_eq!(world.replicate(&bytes).unwrap(), ChunkCoord::new(2, -1, 0));
        assert_eq!(world.read_voxel_at(IVec3::new(32, -16, 0)), VoxelCell::solid(2));
        assert!(world.chunk(ChunkCoord::new(2, -1, 0)).unwrap().needs_processing());

        assert!(matches!(world.replicate(&bytes[..10]), Err(Error::Wire(_))));
    }

    #[test]
    fn test_light_reaches_overlapping_chunks() {
        let mut world = world();
        world.get_or_create(ChunkCoord::new(0, 0, 0));
        world.get_or_create(ChunkCoord::new(1, 0, 0));
        world.get_or_create(ChunkCoord::new(3, 0, 0));
        let light = PointLight::new(Vec3::new(15.0, 8.0, 8.0), Vec3::ONE, 1.0, 4.0);
        assert_eq!(world.add_light(light, LightClass::Detail), 2);
        assert!(world.chunk(ChunkCoord::new(1, 0, 0)).unwrap().is_lighting_dirty());
        assert!(!world.chunk(ChunkCoord::new(3, 0, 0)).unwrap().is_lighting_dirty());
    }

    #[test]
    fn test_single_in_flight_under_random_writes() {
        let mut world = world();
        let mut rng = SimpleRng::new(42);
        for tick in 0..80 {
            for _ in 0..6 {
                let pos = IVec3::new(rng.below(32) as i32, rng.below(16) as i32, rng.below(32) as i32);
                let cell = match rng.below(3) {
                    0 => VoxelCell::AIR,
                    1 => VoxelCell::solid(1),
                    _ => VoxelCell::solid(2),
                };
                world.write_voxel(pos, cell, rng.below(4) == 0);
            }
            let stats = world.tick();
            assert!(stats.jobs_dispatched <= world.config().world.max_jobs_per_frame);
            assert_single_in_flight(&world);
            if tick % 7 == 0 {
                assert!(world.wait_idle(WAIT));
            }
        }

        assert!(settle(&mut world, 500));
        assert_single_in_flight(&world);
        for chunk in world.chunks() {
            assert!(chunk.surfaces().is_some());
            assert_eq!(chunk.stats.stale_results, 0);
        }
    }
}

//! Mesh/lighting jobs
//!
//! A [`MeshJob`] owns everything it reads: a padded voxel snapshot, the
//! chunk's light set, the probe lighting snapshot and `Arc` handles to the
//! shared registry and tables. It runs once on a worker thread and produces a
//! [`JobResult`] that the chunk commits on the main thread.
//!
//! Geometry is built cell by cell in x, y, z order:
//! - air and fake blocks are skipped
//! - tiled blocks try their footprints largest first, then fall back to one cell
//! - custom and detail meshes are copied in unconditionally
//! - cube faces are emitted when the neighbor is non-solid and of another type

use std::sync::Arc;
use std::time::Instant;

use glam::{IVec3, Vec2, Vec3};

use crate::core::Color;
use crate::lighting::field::{compute_placements, ProbeLight};
use crate::mesh::ao::{brightness, face_occlusion, quad_indices, should_flip};
use crate::mesh::buffer::{ChunkSurfaces, MeshScratch, ScratchPool, SurfaceKind, VertexBuffers};
use crate::mesh::config::LightingConfig;
use crate::mesh::lighting::{pack_light, LightBaker, LightSet};
use crate::mesh::snapshot::PaddedSnapshot;
use crate::mesh::tables::MeshTables;
use crate::voxel::block::{BlockDefinition, BlockRegistry, BlockShape, MeshData, TileFootprint};
use crate::voxel::cell::{BlockId, VoxelCell};
use crate::voxel::chunk::ChunkCoord;
use crate::voxel::face::Face;

/// Identifies one dispatch of a chunk; results with a stale ticket are dropped
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct JobTicket {
    pub coord: ChunkCoord,
    /// Chunk instance id; changes when a chunk is evicted and re-created
    pub instance: u64,
    /// Per-chunk dispatch counter
    pub sequence: u64,
}

/// Shared, immutable inputs every job needs
#[derive(Clone, Debug)]
pub struct JobContext {
    pub registry: Arc<BlockRegistry>,
    pub tables: Arc<MeshTables>,
    pub scratch: Arc<ScratchPool>,
    pub lighting: LightingConfig,
}

impl JobContext {
    pub fn new(registry: Arc<BlockRegistry>, tables: Arc<MeshTables>, lighting: LightingConfig) -> Self {
        Self { registry, tables, scratch: Arc::new(ScratchPool::new()), lighting }
    }
}

/// What a job rebuilds
#[derive(Clone, Debug)]
pub enum JobKind {
    /// Full geometry plus light channels
    Geometry,
    /// Light channels only, for the surfaces currently committed
    Lighting { surfaces: Arc<ChunkSurfaces> },
}

/// Counters for one job
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct JobStats {
    pub faces: u32,
    pub tiles: u32,
    pub meshes: u32,
    pub vertices: u32,
    pub missing_definitions: u32,
    pub grow_events: u32,
    pub elapsed_ms: f32,
}

/// Light channels for every group of every surface, in surface/group order
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BakedLighting {
    pub surfaces: [Vec<GroupLight>; 3],
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct GroupLight {
    pub light_a: Vec<Vec2>,
    pub light_b: Vec<Vec2>,
}

impl BakedLighting {
    fn compute(surfaces: &ChunkSurfaces, baker: Option<&LightBaker<'_>>) -> Self {
        let mut baked = Self::default();
        for kind in SurfaceKind::ALL {
            baked.surfaces[kind.index()] = surfaces
                .surface(kind)
                .groups
                .iter()
                .map(|g| {
                    let (light_a, light_b) = bake_channels(baker, &g.buffers);
                    GroupLight { light_a, light_b }
                })
                .collect();
        }
        baked
    }

    /// Copy the channels into `surfaces`. Groups whose vertex count no longer
    /// matches are left untouched; returns false if any were skipped.
    pub fn apply(self, surfaces: &mut ChunkSurfaces) -> bool {
        let mut complete = true;
        for (kind, lights) in SurfaceKind::ALL.into_iter().zip(self.surfaces) {
            let groups = &mut surfaces.surface_mut(kind).groups;
            if groups.len() != lights.len() {
                complete = false;
                continue;
            }
            for (group, light) in groups.iter_mut().zip(lights) {
                if light.light_a.len() != group.buffers.vertex_count() {
                    complete = false;
                    continue;
                }
                group.buffers.light_a = light.light_a;
                group.buffers.light_b = light.light_b;
            }
        }
        complete
    }
}

/// Output of one job
#[derive(Debug)]
pub struct JobResult {
    pub ticket: JobTicket,
    pub surfaces: Option<ChunkSurfaces>,
    pub baked: Option<BakedLighting>,
    /// Probe positions derived from the same snapshot as `surfaces`
    pub placements: Option<Vec<Option<Vec3>>>,
    pub geometry_rebuilt: bool,
    pub lighting_rebuilt: bool,
    pub stats: JobStats,
}

pub struct MeshJob {
    pub ticket: JobTicket,
    kind: JobKind,
    snapshot: PaddedSnapshot,
    lights: LightSet,
    probes: Arc<Vec<ProbeLight>>,
    context: JobContext,
}

impl std::fmt::Debug for MeshJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MeshJob")
            .field("ticket", &self.ticket)
            .field("geometry", &matches!(self.kind, JobKind::Geometry))
            .field("snapshot", &"<PaddedSnapshot>")
            .finish()
    }
}

impl MeshJob {
    pub fn new(
        ticket: JobTicket,
        kind: JobKind,
        snapshot: PaddedSnapshot,
        lights: LightSet,
        probes: Arc<Vec<ProbeLight>>,
        context: JobContext,
    ) -> Self {
        Self { ticket, kind, snapshot, lights, probes, context }
    }

    pub fn rebuilds_geometry(&self) -> bool {
        matches!(self.kind, JobKind::Geometry)
    }

    /// Run the job to completion on the current thread
    pub fn run(self) -> JobResult {
        let start = Instant::now();
        let MeshJob { ticket, kind, snapshot, lights, probes, context } = self;
        let bake = context.lighting.bake_lighting;
        let baker = bake.then(|| LightBaker::new(&snapshot, &lights, &probes, &context.lighting));

        let mut result = match kind {
            JobKind::Geometry => {
                let mut scratch = context.scratch.acquire((ticket.coord, ticket.instance));
                let stats = build_geometry(&snapshot, &context.registry, &context.tables, &context.lighting, &mut scratch);
                for builder in &mut scratch.builders {
                    for group in builder.groups_mut() {
                        let (a, b) = bake_channels(baker.as_ref(), &group.buffers);
                        group.buffers.light_a = a;
                        group.buffers.light_b = b;
                    }
                }
                let surfaces = scratch.finish();
                context.scratch.release((ticket.coord, ticket.instance), scratch);
                JobResult {
                    ticket,
                    surfaces: Some(surfaces),
                    baked: None,
                    placements: Some(compute_placements(&snapshot)),
                    geometry_rebuilt: true,
                    lighting_rebuilt: true,
                    stats,
                }
            }
            JobKind::Lighting { surfaces } => JobResult {
                ticket,
                surfaces: None,
                baked: Some(BakedLighting::compute(&surfaces, baker.as_ref())),
                placements: None,
                geometry_rebuilt: false,
                lighting_rebuilt: true,
                stats: JobStats::default(),
            },
        };
        result.stats.elapsed_ms = start.elapsed().as_secs_f32() * 1000.0;
        result
    }
}

fn bake_channels(baker: Option<&LightBaker<'_>>, buffers: &VertexBuffers) -> (Vec<Vec2>, Vec<Vec2>) {
    let n = buffers.vertex_count();
    let mut a = Vec::with_capacity(n);
    let mut b = Vec::with_capacity(n);
    for (p, normal) in buffers.positions.iter().zip(&buffers.normals) {
        let color = baker.map(|baker| baker.bake_vertex(*p, *normal)).unwrap_or(Color::ZERO);
        let (la, lb) = pack_light(color);
        a.push(la);
        b.push(lb);
    }
    (a, b)
}

/// Mesh a snapshot without a scratch pool (tools, benches, tests)
pub fn build_surfaces(
    snapshot: &PaddedSnapshot,
    registry: &BlockRegistry,
    tables: &MeshTables,
    config: &LightingConfig,
) -> (ChunkSurfaces, JobStats) {
    let mut scratch = MeshScratch::default();
    let stats = build_geometry(snapshot, registry, tables, config, &mut scratch);
    (scratch.finish(), stats)
}

/// Run the geometry pass into `scratch`, which is reset first
pub fn build_geometry(
    snapshot: &PaddedSnapshot,
    registry: &BlockRegistry,
    tables: &MeshTables,
    config: &LightingConfig,
    scratch: &mut MeshScratch,
) -> JobStats {
    let dims = snapshot.dims();
    scratch.reset((dims.x * dims.y * dims.z) as usize);
    let grow_before: usize = scratch.builders.iter().map(|b| b.grow_events()).sum();

    let mut pass = GeometryPass { snapshot, registry, tables, config, scratch, stats: JobStats::default() };
    for x in 0..dims.x {
        for y in 0..dims.y {
            for z in 0..dims.z {
                pass.cell(IVec3::new(x, y, z));
            }
        }
    }

    let mut stats = pass.stats;
    let grow_after: usize = scratch.builders.iter().map(|b| b.grow_events()).sum();
    stats.grow_events = (grow_after - grow_before) as u32;
    stats
}

struct GeometryPass<'a, 's> {
    snapshot: &'a PaddedSnapshot,
    registry: &'a BlockRegistry,
    tables: &'a MeshTables,
    config: &'a LightingConfig,
    scratch: &'s mut MeshScratch,
    stats: JobStats,
}

impl<'a> GeometryPass<'a, '_> {
    fn local_index(&self, p: IVec3) -> usize {
        let d = self.snapshot.dims();
        ((p.x * d.y + p.y) * d.z + p.z) as usize
    }

    fn definition(&mut self, id: BlockId) -> &'a BlockDefinition {
        match self.registry.get(id) {
            Some(definition) => definition,
            None => {
                if self.scratch.warned.insert(id) {
                    log::warn!("No block definition for id {}, using placeholder", id);
                    self.stats.missing_definitions += 1;
                }
                self.registry.placeholder()
            }
        }
    }

    fn cell(&mut self, p: IVec3) {
        let cell = self.snapshot.get(p);
        if cell.is_air() {
            return;
        }
        let definition = self.definition(cell.block_id());
        if definition.fake {
            return;
        }
        match &definition.shape {
            BlockShape::Cube => self.cube(p, cell, definition),
            BlockShape::Tiled { tiles } => self.tiled(p, cell, definition, tiles),
            BlockShape::CustomMesh { mesh } => {
                self.mesh(SurfaceKind::Main, mesh, p.as_vec3(), cell.rotation(), definition.tint);
            }
            BlockShape::DetailMesh { mesh, lod } => {
                self.mesh(SurfaceKind::DetailLod0, mesh, p.as_vec3(), cell.rotation(), definition.tint);
                if let Some(lod) = lod {
                    self.mesh(SurfaceKind::DetailLod1, lod, p.as_vec3(), cell.rotation(), definition.tint);
                }
            }
        }
    }

    fn cube(&mut self, p: IVec3, cell: VoxelCell, definition: &BlockDefinition) {
        let strength = self.config.ambient_occlusion_strength;
        for face in Face::ALL {
            let table = self.tables.face(face);
            let neighbor = self.snapshot.get(p + table.offset);
            if neighbor.is_solid() || neighbor.block_id() == cell.block_id() {
                continue;
            }

            let occlusion = if definition.do_occlusion {
                face_occlusion(self.snapshot, p, table)
            } else {
                [0; 4]
            };
            let material = definition.face(source_face(face, cell.rotation()));
            let origin = p.as_vec3();

            let buffers = self.scratch.builder(SurfaceKind::Main).reserve(&material.material, 4, 6);
            let base = buffers.vertex_count() as u32;
            for corner in 0..4 {
                let shade = definition.tint * brightness(occlusion[corner], strength);
                buffers.push_vertex(
                    origin + table.corners[corner],
                    table.normal,
                    material.uv.lerp(table.uvs[corner]),
                    shade.extend(1.0),
                );
            }
            buffers.indices.extend(quad_indices(should_flip(occlusion)).map(|i| base + i));
            self.stats.faces += 1;
            self.stats.vertices += 4;
        }
    }

    fn tiled(&mut self, p: IVec3, cell: VoxelCell, definition: &BlockDefinition, tiles: &[TileFootprint]) {
        if self.scratch.consumed[self.local_index(p)] {
            return;
        }
        for tile in tiles {
            let min = p + tile.offset;
            if self.footprint_fits(min, tile.size.as_ivec3(), cell.block_id()) {
                self.consume(min, tile.size.as_ivec3());
                self.mesh(SurfaceKind::Main, &tile.mesh, min.as_vec3(), 0, definition.tint);
                self.stats.tiles += 1;
                return;
            }
        }
        // no footprint matched and the list has no unit entry
        let index = self.local_index(p);
        self.scratch.consumed.set(index, true);
        self.cube(p, cell, definition);
    }

    fn footprint_fits(&self, min: IVec3, size: IVec3, id: BlockId) -> bool {
        let max = min + size - IVec3::ONE;
        if !self.snapshot.in_interior(min) || !self.snapshot.in_interior(max) {
            return false;
        }
        for x in min.x..=max.x {
            for y in min.y..=max.y {
                for z in min.z..=max.z {
                    let q = IVec3::new(x, y, z);
                    if self.snapshot.get(q).block_id() != id || self.scratch.consumed[self.local_index(q)] {
                        return false;
                    }
                }
            }
        }
        true
    }

    fn consume(&mut self, min: IVec3, size: IVec3) {
        for x in min.x..min.x + size.x {
            for y in min.y..min.y + size.y {
                for z in min.z..min.z + size.z {
                    let index = self.local_index(IVec3::new(x, y, z));
                    self.scratch.consumed.set(index, true);
                }
            }
        }
    }

    fn mesh(&mut self, kind: SurfaceKind, mesh: &MeshData, translation: Vec3, rotation: u8, tint: Color) {
        if mesh.positions.is_empty() {
            return;
        }
        let buffers = self.scratch.builder(kind).reserve(&mesh.material, mesh.vertex_count(), mesh.indices.len());
        let base = buffers.vertex_count() as u32;
        let color = tint.extend(1.0);
        for (i, position) in mesh.positions.iter().enumerate() {
            let normal = mesh.normals.get(i).copied().unwrap_or(Vec3::Y);
            let uv = mesh.uvs.get(i).copied().unwrap_or(Vec2::ZERO);
            buffers.push_vertex(
                rotate_point(*position, rotation) + translation,
                rotate_vector(normal, rotation),
                uv,
                color,
            );
        }
        buffers.indices.extend(mesh.indices.iter().map(|i| base + i));
        self.stats.meshes += 1;
        self.stats.vertices += mesh.vertex_count() as u32;
    }
}

/// Apply a cell rotation to a direction.
///
/// Bit 2 turns 180 degrees about X; bits 0-1 then add quarter turns about Y.
pub fn rotate_vector(v: Vec3, rotation: u8) -> Vec3 {
    let mut v = v;
    if rotation & 4 != 0 {
        v = Vec3::new(v.x, -v.y, -v.z);
    }
    for _ in 0..(rotation & 3) {
        v = Vec3::new(v.z, v.y, -v.x);
    }
    v
}

/// Rotate a cell-local point about the cell center
pub fn rotate_point(p: Vec3, rotation: u8) -> Vec3 {
    if rotation == 0 {
        return p;
    }
    rotate_vector(p - Vec3::splat(0.5), rotation) + Vec3::splat(0.5)
}

/// Face of the unrotated block that ends up facing `world_face`
pub fn source_face(world_face: Face, rotation: u8) -> Face {
    if rotation == 0 {
        return world_face;
    }
    let target = world_face.normal();
    Face::ALL
        .into_iter()
        .find(|f| rotate_vector(f.normal(), rotation) == target)
        .unwrap_or(world_face)
}
